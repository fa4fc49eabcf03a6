//! Docker implementation of the container runtime interface

use crate::container::ContainerMetadata;
use crate::error::{Error, Result};
use crate::runtime::{ContainerRuntime, ContainerSummary, EventFilter, EventStream, LifecycleEvent};
use async_trait::async_trait;
use bollard::container::{InspectContainerOptions, KillContainerOptions, ListContainersOptions};
use bollard::models::{ContainerInspectResponse, EventMessage};
use bollard::system::EventsOptions;
use bollard::Docker;
use futures::StreamExt;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Seconds before a Docker API request times out
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Container runtime backed by the Docker Engine API
#[derive(Clone)]
pub struct DockerRuntime {
    client: Docker,
}

impl DockerRuntime {
    /// Connect to the Docker daemon
    ///
    /// Connection priority:
    /// 1. Explicit docker_host parameter
    /// 2. DOCKER_HOST environment variable
    /// 3. Common socket paths (platform-specific)
    pub async fn connect(docker_host: Option<&str>) -> anyhow::Result<Self> {
        let client = if let Some(host) = docker_host {
            Self::connect_to_host(host).map_err(|e| {
                anyhow::anyhow!(
                    "Failed to connect to Docker at '{}': {}. \
                     Ensure Docker is running and the socket path is correct.",
                    host, e
                )
            })?
        } else if let Ok(host) = std::env::var("DOCKER_HOST") {
            Self::connect_to_host(&host).map_err(|e| {
                anyhow::anyhow!(
                    "Failed to connect to Docker via DOCKER_HOST='{}': {}",
                    host, e
                )
            })?
        } else {
            Self::connect_with_defaults().await?
        };

        client.ping().await.map_err(|e| {
            anyhow::anyhow!("Docker daemon is not responding: {}", e)
        })?;

        debug!("Connected to Docker daemon");
        Ok(Self { client })
    }

    fn connect_to_host(host: &str) -> anyhow::Result<Docker> {
        if let Some(socket_path) = host.strip_prefix("unix://") {
            Docker::connect_with_socket(socket_path, REQUEST_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
                .map_err(|e| anyhow::anyhow!("Cannot connect to Unix socket '{}': {}", socket_path, e))
        } else if host.starts_with("tcp://") || host.starts_with("http://") {
            Docker::connect_with_http(host, REQUEST_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
                .map_err(|e| anyhow::anyhow!("Cannot connect to TCP endpoint '{}': {}", host, e))
        } else {
            anyhow::bail!(
                "Invalid docker_host format: '{}'. Expected 'unix:///path/to/socket' or 'tcp://host:port'",
                host
            )
        }
    }

    async fn connect_with_defaults() -> anyhow::Result<Docker> {
        let home = std::env::var("HOME").unwrap_or_default();
        let xdg_runtime = std::env::var("XDG_RUNTIME_DIR").unwrap_or_default();

        let socket_paths: Vec<(&str, String)> = vec![
            ("Linux default", "/var/run/docker.sock".to_string()),
            ("Docker Desktop (macOS)", format!("{}/.docker/run/docker.sock", home)),
            ("Colima (macOS)", format!("{}/.colima/default/docker.sock", home)),
            ("Podman (Linux)", format!("{}/podman/podman.sock", xdg_runtime)),
        ];

        let mut tried_paths = Vec::new();

        for (name, path) in &socket_paths {
            if path.is_empty() || path.contains("//") {
                continue; // Skip paths built from empty env vars
            }

            if std::path::Path::new(path).exists() {
                debug!(path, name, "Found Docker socket");
                match Docker::connect_with_socket(path, REQUEST_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION) {
                    Ok(client) => {
                        if client.ping().await.is_ok() {
                            return Ok(client);
                        }
                        tried_paths.push(format!("{} ({}) - socket exists but daemon not responding", path, name));
                    }
                    Err(e) => {
                        tried_paths.push(format!("{} ({}) - connection failed: {}", path, name, e));
                    }
                }
            }
        }

        Docker::connect_with_socket_defaults().map_err(|e| {
            let tried_info = if tried_paths.is_empty() {
                "No Docker socket found at common locations".to_string()
            } else {
                format!("Tried:\n  - {}", tried_paths.join("\n  - "))
            };
            anyhow::anyhow!(
                "Cannot connect to Docker daemon. {}\n\n\
                 Start dockerd, set DOCKER_HOST, or set docker_host in the config file.\n\n\
                 Underlying error: {}",
                tried_info, e
            )
        })
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_labeled(&self, label_key: &str) -> Result<Vec<ContainerSummary>> {
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![label_key.to_string()]);
        let options = ListContainersOptions::<String> {
            filters,
            ..Default::default()
        };

        let containers = self
            .client
            .list_containers(Some(options))
            .await
            .map_err(|e| Error::Runtime(format!("failed to list containers: {}", e)))?;

        Ok(containers
            .into_iter()
            .filter_map(|c| {
                let running = c.state.as_deref() == Some("running");
                c.id.map(|id| ContainerSummary { id, running })
            })
            .collect())
    }

    async fn inspect(&self, id: &str) -> Result<ContainerMetadata> {
        match self
            .client
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
        {
            Ok(response) => Ok(metadata_from_inspect(id, response)),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Err(Error::NotFound(id.to_string())),
            Err(e) => Err(Error::Runtime(format!("failed to inspect container {}: {}", id, e))),
        }
    }

    async fn signal(&self, id: &str, signal: &str) -> Result<()> {
        self.client
            .kill_container(id, Some(KillContainerOptions { signal }))
            .await
            .map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                } => Error::NotFound(id.to_string()),
                e => Error::Runtime(e.to_string()),
            })
    }

    fn subscribe(&self, filter: &EventFilter) -> EventStream {
        let mut filters = HashMap::new();
        filters.insert("type".to_string(), vec![filter.kind.clone()]);
        filters.insert("event".to_string(), filter.actions.clone());
        filters.insert("label".to_string(), vec![filter.label_key.clone()]);
        let options = EventsOptions::<String> {
            filters,
            ..Default::default()
        };

        self.client
            .events(Some(options))
            .filter_map(|message| async move {
                match message {
                    Ok(message) => lifecycle_event(message).map(Ok),
                    Err(e) => Some(Err(Error::EventStream(e.to_string()))),
                }
            })
            .boxed()
    }
}

/// Convert an inspect response into runtime-neutral metadata
///
/// Networks are visited in name order so the first alias is stable across
/// calls; aliases keep the order Docker lists them in.
fn metadata_from_inspect(id: &str, response: ContainerInspectResponse) -> ContainerMetadata {
    let networks: BTreeMap<String, _> = response
        .network_settings
        .and_then(|settings| settings.networks)
        .unwrap_or_default()
        .into_iter()
        .collect();
    let aliases = networks
        .into_values()
        .flat_map(|endpoint| endpoint.aliases.unwrap_or_default())
        .collect();

    ContainerMetadata {
        id: response.id.unwrap_or_else(|| id.to_string()),
        name: response.name.unwrap_or_default(),
        labels: response
            .config
            .and_then(|config| config.labels)
            .unwrap_or_default(),
        aliases,
        running: response
            .state
            .and_then(|state| state.running)
            .unwrap_or(false),
    }
}

/// Lifecycle event carried by a Docker event message, if it names a container
fn lifecycle_event(message: EventMessage) -> Option<LifecycleEvent> {
    let action = message.action?;
    let id = message.actor.and_then(|actor| actor.id)?;
    Some(LifecycleEvent { id, action })
}
