//! Reconciliation engine
//!
//! Owns all mutable state: the config store, the tracked proxy and the phase
//! of every classified container. Events are handled one at a time, each to
//! completion, in the order the runtime delivers them.
//!
//! Per container id the engine moves through
//! `Unclassified -> {WebActive, ProxyActive, Ignored} -> Removed`.

use crate::certs;
use crate::container::{classify, short_id, ContainerRecord, Role};
use crate::error::{Error, Result};
use crate::notifier::ProxyNotifier;
use crate::render;
use crate::route;
use crate::runtime::{ContainerRuntime, EventFilter, LifecycleEvent};
use crate::store::ConfigStore;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Where a container stands from the engine's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Never seen, or removed and forgotten
    Unclassified,
    /// Has a config file on disk
    WebActive,
    /// Is the tracked proxy
    ProxyActive,
    /// Seen but produces no config
    Ignored,
    /// Stop event handled
    ///
    /// Only reported by [`Engine::handle_event`]; removed ids are dropped
    /// from the phase map so it stays bounded, and [`Engine::phase`] then
    /// reports them as `Unclassified`.
    Removed,
}

/// Inputs the engine is constructed with
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Domain appended to container names and aliases
    pub base_domain: String,
    /// Directory of managed config files
    pub conf_dir: PathBuf,
    /// Root of `<hostname>/fullchain.pem` certificate directories
    pub ssl_root: PathBuf,
    /// Label carrying the container role
    pub role_label: String,
    /// Signal sent to the proxy on change
    pub reload_signal: String,
}

/// Keeps the config directory in line with running web containers
pub struct Engine<R: ContainerRuntime> {
    runtime: R,
    settings: EngineSettings,
    store: ConfigStore,
    notifier: ProxyNotifier,
    phases: HashMap<String, Phase>,
}

impl<R: ContainerRuntime> Engine<R> {
    pub fn new(runtime: R, settings: EngineSettings) -> Self {
        Self {
            store: ConfigStore::new(settings.conf_dir.clone()),
            notifier: ProxyNotifier::new(settings.reload_signal.clone()),
            runtime,
            settings,
            phases: HashMap::new(),
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Full id of the tracked proxy container
    pub fn proxy(&self) -> Option<&str> {
        self.notifier.proxy()
    }

    /// Current phase of a container id
    ///
    /// Never `Removed`: stopped containers are forgotten.
    pub fn phase(&self, id: &str) -> Phase {
        self.phases.get(id).copied().unwrap_or(Phase::Unclassified)
    }

    /// Subscribe, reconcile from scratch, then follow events until shutdown
    ///
    /// The subscription opens before the startup listing so events raised
    /// during the sync are queued rather than lost. A failed or closed event
    /// stream ends the run with an error.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let filter = EventFilter::container_lifecycle(&self.settings.role_label);
        let mut events = self.runtime.subscribe(&filter);

        self.sync().await?;
        info!("Watching container events");

        loop {
            tokio::select! {
                // Delivered events are drained before shutdown is honored
                biased;

                event = events.next() => match event {
                    Some(Ok(event)) => {
                        self.handle_event(&event).await;
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "Container event stream failed");
                        return Err(e);
                    }
                    None => {
                        error!("Container event stream closed");
                        return Err(Error::EventStream("stream closed by runtime".to_string()));
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown requested, stopping event loop");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Startup reconciliation
    ///
    /// Clears every managed file, then classifies all running labeled
    /// containers. The proxy is signaled once at the end if any web config
    /// was written. Returns the number of web containers configured.
    pub async fn sync(&mut self) -> Result<usize> {
        self.phases.clear();
        if let Some(proxy) = self.notifier.proxy().map(String::from) {
            self.notifier.release(&proxy);
        }

        self.store.clean()?;

        let containers = self
            .runtime
            .list_labeled(&self.settings.role_label)
            .await?;
        info!(count = containers.len(), "Listed labeled containers");

        let mut web = 0;
        for container in containers.iter().filter(|c| c.running) {
            if self.classify_container(&container.id).await == Phase::WebActive {
                web += 1;
            }
        }

        info!(
            web,
            proxy = self.notifier.proxy().map(short_id),
            "Startup reconciliation complete"
        );

        if web > 0 {
            self.notify_proxy().await;
        }
        Ok(web)
    }

    /// Route one lifecycle event; only `start` takes the start path
    pub async fn handle_event(&mut self, event: &LifecycleEvent) -> Phase {
        if event.is_start() {
            self.on_start(&event.id).await
        } else {
            let phase = self.on_stop(&event.id).await;
            info!(container = short_id(&event.id), action = %event.action, "Stopped container");
            phase
        }
    }

    /// A container started: classify it and notify if the config set changed
    ///
    /// A restart that no longer yields a web config drops the file written
    /// by the earlier start, so disk and phase agree.
    pub async fn on_start(&mut self, id: &str) -> Phase {
        let phase = self.classify_container(id).await;
        let changed = match phase {
            Phase::WebActive => true,
            _ => self.drop_stale_config(id),
        };
        if changed {
            self.notify_proxy().await;
        }
        phase
    }

    /// A container stopped (or any non-start action arrived)
    pub async fn on_stop(&mut self, id: &str) -> Phase {
        self.phases.remove(id);

        if self.notifier.release(id) {
            info!(container = short_id(id), "Proxy container stopped, reference cleared");
            return Phase::Removed;
        }

        if self.drop_stale_config(id) {
            self.notify_proxy().await;
        } else {
            debug!(container = short_id(id), "No config file to remove");
        }
        Phase::Removed
    }

    /// Remove a container's config file; returns whether one was removed
    fn drop_stale_config(&self, id: &str) -> bool {
        match self.store.remove(id) {
            Ok(removed) => {
                if removed {
                    info!(
                        container = short_id(id),
                        path = %self.store.config_path(id).display(),
                        "Removed config file"
                    );
                }
                removed
            }
            Err(e) => {
                error!(container = short_id(id), error = %e, "Failed to remove config file");
                false
            }
        }
    }

    /// Inspect and classify one container, applying file and proxy state
    ///
    /// Never notifies; callers decide whether the change warrants a reload.
    async fn classify_container(&mut self, id: &str) -> Phase {
        debug!(container = short_id(id), "Checking container");

        let metadata = match self.runtime.inspect(id).await {
            Ok(metadata) => metadata,
            Err(e) if e.is_not_found() => {
                warn!(container = short_id(id), "Container vanished before inspection, skipping");
                return self.set_phase(id, Phase::Ignored);
            }
            Err(e) => {
                error!(container = short_id(id), error = %e, "Unable to inspect container");
                return self.set_phase(id, Phase::Ignored);
            }
        };

        let record = classify(metadata, &self.settings.role_label);
        if !record.is_running() {
            // Started and exited again before inspection; its die event follows
            info!(container = record.short_id(), name = %record.name, "Container no longer running, skipping");
            return self.set_phase(id, Phase::Ignored);
        }

        let phase = match record.role {
            Role::Web => self.apply_web(&record),
            Role::Proxy => {
                info!(container = record.short_id(), name = %record.name, "Tracking proxy container");
                self.notifier.track(&record.id);
                Phase::ProxyActive
            }
            Role::Unknown(ref value) => {
                error!(
                    container = record.short_id(),
                    label = %self.settings.role_label,
                    value = %value,
                    "Unknown container role"
                );
                Phase::Ignored
            }
            Role::Unlabeled => {
                error!(
                    container = record.short_id(),
                    label = %self.settings.role_label,
                    "Container has no role label"
                );
                Phase::Ignored
            }
        };
        self.set_phase(id, phase)
    }

    /// Derive, render and write the config of a web container
    fn apply_web(&self, record: &ContainerRecord) -> Phase {
        let routing = match route::derive(record, &self.settings.base_domain) {
            Ok(routing) => routing,
            Err(e) => {
                error!(container = record.short_id(), name = %record.name, error = %e, "Cannot route container");
                return Phase::Ignored;
            }
        };
        let tls = certs::locate(&routing.server_names, &self.settings.ssl_root);
        let routing = routing.with_tls(tls);

        let content = render::render(&routing, &self.settings.base_domain);
        match self.store.write(&record.id, &content) {
            Ok(path) => {
                info!(
                    container = record.short_id(),
                    name = %record.name,
                    upstream = %routing.upstream_target,
                    server_names = ?routing.server_names,
                    tls = routing.tls.as_ref().map(|t| t.hostname.as_str()),
                    path = %path.display(),
                    "Updated config for web container"
                );
                Phase::WebActive
            }
            Err(e) => {
                error!(container = record.short_id(), error = %e, "Unable to write config file");
                Phase::Ignored
            }
        }
    }

    fn set_phase(&mut self, id: &str, phase: Phase) -> Phase {
        self.phases.insert(id.to_string(), phase);
        phase
    }

    /// Signal the proxy; failures are logged and never retried
    async fn notify_proxy(&self) {
        if let Err(e) = self.notifier.notify(&self.runtime).await {
            error!(error = %e, "Unable to signal proxy container");
        }
    }
}
