//! Container classification
//!
//! Turns raw runtime metadata into a [`ContainerRecord`] whose [`Role`] is
//! decided once, from the role label, by [`classify`].

use std::collections::HashMap;

/// Label value marking a container whose site should be proxied
pub const WEB_ROLE: &str = "web";

/// Label value marking the reverse proxy container itself
pub const PROXY_ROLE: &str = "auto.proxy";

/// Label holding extra comma-separated hostnames for a web container
pub const HOSTNAME_LABEL: &str = "hostname";

/// Length of the display form of a container id
const SHORT_ID_LEN: usize = 12;

/// Shortened container id used for logs and file names, never for lookup
pub fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

/// Runtime state of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Running,
    Stopped,
}

/// Declared role of a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Serves a site that gets a config file
    Web,
    /// The reverse proxy to notify on change
    Proxy,
    /// Role label present with a value we don't handle
    Unknown(String),
    /// Role label absent
    Unlabeled,
}

impl Role {
    /// Map a role label value onto a role
    pub fn from_label(value: Option<&str>) -> Self {
        match value {
            None => Role::Unlabeled,
            Some(WEB_ROLE) => Role::Web,
            Some(PROXY_ROLE) => Role::Proxy,
            Some(other) => Role::Unknown(other.to_string()),
        }
    }
}

/// Raw container metadata as reported by the runtime
#[derive(Debug, Clone, Default)]
pub struct ContainerMetadata {
    pub id: String,
    /// Container name, possibly with the runtime's leading `/`
    pub name: String,
    pub labels: HashMap<String, String>,
    /// Network aliases in the order the runtime reported them
    pub aliases: Vec<String>,
    pub running: bool,
}

/// A classified container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub network_aliases: Vec<String>,
    pub label_hostnames: Vec<String>,
    pub state: ContainerState,
}

impl ContainerRecord {
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }

    pub fn is_running(&self) -> bool {
        self.state == ContainerState::Running
    }
}

/// Classify raw metadata by the value of `role_label`
pub fn classify(metadata: ContainerMetadata, role_label: &str) -> ContainerRecord {
    let role = Role::from_label(metadata.labels.get(role_label).map(String::as_str));
    let label_hostnames = metadata
        .labels
        .get(HOSTNAME_LABEL)
        .map(|value| split_hostnames(value))
        .unwrap_or_default();

    ContainerRecord {
        name: metadata.name.trim_start_matches('/').to_string(),
        id: metadata.id,
        role,
        network_aliases: metadata.aliases,
        label_hostnames,
        state: if metadata.running {
            ContainerState::Running
        } else {
            ContainerState::Stopped
        },
    }
}

/// Split a comma-delimited hostname label
///
/// Blank entries and entries that could break out of an nginx
/// `server_name` directive are dropped.
fn split_hostnames(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty() && is_safe_hostname(name))
        .map(String::from)
        .collect()
}

fn is_safe_hostname(name: &str) -> bool {
    !name.chars().any(|c| {
        c.is_whitespace()
            || c.is_control()
            || matches!(c, ';' | '{' | '}' | '"' | '\'' | '#' | '\\')
    })
}
