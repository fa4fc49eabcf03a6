//! Container runtime interface consumed by the engine

use crate::container::ContainerMetadata;
use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Lifecycle action that routes an event to the start path
pub const START_ACTION: &str = "start";

/// Lifecycle action reported when a container exits
pub const DIE_ACTION: &str = "die";

/// Container as returned by a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    pub running: bool,
}

/// One container lifecycle event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub id: String,
    pub action: String,
}

impl LifecycleEvent {
    pub fn new(id: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            action: action.into(),
        }
    }

    pub fn is_start(&self) -> bool {
        self.action == START_ACTION
    }
}

/// Which events a subscription delivers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    /// Object type, e.g. `container`
    pub kind: String,
    pub actions: Vec<String>,
    /// Only containers carrying this label
    pub label_key: String,
}

impl EventFilter {
    /// Start and die events of containers carrying `label_key`
    pub fn container_lifecycle(label_key: &str) -> Self {
        Self {
            kind: "container".to_string(),
            actions: vec![START_ACTION.to_string(), DIE_ACTION.to_string()],
            label_key: label_key.to_string(),
        }
    }
}

/// Stream of lifecycle events; an `Err` item ends the subscription
pub type EventStream = BoxStream<'static, Result<LifecycleEvent>>;

/// Operations the engine needs from the container runtime
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Containers carrying `label_key`
    async fn list_labeled(&self, label_key: &str) -> Result<Vec<ContainerSummary>>;

    /// Full metadata of one container, or `Error::NotFound`
    async fn inspect(&self, id: &str) -> Result<ContainerMetadata>;

    /// Send a signal such as `HUP` to a container
    async fn signal(&self, id: &str, signal: &str) -> Result<()>;

    /// Subscribe to lifecycle events matching `filter`
    fn subscribe(&self, filter: &EventFilter) -> EventStream;
}
