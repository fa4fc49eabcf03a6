//! Reload notifications for the tracked proxy container

use crate::container::short_id;
use crate::error::{Error, Result};
use crate::runtime::ContainerRuntime;
use tracing::{info, warn};

/// Signal that makes nginx reload its configuration
pub const DEFAULT_RELOAD_SIGNAL: &str = "HUP";

/// Result of a notification attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Proxy container was signaled
    Signaled,
    /// No proxy container is tracked yet
    NoProxy,
}

/// Tracks at most one proxy container and signals it on change
#[derive(Debug, Clone)]
pub struct ProxyNotifier {
    proxy: Option<String>,
    signal: String,
}

impl ProxyNotifier {
    pub fn new(signal: impl Into<String>) -> Self {
        Self {
            proxy: None,
            signal: signal.into(),
        }
    }

    /// Full id of the tracked proxy container
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    /// Track `id` as the proxy, replacing any previous one
    pub fn track(&mut self, id: &str) {
        if let Some(previous) = self.proxy.replace(id.to_string()) {
            if previous != id {
                info!(
                    previous = short_id(&previous),
                    container = short_id(id),
                    "Replacing tracked proxy container"
                );
            }
        }
    }

    /// Whether `id` is the tracked proxy
    pub fn is_proxy(&self, id: &str) -> bool {
        self.proxy.as_deref() == Some(id)
    }

    /// Stop tracking `id` if it is the proxy; returns whether it was
    pub fn release(&mut self, id: &str) -> bool {
        if self.is_proxy(id) {
            self.proxy = None;
            true
        } else {
            false
        }
    }

    /// Signal the tracked proxy to reload
    pub async fn notify<R: ContainerRuntime + ?Sized>(&self, runtime: &R) -> Result<NotifyOutcome> {
        let Some(ref proxy) = self.proxy else {
            warn!(
                signal = %self.signal,
                "No proxy container tracked, not sending reload signal"
            );
            return Ok(NotifyOutcome::NoProxy);
        };

        runtime
            .signal(proxy, &self.signal)
            .await
            .map_err(|e| Error::Signal {
                container: short_id(proxy).to_string(),
                signal: self.signal.clone(),
                reason: e.to_string(),
            })?;

        info!(container = short_id(proxy), signal = %self.signal, "Signaled proxy container to reload");
        Ok(NotifyOutcome::Signaled)
    }
}

impl Default for ProxyNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_RELOAD_SIGNAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerMetadata;
    use crate::runtime::{ContainerSummary, EventFilter, EventStream};
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::sync::Mutex;

    const PROXY_ID: &str = "abcdef0123456789abcdef0123456789";

    /// Runtime that only records or rejects signals
    #[derive(Default)]
    struct SignalRecorder {
        sent: Mutex<Vec<(String, String)>>,
        reject: bool,
    }

    #[async_trait]
    impl ContainerRuntime for SignalRecorder {
        async fn list_labeled(&self, _label_key: &str) -> Result<Vec<ContainerSummary>> {
            Ok(Vec::new())
        }

        async fn inspect(&self, id: &str) -> Result<ContainerMetadata> {
            Err(Error::NotFound(id.to_string()))
        }

        async fn signal(&self, id: &str, signal: &str) -> Result<()> {
            if self.reject {
                return Err(Error::Runtime("container is not running".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((id.to_string(), signal.to_string()));
            Ok(())
        }

        fn subscribe(&self, _filter: &EventFilter) -> EventStream {
            futures::stream::empty().boxed()
        }
    }

    #[test]
    fn test_track_and_release() {
        let mut notifier = ProxyNotifier::default();
        assert!(notifier.proxy().is_none());

        notifier.track("proxy-a");
        notifier.track("proxy-b");
        assert_eq!(notifier.proxy(), Some("proxy-b"));
        assert!(!notifier.is_proxy("proxy-a"));

        assert!(!notifier.release("proxy-a"));
        assert_eq!(notifier.proxy(), Some("proxy-b"));

        assert!(notifier.release("proxy-b"));
        assert!(notifier.proxy().is_none());
    }

    #[tokio::test]
    async fn test_notify_without_proxy() {
        let runtime = SignalRecorder::default();
        let notifier = ProxyNotifier::default();

        let outcome = notifier.notify(&runtime).await.unwrap();
        assert_eq!(outcome, NotifyOutcome::NoProxy);
        assert!(runtime.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_notify_sends_configured_signal() {
        let runtime = SignalRecorder::default();
        let mut notifier = ProxyNotifier::new("USR1");
        notifier.track(PROXY_ID);

        let outcome = notifier.notify(&runtime).await.unwrap();
        assert_eq!(outcome, NotifyOutcome::Signaled);
        assert_eq!(
            *runtime.sent.lock().unwrap(),
            vec![(PROXY_ID.to_string(), "USR1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_notify_failure_maps_to_signal_error() {
        let runtime = SignalRecorder {
            reject: true,
            ..Default::default()
        };
        let mut notifier = ProxyNotifier::default();
        notifier.track(PROXY_ID);

        let err = notifier.notify(&runtime).await.unwrap_err();
        match err {
            Error::Signal {
                container,
                signal,
                reason,
            } => {
                assert_eq!(container, "abcdef012345");
                assert_eq!(signal, "HUP");
                assert_eq!(reason, "container runtime error: container is not running");
            }
            other => panic!("unexpected error: {other}"),
        }
        // A failed signal keeps the proxy tracked for the next change
        assert_eq!(notifier.proxy(), Some(PROXY_ID));
    }
}
