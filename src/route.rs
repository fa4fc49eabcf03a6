//! Routing records for web containers

use crate::certs::CertificateBundle;
use crate::container::ContainerRecord;
use crate::error::{Error, Result};

/// Everything needed to render one container's proxy config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingRecord {
    /// Stable key the config file is named after
    pub config_key: String,
    /// Hostnames in insertion order: label entries, then `<name>.<domain>`
    pub server_names: Vec<String>,
    /// Network alias the proxy forwards to
    pub upstream_target: String,
    pub tls: Option<CertificateBundle>,
}

impl RoutingRecord {
    pub fn with_tls(mut self, tls: Option<CertificateBundle>) -> Self {
        self.tls = tls;
        self
    }

    /// Hostname under the base domain that always reaches the upstream
    pub fn canonical_name(&self, base_domain: &str) -> String {
        format!("{}.{}", self.upstream_target, base_domain)
    }
}

/// Derive the routing record of a web container
///
/// The first network alias becomes the upstream. A container without any
/// alias can't be reached by the proxy and yields [`Error::MissingAlias`].
pub fn derive(record: &ContainerRecord, base_domain: &str) -> Result<RoutingRecord> {
    let upstream_target = record
        .network_aliases
        .first()
        .cloned()
        .ok_or_else(|| Error::MissingAlias {
            container: record.short_id().to_string(),
        })?;

    let mut server_names = record.label_hostnames.clone();
    if is_plain_name(&record.name) {
        server_names.push(format!("{}.{}", record.name, base_domain));
    }

    Ok(RoutingRecord {
        config_key: record.short_id().to_string(),
        server_names,
        upstream_target,
        tls: None,
    })
}

/// Matches `^[A-Za-z0-9]+$`
fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric())
}
