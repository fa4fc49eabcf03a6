//! Autoproxy - nginx configuration from Docker container labels
//!
//! This library keeps a directory of nginx server blocks in sync with the
//! running Docker containers:
//! - Containers labeled `function=web` get one config file each
//! - Hostnames come from the `hostname` label and the container name
//! - Sites with a certificate directory are served over HTTPS
//! - The container labeled `function=auto.proxy` is signaled to reload
//!   whenever the set of config files changes

pub mod certs;
pub mod config;
pub mod container;
pub mod docker;
pub mod engine;
pub mod error;
pub mod notifier;
pub mod render;
pub mod route;
pub mod runtime;
pub mod store;
