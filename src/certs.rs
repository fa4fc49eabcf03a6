//! Certificate lookup by directory convention
//!
//! Certificates are expected at `<ssl_root>/<hostname>/fullchain.pem` and
//! `<ssl_root>/<hostname>/privkey.pem`. Only the directory's presence is
//! checked.

use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the certificate chain inside a hostname directory
pub const CERT_FILE: &str = "fullchain.pem";

/// File name of the private key inside a hostname directory
pub const KEY_FILE: &str = "privkey.pem";

/// Certificate directory located for one hostname
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateBundle {
    /// Hostname the directory is named after
    pub hostname: String,
    pub directory: PathBuf,
}

impl CertificateBundle {
    pub fn cert_path(&self) -> PathBuf {
        self.directory.join(CERT_FILE)
    }

    pub fn key_path(&self) -> PathBuf {
        self.directory.join(KEY_FILE)
    }
}

/// Find the first server name that has a certificate directory
pub fn locate(server_names: &[String], ssl_root: &Path) -> Option<CertificateBundle> {
    server_names.iter().find_map(|name| {
        // Hostnames with separators would escape the ssl root
        if name.is_empty() || name.contains('/') || name == "." || name == ".." {
            return None;
        }
        let directory = ssl_root.join(name);
        if directory.is_dir() {
            debug!(hostname = %name, directory = %directory.display(), "Found certificate directory");
            Some(CertificateBundle {
                hostname: name.clone(),
                directory,
            })
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_locate_first_existing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("x.com")).unwrap();

        let bundle = locate(&names(&["y.com", "x.com"]), tmp.path()).unwrap();
        assert_eq!(bundle.hostname, "x.com");
        assert_eq!(bundle.cert_path(), tmp.path().join("x.com/fullchain.pem"));
        assert_eq!(bundle.key_path(), tmp.path().join("x.com/privkey.pem"));
    }

    #[test]
    fn test_locate_prefers_list_order() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("x.com")).unwrap();
        fs::create_dir(tmp.path().join("y.com")).unwrap();

        let bundle = locate(&names(&["y.com", "x.com"]), tmp.path()).unwrap();
        assert_eq!(bundle.hostname, "y.com");
    }

    #[test]
    fn test_locate_none() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(locate(&names(&["y.com", "x.com"]), tmp.path()).is_none());
        assert!(locate(&[], tmp.path()).is_none());
    }

    #[test]
    fn test_locate_ignores_plain_files() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("x.com"), "not a directory").unwrap();
        assert!(locate(&names(&["x.com"]), tmp.path()).is_none());
    }

    #[test]
    fn test_locate_rejects_path_escapes() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("certs")).unwrap();
        let root = tmp.path().join("certs");
        assert!(locate(&names(&["..", "../certs"]), &root).is_none());
    }
}
