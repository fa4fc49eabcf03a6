//! Managed config directory
//!
//! Every file this daemon owns is named `_<short id>.conf`. The leading
//! marker keeps operator-authored files in the same directory out of reach
//! of [`ConfigStore::clean`].

use crate::container::short_id;
use crate::error::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info};

/// Name prefix of every managed file
pub const MARKER_PREFIX: &str = "_";

const CONF_EXTENSION: &str = ".conf";
const TEMP_SUFFIX: &str = ".tmp";

/// Config files for web containers, one per container
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the config file for a container id
    pub fn config_path(&self, container_id: &str) -> PathBuf {
        self.dir.join(format!(
            "{}{}{}",
            MARKER_PREFIX,
            short_id(container_id),
            CONF_EXTENSION
        ))
    }

    /// Write a container's config, replacing any previous content
    ///
    /// Content goes to a synced temp file that is then renamed into place,
    /// so readers see either the old file or the complete new one.
    pub fn write(&self, container_id: &str, content: &str) -> Result<PathBuf> {
        let path = self.config_path(container_id);
        let mut temp_name = path.clone().into_os_string();
        temp_name.push(TEMP_SUFFIX);
        let temp_path = PathBuf::from(temp_name);

        let write_temp = || -> std::io::Result<()> {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()
        };
        if let Err(e) = write_temp() {
            let _ = fs::remove_file(&temp_path);
            return Err(Error::store(&temp_path, e));
        }

        fs::rename(&temp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            Error::store(&path, e)
        })?;

        debug!(path = %path.display(), bytes = content.len(), "Wrote config file");
        Ok(path)
    }

    /// Remove a container's config; returns whether a file was there
    pub fn remove(&self, container_id: &str) -> Result<bool> {
        let path = self.config_path(container_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::store(path, e)),
        }
    }

    /// Managed files currently in the directory, sorted by name
    pub fn managed_files(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| Error::store(&self.dir, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::store(&self.dir, e))?;
            let file_type = entry
                .file_type()
                .map_err(|e| Error::store(entry.path(), e))?;
            if !file_type.is_file() {
                continue;
            }
            if entry
                .file_name()
                .to_string_lossy()
                .starts_with(MARKER_PREFIX)
            {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Delete every managed file left by an earlier run
    ///
    /// Any failure here is fatal for startup: without a clean directory the
    /// file set can't be trusted to match the running containers.
    pub fn clean(&self) -> Result<usize> {
        let files = self.managed_files()?;
        for path in &files {
            fs::remove_file(path).map_err(|e| Error::store(path, e))?;
            debug!(path = %path.display(), "Removed stale config file");
        }
        info!(dir = %self.dir.display(), removed = files.len(), "Cleaned config directory");
        Ok(files.len())
    }
}
