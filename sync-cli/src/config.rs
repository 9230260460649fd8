//! Configuration management for chat-sync.

use anyhow::{Context, Result};
use chat_sync_client::{FileConfig, FileStore, LocalCache, SyncConfig};
use std::path::{Path, PathBuf};

/// Name of the config file looked up in the data directory.
pub const CONFIG_FILE: &str = "chat-sync.toml";

/// Resolved configuration for one CLI invocation.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Data directory everything relative resolves against.
    pub data_dir: PathBuf,
    /// Parsed config file (defaults if there is none).
    pub file: FileConfig,
}

impl AppConfig {
    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, `<data_dir>/chat-sync.toml`
    /// is used if present, defaults otherwise.
    pub fn load(data_dir: &Path, explicit: Option<&Path>) -> Result<Self> {
        let file = match explicit {
            Some(path) => FileConfig::from_file(path).context("Invalid configuration")?,
            None => {
                let path = data_dir.join(CONFIG_FILE);
                if path.exists() {
                    FileConfig::from_file(&path).context("Invalid configuration")?
                } else {
                    FileConfig::default()
                }
            }
        };

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            file,
        })
    }

    /// Directory the file-backed cache lives in.
    pub fn cache_dir(&self) -> PathBuf {
        if self.file.cache.dir.is_absolute() {
            self.file.cache.dir.clone()
        } else {
            self.data_dir.join(&self.file.cache.dir)
        }
    }

    /// The on-disk snapshot cache.
    pub fn local_cache(&self) -> LocalCache<FileStore> {
        LocalCache::new(FileStore::new(self.cache_dir()), self.file.cache.key.clone())
    }

    /// Engine configuration.
    pub fn sync_config(&self) -> SyncConfig {
        self.file.to_sync_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_without_config_file() {
        let dir = tempdir().unwrap();

        let app = AppConfig::load(dir.path(), None).unwrap();

        assert_eq!(app.cache_dir(), dir.path().join("cache"));
        assert_eq!(app.sync_config().collection, "messages");
        assert_eq!(app.local_cache().key(), "messages");
    }

    #[test]
    fn reads_config_from_data_dir() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[session]\nuser_id = \"u-7\"\ndisplay_name = \"Lin\"\n\n[cache]\nkey = \"room\"\ndir = \"store\"\n",
        )
        .unwrap();

        let app = AppConfig::load(dir.path(), None).unwrap();

        assert_eq!(app.sync_config().user.display_name, "Lin");
        assert_eq!(app.cache_dir(), dir.path().join("store"));
        assert_eq!(app.local_cache().key(), "room");
    }

    #[test]
    fn absolute_cache_dir_is_kept() {
        let dir = tempdir().unwrap();
        let elsewhere = tempdir().unwrap();
        let config = dir.path().join("custom.toml");
        std::fs::write(
            &config,
            format!("[cache]\ndir = {:?}\n", elsewhere.path().display().to_string()),
        )
        .unwrap();

        let app = AppConfig::load(dir.path(), Some(&config)).unwrap();

        assert_eq!(app.cache_dir(), elsewhere.path());
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempdir().unwrap();

        let result = AppConfig::load(dir.path(), Some(&dir.path().join("missing.toml")));

        assert!(result.is_err());
    }
}
