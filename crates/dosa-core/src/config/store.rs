//! Configuration file location and loading.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::error::ConfigError;

use super::Settings;

/// System-wide fallback location.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/dosa/config";

/// Per-user location, `~/.dosa/config`.
pub fn user_config_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".dosa").join("config"))
}

/// Loads [`Settings`] from a fixed path or the standard search locations.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    candidates: Vec<PathBuf>,
}

impl ConfigStore {
    /// Search `~/.dosa/config`, then `/etc/dosa/config`.
    pub fn standard() -> Self {
        let mut candidates: Vec<PathBuf> = user_config_path().into_iter().collect();
        candidates.push(PathBuf::from(SYSTEM_CONFIG_PATH));
        Self { candidates }
    }

    /// Only ever read `path`.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            candidates: vec![path.into()],
        }
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// First candidate that exists on disk.
    pub fn locate(&self) -> Option<&Path> {
        self.candidates
            .iter()
            .map(PathBuf::as_path)
            .find(|path| path.is_file())
    }

    /// Read and parse the located file. `Ok(None)` when there is none.
    pub async fn load(&self) -> Result<Option<Settings>, ConfigError> {
        let Some(path) = self.locate() else {
            return Ok(None);
        };

        let content = fs::read_to_string(path).await?;
        let settings = Settings::parse(&content).map_err(|e| ConfigError::InvalidFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        debug!(path = %path.display(), "Loaded configuration");
        Ok(Some(settings))
    }

    /// Like [`load`](Self::load) but never fails: problems are logged and
    /// empty settings returned, so every value takes its default.
    pub async fn load_or_default(&self) -> Settings {
        match self.load().await {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                debug!(candidates = ?self.candidates, "No configuration file found");
                Settings::default()
            }
            Err(e) => {
                warn!(error = %e, "Configuration unusable, running with defaults");
                Settings::default()
            }
        }
    }
}
