//! Settings persistence.
//!
//! [`StatePersister`] is the port the service calls after every accepted
//! state update; [`JsonFileStore`] is the default adapter.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::VoiceError;
use crate::state::{RuntimeSettings, validate_settings};

/// Loads and stores [`RuntimeSettings`] across restarts.
#[cfg_attr(test, mockall::automock)]
pub trait StatePersister: Send + Sync {
    /// Stored settings, or `None` when nothing has been saved yet.
    ///
    /// Out-of-range values are an `InvalidSetting` error, never returned.
    fn load(&self) -> Result<Option<RuntimeSettings>, VoiceError>;

    fn save(&self, settings: &RuntimeSettings) -> Result<(), VoiceError>;
}

/// Settings stored as pretty-printed JSON in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config_dir>/spoke/settings.json`.
    pub fn default_path() -> Result<PathBuf, VoiceError> {
        dirs::config_dir()
            .map(|dir| dir.join("spoke").join("settings.json"))
            .ok_or_else(|| VoiceError::Persistence("cannot determine config directory".into()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatePersister for JsonFileStore {
    fn load(&self) -> Result<Option<RuntimeSettings>, VoiceError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let settings: RuntimeSettings = serde_json::from_str(&content).map_err(|e| {
            VoiceError::Persistence(format!("invalid {}: {e}", self.path.display()))
        })?;
        validate_settings(&settings)?;
        Ok(Some(settings))
    }

    fn save(&self, settings: &RuntimeSettings) -> Result<(), VoiceError> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        let json = serde_json::to_string_pretty(settings)
            .map_err(|e| VoiceError::Persistence(e.to_string()))?;

        // Write beside the target, then rename over it.
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(&self.path)
            .map_err(|e| VoiceError::Persistence(e.to_string()))?;

        tracing::debug!(path = %self.path.display(), "Settings saved");
        Ok(())
    }
}
