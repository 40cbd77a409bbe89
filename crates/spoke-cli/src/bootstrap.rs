//! Composition root: wires concrete engines, ducker, audio output and
//! settings storage into a [`SpeechService`].

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use spoke_voice::{
    JsonFileStore, LocalEngineFactory, RuntimeSettings, SpeechService, StatePersister,
    rodio_output_factory, system_ducker,
};

/// Everything needed to start the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub model_dir: Option<PathBuf>,
    pub state_file: Option<PathBuf>,
    pub duck: bool,
    pub duck_level: f32,
    pub queue_capacity: usize,
}

/// Whether runtime updates are written back to the settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    /// Load on start and save after every update (server).
    ReadWrite,
    /// Load on start only (one-shot commands).
    ReadOnly,
}

impl PipelineConfig {
    pub fn settings_store(&self) -> Result<JsonFileStore> {
        let path = match &self.state_file {
            Some(path) => path.clone(),
            None => JsonFileStore::default_path()?,
        };
        Ok(JsonFileStore::new(path))
    }
}

/// Start the speech pipeline on the default audio device.
pub fn start_service(config: &PipelineConfig, persistence: Persistence) -> Result<SpeechService> {
    let store = config.settings_store()?;
    tracing::debug!(path = %store.path().display(), "Using settings file");

    let builder = SpeechService::builder(Box::new(LocalEngineFactory::new(
        config.model_dir.clone(),
    )))
    .queue_capacity(config.queue_capacity)
    .ducker(system_ducker(config.duck, config.duck_level))
    .output(rodio_output_factory());

    let builder = match persistence {
        Persistence::ReadWrite => builder.persister(Arc::new(store)),
        Persistence::ReadOnly => builder.settings(saved_settings(&store)),
    };

    builder.start().context("Failed to start speech pipeline")
}

/// Saved settings, or defaults when the file is missing, unreadable or out
/// of range.
pub fn saved_settings(store: &dyn StatePersister) -> RuntimeSettings {
    match store.load() {
        Ok(settings) => settings.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unreadable settings file");
            RuntimeSettings::default()
        }
    }
}
