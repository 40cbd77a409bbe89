//! Speech pipeline error types.

/// Errors that can occur in the speech pipeline.
///
/// Per-sentence failures (`SynthesisFailure`, `PlaybackFailure`,
/// `EngineUnavailable` at dispatch time) are logged by the playback worker
/// and never leave it. Caller-facing operations surface `InvalidSetting` and
/// `EngineUnavailable` from state updates.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    /// The selected engine's resources are not configured or failed to load.
    #[error("{engine} engine unavailable: {reason}")]
    EngineUnavailable { engine: String, reason: String },

    /// The engine failed to synthesize a specific sentence.
    #[error("Speech synthesis failed: {0}")]
    SynthesisFailure(String),

    /// The audio device could not open or play a buffer.
    #[error("Audio playback failed: {0}")]
    PlaybackFailure(String),

    /// A runtime state update carried an out-of-range or malformed value.
    #[error("Invalid value for '{field}': {reason}")]
    InvalidSetting { field: &'static str, reason: String },

    /// Attenuating or restoring other audio sessions failed.
    #[error("Audio ducking failed: {0}")]
    DuckingFailure(String),

    /// Reading or writing the settings file failed.
    #[error("Settings persistence failed: {0}")]
    Persistence(String),

    /// IO error (model files, subprocesses, worker thread spawn).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The pipeline has been shut down.
    #[error("Speech pipeline is shut down")]
    ShutDown,
}

impl VoiceError {
    pub(crate) fn unavailable(engine: &str, reason: impl Into<String>) -> Self {
        Self::EngineUnavailable {
            engine: engine.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            field,
            reason: reason.into(),
        }
    }
}
