//! Shared runtime state.
//!
//! One [`RuntimeState`] lives for the whole process and is shared by `Arc`
//! between the playback worker and every configuration caller. Settings sit
//! behind a single `RwLock` that is only held long enough to copy or patch
//! fields; the worker re-reads a fresh snapshot for every sentence. The
//! `speaking` flag is a separate atomic written only by the worker.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::VoiceError;

/// Default voice (Kokoro `af_sarah`, American English female).
pub const DEFAULT_VOICE: &str = "af_sarah";

/// Accepted speed multiplier range.
pub const SPEED_RANGE: std::ops::RangeInclusive<f32> = 0.5..=2.0;

/// Accepted volume range; values above 1.0 are clamped per sample.
pub const VOLUME_RANGE: std::ops::RangeInclusive<f32> = 0.0..=2.0;

/// Which synthesis backend handles new sentences.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EngineKind {
    #[default]
    Primary,
    Alternate,
}

impl EngineKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Alternate => "alternate",
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether text is submitted automatically or only on explicit request.
///
/// Carried for front-ends; the pipeline treats both modes the same.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpeechMode {
    #[default]
    Auto,
    SemiAuto,
}

/// Caller-mutable runtime settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeSettings {
    /// Voice identifier (e.g. `"af_sarah"`).
    pub voice: String,

    /// Speed multiplier (0.5-2.0).
    pub speed: f32,

    /// Output gain (0.0-2.0). Above 1.0 samples are clamped after scaling.
    pub volume: f32,

    /// While muted, dequeued sentences are discarded unspoken.
    pub muted: bool,

    pub active_engine: EngineKind,

    /// Model path for the alternate engine.
    pub alternate_engine_path: Option<PathBuf>,

    /// Cue played before each sentence.
    pub pre_cue_path: Option<PathBuf>,

    /// Cue played after each sentence.
    pub post_cue_path: Option<PathBuf>,

    pub speech_mode: SpeechMode,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            voice: DEFAULT_VOICE.to_string(),
            speed: 1.0,
            volume: 1.0,
            muted: false,
            active_engine: EngineKind::Primary,
            alternate_engine_path: None,
            pre_cue_path: None,
            post_cue_path: None,
            speech_mode: SpeechMode::Auto,
        }
    }
}

/// Point-in-time copy of the full runtime state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSnapshot {
    #[serde(flatten)]
    pub settings: RuntimeSettings,

    /// True while the worker holds the audio output for a sentence.
    pub speaking: bool,
}

/// Partial update of [`RuntimeSettings`].
///
/// `None` leaves a field unchanged. Path fields are `Option<Option<_>>`:
/// - `None` = don't change this field
/// - `Some(None)` = clear it (JSON `null`)
/// - `Some(Some(path))` = set it
///
/// Unknown JSON fields (including `speaking`) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdate {
    pub voice: Option<String>,
    pub speed: Option<f32>,
    pub volume: Option<f32>,
    pub muted: Option<bool>,
    pub active_engine: Option<EngineKind>,
    #[serde(default, deserialize_with = "present")]
    pub alternate_engine_path: Option<Option<PathBuf>>,
    #[serde(default, deserialize_with = "present")]
    pub pre_cue_path: Option<Option<PathBuf>>,
    #[serde(default, deserialize_with = "present")]
    pub post_cue_path: Option<Option<PathBuf>>,
    pub speech_mode: Option<SpeechMode>,
}

impl StateUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Distinguish an explicit JSON `null` from an absent field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Reject out-of-range or malformed values before anything is applied.
pub fn validate_update(update: &StateUpdate) -> Result<(), VoiceError> {
    if let Some(voice) = &update.voice {
        if voice.trim().is_empty() {
            return Err(VoiceError::invalid("voice", "must not be empty"));
        }
    }

    if let Some(speed) = update.speed {
        if !SPEED_RANGE.contains(&speed) {
            return Err(VoiceError::invalid(
                "speed",
                format!("must be between 0.5 and 2.0, got {speed}"),
            ));
        }
    }

    if let Some(volume) = update.volume {
        if !VOLUME_RANGE.contains(&volume) {
            return Err(VoiceError::invalid(
                "volume",
                format!("must be between 0.0 and 2.0, got {volume}"),
            ));
        }
    }

    for (field, path) in [
        ("alternateEnginePath", &update.alternate_engine_path),
        ("preCuePath", &update.pre_cue_path),
        ("postCuePath", &update.post_cue_path),
    ] {
        if let Some(Some(path)) = path {
            validate_path(field, path)?;
        }
    }

    Ok(())
}

/// Check a complete settings record, such as one read back from disk.
///
/// Paths are not checked: a saved cue or model that has since moved shows up
/// as a cue warning or `EngineUnavailable` when the sentence is spoken.
pub fn validate_settings(settings: &RuntimeSettings) -> Result<(), VoiceError> {
    validate_update(&StateUpdate {
        voice: Some(settings.voice.clone()),
        speed: Some(settings.speed),
        volume: Some(settings.volume),
        ..StateUpdate::default()
    })
}

fn validate_path(field: &'static str, path: &Path) -> Result<(), VoiceError> {
    if path.as_os_str().is_empty() {
        return Err(VoiceError::invalid(field, "path must not be empty"));
    }
    if !path.is_file() {
        return Err(VoiceError::invalid(
            field,
            format!("no such file: {}", path.display()),
        ));
    }
    Ok(())
}

/// The process-wide runtime state record.
#[derive(Debug, Default)]
pub struct RuntimeState {
    settings: RwLock<RuntimeSettings>,
    speaking: AtomicBool,
}

impl RuntimeState {
    pub fn new(settings: RuntimeSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
            speaking: AtomicBool::new(false),
        }
    }

    /// Copy of the current settings.
    pub fn settings(&self) -> RuntimeSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn snapshot(&self) -> RuntimeSnapshot {
        RuntimeSnapshot {
            settings: self.settings(),
            speaking: self.is_speaking(),
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::Acquire)
    }

    /// Only the playback worker calls this.
    pub(crate) fn set_speaking(&self, speaking: bool) {
        self.speaking.store(speaking, Ordering::Release);
    }

    /// Patch the recognised fields in place and return the names that were
    /// set. Callers validate first with [`validate_update`].
    pub fn apply(&self, update: StateUpdate) -> Vec<&'static str> {
        let mut applied = Vec::new();
        let mut settings = self
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(voice) = update.voice {
            settings.voice = voice;
            applied.push("voice");
        }
        if let Some(speed) = update.speed {
            settings.speed = speed;
            applied.push("speed");
        }
        if let Some(volume) = update.volume {
            settings.volume = volume;
            applied.push("volume");
        }
        if let Some(muted) = update.muted {
            settings.muted = muted;
            applied.push("muted");
        }
        if let Some(engine) = update.active_engine {
            settings.active_engine = engine;
            applied.push("activeEngine");
        }
        if let Some(path) = update.alternate_engine_path {
            settings.alternate_engine_path = path;
            applied.push("alternateEnginePath");
        }
        if let Some(path) = update.pre_cue_path {
            settings.pre_cue_path = path;
            applied.push("preCuePath");
        }
        if let Some(path) = update.post_cue_path {
            settings.post_cue_path = path;
            applied.push("postCuePath");
        }
        if let Some(mode) = update.speech_mode {
            settings.speech_mode = mode;
            applied.push("speechMode");
        }

        applied
    }
}
