//! Synthesis engine abstraction.
//!
//! Every backend implements [`SynthesisEngine`]. The [`EngineRegistry`]
//! owns one lazily loaded handle per [`EngineKind`]: the primary is warmed
//! up when the worker starts, the alternate on first selection. Once a
//! handle loads it is kept for the process lifetime, and an alternate that
//! fails to load never affects the primary.
//!
//! ## Backends
//!
//! | Kind      | Module       | Engine                          |
//! |-----------|--------------|---------------------------------|
//! | Primary   | [`espeak`]   | `espeak-ng` subprocess          |
//! | Primary   | `sherpa`     | Kokoro via sherpa-onnx (feature `sherpa`) |
//! | Alternate | [`piper`]    | `piper` subprocess + voice model |

pub mod espeak;
pub mod piper;
#[cfg(feature = "sherpa")]
pub mod sherpa;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Output};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::VoiceError;
use crate::state::EngineKind;

// ── Shared types ───────────────────────────────────────────────────

/// Audio produced by synthesis.
#[derive(Debug, Clone)]
pub struct TtsAudio {
    /// Mono PCM f32 samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,

    /// Sample rate of the audio (e.g., 24 000 Hz for Kokoro).
    pub sample_rate: u32,

    pub duration: Duration,
}

impl TtsAudio {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let duration = if sample_rate > 0 {
            Duration::from_secs_f64(samples.len() as f64 / f64::from(sample_rate))
        } else {
            Duration::ZERO
        };

        Self {
            samples,
            sample_rate,
            duration,
        }
    }
}

/// Information about an available voice.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceInfo {
    /// Voice identifier (used in state updates).
    pub id: String,

    /// Human-readable display name.
    pub name: String,

    /// Language/accent category.
    pub category: String,

    pub gender: VoiceGender,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VoiceGender {
    Female,
    Male,
}

// ── Engine traits ──────────────────────────────────────────────────

/// A text-to-speech backend.
///
/// `create` is blocking; it runs on the playback worker thread.
pub trait SynthesisEngine: Send + Sync {
    /// Short backend name for logs and errors.
    fn name(&self) -> &'static str;

    /// Synthesize one sentence.
    ///
    /// `lang` is an espeak-style language code (`"en-us"`), see
    /// [`lang_for_voice`].
    fn create(&self, text: &str, voice: &str, speed: f32, lang: &str)
    -> Result<TtsAudio, VoiceError>;
}

/// Builds engine handles on demand.
///
/// The composition root decides which concrete backends back each kind;
/// tests inject mocks here.
pub trait EngineFactory: Send + Sync {
    fn load_primary(&self) -> Result<Arc<dyn SynthesisEngine>, VoiceError>;

    /// Load the alternate engine from its configured model path.
    fn load_alternate(&self, path: &Path) -> Result<Arc<dyn SynthesisEngine>, VoiceError>;
}

/// Default backends: espeak-ng (or Kokoro with the `sherpa` feature and a
/// model directory) as primary, piper as alternate.
#[derive(Debug, Clone, Default)]
pub struct LocalEngineFactory {
    /// Kokoro model directory (`model.onnx`, `voices.bin`, `tokens.txt`,
    /// `espeak-ng-data/`).
    pub model_dir: Option<PathBuf>,
}

impl LocalEngineFactory {
    pub const fn new(model_dir: Option<PathBuf>) -> Self {
        Self { model_dir }
    }
}

impl EngineFactory for LocalEngineFactory {
    fn load_primary(&self) -> Result<Arc<dyn SynthesisEngine>, VoiceError> {
        match &self.model_dir {
            Some(dir) => load_kokoro(dir),
            None => Ok(Arc::new(espeak::EspeakEngine::locate()?)),
        }
    }

    fn load_alternate(&self, path: &Path) -> Result<Arc<dyn SynthesisEngine>, VoiceError> {
        Ok(Arc::new(piper::PiperEngine::load(path)?))
    }
}

#[cfg(feature = "sherpa")]
fn load_kokoro(dir: &Path) -> Result<Arc<dyn SynthesisEngine>, VoiceError> {
    Ok(Arc::new(sherpa::KokoroEngine::load(dir)?))
}

#[cfg(not(feature = "sherpa"))]
fn load_kokoro(dir: &Path) -> Result<Arc<dyn SynthesisEngine>, VoiceError> {
    tracing::warn!(
        dir = %dir.display(),
        "Model directory ignored: built without the 'sherpa' feature, using espeak-ng"
    );
    Ok(Arc::new(espeak::EspeakEngine::locate()?))
}

// ── Registry ───────────────────────────────────────────────────────

struct LoadedAlternate {
    path: PathBuf,
    engine: Arc<dyn SynthesisEngine>,
}

/// Lazily loaded engine handles, one per [`EngineKind`].
pub struct EngineRegistry {
    factory: Box<dyn EngineFactory>,
    primary: Mutex<Option<Arc<dyn SynthesisEngine>>>,
    alternate: Mutex<Option<LoadedAlternate>>,
}

impl EngineRegistry {
    pub fn new(factory: Box<dyn EngineFactory>) -> Self {
        Self {
            factory,
            primary: Mutex::new(None),
            alternate: Mutex::new(None),
        }
    }

    /// The primary engine, loading it on first use.
    ///
    /// A failed load is not cached; the next call retries.
    pub fn primary(&self) -> Result<Arc<dyn SynthesisEngine>, VoiceError> {
        let mut slot = lock(&self.primary);
        if let Some(engine) = slot.as_ref() {
            return Ok(Arc::clone(engine));
        }

        let engine = self.factory.load_primary()?;
        tracing::info!(engine = engine.name(), "Primary engine loaded");
        *slot = Some(Arc::clone(&engine));
        Ok(engine)
    }

    /// The alternate engine for `path`, loading it on first use or when the
    /// configured path changed.
    pub fn alternate(&self, path: Option<&Path>) -> Result<Arc<dyn SynthesisEngine>, VoiceError> {
        let Some(path) = path else {
            return Err(VoiceError::unavailable(
                EngineKind::Alternate.as_str(),
                "no alternate engine path configured",
            ));
        };

        let mut slot = lock(&self.alternate);
        if let Some(loaded) = slot.as_ref().filter(|loaded| loaded.path == path) {
            return Ok(Arc::clone(&loaded.engine));
        }

        let engine = self.factory.load_alternate(path).map_err(|e| match e {
            unavailable @ VoiceError::EngineUnavailable { .. } => unavailable,
            other => VoiceError::unavailable(EngineKind::Alternate.as_str(), other.to_string()),
        })?;
        tracing::info!(
            engine = engine.name(),
            path = %path.display(),
            "Alternate engine loaded"
        );
        *slot = Some(LoadedAlternate {
            path: path.to_path_buf(),
            engine: Arc::clone(&engine),
        });
        Ok(engine)
    }

    /// The engine that should synthesize the next sentence.
    pub fn resolve(
        &self,
        kind: EngineKind,
        alternate_path: Option<&Path>,
    ) -> Result<Arc<dyn SynthesisEngine>, VoiceError> {
        match kind {
            EngineKind::Primary => self.primary(),
            EngineKind::Alternate => self.alternate(alternate_path),
        }
    }

    pub fn is_loaded(&self, kind: EngineKind) -> bool {
        match kind {
            EngineKind::Primary => lock(&self.primary).is_some(),
            EngineKind::Alternate => lock(&self.alternate).is_some(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Write `input` to a spawned engine's stdin and collect its output.
///
/// If the write fails the child is killed and reaped before the error is
/// returned.
pub(crate) fn feed_and_wait(mut child: Child, input: &[u8]) -> Result<Output, VoiceError> {
    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(input) {
            drop(stdin);
            if let Err(kill) = child.kill() {
                tracing::debug!(error = %kill, "Engine process already exited");
            }
            if let Err(wait) = child.wait() {
                tracing::debug!(error = %wait, "Failed to reap engine process");
            }
            return Err(e.into());
        }
    }
    Ok(child.wait_with_output()?)
}

// ── Voices ─────────────────────────────────────────────────────────

/// espeak-style language code for a Kokoro voice id.
///
/// Kokoro ids encode language in their first letter (`af_sarah` is American
/// English, `bm_george` British English). Unknown prefixes fall back to
/// American English.
pub fn lang_for_voice(voice: &str) -> &'static str {
    match voice.chars().next() {
        Some('b') => "en-gb",
        Some('e') => "es",
        Some('f') => "fr",
        Some('h') => "hi",
        Some('i') => "it",
        Some('j') => "ja",
        Some('p') => "pt-br",
        Some('z') => "zh",
        _ => "en-us",
    }
}

/// Gender encoded in the second letter of a Kokoro voice id.
pub fn gender_for_voice(voice: &str) -> VoiceGender {
    match voice.chars().nth(1) {
        Some('m') => VoiceGender::Male,
        _ => VoiceGender::Female,
    }
}

fn voice_info(id: &str, name: &str, category: &str, gender: VoiceGender) -> VoiceInfo {
    VoiceInfo {
        id: id.to_string(),
        name: name.to_string(),
        category: category.to_string(),
        gender,
    }
}

/// The Kokoro English voice catalogue.
///
/// The espeak-ng primary maps the same ids onto its own language and
/// gender variants, so this list is valid for every primary backend.
pub fn kokoro_voices() -> Vec<VoiceInfo> {
    use VoiceGender::{Female, Male};

    [
        ("af", "Default", Female),
        ("af_bella", "Bella", Female),
        ("af_nicole", "Nicole", Female),
        ("af_sarah", "Sarah", Female),
        ("af_sky", "Sky", Female),
        ("am_adam", "Adam", Male),
        ("am_michael", "Michael", Male),
        ("bf_emma", "Emma", Female),
        ("bf_isabella", "Isabella", Female),
        ("bm_george", "George", Male),
        ("bm_lewis", "Lewis", Male),
    ]
    .into_iter()
    .map(|(id, name, gender)| {
        let category = if id.starts_with('b') {
            "British English"
        } else {
            "American English"
        };
        voice_info(id, name, category, gender)
    })
    .collect()
}

/// Little-endian signed 16-bit PCM to f32 samples.
pub(crate) fn pcm16_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32_768.0)
        .collect()
}
