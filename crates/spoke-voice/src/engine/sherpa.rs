//! Kokoro primary engine via sherpa-onnx.
//!
//! Wraps `sherpa_rs::tts::KokoroTts`. Its `create` takes `&mut self`, so the
//! model sits behind a [`Mutex`]; only the playback worker synthesizes, so
//! the lock is uncontended in practice.

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use sherpa_rs::tts::{KokoroTts, KokoroTtsConfig};

use super::{SynthesisEngine, TtsAudio};
use crate::error::VoiceError;

const ENGINE: &str = "kokoro";

/// Speaker used for voice ids the model does not know.
const DEFAULT_SPEAKER_ID: i32 = 3;

/// Kokoro (v0.19 English) loaded through sherpa-onnx.
pub struct KokoroEngine {
    tts: Mutex<KokoroTts>,
}

impl KokoroEngine {
    /// Load the model from a directory containing `model.onnx`,
    /// `voices.bin`, `tokens.txt` and `espeak-ng-data/`.
    pub fn load(model_dir: &Path) -> Result<Self, VoiceError> {
        let model = model_dir.join("model.onnx");
        let voices = model_dir.join("voices.bin");
        let tokens = model_dir.join("tokens.txt");
        let data_dir = model_dir.join("espeak-ng-data");

        for path in [&model, &voices, &tokens, &data_dir] {
            if !path.exists() {
                return Err(VoiceError::unavailable(
                    ENGINE,
                    format!("missing model file {}", path.display()),
                ));
            }
        }

        tracing::info!(dir = %model_dir.display(), "Loading Kokoro TTS model");

        let config = KokoroTtsConfig {
            model: path_to_string(&model)?,
            voices: path_to_string(&voices)?,
            tokens: path_to_string(&tokens)?,
            data_dir: path_to_string(&data_dir)?,
            length_scale: 1.0,
            ..Default::default()
        };

        Ok(Self {
            tts: Mutex::new(KokoroTts::new(config)),
        })
    }
}

impl SynthesisEngine for KokoroEngine {
    fn name(&self) -> &'static str {
        ENGINE
    }

    fn create(
        &self,
        text: &str,
        voice: &str,
        speed: f32,
        _lang: &str,
    ) -> Result<TtsAudio, VoiceError> {
        let sid = speaker_id(voice).unwrap_or_else(|| {
            tracing::warn!(voice = %voice, "Unknown Kokoro voice, using default speaker");
            DEFAULT_SPEAKER_ID
        });

        tracing::debug!(text_len = text.len(), voice = %voice, sid, speed, "Synthesizing speech (Kokoro)");

        let audio = self
            .tts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .create(text, sid, speed)
            .map_err(|e| VoiceError::SynthesisFailure(e.to_string()))?;

        Ok(TtsAudio::new(audio.samples, audio.sample_rate))
    }
}

/// Speaker ids from the `speaker2id` metadata of `kokoro-en-v0_19`.
fn speaker_id(voice: &str) -> Option<i32> {
    let sid = match voice {
        "af" => 0,
        "af_bella" => 1,
        "af_nicole" => 2,
        "af_sarah" => 3,
        "af_sky" => 4,
        "am_adam" => 5,
        "am_michael" => 6,
        "bf_emma" => 7,
        "bf_isabella" => 8,
        "bm_george" => 9,
        "bm_lewis" => 10,
        _ => return None,
    };
    Some(sid)
}

fn path_to_string(path: &Path) -> Result<String, VoiceError> {
    path.to_str().map(ToString::to_string).ok_or_else(|| {
        VoiceError::unavailable(ENGINE, format!("invalid UTF-8 path: {}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_voices_have_speaker_ids() {
        for voice in crate::engine::kokoro_voices() {
            assert!(speaker_id(&voice.id).is_some(), "{} has no speaker id", voice.id);
        }
        assert_eq!(speaker_id("zz_unknown"), None);
    }

    #[test]
    fn missing_model_dir_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = KokoroEngine::load(dir.path()).err().unwrap();
        assert!(matches!(err, VoiceError::EngineUnavailable { .. }));
    }
}
