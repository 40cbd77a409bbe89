//! Piper alternate engine.
//!
//! The alternate engine path points at a Piper voice model (`*.onnx`).
//! Its sibling `<model>.onnx.json` supplies the output sample rate. Each
//! sentence runs `piper --output_raw`, which streams 16-bit little-endian
//! mono PCM on stdout.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Deserialize;

use super::{SynthesisEngine, TtsAudio, feed_and_wait, pcm16_to_f32};
use crate::error::VoiceError;

const ENGINE: &str = "piper";

/// Overrides PATH lookup of the piper binary.
pub const PIPER_BIN_ENV: &str = "SPOKE_PIPER_BIN";

/// Sample rate assumed when the model has no JSON config.
const DEFAULT_SAMPLE_RATE: u32 = 22_050;

#[derive(Debug, Default, Deserialize)]
struct PiperConfig {
    #[serde(default)]
    audio: PiperAudio,
}

#[derive(Debug, Deserialize)]
struct PiperAudio {
    sample_rate: u32,
}

impl Default for PiperAudio {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

/// Alternate engine backed by the piper CLI and one voice model.
#[derive(Debug, Clone)]
pub struct PiperEngine {
    binary: PathBuf,
    model: PathBuf,
    sample_rate: u32,
}

impl PiperEngine {
    /// Load a voice model, finding piper via `SPOKE_PIPER_BIN` or PATH.
    pub fn load(model: &Path) -> Result<Self, VoiceError> {
        let binary = std::env::var_os(PIPER_BIN_ENV)
            .map(PathBuf::from)
            .or_else(|| which::which("piper").ok())
            .ok_or_else(|| VoiceError::unavailable(ENGINE, "piper not found on PATH"))?;

        Self::with_binary(binary, model)
    }

    pub fn with_binary(binary: impl Into<PathBuf>, model: &Path) -> Result<Self, VoiceError> {
        if !model.is_file() {
            return Err(VoiceError::unavailable(
                ENGINE,
                format!("voice model not found: {}", model.display()),
            ));
        }

        let sample_rate = read_sample_rate(model)?;
        tracing::debug!(model = %model.display(), sample_rate, "Piper voice model ready");

        Ok(Self {
            binary: binary.into(),
            model: model.to_path_buf(),
            sample_rate,
        })
    }

    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl SynthesisEngine for PiperEngine {
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
        if text.trim().is_empty() {
            return Ok(TtsAudio::new(Vec::new(), self.sample_rate));
        }

        // The model fixes the voice; the setting only matters for the primary.
        tracing::debug!(
            text_len = text.len(),
            model = %self.model.display(),
            requested_voice = %voice,
            speed,
            "Synthesizing speech (piper)"
        );

        let child = Command::new(&self.binary)
            .arg("--model")
            .arg(&self.model)
            .arg("--output_raw")
            .arg("--length_scale")
            .arg(format!("{:.3}", 1.0 / speed.max(0.1)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VoiceError::SynthesisFailure(format!("failed to start piper: {e}")))?;

        let output = feed_and_wait(child, format!("{text}\n").as_bytes())?;
        if !output.status.success() {
            return Err(VoiceError::SynthesisFailure(format!(
                "piper exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(TtsAudio::new(pcm16_to_f32(&output.stdout), self.sample_rate))
    }
}

/// Sample rate from `<model>.json`, or the piper default when absent.
fn read_sample_rate(model: &Path) -> Result<u32, VoiceError> {
    let mut config_path = OsString::from(model.as_os_str());
    config_path.push(".json");
    let config_path = PathBuf::from(config_path);

    if !config_path.is_file() {
        tracing::warn!(
            config = %config_path.display(),
            "Piper model config missing, assuming {DEFAULT_SAMPLE_RATE} Hz"
        );
        return Ok(DEFAULT_SAMPLE_RATE);
    }

    let content = std::fs::read_to_string(&config_path)?;
    let config: PiperConfig = serde_json::from_str(&content).map_err(|e| {
        VoiceError::unavailable(ENGINE, format!("invalid {}: {e}", config_path.display()))
    })?;
    Ok(config.audio.sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_with_config(config: Option<&str>) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("en_US-amy-medium.onnx");
        std::fs::write(&model, b"onnx").unwrap();
        if let Some(config) = config {
            std::fs::write(dir.path().join("en_US-amy-medium.onnx.json"), config).unwrap();
        }
        (dir, model)
    }

    #[test]
    fn sample_rate_comes_from_model_config() {
        let (_dir, model) =
            model_with_config(Some(r#"{"audio":{"sample_rate":16000,"quality":"low"}}"#));
        let engine = PiperEngine::with_binary("/usr/bin/piper", &model).unwrap();
        assert_eq!(engine.sample_rate(), 16_000);
    }

    #[test]
    fn missing_config_uses_default_rate() {
        let (_dir, model) = model_with_config(None);
        let engine = PiperEngine::with_binary("/usr/bin/piper", &model).unwrap();
        assert_eq!(engine.sample_rate(), DEFAULT_SAMPLE_RATE);
    }

    #[test]
    fn malformed_config_is_unavailable() {
        let (_dir, model) = model_with_config(Some("not json"));
        let err = PiperEngine::with_binary("/usr/bin/piper", &model).unwrap_err();
        assert!(matches!(err, VoiceError::EngineUnavailable { .. }));
    }

    #[test]
    fn missing_model_is_unavailable() {
        let err = PiperEngine::with_binary("/usr/bin/piper", Path::new("/nonexistent/voice.onnx"))
            .unwrap_err();
        assert!(matches!(err, VoiceError::EngineUnavailable { .. }));
    }

    #[test]
    fn missing_binary_is_a_synthesis_failure() {
        let (_dir, model) = model_with_config(None);
        let engine = PiperEngine::with_binary("/nonexistent/piper", &model).unwrap();
        let err = engine.create("Hello.", "af_sarah", 1.0, "en-us").unwrap_err();
        assert!(matches!(err, VoiceError::SynthesisFailure(_)));
    }
}
