//! espeak-ng primary engine.
//!
//! Runs the `espeak-ng` CLI once per sentence, feeding the text on stdin and
//! writing a WAV file that is decoded with rodio. Kokoro voice ids are
//! mapped onto espeak languages and gender variants (`bm_george` becomes
//! `en-gb+m3`) so one voice setting works for every primary backend.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use rodio::Source;

use super::{SynthesisEngine, TtsAudio, VoiceGender, feed_and_wait, gender_for_voice};
use crate::error::VoiceError;

const ENGINE: &str = "espeak-ng";

/// Overrides PATH lookup of the espeak-ng binary.
pub const ESPEAK_BIN_ENV: &str = "SPOKE_ESPEAK_BIN";

/// espeak-ng's rate at speed 1.0.
const BASE_WORDS_PER_MINUTE: f32 = 175.0;

/// espeak-ng output sample rate.
pub const ESPEAK_SAMPLE_RATE: u32 = 22_050;

/// Primary engine backed by the espeak-ng command-line synthesizer.
#[derive(Debug, Clone)]
pub struct EspeakEngine {
    binary: PathBuf,
}

impl EspeakEngine {
    /// Find espeak-ng via `SPOKE_ESPEAK_BIN`, then `espeak-ng` or `espeak`
    /// on PATH.
    pub fn locate() -> Result<Self, VoiceError> {
        let binary = std::env::var_os(ESPEAK_BIN_ENV)
            .map(PathBuf::from)
            .or_else(|| which::which("espeak-ng").ok())
            .or_else(|| which::which("espeak").ok())
            .ok_or_else(|| {
                VoiceError::unavailable(ENGINE, "espeak-ng not found on PATH (install espeak-ng)")
            })?;

        tracing::debug!(binary = %binary.display(), "Found espeak-ng");
        Ok(Self::with_binary(binary))
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl SynthesisEngine for EspeakEngine {
    fn name(&self) -> &'static str {
        ENGINE
    }

    fn create(
        &self,
        text: &str,
        voice: &str,
        speed: f32,
        lang: &str,
    ) -> Result<TtsAudio, VoiceError> {
        if text.trim().is_empty() {
            return Ok(TtsAudio::new(Vec::new(), ESPEAK_SAMPLE_RATE));
        }

        let wav = tempfile::Builder::new()
            .prefix("spoke-")
            .suffix(".wav")
            .tempfile()?;
        let espeak_voice = espeak_voice(voice, lang);

        tracing::debug!(
            text_len = text.len(),
            voice = %espeak_voice,
            speed,
            "Synthesizing speech (espeak-ng)"
        );

        let child = Command::new(&self.binary)
            .arg("-v")
            .arg(&espeak_voice)
            .arg("-s")
            .arg(words_per_minute(speed).to_string())
            .arg("-w")
            .arg(wav.path())
            .arg("--stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VoiceError::SynthesisFailure(format!("failed to start espeak-ng: {e}")))?;

        let output = feed_and_wait(child, text.as_bytes())?;
        if !output.status.success() {
            return Err(VoiceError::SynthesisFailure(format!(
                "espeak-ng exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        decode_wav(File::open(wav.path())?)
    }
}

/// espeak voice name for a Kokoro voice id, e.g. `en-us+f3`.
fn espeak_voice(voice: &str, lang: &str) -> String {
    let lang = match lang {
        "zh" => "cmn",
        other => other,
    };
    let variant = match gender_for_voice(voice) {
        VoiceGender::Male => "m3",
        VoiceGender::Female => "f3",
    };
    format!("{lang}+{variant}")
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn words_per_minute(speed: f32) -> u32 {
    (BASE_WORDS_PER_MINUTE * speed).round().clamp(80.0, 450.0) as u32
}

/// Decode a PCM WAV into mono f32 samples.
fn decode_wav(file: File) -> Result<TtsAudio, VoiceError> {
    let decoder = rodio::Decoder::new_wav(BufReader::new(file))
        .map_err(|e| VoiceError::SynthesisFailure(format!("unreadable espeak-ng WAV: {e}")))?;

    let sample_rate = decoder.sample_rate();
    let channels = usize::from(decoder.channels().max(1));
    let samples: Vec<f32> = decoder.convert_samples().collect();

    #[allow(clippy::cast_precision_loss)]
    let mono = if channels == 1 {
        samples
    } else {
        samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok(TtsAudio::new(mono, sample_rate))
}
