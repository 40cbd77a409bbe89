//! Audio output via `rodio`.
//!
//! Playback is blocking: [`AudioOutput::play`] returns once the buffer has
//! drained, which keeps one sentence at a time on the device. The rodio
//! stream is not `Send`, so outputs are opened on the worker thread through
//! an [`OutputFactory`].

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use rodio::{OutputStream, OutputStreamHandle, Sink};

use crate::error::VoiceError;

/// A blocking audio sink.
pub trait AudioOutput {
    /// Play mono f32 samples and block until they finish.
    fn play(&mut self, samples: Vec<f32>, sample_rate: u32) -> Result<(), VoiceError>;

    /// Play a WAV cue file at `volume` and block until it finishes.
    fn play_cue(&mut self, path: &Path, volume: f32) -> Result<(), VoiceError>;
}

/// Opens an [`AudioOutput`] on the calling thread.
pub type OutputFactory = Box<dyn FnMut() -> Result<Box<dyn AudioOutput>, VoiceError> + Send>;

/// Scale samples by `volume`, clamping the result to `[-1.0, 1.0]`.
pub fn apply_volume(samples: &mut [f32], volume: f32) {
    if (volume - 1.0).abs() < f32::EPSILON {
        return;
    }
    for sample in samples {
        *sample = (*sample * volume).clamp(-1.0, 1.0);
    }
}

/// The default output device.
pub struct RodioOutput {
    /// rodio output stream (must be kept alive).
    _stream: OutputStream,

    /// Handle used to create sinks.
    handle: OutputStreamHandle,
}

impl RodioOutput {
    pub fn open() -> Result<Self, VoiceError> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| VoiceError::PlaybackFailure(e.to_string()))?;

        tracing::info!("Audio playback initialized on default output device");

        Ok(Self {
            _stream: stream,
            handle,
        })
    }

    fn sink(&self) -> Result<Sink, VoiceError> {
        Sink::try_new(&self.handle).map_err(|e| VoiceError::PlaybackFailure(e.to_string()))
    }
}

impl AudioOutput for RodioOutput {
    fn play(&mut self, samples: Vec<f32>, sample_rate: u32) -> Result<(), VoiceError> {
        if samples.is_empty() {
            return Ok(());
        }

        let sink = self.sink()?;
        sink.append(rodio::buffer::SamplesBuffer::new(1, sample_rate, samples));

        tracing::debug!(sample_rate, "Audio playback started");
        sink.sleep_until_end();
        tracing::debug!("Audio playback finished");
        Ok(())
    }

    fn play_cue(&mut self, path: &Path, volume: f32) -> Result<(), VoiceError> {
        let file = File::open(path)?;
        let source = rodio::Decoder::new(BufReader::new(file)).map_err(|e| {
            VoiceError::PlaybackFailure(format!("unreadable cue {}: {e}", path.display()))
        })?;

        let sink = self.sink()?;
        sink.set_volume(volume.clamp(0.0, 1.0));
        sink.append(source);
        sink.sleep_until_end();
        Ok(())
    }
}

/// Factory that opens the default rodio device.
pub fn rodio_output_factory() -> OutputFactory {
    Box::new(|| Ok(Box::new(RodioOutput::open()?) as Box<dyn AudioOutput>))
}
