//! The playback worker.
//!
//! A single consumer on a dedicated thread. It is the only code that
//! touches the audio output, so exactly one sentence plays at a time.
//!
//! ```text
//! dequeue → [muted or blank? skip] → pre-cue → duck → synthesize
//!         → volume → play (blocking) → unduck → post-cue → task_done
//! ```
//!
//! Failures inside a sentence are logged and the sentence is skipped. A
//! panic in an engine or the output is caught the same way, so the loop
//! keeps draining. The duck and the `speaking` flag are both held by guards,
//! so they unwind on every exit path.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::ducker::{DuckGuard, Ducker};
use crate::engine::{EngineRegistry, SynthesisEngine, lang_for_voice};
use crate::error::VoiceError;
use crate::playback::{AudioOutput, OutputFactory, apply_volume};
use crate::queue::WorkQueue;
use crate::segment::Sentence;
use crate::state::{RuntimeSettings, RuntimeState};

/// Name of the worker OS thread.
pub const WORKER_THREAD_NAME: &str = "spoke-playback";

/// Sets `speaking` for its lifetime.
struct SpeakingGuard<'a>(&'a RuntimeState);

impl<'a> SpeakingGuard<'a> {
    fn enter(state: &'a RuntimeState) -> Self {
        state.set_speaking(true);
        Self(state)
    }
}

impl Drop for SpeakingGuard<'_> {
    fn drop(&mut self) {
        self.0.set_speaking(false);
    }
}

pub(crate) struct PlaybackWorker {
    queue: Arc<WorkQueue>,
    state: Arc<RuntimeState>,
    engines: Arc<EngineRegistry>,
    ducker: Box<dyn Ducker>,
    open_output: OutputFactory,
    output: Option<Box<dyn AudioOutput>>,
    ready: Arc<AtomicBool>,
}

impl PlaybackWorker {
    pub(crate) fn new(
        queue: Arc<WorkQueue>,
        state: Arc<RuntimeState>,
        engines: Arc<EngineRegistry>,
        ducker: Box<dyn Ducker>,
        open_output: OutputFactory,
        ready: Arc<AtomicBool>,
    ) -> Self {
        Self {
            queue,
            state,
            engines,
            ducker,
            open_output,
            output: None,
            ready,
        }
    }

    /// Run until the queue is closed.
    pub(crate) fn run(mut self) {
        tracing::info!("Playback worker started");
        self.warm_up();

        while let Some(sentence) = self.queue.dequeue() {
            let handled = panic::catch_unwind(AssertUnwindSafe(|| self.handle(&sentence)));
            if let Err(payload) = handled {
                tracing::error!(
                    panic = panic_message(payload.as_ref()),
                    sentence = %sentence,
                    "Sentence panicked, skipping"
                );
                // The device may be mid-write; reopen it for the next sentence.
                self.output = None;
            }
            self.queue.task_done();
        }

        self.ready.store(false, Ordering::Release);
        tracing::info!("Playback worker stopped");
    }

    fn warm_up(&self) {
        match self.engines.primary() {
            Ok(_) => self.ready.store(true, Ordering::Release),
            Err(e) => tracing::warn!(error = %e, "Primary engine warm-up failed, retrying on demand"),
        }
    }

    fn handle(&mut self, sentence: &Sentence) {
        let settings = self.state.settings();

        if settings.muted {
            tracing::debug!(sentence = %sentence, "Muted, discarding sentence");
            return;
        }
        if sentence.trim().is_empty() {
            return;
        }

        if let Err(e) = self.speak(sentence, &settings) {
            tracing::warn!(
                error = %e,
                engine = %settings.active_engine,
                sentence = %sentence,
                "Skipping sentence"
            );
        }
    }

    fn speak(&mut self, sentence: &Sentence, settings: &RuntimeSettings) -> Result<(), VoiceError> {
        let engine = self
            .engines
            .resolve(settings.active_engine, settings.alternate_engine_path.as_deref())?;
        self.ready.store(true, Ordering::Release);

        if self.output.is_none() {
            self.output = Some((self.open_output)()?);
        }

        let state = Arc::clone(&self.state);
        let _speaking = SpeakingGuard::enter(&state);

        if let Some(cue) = &settings.pre_cue_path {
            self.play_cue(cue, settings.volume);
        }

        let played = {
            let _duck = DuckGuard::engage(self.ducker.as_ref());
            synthesize_and_play(&mut self.output, engine.as_ref(), sentence, settings)
        };

        if let Some(cue) = &settings.post_cue_path {
            self.play_cue(cue, settings.volume);
        }
        played
    }

    fn play_cue(&mut self, path: &Path, volume: f32) {
        let Some(output) = self.output.as_mut() else {
            return;
        };
        if let Err(e) = output.play_cue(path, volume) {
            tracing::warn!(cue = %path.display(), error = %e, "Failed to play cue");
        }
    }
}

fn synthesize_and_play(
    output: &mut Option<Box<dyn AudioOutput>>,
    engine: &dyn SynthesisEngine,
    sentence: &Sentence,
    settings: &RuntimeSettings,
) -> Result<(), VoiceError> {
    let lang = lang_for_voice(&settings.voice);
    let mut audio = engine.create(sentence, &settings.voice, settings.speed, lang)?;
    apply_volume(&mut audio.samples, settings.volume);

    tracing::debug!(
        engine = engine.name(),
        duration_ms = audio.duration.as_millis(),
        "Playing sentence"
    );

    let Some(device) = output.as_mut() else {
        return Err(VoiceError::PlaybackFailure("audio output not open".into()));
    };
    let played = device.play(audio.samples, audio.sample_rate);
    if played.is_err() {
        // Reopen the device for the next sentence.
        *output = None;
    }
    played
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
