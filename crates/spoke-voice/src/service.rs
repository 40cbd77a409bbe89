//! `SpeechService`, the facade every front-end talks to.
//!
//! Owns the shared runtime state, the queue, the engine registry and the
//! playback worker thread. All methods take `&self` and are safe to call
//! from any thread; only `update_state` may block, while it loads an
//! alternate engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use serde::Serialize;

use crate::ducker::{Ducker, NoopDucker};
use crate::engine::{EngineFactory, EngineRegistry, VoiceInfo, kokoro_voices};
use crate::error::VoiceError;
use crate::persist::StatePersister;
use crate::playback::{OutputFactory, rodio_output_factory};
use crate::queue::{DEFAULT_QUEUE_CAPACITY, EnqueueReport, WorkQueue};
use crate::segment::segment;
use crate::state::{
    EngineKind, RuntimeSettings, RuntimeSnapshot, RuntimeState, StateUpdate, validate_settings,
    validate_update,
};
use crate::text::normalize;
use crate::worker::{PlaybackWorker, WORKER_THREAD_NAME};

/// Result of [`SpeechService::submit`].
pub type SubmitReport = EnqueueReport;

/// Result of [`SpeechService::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopReport {
    pub queue_cleared: bool,

    /// Pending sentences that were discarded.
    pub cleared: usize,
}

/// Configures and starts a [`SpeechService`].
pub struct SpeechServiceBuilder {
    factory: Box<dyn EngineFactory>,
    settings: Option<RuntimeSettings>,
    queue_capacity: usize,
    ducker: Box<dyn Ducker>,
    open_output: OutputFactory,
    persister: Option<Arc<dyn StatePersister>>,
    voices: Vec<VoiceInfo>,
}

impl SpeechServiceBuilder {
    /// Initial settings. Without this, settings come from the persister or
    /// defaults.
    #[must_use]
    pub fn settings(mut self, settings: RuntimeSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    #[must_use]
    pub fn ducker(mut self, ducker: Box<dyn Ducker>) -> Self {
        self.ducker = ducker;
        self
    }

    #[must_use]
    pub fn output(mut self, open_output: OutputFactory) -> Self {
        self.open_output = open_output;
        self
    }

    #[must_use]
    pub fn persister(mut self, persister: Arc<dyn StatePersister>) -> Self {
        self.persister = Some(persister);
        self
    }

    #[must_use]
    pub fn voices(mut self, voices: Vec<VoiceInfo>) -> Self {
        self.voices = voices;
        self
    }

    /// Spawn the playback worker and return the running service.
    pub fn start(self) -> Result<SpeechService, VoiceError> {
        let settings = match self.settings {
            Some(settings) => {
                validate_settings(&settings)?;
                settings
            }
            None => load_settings(self.persister.as_deref()),
        };

        let state = Arc::new(RuntimeState::new(settings));
        let queue = Arc::new(WorkQueue::new(self.queue_capacity));
        let engines = Arc::new(EngineRegistry::new(self.factory));
        let ready = Arc::new(AtomicBool::new(false));

        let (worker_queue, worker_state, worker_engines, worker_ready) = (
            Arc::clone(&queue),
            Arc::clone(&state),
            Arc::clone(&engines),
            Arc::clone(&ready),
        );
        let (ducker, open_output) = (self.ducker, self.open_output);
        let handle = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                PlaybackWorker::new(
                    worker_queue,
                    worker_state,
                    worker_engines,
                    ducker,
                    open_output,
                    worker_ready,
                )
                .run();
            })?;

        tracing::info!(capacity = queue.capacity(), "Speech service started");

        Ok(SpeechService {
            state,
            queue,
            engines,
            ready,
            persister: self.persister,
            voices: self.voices,
            worker: Mutex::new(Some(handle)),
            update_lock: Mutex::new(()),
        })
    }
}

fn load_settings(persister: Option<&dyn StatePersister>) -> RuntimeSettings {
    let Some(persister) = persister else {
        return RuntimeSettings::default();
    };
    match persister.load() {
        Ok(Some(settings)) => match validate_settings(&settings) {
            Ok(()) => {
                tracing::info!("Restored saved settings");
                settings
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring out-of-range saved settings");
                RuntimeSettings::default()
            }
        },
        Ok(None) => RuntimeSettings::default(),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unreadable saved settings");
            RuntimeSettings::default()
        }
    }
}

/// The running speech pipeline.
pub struct SpeechService {
    state: Arc<RuntimeState>,
    queue: Arc<WorkQueue>,
    engines: Arc<EngineRegistry>,
    ready: Arc<AtomicBool>,
    persister: Option<Arc<dyn StatePersister>>,
    voices: Vec<VoiceInfo>,
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Serializes validate, preload and apply across configuration callers.
    update_lock: Mutex<()>,
}

impl SpeechService {
    pub fn builder(factory: Box<dyn EngineFactory>) -> SpeechServiceBuilder {
        SpeechServiceBuilder {
            factory,
            settings: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            ducker: Box::new(NoopDucker),
            open_output: rodio_output_factory(),
            persister: None,
            voices: kokoro_voices(),
        }
    }

    /// Normalize, segment and enqueue `raw`. Never blocks on playback.
    ///
    /// Sentences that do not fit in the queue are dropped and counted.
    pub fn submit(&self, raw: &str) -> SubmitReport {
        let text = normalize(raw);
        let report = self.queue.enqueue_batch(segment(&text));

        tracing::debug!(
            accepted = report.accepted,
            dropped = report.dropped,
            "Text submitted"
        );
        report
    }

    pub fn state(&self) -> RuntimeSnapshot {
        self.state.snapshot()
    }

    /// Validate and apply a partial update, returning the applied field
    /// names.
    ///
    /// Selecting the alternate engine (or changing its path while it is
    /// active) loads it first; if that fails nothing is applied.
    pub fn update_state(&self, update: StateUpdate) -> Result<Vec<&'static str>, VoiceError> {
        validate_update(&update)?;

        let _serial = lock(&self.update_lock);
        let current = self.state.settings();

        let engine = update.active_engine.unwrap_or(current.active_engine);
        let engine_changed =
            update.active_engine.is_some() || update.alternate_engine_path.is_some();
        if engine == EngineKind::Alternate && engine_changed {
            let path = update
                .alternate_engine_path
                .clone()
                .unwrap_or(current.alternate_engine_path);
            self.engines.alternate(path.as_deref())?;
        }

        let applied = self.state.apply(update);
        if !applied.is_empty() {
            tracing::info!(fields = ?applied, "Runtime state updated");
            self.persist();
        }
        Ok(applied)
    }

    fn persist(&self) {
        let Some(persister) = &self.persister else {
            return;
        };
        if let Err(e) = persister.save(&self.state.settings()) {
            tracing::warn!(error = %e, "Failed to persist settings");
        }
    }

    /// Discard pending sentences. The one currently playing finishes.
    pub fn stop(&self) -> StopReport {
        let cleared = self.queue.clear();
        tracing::info!(cleared, "Speech queue cleared");
        StopReport {
            queue_cleared: true,
            cleared,
        }
    }

    /// True once an engine has loaded and the worker is running.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire) && !self.queue.is_closed()
    }

    pub fn voices(&self) -> &[VoiceInfo] {
        &self.voices
    }

    /// Sentences waiting in the queue.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Block until the queue is drained and the worker is idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.queue.wait_idle(timeout)
    }

    /// Close the queue and join the worker after its current sentence.
    pub fn shutdown(&self) {
        self.queue.close();
        let handle = lock(&self.worker).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("Playback worker panicked");
            }
        }
    }
}

impl Drop for SpeechService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
