//! Mock engine, ducker and audio output that record into a shared [`Log`].

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use spoke_voice::{
    AudioOutput, Ducker, EngineFactory, OutputFactory, SpeechService, SpeechServiceBuilder,
    SynthesisEngine, TtsAudio, VoiceError,
};

/// Amplitude of every mock-synthesized sample.
pub const MOCK_AMPLITUDE: f32 = 0.5;

/// Sentences containing this word fail synthesis.
pub const FAIL_WORD: &str = "broken";

/// Sentences containing this word panic inside the engine.
pub const PANIC_WORD: &str = "explodes";

pub const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Synth {
        engine: &'static str,
        text: String,
        voice: String,
        lang: String,
    },
    Duck,
    Unduck,
    Play {
        peak: f32,
    },
    Cue(String),
    OutputOpened,
}

impl Event {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Synth { .. } => "synth",
            Self::Duck => "duck",
            Self::Unduck => "unduck",
            Self::Play { .. } => "play",
            Self::Cue(_) => "cue",
            Self::OutputOpened => "open",
        }
    }
}

/// Shared, ordered event log.
#[derive(Debug, Clone, Default)]
pub struct Log(Arc<Mutex<Vec<Event>>>);

impl Log {
    pub fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    /// Event kinds in order, ignoring output opens.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events()
            .iter()
            .map(Event::kind)
            .filter(|kind| *kind != "open")
            .collect()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.events().iter().filter(|e| e.kind() == kind).count()
    }

    /// `(engine, text)` for every synthesis call.
    pub fn synthesized(&self) -> Vec<(&'static str, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Synth { engine, text, .. } => Some((engine, text)),
                _ => None,
            })
            .collect()
    }

    pub fn peaks(&self) -> Vec<f32> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Play { peak } => Some(peak),
                _ => None,
            })
            .collect()
    }
}

/// Poll `condition` until it holds or [`TIMEOUT`] passes.
pub fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

// ── Gate ───────────────────────────────────────────────────────────

/// Blocks playback while closed.
#[derive(Debug, Clone)]
pub struct Gate(Arc<(Mutex<bool>, Condvar)>);

impl Gate {
    pub fn closed() -> Self {
        Self(Arc::new((Mutex::new(false), Condvar::new())))
    }

    pub fn open(&self) {
        let (open, cvar) = &*self.0;
        *open.lock().unwrap() = true;
        cvar.notify_all();
    }

    fn wait(&self) {
        let (open, cvar) = &*self.0;
        let guard = open.lock().unwrap();
        drop(cvar.wait_while(guard, |open| !*open).unwrap());
    }
}

// ── Engines ────────────────────────────────────────────────────────

pub struct MockEngine {
    name: &'static str,
    log: Log,
}

impl SynthesisEngine for MockEngine {
    fn name(&self) -> &'static str {
        self.name
    }

    fn create(
        &self,
        text: &str,
        voice: &str,
        _speed: f32,
        lang: &str,
    ) -> Result<TtsAudio, VoiceError> {
        self.log.push(Event::Synth {
            engine: self.name,
            text: text.to_string(),
            voice: voice.to_string(),
            lang: lang.to_string(),
        });
        if text.contains(PANIC_WORD) {
            panic!("engine crashed on {text:?}");
        }
        if text.contains(FAIL_WORD) {
            return Err(VoiceError::SynthesisFailure(format!("cannot say {text:?}")));
        }
        Ok(TtsAudio::new(vec![MOCK_AMPLITUDE; 8], 16_000))
    }
}

/// Primary engine always loads (unless `primary_fails`); the alternate
/// loads for any existing file.
#[derive(Clone, Default)]
pub struct MockFactory {
    pub log: Log,
    pub primary_fails: bool,
    pub alternate_loads: Arc<AtomicUsize>,
}

impl EngineFactory for MockFactory {
    fn load_primary(&self) -> Result<Arc<dyn SynthesisEngine>, VoiceError> {
        if self.primary_fails {
            return Err(VoiceError::EngineUnavailable {
                engine: "primary".into(),
                reason: "model missing".into(),
            });
        }
        Ok(Arc::new(MockEngine {
            name: "primary",
            log: self.log.clone(),
        }))
    }

    fn load_alternate(&self, path: &Path) -> Result<Arc<dyn SynthesisEngine>, VoiceError> {
        if !path.is_file() {
            return Err(VoiceError::EngineUnavailable {
                engine: "alternate".into(),
                reason: format!("{} not found", path.display()),
            });
        }
        self.alternate_loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockEngine {
            name: "alternate",
            log: self.log.clone(),
        }))
    }
}

// ── Ducker ─────────────────────────────────────────────────────────

pub struct MockDucker {
    pub log: Log,
    pub fail: bool,
}

impl Ducker for MockDucker {
    fn duck(&self) -> Result<(), VoiceError> {
        self.log.push(Event::Duck);
        if self.fail {
            return Err(VoiceError::DuckingFailure("no audio server".into()));
        }
        Ok(())
    }

    fn unduck(&self) -> Result<(), VoiceError> {
        self.log.push(Event::Unduck);
        Ok(())
    }
}

// ── Output ─────────────────────────────────────────────────────────

/// Knobs shared between the test and every output the worker opens.
#[derive(Clone, Default)]
pub struct OutputControl {
    pub active: Arc<AtomicUsize>,
    pub max_active: Arc<AtomicUsize>,
    pub opened: Arc<AtomicUsize>,
    pub fail_next_play: Arc<AtomicBool>,
    pub play_delay: Option<Duration>,
    pub gate: Option<Gate>,
}

pub struct MockOutput {
    log: Log,
    control: OutputControl,
}

impl AudioOutput for MockOutput {
    fn play(&mut self, samples: Vec<f32>, _sample_rate: u32) -> Result<(), VoiceError> {
        let now = self.control.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.control.max_active.fetch_max(now, Ordering::SeqCst);

        self.log.push(Event::Play {
            peak: samples.iter().copied().fold(0.0, f32::max),
        });
        if let Some(gate) = &self.control.gate {
            gate.wait();
        }
        if let Some(delay) = self.control.play_delay {
            std::thread::sleep(delay);
        }

        self.control.active.fetch_sub(1, Ordering::SeqCst);
        if self.control.fail_next_play.swap(false, Ordering::SeqCst) {
            return Err(VoiceError::PlaybackFailure("device unplugged".into()));
        }
        Ok(())
    }

    fn play_cue(&mut self, path: &Path, _volume: f32) -> Result<(), VoiceError> {
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        self.log.push(Event::Cue(name.into_owned()));
        Ok(())
    }
}

pub fn mock_output(log: &Log, control: &OutputControl) -> OutputFactory {
    let log = log.clone();
    let control = control.clone();
    Box::new(move || {
        control.opened.fetch_add(1, Ordering::SeqCst);
        log.push(Event::OutputOpened);
        Ok(Box::new(MockOutput {
            log: log.clone(),
            control: control.clone(),
        }) as Box<dyn AudioOutput>)
    })
}

// ── Harness ────────────────────────────────────────────────────────

/// A service wired entirely to mocks.
pub struct Harness {
    pub log: Log,
    pub factory: MockFactory,
    pub control: OutputControl,
}

impl Harness {
    pub fn new() -> Self {
        let log = Log::default();
        Self {
            factory: MockFactory {
                log: log.clone(),
                ..MockFactory::default()
            },
            control: OutputControl::default(),
            log,
        }
    }

    #[must_use]
    pub fn with_gate(mut self, gate: &Gate) -> Self {
        self.control.gate = Some(gate.clone());
        self
    }

    #[must_use]
    pub fn with_play_delay(mut self, delay: Duration) -> Self {
        self.control.play_delay = Some(delay);
        self
    }

    pub fn builder(&self) -> SpeechServiceBuilder {
        SpeechService::builder(Box::new(self.factory.clone()))
            .ducker(Box::new(MockDucker {
                log: self.log.clone(),
                fail: false,
            }))
            .output(mock_output(&self.log, &self.control))
    }

    pub fn start(&self) -> SpeechService {
        self.builder().start().unwrap()
    }
}
