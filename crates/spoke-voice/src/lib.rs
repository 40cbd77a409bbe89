#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

pub mod ducker;
pub mod engine;
pub mod error;
pub mod persist;
pub mod playback;
pub mod queue;
pub mod segment;
pub mod service;
pub mod state;
pub mod text;
mod worker;

// Re-export key types for convenience
pub use ducker::{DuckGuard, Ducker, NoopDucker, PactlDucker, system_ducker};
pub use engine::{
    EngineFactory, EngineRegistry, LocalEngineFactory, SynthesisEngine, TtsAudio, VoiceInfo,
};
pub use error::VoiceError;
pub use persist::{JsonFileStore, StatePersister};
pub use playback::{AudioOutput, OutputFactory, rodio_output_factory};
pub use queue::{DEFAULT_QUEUE_CAPACITY, EnqueueReport, WorkQueue};
pub use segment::{Sentence, segment};
pub use service::{SpeechService, SpeechServiceBuilder, StopReport, SubmitReport};
pub use state::{
    EngineKind, RuntimeSettings, RuntimeSnapshot, SpeechMode, StateUpdate, validate_settings,
};
pub use text::normalize;
