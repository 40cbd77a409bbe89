//! A `SpeechService` wired to silent mocks for route tests.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use spoke_voice::{
    AudioOutput, EngineFactory, SpeechService, SynthesisEngine, TtsAudio, VoiceError,
};

struct SilentEngine;

impl SynthesisEngine for SilentEngine {
    fn name(&self) -> &'static str {
        "silent"
    }

    fn create(&self, _: &str, _: &str, _: f32, _: &str) -> Result<TtsAudio, VoiceError> {
        Ok(TtsAudio::new(vec![0.0; 160], 16_000))
    }
}

struct MockFactory {
    primary_fails: bool,
}

impl EngineFactory for MockFactory {
    fn load_primary(&self) -> Result<Arc<dyn SynthesisEngine>, VoiceError> {
        if self.primary_fails {
            return Err(VoiceError::EngineUnavailable {
                engine: "primary".into(),
                reason: "model missing".into(),
            });
        }
        Ok(Arc::new(SilentEngine))
    }

    fn load_alternate(&self, path: &Path) -> Result<Arc<dyn SynthesisEngine>, VoiceError> {
        Err(VoiceError::EngineUnavailable {
            engine: "alternate".into(),
            reason: format!("cannot load {}", path.display()),
        })
    }
}

struct NullOutput;

impl AudioOutput for NullOutput {
    fn play(&mut self, _: Vec<f32>, _: u32) -> Result<(), VoiceError> {
        Ok(())
    }

    fn play_cue(&mut self, _: &Path, _: f32) -> Result<(), VoiceError> {
        Ok(())
    }
}

pub fn service(primary_fails: bool) -> Arc<SpeechService> {
    let service = SpeechService::builder(Box::new(MockFactory { primary_fails }))
        .output(Box::new(|| Ok(Box::new(NullOutput) as Box<dyn AudioOutput>)))
        .start()
        .unwrap();
    Arc::new(service)
}

/// A service whose worker has finished warming up.
pub async fn ready_service() -> Arc<SpeechService> {
    let service = service(false);
    for _ in 0..500 {
        if service.is_ready() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(service.is_ready(), "service never became ready");
    service
}
