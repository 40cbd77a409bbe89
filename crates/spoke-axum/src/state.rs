//! Shared application state type.

use std::sync::Arc;

use spoke_voice::SpeechService;

/// Application state shared across all handlers.
pub type AppState = Arc<SpeechService>;
