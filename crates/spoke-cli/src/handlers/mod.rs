//! Command handlers.

pub mod say;
pub mod serve;
