//! HTTP handlers.

pub mod speech;
