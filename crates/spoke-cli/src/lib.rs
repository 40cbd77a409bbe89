#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

use tracing_subscriber as _; // Used by main.rs binary

pub mod bootstrap;
pub mod commands;
pub mod handlers;
pub mod parser;

// Re-export primary types for convenient access
pub use bootstrap::{PipelineConfig, start_service};
pub use commands::Commands;
pub use parser::Cli;
