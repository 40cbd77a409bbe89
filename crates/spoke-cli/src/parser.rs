//! Main CLI parser and top-level argument handling.

use std::path::PathBuf;

use clap::{Args, Parser};
use spoke_voice::ducker::DEFAULT_DUCK_LEVEL;

use crate::bootstrap::PipelineConfig;
use crate::commands::Commands;

/// Command-line interface for spoke.
#[derive(Parser)]
#[command(name = "spoke")]
#[command(about = "Speak text aloud one sentence at a time")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command that runs the pipeline.
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    /// Kokoro model directory for the primary engine (needs the `sherpa` feature)
    #[arg(long = "model-dir", env = "SPOKE_MODEL_DIR", global = true)]
    pub model_dir: Option<PathBuf>,

    /// Settings file (defaults to <config dir>/spoke/settings.json)
    #[arg(long = "state-file", env = "SPOKE_STATE_FILE", global = true)]
    pub state_file: Option<PathBuf>,

    /// Volume other applications are lowered to while speaking (0.0-1.0)
    #[arg(long = "duck-level", env = "SPOKE_DUCK_LEVEL", default_value_t = DEFAULT_DUCK_LEVEL, global = true)]
    pub duck_level: f32,

    /// Leave other applications' volume alone
    #[arg(long = "no-duck", global = true)]
    pub no_duck: bool,
}

impl PipelineArgs {
    pub fn config(&self, queue_capacity: usize) -> PipelineConfig {
        PipelineConfig {
            model_dir: self.model_dir.clone(),
            state_file: self.state_file.clone(),
            duck: !self.no_duck,
            duck_level: self.duck_level,
            queue_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::parse_from(["spoke", "serve"]);
        let Commands::Serve {
            host,
            port,
            queue_capacity,
            ..
        } = cli.command
        else {
            panic!("expected serve");
        };
        assert_eq!(host.to_string(), "127.0.0.1");
        assert_eq!(port, 5111);
        assert_eq!(queue_capacity, 10);
        assert!(!cli.pipeline.no_duck);
        assert!((cli.pipeline.duck_level - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_global_args_after_subcommand() {
        let cli = Cli::parse_from([
            "spoke",
            "say",
            "--no-duck",
            "--state-file",
            "/tmp/spoke.json",
            "Hello",
            "world.",
        ]);
        assert!(cli.pipeline.no_duck);
        assert_eq!(cli.pipeline.state_file, Some(PathBuf::from("/tmp/spoke.json")));

        let Commands::Say { text, .. } = cli.command else {
            panic!("expected say");
        };
        assert_eq!(text, ["Hello", "world."]);
    }

    #[test]
    fn test_pipeline_config() {
        let cli = Cli::parse_from(["spoke", "--no-duck", "--duck-level", "0.5", "serve"]);
        let config = cli.pipeline.config(4);
        assert!(!config.duck);
        assert!((config.duck_level - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.queue_capacity, 4);
    }
}
