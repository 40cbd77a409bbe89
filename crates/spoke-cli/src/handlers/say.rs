//! Say command handler.
//!
//! Runs the pipeline in-process, speaks the text and exits once the worker
//! is idle. Voice and speed overrides apply to this invocation only.

use std::io::{IsTerminal, Read};
use std::time::Duration;

use anyhow::{Result, bail};
use spoke_voice::{StateUpdate, normalize, segment};

use crate::bootstrap::{Persistence, PipelineConfig, start_service};

pub struct SayArgs {
    pub text: Vec<String>,
    pub voice: Option<String>,
    pub speed: Option<f32>,
    pub timeout: Duration,
}

/// Execute the say command. Blocks until speech finishes.
pub fn execute(mut pipeline: PipelineConfig, args: SayArgs) -> Result<()> {
    let text = input_text(args.text)?;

    // Size the queue to the input so nothing is dropped.
    pipeline.queue_capacity = segment(&normalize(&text)).len().max(1);
    let service = start_service(&pipeline, Persistence::ReadOnly)?;

    let update = StateUpdate {
        voice: args.voice,
        speed: args.speed,
        ..StateUpdate::default()
    };
    if !update.is_empty() {
        service.update_state(update)?;
    }

    let report = service.submit(&text);
    if report.accepted == 0 {
        println!("Nothing to say.");
        return Ok(());
    }
    tracing::info!(sentences = report.accepted, "Speaking");

    if !service.wait_idle(args.timeout) {
        bail!("Timed out after {}s", args.timeout.as_secs());
    }
    service.shutdown();
    Ok(())
}

fn input_text(args: Vec<String>) -> Result<String> {
    if !args.is_empty() {
        return Ok(args.join(" "));
    }

    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        bail!("No text given. Pass text as arguments or pipe it on stdin.");
    }
    let mut text = String::new();
    stdin.read_to_string(&mut text)?;
    Ok(text)
}
