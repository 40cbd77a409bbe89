//! Subcommands.

use std::net::IpAddr;

use clap::Subcommand;
use spoke_axum::bootstrap::DEFAULT_PORT;
use spoke_voice::DEFAULT_QUEUE_CAPACITY;

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to bind
        #[arg(long, env = "SPOKE_HOST", default_value = "127.0.0.1")]
        host: IpAddr,

        /// Port to listen on
        #[arg(short, long, env = "SPOKE_PORT", default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Maximum number of pending sentences
        #[arg(long = "queue-capacity", default_value_t = DEFAULT_QUEUE_CAPACITY)]
        queue_capacity: usize,

        /// Restrict CORS to these origins (repeatable; default allows all)
        #[arg(long = "allow-origin")]
        allowed_origins: Vec<String>,
    },

    /// Speak text and exit (reads stdin when no text is given)
    Say {
        /// Text to speak
        text: Vec<String>,

        /// Voice for this invocation only
        #[arg(long)]
        voice: Option<String>,

        /// Speed multiplier for this invocation only (0.5-2.0)
        #[arg(long)]
        speed: Option<f32>,

        /// Give up after this many seconds
        #[arg(long, default_value_t = 600)]
        timeout: u64,
    },
}
