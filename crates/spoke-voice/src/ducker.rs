//! Audio ducking: lower other applications while a sentence plays.
//!
//! The worker never calls [`Ducker::duck`] directly; it holds a
//! [`DuckGuard`] for the span of synthesis and playback, and the guard's
//! `Drop` restores volumes on every exit path, including errors.

use std::path::PathBuf;
use std::process::Command;
use std::sync::{Mutex, PoisonError};

use serde::Deserialize;

use crate::error::VoiceError;

/// Attenuates and restores other audio sessions.
pub trait Ducker: Send {
    fn duck(&self) -> Result<(), VoiceError>;
    fn unduck(&self) -> Result<(), VoiceError>;
}

/// Scoped duck: ducks on creation, unducks on drop.
///
/// A failed duck is logged and the unduck still runs, so every duck
/// attempt is paired with exactly one restore.
pub struct DuckGuard<'a> {
    ducker: &'a dyn Ducker,
}

impl<'a> DuckGuard<'a> {
    pub fn engage(ducker: &'a dyn Ducker) -> Self {
        if let Err(e) = ducker.duck() {
            tracing::warn!(error = %e, "Failed to duck other audio");
        }
        Self { ducker }
    }
}

impl Drop for DuckGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.ducker.unduck() {
            tracing::warn!(error = %e, "Failed to restore ducked audio");
        }
    }
}

/// Ducker for platforms without session volume control, or when disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDucker;

impl Ducker for NoopDucker {
    fn duck(&self) -> Result<(), VoiceError> {
        Ok(())
    }

    fn unduck(&self) -> Result<(), VoiceError> {
        Ok(())
    }
}

/// Default attenuation applied to other streams (30% of their volume).
pub const DEFAULT_DUCK_LEVEL: f32 = 0.3;

// ── PulseAudio / PipeWire ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SinkInput {
    index: u32,
    #[serde(default)]
    properties: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    volume: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    channel_map: String,
}

/// A stream's index and per-channel raw volumes (65536 = 100%).
type Stream = (u32, Vec<u32>);

impl SinkInput {
    fn process_id(&self) -> Option<u32> {
        match self.properties.get("application.process.id")? {
            serde_json::Value::String(pid) => pid.parse().ok(),
            serde_json::Value::Number(pid) => pid.as_u64().and_then(|p| u32::try_from(p).ok()),
            _ => None,
        }
    }

    /// Raw channel volumes in `channel_map` order, which is the order
    /// `set-sink-input-volume` expects them.
    fn channel_volumes(&self) -> Option<Vec<u32>> {
        let raw = |channel: &serde_json::Value| -> Option<u32> {
            u32::try_from(channel.get("value")?.as_u64()?).ok()
        };

        let volumes: Option<Vec<u32>> = if self.channel_map.is_empty() {
            self.volume.values().map(raw).collect()
        } else {
            self.channel_map
                .split(',')
                .map(|name| self.volume.get(name.trim()).and_then(raw))
                .collect()
        };
        volumes.filter(|v| !v.is_empty())
    }
}

/// Parse `pactl --format=json list sink-inputs` output into
/// streams, skipping those owned by `own_pid`.
fn duckable_streams(json: &str, own_pid: u32) -> Result<Vec<Stream>, VoiceError> {
    let inputs: Vec<SinkInput> = serde_json::from_str(json)
        .map_err(|e| VoiceError::DuckingFailure(format!("unexpected pactl output: {e}")))?;

    Ok(inputs
        .into_iter()
        .filter(|input| input.process_id() != Some(own_pid))
        .filter_map(|input| Some((input.index, input.channel_volumes()?)))
        .collect())
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn scaled(raw: u32, level: f32) -> u32 {
    (raw as f32 * level.clamp(0.0, 1.0)).round() as u32
}

/// Ducks every other PulseAudio/PipeWire stream through `pactl`.
///
/// Original channel volumes are recorded on duck and written back on
/// unduck. A stream that cannot be set, usually because it vanished between
/// listing and ducking, is skipped.
#[derive(Debug)]
pub struct PactlDucker {
    binary: PathBuf,
    level: f32,
    ducked: Mutex<Vec<Stream>>,
}

impl PactlDucker {
    /// Find `pactl` on PATH. Returns `None` when it is not installed.
    pub fn detect(level: f32) -> Option<Self> {
        let binary = which::which("pactl").ok()?;
        tracing::debug!(binary = %binary.display(), level, "Using pactl for audio ducking");
        Some(Self {
            binary,
            level,
            ducked: Mutex::new(Vec::new()),
        })
    }

    fn pactl(&self, args: &[&str]) -> Result<String, VoiceError> {
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .map_err(|e| VoiceError::DuckingFailure(format!("failed to run pactl: {e}")))?;

        if !output.status.success() {
            return Err(VoiceError::DuckingFailure(format!(
                "pactl {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn set_volume(&self, index: u32, channels: &[u32]) -> Result<(), VoiceError> {
        let mut args = vec!["set-sink-input-volume".to_string(), index.to_string()];
        args.extend(channels.iter().map(u32::to_string));

        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.pactl(&args).map(drop)
    }
}

impl Ducker for PactlDucker {
    fn duck(&self) -> Result<(), VoiceError> {
        let mut ducked = self.ducked.lock().unwrap_or_else(PoisonError::into_inner);
        if !ducked.is_empty() {
            return Ok(());
        }

        let listing = self.pactl(&["--format=json", "list", "sink-inputs"])?;
        for (index, channels) in duckable_streams(&listing, std::process::id())? {
            let lowered: Vec<u32> = channels.iter().map(|&raw| scaled(raw, self.level)).collect();
            match self.set_volume(index, &lowered) {
                Ok(()) => ducked.push((index, channels)),
                Err(e) => tracing::debug!(index, error = %e, "Skipping stream"),
            }
        }

        tracing::debug!(streams = ducked.len(), "Ducked other audio");
        Ok(())
    }

    fn unduck(&self) -> Result<(), VoiceError> {
        let ducked = std::mem::take(
            &mut *self.ducked.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for (index, channels) in ducked {
            if let Err(e) = self.set_volume(index, &channels) {
                tracing::debug!(index, error = %e, "Stream gone before restore");
            }
        }
        Ok(())
    }
}

/// Platform ducker, or [`NoopDucker`] when `enabled` is false or `pactl`
/// is unavailable.
pub fn system_ducker(enabled: bool, level: f32) -> Box<dyn Ducker> {
    if !enabled {
        return Box::new(NoopDucker);
    }
    match PactlDucker::detect(level) {
        Some(ducker) => Box::new(ducker),
        None => {
            tracing::info!("pactl not found, audio ducking disabled");
            Box::new(NoopDucker)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"[
        {
            "index": 42,
            "properties": {"application.name": "Firefox", "application.process.id": "1000"},
            "channel_map": "front-left,front-right",
            "volume": {
                "front-left": {"value": 65536, "value_percent": "100%"},
                "front-right": {"value": 60000, "value_percent": "92%"}
            }
        },
        {
            "index": 43,
            "properties": {"application.process.id": "777"},
            "volume": {"mono": {"value": 32768, "value_percent": "50%"}}
        },
        {
            "index": 44,
            "properties": {},
            "volume": {"mono": {"value": 40000, "value_percent": "61%"}}
        }
    ]"#;

    #[test]
    fn own_streams_are_not_ducked() {
        let streams = duckable_streams(LISTING, 777).unwrap();
        assert_eq!(streams, [(42, vec![65_536, 60_000]), (44, vec![40_000])]);
    }

    #[test]
    fn garbage_listing_is_a_ducking_failure() {
        let err = duckable_streams("pactl: unknown option", 1).unwrap_err();
        assert!(matches!(err, VoiceError::DuckingFailure(_)));
    }

    #[test]
    fn scaling_clamps_level() {
        assert_eq!(scaled(65_536, 0.5), 32_768);
        assert_eq!(scaled(65_536, 2.0), 65_536);
        assert_eq!(scaled(65_536, -1.0), 0);
    }

    #[derive(Default)]
    struct Recording {
        events: Mutex<Vec<&'static str>>,
        fail_duck: bool,
    }

    impl Recording {
        fn push(&self, event: &'static str) {
            self.events.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<&'static str> {
            self.events.lock().unwrap().clone()
        }
    }

    impl Ducker for Recording {
        fn duck(&self) -> Result<(), VoiceError> {
            self.push("duck");
            if self.fail_duck {
                return Err(VoiceError::DuckingFailure("no server".into()));
            }
            Ok(())
        }

        fn unduck(&self) -> Result<(), VoiceError> {
            self.push("unduck");
            Ok(())
        }
    }

    #[test]
    fn guard_unducks_on_drop() {
        let ducker = Recording::default();
        {
            let _guard = DuckGuard::engage(&ducker);
            ducker.push("play");
        }
        assert_eq!(ducker.events(), ["duck", "play", "unduck"]);
    }

    #[test]
    fn guard_unducks_even_when_duck_fails() {
        let ducker = Recording {
            fail_duck: true,
            ..Recording::default()
        };
        drop(DuckGuard::engage(&ducker));
        assert_eq!(ducker.events(), ["duck", "unduck"]);
    }

    #[cfg(unix)]
    #[test]
    fn vanished_stream_is_skipped_and_balance_restored() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let listing = dir.path().join("listing.json");
        let calls = dir.path().join("calls");
        let script = dir.path().join("pactl");
        std::fs::write(&listing, LISTING).unwrap();
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\n\
                 echo \"$*\" >> '{calls}'\n\
                 case \"$*\" in\n\
                 *'list sink-inputs'*) cat '{listing}' ;;\n\
                 'set-sink-input-volume 43 '*) echo 'No such entity' >&2; exit 1 ;;\n\
                 esac\n",
                calls = calls.display(),
                listing = listing.display(),
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let ducker = PactlDucker {
            binary: script,
            level: 0.5,
            ducked: Mutex::new(Vec::new()),
        };
        ducker.duck().unwrap();
        ducker.unduck().unwrap();

        let calls = std::fs::read_to_string(calls).unwrap();
        let calls: Vec<&str> = calls.lines().collect();
        assert_eq!(
            calls,
            [
                "--format=json list sink-inputs",
                "set-sink-input-volume 42 32768 30000",
                "set-sink-input-volume 43 16384",
                "set-sink-input-volume 44 20000",
                "set-sink-input-volume 42 65536 60000",
                "set-sink-input-volume 44 40000",
            ]
        );
    }
}
