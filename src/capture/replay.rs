//! Recorded frame streams on disk.
//!
//! A recording is a JSON Lines file with one frame per line. A line is either
//! an object with a timestamp and values, or a bare array of values:
//!
//! ```text
//! {"t": "2024-05-01T12:00:00.016Z", "values": [0.91, 0.12]}
//! [0.90, 0.14]
//! ```
//!
//! Lines without a timestamp are placed one nominal frame interval after the
//! previous frame, starting at the Unix epoch. Blank lines and lines starting
//! with `#` are skipped.

use crate::capture::feed::{FeedError, FrameSender};
use crate::capture::types::{FrameSample, Recording};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Errors reading or writing recordings.
#[derive(Debug, thiserror::Error)]
pub enum RecordingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },
    #[error("frame rate must be positive, got {0}")]
    FrameRate(f64),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordedLine {
    Bare(Vec<f64>),
    Stamped {
        #[serde(default)]
        t: Option<DateTime<Utc>>,
        values: Vec<f64>,
    },
}

/// Parse a recording, synthesizing missing timestamps at `frame_rate`.
pub fn parse_recording<R: BufRead>(reader: R, frame_rate: f64) -> Result<Recording, RecordingError> {
    if !(frame_rate.is_finite() && frame_rate > 0.0) {
        return Err(RecordingError::FrameRate(frame_rate));
    }
    let interval = Duration::microseconds((1_000_000.0 / frame_rate).round() as i64);

    let mut frames: Vec<FrameSample> = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let parsed: RecordedLine =
            serde_json::from_str(trimmed).map_err(|source| RecordingError::Parse {
                line: number + 1,
                source,
            })?;
        let (stamp, values) = match parsed {
            RecordedLine::Bare(values) => (None, values),
            RecordedLine::Stamped { t, values } => (t, values),
        };
        let timestamp = stamp.unwrap_or_else(|| match frames.last() {
            Some(previous) => previous.timestamp + interval,
            None => DateTime::<Utc>::UNIX_EPOCH,
        });
        frames.push(FrameSample::new(values, timestamp));
    }

    tracing::debug!(frames = frames.len(), "recording parsed");
    Ok(Recording::new(frames))
}

/// Load a recording from a JSON Lines file.
pub fn load_recording(path: &Path, frame_rate: f64) -> Result<Recording, RecordingError> {
    let file = std::fs::File::open(path)?;
    parse_recording(BufReader::new(file), frame_rate)
}

/// Write a recording as JSON Lines with explicit timestamps.
pub fn save_recording(path: &Path, recording: &Recording) -> Result<(), RecordingError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    for (number, frame) in recording.frames.iter().enumerate() {
        let line = serde_json::to_string(frame).map_err(|source| RecordingError::Parse {
            line: number + 1,
            source,
        })?;
        writeln!(file, "{line}")?;
    }
    file.flush()?;
    Ok(())
}

/// Play a recording into a feed from a background thread.
///
/// With `paced` set, consecutive frames are sent as far apart as their
/// timestamps. A full queue is waited on rather than dropping frames. The
/// thread stops early when `running` is cleared or the feed is stopped, and
/// returns how many frames it sent.
pub fn spawn_replay(
    recording: Recording,
    sender: FrameSender,
    paced: bool,
    running: Arc<AtomicBool>,
) -> JoinHandle<usize> {
    thread::spawn(move || {
        let mut sent = 0;
        let mut previous: Option<DateTime<Utc>> = None;
        for frame in recording.frames {
            if !running.load(Ordering::SeqCst) {
                break;
            }
            if paced {
                if let Some(gap) = previous.and_then(|p| (frame.timestamp - p).to_std().ok()) {
                    thread::sleep(gap);
                }
                previous = Some(frame.timestamp);
            }
            if let Err(e) = send_blocking(&sender, frame, &running) {
                tracing::debug!(error = %e, "replay stopped");
                break;
            }
            sent += 1;
        }
        sent
    })
}

/// Send a frame, waiting for queue space instead of dropping it.
fn send_blocking(
    sender: &FrameSender,
    frame: FrameSample,
    running: &AtomicBool,
) -> Result<(), FeedError> {
    loop {
        match sender.send(frame.clone()) {
            Err(FeedError::Full) if running.load(Ordering::SeqCst) => {
                thread::sleep(std::time::Duration::from_millis(1));
            }
            other => return other,
        }
    }
}
