//! Demonstration of the delta history engine.
//!
//! This example shows how to:
//! 1. Declare features and groups
//! 2. Feed frames from a capture thread through a `CaptureFeed`
//! 3. Anchor a view and run windowed queries
//! 4. Pause a feature and watch recent frames read as NaN
//!
//! Run with: cargo run --example replay_demo

use chrono::{Duration as ChronoDuration, Utc};
use std::thread;

use delta_history::{
    capture::{CaptureFeed, FrameSample},
    core::{EngineConfig, FeatureRegistry, HistoryManager},
};

fn main() -> anyhow::Result<()> {
    println!("Delta History - Replay Demo");
    println!("===========================");
    println!();

    let registry = FeatureRegistry::builder()
        .feature("speed")
        .feature("altitude")
        .feature("fuel")
        .group("flight", ["speed", "altitude"])
        .build()?;
    let config = EngineConfig {
        capacity: 120,
        frame_rate: 30.0,
        default_window_ms: 250,
    };
    let manager = HistoryManager::new(registry, config)?;

    let mut feed = CaptureFeed::default();
    feed.start()?;
    let sender = feed.sender();

    // Synthetic capture thread: two seconds of frames at 30 fps
    let start = Utc::now();
    let capture = thread::spawn(move || {
        for i in 0..60 {
            let t = i as f64 / 30.0;
            let values = vec![100.0 + 20.0 * t, 1_000.0 + 50.0 * (t * 3.0).sin(), 80.0 - t];
            let at = start + ChronoDuration::milliseconds((i * 1000 / 30) as i64);
            if sender.send(FrameSample::new(values, at)).is_err() {
                break;
            }
        }
    });
    capture
        .join()
        .map_err(|_| anyhow::anyhow!("capture thread panicked"))?;

    let stored = feed.pump(&manager);
    println!("Stored {stored} frames");
    println!();

    let view = manager.view()?;
    let speed = view.feature("speed")?;
    let flight = view.feature("flight")?;

    println!("speed now:            {:.2}", speed.current()?);
    println!("speed 500ms ago:      {:.2}", speed.old(500)?);
    println!("speed delta (1s):     {:.2}", speed.delta(1_000)?);
    println!("speed stdev (1s):     {:.3}", speed.stdev(1_000)?);
    println!("flight max_min (1s):  {:.2}", flight.max_min(1_000)?);
    println!("flight min_max (1s):  {:.2}", flight.min_max(1_000)?);
    println!();

    // Pause fuel until 200ms past the current frame
    let fuel = view.feature("fuel")?;
    fuel.pause(200)?;
    println!("fuel paused:          {}", fuel.is_paused()?);
    println!("fuel now (masked):    {}", fuel.current()?);

    fuel.resume(0)?;
    println!("fuel after resume:    {:.2}", fuel.current()?);
    println!();

    println!("{}", manager.counters().summary());
    Ok(())
}
