//! Integration tests for the history engine through its public API

use chrono::{DateTime, Duration, Utc};
use delta_history::core::{
    evaluate, EngineConfig, FeatureRegistry, HistoryManager, QueryError, QueryOutput, QuerySpec,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

fn ten_frame_manager() -> HistoryManager {
    let registry = FeatureRegistry::builder()
        .feature("hp")
        .feature("mp")
        .group("bars", ["hp", "mp"])
        .build()
        .unwrap();
    let config = EngineConfig {
        capacity: 10,
        frame_rate: 10.0,
        default_window_ms: 200,
    };
    let manager = HistoryManager::new(registry, config).unwrap();
    for i in 1..=10 {
        manager
            .submit_frame(&[i as f64, 20.0 - i as f64], t0() + Duration::milliseconds(i * 100))
            .unwrap();
    }
    manager
}

#[test]
fn test_windowed_reads_at_latest_frame() {
    let manager = ten_frame_manager();
    let view = manager.view().unwrap();
    let hp = view.feature("hp").unwrap();

    assert_eq!(hp.current(), Ok(10.0));
    assert_eq!(hp.min_between(0, 300), Ok(8.0));
    assert_eq!(hp.max_between(0, 300), Ok(10.0));
    assert_eq!(hp.old(200), Ok(8.0));
    assert_eq!(hp.old(0), Ok(8.0));
    assert_eq!(hp.delta(500), Ok(2.0));
}

#[test]
fn test_window_past_capacity_is_rejected() {
    let manager = ten_frame_manager();
    let hp = manager.view().unwrap().feature("hp").unwrap();

    assert_eq!(hp.old(900), Ok(1.0));
    assert_eq!(
        hp.old(1000),
        Err(QueryError::WindowOverflow {
            requested_ms: 1000,
            offset: 10,
            capacity: 10,
            max_ms: 900,
        })
    );
}

#[test]
fn test_group_reducers() {
    let manager = ten_frame_manager();
    let bars = manager.view().unwrap().feature("bars").unwrap();

    // hp: 10, 9, 8   mp: 10, 11, 12
    assert_eq!(bars.max_min(300), Ok(10.0));
    assert_eq!(bars.min_max(300), Ok(10.0));
    assert_eq!(bars.min_between(0, 300), Ok(8.0));
    assert_eq!(bars.max_between(0, 300), Ok(12.0));

    // per feature min: 8, 10 / per feature max: 10, 12
    assert_eq!(bars.max_min_inverse(300), Ok(10.0));
    assert_eq!(bars.min_max_inverse(300), Ok(10.0));
}

#[test]
fn test_inverse_reducers_summarize_each_feature() {
    let registry = FeatureRegistry::from_names(["steady", "flicker"]).unwrap();
    let config = EngineConfig {
        capacity: 10,
        frame_rate: 10.0,
        default_window_ms: 200,
    };
    let manager = HistoryManager::new(registry, config).unwrap();
    // newest last: steady 13, 12, 11, 10 and flicker 5, 0, 5, 0 reading back
    for (i, (steady, flicker)) in [(10.0, 0.0), (11.0, 5.0), (12.0, 0.0), (13.0, 5.0)]
        .into_iter()
        .enumerate()
    {
        manager
            .submit_frame(&[steady, flicker], t0() + Duration::milliseconds(i as i64 * 100))
            .unwrap();
    }

    let both = manager
        .view()
        .unwrap()
        .features(&["steady", "flicker"])
        .unwrap();
    // per feature min: 10, 0 / per feature max: 13, 5
    assert_eq!(both.max_min_inverse(400), Ok(10.0));
    assert_eq!(both.min_max_inverse(400), Ok(5.0));
    assert_eq!(both.max_min(400), both.max_min_inverse(400));
    assert_eq!(both.min_max(400), both.min_max_inverse(400));
}

#[test]
fn test_wrapped_ring_still_rejects_offsets_past_capacity() {
    let manager = ten_frame_manager();
    for i in 11..=13 {
        manager
            .submit_frame(&[i as f64, 20.0 - i as f64], t0() + Duration::milliseconds(i * 100))
            .unwrap();
    }
    let hp = manager.view().unwrap().feature("hp").unwrap();

    assert_eq!(hp.current(), Ok(13.0));
    assert_eq!(hp.old(900), Ok(4.0));
    assert!(matches!(
        hp.old(1000),
        Err(QueryError::WindowOverflow { max_ms: 900, .. })
    ));
    assert!(matches!(
        hp.max(1000),
        Err(QueryError::WindowOverflow { max_ms: 900, .. })
    ));
}

#[test]
fn test_text_queries_match_direct_calls() {
    let manager = ten_frame_manager();
    let view = manager.view().unwrap();
    let cases = [
        ("hp.current", QueryOutput::Number(10.0)),
        ("hp.old(200)", QueryOutput::Number(8.0)),
        ("hp.min(0, 300)", QueryOutput::Number(8.0)),
        ("mp.max(300)", QueryOutput::Number(12.0)),
        ("hp.is_paused", QueryOutput::Flag(false)),
    ];

    for (text, expected) in cases {
        let spec: QuerySpec = text.parse().unwrap();
        assert_eq!(evaluate(&view, &spec), Ok(expected), "query {text}");
    }
}

#[test]
fn test_timed_pause_masks_until_deadline() {
    let manager = ten_frame_manager();
    let view = manager.view().unwrap();
    let pause: QuerySpec = "hp.pause(150)".parse().unwrap();
    assert_eq!(evaluate(&view, &pause), Ok(QueryOutput::Done));
    assert!(view.feature("hp").unwrap().current().unwrap().is_nan());
    assert_eq!(view.feature("mp").unwrap().current(), Ok(10.0));

    // frame ends at 1100ms (masked) then 1200ms (past the 1150ms deadline)
    manager
        .submit_frame(&[11.0, 9.0], t0() + Duration::milliseconds(1100))
        .unwrap();
    manager
        .submit_frame(&[12.0, 8.0], t0() + Duration::milliseconds(1200))
        .unwrap();

    let later = manager.view().unwrap();
    let hp = later.feature("hp").unwrap();
    assert_eq!(hp.current(), Ok(12.0));
    assert!(hp.old(100).unwrap().is_nan());
    assert_eq!(hp.is_paused(), Ok(false));
}

#[test]
fn test_reads_race_with_capture_thread() {
    let registry = FeatureRegistry::from_names(["tick"]).unwrap();
    let config = EngineConfig {
        capacity: 16,
        frame_rate: 10.0,
        default_window_ms: 100,
    };
    let manager = HistoryManager::new(registry, config).unwrap();
    manager.submit_frame(&[0.0], t0()).unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let capture = {
        let manager = manager.clone();
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for i in 1..2_000i64 {
                manager
                    .submit_frame(&[i as f64], t0() + Duration::milliseconds(i * 100))
                    .unwrap();
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    while !done.load(Ordering::SeqCst) {
        let view = manager.view().unwrap();
        let origin = view.origin_index();
        let tick = view.feature("tick").unwrap();

        match tick.current() {
            Ok(value) => assert_eq!(value, origin as f64),
            Err(QueryError::FrameEvicted { .. }) => {}
            Err(other) => panic!("unexpected error {other}"),
        }
        match tick.min(500) {
            Ok(value) if origin >= 4 => assert_eq!(value, (origin - 4) as f64),
            Ok(value) => assert!(value.is_nan()),
            Err(QueryError::FrameEvicted { .. }) => {}
            Err(other) => panic!("unexpected error {other}"),
        }
    }
    capture.join().unwrap();

    let view = manager.view().unwrap();
    assert_eq!(view.origin_index(), 1_999);
    assert_eq!(view.feature("tick").unwrap().min(500), Ok(1_995.0));
}

#[test]
fn test_counters_track_activity() {
    let manager = ten_frame_manager();
    let view = manager.view().unwrap();
    let hp = view.feature("hp").unwrap();
    hp.current().unwrap();
    let _ = hp.old(5_000);
    hp.pause(0).unwrap();

    let stats = manager.counters().stats();
    assert_eq!(stats.frames_accepted, 10);
    assert_eq!(stats.frames_rejected, 0);
    assert_eq!(stats.queries_served, 1);
    assert_eq!(stats.query_errors, 1);
    assert_eq!(stats.pauses_installed, 1);
}
