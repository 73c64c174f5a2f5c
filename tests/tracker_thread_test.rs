//! Tracker running on its own thread


use head_pose_tracker::{config::Config, constants::POSE_CHANNELS, pipeline, CaptureLoop, Tracker, TrackerState};
use nalgebra::Vector3;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use test_helpers::{synthetic_points, test_estimator, ScriptedCamera, ScriptedExtractor};

const WAIT_LIMIT: Duration = Duration::from_secs(5);

fn fast_config() -> Config {
    let mut config = Config::default();
    config.tracker.target_rate = 1000;
    config
}

fn wait_for(condition: impl Fn() -> bool) -> bool {
    let started = Instant::now();
    while started.elapsed() < WAIT_LIMIT {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

#[test]
fn test_spawned_tracker_publishes_and_stops() {
    let (camera, probe) = ScriptedCamera::new();
    let (extractor, script) = ScriptedExtractor::new();
    script.repeat(vec![synthetic_points(0.0, 5.0, 0.0, Vector3::new(0.0, 0.0, 60.0)).to_vec()]);

    let capture_loop = CaptureLoop::new(&fast_config(), Box::new(camera), Box::new(extractor)).unwrap();
    let mut tracker = Tracker::spawn(capture_loop).unwrap();

    assert!(wait_for(|| tracker.has_succeeded()));
    assert_eq!(tracker.state(), TrackerState::Running);

    let mut pose = [0.0; POSE_CHANNELS];
    assert!(tracker.read_pose(&mut pose));
    assert_eq!(Some(pose), tracker.latest().map(|p| p.to_array()));
    assert!(tracker.stats().published >= 1);

    tracker.stop().unwrap();
    assert_eq!(tracker.state(), TrackerState::Stopped);
    assert!(probe.stops() >= 1);

    // Stopping twice is harmless and the last pose stays readable
    tracker.stop().unwrap();
    assert!(tracker.read_pose(&mut pose));
}

#[test]
fn test_dropping_tracker_stops_camera() {
    let (camera, probe) = ScriptedCamera::new();
    let (extractor, _script) = ScriptedExtractor::new();

    let capture_loop = CaptureLoop::new(&fast_config(), Box::new(camera), Box::new(extractor)).unwrap();
    let tracker = Tracker::spawn(capture_loop).unwrap();
    assert!(wait_for(|| probe.open_attempts() >= 1));
    assert!(!tracker.has_succeeded());

    drop(tracker);
    assert_eq!(probe.stops(), 1);
}

#[test]
fn test_config_applied_while_running() {
    let (camera, probe) = ScriptedCamera::new();
    let (extractor, _script) = ScriptedExtractor::new();

    let capture_loop = CaptureLoop::new(&fast_config(), Box::new(camera), Box::new(extractor)).unwrap();
    let mut tracker = Tracker::spawn(capture_loop).unwrap();
    assert!(wait_for(|| probe.open_attempts() >= 1));

    let mut config = fast_config();
    config.camera.fps = 30;
    tracker.apply_config(&config).unwrap();

    assert!(wait_for(|| probe.last_request().is_some_and(|request| request.fps == 30)));
    tracker.stop().unwrap();
}

#[test]
fn test_reads_never_see_a_mixed_pose() {
    let first = synthetic_points(2.0, 30.0, 10.0, Vector3::new(-5.0, 3.0, 50.0));
    let second = synthetic_points(-3.0, -20.0, -8.0, Vector3::new(6.0, -4.0, 80.0));

    let estimator = test_estimator();
    let expected = [first, second].map(|points| {
        pipeline::estimate(&points, &estimator)
            .and_then(|estimate| estimate.pose())
            .unwrap()
            .to_array()
    });
    assert_ne!(expected[0], expected[1]);

    let (camera, _probe) = ScriptedCamera::new();
    let (extractor, script) = ScriptedExtractor::new();
    script.repeat(vec![first.to_vec(), second.to_vec()]);

    let capture_loop = CaptureLoop::new(&fast_config(), Box::new(camera), Box::new(extractor)).unwrap();
    let tracker = Arc::new(Tracker::spawn(capture_loop).unwrap());
    assert!(wait_for(|| tracker.has_succeeded()));

    let done = Arc::new(AtomicBool::new(false));
    let reader = {
        let tracker = Arc::clone(&tracker);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut reads = 0_u64;
            let mut pose = [0.0; POSE_CHANNELS];
            while !done.load(Ordering::SeqCst) {
                assert!(tracker.read_pose(&mut pose));
                assert!(
                    pose == expected[0] || pose == expected[1],
                    "Read a pose that was never published: {pose:?}"
                );
                reads += 1;
            }
            reads
        })
    };

    assert!(wait_for(|| tracker.stats().published >= 50));
    done.store(true, Ordering::SeqCst);
    let reads = reader.join().unwrap();
    assert!(reads > 0);
}
