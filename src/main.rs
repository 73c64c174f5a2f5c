//! Head pose tracker demo running against a simulated marker cap.

use anyhow::Result;
use clap::Parser;
use head_pose_tracker::{
    config::{Config, Pacing, EXAMPLE_CONFIG},
    constants::POSE_CHANNELS,
    model::MarkerModel,
    simulation::{BlobExtractor, HeadMotion, SimulatedCamera},
    Axis, CaptureLoop, Tracker,
};
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Horizontal field of view of the simulated lens in degrees
const SIMULATED_FOV: f64 = 60.0;

/// How often the main thread samples the pose
const READ_INTERVAL: Duration = Duration::from_millis(33);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<String>,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Stop after this many seconds (runs until Ctrl-C otherwise)
    #[arg(long, value_parser = parse_seconds)]
    duration: Option<Duration>,

    /// Override the processing rate in cycles per second
    #[arg(short, long)]
    rate: Option<u32>,

    /// Sleep only the remainder of each cycle instead of a fixed delay
    #[arg(long)]
    drift_corrected: bool,

    /// Print an example configuration file and exit
    #[arg(long)]
    print_config: bool,
}

/// Parse a non-negative, finite number of seconds
fn parse_seconds(value: &str) -> std::result::Result<Duration, String> {
    let seconds: f64 = value.parse().map_err(|e| format!("{value} is not a number: {e}"))?;
    Duration::try_from_secs_f64(seconds).map_err(|_| format!("{value} is not a valid number of seconds"))
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    if args.print_config {
        print!("{EXAMPLE_CONFIG}");
        return Ok(());
    }

    // Initialize logger
    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    info!("Head Pose Tracker");

    // Load configuration if provided
    let mut config = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {config_path}");
        match Config::from_file(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                log::warn!("Failed to load config file: {e}. Using defaults.");
                Config::default()
            }
        }
    } else {
        Config::default()
    };

    if let Some(rate) = args.rate {
        config.tracker.target_rate = rate;
    }
    if args.drift_corrected {
        config.tracker.pacing = Pacing::DriftCorrected;
    }
    config.validate()?;

    let cancel = Arc::new(AtomicBool::new(false));
    ctrlc::set_handler({
        let cancel = cancel.clone();
        move || {
            cancel.store(true, Ordering::SeqCst);
        }
    })?;

    let camera = SimulatedCamera::new(
        MarkerModel::from_offsets(&config.model),
        HeadMotion::default(),
        SIMULATED_FOV,
    );
    let capture_loop = CaptureLoop::new(&config, Box::new(camera), Box::new(BlobExtractor::default()))?;
    let mut tracker = Tracker::spawn(capture_loop)?;

    let started = Instant::now();
    let deadline = args.duration;
    let mut pose = [0.0; POSE_CHANNELS];
    let mut last_report = Instant::now();

    while !cancel.load(Ordering::SeqCst) {
        if deadline.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }

        if tracker.read_pose(&mut pose) && last_report.elapsed() >= Duration::from_secs(1) {
            let stats = tracker.stats();
            info!(
                "Yaw {:7.2} Pitch {:7.2} Roll {:7.2} | X {:6.2} Y {:6.2} Z {:6.2} | FPS {:.1}/{:.1}",
                pose[Axis::Yaw as usize],
                pose[Axis::Pitch as usize],
                pose[Axis::Roll as usize],
                pose[Axis::TX as usize],
                pose[Axis::TY as usize],
                pose[Axis::TZ as usize],
                stats.effective_fps,
                stats.skipped_fps,
            );
            last_report = Instant::now();
        }

        std::thread::sleep(READ_INTERVAL);
    }

    tracker.stop()?;
    let stats = tracker.stats();
    info!(
        "Processed {} frames, published {} poses, skipped {} cycles",
        stats.frames, stats.published, stats.skipped_frames
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_parsing() {
        assert_eq!(parse_seconds("2.5"), Ok(Duration::from_millis(2500)));
        assert_eq!(parse_seconds("0"), Ok(Duration::ZERO));
        assert!(parse_seconds("-1").is_err());
        assert!(parse_seconds("NaN").is_err());
        assert!(parse_seconds("inf").is_err());
        assert!(parse_seconds("soon").is_err());
    }

    #[test]
    fn test_invalid_duration_is_rejected_by_parser() {
        assert!(Args::try_parse_from(["head-pose-tracker", "--duration", "-3"]).is_err());
        assert!(Args::try_parse_from(["head-pose-tracker", "--duration", "nan"]).is_err());

        let args = Args::try_parse_from(["head-pose-tracker", "--duration", "10"]).unwrap();
        assert_eq!(args.duration, Some(Duration::from_secs(10)));
    }
}
