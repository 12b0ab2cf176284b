//! argusd - surveillance daemon
//!
//! This daemon:
//! 1. Loads camera definitions and pipeline settings from configuration
//! 2. Registers every configured camera with the surveillance system
//! 3. Enables motion detection and recording where configured
//! 4. Starts one monitoring worker per camera
//! 5. Periodically exports annotated JPEG snapshots (when configured)
//! 6. Stops cleanly on SIGINT (or after `--duration` seconds)

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::Parser;

use argus::config::{DaemonConfig, EnhanceSettings};
use argus::enhance;
use argus::{Frame, SurveillanceSystem};

#[derive(Debug, Parser)]
#[command(name = "argusd", about = "Multi-camera surveillance daemon")]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(long, env = "ARGUS_CONFIG")]
    config: Option<PathBuf>,

    /// Stop automatically after this many seconds (0 = run until SIGINT).
    #[arg(long, default_value_t = 0)]
    duration: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = DaemonConfig::load(args.config.as_deref())?;

    let system = Arc::new(SurveillanceSystem::with_pacing(cfg.pacing));

    for settings in &cfg.cameras {
        system.add_camera(settings.build_camera())?;
        system.set_motion_min_area(&settings.id, cfg.motion.min_area)?;
        if settings.motion {
            system.enable_motion_detection(&settings.id, cfg.motion.threshold)?;
        }
        if settings.record {
            std::fs::create_dir_all(&cfg.recording.dir).with_context(|| {
                format!("create recording directory {}", cfg.recording.dir.display())
            })?;
            let path = cfg.recording.dir.join(format!("{}.avi", settings.id));
            system.start_recording_with(
                &settings.id,
                &path,
                cfg.recording.fps,
                (settings.width, settings.height),
                cfg.recording.codec,
            )?;
        }
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            log::info!("shutdown requested");
            shutdown.store(true, Ordering::Release);
        })
        .context("install SIGINT handler")?;
    }

    system.start()?;
    log::info!(
        "argusd running with {} cameras{}",
        cfg.cameras.len(),
        cfg.snapshot
            .interval
            .map(|i| format!(", snapshots every {}s", i.as_secs()))
            .unwrap_or_default()
    );

    if cfg.snapshot.interval.is_some() {
        std::fs::create_dir_all(&cfg.snapshot.dir).with_context(|| {
            format!("create snapshot directory {}", cfg.snapshot.dir.display())
        })?;
    }

    let started = Instant::now();
    let mut last_snapshot = Instant::now();
    while !shutdown.load(Ordering::Acquire) {
        if args.duration > 0 && started.elapsed() >= Duration::from_secs(args.duration) {
            log::info!("configured duration elapsed");
            break;
        }

        if let Some(interval) = cfg.snapshot.interval {
            if last_snapshot.elapsed() >= interval {
                for settings in &cfg.cameras {
                    if let Err(e) = save_snapshot(&system, &cfg, &settings.id) {
                        log::warn!("snapshot for camera '{}' failed: {}", settings.id, e);
                    }
                }
                last_snapshot = Instant::now();
            }
        }

        std::thread::sleep(Duration::from_millis(200));
    }

    system.stop()?;
    Ok(())
}

/// Write one annotated, optionally enhanced, JPEG snapshot.
fn save_snapshot(system: &SurveillanceSystem, cfg: &DaemonConfig, id: &str) -> Result<()> {
    let Some(frame) = system.annotated_frame(id) else {
        // No frame published yet; not an error this early in the run.
        return Ok(());
    };
    let frame = apply_enhancements(frame, &cfg.enhance);

    let epoch = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let path = cfg.snapshot.dir.join(format!("{}-{}.jpg", id, epoch));
    frame.save_jpeg(&path, cfg.snapshot.quality)?;
    log::debug!("snapshot written to {}", path.display());
    Ok(())
}

fn apply_enhancements(frame: Frame, settings: &EnhanceSettings) -> Frame {
    if !settings.is_active() {
        return frame;
    }
    let mut frame = frame;
    if settings.contrast_alpha.is_some() || settings.contrast_beta.is_some() {
        frame = enhance::adjust_contrast(
            &frame,
            settings.contrast_alpha.unwrap_or(1.0),
            settings.contrast_beta.unwrap_or(0.0),
        );
    }
    if let Some(factor) = settings.saturation {
        frame = enhance::boost_saturation(&frame, factor);
    }
    if let Some(amount) = settings.sharpen_amount {
        frame = enhance::sharpen(&frame, amount);
    }
    frame
}
