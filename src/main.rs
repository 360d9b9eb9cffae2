use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sensor_image_provider::config::Config;
use sensor_image_provider::snapshot::save_input;
use sensor_image_provider::{CameraDriver, CaptureStats, ImageProvider, SyntheticCamera};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// V4L2 device node, overrides `app.device`
    #[arg(long)]
    device: Option<String>,

    /// Use the built-in test-pattern sensor instead of real hardware
    #[arg(long)]
    synthetic: bool,

    /// Stop after this many capture attempts. Default runs until Ctrl+C.
    #[arg(long)]
    frames: Option<u64>,

    /// Delay between captures, overrides `app.capture_interval_ms`
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Directory for PNG dumps of each cropped input, overrides `app.output_dir`
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn open_driver(args: &CliArgs, config: &Config) -> Result<Box<dyn CameraDriver>> {
    if args.synthetic {
        log::info!("Using synthetic sensor");
        return Ok(Box::new(SyntheticCamera::new()));
    }

    let device = args.device.clone().unwrap_or_else(|| config.app.device.clone());
    hardware_driver(device)
}

#[cfg(target_os = "linux")]
fn hardware_driver(device: String) -> Result<Box<dyn CameraDriver>> {
    log::info!("Using V4L2 device {}", device);
    Ok(Box::new(sensor_image_provider::V4lCamera::new(device)))
}

#[cfg(not(target_os = "linux"))]
fn hardware_driver(_device: String) -> Result<Box<dyn CameraDriver>> {
    anyhow::bail!("no hardware camera backend on this platform, use --synthetic")
}

/// Blocking inference-input loop: capture, crop, optionally dump, sleep.
fn capture_loop(args: CliArgs, config: Config, running: Arc<AtomicBool>) -> Result<CaptureStats> {
    let driver = open_driver(&args, &config)?;
    let mut provider = ImageProvider::new(driver, config.camera.clone());

    // One attempt only, the loop is useless without a sensor
    provider
        .init_camera()
        .context("Camera init failed")?;

    let model = &config.model;
    let interval = Duration::from_millis(args.interval_ms.unwrap_or(config.app.capture_interval_ms));
    let output_dir = args.output.clone().or_else(|| config.app.output_dir.clone());
    if let Some(dir) = &output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    }

    let mut input = vec![0u8; model.image_size()];
    let mut attempt = 0u64;

    log::info!(
        "Capture loop started: {}x{}x{} input every {:?}",
        model.image_width,
        model.image_height,
        model.channels,
        interval
    );

    while running.load(Ordering::Relaxed) {
        if args.frames.is_some_and(|limit| attempt >= limit) {
            break;
        }

        match provider.get_model_image(model, &mut input) {
            Ok(_) => {
                let mean = input.iter().map(|&b| b as u64).sum::<u64>() / input.len() as u64;
                log::debug!("Input {} ready, mean level {}", attempt, mean);

                if let Some(dir) = &output_dir {
                    match save_input(dir, attempt, model, &input) {
                        Ok(path) => log::debug!("Saved {}", path.display()),
                        Err(e) => log::warn!("Failed to save input {}: {}", attempt, e),
                    }
                }
            }
            Err(e) => log::warn!("Input {} not produced: {}", attempt, e),
        }

        attempt += 1;
        thread::sleep(interval);
    }

    let stats = provider.stats();
    drop(provider.into_driver());
    Ok(stats)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    log::info!("Starting image provider with args: {:?}", args);

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    let running = Arc::new(AtomicBool::new(true));
    let loop_running = Arc::clone(&running);
    let mut capture = tokio::task::spawn_blocking(move || capture_loop(args, config, loop_running));

    let stats = tokio::select! {
        joined = &mut capture => joined??,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            log::info!("Shutting down");
            running.store(false, Ordering::Relaxed);
            capture.await??
        }
    };

    log::info!(
        "Captured {} frames, {} capture failures, {} crop failures",
        stats.frames_captured,
        stats.capture_failures,
        stats.crop_failures
    );

    Ok(())
}
