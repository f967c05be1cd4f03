use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use webcam_capture::config::{DEFAULT_DEVICE, DEFAULT_OUTPUT_HEIGHT, DEFAULT_OUTPUT_WIDTH};
use webcam_capture::{
    snapshot, CaptureConfig, CaptureSession, OutputFormat, ResolutionCatalog, V4lDevice,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Capture device path
    #[arg(short, long, default_value = DEFAULT_DEVICE)]
    device: PathBuf,

    /// Output frame width
    #[arg(long, default_value_t = DEFAULT_OUTPUT_WIDTH)]
    output_width: u32,

    /// Output frame height
    #[arg(long, default_value_t = DEFAULT_OUTPUT_HEIGHT)]
    output_height: u32,

    /// Output pixel format (grayscale or rgb565)
    #[arg(short, long, default_value = "rgb565")]
    format: OutputFormat,

    /// Number of frames to capture
    #[arg(short = 'n', long, default_value_t = 30)]
    frames: u64,

    /// Save the last frame (.png, .raw, .rgb565, ...)
    #[arg(short, long)]
    save: Option<PathBuf>,

    /// List the YUYV resolutions the device offers and exit
    #[arg(long)]
    list: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    if args.list {
        return list_resolutions(&args);
    }

    let config = CaptureConfig::new(&args.device, args.output_width, args.output_height);
    let mut session = CaptureSession::from_config(&config)
        .with_context(|| format!("Failed to open capture device {}", args.device.display()))?;

    if let Some(geometry) = session.geometry() {
        tracing::info!(
            "Capturing {} frames at {} -> {} ({})",
            args.frames,
            geometry.capture,
            geometry.output,
            geometry.fit_mode()
        );
    }

    run_capture(&mut session, &args)?;

    session.close();
    Ok(())
}

fn list_resolutions(args: &Args) -> Result<()> {
    let device = V4lDevice::open(&args.device)
        .with_context(|| format!("Failed to open {}", args.device.display()))?;
    let catalog = ResolutionCatalog::query(&device).context("Failed to query resolutions")?;

    if catalog.is_fallback() {
        println!("{}: no discrete sizes reported, fallback list:", args.device.display());
    } else {
        println!("{}:", args.device.display());
    }
    for res in catalog.entries() {
        println!("  {}", res);
    }
    Ok(())
}

fn run_capture(session: &mut CaptureSession, args: &Args) -> Result<()> {
    let start = Instant::now();
    let mut total_capture_time = Duration::ZERO;

    for _ in 0..args.frames {
        let capture_start = Instant::now();
        let frame = session
            .capture(args.format)
            .context("Failed to capture frame")?;
        total_capture_time += capture_start.elapsed();

        if frame.sequence % 30 == 0 {
            let avg_ms = total_capture_time.as_secs_f64() * 1000.0 / frame.sequence as f64;
            tracing::info!("Frame {}: capture={:.1}ms", frame.sequence, avg_ms);
        }
    }

    if let Some(path) = &args.save {
        let frame = session
            .capture(args.format)
            .context("Failed to capture frame")?;
        snapshot::save(&frame, path)?;
    }

    let elapsed = start.elapsed().as_secs_f64();
    let count = session.frames_captured();
    if elapsed > 0.0 {
        tracing::info!(
            "Captured {} frames in {:.2}s ({:.1} fps)",
            count,
            elapsed,
            count as f64 / elapsed
        );
    }
    Ok(())
}
