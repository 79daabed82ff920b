use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{LevelFilter, info};

use lanefinder::{CalibrationResult, FramePipeline, ImageRunner, Settings};

#[derive(Parser)]
#[command(name = "lanefinder")]
#[command(about = "Camera calibration and lane-line detection for driving footage")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON file overriding the default thresholds and geometry
    #[arg(long, value_name = "FILE", global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Derive the camera matrix and distortion from chessboard images
    Calibrate(CalibrateArgs),
    /// Annotate every image in a directory
    Images(ImagesArgs),
    /// Annotate every frame of a video
    Video(VideoArgs),
}

#[derive(Args)]
struct CalibrateArgs {
    /// Folder containing the chessboard images
    #[arg(long, default_value = "camera_cal/")]
    input_dir: PathBuf,

    /// Interior corners per row
    #[arg(long, default_value_t = 9)]
    nx: u32,

    /// Interior corners per column
    #[arg(long, default_value_t = 6)]
    ny: u32,

    /// Write corners_* and undist_* images
    #[arg(long)]
    save_images: bool,

    /// Diagnostics folder, relative to the input folder
    #[arg(long, default_value = "tmp")]
    output_dir: PathBuf,

    /// Calibration file [default: <input-dir>/camera_calibration.json]
    #[arg(long, value_name = "PATH")]
    output_file: Option<PathBuf>,
}

#[derive(Args)]
struct ImagesArgs {
    /// Folder containing the road images
    #[arg(long, default_value = "test_images/")]
    input_dir: PathBuf,

    /// Calibration file written by `calibrate`
    #[arg(long, default_value = "camera_cal/camera_calibration.json")]
    camera_calib_file: PathBuf,

    /// Folder receiving final_* images
    #[arg(long, default_value = "output_images")]
    output_dir: PathBuf,

    /// Save intermediate images (optional)
    #[arg(long)]
    save_inter: bool,
}

#[derive(Args)]
struct VideoArgs {
    #[arg(long, default_value = "project_video.mp4")]
    input_video: PathBuf,

    /// Calibration file written by `calibrate`
    #[arg(long, default_value = "camera_cal/camera_calibration.json")]
    camera_calib_file: PathBuf,

    #[arg(long, default_value = "output_project_video.mp4")]
    output_video: PathBuf,
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.format_timestamp(None).init();
}

fn banner(entries: &[(&str, String)]) {
    println!("=================================");
    for (key, value) in entries {
        println!("{} : {}", key, value);
    }
    println!("=================================");
}

fn load_pipeline(settings: &Settings, calib_file: &Path) -> Result<FramePipeline> {
    let calibration = CalibrationResult::load(calib_file)
        .with_context(|| format!("Failed to load calibration {}", calib_file.display()))?;
    info!(
        "calibration from {} (rms {:.3}, {}x{})",
        calib_file.display(),
        calibration.rms_error,
        calibration.image_shape.1,
        calibration.image_shape.0
    );
    let camera = calibration.camera_model()?;
    Ok(FramePipeline::new(settings, camera)?)
}

#[cfg(feature = "opencv")]
fn calibrate(args: CalibrateArgs) -> Result<()> {
    use lanefinder::calibration::opencv::{OpenCvChessboard, OpenCvSolver};
    use lanefinder::{BoardPattern, Calibrator};

    let mut calibrator = Calibrator::new(
        BoardPattern::new(args.nx, args.ny),
        OpenCvChessboard::default(),
        OpenCvSolver,
    );
    if args.save_images {
        calibrator = calibrator.with_diagnostics(args.input_dir.join(&args.output_dir))?;
    }

    let report = calibrator
        .run(&args.input_dir)
        .with_context(|| format!("Calibration from {} failed", args.input_dir.display()))?;

    let output_file = args
        .output_file
        .unwrap_or_else(|| args.input_dir.join("camera_calibration.json"));
    report
        .result
        .save(&output_file)
        .with_context(|| format!("Failed to write {}", output_file.display()))?;

    println!("\n=== Calibration Results ===");
    println!("Images used: {}", report.accepted.len());
    println!("Images skipped: {}", report.skipped.len());
    for (path, reason) in &report.skipped {
        println!("  {} ({})", path.display(), reason);
    }
    println!("RMS reprojection error: {:.4} px", report.result.rms_error);
    println!("Saved to {}", output_file.display());
    Ok(())
}

#[cfg(not(feature = "opencv"))]
fn calibrate(_args: CalibrateArgs) -> Result<()> {
    anyhow::bail!("calibration needs OpenCV; rebuild with `--features opencv`")
}

fn images(args: ImagesArgs, settings: &Settings, verbose: bool) -> Result<()> {
    let pipeline = load_pipeline(settings, &args.camera_calib_file)?;
    let runner = ImageRunner::new(pipeline, args.output_dir.clone())
        .with_context(|| format!("Cannot create {}", args.output_dir.display()))?
        .with_intermediates(args.save_inter)
        .with_verbose(verbose);

    let summary = runner
        .run(&args.input_dir)
        .with_context(|| format!("Failed to process {}", args.input_dir.display()))?;

    println!("\n=== Image Results ===");
    println!("Processed: {}", summary.processed);
    println!("Failed: {}", summary.failed);
    println!("Output: {}", runner.output_dir().display());
    Ok(())
}

#[cfg(feature = "opencv")]
fn video(args: VideoArgs, settings: &Settings, verbose: bool) -> Result<()> {
    use lanefinder::runner::VideoRunner;

    let pipeline = load_pipeline(settings, &args.camera_calib_file)?;
    let summary = VideoRunner::new(pipeline)
        .with_verbose(verbose)
        .run(&args.input_video, &args.output_video)
        .with_context(|| format!("Failed to process {}", args.input_video.display()))?;

    println!("\n=== Video Results ===");
    println!("Frames annotated: {}", summary.processed);
    println!("Frames passed through: {}", summary.failed);
    println!("Output: {}", args.output_video.display());
    Ok(())
}

#[cfg(not(feature = "opencv"))]
fn video(_args: VideoArgs, _settings: &Settings, _verbose: bool) -> Result<()> {
    anyhow::bail!("video processing needs OpenCV; rebuild with `--features opencv`")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let start = Instant::now();

    let settings = Settings::load(cli.settings.as_deref())
        .context("Failed to load settings")?;
    if let Some(path) = &cli.settings {
        info!("settings overridden from {}", path.display());
    }

    match cli.command {
        Command::Calibrate(args) => {
            banner(&[
                ("input_dir", args.input_dir.display().to_string()),
                ("nx", args.nx.to_string()),
                ("ny", args.ny.to_string()),
                ("save_images", args.save_images.to_string()),
                ("output_dir", args.output_dir.display().to_string()),
            ]);
            calibrate(args)?;
        }
        Command::Images(args) => {
            banner(&[
                ("input_dir", args.input_dir.display().to_string()),
                ("save_inter", args.save_inter.to_string()),
                ("output_dir", args.output_dir.display().to_string()),
                ("camera file", args.camera_calib_file.display().to_string()),
            ]);
            images(args, &settings, cli.verbose)?;
        }
        Command::Video(args) => {
            banner(&[
                ("input_video", args.input_video.display().to_string()),
                ("output_video", args.output_video.display().to_string()),
                ("camera file", args.camera_calib_file.display().to_string()),
            ]);
            video(args, &settings, cli.verbose)?;
        }
    }

    println!("\nTook {:.2} seconds", start.elapsed().as_secs_f64());
    Ok(())
}
