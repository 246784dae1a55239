mod capture;
mod config;
mod controls;
mod detection;
mod error;
mod inference;
mod landmarks;
mod output;
mod overlay;
mod pipeline;

use anyhow::{Context, Result};
use clap::Parser;
use config::{InputGeometry, OutputOptions};
use detection::{FaceLocator, UltraFaceDetector};
use landmarks::PfldLandmarkEstimator;
use output::VideoCodec;
use pipeline::{FrameLoop, FrameRange, LoopState};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Mirror each half of a face about the nose bridge", long_about = None)]
struct Args {
    /// Input video file; the camera is used when absent
    #[arg(short = 'i', long)]
    input: Option<PathBuf>,

    /// Camera device index used when no input file is given
    #[arg(long, default_value_t = 0)]
    camera_index: u32,

    /// Start with the landmark overlay on
    #[arg(short = 'f', long)]
    face_landmarks: bool,

    /// Start with the midpoint line on
    #[arg(short = 'm', long)]
    show_midpoint: bool,

    /// Do not open any window
    #[arg(short = 'w', long)]
    disable_windows: bool,

    /// Save every enabled channel to a file in the working directory
    #[arg(short = 's', long)]
    save: bool,

    /// Save as Motion JPEG (.avi) instead of MPEG-4 (.mp4)
    #[arg(short = 'j', long)]
    mjpg: bool,

    /// Left channel width; 0 matches the input, negative disables the channel
    #[arg(short = 'l', long, default_value_t = 0, allow_negative_numbers = true)]
    left: i32,

    /// Right channel width; 0 matches the input, negative disables the channel
    #[arg(short = 'r', long, default_value_t = 0, allow_negative_numbers = true)]
    right: i32,

    /// First frame index to process (0-based); negative starts at the first frame
    #[arg(short = 'b', long, default_value_t = 0, allow_negative_numbers = true)]
    begin_frame: i64,

    /// Last frame index to process, inclusive; -1 runs to the end
    #[arg(short = 'e', long, default_value_t = -1, allow_negative_numbers = true)]
    end_frame: i64,

    /// Face detector model (UltraFace ONNX)
    #[arg(long, default_value = "data/face_detector.onnx")]
    detector_model: PathBuf,

    /// 68-point landmark model (ONNX)
    #[arg(long, default_value = "data/landmarks68.onnx")]
    landmark_model: PathBuf,

    /// Run face detection once every N frames
    #[arg(long, default_value_t = 1)]
    detect_every: u32,

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

    tracing::info!("face-mirror starting");
    match &args.input {
        Some(path) => tracing::info!("Input: {}", path.display()),
        None => tracing::info!("Input: camera {}", args.camera_index),
    }

    let capture = capture::open_source(args.input.as_deref(), args.camera_index)
        .context("Unable to open input. Check camera is connected or file is readable.")?;
    let (width, height) = capture.resolution();
    let fps = capture.fps();
    tracing::info!("Input geometry: {}x{} @ {:.2} fps", width, height, fps);

    tracing::info!("Loading face detector from {}", args.detector_model.display());
    let detector = UltraFaceDetector::new(&args.detector_model).context("Failed to load face detector")?;
    tracing::info!("Loading landmark model from {}", args.landmark_model.display());
    let estimator =
        PfldLandmarkEstimator::new(&args.landmark_model).context("Failed to load landmark model")?;

    let options = OutputOptions {
        left_width: args.left,
        right_width: args.right,
        windows: !args.disable_windows,
        save: args.save,
        codec: if args.mjpg {
            VideoCodec::Mjpeg
        } else {
            VideoCodec::Mpeg4
        },
        camera_input: args.input.is_none(),
    };
    let channels = config::plan_channels(&options, InputGeometry { width, height, fps })
        .into_iter()
        .map(|plan| plan.into_channel())
        .collect();

    let locator = FaceLocator::new(capture, Box::new(detector), args.detect_every);
    let state = LoopState::new(
        FrameRange::new(args.begin_frame, args.end_frame),
        args.face_landmarks,
        args.show_midpoint,
    );
    let mut frame_loop = FrameLoop::new(locator, Box::new(estimator), channels, state)?;

    let stats = frame_loop.run()?;
    println!(
        "Processed {} frames in {:.1} seconds; {:.1} FPS.",
        stats.frames_processed,
        stats.elapsed.as_secs_f64(),
        stats.fps()
    );

    Ok(())
}
