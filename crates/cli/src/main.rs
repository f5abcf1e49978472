mod settings;

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use face_monitor_core::capture::domain::frame_source::FrameSource;
use face_monitor_core::capture::infrastructure::ffmpeg_capture_source::FfmpegCaptureSource;
use face_monitor_core::capture::infrastructure::image_sequence_source::ImageSequenceSource;
use face_monitor_core::classification::infrastructure::onnx_age_classifier::OnnxAgeClassifier;
use face_monitor_core::classification::infrastructure::onnx_gender_classifier::OnnxGenderClassifier;
use face_monitor_core::detection::infrastructure::cascade_face_detector::CascadeFaceDetector;
use face_monitor_core::display::domain::display_sink::DisplaySink;
use face_monitor_core::display::infrastructure::image_file_display_sink::ImageFileDisplaySink;
use face_monitor_core::display::infrastructure::null_display_sink::NullDisplaySink;
use face_monitor_core::events::domain::event_sink::EventSink;
use face_monitor_core::events::infrastructure::json_lines_event_sink::JsonLinesEventSink;
use face_monitor_core::events::infrastructure::snapshot_writer::SnapshotWriter;
use face_monitor_core::pipeline::pipeline_controller::{
    ControllerOptions, PipelineComponents, PipelineController,
};
use face_monitor_core::pipeline::pipeline_logger::StatsPipelineLogger;
use face_monitor_core::rendering::annotation_renderer::AnnotationRenderer;
use face_monitor_core::shared::constants::{
    AGE_MODEL_NAME, AGE_MODEL_URL, CASCADE_MODEL_NAME, CASCADE_MODEL_URL, GENDER_MODEL_NAME,
    GENDER_MODEL_URL,
};
use face_monitor_core::shared::model_resolver::ModelResolver;

use settings::{parse_viewport, Settings};

/// Live face detection with age and gender estimation.
#[derive(Parser)]
#[command(name = "face-monitor")]
struct Cli {
    /// Settings file (JSON). Flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Capture device (e.g. /dev/video0).
    #[arg(long)]
    device: Option<String>,

    /// Capture input format (e.g. video4linux2, avfoundation, dshow).
    #[arg(long)]
    format: Option<String>,

    /// Capture width in pixels.
    #[arg(long)]
    width: Option<u32>,

    /// Capture height in pixels.
    #[arg(long)]
    height: Option<u32>,

    /// Capture frame rate.
    #[arg(long)]
    fps: Option<u32>,

    /// Replay a directory of images instead of opening a capture device.
    #[arg(long)]
    images: Option<PathBuf>,

    /// Haar cascade (OpenCV XML or JSON). OpenCV's frontal-face cascade is
    /// downloaded on first use if omitted.
    #[arg(long)]
    cascade: Option<PathBuf>,

    /// Age model (ONNX). Downloaded on first use if omitted.
    #[arg(long)]
    age_model: Option<PathBuf>,

    /// Gender model (ONNX). Downloaded on first use if omitted.
    #[arg(long)]
    gender_model: Option<PathBuf>,

    /// TrueType font for captions, replacing the bundled monospace font.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Image file to keep updated with the latest annotated frame.
    #[arg(long)]
    display_out: Option<PathBuf>,

    /// Scale display frames to fit WIDTHxHEIGHT.
    #[arg(long, value_parser = parse_viewport)]
    viewport: Option<(u32, u32)>,

    /// Append detection events to this JSON-lines file.
    #[arg(long)]
    events: Option<PathBuf>,

    /// Save annotated snapshots here and reference them from events.
    #[arg(long)]
    snapshots: Option<PathBuf>,

    /// Maximum concurrent face classifications per frame.
    #[arg(long)]
    workers: Option<usize>,

    /// Cascade scale step between window sizes (> 1.0).
    #[arg(long)]
    scale_factor: Option<f32>,

    /// Overlapping hits required to keep a face.
    #[arg(long)]
    min_neighbors: Option<usize>,

    /// Smallest face size scanned, in pixels.
    #[arg(long)]
    min_face_size: Option<u32>,

    /// Stop after this many seconds instead of waiting for Enter.
    /// Ctrl+C stops the run either way.
    #[arg(long)]
    duration: Option<u64>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let base = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load(),
    };
    let settings = merge(&cli, base);
    validate(&settings)?;

    let components = build_components(&settings)?;
    let mut options = ControllerOptions {
        capture: settings.capture.clone(),
        ..ControllerOptions::default()
    };
    if let Some(images) = &settings.images {
        options.capture.device = images.to_string_lossy().into_owned();
        options.capture.format = None;
    }
    if let Some(workers) = settings.workers {
        options.classification_workers = workers;
    }

    let (shutdown_tx, shutdown_rx) = crossbeam_channel::unbounded();
    install_signal_handler(shutdown_tx.clone());

    let mut controller = PipelineController::new(components, options);
    controller.start()?;

    let duration = cli.duration.map(Duration::from_secs);
    match duration {
        Some(d) => log::info!("Running for {}s", d.as_secs()),
        None => {
            eprintln!("Monitoring. Press Enter or Ctrl+C to stop.");
            let tx = shutdown_tx.clone();
            std::thread::Builder::new()
                .name("stdin-watch".into())
                .spawn(move || watch_stdin(std::io::stdin().lock(), &tx))?;
        }
    }
    let reason = wait_for_shutdown(&shutdown_rx, duration);
    log::info!("Stopping ({reason:?})");
    drop(shutdown_tx);

    controller.stop();
    let stats = controller.stats();
    log::info!(
        "Processed {} frames, {} faces detected, {} classified",
        stats.frames_processed,
        stats.faces_detected,
        stats.faces_classified
    );
    Ok(())
}

/// Why the monitor stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shutdown {
    Enter,
    Signal,
    Elapsed,
}

/// The first Ctrl+C or SIGTERM asks for a clean stop; a second one exits
/// at once.
fn install_signal_handler(tx: Sender<Shutdown>) {
    let signalled = AtomicBool::new(false);
    let installed = ctrlc::set_handler(move || {
        if signalled.swap(true, Ordering::SeqCst) {
            eprintln!("Forced exit");
            process::exit(130);
        }
        let _ = tx.send(Shutdown::Signal);
    });
    if let Err(e) = installed {
        log::warn!("Cannot install signal handler, Ctrl+C will not flush output: {e}");
    }
}

/// Reports Enter on the shutdown channel. End of input is not a stop
/// request, so a closed or redirected stdin leaves the run to a signal.
fn watch_stdin<R: BufRead>(mut reader: R, tx: &Sender<Shutdown>) {
    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(0) => log::info!("stdin closed; waiting for Ctrl+C"),
        Ok(_) => {
            let _ = tx.send(Shutdown::Enter);
        }
        Err(e) => log::warn!("Cannot read stdin ({e}); waiting for Ctrl+C"),
    }
}

fn wait_for_shutdown(rx: &Receiver<Shutdown>, duration: Option<Duration>) -> Shutdown {
    match duration {
        Some(d) => match rx.recv_timeout(d) {
            Ok(reason) => reason,
            Err(RecvTimeoutError::Timeout) => Shutdown::Elapsed,
            Err(RecvTimeoutError::Disconnected) => Shutdown::Signal,
        },
        None => rx.recv().unwrap_or(Shutdown::Signal),
    }
}

fn merge(cli: &Cli, mut s: Settings) -> Settings {
    if let Some(device) = &cli.device {
        s.capture.device = device.clone();
    }
    if let Some(format) = &cli.format {
        s.capture.format = Some(format.clone());
    }
    if let Some(width) = cli.width {
        s.capture.width = width;
    }
    if let Some(height) = cli.height {
        s.capture.height = height;
    }
    if let Some(fps) = cli.fps {
        s.capture.fps = fps;
    }
    override_path(&mut s.images, &cli.images);
    override_path(&mut s.cascade, &cli.cascade);
    override_path(&mut s.age_model, &cli.age_model);
    override_path(&mut s.gender_model, &cli.gender_model);
    override_path(&mut s.font, &cli.font);
    override_path(&mut s.display_out, &cli.display_out);
    override_path(&mut s.events, &cli.events);
    override_path(&mut s.snapshots, &cli.snapshots);
    if cli.viewport.is_some() {
        s.viewport = cli.viewport;
    }
    if cli.workers.is_some() {
        s.workers = cli.workers;
    }
    if let Some(v) = cli.scale_factor {
        s.scale_factor = v;
    }
    if let Some(v) = cli.min_neighbors {
        s.min_neighbors = v;
    }
    if let Some(v) = cli.min_face_size {
        s.min_face_size = v;
    }
    s
}

fn override_path(slot: &mut Option<PathBuf>, flag: &Option<PathBuf>) {
    if flag.is_some() {
        slot.clone_from(flag);
    }
}

fn validate(s: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(cascade) = &s.cascade {
        if !cascade.exists() {
            return Err(format!("Cascade file not found: {}", cascade.display()).into());
        }
    }
    if let Some(images) = &s.images {
        if !images.is_dir() {
            return Err(format!("Image directory not found: {}", images.display()).into());
        }
    }
    if s.workers == Some(0) {
        return Err("Workers must be at least 1".into());
    }
    if s.snapshots.is_some() && s.events.is_none() {
        return Err("--snapshots requires --events".into());
    }
    Ok(())
}

fn build_components(s: &Settings) -> Result<PipelineComponents, Box<dyn std::error::Error>> {
    let source: Box<dyn FrameSource> = if s.images.is_some() {
        Box::new(ImageSequenceSource::new())
    } else {
        Box::new(FfmpegCaptureSource::new())
    };

    let bundled = s.models_dir.as_deref();
    let cascade = resolve_model(
        s.cascade.as_deref(),
        CASCADE_MODEL_NAME,
        CASCADE_MODEL_URL,
        bundled,
    )?;
    let detector = CascadeFaceDetector::from_file(&cascade, s.cascade_params())?;

    let age_path = resolve_model(s.age_model.as_deref(), AGE_MODEL_NAME, AGE_MODEL_URL, bundled)?;
    let gender_path = resolve_model(
        s.gender_model.as_deref(),
        GENDER_MODEL_NAME,
        GENDER_MODEL_URL,
        bundled,
    )?;

    // One session per classification worker so faces are scored in parallel.
    let workers = s
        .workers
        .unwrap_or_else(|| ControllerOptions::default().classification_workers);

    let renderer = match &s.font {
        Some(path) => AnnotationRenderer::with_font(AnnotationRenderer::load_font(path)?),
        None => AnnotationRenderer::new(),
    };

    let display: Box<dyn DisplaySink> = match &s.display_out {
        Some(path) => Box::new(ImageFileDisplaySink::new(path, s.viewport)?),
        None => Box::new(NullDisplaySink::new()),
    };

    let events: Option<Box<dyn EventSink>> = match &s.events {
        Some(path) => Some(Box::new(JsonLinesEventSink::open(path)?)),
        None => None,
    };
    let snapshots = s
        .snapshots
        .as_deref()
        .map(SnapshotWriter::new)
        .transpose()?;

    Ok(PipelineComponents {
        source,
        detector: Box::new(detector),
        age_classifier: Box::new(OnnxAgeClassifier::with_sessions(&age_path, workers)?),
        gender_classifier: Box::new(OnnxGenderClassifier::with_sessions(&gender_path, workers)?),
        renderer,
        display,
        events,
        snapshots,
        logger: Box::new(StatsPipelineLogger::new(s.log_every)),
    })
}

fn resolve_model(
    explicit: Option<&Path>,
    name: &str,
    url: &str,
    bundled: Option<&Path>,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(format!("Model file not found: {}", path.display()).into());
        }
        return Ok(path.to_path_buf());
    }
    let resolver = ModelResolver::user_cache()?.with_bundled_dir(bundled);
    let label = name.to_string();
    let path = resolver.resolve(
        name,
        url,
        Some(Box::new(move |downloaded, total| {
            download_progress(&label, downloaded, total)
        })),
    )?;
    log::info!("Using {name} at {}", path.display());
    Ok(path)
}

fn download_progress(name: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {name}... {pct}%");
        if downloaded == total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading {name}... {downloaded} bytes");
    }
}
