//! Owns the capture, detect, classify, annotate, present loop and its
//! lifecycle.
//!
//! Threads:
//!
//! ```text
//! caller ── start()/stop()
//!   pipeline-worker: source.next_frame → FrameCycle::process → publish
//!                                              │ (scoped classification pool)
//!   presenter:       display queue → DisplaySink::present
//!   event-recorder:  event queue   → SnapshotWriter + EventSink::record
//! ```
//!
//! The stop request is observed only between cycles, so a cycle that has
//! started always finishes. Stages have no timeouts: a capture device that
//! never returns from `next_frame` blocks the worker, and `stop()` then
//! blocks with it.
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::capture::domain::capture_config::CaptureConfig;
use crate::capture::domain::frame_source::FrameSource;
use crate::classification::domain::age_classifier::AgeClassifier;
use crate::classification::domain::gender_classifier::GenderClassifier;
use crate::detection::domain::face_detector::FaceDetector;
use crate::display::domain::display_sink::DisplaySink;
use crate::events::domain::event_sink::EventSink;
use crate::events::infrastructure::snapshot_writer::SnapshotWriter;
use crate::pipeline::face_classification::FaceClassifier;
use crate::pipeline::frame_cycle::FrameCycle;
use crate::pipeline::output_channels::{self, OutputConfig, OutputPublisher, OutputThreads};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::pipeline_state::{PipelineState, StateCell, StopHandle};
use crate::pipeline::pipeline_stats::{PipelineStats, StatsSnapshot};
use crate::rendering::annotation_renderer::AnnotationRenderer;
use crate::shared::error::{ShutdownError, StartupError};

/// Pause after a failed capture before the next attempt.
const CAPTURE_RETRY_DELAY: Duration = Duration::from_millis(100);

pub const DEFAULT_DISPLAY_QUEUE: usize = 2;
pub const DEFAULT_EVENT_QUEUE: usize = 64;

/// Everything the pipeline drives. Ownership moves into the controller and
/// from there into the worker and output threads on `start()`.
pub struct PipelineComponents {
    pub source: Box<dyn FrameSource>,
    pub detector: Box<dyn FaceDetector>,
    pub age_classifier: Box<dyn AgeClassifier>,
    pub gender_classifier: Box<dyn GenderClassifier>,
    pub renderer: AnnotationRenderer,
    pub display: Box<dyn DisplaySink>,
    pub events: Option<Box<dyn EventSink>>,
    /// Only used when `events` is set.
    pub snapshots: Option<SnapshotWriter>,
    pub logger: Box<dyn PipelineLogger>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ControllerOptions {
    pub capture: CaptureConfig,
    /// Upper bound on concurrent per-face classifications.
    pub classification_workers: usize,
    pub display_queue: usize,
    pub event_queue: usize,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            classification_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            display_queue: DEFAULT_DISPLAY_QUEUE,
            event_queue: DEFAULT_EVENT_QUEUE,
        }
    }
}

/// Single-use controller: `Idle -> Running -> Stopping -> Stopped`.
///
/// `start()` from any state other than `Idle` fails with
/// [`StartupError::InvalidState`]. `stop()` always completes and is a
/// no-op once `Stopped`. Dropping a running controller stops it.
pub struct PipelineController {
    options: ControllerOptions,
    state: Arc<StateCell>,
    stats: Arc<PipelineStats>,
    components: Option<PipelineComponents>,
    worker: Option<JoinHandle<Result<(), ShutdownError>>>,
    outputs: Option<OutputThreads>,
}

impl PipelineController {
    pub fn new(components: PipelineComponents, options: ControllerOptions) -> Self {
        Self {
            options,
            state: Arc::new(StateCell::new(PipelineState::Idle)),
            stats: Arc::new(PipelineStats::default()),
            components: Some(components),
            worker: None,
            outputs: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state.load()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle::new(self.state.clone())
    }

    /// Opens the frame source on the calling thread and starts the worker.
    ///
    /// A source that cannot be opened leaves the controller `Idle` with its
    /// components intact.
    pub fn start(&mut self) -> Result<(), StartupError> {
        let state = self.state.load();
        if state != PipelineState::Idle {
            return Err(StartupError::InvalidState(state));
        }
        self.options.capture.validate()?;

        let mut components = self
            .components
            .take()
            .ok_or(StartupError::InvalidState(state))?;
        if let Err(e) = components.source.open(&self.options.capture) {
            self.components = Some(components);
            return Err(e);
        }
        let capture = &self.options.capture;
        log::info!(
            "Opened capture device {} at {} @ {} fps",
            capture.device,
            capture.video_size(),
            capture.fps
        );

        let PipelineComponents {
            mut source,
            detector,
            age_classifier,
            gender_classifier,
            renderer,
            display,
            events,
            snapshots,
            logger,
        } = components;

        let (publisher, threads) = match output_channels::spawn(
            display,
            events,
            snapshots,
            OutputConfig {
                display_queue: self.options.display_queue,
                event_queue: self.options.event_queue,
            },
            self.stats.clone(),
        ) {
            Ok(pair) => pair,
            Err(e) => {
                release_source(source.as_mut());
                self.state.store(PipelineState::Stopped);
                return Err(e);
            }
        };

        let classifier = FaceClassifier::new(
            age_classifier,
            gender_classifier,
            self.options.classification_workers,
        );
        let cycle = FrameCycle::new(detector, classifier, renderer);

        self.state.store(PipelineState::Running);
        let worker = std::thread::Builder::new()
            .name("pipeline-worker".into())
            .spawn({
                let state = self.state.clone();
                let stats = self.stats.clone();
                move || run_worker(source, cycle, publisher, logger, &state, &stats)
            });

        match worker {
            Ok(handle) => {
                self.worker = Some(handle);
                self.outputs = Some(threads);
                Ok(())
            }
            Err(source) => {
                self.state.store(PipelineState::Stopped);
                for e in threads.join() {
                    log::warn!("{e}");
                }
                Err(StartupError::Spawn {
                    name: "pipeline-worker",
                    source,
                })
            }
        }
    }

    /// Requests a stop, waits for the in-flight cycle, then releases the
    /// source and drains the output threads. Release failures are logged.
    pub fn stop(&mut self) {
        match self.state.load() {
            PipelineState::Stopped => return,
            PipelineState::Idle => {
                self.components = None;
                self.state.store(PipelineState::Stopped);
                log::info!("Pipeline stopped before it was started");
                return;
            }
            PipelineState::Running | PipelineState::Stopping => {}
        }

        self.state.store(PipelineState::Stopping);

        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::warn!("{e}"),
                Err(_) => log::warn!("{}", ShutdownError::ThreadPanicked("pipeline-worker")),
            }
        }
        if let Some(outputs) = self.outputs.take() {
            for e in outputs.join() {
                log::warn!("{e}");
            }
        }

        self.state.store(PipelineState::Stopped);
        let s = self.stats.snapshot();
        log::info!(
            "Pipeline stopped: {} frames, {} faces classified, {} capture failures, {} display updates dropped",
            s.frames_processed,
            s.faces_classified,
            s.capture_failures,
            s.display_dropped
        );
    }
}

impl Drop for PipelineController {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(
    mut source: Box<dyn FrameSource>,
    mut cycle: FrameCycle,
    publisher: OutputPublisher,
    mut logger: Box<dyn PipelineLogger>,
    state: &StateCell,
    stats: &PipelineStats,
) -> Result<(), ShutdownError> {
    logger.info("Pipeline running");
    let mut completed: u64 = 0;

    while state.load() == PipelineState::Running {
        let t0 = Instant::now();
        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Capture failed, retrying next cycle: {e}");
                PipelineStats::incr(&stats.capture_failures);
                std::thread::sleep(CAPTURE_RETRY_DELAY);
                continue;
            }
        };
        logger.timing("capture", t0.elapsed().as_secs_f64() * 1000.0);

        let processed = cycle.process(&frame, logger.as_mut(), stats);
        publisher.publish(processed);

        completed += 1;
        PipelineStats::incr(&stats.frames_processed);
        logger.cycle(completed);
    }

    drop(publisher);
    logger.summary();
    source.close()
}

fn release_source(source: &mut dyn FrameSource) {
    if let Err(e) = source.close() {
        log::warn!("{e}");
    }
}
