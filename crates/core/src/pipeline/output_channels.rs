//! Queues and threads that decouple the processing loop from the display
//! and the event log.
//!
//! The worker only ever calls [`OutputPublisher::publish`], which uses
//! `try_send` on bounded queues: a slow collaborator costs dropped updates,
//! never a stalled capture.
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

use chrono::{DateTime, Local};
use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::classification::domain::classification::Classification;
use crate::display::domain::display_sink::DisplaySink;
use crate::events::domain::detection_event::DetectionEvent;
use crate::events::domain::event_sink::EventSink;
use crate::events::infrastructure::snapshot_writer::SnapshotWriter;
use crate::pipeline::frame_cycle::ProcessedFrame;
use crate::pipeline::pipeline_stats::PipelineStats;
use crate::rendering::annotated_frame::AnnotatedFrame;
use crate::shared::error::{DisplayError, EventSinkError, ShutdownError, StartupError};
use crate::shared::frame::Frame;

/// Classified faces of one frame, bound for the event log.
struct EventBatch {
    captured_at: DateTime<Local>,
    classifications: Vec<Classification>,
    snapshot: Option<Frame>,
}

/// Sending half, owned by the processing worker.
pub(crate) struct OutputPublisher {
    display_tx: Sender<AnnotatedFrame>,
    event_tx: Option<Sender<EventBatch>>,
    snapshots: bool,
    stats: Arc<PipelineStats>,
}

/// Receiving threads, owned by the controller until shutdown.
pub(crate) struct OutputThreads {
    presenter: JoinHandle<Result<(), DisplayError>>,
    recorder: Option<JoinHandle<Result<(), EventSinkError>>>,
}

pub(crate) struct OutputConfig {
    pub display_queue: usize,
    pub event_queue: usize,
}

/// Starts the presenter thread, plus the recorder thread when an event
/// sink is configured.
pub(crate) fn spawn(
    display: Box<dyn DisplaySink>,
    events: Option<Box<dyn EventSink>>,
    snapshots: Option<SnapshotWriter>,
    config: OutputConfig,
    stats: Arc<PipelineStats>,
) -> Result<(OutputPublisher, OutputThreads), StartupError> {
    let (display_tx, display_rx) = crossbeam_channel::bounded(config.display_queue.max(1));
    let presenter = std::thread::Builder::new()
        .name("presenter".into())
        .spawn({
            let stats = stats.clone();
            move || run_presenter(display, display_rx, &stats)
        })
        .map_err(|source| StartupError::Spawn {
            name: "presenter",
            source,
        })?;

    let (event_tx, recorder, snapshots_enabled) = match events {
        Some(sink) => {
            let snapshots_enabled = snapshots.is_some();
            let (tx, rx) = crossbeam_channel::bounded(config.event_queue.max(1));
            let handle = std::thread::Builder::new()
                .name("event-recorder".into())
                .spawn({
                    let stats = stats.clone();
                    move || run_recorder(sink, snapshots, rx, &stats)
                })
                .map_err(|source| StartupError::Spawn {
                    name: "event-recorder",
                    source,
                })?;
            (Some(tx), Some(handle), snapshots_enabled)
        }
        None => (None, None, false),
    };

    Ok((
        OutputPublisher {
            display_tx,
            event_tx,
            snapshots: snapshots_enabled,
            stats,
        },
        OutputThreads {
            presenter,
            recorder,
        },
    ))
}

impl OutputPublisher {
    /// Hands one cycle's output to the display and event queues without
    /// blocking.
    pub(crate) fn publish(&self, processed: ProcessedFrame) {
        let ProcessedFrame {
            annotated,
            classifications,
        } = processed;

        if let Some(event_tx) = &self.event_tx {
            if !classifications.is_empty() {
                let count = classifications.len() as u64;
                let batch = EventBatch {
                    captured_at: annotated.frame().captured_at(),
                    classifications,
                    snapshot: self.snapshots.then(|| annotated.frame().clone()),
                };
                if event_tx.try_send(batch).is_err() {
                    log::debug!("Event queue full, dropping {count} events");
                    PipelineStats::add(&self.stats.events_dropped, count);
                }
            }
        }

        match self.display_tx.try_send(annotated) {
            Ok(()) => {}
            Err(TrySendError::Full(frame)) => {
                log::debug!(
                    "Display queue full, dropping frame {}",
                    frame.frame().sequence()
                );
                PipelineStats::incr(&self.stats.display_dropped);
            }
            Err(TrySendError::Disconnected(_)) => {
                PipelineStats::incr(&self.stats.display_dropped);
            }
        }
    }
}

impl OutputThreads {
    /// Waits for both threads to drain their queues and close their sinks.
    /// Every publisher must have been dropped first.
    pub(crate) fn join(self) -> Vec<ShutdownError> {
        let mut errors = Vec::new();
        match self.presenter.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => errors.push(ShutdownError::Display(e)),
            Err(_) => errors.push(ShutdownError::ThreadPanicked("presenter")),
        }
        if let Some(recorder) = self.recorder {
            match recorder.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => errors.push(ShutdownError::Events(e)),
                Err(_) => errors.push(ShutdownError::ThreadPanicked("event-recorder")),
            }
        }
        errors
    }
}

fn run_presenter(
    mut sink: Box<dyn DisplaySink>,
    rx: Receiver<AnnotatedFrame>,
    stats: &PipelineStats,
) -> Result<(), DisplayError> {
    for frame in rx {
        match sink.present(&frame) {
            Ok(()) => PipelineStats::incr(&stats.display_presented),
            Err(e) => {
                log::warn!("Display update for frame {} failed: {e}", frame.frame().sequence());
                PipelineStats::incr(&stats.display_failures);
            }
        }
    }
    sink.close()
}

fn run_recorder(
    mut sink: Box<dyn EventSink>,
    snapshots: Option<SnapshotWriter>,
    rx: Receiver<EventBatch>,
    stats: &PipelineStats,
) -> Result<(), EventSinkError> {
    for batch in rx {
        let image_path: Option<PathBuf> = match (&snapshots, &batch.snapshot) {
            (Some(writer), Some(frame)) => match writer.save(frame) {
                Ok(path) => Some(path),
                Err(e) => {
                    log::warn!("Snapshot for frame {} failed: {e}", frame.sequence());
                    None
                }
            },
            _ => None,
        };

        for classification in &batch.classifications {
            let event = DetectionEvent::new(classification, batch.captured_at, image_path.clone());
            match sink.record(&event) {
                Ok(()) => PipelineStats::incr(&stats.events_recorded),
                Err(e) => {
                    log::warn!("Failed to record detection event: {e}");
                    PipelineStats::incr(&stats.event_failures);
                }
            }
        }
    }
    sink.flush()
}
