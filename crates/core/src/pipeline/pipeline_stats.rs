use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters updated from the worker and output threads.
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub(crate) frames_processed: AtomicU64,
    pub(crate) capture_failures: AtomicU64,
    pub(crate) detection_failures: AtomicU64,
    pub(crate) faces_detected: AtomicU64,
    pub(crate) faces_classified: AtomicU64,
    pub(crate) classification_failures: AtomicU64,
    pub(crate) display_presented: AtomicU64,
    pub(crate) display_dropped: AtomicU64,
    pub(crate) display_failures: AtomicU64,
    pub(crate) events_recorded: AtomicU64,
    pub(crate) events_dropped: AtomicU64,
    pub(crate) event_failures: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames_processed: u64,
    pub capture_failures: u64,
    pub detection_failures: u64,
    pub faces_detected: u64,
    pub faces_classified: u64,
    pub classification_failures: u64,
    pub display_presented: u64,
    pub display_dropped: u64,
    pub display_failures: u64,
    pub events_recorded: u64,
    pub events_dropped: u64,
    pub event_failures: u64,
}

impl PipelineStats {
    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        Self::add(counter, 1);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            frames_processed: get(&self.frames_processed),
            capture_failures: get(&self.capture_failures),
            detection_failures: get(&self.detection_failures),
            faces_detected: get(&self.faces_detected),
            faces_classified: get(&self.faces_classified),
            classification_failures: get(&self.classification_failures),
            display_presented: get(&self.display_presented),
            display_dropped: get(&self.display_dropped),
            display_failures: get(&self.display_failures),
            events_recorded: get(&self.events_recorded),
            events_dropped: get(&self.events_dropped),
            event_failures: get(&self.event_failures),
        }
    }
}
