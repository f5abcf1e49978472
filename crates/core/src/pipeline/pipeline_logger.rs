use std::collections::BTreeMap;
use std::time::Instant;

/// Cross-cutting logger for pipeline loop events.
///
/// Lets the controller report cycle progress, stage timings and per-frame
/// metrics without knowing where they end up.
pub trait PipelineLogger: Send {
    /// Called after each completed cycle with the running total.
    fn cycle(&mut self, completed: u64);

    /// Record how long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a per-frame value such as the number of faces found.
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards everything.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn cycle(&mut self, _completed: u64) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running aggregate of one stage timing or metric.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aggregate {
    pub count: u64,
    pub total: f64,
    pub max: f64,
    pub last: f64,
}

impl Aggregate {
    fn record(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
        self.max = if self.count == 1 { value } else { self.max.max(value) };
        self.last = value;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Aggregates stage timings and metrics and reports through the `log`
/// crate.
///
/// A live stream has no known end, so samples are folded into constant-size
/// aggregates and a progress line is emitted every `throttle_cycles` frames.
pub struct StatsPipelineLogger {
    throttle_cycles: u64,
    timings: BTreeMap<String, Aggregate>,
    metrics: BTreeMap<String, Aggregate>,
    started: Instant,
    cycles: u64,
}

impl StatsPipelineLogger {
    pub fn new(throttle_cycles: u64) -> Self {
        Self {
            throttle_cycles: throttle_cycles.max(1),
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
            started: Instant::now(),
            cycles: 0,
        }
    }

    /// Multi-line run summary, or `None` before anything was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_s = self.started.elapsed().as_secs_f64();
        let mut out = format!(
            "Pipeline summary ({} frames in {elapsed_s:.1}s):",
            self.cycles
        );
        for (stage, agg) in &self.timings {
            out.push_str(&format!(
                "\n  {stage:10}: avg {:6.1}ms  max {:6.1}ms  over {} frames",
                agg.mean(),
                agg.max,
                agg.count
            ));
        }
        for (name, agg) in &self.metrics {
            out.push_str(&format!(
                "\n  {name}: avg {:.1}  total {:.0}",
                agg.mean(),
                agg.total
            ));
        }
        if let Some(fps) = frames_per_second(self.cycles, elapsed_s) {
            out.push_str(&format!("\n  Throughput: {fps:.1} fps"));
        }
        Some(out)
    }

    pub fn timings_for(&self, stage: &str) -> Option<&Aggregate> {
        self.timings.get(stage)
    }

    pub fn metrics_for(&self, name: &str) -> Option<&Aggregate> {
        self.metrics.get(name)
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    fn progress_line(&self) -> String {
        let mut line = format!("Processed {} frames", self.cycles);
        if let Some(fps) = frames_per_second(self.cycles, self.started.elapsed().as_secs_f64()) {
            line.push_str(&format!(" ({fps:.1} fps)"));
        }
        if let Some(faces) = self.metrics.get("faces") {
            line.push_str(&format!(", {:.0} faces seen", faces.total));
        }
        line
    }
}

impl Default for StatsPipelineLogger {
    fn default() -> Self {
        Self::new(100)
    }
}

impl PipelineLogger for StatsPipelineLogger {
    fn cycle(&mut self, completed: u64) {
        self.cycles = completed;
        if completed % self.throttle_cycles == 0 {
            log::info!("{}", self.progress_line());
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings.entry(stage.to_owned()).or_default().record(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_owned()).or_default().record(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("{text}");
        }
    }
}

fn frames_per_second(frames: u64, elapsed_s: f64) -> Option<f64> {
    (frames > 0 && elapsed_s > 0.0).then(|| frames as f64 / elapsed_s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_logger_accepts_everything() {
        let mut logger = NullPipelineLogger;
        logger.cycle(1);
        logger.timing("detect", 5.0);
        logger.metric("faces", 3.0);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_timings_fold_into_aggregates() {
        let mut logger = StatsPipelineLogger::new(10);
        logger.timing("detect", 20.0);
        logger.timing("detect", 40.0);
        logger.timing("detect", 30.0);
        logger.timing("classify", 5.0);

        let detect = logger.timings_for("detect").unwrap();
        assert_eq!(detect.count, 3);
        assert_relative_eq!(detect.mean(), 30.0);
        assert_relative_eq!(detect.max, 40.0);
        assert_relative_eq!(detect.last, 30.0);
        assert_eq!(logger.timings_for("classify").unwrap().count, 1);
        assert!(logger.timings_for("annotate").is_none());
    }

    #[test]
    fn test_negative_first_sample_sets_max() {
        let mut agg = Aggregate::default();
        agg.record(-2.0);
        assert_relative_eq!(agg.max, -2.0);
        assert_relative_eq!(Aggregate::default().mean(), 0.0);
    }

    #[test]
    fn test_summary_lists_stages_and_metrics() {
        let mut logger = StatsPipelineLogger::new(10);
        logger.cycle(2);
        logger.timing("detect", 20.0);
        logger.timing("annotate", 1.0);
        logger.metric("faces", 2.0);
        logger.metric("faces", 1.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.starts_with("Pipeline summary (2 frames"));
        let annotate = summary.find("annotate").unwrap();
        let detect = summary.find("detect").unwrap();
        assert!(annotate < detect, "stages are listed alphabetically");
        assert!(summary.contains("faces: avg 1.5  total 3"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(StatsPipelineLogger::new(10).summary_string().is_none());
    }

    #[test]
    fn test_progress_line_reports_faces() {
        let mut logger = StatsPipelineLogger::new(10);
        logger.metric("faces", 2.0);
        logger.metric("faces", 3.0);
        logger.cycle(2);
        let line = logger.progress_line();
        assert!(line.starts_with("Processed 2 frames"));
        assert!(line.ends_with("5 faces seen"));
    }

    #[test]
    fn test_cycle_tracks_latest_count() {
        let mut logger = StatsPipelineLogger::new(10);
        for i in 1..=25 {
            logger.cycle(i);
        }
        assert_eq!(logger.cycles(), 25);
    }

    #[test]
    fn test_zero_throttle_is_clamped() {
        assert_eq!(StatsPipelineLogger::new(0).throttle_cycles, 1);
        assert_eq!(StatsPipelineLogger::default().throttle_cycles, 100);
    }

    #[test]
    fn test_frames_per_second() {
        assert!(frames_per_second(0, 1.0).is_none());
        assert!(frames_per_second(10, 0.0).is_none());
        assert_relative_eq!(frames_per_second(30, 1.0).unwrap(), 30.0);
    }
}
