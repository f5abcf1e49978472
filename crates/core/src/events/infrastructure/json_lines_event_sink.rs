use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::events::domain::detection_event::DetectionEvent;
use crate::events::domain::event_sink::EventSink;
use crate::shared::error::EventSinkError;

/// Appends one JSON object per event to a file.
pub struct JsonLinesEventSink {
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl JsonLinesEventSink {
    /// Opens `path` for appending, creating it and its parent directory.
    pub fn open(path: &Path) -> Result<Self, EventSinkError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl EventSink for JsonLinesEventSink {
    fn record(&mut self, event: &DetectionEvent) -> Result<(), EventSinkError> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), EventSinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::domain::age_classifier::AgeRange;
    use crate::classification::domain::classification::Classification;
    use crate::classification::domain::gender_classifier::Gender;

    fn event(low: u32, high: u32, gender: Gender) -> DetectionEvent {
        let c = Classification::new(AgeRange::new(low, high).unwrap(), gender);
        DetectionEvent::new(&c, chrono::Local::now(), None)
    }

    fn read_events(path: &Path) -> Vec<DetectionEvent> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("events.jsonl");
        let mut sink = JsonLinesEventSink::open(&path).unwrap();
        sink.record(&event(25, 32, Gender::Male)).unwrap();
        sink.record(&event(4, 6, Gender::Female)).unwrap();
        sink.flush().unwrap();

        let events = read_events(&path);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].estimation, "4-6");
        assert_eq!(sink.written(), 2);
    }

    #[test]
    fn test_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        for _ in 0..2 {
            let mut sink = JsonLinesEventSink::open(&path).unwrap();
            sink.record(&event(15, 20, Gender::Male)).unwrap();
            sink.flush().unwrap();
        }
        assert_eq!(read_events(&path).len(), 2);
    }
}
