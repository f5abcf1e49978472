pub mod json_lines_event_sink;
pub mod snapshot_writer;
