pub mod image_file_display_sink;
pub mod null_display_sink;
