use crate::capture::domain::capture_config::CaptureConfig;
use crate::capture::domain::frame_source::FrameSource;
use crate::shared::error::{CaptureError, ShutdownError, StartupError};
use crate::shared::frame::Frame;

/// Grabs frames from a capture device (or any ffmpeg-readable input) via
/// libavdevice/libavformat.
///
/// Every decoded picture is converted to packed RGB24 at the configured
/// resolution, whatever the device actually negotiated.
pub struct FfmpegCaptureSource {
    input_ctx: Option<ffmpeg_next::format::context::Input>,
    decoder: Option<ffmpeg_next::decoder::Video>,
    scaler: Option<ffmpeg_next::software::scaling::Context>,
    stream_index: usize,
    width: u32,
    height: u32,
    sequence: u64,
}

// Safety: FfmpegCaptureSource is owned by exactly one thread at a time
// (opened by the controller, then moved into the worker). The raw pointers
// inside ffmpeg types are never shared.
unsafe impl Send for FfmpegCaptureSource {}

impl FfmpegCaptureSource {
    pub fn new() -> Self {
        Self {
            input_ctx: None,
            decoder: None,
            scaler: None,
            stream_index: 0,
            width: 0,
            height: 0,
            sequence: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.input_ctx.is_some()
    }

    fn open_input(
        config: &CaptureConfig,
    ) -> Result<ffmpeg_next::format::context::Input, ffmpeg_next::Error> {
        let Some(format_name) = config.format.as_deref() else {
            return ffmpeg_next::format::input(&config.device);
        };

        let mut options = ffmpeg_next::Dictionary::new();
        options.set("video_size", &config.video_size());
        options.set("framerate", &config.fps.to_string());

        let device_format =
            ffmpeg_next::device::input::video().find(|f| f.name() == format_name);
        match device_format {
            Some(format) => {
                let context = ffmpeg_next::format::open_with(
                    &config.device,
                    &ffmpeg_next::format::format::Format::Input(format),
                    options,
                )?;
                match context {
                    ffmpeg_next::format::context::Context::Input(input) => Ok(input),
                    ffmpeg_next::format::context::Context::Output(_) => {
                        Err(ffmpeg_next::Error::InvalidData)
                    }
                }
            }
            None => {
                log::warn!("Input format '{format_name}' not registered, probing {}", config.device);
                ffmpeg_next::format::input_with_dictionary(&config.device, options)
            }
        }
    }
}

impl Default for FfmpegCaptureSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for FfmpegCaptureSource {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), StartupError> {
        config.validate()?;

        let device_err = |reason: String| StartupError::DeviceOpen {
            device: config.device.clone(),
            reason,
        };

        ffmpeg_next::init().map_err(|e| device_err(e.to_string()))?;
        ffmpeg_next::device::register_all();

        let ictx = Self::open_input(config).map_err(|e| device_err(e.to_string()))?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| device_err("no video stream".into()))?;
        let stream_index = stream.index();

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| device_err(e.to_string()))?;
        let decoder = codec_ctx
            .decoder()
            .video()
            .map_err(|e| device_err(e.to_string()))?;

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg_next::format::Pixel::RGB24,
            config.width,
            config.height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| device_err(e.to_string()))?;

        log::debug!(
            "Opened {} ({}x{} native, {} output)",
            config.device,
            decoder.width(),
            decoder.height(),
            config.video_size()
        );

        self.stream_index = stream_index;
        self.width = config.width;
        self.height = config.height;
        self.sequence = 0;
        self.input_ctx = Some(ictx);
        self.decoder = Some(decoder);
        self.scaler = Some(scaler);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        let (Some(ictx), Some(decoder), Some(scaler)) = (
            self.input_ctx.as_mut(),
            self.decoder.as_mut(),
            self.scaler.as_mut(),
        ) else {
            return Err(CaptureError::NotOpen);
        };

        loop {
            let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
            if decoder.receive_frame(&mut decoded).is_ok() {
                let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
                scaler
                    .run(&decoded, &mut rgb_frame)
                    .map_err(|e| CaptureError::Decode(e.to_string()))?;
                let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
                let frame = Frame::new(pixels, self.width, self.height, 3, self.sequence);
                self.sequence += 1;
                return Ok(frame);
            }

            let Some((stream, packet)) = ictx.packets().next() else {
                return Err(CaptureError::EndOfStream);
            };
            if stream.index() != self.stream_index {
                continue;
            }
            decoder
                .send_packet(&packet)
                .map_err(|e| CaptureError::Decode(e.to_string()))?;
        }
    }

    fn close(&mut self) -> Result<(), ShutdownError> {
        self.scaler = None;
        self.decoder = None;
        self.input_ctx = None;
        Ok(())
    }
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer,
/// dropping the per-row stride padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    /// Encodes a short MPEG-4 clip of flat gray frames.
    fn create_test_video(path: &Path, num_frames: usize, width: u32, height: u32) {
        ffmpeg_next::init().unwrap();
        let fps = 30;

        let mut octx = ffmpeg_next::format::output(path).unwrap();
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4).unwrap();
        let mut ost = octx.add_stream(Some(codec)).unwrap();

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .unwrap();
        encoder_ctx.set_width(width);
        encoder_ctx.set_height(height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, fps));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));
        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let mut encoder = encoder_ctx
            .open_with(ffmpeg_next::Dictionary::new())
            .unwrap();
        ost.set_parameters(&encoder);
        octx.write_header().unwrap();
        let ost_time_base = octx.stream(0).unwrap().time_base();

        let mut scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::format::Pixel::YUV420P,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .unwrap();

        let drain = |encoder: &mut ffmpeg_next::encoder::Video,
                         octx: &mut ffmpeg_next::format::context::Output| {
            let mut encoded = ffmpeg_next::Packet::empty();
            while encoder.receive_packet(&mut encoded).is_ok() {
                encoded.set_stream(0);
                encoded.rescale_ts(ffmpeg_next::Rational(1, fps), ost_time_base);
                encoded.write_interleaved(octx).unwrap();
            }
        };

        for i in 0..num_frames {
            let mut rgb_frame = ffmpeg_next::util::frame::video::Video::new(
                ffmpeg_next::format::Pixel::RGB24,
                width,
                height,
            );
            let stride = rgb_frame.stride(0);
            let value = ((i * 40) % 256) as u8;
            let data = rgb_frame.data_mut(0);
            for row in 0..height as usize {
                for col in 0..(width as usize * 3) {
                    data[row * stride + col] = value;
                }
            }

            let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
            scaler.run(&rgb_frame, &mut yuv_frame).unwrap();
            yuv_frame.set_pts(Some(i as i64));
            encoder.send_frame(&yuv_frame).unwrap();
            drain(&mut encoder, &mut octx);
        }

        encoder.send_eof().unwrap();
        drain(&mut encoder, &mut octx);
        octx.write_trailer().unwrap();
    }

    fn file_config(path: &Path, width: u32, height: u32) -> CaptureConfig {
        CaptureConfig {
            device: path.to_string_lossy().into_owned(),
            format: None,
            width,
            height,
            fps: 30,
        }
    }

    #[test]
    fn test_open_missing_device_is_startup_error() {
        let mut source = FfmpegCaptureSource::new();
        let result = source.open(&file_config(Path::new("/nonexistent/video9"), 64, 48));
        assert!(matches!(result, Err(StartupError::DeviceOpen { .. })));
        assert!(!source.is_open());
    }

    #[test]
    fn test_next_frame_without_open_is_capture_error() {
        let mut source = FfmpegCaptureSource::new();
        assert!(matches!(source.next_frame(), Err(CaptureError::NotOpen)));
    }

    #[test]
    fn test_frames_are_scaled_to_configured_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        create_test_video(&path, 3, 160, 120);

        let mut source = FfmpegCaptureSource::new();
        source.open(&file_config(&path, 80, 60)).unwrap();

        let frame = source.next_frame().unwrap();
        assert_eq!(frame.width(), 80);
        assert_eq!(frame.height(), 60);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.data().len(), 80 * 60 * 3);
    }

    #[test]
    fn test_sequence_numbers_increase_until_end_of_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        create_test_video(&path, 3, 160, 120);

        let mut source = FfmpegCaptureSource::new();
        source.open(&file_config(&path, 160, 120)).unwrap();

        let mut sequences = Vec::new();
        loop {
            match source.next_frame() {
                Ok(frame) => sequences.push(frame.sequence()),
                Err(CaptureError::EndOfStream) => break,
                Err(e) => panic!("unexpected capture error: {e}"),
            }
        }
        assert_eq!(sequences, vec![0, 1, 2]);
    }

    #[test]
    fn test_close_is_idempotent_and_releases_device() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        create_test_video(&path, 1, 160, 120);

        let mut source = FfmpegCaptureSource::new();
        source.open(&file_config(&path, 160, 120)).unwrap();
        source.close().unwrap();
        source.close().unwrap();
        assert!(matches!(source.next_frame(), Err(CaptureError::NotOpen)));
    }
}
