use super::VideoEncoder;
use crate::error::EncoderError;
use anyhow::Result;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;
use ffmpeg_next::{codec, Rational};
use image::{imageops, RgbImage};
use std::path::PathBuf;

/// Frame rate used when the source does not report one.
const FALLBACK_FPS: i32 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VideoCodec {
    /// MPEG-4 Part 2 (DivX-compatible) in an `.mp4` container
    Mpeg4,
    /// Motion JPEG in an `.avi` container
    Mjpeg,
}

impl VideoCodec {
    pub fn extension(self) -> &'static str {
        match self {
            VideoCodec::Mpeg4 => ".mp4",
            VideoCodec::Mjpeg => ".avi",
        }
    }

    fn codec_id(self) -> codec::Id {
        match self {
            VideoCodec::Mpeg4 => codec::Id::MPEG4,
            VideoCodec::Mjpeg => codec::Id::MJPEG,
        }
    }

    fn pixel_format(self) -> Pixel {
        match self {
            VideoCodec::Mpeg4 => Pixel::YUV420P,
            VideoCodec::Mjpeg => Pixel::YUVJ420P,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EncoderSettings {
    pub path: PathBuf,
    pub codec: VideoCodec,
    pub fps: f64,
    /// Target (width, height); frames of another size are resized
    pub size: (u32, u32),
}

/// Encodes RGB frames into a video file via ffmpeg-next.
///
/// Frames are timestamped sequentially at the configured rate, so gaps in
/// the frames handed to `append` are not represented in the file.
pub struct FfmpegEncoder {
    path: PathBuf,
    octx: ffmpeg_next::format::context::Output,
    encoder: codec::encoder::video::Encoder,
    scaler: scaling::Context,
    width: u32,
    height: u32,
    fps: i32,
    frame_count: u64,
    finished: bool,
}

impl FfmpegEncoder {
    pub fn open(settings: &EncoderSettings) -> Result<Self, EncoderError> {
        let fail = |reason: String| EncoderError::Open {
            path: settings.path.clone(),
            reason,
        };

        ffmpeg_next::init().map_err(|e| fail(e.to_string()))?;

        let (width, height) = settings.size;
        let fps = match settings.fps.round() as i32 {
            fps if fps > 0 => fps,
            _ => FALLBACK_FPS,
        };

        let mut octx = ffmpeg_next::format::output(&settings.path).map_err(|e| fail(e.to_string()))?;

        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let encoder_codec = ffmpeg_next::encoder::find(settings.codec.codec_id())
            .ok_or_else(|| fail(format!("{:?} encoder not available", settings.codec)))?;

        let mut ost = octx
            .add_stream(Some(encoder_codec))
            .map_err(|e| fail(e.to_string()))?;

        let mut encoder_ctx = codec::context::Context::new_with_codec(encoder_codec)
            .encoder()
            .video()
            .map_err(|e| fail(e.to_string()))?;

        encoder_ctx.set_width(width);
        encoder_ctx.set_height(height);
        encoder_ctx.set_format(settings.codec.pixel_format());
        encoder_ctx.set_time_base(Rational(1, fps));
        encoder_ctx.set_frame_rate(Some(Rational(fps, 1)));

        if global_header {
            encoder_ctx.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder_ctx
            .open_with(ffmpeg_next::Dictionary::new())
            .map_err(|e| fail(e.to_string()))?;
        ost.set_parameters(&encoder);

        octx.write_header().map_err(|e| fail(e.to_string()))?;

        let scaler = scaling::Context::get(
            Pixel::RGB24,
            width,
            height,
            settings.codec.pixel_format(),
            width,
            height,
            scaling::Flags::BILINEAR,
        )
        .map_err(|e| fail(e.to_string()))?;

        Ok(Self {
            path: settings.path.clone(),
            octx,
            encoder,
            scaler,
            width,
            height,
            fps,
            frame_count: 0,
            finished: false,
        })
    }

    fn write_packets(&mut self) -> Result<(), ffmpeg_next::Error> {
        let ost_time_base = self
            .octx
            .stream(0)
            .map(|stream| stream.time_base())
            .ok_or(ffmpeg_next::Error::StreamNotFound)?;

        let mut encoded = ffmpeg_next::Packet::empty();
        while self.encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(0);
            encoded.rescale_ts(Rational(1, self.fps), ost_time_base);
            encoded.write_interleaved(&mut self.octx)?;
        }
        Ok(())
    }

    fn encode(&mut self, frame: &RgbImage) -> Result<(), ffmpeg_next::Error> {
        let mut rgb_frame = Video::new(Pixel::RGB24, self.width, self.height);

        // Copy pixel data, respecting stride
        let stride = rgb_frame.stride(0);
        let row_bytes = self.width as usize * 3;
        let data = rgb_frame.data_mut(0);
        for (row, src) in frame.as_raw().chunks_exact(row_bytes).enumerate() {
            data[row * stride..row * stride + row_bytes].copy_from_slice(src);
        }

        let mut yuv_frame = Video::empty();
        self.scaler.run(&rgb_frame, &mut yuv_frame)?;
        yuv_frame.set_pts(Some(self.frame_count as i64));

        self.encoder.send_frame(&yuv_frame)?;
        self.write_packets()
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn append(&mut self, frame: &RgbImage) -> Result<()> {
        if self.finished {
            return Err(EncoderError::Append {
                index: self.frame_count,
                reason: format!("{} is already finalized", self.path.display()),
            }
            .into());
        }

        let resized;
        let frame = if frame.dimensions() != (self.width, self.height) {
            resized = imageops::resize(
                frame,
                self.width,
                self.height,
                imageops::FilterType::Lanczos3,
            );
            &resized
        } else {
            frame
        };

        self.encode(frame).map_err(|e| EncoderError::Append {
            index: self.frame_count,
            reason: e.to_string(),
        })?;
        self.frame_count += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        let flushed = self
            .encoder
            .send_eof()
            .and_then(|_| self.write_packets())
            .and_then(|_| self.octx.write_trailer());

        flushed.map_err(|e| {
            EncoderError::Finish {
                path: self.path.clone(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            tracing::warn!("{:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn settings(dir: &std::path::Path, name: &str, codec: VideoCodec) -> EncoderSettings {
        EncoderSettings {
            path: dir.join(name),
            codec,
            fps: 30.0,
            size: (160, 120),
        }
    }

    fn solid(width: u32, height: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([value; 3]))
    }

    #[test]
    fn test_extensions() {
        assert_eq!(VideoCodec::Mpeg4.extension(), ".mp4");
        assert_eq!(VideoCodec::Mjpeg.extension(), ".avi");
    }

    #[test]
    fn test_write_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path(), "out.mp4", VideoCodec::Mpeg4);

        let mut encoder = FfmpegEncoder::open(&settings).unwrap();
        for i in 0..3 {
            encoder.append(&solid(160, 120, i * 60)).unwrap();
        }
        encoder.finish().unwrap();

        assert!(std::fs::metadata(&settings.path).unwrap().len() > 0);
    }

    #[test]
    fn test_mjpg_writes_avi() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path(), "out.avi", VideoCodec::Mjpeg);

        let mut encoder = FfmpegEncoder::open(&settings).unwrap();
        encoder.append(&solid(160, 120, 128)).unwrap();
        encoder.finish().unwrap();

        assert!(std::fs::metadata(&settings.path).unwrap().len() > 0);
    }

    #[test]
    fn test_mismatched_frames_are_resized() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path(), "out.mp4", VideoCodec::Mpeg4);

        let mut encoder = FfmpegEncoder::open(&settings).unwrap();
        encoder.append(&solid(100, 50, 200)).unwrap();
        encoder.finish().unwrap();
    }

    #[test]
    fn test_append_after_finish_fails() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path(), "out.mp4", VideoCodec::Mpeg4);

        let mut encoder = FfmpegEncoder::open(&settings).unwrap();
        encoder.finish().unwrap();
        encoder.finish().unwrap();
        assert!(encoder.append(&solid(160, 120, 0)).is_err());
    }

    #[test]
    fn test_open_in_missing_directory_fails() {
        let settings = EncoderSettings {
            path: PathBuf::from("/nonexistent/dir/out.mp4"),
            codec: VideoCodec::Mpeg4,
            fps: 30.0,
            size: (160, 120),
        };
        assert!(matches!(
            FfmpegEncoder::open(&settings),
            Err(EncoderError::Open { .. })
        ));
    }
}
