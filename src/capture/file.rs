use super::CaptureSource;
use crate::error::InputError;
use anyhow::{anyhow, Context, Result};
use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;
use image::RgbImage;
use std::path::Path;

/// Decodes a recorded video with ffmpeg, one RGB frame per call.
pub struct FileCapture {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
    fps: f64,
    flushing: bool,
    done: bool,
}

impl FileCapture {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Opening input file {}", path.display());

        ffmpeg_next::init().context("Failed to initialize ffmpeg")?;

        let ictx = ffmpeg_next::format::input(&path).map_err(|e| InputError::File {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let (stream_index, fps, decoder) = {
            let stream = ictx
                .streams()
                .best(ffmpeg_next::media::Type::Video)
                .ok_or_else(|| InputError::NoVideoStream(path.to_path_buf()))?;

            let rate = stream.avg_frame_rate();
            let fps = if rate.denominator() != 0 {
                rate.numerator() as f64 / rate.denominator() as f64
            } else {
                0.0
            };

            let codec_ctx =
                ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
                    .context("Failed to read codec parameters")?;
            let decoder = codec_ctx
                .decoder()
                .video()
                .map_err(|e| InputError::File {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;

            (stream.index(), fps, decoder)
        };

        let width = decoder.width();
        let height = decoder.height();

        let scaler = scaling::Context::get(
            decoder.format(),
            width,
            height,
            Pixel::RGB24,
            width,
            height,
            scaling::Flags::BILINEAR,
        )
        .context("Failed to create RGB scaler")?;

        tracing::info!("Input file is {}x{} at {:.2} fps", width, height, fps);

        Ok(Self {
            ictx,
            decoder,
            scaler,
            stream_index,
            width,
            height,
            fps,
            flushing: false,
            done: false,
        })
    }

    fn receive(&mut self) -> Result<Option<RgbImage>> {
        let mut decoded = Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }

        let mut rgb_frame = Video::empty();
        self.scaler
            .run(&decoded, &mut rgb_frame)
            .context("Failed to convert decoded frame to RGB")?;

        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        RgbImage::from_raw(self.width, self.height, pixels)
            .map(Some)
            .ok_or_else(|| anyhow!("Decoded frame does not match {}x{}", self.width, self.height))
    }
}

impl CaptureSource for FileCapture {
    fn capture_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.done {
            return Ok(None);
        }

        loop {
            if let Some(frame) = self.receive()? {
                return Ok(Some(frame));
            }

            if self.flushing {
                self.done = true;
                return Ok(None);
            }

            match self.ictx.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() != self.stream_index {
                        continue;
                    }
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        tracing::debug!("Skipping undecodable packet: {}", e);
                    }
                }
                None => {
                    // Drain frames still buffered in the decoder.
                    if let Err(e) = self.decoder.send_eof() {
                        tracing::debug!("Decoder flush failed: {}", e);
                    }
                    self.flushing = true;
                }
            }
        }
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn fps(&self) -> f64 {
        self.fps
    }
}

/// Copies an RGB24 ffmpeg frame into a tightly packed buffer, dropping row padding.
fn extract_rgb_pixels(rgb_frame: &Video, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{EncoderSettings, FfmpegEncoder, VideoCodec, VideoEncoder};

    fn write_test_video(path: &Path, frames: u32, width: u32, height: u32) {
        let settings = EncoderSettings {
            path: path.to_path_buf(),
            codec: VideoCodec::Mpeg4,
            fps: 25.0,
            size: (width, height),
        };
        let mut encoder = FfmpegEncoder::open(&settings).unwrap();
        for i in 0..frames {
            let value = ((i * 40) % 256) as u8;
            encoder
                .append(&RgbImage::from_pixel(width, height, image::Rgb([value; 3])))
                .unwrap();
        }
        encoder.finish().unwrap();
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let result = FileCapture::open("/nonexistent/input.mp4");
        let err = result.err().unwrap();
        assert!(err.downcast_ref::<InputError>().is_some());
    }

    #[test]
    fn test_reads_every_frame_then_ends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.mp4");
        write_test_video(&path, 5, 160, 120);

        let mut capture = FileCapture::open(&path).unwrap();
        assert_eq!(capture.resolution(), (160, 120));
        assert!(capture.fps() > 0.0);

        let mut count = 0;
        while let Some(frame) = capture.capture_frame().unwrap() {
            assert_eq!(frame.dimensions(), (160, 120));
            count += 1;
        }
        assert_eq!(count, 5);

        // End of input is sticky.
        assert!(capture.capture_frame().unwrap().is_none());
    }
}
