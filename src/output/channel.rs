use super::encoder::{EncoderSettings, FfmpegEncoder};
use super::mirror::{self, Side};
use super::{DisplaySurface, VideoEncoder};
use crate::controls::KeyPress;
use anyhow::Result;
use image::RgbImage;
use std::path::PathBuf;

/// How a channel turns the input frame into its output frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reflection {
    /// Raw input, shown whether or not a face was found.
    None,
    /// Left of the axis mirrored onto the right. Only shown when a face anchors the axis.
    Left,
    /// Right of the axis mirrored onto the left. Only shown when a face anchors the axis.
    Right,
}

impl Reflection {
    fn side(self) -> Option<Side> {
        match self {
            Reflection::None => None,
            Reflection::Left => Some(Side::Left),
            Reflection::Right => Some(Side::Right),
        }
    }
}

/// File output lifecycle. Once left, `Unconfigured` is never re-entered.
enum FileSink {
    Unconfigured,
    Open {
        path: PathBuf,
        encoder: Box<dyn VideoEncoder>,
    },
    Failed,
    Closed,
}

/// One logical output stream: an optional live display plus an optional
/// encoded file, fed with either the raw frame or a reflected composition.
pub struct OutputChannel {
    title: String,
    width: u32,
    reflection: Reflection,
    display: Option<Box<dyn DisplaySurface>>,
    file: FileSink,
    frames_emitted: u64,
}

impl OutputChannel {
    pub fn new(title: impl Into<String>, width: u32, reflection: Reflection) -> Self {
        Self {
            title: title.into(),
            width,
            reflection,
            display: None,
            file: FileSink::Unconfigured,
            frames_emitted: 0,
        }
    }

    pub fn with_display(mut self, display: Box<dyn DisplaySurface>) -> Self {
        self.display = Some(display);
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    #[cfg(test)]
    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted
    }

    #[cfg(test)]
    pub fn has_file_output(&self) -> bool {
        matches!(self.file, FileSink::Open { .. })
    }

    pub fn has_open_display(&self) -> bool {
        self.display.as_ref().is_some_and(|d| d.is_open())
    }

    /// Enable file output with an ffmpeg encoder.
    pub fn set_file_output(&mut self, settings: &EncoderSettings) {
        self.set_file_output_with(settings, |settings| {
            Ok(Box::new(FfmpegEncoder::open(settings)?) as Box<dyn VideoEncoder>)
        });
    }

    /// Enable file output with the encoder produced by `open`.
    ///
    /// File output can be enabled once. A failed open leaves the channel
    /// display-only for the rest of the run.
    pub fn set_file_output_with<F>(&mut self, settings: &EncoderSettings, open: F)
    where
        F: FnOnce(&EncoderSettings) -> Result<Box<dyn VideoEncoder>>,
    {
        match &self.file {
            FileSink::Unconfigured => {}
            FileSink::Open { path, .. } => {
                tracing::warn!(
                    "{}: file output already writes to {}, ignoring {}",
                    self.title,
                    path.display(),
                    settings.path.display()
                );
                return;
            }
            FileSink::Failed | FileSink::Closed => {
                tracing::warn!(
                    "{}: file output is disabled, not opening {}",
                    self.title,
                    settings.path.display()
                );
                return;
            }
        }

        match open(settings) {
            Ok(encoder) => {
                tracing::info!(
                    "{}: saving {}x{} to {}",
                    self.title,
                    settings.size.0,
                    settings.size.1,
                    settings.path.display()
                );
                self.file = FileSink::Open {
                    path: settings.path.clone(),
                    encoder,
                };
            }
            Err(e) => {
                tracing::warn!(
                    "{}: cannot create output file {}, continuing without it: {:#}",
                    self.title,
                    settings.path.display(),
                    e
                );
                self.file = FileSink::Failed;
            }
        }
    }

    /// Display a frame for which no mirror axis is known.
    ///
    /// Reflected channels have nothing to show without a face.
    pub fn display(&mut self, frame: &RgbImage) {
        if self.reflection == Reflection::None {
            self.emit(frame);
        }
    }

    /// Display a frame with the mirror axis found on it.
    pub fn display_with_axis(&mut self, frame: &RgbImage, axis: u32) {
        match self.reflection.side() {
            None => self.emit(frame),
            Some(side) => {
                let composed = mirror::reflect(frame, side, axis, self.width);
                self.emit(&composed);
            }
        }
    }

    /// Keys pressed in this channel's window since the last poll.
    pub fn poll_keys(&mut self) -> Vec<KeyPress> {
        self.display
            .as_mut()
            .map(|display| display.poll_keys())
            .unwrap_or_default()
    }

    /// Finalize the output file, if any. Further file output stays disabled.
    pub fn close(&mut self) {
        if let FileSink::Open { path, encoder } = &mut self.file {
            match encoder.finish() {
                Ok(()) => tracing::info!(
                    "{}: closed {} after {} frames",
                    self.title,
                    path.display(),
                    self.frames_emitted
                ),
                Err(e) => tracing::warn!("{}: failed to finalize {}: {:#}", self.title, path.display(), e),
            }
        }
        if !matches!(self.file, FileSink::Unconfigured) {
            self.file = FileSink::Closed;
        }
    }

    fn emit(&mut self, frame: &RgbImage) {
        if frame.width() == 0 || frame.height() == 0 {
            return;
        }

        if let Some(display) = self.display.as_mut() {
            if let Err(e) = display.show(frame) {
                tracing::warn!("{}: display failed, continuing without it: {:#}", self.title, e);
                self.display = None;
            }
        }

        let append_failure = match &mut self.file {
            FileSink::Open { path, encoder } => encoder
                .append(frame)
                .err()
                .map(|e| (path.clone(), e)),
            _ => None,
        };
        if let Some((path, e)) = append_failure {
            tracing::warn!(
                "{}: writing {} failed, file output disabled: {:#}",
                self.title,
                path.display(),
                e
            );
            self.file = FileSink::Failed;
        }

        self.frames_emitted += 1;
    }
}
