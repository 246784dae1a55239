use super::DisplaySurface;
use crate::controls::KeyPress;
use anyhow::{anyhow, Result};
use image::RgbImage;
use minifb::{Key, KeyRepeat, Window, WindowOptions};

/// A titled on-screen window backed by minifb.
///
/// The window is created on the first frame so it takes that frame's size.
/// Once the user closes it, it stays closed and reports Escape on every poll.
pub struct WindowSurface {
    title: String,
    window: Option<Window>,
    buffer: Vec<u32>,
    size: (usize, usize),
    pending: Vec<KeyPress>,
    closed: bool,
}

impl WindowSurface {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            window: None,
            buffer: Vec::new(),
            size: (0, 0),
            pending: Vec::new(),
            closed: false,
        }
    }

    fn ensure_window(&mut self, width: usize, height: usize) -> Result<&mut Window> {
        if self.size != (width, height) {
            self.window = None;
        }
        if self.window.is_none() {
            tracing::debug!("{}: opening {}x{} window", self.title, width, height);
            let window = Window::new(&self.title, width, height, WindowOptions::default())
                .map_err(|e| anyhow!("cannot open window {}: {}", self.title, e))?;
            self.size = (width, height);
            self.window = Some(window);
        }
        self.window
            .as_mut()
            .ok_or_else(|| anyhow!("window {} is not available", self.title))
    }

    fn collect_keys(&mut self) {
        if let Some(window) = &self.window {
            if !window.is_open() {
                self.closed = true;
                self.window = None;
                return;
            }
            self.pending.extend(
                window
                    .get_keys_pressed(KeyRepeat::No)
                    .into_iter()
                    .map(key_press),
            );
        }
    }
}

impl DisplaySurface for WindowSurface {
    fn show(&mut self, frame: &RgbImage) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        let (width, height) = (frame.width() as usize, frame.height() as usize);
        self.buffer.clear();
        self.buffer.extend(
            frame
                .pixels()
                .map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32),
        );

        let buffer = std::mem::take(&mut self.buffer);
        let shown = self
            .ensure_window(width, height)
            .and_then(|window| {
                window
                    .update_with_buffer(&buffer, width, height)
                    .map_err(|e| anyhow!("cannot draw window: {}", e))
            });
        self.buffer = buffer;
        shown?;

        self.collect_keys();
        Ok(())
    }

    fn poll_keys(&mut self) -> Vec<KeyPress> {
        if self.closed {
            return vec![KeyPress::Escape];
        }
        if let Some(window) = self.window.as_mut() {
            window.update();
        }
        self.collect_keys();
        if self.closed {
            return vec![KeyPress::Escape];
        }
        std::mem::take(&mut self.pending)
    }

    fn is_open(&self) -> bool {
        self.window.as_ref().is_some_and(|w| w.is_open())
    }
}

fn key_press(key: Key) -> KeyPress {
    match key {
        Key::Escape => KeyPress::Escape,
        Key::Q => KeyPress::Char('q'),
        Key::L => KeyPress::Char('l'),
        Key::M => KeyPress::Char('m'),
        Key::P => KeyPress::Char('p'),
        _ => KeyPress::Other,
    }
}
