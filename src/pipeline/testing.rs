//! Scripted collaborators for exercising the loop and channels without
//! cameras, models, windows or encoders.

use crate::capture::CaptureSource;
use crate::controls::KeyPress;
use crate::detection::{FaceDetector, Rect};
use crate::landmarks::{LandmarkEstimator, LandmarkSet, Point, LANDMARK_COUNT, NOSE_BRIDGE_TOP};
use crate::output::{DisplaySurface, VideoEncoder};
use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

type FrameFn = Box<dyn FnMut(u64) -> RgbImage>;

/// Delivers a fixed number of frames, generated on demand.
pub struct ScriptedCapture {
    count: u64,
    delivered: u64,
    size: (u32, u32),
    generate: FrameFn,
}

impl ScriptedCapture {
    pub fn generated(count: u64, width: u32, height: u32, generate: impl FnMut(u64) -> RgbImage + 'static) -> Self {
        Self {
            count,
            delivered: 0,
            size: (width, height),
            generate: Box::new(generate),
        }
    }

    pub fn blank(count: u64, width: u32, height: u32) -> Self {
        Self::generated(count, width, height, move |_| RgbImage::new(width, height))
    }

    /// Frames whose every column and index is distinguishable.
    pub fn numbered(count: u64, width: u32, height: u32) -> Self {
        Self::generated(count, width, height, move |index| numbered_frame(index, width, height))
    }

    pub fn from_frames(frames: Vec<RgbImage>) -> Self {
        let size = frames.first().map(|f| f.dimensions()).unwrap_or((0, 0));
        let count = frames.len() as u64;
        let mut frames = VecDeque::from(frames);
        Self::generated(count, size.0, size.1, move |_| frames.pop_front().unwrap_or_default())
    }
}

impl CaptureSource for ScriptedCapture {
    fn capture_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.delivered == self.count {
            return Ok(None);
        }
        let frame = (self.generate)(self.delivered);
        self.delivered += 1;
        Ok(Some(frame))
    }

    fn resolution(&self) -> (u32, u32) {
        self.size
    }

    fn fps(&self) -> f64 {
        30.0
    }
}

pub fn numbered_frame(index: u64, width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 251) as u8 + 1, (index % 256) as u8, (x / 251) as u8 + y as u8])
    })
}

/// Returns scripted detections in order, then no face.
pub struct ScriptedDetector {
    script: VecDeque<Option<Rect>>,
    fail: bool,
    calls: Rc<RefCell<usize>>,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Option<Rect>>) -> Self {
        Self {
            script: script.into(),
            fail: false,
            calls: Rc::new(RefCell::new(0)),
        }
    }

    pub fn never() -> Self {
        Self::new(Vec::new())
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::never()
        }
    }

    pub fn calls(&self) -> Rc<RefCell<usize>> {
        Rc::clone(&self.calls)
    }
}

impl FaceDetector for ScriptedDetector {
    fn detect(&mut self, _frame: &RgbImage) -> Result<Option<Rect>> {
        *self.calls.borrow_mut() += 1;
        if self.fail {
            return Err(anyhow!("detector unavailable"));
        }
        Ok(self.script.pop_front().flatten())
    }
}

/// Always places the nose bridge at the same column.
pub struct FixedLandmarks {
    axis: i32,
    fail: bool,
}

impl FixedLandmarks {
    pub fn with_axis(axis: i32) -> Self {
        Self { axis, fail: false }
    }

    pub fn failing() -> Self {
        Self { axis: 0, fail: true }
    }
}

impl LandmarkEstimator for FixedLandmarks {
    fn estimate(&mut self, _frame: &RgbImage, face: Rect) -> Result<LandmarkSet> {
        if self.fail {
            return Err(anyhow!("landmark model unavailable"));
        }
        let mut points = vec![Point::new(face.left(), face.top()); LANDMARK_COUNT];
        points[NOSE_BRIDGE_TOP] = Point::new(self.axis, face.top());
        Ok(LandmarkSet::new(points)?)
    }
}

#[derive(Clone, Default)]
pub struct DisplayLog {
    frames: Rc<RefCell<Vec<RgbImage>>>,
    polls: Rc<RefCell<usize>>,
}

impl DisplayLog {
    pub fn frames(&self) -> Vec<RgbImage> {
        self.frames.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.frames.borrow().len()
    }

    pub fn polls(&self) -> usize {
        *self.polls.borrow()
    }
}

/// Records shown frames and replays one scripted batch of keys per poll.
pub struct RecordingDisplay {
    log: DisplayLog,
    keys: VecDeque<Vec<KeyPress>>,
    broken: bool,
    open: bool,
}

impl RecordingDisplay {
    pub fn new() -> (Self, DisplayLog) {
        Self::with_keys(Vec::new())
    }

    pub fn with_keys(keys: Vec<Vec<KeyPress>>) -> (Self, DisplayLog) {
        let log = DisplayLog::default();
        let display = Self {
            log: log.clone(),
            keys: keys.into(),
            broken: false,
            open: true,
        };
        (display, log)
    }

    /// Still delivers the scripted keys but reports no open window.
    pub fn closed_with_keys(keys: Vec<Vec<KeyPress>>) -> (Self, DisplayLog) {
        let (mut display, log) = Self::with_keys(keys);
        display.open = false;
        (display, log)
    }

    pub fn broken() -> Self {
        Self {
            log: DisplayLog::default(),
            keys: VecDeque::new(),
            broken: true,
            open: false,
        }
    }
}

impl DisplaySurface for RecordingDisplay {
    fn show(&mut self, frame: &RgbImage) -> Result<()> {
        if self.broken {
            return Err(anyhow!("display lost"));
        }
        self.log.frames.borrow_mut().push(frame.clone());
        Ok(())
    }

    fn poll_keys(&mut self) -> Vec<KeyPress> {
        *self.log.polls.borrow_mut() += 1;
        self.keys.pop_front().unwrap_or_default()
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[derive(Clone, Default)]
pub struct EncoderLog {
    frames: Rc<RefCell<Vec<RgbImage>>>,
    finished: Rc<RefCell<bool>>,
}

impl EncoderLog {
    pub fn frames(&self) -> Vec<RgbImage> {
        self.frames.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.frames.borrow().len()
    }

    pub fn is_finished(&self) -> bool {
        *self.finished.borrow()
    }
}

/// Records appended frames; optionally fails once `limit` frames are written.
pub struct RecordingEncoder {
    log: EncoderLog,
    limit: Option<usize>,
}

impl RecordingEncoder {
    pub fn new() -> (Self, EncoderLog) {
        let log = EncoderLog::default();
        (Self { log: log.clone(), limit: None }, log)
    }

    pub fn failing_after(limit: usize) -> (Self, EncoderLog) {
        let (mut encoder, log) = Self::new();
        encoder.limit = Some(limit);
        (encoder, log)
    }
}

impl VideoEncoder for RecordingEncoder {
    fn append(&mut self, frame: &RgbImage) -> Result<()> {
        if self.limit.is_some_and(|limit| self.log.len() >= limit) {
            return Err(anyhow!("disk full"));
        }
        self.log.frames.borrow_mut().push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        *self.log.finished.borrow_mut() = true;
        Ok(())
    }
}
