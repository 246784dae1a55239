#[cfg(test)]
pub mod testing;

use crate::capture::CaptureSource;
use crate::controls::{Command, KeyPress};
use crate::detection::{Detection, FaceLocator};
use crate::error::ChannelError;
use crate::landmarks::{LandmarkEstimator, LandmarkSet};
use crate::output::OutputChannel;
use crate::overlay;
use anyhow::Result;
use image::RgbImage;
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Processed frames between throughput log lines.
const PROGRESS_INTERVAL: u64 = 30;

/// Poll interval for key presses while paused.
const PAUSE_POLL: Duration = Duration::from_millis(20);

/// Inclusive, 0-based window of frame indices that reach the channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameRange {
    begin: u64,
    end: Option<u64>,
}

impl FrameRange {
    /// A negative `begin` starts at the first frame; a negative `end` leaves
    /// the range open.
    pub fn new(begin: i64, end: i64) -> Self {
        Self {
            begin: u64::try_from(begin).unwrap_or(0),
            end: u64::try_from(end).ok(),
        }
    }

    #[cfg(test)]
    pub fn unbounded() -> Self {
        Self::new(0, -1)
    }

    pub fn begin(&self) -> u64 {
        self.begin
    }

    pub fn end(&self) -> Option<u64> {
        self.end
    }

    pub fn is_before(&self, index: u64) -> bool {
        index < self.begin
    }

    pub fn is_past(&self, index: u64) -> bool {
        self.end.is_some_and(|end| index > end)
    }

    pub fn contains(&self, index: u64) -> bool {
        !self.is_before(index) && !self.is_past(index)
    }
}

/// Mutable per-run state of the frame loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopState {
    /// Index of the next frame to pull from the input
    pub next_index: u64,
    /// Frames dispatched to the channels so far
    pub processed: u64,
    pub show_landmarks: bool,
    pub show_midpoint: bool,
    pub range: FrameRange,
}

impl LoopState {
    pub fn new(range: FrameRange, show_landmarks: bool, show_midpoint: bool) -> Self {
        Self {
            next_index: 0,
            processed: 0,
            show_landmarks,
            show_midpoint,
            range,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    EndOfInput,
    RangeExhausted,
    UserQuit,
}

#[derive(Clone, Copy, Debug)]
pub struct LoopStats {
    pub frames_read: u64,
    pub frames_processed: u64,
    pub elapsed: Duration,
    pub stop: StopReason,
}

impl LoopStats {
    /// Processed frames per second of wall time
    pub fn fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames_processed as f64 / secs
        } else {
            0.0
        }
    }
}

#[derive(Default)]
struct StageTimings {
    capture: Duration,
    landmarks: Duration,
    dispatch: Duration,
}

/// Drives capture, landmark lookup, overlays and channel fan-out, one frame
/// at a time.
pub struct FrameLoop<C> {
    locator: FaceLocator<C>,
    estimator: Box<dyn LandmarkEstimator>,
    channels: Vec<OutputChannel>,
    state: LoopState,
    timings: StageTimings,
}

impl<C: CaptureSource> FrameLoop<C> {
    pub fn new(
        locator: FaceLocator<C>,
        estimator: Box<dyn LandmarkEstimator>,
        channels: Vec<OutputChannel>,
        state: LoopState,
    ) -> Result<Self, ChannelError> {
        let mut titles = HashSet::new();
        for channel in &channels {
            if !titles.insert(channel.title()) {
                return Err(ChannelError::DuplicateTitle(channel.title().to_string()));
            }
        }

        Ok(Self {
            locator,
            estimator,
            channels,
            state,
            timings: StageTimings::default(),
        })
    }

    #[cfg(test)]
    pub fn state(&self) -> &LoopState {
        &self.state
    }

    /// Run until the input ends, the range closes or the user quits. Channel
    /// files are finalized however the loop ends.
    pub fn run(&mut self) -> Result<LoopStats> {
        let started = Instant::now();
        tracing::info!(
            "Starting frame loop (frames {}..{})",
            self.state.range.begin(),
            self.state
                .range
                .end()
                .map(|end| end.to_string())
                .unwrap_or_else(|| "end".to_string())
        );

        let outcome = self.run_until_stop();
        for channel in &mut self.channels {
            channel.close();
        }
        let stop = outcome?;

        let stats = LoopStats {
            frames_read: self.state.next_index,
            frames_processed: self.state.processed,
            elapsed: started.elapsed(),
            stop,
        };
        tracing::info!(
            "Frame loop stopped ({:?}) after {} frames read, {} processed",
            stop,
            stats.frames_read,
            stats.frames_processed
        );
        Ok(stats)
    }

    fn run_until_stop(&mut self) -> Result<StopReason> {
        loop {
            if let Some(stop) = self.step()? {
                return Ok(stop);
            }
        }
    }

    /// Advance by one input frame. Returns the stop reason once the loop is done.
    fn step(&mut self) -> Result<Option<StopReason>> {
        let index = self.state.next_index;
        if !self.state.range.contains(index) {
            if self.state.range.is_past(index) {
                return Ok(Some(StopReason::RangeExhausted));
            }
            if !self.locator.skip()? {
                return Ok(Some(StopReason::EndOfInput));
            }
            self.state.next_index += 1;
            return Ok(None);
        }

        let capture_start = Instant::now();
        let Some((frame, detection)) = self.locator.next_frame()? else {
            return Ok(Some(StopReason::EndOfInput));
        };
        self.timings.capture += capture_start.elapsed();
        self.state.next_index += 1;

        self.dispatch(frame, detection);
        self.state.processed += 1;

        if self.handle_keys() {
            return Ok(Some(StopReason::UserQuit));
        }

        if self.state.processed % PROGRESS_INTERVAL == 0 {
            self.log_progress();
        }
        Ok(None)
    }

    fn dispatch(&mut self, mut frame: RgbImage, detection: Detection) {
        let landmark_start = Instant::now();
        let landmarks = detection.face().and_then(|face| {
            match self.estimator.estimate(&frame, face) {
                Ok(landmarks) => Some(landmarks),
                Err(e) => {
                    tracing::warn!("Landmark estimation failed, treating frame as faceless: {:#}", e);
                    None
                }
            }
        });
        self.timings.landmarks += landmark_start.elapsed();

        let dispatch_start = Instant::now();
        match landmarks {
            Some(landmarks) => {
                let axis = self.annotate(&mut frame, &landmarks);
                for channel in &mut self.channels {
                    channel.display_with_axis(&frame, axis);
                }
            }
            None => {
                for channel in &mut self.channels {
                    channel.display(&frame);
                }
            }
        }
        self.timings.dispatch += dispatch_start.elapsed();
    }

    /// Draw the enabled overlays and return the mirror axis.
    fn annotate(&self, frame: &mut RgbImage, landmarks: &LandmarkSet) -> u32 {
        let axis = landmarks.mirror_axis(frame.width());
        if self.state.show_landmarks {
            overlay::draw_landmarks(frame, landmarks);
        }
        if self.state.show_midpoint {
            overlay::draw_axis(frame, axis);
        }
        axis
    }

    fn poll_keys(&mut self) -> Vec<KeyPress> {
        self.channels
            .iter_mut()
            .flat_map(|channel| channel.poll_keys())
            .collect()
    }

    /// Apply pending key commands. Returns true when the user asked to quit.
    fn handle_keys(&mut self) -> bool {
        for key in self.poll_keys() {
            match Command::from_key(key) {
                Some(Command::Quit) => return true,
                Some(Command::ToggleLandmarks) => {
                    self.state.show_landmarks = !self.state.show_landmarks;
                    tracing::info!("Landmarks {}", on_off(self.state.show_landmarks));
                }
                Some(Command::ToggleMidpoint) => {
                    self.state.show_midpoint = !self.state.show_midpoint;
                    tracing::info!("Midpoint {}", on_off(self.state.show_midpoint));
                }
                Some(Command::Pause) => self.wait_for_key(),
                None => {}
            }
        }
        false
    }

    /// Block until any key is pressed in any window.
    fn wait_for_key(&mut self) {
        if !self.channels.iter().any(|channel| channel.has_open_display()) {
            tracing::warn!("Pause requested but no window is open; ignoring");
            return;
        }

        tracing::info!("Paused; press any key to resume");
        while self.poll_keys().is_empty() {
            std::thread::sleep(PAUSE_POLL);
        }
        tracing::info!("Resumed");
    }

    fn log_progress(&self) {
        let n = self.state.processed as f64;
        let capture_ms = self.timings.capture.as_secs_f64() * 1000.0 / n;
        let landmark_ms = self.timings.landmarks.as_secs_f64() * 1000.0 / n;
        let dispatch_ms = self.timings.dispatch.as_secs_f64() * 1000.0 / n;
        let total_ms = capture_ms + landmark_ms + dispatch_ms;

        tracing::info!(
            "Frame {}: capture={:.1}ms, landmarks={:.1}ms, dispatch={:.1}ms, total={:.1}ms, fps={:.1}",
            self.state.processed,
            capture_ms,
            landmark_ms,
            dispatch_ms,
            total_ms,
            if total_ms > 0.0 { 1000.0 / total_ms } else { 0.0 }
        );
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
