// Render loop driver
//
// One tick: pump window events, check for a close request, run one frame
// cycle, update the frame-rate counter. There is no pacing; the loop runs
// as fast as the fence and the present mode allow.

use std::time::{Duration, Instant};

use crate::backend::{FrameOutcome, RenderResult};

/// One wait/acquire/record/submit/present cycle.
pub trait FrameCycle {
    fn render_frame(&mut self) -> RenderResult<FrameOutcome>;
}

/// The window operations the loop needs.
pub trait LoopWindow {
    /// Process pending events without blocking.
    fn poll_events(&mut self);
    fn close_requested(&self) -> bool;
    fn set_title(&mut self, title: &str);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRate {
    pub fps: u32,
    pub frame_time_ms: f64,
}

/// Counts frames over one-second windows.
#[derive(Debug)]
pub struct FrameRateCounter {
    window_start: Instant,
    frames: u32,
}

impl FrameRateCounter {
    const WINDOW: Duration = Duration::from_secs(1);

    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
        }
    }

    /// Count one frame finished at `now`. Returns the rate once a full
    /// window has elapsed and starts a new one.
    pub fn record(&mut self, now: Instant) -> Option<FrameRate> {
        self.frames += 1;

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < Self::WINDOW {
            return None;
        }

        let fps = ((self.frames as f64 / elapsed.as_secs_f64()) as u32).max(1);
        self.window_start = now;
        self.frames = 0;

        Some(FrameRate {
            fps,
            frame_time_ms: 1000.0 / fps as f64,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Closed,
}

pub struct RenderLoop<'a, W, C> {
    window: &'a mut W,
    cycle: &'a mut C,
    title: String,
    show_fps: bool,
    counter: FrameRateCounter,
    ticks: u64,
}

impl<'a, W: LoopWindow, C: FrameCycle> RenderLoop<'a, W, C> {
    pub fn new(window: &'a mut W, cycle: &'a mut C, title: impl Into<String>, show_fps: bool) -> Self {
        Self {
            window,
            cycle,
            title: title.into(),
            show_fps,
            counter: FrameRateCounter::new(Instant::now()),
            ticks: 0,
        }
    }

    /// Completed frame cycles so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn tick(&mut self) -> RenderResult<Tick> {
        self.tick_at(Instant::now())
    }

    /// Run one tick as if the frame finished at `now`.
    ///
    /// Record, submit and present failures are logged and the loop goes on.
    /// Anything else ends it.
    pub fn tick_at(&mut self, now: Instant) -> RenderResult<Tick> {
        self.window.poll_events();
        if self.window.close_requested() {
            return Ok(Tick::Closed);
        }

        match self.cycle.render_frame()? {
            FrameOutcome::Presented { .. } => {}
            FrameOutcome::Failed { image_index, error } if error.is_steady_state() => {
                log::error!("Frame on image {} failed: {}", image_index, error);
            }
            FrameOutcome::Failed { error, .. } => return Err(error),
        }
        self.ticks += 1;

        if let Some(rate) = self.counter.record(now) {
            log::debug!("Frame rate: {} ({:.2} ms)", rate.fps, rate.frame_time_ms);
            if self.show_fps {
                let title = format!(
                    "{} - Frame rate: {} ({:.2} ms)",
                    self.title, rate.fps, rate.frame_time_ms
                );
                self.window.set_title(&title);
            }
        }

        Ok(Tick::Continue)
    }

    /// Tick until the window asks to close. Returns the number of frames run.
    pub fn run(&mut self) -> RenderResult<u64> {
        log::info!("Entering render loop");
        while self.tick()? == Tick::Continue {}
        log::info!("Render loop finished after {} frames", self.ticks);
        Ok(self.ticks)
    }
}
