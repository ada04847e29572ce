use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Timing snapshot handed to every update and draw call of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineTime {
    /// Time accumulated since the first frame.
    pub total: Duration,
    /// Time since the previous frame; zero on the first frame.
    pub delta: Duration,
}

impl EngineTime {
    pub fn new(total: Duration, delta: Duration) -> Self {
        Self { total, delta }
    }

    pub fn delta_secs(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    pub fn total_secs(&self) -> f64 {
        self.total.as_secs_f64()
    }
}

/// A monotonic source of timestamps, expressed as offsets from an arbitrary origin.
pub trait TimeSource {
    fn now(&self) -> Duration;
}

impl<T: TimeSource + ?Sized> TimeSource for Box<T> {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

/// Wall-clock source backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl TimeSource for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Time source advanced by hand. Clones share the same reading.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Rc<Cell<Duration>>);

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by);
    }

    /// Jump to an absolute reading. Going backwards is allowed; the frame
    /// clock clamps the resulting delta to zero.
    pub fn set(&self, at: Duration) {
        self.0.set(at);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Duration {
        self.0.get()
    }
}

/// Per-frame clock producing [`EngineTime`] values.
///
/// The first [`tick`](Self::tick) starts timing and reports a zero delta.
#[derive(Debug)]
pub struct FrameClock<C: TimeSource = MonotonicClock> {
    source: C,
    last: Option<Duration>,
    total: Duration,
    frames: u64,
}

impl FrameClock<MonotonicClock> {
    pub fn new() -> Self {
        Self::with_source(MonotonicClock::default())
    }
}

impl Default for FrameClock<MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: TimeSource> FrameClock<C> {
    pub fn with_source(source: C) -> Self {
        Self {
            source,
            last: None,
            total: Duration::ZERO,
            frames: 0,
        }
    }

    /// Measure time since the previous tick, restart the measurement and accumulate.
    pub fn tick(&mut self) -> EngineTime {
        let now = self.source.now();
        let delta = match self.last {
            Some(previous) => now.saturating_sub(previous),
            None => Duration::ZERO,
        };
        self.last = Some(now);
        self.total += delta;
        self.frames += 1;
        EngineTime::new(self.total, delta)
    }

    /// Forget the previous tick; the next one reports a zero delta again.
    /// Accumulated total is kept.
    pub fn pause(&mut self) {
        self.last = None;
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    pub fn is_started(&self) -> bool {
        self.last.is_some()
    }
}

/// Rolling window of recent frame times.
#[derive(Debug, Clone)]
pub struct FrameStats {
    history: Vec<Duration>,
    capacity: usize,
    index: usize,
    filled: bool,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new(120)
    }
}

impl FrameStats {
    /// `capacity` is clamped to at least one sample.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: vec![Duration::ZERO; capacity],
            capacity,
            index: 0,
            filled: false,
        }
    }

    pub fn record(&mut self, dt: Duration) {
        self.history[self.index] = dt;
        self.index = (self.index + 1) % self.capacity;
        if self.index == 0 {
            self.filled = true;
        }
    }

    fn samples(&self) -> &[Duration] {
        &self.history[..self.count()]
    }

    pub fn average(&self) -> Duration {
        let samples = self.samples();
        if samples.is_empty() {
            return Duration::ZERO;
        }
        samples.iter().sum::<Duration>() / samples.len() as u32
    }

    pub fn max(&self) -> Duration {
        self.samples().iter().copied().max().unwrap_or(Duration::ZERO)
    }

    pub fn min(&self) -> Duration {
        self.samples().iter().copied().min().unwrap_or(Duration::ZERO)
    }

    /// Frames per second derived from the average frame time, zero when unknown.
    pub fn fps(&self) -> f64 {
        let avg = self.average().as_secs_f64();
        if avg > 0.0 { 1.0 / avg } else { 0.0 }
    }

    pub fn count(&self) -> usize {
        if self.filled {
            self.capacity
        } else {
            self.index
        }
    }
}
