//! Compose scheduling.
//!
//! The first invalidation of a burst asks for an immediate compose so input
//! feels responsive, and also arms a next-frame deadline one frame interval
//! later. Invalidations that arrive before that deadline are picked up when
//! it passes, which caps the frame rate. The `invalidated` flag is only
//! cleared by [`ComposeScheduler::begin_compose`], so no invalidation is
//! ever lost between scheduling and composing.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposePriority {
    /// Compose on the next turn of the event loop.
    Immediate,
    /// Compose when the frame interval has elapsed.
    NextFrame,
}

#[derive(Debug, Clone)]
pub struct ComposeScheduler {
    frame_interval: Duration,
    invalidated: bool,
    immediate_at: Option<Instant>,
    next_frame_at: Option<Instant>,
}

impl ComposeScheduler {
    pub fn new(frame_rate: u32) -> Self {
        Self {
            frame_interval: Self::interval_for(frame_rate),
            invalidated: false,
            immediate_at: None,
            next_frame_at: None,
        }
    }

    fn interval_for(frame_rate: u32) -> Duration {
        Duration::from_millis(1000 / u64::from(frame_rate.max(1)))
    }

    pub const fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    pub fn set_frame_rate(&mut self, frame_rate: u32) {
        self.frame_interval = Self::interval_for(frame_rate);
    }

    pub const fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    /// Note that something needs composing.
    pub fn schedule(&mut self, now: Instant) {
        self.invalidated = true;
        if self.next_frame_at.is_none() {
            self.immediate_at = Some(now);
            self.next_frame_at = Some(now + self.frame_interval);
        }
    }

    /// When the event loop should wake up next, if at all.
    pub fn next_due(&self) -> Option<Instant> {
        self.immediate_at.or(self.next_frame_at)
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next_due().is_some_and(|due| due <= now)
    }

    /// Consume the timer that is due, if any.
    pub fn take_due(&mut self, now: Instant) -> Option<ComposePriority> {
        if self.immediate_at.is_some_and(|at| at <= now) {
            self.immediate_at = None;
            return Some(ComposePriority::Immediate);
        }
        if self.next_frame_at.is_some_and(|at| at <= now) {
            self.next_frame_at = None;
            return Some(ComposePriority::NextFrame);
        }
        None
    }

    /// Start a compose pass. Returns whether anything was invalidated since
    /// the previous pass, and clears that state.
    pub fn begin_compose(&mut self) -> bool {
        std::mem::replace(&mut self.invalidated, false)
    }
}

impl Default for ComposeScheduler {
    fn default() -> Self {
        Self::new(60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_invalidation_is_immediate() {
        let mut scheduler = ComposeScheduler::new(60);
        let t0 = Instant::now();
        assert_eq!(scheduler.next_due(), None);
        scheduler.schedule(t0);
        assert_eq!(scheduler.next_due(), Some(t0));
        assert_eq!(scheduler.take_due(t0), Some(ComposePriority::Immediate));
        assert!(scheduler.begin_compose());
        assert_eq!(scheduler.next_due(), Some(t0 + Duration::from_millis(16)));
    }

    #[test]
    fn test_burst_is_throttled_to_next_frame() {
        let mut scheduler = ComposeScheduler::new(60);
        let t0 = Instant::now();
        scheduler.schedule(t0);
        scheduler.take_due(t0);
        scheduler.begin_compose();

        let t1 = t0 + Duration::from_millis(5);
        scheduler.schedule(t1);
        assert!(!scheduler.is_due(t1));
        assert_eq!(scheduler.take_due(t1), None);

        let t2 = t0 + Duration::from_millis(16);
        assert_eq!(scheduler.take_due(t2), Some(ComposePriority::NextFrame));
        assert!(scheduler.begin_compose());
        assert_eq!(scheduler.next_due(), None);
    }

    #[test]
    fn test_invalidation_never_dropped() {
        let mut scheduler = ComposeScheduler::new(60);
        let t0 = Instant::now();
        scheduler.schedule(t0);
        scheduler.take_due(t0);
        // Invalidated again before the compose pass consumed the flag.
        scheduler.schedule(t0);
        assert!(scheduler.begin_compose());
        assert!(!scheduler.begin_compose());
        // The pending next-frame deadline still fires.
        assert!(scheduler.is_due(t0 + Duration::from_millis(20)));
    }

    #[test]
    fn test_idle_next_frame_compose_is_empty() {
        let mut scheduler = ComposeScheduler::new(30);
        let t0 = Instant::now();
        scheduler.schedule(t0);
        scheduler.take_due(t0);
        assert!(scheduler.begin_compose());
        let t1 = t0 + scheduler.frame_interval();
        assert_eq!(scheduler.take_due(t1), Some(ComposePriority::NextFrame));
        assert!(!scheduler.begin_compose());
    }
}
