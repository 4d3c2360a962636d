//! Double-click detection.
//!
//! Tracks, per mouse button, when and where the last click (button release)
//! happened on the window that was clicked last. Clicking a different window
//! restarts every button's clock.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::event::MouseButton;
use crate::geometry::Point;
use crate::window::WindowId;

#[derive(Debug, Clone, Copy, Default)]
struct ClickMetadata {
    /// `None` until the first click, and again right after a double click.
    clock: Option<Instant>,
    last_position: Point,
}

#[derive(Debug, Clone)]
pub struct DoubleClickDetector {
    speed: Duration,
    max_distance: i32,
    clicked_window: Option<WindowId>,
    metadata: HashMap<MouseButton, ClickMetadata>,
}

impl Default for DoubleClickDetector {
    fn default() -> Self {
        Self::new(Duration::from_millis(250), 4)
    }
}

impl DoubleClickDetector {
    pub fn new(speed: Duration, max_distance: i32) -> Self {
        Self {
            speed,
            max_distance,
            clicked_window: None,
            metadata: HashMap::new(),
        }
    }

    pub const fn speed(&self) -> Duration {
        self.speed
    }

    pub fn set_speed(&mut self, speed: Duration) {
        self.speed = speed;
    }

    pub const fn max_distance(&self) -> i32 {
        self.max_distance
    }

    pub fn set_max_distance(&mut self, distance: i32) {
        self.max_distance = distance;
    }

    pub fn reset(&mut self) {
        self.metadata.clear();
    }

    /// Feed a button release on `window`. Returns `true` when it completes
    /// a double click.
    pub fn process(
        &mut self,
        window: WindowId,
        button: MouseButton,
        position: Point,
        now: Instant,
    ) -> bool {
        if self.clicked_window != Some(window) {
            trace!("Initial click on {} (previous was {:?})", window, self.clicked_window);
            self.clicked_window = Some(window);
            self.reset();
        }

        let speed = self.speed;
        let max_distance = i64::from(self.max_distance);
        let metadata = self.metadata.entry(button).or_default();

        let within_time = metadata
            .clock
            .is_some_and(|start| now.saturating_duration_since(start) < speed);
        if !within_time {
            metadata.clock = Some(now);
            metadata.last_position = position;
            return false;
        }

        if position.squared_distance(metadata.last_position) > max_distance * max_distance {
            metadata.clock = Some(now);
            metadata.last_position = position;
            return false;
        }

        // A third click starts over instead of producing a second double click.
        metadata.clock = None;
        true
    }
}
