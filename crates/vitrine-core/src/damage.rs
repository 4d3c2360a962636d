//! Pending screen damage.
//!
//! The window manager and the server produce damage, the compositor consumes
//! it. Every producer call also schedules a compose pass.

use std::time::Instant;

use crate::geometry::Rect;
use crate::region::DisjointRects;
use crate::scheduler::ComposeScheduler;

#[derive(Debug)]
pub struct Damage {
    screen_rects: DisjointRects,
    occlusions_dirty: bool,
    cursor_dirty: bool,
    scheduler: ComposeScheduler,
    /// Time of the event being processed.
    now: Instant,
}

impl Damage {
    pub fn new(frame_rate: u32) -> Self {
        Self {
            screen_rects: DisjointRects::new(),
            // Nothing has been computed yet.
            occlusions_dirty: true,
            cursor_dirty: true,
            scheduler: ComposeScheduler::new(frame_rate),
            now: Instant::now(),
        }
    }

    pub const fn now(&self) -> Instant {
        self.now
    }

    pub fn set_now(&mut self, now: Instant) {
        self.now = now;
    }

    pub const fn scheduler(&self) -> &ComposeScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut ComposeScheduler {
        &mut self.scheduler
    }

    /// Request a compose pass without adding damage (window dirty rects are
    /// collected by the compositor itself).
    pub fn schedule(&mut self) {
        self.scheduler.schedule(self.now);
    }

    /// Mark a screen-space rect stale.
    pub fn invalidate_screen(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        self.screen_rects.add(rect);
        self.schedule();
    }

    pub fn invalidate_screen_rects(&mut self, rects: &DisjointRects) {
        if rects.is_empty() {
            return;
        }
        self.screen_rects.add_set(rects);
        self.schedule();
    }

    /// Window topology changed: recompute occlusion on the next pass.
    pub fn invalidate_occlusions(&mut self) {
        self.occlusions_dirty = true;
        self.schedule();
    }

    pub fn invalidate_cursor(&mut self) {
        self.cursor_dirty = true;
        self.schedule();
    }

    pub const fn occlusions_dirty(&self) -> bool {
        self.occlusions_dirty
    }

    pub const fn cursor_dirty(&self) -> bool {
        self.cursor_dirty
    }

    pub const fn screen_rects(&self) -> &DisjointRects {
        &self.screen_rects
    }

    pub fn take_screen_rects(&mut self) -> DisjointRects {
        std::mem::take(&mut self.screen_rects)
    }

    pub fn take_occlusions_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.occlusions_dirty, false)
    }

    pub fn take_cursor_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.cursor_dirty, false)
    }
}

impl Default for Damage {
    fn default() -> Self {
        Self::new(60)
    }
}
