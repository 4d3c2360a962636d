//! Invariant validation for the window manager and compositor state.
//!
//! Called after every `handle_event` and compose pass in debug builds.
//! Region checks only run while occlusion is up to date.

use crate::manager::WindowManager;
use crate::region::DisjointRects;

/// Error indicating which invariant was violated.
#[derive(Debug, thiserror::Error)]
pub enum InvariantError {
    #[error("Active window {0} does not exist")]
    ActiveWindowMissing(String),

    #[error("Active input window {0} does not exist")]
    ActiveInputWindowMissing(String),

    #[error("Window {0} is in the arena but not in the z-order list, or the reverse")]
    OrderMismatch(String),

    #[error("Window {0} is stacked below a window of a lower band")]
    BandOrder(String),

    #[error("Window {0} has an empty rect")]
    EmptyRect(String),

    #[error("Opaque region of window {0} overlaps another opaque region or the wallpaper")]
    OpaqueOverlap(String),

    #[error("Window {0} has overlapping opaque and transparent regions")]
    RegionOverlap(String),

    #[error("Composited regions cover {covered} of {screen} screen pixels")]
    Coverage { covered: i64, screen: i64 },
}

/// Validate all invariants. Returns the first violation found.
pub fn validate(wm: &WindowManager, opaque_wallpaper: &DisjointRects) -> Result<(), InvariantError> {
    let stack = wm.stack();

    // 1. Active and input windows exist
    if let Some(id) = wm.active_window() {
        if !stack.contains(id) {
            return Err(InvariantError::ActiveWindowMissing(id.to_string()));
        }
    }
    if let Some(id) = wm.active_input_window() {
        if !stack.contains(id) {
            return Err(InvariantError::ActiveInputWindowMissing(id.to_string()));
        }
    }

    // 2. Arena and order list agree, and bands ascend back to front
    if stack.order().len() != stack.len() {
        let stray = stack
            .order()
            .iter()
            .find(|id| !stack.contains(**id))
            .map_or_else(|| "?".to_owned(), ToString::to_string);
        return Err(InvariantError::OrderMismatch(stray));
    }
    let mut band = 0;
    for window in stack.iter_back_to_front() {
        let window_band = window.window_type().band();
        if window_band < band {
            return Err(InvariantError::BandOrder(window.id().to_string()));
        }
        band = window_band;
        if window.rect().is_empty() {
            return Err(InvariantError::EmptyRect(window.id().to_string()));
        }
    }

    if wm.damage().occlusions_dirty() {
        return Ok(());
    }

    // 3. Opaque regions are pairwise disjoint and disjoint from the wallpaper
    let mut opaque = opaque_wallpaper.clone();
    let mut covered = opaque_wallpaper.clone();
    for window in stack.visible_back_to_front() {
        let regions = window.regions();
        if regions.opaque.intersects(&opaque) {
            return Err(InvariantError::OpaqueOverlap(window.id().to_string()));
        }
        if regions.opaque.intersects(&regions.transparent) {
            return Err(InvariantError::RegionOverlap(window.id().to_string()));
        }
        opaque.add_set(&regions.opaque);
        covered.add_set(&regions.opaque);
        covered.add_set(&regions.transparent);
    }

    // 4. Together they cover the screen exactly
    let screen = wm.screen_rect();
    let covered_area = covered.intersected(screen).area();
    if covered_area != screen.area() || covered.area() != covered_area {
        return Err(InvariantError::Coverage {
            covered: covered.area(),
            screen: screen.area(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::geometry::Rect;
    use crate::window::{ClientId, WindowId, WindowParams};

    #[test]
    fn test_fresh_manager_is_valid() {
        let wm = WindowManager::new(&Config::default(), Rect::new(0, 0, 800, 600));
        // Occlusion has never been computed, so regions are skipped.
        assert!(validate(&wm, &DisjointRects::new()).is_ok());
    }

    #[test]
    fn test_uncovered_screen_is_reported() {
        let mut wm = WindowManager::new(&Config::default(), Rect::new(0, 0, 800, 600));
        wm.create_window(WindowId(1), Some(ClientId(1)), WindowParams::default());
        wm.damage_mut().take_occlusions_dirty();
        // Regions were never filled in, and the wallpaper is empty.
        let err = validate(&wm, &DisjointRects::new()).unwrap_err();
        assert!(matches!(err, InvariantError::Coverage { covered: 0, .. }));
    }
}
