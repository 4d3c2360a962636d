//! The window arena and z-order list.
//!
//! Windows live in an [`IndexMap`] keyed by [`WindowId`]; relations between
//! windows (parent, children, accessories) are stored as ids and resolved
//! through the arena, so a relation to a window that is gone simply reads as
//! absent. The order list runs back to front and is banded by
//! [`WindowType::band`].

use indexmap::IndexMap;

use crate::frame::{self, ThemeMetrics};
use crate::geometry::{Point, Rect};
use crate::window::{ClientId, Window, WindowFlags, WindowId};

#[derive(Debug, Default)]
pub struct WindowStack {
    windows: IndexMap<WindowId, Window>,
    /// Back to front.
    order: Vec<WindowId>,
}

impl WindowStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.windows.contains_key(&id)
    }

    pub fn get(&self, id: WindowId) -> Option<&Window> {
        self.windows.get(&id)
    }

    pub fn get_mut(&mut self, id: WindowId) -> Option<&mut Window> {
        self.windows.get_mut(&id)
    }

    /// Insert on top of the window's band. Returns `false` if the id is taken.
    pub fn insert(&mut self, window: Window) -> bool {
        let id = window.id();
        if self.windows.contains_key(&id) {
            return false;
        }
        let band = window.window_type().band();
        self.windows.insert(id, window);
        let index = self.top_of_band(band);
        self.order.insert(index, id);
        true
    }

    pub fn remove(&mut self, id: WindowId) -> Option<Window> {
        let window = self.windows.shift_remove(&id)?;
        self.order.retain(|w| *w != id);
        Some(window)
    }

    /// Index in `order` just above the last window of `band` or below.
    fn top_of_band(&self, band: u8) -> usize {
        self.order
            .iter()
            .rposition(|id| {
                self.windows
                    .get(id)
                    .is_some_and(|w| w.window_type().band() <= band)
            })
            .map_or(0, |i| i + 1)
    }

    /// Raise within the window's band. Returns whether the order changed.
    pub fn move_to_front(&mut self, id: WindowId) -> bool {
        let Some(band) = self.windows.get(&id).map(|w| w.window_type().band()) else {
            return false;
        };
        let Some(current) = self.order.iter().position(|w| *w == id) else {
            return false;
        };
        self.order.remove(current);
        let index = self.top_of_band(band);
        self.order.insert(index, id);
        index != current
    }

    /// Back-to-front ids, for loops that need to mutate windows.
    pub fn ids_back_to_front(&self) -> Vec<WindowId> {
        self.order.clone()
    }

    pub fn iter_back_to_front(&self) -> impl DoubleEndedIterator<Item = &Window> + '_ {
        self.order.iter().filter_map(|id| self.windows.get(id))
    }

    pub fn iter_front_to_back(&self) -> impl Iterator<Item = &Window> + '_ {
        self.iter_back_to_front().rev()
    }

    pub fn visible_back_to_front(&self) -> impl DoubleEndedIterator<Item = &Window> + '_ {
        self.iter_back_to_front().filter(|w| w.is_visible_on_screen())
    }

    pub fn visible_front_to_back(&self) -> impl Iterator<Item = &Window> + '_ {
        self.visible_back_to_front().rev()
    }

    pub fn order(&self) -> &[WindowId] {
        &self.order
    }

    pub fn windows_of_client(&self, client: ClientId) -> Vec<WindowId> {
        self.windows
            .values()
            .filter(|w| w.client() == Some(client))
            .map(Window::id)
            .collect()
    }

    pub fn frame_rect(&self, id: WindowId, metrics: &ThemeMetrics) -> Option<Rect> {
        self.get(id).map(|w| frame::frame_rect(w, metrics))
    }

    // ── Relations ────────────────────────────────────────────────────

    /// The parent, if it still exists.
    pub fn parent_of(&self, id: WindowId) -> Option<WindowId> {
        self.get(id)?
            .parent_id()
            .filter(|parent| self.contains(*parent))
    }

    /// An accessory whose parent is gone is an ordinary window.
    pub fn is_accessory(&self, id: WindowId) -> bool {
        self.get(id)
            .is_some_and(|w| w.flags().contains(WindowFlags::ACCESSORY))
            && self.parent_of(id).is_some()
    }

    pub fn is_accessory_of(&self, id: WindowId, parent: WindowId) -> bool {
        self.is_accessory(id) && self.parent_of(id) == Some(parent)
    }

    pub fn children_of(&self, id: WindowId) -> Vec<WindowId> {
        self.get(id).map_or_else(Vec::new, |w| {
            w.children()
                .iter()
                .copied()
                .filter(|c| self.contains(*c))
                .collect()
        })
    }

    pub fn accessories_of(&self, id: WindowId) -> Vec<WindowId> {
        self.get(id).map_or_else(Vec::new, |w| {
            w.accessories()
                .iter()
                .copied()
                .filter(|a| self.contains(*a))
                .collect()
        })
    }

    pub fn is_descendant_of(&self, id: WindowId, ancestor: WindowId) -> bool {
        let mut current = self.parent_of(id);
        let mut hops = 0;
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            hops += 1;
            if hops > self.len() {
                return false;
            }
            current = self.parent_of(parent);
        }
        false
    }

    /// The first live modal window among the children of `id`, searching
    /// each child's own children depth first.
    pub fn blocking_modal_window(&self, id: WindowId) -> Option<WindowId> {
        self.blocking_modal_window_at_depth(id, 0)
    }

    fn blocking_modal_window_at_depth(&self, id: WindowId, depth: usize) -> Option<WindowId> {
        if depth > self.len() {
            return None;
        }
        let window = self.get(id)?;
        for child_id in window.children() {
            let Some(child) = self.get(*child_id) else {
                continue;
            };
            if child.is_destroyed() {
                continue;
            }
            if child.is_modal() {
                return Some(*child_id);
            }
            if let Some(blocking) = self.blocking_modal_window_at_depth(*child_id, depth + 1) {
                return Some(blocking);
            }
        }
        None
    }

    /// Front-most visible window whose frame contains the point.
    pub fn window_at(&self, point: Point, metrics: &ThemeMetrics) -> Option<WindowId> {
        self.visible_front_to_back()
            .find(|w| frame::frame_rect(w, metrics).contains(point))
            .map(Window::id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::{WindowParams, WindowType};
    use pretty_assertions::assert_eq;

    fn make(id: u64, window_type: WindowType) -> Window {
        Window::new(
            WindowId(id),
            Some(ClientId(1)),
            WindowParams {
                window_type,
                ..WindowParams::default()
            },
        )
    }

    fn with_parent(id: u64, parent: u64, flags: WindowFlags) -> Window {
        Window::new(
            WindowId(id),
            Some(ClientId(1)),
            WindowParams {
                parent: Some(WindowId(parent)),
                flags: WindowFlags::VISIBLE | flags,
                ..WindowParams::default()
            },
        )
    }

    #[test]
    fn test_insert_respects_bands() {
        let mut stack = WindowStack::new();
        stack.insert(make(1, WindowType::Normal));
        stack.insert(make(2, WindowType::Taskbar));
        stack.insert(make(3, WindowType::Desktop));
        stack.insert(make(4, WindowType::Normal));
        stack.insert(make(5, WindowType::Menu));
        let order: Vec<u64> = stack.order().iter().map(|id| id.0).collect();
        assert_eq!(order, vec![3, 1, 4, 2, 5]);
    }

    #[test]
    fn test_move_to_front_stays_in_band() {
        let mut stack = WindowStack::new();
        stack.insert(make(1, WindowType::Normal));
        stack.insert(make(2, WindowType::Normal));
        stack.insert(make(3, WindowType::Taskbar));
        assert!(stack.move_to_front(WindowId(1)));
        let order: Vec<u64> = stack.order().iter().map(|id| id.0).collect();
        assert_eq!(order, vec![2, 1, 3]);
        assert!(!stack.move_to_front(WindowId(1)));
    }

    #[test]
    fn test_accessory_self_heals_when_parent_goes() {
        let mut stack = WindowStack::new();
        stack.insert(make(1, WindowType::Normal));
        stack.insert(with_parent(2, 1, WindowFlags::ACCESSORY));
        stack.get_mut(WindowId(1)).unwrap().add_accessory(WindowId(2));
        assert!(stack.is_accessory_of(WindowId(2), WindowId(1)));
        stack.remove(WindowId(1));
        assert!(!stack.is_accessory(WindowId(2)));
        assert_eq!(stack.parent_of(WindowId(2)), None);
    }

    #[test]
    fn test_blocking_modal_window_recurses_and_skips_destroyed() {
        let mut stack = WindowStack::new();
        stack.insert(make(1, WindowType::Normal));
        stack.insert(with_parent(2, 1, WindowFlags::empty()));
        stack.insert(with_parent(3, 2, WindowFlags::MODAL));
        stack.get_mut(WindowId(1)).unwrap().add_child(WindowId(2));
        stack.get_mut(WindowId(2)).unwrap().add_child(WindowId(3));
        assert_eq!(stack.blocking_modal_window(WindowId(1)), Some(WindowId(3)));
        assert!(stack.is_descendant_of(WindowId(3), WindowId(1)));

        stack.get_mut(WindowId(3)).unwrap().destroy();
        assert_eq!(stack.blocking_modal_window(WindowId(1)), None);
    }
}
