//! The window manager.
//!
//! Owns the window arena and z-order ([`WindowStack`]), decides which
//! window is active and which one receives input, runs the interactive
//! move/resize/drag-and-drop gestures and routes pointer and keyboard input.
//! Everything it wants a client to know is pushed to an outbox of
//! [`CoreAction`]s that the server drains after every event.

use tracing::{debug, trace, warn};

use crate::bitmap::Bitmap;
use crate::config::{Config, InputConfig, ThemeConfig};
use crate::damage::Damage;
use crate::double_click::DoubleClickDetector;
use crate::event::{
    ClientEvent, CoreAction, Key, KeyEvent, Modifiers, MouseButton, MouseEvent, MouseEventKind,
    WmEvent, WmEventMask,
};
use crate::frame::{self, FrameButtonKind, ThemeMetrics};
use crate::geometry::{Point, Rect, Size};
use crate::region::DisjointRects;
use crate::stack::WindowStack;
use crate::window::{
    ClientId, ResizeDirection, TileType, Window, WindowFlags, WindowId, WindowParams, WindowType,
};

/// Pointer travel before a press on a maximized or tiled window tears it loose.
const MOVE_THRESHOLD: i32 = 5;
const TILING_DEADZONE: i32 = 5;
const MAXIMIZE_DEADZONE: i32 = 2;
const MIN_WINDOW_SIZE: i32 = 50;
const OPACITY_STEP: f32 = 0.05;
const MIN_OPACITY: f32 = 0.05;

/// Cursor shapes the window manager asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StandardCursor {
    #[default]
    Arrow,
    Move,
    ResizeHorizontal,
    ResizeVertical,
    ResizeDiagonalTlbr,
    ResizeDiagonalBltr,
    Drag,
}

impl StandardCursor {
    pub const fn for_resize(direction: ResizeDirection) -> Self {
        match direction {
            ResizeDirection::None => Self::Arrow,
            ResizeDirection::Left | ResizeDirection::Right => Self::ResizeHorizontal,
            ResizeDirection::Up | ResizeDirection::Down => Self::ResizeVertical,
            ResizeDirection::UpLeft | ResizeDirection::DownRight => Self::ResizeDiagonalTlbr,
            ResizeDirection::UpRight | ResizeDirection::DownLeft => Self::ResizeDiagonalBltr,
        }
    }
}

/// Payload of an ongoing drag-and-drop.
#[derive(Debug, Clone)]
pub struct DragState {
    pub client: ClientId,
    pub text: String,
    pub data_type: String,
    pub bitmap: Option<Bitmap>,
}

/// The interactive gesture in progress. At most one at a time.
#[derive(Debug, Clone, Default)]
enum Gesture {
    #[default]
    None,
    Move {
        window: WindowId,
        origin: Point,
        window_origin: Point,
    },
    Resize {
        window: WindowId,
        origin: Point,
        original_rect: Rect,
        direction: ResizeDirection,
        button: MouseButton,
    },
    Drag(DragState),
}

#[derive(Debug)]
pub struct WindowManager {
    stack: WindowStack,
    damage: Damage,
    theme: ThemeConfig,
    metrics: ThemeMetrics,
    screen_rect: Rect,

    active_window: Option<WindowId>,
    active_input_window: Option<WindowId>,
    /// Receives every pointer event until all buttons are released.
    input_tracking_window: Option<WindowId>,
    hovered_window: Option<WindowId>,

    gesture: Gesture,
    resize_candidate: Option<(WindowId, ResizeDirection)>,
    /// Frame button that captured the pointer with a press.
    cursor_tracking_button: Option<(WindowId, FrameButtonKind)>,
    hovered_button: Option<(WindowId, FrameButtonKind)>,

    double_click: DoubleClickDetector,
    modifiers: Modifiers,
    cursor_location: Point,

    actions: Vec<CoreAction>,
}

impl WindowManager {
    pub fn new(config: &Config, screen_rect: Rect) -> Self {
        let mut wm = Self {
            stack: WindowStack::new(),
            damage: Damage::new(config.compositor.frame_rate),
            theme: config.theme.clone(),
            metrics: ThemeMetrics::from(&config.theme),
            screen_rect,
            active_window: None,
            active_input_window: None,
            input_tracking_window: None,
            hovered_window: None,
            gesture: Gesture::None,
            resize_candidate: None,
            cursor_tracking_button: None,
            hovered_button: None,
            double_click: DoubleClickDetector::default(),
            modifiers: Modifiers::empty(),
            cursor_location: screen_rect.center(),
            actions: Vec::new(),
        };
        wm.apply_input_config(&config.input);
        wm
    }

    fn apply_input_config(&mut self, input: &InputConfig) {
        self.double_click
            .set_speed(std::time::Duration::from_millis(input.double_click_speed_ms));
        self.double_click
            .set_max_distance(input.double_click_distance);
    }

    /// Pick up theme and input settings after a config reload.
    pub fn reload_config(&mut self, config: &Config) {
        self.theme = config.theme.clone();
        self.metrics = ThemeMetrics::from(&config.theme);
        self.apply_input_config(&config.input);
        self.damage
            .scheduler_mut()
            .set_frame_rate(config.compositor.frame_rate);
        let metrics = self.metrics;
        for id in self.stack.ids_back_to_front() {
            if let Some(window) = self.stack.get_mut(id) {
                frame::layout_buttons(window, &metrics);
                window.invalidate(true);
            }
        }
        self.damage.invalidate_occlusions();
        self.damage.invalidate_screen(self.screen_rect);
        debug!("Window manager picked up new configuration");
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub const fn stack(&self) -> &WindowStack {
        &self.stack
    }

    pub fn window(&self, id: WindowId) -> Option<&Window> {
        self.stack.get(id)
    }

    pub const fn damage(&self) -> &Damage {
        &self.damage
    }

    pub fn damage_mut(&mut self) -> &mut Damage {
        &mut self.damage
    }

    /// Split borrow for the compositor, which writes window regions and
    /// consumes damage in the same pass.
    pub(crate) fn compositor_parts(&mut self) -> (&mut WindowStack, &mut Damage) {
        (&mut self.stack, &mut self.damage)
    }

    pub const fn theme(&self) -> &ThemeConfig {
        &self.theme
    }

    pub const fn metrics(&self) -> &ThemeMetrics {
        &self.metrics
    }

    pub const fn screen_rect(&self) -> Rect {
        self.screen_rect
    }

    pub const fn active_window(&self) -> Option<WindowId> {
        self.active_window
    }

    pub const fn active_input_window(&self) -> Option<WindowId> {
        self.active_input_window
    }

    pub const fn input_tracking_window(&self) -> Option<WindowId> {
        self.input_tracking_window
    }

    pub const fn hovered_window(&self) -> Option<WindowId> {
        self.hovered_window
    }

    pub const fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub const fn cursor_location(&self) -> Point {
        self.cursor_location
    }

    pub fn frame_rect(&self, id: WindowId) -> Option<Rect> {
        self.stack.frame_rect(id, &self.metrics)
    }

    pub fn move_window(&self) -> Option<WindowId> {
        match self.gesture {
            Gesture::Move { window, .. } => Some(window),
            _ => None,
        }
    }

    pub fn resize_window(&self) -> Option<WindowId> {
        match self.gesture {
            Gesture::Resize { window, .. } => Some(window),
            _ => None,
        }
    }

    /// Direction of the ongoing resize, used to anchor stale backing stores.
    pub fn resize_direction_of(&self, id: WindowId) -> ResizeDirection {
        match self.gesture {
            Gesture::Resize {
                window, direction, ..
            } if window == id => direction,
            _ => ResizeDirection::None,
        }
    }

    /// The window whose geometry label is shown while it is moved or resized.
    pub fn geometry_label_window(&self) -> Option<WindowId> {
        match self.gesture {
            Gesture::Move { window, .. } | Gesture::Resize { window, .. } => Some(window),
            _ => None,
        }
    }

    pub fn drag(&self) -> Option<&DragState> {
        match &self.gesture {
            Gesture::Drag(drag) => Some(drag),
            _ => None,
        }
    }

    pub fn active_fullscreen_window(&self) -> Option<WindowId> {
        self.active_window.filter(|id| {
            self.stack
                .get(*id)
                .is_some_and(|w| w.is_fullscreen() && w.is_visible_on_screen())
        })
    }

    pub fn active_cursor(&self) -> StandardCursor {
        match self.gesture {
            Gesture::Drag(_) => StandardCursor::Drag,
            Gesture::Move { .. } => StandardCursor::Move,
            Gesture::Resize { direction, .. } => StandardCursor::for_resize(direction),
            Gesture::None => self
                .resize_candidate
                .map_or(StandardCursor::Arrow, |(_, direction)| {
                    StandardCursor::for_resize(direction)
                }),
        }
    }

    fn live_window(&self, id: WindowId) -> Option<&Window> {
        self.stack.get(id).filter(|w| !w.is_destroyed())
    }

    fn known(&self, id: WindowId, request: &str) -> bool {
        if self.live_window(id).is_some() {
            return true;
        }
        warn!("{request}: unknown window {id}");
        false
    }

    // ── Outbox ───────────────────────────────────────────────────────

    /// Queue an event for the client owning `id`. Internal windows have no
    /// client and the event is dropped.
    fn post(&mut self, id: WindowId, event: ClientEvent) {
        let Some(client) = self.stack.get(id).and_then(Window::client) else {
            trace!("Dropping {:?} for internal window {id}", event);
            return;
        };
        self.actions.push(CoreAction::Post {
            client,
            window: id,
            event,
        });
    }

    pub(crate) fn push_action(&mut self, action: CoreAction) {
        self.actions.push(action);
    }

    pub(crate) fn post_state_changed(&mut self, id: WindowId) {
        let Some(window) = self.stack.get(id) else {
            return;
        };
        let event = ClientEvent::StateChanged {
            minimized: window.is_minimized(),
            occluded: window.is_occluded(),
        };
        self.post(id, event);
    }

    /// Drain the actions queued since the last call.
    pub fn take_actions(&mut self) -> Vec<CoreAction> {
        std::mem::take(&mut self.actions)
    }

    /// Turn pending `request_update` regions into `Paint` messages for
    /// windows that can be seen.
    pub fn flush_pending_paints(&mut self) {
        for id in self.stack.ids_back_to_front() {
            let Some(window) = self.stack.get_mut(id) else {
                continue;
            };
            if !window.has_pending_paint() || !window.is_visible_on_screen() || window.is_occluded() {
                continue;
            }
            let size = window.size();
            let rects = window.take_pending_paint();
            if window.is_internal() {
                continue;
            }
            self.post(
                id,
                ClientEvent::Paint {
                    size,
                    rects: rects.rects().to_vec(),
                },
            );
        }
    }

    // ── Invalidation helpers ─────────────────────────────────────────

    fn invalidate_window(&mut self, id: WindowId, with_frame: bool) {
        if let Some(window) = self.stack.get_mut(id) {
            window.invalidate(with_frame);
            self.damage.schedule();
        }
    }

    /// Repaint just the title bar, in screen coordinates.
    fn invalidate_title_bar(&mut self, id: WindowId) {
        let Some(window) = self.stack.get(id) else {
            return;
        };
        let frame = frame::frame_rect(window, &self.metrics);
        let title_bar = frame::title_bar_rect(window, &self.metrics).translated(frame.x, frame.y);
        if window.is_visible_on_screen() {
            self.damage.invalidate_screen(title_bar);
        }
    }

    fn set_resize_candidate(&mut self, candidate: Option<(WindowId, ResizeDirection)>) {
        let candidate = candidate.filter(|(_, d)| *d != ResizeDirection::None);
        if self.resize_candidate != candidate {
            self.resize_candidate = candidate;
            self.damage.invalidate_cursor();
        }
    }

    fn end_gesture(&mut self) {
        let window = match self.gesture {
            Gesture::Move { window, .. } | Gesture::Resize { window, .. } => Some(window),
            _ => None,
        };
        self.gesture = Gesture::None;
        if let Some(id) = window {
            self.invalidate_window(id, true);
        }
        self.damage.invalidate_cursor();
    }

    // ── Window lifecycle ─────────────────────────────────────────────

    /// Add a window on top of its band. Normal windows become active.
    pub fn create_window(&mut self, id: WindowId, client: Option<ClientId>, mut params: WindowParams) {
        if self.stack.contains(id) {
            warn!("create_window: window {id} already exists");
            return;
        }
        if params.rect.is_empty() {
            warn!("create_window: refusing empty rect {} for {id}", params.rect);
            return;
        }
        let fullscreen = params.flags.contains(WindowFlags::FULLSCREEN);
        params.flags.remove(WindowFlags::FULLSCREEN);
        let parent = params.parent;
        let accessory = params.flags.contains(WindowFlags::ACCESSORY);

        let mut window = Window::new(id, client, params);
        frame::layout_buttons(&mut window, &self.metrics);
        let window_type = window.window_type();
        let size = window.size();
        if !window.is_internal() {
            window.request_update(Rect::from_location_and_size(Point::default(), size));
        }
        self.stack.insert(window);

        if let Some(parent) = parent {
            match self.stack.get_mut(parent) {
                Some(p) if accessory => p.add_accessory(id),
                Some(p) => p.add_child(id),
                None => warn!("create_window: parent {parent} of {id} does not exist"),
            }
        }
        debug!("Created {:?} window {id} for {:?}", window_type, client);

        if let Some(frame) = self.frame_rect(id) {
            self.damage.invalidate_screen(frame);
        }
        self.damage.invalidate_occlusions();

        if fullscreen {
            self.set_fullscreen(id, true);
        }
        let visible = self.stack.get(id).is_some_and(Window::is_visible_on_screen);
        match window_type {
            WindowType::Normal if visible => self.move_to_front_and_make_active(id),
            WindowType::Desktop
                if visible
                    && self.active_window.is_none()
                    && self.resolve_activation(id).is_some() =>
            {
                self.set_active_window(Some(id));
            }
            _ => {}
        }
        self.tell_wms_window_state_changed(id);
    }

    /// Tear down a window together with its children and accessories.
    pub fn destroy_window(&mut self, id: WindowId) {
        if !self.known(id, "destroy_window") {
            return;
        }
        self.destroy_window_at_depth(id, 0);
    }

    fn destroy_window_at_depth(&mut self, id: WindowId, depth: usize) {
        if depth > self.stack.len() {
            return;
        }
        let Some(window) = self.live_window(id) else {
            return;
        };
        let client = window.client();
        let frame = frame::frame_rect(window, &self.metrics);
        let was_visible = window.is_visible_on_screen();

        let mut dependents = self.stack.children_of(id);
        dependents.extend(self.stack.accessories_of(id));
        for dependent in dependents {
            self.destroy_window_at_depth(dependent, depth + 1);
        }

        let parent = self.stack.parent_of(id);
        if let Some(window) = self.stack.get_mut(id) {
            window.destroy();
        }
        if let Some(parent) = parent.and_then(|p| self.stack.get_mut(p)) {
            parent.forget_relative(id);
        }
        self.forget_window(id);
        self.stack.remove(id);
        debug!("Destroyed window {id}");

        if was_visible {
            self.damage.invalidate_screen(frame);
        }
        self.damage.invalidate_occlusions();

        let was_active = self.active_window == Some(id);
        let was_input = self.active_input_window == Some(id);
        if was_active {
            self.active_window = None;
        }
        if was_input {
            self.active_input_window = None;
        }
        if was_active || was_input {
            self.pick_new_active_window(Some(id));
        }
        if let Some(client) = client {
            self.tell_wms(
                WmEventMask::WINDOW_REMOVALS,
                &WmEvent::WindowRemoved { client, window: id },
            );
        }
    }

    /// Drop every transient reference to a window that is going away.
    fn forget_window(&mut self, id: WindowId) {
        if self.hovered_window == Some(id) {
            self.hovered_window = None;
        }
        if self.input_tracking_window == Some(id) {
            self.input_tracking_window = None;
        }
        if self.resize_candidate.is_some_and(|(w, _)| w == id) {
            self.set_resize_candidate(None);
        }
        if self.cursor_tracking_button.is_some_and(|(w, _)| w == id) {
            self.cursor_tracking_button = None;
        }
        if self.hovered_button.is_some_and(|(w, _)| w == id) {
            self.hovered_button = None;
        }
        if self.geometry_label_window() == Some(id) {
            debug!("Window {id} went away mid-gesture");
            self.gesture = Gesture::None;
            self.damage.invalidate_cursor();
        }
    }

    /// A client went away: all of its windows go with it.
    pub fn destroy_client_windows(&mut self, client: ClientId) {
        for id in self.stack.windows_of_client(client) {
            if self.stack.contains(id) {
                self.destroy_window_at_depth(id, 0);
            }
        }
        if self.drag().is_some_and(|d| d.client == client) {
            debug!("Drag source {client} disconnected");
            self.gesture = Gesture::None;
            self.damage.invalidate_cursor();
        }
    }

    // ── Geometry ─────────────────────────────────────────────────────

    /// Move/resize a window, damaging exactly the area that changed on
    /// screen. Returns whether the rect changed.
    pub fn set_window_rect(&mut self, id: WindowId, rect: Rect) -> bool {
        let Some(old_frame) = self.frame_rect(id) else {
            return false;
        };
        self.apply_rect(id, rect, old_frame)
    }

    /// `old_frame` is the frame rect from before any flag change that
    /// affects decorations.
    fn apply_rect(&mut self, id: WindowId, rect: Rect, old_frame: Rect) -> bool {
        if rect.is_empty() {
            warn!("Refusing empty rect {rect} for {id}");
            return false;
        }
        let metrics = self.metrics;
        let Some(window) = self.stack.get_mut(id) else {
            return false;
        };
        if window.is_destroyed() || !window.set_rect(rect) {
            return false;
        }
        frame::layout_buttons(window, &metrics);
        let new_frame = frame::frame_rect(window, &metrics);
        if window.is_visible_on_screen() {
            let mut changed: DisjointRects = old_frame.shatter(new_frame).into_iter().collect();
            changed.add_many(new_frame.shatter(old_frame));
            self.damage.invalidate_screen_rects(&changed);
            self.damage.invalidate_occlusions();
        }
        self.tell_wms_window_rect_changed(id);
        true
    }

    /// Client requested geometry.
    pub fn request_window_rect(&mut self, id: WindowId, rect: Rect) {
        if !self.known(id, "set_window_rect") {
            return;
        }
        if self.stack.get(id).is_some_and(Window::is_fullscreen) {
            debug!("Ignoring rect request for fullscreen window {id}");
            return;
        }
        self.set_window_rect(id, rect);
    }

    /// The screen minus the menubar, the window's title bar and a taskbar.
    pub fn maximized_window_rect(&self, id: WindowId) -> Rect {
        let mut rect = self.screen_rect;
        let title_height = self
            .stack
            .get(id)
            .map_or(0, |w| frame::title_bar_rect(w, &self.metrics).height);
        let menubar_height = self
            .stack
            .visible_back_to_front()
            .find(|w| w.window_type() == WindowType::Menubar)
            .map_or(0, |w| w.rect().height);
        let taskbar_height = self
            .stack
            .visible_back_to_front()
            .find(|w| w.window_type() == WindowType::Taskbar)
            .map_or(0, |w| w.rect().height);
        rect.y += title_height + menubar_height;
        rect.height -= title_height + menubar_height + taskbar_height;
        rect
    }

    pub fn tiled_rect(&self, id: WindowId, tile: TileType) -> Rect {
        let Some(window) = self.stack.get(id) else {
            return Rect::default();
        };
        let maximized = self.maximized_window_rect(id);
        let frame_width = (frame::frame_rect(window, &self.metrics).width - window.rect().width) / 2;
        let half = self.screen_rect.width / 2;
        match tile {
            TileType::None => window.untiled_rect,
            TileType::Left => Rect::new(0, maximized.y, half - frame_width, maximized.height),
            TileType::Right => Rect::new(
                half + frame_width,
                maximized.y,
                half - frame_width,
                maximized.height,
            ),
        }
    }

    fn post_resized(&mut self, id: WindowId) {
        if let Some(rect) = self.stack.get(id).map(Window::rect) {
            self.post(id, ClientEvent::Resized { rect });
        }
    }

    /// Returns whether the state changed. `fixed_point` keeps a screen point
    /// at the same relative spot when restoring (used when dragging a
    /// maximized window loose).
    pub fn set_maximized(&mut self, id: WindowId, maximized: bool, fixed_point: Option<Point>) -> bool {
        let Some(window) = self.live_window(id) else {
            return false;
        };
        if window.is_maximized() == maximized || window.is_fullscreen() {
            return false;
        }
        if maximized && (!window.is_resizable() || window.aspect_ratio().is_some()) {
            debug!("Refusing to maximize {id}");
            return false;
        }
        let tiled = window.tiled();
        let current = window.rect();
        let restore = window.unmaximized_rect;
        let untiled = window.untiled_rect;

        let new_rect = if maximized {
            let saved = if tiled == TileType::None { current } else { untiled };
            if let Some(w) = self.stack.get_mut(id) {
                w.unmaximized_rect = saved;
                w.set_tiled_state(TileType::None);
            }
            self.maximized_window_rect(id)
        } else if let Some(point) = fixed_point {
            let mut rect = current;
            rect.set_size_around(restore.size(), point);
            rect
        } else {
            restore
        };
        if let Some(w) = self.stack.get_mut(id) {
            w.set_maximized_state(maximized);
        }
        self.set_window_rect(id, new_rect);
        self.invalidate_window(id, true);
        self.post_resized(id);
        self.tell_wms_window_state_changed(id);
        debug!("Window {id} maximized: {maximized}");
        true
    }

    pub fn set_tiled(&mut self, id: WindowId, tile: TileType) -> bool {
        let Some(window) = self.live_window(id) else {
            return false;
        };
        if window.tiled() == tile || window.is_fullscreen() {
            return false;
        }
        if window.aspect_ratio().is_some() {
            debug!("Refusing to tile {id} with a fixed aspect ratio");
            return false;
        }
        if tile == TileType::None {
            return self.untile(id, None);
        }
        if window.is_maximized() {
            self.set_maximized(id, false, None);
        }
        if let Some(w) = self.stack.get_mut(id) {
            if w.tiled() == TileType::None {
                w.untiled_rect = w.rect();
            }
            w.set_tiled_state(tile);
        }
        let rect = self.tiled_rect(id, tile);
        self.set_window_rect(id, rect);
        self.post_resized(id);
        debug!("Window {id} tiled {:?}", tile);
        true
    }

    /// Leave tiling, restoring the untiled size (around `fixed_point` when
    /// given, otherwise at the untiled position).
    pub fn untile(&mut self, id: WindowId, fixed_point: Option<Point>) -> bool {
        let Some(window) = self.live_window(id) else {
            return false;
        };
        if window.tiled() == TileType::None || window.is_fullscreen() {
            return false;
        }
        let untiled = window.untiled_rect;
        let new_rect = fixed_point.map_or(untiled, |point| {
            let mut rect = window.rect();
            rect.set_size_around(untiled.size(), point);
            rect
        });
        if let Some(w) = self.stack.get_mut(id) {
            w.set_tiled_state(TileType::None);
        }
        self.set_window_rect(id, new_rect);
        self.post_resized(id);
        true
    }

    /// Fullscreen is exclusive: entering it takes every other window out.
    pub fn set_fullscreen(&mut self, id: WindowId, fullscreen: bool) -> bool {
        let Some(window) = self.live_window(id) else {
            return false;
        };
        if window.is_fullscreen() == fullscreen {
            return false;
        }
        if fullscreen {
            let others: Vec<WindowId> = self
                .stack
                .iter_back_to_front()
                .filter(|w| w.id() != id && w.is_fullscreen())
                .map(Window::id)
                .collect();
            for other in others {
                self.set_fullscreen(other, false);
            }
        }
        let Some(old_frame) = self.frame_rect(id) else {
            return false;
        };
        let new_rect = {
            let Some(window) = self.stack.get_mut(id) else {
                return false;
            };
            if fullscreen {
                window.saved_nonfullscreen_rect = window.rect();
                window.set_fullscreen_flag(true);
                self.screen_rect
            } else {
                window.set_fullscreen_flag(false);
                if window.saved_nonfullscreen_rect.is_empty() {
                    window.rect()
                } else {
                    window.saved_nonfullscreen_rect
                }
            }
        };
        if let Some(window) = self.stack.get_mut(id) {
            frame::layout_buttons(window, &self.metrics);
            window.invalidate(true);
        }
        if !self.apply_rect(id, new_rect, old_frame) {
            // Same rect, but the decorations still changed.
            self.damage.invalidate_screen(old_frame);
            self.damage.invalidate_occlusions();
        }
        self.post_resized(id);
        self.tell_wms_window_state_changed(id);
        debug!("Window {id} fullscreen: {fullscreen}");
        true
    }

    pub fn set_minimized(&mut self, id: WindowId, minimized: bool) -> bool {
        let Some(window) = self.live_window(id) else {
            return false;
        };
        if window.is_minimized() == minimized {
            return false;
        }
        if minimized && !window.is_minimizable() {
            debug!("Refusing to minimize {id}");
            return false;
        }
        let frame = frame::frame_rect(window, &self.metrics);
        if let Some(window) = self.stack.get_mut(id) {
            window.set_minimized_state(minimized);
            if !minimized {
                let size = window.size();
                window.request_update(Rect::from_location_and_size(Point::default(), size));
                window.invalidate(true);
            }
        }
        self.damage.invalidate_screen(frame);
        self.damage.invalidate_occlusions();
        if minimized {
            self.forget_window_gestures(id);
        }
        self.post_state_changed(id);
        self.tell_wms_window_state_changed(id);
        if minimized && (self.active_window == Some(id) || self.active_input_window == Some(id)) {
            self.pick_new_active_window(Some(id));
        }
        debug!("Window {id} minimized: {minimized}");
        true
    }

    fn forget_window_gestures(&mut self, id: WindowId) {
        if self.geometry_label_window() == Some(id) {
            self.end_gesture();
        }
        if self.input_tracking_window == Some(id) {
            self.input_tracking_window = None;
        }
    }

    pub fn set_window_visible(&mut self, id: WindowId, visible: bool) {
        if !self.known(id, "set_window_visible") {
            return;
        }
        let Some(frame) = self.frame_rect(id) else {
            return;
        };
        let changed = self
            .stack
            .get_mut(id)
            .is_some_and(|w| w.set_visible(visible));
        if !changed {
            return;
        }
        self.damage.invalidate_screen(frame);
        self.damage.invalidate_occlusions();
        if visible {
            if let Some(window) = self.stack.get_mut(id) {
                let size = window.size();
                window.request_update(Rect::from_location_and_size(Point::default(), size));
            }
        } else {
            self.forget_window_gestures(id);
            if self.active_window == Some(id) || self.active_input_window == Some(id) {
                self.pick_new_active_window(Some(id));
            }
        }
        self.tell_wms_window_state_changed(id);
    }

    pub fn set_window_title(&mut self, id: WindowId, title: String) {
        if !self.known(id, "set_window_title") {
            return;
        }
        if self.stack.get_mut(id).is_some_and(|w| w.set_title(title)) {
            self.invalidate_title_bar(id);
            self.tell_wms_window_state_changed(id);
        }
    }

    pub fn set_window_icon(&mut self, id: WindowId, icon: Option<Bitmap>) {
        if !self.known(id, "set_window_icon") {
            return;
        }
        if let Some(window) = self.stack.get_mut(id) {
            window.set_icon(icon);
        }
        self.invalidate_title_bar(id);
        let client = self.stack.get(id).and_then(Window::client);
        if let Some(client) = client {
            self.tell_wms(
                WmEventMask::WINDOW_ICON_CHANGES,
                &WmEvent::WindowIconChanged { client, window: id },
            );
        }
    }

    pub fn set_window_opacity(&mut self, id: WindowId, opacity: f32) {
        if !self.known(id, "set_window_opacity") {
            return;
        }
        if self.stack.get_mut(id).is_some_and(|w| w.set_opacity(opacity)) {
            // Decorations are drawn with the window's opacity too.
            self.invalidate_window(id, true);
            self.damage.invalidate_occlusions();
        }
    }

    pub fn set_window_has_alpha_channel(&mut self, id: WindowId, value: bool) {
        if !self.known(id, "set_window_has_alpha_channel") {
            return;
        }
        if self
            .stack
            .get_mut(id)
            .is_some_and(|w| w.set_has_alpha_channel(value))
        {
            self.invalidate_window(id, false);
            self.damage.invalidate_occlusions();
        }
    }

    pub fn set_window_frameless(&mut self, id: WindowId, frameless: bool) {
        if !self.known(id, "set_window_frameless") {
            return;
        }
        let Some(old_frame) = self.frame_rect(id) else {
            return;
        };
        let metrics = self.metrics;
        let changed = self.stack.get_mut(id).is_some_and(|w| {
            let changed = w.set_frameless(frameless);
            if changed {
                frame::layout_buttons(w, &metrics);
            }
            changed
        });
        if changed {
            self.damage.invalidate_screen(old_frame);
            self.damage.invalidate_occlusions();
            self.tell_wms_window_state_changed(id);
        }
    }

    pub fn set_window_resize_constraints(
        &mut self,
        id: WindowId,
        base_size: Size,
        size_increment: Size,
        aspect_ratio: Option<Size>,
    ) {
        if !self.known(id, "set_window_resize_constraints") {
            return;
        }
        if let Some(window) = self.stack.get_mut(id) {
            window.set_resize_constraints(base_size, size_increment, aspect_ratio);
        }
        if self.stack.get(id).is_some_and(|w| w.aspect_ratio().is_some()) {
            // Neither maximized nor tiled rects respect an aspect ratio.
            self.untile(id, None);
            self.set_maximized(id, false, None);
        }
    }

    pub fn set_global_cursor_tracking(&mut self, id: WindowId, enabled: bool) {
        if !self.known(id, "set_global_cursor_tracking") {
            return;
        }
        if let Some(window) = self.stack.get_mut(id) {
            window.set_global_cursor_tracking(enabled);
        }
    }

    // ── Pixels ───────────────────────────────────────────────────────

    pub fn set_backing_store(&mut self, id: WindowId, serial: i32, bitmap: Bitmap) {
        if !self.known(id, "set_backing_store") {
            return;
        }
        if let Some(window) = self.stack.get_mut(id) {
            window.set_backing_store(crate::window::BackingStore { serial, bitmap });
            window.invalidate(false);
        }
        self.damage.schedule();
    }

    /// The client wants `Paint` for these window-relative rects.
    pub fn request_update(&mut self, id: WindowId, rects: &[Rect]) {
        if !self.known(id, "invalidate_rect") {
            return;
        }
        if let Some(window) = self.stack.get_mut(id) {
            for rect in rects {
                window.request_update(*rect);
            }
        }
    }

    /// The client painted these window-relative rects into its backing store.
    pub fn did_finish_painting(&mut self, id: WindowId, rects: &[Rect]) {
        if !self.known(id, "did_finish_painting") {
            return;
        }
        let Some(frame) = self.frame_rect(id) else {
            return;
        };
        let mut dirty = false;
        if let Some(window) = self.stack.get_mut(id) {
            for rect in rects {
                dirty |= window.invalidate_rect(*rect, false, frame);
            }
        }
        if dirty {
            self.damage.schedule();
        }
    }

    // ── Stacking and focus ───────────────────────────────────────────

    fn raise(&mut self, id: WindowId, depth: usize) {
        if depth > self.stack.len() {
            return;
        }
        if self.stack.move_to_front(id) {
            self.invalidate_window(id, true);
        }
        for child in self.stack.children_of(id) {
            self.raise(child, depth + 1);
        }
    }

    /// Raise a window, pulling its accessory family along.
    fn raise_with_relatives(&mut self, id: WindowId) {
        if self.stack.is_accessory(id) {
            if let Some(parent) = self.stack.parent_of(id) {
                self.raise(parent, 0);
                for accessory in self.stack.accessories_of(parent) {
                    if accessory != id {
                        self.raise(accessory, 0);
                    }
                }
            }
        }
        self.raise(id, 0);
        for accessory in self.stack.accessories_of(id) {
            self.raise(accessory, 0);
        }
    }

    /// Raise the window and any modal windows blocking it, then activate.
    pub fn move_to_front_and_make_active(&mut self, id: WindowId) {
        if self.live_window(id).is_none() {
            return;
        }
        let mut chain = vec![id];
        let mut current = id;
        while let Some(modal) = self.stack.blocking_modal_window(current) {
            if chain.contains(&modal) {
                break;
            }
            chain.push(modal);
            current = modal;
        }
        for window in &chain {
            self.raise_with_relatives(*window);
        }
        self.damage.invalidate_occlusions();

        if self.resolve_activation(id).is_some() {
            self.set_active_window(Some(id));
        }
    }

    /// Raise only (client request); activate when the window can be.
    pub fn request_move_to_front(&mut self, id: WindowId) {
        if !self.known(id, "move_window_to_front") {
            return;
        }
        self.move_to_front_and_make_active(id);
    }

    pub fn request_set_active_window(&mut self, id: WindowId) {
        if !self.known(id, "set_active_window") {
            return;
        }
        if self.resolve_activation(id).is_none() {
            debug!("Window {id} cannot become active");
            return;
        }
        self.set_active_window(Some(id));
    }

    /// Which windows end up (active, input) when activating `id`: a
    /// blocking modal window takes over, and an accessory hands activation
    /// to its parent while keeping input. `None` when the result cannot be
    /// active.
    fn resolve_activation(&self, id: WindowId) -> Option<(WindowId, WindowId)> {
        let mut target = id;
        if let Some(modal) = self.stack.blocking_modal_window(id) {
            target = modal;
        }
        let input = target;
        if self.stack.is_accessory(target) {
            target = self.stack.parent_of(target)?;
        }
        let window = self.live_window(target)?;
        (window.window_type().can_become_active() && window.is_visible_on_screen())
            .then_some((target, input))
    }

    /// Change the active window. Windows that cannot become active are
    /// ignored.
    pub fn set_active_window(&mut self, id: Option<WindowId>) {
        let resolved = match id {
            Some(id) => {
                let resolved = self.resolve_activation(id);
                if resolved.is_none() {
                    debug!("Window {id} cannot become active");
                    return;
                }
                resolved
            }
            None => None,
        };
        let (active, input) = resolved.map_or((None, None), |(a, i)| (Some(a), Some(i)));

        self.set_active_input_window(input);
        if active == self.active_window {
            return;
        }
        let previous = std::mem::replace(&mut self.active_window, active);
        debug!("Active window {:?} -> {:?}", previous, active);

        let previous_client = previous.and_then(|p| self.stack.get(p)).and_then(Window::client);
        if let Some(previous) = previous.filter(|p| self.stack.contains(*p)) {
            self.post(previous, ClientEvent::Deactivated);
            self.invalidate_window(previous, true);
            self.tell_wms_window_state_changed(previous);
        }
        let new_client = active.and_then(|a| self.stack.get(a)).and_then(Window::client);
        if let Some(active) = active {
            self.post(active, ClientEvent::Activated);
            self.invalidate_window(active, true);
            self.tell_wms_window_state_changed(active);
        }
        if previous_client != new_client {
            if let Some(client) = previous_client {
                self.actions.push(CoreAction::SetClientBoost {
                    client,
                    boosted: false,
                });
            }
            if let Some(client) = new_client {
                self.actions.push(CoreAction::SetClientBoost {
                    client,
                    boosted: true,
                });
            }
        }
    }

    fn set_active_input_window(&mut self, id: Option<WindowId>) {
        if self.active_input_window == id {
            return;
        }
        let previous = std::mem::replace(&mut self.active_input_window, id);
        if let Some(previous) = previous.filter(|p| self.stack.contains(*p)) {
            self.post(previous, ClientEvent::InputLeft);
        }
        if let Some(id) = id {
            self.post(id, ClientEvent::InputEntered);
        }
    }

    /// The front-most normal window other than `previous` (and its
    /// accessories); falls back to any candidate.
    fn pick_new_active_window(&mut self, previous: Option<WindowId>) {
        let candidates: Vec<WindowId> = self
            .stack
            .visible_front_to_back()
            .filter(|w| w.window_type() == WindowType::Normal)
            .map(Window::id)
            .collect();
        let preferred = candidates.iter().copied().find(|c| {
            previous.map_or(true, |p| *c != p && !self.stack.is_accessory_of(*c, p))
        });
        let choice = preferred
            .or_else(|| candidates.first().copied())
            .filter(|c| self.resolve_activation(*c).is_some());
        debug!("Picked new active window {:?}", choice);
        self.set_active_window(choice);
    }

    // ── WM listeners ─────────────────────────────────────────────────

    fn listeners(&self, mask: WmEventMask) -> Vec<(ClientId, WindowId)> {
        self.stack
            .iter_back_to_front()
            .filter(|w| !w.is_destroyed() && w.wm_event_mask().intersects(mask))
            .filter_map(|w| w.client().map(|c| (c, w.id())))
            .collect()
    }

    /// Report to every listener subscribed to `mask`.
    fn tell_wms(&mut self, mask: WmEventMask, event: &WmEvent) {
        for (client, listener) in self.listeners(mask) {
            self.actions.push(CoreAction::WmEvent {
                client,
                listener,
                event: event.clone(),
            });
        }
    }

    fn state_event(&self, id: WindowId) -> Option<WmEvent> {
        let window = self.live_window(id)?;
        let client = window.client()?;
        Some(WmEvent::WindowStateChanged {
            client,
            window: id,
            parent: self.stack.parent_of(id),
            window_type: window.window_type(),
            title: window.title().to_owned(),
            rect: window.rect(),
            active: self.active_window == Some(id),
            minimized: window.is_minimized(),
            modal: window.is_modal(),
            frameless: window.is_frameless(),
        })
    }

    fn tell_wms_window_state_changed(&mut self, id: WindowId) {
        let Some(event) = self.state_event(id) else {
            return;
        };
        self.tell_wms(WmEventMask::WINDOW_STATE_CHANGES, &event);
    }

    fn tell_wms_window_rect_changed(&mut self, id: WindowId) {
        let Some(window) = self.live_window(id) else {
            return;
        };
        let Some(client) = window.client() else {
            return;
        };
        let rect = window.rect();
        self.tell_wms(
            WmEventMask::WINDOW_RECT_CHANGES,
            &WmEvent::WindowRectChanged {
                client,
                window: id,
                rect,
            },
        );
    }

    /// Subscribe a listener window. It immediately hears about every
    /// existing window.
    pub fn set_wm_event_mask(&mut self, id: WindowId, mask: WmEventMask) {
        if !self.known(id, "set_wm_event_mask") {
            return;
        }
        let Some(client) = self.stack.get_mut(id).and_then(|w| {
            w.set_wm_event_mask(mask);
            w.client()
        }) else {
            return;
        };
        if !mask.contains(WmEventMask::WINDOW_STATE_CHANGES) {
            return;
        }
        let events: Vec<WmEvent> = self
            .stack
            .order()
            .iter()
            .filter_map(|w| self.state_event(*w))
            .collect();
        for event in events {
            self.actions.push(CoreAction::WmEvent {
                client,
                listener: id,
                event,
            });
        }
    }

    // ── Screen ───────────────────────────────────────────────────────

    /// Re-fit windows whose rect is derived from the screen size.
    pub fn set_resolution(&mut self, screen_rect: Rect) {
        self.screen_rect = screen_rect;
        self.cursor_location = Point::new(
            self.cursor_location.x.clamp(0, (screen_rect.width - 1).max(0)),
            self.cursor_location.y.clamp(0, (screen_rect.height - 1).max(0)),
        );
        for id in self.stack.ids_back_to_front() {
            let Some(window) = self.stack.get(id) else {
                continue;
            };
            let rect = if window.is_fullscreen() {
                Some(screen_rect)
            } else if window.is_maximized() {
                Some(self.maximized_window_rect(id))
            } else if window.tiled() != TileType::None {
                Some(self.tiled_rect(id, window.tiled()))
            } else {
                None
            };
            if let Some(rect) = rect {
                if self.set_window_rect(id, rect) {
                    self.post_resized(id);
                }
            }
        }
        self.damage.invalidate_occlusions();
        self.damage.invalidate_screen(screen_rect);
        debug!("Window manager resized to {}", screen_rect);
    }

    // ── Gestures ─────────────────────────────────────────────────────

    fn start_window_move(&mut self, id: WindowId, origin: Point) {
        self.move_to_front_and_make_active(id);
        let Some(window) = self.live_window(id) else {
            return;
        };
        debug!("Begin moving {id}");
        self.gesture = Gesture::Move {
            window: id,
            origin,
            window_origin: window.position(),
        };
        self.set_resize_candidate(None);
        self.invalidate_window(id, true);
        self.damage.invalidate_cursor();
    }

    fn restart_move_at(&mut self, id: WindowId, origin: Point) {
        if let Some(window_origin) = self.stack.get(id).map(Window::position) {
            self.gesture = Gesture::Move {
                window: id,
                origin,
                window_origin,
            };
        }
    }

    /// Begin an interactive resize from `position`, picking the edge from
    /// the frame's 3x3 hot areas.
    pub fn start_window_resize(&mut self, id: WindowId, position: Point, button: MouseButton) {
        if !self.known(id, "start_window_resize") {
            return;
        }
        if !self.stack.get(id).is_some_and(Window::is_resizable) {
            debug!("Window {id} is not resizable");
            return;
        }
        self.move_to_front_and_make_active(id);
        let Some(frame) = self.frame_rect(id) else {
            return;
        };
        let direction = frame::hot_area_direction(frame, position);
        if direction == ResizeDirection::None {
            return;
        }
        let Some(original_rect) = self.stack.get(id).map(Window::rect) else {
            return;
        };
        debug!("Begin resizing {id} {:?}", direction);
        self.gesture = Gesture::Resize {
            window: id,
            origin: position,
            original_rect,
            direction,
            button,
        };
        self.set_resize_candidate(None);
        self.invalidate_window(id, true);
        self.damage.invalidate_cursor();
    }

    /// Client asks to begin a drag-and-drop. Refused while another gesture runs.
    pub fn start_drag(&mut self, client: ClientId, text: String, data_type: String, bitmap: Option<Bitmap>) {
        if !matches!(self.gesture, Gesture::None) {
            debug!("Refusing drag from {client}: another gesture is active");
            self.actions.push(CoreAction::DragCancelled { client });
            return;
        }
        debug!("Begin drag from {client} ({data_type})");
        self.gesture = Gesture::Drag(DragState {
            client,
            text,
            data_type,
            bitmap,
        });
        self.damage.invalidate_cursor();
    }

    fn cancel_drag(&mut self) {
        if let Gesture::Drag(drag) = std::mem::take(&mut self.gesture) {
            debug!("Drag from {} cancelled", drag.client);
            self.actions
                .push(CoreAction::DragCancelled { client: drag.client });
            self.damage.invalidate_cursor();
        }
    }

    // ── Pointer dispatch ─────────────────────────────────────────────

    /// Route a pointer event (screen coordinates).
    pub fn process_mouse_event(&mut self, event: &MouseEvent) {
        self.cursor_location = event.position;

        if self.process_ongoing_drag(event) {
            return;
        }
        let tracked = self.deliver_to_global_tracking_windows(event);
        if self.process_ongoing_move(event) {
            return;
        }
        if self.process_ongoing_resize(event) {
            return;
        }
        if self.process_cursor_tracking_button(event) {
            return;
        }
        if self.process_menus(event) {
            return;
        }
        if self.process_input_tracking(event, &tracked) {
            return;
        }
        self.process_hit_test(event, &tracked);
    }

    fn deliver_mouse_event(&mut self, id: WindowId, event: &MouseEvent, process_double_click: bool) {
        let Some(rect) = self.live_window(id).map(Window::rect) else {
            return;
        };
        let local = event.translated(-rect.x, -rect.y);
        if process_double_click && event.kind == MouseEventKind::Up {
            if let Some(button) = event.button {
                self.post(id, ClientEvent::MouseUp(local));
                if self
                    .double_click
                    .process(id, button, event.position, self.damage.now())
                {
                    trace!("Double click on {id}");
                    self.post(
                        id,
                        ClientEvent::MouseDoubleClick(MouseEvent {
                            kind: MouseEventKind::DoubleClick,
                            ..local
                        }),
                    );
                }
                return;
            }
        }
        self.post(id, ClientEvent::from_mouse(local));
    }

    fn process_ongoing_drag(&mut self, event: &MouseEvent) -> bool {
        let Gesture::Drag(drag) = &self.gesture else {
            return false;
        };
        let data_type = drag.data_type.clone();
        match event.kind {
            MouseEventKind::Move => {
                let target = self
                    .stack
                    .visible_front_to_back()
                    .find(|w| w.rect().contains(event.position))
                    .map(|w| (w.id(), w.rect()));
                if let Some((id, rect)) = target {
                    self.post(
                        id,
                        ClientEvent::MouseMove {
                            event: event.translated(-rect.x, -rect.y),
                            drag_data_type: Some(data_type),
                        },
                    );
                }
                self.damage.invalidate_cursor();
            }
            MouseEventKind::Up if event.button == Some(MouseButton::Left) => {
                let target = self
                    .stack
                    .visible_front_to_back()
                    .find(|w| w.rect().contains(event.position))
                    .and_then(|w| w.client().map(|c| (c, w.id(), w.rect())));
                let Gesture::Drag(drag) = std::mem::take(&mut self.gesture) else {
                    return true;
                };
                if let Some((client, window, rect)) = target {
                    debug!("Drag from {} dropped on {window}", drag.client);
                    self.actions
                        .push(CoreAction::DragAccepted { client: drag.client });
                    self.actions.push(CoreAction::DragDropped {
                        client,
                        window,
                        position: event.position - rect.location(),
                        text: drag.text,
                        data_type: drag.data_type,
                    });
                } else {
                    debug!("Drag from {} dropped on nothing", drag.client);
                    self.actions
                        .push(CoreAction::DragCancelled { client: drag.client });
                }
                self.damage.invalidate_cursor();
            }
            _ => {}
        }
        true
    }

    /// Windows with global cursor tracking see every event. Returns who got it.
    fn deliver_to_global_tracking_windows(&mut self, event: &MouseEvent) -> Vec<WindowId> {
        let targets: Vec<WindowId> = self
            .stack
            .visible_back_to_front()
            .filter(|w| w.global_cursor_tracking())
            .map(Window::id)
            .filter(|id| self.stack.blocking_modal_window(*id).is_none())
            .collect();
        for id in &targets {
            self.deliver_mouse_event(*id, event, false);
        }
        targets
    }

    fn process_ongoing_move(&mut self, event: &MouseEvent) -> bool {
        let Gesture::Move {
            window: id,
            origin,
            window_origin,
        } = self.gesture
        else {
            return false;
        };
        let Some(window) = self.live_window(id) else {
            self.end_gesture();
            return false;
        };
        let resizable = window.is_resizable();
        let maximized = window.is_maximized();
        let tiled = window.tiled();
        let size = window.size();

        if event.is_button(MouseEventKind::Up, MouseButton::Left) {
            debug!("Finish moving {id}");
            self.end_gesture();
            if resizable
                && self
                    .double_click
                    .process(id, MouseButton::Left, event.position, self.damage.now())
            {
                self.set_maximized(id, !maximized, None);
            }
            return true;
        }
        if event.kind != MouseEventKind::Move {
            return true;
        }

        let position = event.position;
        let moved = position.pixels_moved(origin) > MOVE_THRESHOLD;
        if maximized {
            if moved {
                self.set_maximized(id, false, Some(position));
                self.restart_move_at(id, position);
            }
            return true;
        }
        if resizable && position.x <= TILING_DEADZONE {
            self.set_tiled(id, TileType::Left);
        } else if resizable && position.x >= self.screen_rect.width - TILING_DEADZONE {
            self.set_tiled(id, TileType::Right);
        } else if resizable && position.y <= MAXIMIZE_DEADZONE {
            self.set_maximized(id, true, None);
        } else if moved || tiled == TileType::None {
            if tiled != TileType::None && self.untile(id, Some(position)) {
                self.restart_move_at(id, position);
                return true;
            }
            let new_rect =
                Rect::from_location_and_size(window_origin + (position - origin), size);
            self.set_window_rect(id, new_rect);
        }
        true
    }

    fn process_ongoing_resize(&mut self, event: &MouseEvent) -> bool {
        let Gesture::Resize {
            window: id,
            origin,
            original_rect,
            direction,
            button,
        } = self.gesture
        else {
            return false;
        };
        let Some(window) = self.live_window(id) else {
            self.end_gesture();
            return false;
        };
        if event.kind == MouseEventKind::Up && event.button == Some(button) {
            debug!("Finish resizing {id}");
            self.end_gesture();
            self.post_resized(id);
            return true;
        }
        if event.kind != MouseEventKind::Move {
            return true;
        }

        let dx = event.position.x - origin.x;
        let dy = event.position.y - origin.y;
        let (change_w, change_h) = match direction {
            ResizeDirection::DownRight => (dx, dy),
            ResizeDirection::Right => (dx, 0),
            ResizeDirection::UpRight => (dx, -dy),
            ResizeDirection::Up => (0, -dy),
            ResizeDirection::UpLeft => (-dx, -dy),
            ResizeDirection::Left => (-dx, 0),
            ResizeDirection::DownLeft => (-dx, dy),
            ResizeDirection::Down => (0, dy),
            ResizeDirection::None => (0, 0),
        };

        let mut width = (original_rect.width + change_w).max(MIN_WINDOW_SIZE);
        let mut height = (original_rect.height + change_h).max(MIN_WINDOW_SIZE);

        let base = window.base_size();
        let increment = window.size_increment();
        if increment.width > 0 {
            width = base.width + ((width - base.width) / increment.width) * increment.width;
        }
        if increment.height > 0 {
            height = base.height + ((height - base.height) / increment.height) * increment.height;
        }
        if let Some(ratio) = window.aspect_ratio() {
            if change_w.abs() > change_h.abs() {
                height = width * ratio.height / ratio.width;
            } else {
                width = height * ratio.width / ratio.height;
            }
        }

        let mut new_rect = original_rect;
        new_rect.set_size(Size::new(width, height));
        match direction {
            ResizeDirection::Left | ResizeDirection::Up | ResizeDirection::UpLeft => {
                new_rect.set_right_bottom(Point::new(original_rect.right(), original_rect.bottom()));
            }
            ResizeDirection::UpRight => {
                new_rect.set_bottom_left(Point::new(original_rect.x, original_rect.bottom()));
            }
            ResizeDirection::DownLeft => {
                new_rect.set_top_right(Point::new(original_rect.right(), original_rect.y));
            }
            _ => {}
        }

        if self.set_window_rect(id, new_rect) {
            trace!("Resize {id} to {new_rect}");
            self.post_resized(id);
        }
        true
    }

    fn process_cursor_tracking_button(&mut self, event: &MouseEvent) -> bool {
        let Some((id, kind)) = self.cursor_tracking_button else {
            return false;
        };
        let Some(window) = self.live_window(id) else {
            self.cursor_tracking_button = None;
            return false;
        };
        let frame = frame::frame_rect(window, &self.metrics);
        let Some(button) = window.frame_state().button(kind) else {
            self.cursor_tracking_button = None;
            return false;
        };
        let inside = button.rect.translated(frame.x, frame.y).contains(event.position);
        match event.kind {
            MouseEventKind::Move => {
                let changed = self
                    .stack
                    .get_mut(id)
                    .and_then(|w| w.frame.button_mut(kind))
                    .is_some_and(|b| {
                        let changed = b.pressed != inside || b.hovered != inside;
                        b.pressed = inside;
                        b.hovered = inside;
                        changed
                    });
                if changed {
                    self.invalidate_title_bar(id);
                }
            }
            MouseEventKind::Up if event.button == Some(MouseButton::Left) => {
                self.cursor_tracking_button = None;
                if let Some(b) = self.stack.get_mut(id).and_then(|w| w.frame.button_mut(kind)) {
                    b.pressed = false;
                }
                self.invalidate_title_bar(id);
                if inside {
                    self.on_frame_button_clicked(id, kind);
                }
            }
            _ => {}
        }
        true
    }

    fn on_frame_button_clicked(&mut self, id: WindowId, kind: FrameButtonKind) {
        debug!("Frame button {:?} clicked on {id}", kind);
        match kind {
            FrameButtonKind::Close => self.post(id, ClientEvent::CloseRequest),
            FrameButtonKind::Maximize => {
                let maximized = self.stack.get(id).is_some_and(Window::is_maximized);
                self.set_maximized(id, !maximized, None);
            }
            FrameButtonKind::Minimize => {
                self.set_minimized(id, true);
            }
        }
    }

    fn set_hovered_button(&mut self, hovered: Option<(WindowId, FrameButtonKind)>) {
        if self.hovered_button == hovered {
            return;
        }
        if let Some((id, kind)) = self.hovered_button {
            if let Some(b) = self.stack.get_mut(id).and_then(|w| w.frame.button_mut(kind)) {
                b.hovered = false;
            }
            self.invalidate_title_bar(id);
        }
        self.hovered_button = hovered;
        if let Some((id, kind)) = hovered {
            if let Some(b) = self.stack.get_mut(id).and_then(|w| w.frame.button_mut(kind)) {
                b.hovered = true;
            }
            self.invalidate_title_bar(id);
        }
    }

    /// Open menus and the menubar get the pointer first. A press outside
    /// every menu closes them and is swallowed.
    fn process_menus(&mut self, event: &MouseEvent) -> bool {
        let is_menu_type = |w: &Window| {
            matches!(
                w.window_type(),
                WindowType::Menu | WindowType::Menubar | WindowType::MenuApplet
            )
        };
        let open_menus: Vec<WindowId> = self
            .stack
            .visible_front_to_back()
            .filter(|w| w.window_type() == WindowType::Menu)
            .map(Window::id)
            .collect();
        let under_pointer = self.stack.window_at(event.position, &self.metrics);
        let over_menu = under_pointer
            .and_then(|id| self.stack.get(id))
            .is_some_and(is_menu_type);
        if open_menus.is_empty() && !over_menu {
            return false;
        }

        if let Some(id) = under_pointer.filter(|_| over_menu) {
            self.set_hovered_window(Some(id));
            self.deliver_mouse_event(id, event, false);
            return true;
        }
        if event.kind == MouseEventKind::Down {
            debug!("Press outside menus, closing {} menu(s)", open_menus.len());
            for id in open_menus {
                self.set_window_visible(id, false);
                self.post(id, ClientEvent::MenuDismissed);
            }
        }
        true
    }

    fn process_input_tracking(&mut self, event: &MouseEvent, tracked: &[WindowId]) -> bool {
        let Some(id) = self.input_tracking_window else {
            return false;
        };
        if self.live_window(id).is_none() {
            self.input_tracking_window = None;
            return false;
        }
        if !tracked.contains(&id) {
            self.deliver_mouse_event(id, event, true);
        }
        if event.kind == MouseEventKind::Up && event.buttons.is_empty() {
            self.input_tracking_window = None;
        }
        true
    }

    fn set_hovered_window(&mut self, id: Option<WindowId>) {
        if self.hovered_window == id {
            return;
        }
        let previous = std::mem::replace(&mut self.hovered_window, id);
        if let Some(previous) = previous.filter(|p| self.stack.contains(*p)) {
            self.post(previous, ClientEvent::Left);
        }
        if let Some(id) = id {
            self.post(id, ClientEvent::Entered);
        }
    }

    fn process_hit_test(&mut self, event: &MouseEvent, tracked: &[WindowId]) {
        let hit = self
            .active_fullscreen_window()
            .or_else(|| self.stack.window_at(event.position, &self.metrics));
        self.set_hovered_window(hit);

        let Some(id) = hit else {
            self.set_hovered_button(None);
            self.set_resize_candidate(None);
            if event.kind == MouseEventKind::Down && self.active_window.is_some() {
                debug!("Press outside every window, clearing active window");
                self.set_active_window(None);
            }
            return;
        };
        let Some(window) = self.live_window(id) else {
            return;
        };
        let window_type = window.window_type();
        let blocked = self.stack.blocking_modal_window(id).is_some();
        let movable = window.is_movable();
        let resizable = window.is_resizable();
        let opacity = window.opacity();
        let inner = window.rect();
        let logo = self.modifiers == Modifiers::LOGO;

        if logo && event.kind == MouseEventKind::Down && !blocked {
            if event.button == Some(MouseButton::Left) && movable {
                self.start_window_move(id, event.position);
                return;
            }
            if event.button == Some(MouseButton::Right) && resizable {
                self.start_window_resize(id, event.position, MouseButton::Right);
                return;
            }
        }
        if logo && event.kind == MouseEventKind::Wheel && window_type == WindowType::Normal {
            #[allow(clippy::cast_precision_loss)]
            let step = event.wheel_delta as f32 * OPACITY_STEP;
            self.set_window_opacity(id, (opacity - step).clamp(MIN_OPACITY, 1.0));
            return;
        }

        if blocked {
            if event.kind == MouseEventKind::Down {
                self.move_to_front_and_make_active(id);
            }
            return;
        }

        if event.kind == MouseEventKind::Down {
            match window_type {
                WindowType::Normal => self.move_to_front_and_make_active(id),
                WindowType::Desktop if self.resolve_activation(id).is_some() => {
                    self.set_active_window(Some(id));
                }
                _ => {}
            }
        }

        if inner.contains(event.position) {
            self.set_hovered_button(None);
            self.set_resize_candidate(None);
            if !tracked.contains(&id) {
                self.deliver_mouse_event(id, event, true);
            }
            if event.kind == MouseEventKind::Down {
                self.input_tracking_window = Some(id);
            }
            return;
        }
        self.process_frame_mouse_event(id, event);
    }

    /// Pointer over decorations: title bar buttons, move, border resize.
    fn process_frame_mouse_event(&mut self, id: WindowId, event: &MouseEvent) {
        let Some(window) = self.live_window(id) else {
            return;
        };
        let frame = frame::frame_rect(window, &self.metrics);
        let relative = event.position - frame.location();
        let title_bar = frame::title_bar_rect(window, &self.metrics);
        let title_area = Rect::new(title_bar.x, title_bar.y, title_bar.width, title_bar.height + 2);
        let movable = window.is_movable();
        let resizable = window.is_resizable();
        let button = window.frame_state().button_at(relative);

        if title_area.contains(relative) {
            self.set_resize_candidate(None);
            if let Some(kind) = button {
                self.set_hovered_button(Some((id, kind)));
                if event.is_button(MouseEventKind::Down, MouseButton::Left) {
                    if let Some(b) = self.stack.get_mut(id).and_then(|w| w.frame.button_mut(kind)) {
                        b.pressed = true;
                    }
                    self.cursor_tracking_button = Some((id, kind));
                    self.invalidate_title_bar(id);
                }
                return;
            }
            self.set_hovered_button(None);
            if event.is_button(MouseEventKind::Down, MouseButton::Left) && movable {
                self.start_window_move(id, event.position);
            }
            return;
        }

        self.set_hovered_button(None);
        if !resizable {
            self.set_resize_candidate(None);
            return;
        }
        if event.kind == MouseEventKind::Move && event.buttons.is_empty() {
            let direction = frame::hot_area_direction(frame, event.position);
            self.set_resize_candidate(Some((id, direction)));
            return;
        }
        if event.is_button(MouseEventKind::Down, MouseButton::Left) {
            self.start_window_resize(id, event.position, MouseButton::Left);
        }
    }

    // ── Keyboard ─────────────────────────────────────────────────────

    pub fn process_key_event(&mut self, key: Key, pressed: bool) {
        if let Some(modifier) = key.modifier() {
            self.modifiers.set(modifier, pressed);
        }
        let event = KeyEvent {
            key,
            modifiers: self.modifiers,
        };

        if pressed && key == Key::Escape && self.drag().is_some() {
            self.cancel_drag();
            return;
        }
        if pressed && self.modifiers == Modifiers::LOGO && self.process_window_shortcut(key) {
            return;
        }
        let Some(target) = self.active_input_window else {
            return;
        };
        let message = if pressed {
            ClientEvent::KeyDown(event)
        } else {
            ClientEvent::KeyUp(event)
        };
        self.post(target, message);
    }

    /// Logo + arrow keys act on the active input window. Returns whether the
    /// key was consumed.
    fn process_window_shortcut(&mut self, key: Key) -> bool {
        let Some(id) = self.active_input_window else {
            return false;
        };
        let Some(window) = self.live_window(id) else {
            return false;
        };
        if window.window_type() == WindowType::Desktop {
            return false;
        }
        let resizable = window.is_resizable();
        let maximized = window.is_maximized();
        let tiled = window.tiled();
        let minimizable = window.is_minimizable();

        match key {
            Key::Down => {
                if resizable && maximized {
                    self.set_maximized(id, false, None);
                } else if minimizable {
                    self.set_minimized(id, true);
                }
                true
            }
            Key::Up if resizable => {
                self.set_maximized(id, !maximized, None);
                true
            }
            Key::Left | Key::Right if resizable => {
                let side = if key == Key::Left {
                    TileType::Left
                } else {
                    TileType::Right
                };
                if tiled == TileType::None {
                    self.set_tiled(id, side);
                } else if tiled != side {
                    self.untile(id, None);
                }
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::MouseButtons;
    use pretty_assertions::assert_eq;
    use std::time::{Duration, Instant};

    fn wm() -> WindowManager {
        WindowManager::new(&Config::default(), Rect::new(0, 0, 1024, 768))
    }

    fn create(wm: &mut WindowManager, id: u64, rect: Rect) -> WindowId {
        create_with(wm, id, WindowParams {
            rect,
            ..WindowParams::default()
        })
    }

    fn create_with(wm: &mut WindowManager, id: u64, params: WindowParams) -> WindowId {
        let id = WindowId(id);
        wm.create_window(id, Some(ClientId(id.0 as u32)), params);
        id
    }

    fn mouse(kind: MouseEventKind, x: i32, y: i32, button: Option<MouseButton>) -> MouseEvent {
        let buttons = match (kind, button) {
            (MouseEventKind::Down, Some(b)) => b.flag(),
            _ => MouseButtons::empty(),
        };
        MouseEvent {
            kind,
            position: Point::new(x, y),
            button,
            buttons,
            modifiers: Modifiers::empty(),
            wheel_delta: 0,
        }
    }

    fn click(wm: &mut WindowManager, x: i32, y: i32) {
        wm.process_mouse_event(&mouse(MouseEventKind::Down, x, y, Some(MouseButton::Left)));
        wm.process_mouse_event(&mouse(MouseEventKind::Up, x, y, Some(MouseButton::Left)));
    }

    fn posted(actions: &[CoreAction], id: WindowId) -> Vec<ClientEvent> {
        actions
            .iter()
            .filter_map(|a| match a {
                CoreAction::Post { window, event, .. } if *window == id => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_new_normal_window_becomes_active() {
        let mut wm = wm();
        let a = create(&mut wm, 1, Rect::new(100, 100, 200, 200));
        let b = create(&mut wm, 2, Rect::new(150, 150, 200, 200));
        assert_eq!(wm.active_window(), Some(b));
        assert_eq!(wm.stack().order(), &[a, b]);

        let actions = wm.take_actions();
        assert!(posted(&actions, a).contains(&ClientEvent::Deactivated));
        assert!(actions.contains(&CoreAction::SetClientBoost {
            client: ClientId(2),
            boosted: true
        }));
    }

    #[test]
    fn test_click_raises_and_activates() {
        let mut wm = wm();
        let a = create(&mut wm, 1, Rect::new(100, 100, 200, 200));
        let b = create(&mut wm, 2, Rect::new(400, 100, 200, 200));
        wm.take_actions();
        click(&mut wm, 150, 150);
        assert_eq!(wm.active_window(), Some(a));
        assert_eq!(wm.stack().order(), &[b, a]);

        let events = posted(&wm.take_actions(), a);
        assert!(events.contains(&ClientEvent::Activated));
        assert!(events
            .iter()
            .any(|e| matches!(e, ClientEvent::MouseDown(m) if m.position == Point::new(50, 50))));
    }

    #[test]
    fn test_click_outside_clears_active_window() {
        let mut wm = wm();
        create(&mut wm, 1, Rect::new(100, 100, 200, 200));
        click(&mut wm, 900, 700);
        assert_eq!(wm.active_window(), None);
        assert_eq!(wm.active_input_window(), None);
    }

    #[test]
    fn test_modal_child_takes_activation() {
        let mut wm = wm();
        let parent = create(&mut wm, 1, Rect::new(100, 100, 300, 300));
        let modal = create_with(&mut wm, 2, WindowParams {
            rect: Rect::new(150, 150, 100, 100),
            parent: Some(parent),
            flags: WindowFlags::VISIBLE | WindowFlags::MODAL,
            ..WindowParams::default()
        });
        let other = create(&mut wm, 3, Rect::new(600, 100, 100, 100));
        assert_eq!(wm.active_window(), Some(other));

        // The visible part of the parent is blocked: the modal comes forward.
        click(&mut wm, 350, 350);
        assert_eq!(wm.active_window(), Some(modal));
        assert_eq!(wm.active_input_window(), Some(modal));
        assert_eq!(wm.stack().order(), &[other, parent, modal]);
    }

    #[test]
    fn test_accessory_keeps_parent_active() {
        let mut wm = wm();
        let parent = create(&mut wm, 1, Rect::new(100, 100, 300, 300));
        let accessory = create_with(&mut wm, 2, WindowParams {
            rect: Rect::new(500, 100, 100, 100),
            parent: Some(parent),
            flags: WindowFlags::VISIBLE | WindowFlags::ACCESSORY,
            ..WindowParams::default()
        });
        assert_eq!(wm.active_window(), Some(parent));
        assert_eq!(wm.active_input_window(), Some(accessory));
    }

    #[test]
    fn test_destroy_picks_next_active_and_destroys_children() {
        let mut wm = wm();
        let a = create(&mut wm, 1, Rect::new(100, 100, 200, 200));
        let b = create(&mut wm, 2, Rect::new(150, 150, 200, 200));
        let child = create_with(&mut wm, 3, WindowParams {
            rect: Rect::new(200, 200, 50, 50),
            parent: Some(b),
            ..WindowParams::default()
        });
        wm.destroy_window(b);
        assert!(!wm.stack().contains(b));
        assert!(!wm.stack().contains(child));
        assert_eq!(wm.active_window(), Some(a));
    }

    #[test]
    fn test_set_rect_damages_symmetric_difference() {
        let mut wm = wm();
        let id = create_with(&mut wm, 1, WindowParams {
            rect: Rect::new(100, 100, 100, 100),
            flags: WindowFlags::VISIBLE | WindowFlags::FRAMELESS,
            ..WindowParams::default()
        });
        wm.damage_mut().take_screen_rects();
        assert!(!wm.set_window_rect(id, Rect::new(100, 100, 100, 100)));
        assert!(wm.damage().screen_rects().is_empty());

        assert!(wm.set_window_rect(id, Rect::new(150, 100, 100, 100)));
        let damaged = wm.damage_mut().take_screen_rects();
        assert_eq!(damaged.area(), 2 * 50 * 100);
        assert!(damaged.contains(Rect::new(100, 100, 50, 100)));
        assert!(damaged.contains(Rect::new(200, 100, 50, 100)));
        assert!(!damaged.intersects_rect(Rect::new(150, 100, 50, 100)));
    }

    #[test]
    fn test_maximize_round_trip() {
        let mut wm = wm();
        let original = Rect::new(120, 130, 300, 200);
        let id = create(&mut wm, 1, original);
        assert!(wm.set_maximized(id, true, None));
        let maximized = wm.window(id).unwrap().rect();
        assert_eq!(maximized, Rect::new(0, 19, 1024, 768 - 19));
        assert!(wm.set_maximized(id, false, None));
        assert_eq!(wm.window(id).unwrap().rect(), original);
    }

    #[test]
    fn test_maximize_refused_with_aspect_ratio() {
        let mut wm = wm();
        let id = create(&mut wm, 1, Rect::new(0, 100, 300, 200));
        wm.set_window_resize_constraints(id, Size::default(), Size::default(), Some(Size::new(3, 2)));
        assert!(!wm.set_maximized(id, true, None));
        assert!(!wm.set_tiled(id, TileType::Left));
    }

    #[test]
    fn test_maximized_rect_accounts_for_menubar_and_taskbar() {
        let mut wm = wm();
        create_with(&mut wm, 10, WindowParams {
            window_type: WindowType::Menubar,
            rect: Rect::new(0, 0, 1024, 20),
            ..WindowParams::default()
        });
        create_with(&mut wm, 11, WindowParams {
            window_type: WindowType::Taskbar,
            rect: Rect::new(0, 740, 1024, 28),
            ..WindowParams::default()
        });
        let id = create(&mut wm, 1, Rect::new(100, 100, 300, 200));
        assert_eq!(wm.maximized_window_rect(id), Rect::new(0, 39, 1024, 768 - 39 - 28));
    }

    #[test]
    fn test_logo_arrows_tile_and_untile() {
        let mut wm = wm();
        let original = Rect::new(300, 300, 200, 100);
        let id = create(&mut wm, 1, original);
        wm.process_key_event(Key::Logo, true);
        wm.process_key_event(Key::Left, true);
        assert_eq!(wm.window(id).unwrap().tiled(), TileType::Left);
        assert_eq!(wm.window(id).unwrap().rect(), Rect::new(0, 19, 512 - 4, 768 - 19));

        wm.process_key_event(Key::Right, true);
        assert_eq!(wm.window(id).unwrap().tiled(), TileType::None);
        assert_eq!(wm.window(id).unwrap().rect(), original);

        wm.process_key_event(Key::Down, true);
        assert!(wm.window(id).unwrap().is_minimized());
        assert_eq!(wm.active_window(), None);
    }

    #[test]
    fn test_keys_go_to_active_input_window() {
        let mut wm = wm();
        let id = create(&mut wm, 1, Rect::new(300, 300, 200, 100));
        wm.take_actions();
        wm.process_key_event(Key::Character('x'), true);
        let events = posted(&wm.take_actions(), id);
        assert_eq!(
            events,
            vec![ClientEvent::KeyDown(KeyEvent {
                key: Key::Character('x'),
                modifiers: Modifiers::empty()
            })]
        );
    }

    #[test]
    fn test_fullscreen_is_exclusive() {
        let mut wm = wm();
        let a = create(&mut wm, 1, Rect::new(100, 100, 200, 200));
        let b = create(&mut wm, 2, Rect::new(300, 100, 200, 200));
        assert!(wm.set_fullscreen(a, true));
        assert_eq!(wm.window(a).unwrap().rect(), wm.screen_rect());
        assert!(wm.set_fullscreen(b, true));
        assert!(!wm.window(a).unwrap().is_fullscreen());
        assert_eq!(wm.window(a).unwrap().rect(), Rect::new(100, 100, 200, 200));
    }

    #[test]
    fn test_shortcuts_leave_fullscreen_window_alone() {
        let mut wm = wm();
        let id = create(&mut wm, 1, Rect::new(100, 100, 200, 200));
        assert!(wm.set_maximized(id, true, None));
        assert!(wm.set_fullscreen(id, true));

        wm.process_key_event(Key::Logo, true);
        wm.process_key_event(Key::Down, true);
        let window = wm.window(id).unwrap();
        assert!(window.is_fullscreen());
        assert!(window.is_maximized());
        assert_eq!(window.rect(), wm.screen_rect());
        assert!(!wm.set_tiled(id, TileType::Left));
        assert_eq!(wm.window(id).unwrap().rect(), wm.screen_rect());
    }

    #[test]
    fn test_desktop_accessory_of_minimized_parent_stays_inactive() {
        let mut wm = wm();
        let parent = create(&mut wm, 1, Rect::new(100, 100, 200, 200));
        assert!(wm.set_minimized(parent, true));
        assert_eq!(wm.active_window(), None);

        let desktop = create_with(&mut wm, 2, WindowParams {
            window_type: WindowType::Desktop,
            rect: Rect::new(0, 0, 1024, 768),
            parent: Some(parent),
            flags: WindowFlags::VISIBLE | WindowFlags::ACCESSORY,
            ..WindowParams::default()
        });
        assert!(wm.stack().contains(desktop));
        assert_eq!(wm.active_window(), None);

        click(&mut wm, 500, 500);
        assert_eq!(wm.active_window(), None);

        wm.set_active_window(Some(desktop));
        assert_eq!(wm.active_window(), None);
    }

    #[test]
    fn test_title_bar_drag_moves_window() {
        let mut wm = wm();
        let id = create(&mut wm, 1, Rect::new(100, 100, 300, 200));
        // Title bar spans y 79..98 of the frame starting at y 75.
        wm.process_mouse_event(&mouse(MouseEventKind::Down, 150, 85, Some(MouseButton::Left)));
        assert_eq!(wm.move_window(), Some(id));
        assert_eq!(wm.active_cursor(), StandardCursor::Move);
        wm.process_mouse_event(&mouse(MouseEventKind::Move, 200, 135, None));
        assert_eq!(wm.window(id).unwrap().rect(), Rect::new(150, 150, 300, 200));
        wm.process_mouse_event(&mouse(MouseEventKind::Up, 200, 135, Some(MouseButton::Left)));
        assert_eq!(wm.move_window(), None);
    }

    #[test]
    fn test_move_into_left_edge_tiles() {
        let mut wm = wm();
        let id = create(&mut wm, 1, Rect::new(100, 100, 300, 200));
        wm.process_mouse_event(&mouse(MouseEventKind::Down, 150, 85, Some(MouseButton::Left)));
        wm.process_mouse_event(&mouse(MouseEventKind::Move, 3, 300, None));
        assert_eq!(wm.window(id).unwrap().tiled(), TileType::Left);
    }

    #[test]
    fn test_resize_honors_increments_and_minimum() {
        let mut wm = wm();
        let id = create(&mut wm, 1, Rect::new(100, 100, 300, 200));
        wm.set_window_resize_constraints(id, Size::default(), Size::new(10, 10), None);
        wm.start_window_resize(id, Point::new(400, 300), MouseButton::Left);
        wm.process_mouse_event(&mouse(MouseEventKind::Move, 457, 323, None));
        assert_eq!(wm.window(id).unwrap().rect(), Rect::new(100, 100, 350, 220));

        wm.process_mouse_event(&mouse(MouseEventKind::Move, 0, 0, None));
        assert_eq!(wm.window(id).unwrap().rect(), Rect::new(100, 100, 50, 50));
        wm.process_mouse_event(&mouse(MouseEventKind::Up, 0, 0, Some(MouseButton::Left)));
        assert_eq!(wm.resize_window(), None);
    }

    #[test]
    fn test_resize_from_top_left_keeps_bottom_right() {
        let mut wm = wm();
        let id = create(&mut wm, 1, Rect::new(100, 100, 300, 200));
        wm.start_window_resize(id, Point::new(97, 76), MouseButton::Left);
        assert_eq!(wm.active_cursor(), StandardCursor::ResizeDiagonalTlbr);
        wm.process_mouse_event(&mouse(MouseEventKind::Move, 77, 66, None));
        assert_eq!(wm.window(id).unwrap().rect(), Rect::new(80, 90, 320, 210));
    }

    #[test]
    fn test_resize_with_aspect_ratio() {
        let mut wm = wm();
        let id = create(&mut wm, 1, Rect::new(100, 100, 200, 100));
        wm.set_window_resize_constraints(id, Size::default(), Size::default(), Some(Size::new(2, 1)));
        wm.start_window_resize(id, Point::new(300, 200), MouseButton::Left);
        wm.process_mouse_event(&mouse(MouseEventKind::Move, 340, 205, None));
        assert_eq!(wm.window(id).unwrap().rect(), Rect::new(100, 100, 240, 120));
    }

    #[test]
    fn test_logo_wheel_changes_opacity() {
        let mut wm = wm();
        let id = create(&mut wm, 1, Rect::new(100, 100, 300, 200));
        wm.process_key_event(Key::Logo, true);
        let mut wheel = mouse(MouseEventKind::Wheel, 150, 150, None);
        wheel.wheel_delta = 4;
        wm.process_mouse_event(&wheel);
        assert!((wm.window(id).unwrap().opacity() - 0.8).abs() < 1e-4);
        wheel.wheel_delta = 100;
        wm.process_mouse_event(&wheel);
        assert!((wm.window(id).unwrap().opacity() - MIN_OPACITY).abs() < 1e-4);
    }

    #[test]
    fn test_double_click_is_synthesized() {
        let mut wm = wm();
        let id = create(&mut wm, 1, Rect::new(100, 100, 300, 200));
        let t0 = Instant::now();
        wm.damage_mut().set_now(t0);
        click(&mut wm, 150, 150);
        wm.damage_mut().set_now(t0 + Duration::from_millis(100));
        wm.take_actions();
        click(&mut wm, 150, 150);
        let events = posted(&wm.take_actions(), id);
        assert!(matches!(events.last(), Some(ClientEvent::MouseDoubleClick(_))));
    }

    #[test]
    fn test_drag_and_drop() {
        let mut wm = wm();
        let source = create(&mut wm, 1, Rect::new(100, 100, 200, 200));
        let target = create(&mut wm, 2, Rect::new(500, 100, 200, 200));
        wm.take_actions();
        wm.start_drag(ClientId(1), "hello".into(), "text/plain".into(), None);
        assert_eq!(wm.active_cursor(), StandardCursor::Drag);

        wm.process_mouse_event(&mouse(MouseEventKind::Move, 550, 150, None));
        let events = posted(&wm.take_actions(), target);
        assert!(matches!(
            &events[..],
            [ClientEvent::MouseMove { drag_data_type: Some(t), .. }] if t == "text/plain"
        ));

        wm.process_mouse_event(&mouse(MouseEventKind::Up, 550, 150, Some(MouseButton::Left)));
        let actions = wm.take_actions();
        assert!(actions.contains(&CoreAction::DragAccepted { client: ClientId(1) }));
        assert!(actions.contains(&CoreAction::DragDropped {
            client: ClientId(2),
            window: target,
            position: Point::new(50, 50),
            text: "hello".into(),
            data_type: "text/plain".into(),
        }));
        assert!(wm.drag().is_none());
        assert!(wm.stack().contains(source));
    }

    #[test]
    fn test_drop_on_decorations_is_cancelled() {
        let mut wm = wm();
        create(&mut wm, 1, Rect::new(100, 100, 200, 200));
        let target = create(&mut wm, 2, Rect::new(500, 100, 200, 200));
        wm.take_actions();
        wm.start_drag(ClientId(1), "hello".into(), "text/plain".into(), None);

        // Title bar of the target, above its client area.
        let title_y = wm.frame_rect(target).unwrap().y + 8;
        assert!(title_y < 100);
        wm.process_mouse_event(&mouse(MouseEventKind::Up, 550, title_y, Some(MouseButton::Left)));
        let actions = wm.take_actions();
        assert!(actions.contains(&CoreAction::DragCancelled { client: ClientId(1) }));
        assert!(!actions
            .iter()
            .any(|a| matches!(a, CoreAction::DragDropped { .. })));
        assert!(wm.drag().is_none());
    }

    #[test]
    fn test_escape_cancels_drag() {
        let mut wm = wm();
        create(&mut wm, 1, Rect::new(100, 100, 200, 200));
        wm.start_drag(ClientId(1), "x".into(), "text/plain".into(), None);
        wm.take_actions();
        wm.process_key_event(Key::Escape, true);
        assert_eq!(wm.take_actions(), vec![CoreAction::DragCancelled { client: ClientId(1) }]);
    }

    #[test]
    fn test_close_button_click_requests_close() {
        let mut wm = wm();
        let id = create(&mut wm, 1, Rect::new(100, 100, 300, 200));
        wm.take_actions();
        // Close button sits at frame-relative (289, 6), frame origin (96, 75).
        let (x, y) = (96 + 292, 75 + 10);
        wm.process_mouse_event(&mouse(MouseEventKind::Down, x, y, Some(MouseButton::Left)));
        assert!(wm.window(id).unwrap().frame_state().button(FrameButtonKind::Close).unwrap().pressed);
        wm.process_mouse_event(&mouse(MouseEventKind::Up, x, y, Some(MouseButton::Left)));
        assert!(posted(&wm.take_actions(), id).contains(&ClientEvent::CloseRequest));
    }

    #[test]
    fn test_press_outside_menu_dismisses_it() {
        let mut wm = wm();
        let normal = create(&mut wm, 1, Rect::new(100, 100, 300, 200));
        let menu = create_with(&mut wm, 2, WindowParams {
            window_type: WindowType::Menu,
            rect: Rect::new(600, 100, 100, 150),
            ..WindowParams::default()
        });
        wm.take_actions();
        click(&mut wm, 700 - 50, 120);
        assert!(posted(&wm.take_actions(), menu)
            .iter()
            .any(|e| matches!(e, ClientEvent::MouseDown(_))));

        wm.process_mouse_event(&mouse(MouseEventKind::Down, 150, 150, Some(MouseButton::Left)));
        let actions = wm.take_actions();
        assert!(posted(&actions, menu).contains(&ClientEvent::MenuDismissed));
        assert!(posted(&actions, normal).is_empty());
        assert!(!wm.window(menu).unwrap().is_visible());
    }

    #[test]
    fn test_wm_listener_hears_about_windows() {
        let mut wm = wm();
        let taskbar = create_with(&mut wm, 10, WindowParams {
            window_type: WindowType::Taskbar,
            rect: Rect::new(0, 740, 1024, 28),
            ..WindowParams::default()
        });
        let app = create(&mut wm, 1, Rect::new(100, 100, 300, 200));
        wm.take_actions();
        wm.set_wm_event_mask(taskbar, WmEventMask::all());
        let actions = wm.take_actions();
        assert!(actions.iter().any(|a| matches!(
            a,
            CoreAction::WmEvent { listener, event: WmEvent::WindowStateChanged { window, active: true, .. }, .. }
                if *listener == taskbar && *window == app
        )));

        wm.destroy_window(app);
        assert!(wm.take_actions().iter().any(|a| matches!(
            a,
            CoreAction::WmEvent { event: WmEvent::WindowRemoved { window, .. }, .. } if *window == app
        )));
    }

    #[test]
    fn test_pending_paint_flushed_for_new_window() {
        let mut wm = wm();
        let id = create(&mut wm, 1, Rect::new(100, 100, 30, 20));
        wm.take_actions();
        wm.flush_pending_paints();
        assert_eq!(
            posted(&wm.take_actions(), id),
            vec![ClientEvent::Paint {
                size: Size::new(30, 20),
                rects: vec![Rect::new(0, 0, 30, 20)]
            }]
        );
    }

    #[test]
    fn test_border_hover_sets_resize_cursor() {
        let mut wm = wm();
        create(&mut wm, 1, Rect::new(100, 100, 300, 200));
        wm.process_mouse_event(&mouse(MouseEventKind::Move, 98, 200, None));
        assert_eq!(wm.active_cursor(), StandardCursor::ResizeHorizontal);
        wm.process_mouse_event(&mouse(MouseEventKind::Move, 200, 200, None));
        assert_eq!(wm.active_cursor(), StandardCursor::Arrow);
    }

    #[test]
    fn test_client_disconnect_removes_windows() {
        let mut wm = wm();
        let a = create(&mut wm, 1, Rect::new(100, 100, 300, 200));
        wm.create_window(WindowId(2), Some(ClientId(1)), WindowParams::default());
        wm.destroy_client_windows(ClientId(1));
        assert!(!wm.stack().contains(a));
        assert!(wm.stack().is_empty());
        assert_eq!(wm.active_window(), None);
    }
}
