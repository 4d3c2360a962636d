//! Window state.
//!
//! A [`Window`] is a rect with a type, flags, an optional client backing
//! store and a set of dirty rects. It knows nothing about compositing: the
//! window manager drives geometry changes and the compositor is the single
//! writer of the occlusion regions stored here.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::bitmap::{Bitmap, Color};
use crate::event::WmEventMask;
use crate::frame::FrameState;
use crate::geometry::{Point, Rect, Size};
use crate::region::DisjointRects;

/// Stable identifier for a window in the window arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowId(pub u64);

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "win:{}", self.0)
    }
}

/// Identifier of the client connection owning a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub u32);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client:{}", self.0)
    }
}

/// Window type. Determines the z-order band and the decoration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowType {
    Desktop,
    #[default]
    Normal,
    Taskbar,
    Tooltip,
    Notification,
    Menubar,
    Menu,
    MenuApplet,
    WindowSwitcher,
}

impl WindowType {
    /// Stacking band, lowest painted first.
    pub const fn band(self) -> u8 {
        match self {
            Self::Desktop => 0,
            Self::Normal => 1,
            Self::Taskbar => 2,
            Self::Tooltip => 3,
            Self::Notification => 4,
            Self::Menubar | Self::MenuApplet => 5,
            Self::Menu => 6,
            Self::WindowSwitcher => 7,
        }
    }

    pub const fn can_become_active(self) -> bool {
        matches!(self, Self::Normal | Self::Desktop)
    }

    pub const fn is_frameable(self) -> bool {
        matches!(self, Self::Normal | Self::Notification)
    }
}

/// Edge tiling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileType {
    #[default]
    None,
    Left,
    Right,
}

/// Which edge or corner an interactive resize drags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeDirection {
    #[default]
    None,
    Left,
    UpLeft,
    Up,
    UpRight,
    Right,
    DownRight,
    Down,
    DownLeft,
}

bitflags! {
    /// Window creation flags and toggles.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WindowFlags: u32 {
        const MODAL                  = 0b0000_0000_0001;
        const MINIMIZABLE            = 0b0000_0000_0010;
        const RESIZABLE              = 0b0000_0000_0100;
        const FRAMELESS              = 0b0000_0000_1000;
        const FULLSCREEN             = 0b0000_0001_0000;
        const ACCESSORY              = 0b0000_0010_0000;
        const HAS_ALPHA_CHANNEL      = 0b0000_0100_0000;
        const GLOBAL_CURSOR_TRACKING = 0b0000_1000_0000;
        const VISIBLE                = 0b0001_0000_0000;
    }
}

/// Constructor contract for a new window.
#[derive(Debug, Clone)]
pub struct WindowParams {
    pub window_type: WindowType,
    pub rect: Rect,
    pub title: String,
    pub flags: WindowFlags,
    pub parent: Option<WindowId>,
    pub opacity: f32,
    pub base_size: Size,
    pub size_increment: Size,
    pub aspect_ratio: Option<Size>,
}

impl Default for WindowParams {
    fn default() -> Self {
        Self {
            window_type: WindowType::Normal,
            rect: Rect::new(0, 0, 320, 240),
            title: String::new(),
            flags: WindowFlags::VISIBLE | WindowFlags::RESIZABLE | WindowFlags::MINIMIZABLE,
            parent: None,
            opacity: 1.0,
            base_size: Size::default(),
            size_increment: Size::default(),
            aspect_ratio: None,
        }
    }
}

/// A client supplied pixel buffer.
#[derive(Debug, Clone)]
pub struct BackingStore {
    pub serial: i32,
    pub bitmap: Bitmap,
}

impl BackingStore {
    pub fn size(&self) -> Size {
        self.bitmap.size()
    }
}

/// Per-window regions, recomputed by the compositor on every occlusion pass.
///
/// All three sets are in screen coordinates. Only the compositor writes them.
#[derive(Debug, Clone, Default)]
pub struct OcclusionRegions {
    pub opaque: DisjointRects,
    pub transparent: DisjointRects,
    pub transparent_wallpaper: DisjointRects,
}

impl OcclusionRegions {
    pub fn clear(&mut self) {
        self.opaque.clear();
        self.transparent.clear();
        self.transparent_wallpaper.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.transparent.is_empty()
    }
}

#[derive(Debug)]
pub struct Window {
    id: WindowId,
    client: Option<ClientId>,
    window_type: WindowType,
    title: String,
    rect: Rect,
    flags: WindowFlags,
    opacity: f32,

    minimized: bool,
    maximized: bool,
    occluded: bool,
    destroyed: bool,
    tiled: TileType,

    pub(crate) unmaximized_rect: Rect,
    pub(crate) untiled_rect: Rect,
    pub(crate) saved_nonfullscreen_rect: Rect,

    base_size: Size,
    size_increment: Size,
    aspect_ratio: Option<Size>,

    parent: Option<WindowId>,
    children: Vec<WindowId>,
    accessories: Vec<WindowId>,

    backing_store: Option<BackingStore>,
    last_backing_store: Option<BackingStore>,
    icon: Option<Bitmap>,

    // Frame relative.
    dirty_rects: DisjointRects,
    invalidated: bool,
    invalidated_all: bool,
    invalidated_frame: bool,

    // Window relative.
    pending_paint_rects: DisjointRects,

    regions: OcclusionRegions,
    pub(crate) frame: FrameState,
    wm_event_mask: WmEventMask,
}

impl Window {
    /// Create a window. Internal windows (`client == None`) own their pixels
    /// and get a backing store right away.
    pub fn new(id: WindowId, client: Option<ClientId>, params: WindowParams) -> Self {
        assert!(!params.rect.is_empty(), "window {id} created with empty rect");
        let mut window = Self {
            id,
            client,
            window_type: params.window_type,
            title: params.title,
            rect: params.rect,
            flags: params.flags,
            opacity: params.opacity.clamp(0.0, 1.0),
            minimized: false,
            maximized: false,
            occluded: false,
            destroyed: false,
            tiled: TileType::None,
            unmaximized_rect: params.rect,
            untiled_rect: params.rect,
            saved_nonfullscreen_rect: Rect::default(),
            base_size: params.base_size,
            size_increment: params.size_increment,
            aspect_ratio: params.aspect_ratio,
            parent: params.parent,
            children: Vec::new(),
            accessories: Vec::new(),
            backing_store: None,
            last_backing_store: None,
            icon: None,
            dirty_rects: DisjointRects::new(),
            invalidated: true,
            invalidated_all: true,
            invalidated_frame: true,
            pending_paint_rects: DisjointRects::new(),
            regions: OcclusionRegions::default(),
            frame: FrameState::default(),
            wm_event_mask: WmEventMask::empty(),
        };
        if window.is_fullscreen() {
            window.saved_nonfullscreen_rect = params.rect;
        }
        if window.is_internal() {
            window.allocate_internal_bitmap();
        }
        window
    }

    fn allocate_internal_bitmap(&mut self) {
        let bitmap = Bitmap::filled(self.rect.size(), Color::WHITE)
            .with_alpha_channel(self.has_alpha_channel());
        self.backing_store = Some(BackingStore { serial: 0, bitmap });
    }

    pub const fn id(&self) -> WindowId {
        self.id
    }

    pub const fn client(&self) -> Option<ClientId> {
        self.client
    }

    pub const fn is_internal(&self) -> bool {
        self.client.is_none()
    }

    pub const fn window_type(&self) -> WindowType {
        self.window_type
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns whether the title changed.
    pub fn set_title(&mut self, title: String) -> bool {
        if self.title == title {
            return false;
        }
        self.title = title;
        self.invalidated_frame = true;
        true
    }

    pub const fn rect(&self) -> Rect {
        self.rect
    }

    pub const fn position(&self) -> Point {
        self.rect.location()
    }

    pub const fn size(&self) -> Size {
        self.rect.size()
    }

    /// Replace the rect. Returns `false` (and does nothing) when unchanged.
    ///
    /// A changed rect fully invalidates the window.
    pub fn set_rect(&mut self, rect: Rect) -> bool {
        if self.rect == rect {
            return false;
        }
        assert!(!rect.is_empty(), "window {} resized to empty rect", self.id);
        assert!(!self.destroyed, "resizing destroyed window {}", self.id);
        let old_size = self.rect.size();
        self.rect = rect;
        if self.is_internal() && old_size != rect.size() {
            self.allocate_internal_bitmap();
        }
        self.invalidate(true);
        true
    }

    pub const fn flags(&self) -> WindowFlags {
        self.flags
    }

    pub const fn is_visible(&self) -> bool {
        self.flags.contains(WindowFlags::VISIBLE)
    }

    pub fn set_visible(&mut self, visible: bool) -> bool {
        if self.is_visible() == visible {
            return false;
        }
        self.flags.set(WindowFlags::VISIBLE, visible);
        if visible {
            self.invalidate(true);
        }
        true
    }

    /// Visible, not minimized and not destroyed.
    pub const fn is_visible_on_screen(&self) -> bool {
        self.is_visible() && !self.minimized && !self.destroyed
    }

    pub const fn is_modal(&self) -> bool {
        self.flags.contains(WindowFlags::MODAL)
    }

    pub const fn is_minimizable(&self) -> bool {
        self.flags.contains(WindowFlags::MINIMIZABLE)
    }

    /// Fullscreen windows cannot be resized interactively.
    pub const fn is_resizable(&self) -> bool {
        self.flags.contains(WindowFlags::RESIZABLE) && !self.is_fullscreen()
    }

    pub fn set_resizable(&mut self, resizable: bool) {
        self.flags.set(WindowFlags::RESIZABLE, resizable);
    }

    pub const fn is_frameless(&self) -> bool {
        self.flags.contains(WindowFlags::FRAMELESS)
    }

    pub fn set_frameless(&mut self, frameless: bool) -> bool {
        if self.is_frameless() == frameless {
            return false;
        }
        self.flags.set(WindowFlags::FRAMELESS, frameless);
        self.invalidate(true);
        true
    }

    pub const fn is_fullscreen(&self) -> bool {
        self.flags.contains(WindowFlags::FULLSCREEN)
    }

    pub(crate) fn set_fullscreen_flag(&mut self, fullscreen: bool) {
        self.flags.set(WindowFlags::FULLSCREEN, fullscreen);
    }

    pub const fn has_alpha_channel(&self) -> bool {
        self.flags.contains(WindowFlags::HAS_ALPHA_CHANNEL)
    }

    pub fn set_has_alpha_channel(&mut self, value: bool) -> bool {
        if self.has_alpha_channel() == value {
            return false;
        }
        self.flags.set(WindowFlags::HAS_ALPHA_CHANNEL, value);
        self.invalidate(false);
        true
    }

    pub const fn global_cursor_tracking(&self) -> bool {
        self.flags.contains(WindowFlags::GLOBAL_CURSOR_TRACKING)
    }

    pub fn set_global_cursor_tracking(&mut self, enabled: bool) {
        self.flags.set(WindowFlags::GLOBAL_CURSOR_TRACKING, enabled);
    }

    pub const fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Returns whether the value changed.
    pub fn set_opacity(&mut self, opacity: f32) -> bool {
        let opacity = opacity.clamp(0.0, 1.0);
        if (self.opacity - opacity).abs() < f32::EPSILON {
            return false;
        }
        self.opacity = opacity;
        self.invalidate(false);
        true
    }

    /// Opaque windows fully hide whatever lies beneath them.
    pub fn is_opaque(&self) -> bool {
        self.opacity >= 1.0 && !self.has_alpha_channel()
    }

    pub fn is_movable(&self) -> bool {
        self.window_type == WindowType::Normal && !self.is_fullscreen()
    }

    pub const fn is_minimized(&self) -> bool {
        self.minimized
    }

    pub(crate) fn set_minimized_state(&mut self, minimized: bool) {
        self.minimized = minimized;
    }

    pub const fn is_maximized(&self) -> bool {
        self.maximized
    }

    pub(crate) fn set_maximized_state(&mut self, maximized: bool) {
        self.maximized = maximized;
    }

    pub const fn tiled(&self) -> TileType {
        self.tiled
    }

    pub(crate) fn set_tiled_state(&mut self, tiled: TileType) {
        self.tiled = tiled;
    }

    pub const fn is_occluded(&self) -> bool {
        self.occluded
    }

    /// Returns whether the occlusion state changed.
    pub fn set_occluded(&mut self, occluded: bool) -> bool {
        if self.occluded == occluded {
            return false;
        }
        self.occluded = occluded;
        true
    }

    pub const fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn destroy(&mut self) {
        self.destroyed = true;
        self.flags.remove(WindowFlags::VISIBLE);
    }

    pub const fn base_size(&self) -> Size {
        self.base_size
    }

    pub const fn size_increment(&self) -> Size {
        self.size_increment
    }

    pub const fn aspect_ratio(&self) -> Option<Size> {
        self.aspect_ratio
    }

    pub fn set_resize_constraints(
        &mut self,
        base_size: Size,
        size_increment: Size,
        aspect_ratio: Option<Size>,
    ) {
        self.base_size = base_size;
        self.size_increment = size_increment;
        self.aspect_ratio = aspect_ratio.filter(|r| !r.is_empty());
    }

    // ── Relations ────────────────────────────────────────────────────

    /// Raw parent id. It may name a window that no longer exists; use
    /// [`WindowStack::parent_of`](crate::stack::WindowStack::parent_of).
    pub const fn parent_id(&self) -> Option<WindowId> {
        self.parent
    }

    pub fn children(&self) -> &[WindowId] {
        &self.children
    }

    pub fn accessories(&self) -> &[WindowId] {
        &self.accessories
    }

    pub(crate) fn add_child(&mut self, child: WindowId) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }

    pub(crate) fn add_accessory(&mut self, accessory: WindowId) {
        if !self.accessories.contains(&accessory) {
            self.accessories.push(accessory);
        }
    }

    pub(crate) fn forget_relative(&mut self, id: WindowId) {
        self.children.retain(|c| *c != id);
        self.accessories.retain(|a| *a != id);
        if self.parent == Some(id) {
            self.parent = None;
        }
    }

    // ── Pixels ───────────────────────────────────────────────────────

    pub const fn backing_store(&self) -> Option<&BackingStore> {
        self.backing_store.as_ref()
    }

    pub const fn last_backing_store(&self) -> Option<&BackingStore> {
        self.last_backing_store.as_ref()
    }

    /// Attach a new backing store, keeping the previous one as "last".
    pub fn set_backing_store(&mut self, store: BackingStore) {
        self.last_backing_store = self.backing_store.replace(store);
    }

    /// The store to paint for the current size: the current one if it
    /// matches, else the last one if that matches, else whatever is current.
    pub fn backing_store_for_size(&self) -> Option<&BackingStore> {
        let size = self.size();
        match (&self.backing_store, &self.last_backing_store) {
            (Some(current), _) if current.size() == size => Some(current),
            (_, Some(last)) if last.size() == size => Some(last),
            (current, _) => current.as_ref(),
        }
    }

    /// Mutable pixels of an internal window.
    pub fn internal_bitmap_mut(&mut self) -> Option<&mut Bitmap> {
        if !self.is_internal() {
            return None;
        }
        self.backing_store.as_mut().map(|store| &mut store.bitmap)
    }

    pub const fn icon(&self) -> Option<&Bitmap> {
        self.icon.as_ref()
    }

    pub fn set_icon(&mut self, icon: Option<Bitmap>) {
        self.icon = icon;
        self.invalidated_frame = true;
    }

    // ── Invalidation ─────────────────────────────────────────────────

    /// Mark the whole window dirty.
    pub fn invalidate(&mut self, with_frame: bool) {
        self.invalidated = true;
        self.invalidated_all = true;
        self.invalidated_frame |= with_frame;
        self.dirty_rects.clear();
    }

    /// Mark a window-relative `rect` dirty. `frame_rect` is the window's
    /// current frame in screen coordinates. Returns whether anything new
    /// became dirty.
    pub fn invalidate_rect(&mut self, rect: Rect, with_frame: bool, frame_rect: Rect) -> bool {
        if rect.is_empty() {
            return false;
        }
        if self.invalidated_all {
            self.invalidated_frame |= with_frame;
            return false;
        }
        let inner = rect
            .translated_by(self.position())
            .intersected(frame_rect);
        if inner.is_empty() {
            return false;
        }
        self.invalidated = true;
        self.invalidated_frame |= with_frame;
        self.dirty_rects
            .add(inner.translated(-frame_rect.x, -frame_rect.y));
        true
    }

    pub const fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    pub const fn is_fully_invalidated(&self) -> bool {
        self.invalidated_all
    }

    pub const fn is_frame_invalidated(&self) -> bool {
        self.invalidated_frame
    }

    /// Frame-relative dirty rects (empty when fully invalidated).
    pub const fn dirty_rects(&self) -> &DisjointRects {
        &self.dirty_rects
    }

    pub fn clear_dirty_rects(&mut self) {
        self.invalidated = false;
        self.invalidated_all = false;
        self.invalidated_frame = false;
        self.dirty_rects.clear();
    }

    /// Ask the client to repaint a window-relative area.
    pub fn request_update(&mut self, rect: Rect) {
        let rect = rect.intersected(Rect::from_location_and_size(Point::default(), self.size()));
        if !rect.is_empty() {
            self.pending_paint_rects.add(rect);
        }
    }

    pub fn has_pending_paint(&self) -> bool {
        !self.pending_paint_rects.is_empty()
    }

    pub fn take_pending_paint(&mut self) -> DisjointRects {
        std::mem::take(&mut self.pending_paint_rects)
    }

    // ── Compositor owned ─────────────────────────────────────────────

    pub const fn regions(&self) -> &OcclusionRegions {
        &self.regions
    }

    pub const fn opaque_rects(&self) -> &DisjointRects {
        &self.regions.opaque
    }

    pub const fn transparency_rects(&self) -> &DisjointRects {
        &self.regions.transparent
    }

    pub const fn transparency_wallpaper_rects(&self) -> &DisjointRects {
        &self.regions.transparent_wallpaper
    }

    /// Single writer: the compositor's occlusion pass.
    pub(crate) fn regions_mut(&mut self) -> &mut OcclusionRegions {
        &mut self.regions
    }

    pub const fn frame_state(&self) -> &FrameState {
        &self.frame
    }

    pub const fn wm_event_mask(&self) -> WmEventMask {
        self.wm_event_mask
    }

    pub fn set_wm_event_mask(&mut self, mask: WmEventMask) {
        self.wm_event_mask = mask;
    }
}
