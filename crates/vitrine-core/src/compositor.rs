//! The compositor.
//!
//! Turns the window stack into pixels. Each pass consumes the damage the
//! window manager accumulated, recomputes occlusion when the window topology
//! changed, repaints only the dirty screen area into a render target and
//! then flips or copies that area to the visible framebuffer.
//!
//! Occlusion gives every visible window three disjoint-rect regions (see
//! [`OcclusionRegions`](crate::window::OcclusionRegions)): where it can be
//! painted straight into the render target, where it has to be blended
//! in the scratch buffer, and which parts of that blended area show the
//! wallpaper directly. The compositor is the only writer of those regions.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::bitmap::{Bitmap, BitmapError, Color};
use crate::config::{BackgroundConfig, Config, ThemeConfig, WallpaperMode};
use crate::event::CoreAction;
use crate::frame::{self, FrameStyle, ThemeMetrics};
use crate::geometry::{Point, Rect, Size};
use crate::manager::{StandardCursor, WindowManager};
use crate::region::DisjointRects;
use crate::screen::Screen;
use crate::window::{ResizeDirection, Window, WindowId};

// ── Text ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlignment {
    CenterLeft,
    Center,
}

/// Font rasterization is supplied by the embedder.
pub trait TextPainter: fmt::Debug {
    fn text_width(&self, text: &str) -> i32;

    fn glyph_height(&self) -> i32;

    /// Draw `text` aligned inside `rect`, touching only pixels in `clip`.
    fn draw_text(
        &self,
        target: &mut Bitmap,
        rect: Rect,
        clip: Rect,
        text: &str,
        color: Color,
        alignment: TextAlignment,
    );
}

/// Measures with a fixed advance and draws nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTextPainter;

impl NullTextPainter {
    const ADVANCE: i32 = 7;
    const GLYPH_HEIGHT: i32 = 10;
}

impl TextPainter for NullTextPainter {
    fn text_width(&self, text: &str) -> i32 {
        i32::try_from(text.chars().count())
            .unwrap_or(i32::MAX / Self::ADVANCE)
            .saturating_mul(Self::ADVANCE)
    }

    fn glyph_height(&self) -> i32 {
        Self::GLYPH_HEIGHT
    }

    fn draw_text(&self, _: &mut Bitmap, _: Rect, _: Rect, _: &str, _: Color, _: TextAlignment) {}
}

// ── Wallpaper ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Wallpaper {
    color: Color,
    mode: WallpaperMode,
    image: Option<Bitmap>,
}

impl Wallpaper {
    pub fn from_config(background: &BackgroundConfig) -> Self {
        Self {
            color: background.color,
            mode: background.mode,
            image: None,
        }
    }

    pub const fn color(&self) -> Color {
        self.color
    }

    pub const fn mode(&self) -> WallpaperMode {
        self.mode
    }

    pub const fn image(&self) -> Option<&Bitmap> {
        self.image.as_ref()
    }

    pub fn set_image(&mut self, image: Option<Bitmap>) {
        self.image = image;
    }

    pub fn apply_config(&mut self, background: &BackgroundConfig) {
        self.color = background.color;
        self.mode = background.mode;
    }

    /// Paint the part of the wallpaper inside `clip`. The background color is
    /// always laid down first, so the result is fully opaque.
    pub fn paint(&self, target: &mut Bitmap, screen_rect: Rect, clip: Rect) {
        target.fill_rect(clip, clip, self.color);
        let Some(image) = &self.image else {
            return;
        };
        match self.mode {
            WallpaperMode::Simple => target.blit(Point::default(), image, image.rect(), clip),
            WallpaperMode::Center => {
                let mut rect = image.rect();
                rect.center_within(screen_rect);
                target.blit(rect.location(), image, image.rect(), clip);
            }
            WallpaperMode::Tile => target.blit_tiled(screen_rect, image, clip),
            WallpaperMode::Stretch => target.blit_scaled(screen_rect, image, clip),
        }
    }
}

// ── Cursors ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Cursor {
    bitmap: Bitmap,
    hotspot: Point,
}

impl Cursor {
    pub fn new(bitmap: Bitmap, hotspot: Point) -> Self {
        Self { bitmap, hotspot }
    }

    /// The built-in arrow: `#` outline, `.` fill, blanks transparent.
    pub fn arrow() -> Self {
        const ARROW: [&str; 16] = [
            "#          ",
            "##         ",
            "#.#        ",
            "#..#       ",
            "#...#      ",
            "#....#     ",
            "#.....#    ",
            "#......#   ",
            "#.......#  ",
            "#........# ",
            "#.....#####",
            "#..#..#    ",
            "#.# #..#   ",
            "##  #..#   ",
            "#    #..#  ",
            "     ####  ",
        ];
        let mut bitmap = Bitmap::new(Size::new(11, 16)).with_alpha_channel(true);
        for (y, row) in (0..).zip(ARROW) {
            for (x, cell) in (0..).zip(row.chars()) {
                let color = match cell {
                    '#' => Color::BLACK,
                    '.' => Color::WHITE,
                    _ => continue,
                };
                bitmap.set_pixel(Point::new(x, y), color);
            }
        }
        Self::new(bitmap, Point::default())
    }

    pub const fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    pub const fn hotspot(&self) -> Point {
        self.hotspot
    }

    /// Screen rect covered when the pointer is at `location`.
    pub fn rect_at(&self, location: Point) -> Rect {
        Rect::from_location_and_size(location - self.hotspot, self.bitmap.size())
    }
}

/// Cursor images by shape. Shapes without an image use the arrow.
#[derive(Debug, Clone)]
pub struct CursorSet {
    arrow: Cursor,
    cursors: HashMap<StandardCursor, Cursor>,
}

impl Default for CursorSet {
    fn default() -> Self {
        Self {
            arrow: Cursor::arrow(),
            cursors: HashMap::new(),
        }
    }
}

impl CursorSet {
    pub fn set(&mut self, kind: StandardCursor, cursor: Cursor) {
        if kind == StandardCursor::Arrow {
            self.arrow = cursor;
        } else {
            self.cursors.insert(kind, cursor);
        }
    }

    pub fn get(&self, kind: StandardCursor) -> &Cursor {
        self.cursors.get(&kind).unwrap_or(&self.arrow)
    }
}

// ── Stats ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ComposeStats {
    pub frames_composed: u64,
    /// Passes that found nothing invalidated.
    pub frames_skipped: u64,
    pub occlusion_passes: u64,
    pub rects_flushed: u64,
    pub last_compose_time: Duration,
    pub peak_compose_time: Duration,
}

impl ComposeStats {
    fn record_frame(&mut self, elapsed: Duration, rects: usize) {
        self.frames_composed += 1;
        self.rects_flushed += rects as u64;
        self.last_compose_time = elapsed;
        self.peak_compose_time = self.peak_compose_time.max(elapsed);
    }
}

// ── Compositor ───────────────────────────────────────────────────────

/// Things painted on top of every window.
#[derive(Debug)]
struct Overlays {
    cursor: StandardCursor,
    cursor_rect: Rect,
    geometry_label: Option<(Rect, String)>,
    dnd: Option<Rect>,
}

pub struct Compositor {
    theme: ThemeConfig,
    metrics: ThemeMetrics,
    wallpaper: Wallpaper,
    cursors: CursorSet,
    text: Box<dyn TextPainter>,
    /// Render target when the screen cannot flip.
    back: Option<Bitmap>,
    /// Where transparent areas are blended before landing on the target.
    scratch: Bitmap,
    opaque_wallpaper: DisjointRects,
    last_cursor_rect: Rect,
    last_geometry_label_rect: Option<Rect>,
    last_dnd_rect: Option<Rect>,
    stats: ComposeStats,
}

impl fmt::Debug for Compositor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compositor")
            .field("wallpaper", &self.wallpaper)
            .field("opaque_wallpaper", &self.opaque_wallpaper)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Compositor {
    pub fn new(config: &Config, screen: &Screen) -> Result<Self, BitmapError> {
        Ok(Self {
            theme: config.theme.clone(),
            metrics: ThemeMetrics::from(&config.theme),
            wallpaper: Wallpaper::from_config(&config.background),
            cursors: CursorSet::default(),
            text: Box::new(NullTextPainter),
            back: Self::allocate_back(screen)?,
            scratch: Bitmap::try_new(screen.size())?,
            opaque_wallpaper: DisjointRects::from_rect(screen.rect()),
            last_cursor_rect: Rect::default(),
            last_geometry_label_rect: None,
            last_dnd_rect: None,
            stats: ComposeStats::default(),
        })
    }

    fn allocate_back(screen: &Screen) -> Result<Option<Bitmap>, BitmapError> {
        if screen.can_set_buffer() {
            Ok(None)
        } else {
            Bitmap::try_new(screen.size()).map(Some)
        }
    }

    /// Reallocate the off-screen buffers after a resolution change.
    pub fn set_resolution(&mut self, screen: &Screen) -> Result<(), BitmapError> {
        self.back = Self::allocate_back(screen)?;
        self.scratch = Bitmap::try_new(screen.size())?;
        self.last_cursor_rect = Rect::default();
        self.last_geometry_label_rect = None;
        self.last_dnd_rect = None;
        Ok(())
    }

    pub fn reload_config(&mut self, config: &Config) {
        self.theme = config.theme.clone();
        self.metrics = ThemeMetrics::from(&config.theme);
        self.wallpaper.apply_config(&config.background);
    }

    pub const fn wallpaper(&self) -> &Wallpaper {
        &self.wallpaper
    }

    pub fn set_wallpaper_image(&mut self, image: Option<Bitmap>) {
        self.wallpaper.set_image(image);
    }

    pub fn cursors_mut(&mut self) -> &mut CursorSet {
        &mut self.cursors
    }

    pub fn set_text_painter(&mut self, text: Box<dyn TextPainter>) {
        self.text = text;
    }

    /// Screen area not covered by any window.
    pub const fn opaque_wallpaper(&self) -> &DisjointRects {
        &self.opaque_wallpaper
    }

    pub const fn stats(&self) -> &ComposeStats {
        &self.stats
    }

    // ── Occlusion ────────────────────────────────────────────────────

    /// Recompute every window's regions and the exposed wallpaper.
    pub fn recompute_occlusions(&mut self, wm: &mut WindowManager) {
        let metrics = *wm.metrics();
        let screen_rect = wm.screen_rect();
        let fullscreen = wm.active_fullscreen_window();
        let (stack, _) = wm.compositor_parts();

        for id in stack.ids_back_to_front() {
            if let Some(window) = stack.get_mut(id) {
                window.regions_mut().clear();
            }
        }
        let visible: Vec<WindowId> = stack.visible_back_to_front().map(Window::id).collect();

        if let Some(id) = fullscreen {
            // The fullscreen window owns the whole screen.
            if let Some(window) = stack.get_mut(id) {
                let opaque = window.is_opaque();
                let regions = window.regions_mut();
                if opaque {
                    regions.opaque = DisjointRects::from_rect(screen_rect);
                } else {
                    regions.transparent = DisjointRects::from_rect(screen_rect);
                    regions.transparent_wallpaper = DisjointRects::from_rect(screen_rect);
                }
            }
            self.opaque_wallpaper.clear();
        } else {
            let mut covered = DisjointRects::new();
            let mut translucent_above = DisjointRects::new();
            for id in visible.iter().rev() {
                let Some(window) = stack.get_mut(*id) else {
                    continue;
                };
                let frame = frame::frame_rect(window, &metrics).intersected(screen_rect);
                let exposed = DisjointRects::from_rect(frame).shatter_set(&covered);
                let opaque = window.is_opaque();
                let regions = window.regions_mut();
                if opaque {
                    regions.transparent = exposed.intersected_set(&translucent_above);
                    regions.opaque = exposed.shatter_set(&translucent_above);
                    covered.add(frame);
                } else {
                    regions.transparent = exposed;
                    translucent_above.add(frame);
                }
            }
            self.opaque_wallpaper = DisjointRects::from_rect(screen_rect)
                .shatter_set(&covered)
                .shatter_set(&translucent_above);

            // Blended areas with no window underneath start from the wallpaper.
            let mut below = DisjointRects::new();
            for id in &visible {
                let Some(window) = stack.get_mut(*id) else {
                    continue;
                };
                let frame = frame::frame_rect(window, &metrics).intersected(screen_rect);
                if !window.is_opaque() {
                    let regions = window.regions_mut();
                    regions.transparent_wallpaper = regions.transparent.shatter_set(&below);
                }
                below.add(frame);
            }
        }

        let mut changed = Vec::new();
        for id in &visible {
            if let Some(window) = stack.get_mut(*id) {
                let occluded = window.regions().is_empty();
                if window.set_occluded(occluded) {
                    changed.push(*id);
                }
            }
        }
        for id in changed {
            wm.post_state_changed(id);
        }
        self.stats.occlusion_passes += 1;
        debug!(
            "Recomputed occlusion for {} visible windows, {} wallpaper rects",
            visible.len(),
            self.opaque_wallpaper.len()
        );
    }

    // ── Compose ──────────────────────────────────────────────────────

    /// Run one compose pass. Does nothing when nothing was invalidated.
    pub fn compose(&mut self, wm: &mut WindowManager, screen: &mut Screen) {
        let started = Instant::now();
        if !wm.damage_mut().scheduler_mut().begin_compose() {
            self.stats.frames_skipped += 1;
            return;
        }
        if wm.damage_mut().take_occlusions_dirty() {
            self.recompute_occlusions(wm);
        }

        let overlays = self.overlays(wm, screen.cursor_location());
        let dirty = self.collect_dirty_rects(wm, &overlays, screen.rect());
        if dirty.is_empty() {
            self.stats.record_frame(started.elapsed(), 0);
            return;
        }

        if let Some((_, back)) = screen.pages_mut() {
            self.render(wm, back, &dirty, &overlays);
            let next = 1 - screen.buffer_index();
            screen.set_buffer(next);
            // Keep the page we just hid in step with what is shown.
            if let Some((front, back)) = screen.pages_mut() {
                for rect in dirty.iter() {
                    back.copy_rect_from(front, rect);
                }
            }
        } else if let Some(mut back) = self.back.take() {
            self.render(wm, &mut back, &dirty, &overlays);
            let front = screen.front_mut();
            for rect in dirty.iter() {
                front.copy_rect_from(&back, rect);
            }
            self.back = Some(back);
        }

        self.last_cursor_rect = overlays.cursor_rect;
        self.last_geometry_label_rect = overlays.geometry_label.as_ref().map(|(rect, _)| *rect);
        self.last_dnd_rect = overlays.dnd;

        let rects = dirty.rects().to_vec();
        self.stats.record_frame(started.elapsed(), rects.len());
        trace!(
            "Composed frame {}: {} rects, {} px, {:?}",
            self.stats.frames_composed,
            rects.len(),
            dirty.area(),
            self.stats.last_compose_time
        );
        wm.push_action(CoreAction::ScreenFlushed { rects });
    }

    fn overlays(&self, wm: &WindowManager, cursor_location: Point) -> Overlays {
        let cursor = wm.active_cursor();
        let cursor_rect = self.cursors.get(cursor).rect_at(cursor_location);
        let geometry_label = wm
            .geometry_label_window()
            .and_then(|id| wm.window(id))
            .map(|window| {
                let text = geometry_label_text(window);
                let size = Size::new(
                    self.text.text_width(&text) + 16,
                    self.text.glyph_height() + 10,
                );
                let mut rect = Rect::from_location_and_size(Point::default(), size);
                rect.center_within(window.rect());
                (clamp_into(rect, wm.screen_rect()), text)
            });
        let dnd = wm.drag().map(|drag| {
            let bitmap_size = drag.bitmap.as_ref().map_or(Size::default(), Bitmap::size);
            let gap = if drag.bitmap.is_some() { 4 } else { 0 };
            let width = self.text.text_width(&drag.text) + bitmap_size.width + gap + 8;
            let height = self.text.glyph_height().max(bitmap_size.height) + 8;
            Rect::new(cursor_location.x + 8, cursor_location.y + 8, width, height)
        });
        Overlays {
            cursor,
            cursor_rect,
            geometry_label,
            dnd,
        }
    }

    /// Everything that must be repainted this pass, in screen coordinates.
    /// Clears the windows' own dirty state.
    fn collect_dirty_rects(
        &self,
        wm: &mut WindowManager,
        overlays: &Overlays,
        screen_rect: Rect,
    ) -> DisjointRects {
        let metrics = *wm.metrics();
        let (stack, damage) = wm.compositor_parts();
        let mut dirty = damage.take_screen_rects();

        for id in stack.ids_back_to_front() {
            let Some(window) = stack.get_mut(id) else {
                continue;
            };
            if window.is_visible_on_screen() && window.is_invalidated() {
                let frame = frame::frame_rect(window, &metrics);
                if window.is_fully_invalidated() {
                    dirty.add(if window.is_frame_invalidated() {
                        frame
                    } else {
                        window.rect()
                    });
                } else {
                    dirty.add_set(&window.dirty_rects().translated(frame.x, frame.y));
                    if window.is_frame_invalidated() {
                        dirty.add_many(frame.shatter(window.rect()));
                    }
                }
            }
            window.clear_dirty_rects();
        }

        for rect in [self.last_geometry_label_rect, self.last_dnd_rect]
            .into_iter()
            .flatten()
        {
            dirty.add(rect);
        }
        if let Some((rect, _)) = &overlays.geometry_label {
            dirty.add(*rect);
        }
        if let Some(rect) = overlays.dnd {
            dirty.add(rect);
        }
        if damage.take_cursor_dirty() || overlays.cursor_rect != self.last_cursor_rect {
            dirty.add(self.last_cursor_rect);
            dirty.add(overlays.cursor_rect);
        }
        if dirty.intersects_rect(overlays.cursor_rect) {
            dirty.add(overlays.cursor_rect);
        }
        dirty.intersected(screen_rect)
    }

    fn render(
        &mut self,
        wm: &WindowManager,
        target: &mut Bitmap,
        dirty: &DisjointRects,
        overlays: &Overlays,
    ) {
        let screen_rect = wm.screen_rect();
        for rect in self.opaque_wallpaper.intersected_set(dirty).iter() {
            self.wallpaper.paint(target, screen_rect, rect);
        }

        let painter = WindowPainter {
            theme: &self.theme,
            metrics: &self.metrics,
            text: self.text.as_ref(),
        };
        let mut blended = DisjointRects::new();
        for window in wm.stack().visible_back_to_front() {
            let opaque = window.opaque_rects().intersected_set(dirty);
            let transparent = window.transparency_rects().intersected_set(dirty);
            if opaque.is_empty() && transparent.is_empty() {
                continue;
            }
            let style = if wm.move_window() == Some(window.id()) {
                FrameStyle::Moving
            } else if wm.active_window() == Some(window.id()) {
                FrameStyle::Active
            } else {
                FrameStyle::Inactive
            };
            let direction = wm.resize_direction_of(window.id());
            for rect in opaque.iter() {
                painter.paint(target, window, rect, style, direction);
            }
            for rect in window
                .transparency_wallpaper_rects()
                .intersected_set(dirty)
                .iter()
            {
                self.wallpaper.paint(&mut self.scratch, screen_rect, rect);
            }
            for rect in transparent.iter() {
                painter.paint(&mut self.scratch, window, rect, style, direction);
            }
            blended.add_set(&transparent);
        }
        for rect in blended.iter() {
            target.copy_rect_from(&self.scratch, rect);
        }

        if let Some((rect, text)) = &overlays.geometry_label {
            self.paint_geometry_label(target, *rect, text);
        }
        if let (Some(rect), Some(drag)) = (overlays.dnd, wm.drag()) {
            self.paint_dnd_label(target, rect, &drag.text, drag.bitmap.as_ref());
        }
        if dirty.intersects_rect(overlays.cursor_rect) {
            let cursor = self.cursors.get(overlays.cursor);
            let bitmap = cursor.bitmap();
            target.blit_blended(
                overlays.cursor_rect.location(),
                bitmap,
                bitmap.rect(),
                overlays.cursor_rect,
                1.0,
            );
        }
    }

    fn paint_geometry_label(&self, target: &mut Bitmap, rect: Rect, text: &str) {
        target.fill_rect(rect, rect, self.theme.window);
        target.draw_rect(rect, rect, self.theme.border);
        self.text.draw_text(
            target,
            rect,
            rect,
            text,
            self.theme.window_text,
            TextAlignment::Center,
        );
    }

    fn paint_dnd_label(&self, target: &mut Bitmap, rect: Rect, text: &str, bitmap: Option<&Bitmap>) {
        target.fill_rect(rect, rect, self.theme.selection);
        target.draw_rect(rect, rect, self.theme.border);
        let mut text_rect = rect.inflated(-8, -8);
        text_rect.x = rect.x + 4;
        if let Some(bitmap) = bitmap {
            let mut icon = bitmap.rect();
            icon.x = rect.x + 4;
            icon.center_vertically_within(rect);
            target.blit_blended(icon.location(), bitmap, bitmap.rect(), rect, 1.0);
            text_rect.x = icon.right() + 4;
        }
        text_rect.y = rect.y + 4;
        self.text.draw_text(
            target,
            text_rect,
            rect,
            text,
            self.theme.selection_text,
            TextAlignment::CenterLeft,
        );
    }
}

/// Borrowed theme state for painting windows while the scratch buffer is
/// mutably borrowed.
struct WindowPainter<'a> {
    theme: &'a ThemeConfig,
    metrics: &'a ThemeMetrics,
    text: &'a dyn TextPainter,
}

impl WindowPainter<'_> {
    /// Decorations and contents of `window`, limited to `clip`.
    fn paint(
        &self,
        target: &mut Bitmap,
        window: &Window,
        clip: Rect,
        style: FrameStyle,
        direction: ResizeDirection,
    ) {
        frame::paint(target, clip, window, self.metrics, self.theme, style, self.text);
        let rect = window.rect();
        let inner = rect.intersected(clip);
        if inner.is_empty() {
            return;
        }
        let opacity = window.opacity();
        let Some(store) = window.backing_store_for_size() else {
            frame::fill(target, rect, inner, self.theme.window, opacity);
            return;
        };
        let location = backing_store_location(rect, store.size(), direction);
        let store_rect = Rect::from_location_and_size(location, store.size());
        for uncovered in rect.shatter(store_rect) {
            frame::fill(target, uncovered, inner, self.theme.window, opacity);
        }
        target.blit_blended(location, &store.bitmap, store.bitmap.rect(), inner, opacity);
    }
}

/// Where to put a backing store whose size lags the window's: anchored to
/// the edges a resize is not dragging.
fn backing_store_location(rect: Rect, store: Size, direction: ResizeDirection) -> Point {
    let mut location = rect.location();
    if store == rect.size() {
        return location;
    }
    if matches!(
        direction,
        ResizeDirection::Left | ResizeDirection::UpLeft | ResizeDirection::DownLeft
    ) {
        location.x = rect.right() - store.width;
    }
    if matches!(
        direction,
        ResizeDirection::Up | ResizeDirection::UpLeft | ResizeDirection::UpRight
    ) {
        location.y = rect.bottom() - store.height;
    }
    location
}

fn geometry_label_text(window: &Window) -> String {
    let rect = window.rect();
    let base = window.base_size();
    let increment = window.size_increment();
    if increment.width > 0 && increment.height > 0 {
        format!(
            "{rect} ({}x{})",
            (rect.width - base.width) / increment.width,
            (rect.height - base.height) / increment.height
        )
    } else {
        rect.to_string()
    }
}

/// Move `rect` so it lies inside `bounds` where possible.
fn clamp_into(mut rect: Rect, bounds: Rect) -> Rect {
    rect.x = rect.x.min(bounds.right() - rect.width).max(bounds.x);
    rect.y = rect.y.min(bounds.bottom() - rect.height).max(bounds.y);
    rect
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::{ClientId, WindowFlags, WindowParams};
    use pretty_assertions::assert_eq;

    const RED: Color = Color(0xffff_0000);

    fn config(width: i32, height: i32, double_buffered: bool) -> Config {
        let mut config = Config::default();
        config.screen.width = width;
        config.screen.height = height;
        config.screen.double_buffered = double_buffered;
        config
    }

    fn setup(width: i32, height: i32, double_buffered: bool) -> (WindowManager, Compositor, Screen) {
        let config = config(width, height, double_buffered);
        let screen = Screen::new(Size::new(width, height), double_buffered).unwrap();
        let mut wm = WindowManager::new(&config, screen.rect());
        wm.damage_mut().invalidate_screen(screen.rect());
        let compositor = Compositor::new(&config, &screen).unwrap();
        (wm, compositor, screen)
    }

    fn frameless(wm: &mut WindowManager, id: u64, rect: Rect) -> WindowId {
        let id = WindowId(id);
        wm.create_window(
            id,
            Some(ClientId(1)),
            WindowParams {
                rect,
                flags: WindowFlags::VISIBLE | WindowFlags::FRAMELESS | WindowFlags::RESIZABLE,
                ..WindowParams::default()
            },
        );
        id
    }

    #[test]
    fn test_l_shaped_occlusion() {
        let (mut wm, mut compositor, screen) = setup(1024, 768, false);
        let b = frameless(&mut wm, 2, Rect::new(100, 100, 200, 200));
        let a = frameless(&mut wm, 1, Rect::new(0, 0, 200, 200));
        compositor.recompute_occlusions(&mut wm);

        let a_opaque = wm.window(a).unwrap().opaque_rects().clone();
        let b_opaque = wm.window(b).unwrap().opaque_rects().clone();
        assert_eq!(a_opaque.area(), 200 * 200);
        assert_eq!(b_opaque.area(), 200 * 200 - 100 * 100);
        assert!(b_opaque.contains(Rect::new(200, 100, 100, 200)));
        assert!(b_opaque.contains(Rect::new(100, 200, 100, 100)));
        assert!(!b_opaque.intersects_rect(Rect::new(100, 100, 100, 100)));
        assert!(!a_opaque.intersects(&b_opaque));

        let wallpaper = compositor.opaque_wallpaper();
        assert!(!wallpaper.intersects(&a_opaque));
        assert!(!wallpaper.intersects(&b_opaque));
        assert_eq!(
            wallpaper.area() + a_opaque.area() + b_opaque.area(),
            screen.rect().area()
        );
    }

    #[test]
    fn test_translucent_window_occlusion() {
        let (mut wm, mut compositor, _screen) = setup(400, 400, false);
        let b = frameless(&mut wm, 2, Rect::new(100, 100, 200, 200));
        let a = frameless(&mut wm, 1, Rect::new(0, 0, 200, 200));
        wm.set_window_opacity(a, 0.5);
        compositor.recompute_occlusions(&mut wm);

        let a_regions = wm.window(a).unwrap().regions().clone();
        let b_regions = wm.window(b).unwrap().regions().clone();
        assert!(a_regions.opaque.is_empty());
        assert_eq!(a_regions.transparent.area(), 200 * 200);
        assert_eq!(a_regions.transparent_wallpaper.area(), 200 * 200 - 100 * 100);
        assert!(b_regions.transparent.contains(Rect::new(100, 100, 100, 100)));
        assert_eq!(b_regions.opaque.area(), 200 * 200 - 100 * 100);
        // B is opaque, so nothing shows through it.
        assert!(b_regions.transparent_wallpaper.is_empty());
        assert!(!compositor
            .opaque_wallpaper()
            .intersects_rect(Rect::new(0, 0, 200, 200)));
    }

    #[test]
    fn test_fullscreen_window_takes_whole_screen() {
        let (mut wm, mut compositor, screen) = setup(640, 480, false);
        let other = frameless(&mut wm, 1, Rect::new(10, 10, 100, 100));
        let full = frameless(&mut wm, 2, Rect::new(200, 200, 100, 100));
        wm.set_fullscreen(full, true);
        compositor.recompute_occlusions(&mut wm);

        assert!(wm.window(other).unwrap().regions().is_empty());
        assert!(wm.window(other).unwrap().is_occluded());
        assert_eq!(
            wm.window(full).unwrap().opaque_rects().area(),
            screen.rect().area()
        );
        assert!(compositor.opaque_wallpaper().is_empty());
    }

    #[test]
    fn test_covered_window_is_told_it_is_occluded() {
        let (mut wm, mut compositor, _screen) = setup(400, 400, false);
        let below = frameless(&mut wm, 1, Rect::new(50, 50, 50, 50));
        frameless(&mut wm, 2, Rect::new(0, 0, 200, 200));
        wm.take_actions();
        compositor.recompute_occlusions(&mut wm);
        let actions = wm.take_actions();
        assert!(actions.contains(&CoreAction::Post {
            client: ClientId(1),
            window: below,
            event: crate::event::ClientEvent::StateChanged {
                minimized: false,
                occluded: true,
            },
        }));
    }

    #[test]
    fn test_compose_paints_windows_wallpaper_and_cursor() {
        let (mut wm, mut compositor, mut screen) = setup(64, 64, false);
        let id = frameless(&mut wm, 1, Rect::new(10, 10, 20, 20));
        wm.set_backing_store(id, 1, Bitmap::filled(Size::new(20, 20), RED));
        compositor.compose(&mut wm, &mut screen);

        let wallpaper = Config::default().background.color;
        assert_eq!(screen.front().pixel(Point::new(15, 15)), Some(RED));
        assert_eq!(screen.front().pixel(Point::new(5, 5)), Some(wallpaper));
        // Arrow tip at the pointer, which starts in the middle of the screen.
        assert_eq!(screen.front().pixel(Point::new(32, 32)), Some(Color::BLACK));
        assert!(wm
            .take_actions()
            .iter()
            .any(|a| matches!(a, CoreAction::ScreenFlushed { rects } if !rects.is_empty())));
        assert_eq!(compositor.stats().frames_composed, 1);
    }

    #[test]
    fn test_compose_without_invalidation_is_skipped() {
        let (mut wm, mut compositor, mut screen) = setup(64, 64, false);
        compositor.compose(&mut wm, &mut screen);
        compositor.compose(&mut wm, &mut screen);
        assert_eq!(compositor.stats().frames_composed, 1);
        assert_eq!(compositor.stats().frames_skipped, 1);
    }

    #[test]
    fn test_double_buffered_flip_keeps_pages_in_sync() {
        let (mut wm, mut compositor, mut screen) = setup(64, 64, true);
        let id = frameless(&mut wm, 1, Rect::new(10, 10, 20, 20));
        wm.set_backing_store(id, 1, Bitmap::filled(Size::new(20, 20), RED));
        compositor.compose(&mut wm, &mut screen);
        assert_eq!(screen.buffer_index(), 1);
        assert_eq!(screen.front().pixel(Point::new(15, 15)), Some(RED));

        wm.set_window_rect(id, Rect::new(40, 10, 20, 20));
        compositor.compose(&mut wm, &mut screen);
        assert_eq!(screen.buffer_index(), 0);
        let wallpaper = Config::default().background.color;
        assert_eq!(screen.front().pixel(Point::new(15, 15)), Some(wallpaper));
        assert_eq!(screen.front().pixel(Point::new(45, 15)), Some(RED));
    }

    #[test]
    fn test_translucent_window_blends_over_wallpaper() {
        let (mut wm, mut compositor, mut screen) = setup(64, 64, false);
        let id = frameless(&mut wm, 1, Rect::new(0, 0, 20, 20));
        wm.set_backing_store(id, 1, Bitmap::filled(Size::new(20, 20), Color::WHITE));
        wm.set_window_opacity(id, 0.5);
        compositor.compose(&mut wm, &mut screen);
        let pixel = screen.front().pixel(Point::new(5, 5)).unwrap();
        let wallpaper = Config::default().background.color;
        assert!(pixel.red() > wallpaper.red() && pixel.red() < 0xff);
    }

    #[test]
    fn test_stale_backing_store_is_anchored_to_fixed_edge() {
        let rect = Rect::new(100, 100, 300, 200);
        let store = Size::new(280, 190);
        assert_eq!(
            backing_store_location(rect, store, ResizeDirection::DownRight),
            Point::new(100, 100)
        );
        assert_eq!(
            backing_store_location(rect, store, ResizeDirection::UpLeft),
            Point::new(120, 110)
        );
        assert_eq!(
            backing_store_location(rect, store, ResizeDirection::DownLeft),
            Point::new(120, 100)
        );
    }

    #[test]
    fn test_wallpaper_modes() {
        let mut image = Bitmap::filled(Size::new(2, 2), RED);
        image.set_pixel(Point::new(1, 1), Color::WHITE);
        let screen_rect = Rect::new(0, 0, 6, 6);
        let mut wallpaper = Wallpaper::from_config(&BackgroundConfig::default());
        wallpaper.set_image(Some(image));

        let mut target = Bitmap::new(Size::new(6, 6));
        wallpaper.paint(&mut target, screen_rect, screen_rect);
        assert_eq!(target.pixel(Point::new(1, 1)), Some(Color::WHITE));
        assert_eq!(target.pixel(Point::new(4, 4)), Some(wallpaper.color()));

        wallpaper.mode = WallpaperMode::Tile;
        wallpaper.paint(&mut target, screen_rect, screen_rect);
        assert_eq!(target.pixel(Point::new(5, 5)), Some(Color::WHITE));

        wallpaper.mode = WallpaperMode::Center;
        wallpaper.paint(&mut target, screen_rect, screen_rect);
        assert_eq!(target.pixel(Point::new(2, 2)), Some(RED));
        assert_eq!(target.pixel(Point::new(0, 0)), Some(wallpaper.color()));
    }

    #[test]
    fn test_cursor_set_falls_back_to_arrow() {
        let mut cursors = CursorSet::default();
        let arrow_size = cursors.get(StandardCursor::Move).bitmap().size();
        assert_eq!(arrow_size, Size::new(11, 16));
        let custom = Cursor::new(Bitmap::new(Size::new(5, 5)), Point::new(2, 2));
        cursors.set(StandardCursor::Move, custom);
        let rect = cursors.get(StandardCursor::Move).rect_at(Point::new(10, 10));
        assert_eq!(rect, Rect::new(8, 8, 5, 5));
    }

    #[test]
    fn test_geometry_label_shows_increment_steps() {
        let mut window = Window::new(
            WindowId(1),
            Some(ClientId(1)),
            WindowParams {
                rect: Rect::new(0, 0, 100, 60),
                ..WindowParams::default()
            },
        );
        assert_eq!(geometry_label_text(&window), "[0,0 100x60]");
        window.set_resize_constraints(Size::new(20, 0), Size::new(8, 12), None);
        assert_eq!(geometry_label_text(&window), "[0,0 100x60] (10x5)");
    }
}
