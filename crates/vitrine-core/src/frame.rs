//! Window decorations.
//!
//! Frame geometry is a pure function of the window (type, rect, flags) and
//! the theme metrics. The only state is the per-button pressed/hovered flags
//! kept in [`FrameState`] on each window.

use crate::bitmap::{Bitmap, Color};
use crate::compositor::{TextAlignment, TextPainter};
use crate::config::ThemeConfig;
use crate::geometry::{Point, Rect};
use crate::window::{ResizeDirection, Window, WindowType};

const ICON_SIZE: i32 = 16;
const NOTIFICATION_BORDER: i32 = 3;

/// Decoration metrics, from the `[theme]` config table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemeMetrics {
    pub title_height: i32,
    pub title_button_width: i32,
    pub title_button_height: i32,
    pub border_thickness: i32,
    pub menubar_height: i32,
}

impl From<&ThemeConfig> for ThemeMetrics {
    fn from(theme: &ThemeConfig) -> Self {
        Self {
            title_height: theme.title_height,
            title_button_width: theme.title_button_width,
            title_button_height: theme.title_button_height,
            border_thickness: theme.border_thickness,
            menubar_height: theme.menubar_height,
        }
    }
}

impl Default for ThemeMetrics {
    fn default() -> Self {
        Self::from(&ThemeConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameButtonKind {
    Close,
    Maximize,
    Minimize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameButton {
    pub kind: FrameButtonKind,
    /// Relative to the frame rect.
    pub rect: Rect,
    pub pressed: bool,
    pub hovered: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FrameState {
    buttons: Vec<FrameButton>,
}

impl FrameState {
    pub fn buttons(&self) -> &[FrameButton] {
        &self.buttons
    }

    pub fn button(&self, kind: FrameButtonKind) -> Option<&FrameButton> {
        self.buttons.iter().find(|b| b.kind == kind)
    }

    pub fn button_mut(&mut self, kind: FrameButtonKind) -> Option<&mut FrameButton> {
        self.buttons.iter_mut().find(|b| b.kind == kind)
    }

    /// The button under a frame-relative point.
    pub fn button_at(&self, point: Point) -> Option<FrameButtonKind> {
        self.buttons
            .iter()
            .find(|b| b.rect.contains(point))
            .map(|b| b.kind)
    }
}

pub fn has_frame(window: &Window) -> bool {
    window.window_type().is_frameable() && !window.is_frameless() && !window.is_fullscreen()
}

/// Outer rect of the window including decorations, in screen coordinates.
pub fn frame_rect(window: &Window, metrics: &ThemeMetrics) -> Rect {
    let rect = window.rect();
    if !has_frame(window) {
        return rect;
    }
    let border = metrics.border_thickness;
    let title = metrics.title_height;
    match window.window_type() {
        WindowType::Notification => Rect::new(
            rect.x - NOTIFICATION_BORDER,
            rect.y - NOTIFICATION_BORDER,
            rect.width + NOTIFICATION_BORDER * 2 + title,
            rect.height + NOTIFICATION_BORDER * 2,
        ),
        _ => Rect::new(
            rect.x - border,
            rect.y - title - border - 2,
            rect.width + border * 2,
            rect.height + border * 2 + 2 + title,
        ),
    }
}

/// Title bar, relative to the frame rect. Empty for undecorated windows.
pub fn title_bar_rect(window: &Window, metrics: &ThemeMetrics) -> Rect {
    if !has_frame(window) {
        return Rect::default();
    }
    let rect = window.rect();
    match window.window_type() {
        WindowType::Notification => Rect::new(
            rect.width + NOTIFICATION_BORDER,
            NOTIFICATION_BORDER,
            metrics.title_height,
            rect.height,
        ),
        _ => Rect::new(
            metrics.border_thickness,
            metrics.border_thickness,
            rect.width,
            metrics.title_height,
        ),
    }
}

pub fn title_bar_icon_rect(window: &Window, metrics: &ThemeMetrics) -> Rect {
    let title_bar = title_bar_rect(window, metrics);
    let mut icon = Rect::new(title_bar.x + 2, title_bar.y, ICON_SIZE, ICON_SIZE);
    icon.center_vertically_within(title_bar);
    icon
}

pub fn title_bar_text_rect(window: &Window, metrics: &ThemeMetrics) -> Rect {
    let title_bar = title_bar_rect(window, metrics);
    let icon = title_bar_icon_rect(window, metrics);
    Rect::new(
        title_bar.x + 3 + icon.width + 2,
        title_bar.y,
        title_bar.width - 5 - icon.width - 2,
        title_bar.height,
    )
}

/// Recompute the title bar buttons. Must run whenever the frame rect changes.
///
/// Normal windows get close, maximize (if resizable) and minimize (if
/// minimizable) laid out right to left; notifications get a close button at
/// the top of their side strip.
pub fn layout_buttons(window: &mut Window, metrics: &ThemeMetrics) {
    if !has_frame(window) {
        window.frame.buttons.clear();
        return;
    }
    let mut kinds = vec![FrameButtonKind::Close];
    if window.window_type() == WindowType::Normal {
        if window.is_resizable() {
            kinds.push(FrameButtonKind::Maximize);
        }
        if window.is_minimizable() {
            kinds.push(FrameButtonKind::Minimize);
        }
    }

    let title_bar = title_bar_rect(window, metrics);
    let text_rect = title_bar_text_rect(window, metrics);
    let is_notification = window.window_type() == WindowType::Notification;
    let mut pos = if is_notification {
        title_bar.top()
    } else {
        title_bar.right()
    };

    let old = std::mem::take(&mut window.frame.buttons);
    for kind in kinds {
        let rect = if is_notification {
            let side = metrics.title_button_height;
            let mut rect = Rect::new(0, pos, side, side);
            rect.center_horizontally_within(title_bar);
            pos += side;
            rect
        } else {
            pos -= metrics.title_button_width;
            let mut rect = Rect::new(
                pos,
                0,
                metrics.title_button_width,
                metrics.title_button_height,
            );
            rect.center_vertically_within(text_rect);
            rect
        };
        let previous = old.iter().find(|b| b.kind == kind);
        window.frame.buttons.push(FrameButton {
            kind,
            rect,
            pressed: previous.is_some_and(|b| b.pressed),
            hovered: previous.is_some_and(|b| b.hovered),
        });
    }
}

/// Which resize direction a point (screen coordinates) in the frame maps
/// to, by splitting the frame into a 3x3 grid. The center cell is `None`.
pub fn hot_area_direction(frame_rect: Rect, point: Point) -> ResizeDirection {
    const DIRECTIONS: [[ResizeDirection; 3]; 3] = [
        [
            ResizeDirection::UpLeft,
            ResizeDirection::Up,
            ResizeDirection::UpRight,
        ],
        [
            ResizeDirection::Left,
            ResizeDirection::None,
            ResizeDirection::Right,
        ],
        [
            ResizeDirection::DownLeft,
            ResizeDirection::Down,
            ResizeDirection::DownRight,
        ],
    ];
    let relative_x = (point.x - frame_rect.x).max(0);
    let relative_y = (point.y - frame_rect.y).max(0);
    let row = (relative_y / (frame_rect.height / 3).max(1)).min(2);
    let column = (relative_x / (frame_rect.width / 3).max(1)).min(2);
    DIRECTIONS[row as usize][column as usize]
}

/// Title bar appearance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStyle {
    Active,
    Inactive,
    Moving,
}

pub(crate) fn fill(target: &mut Bitmap, rect: Rect, clip: Rect, color: Color, opacity: f32) {
    if opacity >= 1.0 {
        target.fill_rect(rect, clip, color);
    } else {
        let alpha = (f32::from(color.alpha()) * opacity).round() as u8;
        target.fill_rect_blended(rect, clip, color.with_alpha(alpha));
    }
}

/// Paint the decorations of `window` into `target`, restricted to `clip`
/// (screen coordinates).
pub fn paint(
    target: &mut Bitmap,
    clip: Rect,
    window: &Window,
    metrics: &ThemeMetrics,
    theme: &ThemeConfig,
    style: FrameStyle,
    text: &dyn TextPainter,
) {
    if !has_frame(window) {
        return;
    }
    let outer = frame_rect(window, metrics);
    let clip = clip.intersected(outer);
    if clip.is_empty() {
        return;
    }
    let opacity = window.opacity();
    let origin = outer.location();
    let to_screen = |r: Rect| r.translated(origin.x, origin.y);

    for piece in outer.shatter(window.rect()) {
        fill(target, piece, clip, theme.window, opacity);
    }
    fill(target, Rect::new(outer.x, outer.y, outer.width, 1), clip, theme.border, opacity);
    fill(target, Rect::new(outer.x, outer.y, 1, outer.height), clip, theme.border, opacity);
    fill(target, Rect::new(outer.right() - 1, outer.y, 1, outer.height), clip, theme.border, opacity);
    fill(target, Rect::new(outer.x, outer.bottom() - 1, outer.width, 1), clip, theme.border, opacity);

    let (title_color, title_text_color) = match style {
        FrameStyle::Active => (theme.active_title, theme.active_title_text),
        FrameStyle::Inactive => (theme.inactive_title, theme.inactive_title_text),
        FrameStyle::Moving => (theme.moving_title, theme.active_title_text),
    };
    let title_bar = to_screen(title_bar_rect(window, metrics));
    fill(target, title_bar, clip, title_color, opacity);

    if window.window_type() == WindowType::Normal {
        if let Some(icon) = window.icon() {
            let icon_rect = to_screen(title_bar_icon_rect(window, metrics));
            target.blit_blended(icon_rect.location(), icon, icon.rect(), clip.intersected(icon_rect), opacity);
        }
        let mut text_rect = to_screen(title_bar_text_rect(window, metrics));
        if let Some(leftmost) = window.frame.buttons.iter().map(|b| b.rect.x).min() {
            text_rect.width = (origin.x + leftmost - 2 - text_rect.x).max(0);
        }
        text.draw_text(
            target,
            text_rect,
            clip.intersected(text_rect),
            window.title(),
            title_text_color,
            TextAlignment::CenterLeft,
        );
    }

    for button in &window.frame.buttons {
        paint_button(target, to_screen(button.rect), clip, button, theme, opacity);
    }
}

fn paint_button(
    target: &mut Bitmap,
    rect: Rect,
    clip: Rect,
    button: &FrameButton,
    theme: &ThemeConfig,
    opacity: f32,
) {
    let face = if button.pressed {
        theme.border
    } else {
        theme.window
    };
    fill(target, rect, clip, face, opacity);
    let edge = if button.hovered {
        theme.highlight
    } else {
        theme.window_text
    };
    fill(target, Rect::new(rect.x, rect.y, rect.width, 1), clip, edge, opacity);
    fill(target, Rect::new(rect.x, rect.bottom() - 1, rect.width, 1), clip, edge, opacity);
    fill(target, Rect::new(rect.x, rect.y, 1, rect.height), clip, edge, opacity);
    fill(target, Rect::new(rect.right() - 1, rect.y, 1, rect.height), clip, edge, opacity);

    let glyph = Rect::new(rect.x + 4, rect.y + 4, rect.width - 8, rect.height - 8);
    if glyph.is_empty() {
        return;
    }
    let ink = theme.window_text;
    match button.kind {
        FrameButtonKind::Close => {
            for i in 0..glyph.width.min(glyph.height) {
                fill(target, Rect::new(glyph.x + i, glyph.y + i, 1, 1), clip, ink, opacity);
                fill(target, Rect::new(glyph.right() - 1 - i, glyph.y + i, 1, 1), clip, ink, opacity);
            }
        }
        FrameButtonKind::Maximize => {
            fill(target, Rect::new(glyph.x, glyph.y, glyph.width, 2), clip, ink, opacity);
            fill(target, Rect::new(glyph.x, glyph.y, 1, glyph.height), clip, ink, opacity);
            fill(target, Rect::new(glyph.right() - 1, glyph.y, 1, glyph.height), clip, ink, opacity);
            fill(target, Rect::new(glyph.x, glyph.bottom() - 1, glyph.width, 1), clip, ink, opacity);
        }
        FrameButtonKind::Minimize => {
            fill(target, Rect::new(glyph.x, glyph.bottom() - 2, glyph.width, 2), clip, ink, opacity);
        }
    }
}
