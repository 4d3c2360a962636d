//! Protocol-agnostic events and actions.
//!
//! [`CoreEvent`] is what the backend (hardware input, client connections)
//! tells the core. [`CoreAction`] is what the core asks the backend to do:
//! deliver a message to a client, boost a client, or show flushed pixels.

use bitflags::bitflags;

use crate::bitmap::Bitmap;
use crate::geometry::{Point, Rect, Size};
use crate::window::{ClientId, WindowId, WindowParams, WindowType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Back,
    Forward,
}

impl MouseButton {
    pub const ALL: [Self; 5] = [
        Self::Left,
        Self::Right,
        Self::Middle,
        Self::Back,
        Self::Forward,
    ];

    pub const fn flag(self) -> MouseButtons {
        match self {
            Self::Left => MouseButtons::LEFT,
            Self::Right => MouseButtons::RIGHT,
            Self::Middle => MouseButtons::MIDDLE,
            Self::Back => MouseButtons::BACK,
            Self::Forward => MouseButtons::FORWARD,
        }
    }
}

bitflags! {
    /// Currently held mouse buttons.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MouseButtons: u8 {
        const LEFT    = 0b0000_0001;
        const RIGHT   = 0b0000_0010;
        const MIDDLE  = 0b0000_0100;
        const BACK    = 0b0000_1000;
        const FORWARD = 0b0001_0000;
    }
}

bitflags! {
    /// Keyboard modifier state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0000_0001;
        const CTRL  = 0b0000_0010;
        const ALT   = 0b0000_0100;
        const LOGO  = 0b0000_1000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Escape,
    Tab,
    Enter,
    Backspace,
    Left,
    Right,
    Up,
    Down,
    Shift,
    Control,
    Alt,
    Logo,
    Character(char),
    Other(u32),
}

impl Key {
    /// The modifier this key controls, if it is a modifier key.
    pub const fn modifier(self) -> Option<Modifiers> {
        match self {
            Self::Shift => Some(Modifiers::SHIFT),
            Self::Control => Some(Modifiers::CTRL),
            Self::Alt => Some(Modifiers::ALT),
            Self::Logo => Some(Modifiers::LOGO),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: Modifiers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseEventKind {
    Move,
    Down,
    Up,
    DoubleClick,
    Wheel,
}

/// A pointer event. `position` is screen-relative while the window manager
/// routes it and window-relative once delivered to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    pub kind: MouseEventKind,
    pub position: Point,
    /// The button that changed, for Down/Up/DoubleClick.
    pub button: Option<MouseButton>,
    /// Buttons held after this event.
    pub buttons: MouseButtons,
    pub modifiers: Modifiers,
    pub wheel_delta: i32,
}

impl MouseEvent {
    #[must_use]
    pub const fn translated(mut self, dx: i32, dy: i32) -> Self {
        self.position = self.position.translated(dx, dy);
        self
    }

    pub fn is_button(&self, kind: MouseEventKind, button: MouseButton) -> bool {
        self.kind == kind && self.button == Some(button)
    }
}

bitflags! {
    /// Which window-manager notifications a listener wants.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WmEventMask: u8 {
        const WINDOW_STATE_CHANGES = 0b0001;
        const WINDOW_RECT_CHANGES  = 0b0010;
        const WINDOW_ICON_CHANGES  = 0b0100;
        const WINDOW_REMOVALS      = 0b1000;
    }
}

/// Notification for taskbar-like listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum WmEvent {
    WindowStateChanged {
        client: ClientId,
        window: WindowId,
        parent: Option<WindowId>,
        window_type: WindowType,
        title: String,
        rect: Rect,
        active: bool,
        minimized: bool,
        modal: bool,
        frameless: bool,
    },
    WindowRectChanged {
        client: ClientId,
        window: WindowId,
        rect: Rect,
    },
    WindowIconChanged {
        client: ClientId,
        window: WindowId,
    },
    WindowRemoved {
        client: ClientId,
        window: WindowId,
    },
}

/// Events delivered to the client owning a window.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    MouseMove {
        event: MouseEvent,
        /// Set while a drag-and-drop is hovering the window.
        drag_data_type: Option<String>,
    },
    MouseDown(MouseEvent),
    MouseUp(MouseEvent),
    MouseDoubleClick(MouseEvent),
    MouseWheel(MouseEvent),
    KeyDown(KeyEvent),
    KeyUp(KeyEvent),
    Activated,
    Deactivated,
    InputEntered,
    InputLeft,
    Entered,
    Left,
    CloseRequest,
    Resized {
        rect: Rect,
    },
    StateChanged {
        minimized: bool,
        occluded: bool,
    },
    Paint {
        size: Size,
        rects: Vec<Rect>,
    },
    MenuDismissed,
}

impl ClientEvent {
    /// Build the client message for a window-relative mouse event.
    pub fn from_mouse(event: MouseEvent) -> Self {
        match event.kind {
            MouseEventKind::Move => Self::MouseMove {
                event,
                drag_data_type: None,
            },
            MouseEventKind::Down => Self::MouseDown(event),
            MouseEventKind::Up => Self::MouseUp(event),
            MouseEventKind::DoubleClick => Self::MouseDoubleClick(event),
            MouseEventKind::Wheel => Self::MouseWheel(event),
        }
    }
}

/// Events that a backend sends to the core.
#[derive(Debug, Clone)]
pub enum CoreEvent {
    // ── Hardware ─────────────────────────────────────────────────────
    /// Pointer moved to an absolute screen position.
    PointerMotion { position: Point },
    PointerButton { button: MouseButton, pressed: bool },
    /// Wheel steps, positive is away from the user.
    PointerAxis { delta: i32 },
    Key { key: Key, pressed: bool },

    // ── Client requests ──────────────────────────────────────────────
    CreateWindow {
        id: WindowId,
        client: Option<ClientId>,
        params: WindowParams,
    },
    DestroyWindow { id: WindowId },
    /// Every window of the client goes away.
    ClientDisconnected { client: ClientId },
    SetWindowRect { id: WindowId, rect: Rect },
    SetWindowTitle { id: WindowId, title: String },
    SetWindowIcon { id: WindowId, icon: Option<Bitmap> },
    SetWindowOpacity { id: WindowId, opacity: f32 },
    SetWindowHasAlphaChannel { id: WindowId, has_alpha_channel: bool },
    SetWindowVisible { id: WindowId, visible: bool },
    SetWindowMinimized { id: WindowId, minimized: bool },
    SetWindowMaximized { id: WindowId, maximized: bool },
    SetWindowFullscreen { id: WindowId, fullscreen: bool },
    SetWindowFrameless { id: WindowId, frameless: bool },
    SetWindowResizeConstraints {
        id: WindowId,
        base_size: Size,
        size_increment: Size,
        aspect_ratio: Option<Size>,
    },
    SetGlobalCursorTracking { id: WindowId, enabled: bool },
    SetBackingStore {
        id: WindowId,
        serial: i32,
        bitmap: Bitmap,
    },
    /// The client wants a Paint message for these window-relative rects.
    InvalidateRect { id: WindowId, rects: Vec<Rect> },
    /// The client finished painting these window-relative rects.
    DidFinishPainting { id: WindowId, rects: Vec<Rect> },
    MoveWindowToFront { id: WindowId },
    SetActiveWindow { id: WindowId },
    StartWindowResize { id: WindowId },
    StartDrag {
        client: ClientId,
        text: String,
        data_type: String,
        bitmap: Option<Bitmap>,
    },
    SetWmEventMask { id: WindowId, mask: WmEventMask },
}

/// Actions the core asks the backend to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreAction {
    /// Deliver an event to the client owning `window`.
    Post {
        client: ClientId,
        window: WindowId,
        event: ClientEvent,
    },
    /// Deliver a window-manager notification to a listener window.
    WmEvent {
        client: ClientId,
        listener: WindowId,
        event: WmEvent,
    },
    /// Raise or lower the scheduling priority of a client.
    SetClientBoost { client: ClientId, boosted: bool },
    DragAccepted { client: ClientId },
    DragCancelled { client: ClientId },
    DragDropped {
        client: ClientId,
        window: WindowId,
        position: Point,
        text: String,
        data_type: String,
    },
    /// These screen rects now show new pixels.
    ScreenFlushed { rects: Vec<Rect> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_keys() {
        assert_eq!(Key::Logo.modifier(), Some(Modifiers::LOGO));
        assert_eq!(Key::Character('a').modifier(), None);
    }

    #[test]
    fn test_client_event_from_mouse() {
        let event = MouseEvent {
            kind: MouseEventKind::Up,
            position: Point::new(3, 4),
            button: Some(MouseButton::Left),
            buttons: MouseButtons::empty(),
            modifiers: Modifiers::empty(),
            wheel_delta: 0,
        };
        assert!(event.is_button(MouseEventKind::Up, MouseButton::Left));
        assert_eq!(
            ClientEvent::from_mouse(event.translated(-3, -4)),
            ClientEvent::MouseUp(MouseEvent {
                position: Point::new(0, 0),
                ..event
            })
        );
    }
}
