//! Vitrine Core - Protocol-agnostic compositing window server
//!
//! This crate contains the window server logic (window stack, window
//! manager, decorations, occlusion, damage tracking and compositing) with
//! no dependency on a display device or client transport.
//!
//! Backends translate hardware input and client requests into
//! [`CoreEvent`]s, feed them to [`Server`], apply the returned
//! [`CoreAction`]s, and call [`Server::tick`] whenever
//! [`Server::next_compose_due`] has passed.
//!
//! # Quick Start
//! ```
//! use std::time::Instant;
//!
//! use vitrine_core::config::Config;
//! use vitrine_core::geometry::{Point, Rect};
//! use vitrine_core::window::{ClientId, WindowParams};
//! use vitrine_core::{CoreAction, CoreEvent, Server};
//!
//! let mut server = Server::new(Config::default()).unwrap();
//!
//! // A client asks for a window
//! let id = server.next_window_id();
//! let actions = server.handle_event(CoreEvent::CreateWindow {
//!     id,
//!     client: Some(ClientId(1)),
//!     params: WindowParams {
//!         rect: Rect::new(100, 100, 320, 240),
//!         title: "Terminal".into(),
//!         ..WindowParams::default()
//!     },
//! });
//! assert!(!actions.is_empty());
//!
//! // The pointer moves, then the backend lets the compositor run
//! server.handle_event(CoreEvent::PointerMotion { position: Point::new(200, 200) });
//! let actions = server.tick(Instant::now());
//! assert!(actions
//!     .iter()
//!     .any(|a| matches!(a, CoreAction::ScreenFlushed { .. })));
//! ```

pub mod bitmap;
pub mod compositor;
pub mod config;
pub mod damage;
pub mod double_click;
pub mod event;
pub mod frame;
pub mod geometry;
pub mod invariants;
pub mod manager;
pub mod region;
pub mod scheduler;
pub mod screen;
pub mod stack;
pub mod window;

// Re-export primary API types at crate root
pub use bitmap::{Bitmap, BitmapError, Color};
pub use compositor::Compositor;
pub use event::{CoreAction, CoreEvent};
pub use geometry::{Point, Rect, Size};
pub use manager::WindowManager;
pub use screen::Screen;
pub use window::{ClientId, WindowId};

use std::time::Instant;

use tracing::{debug, info, trace, warn};

use config::Config;
use event::{MouseButton, MouseEvent, MouseEventKind};

/// The window server: screen, window manager and compositor.
///
/// Owns all server state. Backends drive it via
/// [`handle_event`](Server::handle_event) and [`tick`](Server::tick), then
/// apply the returned [`CoreAction`]s.
#[derive(Debug)]
pub struct Server {
    config: Config,
    screen: Screen,
    wm: WindowManager,
    compositor: Compositor,
    /// Monotonic window ID counter
    next_wid: u64,
}

impl Server {
    /// Create a server with a screen of the configured size.
    pub fn new(config: Config) -> Result<Self, BitmapError> {
        let size = Size::new(config.screen.width, config.screen.height);
        let screen = Screen::new(size, config.screen.double_buffered)?;
        let mut wm = WindowManager::new(&config, screen.rect());
        let compositor = Compositor::new(&config, &screen)?;
        wm.damage_mut().invalidate_screen(screen.rect());
        info!(
            "Server started at {} ({})",
            size,
            if screen.can_set_buffer() { "double buffered" } else { "single buffered" }
        );
        Ok(Self {
            config,
            screen,
            wm,
            compositor,
            next_wid: 1,
        })
    }

    /// Generate a fresh, unique `WindowId`.
    pub fn next_window_id(&mut self) -> WindowId {
        let id = WindowId(self.next_wid);
        self.next_wid += 1;
        id
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    pub const fn screen(&self) -> &Screen {
        &self.screen
    }

    pub const fn window_manager(&self) -> &WindowManager {
        &self.wm
    }

    pub fn window_manager_mut(&mut self) -> &mut WindowManager {
        &mut self.wm
    }

    pub const fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn compositor_mut(&mut self) -> &mut Compositor {
        &mut self.compositor
    }

    /// When the backend should call [`tick`](Self::tick) next.
    pub fn next_compose_due(&self) -> Option<Instant> {
        self.wm.damage().scheduler().next_due()
    }

    // ── Event handling (backend → core) ──────────────────────────────

    /// Process a backend event. Returns actions the backend must apply.
    pub fn handle_event(&mut self, event: CoreEvent) -> Vec<CoreAction> {
        self.handle_event_at(event, Instant::now())
    }

    /// [`handle_event`](Self::handle_event) with an explicit timestamp, used
    /// for double clicks and compose scheduling.
    pub fn handle_event_at(&mut self, event: CoreEvent, now: Instant) -> Vec<CoreAction> {
        self.wm.damage_mut().set_now(now);
        trace!("Handling {:?}", event);

        match event {
            CoreEvent::PointerMotion { position } => {
                let position = self.screen.on_mouse_move(position);
                self.wm.damage_mut().invalidate_cursor();
                self.dispatch_mouse(MouseEventKind::Move, position, None, 0);
            }
            CoreEvent::PointerButton { button, pressed } => {
                let mut buttons = self.screen.buttons();
                buttons.set(button.flag(), pressed);
                self.screen.set_buttons(buttons);
                let kind = if pressed { MouseEventKind::Down } else { MouseEventKind::Up };
                self.dispatch_mouse(kind, self.screen.cursor_location(), Some(button), 0);
            }
            CoreEvent::PointerAxis { delta } => {
                if delta != 0 {
                    self.dispatch_mouse(MouseEventKind::Wheel, self.screen.cursor_location(), None, delta);
                }
            }
            CoreEvent::Key { key, pressed } => self.wm.process_key_event(key, pressed),

            CoreEvent::CreateWindow { id, client, params } => {
                self.next_wid = self.next_wid.max(id.0 + 1);
                self.wm.create_window(id, client, params);
            }
            CoreEvent::DestroyWindow { id } => self.wm.destroy_window(id),
            CoreEvent::ClientDisconnected { client } => self.wm.destroy_client_windows(client),
            CoreEvent::SetWindowRect { id, rect } => self.wm.request_window_rect(id, rect),
            CoreEvent::SetWindowTitle { id, title } => self.wm.set_window_title(id, title),
            CoreEvent::SetWindowIcon { id, icon } => self.wm.set_window_icon(id, icon),
            CoreEvent::SetWindowOpacity { id, opacity } => self.wm.set_window_opacity(id, opacity),
            CoreEvent::SetWindowHasAlphaChannel { id, has_alpha_channel } => {
                self.wm.set_window_has_alpha_channel(id, has_alpha_channel);
            }
            CoreEvent::SetWindowVisible { id, visible } => self.wm.set_window_visible(id, visible),
            CoreEvent::SetWindowMinimized { id, minimized } => {
                self.wm.set_minimized(id, minimized);
            }
            CoreEvent::SetWindowMaximized { id, maximized } => {
                self.wm.set_maximized(id, maximized, None);
            }
            CoreEvent::SetWindowFullscreen { id, fullscreen } => {
                self.wm.set_fullscreen(id, fullscreen);
            }
            CoreEvent::SetWindowFrameless { id, frameless } => {
                self.wm.set_window_frameless(id, frameless);
            }
            CoreEvent::SetWindowResizeConstraints {
                id,
                base_size,
                size_increment,
                aspect_ratio,
            } => self
                .wm
                .set_window_resize_constraints(id, base_size, size_increment, aspect_ratio),
            CoreEvent::SetGlobalCursorTracking { id, enabled } => {
                self.wm.set_global_cursor_tracking(id, enabled);
            }
            CoreEvent::SetBackingStore { id, serial, bitmap } => {
                self.wm.set_backing_store(id, serial, bitmap);
            }
            CoreEvent::InvalidateRect { id, rects } => self.wm.request_update(id, &rects),
            CoreEvent::DidFinishPainting { id, rects } => self.wm.did_finish_painting(id, &rects),
            CoreEvent::MoveWindowToFront { id } => self.wm.request_move_to_front(id),
            CoreEvent::SetActiveWindow { id } => self.wm.request_set_active_window(id),
            CoreEvent::StartWindowResize { id } => {
                let position = self.screen.cursor_location();
                self.wm.start_window_resize(id, position, MouseButton::Left);
            }
            CoreEvent::StartDrag {
                client,
                text,
                data_type,
                bitmap,
            } => self.wm.start_drag(client, text, data_type, bitmap),
            CoreEvent::SetWmEventMask { id, mask } => self.wm.set_wm_event_mask(id, mask),
        }

        self.wm.flush_pending_paints();
        let actions = self.wm.take_actions();

        #[cfg(debug_assertions)]
        self.debug_validate("handle_event");

        actions
    }

    fn dispatch_mouse(
        &mut self,
        kind: MouseEventKind,
        position: Point,
        button: Option<MouseButton>,
        wheel_delta: i32,
    ) {
        let event = MouseEvent {
            kind,
            position,
            button,
            buttons: self.screen.buttons(),
            modifiers: self.wm.modifiers(),
            wheel_delta,
        };
        self.wm.process_mouse_event(&event);
    }

    // ── Compositing ──────────────────────────────────────────────────

    /// Run a compose pass if one is due at `now`.
    pub fn tick(&mut self, now: Instant) -> Vec<CoreAction> {
        self.wm.damage_mut().set_now(now);
        if let Some(priority) = self.wm.damage_mut().scheduler_mut().take_due(now) {
            trace!("Compose timer fired ({:?})", priority);
            self.compose_pass();
        }
        self.wm.take_actions()
    }

    /// Compose right away, ignoring the frame timer.
    pub fn compose(&mut self) -> Vec<CoreAction> {
        self.compose_pass();
        self.wm.take_actions()
    }

    fn compose_pass(&mut self) {
        self.compositor.compose(&mut self.wm, &mut self.screen);

        #[cfg(debug_assertions)]
        self.debug_validate("compose");
    }

    #[cfg(debug_assertions)]
    fn debug_validate(&self, after: &str) {
        if let Err(e) = invariants::validate(&self.wm, self.compositor.opaque_wallpaper()) {
            warn!("Invariant violation after {}: {}", after, e);
        }
    }

    // ── Configuration ────────────────────────────────────────────────

    /// Apply a new configuration. The screen size is only changed through
    /// [`set_resolution`](Self::set_resolution).
    pub fn reload_config(&mut self, config: Config) -> Vec<CoreAction> {
        self.wm.reload_config(&config);
        self.compositor.reload_config(&config);
        self.wm.damage_mut().invalidate_screen(self.screen.rect());
        self.config = config;
        info!("Configuration reloaded");
        self.wm.take_actions()
    }

    /// Change the screen size. Maximized, tiled and fullscreen windows
    /// follow the new size.
    pub fn set_resolution(&mut self, width: i32, height: i32) -> Result<Vec<CoreAction>, BitmapError> {
        self.screen.set_resolution(width, height)?;
        self.compositor.set_resolution(&self.screen)?;
        self.wm.set_resolution(self.screen.rect());
        self.config.screen.width = width;
        self.config.screen.height = height;
        self.wm.flush_pending_paints();
        Ok(self.wm.take_actions())
    }

    /// Replace the wallpaper image. `None` leaves only the background color.
    pub fn set_wallpaper(&mut self, image: Option<Bitmap>) {
        debug!(
            "Wallpaper {}",
            image
                .as_ref()
                .map_or_else(|| "cleared".to_owned(), |b| format!("set to {}", b.size()))
        );
        self.compositor.set_wallpaper_image(image);
        self.wm.damage_mut().invalidate_screen(self.screen.rect());
    }
}
