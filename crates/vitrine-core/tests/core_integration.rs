//! Core-only integration tests.
//!
//! These tests drive vitrine-core through [`Server`] WITHOUT any backend.
//! Everything goes through `CoreEvent`s and the public accessors, the way a
//! backend would use the crate.

use std::time::{Duration, Instant};

use proptest::prelude::*;

use vitrine_core::bitmap::{Bitmap, Color};
use vitrine_core::config::Config;
use vitrine_core::event::{ClientEvent, CoreAction, CoreEvent, MouseButton};
use vitrine_core::geometry::{Point, Rect, Size};
use vitrine_core::invariants;
use vitrine_core::region::DisjointRects;
use vitrine_core::window::{ClientId, WindowFlags, WindowId, WindowParams};
use vitrine_core::Server;

/// Helper: a server with default config (1024×768, single buffered).
fn test_server() -> Server {
    Server::new(Config::default()).unwrap()
}

/// Helper: create a client window and return its ID.
fn create_window(server: &mut Server, rect: Rect) -> WindowId {
    create_window_with(server, WindowParams {
        rect,
        ..WindowParams::default()
    })
}

fn create_window_with(server: &mut Server, params: WindowParams) -> WindowId {
    let id = server.next_window_id();
    server.handle_event(CoreEvent::CreateWindow {
        id,
        client: Some(ClientId(id.0 as u32)),
        params,
    });
    id
}

fn click_at(server: &mut Server, position: Point, now: Instant) -> Vec<CoreAction> {
    let mut actions = server.handle_event_at(CoreEvent::PointerMotion { position }, now);
    for pressed in [true, false] {
        actions.extend(server.handle_event_at(
            CoreEvent::PointerButton {
                button: MouseButton::Left,
                pressed,
            },
            now,
        ));
    }
    actions
}

fn rect_of(server: &Server, id: WindowId) -> Rect {
    server.window_manager().window(id).unwrap().rect()
}

// ── Test 1: occlusion partitions the screen ──────────────────────

#[test]
fn opaque_regions_and_wallpaper_partition_the_screen() {
    let mut server = test_server();
    let b = create_window(&mut server, Rect::new(100, 100, 200, 200));
    let a = create_window(&mut server, Rect::new(0, 0, 200, 200));
    server.compose();

    let wm = server.window_manager();
    let screen = server.screen().rect();
    let frame_a = wm.frame_rect(a).unwrap().intersected(screen);
    let frame_b = wm.frame_rect(b).unwrap().intersected(screen);
    let opaque_a = wm.window(a).unwrap().opaque_rects();
    let opaque_b = wm.window(b).unwrap().opaque_rects();

    // A is on top and sees everything; B loses the part under A.
    assert_eq!(opaque_a.area(), frame_a.area());
    assert_eq!(
        opaque_b.area(),
        frame_b.area() - frame_b.intersected(frame_a).area()
    );
    assert!(!opaque_a.intersects(opaque_b));

    let wallpaper = server.compositor().opaque_wallpaper();
    assert_eq!(
        wallpaper.area() + opaque_a.area() + opaque_b.area(),
        screen.area()
    );
    invariants::validate(wm, wallpaper).unwrap();
}

// ── Test 2: set_window_rect damage ───────────────────────────────

#[test]
fn moving_a_window_damages_only_what_changed() {
    let mut server = test_server();
    let id = create_window_with(&mut server, WindowParams {
        rect: Rect::new(100, 100, 100, 100),
        flags: WindowFlags::VISIBLE | WindowFlags::FRAMELESS,
        ..WindowParams::default()
    });
    server.compose();

    server.handle_event(CoreEvent::SetWindowRect {
        id,
        rect: Rect::new(100, 100, 100, 100),
    });
    assert!(server.window_manager().damage().screen_rects().is_empty());

    server.handle_event(CoreEvent::SetWindowRect {
        id,
        rect: Rect::new(100, 150, 100, 100),
    });
    let damaged = server.window_manager().damage().screen_rects().clone();
    assert_eq!(damaged.area(), 2 * 100 * 50);
    assert!(!damaged.intersects_rect(Rect::new(100, 150, 100, 50)));
}

// ── Test 3: maximize round trip ──────────────────────────────────

#[test]
fn maximize_then_restore_returns_to_original_rect() {
    let mut server = test_server();
    let original = Rect::new(120, 130, 300, 200);
    let id = create_window(&mut server, original);

    let actions = server.handle_event(CoreEvent::SetWindowMaximized { id, maximized: true });
    assert!(
        actions.iter().any(|a| matches!(
            a,
            CoreAction::Post { event: ClientEvent::Resized { .. }, .. }
        )),
        "Expected a Resized message, got: {actions:?}"
    );
    assert_ne!(rect_of(&server, id), original);

    server.handle_event(CoreEvent::SetWindowMaximized { id, maximized: false });
    assert_eq!(rect_of(&server, id), original);
}

// ── Test 4: interactive resize ───────────────────────────────────

#[test]
fn resize_from_bottom_right_grows_by_drag_delta() {
    let mut server = test_server();
    let id = create_window(&mut server, Rect::new(100, 100, 300, 200));

    server.handle_event(CoreEvent::PointerMotion {
        position: Point::new(400, 300),
    });
    server.handle_event(CoreEvent::StartWindowResize { id });
    assert_eq!(server.window_manager().resize_window(), Some(id));

    server.handle_event(CoreEvent::PointerMotion {
        position: Point::new(450, 320),
    });
    assert_eq!(rect_of(&server, id), Rect::new(100, 100, 350, 220));

    server.handle_event(CoreEvent::PointerButton {
        button: MouseButton::Left,
        pressed: false,
    });
    assert_eq!(server.window_manager().resize_window(), None);
}

proptest! {
    #[test]
    fn resize_with_increments_snaps_to_multiples(x in 0i32..1024, y in 0i32..768) {
        let mut server = test_server();
        let id = create_window(&mut server, Rect::new(100, 100, 300, 200));
        server.handle_event(CoreEvent::SetWindowResizeConstraints {
            id,
            base_size: Size::default(),
            size_increment: Size::new(10, 10),
            aspect_ratio: None,
        });
        server.handle_event(CoreEvent::PointerMotion { position: Point::new(400, 300) });
        server.handle_event(CoreEvent::StartWindowResize { id });
        server.handle_event(CoreEvent::PointerMotion { position: Point::new(x, y) });

        let rect = rect_of(&server, id);
        prop_assert_eq!(rect.width % 10, 0);
        prop_assert_eq!(rect.height % 10, 0);
        prop_assert_eq!(rect.location(), Point::new(100, 100));
    }

    #[test]
    fn random_layouts_keep_regions_consistent(
        rects in prop::collection::vec((0i32..900, 0i32..700, 20i32..400, 20i32..300, any::<bool>()), 1..8)
    ) {
        let mut server = test_server();
        for (x, y, w, h, translucent) in rects {
            let id = create_window(&mut server, Rect::new(x, y, w, h));
            if translucent {
                server.handle_event(CoreEvent::SetWindowOpacity { id, opacity: 0.5 });
            }
        }
        server.compose();

        let wm = server.window_manager();
        let wallpaper = server.compositor().opaque_wallpaper();
        prop_assert!(invariants::validate(wm, wallpaper).is_ok());

        let mut opaque = DisjointRects::new();
        for window in wm.stack().visible_back_to_front() {
            prop_assert!(!window.opaque_rects().intersects(&opaque));
            opaque.add_set(window.opaque_rects());
        }
    }
}

// ── Test 5: clicking empty space ─────────────────────────────────

#[test]
fn clicking_outside_every_window_clears_active_window() {
    let mut server = test_server();
    let id = create_window(&mut server, Rect::new(100, 100, 200, 200));
    assert_eq!(server.window_manager().active_window(), Some(id));

    let actions = click_at(&mut server, Point::new(900, 700), Instant::now());
    assert_eq!(server.window_manager().active_window(), None);
    assert!(actions.contains(&CoreAction::Post {
        client: ClientId(id.0 as u32),
        window: id,
        event: ClientEvent::Deactivated,
    }));
}

// ── Test 6: double-click timing ──────────────────────────────────

#[test]
fn double_click_depends_on_timing() {
    let mut server = test_server();
    create_window(&mut server, Rect::new(100, 100, 300, 200));
    let at = Point::new(200, 200);
    let is_double = |actions: &[CoreAction]| {
        actions.iter().any(|a| matches!(
            a,
            CoreAction::Post { event: ClientEvent::MouseDoubleClick(_), .. }
        ))
    };

    let t0 = Instant::now();
    assert!(!is_double(&click_at(&mut server, at, t0)));
    assert!(is_double(&click_at(&mut server, at, t0 + Duration::from_millis(100))));

    let t1 = t0 + Duration::from_secs(5);
    assert!(!is_double(&click_at(&mut server, at, t1)));
    assert!(!is_double(&click_at(&mut server, at, t1 + Duration::from_millis(600))));
}

// ── Test 7: fullscreen ───────────────────────────────────────────

#[test]
fn fullscreen_window_owns_the_screen() {
    let mut server = test_server();
    let other = create_window(&mut server, Rect::new(50, 50, 200, 200));
    let full = create_window(&mut server, Rect::new(300, 300, 200, 200));
    server.handle_event(CoreEvent::SetWindowFullscreen {
        id: full,
        fullscreen: true,
    });
    server.compose();

    let wm = server.window_manager();
    assert_eq!(wm.active_fullscreen_window(), Some(full));
    assert_eq!(rect_of(&server, full), server.screen().rect());
    assert!(wm.window(other).unwrap().regions().is_empty());
    assert_eq!(
        wm.window(full).unwrap().opaque_rects().area(),
        server.screen().rect().area()
    );
    assert!(server.compositor().opaque_wallpaper().is_empty());

    // A second fullscreen window takes over; the first one gives it up.
    server.handle_event(CoreEvent::SetWindowFullscreen {
        id: other,
        fullscreen: true,
    });
    assert!(!server.window_manager().window(full).unwrap().is_fullscreen());
}

// ── Test 8: compose output ───────────────────────────────────────

#[test]
fn composed_frame_shows_backing_store_and_wallpaper() {
    let red = Color::from_rgb(0xff, 0, 0);
    let mut server = test_server();
    let id = create_window_with(&mut server, WindowParams {
        rect: Rect::new(10, 10, 40, 40),
        flags: WindowFlags::VISIBLE | WindowFlags::FRAMELESS,
        ..WindowParams::default()
    });
    server.handle_event(CoreEvent::SetBackingStore {
        id,
        serial: 1,
        bitmap: Bitmap::filled(Size::new(40, 40), red),
    });
    server.compose();

    let front = server.screen().front();
    assert_eq!(front.pixel(Point::new(20, 20)), Some(red));
    assert_eq!(
        front.pixel(Point::new(500, 20)),
        Some(server.config().background.color)
    );

    // Closing the window exposes the wallpaper again.
    server.handle_event(CoreEvent::DestroyWindow { id });
    server.compose();
    assert_eq!(
        server.screen().front().pixel(Point::new(20, 20)),
        Some(server.config().background.color)
    );
}

// ── Test 9: scheduling never drops invalidations ─────────────────

#[test]
fn invalidation_during_throttle_is_composed_on_next_frame() {
    let mut server = test_server();
    let t0 = Instant::now() + Duration::from_secs(1);
    // Initial frame, then the idle next-frame deadline.
    server.tick(t0);
    server.tick(t0);
    assert_eq!(server.next_compose_due(), None);

    let id = server.next_window_id();
    server.handle_event_at(
        CoreEvent::CreateWindow {
            id,
            client: Some(ClientId(1)),
            params: WindowParams {
                rect: Rect::new(50, 50, 320, 240),
                ..WindowParams::default()
            },
        },
        t0,
    );
    assert_eq!(server.next_compose_due(), Some(t0));
    server.tick(t0);
    let frames = server.compositor().stats().frames_composed;

    server.handle_event_at(
        CoreEvent::SetWindowTitle {
            id,
            title: "Busy".into(),
        },
        t0 + Duration::from_millis(1),
    );

    // Throttled until the frame interval has passed.
    let due = server.next_compose_due().unwrap();
    assert!(due > t0 + Duration::from_millis(1));
    assert!(server.tick(t0 + Duration::from_millis(2)).is_empty());
    let actions = server.tick(due);
    assert!(actions
        .iter()
        .any(|a| matches!(a, CoreAction::ScreenFlushed { .. })));
    assert_eq!(server.compositor().stats().frames_composed, frames + 1);
}

// ── Test 10: client disconnect ───────────────────────────────────

#[test]
fn disconnecting_client_removes_its_windows() {
    let mut server = test_server();
    let a = create_window(&mut server, Rect::new(10, 10, 100, 100));
    let b = create_window(&mut server, Rect::new(300, 10, 100, 100));
    let b_client = ClientId(b.0 as u32);

    server.handle_event(CoreEvent::ClientDisconnected { client: b_client });
    assert!(server.window_manager().window(b).is_none());
    assert_eq!(server.window_manager().active_window(), Some(a));
    server.compose();
    assert!(invariants::validate(
        server.window_manager(),
        server.compositor().opaque_wallpaper()
    )
    .is_ok());
}
