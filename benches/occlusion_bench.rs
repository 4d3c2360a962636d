//! Benchmarks for occlusion passes and composition
//!
//! These measure the per-frame cost of the compositor as the number of
//! stacked windows grows.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use vitrine_core::config::Config;
use vitrine_core::event::CoreEvent;
use vitrine_core::geometry::{Rect, Size};
use vitrine_core::screen::Screen;
use vitrine_core::window::{ClientId, WindowFlags, WindowId, WindowParams};
use vitrine_core::{Compositor, Server, WindowManager};

/// Cascaded windows, every third one translucent.
fn params(i: u64) -> WindowParams {
    let offset = (i % 20) as i32 * 30;
    WindowParams {
        rect: Rect::new(20 + offset, 40 + offset, 320, 240),
        title: format!("Window {i}"),
        flags: WindowFlags::VISIBLE | WindowFlags::RESIZABLE | WindowFlags::MINIMIZABLE,
        opacity: if i % 3 == 0 { 0.8 } else { 1.0 },
        ..WindowParams::default()
    }
}

fn server_with_windows(count: u64) -> Server {
    let mut server = match Server::new(Config::default()) {
        Ok(server) => server,
        Err(e) => panic!("failed to create server: {e}"),
    };
    for i in 0..count {
        let id = server.next_window_id();
        server.handle_event(CoreEvent::CreateWindow {
            id,
            client: Some(ClientId(i as u32 + 1)),
            params: params(i),
        });
    }
    server
}

fn occlusion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("occlusion");
    let config = Config::default();

    for count in [1, 5, 10, 20, 50] {
        group.bench_with_input(BenchmarkId::new("recompute", count), &count, |b, &n| {
            let screen = match Screen::new(Size::new(1024, 768), false) {
                Ok(screen) => screen,
                Err(e) => panic!("failed to create screen: {e}"),
            };
            let mut wm = WindowManager::new(&config, screen.rect());
            for i in 0..n {
                wm.create_window(WindowId(i + 1), Some(ClientId(i as u32 + 1)), params(i));
            }
            let mut compositor = match Compositor::new(&config, &screen) {
                Ok(compositor) => compositor,
                Err(e) => panic!("failed to create compositor: {e}"),
            };
            b.iter(|| {
                compositor.recompute_occlusions(&mut wm);
                black_box(compositor.opaque_wallpaper().area())
            });
        });
    }

    group.finish();
}

fn compose_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("compose");

    for count in [1, 10, 50] {
        group.bench_with_input(BenchmarkId::new("full_screen", count), &count, |b, &n| {
            let mut server = server_with_windows(n);
            let screen = server.screen().rect();
            b.iter(|| {
                server
                    .window_manager_mut()
                    .damage_mut()
                    .invalidate_screen(screen);
                black_box(server.compose())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, occlusion_benchmark, compose_benchmark);
criterion_main!(benches);
