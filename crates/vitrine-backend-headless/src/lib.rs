//! Vitrine Headless Backend - Adapter between a calloop event loop and
//! vitrine-core.
//!
//! This crate:
//! - Owns the event loop, the compose timer and the wallpaper loader.
//! - Replays input scripts as `CoreEvent`s and feeds them to the `Server`.
//! - Applies returned `CoreAction`s, standing in for clients: script
//!   windows are painted in a solid color whenever the core asks.
//! - Dumps the framebuffer to PNG.
//!
//! **No display device or client transport is involved.**

pub mod screenshot;
pub mod script;
pub mod wallpaper;

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use calloop::channel::{Channel, Event as ChannelEvent, Sender};
use calloop::EventLoop;
use tracing::{debug, info, trace, warn};

use vitrine_core::bitmap::{Bitmap, Color};
use vitrine_core::config::Config;
use vitrine_core::event::{ClientEvent, CoreAction, CoreEvent};
use vitrine_core::geometry::{Point, Rect, Size};
use vitrine_core::window::{BackingStore, ClientId, Window, WindowId};
use vitrine_core::Server;

use script::ScriptCommand;
use wallpaper::WallpaperLoaded;

/// Longest the loop sleeps while only waiting for a wallpaper.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// The backend adapter.
///
/// Owns the server and everything a real backend would put around it.
pub struct HeadlessBackend {
    /// The window server.
    pub server: Server,
    /// Script windows and the color their simulated client paints.
    painters: HashMap<WindowId, Color>,
    next_serial: i32,
    /// Client messages in delivery order.
    mailboxes: HashMap<ClientId, Vec<(WindowId, ClientEvent)>>,
    boosted: HashSet<ClientId>,
    flushed_frames: u64,
    /// Set while [`run`](Self::run) owns an event loop.
    wallpaper_sender: Option<Sender<WallpaperLoaded>>,
    pending_wallpapers: usize,
    quit: bool,
}

impl HeadlessBackend {
    pub fn new(config: Config) -> Result<Self> {
        let server = Server::new(config).context("failed to allocate the screen")?;
        Ok(Self {
            server,
            painters: HashMap::new(),
            next_serial: 0,
            mailboxes: HashMap::new(),
            boosted: HashSet::new(),
            flushed_frames: 0,
            wallpaper_sender: None,
            pending_wallpapers: 0,
            quit: false,
        })
    }

    /// Messages delivered to `client` so far.
    pub fn mailbox(&self, client: ClientId) -> &[(WindowId, ClientEvent)] {
        self.mailboxes.get(&client).map_or(&[], Vec::as_slice)
    }

    pub fn is_boosted(&self, client: ClientId) -> bool {
        self.boosted.contains(&client)
    }

    /// Number of `ScreenFlushed` actions seen.
    pub const fn flushed_frames(&self) -> u64 {
        self.flushed_frames
    }

    // ── Core plumbing ────────────────────────────────────────────────

    /// Feed one event to the server and apply everything that follows.
    pub fn process(&mut self, event: CoreEvent) {
        let actions = self.server.handle_event(event);
        self.apply_actions(actions);
    }

    /// Apply core actions. Replies from simulated clients are fed back to
    /// the server until nothing is left.
    pub fn apply_actions(&mut self, actions: Vec<CoreAction>) {
        let mut queue: VecDeque<CoreAction> = actions.into();
        while let Some(action) = queue.pop_front() {
            for reply in self.apply_action(action) {
                queue.extend(self.server.handle_event(reply));
            }
        }
    }

    fn apply_action(&mut self, action: CoreAction) -> Vec<CoreEvent> {
        match action {
            CoreAction::Post {
                client,
                window,
                event,
            } => {
                trace!("Post to {} ({}): {:?}", client, window, event);
                let replies = self.simulate_client(window, &event);
                self.mailboxes.entry(client).or_default().push((window, event));
                replies
            }
            CoreAction::WmEvent {
                client,
                listener,
                event,
            } => {
                trace!("WM event for {} ({}): {:?}", client, listener, event);
                Vec::new()
            }
            CoreAction::SetClientBoost { client, boosted } => {
                debug!("Client {} boost: {}", client, boosted);
                if boosted {
                    self.boosted.insert(client);
                } else {
                    self.boosted.remove(&client);
                }
                Vec::new()
            }
            CoreAction::DragAccepted { client } => {
                debug!("Drag from {} accepted", client);
                Vec::new()
            }
            CoreAction::DragCancelled { client } => {
                debug!("Drag from {} cancelled", client);
                Vec::new()
            }
            CoreAction::DragDropped {
                client,
                window,
                position,
                text,
                data_type,
            } => {
                info!(
                    "Drop from {} on {} at {}: {:?} ({})",
                    client, window, position, text, data_type
                );
                Vec::new()
            }
            CoreAction::ScreenFlushed { rects } => {
                self.flushed_frames += 1;
                trace!("Flushed {} rects", rects.len());
                Vec::new()
            }
        }
    }

    /// What a well-behaved client would answer.
    fn simulate_client(&mut self, window: WindowId, event: &ClientEvent) -> Vec<CoreEvent> {
        let Some(&color) = self.painters.get(&window) else {
            return Vec::new();
        };
        match event {
            ClientEvent::Paint { size, rects } => self.paint(window, *size, rects.clone(), color),
            ClientEvent::Resized { rect } => {
                let full = Rect::from_location_and_size(Point::default(), rect.size());
                self.paint(window, rect.size(), vec![full], color)
            }
            ClientEvent::CloseRequest => {
                self.painters.remove(&window);
                vec![CoreEvent::DestroyWindow { id: window }]
            }
            _ => Vec::new(),
        }
    }

    fn paint(&mut self, window: WindowId, size: Size, rects: Vec<Rect>, color: Color) -> Vec<CoreEvent> {
        let current = self
            .server
            .window_manager()
            .window(window)
            .and_then(Window::backing_store)
            .map(BackingStore::size);
        let mut replies = Vec::new();
        if current != Some(size) {
            self.next_serial += 1;
            replies.push(CoreEvent::SetBackingStore {
                id: window,
                serial: self.next_serial,
                bitmap: Bitmap::filled(size, color),
            });
        }
        replies.push(CoreEvent::DidFinishPainting { id: window, rects });
        replies
    }

    // ── Script commands ──────────────────────────────────────────────

    /// Run one script command. `Wait` is only meaningful inside
    /// [`run`](Self::run) and is ignored here.
    pub fn execute(&mut self, command: ScriptCommand) -> Result<()> {
        let events = match command {
            ScriptCommand::Create(create) => {
                let id = WindowId(create.id);
                if let Some(color) = create.color {
                    self.painters.insert(id, color);
                }
                vec![CoreEvent::CreateWindow {
                    id,
                    client: Some(ClientId(create.client)),
                    params: create.params(),
                }]
            }
            ScriptCommand::Destroy(id) => {
                self.painters.remove(&id);
                vec![CoreEvent::DestroyWindow { id }]
            }
            ScriptCommand::Disconnect(client) => vec![CoreEvent::ClientDisconnected { client }],
            ScriptCommand::SetRect(id, rect) => vec![CoreEvent::SetWindowRect { id, rect }],
            ScriptCommand::Title(id, title) => vec![CoreEvent::SetWindowTitle { id, title }],
            ScriptCommand::Opacity(id, opacity) => vec![CoreEvent::SetWindowOpacity { id, opacity }],
            ScriptCommand::Visible(id, visible) => vec![CoreEvent::SetWindowVisible { id, visible }],
            ScriptCommand::Minimize(id, minimized) => {
                vec![CoreEvent::SetWindowMinimized { id, minimized }]
            }
            ScriptCommand::Maximize(id, maximized) => {
                vec![CoreEvent::SetWindowMaximized { id, maximized }]
            }
            ScriptCommand::Fullscreen(id, fullscreen) => {
                vec![CoreEvent::SetWindowFullscreen { id, fullscreen }]
            }
            ScriptCommand::Activate(id) => vec![CoreEvent::SetActiveWindow { id }],
            ScriptCommand::Raise(id) => vec![CoreEvent::MoveWindowToFront { id }],
            ScriptCommand::Pointer(position) => vec![CoreEvent::PointerMotion { position }],
            ScriptCommand::Button(button, pressed) => {
                vec![CoreEvent::PointerButton { button, pressed }]
            }
            ScriptCommand::Click(position, button) => vec![
                CoreEvent::PointerMotion { position },
                CoreEvent::PointerButton {
                    button,
                    pressed: true,
                },
                CoreEvent::PointerButton {
                    button,
                    pressed: false,
                },
            ],
            ScriptCommand::Wheel(delta) => vec![CoreEvent::PointerAxis { delta }],
            ScriptCommand::Key(key, pressed) => vec![CoreEvent::Key { key, pressed }],
            ScriptCommand::Tap(key) => vec![
                CoreEvent::Key { key, pressed: true },
                CoreEvent::Key {
                    key,
                    pressed: false,
                },
            ],
            ScriptCommand::Wallpaper(path) => {
                self.load_wallpaper(path);
                Vec::new()
            }
            ScriptCommand::Resolution(width, height) => {
                let actions = self.server.set_resolution(width, height)?;
                self.apply_actions(actions);
                Vec::new()
            }
            ScriptCommand::Screenshot(path) => {
                self.screenshot(&path)?;
                Vec::new()
            }
            ScriptCommand::Wait(_) => Vec::new(),
            ScriptCommand::Quit => {
                self.quit = true;
                Vec::new()
            }
        };
        for event in events {
            self.process(event);
        }
        Ok(())
    }

    /// Compose whatever is pending and write the front buffer to `path`.
    pub fn screenshot(&mut self, path: &Path) -> Result<()> {
        let actions = self.server.compose();
        self.apply_actions(actions);
        screenshot::save_png(self.server.screen().front(), path)
            .with_context(|| format!("failed to save screenshot to {}", path.display()))
    }

    // ── Wallpaper ────────────────────────────────────────────────────

    /// Load in the background when an event loop is running, else inline.
    fn load_wallpaper(&mut self, path: Option<PathBuf>) {
        let Some(path) = path else {
            self.server.set_wallpaper(None);
            return;
        };
        if let Some(sender) = &self.wallpaper_sender {
            wallpaper::spawn_loader(path, sender.clone());
            self.pending_wallpapers += 1;
        } else {
            self.on_wallpaper_loaded(WallpaperLoaded {
                result: wallpaper::decode(&path),
                path,
            });
        }
    }

    fn on_wallpaper_loaded(&mut self, loaded: WallpaperLoaded) {
        match loaded.result {
            Ok(bitmap) => {
                info!("Wallpaper {:?} loaded ({})", loaded.path, bitmap.size());
                self.server.set_wallpaper(Some(bitmap));
            }
            Err(e) => warn!("Keeping the old wallpaper: {}", e),
        }
    }

    // ── Event loop ───────────────────────────────────────────────────

    /// Replay `script` on a calloop event loop, composing on the server's
    /// schedule. Returns once the script is done and the screen is idle,
    /// after `quit`, or after `max_frames` composed frames.
    pub fn run(&mut self, script: Vec<ScriptCommand>, max_frames: Option<u64>) -> Result<()> {
        info!("Starting Vitrine (headless backend), {} script commands", script.len());
        let mut event_loop: EventLoop<'_, Self> =
            EventLoop::try_new().context("failed to create event loop")?;
        let (sender, channel): (Sender<WallpaperLoaded>, Channel<WallpaperLoaded>) =
            calloop::channel::channel();
        event_loop
            .handle()
            .insert_source(channel, |event, _, backend: &mut Self| {
                if let ChannelEvent::Msg(loaded) = event {
                    backend.pending_wallpapers = backend.pending_wallpapers.saturating_sub(1);
                    backend.on_wallpaper_loaded(loaded);
                }
            })
            .map_err(|e| e.error)
            .context("failed to register the wallpaper channel")?;
        self.wallpaper_sender = Some(sender);
        self.quit = false;

        let configured = self.server.config().background.wallpaper.clone();
        if configured.is_some() {
            self.load_wallpaper(configured);
        }

        let result = self.run_loop(&mut event_loop, script, max_frames);
        self.wallpaper_sender = None;
        let stats = self.server.compositor().stats();
        info!(
            "Headless run finished: {} frames composed, {} skipped, peak {:?}",
            stats.frames_composed, stats.frames_skipped, stats.peak_compose_time
        );
        result
    }

    fn run_loop(
        &mut self,
        event_loop: &mut EventLoop<'_, Self>,
        script: Vec<ScriptCommand>,
        max_frames: Option<u64>,
    ) -> Result<()> {
        let mut commands = script.into_iter();
        let mut resume_at: Option<Instant> = None;
        loop {
            let now = Instant::now();
            if resume_at.is_some_and(|at| at <= now) {
                resume_at = None;
            }
            let mut script_done = false;
            while resume_at.is_none() && !self.quit {
                match commands.next() {
                    Some(ScriptCommand::Wait(duration)) => resume_at = Some(now + duration),
                    Some(command) => self.execute(command)?,
                    None => {
                        script_done = true;
                        break;
                    }
                }
            }

            let actions = self.server.tick(Instant::now());
            self.apply_actions(actions);

            let frames = self.server.compositor().stats().frames_composed;
            if max_frames.is_some_and(|max| frames >= max) {
                debug!("Frame limit reached after {} frames", frames);
                return Ok(());
            }
            if self.quit {
                let actions = self.server.compose();
                self.apply_actions(actions);
                return Ok(());
            }
            let idle = self.pending_wallpapers == 0 && self.server.next_compose_due().is_none();
            if script_done && idle {
                return Ok(());
            }

            let now = Instant::now();
            let timeout = [self.server.next_compose_due(), resume_at]
                .into_iter()
                .flatten()
                .min()
                .map_or(IDLE_POLL, |at| at.saturating_duration_since(now));
            event_loop
                .dispatch(Some(timeout), self)
                .context("event loop dispatch failed")?;
        }
    }
}

/// Load a script file and run it.
pub fn run_script_file(
    config: Config,
    path: Option<&Path>,
    max_frames: Option<u64>,
) -> Result<HeadlessBackend> {
    let commands = match path {
        Some(path) => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("failed to open script {}", path.display()))?;
            script::parse_script(std::io::BufReader::new(file))?
        }
        None => Vec::new(),
    };
    let mut backend = HeadlessBackend::new(config)?;
    backend.run(commands, max_frames)?;
    Ok(backend)
}
