//! Vitrine - A small damage-driven compositing window server
//!
//! Stacks client windows, decorates them with classic frames and composes
//! only what changed into the framebuffer.
//!
//! # Features
//! - Band-ordered window stack (desktop, normal, menus, tooltips, ...)
//! - Occlusion tracking with per-window opaque and translucent regions
//! - Frame-rate throttled composition with single or double buffering
//! - Interactive move, resize, maximize and edge tiling
//! - Double-click synthesis and drag-and-drop routing
//! - TOML configuration with runtime reload
//! - Headless backend with scripted input and PNG frame dumps

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use vitrine_backend_headless::run_script_file;
use vitrine_core::config::Config;

/// Vitrine - A compositing window server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Run in debug mode with verbose logging
    #[arg(short, long)]
    debug: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,

    /// Print default configuration to stdout
    #[arg(long)]
    print_default_config: bool,

    /// Input script to replay (JSON lines)
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Write the final frame to this PNG file
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Stop after composing this many frames
    #[arg(long)]
    frames: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Vitrine v{} starting...", env!("CARGO_PKG_VERSION"));

    if args.print_default_config {
        println!("{}", Config::default_config_string());
        return Ok(());
    }

    if args.validate {
        Config::load(args.config.as_deref())?;
        info!("Configuration is valid");
        return Ok(());
    }

    let config = match Config::load(args.config.as_deref()) {
        Ok(cfg) => {
            info!("Configuration loaded successfully");
            cfg
        }
        Err(e) => {
            warn!("Failed to load config: {}, using defaults", e);
            Config::default()
        }
    };

    let mut backend = run_script_file(config, args.script.as_deref(), args.frames)?;

    if let Some(path) = args.screenshot {
        backend.screenshot(&path)?;
    }

    let wm = backend.server.window_manager();
    info!(
        "Vitrine exiting: {} windows, {} frames flushed",
        wm.stack().len(),
        backend.flushed_frames()
    );
    Ok(())
}
