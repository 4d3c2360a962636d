//! Configuration
//!
//! TOML file with one table per concern. Every table is `#[serde(default)]`
//! so a partial file only overrides what it names. Values are read once at
//! startup or reload and cached by the window manager and compositor.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::bitmap::Color;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub screen: ScreenConfig,
    pub input: InputConfig,
    pub background: BackgroundConfig,
    pub theme: ThemeConfig,
    pub compositor: CompositorConfig,
}

impl Config {
    /// Load configuration from `path`, or from the first standard location
    /// that exists. Missing files fall back to defaults.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let config_path = path.map(PathBuf::from).or_else(Self::find_config_file);

        match config_path {
            Some(path) if path.exists() => {
                info!("Loading configuration from {:?}", path);
                let config = Self::load_from(&path)?;
                config.validate()?;
                Ok(config)
            }
            Some(path) => {
                warn!("Config file not found at {:?}, using defaults", path);
                Ok(Self::default())
            }
            None => {
                info!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            dirs::config_dir().map(|p| p.join("vitrine/config.toml")),
            dirs::home_dir().map(|p| p.join(".config/vitrine/config.toml")),
            Some(PathBuf::from("/etc/vitrine/config.toml")),
        ];

        candidates.into_iter().flatten().find(|p| p.exists())
    }

    /// Generate default configuration as a string
    pub fn default_config_string() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config)
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }

    /// Reject values the window server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.screen.width <= 0 || self.screen.height <= 0 {
            return Err(ConfigError::Invalid(format!(
                "screen size {}x{} must be positive",
                self.screen.width, self.screen.height
            )));
        }
        if !(1..=240).contains(&self.compositor.frame_rate) {
            return Err(ConfigError::Invalid(format!(
                "frame_rate {} must be between 1 and 240",
                self.compositor.frame_rate
            )));
        }
        if self.theme.title_height <= 0 || self.theme.border_thickness < 0 {
            return Err(ConfigError::Invalid(
                "title_height must be positive and border_thickness non-negative".into(),
            ));
        }
        if self.input.double_click_distance < 0 {
            return Err(ConfigError::Invalid(
                "double_click_distance must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub width: i32,
    pub height: i32,
    /// Use two framebuffer pages and flip instead of copying.
    pub double_buffered: bool,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            double_buffered: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub double_click_speed_ms: u64,
    /// Maximum pointer travel in pixels between the two clicks.
    pub double_click_distance: i32,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            double_click_speed_ms: 250,
            double_click_distance: 4,
        }
    }
}

/// How the wallpaper image is laid out on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WallpaperMode {
    #[default]
    Simple,
    Tile,
    Center,
    Stretch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    pub color: Color,
    pub mode: WallpaperMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallpaper: Option<PathBuf>,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            color: Color::from_rgb(0x50, 0x50, 0x50),
            mode: WallpaperMode::Simple,
            wallpaper: None,
        }
    }
}

/// Decoration metrics and palette.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    pub title_height: i32,
    pub title_button_width: i32,
    pub title_button_height: i32,
    pub border_thickness: i32,
    pub menubar_height: i32,

    pub active_title: Color,
    pub inactive_title: Color,
    pub moving_title: Color,
    pub active_title_text: Color,
    pub inactive_title_text: Color,
    pub window: Color,
    pub window_text: Color,
    pub border: Color,
    pub highlight: Color,
    pub selection: Color,
    pub selection_text: Color,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            title_height: 19,
            title_button_width: 15,
            title_button_height: 15,
            border_thickness: 4,
            menubar_height: 19,
            active_title: Color::from_rgb(0x00, 0x00, 0x80),
            inactive_title: Color::from_rgb(0x80, 0x80, 0x80),
            moving_title: Color::from_rgb(0xa0, 0x50, 0x00),
            active_title_text: Color::WHITE,
            inactive_title_text: Color::from_rgb(0xd4, 0xd0, 0xc8),
            window: Color::from_rgb(0xd4, 0xd0, 0xc8),
            window_text: Color::BLACK,
            border: Color::from_rgb(0xc0, 0xc0, 0xc0),
            highlight: Color::from_rgb(0x84, 0x35, 0x1a),
            selection: Color::from_rgb(0x84, 0x35, 0x1a),
            selection_text: Color::WHITE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Upper bound on composed frames per second.
    pub frame_rate: u32,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self { frame_rate: 60 }
    }
}
