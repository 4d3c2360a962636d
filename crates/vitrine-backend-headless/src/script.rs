//! Input scripts.
//!
//! A script is a JSON-lines file: one command object per line, tagged by
//! `cmd`. Blank lines and lines starting with `#` are skipped.
//!
//! ```text
//! {"cmd": "create", "id": 1, "client": 1, "x": 100, "y": 100, "width": 320, "height": 240, "color": "#3060a0"}
//! {"cmd": "click", "x": 150, "y": 150}
//! {"cmd": "wait", "ms": 50}
//! {"cmd": "screenshot", "path": "frame.png"}
//! ```

use std::io::BufRead;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use vitrine_core::bitmap::Color;
use vitrine_core::event::{Key, MouseButton};
use vitrine_core::geometry::{Point, Rect};
use vitrine_core::window::{ClientId, WindowFlags, WindowId, WindowParams, WindowType};

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read script: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },
    #[error("line {line}: unknown key '{key}'")]
    UnknownKey { line: usize, key: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptButton {
    Left,
    Right,
    Middle,
    Back,
    Forward,
}

impl From<ScriptButton> for MouseButton {
    fn from(button: ScriptButton) -> Self {
        match button {
            ScriptButton::Left => Self::Left,
            ScriptButton::Right => Self::Right,
            ScriptButton::Middle => Self::Middle,
            ScriptButton::Back => Self::Back,
            ScriptButton::Forward => Self::Forward,
        }
    }
}

fn default_button() -> ScriptButton {
    ScriptButton::Left
}

fn default_true() -> bool {
    true
}

/// A window created by a script, backed by a simulated client that paints
/// it in a solid color.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateWindow {
    pub id: u64,
    pub client: u32,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "type")]
    pub window_type: WindowType,
    #[serde(default)]
    pub parent: Option<u64>,
    #[serde(default)]
    pub color: Option<Color>,
    #[serde(default)]
    pub opacity: Option<f32>,
    #[serde(default)]
    pub frameless: bool,
    #[serde(default)]
    pub modal: bool,
    #[serde(default = "default_true")]
    pub resizable: bool,
    #[serde(default)]
    pub fullscreen: bool,
}

impl CreateWindow {
    pub fn params(&self) -> WindowParams {
        let mut flags = WindowFlags::VISIBLE | WindowFlags::MINIMIZABLE;
        flags.set(WindowFlags::RESIZABLE, self.resizable);
        flags.set(WindowFlags::FRAMELESS, self.frameless);
        flags.set(WindowFlags::MODAL, self.modal);
        flags.set(WindowFlags::FULLSCREEN, self.fullscreen);
        WindowParams {
            window_type: self.window_type,
            rect: Rect::new(self.x, self.y, self.width, self.height),
            title: self.title.clone(),
            flags,
            parent: self.parent.map(WindowId),
            opacity: self.opacity.unwrap_or(1.0),
            ..WindowParams::default()
        }
    }
}

/// One line of a script, as written.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum RawCommand {
    Create(CreateWindow),
    Destroy { id: u64 },
    Disconnect { client: u32 },
    SetRect { id: u64, x: i32, y: i32, width: i32, height: i32 },
    Title { id: u64, title: String },
    Opacity { id: u64, opacity: f32 },
    Visible { id: u64, visible: bool },
    Minimize { id: u64, #[serde(default = "default_true")] minimized: bool },
    Maximize { id: u64, #[serde(default = "default_true")] maximized: bool },
    Fullscreen { id: u64, #[serde(default = "default_true")] fullscreen: bool },
    Activate { id: u64 },
    Raise { id: u64 },
    Pointer { x: i32, y: i32 },
    Button {
        #[serde(default = "default_button")]
        button: ScriptButton,
        pressed: bool,
    },
    Click {
        x: i32,
        y: i32,
        #[serde(default = "default_button")]
        button: ScriptButton,
    },
    Wheel { delta: i32 },
    Key { key: String, pressed: bool },
    Tap { key: String },
    Wallpaper { path: Option<PathBuf> },
    Resolution { width: i32, height: i32 },
    Wait { ms: u64 },
    Screenshot { path: PathBuf },
    Quit,
}

/// A parsed script command.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptCommand {
    Create(CreateWindow),
    Destroy(WindowId),
    Disconnect(ClientId),
    SetRect(WindowId, Rect),
    Title(WindowId, String),
    Opacity(WindowId, f32),
    Visible(WindowId, bool),
    Minimize(WindowId, bool),
    Maximize(WindowId, bool),
    Fullscreen(WindowId, bool),
    Activate(WindowId),
    Raise(WindowId),
    Pointer(Point),
    Button(MouseButton, bool),
    Click(Point, MouseButton),
    Wheel(i32),
    Key(Key, bool),
    /// Press and release.
    Tap(Key),
    Wallpaper(Option<PathBuf>),
    Resolution(i32, i32),
    Wait(std::time::Duration),
    Screenshot(PathBuf),
    Quit,
}

/// Key names: `escape`, `tab`, `enter`, `backspace`, arrows, modifiers,
/// any single character, or a decimal key code.
pub fn parse_key(name: &str) -> Option<Key> {
    let key = match name.to_ascii_lowercase().as_str() {
        "escape" | "esc" => Key::Escape,
        "tab" => Key::Tab,
        "enter" | "return" => Key::Enter,
        "backspace" => Key::Backspace,
        "left" => Key::Left,
        "right" => Key::Right,
        "up" => Key::Up,
        "down" => Key::Down,
        "shift" => Key::Shift,
        "ctrl" | "control" => Key::Control,
        "alt" => Key::Alt,
        "logo" | "super" | "mod4" => Key::Logo,
        _ => {
            let mut chars = name.chars();
            return match (chars.next(), chars.next()) {
                (Some(c), None) => Some(Key::Character(c)),
                _ => name.parse().ok().map(Key::Other),
            };
        }
    };
    Some(key)
}

impl ScriptCommand {
    fn from_raw(raw: RawCommand, line: usize) -> Result<Self, ScriptError> {
        let key = |name: String| {
            parse_key(&name).ok_or(ScriptError::UnknownKey { line, key: name })
        };
        Ok(match raw {
            RawCommand::Create(create) => Self::Create(create),
            RawCommand::Destroy { id } => Self::Destroy(WindowId(id)),
            RawCommand::Disconnect { client } => Self::Disconnect(ClientId(client)),
            RawCommand::SetRect { id, x, y, width, height } => {
                Self::SetRect(WindowId(id), Rect::new(x, y, width, height))
            }
            RawCommand::Title { id, title } => Self::Title(WindowId(id), title),
            RawCommand::Opacity { id, opacity } => Self::Opacity(WindowId(id), opacity),
            RawCommand::Visible { id, visible } => Self::Visible(WindowId(id), visible),
            RawCommand::Minimize { id, minimized } => Self::Minimize(WindowId(id), minimized),
            RawCommand::Maximize { id, maximized } => Self::Maximize(WindowId(id), maximized),
            RawCommand::Fullscreen { id, fullscreen } => Self::Fullscreen(WindowId(id), fullscreen),
            RawCommand::Activate { id } => Self::Activate(WindowId(id)),
            RawCommand::Raise { id } => Self::Raise(WindowId(id)),
            RawCommand::Pointer { x, y } => Self::Pointer(Point::new(x, y)),
            RawCommand::Button { button, pressed } => Self::Button(button.into(), pressed),
            RawCommand::Click { x, y, button } => Self::Click(Point::new(x, y), button.into()),
            RawCommand::Wheel { delta } => Self::Wheel(delta),
            RawCommand::Key { key: name, pressed } => Self::Key(key(name)?, pressed),
            RawCommand::Tap { key: name } => Self::Tap(key(name)?),
            RawCommand::Wallpaper { path } => Self::Wallpaper(path),
            RawCommand::Resolution { width, height } => Self::Resolution(width, height),
            RawCommand::Wait { ms } => Self::Wait(std::time::Duration::from_millis(ms)),
            RawCommand::Screenshot { path } => Self::Screenshot(path),
            RawCommand::Quit => Self::Quit,
        })
    }
}

/// Parse a whole script.
pub fn parse_script(reader: impl BufRead) -> Result<Vec<ScriptCommand>, ScriptError> {
    let mut commands = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let raw: RawCommand = serde_json::from_str(trimmed).map_err(|source| ScriptError::Parse {
            line: line_number,
            source,
        })?;
        commands.push(ScriptCommand::from_raw(raw, line_number)?);
    }
    Ok(commands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_script_skips_comments() {
        let script = r##"
# open a terminal
{"cmd": "create", "id": 1, "client": 7, "x": 10, "y": 20, "width": 300, "height": 200, "title": "Terminal", "color": "#3060a0"}

{"cmd": "click", "x": 15, "y": 25}
{"cmd": "tap", "key": "escape"}
{"cmd": "wait", "ms": 16}
{"cmd": "quit"}
"##;
        let commands = parse_script(script.as_bytes()).unwrap();
        assert_eq!(commands.len(), 5);
        let ScriptCommand::Create(create) = &commands[0] else {
            panic!("expected create, got {:?}", commands[0]);
        };
        assert_eq!(create.client, 7);
        assert_eq!(create.color, Some(Color::from_rgb(0x30, 0x60, 0xa0)));
        let params = create.params();
        assert_eq!(params.rect, Rect::new(10, 20, 300, 200));
        assert!(params.flags.contains(WindowFlags::RESIZABLE));
        assert_eq!(params.window_type, WindowType::Normal);
        assert_eq!(
            commands[1],
            ScriptCommand::Click(Point::new(15, 25), MouseButton::Left)
        );
        assert_eq!(commands[2], ScriptCommand::Tap(Key::Escape));
        assert_eq!(commands[4], ScriptCommand::Quit);
    }

    #[test]
    fn test_parse_error_reports_line() {
        let script = "{\"cmd\": \"quit\"}\n{\"cmd\": \"teleport\"}\n";
        let err = parse_script(script.as_bytes()).unwrap_err();
        assert!(matches!(err, ScriptError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let script = r#"{"cmd": "key", "key": "hyper", "pressed": true}"#;
        let err = parse_script(script.as_bytes()).unwrap_err();
        assert!(matches!(err, ScriptError::UnknownKey { line: 1, .. }));
    }

    #[test]
    fn test_key_names() {
        assert_eq!(parse_key("Logo"), Some(Key::Logo));
        assert_eq!(parse_key("x"), Some(Key::Character('x')));
        assert_eq!(parse_key("65"), Some(Key::Other(65)));
        assert_eq!(parse_key(""), None);
    }
}
