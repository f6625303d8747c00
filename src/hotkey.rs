//! Global quit hotkey
//!
//! Registers a system-wide shortcut that closes the running session. Only
//! built with the `desktop` feature.

use anyhow::{anyhow, Result};
use global_hotkey::{
    hotkey::{Code, HotKey, Modifiers},
    GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState,
};
use std::str::FromStr;
use tracing::info;

use crate::capture::CapturedFrame;
use crate::output::FrameSink;

/// Parses a hotkey string like "F9", "Ctrl+Shift+Q", "Alt+Esc" into a HotKey
pub fn parse_hotkey(hotkey_str: &str) -> Result<HotKey> {
    let mut modifiers = Modifiers::empty();
    let mut key_code: Option<Code> = None;

    for part in hotkey_str.split('+').map(str::trim) {
        match part.to_uppercase().as_str() {
            "CTRL" | "CONTROL" => modifiers |= Modifiers::CONTROL,
            "SHIFT" => modifiers |= Modifiers::SHIFT,
            "ALT" => modifiers |= Modifiers::ALT,
            "WIN" | "SUPER" | "META" => modifiers |= Modifiers::SUPER,
            _ => key_code = Some(parse_key_code(part)?),
        }
    }

    let code = key_code.ok_or_else(|| anyhow!("No key code found in hotkey string"))?;
    Ok(HotKey::new(Some(modifiers), code))
}

/// Single letters and digits are shorthand; anything else uses the W3C key
/// code name ("F9", "Escape", "PageUp")
fn parse_key_code(key: &str) -> Result<Code> {
    let mut chars = key.chars();
    let name = match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => format!("Key{}", c.to_ascii_uppercase()),
        (Some(c), None) if c.is_ascii_digit() => format!("Digit{}", c),
        _ => match key.to_uppercase().as_str() {
            "ESC" | "ESCAPE" => "Escape".to_string(),
            "DEL" => "Delete".to_string(),
            _ => key.to_string(),
        },
    };
    Code::from_str(&name).map_err(|_| anyhow!("Unknown key code: {}", key))
}

/// Registered quit shortcut; unregisters on drop
pub struct QuitHotkey {
    manager: GlobalHotKeyManager,
    hotkey: HotKey,
}

impl QuitHotkey {
    /// Register `hotkey_str` with the OS
    pub fn register(hotkey_str: &str) -> Result<Self> {
        let hotkey = parse_hotkey(hotkey_str)?;
        let manager = GlobalHotKeyManager::new()
            .map_err(|e| anyhow!("Failed to create hotkey manager: {:?}", e))?;
        manager
            .register(hotkey)
            .map_err(|e| anyhow!("Failed to register hotkey: {:?}", e))?;
        info!("Registered quit hotkey: {}", hotkey_str);
        Ok(Self { manager, hotkey })
    }

    /// Drain pending hotkey events. Returns true if the quit key was pressed.
    pub fn poll_events(&self) -> bool {
        let id = self.hotkey.id();
        let mut pressed = false;
        while let Ok(event) = GlobalHotKeyEvent::receiver().try_recv() {
            if is_quit_press(&event, id) {
                info!("Quit hotkey pressed");
                pressed = true;
            }
        }
        pressed
    }
}

impl Drop for QuitHotkey {
    fn drop(&mut self) {
        let _ = self.manager.unregister(self.hotkey);
    }
}

fn is_quit_press(event: &GlobalHotKeyEvent, id: u32) -> bool {
    event.id == id && event.state == HotKeyState::Pressed
}

/// Sink wrapper that asks the loop to close once the quit hotkey is pressed.
///
/// The hotkey is polled from `should_close`, so events are read on the
/// render thread once per iteration, the thread that registered them.
pub struct HotkeyQuitSink<S> {
    inner: S,
    hotkey: QuitHotkey,
    pressed: bool,
}

impl<S: FrameSink> HotkeyQuitSink<S> {
    pub fn new(inner: S, hotkey: QuitHotkey) -> Self {
        Self {
            inner,
            hotkey,
            pressed: false,
        }
    }
}

impl<S: FrameSink> FrameSink for HotkeyQuitSink<S> {
    fn show(&mut self, frame: &CapturedFrame) -> crate::error::Result<()> {
        self.inner.show(frame)
    }

    fn should_close(&mut self) -> bool {
        if !self.pressed && self.hotkey.poll_events() {
            self.pressed = true;
        }
        self.pressed || self.inner.should_close()
    }
}
