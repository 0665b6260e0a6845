//! Clipboard and synthetic input seams, with arboard/enigo implementations.

use std::sync::Mutex;

use enigo::{
    Axis, Button, Coordinate, Direction, Enigo, Keyboard as EnigoKeyboard, Mouse as EnigoMouse,
    Settings,
};

use crate::error::{Error, Result};
use crate::keys::Key;

pub trait Clipboard: Send + Sync {
    /// Current text content; empty when the clipboard holds no text.
    fn read_text(&self) -> Result<String>;
    fn write_text(&self, text: &str) -> Result<()>;
}

pub trait Keyboard: Send + Sync {
    /// Presses `keys` in order and keeps them held.
    fn press(&self, keys: &[Key]) -> Result<()>;
    /// Releases `keys` in reverse order.
    fn release(&self, keys: &[Key]) -> Result<()>;
    /// Types text keystroke by keystroke.
    fn text(&self, text: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
}

pub trait Mouse: Send + Sync {
    fn move_to(&self, x: i32, y: i32) -> Result<()>;
    fn click(&self, button: MouseButton, count: u32) -> Result<()>;
    fn press(&self, button: MouseButton) -> Result<()>;
    fn release(&self, button: MouseButton) -> Result<()>;
    /// Positive scrolls down (vertical) or right (horizontal).
    fn scroll(&self, amount: i32, horizontal: bool) -> Result<()>;
}

pub struct SystemClipboard {
    inner: Mutex<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Result<Self> {
        let inner = arboard::Clipboard::new().map_err(|e| Error::Clipboard(e.to_string()))?;
        Ok(Self {
            inner: Mutex::new(inner),
        })
    }
}

impl Clipboard for SystemClipboard {
    fn read_text(&self) -> Result<String> {
        let mut clipboard = self
            .inner
            .lock()
            .map_err(|_| Error::Clipboard("clipboard lock poisoned".into()))?;
        match clipboard.get_text() {
            Ok(text) => Ok(text),
            Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
            Err(e) => Err(Error::Clipboard(e.to_string())),
        }
    }

    fn write_text(&self, text: &str) -> Result<()> {
        let mut clipboard = self
            .inner
            .lock()
            .map_err(|_| Error::Clipboard("clipboard lock poisoned".into()))?;
        clipboard
            .set_text(text)
            .map_err(|e| Error::Clipboard(e.to_string()))
    }
}

/// Keyboard and mouse injection through enigo.
pub struct NativeInput {
    enigo: Mutex<Enigo>,
}

impl NativeInput {
    pub fn new() -> Result<Self> {
        let enigo = Enigo::new(&Settings::default()).map_err(|e| Error::Input(e.to_string()))?;
        Ok(Self {
            enigo: Mutex::new(enigo),
        })
    }

    fn with<T>(&self, f: impl FnOnce(&mut Enigo) -> enigo::InputResult<T>) -> Result<T> {
        let mut enigo = self
            .enigo
            .lock()
            .map_err(|_| Error::Input("enigo lock poisoned".into()))?;
        f(&mut *enigo).map_err(|e| Error::Input(format!("{e:?}")))
    }
}

fn map_button(button: MouseButton) -> Button {
    match button {
        MouseButton::Left => Button::Left,
        MouseButton::Right => Button::Right,
    }
}

impl Keyboard for NativeInput {
    fn press(&self, keys: &[Key]) -> Result<()> {
        self.with(|enigo| {
            for key in keys {
                enigo.key(key.to_enigo(), Direction::Press)?;
            }
            Ok(())
        })
    }

    fn release(&self, keys: &[Key]) -> Result<()> {
        self.with(|enigo| {
            for key in keys.iter().rev() {
                enigo.key(key.to_enigo(), Direction::Release)?;
            }
            Ok(())
        })
    }

    fn text(&self, text: &str) -> Result<()> {
        self.with(|enigo| enigo.text(text))
    }
}

impl Mouse for NativeInput {
    fn move_to(&self, x: i32, y: i32) -> Result<()> {
        self.with(|enigo| enigo.move_mouse(x, y, Coordinate::Abs))
    }

    fn click(&self, button: MouseButton, count: u32) -> Result<()> {
        self.with(|enigo| {
            for _ in 0..count {
                enigo.button(map_button(button), Direction::Click)?;
            }
            Ok(())
        })
    }

    fn press(&self, button: MouseButton) -> Result<()> {
        self.with(|enigo| enigo.button(map_button(button), Direction::Press))
    }

    fn release(&self, button: MouseButton) -> Result<()> {
        self.with(|enigo| enigo.button(map_button(button), Direction::Release))
    }

    fn scroll(&self, amount: i32, horizontal: bool) -> Result<()> {
        let axis = if horizontal {
            Axis::Horizontal
        } else {
            Axis::Vertical
        };
        self.with(|enigo| enigo.scroll(amount, axis))
    }
}
