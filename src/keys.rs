//! Key names accepted by `hotkey(key='...')`.

use enigo::Key as EnigoKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Control,
    Shift,
    Alt,
    Meta,
    Return,
    Tab,
    Escape,
    Backspace,
    Delete,
    Space,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    F(u8),
    Char(char),
}

impl Key {
    pub fn parse(name: &str) -> Option<Key> {
        let lower = name.trim().to_lowercase();
        let key = match lower.as_str() {
            "ctrl" | "control" => Key::Control,
            "shift" => Key::Shift,
            "alt" | "option" => Key::Alt,
            "meta" | "cmd" | "command" | "super" | "win" | "windows" => Key::Meta,
            "enter" | "return" => Key::Return,
            "tab" => Key::Tab,
            "esc" | "escape" => Key::Escape,
            "backspace" => Key::Backspace,
            "delete" | "del" => Key::Delete,
            "space" => Key::Space,
            "home" => Key::Home,
            "end" => Key::End,
            "pageup" => Key::PageUp,
            "pagedown" => Key::PageDown,
            "up" | "arrowup" => Key::Up,
            "down" | "arrowdown" => Key::Down,
            "left" | "arrowleft" => Key::Left,
            "right" | "arrowright" => Key::Right,
            _ => {
                if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
                    if (1..=12).contains(&n) {
                        return Some(Key::F(n));
                    }
                }
                let mut chars = lower.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Char(c),
                    _ => return None,
                }
            }
        };
        Some(key)
    }

    /// Modifier used for clipboard paste on this platform.
    pub fn paste_modifier() -> Key {
        if cfg!(target_os = "macos") {
            Key::Meta
        } else {
            Key::Control
        }
    }

    pub(crate) fn to_enigo(self) -> EnigoKey {
        match self {
            Key::Control => EnigoKey::Control,
            Key::Shift => EnigoKey::Shift,
            Key::Alt => EnigoKey::Alt,
            Key::Meta => EnigoKey::Meta,
            Key::Return => EnigoKey::Return,
            Key::Tab => EnigoKey::Tab,
            Key::Escape => EnigoKey::Escape,
            Key::Backspace => EnigoKey::Backspace,
            Key::Delete => EnigoKey::Delete,
            Key::Space => EnigoKey::Space,
            Key::Home => EnigoKey::Home,
            Key::End => EnigoKey::End,
            Key::PageUp => EnigoKey::PageUp,
            Key::PageDown => EnigoKey::PageDown,
            Key::Up => EnigoKey::UpArrow,
            Key::Down => EnigoKey::DownArrow,
            Key::Left => EnigoKey::LeftArrow,
            Key::Right => EnigoKey::RightArrow,
            Key::F(n) => match n {
                1 => EnigoKey::F1,
                2 => EnigoKey::F2,
                3 => EnigoKey::F3,
                4 => EnigoKey::F4,
                5 => EnigoKey::F5,
                6 => EnigoKey::F6,
                7 => EnigoKey::F7,
                8 => EnigoKey::F8,
                9 => EnigoKey::F9,
                10 => EnigoKey::F10,
                11 => EnigoKey::F11,
                _ => EnigoKey::F12,
            },
            Key::Char(c) => EnigoKey::Unicode(c),
        }
    }
}

/// Splits a hotkey string such as `ctrl shift t` or `ctrl+c` into keys.
pub fn parse_chord(raw: &str) -> Result<Vec<Key>, String> {
    let parts: Vec<&str> = raw
        .split(|c: char| c.is_whitespace() || c == '+')
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        return Err("empty hotkey".to_string());
    }
    parts
        .into_iter()
        .map(|p| Key::parse(p).ok_or_else(|| format!("unsupported key `{p}`")))
        .collect()
}
