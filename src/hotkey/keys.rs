//! Key code definitions and modifier classification
//!
//! Key codes are Windows virtual-key codes. Modifiers come in a generic
//! form (`CONTROL`) and two side-specific forms (`LCONTROL`/`RCONTROL`);
//! the generic and side-specific forms are interchangeable for matching.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A logical keyboard key, identified by its virtual-key code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyCode(pub u16);

impl KeyCode {
    /// Placeholder for tokens that did not name a key
    pub const NULL: KeyCode = KeyCode(0);

    pub const BACK: KeyCode = KeyCode(0x08);
    pub const TAB: KeyCode = KeyCode(0x09);
    pub const RETURN: KeyCode = KeyCode(0x0D);
    pub const SHIFT: KeyCode = KeyCode(0x10);
    pub const CONTROL: KeyCode = KeyCode(0x11);
    pub const MENU: KeyCode = KeyCode(0x12);
    pub const PAUSE: KeyCode = KeyCode(0x13);
    pub const CAPITAL: KeyCode = KeyCode(0x14);
    pub const KANJI: KeyCode = KeyCode(0x19);
    pub const ESCAPE: KeyCode = KeyCode(0x1B);
    pub const CONVERT: KeyCode = KeyCode(0x1C);
    pub const NONCONVERT: KeyCode = KeyCode(0x1D);
    pub const SPACE: KeyCode = KeyCode(0x20);
    pub const PRIOR: KeyCode = KeyCode(0x21);
    pub const NEXT: KeyCode = KeyCode(0x22);
    pub const END: KeyCode = KeyCode(0x23);
    pub const HOME: KeyCode = KeyCode(0x24);
    pub const LEFT: KeyCode = KeyCode(0x25);
    pub const UP: KeyCode = KeyCode(0x26);
    pub const RIGHT: KeyCode = KeyCode(0x27);
    pub const DOWN: KeyCode = KeyCode(0x28);
    pub const SNAPSHOT: KeyCode = KeyCode(0x2C);
    pub const INSERT: KeyCode = KeyCode(0x2D);
    pub const DELETE: KeyCode = KeyCode(0x2E);
    pub const LWIN: KeyCode = KeyCode(0x5B);
    pub const RWIN: KeyCode = KeyCode(0x5C);
    pub const APPS: KeyCode = KeyCode(0x5D);
    pub const F1: KeyCode = KeyCode(0x70);
    pub const F2: KeyCode = KeyCode(0x71);
    pub const F3: KeyCode = KeyCode(0x72);
    pub const F4: KeyCode = KeyCode(0x73);
    pub const F5: KeyCode = KeyCode(0x74);
    pub const F6: KeyCode = KeyCode(0x75);
    pub const F7: KeyCode = KeyCode(0x76);
    pub const F8: KeyCode = KeyCode(0x77);
    pub const F9: KeyCode = KeyCode(0x78);
    pub const F10: KeyCode = KeyCode(0x79);
    pub const F11: KeyCode = KeyCode(0x7A);
    pub const F12: KeyCode = KeyCode(0x7B);
    pub const F24: KeyCode = KeyCode(0x87);
    pub const NUMLOCK: KeyCode = KeyCode(0x90);
    pub const SCROLL: KeyCode = KeyCode(0x91);
    pub const LSHIFT: KeyCode = KeyCode(0xA0);
    pub const RSHIFT: KeyCode = KeyCode(0xA1);
    pub const LCONTROL: KeyCode = KeyCode(0xA2);
    pub const RCONTROL: KeyCode = KeyCode(0xA3);
    pub const LMENU: KeyCode = KeyCode(0xA4);
    pub const RMENU: KeyCode = KeyCode(0xA5);
    pub const KANA: KeyCode = KeyCode(0xF2);

    /// Key code for an ASCII letter or digit (letters are case-folded)
    pub const fn from_ascii(c: char) -> Option<KeyCode> {
        match c {
            'A'..='Z' | '0'..='9' => Some(KeyCode(c as u16)),
            'a'..='z' => Some(KeyCode(c.to_ascii_uppercase() as u16)),
            _ => None,
        }
    }

    /// Function key `F<n>` for `n` in 1..=24
    pub const fn function(n: u16) -> Option<KeyCode> {
        if n >= 1 && n <= 24 {
            Some(KeyCode(Self::F1.0 + n - 1))
        } else {
            None
        }
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// The modifier class this key belongs to, in generic or side-specific form
    pub const fn modifier_class(self) -> Option<ModifierClass> {
        match self {
            Self::CONTROL | Self::LCONTROL | Self::RCONTROL => Some(ModifierClass::Control),
            Self::SHIFT | Self::LSHIFT | Self::RSHIFT => Some(ModifierClass::Shift),
            Self::MENU | Self::LMENU | Self::RMENU => Some(ModifierClass::Alt),
            _ => None,
        }
    }

    /// True for the side-agnostic modifier codes (`SHIFT`, `CONTROL`, `MENU`)
    pub const fn is_generic_modifier(self) -> bool {
        matches!(self, Self::SHIFT | Self::CONTROL | Self::MENU)
    }

    /// Two keys are trigger-equivalent when identical or in the same modifier class
    pub fn is_trigger_equivalent(self, other: KeyCode) -> bool {
        if self == other {
            return true;
        }
        match (self.modifier_class(), other.modifier_class()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Keys that need `KEYEVENTF_EXTENDEDKEY` when injected
    pub const fn is_extended(self) -> bool {
        matches!(
            self,
            Self::RCONTROL
                | Self::RMENU
                | Self::RSHIFT
                | Self::UP
                | Self::DOWN
                | Self::LEFT
                | Self::RIGHT
                | Self::INSERT
                | Self::DELETE
                | Self::HOME
                | Self::END
                | Self::PRIOR
                | Self::NEXT
        )
    }

    /// Parse a hotkey token: `0x`-prefixed hex, a single letter or digit,
    /// or a name from the key table. Unknown tokens yield [`KeyCode::NULL`].
    pub fn parse_token(token: &str) -> KeyCode {
        let token = token.trim();
        if token.is_empty() {
            return KeyCode::NULL;
        }

        if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
            return u16::from_str_radix(hex, 16).map(KeyCode).unwrap_or(KeyCode::NULL);
        }

        let mut chars = token.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return KeyCode::from_ascii(c).unwrap_or(KeyCode::NULL);
        }

        let name = token.strip_prefix("VK_").unwrap_or(token);
        if let Some(n) = name
            .strip_prefix(['F', 'f'])
            .and_then(|rest| rest.parse::<u16>().ok())
            .and_then(KeyCode::function)
        {
            return n;
        }

        KEY_NAMES
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
            .map(|(_, code)| *code)
            .unwrap_or(KeyCode::NULL)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(c) = char::from_u32(self.0 as u32).filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
            return write!(f, "{}", c);
        }
        if (Self::F1.0..=Self::F24.0).contains(&self.0) {
            return write!(f, "F{}", self.0 - Self::F1.0 + 1);
        }
        match KEY_NAMES.iter().find(|(_, code)| code == self) {
            Some((name, _)) => write!(f, "{}", name),
            None => write!(f, "0x{:02X}", self.0),
        }
    }
}

/// Key name table. The first entry for a code is its display name;
/// later entries are accepted aliases.
const KEY_NAMES: &[(&str, KeyCode)] = &[
    ("Ctrl", KeyCode::CONTROL),
    ("Control", KeyCode::CONTROL),
    ("Shift", KeyCode::SHIFT),
    ("Alt", KeyCode::MENU),
    ("Menu", KeyCode::MENU),
    ("LCtrl", KeyCode::LCONTROL),
    ("LControl", KeyCode::LCONTROL),
    ("RCtrl", KeyCode::RCONTROL),
    ("RControl", KeyCode::RCONTROL),
    ("LShift", KeyCode::LSHIFT),
    ("RShift", KeyCode::RSHIFT),
    ("LAlt", KeyCode::LMENU),
    ("LMenu", KeyCode::LMENU),
    ("RAlt", KeyCode::RMENU),
    ("RMenu", KeyCode::RMENU),
    ("LWin", KeyCode::LWIN),
    ("RWin", KeyCode::RWIN),
    ("Apps", KeyCode::APPS),
    ("Enter", KeyCode::RETURN),
    ("Return", KeyCode::RETURN),
    ("Esc", KeyCode::ESCAPE),
    ("Escape", KeyCode::ESCAPE),
    ("Tab", KeyCode::TAB),
    ("Space", KeyCode::SPACE),
    ("BackSpace", KeyCode::BACK),
    ("Bksp", KeyCode::BACK),
    ("Back", KeyCode::BACK),
    ("Delete", KeyCode::DELETE),
    ("Del", KeyCode::DELETE),
    ("Insert", KeyCode::INSERT),
    ("Ins", KeyCode::INSERT),
    ("Home", KeyCode::HOME),
    ("End", KeyCode::END),
    ("PageUp", KeyCode::PRIOR),
    ("Prior", KeyCode::PRIOR),
    ("PageDown", KeyCode::NEXT),
    ("Next", KeyCode::NEXT),
    ("Up", KeyCode::UP),
    ("Down", KeyCode::DOWN),
    ("Left", KeyCode::LEFT),
    ("Right", KeyCode::RIGHT),
    ("Pause", KeyCode::PAUSE),
    ("CapsLock", KeyCode::CAPITAL),
    ("Capital", KeyCode::CAPITAL),
    ("NumLock", KeyCode::NUMLOCK),
    ("ScrollLock", KeyCode::SCROLL),
    ("Scroll", KeyCode::SCROLL),
    ("PrintScreen", KeyCode::SNAPSHOT),
    ("Snapshot", KeyCode::SNAPSHOT),
    ("Convert", KeyCode::CONVERT),
    ("NonConvert", KeyCode::NONCONVERT),
    ("Kana", KeyCode::KANA),
    ("Kanji", KeyCode::KANJI),
];

/// Modifier key family, independent of keyboard side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierClass {
    Control,
    Shift,
    Alt,
}

impl ModifierClass {
    pub const fn generic(self) -> KeyCode {
        match self {
            Self::Control => KeyCode::CONTROL,
            Self::Shift => KeyCode::SHIFT,
            Self::Alt => KeyCode::MENU,
        }
    }

    /// Left and right side-specific codes
    pub const fn sides(self) -> [KeyCode; 2] {
        match self {
            Self::Control => [KeyCode::LCONTROL, KeyCode::RCONTROL],
            Self::Shift => [KeyCode::LSHIFT, KeyCode::RSHIFT],
            Self::Alt => [KeyCode::LMENU, KeyCode::RMENU],
        }
    }
}

/// Reserved key: alone it terminates the process, with Control it toggles the engine
pub const CONTROL_KEY: KeyCode = KeyCode::F12;

/// Modifiers force-released before playback, in release order
pub const RELEASE_CHECK_LIST: [KeyCode; 9] = [
    KeyCode::LSHIFT,
    KeyCode::RSHIFT,
    KeyCode::SHIFT,
    KeyCode::LCONTROL,
    KeyCode::RCONTROL,
    KeyCode::CONTROL,
    KeyCode::LMENU,
    KeyCode::RMENU,
    KeyCode::MENU,
];
