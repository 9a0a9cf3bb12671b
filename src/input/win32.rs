//! Win32 keyboard backend: `GetAsyncKeyState` polling and `SendInput` injection

use std::mem;

use tracing::warn;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetAsyncKeyState, SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP, KEYEVENTF_UNICODE, VIRTUAL_KEY,
};

use super::{InputSender, KeyStateOracle, SYNTHETIC_TAG};
use crate::hotkey::KeyCode;

/// Real keyboard on the interactive desktop
#[derive(Debug, Default)]
pub struct WindowsKeyboard;

impl WindowsKeyboard {
    pub fn new() -> Self {
        Self
    }
}

impl KeyStateOracle for WindowsKeyboard {
    fn is_down(&self, key: KeyCode) -> bool {
        // High bit set means the key is down right now
        let state = unsafe { GetAsyncKeyState(key.0 as i32) };
        (state as u16 & 0x8000) != 0
    }
}

impl InputSender for WindowsKeyboard {
    fn key_down(&self, key: KeyCode) {
        send(&[virtual_key(key, KEYBD_EVENT_FLAGS(0))]);
    }

    fn key_up(&self, key: KeyCode) {
        send(&[virtual_key(key, KEYEVENTF_KEYUP)]);
    }

    fn type_char(&self, ch: char) {
        let mut units = [0u16; 2];
        for unit in ch.encode_utf16(&mut units) {
            send(&[
                unicode_unit(*unit, KEYEVENTF_UNICODE),
                unicode_unit(*unit, KEYEVENTF_UNICODE | KEYEVENTF_KEYUP),
            ]);
        }
    }
}

fn virtual_key(key: KeyCode, mut flags: KEYBD_EVENT_FLAGS) -> INPUT {
    if key.is_extended() {
        flags |= KEYEVENTF_EXTENDEDKEY;
    }
    keyboard_input(VIRTUAL_KEY(key.0), 0, flags)
}

fn unicode_unit(unit: u16, flags: KEYBD_EVENT_FLAGS) -> INPUT {
    keyboard_input(VIRTUAL_KEY(0), unit, flags)
}

fn keyboard_input(vk: VIRTUAL_KEY, scan: u16, flags: KEYBD_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                wScan: scan,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: SYNTHETIC_TAG,
            },
        },
    }
}

fn send(inputs: &[INPUT]) {
    let sent = unsafe { SendInput(inputs, mem::size_of::<INPUT>() as i32) };
    if sent as usize != inputs.len() {
        warn!(sent, expected = inputs.len(), "SendInput dropped events");
    }
}
