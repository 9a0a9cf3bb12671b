//! `WH_KEYBOARD_LL` hook on a dedicated message-loop thread

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use tracing::{error, info, warn};
use windows::core::PCWSTR;
use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, MessageBoxW, PeekMessageW, PostThreadMessageW,
    SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, HHOOK, KBDLLHOOKSTRUCT,
    LLKHF_INJECTED, MB_ICONERROR, MB_OK, MSG, PM_NOREMOVE, WH_KEYBOARD_LL, WM_KEYDOWN, WM_QUIT,
    WM_SYSKEYDOWN, WM_USER,
};

use super::transition_from_raw;
use crate::hotkey::listener::{Disposition, HotkeyListener, ListenerError};

/// Listener the hook procedure forwards to. The procedure has no user
/// pointer, so it has to be global.
static ACTIVE: RwLock<Option<Arc<HotkeyListener>>> = RwLock::new(None);

/// Keeps the hook installed until dropped
pub struct HookHandle {
    thread_id: u32,
    thread: Option<JoinHandle<()>>,
}

impl Drop for HookHandle {
    fn drop(&mut self) {
        // Ends the message loop; the hook thread unhooks on its way out
        if let Err(e) = unsafe { PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) } {
            warn!(?e, "failed to stop keyboard hook thread");
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("keyboard hook thread panicked");
            }
        }
        set_active(None);
    }
}

/// Unhooks when dropped
struct HookGuard {
    hook: HHOOK,
}

impl HookGuard {
    fn install() -> Result<Self, ListenerError> {
        let hook = unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_proc), None, 0) }
            .map_err(|e| ListenerError::HookInstall(e.to_string()))?;
        Ok(Self { hook })
    }
}

impl Drop for HookGuard {
    fn drop(&mut self) {
        if let Err(e) = unsafe { UnhookWindowsHookEx(self.hook) } {
            warn!(?e, "failed to remove keyboard hook");
        }
    }
}

pub(super) fn install(listener: Arc<HotkeyListener>) -> Result<HookHandle, ListenerError> {
    {
        let mut active = ACTIVE.write().unwrap_or_else(PoisonError::into_inner);
        if active.is_some() {
            return Err(ListenerError::AlreadyRunning);
        }
        *active = Some(listener);
    }

    let (ready_tx, ready_rx) = mpsc::channel();
    let thread = thread::Builder::new()
        .name("keyboard-hook".to_string())
        .spawn(move || run_hook_thread(ready_tx))
        .map_err(|e| {
            set_active(None);
            ListenerError::ThreadSpawn(e.to_string())
        })?;

    let outcome = ready_rx.recv().unwrap_or_else(|_| {
        Err(ListenerError::HookInstall(
            "hook thread exited during startup".to_string(),
        ))
    });

    match outcome {
        Ok(thread_id) => Ok(HookHandle {
            thread_id,
            thread: Some(thread),
        }),
        Err(e) => {
            let _ = thread.join();
            set_active(None);
            Err(e)
        }
    }
}

fn run_hook_thread(ready_tx: mpsc::Sender<Result<u32, ListenerError>>) {
    let mut msg = MSG::default();

    // Force creation of this thread's message queue so WM_QUIT can be posted
    // to it as soon as install() returns
    unsafe {
        let _ = PeekMessageW(&mut msg, None, WM_USER, WM_USER, PM_NOREMOVE);
    }

    let guard = match HookGuard::install() {
        Ok(guard) => guard,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    let thread_id = unsafe { GetCurrentThreadId() };
    let _ = ready_tx.send(Ok(thread_id));
    info!(thread_id, "keyboard hook installed");

    // 0 means WM_QUIT, -1 an error
    while unsafe { GetMessageW(&mut msg, None, 0, 0) }.0 > 0 {
        unsafe {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }

    drop(guard);
    info!("keyboard hook removed");
}

fn set_active(listener: Option<Arc<HotkeyListener>>) {
    *ACTIVE.write().unwrap_or_else(PoisonError::into_inner) = listener;
}

fn active_listener() -> Option<Arc<HotkeyListener>> {
    ACTIVE.read().unwrap_or_else(PoisonError::into_inner).clone()
}

unsafe extern "system" fn keyboard_proc(ncode: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    // A panic escaping here would take the hook down with it
    let result = catch_unwind(AssertUnwindSafe(|| {
        if ncode < 0 || lparam.0 == 0 {
            return Disposition::PassThrough;
        }
        let Some(listener) = active_listener() else {
            return Disposition::PassThrough;
        };

        let info = unsafe { &*(lparam.0 as *const KBDLLHOOKSTRUCT) };
        let message = wparam.0 as u32;
        let transition = transition_from_raw(
            info.vkCode,
            message == WM_KEYDOWN || message == WM_SYSKEYDOWN,
            (info.flags.0 & LLKHF_INJECTED.0) != 0,
            info.dwExtraInfo,
        );

        listener.handle(transition)
    }));

    match result {
        Ok(Disposition::Suppress) => LRESULT(1),
        Ok(Disposition::PassThrough) => unsafe { CallNextHookEx(None, ncode, wparam, lparam) },
        Err(_) => {
            error!("panic in keyboard hook, key passed through");
            unsafe { CallNextHookEx(None, ncode, wparam, lparam) }
        }
    }
}

pub(super) fn show_error(message: &str) {
    let title: Vec<u16> = "winhot".encode_utf16().chain(std::iter::once(0)).collect();
    let text: Vec<u16> = message.encode_utf16().chain(std::iter::once(0)).collect();

    unsafe {
        MessageBoxW(
            None,
            PCWSTR(text.as_ptr()),
            PCWSTR(title.as_ptr()),
            MB_OK | MB_ICONERROR,
        );
    }
}
