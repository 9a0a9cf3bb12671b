//! winhot: global hotkey macro engine
//!
//! Intercepts keystrokes system-wide, matches held key combinations against
//! a table of macros and replays scripted key presses, text and waits in
//! their place.

pub mod config;
pub mod events;
pub mod executor;
pub mod hotkey;
pub mod input;
pub mod ipc;
pub mod lifecycle;
pub mod macros;
pub mod state;
