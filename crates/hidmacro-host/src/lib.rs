//! hidmacro-host library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the host side do? (for beginners)
//!
//! The host is the desktop machine the operator sits at.  It:
//!
//! 1. Records clicks into timed actions ([`application::record_clicks`]).
//! 2. Keeps a *library* of named macros in a JSON file
//!    ([`infrastructure::macro_file`]).
//! 3. Talks to the device over the serial line, one command and one reply
//!    at a time ([`infrastructure::link`]): uploading macros, starting and
//!    stopping playback, and sending one-shot moves and clicks.
//!
//! The host never shares memory with the device; everything it knows about
//! the device's state comes back in reply lines.

/// Application layer: click recording.
pub mod application;

/// Infrastructure layer: the serial device link and the macro library file.
pub mod infrastructure;
