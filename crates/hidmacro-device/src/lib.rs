//! hidmacro-device library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the device do? (for beginners)
//!
//! The device is a small Linux board (or any machine with a USB gadget port)
//! plugged into the computer that should be automated.  It exposes two USB
//! functions to that computer:
//!
//! - a **serial port** (`/dev/ttyGS0` on the device side) over which the host
//!   tooling sends text commands such as `MACRO_DATA:...` and `PLAY:demo`, and
//! - an **absolute mouse** (`/dev/hidg0` on the device side) through which the
//!   device moves the pointer and clicks.
//!
//! The runtime:
//!
//! 1. Loads its TOML configuration (screen size, device node paths, timing).
//! 2. Opens the HID node and checks it accepts a report.
//! 3. Runs a single cooperative loop that serves one command line at a time
//!    and advances macro playback between commands, so `STOP` always gets
//!    through even while a looping macro is running.

/// Application layer: command dispatch and the cooperative scheduler.
pub mod application;

/// Infrastructure layer: serial line, HID gadget node, and configuration file.
pub mod infrastructure;
