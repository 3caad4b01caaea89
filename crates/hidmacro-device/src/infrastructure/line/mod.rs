//! Command line transports.
//!
//! [`serial::SerialLineTransport`] talks to the real serial gadget;
//! [`scripted::ScriptedLineTransport`] replays canned lines for tests.
//! [`tty::set_raw_mode`] strips the kernel line discipline off the real port.

pub mod scripted;
pub mod serial;
pub mod tty;
