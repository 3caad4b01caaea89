//! Line-oriented command protocol between host and device.
//!
//! Every frame is one UTF-8 line terminated by `\n`.  The host sends a
//! [`command::Command`], the device answers with exactly one
//! [`command::Reply`], and only then may the host send the next command.

pub mod command;

pub use command::{parse_command, parse_reply, Command, ProtocolError, Reply, MAX_LINE_LEN};
