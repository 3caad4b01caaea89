//! Command and reply frames.
//!
//! # Wire grammar
//!
//! ```text
//! PING
//! MACRO_DATA:<name>:<json-array-of-actions>
//! PLAY:<name>[:LOOP]
//! STOP
//! LIST
//! MOVE:<x>:<y>
//! CLICK:<x>:<y>[:<button>]
//! ```
//!
//! Fields are colon-separated and keywords are matched exactly (upper case).
//! The `MACRO_DATA` payload is everything after the second colon, because JSON
//! itself contains colons.  The payload is carried verbatim; the device's
//! command handler validates it into [`Action`](crate::Action)s before it
//! touches the store, so a bad payload can never half-replace a macro.
//!
//! Replies are `PONG`, `OK`, `ERROR`, `UNKNOWN` and `MACROS:<a>,<b>,...`.

use std::fmt;

use thiserror::Error;

use crate::domain::action::{actions_to_json, Action, ActionError, MouseButton};

/// Longest command line the device accepts, excluding the terminator.
pub const MAX_LINE_LEN: usize = 64 * 1024;

const LOOP_FLAG: &str = "LOOP";

/// Errors produced while parsing a command or reply line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The keyword is not part of the protocol.
    #[error("unknown command: {0:?}")]
    UnknownCommand(String),

    /// The keyword is known but its arguments are wrong.
    #[error("malformed {keyword} command: {reason}")]
    MalformedCommand {
        keyword: &'static str,
        reason: String,
    },

    /// The line exceeds [`MAX_LINE_LEN`].
    #[error("line too long: {0} bytes")]
    LineTooLong(usize),

    /// A reply line the host does not recognise.
    #[error("unrecognised reply: {0:?}")]
    UnrecognisedReply(String),
}

impl ProtocolError {
    /// The reply the device sends for this parse failure.
    pub fn reply(&self) -> Reply {
        match self {
            ProtocolError::UnknownCommand(_) => Reply::Unknown,
            _ => Reply::Error,
        }
    }

    fn malformed(keyword: &'static str, reason: impl Into<String>) -> Self {
        ProtocolError::MalformedCommand {
            keyword,
            reason: reason.into(),
        }
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// A host → device command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping,
    /// Store (or replace) a macro from a JSON action array.
    MacroData { name: String, payload: String },
    Play { name: String, looping: bool },
    Stop,
    List,
    /// One-shot absolute move to pixel coordinates.
    Move { x: i64, y: i64 },
    /// One-shot click at pixel coordinates.
    Click { x: i64, y: i64, button: MouseButton },
}

impl Command {
    /// Builds a `MACRO_DATA` command from already validated actions.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Json`] if the actions cannot be serialised.
    pub fn macro_data(name: &str, actions: &[Action]) -> Result<Self, ActionError> {
        Ok(Command::MacroData {
            name: name.to_string(),
            payload: actions_to_json(actions)?,
        })
    }

    /// The keyword that starts this command's line.
    pub fn keyword(&self) -> &'static str {
        match self {
            Command::Ping => "PING",
            Command::MacroData { .. } => "MACRO_DATA",
            Command::Play { .. } => "PLAY",
            Command::Stop => "STOP",
            Command::List => "LIST",
            Command::Move { .. } => "MOVE",
            Command::Click { .. } => "CLICK",
        }
    }
}

/// Formats the command as a single line without the trailing `\n`.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = self.keyword();
        match self {
            Command::Ping | Command::Stop | Command::List => f.write_str(keyword),
            Command::MacroData { name, payload } => write!(f, "{keyword}:{name}:{payload}"),
            Command::Play { name, looping } => {
                write!(f, "{keyword}:{name}")?;
                if *looping {
                    write!(f, ":{LOOP_FLAG}")?;
                }
                Ok(())
            }
            Command::Move { x, y } => write!(f, "{keyword}:{x}:{y}"),
            Command::Click { x, y, button } => write!(f, "{keyword}:{x}:{y}:{button}"),
        }
    }
}

/// Parses one command line.
///
/// A trailing `\n` or `\r\n` is tolerated.
///
/// # Errors
///
/// - [`ProtocolError::UnknownCommand`] for an unrecognised keyword (including
///   an empty line).
/// - [`ProtocolError::MalformedCommand`] for a known keyword with bad
///   arguments.
/// - [`ProtocolError::LineTooLong`] for lines over [`MAX_LINE_LEN`].
pub fn parse_command(line: &str) -> Result<Command, ProtocolError> {
    let line = trim_terminator(line);
    if line.len() > MAX_LINE_LEN {
        return Err(ProtocolError::LineTooLong(line.len()));
    }

    let (keyword, rest) = match line.split_once(':') {
        Some((keyword, rest)) => (keyword, Some(rest)),
        None => (line, None),
    };

    match keyword {
        "PING" => no_arguments("PING", rest).map(|()| Command::Ping),
        "STOP" => no_arguments("STOP", rest).map(|()| Command::Stop),
        "LIST" => no_arguments("LIST", rest).map(|()| Command::List),
        "MACRO_DATA" => {
            let rest = rest.ok_or_else(|| ProtocolError::malformed("MACRO_DATA", "missing name"))?;
            let (name, payload) = rest
                .split_once(':')
                .ok_or_else(|| ProtocolError::malformed("MACRO_DATA", "missing payload"))?;
            Ok(Command::MacroData {
                name: name.to_string(),
                payload: payload.to_string(),
            })
        }
        "PLAY" => {
            let fields = fields("PLAY", rest)?;
            match fields.as_slice() {
                [name] => Ok(Command::Play {
                    name: name.to_string(),
                    looping: false,
                }),
                [name, flag] if *flag == LOOP_FLAG => Ok(Command::Play {
                    name: name.to_string(),
                    looping: true,
                }),
                [_, flag] => Err(ProtocolError::malformed(
                    "PLAY",
                    format!("unexpected flag {flag:?}"),
                )),
                _ => Err(ProtocolError::malformed("PLAY", "expected PLAY:<name>[:LOOP]")),
            }
        }
        "MOVE" => {
            let fields = fields("MOVE", rest)?;
            match fields.as_slice() {
                [x, y] => Ok(Command::Move {
                    x: coordinate("MOVE", x)?,
                    y: coordinate("MOVE", y)?,
                }),
                _ => Err(ProtocolError::malformed("MOVE", "expected MOVE:<x>:<y>")),
            }
        }
        "CLICK" => {
            let fields = fields("CLICK", rest)?;
            let (x, y, button) = match fields.as_slice() {
                [x, y] => (x, y, MouseButton::default()),
                [x, y, button] => (
                    x,
                    y,
                    button
                        .parse()
                        .map_err(|e: ActionError| ProtocolError::malformed("CLICK", e.to_string()))?,
                ),
                _ => {
                    return Err(ProtocolError::malformed(
                        "CLICK",
                        "expected CLICK:<x>:<y>[:<button>]",
                    ))
                }
            };
            Ok(Command::Click {
                x: coordinate("CLICK", x)?,
                y: coordinate("CLICK", y)?,
                button,
            })
        }
        other => Err(ProtocolError::UnknownCommand(other.to_string())),
    }
}

fn trim_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

fn no_arguments(keyword: &'static str, rest: Option<&str>) -> Result<(), ProtocolError> {
    match rest {
        None => Ok(()),
        Some(_) => Err(ProtocolError::malformed(keyword, "takes no arguments")),
    }
}

fn fields<'a>(keyword: &'static str, rest: Option<&'a str>) -> Result<Vec<&'a str>, ProtocolError> {
    rest.map(|rest| rest.split(':').collect())
        .ok_or_else(|| ProtocolError::malformed(keyword, "missing arguments"))
}

fn coordinate(keyword: &'static str, field: &str) -> Result<i64, ProtocolError> {
    field
        .trim()
        .parse()
        .map_err(|_| ProtocolError::malformed(keyword, format!("bad coordinate {field:?}")))
}

// ── Replies ───────────────────────────────────────────────────────────────────

/// A device → host reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Pong,
    Ok,
    Error,
    Unknown,
    /// Stored macro names in insertion order.
    Macros(Vec<String>),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Pong => f.write_str("PONG"),
            Reply::Ok => f.write_str("OK"),
            Reply::Error => f.write_str("ERROR"),
            Reply::Unknown => f.write_str("UNKNOWN"),
            Reply::Macros(names) => write!(f, "MACROS:{}", names.join(",")),
        }
    }
}

/// Parses one reply line.
///
/// # Errors
///
/// Returns [`ProtocolError::UnrecognisedReply`] for anything else.
pub fn parse_reply(line: &str) -> Result<Reply, ProtocolError> {
    let line = trim_terminator(line);
    match line {
        "PONG" => Ok(Reply::Pong),
        "OK" => Ok(Reply::Ok),
        "ERROR" => Ok(Reply::Error),
        "UNKNOWN" => Ok(Reply::Unknown),
        _ => match line.strip_prefix("MACROS:") {
            Some("") => Ok(Reply::Macros(Vec::new())),
            Some(names) => Ok(Reply::Macros(names.split(',').map(str::to_string).collect())),
            None => Err(ProtocolError::UnrecognisedReply(line.to_string())),
        },
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── parse_command ─────────────────────────────────────────────────────────

    #[test]
    fn test_parse_simple_keywords() {
        assert_eq!(parse_command("PING"), Ok(Command::Ping));
        assert_eq!(parse_command("STOP\n"), Ok(Command::Stop));
        assert_eq!(parse_command("LIST\r\n"), Ok(Command::List));
    }

    #[test]
    fn test_keywords_are_case_sensitive() {
        assert_eq!(
            parse_command("ping"),
            Err(ProtocolError::UnknownCommand("ping".into()))
        );
    }

    #[test]
    fn test_macro_data_payload_keeps_its_colons() {
        // Arrange
        let line = r#"MACRO_DATA:demo:[{"type":"click","x":100,"y":200,"button":"left","delay":0.1}]"#;

        // Act
        let command = parse_command(line).unwrap();

        // Assert
        assert_eq!(
            command,
            Command::MacroData {
                name: "demo".into(),
                payload: r#"[{"type":"click","x":100,"y":200,"button":"left","delay":0.1}]"#.into(),
            }
        );
    }

    #[test]
    fn test_macro_data_without_payload_is_malformed() {
        assert!(matches!(
            parse_command("MACRO_DATA:demo"),
            Err(ProtocolError::MalformedCommand { keyword: "MACRO_DATA", .. })
        ));
    }

    #[test]
    fn test_parse_play_with_and_without_loop() {
        assert_eq!(
            parse_command("PLAY:demo"),
            Ok(Command::Play {
                name: "demo".into(),
                looping: false
            })
        );
        assert_eq!(
            parse_command("PLAY:demo:LOOP"),
            Ok(Command::Play {
                name: "demo".into(),
                looping: true
            })
        );
        assert!(parse_command("PLAY:demo:FOREVER").is_err());
        assert!(parse_command("PLAY").is_err());
    }

    #[test]
    fn test_parse_move_and_click() {
        assert_eq!(
            parse_command("MOVE:10:-5"),
            Ok(Command::Move { x: 10, y: -5 })
        );
        assert_eq!(
            parse_command("CLICK:1:2:Right"),
            Ok(Command::Click {
                x: 1,
                y: 2,
                button: MouseButton::Right
            })
        );
        assert_eq!(
            parse_command("CLICK:1:2"),
            Ok(Command::Click {
                x: 1,
                y: 2,
                button: MouseButton::Left
            })
        );
    }

    #[test]
    fn test_bad_arguments_are_malformed_not_unknown() {
        for line in ["MOVE:1", "MOVE:a:b", "CLICK:1:2:thumb", "CLICK", "PING:extra"] {
            let err = parse_command(line).unwrap_err();
            assert_eq!(err.reply(), Reply::Error, "{line}");
        }
    }

    #[test]
    fn test_unknown_and_empty_lines_reply_unknown() {
        for line in ["", "HELLO", "DELETE:demo"] {
            assert_eq!(parse_command(line).unwrap_err().reply(), Reply::Unknown, "{line:?}");
        }
    }

    #[test]
    fn test_oversized_line_is_rejected() {
        let line = format!("MACRO_DATA:big:{}", "x".repeat(MAX_LINE_LEN));
        assert!(matches!(
            parse_command(&line),
            Err(ProtocolError::LineTooLong(_))
        ));
    }

    // ── Display / encode ──────────────────────────────────────────────────────

    #[test]
    fn test_display_matches_wire_format() {
        assert_eq!(Command::Ping.to_string(), "PING");
        assert_eq!(
            Command::Play {
                name: "demo".into(),
                looping: true
            }
            .to_string(),
            "PLAY:demo:LOOP"
        );
        assert_eq!(
            Command::Click {
                x: 3,
                y: 4,
                button: MouseButton::Middle
            }
            .to_string(),
            "CLICK:3:4:middle"
        );
    }

    #[test]
    fn test_macro_data_builder_produces_parseable_line() {
        // Arrange
        let actions = vec![Action::Move {
            x: 5,
            y: 6,
            delay: std::time::Duration::from_millis(250),
        }];

        // Act
        let line = Command::macro_data("m", &actions).unwrap().to_string();

        // Assert
        let Command::MacroData { name, payload } = parse_command(&line).unwrap() else {
            panic!("expected MACRO_DATA");
        };
        assert_eq!(name, "m");
        assert_eq!(crate::domain::action::parse_actions(&payload).unwrap(), actions);
    }

    // ── Replies ───────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_replies() {
        assert_eq!(parse_reply("PONG\n"), Ok(Reply::Pong));
        assert_eq!(parse_reply("OK"), Ok(Reply::Ok));
        assert_eq!(parse_reply("MACROS:"), Ok(Reply::Macros(Vec::new())));
        assert_eq!(
            parse_reply("MACROS:a,b"),
            Ok(Reply::Macros(vec!["a".into(), "b".into()]))
        );
        assert!(parse_reply("WHAT").is_err());
    }

    #[test]
    fn test_macros_reply_display() {
        assert_eq!(Reply::Macros(Vec::new()).to_string(), "MACROS:");
        assert_eq!(
            Reply::Macros(vec!["a".into(), "b".into()]).to_string(),
            "MACROS:a,b"
        );
    }
}
