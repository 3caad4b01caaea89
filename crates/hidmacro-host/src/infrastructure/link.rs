//! Request/reply link to the device over its serial port.
//!
//! # Strict request/response (for beginners)
//!
//! The protocol is not pipelined: the host writes one command line, then
//! reads exactly one reply line before it may send anything else.
//! [`DeviceLink::request`] takes `&mut self`, so the borrow checker enforces
//! that rule for us; there is no way to have two requests in flight.
//!
//! The link is generic over any `AsyncRead + AsyncWrite` stream.  The binary
//! opens the serial device node with `tokio::fs` and switches it to raw mode
//! (see [`super::tty`]), so the port neither echoes commands back nor rewrites
//! newlines; tests use
//! `tokio_test::io::Builder`, which scripts the exact bytes expected in each
//! direction.
//!
//! # Timeouts
//!
//! By default the link waits for a reply forever.  With
//! [`DeviceLink::with_timeout`] a silent device becomes
//! [`LinkError::Timeout`] instead.  Either way, failures are returned to the
//! caller; the link never touches the local macro library.

use std::path::Path;
use std::time::Duration;

use hidmacro_core::protocol::{parse_reply, Command, Reply};
use hidmacro_core::{Action, ActionError, MouseButton};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use super::tty::set_raw_mode;

/// Errors returned by [`DeviceLink`] operations.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Reading from or writing to the port failed.
    #[error("device link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device closed the stream before replying.
    #[error("device link closed")]
    Closed,

    /// No reply arrived within the configured timeout.
    #[error("no reply from device within {0:?}")]
    Timeout(Duration),

    /// The reply line is not part of the protocol, or not a valid answer to
    /// the command that was sent.
    #[error("unexpected reply to {command}: {reply}")]
    UnexpectedReply { command: &'static str, reply: String },

    /// The device answered `ERROR` or `UNKNOWN`.
    #[error("device rejected {command}: {reply}")]
    Rejected { command: &'static str, reply: Reply },

    /// A macro could not be serialised for upload.
    #[error("cannot encode macro: {0}")]
    Encode(#[from] ActionError),
}

/// One request/reply channel to a device.
pub struct DeviceLink<S> {
    stream: BufReader<S>,
    timeout: Option<Duration>,
}

impl DeviceLink<tokio::fs::File> {
    /// Opens the serial device node at `path` in raw mode.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Io`] if the port cannot be opened or configured.
    pub async fn open(path: &Path) -> Result<Self, LinkError> {
        let file = tokio::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .await?
            .into_std()
            .await;
        set_raw_mode(&file)?;
        info!("device link open on {}", path.display());
        Ok(Self::new(tokio::fs::File::from_std(file)))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> DeviceLink<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
            timeout: None,
        }
    }

    /// Fails requests that get no reply within `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sends `command` and waits for its reply line.
    ///
    /// # Errors
    ///
    /// - [`LinkError::Io`] / [`LinkError::Closed`] on stream failure.
    /// - [`LinkError::Timeout`] if a timeout is set and expires.
    /// - [`LinkError::UnexpectedReply`] for a line that is not a reply.
    pub async fn request(&mut self, command: &Command) -> Result<Reply, LinkError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.exchange(command))
                .await
                .map_err(|_| LinkError::Timeout(limit))?,
            None => self.exchange(command).await,
        }
    }

    async fn exchange(&mut self, command: &Command) -> Result<Reply, LinkError> {
        let line = format!("{command}\n");
        debug!("-> {}", command.keyword());
        self.stream.write_all(line.as_bytes()).await?;
        self.stream.flush().await?;

        let mut reply = String::new();
        if self.stream.read_line(&mut reply).await? == 0 {
            return Err(LinkError::Closed);
        }
        debug!("<- {}", reply.trim_end());

        parse_reply(&reply).map_err(|_| LinkError::UnexpectedReply {
            command: command.keyword(),
            reply: reply.trim_end().to_string(),
        })
    }

    /// Sends `command` and requires `OK`.
    async fn expect_ok(&mut self, command: Command) -> Result<(), LinkError> {
        match self.request(&command).await? {
            Reply::Ok => Ok(()),
            reply => Err(unexpected(&command, reply)),
        }
    }

    // ── Protocol operations ───────────────────────────────────────────────────

    /// Checks the device is alive.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError`] if the device does not answer `PONG`.
    pub async fn ping(&mut self) -> Result<(), LinkError> {
        let command = Command::Ping;
        match self.request(&command).await? {
            Reply::Pong => Ok(()),
            reply => Err(unexpected(&command, reply)),
        }
    }

    /// Names of the macros stored on the device.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError`] if the device does not answer `MACROS:`.
    pub async fn list(&mut self) -> Result<Vec<String>, LinkError> {
        let command = Command::List;
        match self.request(&command).await? {
            Reply::Macros(names) => Ok(names),
            reply => Err(unexpected(&command, reply)),
        }
    }

    /// Uploads (or replaces) macro `name` on the device.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Rejected`] if the device refuses the payload.
    pub async fn upload(&mut self, name: &str, actions: &[Action]) -> Result<(), LinkError> {
        self.expect_ok(Command::macro_data(name, actions)?).await
    }

    /// Starts playing macro `name`.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Rejected`] if the device has no such macro.
    pub async fn play(&mut self, name: &str, looping: bool) -> Result<(), LinkError> {
        self.expect_ok(Command::Play {
            name: name.to_string(),
            looping,
        })
        .await
    }

    /// Stops playback (a no-op on an idle device).
    ///
    /// # Errors
    ///
    /// Returns [`LinkError`] on link failure.
    pub async fn stop(&mut self) -> Result<(), LinkError> {
        self.expect_ok(Command::Stop).await
    }

    /// One-shot absolute move.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Rejected`] while a macro is playing.
    pub async fn move_to(&mut self, x: i64, y: i64) -> Result<(), LinkError> {
        self.expect_ok(Command::Move { x, y }).await
    }

    /// One-shot click.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Rejected`] while a macro is playing.
    pub async fn click(&mut self, x: i64, y: i64, button: MouseButton) -> Result<(), LinkError> {
        self.expect_ok(Command::Click { x, y, button }).await
    }
}

fn unexpected(command: &Command, reply: Reply) -> LinkError {
    match reply {
        Reply::Error | Reply::Unknown => LinkError::Rejected {
            command: command.keyword(),
            reply,
        },
        other => LinkError::UnexpectedReply {
            command: command.keyword(),
            reply: other.to_string(),
        },
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
