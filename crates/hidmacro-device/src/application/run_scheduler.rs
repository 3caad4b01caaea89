//! Scheduler: the device's single cooperative run loop.
//!
//! # One loop, no threads touching state (for beginners)
//!
//! Playback needs to wait (action delays, click dwell) while staying able to
//! read a `STOP` command.  Rather than running playback on its own thread and
//! sharing the pointer state behind a lock, the scheduler alternates:
//!
//! ```text
//! loop {
//!     serve at most one pending command line      (non-blocking poll)
//!     advance playback by one step                (CommandHandler::tick)
//!     sleep min(poll_slice, time to next deadline)
//! }
//! ```
//!
//! The worst-case STOP latency is therefore one `poll_slice`, no matter how
//! long the current action's delay is.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hidmacro_core::{Clock, CodecError, Reply, Tick};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::handle_commands::CommandHandler;

/// Default upper bound on one scheduler sleep.
pub const DEFAULT_POLL_SLICE: Duration = Duration::from_millis(10);

/// Errors reported by a [`LineTransport`].
#[derive(Debug, Error)]
pub enum LineError {
    /// The peer closed the line (EOF); no further commands will arrive.
    #[error("command line closed")]
    Closed,

    /// A line exceeded the length cap and was discarded.
    #[error("command line too long ({0} bytes), discarded")]
    TooLong(usize),

    /// A line was not valid UTF-8 and was discarded.
    #[error("command line is not valid UTF-8")]
    InvalidUtf8,

    /// Reading or writing the underlying device failed.
    #[error("command line I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that end the run loop.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The HID endpoint failed twice in a row.
    #[error(transparent)]
    Transport(#[from] CodecError),

    /// The command line failed with an I/O error.
    #[error(transparent)]
    Line(#[from] LineError),
}

/// A newline-framed, polled command channel.
///
/// Implementations must never block in [`poll_line`](LineTransport::poll_line).
#[cfg_attr(test, mockall::automock)]
pub trait LineTransport {
    /// Returns the next complete line (without its terminator), or `None` if
    /// nothing is waiting.
    fn poll_line(&mut self) -> Result<Option<String>, LineError>;

    /// Writes `line` followed by `\n`.
    fn write_line(&mut self, line: &str) -> Result<(), LineError>;
}

/// What the loop should do after one [`Scheduler::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep going after sleeping this long (zero means "poll again now").
    Continue(Duration),
    /// The command line closed.
    Closed,
}

/// Drives a [`CommandHandler`] from a [`LineTransport`].
pub struct Scheduler<L> {
    handler: CommandHandler,
    line: L,
    clock: Arc<dyn Clock>,
    poll_slice: Duration,
}

impl<L: LineTransport> Scheduler<L> {
    pub fn new(handler: CommandHandler, line: L, clock: Arc<dyn Clock>) -> Self {
        Self {
            handler,
            line,
            clock,
            poll_slice: DEFAULT_POLL_SLICE,
        }
    }

    /// Overrides the maximum time the loop sleeps between polls.
    pub fn with_poll_slice(mut self, poll_slice: Duration) -> Self {
        self.poll_slice = poll_slice;
        self
    }

    pub fn handler(&self) -> &CommandHandler {
        &self.handler
    }

    /// Serves at most one command, advances playback once, and reports how
    /// long the loop may sleep.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError`] on a fatal HID failure or a line I/O error.
    pub fn tick(&mut self) -> Result<Flow, SchedulerError> {
        let served = match self.line.poll_line() {
            Ok(Some(line)) => {
                let reply = self.handler.handle_line(&line)?;
                debug!("{line:?} -> {reply}");
                self.line.write_line(&reply.to_string())?;
                true
            }
            Ok(None) => false,
            Err(e @ (LineError::TooLong(_) | LineError::InvalidUtf8)) => {
                warn!("{e}");
                self.line.write_line(&Reply::Error.to_string())?;
                true
            }
            Err(LineError::Closed) => return Ok(Flow::Closed),
            Err(e) => return Err(e.into()),
        };

        let tick = self.handler.tick()?;
        if served {
            return Ok(Flow::Continue(Duration::ZERO));
        }

        let sleep = match tick {
            Tick::Idle => self.poll_slice,
            Tick::WaitUntil(deadline) => deadline
                .saturating_duration_since(self.clock.now())
                .min(self.poll_slice),
        };
        Ok(Flow::Continue(sleep))
    }

    /// Runs until `running` is cleared, the line closes, or a fatal error
    /// occurs.  Any held button is released on the way out.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError`] on a fatal HID failure or a line I/O error.
    pub fn run(&mut self, running: &AtomicBool) -> Result<(), SchedulerError> {
        info!("scheduler running (poll slice {:?})", self.poll_slice);

        let result = self.run_loop(running);
        if let Err(e) = &result {
            error!("scheduler stopped: {e}");
        }

        // Best effort: a dead HID endpoint cannot take the release either.
        if let Err(e) = self.handler.shutdown() {
            warn!("could not release buttons on shutdown: {e}");
        }
        result
    }

    fn run_loop(&mut self, running: &AtomicBool) -> Result<(), SchedulerError> {
        while running.load(Ordering::Relaxed) {
            match self.tick()? {
                Flow::Closed => {
                    warn!("command line closed; stopping");
                    break;
                }
                Flow::Continue(sleep) if !sleep.is_zero() => self.clock.sleep(sleep),
                Flow::Continue(_) => {}
            }
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
