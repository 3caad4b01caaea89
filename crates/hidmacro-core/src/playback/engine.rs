//! Playback engine: walks a macro and emits HID reports.
//!
//! # State machine
//!
//! ```text
//!            PLAY(name)                 exhausted (after last delay)
//!   Idle ───────────────▶ Playing ───────────────────────────────▶ Idle
//!     │                      │
//!     │ PLAY(name, LOOP)     │ STOP
//!     ▼                      ▼
//!   PlayingLooping ──STOP──▶ Stopping ──(held button released)──▶ Idle
//!     ▲        │
//!     └────────┘ exhausted: restart at the first action
//! ```
//!
//! # Ticks instead of sleeps
//!
//! The engine never sleeps.  Each call to [`PlaybackEngine::advance`] performs
//! at most one step (one action, or the release half of a click) and returns a
//! [`Tick`] telling the caller when the next step is due.  The caller's run
//! loop sleeps in short slices up to that deadline and serves incoming
//! commands in between, so a `STOP` that arrives during a long delay takes
//! effect on the next tick rather than after the delay or the loop iteration.
//!
//! A click is split into two steps (press, then release after the dwell).  If
//! a stop arrives while the button is held, the `Stopping` transition sends
//! the release before returning to `Idle`, so a macro can never leave a button
//! stuck down on the host.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::domain::action::{Action, MAX_DELAY};
use crate::hid::codec::{CodecError, ReportCodec};
use crate::hid::mapper::{pixel_to_absolute, ScreenGeometry};
use crate::hid::report::ButtonMask;

/// Time a click holds its button down between the press and release reports.
pub const DEFAULT_DWELL: Duration = Duration::from_millis(50);

/// Externally visible engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    PlayingLooping,
    /// A stop was requested; the next tick finishes any pending release.
    Stopping,
}

/// What the caller should do after [`PlaybackEngine::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// No session is active.
    Idle,
    /// A session is active; call `advance` again at (or after) this instant.
    WaitUntil(Instant),
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    /// The next action runs at `at`.
    Ready { at: Instant },
    /// A click's button is down until `release_at`; `delay` follows the release.
    Holding {
        button: ButtonMask,
        release_at: Instant,
        delay: Duration,
    },
}

#[derive(Debug)]
struct Session {
    name: String,
    actions: Arc<[Action]>,
    cursor: usize,
    looping: bool,
    iteration: u64,
    phase: Phase,
}

/// Tick-driven macro player.
#[derive(Debug)]
pub struct PlaybackEngine {
    geometry: ScreenGeometry,
    dwell: Duration,
    session: Option<Session>,
    stop_requested: bool,
}

impl PlaybackEngine {
    /// Creates an idle engine mapping coordinates onto `geometry`.
    pub fn new(geometry: ScreenGeometry) -> Self {
        Self {
            geometry,
            dwell: DEFAULT_DWELL,
            session: None,
            stop_requested: false,
        }
    }

    /// Overrides the press→release dwell of click actions.
    pub fn with_dwell(mut self, dwell: Duration) -> Self {
        self.dwell = dwell;
        self
    }

    pub fn geometry(&self) -> &ScreenGeometry {
        &self.geometry
    }

    pub fn state(&self) -> PlaybackState {
        match &self.session {
            None => PlaybackState::Idle,
            Some(_) if self.stop_requested => PlaybackState::Stopping,
            Some(session) if session.looping => PlaybackState::PlayingLooping,
            Some(_) => PlaybackState::Playing,
        }
    }

    /// Name of the macro being played, if any.
    pub fn active_macro(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.name.as_str())
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Starts playing `actions` as macro `name`.
    ///
    /// An already active session is preempted first: it goes through
    /// `Stopping` (releasing any held button) before the new one begins.  An
    /// empty action list completes immediately and leaves the engine `Idle`
    /// without emitting any report.  The first action runs on the next
    /// [`advance`](Self::advance).
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if releasing the preempted session's button fails.
    pub fn start(
        &mut self,
        name: &str,
        actions: Arc<[Action]>,
        looping: bool,
        codec: &mut ReportCodec,
        now: Instant,
    ) -> Result<PlaybackState, CodecError> {
        if let Some(previous) = self.active_macro() {
            info!("preempting macro '{previous}' to play '{name}'");
            self.finish_stop(codec)?;
        }

        if actions.is_empty() {
            info!("macro '{name}' is empty; nothing to play");
            return Ok(PlaybackState::Idle);
        }

        info!(
            "playing macro '{name}' ({} actions{})",
            actions.len(),
            if looping { ", looping" } else { "" }
        );
        self.session = Some(Session {
            name: name.to_string(),
            actions,
            cursor: 0,
            looping,
            iteration: 0,
            phase: Phase::Ready { at: now },
        });
        Ok(self.state())
    }

    /// Asks the active session to stop at the next tick.
    ///
    /// Idempotent, and a no-op while `Idle`.
    pub fn request_stop(&mut self) -> PlaybackState {
        if let Some(name) = self.active_macro() {
            info!("stop requested for macro '{name}'");
            self.stop_requested = true;
        }
        self.state()
    }

    /// Performs at most one playback step.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if a report cannot be sent.  The session is
    /// abandoned in that case and the engine is `Idle`.
    pub fn advance(&mut self, codec: &mut ReportCodec, now: Instant) -> Result<Tick, CodecError> {
        if self.session.is_none() {
            return Ok(Tick::Idle);
        }
        if self.stop_requested {
            self.finish_stop(codec)?;
            return Ok(Tick::Idle);
        }

        let result = self.step(codec, now);
        if result.is_err() {
            self.session = None;
            self.stop_requested = false;
        }
        result
    }

    /// Executes one action immediately, outside any session.
    ///
    /// Used for the one-shot `MOVE` / `CLICK` commands.  A click blocks on
    /// `clock` for the dwell between its press and release reports.  The
    /// action's own delay is not applied.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if a report cannot be sent.
    pub fn perform_now(
        &self,
        action: &Action,
        codec: &mut ReportCodec,
        clock: &dyn Clock,
    ) -> Result<(), CodecError> {
        match action {
            Action::Click {
                position, button, ..
            } => {
                if let Some((x, y)) = position {
                    self.move_to(codec, *x, *y)?;
                }
                codec.press(button.mask())?;
                clock.sleep(self.dwell);
                codec.release(button.mask())
            }
            Action::Move { x, y, .. } => self.move_to(codec, *x, *y),
            Action::Scroll { delta, .. } => codec.set_wheel(*delta),
            Action::Unsupported { kind, .. } => {
                warn!("skipping unsupported action type '{kind}'");
                Ok(())
            }
        }
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn step(&mut self, codec: &mut ReportCodec, now: Instant) -> Result<Tick, CodecError> {
        let geometry = self.geometry;
        let dwell = self.dwell;
        let Some(session) = self.session.as_mut() else {
            return Ok(Tick::Idle);
        };

        match session.phase {
            Phase::Holding {
                button,
                release_at,
                delay,
            } => {
                if now < release_at {
                    return Ok(Tick::WaitUntil(release_at));
                }
                codec.release(button)?;
                let at = deadline(now, delay);
                session.phase = Phase::Ready { at };
                Ok(Tick::WaitUntil(at))
            }
            Phase::Ready { at } => {
                if now < at {
                    return Ok(Tick::WaitUntil(at));
                }

                if session.cursor >= session.actions.len() {
                    if !session.looping {
                        info!("macro '{}' finished", session.name);
                        self.session = None;
                        return Ok(Tick::Idle);
                    }
                    session.cursor = 0;
                    session.iteration += 1;
                    debug!(
                        "macro '{}' starting iteration {}",
                        session.name,
                        session.iteration + 1
                    );
                }

                let index = session.cursor;
                session.cursor += 1;
                let action = &session.actions[index];
                debug!("macro '{}' action {index}: {action:?}", session.name);

                session.phase = match action {
                    Action::Move { x, y, delay } => {
                        let (ax, ay) = pixel_to_absolute(*x, *y, &geometry);
                        codec.set_position(ax, ay)?;
                        Phase::Ready { at: deadline(now, *delay) }
                    }
                    Action::Click {
                        position,
                        button,
                        delay,
                    } => {
                        if let Some((x, y)) = position {
                            let (ax, ay) = pixel_to_absolute(*x, *y, &geometry);
                            codec.set_position(ax, ay)?;
                        }
                        codec.press(button.mask())?;
                        Phase::Holding {
                            button: button.mask(),
                            release_at: deadline(now, dwell),
                            delay: *delay,
                        }
                    }
                    Action::Scroll { delta, delay } => {
                        codec.set_wheel(*delta)?;
                        Phase::Ready { at: deadline(now, *delay) }
                    }
                    Action::Unsupported { kind, .. } => {
                        warn!("skipping unsupported action type '{kind}'");
                        Phase::Ready { at: now }
                    }
                };

                Ok(match session.phase {
                    Phase::Ready { at } => Tick::WaitUntil(at),
                    Phase::Holding { release_at, .. } => Tick::WaitUntil(release_at),
                })
            }
        }
    }

    /// `Stopping → Idle`: releases a held button, then drops the session.
    fn finish_stop(&mut self, codec: &mut ReportCodec) -> Result<(), CodecError> {
        self.stop_requested = false;
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        if let Phase::Holding { button, .. } = session.phase {
            codec.release(button)?;
        }
        info!("macro '{}' stopped", session.name);
        Ok(())
    }

    fn move_to(&self, codec: &mut ReportCodec, x: i64, y: i64) -> Result<(), CodecError> {
        let (ax, ay) = pixel_to_absolute(x, y, &self.geometry);
        codec.set_position(ax, ay)
    }
}

/// `now + wait`, with `wait` capped at [`MAX_DELAY`].  Actions built in code
/// skip payload validation, so the cap is applied here too.
fn deadline(now: Instant, wait: Duration) -> Instant {
    now.checked_add(wait.min(MAX_DELAY)).unwrap_or(now)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
