//! Click recorder: turns timestamped clicks into a timed macro.
//!
//! # Timing model
//!
//! An action's `delay` is the wait *after* it runs.  When the operator clicks
//! at t=0.0 s, t=1.2 s and t=1.5 s, the recorded macro is:
//!
//! ```text
//! click #1  delay 1.2   (gap to click #2)
//! click #2  delay 0.3   (gap to click #3)
//! click #3  delay 0.05  (trailing default, nothing follows)
//! ```
//!
//! Gaps shorter than [`RecorderConfig::min_gap`] are raised to it so a
//! double-click on the desktop still replays as two distinct clicks, and
//! gaps longer than [`MAX_DELAY`] are cut to it so the device accepts the
//! upload.
//!
//! This deliberately differs from recorders that give each click the gap
//! *before* it (and a fixed 0.05 s to the first click).
//!
//! The recorder is fed by whatever captures clicks.  The `hidmacro record`
//! command reads `<x> <y> [button]` lines from stdin and stamps each on
//! arrival; see [`parse_click_line`].

use std::time::{Duration, Instant};

use hidmacro_core::domain::action::{DEFAULT_DELAY, MAX_DELAY};
use hidmacro_core::{Action, MouseButton};
use thiserror::Error;
use tracing::{debug, info};

/// Errors produced while reading captured clicks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    /// A capture line is not `<x> <y> [button]`.
    #[error("malformed click line {0:?}: expected `<x> <y> [button]`")]
    MalformedLine(String),
}

/// Recorder timing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecorderConfig {
    /// Smallest delay recorded between two clicks.
    pub min_gap: Duration,
    /// Delay given to the last click.
    pub trailing_delay: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            min_gap: Duration::from_millis(20),
            trailing_delay: DEFAULT_DELAY,
        }
    }
}

/// Recorder lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
}

#[derive(Debug, Clone, Copy)]
struct CapturedClick {
    x: i64,
    y: i64,
    button: MouseButton,
    at: Instant,
}

/// Collects clicks while recording and converts them to actions.
#[derive(Debug)]
pub struct Recorder {
    config: RecorderConfig,
    state: RecorderState,
    clicks: Vec<CapturedClick>,
}

impl Recorder {
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            config,
            state: RecorderState::Idle,
            clicks: Vec::new(),
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    /// Number of clicks captured in the current recording.
    pub fn len(&self) -> usize {
        self.clicks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clicks.is_empty()
    }

    /// Starts a fresh recording, discarding any clicks from a previous one.
    pub fn start(&mut self) {
        self.clicks.clear();
        self.state = RecorderState::Recording;
        info!("recording started");
    }

    /// Captures one click.  Ignored while idle.
    pub fn record_click(&mut self, x: i64, y: i64, button: MouseButton, at: Instant) {
        if self.state != RecorderState::Recording {
            return;
        }
        debug!("captured {button} click at ({x}, {y})");
        self.clicks.push(CapturedClick { x, y, button, at });
    }

    /// Ends the recording and returns the captured macro.
    pub fn stop(&mut self) -> Vec<Action> {
        self.state = RecorderState::Idle;
        let clicks = std::mem::take(&mut self.clicks);
        info!("recording stopped ({} clicks)", clicks.len());

        clicks
            .iter()
            .enumerate()
            .map(|(i, click)| {
                let delay = match clicks.get(i + 1) {
                    Some(next) => next
                        .at
                        .saturating_duration_since(click.at)
                        .max(self.config.min_gap)
                        .min(MAX_DELAY),
                    None => self.config.trailing_delay,
                };
                Action::Click {
                    position: Some((click.x, click.y)),
                    button: click.button,
                    delay,
                }
            })
            .collect()
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new(RecorderConfig::default())
    }
}

/// Parses a capture line `<x> <y> [button]` (whitespace separated, button
/// defaults to left).
///
/// # Errors
///
/// Returns [`RecordError::MalformedLine`] for anything else.
pub fn parse_click_line(line: &str) -> Result<(i64, i64, MouseButton), RecordError> {
    let malformed = || RecordError::MalformedLine(line.trim_end().to_string());
    let mut fields = line.split_whitespace();

    let x = fields.next().and_then(|f| f.parse().ok()).ok_or_else(malformed)?;
    let y = fields.next().and_then(|f| f.parse().ok()).ok_or_else(malformed)?;
    let button = match fields.next() {
        Some(name) => name.parse().map_err(|_| malformed())?,
        None => MouseButton::default(),
    };
    if fields.next().is_some() {
        return Err(malformed());
    }
    Ok((x, y, button))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_gap_to_next_click_becomes_delay() {
        // Arrange
        let t0 = Instant::now();
        let mut recorder = Recorder::default();
        recorder.start();

        // Act
        recorder.record_click(10, 20, MouseButton::Left, t0);
        recorder.record_click(30, 40, MouseButton::Right, t0 + ms(1200));
        recorder.record_click(50, 60, MouseButton::Left, t0 + ms(1500));
        let actions = recorder.stop();

        // Assert
        let delays: Vec<Duration> = actions.iter().map(Action::delay).collect();
        assert_eq!(delays, vec![ms(1200), ms(300), ms(50)]);
        assert_eq!(
            actions[1],
            Action::Click {
                position: Some((30, 40)),
                button: MouseButton::Right,
                delay: ms(300),
            }
        );
    }

    #[test]
    fn test_short_gaps_are_raised_to_minimum() {
        let t0 = Instant::now();
        let mut recorder = Recorder::default();
        recorder.start();

        recorder.record_click(0, 0, MouseButton::Left, t0);
        recorder.record_click(0, 0, MouseButton::Left, t0 + ms(5));

        assert_eq!(recorder.stop()[0].delay(), ms(20));
    }

    #[test]
    fn test_long_gaps_are_cut_to_max_delay() {
        let t0 = Instant::now();
        let mut recorder = Recorder::default();
        recorder.start();

        recorder.record_click(0, 0, MouseButton::Left, t0);
        recorder.record_click(0, 0, MouseButton::Left, t0 + MAX_DELAY + ms(1));

        assert_eq!(recorder.stop()[0].delay(), MAX_DELAY);
    }

    #[test]
    fn test_single_click_gets_trailing_delay() {
        let mut recorder = Recorder::new(RecorderConfig {
            min_gap: ms(20),
            trailing_delay: ms(250),
        });
        recorder.start();
        recorder.record_click(1, 1, MouseButton::Middle, Instant::now());

        assert_eq!(recorder.stop()[0].delay(), ms(250));
    }

    #[test]
    fn test_clicks_while_idle_are_ignored() {
        let mut recorder = Recorder::default();

        recorder.record_click(1, 1, MouseButton::Left, Instant::now());

        assert!(recorder.is_empty());
        assert_eq!(recorder.state(), RecorderState::Idle);
        assert!(recorder.stop().is_empty());
    }

    #[test]
    fn test_start_discards_previous_recording() {
        let mut recorder = Recorder::default();
        recorder.start();
        recorder.record_click(1, 1, MouseButton::Left, Instant::now());

        recorder.start();

        assert_eq!(recorder.len(), 0);
        assert_eq!(recorder.state(), RecorderState::Recording);
    }

    #[test]
    fn test_parse_click_line_variants() {
        assert_eq!(parse_click_line("10 20"), Ok((10, 20, MouseButton::Left)));
        assert_eq!(
            parse_click_line("  -5\t7 RIGHT\n"),
            Ok((-5, 7, MouseButton::Right))
        );
        assert!(parse_click_line("10").is_err());
        assert!(parse_click_line("10 twenty").is_err());
        assert!(parse_click_line("1 2 thumb").is_err());
        assert!(parse_click_line("1 2 left extra").is_err());
    }
}
