//! Report codec: pointer operations → transmitted HID reports.
//!
//! The codec owns the single [`PointerState`] buffer and the [`HidTransport`]
//! it is sent through.  Every mutating operation ends in exactly one
//! [`ReportCodec::flush`], so the host observes each intermediate state: a
//! click is a press report followed (after a dwell chosen by the caller) by a
//! release report, never one combined report.
//!
//! # Retry policy
//!
//! Right after power-up the host may not have enumerated the device yet, and
//! the first write to the endpoint fails.  A failed send is therefore retried
//! exactly once after a fixed backoff.  If the retry fails too the endpoint is
//! considered gone and [`CodecError::TransportFatal`] is returned; the caller
//! must not swallow it.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, trace, warn};

use super::report::{ButtonMask, PointerState, WHEEL_STEP_MAX};
use super::{HidError, HidTransport};
use crate::clock::Clock;

/// Wait between a failed send and its single retry.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Errors surfaced by the codec.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Both the send and its retry failed.
    #[error("HID transport failed after retry: {source}")]
    TransportFatal {
        #[source]
        source: HidError,
    },
}

/// Owns the report buffer and transmits it after every change.
pub struct ReportCodec {
    transport: Box<dyn HidTransport>,
    state: PointerState,
    clock: Arc<dyn Clock>,
    retry_backoff: Duration,
}

impl ReportCodec {
    /// Creates a codec with an all-zero report and the default retry backoff.
    pub fn new(transport: Box<dyn HidTransport>, clock: Arc<dyn Clock>) -> Self {
        Self {
            transport,
            state: PointerState::new(),
            clock,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Overrides the wait before the single retry.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Current contents of the report buffer.
    pub fn state(&self) -> &PointerState {
        &self.state
    }

    /// Sets the bits of `mask` in the button byte and flushes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::TransportFatal`] if the send and its retry fail.
    pub fn press(&mut self, mask: ButtonMask) -> Result<(), CodecError> {
        self.state.press(mask);
        self.flush()
    }

    /// Clears the bits of `mask` in the button byte and flushes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::TransportFatal`] if the send and its retry fail.
    pub fn release(&mut self, mask: ButtonMask) -> Result<(), CodecError> {
        self.state.release(mask);
        self.flush()
    }

    /// Clears the whole button byte and flushes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::TransportFatal`] if the send and its retry fail.
    pub fn release_all(&mut self) -> Result<(), CodecError> {
        self.state.release_all();
        self.flush()
    }

    /// Moves the pointer to absolute `(x, y)` and flushes.  Buttons are kept.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::TransportFatal`] if the send and its retry fail.
    pub fn set_position(&mut self, x: u16, y: u16) -> Result<(), CodecError> {
        self.state.set_position(x, y);
        self.flush()
    }

    /// Rolls the wheel by `delta` detents.
    ///
    /// The wheel field is one signed byte, so a delta beyond ±127 is split into
    /// consecutive reports of at most ±127 each.  The wheel byte is zeroed
    /// afterwards (without an extra send) so later button or move reports do
    /// not repeat the motion.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::TransportFatal`] if any chunk cannot be sent.
    pub fn set_wheel(&mut self, delta: i32) -> Result<(), CodecError> {
        let limit = i32::from(WHEEL_STEP_MAX);
        let mut remaining = delta;
        let mut result = Ok(());

        while remaining != 0 {
            let step = remaining.clamp(-limit, limit);
            self.state.set_wheel(step as i8);
            result = self.flush();
            if result.is_err() {
                break;
            }
            remaining -= step;
        }

        self.state.set_wheel(0);
        result
    }

    /// Transmits the current buffer, retrying once after the backoff.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::TransportFatal`] if the retry also fails.
    pub fn flush(&mut self) -> Result<(), CodecError> {
        let report = *self.state.as_bytes();

        match self.transport.send_report(&report) {
            Ok(()) => {
                trace!(?report, "HID report sent");
                Ok(())
            }
            Err(first) => {
                warn!(
                    "HID report send failed ({first}); retrying in {:?}",
                    self.retry_backoff
                );
                self.clock.sleep(self.retry_backoff);
                self.transport.send_report(&report).map_err(|source| {
                    error!("HID report retry failed: {source}");
                    CodecError::TransportFatal { source }
                })
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::hid::mock::RecordingHidTransport;
    use crate::hid::MockHidTransport;

    fn recording_codec() -> (ReportCodec, RecordingHidTransport, Arc<ManualClock>) {
        let transport = RecordingHidTransport::new();
        let clock = Arc::new(ManualClock::new());
        let codec = ReportCodec::new(Box::new(transport.clone()), clock.clone());
        (codec, transport, clock)
    }

    // ── Flush contract ────────────────────────────────────────────────────────

    #[test]
    fn test_each_mutation_sends_exactly_one_report() {
        // Arrange
        let (mut codec, transport, _) = recording_codec();

        // Act
        codec.set_position(100, 200).unwrap();
        codec.press(ButtonMask::LEFT).unwrap();
        codec.release(ButtonMask::LEFT).unwrap();
        codec.release_all().unwrap();

        // Assert
        assert_eq!(
            transport.reports(),
            vec![
                [0x00, 100, 0, 200, 0, 0],
                [0x01, 100, 0, 200, 0, 0],
                [0x00, 100, 0, 200, 0, 0],
                [0x00, 100, 0, 200, 0, 0],
            ]
        );
    }

    #[test]
    fn test_buttons_persist_across_moves() {
        let (mut codec, transport, _) = recording_codec();

        codec.press(ButtonMask::RIGHT).unwrap();
        codec.set_position(1, 2).unwrap();

        assert_eq!(transport.reports().last(), Some(&[0x02, 1, 0, 2, 0, 0]));
    }

    // ── Wheel ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_large_wheel_delta_is_split_into_chunks() {
        // Arrange
        let (mut codec, transport, _) = recording_codec();

        // Act
        codec.set_wheel(300).unwrap();

        // Assert
        let wheel: Vec<i8> = transport.reports().iter().map(|r| r[5] as i8).collect();
        assert_eq!(wheel, vec![127, 127, 46]);
        assert_eq!(codec.state().wheel(), 0);
    }

    #[test]
    fn test_negative_wheel_delta_is_split_into_chunks() {
        let (mut codec, transport, _) = recording_codec();

        codec.set_wheel(-130).unwrap();

        let wheel: Vec<i8> = transport.reports().iter().map(|r| r[5] as i8).collect();
        assert_eq!(wheel, vec![-127, -3]);
    }

    #[test]
    fn test_zero_wheel_delta_sends_nothing() {
        let (mut codec, transport, _) = recording_codec();
        codec.set_wheel(0).unwrap();
        assert!(transport.reports().is_empty());
    }

    // ── Retry ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_transient_failure_is_retried_once_after_backoff() {
        // Arrange
        let mut mock = MockHidTransport::new();
        let mut calls = 0;
        mock.expect_send_report()
            .withf(|report| report[0] == 0x01)
            .times(2)
            .returning(move |_| {
                calls += 1;
                if calls == 1 {
                    Err(HidError::NotReady)
                } else {
                    Ok(())
                }
            });
        let clock = Arc::new(ManualClock::new());
        let mut codec = ReportCodec::new(Box::new(mock), clock.clone())
            .with_retry_backoff(Duration::from_millis(250));

        // Act
        let result = codec.press(ButtonMask::LEFT);

        // Assert
        assert!(result.is_ok());
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(250)]);
    }

    #[test]
    fn test_second_failure_is_fatal() {
        // Arrange
        let mut mock = MockHidTransport::new();
        mock.expect_send_report()
            .times(2)
            .returning(|_| Err(HidError::NotReady));
        let mut codec = ReportCodec::new(Box::new(mock), Arc::new(ManualClock::new()));

        // Act
        let result = codec.set_position(10, 10);

        // Assert
        assert!(matches!(
            result,
            Err(CodecError::TransportFatal { source: HidError::NotReady })
        ));
    }

    #[test]
    fn test_wheel_stops_at_first_fatal_chunk() {
        let (mut codec, transport, _) = recording_codec();
        transport.fail_next(2);

        let result = codec.set_wheel(500);

        assert!(result.is_err());
        assert!(transport.reports().is_empty());
        assert_eq!(codec.state().wheel(), 0);
    }
}
