//! Absolute-mouse HID support: coordinate mapping, the report buffer, and the
//! codec that turns pointer operations into transmitted reports.
//!
//! # What is a HID report? (for beginners)
//!
//! USB Human Interface Devices (mice, keyboards, gamepads) talk to the host by
//! sending small fixed-layout byte buffers called *input reports*.  The layout
//! is declared once, at enumeration time, by a *report descriptor*; after that
//! every report is just raw bytes in the agreed positions.  This module keeps
//! one such buffer ([`report::PointerState`]) and sends it through a
//! [`HidTransport`] every time it changes.

pub mod codec;
pub mod mapper;
pub mod mock;
pub mod report;

use thiserror::Error;

use report::REPORT_LEN;

/// Failure of a single report transmission.
#[derive(Debug, Error)]
pub enum HidError {
    /// The HID endpoint is not ready yet (host has not finished enumeration).
    #[error("HID endpoint not ready")]
    NotReady,

    /// An I/O error occurred writing to the HID endpoint.
    #[error("HID I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sink for input reports.
///
/// The device binary implements this over a USB gadget node (`/dev/hidg0`);
/// tests use a recording implementation or a `mockall` mock.
#[cfg_attr(test, mockall::automock)]
pub trait HidTransport: Send {
    /// Transmits one complete report to the host.
    fn send_report(&mut self, report: &[u8; REPORT_LEN]) -> Result<(), HidError>;
}
