//! Recording HID transport for tests.
//!
//! # Why a recording transport?
//!
//! The real transport writes to a USB gadget node, which only exists on a
//! board wired up as a USB device and cannot be observed from Rust test code.
//! [`RecordingHidTransport`] keeps every report in memory instead.  It is
//! `Clone`; clones share the same buffer, so a test can hand one clone to the
//! codec (which takes ownership) and keep another to inspect what was sent.
//!
//! # Failure injection
//!
//! [`RecordingHidTransport::fail_next`] makes the next `n` sends return
//! [`HidError::NotReady`] without recording anything, which exercises the
//! codec's retry-once policy.

use std::sync::{Arc, Mutex};

use super::report::REPORT_LEN;
use super::{HidError, HidTransport};

#[derive(Debug, Default)]
struct Inner {
    reports: Vec<[u8; REPORT_LEN]>,
    failures_pending: usize,
}

/// A HID transport that records reports instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct RecordingHidTransport {
    inner: Arc<Mutex<Inner>>,
}

impl RecordingHidTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every successfully "sent" report, oldest first.
    pub fn reports(&self) -> Vec<[u8; REPORT_LEN]> {
        self.lock().reports.clone()
    }

    /// Drops the recorded reports.
    pub fn clear(&self) {
        self.lock().reports.clear();
    }

    /// Makes the next `count` sends fail with [`HidError::NotReady`].
    pub fn fail_next(&self, count: usize) {
        self.lock().failures_pending = count;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl HidTransport for RecordingHidTransport {
    fn send_report(&mut self, report: &[u8; REPORT_LEN]) -> Result<(), HidError> {
        let mut inner = self.lock();
        if inner.failures_pending > 0 {
            inner.failures_pending -= 1;
            return Err(HidError::NotReady);
        }
        inner.reports.push(*report);
        Ok(())
    }
}
