//! Scripted command line for tests.
//!
//! # Why a scripted line?
//!
//! The serial gadget only exists on real hardware, and driving it from a
//! test would mean a second process on the other end of the cable.
//! [`ScriptedLineTransport`] instead hands out lines queued by the test and
//! records every reply.  It is `Clone`; clones share state, so the test can
//! keep one handle while the scheduler owns another, and push a `STOP` in the
//! middle of a running macro.
//!
//! Once the queue is empty, `poll_line` returns `None` until
//! [`close`](ScriptedLineTransport::close) is called, after which it reports
//! [`LineError::Closed`].

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::application::run_scheduler::{LineError, LineTransport};

#[derive(Debug, Default)]
struct Inner {
    pending: VecDeque<String>,
    replies: Vec<String>,
    closed: bool,
}

/// In-memory [`LineTransport`] fed by the test.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLineTransport {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedLineTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one inbound line.
    pub fn push_line(&self, line: impl Into<String>) {
        self.lock().pending.push_back(line.into());
    }

    /// Every reply written so far, oldest first.
    pub fn replies(&self) -> Vec<String> {
        self.lock().replies.clone()
    }

    /// Makes `poll_line` report [`LineError::Closed`] once the queue drains.
    pub fn close(&self) {
        self.lock().closed = true;
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LineTransport for ScriptedLineTransport {
    fn poll_line(&mut self) -> Result<Option<String>, LineError> {
        let mut inner = self.lock();
        match inner.pending.pop_front() {
            Some(line) => Ok(Some(line)),
            None if inner.closed => Err(LineError::Closed),
            None => Ok(None),
        }
    }

    fn write_line(&mut self, line: &str) -> Result<(), LineError> {
        self.lock().replies.push(line.to_string());
        Ok(())
    }
}
