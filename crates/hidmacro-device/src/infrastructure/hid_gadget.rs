//! HID transport over a Linux USB gadget node (`/dev/hidgN`).
//!
//! # What is a HID gadget? (for beginners)
//!
//! Linux boards with a USB device controller (Raspberry Pi Zero, many SBCs)
//! can pretend to be a USB peripheral through *configfs*.  When a HID function
//! is configured with our report descriptor (see `hidmacro-device
//! descriptor`), the kernel creates a character device such as `/dev/hidg0`.
//! Writing exactly one report's worth of bytes to that file sends one input
//! report to the connected computer.
//!
//! Until the computer has enumerated the gadget, writes fail with
//! `ESHUTDOWN`.  That case is mapped to [`HidError::NotReady`] so the codec's
//! retry-once policy can absorb it.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use hidmacro_core::hid::report::REPORT_LEN;
use hidmacro_core::{HidError, HidTransport};
use tracing::info;

/// `ESHUTDOWN` on Linux: the gadget is not connected to a host.
const ESHUTDOWN: i32 = 108;

/// Sends reports by writing them to a gadget node (or any writer).
pub struct HidGadgetTransport<W = File> {
    writer: W,
}

impl HidGadgetTransport<File> {
    /// Opens the gadget node at `path` for writing.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the node cannot be opened.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().write(true).open(path)?;
        info!("HID gadget open on {}", path.display());
        Ok(Self::new(file))
    }
}

impl<W: Write> HidGadgetTransport<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> HidTransport for HidGadgetTransport<W> {
    fn send_report(&mut self, report: &[u8; REPORT_LEN]) -> Result<(), HidError> {
        self.writer.write_all(report).map_err(classify)?;
        self.writer.flush().map_err(classify)
    }
}

fn classify(e: io::Error) -> HidError {
    if e.raw_os_error() == Some(ESHUTDOWN) || e.kind() == io::ErrorKind::WouldBlock {
        HidError::NotReady
    } else {
        HidError::Io(e)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingWriter(fn() -> io::Error);

    impl Write for FailingWriter {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err((self.0)())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_send_report_writes_exactly_one_report() {
        // Arrange
        let mut transport = HidGadgetTransport::new(Vec::new());

        // Act
        transport.send_report(&[1, 2, 3, 4, 5, 6]).unwrap();
        transport.send_report(&[0; REPORT_LEN]).unwrap();

        // Assert
        assert_eq!(transport.into_inner(), vec![1, 2, 3, 4, 5, 6, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_eshutdown_maps_to_not_ready() {
        let mut transport =
            HidGadgetTransport::new(FailingWriter(|| io::Error::from_raw_os_error(ESHUTDOWN)));

        assert!(matches!(
            transport.send_report(&[0; REPORT_LEN]),
            Err(HidError::NotReady)
        ));
    }

    #[test]
    fn test_other_errors_map_to_io() {
        let mut transport = HidGadgetTransport::new(FailingWriter(|| {
            io::Error::new(io::ErrorKind::PermissionDenied, "denied")
        }));

        assert!(matches!(
            transport.send_report(&[0; REPORT_LEN]),
            Err(HidError::Io(_))
        ));
    }
}
