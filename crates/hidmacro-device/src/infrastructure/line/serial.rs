//! Serial command line backed by a character device such as `/dev/ttyGS0`.
//!
//! # Polling a blocking device (for beginners)
//!
//! Reading from a tty blocks until data arrives, but the scheduler must never
//! block: it has playback to advance.  [`SerialLineTransport`] therefore
//! spawns one reader thread that owns the blocking side.  The thread frames
//! bytes into lines and pushes them into an `std::sync::mpsc` channel.  The
//! scheduler's [`poll_line`](LineTransport::poll_line) is a `try_recv` on that
//! channel, which is the "are bytes waiting?" check without touching the
//! device.
//!
//! The device is opened once for reading and writing and switched to raw
//! mode by [`set_raw_mode`](super::tty::set_raw_mode); the reader thread gets
//! a cloned handle.
//!
//! The reader thread only ever produces text.  It never sees the macro store
//! or the pointer state.
//!
//! # Framing
//!
//! Lines end at `\n`; a trailing `\r` is removed.  A line longer than
//! [`MAX_LINE_LEN`] is read to its end, discarded, and reported as
//! [`LineError::TooLong`] so the loop answers `ERROR` and carries on.

use std::fs::OpenOptions;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use hidmacro_core::protocol::MAX_LINE_LEN;
use tracing::{debug, info, warn};

use super::tty::set_raw_mode;
use crate::application::run_scheduler::{LineError, LineTransport};

/// Bytes of an oversized line drained per read while discarding it.
const DISCARD_CHUNK: u64 = 4096;

/// A polled, newline-framed command line over any byte stream.
pub struct SerialLineTransport {
    lines: Receiver<Result<String, LineError>>,
    writer: Box<dyn Write + Send>,
}

impl SerialLineTransport {
    /// Opens the serial device at `path` for reading and writing, in raw
    /// mode when it is a terminal.
    ///
    /// # Errors
    ///
    /// Returns [`LineError::Io`] if the device cannot be opened or configured.
    pub fn open(path: &Path) -> Result<Self, LineError> {
        let writer = OpenOptions::new().read(true).write(true).open(path)?;
        set_raw_mode(&writer)?;
        let reader = writer.try_clone()?;
        info!("serial command line open on {}", path.display());
        Ok(Self::from_io(reader, writer))
    }

    /// Wraps an arbitrary reader/writer pair, spawning the reader thread.
    pub fn from_io<R, W>(reader: R, writer: W) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("serial-reader".to_string())
            .spawn(move || {
                let mut reader = BufReader::new(reader);
                loop {
                    let frame = read_frame(&mut reader, MAX_LINE_LEN);
                    let stop = matches!(frame, Ok(None) | Err(LineError::Io(_)));
                    let message = match frame {
                        Ok(Some(line)) => Ok(line),
                        Ok(None) => break,
                        Err(e) => Err(e),
                    };
                    if tx.send(message).is_err() || stop {
                        break;
                    }
                }
                debug!("serial reader thread exiting");
            });

        if let Err(e) = spawned {
            // The receiver sees a disconnected channel, which reads as Closed.
            warn!("could not spawn serial reader thread: {e}");
        }

        Self {
            lines: rx,
            writer: Box::new(writer),
        }
    }
}

impl LineTransport for SerialLineTransport {
    fn poll_line(&mut self) -> Result<Option<String>, LineError> {
        match self.lines.try_recv() {
            Ok(frame) => frame.map(Some),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(LineError::Closed),
        }
    }

    fn write_line(&mut self, line: &str) -> Result<(), LineError> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Reads one frame from `reader`.
///
/// Returns `Ok(None)` at end of stream.  A final unterminated line before EOF
/// is returned as a normal line.
fn read_frame<R: BufRead>(reader: &mut R, max: usize) -> Result<Option<String>, LineError> {
    let mut buf = Vec::new();
    // Room for `max` bytes plus "\r\n".
    let limit = max as u64 + 2;
    let read = reader.by_ref().take(limit).read_until(b'\n', &mut buf)?;
    if read == 0 {
        return Ok(None);
    }

    let terminated = buf.last() == Some(&b'\n');
    if terminated {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if read as u64 == limit {
        let total = read + discard_rest_of_line(reader)?;
        return Err(LineError::TooLong(total));
    }

    if buf.len() > max {
        return Err(LineError::TooLong(buf.len()));
    }
    String::from_utf8(buf)
        .map(Some)
        .map_err(|_| LineError::InvalidUtf8)
}

fn discard_rest_of_line<R: BufRead>(reader: &mut R) -> io::Result<usize> {
    let mut skipped = 0;
    let mut chunk = Vec::new();
    loop {
        chunk.clear();
        let read = reader
            .by_ref()
            .take(DISCARD_CHUNK)
            .read_until(b'\n', &mut chunk)?;
        skipped += read;
        if read == 0 || chunk.last() == Some(&b'\n') {
            return Ok(skipped);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Polls until a frame or an error arrives from the reader thread.
    fn next_frame(transport: &mut SerialLineTransport) -> Result<String, LineError> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match transport.poll_line() {
                Ok(Some(line)) => return Ok(line),
                Ok(None) if Instant::now() < deadline => thread::sleep(Duration::from_millis(1)),
                Ok(None) => panic!("reader thread produced nothing"),
                Err(e) => return Err(e),
            }
        }
    }

    // ── read_frame ────────────────────────────────────────────────────────────

    #[test]
    fn test_read_frame_strips_lf_and_crlf() {
        let mut reader = Cursor::new(b"PING\nSTOP\r\nLIST".to_vec());

        assert_eq!(read_frame(&mut reader, 64).unwrap().as_deref(), Some("PING"));
        assert_eq!(read_frame(&mut reader, 64).unwrap().as_deref(), Some("STOP"));
        assert_eq!(read_frame(&mut reader, 64).unwrap().as_deref(), Some("LIST"));
        assert_eq!(read_frame(&mut reader, 64).unwrap(), None);
    }

    #[test]
    fn test_read_frame_discards_oversized_line_and_resyncs() {
        // Arrange
        let mut input = vec![b'x'; 100];
        input.extend_from_slice(b"\nPING\n");
        let mut reader = Cursor::new(input);

        // Act
        let first = read_frame(&mut reader, 16);
        let second = read_frame(&mut reader, 16);

        // Assert
        assert!(matches!(first, Err(LineError::TooLong(101))));
        assert_eq!(second.unwrap().as_deref(), Some("PING"));
    }

    #[test]
    fn test_read_frame_rejects_invalid_utf8() {
        let mut reader = Cursor::new(vec![0xFF, 0xFE, b'\n']);
        assert!(matches!(
            read_frame(&mut reader, 64),
            Err(LineError::InvalidUtf8)
        ));
    }

    #[test]
    fn test_empty_line_is_a_frame() {
        let mut reader = Cursor::new(b"\n".to_vec());
        assert_eq!(read_frame(&mut reader, 64).unwrap().as_deref(), Some(""));
    }

    // ── SerialLineTransport ───────────────────────────────────────────────────

    #[test]
    fn test_transport_delivers_lines_then_reports_closed() {
        // Arrange
        let mut transport =
            SerialLineTransport::from_io(Cursor::new(b"PING\n".to_vec()), SharedSink::default());

        // Act
        let first = next_frame(&mut transport);
        let second = next_frame(&mut transport);

        // Assert
        assert_eq!(first.unwrap(), "PING");
        assert!(matches!(second, Err(LineError::Closed)));
    }

    #[test]
    fn test_write_line_appends_newline() {
        let sink = SharedSink::default();
        let mut transport = SerialLineTransport::from_io(Cursor::new(Vec::new()), sink.clone());

        transport.write_line("OK").unwrap();
        transport.write_line("MACROS:a,b").unwrap();

        assert_eq!(sink.0.lock().unwrap().as_slice(), b"OK\nMACROS:a,b\n");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_open_on_pty_neither_echoes_nor_rewrites_newlines() {
        use nix::pty::{openpty, Winsize};
        use nix::sys::termios::Termios;
        use std::fs::File;
        use std::os::fd::AsRawFd;

        // Arrange
        let pty = openpty(None::<&Winsize>, None::<&Termios>).unwrap();
        let mut host = File::from(pty.master);
        let path = format!("/proc/self/fd/{}", pty.slave.as_raw_fd());
        let mut transport = SerialLineTransport::open(Path::new(&path)).unwrap();

        // Act
        host.write_all(b"PING\n").unwrap();
        let line = next_frame(&mut transport);
        transport.write_line("PONG").unwrap();

        // Assert
        assert_eq!(line.unwrap(), "PING");
        let mut reply = [0u8; 5];
        host.read_exact(&mut reply).unwrap();
        assert_eq!(&reply, b"PONG\n");
    }
}
