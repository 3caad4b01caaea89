//! Raw terminal mode for the serial gadget.
//!
//! # Why raw mode (for beginners)
//!
//! A tty opened with default settings runs the kernel line discipline: it
//! echoes every received byte back to the sender, turns `\n` into `\r\n` on
//! output, and treats bytes such as `^C` as signals.  The host would then read
//! its own command back as the "reply".  [`set_raw_mode`] switches all of that
//! off with `cfmakeraw`, so the line carries exactly the bytes each side
//! writes.
//!
//! Files that are not terminals (a FIFO or a plain file used in a test) are
//! left as they are.

use std::fs::File;
use std::io;

/// Puts the terminal behind `file` into raw mode.
///
/// Succeeds without changes when `file` is not a terminal.
///
/// # Errors
///
/// Returns the OS error if the terminal settings cannot be read or written.
#[cfg(unix)]
pub fn set_raw_mode(file: &File) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::termios::{cfmakeraw, tcgetattr, tcsetattr, SetArg};
    use tracing::debug;

    let mut termios = match tcgetattr(file) {
        Ok(termios) => termios,
        Err(Errno::ENOTTY) => {
            debug!("not a terminal; leaving line settings unchanged");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    cfmakeraw(&mut termios);
    tcsetattr(file, SetArg::TCSANOW, &termios)?;
    debug!("terminal switched to raw mode");
    Ok(())
}

#[cfg(not(unix))]
pub fn set_raw_mode(_file: &File) -> io::Result<()> {
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
