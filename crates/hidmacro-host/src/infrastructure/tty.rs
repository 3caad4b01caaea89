//! Raw terminal mode for the host end of the serial link.
//!
//! A USB CDC-ACM port such as `/dev/ttyACM0` opens with the kernel's line
//! discipline enabled, which echoes device replies back to the device and
//! translates newlines.  [`set_raw_mode`] clears it with `cfmakeraw`.  Files
//! that are not terminals are left untouched.

use std::fs::File;
use std::io;

/// Puts the terminal behind `file` into raw mode; a no-op for non-terminals.
///
/// # Errors
///
/// Returns the OS error if the terminal settings cannot be read or written.
#[cfg(unix)]
pub fn set_raw_mode(file: &File) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::termios::{cfmakeraw, tcgetattr, tcsetattr, SetArg};

    let mut termios = match tcgetattr(file) {
        Ok(termios) => termios,
        Err(Errno::ENOTTY) => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    cfmakeraw(&mut termios);
    tcsetattr(file, SetArg::TCSANOW, &termios)?;
    Ok(())
}

#[cfg(not(unix))]
pub fn set_raw_mode(_file: &File) -> io::Result<()> {
    Ok(())
}
