//! # hidmacro-core
//!
//! Shared library for hidmacro containing the line-oriented command protocol,
//! the absolute-mouse HID report codec, the macro store, and the playback
//! engine that replays stored macros as HID reports.
//!
//! This crate is used by both the device runtime and the host tooling.
//! It has zero dependencies on OS APIs, serial ports, or USB gadget nodes:
//! every piece of I/O is reached through a trait ([`hid::HidTransport`],
//! [`clock::Clock`]) that the outer crates implement.
//!
//! # Architecture overview (for beginners)
//!
//! hidmacro lets a desktop machine record mouse clicks and a small USB device
//! replay them by pretending to be an *absolute* mouse (a pointer that jumps to
//! a position instead of moving by deltas, like a touchscreen or a tablet).
//!
//! This crate (`hidmacro-core`) is the shared foundation.  It defines:
//!
//! - **`hid`** – How pointer operations become bytes.  Pixel coordinates are
//!   mapped into the 0–32767 absolute range and packed into a fixed 6-byte
//!   report `[buttons, x_lo, x_hi, y_lo, y_hi, wheel]`.
//!
//! - **`domain`** – The timed [`Action`] model, its JSON schema, and the
//!   in-memory [`MacroStore`] that maps macro names to action lists.
//!
//! - **`playback`** – The tick-driven [`PlaybackEngine`] state machine that walks
//!   a macro, emits reports through the codec, and stays responsive to `STOP`.
//!
//! - **`clock`** – A [`Clock`] seam over "now" and "sleep" so timing-sensitive
//!   code can be driven by a [`ManualClock`] in tests.
//!
//! - **`protocol`** – The newline-delimited text commands (`PING`, `PLAY:demo`,
//!   ...) exchanged between host and device, and their one-line replies.

pub mod clock;
pub mod domain;
pub mod hid;
pub mod playback;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `hidmacro_core::MacroStore` instead of `hidmacro_core::domain::store::MacroStore`.
pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::action::{Action, ActionError, MouseButton};
pub use domain::store::{MacroStore, StoreError};
pub use hid::codec::{CodecError, ReportCodec};
pub use hid::mapper::{pixel_to_absolute, GeometryError, ScreenGeometry};
pub use hid::report::{ButtonMask, PointerState};
pub use hid::{HidError, HidTransport};
pub use playback::engine::{PlaybackEngine, PlaybackState, Tick};
pub use protocol::command::{parse_command, Command, ProtocolError, Reply};
