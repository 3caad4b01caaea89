//! The 6-byte absolute-mouse input report.
//!
//! Report layout:
//! ```text
//! [buttons:1][x_lo:1][x_hi:1][y_lo:1][y_hi:1][wheel:1]
//! ```
//! - `buttons`: bit 0 = left, bit 1 = right, bit 2 = middle.
//! - `x`, `y`: little-endian unsigned 16-bit, `0..=32767`.
//! - `wheel`: signed 8-bit relative wheel motion, `-127..=127`.

use super::mapper::ABSOLUTE_MAX;

/// Size of one input report in bytes.
pub const REPORT_LEN: usize = 6;

/// Largest wheel motion that fits in one report.
pub const WHEEL_STEP_MAX: i8 = 127;

/// HID report descriptor for the absolute mouse described above.
///
/// Written to `functions/hid.usb0/report_desc` when the device runs as a Linux
/// USB gadget.  Usage page Generic Desktop / Mouse, three buttons padded to a
/// byte, X/Y absolute 0–32767, wheel relative −127..127.
pub const ABSOLUTE_MOUSE_REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, // USAGE_PAGE (Generic Desktop)
    0x09, 0x02, // USAGE (Mouse)
    0xA1, 0x01, // COLLECTION (Application)
    0x09, 0x01, //   USAGE (Pointer)
    0xA1, 0x00, //   COLLECTION (Physical)
    0x05, 0x09, //     USAGE_PAGE (Button)
    0x19, 0x01, //     USAGE_MINIMUM (Button 1)
    0x29, 0x03, //     USAGE_MAXIMUM (Button 3)
    0x15, 0x00, //     LOGICAL_MINIMUM (0)
    0x25, 0x01, //     LOGICAL_MAXIMUM (1)
    0x95, 0x03, //     REPORT_COUNT (3)
    0x75, 0x01, //     REPORT_SIZE (1)
    0x81, 0x02, //     INPUT (Data,Var,Abs)
    0x95, 0x01, //     REPORT_COUNT (1)
    0x75, 0x05, //     REPORT_SIZE (5)
    0x81, 0x03, //     INPUT (Cnst,Var,Abs)
    0x05, 0x01, //     USAGE_PAGE (Generic Desktop)
    0x09, 0x30, //     USAGE (X)
    0x09, 0x31, //     USAGE (Y)
    0x15, 0x00, //     LOGICAL_MINIMUM (0)
    0x26, 0xFF, 0x7F, // LOGICAL_MAXIMUM (32767)
    0x75, 0x10, //     REPORT_SIZE (16)
    0x95, 0x02, //     REPORT_COUNT (2)
    0x81, 0x02, //     INPUT (Data,Var,Abs)
    0x09, 0x38, //     USAGE (Wheel)
    0x15, 0x81, //     LOGICAL_MINIMUM (-127)
    0x25, 0x7F, //     LOGICAL_MAXIMUM (127)
    0x75, 0x08, //     REPORT_SIZE (8)
    0x95, 0x01, //     REPORT_COUNT (1)
    0x81, 0x06, //     INPUT (Data,Var,Rel)
    0xC0, //       END_COLLECTION
    0xC0, //     END_COLLECTION
];

/// Bitmask of mouse buttons as carried in report byte 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ButtonMask(pub u8);

impl ButtonMask {
    pub const NONE: ButtonMask = ButtonMask(0);
    pub const LEFT: ButtonMask = ButtonMask(1 << 0);
    pub const RIGHT: ButtonMask = ButtonMask(1 << 1);
    pub const MIDDLE: ButtonMask = ButtonMask(1 << 2);

    /// Returns `true` if every bit of `other` is set in `self`.
    pub fn contains(&self, other: ButtonMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for ButtonMask {
    type Output = ButtonMask;

    fn bitor(self, rhs: ButtonMask) -> ButtonMask {
        ButtonMask(self.0 | rhs.0)
    }
}

/// The live report buffer.
///
/// Button bits persist across sends until explicitly changed; coordinates are
/// rewritten on every move.  Mutation goes through [`super::codec::ReportCodec`],
/// which owns the only instance and flushes after each change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointerState {
    bytes: [u8; REPORT_LEN],
}

impl PointerState {
    /// Creates an all-zero report: no buttons, pointer at (0, 0), no wheel.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8; REPORT_LEN] {
        &self.bytes
    }

    pub fn buttons(&self) -> ButtonMask {
        ButtonMask(self.bytes[0])
    }

    /// Decoded `(x, y)` position.
    pub fn position(&self) -> (u16, u16) {
        (
            u16::from_le_bytes([self.bytes[1], self.bytes[2]]),
            u16::from_le_bytes([self.bytes[3], self.bytes[4]]),
        )
    }

    pub fn wheel(&self) -> i8 {
        self.bytes[5] as i8
    }

    pub(crate) fn press(&mut self, mask: ButtonMask) {
        self.bytes[0] |= mask.0;
    }

    pub(crate) fn release(&mut self, mask: ButtonMask) {
        self.bytes[0] &= !mask.0;
    }

    pub(crate) fn release_all(&mut self) {
        self.bytes[0] = 0;
    }

    /// Writes both coordinates, clamping each to `0..=32767`.
    pub(crate) fn set_position(&mut self, x: u16, y: u16) {
        let [x_lo, x_hi] = x.min(ABSOLUTE_MAX).to_le_bytes();
        let [y_lo, y_hi] = y.min(ABSOLUTE_MAX).to_le_bytes();
        self.bytes[1] = x_lo;
        self.bytes[2] = x_hi;
        self.bytes[3] = y_lo;
        self.bytes[4] = y_hi;
    }

    pub(crate) fn set_wheel(&mut self, step: i8) {
        self.bytes[5] = step as u8;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
