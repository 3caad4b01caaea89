//! Macro playback.
//!
//! # How playback stays responsive (for beginners)
//!
//! A macro is a list of actions separated by delays, and a looping macro never
//! ends on its own.  The obvious implementation (`for action in macro { do it;
//! sleep(delay) }`) would make the device deaf to a `STOP` command until the
//! whole loop finished.
//!
//! Instead, [`engine::PlaybackEngine`] is a small state machine that is
//! *advanced* one step at a time by the device's scheduler.  Every step
//! returns the instant at which the next step is due; the scheduler sleeps in
//! short slices until then and reads the serial line in between.  A `STOP`
//! therefore takes effect within one slice, even in the middle of a long delay.

pub mod engine;
