//! Infrastructure adapters for the device runtime.

pub mod config;
pub mod hid_gadget;
pub mod line;
