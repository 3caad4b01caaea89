//! Application layer use cases for the device runtime.

pub mod handle_commands;
pub mod run_scheduler;
