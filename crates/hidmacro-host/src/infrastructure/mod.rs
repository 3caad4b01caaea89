//! Infrastructure adapters for the host tooling.

pub mod link;
pub mod macro_file;
pub mod tty;
