//! Application layer use cases for the host tooling.

pub mod record_clicks;
