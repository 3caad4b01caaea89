//! Domain entities for hidmacro.
//!
//! This module contains pure business logic with no infrastructure
//! dependencies: the timed [`action::Action`] model with its JSON schema, and
//! the [`store::MacroStore`] that holds named action lists.
//!
//! Both the device (which replays macros) and the host (which records, saves
//! and uploads them) build on these types, so a macro file written on the
//! desktop and a `MACRO_DATA` payload parsed on the device go through exactly
//! the same validation.

pub mod action;
pub mod store;
