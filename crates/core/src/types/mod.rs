//! Core types for the ordering bot.
//!
//! Type-safe wrappers for identities, statuses and validated user input.

pub mod id;
pub mod name;
pub mod status;

pub use id::*;
pub use name::{NameError, PartyName};
pub use status::*;
