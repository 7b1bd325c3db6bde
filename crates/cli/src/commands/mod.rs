//! Command implementations.

pub mod admin;
pub mod migrate;
pub mod report;
pub mod webhook;
