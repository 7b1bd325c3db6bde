//! Krash Order Core - domain types for the bakery ordering bot.
//!
//! This crate is shared by:
//! - `bot` - the Telegram bot and its webhook server
//! - `cli` - operator tooling for migrations, admins and reports
//!
//! # Architecture
//!
//! Everything here is pure: no I/O, no database access, no HTTP clients, and
//! no clock reads. Functions that depend on time take "now" as an argument.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, order status, validated names
//! - [`catalog`] - The static product list
//! - [`cart`] - Per-user cart with an editing cursor
//! - [`delivery`] - Delivery dates, intervals and the cancellation cutoff
//! - [`order`] - Client profiles and order snapshots

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod delivery;
pub mod order;
pub mod types;

pub use cart::{Cart, CartLine, CartSnapshot, Direction, QuantityChange};
pub use catalog::{Catalog, Product, ProductSnapshot};
pub use delivery::{DeliveryError, DeliveryInterval, DeliverySlot};
pub use order::{ClientProfile, NewOrder, Order, OrderItem, OrderSnapshot};
pub use types::*;
