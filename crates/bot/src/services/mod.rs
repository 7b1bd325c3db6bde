//! Business logic services for the bot.
//!
//! # Services
//!
//! - `admins` - Who is staff and where staff notifications go
//! - `notify` - Best-effort fan-out of staff notifications
//! - `ordering` - Registration, order commit and cancellation
//! - `report` - Ledger aggregation and CSV export

pub mod admins;
pub mod notify;
pub mod ordering;
pub mod report;

pub use admins::{AdminChange, AdminDirectory};
pub use notify::Notifier;
pub use ordering::{Cancelled, Committed, OrderError, OrderService, Precondition};
pub use report::{PeriodError, Report, ReportPeriod, ReportRow, aggregate, aggregate_range};
