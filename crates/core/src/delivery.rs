//! Delivery slot computation.
//!
//! A slot is a delivery date picked from a rolling window starting tomorrow,
//! plus one of a fixed list of time intervals. Everything here is a pure
//! function of the supplied "now"; nothing is cached.

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

/// Number of selectable delivery dates.
pub const DELIVERY_WINDOW_DAYS: u64 = 7;

/// Orders can be cancelled only while more than this remains before the
/// delivery interval starts.
pub const CANCELLATION_CUTOFF: TimeDelta = TimeDelta::hours(6);

/// Selectable delivery intervals, in display order.
pub const DELIVERY_INTERVALS: [&str; 11] = [
    "6:00 - 8:00",
    "6:30 - 8:30",
    "7:00 - 9:00",
    "7:30 - 9:30",
    "8:00 - 10:00",
    "8:30 - 10:30",
    "9:00 - 11:00",
    "9:30 - 11:30",
    "10:00 - 12:00",
    "10:30 - 12:30",
    "11:00 - 13:00",
];

/// Format used for date selection keys and the ledger's textual dates.
pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Short date label shown on buttons and in reports.
pub const DATE_LABEL_FORMAT: &str = "%d.%m";

/// Full date shown in confirmations.
pub const DATE_DISPLAY_FORMAT: &str = "%d.%m.%Y";

/// Errors produced while interpreting slot input.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The interval is not one of [`DELIVERY_INTERVALS`].
    #[error("unknown delivery interval: {0}")]
    UnknownInterval(String),
    /// The date key is not `YYYY-MM-DD`.
    #[error("malformed delivery date: {0}")]
    MalformedDate(String),
}

/// One of the fixed delivery intervals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct DeliveryInterval {
    label: &'static str,
    start: NaiveTime,
}

impl DeliveryInterval {
    /// All intervals in display order.
    pub fn all() -> impl Iterator<Item = Self> {
        DELIVERY_INTERVALS.iter().filter_map(|label| Self::parse(label).ok())
    }

    /// Parse an interval label such as `"9:00 - 11:00"`.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::UnknownInterval`] if the label is not in the
    /// fixed list.
    pub fn parse(s: &str) -> Result<Self, DeliveryError> {
        let trimmed = s.trim();
        let label = DELIVERY_INTERVALS
            .iter()
            .copied()
            .find(|known| *known == trimmed)
            .ok_or_else(|| DeliveryError::UnknownInterval(trimmed.to_owned()))?;

        let start = label
            .split(" - ")
            .next()
            .and_then(|start| NaiveTime::parse_from_str(start, "%H:%M").ok())
            .ok_or_else(|| DeliveryError::UnknownInterval(trimmed.to_owned()))?;

        Ok(Self { label, start })
    }

    /// The interval label, e.g. `"9:00 - 11:00"`.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.label
    }

    /// Start of the interval.
    #[must_use]
    pub const fn start(&self) -> NaiveTime {
        self.start
    }
}

impl std::fmt::Display for DeliveryInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label)
    }
}

impl TryFrom<String> for DeliveryInterval {
    type Error = DeliveryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

// Deserialized via `String` + `TryFrom`; the derive would require `'de: 'static`
// because of the `&'static str` field.
impl<'de> Deserialize<'de> for DeliveryInterval {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::try_from(value).map_err(serde::de::Error::custom)
    }
}

impl From<DeliveryInterval> for String {
    fn from(value: DeliveryInterval) -> Self {
        value.label.to_owned()
    }
}

/// A chosen delivery date and interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverySlot {
    pub date: NaiveDate,
    pub interval: DeliveryInterval,
}

impl DeliverySlot {
    #[must_use]
    pub const fn new(date: NaiveDate, interval: DeliveryInterval) -> Self {
        Self { date, interval }
    }

    /// Moment the delivery interval starts.
    #[must_use]
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.interval.start())
    }

    /// Whether the order for this slot may still be cancelled at `now`.
    #[must_use]
    pub fn can_cancel_at(&self, now: NaiveDateTime) -> bool {
        can_cancel(self.starts_at(), now)
    }
}

/// Cancellation is allowed only while strictly more than
/// [`CANCELLATION_CUTOFF`] remains; exactly six hours already blocks it.
#[must_use]
pub fn can_cancel(delivery_at: NaiveDateTime, now: NaiveDateTime) -> bool {
    delivery_at - now > CANCELLATION_CUTOFF
}

/// The selectable delivery dates: seven days starting tomorrow.
#[must_use]
pub fn available_dates(now: NaiveDateTime) -> Vec<NaiveDate> {
    let today = now.date();
    (1..=DELIVERY_WINDOW_DAYS)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .collect()
}

/// The fixed ordered list of delivery intervals.
#[must_use]
pub fn available_time_intervals() -> Vec<DeliveryInterval> {
    DeliveryInterval::all().collect()
}

/// Parse a `YYYY-MM-DD` date key.
///
/// # Errors
///
/// Returns [`DeliveryError::MalformedDate`] if the key does not parse.
pub fn parse_date_key(key: &str) -> Result<NaiveDate, DeliveryError> {
    NaiveDate::parse_from_str(key.trim(), DATE_KEY_FORMAT)
        .map_err(|_| DeliveryError::MalformedDate(key.to_owned()))
}

/// Render a date as a selection key.
#[must_use]
pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M")
            .expect("valid datetime")
    }

    #[test]
    fn test_available_dates_start_tomorrow() {
        let dates = available_dates(at("2025-03-09", "23:59"));
        assert_eq!(dates.len(), 7);
        assert_eq!(dates.first().map(|d| date_key(*d)).as_deref(), Some("2025-03-10"));
        assert_eq!(dates.last().map(|d| date_key(*d)).as_deref(), Some("2025-03-16"));
    }

    #[test]
    fn test_available_dates_cross_month() {
        let dates = available_dates(at("2025-02-27", "08:00"));
        let keys: Vec<_> = dates.into_iter().map(date_key).collect();
        assert_eq!(keys.get(1).map(String::as_str), Some("2025-03-01"));
    }

    #[test]
    fn test_intervals_are_ordered_and_complete() {
        let intervals = available_time_intervals();
        assert_eq!(intervals.len(), DELIVERY_INTERVALS.len());
        assert_eq!(intervals.first().map(DeliveryInterval::label), Some("6:00 - 8:00"));
        assert_eq!(intervals.last().map(DeliveryInterval::label), Some("11:00 - 13:00"));
    }

    #[test]
    fn test_interval_start_time() {
        let interval = DeliveryInterval::parse("9:30 - 11:30").expect("known");
        assert_eq!(interval.start(), NaiveTime::from_hms_opt(9, 30, 0).expect("valid"));
    }

    #[test]
    fn test_unknown_interval_rejected() {
        assert_eq!(
            DeliveryInterval::parse("5:00 - 7:00"),
            Err(DeliveryError::UnknownInterval("5:00 - 7:00".to_string()))
        );
    }

    #[test]
    fn test_slot_start_combines_date_and_interval() {
        let slot = DeliverySlot::new(
            parse_date_key("2025-03-10").expect("valid"),
            DeliveryInterval::parse("6:00 - 8:00").expect("known"),
        );
        assert_eq!(slot.starts_at(), at("2025-03-10", "06:00"));
    }

    #[test]
    fn test_cutoff_boundary_is_exclusive() {
        let delivery = at("2025-03-10", "06:00");
        assert!(can_cancel(delivery, at("2025-03-09", "23:59")));
        assert!(!can_cancel(delivery, at("2025-03-10", "00:00")));
        assert!(!can_cancel(delivery, at("2025-03-10", "05:00")));
        assert!(!can_cancel(delivery, at("2025-03-11", "05:00")));
    }

    #[test]
    fn test_interval_serde_uses_label() {
        let interval = DeliveryInterval::parse("7:00 - 9:00").expect("known");
        let json = serde_json::to_string(&interval).expect("serialize");
        assert_eq!(json, "\"7:00 - 9:00\"");
        let back: DeliveryInterval = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, interval);
    }

    #[test]
    fn test_malformed_date_key() {
        assert!(parse_date_key("10.03.2025").is_err());
    }
}
