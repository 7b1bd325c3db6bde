//! Per-client, per-product order aggregation and CSV export.
//!
//! Rows are keyed by `(delivery date, contact person, organization)` and hold
//! one quantity per catalog product, in catalog order. Only active orders
//! contribute.

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{Datelike, Months, NaiveDate};
use thiserror::Error;
use tracing::{debug, instrument};

use krash_order_core::catalog::column_for;
use krash_order_core::delivery::{DATE_KEY_FORMAT, DATE_LABEL_FORMAT};
use krash_order_core::{Catalog, Order};

use crate::db::{RepositoryError, Store};

/// A `/stats` argument that is neither `DD.MM` nor `MM.YYYY`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid report period: {0}")]
pub struct PeriodError(String);

/// An inclusive range of delivery dates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportPeriod {
    /// A single day.
    #[must_use]
    pub const fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// A whole calendar month.
    #[must_use]
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let end = start.checked_add_months(Months::new(1))?.pred_opt()?;
        Some(Self { start, end })
    }

    /// Parse a `/stats` argument.
    ///
    /// - none: the month containing `today`
    /// - `DD.MM`: that day of `today`'s year
    /// - `MM.YYYY`: that month
    ///
    /// # Errors
    ///
    /// Returns [`PeriodError`] for any other shape or an impossible date.
    pub fn parse(arg: Option<&str>, today: NaiveDate) -> Result<Self, PeriodError> {
        let Some(arg) = arg.map(str::trim).filter(|a| !a.is_empty()) else {
            return Self::month(today.year(), today.month())
                .ok_or_else(|| PeriodError(today.to_string()));
        };

        let invalid = || PeriodError(arg.to_string());
        let (first, second) = arg.split_once('.').ok_or_else(invalid)?;
        if second.contains('.') {
            return Err(invalid());
        }

        match second.len() {
            2 => {
                let day: u32 = first.parse().map_err(|_| invalid())?;
                let month: u32 = second.parse().map_err(|_| invalid())?;
                NaiveDate::from_ymd_opt(today.year(), month, day)
                    .map(Self::day)
                    .ok_or_else(invalid)
            }
            4 => {
                let month: u32 = first.parse().map_err(|_| invalid())?;
                let year: i32 = second.parse().map_err(|_| invalid())?;
                Self::month(year, month).ok_or_else(invalid)
            }
            _ => Err(invalid()),
        }
    }

    /// Human-readable label, also the first row of the CSV.
    #[must_use]
    pub fn label(&self) -> String {
        if self.start == self.end {
            format!("Данные за {}", self.start.format(DATE_LABEL_FORMAT))
        } else {
            format!(
                "Данные с {} по {}",
                self.start.format(DATE_LABEL_FORMAT),
                self.end.format(DATE_LABEL_FORMAT)
            )
        }
    }

    /// File name of the exported document.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "orders_{}_{}.csv",
            self.start.format(DATE_KEY_FORMAT).to_string().replace('-', ""),
            self.end.format(DATE_KEY_FORMAT).to_string().replace('-', "")
        )
    }
}

/// One client's quantities for one delivery date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub date: NaiveDate,
    pub contact_person: String,
    pub organization: String,
    /// Indexed by product id - 1.
    pub quantities: Vec<u64>,
}

/// Aggregated quantities with column totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub rows: Vec<ReportRow>,
    pub totals: Vec<u64>,
}

impl Report {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render as CSV: period label row, header row, data rows, totals row.
    #[must_use]
    pub fn to_csv(&self, period_label: &str) -> String {
        let width = 3 + Catalog::len();
        let mut csv = String::new();

        let mut label_row = vec![period_label.to_string()];
        label_row.resize(width, String::new());
        push_record(&mut csv, &label_row);

        let mut header: Vec<String> = ["Дата", "Клиент", "Организация"]
            .into_iter()
            .map(str::to_string)
            .collect();
        header.extend(Catalog::all().iter().map(|p| p.report_label.to_string()));
        push_record(&mut csv, &header);

        for row in &self.rows {
            let mut record = vec![
                row.date.format(DATE_LABEL_FORMAT).to_string(),
                row.contact_person.clone(),
                row.organization.clone(),
            ];
            record.extend(row.quantities.iter().map(u64::to_string));
            push_record(&mut csv, &record);
        }

        let mut totals = vec!["Итого".to_string(), String::new(), String::new()];
        totals.extend(self.totals.iter().map(u64::to_string));
        push_record(&mut csv, &totals);

        csv
    }
}

fn push_record(csv: &mut String, fields: &[String]) {
    let line = fields
        .iter()
        .map(|f| escape_field(f))
        .collect::<Vec<_>>()
        .join(",");
    let _ = write!(csv, "{line}\r\n");
}

/// Quote a field when it contains a delimiter, quote or line break.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Sum active orders into report rows sorted by date, then client.
#[must_use]
pub fn aggregate(orders: &[Order]) -> Report {
    let columns = Catalog::len();
    let mut grouped: BTreeMap<(NaiveDate, String, String), Vec<u64>> = BTreeMap::new();

    for order in orders.iter().filter(|o| o.status.is_active()) {
        let data = &order.order_data;
        let quantities = grouped
            .entry((
                order.delivery_date,
                data.contact_person.clone(),
                data.organization.clone(),
            ))
            .or_insert_with(|| vec![0; columns]);

        for item in &data.items {
            // products outside the catalog have no column
            let Some(index) = column_for(item.product.id) else {
                continue;
            };
            if let Some(count) = quantities.get_mut(index) {
                *count += u64::from(item.quantity);
            }
        }
    }

    let mut totals = vec![0_u64; columns];
    let rows = grouped
        .into_iter()
        .map(|((date, contact_person, organization), quantities)| {
            for (total, quantity) in totals.iter_mut().zip(&quantities) {
                *total += quantity;
            }
            ReportRow {
                date,
                contact_person,
                organization,
                quantities,
            }
        })
        .collect();

    Report { rows, totals }
}

/// Aggregate every active order delivered within `period`.
///
/// An empty ledger range yields an empty report, not an error.
///
/// # Errors
///
/// Returns error if the ledger cannot be read.
#[instrument(skip(store), fields(start = %period.start, end = %period.end))]
pub async fn aggregate_range(
    store: &dyn Store,
    period: &ReportPeriod,
) -> Result<Report, RepositoryError> {
    let orders = store.orders_in_range(period.start, period.end).await?;
    let report = aggregate(&orders);
    debug!(orders = orders.len(), rows = report.rows.len(), "Report aggregated");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use krash_order_core::delivery::parse_date_key;
    use krash_order_core::{
        DeliveryInterval, OrderId, OrderItem, OrderSnapshot, OrderStatus, ProductId, UserId,
    };

    fn date(key: &str) -> NaiveDate {
        parse_date_key(key).expect("valid")
    }

    fn order(id: i32, day: &str, contact: &str, items: &[(i32, u32)], status: OrderStatus) -> Order {
        Order {
            order_id: OrderId::new(id),
            user_id: UserId::new(1),
            order_data: OrderSnapshot {
                organization: "Рога".to_string(),
                contact_person: contact.to_string(),
                username: None,
                items: items
                    .iter()
                    .map(|(product, quantity)| OrderItem {
                        product: Catalog::get(ProductId::new(*product))
                            .expect("exists")
                            .snapshot(),
                        quantity: *quantity,
                    })
                    .collect(),
            },
            delivery_date: date(day),
            delivery_time: DeliveryInterval::parse("6:00 - 8:00").expect("known"),
            status,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_input_gives_empty_report() {
        let report = aggregate(&[]);
        assert!(report.is_empty());
        assert_eq!(report.totals, vec![0; Catalog::len()]);
    }

    #[test]
    fn test_only_active_orders_count() {
        let orders = vec![
            order(1, "2025-03-10", "Иван", &[(1, 2)], OrderStatus::Active),
            order(2, "2025-03-10", "Иван", &[(1, 5)], OrderStatus::Cancelled),
            order(3, "2025-03-10", "Иван", &[(1, 1), (13, 4)], OrderStatus::Active),
        ];
        let report = aggregate(&orders);
        assert_eq!(report.rows.len(), 1);
        let row = report.rows.first().expect("row");
        assert_eq!(row.quantities.first(), Some(&3));
        assert_eq!(row.quantities.last(), Some(&4));
        assert_eq!(report.totals.first(), Some(&3));
    }

    #[test]
    fn test_rows_sorted_by_date_then_client() {
        let orders = vec![
            order(1, "2025-03-11", "Анна", &[(2, 1)], OrderStatus::Active),
            order(2, "2025-03-10", "Яков", &[(2, 1)], OrderStatus::Active),
            order(3, "2025-03-10", "Борис", &[(2, 1)], OrderStatus::Active),
        ];
        let report = aggregate(&orders);
        let keys: Vec<_> = report
            .rows
            .iter()
            .map(|r| (r.date.format(DATE_LABEL_FORMAT).to_string(), r.contact_person.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("10.03".to_string(), "Борис"),
                ("10.03".to_string(), "Яков"),
                ("11.03".to_string(), "Анна"),
            ]
        );
        assert_eq!(report.totals.get(1), Some(&3));
    }

    #[test]
    fn test_csv_layout() {
        let orders = vec![order(1, "2025-03-10", "Иван", &[(1, 2), (2, 1)], OrderStatus::Active)];
        let csv = aggregate(&orders).to_csv("Данные за 10.03");
        let lines: Vec<_> = csv.split("\r\n").filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines.first().map(|l| l.split(',').count()), Some(16));
        assert!(lines.get(1).is_some_and(|l| l.starts_with("Дата,Клиент,Организация,Классический,")));
        assert_eq!(
            lines.get(2).copied(),
            Some("10.03,Иван,Рога,2,1,0,0,0,0,0,0,0,0,0,0,0")
        );
        assert_eq!(lines.get(3).copied(), Some("Итого,,,2,1,0,0,0,0,0,0,0,0,0,0,0"));
    }

    #[test]
    fn test_csv_escaping() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_period_parsing() {
        let today = date("2025-03-09");

        let month = ReportPeriod::parse(None, today).expect("default");
        assert_eq!((month.start, month.end), (date("2025-03-01"), date("2025-03-31")));
        assert_eq!(month.label(), "Данные с 01.03 по 31.03");
        assert_eq!(month.file_name(), "orders_20250301_20250331.csv");

        let day = ReportPeriod::parse(Some("10.03"), today).expect("day");
        assert_eq!(day, ReportPeriod::day(date("2025-03-10")));
        assert_eq!(day.label(), "Данные за 10.03");

        let feb = ReportPeriod::parse(Some("02.2024"), today).expect("month");
        assert_eq!(feb.end, date("2024-02-29"));

        let dec = ReportPeriod::parse(Some("12.2025"), today).expect("month");
        assert_eq!(dec.end, date("2025-12-31"));
    }

    #[test]
    fn test_period_rejects_bad_input() {
        let today = date("2025-03-09");
        for bad in ["10", "10.3.2025", "31.02", "13.2025", "aa.bb", "1.123"] {
            assert!(ReportPeriod::parse(Some(bad), today).is_err(), "{bad}");
        }
    }
}
