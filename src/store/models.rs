//! Record types read from the business store.

use chrono::NaiveDateTime;

/// Text format every timestamp column is written in. Fixed width, so
/// lexicographic order equals chronological order.
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn format_date(dt: &NaiveDateTime) -> String {
    dt.format(DATE_FORMAT).to_string()
}

pub fn parse_date(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, DATE_FORMAT)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sale {
    pub id: i64,
    pub product_id: Option<i64>,
    /// Joined from inventory; `None` when the product was deleted.
    pub product_name: Option<String>,
    pub customer_id: Option<i64>,
    pub customer_name: Option<String>,
    pub amount: f64,
    pub profit: f64,
    pub quantity: i64,
    pub date: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expense {
    pub id: i64,
    pub category: String,
    pub description: String,
    pub amount: f64,
    pub date: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub price: f64,
    pub stock: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    pub id: i64,
    pub customer_id: i64,
    pub kind: String,
    pub notes: String,
    pub date: NaiveDateTime,
}

// ── Aggregates ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SalesTotals {
    pub total_amount: f64,
    pub total_profit: f64,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpenseTotals {
    pub total: f64,
    pub count: i64,
    /// Sorted by `total` descending.
    pub by_category: Vec<CategoryTotal>,
}

/// A customer joined with the sum of their sales.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerSpend {
    pub customer: Customer,
    pub total_amount: f64,
    pub sale_count: i64,
}

// ── Write-side inputs ────────────────────────────────────────────────────────

/// Insert payloads. The CRUD side of the product owns writes; these exist
/// for seeding and fixtures.
#[derive(Debug, Clone)]
pub struct NewSale {
    pub product_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub amount: f64,
    pub profit: f64,
    pub quantity: i64,
    pub date: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewExpense {
    pub category: String,
    pub description: String,
    pub amount: f64,
    pub date: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    pub price: f64,
    pub stock: i64,
}

#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewInteraction {
    pub customer_id: i64,
    pub kind: String,
    pub notes: String,
    pub date: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn date_text_sorts_chronologically() {
        let a = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap().and_hms_opt(23, 0, 0).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap().and_hms_opt(1, 0, 0).unwrap();
        assert!(format_date(&a) < format_date(&b));
    }

    #[test]
    fn date_parse_inverts_format() {
        let dt = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().and_hms_opt(9, 30, 0).unwrap();
        assert_eq!(format_date(&dt), "2024-01-15T09:30:00");
        assert_eq!(parse_date("2024-01-15T09:30:00").unwrap(), dt);
        assert!(parse_date("15/01/2024").is_err());
    }
}
