//! Read-side queries. Every query is scoped by `owner_id`; substring
//! matches are case-insensitive (`instr(lower(..), lower(?))`).

use rusqlite::types::{Type, Value};
use rusqlite::{Connection, Row, params, params_from_iter};

use crate::error::AppError;

use super::models::*;
use super::{BusinessStore, ExpenseFilter, SaleFilter};

/// Accumulates `AND`-joined predicates with positional `?` parameters.
struct Predicates {
    clauses: Vec<&'static str>,
    values: Vec<Value>,
}

impl Predicates {
    fn owner(column: &'static str, owner_id: &str) -> Self {
        Self { clauses: vec![column], values: vec![Value::Text(owner_id.to_string())] }
    }

    fn push(&mut self, clause: &'static str, value: Value) {
        self.clauses.push(clause);
        self.values.push(value);
    }

    fn date_bounds(
        &mut self,
        start_clause: &'static str,
        end_clause: &'static str,
        start: Option<&chrono::NaiveDateTime>,
        end: Option<&chrono::NaiveDateTime>,
    ) {
        if let Some(start) = start {
            self.push(start_clause, Value::Text(format_date(start)));
        }
        if let Some(end) = end {
            self.push(end_clause, Value::Text(format_date(end)));
        }
    }

    fn sql(&self) -> String {
        format!(" WHERE {}", self.clauses.join(" AND "))
    }

    fn with_limit(mut self, limit: usize) -> Vec<Value> {
        self.values.push(Value::Integer(limit as i64));
        self.values
    }
}

fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<chrono::NaiveDateTime> {
    let text: String = row.get(idx)?;
    parse_date(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn collect<T>(
    conn: &Connection,
    sql: &str,
    values: Vec<Value>,
    what: &str,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>, AppError> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| AppError::Store(format!("prepare {what}: {e}")))?;
    let rows = stmt
        .query_map(params_from_iter(values), map)
        .map_err(|e| AppError::Store(format!("query {what}: {e}")))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| AppError::Store(format!("map {what} row: {e}")))?);
    }
    Ok(out)
}

// ── Row mappers ──────────────────────────────────────────────────────────────

const SALE_COLUMNS: &str = "SELECT s.id, s.product_id, i.name, s.customer_id, c.name, \
     s.amount, s.profit, s.quantity, s.date \
     FROM sales s \
     LEFT JOIN inventory i ON i.id = s.product_id \
     LEFT JOIN customers c ON c.id = s.customer_id";

fn sale_row(row: &Row<'_>) -> rusqlite::Result<Sale> {
    Ok(Sale {
        id: row.get(0)?,
        product_id: row.get(1)?,
        product_name: row.get(2)?,
        customer_id: row.get(3)?,
        customer_name: row.get(4)?,
        amount: row.get(5)?,
        profit: row.get(6)?,
        quantity: row.get(7)?,
        date: date_column(row, 8)?,
    })
}

fn expense_row(row: &Row<'_>) -> rusqlite::Result<Expense> {
    Ok(Expense {
        id: row.get(0)?,
        category: row.get(1)?,
        description: row.get(2)?,
        amount: row.get(3)?,
        date: date_column(row, 4)?,
    })
}

fn product_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        price: row.get(3)?,
        stock: row.get(4)?,
    })
}

fn customer_row(row: &Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
    })
}

fn interaction_row(row: &Row<'_>) -> rusqlite::Result<Interaction> {
    Ok(Interaction {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        kind: row.get(2)?,
        notes: row.get(3)?,
        date: date_column(row, 4)?,
    })
}

// ── Queries ──────────────────────────────────────────────────────────────────

impl BusinessStore {
    fn sale_predicates(owner_id: &str, filter: &SaleFilter) -> Predicates {
        let mut p = Predicates::owner("s.owner_id = ?", owner_id);
        if let Some(product_id) = filter.product_id {
            p.push("s.product_id = ?", Value::Integer(product_id));
        }
        p.date_bounds("s.date >= ?", "s.date <= ?", filter.start.as_ref(), filter.end.as_ref());
        p
    }

    fn expense_predicates(owner_id: &str, filter: &ExpenseFilter) -> Predicates {
        let mut p = Predicates::owner("owner_id = ?", owner_id);
        if let Some(category) = filter.category.as_deref().filter(|c| !c.is_empty()) {
            p.push("instr(lower(category), lower(?)) > 0", Value::Text(category.to_string()));
        }
        p.date_bounds("date >= ?", "date <= ?", filter.start.as_ref(), filter.end.as_ref());
        p
    }

    /// Most recent sales matching `filter`, newest first.
    pub fn recent_sales(
        &self,
        owner_id: &str,
        filter: &SaleFilter,
        limit: usize,
    ) -> Result<Vec<Sale>, AppError> {
        let conn = self.open_conn()?;
        let p = Self::sale_predicates(owner_id, filter);
        let sql = format!("{SALE_COLUMNS}{} ORDER BY s.date DESC, s.id DESC LIMIT ?", p.sql());
        collect(&conn, &sql, p.with_limit(limit), "recent_sales", sale_row)
    }

    pub fn sales_totals(&self, owner_id: &str, filter: &SaleFilter) -> Result<SalesTotals, AppError> {
        let conn = self.open_conn()?;
        let p = Self::sale_predicates(owner_id, filter);
        let sql = format!(
            "SELECT COALESCE(SUM(s.amount), 0), COALESCE(SUM(s.profit), 0), COUNT(*) FROM sales s{}",
            p.sql()
        );
        conn.query_row(&sql, params_from_iter(p.values), |row| {
            Ok(SalesTotals {
                total_amount: row.get(0)?,
                total_profit: row.get(1)?,
                count: row.get(2)?,
            })
        })
        .map_err(|e| AppError::Store(format!("query sales_totals: {e}")))
    }

    /// Most recent expenses matching `filter`, newest first.
    pub fn recent_expenses(
        &self,
        owner_id: &str,
        filter: &ExpenseFilter,
        limit: usize,
    ) -> Result<Vec<Expense>, AppError> {
        let conn = self.open_conn()?;
        let p = Self::expense_predicates(owner_id, filter);
        let sql = format!(
            "SELECT id, category, description, amount, date FROM expenses{} ORDER BY date DESC, id DESC LIMIT ?",
            p.sql()
        );
        collect(&conn, &sql, p.with_limit(limit), "recent_expenses", expense_row)
    }

    /// Grand total plus a per-category breakdown, largest category first.
    pub fn expense_totals(
        &self,
        owner_id: &str,
        filter: &ExpenseFilter,
    ) -> Result<ExpenseTotals, AppError> {
        let conn = self.open_conn()?;
        let p = Self::expense_predicates(owner_id, filter);
        let sql = format!(
            "SELECT category, SUM(amount) AS total, COUNT(*) FROM expenses{} \
             GROUP BY category ORDER BY total DESC, category ASC",
            p.sql()
        );
        let by_category = collect(&conn, &sql, p.values, "expense_totals", |row| {
            Ok(CategoryTotal {
                category: row.get(0)?,
                total: row.get(1)?,
                count: row.get(2)?,
            })
        })?;
        Ok(ExpenseTotals {
            total: by_category.iter().map(|c| c.total).sum(),
            count: by_category.iter().map(|c| c.count).sum(),
            by_category,
        })
    }

    /// Products whose name contains `needle`. An exact (case-insensitive)
    /// name match sorts ahead of partial ones.
    pub fn products_by_name(
        &self,
        owner_id: &str,
        needle: &str,
        limit: usize,
    ) -> Result<Vec<Product>, AppError> {
        let conn = self.open_conn()?;
        collect(
            &conn,
            "SELECT id, name, category, price, stock FROM inventory \
             WHERE owner_id = ?1 AND instr(lower(name), lower(?2)) > 0 \
             ORDER BY (lower(name) = lower(?2)) DESC, name ASC, id ASC LIMIT ?3",
            vec![Value::Text(owner_id.into()), Value::Text(needle.into()), Value::Integer(limit as i64)],
            "products_by_name",
            product_row,
        )
    }

    pub fn products_by_category(
        &self,
        owner_id: &str,
        needle: &str,
        limit: usize,
    ) -> Result<Vec<Product>, AppError> {
        let conn = self.open_conn()?;
        collect(
            &conn,
            "SELECT id, name, category, price, stock FROM inventory \
             WHERE owner_id = ?1 AND instr(lower(category), lower(?2)) > 0 ORDER BY name ASC, id ASC LIMIT ?3",
            vec![Value::Text(owner_id.into()), Value::Text(needle.into()), Value::Integer(limit as i64)],
            "products_by_category",
            product_row,
        )
    }

    /// Products ordered by stock level — highest first when `descending`.
    pub fn products_by_stock(
        &self,
        owner_id: &str,
        descending: bool,
        limit: usize,
    ) -> Result<Vec<Product>, AppError> {
        let conn = self.open_conn()?;
        let sql = if descending {
            "SELECT id, name, category, price, stock FROM inventory WHERE owner_id = ?1 ORDER BY stock DESC, id ASC LIMIT ?2"
        } else {
            "SELECT id, name, category, price, stock FROM inventory WHERE owner_id = ?1 ORDER BY stock ASC, id ASC LIMIT ?2"
        };
        collect(
            &conn,
            sql,
            vec![Value::Text(owner_id.into()), Value::Integer(limit as i64)],
            "products_by_stock",
            product_row,
        )
    }

    /// Most recently added products.
    pub fn recent_products(&self, owner_id: &str, limit: usize) -> Result<Vec<Product>, AppError> {
        let conn = self.open_conn()?;
        collect(
            &conn,
            "SELECT id, name, category, price, stock FROM inventory WHERE owner_id = ?1 ORDER BY id DESC LIMIT ?2",
            vec![Value::Text(owner_id.into()), Value::Integer(limit as i64)],
            "recent_products",
            product_row,
        )
    }

    pub fn customers_by_name(
        &self,
        owner_id: &str,
        needle: &str,
        limit: usize,
    ) -> Result<Vec<Customer>, AppError> {
        let conn = self.open_conn()?;
        collect(
            &conn,
            "SELECT id, name, email, phone FROM customers \
             WHERE owner_id = ?1 AND instr(lower(name), lower(?2)) > 0 ORDER BY name ASC, id ASC LIMIT ?3",
            vec![Value::Text(owner_id.into()), Value::Text(needle.into()), Value::Integer(limit as i64)],
            "customers_by_name",
            customer_row,
        )
    }

    /// Most recently added customers.
    pub fn recent_customers(&self, owner_id: &str, limit: usize) -> Result<Vec<Customer>, AppError> {
        let conn = self.open_conn()?;
        collect(
            &conn,
            "SELECT id, name, email, phone FROM customers WHERE owner_id = ?1 ORDER BY id DESC LIMIT ?2",
            vec![Value::Text(owner_id.into()), Value::Integer(limit as i64)],
            "recent_customers",
            customer_row,
        )
    }

    /// Customers ranked by summed sale amount, highest first.
    pub fn top_customers(&self, owner_id: &str, limit: usize) -> Result<Vec<CustomerSpend>, AppError> {
        let conn = self.open_conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT c.id, c.name, c.email, c.phone, SUM(s.amount) AS total, COUNT(s.id) \
                 FROM sales s JOIN customers c ON c.id = s.customer_id AND c.owner_id = s.owner_id \
                 WHERE s.owner_id = ?1 \
                 GROUP BY c.id ORDER BY total DESC, c.id ASC LIMIT ?2",
            )
            .map_err(|e| AppError::Store(format!("prepare top_customers: {e}")))?;
        let rows = stmt
            .query_map(params![owner_id, limit as i64], |row| {
                Ok(CustomerSpend {
                    customer: customer_row(row)?,
                    total_amount: row.get(4)?,
                    sale_count: row.get(5)?,
                })
            })
            .map_err(|e| AppError::Store(format!("query top_customers: {e}")))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| AppError::Store(format!("map top_customers row: {e}")))?);
        }
        Ok(out)
    }

    /// Latest interactions logged against one customer, newest first.
    pub fn recent_interactions(
        &self,
        owner_id: &str,
        customer_id: i64,
        limit: usize,
    ) -> Result<Vec<Interaction>, AppError> {
        let conn = self.open_conn()?;
        collect(
            &conn,
            "SELECT id, customer_id, kind, notes, date FROM interactions \
             WHERE owner_id = ?1 AND customer_id = ?2 ORDER BY date DESC, id DESC LIMIT ?3",
            vec![Value::Text(owner_id.into()), Value::Integer(customer_id), Value::Integer(limit as i64)],
            "recent_interactions",
            interaction_row,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use tempfile::TempDir;

    const OWNER: &str = "owner-a";

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    fn store() -> (TempDir, BusinessStore) {
        let tmp = TempDir::new().unwrap();
        let store = BusinessStore::open(&tmp.path().join("records.db")).unwrap();
        (tmp, store)
    }

    fn expense(store: &BusinessStore, owner: &str, category: &str, amount: f64, date: NaiveDateTime) {
        store
            .insert_expense(
                owner,
                &NewExpense {
                    category: category.into(),
                    description: format!("{category} spend"),
                    amount,
                    date,
                },
            )
            .unwrap();
    }

    #[test]
    fn open_creates_file() {
        let (tmp, _store) = store();
        assert!(tmp.path().join("records.db").exists());
    }

    #[test]
    fn reopen_keeps_rows() {
        let (tmp, store) = store();
        expense(&store, OWNER, "Rent", 500.0, at(2024, 1, 1));
        let again = BusinessStore::open(&tmp.path().join("records.db")).unwrap();
        assert_eq!(again.recent_expenses(OWNER, &ExpenseFilter::default(), 5).unwrap().len(), 1);
    }

    #[test]
    fn queries_are_owner_scoped() {
        let (_tmp, store) = store();
        expense(&store, OWNER, "Rent", 500.0, at(2024, 1, 1));
        expense(&store, "owner-b", "Rent", 900.0, at(2024, 1, 1));
        let totals = store.expense_totals(OWNER, &ExpenseFilter::default()).unwrap();
        assert_eq!(totals.total, 500.0);
        assert_eq!(totals.count, 1);
    }

    #[test]
    fn expense_breakdown_sorted_desc_and_filtered() {
        let (_tmp, store) = store();
        expense(&store, OWNER, "Transport", 40.0, at(2024, 2, 1));
        expense(&store, OWNER, "transport", 60.0, at(2024, 2, 2));
        expense(&store, OWNER, "Rent", 500.0, at(2024, 2, 3));

        let all = store.expense_totals(OWNER, &ExpenseFilter::default()).unwrap();
        assert_eq!(all.by_category[0].category, "Rent");
        assert_eq!(all.total, 600.0);

        let filter = ExpenseFilter { category: Some("TRANSPORT".into()), ..Default::default() };
        let transport = store.expense_totals(OWNER, &filter).unwrap();
        assert_eq!(transport.total, 100.0);
        assert!(transport.by_category.iter().all(|c| c.category.eq_ignore_ascii_case("transport")));
    }

    #[test]
    fn date_bounds_are_inclusive() {
        let (_tmp, store) = store();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap().and_hms_opt(23, 59, 59).unwrap();
        expense(&store, OWNER, "Fuel", 10.0, start);
        expense(&store, OWNER, "Fuel", 20.0, end);
        expense(&store, OWNER, "Fuel", 40.0, at(2024, 4, 1));
        expense(&store, OWNER, "Fuel", 80.0, at(2023, 12, 31));

        let filter = ExpenseFilter { category: None, start: Some(start), end: Some(end) };
        assert_eq!(store.expense_totals(OWNER, &filter).unwrap().total, 30.0);
    }

    #[test]
    fn recent_sales_join_names_newest_first() {
        let (_tmp, store) = store();
        let pid = store
            .insert_product(OWNER, &NewProduct { name: "Widget".into(), category: "Tools".into(), price: 5.0, stock: 10 })
            .unwrap();
        let cid = store
            .insert_customer(OWNER, &NewCustomer { name: "Ada".into(), email: None, phone: None })
            .unwrap();
        for (day, amount) in [(1, 10.0), (3, 30.0), (2, 20.0)] {
            store
                .insert_sale(
                    OWNER,
                    &NewSale {
                        product_id: Some(pid),
                        customer_id: Some(cid),
                        amount,
                        profit: amount / 2.0,
                        quantity: 1,
                        date: at(2024, 5, day),
                    },
                )
                .unwrap();
        }
        let sales = store.recent_sales(OWNER, &SaleFilter::default(), 2).unwrap();
        assert_eq!(sales.len(), 2);
        assert_eq!(sales[0].amount, 30.0);
        assert_eq!(sales[0].product_name.as_deref(), Some("Widget"));
        assert_eq!(sales[0].customer_name.as_deref(), Some("Ada"));

        let totals = store.sales_totals(OWNER, &SaleFilter { product_id: Some(pid), ..Default::default() }).unwrap();
        assert_eq!(totals.total_amount, 60.0);
        assert_eq!(totals.total_profit, 30.0);
        assert_eq!(totals.count, 3);
    }

    #[test]
    fn sales_totals_empty_is_zero() {
        let (_tmp, store) = store();
        assert_eq!(store.sales_totals(OWNER, &SaleFilter::default()).unwrap(), SalesTotals::default());
    }

    #[test]
    fn product_name_match_is_case_insensitive() {
        let (_tmp, store) = store();
        store
            .insert_product(OWNER, &NewProduct { name: "Blue Widget".into(), category: "Tools".into(), price: 5.0, stock: 1 })
            .unwrap();
        assert_eq!(store.products_by_name(OWNER, "WIDGET", 5).unwrap().len(), 1);
        assert_eq!(store.products_by_category(OWNER, "tool", 5).unwrap().len(), 1);
        assert!(store.products_by_name(OWNER, "gadget", 5).unwrap().is_empty());
    }

    #[test]
    fn exact_product_name_sorts_first() {
        let (_tmp, store) = store();
        for name in ["Mini Widget", "Widget", "Widget Pro"] {
            store
                .insert_product(OWNER, &NewProduct { name: name.into(), category: "Tools".into(), price: 5.0, stock: 1 })
                .unwrap();
        }
        let names: Vec<String> =
            store.products_by_name(OWNER, "widget", 5).unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Widget", "Mini Widget", "Widget Pro"]);
    }
}
