//! `store` — owner-scoped business records in a single SQLite file.
//!
//! Five tables (sales, expenses, inventory, customers, interactions), every
//! row tagged with `owner_id`. The query pipeline only reads; inserts are
//! here for seeding and fixtures. A fresh connection is opened per call, so
//! the handle is a cheap `Clone` that can move into `spawn_blocking`.

pub mod models;
mod query;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use rusqlite::{Connection, params};
use tracing::debug;

use crate::error::AppError;

pub use models::*;

const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS inventory (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id  TEXT    NOT NULL,
    name      TEXT    NOT NULL,
    category  TEXT    NOT NULL DEFAULT '',
    price     REAL    NOT NULL DEFAULT 0,
    stock     INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS customers (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id  TEXT    NOT NULL,
    name      TEXT    NOT NULL,
    email     TEXT,
    phone     TEXT
);
CREATE TABLE IF NOT EXISTS sales (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id    TEXT    NOT NULL,
    product_id  INTEGER REFERENCES inventory(id) ON DELETE SET NULL,
    customer_id INTEGER REFERENCES customers(id) ON DELETE SET NULL,
    amount      REAL    NOT NULL,
    profit      REAL    NOT NULL DEFAULT 0,
    quantity    INTEGER NOT NULL DEFAULT 1,
    date        TEXT    NOT NULL
);
CREATE TABLE IF NOT EXISTS expenses (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id    TEXT    NOT NULL,
    category    TEXT    NOT NULL,
    description TEXT    NOT NULL DEFAULT '',
    amount      REAL    NOT NULL,
    date        TEXT    NOT NULL
);
CREATE TABLE IF NOT EXISTS interactions (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id    TEXT    NOT NULL,
    customer_id INTEGER NOT NULL REFERENCES customers(id) ON DELETE CASCADE,
    kind        TEXT    NOT NULL,
    notes       TEXT    NOT NULL DEFAULT '',
    date        TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sales_owner_date    ON sales(owner_id, date);
CREATE INDEX IF NOT EXISTS idx_expenses_owner_date ON expenses(owner_id, date);
CREATE INDEX IF NOT EXISTS idx_inventory_owner     ON inventory(owner_id);
CREATE INDEX IF NOT EXISTS idx_customers_owner     ON customers(owner_id);
CREATE INDEX IF NOT EXISTS idx_interactions_owner  ON interactions(owner_id, customer_id);
";

/// Owner-scoped sale filter. `None` fields do not constrain the query.
#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    pub product_id: Option<i64>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

/// Owner-scoped expense filter. `category` is a case-insensitive substring.
#[derive(Debug, Clone, Default)]
pub struct ExpenseFilter {
    pub category: Option<String>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
pub struct BusinessStore {
    db_path: PathBuf,
}

impl BusinessStore {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub fn open(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::Store(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let store = Self { db_path: path.to_path_buf() };
        store.init_db()?;
        debug!(path = %path.display(), "business store ready");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn init_db(&self) -> Result<(), AppError> {
        let conn = self.open_conn()?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| AppError::Store(format!("apply schema: {e}")))?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .map_err(|e| AppError::Store(format!("set schema version: {e}")))?;
        Ok(())
    }

    fn open_conn(&self) -> Result<Connection, AppError> {
        let conn = Connection::open(&self.db_path).map_err(|e| {
            AppError::Store(format!("open {}: {e}", self.db_path.display()))
        })?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(|e| AppError::Store(format!("busy_timeout: {e}")))?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| AppError::Store(format!("enable foreign keys: {e}")))?;
        Ok(conn)
    }

    // ── Inserts ──────────────────────────────────────────────────────────────

    pub fn insert_product(&self, owner_id: &str, p: &NewProduct) -> Result<i64, AppError> {
        let conn = self.open_conn()?;
        conn.execute(
            "INSERT INTO inventory (owner_id, name, category, price, stock) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![owner_id, p.name, p.category, p.price, p.stock],
        )
        .map_err(|e| AppError::Store(format!("insert product: {e}")))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_customer(&self, owner_id: &str, c: &NewCustomer) -> Result<i64, AppError> {
        let conn = self.open_conn()?;
        conn.execute(
            "INSERT INTO customers (owner_id, name, email, phone) VALUES (?1, ?2, ?3, ?4)",
            params![owner_id, c.name, c.email, c.phone],
        )
        .map_err(|e| AppError::Store(format!("insert customer: {e}")))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_sale(&self, owner_id: &str, s: &NewSale) -> Result<i64, AppError> {
        let conn = self.open_conn()?;
        conn.execute(
            "INSERT INTO sales (owner_id, product_id, customer_id, amount, profit, quantity, date) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                owner_id,
                s.product_id,
                s.customer_id,
                s.amount,
                s.profit,
                s.quantity,
                format_date(&s.date),
            ],
        )
        .map_err(|e| AppError::Store(format!("insert sale: {e}")))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_expense(&self, owner_id: &str, e: &NewExpense) -> Result<i64, AppError> {
        let conn = self.open_conn()?;
        conn.execute(
            "INSERT INTO expenses (owner_id, category, description, amount, date) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![owner_id, e.category, e.description, e.amount, format_date(&e.date)],
        )
        .map_err(|err| AppError::Store(format!("insert expense: {err}")))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_interaction(&self, owner_id: &str, i: &NewInteraction) -> Result<i64, AppError> {
        let conn = self.open_conn()?;
        conn.execute(
            "INSERT INTO interactions (owner_id, customer_id, kind, notes, date) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![owner_id, i.customer_id, i.kind, i.notes, format_date(&i.date)],
        )
        .map_err(|e| AppError::Store(format!("insert interaction: {e}")))?;
        Ok(conn.last_insert_rowid())
    }
}
