//! Retrieval dispatcher: one branch per [`Intent`], each issuing a handful
//! of owner-scoped store queries.
//!
//! Entity lookups that miss never fail a branch. The branch records a note
//! and falls back to the unfiltered query. Store errors propagate.

use chrono::NaiveDateTime;
use tracing::debug;

use crate::error::AppError;
use crate::store::{
    BusinessStore, Customer, CustomerSpend, Expense, ExpenseFilter, ExpenseTotals, Interaction,
    Product, Sale, SaleFilter, SalesTotals,
};

use super::date_range::parse_date_range;
use super::intent::{Intent, IntentResult};

const RECENT_LIMIT: usize = 5;
const RANKED_LIMIT: usize = 3;
const GENERAL_LIMIT: usize = 3;
const INTERACTIONS_PER_CUSTOMER: usize = 3;

/// One populated domain block of [`RetrievedData`]. `subject` is the entity
/// term the block was filtered by, if any.
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    Sales {
        subject: Option<String>,
        totals: Option<SalesTotals>,
        records: Vec<Sale>,
    },
    Expenses {
        subject: Option<String>,
        totals: Option<ExpenseTotals>,
        records: Vec<Expense>,
    },
    Products {
        subject: Option<String>,
        records: Vec<Product>,
    },
    Customers {
        subject: Option<String>,
        records: Vec<Customer>,
        interactions: Vec<Interaction>,
    },
    TopCustomers {
        records: Vec<CustomerSpend>,
    },
}

impl Section {
    pub fn is_empty(&self) -> bool {
        match self {
            Section::Sales { totals, records, .. } => {
                records.is_empty() && totals.as_ref().is_none_or(|t| t.count == 0)
            }
            Section::Expenses { totals, records, .. } => {
                records.is_empty() && totals.as_ref().is_none_or(|t| t.count == 0)
            }
            Section::Products { records, .. } => records.is_empty(),
            Section::Customers { records, .. } => records.is_empty(),
            Section::TopCustomers { records } => records.is_empty(),
        }
    }
}

/// Everything fetched for one query, in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedData {
    pub intent: Intent,
    pub notes: Vec<String>,
    pub sections: Vec<Section>,
}

impl RetrievedData {
    fn new(intent: Intent) -> Self {
        Self { intent, notes: Vec::new(), sections: Vec::new() }
    }

    fn note(&mut self, text: String) {
        debug!(note = %text, "retrieval note");
        self.notes.push(text);
    }

    /// True when no section holds any record.
    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(Section::is_empty)
    }
}

/// Run the branch for `intent.intent` against `owner_id`'s records.
pub fn retrieve(
    store: &BusinessStore,
    owner_id: &str,
    intent: &IntentResult,
    now: NaiveDateTime,
) -> Result<RetrievedData, AppError> {
    let data = match intent.intent {
        Intent::GetSalesSummary => sales_summary(store, owner_id, intent, now)?,
        Intent::GetExpenseSummary => expense_summary(store, owner_id, intent, now)?,
        Intent::FindProduct => find_product(store, owner_id, intent)?,
        Intent::GetCustomerInfo => customer_info(store, owner_id, intent)?,
        Intent::GeneralQuestion => general(store, owner_id)?,
    };
    debug!(
        intent = %data.intent,
        sections = data.sections.len(),
        notes = data.notes.len(),
        "retrieval complete"
    );
    Ok(data)
}

// ── Branches ─────────────────────────────────────────────────────────────────

fn sales_summary(
    store: &BusinessStore,
    owner_id: &str,
    intent: &IntentResult,
    now: NaiveDateTime,
) -> Result<RetrievedData, AppError> {
    let mut data = RetrievedData::new(Intent::GetSalesSummary);
    let mut filter = SaleFilter::default();
    let mut subject = None;

    if let Some(name) = intent.entity("productName") {
        match store.products_by_name(owner_id, name, 1)?.into_iter().next() {
            Some(product) => {
                filter.product_id = Some(product.id);
                subject = Some(product.name);
            }
            None => data.note(format!(
                "No product matching \"{name}\" was found; showing sales across all products."
            )),
        }
    }

    let range = parse_date_range(intent.entity("timePeriod").unwrap_or_default(), now);
    (filter.start, filter.end) = range.bounds();

    let totals = store.sales_totals(owner_id, &filter)?;
    let records = store.recent_sales(owner_id, &filter, RECENT_LIMIT)?;
    data.sections.push(Section::Sales { subject, totals: Some(totals), records });
    Ok(data)
}

fn expense_summary(
    store: &BusinessStore,
    owner_id: &str,
    intent: &IntentResult,
    now: NaiveDateTime,
) -> Result<RetrievedData, AppError> {
    let mut data = RetrievedData::new(Intent::GetExpenseSummary);
    let category = intent.entity("category").map(str::to_string);
    let range = parse_date_range(intent.entity("timePeriod").unwrap_or_default(), now);
    let (start, end) = range.bounds();
    let filter = ExpenseFilter { category: category.clone(), start, end };

    let totals = store.expense_totals(owner_id, &filter)?;
    let records = store.recent_expenses(owner_id, &filter, RECENT_LIMIT)?;
    data.sections.push(Section::Expenses { subject: category, totals: Some(totals), records });
    Ok(data)
}

fn find_product(
    store: &BusinessStore,
    owner_id: &str,
    intent: &IntentResult,
) -> Result<RetrievedData, AppError> {
    let mut data = RetrievedData::new(Intent::FindProduct);

    if let Some(name) = intent.entity("productName") {
        let records = store.products_by_name(owner_id, name, RECENT_LIMIT)?;
        if !records.is_empty() {
            data.sections.push(Section::Products { subject: Some(name.to_string()), records });
            return Ok(data);
        }
        data.note(format!("No product named like \"{name}\" was found."));
    }

    if let Some(category) = intent.entity("category") {
        let records = store.products_by_category(owner_id, category, RECENT_LIMIT)?;
        if !records.is_empty() {
            data.sections.push(Section::Products { subject: Some(category.to_string()), records });
            return Ok(data);
        }
        data.note(format!("No products in a category like \"{category}\" were found."));
    }

    let criteria = intent.entity("criteria").unwrap_or_default();
    let wanted = criteria.to_lowercase();
    let (subject, records) = if wanted.contains("highest stock") {
        (Some(criteria.to_string()), store.products_by_stock(owner_id, true, RANKED_LIMIT)?)
    } else if wanted.contains("lowest stock") {
        (Some(criteria.to_string()), store.products_by_stock(owner_id, false, RANKED_LIMIT)?)
    } else {
        (None, store.recent_products(owner_id, RECENT_LIMIT)?)
    };
    data.sections.push(Section::Products { subject, records });
    Ok(data)
}

fn customer_info(
    store: &BusinessStore,
    owner_id: &str,
    intent: &IntentResult,
) -> Result<RetrievedData, AppError> {
    let mut data = RetrievedData::new(Intent::GetCustomerInfo);

    if let Some(name) = intent.entity("customerName") {
        let records = store.customers_by_name(owner_id, name, RECENT_LIMIT)?;
        if !records.is_empty() {
            let mut interactions = Vec::new();
            for customer in &records {
                interactions.extend(store.recent_interactions(
                    owner_id,
                    customer.id,
                    INTERACTIONS_PER_CUSTOMER,
                )?);
            }
            data.sections.push(Section::Customers {
                subject: Some(name.to_string()),
                records,
                interactions,
            });
            return Ok(data);
        }
        data.note(format!("No customer named like \"{name}\" was found."));
    }

    let criteria = intent.entity("criteria").unwrap_or_default().to_lowercase();
    if criteria.contains("top customer") {
        let records = store.top_customers(owner_id, RANKED_LIMIT)?;
        data.sections.push(Section::TopCustomers { records });
    } else {
        let records = store.recent_customers(owner_id, RECENT_LIMIT)?;
        data.sections.push(Section::Customers { subject: None, records, interactions: Vec::new() });
    }
    Ok(data)
}

fn general(store: &BusinessStore, owner_id: &str) -> Result<RetrievedData, AppError> {
    let mut data = RetrievedData::new(Intent::GeneralQuestion);

    let sales = store.recent_sales(owner_id, &SaleFilter::default(), GENERAL_LIMIT)?;
    let expenses = store.recent_expenses(owner_id, &ExpenseFilter::default(), GENERAL_LIMIT)?;
    let products = store.recent_products(owner_id, GENERAL_LIMIT)?;
    let customers = store.recent_customers(owner_id, GENERAL_LIMIT)?;

    let candidates = [
        Section::Sales { subject: None, totals: None, records: sales },
        Section::Expenses { subject: None, totals: None, records: expenses },
        Section::Products { subject: None, records: products },
        Section::Customers { subject: None, records: customers, interactions: Vec::new() },
    ];
    data.sections.extend(candidates.into_iter().filter(|s| !s.is_empty()));
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NewCustomer, NewExpense, NewInteraction, NewProduct, NewSale};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    const OWNER: &str = "u1";

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(10, 0, 0).unwrap()
    }

    fn now() -> NaiveDateTime {
        at(2024, 5, 15)
    }

    fn intent(intent: Intent, entities: &[(&str, &str)]) -> IntentResult {
        IntentResult {
            intent,
            entities: entities.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    fn store() -> (TempDir, BusinessStore) {
        let tmp = TempDir::new().unwrap();
        let store = BusinessStore::open(&tmp.path().join("r.db")).unwrap();
        (tmp, store)
    }

    fn product(store: &BusinessStore, name: &str, category: &str, stock: i64) -> i64 {
        store
            .insert_product(OWNER, &NewProduct { name: name.into(), category: category.into(), price: 10.0, stock })
            .unwrap()
    }

    fn customer(store: &BusinessStore, name: &str) -> i64 {
        store.insert_customer(OWNER, &NewCustomer { name: name.into(), email: None, phone: None }).unwrap()
    }

    fn sale(store: &BusinessStore, product_id: i64, customer_id: i64, amount: f64, date: NaiveDateTime) {
        store
            .insert_sale(
                OWNER,
                &NewSale {
                    product_id: Some(product_id),
                    customer_id: Some(customer_id),
                    amount,
                    profit: amount * 0.25,
                    quantity: 1,
                    date,
                },
            )
            .unwrap();
    }

    fn expense(store: &BusinessStore, category: &str, amount: f64, date: NaiveDateTime) {
        store
            .insert_expense(OWNER, &NewExpense { category: category.into(), description: String::new(), amount, date })
            .unwrap();
    }

    #[test]
    fn transport_expenses_for_q1_sum_matching_records() {
        let (_tmp, store) = store();
        expense(&store, "Transport", 40.0, at(2024, 1, 10));
        expense(&store, "Transport", 60.5, at(2024, 3, 31));
        expense(&store, "Transport", 99.0, at(2024, 4, 1));
        expense(&store, "Rent", 800.0, at(2024, 2, 1));

        let q = intent(Intent::GetExpenseSummary, &[("category", "transport"), ("timePeriod", "Q1 2024")]);
        let data = retrieve(&store, OWNER, &q, now()).unwrap();
        let Section::Expenses { totals: Some(totals), records, subject } = &data.sections[0] else {
            panic!("expected expenses section, got {:?}", data.sections);
        };
        assert_eq!(subject.as_deref(), Some("transport"));
        assert_eq!(totals.total, 100.5);
        assert_eq!(totals.count, 2);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].amount, 60.5);
    }

    #[test]
    fn sales_summary_filters_by_resolved_product() {
        let (_tmp, store) = store();
        let widget = product(&store, "Widget", "Tools", 5);
        let gadget = product(&store, "Gadget", "Tools", 5);
        let ada = customer(&store, "Ada");
        sale(&store, widget, ada, 100.0, at(2024, 5, 1));
        sale(&store, gadget, ada, 50.0, at(2024, 5, 2));

        let q = intent(Intent::GetSalesSummary, &[("productName", "widget"), ("timePeriod", "this month")]);
        let data = retrieve(&store, OWNER, &q, now()).unwrap();
        assert!(data.notes.is_empty());
        let Section::Sales { totals: Some(totals), subject, .. } = &data.sections[0] else {
            panic!("expected sales section");
        };
        assert_eq!(subject.as_deref(), Some("Widget"));
        assert_eq!(totals.total_amount, 100.0);
        assert_eq!(totals.total_profit, 25.0);
    }

    #[test]
    fn sales_summary_prefers_exact_product_name() {
        let (_tmp, store) = store();
        let mini = product(&store, "Mini Widget", "Tools", 5);
        let widget = product(&store, "Widget", "Tools", 5);
        let ada = customer(&store, "Ada");
        sale(&store, mini, ada, 10.0, at(2024, 5, 1));
        sale(&store, widget, ada, 100.0, at(2024, 5, 2));

        let q = intent(Intent::GetSalesSummary, &[("productName", "Widget")]);
        let data = retrieve(&store, OWNER, &q, now()).unwrap();
        let Section::Sales { totals: Some(totals), subject, .. } = &data.sections[0] else {
            panic!("expected sales section");
        };
        assert_eq!(subject.as_deref(), Some("Widget"));
        assert_eq!(totals.total_amount, 100.0);
        assert_eq!(totals.count, 1);
    }

    #[test]
    fn stock_criteria_on_empty_inventory_names_the_criteria() {
        let (_tmp, store) = store();
        let q = intent(Intent::FindProduct, &[("criteria", "Highest stock")]);
        let data = retrieve(&store, OWNER, &q, now()).unwrap();
        let Section::Products { subject, records } = &data.sections[0] else {
            panic!("expected products section");
        };
        assert!(records.is_empty());
        assert_eq!(subject.as_deref(), Some("Highest stock"));

        let ctx = crate::assistant::context::format_context(&data, 8000);
        assert!(ctx.contains("No products found matching \"Highest stock\"."), "{ctx}");
    }

    #[test]
    fn unknown_product_degrades_to_all_sales_with_note() {
        let (_tmp, store) = store();
        let widget = product(&store, "Widget", "Tools", 5);
        let ada = customer(&store, "Ada");
        sale(&store, widget, ada, 100.0, at(2024, 5, 1));

        let q = intent(Intent::GetSalesSummary, &[("productName", "Sprocket")]);
        let data = retrieve(&store, OWNER, &q, now()).unwrap();
        assert_eq!(data.notes.len(), 1);
        assert!(data.notes[0].contains("Sprocket"));
        let Section::Sales { totals: Some(totals), .. } = &data.sections[0] else {
            panic!("expected sales section");
        };
        assert_eq!(totals.count, 1);
    }

    #[test]
    fn highest_stock_is_sorted_and_capped() {
        let (_tmp, store) = store();
        for (name, stock) in [("A", 5), ("B", 50), ("C", 20), ("D", 1), ("E", 35)] {
            product(&store, name, "Misc", stock);
        }
        let q = intent(Intent::FindProduct, &[("criteria", "Highest stock")]);
        let data = retrieve(&store, OWNER, &q, now()).unwrap();
        let Section::Products { records, .. } = &data.sections[0] else {
            panic!("expected products section");
        };
        let stocks: Vec<i64> = records.iter().map(|p| p.stock).collect();
        assert_eq!(stocks, vec![50, 35, 20]);

        let q = intent(Intent::FindProduct, &[("criteria", "lowest stock items")]);
        let data = retrieve(&store, OWNER, &q, now()).unwrap();
        let Section::Products { records, .. } = &data.sections[0] else {
            panic!("expected products section");
        };
        assert_eq!(records.iter().map(|p| p.stock).collect::<Vec<_>>(), vec![1, 5, 20]);
    }

    #[test]
    fn product_name_miss_falls_through_to_category() {
        let (_tmp, store) = store();
        product(&store, "Hammer", "Tools", 3);
        product(&store, "Apple", "Food", 9);
        let q = intent(Intent::FindProduct, &[("productName", "drill"), ("category", "tool")]);
        let data = retrieve(&store, OWNER, &q, now()).unwrap();
        assert_eq!(data.notes.len(), 1);
        let Section::Products { records, subject } = &data.sections[0] else {
            panic!("expected products section");
        };
        assert_eq!(subject.as_deref(), Some("tool"));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Hammer");
    }

    #[test]
    fn top_customers_sorted_by_summed_sales() {
        let (_tmp, store) = store();
        let p = product(&store, "Widget", "Tools", 5);
        let spend = [("Ada", [10.0, 20.0]), ("Bob", [100.0, 5.0]), ("Cy", [1.0, 1.0]), ("Di", [50.0, 0.0])];
        for (name, amounts) in spend {
            let c = customer(&store, name);
            for amount in amounts {
                sale(&store, p, c, amount, at(2024, 5, 1));
            }
        }
        let q = intent(Intent::GetCustomerInfo, &[("criteria", "top customers")]);
        let data = retrieve(&store, OWNER, &q, now()).unwrap();
        let Section::TopCustomers { records } = &data.sections[0] else {
            panic!("expected top customers section");
        };
        let ranked: Vec<(&str, f64)> =
            records.iter().map(|r| (r.customer.name.as_str(), r.total_amount)).collect();
        assert_eq!(ranked, vec![("Bob", 105.0), ("Di", 50.0), ("Ada", 30.0)]);
    }

    #[test]
    fn customer_match_includes_interactions() {
        let (_tmp, store) = store();
        let ada = customer(&store, "Ada Lovelace");
        customer(&store, "Bob");
        store
            .insert_interaction(
                OWNER,
                &NewInteraction { customer_id: ada, kind: "call".into(), notes: "asked for a quote".into(), date: at(2024, 5, 2) },
            )
            .unwrap();
        let q = intent(Intent::GetCustomerInfo, &[("customerName", "lovelace")]);
        let data = retrieve(&store, OWNER, &q, now()).unwrap();
        let Section::Customers { records, interactions, .. } = &data.sections[0] else {
            panic!("expected customers section");
        };
        assert_eq!(records.len(), 1);
        assert_eq!(interactions.len(), 1);
        assert_eq!(interactions[0].kind, "call");
    }

    #[test]
    fn general_on_empty_store_has_no_sections() {
        let (_tmp, store) = store();
        let data = retrieve(&store, OWNER, &IntentResult::fallback(), now()).unwrap();
        assert!(data.sections.is_empty());
        assert!(data.is_empty());
    }

    #[test]
    fn general_takes_three_of_each() {
        let (_tmp, store) = store();
        for i in 0..5 {
            product(&store, &format!("P{i}"), "Misc", i);
            expense(&store, "Misc", 1.0, at(2024, 5, 1 + i as u32));
        }
        let data = retrieve(&store, OWNER, &IntentResult::fallback(), now()).unwrap();
        assert_eq!(data.sections.len(), 2);
        for section in &data.sections {
            match section {
                Section::Expenses { records, .. } => assert_eq!(records.len(), 3),
                Section::Products { records, .. } => assert_eq!(records.len(), 3),
                other => panic!("unexpected section {other:?}"),
            }
        }
    }

    #[test]
    fn retrieval_is_repeatable() {
        let (_tmp, store) = store();
        expense(&store, "Transport", 12.0, at(2024, 2, 1));
        let q = intent(Intent::GetExpenseSummary, &[("timePeriod", "q1 2024")]);
        let first = retrieve(&store, OWNER, &q, now()).unwrap();
        let second = retrieve(&store, OWNER, &q, now()).unwrap();
        assert_eq!(first, second);
    }
}
