//! Renders [`RetrievedData`] into the plain-text context block handed to
//! the answer prompt.

use crate::store::{Customer, Interaction};

use super::retrieval::{RetrievedData, Section};

/// Context for a general question when the caller has no records at all.
pub const NO_DATA: &str = "No recent business data available for this user.";

const TRUNCATION_MARKER: &str = "\n…[truncated]";

/// Build the context string. The body is capped at `max_chars` characters;
/// anything past that is cut and marked.
pub fn format_context(data: &RetrievedData, max_chars: usize) -> String {
    if data.sections.is_empty() && data.notes.is_empty() {
        return NO_DATA.to_string();
    }

    let mut blocks: Vec<String> = Vec::new();
    if !data.notes.is_empty() {
        blocks.push(data.notes.iter().map(|n| format!("Note: {n}")).collect::<Vec<_>>().join("\n"));
    }
    blocks.extend(data.sections.iter().map(render_section));

    truncate(blocks.join("\n\n"), max_chars)
}

fn render_section(section: &Section) -> String {
    let mut lines = vec![format!("### {} Data", domain(section))];
    if section.is_empty() {
        lines.push(no_results(section));
        return lines.join("\n");
    }

    match section {
        Section::Sales { totals, records, .. } => {
            if let Some(t) = totals {
                lines.push(format!(
                    "Total sales: {:.2} (profit {:.2}) across {} sale(s)",
                    t.total_amount, t.total_profit, t.count
                ));
            }
            if !records.is_empty() {
                lines.push("Recent sales:".into());
            }
            for s in records {
                lines.push(format!(
                    "- {} | {} | customer {} | qty {} | amount {:.2} | profit {:.2}",
                    day(&s.date),
                    s.product_name.as_deref().unwrap_or("unknown product"),
                    s.customer_name.as_deref().unwrap_or("unknown"),
                    s.quantity,
                    s.amount,
                    s.profit,
                ));
            }
        }
        Section::Expenses { totals, records, .. } => {
            if let Some(t) = totals {
                lines.push(format!("Total expenses: {:.2} across {} record(s)", t.total, t.count));
                if !t.by_category.is_empty() {
                    lines.push("By category:".into());
                }
                for c in &t.by_category {
                    lines.push(format!("- {}: {:.2} ({} record(s))", c.category, c.total, c.count));
                }
            }
            if !records.is_empty() {
                lines.push("Recent expenses:".into());
            }
            for e in records {
                let description = if e.description.is_empty() { "-" } else { e.description.as_str() };
                lines.push(format!("- {} | {} | {} | {:.2}", day(&e.date), e.category, description, e.amount));
            }
        }
        Section::Products { records, .. } => {
            for p in records {
                lines.push(format!(
                    "- {} | category {} | price {:.2} | stock {}",
                    p.name, p.category, p.price, p.stock
                ));
            }
        }
        Section::Customers { records, interactions, .. } => {
            for c in records {
                lines.push(customer_line(c));
                for i in interactions.iter().filter(|i| i.customer_id == c.id) {
                    lines.push(interaction_line(i));
                }
            }
        }
        Section::TopCustomers { records } => {
            lines.push("Top customers by total sales:".into());
            for (rank, r) in records.iter().enumerate() {
                lines.push(format!(
                    "{}. {} | total {:.2} across {} sale(s)",
                    rank + 1,
                    r.customer.name,
                    r.total_amount,
                    r.sale_count
                ));
            }
        }
    }
    lines.join("\n")
}

fn domain(section: &Section) -> &'static str {
    match section {
        Section::Sales { .. } => "Sales",
        Section::Expenses { .. } => "Expense",
        Section::Products { .. } => "Product",
        Section::Customers { .. } | Section::TopCustomers { .. } => "Customer",
    }
}

fn no_results(section: &Section) -> String {
    let matching = |subject: &Option<String>| match subject {
        Some(s) => format!(" matching \"{s}\""),
        None => String::new(),
    };
    match section {
        Section::Sales { subject, .. } => {
            format!("No sales records found{} for the requested period.", matching(subject))
        }
        Section::Expenses { subject, .. } => {
            format!("No expense records found{} for the requested period.", matching(subject))
        }
        Section::Products { subject, .. } => format!("No products found{}.", matching(subject)),
        Section::Customers { subject, .. } => format!("No customers found{}.", matching(subject)),
        Section::TopCustomers { .. } => "No customer sales recorded yet.".to_string(),
    }
}

fn customer_line(c: &Customer) -> String {
    format!(
        "- {} | email {} | phone {}",
        c.name,
        c.email.as_deref().unwrap_or("-"),
        c.phone.as_deref().unwrap_or("-")
    )
}

fn interaction_line(i: &Interaction) -> String {
    format!("  - {} | {} | {}", day(&i.date), i.kind, i.notes)
}

fn day(dt: &chrono::NaiveDateTime) -> String {
    dt.date().to_string()
}

fn truncate(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &text[..cut]),
        None => text,
    }
}
