//! Intent classification: the closed intent set and normalisation of the
//! model's raw JSON reply.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use tracing::{debug, warn};

/// Closed set of query intents. Anything the model invents maps to
/// [`Intent::GeneralQuestion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    GetSalesSummary,
    GetExpenseSummary,
    FindProduct,
    GetCustomerInfo,
    GeneralQuestion,
}

impl Intent {
    pub const ALL: [Intent; 5] = [
        Intent::GetSalesSummary,
        Intent::GetExpenseSummary,
        Intent::FindProduct,
        Intent::GetCustomerInfo,
        Intent::GeneralQuestion,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Intent::GetSalesSummary => "get_sales_summary",
            Intent::GetExpenseSummary => "get_expense_summary",
            Intent::FindProduct => "find_product",
            Intent::GetCustomerInfo => "get_customer_info",
            Intent::GeneralQuestion => "general_question",
        }
    }

    /// Wire name → intent. Case and surrounding whitespace are ignored.
    pub fn from_wire(name: &str) -> Self {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|i| i.as_str() == name)
            .unwrap_or(Intent::GeneralQuestion)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named slots extracted by the classifier (`productName`, `category`,
/// `timePeriod`, …). Values are always non-empty trimmed strings.
pub type Entities = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentResult {
    pub intent: Intent,
    pub entities: Entities,
}

impl IntentResult {
    pub fn fallback() -> Self {
        Self { intent: Intent::GeneralQuestion, entities: Entities::new() }
    }

    pub fn entity(&self, key: &str) -> Option<&str> {
        self.entities.get(key).map(String::as_str)
    }
}

/// Normalise a raw classifier reply. Unparseable output degrades to
/// [`IntentResult::fallback`].
pub fn normalize(raw: &str) -> IntentResult {
    match parse_reply(raw) {
        Some(result) => {
            debug!(intent = %result.intent, entities = ?result.entities, "intent classified");
            result
        }
        None => {
            warn!(reply_len = raw.len(), "classifier reply was not a JSON object — falling back to general_question");
            IntentResult::fallback()
        }
    }
}

fn parse_reply(raw: &str) -> Option<IntentResult> {
    // Outermost object; this also discards ```json fences and chatter.
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    let value: Value = serde_json::from_str(&raw[start..=end]).ok()?;
    let obj = value.as_object()?;

    let intent = obj
        .get("intent")
        .and_then(Value::as_str)
        .map(Intent::from_wire)
        .unwrap_or(Intent::GeneralQuestion);

    let entities = obj
        .get("entities")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| coerce(v).map(|s| (k.clone(), s)))
                .collect()
        })
        .unwrap_or_default();

    Some(IntentResult { intent, entities })
}

/// Scalar → string; arrays join their scalars; null/empty are dropped.
fn coerce(value: &Value) -> Option<String> {
    let s = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().filter_map(coerce).collect::<Vec<_>>().join(", "),
        Value::Object(_) => value.to_string(),
    };
    (!s.is_empty()).then_some(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for intent in Intent::ALL {
            assert_eq!(Intent::from_wire(intent.as_str()), intent);
        }
        assert_eq!(Intent::from_wire(" Get_Sales_Summary "), Intent::GetSalesSummary);
        assert_eq!(Intent::from_wire("delete_everything"), Intent::GeneralQuestion);
    }

    #[test]
    fn parses_plain_json() {
        let r = normalize(
            r#"{"intent":"get_expense_summary","entities":{"category":"Transport","timePeriod":"Q1 2024"}}"#,
        );
        assert_eq!(r.intent, Intent::GetExpenseSummary);
        assert_eq!(r.entity("category"), Some("Transport"));
        assert_eq!(r.entity("timePeriod"), Some("Q1 2024"));
    }

    #[test]
    fn strips_code_fences_and_prose() {
        let raw = "Sure! Here you go:\n```json\n{\"intent\": \"find_product\", \"entities\": {\"productName\": \"Widget\"}}\n```";
        let r = normalize(raw);
        assert_eq!(r.intent, Intent::FindProduct);
        assert_eq!(r.entity("productName"), Some("Widget"));
    }

    #[test]
    fn garbage_falls_back() {
        for raw in ["", "not json", "{broken", "} {", "[1,2,3]", "```json\n```"] {
            assert_eq!(normalize(raw), IntentResult::fallback(), "{raw:?}");
        }
    }

    #[test]
    fn unknown_intent_keeps_entities() {
        let r = normalize(r#"{"intent":"weather","entities":{"criteria":"sunny"}}"#);
        assert_eq!(r.intent, Intent::GeneralQuestion);
        assert_eq!(r.entity("criteria"), Some("sunny"));
    }

    #[test]
    fn entities_are_coerced() {
        let r = normalize(
            r#"{"intent":"find_product","entities":{"limit":3,"inStock":true,"productName":"  ","category":null,"tags":["a","b"]}}"#,
        );
        assert_eq!(r.entity("limit"), Some("3"));
        assert_eq!(r.entity("inStock"), Some("true"));
        assert_eq!(r.entity("tags"), Some("a, b"));
        assert_eq!(r.entity("productName"), None);
        assert_eq!(r.entity("category"), None);
    }

    #[test]
    fn missing_entities_is_empty() {
        let r = normalize(r#"{"intent":"get_sales_summary"}"#);
        assert_eq!(r.intent, Intent::GetSalesSummary);
        assert!(r.entities.is_empty());
    }
}
