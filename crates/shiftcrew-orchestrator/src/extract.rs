//! Recovery of structured payloads from free-form model output.
//!
//! Models answer with bare JSON, JSON inside markdown fences, JSON embedded in
//! prose, or no JSON at all. [`extract`] tries each shape in turn and never
//! fails: when nothing parses it returns a default payload describing the raw
//! text so downstream stages always have an object to work with.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::LazyLock;

/// Maximum number of characters of raw text kept in a default payload.
pub const INSIGHTS_LIMIT: usize = 500;

/// Confidence reported by a default payload.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

#[allow(clippy::expect_used)]
static LABELED_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```json\s*(.*?)```").expect("LABELED_FENCE is a compile-time constant")
});

#[allow(clippy::expect_used)]
static GENERIC_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n?\s*(\{.*?)```")
        .expect("GENERIC_FENCE is a compile-time constant")
});

#[allow(clippy::expect_used)]
static BRACE_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{[^{}]*(?:\{[^{}]*\}[^{}]*)*\}").expect("BRACE_SPAN is a compile-time constant")
});

/// Which strategy produced an [`Extraction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// The whole trimmed text was a JSON object.
    Direct,
    /// A ```` ```json ```` fenced block.
    LabeledFence,
    /// Any fenced block whose body starts with `{`.
    GenericFence,
    /// The first brace-balanced span (one level of nesting).
    BraceScan,
    /// Nothing parsed; the payload is synthesized from the raw text.
    Default,
}

/// Result of [`extract`].
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// The recovered (or synthesized) JSON object.
    pub payload: Map<String, Value>,
    /// The strategy that won.
    pub strategy: Strategy,
}

impl Extraction {
    /// True when no strategy recovered structured data.
    pub fn is_default(&self) -> bool {
        self.strategy == Strategy::Default
    }

    /// Consume the extraction, yielding the payload as a `Value`.
    pub fn into_value(self) -> Value {
        Value::Object(self.payload)
    }
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Recover a JSON object from `raw`, tagging default payloads with `category`.
pub fn extract(raw: &str, category: &str) -> Extraction {
    let found = |payload, strategy| Extraction { payload, strategy };

    if let Some(map) = parse_object(raw) {
        return found(map, Strategy::Direct);
    }

    for caps in LABELED_FENCE.captures_iter(raw) {
        if let Some(map) = caps.get(1).and_then(|m| parse_object(m.as_str())) {
            return found(map, Strategy::LabeledFence);
        }
    }

    for caps in GENERIC_FENCE.captures_iter(raw) {
        if let Some(map) = caps.get(1).and_then(|m| parse_object(m.as_str())) {
            return found(map, Strategy::GenericFence);
        }
    }

    for span in BRACE_SPAN.find_iter(raw) {
        if let Some(map) = parse_object(span.as_str()) {
            return found(map, Strategy::BraceScan);
        }
    }

    Extraction {
        payload: default_payload(raw, category),
        strategy: Strategy::Default,
    }
}

/// The payload returned when nothing in `raw` parses.
pub fn default_payload(raw: &str, category: &str) -> Map<String, Value> {
    let trimmed = raw.trim();
    let insights: String = if trimmed.is_empty() {
        "(empty response)".to_string()
    } else {
        trimmed.chars().take(INSIGHTS_LIMIT).collect()
    };
    let value = json!({
        "category": category,
        "insights": insights,
        "status": "unparsed",
        "confidence": DEFAULT_CONFIDENCE,
    });
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_json() {
        let e = extract(r#"  {"shifts": [], "coverage_score": 0.9}  "#, "scheduling");
        assert_eq!(e.strategy, Strategy::Direct);
        assert_eq!(e.payload["coverage_score"], 0.9);
    }

    #[test]
    fn test_labeled_fence_case_insensitive() {
        let raw = "Sure!\n```JSON\n{\"total_cost\": 1200.5}\n```\nAnything else?";
        let e = extract(raw, "cost");
        assert_eq!(e.strategy, Strategy::LabeledFence);
        assert_eq!(e.payload["total_cost"], 1200.5);
    }

    #[test]
    fn test_generic_fence() {
        let raw = "Result:\n```\n{\"status\": \"compliant\", \"violations\": []}\n```";
        let e = extract(raw, "compliance");
        assert_eq!(e.strategy, Strategy::GenericFence);
        assert_eq!(e.payload["status"], "compliant");
    }

    #[test]
    fn test_generic_fence_other_label() {
        let raw = "```javascript\n{\"quality_score\": 8}\n```";
        let e = extract(raw, "quality");
        assert_eq!(e.strategy, Strategy::GenericFence);
    }

    #[test]
    fn test_brace_scan_with_one_nesting_level() {
        let raw = "The numbers: {\"total_cost\": 300, \"breakdown\": {\"overtime\": 0}} as requested.";
        let e = extract(raw, "cost");
        assert_eq!(e.strategy, Strategy::BraceScan);
        assert_eq!(e.payload["breakdown"]["overtime"], 0);
    }

    #[test]
    fn test_brace_scan_skips_unparseable_spans() {
        let raw = "Ignore {this part} but use {\"quality_score\": 7}";
        let e = extract(raw, "quality");
        assert_eq!(e.strategy, Strategy::BraceScan);
        assert_eq!(e.payload["quality_score"], 7);
    }

    #[test]
    fn test_arrays_are_not_objects() {
        let e = extract("[1, 2, 3]", "demand");
        assert!(e.is_default());
    }

    #[test]
    fn test_garbage_yields_default_shape() {
        let e = extract("I could not produce a schedule this time.", "scheduling");
        assert!(e.is_default());
        assert_eq!(e.payload["category"], "scheduling");
        assert_eq!(e.payload["status"], "unparsed");
        assert_eq!(e.payload["confidence"], DEFAULT_CONFIDENCE);
        assert_eq!(
            e.payload["insights"],
            "I could not produce a schedule this time."
        );
    }

    #[test]
    fn test_default_insights_truncated_and_never_empty() {
        let long = "é".repeat(INSIGHTS_LIMIT + 50);
        let e = extract(&long, "demand");
        assert_eq!(
            e.payload["insights"].as_str().unwrap().chars().count(),
            INSIGHTS_LIMIT
        );

        let e = extract("   \n ", "demand");
        assert_eq!(e.payload["insights"], "(empty response)");
    }

    #[test]
    fn test_valid_json_round_trips() {
        let original = json!({"a": 1, "b": {"c": [1, 2]}, "d": "text {with} braces"});
        let e = extract(&original.to_string(), "x");
        assert_eq!(e.into_value(), original);
    }

    #[test]
    fn test_unclosed_fence_falls_through() {
        let raw = "```json\n{\"status\": \"ok\"";
        let e = extract(raw, "x");
        assert!(e.is_default());
    }
}
