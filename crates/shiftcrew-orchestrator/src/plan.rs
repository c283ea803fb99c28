//! The assembled schedule plan and the mapping from stage payloads to it.

use crate::types::{default_departments, PipelineContext, PipelineRequest};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Day names, Monday first. Index = day number.
pub const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Stage names the assembly reads from.
pub mod sections {
    /// Department demand allocation.
    pub const DEMAND: &str = "demand";
    /// Shift assignments.
    pub const SCHEDULING: &str = "scheduling";
    /// Labor cost analysis.
    pub const COST: &str = "cost";
    /// Labor law review.
    pub const COMPLIANCE: &str = "compliance";
    /// Quality audit.
    pub const QUALITY: &str = "quality";
}

const DEFAULT_COVERAGE: f64 = 0.85;
const DEFAULT_SATISFACTION: f64 = 0.85;
const DEFAULT_QUALITY: f64 = 7.5;
const EMERGENCY_CONFIDENCE: f64 = 0.5;

/// Normalize a day given as an index or a name to 0..=6. Unknown values map to 0.
pub fn normalize_day(value: &Value) -> u8 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .filter(|d| *d < 7)
            .map(|d| d as u8)
            .unwrap_or(0),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(d) = s.parse::<u8>() {
                return if d < 7 { d } else { 0 };
            }
            DAY_NAMES
                .iter()
                .position(|name| name.eq_ignore_ascii_case(s) || name[..3].eq_ignore_ascii_case(s))
                .map(|d| d as u8)
                .unwrap_or(0)
        }
        _ => 0,
    }
}

fn deserialize_day<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(normalize_day(&value))
}

/// Read a number that models sometimes render as a string (`"$1,200.50"`).
pub fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .trim()
            .trim_start_matches('$')
            .replace(',', "")
            .parse()
            .ok(),
        _ => None,
    }
}

fn deserialize_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(number(&value).unwrap_or_default())
}

/// Read a text field that models sometimes render as a number or null.
pub fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn deserialize_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(text(&value))
}

/// One staffed shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    /// Shift identifier.
    #[serde(default, deserialize_with = "deserialize_text")]
    pub id: String,
    /// Assigned employee.
    #[serde(default, deserialize_with = "deserialize_text")]
    pub employee_id: String,
    /// Display name of the assigned employee.
    #[serde(default, deserialize_with = "deserialize_text")]
    pub employee_name: String,
    /// Department covered.
    #[serde(default, deserialize_with = "deserialize_text")]
    pub department: String,
    /// Day index, 0 = Monday.
    #[serde(default, deserialize_with = "deserialize_day")]
    pub day: u8,
    /// `HH:MM` start.
    #[serde(default, deserialize_with = "deserialize_text")]
    pub start_time: String,
    /// `HH:MM` end.
    #[serde(default, deserialize_with = "deserialize_text")]
    pub end_time: String,
    /// Hourly wage of the assigned employee.
    #[serde(default, deserialize_with = "deserialize_number")]
    pub hourly_wage: f64,
    /// Confidence in the assignment.
    #[serde(default, deserialize_with = "deserialize_number")]
    pub confidence: f64,
    /// Why this assignment was made.
    #[serde(default, deserialize_with = "deserialize_text")]
    pub reason: String,
}

impl Shift {
    /// Length of the shift in hours; overnight shifts wrap past midnight.
    pub fn hours(&self) -> f64 {
        fn minutes(t: &str) -> Option<i32> {
            let (h, m) = t.trim().split_once(':')?;
            Some(h.parse::<i32>().ok()? * 60 + m.parse::<i32>().ok()?)
        }
        match (minutes(&self.start_time), minutes(&self.end_time)) {
            (Some(start), Some(end)) => {
                let span = if end > start { end - start } else { end + 24 * 60 - start };
                f64::from(span) / 60.0
            }
            _ => 8.0,
        }
    }
}

/// Compliance review summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceStatus {
    /// `compliant`, `violations_found`, `unverified`, or whatever the model said.
    pub status: String,
    /// Reported violations as returned by the reviewer.
    pub violations: Vec<Value>,
}

/// The assembled, always-complete schedule plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulePlan {
    /// `ai_opt_<YYYYMMDD_HHMMSS>` identifier.
    pub optimization_id: String,
    /// Demand stage payload.
    pub demand_forecast: Value,
    /// All shifts; never empty.
    pub shifts: Vec<Shift>,
    /// `shifts.len()`.
    pub total_shifts: usize,
    /// Weekly labor cost in dollars.
    pub total_cost: f64,
    /// Overtime share of `total_cost`.
    pub overtime_cost: f64,
    /// Identified savings in dollars.
    pub cost_savings: f64,
    /// Fraction of demand covered.
    pub coverage_score: f64,
    /// Estimated employee satisfaction, 0..1.
    pub employee_satisfaction: f64,
    /// Quality score, 1..10.
    pub quality_score: f64,
    /// Compliance review summary.
    pub compliance_status: ComplianceStatus,
    /// Improvement suggestions.
    pub recommendations: Vec<String>,
    /// Risks derived from compliance violations.
    pub risks: Vec<String>,
    /// Confidence per stage.
    pub agent_decisions: BTreeMap<String, f64>,
}

fn section(ctx: &PipelineContext, name: &str) -> Map<String, Value> {
    match ctx.get(name) {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}

fn field_f64(map: &Map<String, Value>, key: &str) -> Option<f64> {
    map.get(key).and_then(number)
}

/// Parse the `shifts` array of a scheduling payload, skipping malformed
/// entries and filling in missing identifiers.
pub fn parse_shifts(payload: &Map<String, Value>) -> Vec<Shift> {
    let Some(Value::Array(items)) = payload.get("shifts") else {
        return Vec::new();
    };
    items
        .iter()
        .filter(|item| item.is_object())
        .filter_map(|item| serde_json::from_value::<Shift>(item.clone()).ok())
        .enumerate()
        .map(|(idx, mut shift)| {
            if shift.id.is_empty() {
                shift.id = format!("shift_{}_{idx}", shift.day);
            }
            shift
        })
        .collect()
}

/// Reject a scheduling payload whose `shifts` are present but unreadable.
pub fn check_shifts(payload: &Map<String, Value>) -> Result<(), String> {
    match payload.get("shifts") {
        Some(Value::Array(items)) if !items.is_empty() && parse_shifts(payload).is_empty() => {
            Err(format!("none of the {} shifts could be read", items.len()))
        }
        Some(Value::Array(_)) | None => Ok(()),
        Some(_) => Err("`shifts` is not an array".to_string()),
    }
}

/// Minimum coverage schedule: one 09:00-17:00 open shift per department per day.
/// An empty department list covers [`default_departments`].
pub fn emergency_shifts(departments: &[String]) -> Vec<Shift> {
    let defaults;
    let departments = if departments.is_empty() {
        defaults = default_departments();
        defaults.as_slice()
    } else {
        departments
    };
    let mut shifts = Vec::with_capacity(departments.len() * DAY_NAMES.len());
    for day in 0..DAY_NAMES.len() as u8 {
        for dept in departments {
            shifts.push(Shift {
                id: format!("emergency_{day}_{}", dept.to_lowercase().replace(' ', "_")),
                employee_id: "unassigned".to_string(),
                employee_name: "Open shift".to_string(),
                department: dept.clone(),
                day,
                start_time: "09:00".to_string(),
                end_time: "17:00".to_string(),
                hourly_wage: 0.0,
                confidence: EMERGENCY_CONFIDENCE,
                reason: "Emergency coverage".to_string(),
            });
        }
    }
    shifts
}

fn strings(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().map(text).collect(),
        _ => Vec::new(),
    }
}

fn violation_text(violation: &Value) -> String {
    match violation {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("description")
            .or_else(|| map.get("issue"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| violation.to_string()),
        other => other.to_string(),
    }
}

/// Assemble the final plan from the stage payloads in `ctx`.
///
/// Missing sections fall back to neutral defaults so the plan is always
/// complete. `decisions` maps stage name to the confidence it reported.
pub fn assemble(
    optimization_id: String,
    request: &PipelineRequest,
    ctx: &PipelineContext,
    decisions: BTreeMap<String, f64>,
) -> SchedulePlan {
    let schedule = section(ctx, sections::SCHEDULING);
    let cost = section(ctx, sections::COST);
    let compliance = section(ctx, sections::COMPLIANCE);
    let quality = section(ctx, sections::QUALITY);

    let mut shifts = parse_shifts(&schedule);
    if shifts.is_empty() {
        shifts = emergency_shifts(&request.departments);
    }

    let estimated_cost: f64 = shifts.iter().map(|s| s.hours() * s.hourly_wage).sum();

    let violations = match compliance.get("violations") {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    let status = compliance
        .get("status")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            if violations.is_empty() {
                "unverified".to_string()
            } else {
                "violations_found".to_string()
            }
        });

    let risks = if violations.is_empty() {
        vec!["No significant risks identified".to_string()]
    } else {
        violations.iter().map(violation_text).collect()
    };

    SchedulePlan {
        optimization_id,
        demand_forecast: ctx
            .get(sections::DEMAND)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new())),
        total_shifts: shifts.len(),
        shifts,
        total_cost: field_f64(&cost, "total_cost").unwrap_or(estimated_cost),
        overtime_cost: field_f64(&cost, "overtime_cost").unwrap_or_default(),
        cost_savings: field_f64(&cost, "total_savings")
            .or_else(|| field_f64(&cost, "cost_savings"))
            .unwrap_or_default(),
        coverage_score: field_f64(&schedule, "coverage_score").unwrap_or(DEFAULT_COVERAGE),
        employee_satisfaction: field_f64(&quality, "satisfaction_score")
            .unwrap_or(DEFAULT_SATISFACTION),
        quality_score: field_f64(&quality, "quality_score").unwrap_or(DEFAULT_QUALITY),
        compliance_status: ComplianceStatus { status, violations },
        recommendations: strings(quality.get("recommendations")),
        risks,
        agent_decisions: decisions,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_day() {
        assert_eq!(normalize_day(&json!(3)), 3);
        assert_eq!(normalize_day(&json!("Saturday")), 5);
        assert_eq!(normalize_day(&json!("sunday")), 6);
        assert_eq!(normalize_day(&json!("Tue")), 1);
        assert_eq!(normalize_day(&json!("4")), 4);
        assert_eq!(normalize_day(&json!("Someday")), 0);
        assert_eq!(normalize_day(&json!(9)), 0);
        assert_eq!(normalize_day(&json!(null)), 0);
    }

    #[test]
    fn test_number_accepts_currency_strings() {
        assert_eq!(number(&json!(12.5)), Some(12.5));
        assert_eq!(number(&json!("$1,200.50")), Some(1200.5));
        assert_eq!(number(&json!("n/a")), None);
    }

    #[test]
    fn test_shift_hours() {
        let mut shift = emergency_shifts(&["Grocery".to_string()]).remove(0);
        assert_eq!(shift.hours(), 8.0);
        shift.start_time = "22:00".into();
        shift.end_time = "06:30".into();
        assert_eq!(shift.hours(), 8.5);
    }

    #[test]
    fn test_parse_shifts_normalizes_and_skips_garbage() {
        let payload = json!({
            "shifts": [
                {"employee_id": "emp_001", "department": "Electronics", "day": "Friday",
                 "start_time": "09:00", "end_time": "17:00", "hourly_wage": "18.50"},
                "not a shift",
                {"id": "s2", "day": 2}
            ]
        });
        let shifts = parse_shifts(payload.as_object().unwrap());
        assert_eq!(shifts.len(), 2);
        assert_eq!(shifts[0].day, 4);
        assert_eq!(shifts[0].hourly_wage, 18.5);
        assert_eq!(shifts[0].id, "shift_4_0");
        assert_eq!(shifts[1].id, "s2");
    }

    #[test]
    fn test_shift_text_fields_accept_numbers_and_null() {
        let payload = json!({
            "shifts": [
                {"id": 7, "employee_id": 101, "employee_name": "Dana", "department": "Grocery",
                 "day": 1, "start_time": "08:00", "end_time": null, "reason": null}
            ]
        });
        let shifts = parse_shifts(payload.as_object().unwrap());
        assert_eq!(shifts.len(), 1);
        assert_eq!(shifts[0].id, "7");
        assert_eq!(shifts[0].employee_id, "101");
        assert_eq!(shifts[0].end_time, "");
        assert_eq!(shifts[0].reason, "");
        assert_eq!(shifts[0].hours(), 8.0);
    }

    #[test]
    fn test_check_shifts() {
        let ok = json!({"shifts": [{"employee_id": 3}], "coverage_score": 0.9});
        assert!(check_shifts(ok.as_object().unwrap()).is_ok());
        let empty = json!({"shifts": []});
        assert!(check_shifts(empty.as_object().unwrap()).is_ok());

        let unreadable = json!({"shifts": ["Alice mornings", "Bob evenings"]});
        let err = check_shifts(unreadable.as_object().unwrap()).unwrap_err();
        assert!(err.contains("none of the 2 shifts"), "{err}");
        let scalar = json!({"shifts": "see attached"});
        assert!(check_shifts(scalar.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_emergency_shifts_without_departments() {
        let shifts = emergency_shifts(&[]);
        assert_eq!(shifts.len(), 7 * default_departments().len());
        assert!(shifts.iter().all(|s| s.employee_id == "unassigned"));
    }

    #[test]
    fn test_assemble_with_empty_context_is_complete() {
        let request = PipelineRequest::default();
        let plan = assemble(
            "ai_opt_test".into(),
            &request,
            &PipelineContext::new(),
            BTreeMap::new(),
        );
        assert_eq!(plan.total_shifts, 7 * request.departments.len());
        assert_eq!(plan.shifts.len(), plan.total_shifts);
        assert!(plan.shifts.iter().all(|s| s.start_time == "09:00"));
        assert_eq!(plan.compliance_status.status, "unverified");
        assert_eq!(plan.risks, vec!["No significant risks identified"]);
        assert_eq!(plan.quality_score, 7.5);
        assert_eq!(plan.coverage_score, 0.85);
        assert!(plan.demand_forecast.is_object());
    }

    #[test]
    fn test_assemble_maps_sections() {
        let mut ctx = PipelineContext::new();
        ctx.insert("demand", json!({"department_allocations": {}}));
        ctx.insert(
            "scheduling",
            json!({"shifts": [{"id": "a", "day": "Monday", "start_time": "08:00",
                               "end_time": "16:00", "hourly_wage": 20}],
                   "coverage_score": 0.93}),
        );
        ctx.insert("cost", json!({"total_cost": "$160.00", "total_savings": 12}));
        ctx.insert(
            "compliance",
            json!({"status": "violations_found",
                   "violations": [{"description": "Missing break", "severity": "low"}, "Rest < 10h"]}),
        );
        ctx.insert(
            "quality",
            json!({"quality_score": 8.4, "satisfaction_score": 0.9,
                   "recommendations": ["Cross-train cashiers"]}),
        );

        let decisions = BTreeMap::from([("demand".to_string(), 0.92)]);
        let plan = assemble("id".into(), &PipelineRequest::default(), &ctx, decisions);

        assert_eq!(plan.total_shifts, 1);
        assert_eq!(plan.total_cost, 160.0);
        assert_eq!(plan.cost_savings, 12.0);
        assert_eq!(plan.coverage_score, 0.93);
        assert_eq!(plan.employee_satisfaction, 0.9);
        assert_eq!(plan.quality_score, 8.4);
        assert_eq!(plan.risks, vec!["Missing break", "Rest < 10h"]);
        assert_eq!(plan.recommendations, vec!["Cross-train cashiers"]);
        assert_eq!(plan.agent_decisions["demand"], 0.92);
    }

    #[test]
    fn test_missing_cost_is_estimated_from_shifts() {
        let mut ctx = PipelineContext::new();
        ctx.insert(
            "scheduling",
            json!({"shifts": [{"start_time": "09:00", "end_time": "17:00", "hourly_wage": 20}]}),
        );
        let plan = assemble("id".into(), &PipelineRequest::default(), &ctx, BTreeMap::new());
        assert_eq!(plan.total_cost, 160.0);
    }
}
