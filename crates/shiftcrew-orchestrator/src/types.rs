use crate::plan::SchedulePlan;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shiftcrew_store::Employee;
use std::fmt;

/// Store-wide demand forecast handed to the demand stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastSummary {
    /// Expected customers over the whole week.
    pub total_weekly_customers: u32,
    /// Expected customers per day, Monday first. May be empty.
    pub daily_customers: Vec<u32>,
    /// Busiest days of the week.
    pub peak_days: Vec<String>,
}

impl Default for ForecastSummary {
    fn default() -> Self {
        Self {
            total_weekly_customers: 7000,
            daily_customers: Vec::new(),
            peak_days: vec!["Friday".to_string(), "Saturday".to_string()],
        }
    }
}

/// Input to one orchestration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineRequest {
    /// Departments to schedule.
    pub departments: Vec<String>,
    /// Free-form planning window, e.g. `2024-01-01 to 2024-01-07`.
    pub date_range: String,
    /// Store locations the plan applies to.
    pub locations: Vec<String>,
    /// Extra scheduling constraints passed through to the agents.
    pub constraints: Vec<String>,
    /// Demand forecast summary.
    pub forecast: ForecastSummary,
    /// Roster available for scheduling. Filled from the record store by the
    /// server when the caller leaves it empty.
    pub employees: Vec<Employee>,
}

/// Departments scheduled when a request names none.
pub fn default_departments() -> Vec<String> {
    vec![
        "Sales Floor".to_string(),
        "Customer Service".to_string(),
        "Electronics".to_string(),
    ]
}

impl PipelineRequest {
    /// The requested departments, or [`default_departments`] when empty.
    pub fn departments_or_default(&self) -> Vec<String> {
        if self.departments.is_empty() {
            default_departments()
        } else {
            self.departments.clone()
        }
    }
}

impl Default for PipelineRequest {
    fn default() -> Self {
        Self {
            departments: default_departments(),
            date_range: "2024-01-01 to 2024-01-07".to_string(),
            locations: Vec::new(),
            constraints: Vec::new(),
            forecast: ForecastSummary::default(),
            employees: Vec::new(),
        }
    }
}

/// Accumulated stage payloads of one run, in execution order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineContext {
    entries: Vec<(String, Value)>,
}

impl PipelineContext {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the payload of `stage`, replacing an earlier one of the same name.
    pub fn insert(&mut self, stage: impl Into<String>, payload: Value) {
        let stage = stage.into();
        if let Some(entry) = self.entries.iter_mut().find(|(name, _)| *name == stage) {
            entry.1 = payload;
        } else {
            self.entries.push((stage, payload));
        }
    }

    /// Payload of `stage`, if it has run.
    pub fn get(&self, stage: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == stage)
            .map(|(_, payload)| payload)
    }

    /// Stage names in execution order.
    pub fn stages(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Number of stored payloads.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True before any stage has run.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Why a stage fell back to its deterministic payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DegradationReason {
    /// The reasoning call outlived the stage timeout.
    StageTimeout(String),
    /// The response carried no usable structured payload.
    ExtractionFailure(String),
    /// The reasoning client returned an error.
    TransportError(String),
    /// The run's global deadline had passed.
    GlobalDeadlineExceeded(String),
}

impl DegradationReason {
    /// Short machine name of the reason.
    pub fn kind(&self) -> &'static str {
        match self {
            DegradationReason::StageTimeout(_) => "stage_timeout",
            DegradationReason::ExtractionFailure(_) => "extraction_failure",
            DegradationReason::TransportError(_) => "transport_error",
            DegradationReason::GlobalDeadlineExceeded(_) => "global_deadline_exceeded",
        }
    }

    /// Human readable detail.
    pub fn detail(&self) -> &str {
        match self {
            DegradationReason::StageTimeout(d)
            | DegradationReason::ExtractionFailure(d)
            | DegradationReason::TransportError(d)
            | DegradationReason::GlobalDeadlineExceeded(d) => d,
        }
    }
}

impl fmt::Display for DegradationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.detail())
    }
}

/// Outcome of a single stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StageResult {
    /// The model answered and the answer was usable.
    Success {
        /// Extracted payload.
        payload: Value,
    },
    /// The stage's fallback generator supplied the payload.
    Fallback {
        /// Generated payload.
        payload: Value,
        /// What went wrong.
        reason: DegradationReason,
    },
    /// No payload at all. The orchestrator always substitutes a fallback, so
    /// completed runs never contain this variant.
    Failed {
        /// What went wrong.
        reason: DegradationReason,
    },
}

impl StageResult {
    /// The payload, if any.
    pub fn payload(&self) -> Option<&Value> {
        match self {
            StageResult::Success { payload } | StageResult::Fallback { payload, .. } => {
                Some(payload)
            }
            StageResult::Failed { .. } => None,
        }
    }

    /// The degradation reason, if the stage did not succeed.
    pub fn reason(&self) -> Option<&DegradationReason> {
        match self {
            StageResult::Success { .. } => None,
            StageResult::Fallback { reason, .. } | StageResult::Failed { reason } => Some(reason),
        }
    }

    /// True for [`StageResult::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, StageResult::Success { .. })
    }

    /// True for [`StageResult::Fallback`].
    pub fn is_fallback(&self) -> bool {
        matches!(self, StageResult::Fallback { .. })
    }
}

/// Per-stage entry of a [`PipelineOutcome`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Stage name, e.g. `scheduling`.
    pub stage: String,
    /// Agent key that handled the stage.
    pub agent: String,
    /// What the stage produced.
    pub result: StageResult,
    /// Reported confidence.
    pub confidence: f64,
    /// Wall time spent in the stage.
    pub duration_ms: u64,
}

/// A stage that did not succeed, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradedStage {
    /// Stage name.
    pub stage: String,
    /// Why it degraded.
    pub reason: DegradationReason,
}

/// The complete result of a run. Always structurally complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    /// Unique run identifier.
    pub run_id: String,
    /// One record per configured stage, in execution order.
    pub stages: Vec<StageRecord>,
    /// The assembled schedule plan.
    pub plan: SchedulePlan,
    /// Stages that fell back, in execution order.
    pub degraded: Vec<DegradedStage>,
}

impl PipelineOutcome {
    /// Record of the stage named `stage`.
    pub fn stage(&self, stage: &str) -> Option<&StageRecord> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// True when at least one stage fell back.
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_defaults_from_partial_json() {
        let request: PipelineRequest =
            serde_json::from_value(json!({ "departments": ["Grocery"] })).unwrap();
        assert_eq!(request.departments, vec!["Grocery"]);
        assert_eq!(request.date_range, "2024-01-01 to 2024-01-07");
        assert_eq!(request.forecast.total_weekly_customers, 7000);
        assert_eq!(request.forecast.peak_days, vec!["Friday", "Saturday"]);
    }

    #[test]
    fn test_empty_departments_fall_back_to_defaults() {
        let request: PipelineRequest =
            serde_json::from_value(json!({ "departments": [] })).unwrap();
        assert!(request.departments.is_empty());
        assert_eq!(request.departments_or_default(), default_departments());

        let named = PipelineRequest {
            departments: vec!["Grocery".to_string()],
            ..PipelineRequest::default()
        };
        assert_eq!(named.departments_or_default(), vec!["Grocery"]);
    }

    #[test]
    fn test_context_keeps_execution_order() {
        let mut ctx = PipelineContext::new();
        ctx.insert("demand", json!({"a": 1}));
        ctx.insert("scheduling", json!({"shifts": []}));
        ctx.insert("demand", json!({"a": 2}));
        assert_eq!(ctx.stages().collect::<Vec<_>>(), vec!["demand", "scheduling"]);
        assert_eq!(ctx.get("demand").unwrap()["a"], 2);
        assert!(ctx.get("cost").is_none());
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn test_stage_result_serialization() {
        let result = StageResult::Fallback {
            payload: json!({"status": "compliant"}),
            reason: DegradationReason::StageTimeout("exceeded 60s".to_string()),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["outcome"], "fallback");
        assert_eq!(value["reason"]["kind"], "stage_timeout");
        assert_eq!(value["reason"]["detail"], "exceeded 60s");

        let parsed: StageResult = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, result);
        assert!(parsed.is_fallback());
        assert_eq!(parsed.reason().unwrap().kind(), "stage_timeout");
    }

    #[test]
    fn test_reason_display() {
        let reason = DegradationReason::TransportError("connection refused".into());
        assert_eq!(reason.to_string(), "transport_error: connection refused");
    }
}
