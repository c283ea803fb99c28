use crate::extract::extract;
use crate::monitor::AgentMonitor;
use crate::plan::assemble;
use crate::stage::PipelineStage;
use crate::types::{
    default_departments, DegradationReason, DegradedStage, PipelineContext, PipelineOutcome,
    PipelineRequest, StageRecord, StageResult,
};
use chrono::Utc;
use serde_json::Value;
use shiftcrew_agent::ReasoningClient;
use shiftcrew_core::event_bus::AGENT_STATUS_TOPIC;
use shiftcrew_core::{Envelope, EventBus};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

/// Default bound on a whole run.
pub const DEFAULT_GLOBAL_DEADLINE: Duration = Duration::from_secs(180);

/// Confidence reported for a stage that fell back.
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Agent key used for run-level progress updates.
pub const SYSTEM_AGENT: &str = "system";

/// Sequential multi-stage orchestrator.
///
/// Each stage prompts the reasoning client with the request and everything
/// earlier stages produced, extracts a structured payload from the answer and
/// falls back to the stage's deterministic generator on any failure. Progress
/// is published as `agent_update` envelopes on the `agent_status` topic.
/// [`Orchestrator::run`] never fails: every run ends with a complete plan.
pub struct Orchestrator {
    client: Arc<dyn ReasoningClient>,
    stages: Vec<PipelineStage>,
    bus: Option<EventBus>,
    monitor: AgentMonitor,
    global_deadline: Duration,
}

impl Orchestrator {
    /// Create an orchestrator over `stages`, run in order.
    pub fn new(client: Arc<dyn ReasoningClient>, stages: Vec<PipelineStage>) -> Self {
        let monitor = AgentMonitor::with_agents(stages.iter().map(|s| s.profile.key.as_str()));
        Self {
            client,
            stages,
            bus: None,
            monitor,
            global_deadline: DEFAULT_GLOBAL_DEADLINE,
        }
    }

    /// Publish progress on `bus`.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Bound the whole run. Stages that would start after the deadline are
    /// filled from their fallbacks without calling the client.
    pub fn with_global_deadline(mut self, deadline: Duration) -> Self {
        self.global_deadline = deadline;
        self
    }

    /// Per-agent state and metrics.
    pub fn monitor(&self) -> &AgentMonitor {
        &self.monitor
    }

    /// The configured stages, in execution order.
    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    fn publish(&self, agent: &str, status: &str, progress: u8, decision: &str, confidence: f64) {
        let Some(bus) = &self.bus else { return };
        let envelope = Envelope::AgentUpdate {
            agent: agent.to_string(),
            status: status.to_string(),
            progress,
            decision: decision.to_string(),
            confidence,
            timestamp: Utc::now(),
        };
        bus.publish(AGENT_STATUS_TOPIC, envelope.to_value());
    }

    /// Run every stage and assemble the plan.
    ///
    /// A request naming no departments schedules [`default_departments`].
    pub async fn run(&self, request: &PipelineRequest) -> PipelineOutcome {
        let defaulted;
        let request = if request.departments.is_empty() {
            warn!("Request names no departments, scheduling the default set");
            defaulted = PipelineRequest {
                departments: default_departments(),
                ..request.clone()
            };
            &defaulted
        } else {
            request
        };

        let started = Instant::now();
        let deadline = started + self.global_deadline;
        let run_id = Uuid::new_v4().to_string();
        let optimization_id = format!("ai_opt_{}", Utc::now().format("%Y%m%d_%H%M%S"));

        info!(
            run_id = %run_id,
            stages = self.stages.len(),
            departments = ?request.departments,
            "Orchestrator: starting run"
        );
        self.publish(
            SYSTEM_AGENT,
            "starting",
            0,
            "Initializing schedule optimization...",
            0.0,
        );

        let mut ctx = PipelineContext::new();
        let mut records = Vec::with_capacity(self.stages.len());
        let mut degraded = Vec::new();
        let mut decisions = BTreeMap::new();

        for stage in &self.stages {
            let record = self.run_stage(stage, request, &ctx, &run_id, deadline).await;

            if let Some(reason) = record.result.reason() {
                degraded.push(DegradedStage {
                    stage: stage.name.clone(),
                    reason: reason.clone(),
                });
            }
            decisions.insert(stage.name.clone(), record.confidence);
            if let Some(payload) = record.result.payload() {
                ctx.insert(stage.name.clone(), payload.clone());
            }
            records.push(record);
        }

        let plan = assemble(optimization_id, request, &ctx, decisions);

        let summary = if degraded.is_empty() {
            "Schedule optimization completed".to_string()
        } else {
            format!(
                "Schedule optimization completed with {} degraded stage(s)",
                degraded.len()
            )
        };
        self.publish(SYSTEM_AGENT, "completed", 100, &summary, 0.0);

        info!(
            run_id = %run_id,
            duration_ms = started.elapsed().as_millis() as u64,
            shifts = plan.total_shifts,
            degraded = degraded.len(),
            "Orchestrator: run complete"
        );

        PipelineOutcome {
            run_id,
            stages: records,
            plan,
            degraded,
        }
    }

    async fn run_stage(
        &self,
        stage: &PipelineStage,
        request: &PipelineRequest,
        ctx: &PipelineContext,
        run_id: &str,
        deadline: Instant,
    ) -> StageRecord {
        let started = Instant::now();
        let agent = stage.profile.key.as_str();
        let remaining = deadline.saturating_duration_since(started);

        let outcome = if remaining.is_zero() {
            Err(DegradationReason::GlobalDeadlineExceeded(format!(
                "run exceeded {}s before {} started",
                self.global_deadline.as_secs(),
                stage.name
            )))
        } else {
            self.monitor.start_stage(agent, run_id).await;
            self.publish(agent, "analyzing", stage.start_progress, &stage.start_message, 0.0);
            self.call_stage(stage, request, ctx, remaining).await
        };

        let (result, confidence, status, decision) = match outcome {
            Ok(payload) => (
                StageResult::Success { payload },
                stage.confidence,
                "completed",
                stage.done_message.clone(),
            ),
            Err(reason) => {
                warn!(
                    run_id = %run_id,
                    stage = %stage.name,
                    agent = %agent,
                    reason = %reason,
                    "Stage degraded, using fallback"
                );
                let decision = format!("{} (fallback: {})", stage.done_message, reason.kind());
                (
                    StageResult::Fallback {
                        payload: stage.fallback(request, ctx),
                        reason,
                    },
                    FALLBACK_CONFIDENCE,
                    "degraded",
                    decision,
                )
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        self.monitor
            .finish_stage(agent, result.is_success(), duration_ms)
            .await;
        self.publish(agent, status, stage.end_progress, &decision, confidence);

        info!(
            run_id = %run_id,
            stage = %stage.name,
            success = result.is_success(),
            duration_ms,
            "Stage finished"
        );

        StageRecord {
            stage: stage.name.clone(),
            agent: agent.to_string(),
            result,
            confidence,
            duration_ms,
        }
    }

    /// Issue the reasoning call under `min(stage timeout, remaining)` and
    /// extract its payload. The call runs in its own task; on expiry the task
    /// is detached and its result discarded.
    async fn call_stage(
        &self,
        stage: &PipelineStage,
        request: &PipelineRequest,
        ctx: &PipelineContext,
        remaining: Duration,
    ) -> Result<Value, DegradationReason> {
        let prompt = stage.build_prompt(request, ctx);
        let budget = stage.timeout.min(remaining);
        let cut_by_deadline = remaining < stage.timeout;

        let client = self.client.clone();
        let profile = stage.profile.clone();
        let call = tokio::spawn(async move { client.call(&prompt, &profile).await });

        let raw = match tokio::time::timeout(budget, call).await {
            Err(_) if cut_by_deadline => {
                return Err(DegradationReason::GlobalDeadlineExceeded(format!(
                    "run deadline of {}s reached during {}",
                    self.global_deadline.as_secs(),
                    stage.name
                )))
            }
            Err(_) => {
                return Err(DegradationReason::StageTimeout(format!(
                    "no response within {}ms",
                    budget.as_millis()
                )))
            }
            Ok(Err(join_err)) => {
                return Err(DegradationReason::TransportError(format!(
                    "reasoning task aborted: {join_err}"
                )))
            }
            Ok(Ok(Err(e))) => return Err(DegradationReason::TransportError(e.to_string())),
            Ok(Ok(Ok(raw))) => raw,
        };

        let extraction = extract(&raw, &stage.name);
        if extraction.is_default() {
            return Err(DegradationReason::ExtractionFailure(
                "response contained no JSON object".to_string(),
            ));
        }
        if let Some(key) = stage.missing_key(&extraction.payload) {
            return Err(DegradationReason::ExtractionFailure(format!(
                "response is missing required key `{key}`"
            )));
        }
        stage
            .validate(&extraction.payload)
            .map_err(DegradationReason::ExtractionFailure)?;
        Ok(extraction.into_value())
    }
}
