//! Staged orchestration engine for ShiftCrew.
//!
//! Runs a sequence of role-specialized reasoning stages, recovers structured
//! payloads from their free-form answers, substitutes deterministic fallbacks
//! on timeout or parse failure, and assembles a complete schedule plan.
//!
//! # Main types
//!
//! - [`Orchestrator`]: Runs the stages under per-stage timeouts and a global deadline.
//! - [`PipelineStage`]: One step: agent profile, prompt builder, fallback generator.
//! - [`extract()`]: Multi-strategy JSON recovery from model output.
//! - [`SchedulePlan`]: The assembled result.
//! - [`AgentMonitor`]: Per-agent state and metrics.

/// Orchestration engine and run loop.
pub mod engine;
/// Structured payload recovery from model output.
pub mod extract;
/// Agent state and metrics monitoring.
pub mod monitor;
/// Schedule plan types and assembly.
pub mod plan;
/// Pipeline stage definition.
pub mod stage;
/// Shared orchestration types (request, context, stage results).
pub mod types;
/// The standard workforce scheduling pipeline.
pub mod workforce;

pub use engine::{Orchestrator, DEFAULT_GLOBAL_DEADLINE, FALLBACK_CONFIDENCE};
pub use extract::{extract, Extraction, Strategy};
pub use monitor::{AgentMetrics, AgentMonitor, AgentState, WorkerStatus};
pub use plan::{ComplianceStatus, SchedulePlan, Shift};
pub use stage::{FallbackGenerator, PipelineStage, PromptBuilder, DEFAULT_STAGE_TIMEOUT};
pub use types::{
    default_departments, DegradationReason, DegradedStage, ForecastSummary, PipelineContext,
    PipelineOutcome, PipelineRequest, StageRecord, StageResult,
};
pub use workforce::{default_pipeline, scheduling_pipeline, workforce_profiles};
