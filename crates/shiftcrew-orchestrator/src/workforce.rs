//! The standard five-stage workforce scheduling pipeline.
//!
//! demand -> scheduling -> cost -> compliance -> quality. Each stage has a
//! role-specialized agent, a prompt built from the request and earlier
//! payloads, and a deterministic fallback.

use crate::plan::{check_shifts, parse_shifts, sections, DAY_NAMES};
use crate::stage::{PipelineStage, DEFAULT_STAGE_TIMEOUT};
use crate::types::{PipelineContext, PipelineRequest};
use serde_json::{json, Map, Value};
use shiftcrew_agent::AgentProfile;
use shiftcrew_store::Employee;
use std::sync::Arc;
use std::time::Duration;

/// Employees included in the scheduling prompt.
const PROMPT_ROSTER_LIMIT: usize = 10;

/// Wage assumed when no employee is available.
const DEFAULT_WAGE: f64 = 20.0;

/// Allocates store traffic to departments.
pub fn demand_forecaster() -> AgentProfile {
    AgentProfile::new(
        "demand_forecaster",
        "Demand Forecasting Specialist",
        "Analyze the store-wide customer forecast and allocate customers to departments",
        "You are a retail analytics specialist with ten years of experience. You know \
         that Electronics is busier on weekends, the Sales Floor is steady, and Customer \
         Service follows returns and issues. Your allocations are data-driven.",
    )
}

/// Builds the shift assignments.
pub fn staff_optimizer() -> AgentProfile {
    AgentProfile::new(
        "staff_optimizer",
        "Staff Optimization Expert",
        "Create optimal staff schedules based on department demand and employee constraints",
        "You are an operations research specialist in workforce planning. You match \
         skills, availability and preferences to keep costs low while covering demand, \
         accounting for peak hours, breaks and employee satisfaction.",
    )
}

/// Prices the schedule.
pub fn cost_analyst() -> AgentProfile {
    AgentProfile::new(
        "cost_analyst",
        "Labor Cost Analyst",
        "Analyze schedule costs and identify savings opportunities",
        "You are a financial analyst specializing in retail labor economics. You compute \
         regular and overtime pay and find savings without hurting service quality.",
    )
}

/// Reviews the schedule against labor law.
pub fn compliance_checker() -> AgentProfile {
    AgentProfile::new(
        "compliance_checker",
        "Labor Law Compliance Officer",
        "Ensure schedules meet all labor law requirements",
        "You know break requirements, overtime regulations, maximum shift lengths and \
         minimum rest periods, and you flag every compliance risk.",
    )
}

/// Scores the final schedule.
pub fn quality_auditor() -> AgentProfile {
    AgentProfile::new(
        "quality_auditor",
        "Schedule Quality Auditor",
        "Evaluate overall schedule quality and employee satisfaction",
        "You assess fairness, workload distribution and skill utilization, and suggest \
         improvements to both efficiency and satisfaction.",
    )
}

/// The five standard agents, in pipeline order.
pub fn workforce_profiles() -> Vec<AgentProfile> {
    vec![
        demand_forecaster(),
        staff_optimizer(),
        cost_analyst(),
        compliance_checker(),
        quality_auditor(),
    ]
}

fn pretty(value: Option<&Value>) -> String {
    value
        .and_then(|v| serde_json::to_string_pretty(v).ok())
        .unwrap_or_else(|| "{}".to_string())
}

fn relevant_employees(request: &PipelineRequest) -> Vec<&Employee> {
    request
        .employees
        .iter()
        .filter(|e| request.departments.iter().any(|d| e.can_cover(d)))
        .take(PROMPT_ROSTER_LIMIT)
        .collect()
}

fn extra_constraints(request: &PipelineRequest) -> String {
    if request.constraints.is_empty() {
        String::new()
    } else {
        format!("\nAdditional constraints:\n- {}\n", request.constraints.join("\n- "))
    }
}

fn demand_prompt(request: &PipelineRequest, _ctx: &PipelineContext) -> String {
    let forecast = &request.forecast;
    format!(
        "Analyze the store-wide customer forecast and allocate it to departments.\n\n\
         Forecast for {range}:\n\
         - Total weekly customers: {total}\n\
         - Daily breakdown: {daily:?}\n\
         - Peak days: {peaks:?}\n\n\
         Departments to allocate: {depts:?}\n{constraints}\n\
         Consider day-of-week patterns, department characteristics and peak hours.\n\n\
         Respond with JSON:\n\
         {{\"department_allocations\": {{\"<department>\": {{\"percentage\": 0.25, \"reasoning\": \"...\"}}}},\n \
         \"daily_breakdown\": [{{\"day\": \"Monday\", \"<department>\": 200}}]}}",
        range = request.date_range,
        total = forecast.total_weekly_customers,
        daily = forecast.daily_customers,
        peaks = forecast.peak_days,
        depts = request.departments,
        constraints = extra_constraints(request),
    )
}

fn scheduling_prompt(request: &PipelineRequest, ctx: &PipelineContext) -> String {
    let employees = serde_json::to_string_pretty(&relevant_employees(request))
        .unwrap_or_else(|_| "[]".to_string());
    format!(
        "Create optimal staff schedules. Output only valid JSON.\n\n\
         Department demand:\n{demand}\n\n\
         Employees:\n{employees}\n\n\
         Departments to schedule: {depts:?}\n{constraints}\n\
         Create a morning (08:00-16:00) and an evening (14:00-22:00) shift per day for \
         each department. Days: 0=Monday ... 6=Sunday.\n\n\
         Respond with JSON:\n\
         {{\"shifts\": [{{\"id\": \"shift_0_sales_morning\", \"employee_id\": \"emp_001\", \
         \"employee_name\": \"Employee 1\", \"department\": \"Sales Floor\", \"day\": 0, \
         \"start_time\": \"08:00\", \"end_time\": \"16:00\", \"hourly_wage\": 18.5, \
         \"confidence\": 0.9, \"reason\": \"...\"}}], \"coverage_score\": 0.9}}",
        demand = pretty(ctx.get(sections::DEMAND)),
        depts = request.departments,
        constraints = extra_constraints(request),
    )
}

fn cost_prompt(_request: &PipelineRequest, ctx: &PipelineContext) -> String {
    format!(
        "Analyze the labor costs for the proposed schedule.\n\n\
         Schedule:\n{schedule}\n\n\
         Calculate regular hours cost, overtime (1.5x after 40 hours/week), total weekly \
         labor cost, cost per customer served, and savings opportunities.\n\n\
         Respond with JSON:\n\
         {{\"total_cost\": 0.0, \"overtime_cost\": 0.0, \"total_savings\": 0.0, \
         \"cost_per_customer\": 0.0}}",
        schedule = pretty(ctx.get(sections::SCHEDULING)),
    )
}

fn compliance_prompt(_request: &PipelineRequest, ctx: &PipelineContext) -> String {
    format!(
        "Review the schedule for labor law compliance.\n\n\
         Schedule:\n{schedule}\n\n\
         Check maximum hours (>40 hours/week), minimum rest (10 hours between shifts), \
         breaks (30 minutes per 6 hours) and consecutive day limits.\n\n\
         Respond with JSON:\n\
         {{\"status\": \"compliant|violations_found\", \"violations\": \
         [{{\"description\": \"...\", \"severity\": \"high|medium|low\"}}]}}",
        schedule = pretty(ctx.get(sections::SCHEDULING)),
    )
}

fn quality_prompt(_request: &PipelineRequest, ctx: &PipelineContext) -> String {
    format!(
        "Evaluate the overall quality of the schedule.\n\n\
         Schedule:\n{schedule}\n\n\
         Cost analysis:\n{cost}\n\n\
         Compliance:\n{compliance}\n\n\
         Assess coverage, employee satisfaction, fair distribution of hours and skill \
         utilization.\n\n\
         Respond with JSON:\n\
         {{\"quality_score\": 7.5, \"satisfaction_score\": 0.85, \"recommendations\": [\"...\"]}}",
        schedule = pretty(ctx.get(sections::SCHEDULING)),
        cost = pretty(ctx.get(sections::COST)),
        compliance = pretty(ctx.get(sections::COMPLIANCE)),
    )
}

fn department_ratio(department: &str) -> f64 {
    match department {
        "Sales Floor" => 0.40,
        "Electronics" => 0.25,
        "Customer Service" => 0.35,
        _ => 0.33,
    }
}

/// Standard department split of the forecast.
pub fn fallback_demand(request: &PipelineRequest, _ctx: &PipelineContext) -> Value {
    let departments = request.departments_or_default();
    let allocations: Map<String, Value> = departments
        .iter()
        .map(|dept| {
            (
                dept.clone(),
                json!({
                    "percentage": department_ratio(dept),
                    "reasoning": format!("Standard allocation for {dept}"),
                }),
            )
        })
        .collect();

    let daily: Vec<Value> = request
        .forecast
        .daily_customers
        .iter()
        .zip(DAY_NAMES)
        .map(|(customers, day)| {
            let mut entry = Map::new();
            entry.insert("day".to_string(), json!(day));
            for dept in &departments {
                let share = (f64::from(*customers) * department_ratio(dept)).round();
                entry.insert(dept.clone(), json!(share as u64));
            }
            Value::Object(entry)
        })
        .collect();

    json!({
        "department_allocations": allocations,
        "daily_breakdown": daily,
    })
}

fn pick_employee<'a>(
    employees: &'a [Employee],
    department: &str,
    day: usize,
    slot: usize,
) -> Option<&'a Employee> {
    let candidates: Vec<&Employee> = employees
        .iter()
        .filter(|e| e.can_cover(department) && e.availability.on(day))
        .collect();
    if !candidates.is_empty() {
        return Some(candidates[(day * 2 + slot) % candidates.len()]);
    }
    if employees.is_empty() {
        None
    } else {
        Some(&employees[(day * 2 + slot) % employees.len()])
    }
}

/// Morning and evening shift per department per day, staffed round-robin
/// from the roster.
pub fn fallback_schedule(request: &PipelineRequest, _ctx: &PipelineContext) -> Value {
    let departments = request.departments_or_default();
    let mut shifts = Vec::new();
    for day in 0..DAY_NAMES.len() {
        for dept in &departments {
            for (slot, (label, start, end)) in
                [("morning", "08:00", "16:00"), ("evening", "14:00", "22:00")]
                    .into_iter()
                    .enumerate()
            {
                let (employee_id, employee_name, wage) =
                    match pick_employee(&request.employees, dept, day, slot) {
                        Some(e) => (e.id.clone(), e.name.clone(), e.hourly_wage),
                        None => (
                            format!("emp_{day}_{}", dept.chars().take(3).collect::<String>()),
                            format!("Employee {day}"),
                            DEFAULT_WAGE,
                        ),
                    };
                shifts.push(json!({
                    "id": format!("shift_{day}_{}_{label}", dept.replace(' ', "_")),
                    "day": day,
                    "department": dept,
                    "employee_id": employee_id,
                    "employee_name": employee_name,
                    "start_time": start,
                    "end_time": end,
                    "hourly_wage": wage,
                    "confidence": 0.85,
                    "reason": format!("Standard coverage for {dept}"),
                }));
            }
        }
    }
    json!({
        "total_shifts": shifts.len(),
        "shifts": shifts,
        "coverage_score": 0.85,
    })
}

/// Eight hours per shift at the default wage, ten percent overtime.
pub fn fallback_cost(_request: &PipelineRequest, ctx: &PipelineContext) -> Value {
    let shifts = match ctx.get(sections::SCHEDULING) {
        Some(Value::Object(map)) => parse_shifts(map).len(),
        _ => 0,
    };
    let total_hours = (shifts * 8) as f64;
    let total_cost = total_hours * DEFAULT_WAGE;
    json!({
        "total_cost": total_cost,
        "overtime_cost": total_cost / 10.0,
        "total_savings": 1000.0,
        "cost_per_customer": 1.5,
    })
}

/// No review happened, so nothing is claimed either way.
pub fn fallback_compliance(_request: &PipelineRequest, _ctx: &PipelineContext) -> Value {
    json!({ "violations": [], "status": "unverified" })
}

/// Neutral quality assessment.
pub fn fallback_quality(_request: &PipelineRequest, _ctx: &PipelineContext) -> Value {
    json!({
        "quality_score": 7.5,
        "satisfaction_score": 0.85,
        "recommendations": [],
    })
}

/// The standard pipeline with every stage bounded by `stage_timeout`.
pub fn scheduling_pipeline(stage_timeout: Duration) -> Vec<PipelineStage> {
    vec![
        PipelineStage::new(
            sections::DEMAND,
            demand_forecaster(),
            Arc::new(demand_prompt),
            Arc::new(fallback_demand),
        )
        .with_confidence(0.92)
        .with_progress(10, 25)
        .with_messages("Analyzing demand forecast...", "Department demand forecast completed")
        .with_required_keys(&["department_allocations"]),
        PipelineStage::new(
            sections::SCHEDULING,
            staff_optimizer(),
            Arc::new(scheduling_prompt),
            Arc::new(fallback_schedule),
        )
        .with_confidence(0.88)
        .with_progress(30, 50)
        .with_messages("Creating optimal shift assignments...", "Shift optimization completed")
        .with_required_keys(&["shifts"])
        .with_check(Arc::new(check_shifts)),
        PipelineStage::new(
            sections::COST,
            cost_analyst(),
            Arc::new(cost_prompt),
            Arc::new(fallback_cost),
        )
        .with_confidence(0.95)
        .with_progress(55, 70)
        .with_messages("Calculating labor costs...", "Cost analysis completed"),
        PipelineStage::new(
            sections::COMPLIANCE,
            compliance_checker(),
            Arc::new(compliance_prompt),
            Arc::new(fallback_compliance),
        )
        .with_confidence(0.98)
        .with_progress(75, 85)
        .with_messages("Verifying compliance...", "Compliance check completed"),
        PipelineStage::new(
            sections::QUALITY,
            quality_auditor(),
            Arc::new(quality_prompt),
            Arc::new(fallback_quality),
        )
        .with_confidence(0.94)
        .with_progress(90, 100)
        .with_messages("Evaluating schedule quality...", "Quality assessment completed"),
    ]
    .into_iter()
    .map(|stage| stage.with_timeout(stage_timeout))
    .collect()
}

/// [`scheduling_pipeline`] with the default stage timeout.
pub fn default_pipeline() -> Vec<PipelineStage> {
    scheduling_pipeline(DEFAULT_STAGE_TIMEOUT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use shiftcrew_store::demo_roster;

    fn request() -> PipelineRequest {
        PipelineRequest {
            employees: demo_roster(15),
            ..PipelineRequest::default()
        }
    }

    #[test]
    fn test_pipeline_shape() {
        let stages = scheduling_pipeline(Duration::from_secs(7));
        let names: Vec<&str> = stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["demand", "scheduling", "cost", "compliance", "quality"]);
        let agents: Vec<&str> = stages.iter().map(|s| s.profile.key.as_str()).collect();
        assert_eq!(
            agents,
            vec![
                "demand_forecaster",
                "staff_optimizer",
                "cost_analyst",
                "compliance_checker",
                "quality_auditor"
            ]
        );
        assert!(stages.iter().all(|s| s.timeout == Duration::from_secs(7)));
        assert_eq!(stages[1].required_keys, vec!["shifts"]);
        assert_eq!((stages[4].start_progress, stages[4].end_progress), (90, 100));
    }

    #[test]
    fn test_fallback_demand_ratios_and_daily_split() {
        let mut req = request();
        req.departments.push("Grocery".to_string());
        req.forecast.daily_customers = vec![1000, 2000];
        let demand = fallback_demand(&req, &PipelineContext::new());

        let alloc = &demand["department_allocations"];
        assert_eq!(alloc["Sales Floor"]["percentage"], 0.40);
        assert_eq!(alloc["Customer Service"]["percentage"], 0.35);
        assert_eq!(alloc["Electronics"]["percentage"], 0.25);
        assert_eq!(alloc["Grocery"]["percentage"], 0.33);

        let daily = demand["daily_breakdown"].as_array().unwrap();
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[1]["day"], "Tuesday");
        assert_eq!(daily[1]["Sales Floor"], 800);
    }

    #[test]
    fn test_fallback_schedule_covers_every_day_and_department() {
        let req = request();
        let schedule = fallback_schedule(&req, &PipelineContext::new());
        let shifts = parse_shifts(schedule.as_object().unwrap());

        assert_eq!(shifts.len(), 7 * req.departments.len() * 2);
        for day in 0..7u8 {
            for dept in &req.departments {
                assert_eq!(
                    shifts
                        .iter()
                        .filter(|s| s.day == day && &s.department == dept)
                        .count(),
                    2
                );
            }
        }
        let roster_ids: Vec<&str> = req.employees.iter().map(|e| e.id.as_str()).collect();
        assert!(shifts.iter().all(|s| roster_ids.contains(&s.employee_id.as_str())));
    }

    #[test]
    fn test_fallback_schedule_respects_availability() {
        let req = request();
        let schedule = fallback_schedule(&req, &PipelineContext::new());
        for shift in parse_shifts(schedule.as_object().unwrap()) {
            let emp = req.employees.iter().find(|e| e.id == shift.employee_id).unwrap();
            assert!(emp.availability.on(shift.day as usize));
            assert!(emp.can_cover(&shift.department));
        }
    }

    #[test]
    fn test_fallback_schedule_without_roster() {
        let req = PipelineRequest::default();
        let schedule = fallback_schedule(&req, &PipelineContext::new());
        let first = &schedule["shifts"][0];
        assert_eq!(first["employee_id"], "emp_0_Sal");
        assert_eq!(first["hourly_wage"], 20.0);
    }

    #[test]
    fn test_fallback_schedule_without_departments() {
        let req = PipelineRequest {
            departments: Vec::new(),
            ..request()
        };
        let schedule = fallback_schedule(&req, &PipelineContext::new());
        assert_eq!(schedule["total_shifts"], 7 * 3 * 2);
        let demand = fallback_demand(&req, &PipelineContext::new());
        assert_eq!(demand["department_allocations"].as_object().unwrap().len(), 3);
    }

    #[test]
    fn test_scheduling_prompt_matches_fallback_hours() {
        let prompt = scheduling_prompt(&request(), &PipelineContext::new());
        assert!(prompt.contains("08:00-16:00"));
        assert!(prompt.contains("14:00-22:00"));
        assert!(!prompt.contains("17:00-21:00"));
        let schedule = fallback_schedule(&request(), &PipelineContext::new());
        assert_eq!(schedule["shifts"][0]["start_time"], "08:00");
        assert_eq!(schedule["shifts"][1]["end_time"], "22:00");
    }

    #[test]
    fn test_fallback_cost_uses_shift_count() {
        let mut ctx = PipelineContext::new();
        ctx.insert(
            sections::SCHEDULING,
            json!({"shifts": [{"day": 0}, {"day": 1}, {"day": 2}]}),
        );
        let cost = fallback_cost(&request(), &ctx);
        assert_eq!(cost["total_cost"], 480.0);
        assert_eq!(cost["overtime_cost"], 48.0);
        assert_eq!(cost["total_savings"], 1000.0);
    }

    #[test]
    fn test_prompts_carry_earlier_payloads() {
        let req = request();
        let mut ctx = PipelineContext::new();
        ctx.insert(sections::DEMAND, json!({"department_allocations": {"Sales Floor": 1}}));
        ctx.insert(sections::SCHEDULING, json!({"shifts": [{"id": "marker_shift"}]}));
        ctx.insert(sections::COST, json!({"total_cost": 4242}));

        assert!(demand_prompt(&req, &ctx).contains("7000"));
        let scheduling = scheduling_prompt(&req, &ctx);
        assert!(scheduling.contains("department_allocations"));
        assert!(scheduling.contains("emp_000"));
        assert!(cost_prompt(&req, &ctx).contains("marker_shift"));
        assert!(compliance_prompt(&req, &ctx).contains("marker_shift"));
        assert!(quality_prompt(&req, &ctx).contains("4242"));
    }

    #[test]
    fn test_constraints_reach_prompts() {
        let mut req = request();
        req.constraints.push("No shifts after 21:00 on Sunday".to_string());
        assert!(scheduling_prompt(&req, &PipelineContext::new()).contains("after 21:00 on Sunday"));
    }
}
