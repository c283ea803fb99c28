use crate::background::log_platform_event;
use crate::bridge::{ProgressBridge, DEFAULT_BRIDGED_TOPICS};
use crate::connection::{Connection, ConnectionRegistry};
use crate::middleware::CorsConfig;
use crate::router::MessageRouter;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use shiftcrew_core::event_bus::SYSTEM_METRICS_TOPIC;
use shiftcrew_core::{Envelope, EventBus, ShiftCrewError};
use shiftcrew_orchestrator::{Orchestrator, PipelineRequest};
use shiftcrew_store::{Criteria, Employee, RecordStore, EMPLOYEES_TABLE};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Shared application state.
pub struct AppState {
    /// Event bus shared with the orchestrator and background publishers.
    pub bus: EventBus,
    /// Live socket connections.
    pub connections: Arc<ConnectionRegistry>,
    /// Inbound socket message handling.
    pub router: Arc<MessageRouter>,
    /// Scheduling pipeline.
    pub orchestrator: Arc<Orchestrator>,
    /// Domain records.
    pub store: Arc<dyn RecordStore>,
    /// Forwards progress topics to every connection.
    pub bridge: ProgressBridge,
    /// Server start time.
    pub started_at: Instant,
}

impl AppState {
    /// Wire the state together. `orchestrator` should publish on `bus`.
    pub fn new(
        bus: EventBus,
        orchestrator: Arc<Orchestrator>,
        store: Arc<dyn RecordStore>,
    ) -> Arc<Self> {
        Self::with_bridged_topics(bus, orchestrator, store, DEFAULT_BRIDGED_TOPICS)
    }

    /// Like [`AppState::new`], mirroring `topics` to every connection.
    pub fn with_bridged_topics<S: AsRef<str>>(
        bus: EventBus,
        orchestrator: Arc<Orchestrator>,
        store: Arc<dyn RecordStore>,
        topics: &[S],
    ) -> Arc<Self> {
        let connections = ConnectionRegistry::new();
        let router = Arc::new(MessageRouter::new(bus.clone(), connections.clone()));
        let bridge = ProgressBridge::attach(&bus, connections.clone(), topics);
        Arc::new(Self {
            bus,
            connections,
            router,
            orchestrator,
            store,
            bridge,
            started_at: Instant::now(),
        })
    }
}

/// Error returned by the REST handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// A 400 response.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<ShiftCrewError> for ApiError {
    fn from(e: ShiftCrewError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(status = %self.status, error = %self.message, "Request failed");
        (
            self.status,
            Json(json!({ "success": false, "error": self.message })),
        )
            .into_response()
    }
}

/// The main gateway server.
pub struct GatewayServer;

impl GatewayServer {
    /// Build the gateway with permissive CORS.
    pub fn build(state: Arc<AppState>) -> Router {
        Self::build_with_cors(state, CorsConfig::permissive())
    }

    /// Build the gateway with the given CORS policy.
    pub fn build_with_cors(state: Arc<AppState>, cors: CorsConfig) -> Router {
        Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/api/schedule/optimize", post(optimize_handler))
            .route("/api/platform/status", get(status_handler))
            .route("/api/platform/events", get(events_handler))
            .route("/api/data/employees", get(employees_handler))
            .with_state(state)
            .layer(cors.layer())
    }
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "shiftcrew" }))
}

/// Employees of `department` (or all), at most `limit`.
pub async fn load_employees(
    store: &dyn RecordStore,
    department: Option<&str>,
    limit: Option<usize>,
) -> Result<Vec<Employee>, ShiftCrewError> {
    let mut criteria = Criteria::table(EMPLOYEES_TABLE);
    if let Some(department) = department {
        criteria = criteria.filter("department", department);
    }
    if let Some(limit) = limit {
        criteria = criteria.limit(limit);
    }
    let records = store.query(&criteria).await?;
    let total = records.len();
    let employees: Vec<Employee> = records.iter().filter_map(Employee::from_record).collect();
    if employees.len() < total {
        warn!(
            skipped = total - employees.len(),
            "Ignoring malformed employee records"
        );
    }
    Ok(employees)
}

async fn optimize_handler(
    State(state): State<Arc<AppState>>,
    Json(mut request): Json<PipelineRequest>,
) -> Result<Json<Value>, ApiError> {
    if request.departments.is_empty() {
        return Err(ApiError::bad_request("At least one department is required"));
    }
    if request.employees.is_empty() {
        request.employees = load_employees(state.store.as_ref(), None, None).await?;
    }

    info!(
        departments = ?request.departments,
        employees = request.employees.len(),
        "Optimization requested"
    );
    log_platform_event(
        &state.bus,
        "orchestrator",
        "optimization_started",
        json!({ "departments": request.departments }),
    );

    let outcome = state.orchestrator.run(&request).await;

    log_platform_event(
        &state.bus,
        "orchestrator",
        "optimization_completed",
        json!({
            "run_id": outcome.run_id,
            "total_shifts": outcome.plan.total_shifts,
            "degraded": outcome.degraded.len(),
        }),
    );

    Ok(Json(json!({
        "success": true,
        "run_id": outcome.run_id,
        "data": outcome.plan,
        "stages": outcome.stages,
        "degraded": outcome.degraded,
    })))
}

async fn status_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let topics: serde_json::Map<String, Value> = state
        .bus
        .topics()
        .into_iter()
        .map(|topic| {
            let entry = json!({
                "events": state.bus.history_len(&topic),
                "subscribers": state.bus.subscriber_count(&topic),
            });
            (topic, entry)
        })
        .collect();
    let stages: Vec<&str> = state
        .orchestrator
        .stages()
        .iter()
        .map(|s| s.name.as_str())
        .collect();

    Json(json!({
        "status": "operational",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "active_connections": state.connections.len(),
        "total_events": state.bus.total_events(),
        "topics": topics,
        "bridged_topics": state.bridge.topics(),
        "stages": stages,
        "agents": state.orchestrator.monitor().to_json().await,
        "last_update": Utc::now(),
    }))
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    topic: Option<String>,
    limit: Option<usize>,
}

async fn events_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> Json<Value> {
    let topic = query
        .topic
        .unwrap_or_else(|| SYSTEM_METRICS_TOPIC.to_string());
    let events = state.bus.recent_history(&topic, query.limit.unwrap_or(50));
    Json(json!({
        "topic": topic,
        "count": events.len(),
        "events": events,
    }))
}

#[derive(Debug, Deserialize)]
struct EmployeesQuery {
    department: Option<String>,
    limit: Option<usize>,
}

async fn employees_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EmployeesQuery>,
) -> Result<Json<Value>, ApiError> {
    let employees = load_employees(
        state.store.as_ref(),
        query.department.as_deref(),
        Some(query.limit.unwrap_or(100)),
    )
    .await?;
    Ok(Json(json!({
        "count": employees.len(),
        "employees": employees,
    })))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (conn, mut rx) = Connection::channel();
    let connection_id = conn.id;
    state.connections.register(conn);

    info!(connection_id = %connection_id, "WebSocket connected");

    let welcome = Envelope::ConnectionStatus {
        status: "connected".to_string(),
        message: "Connected to ShiftCrew live updates".to_string(),
        connection_id: connection_id.to_string(),
    };
    state.connections.send_to(connection_id, &welcome.to_json());

    // Task: forward messages from channel to WebSocket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    // Task: receive messages from WebSocket and route them
    let router = state.router.clone();
    let connections = state.connections.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let reply = router.handle_text(connection_id, text.as_str());
                    if !connections.send_to(connection_id, &reply.to_json()) {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.router.disconnect(connection_id);
    info!(connection_id = %connection_id, "WebSocket disconnected");
}
