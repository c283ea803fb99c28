mod config;

use clap::{Parser, Subcommand};
use config::ShiftCrewConfig;
use shiftcrew_agent::{build_client, LlmProvider, ModelConfig, ReasoningClient};
use shiftcrew_core::EventBus;
use shiftcrew_gateway::{
    load_employees, log_platform_event, spawn_heartbeat, spawn_live_events, AppState, CorsConfig,
    GatewayServer,
};
use shiftcrew_orchestrator::{scheduling_pipeline, Orchestrator, PipelineRequest};
use shiftcrew_store::{
    demo_roster, Criteria, FileRecordStore, MemoryRecordStore, RecordStore, EMPLOYEES_TABLE,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shiftcrew", about = "ShiftCrew: multi-agent workforce scheduling")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "shiftcrew.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run the scheduling pipeline once and print the plan
    Plan {
        /// Departments to schedule (comma separated)
        #[arg(short, long, value_delimiter = ',')]
        departments: Vec<String>,
        /// Planning window
        #[arg(long)]
        date_range: Option<String>,
    },
}

async fn load_config(path: &Path) -> anyhow::Result<ShiftCrewConfig> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => ShiftCrewConfig::from_toml(&text).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Config file not found, using defaults");
            Ok(ShiftCrewConfig::default())
        }
        Err(e) => Err(anyhow::anyhow!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        )),
    }
}

/// The configured client, or the scripted one when no API key is available.
fn reasoning_client(model: ModelConfig) -> anyhow::Result<Arc<dyn ReasoningClient>> {
    if model.provider != LlmProvider::Scripted {
        if let Err(e) = model.resolve_api_key() {
            warn!(error = %e, "No API key configured, running in offline mode");
            return Ok(build_client(ModelConfig::scripted())?);
        }
    }
    info!(provider = ?model.provider, model = %model.model_id, "Reasoning client configured");
    Ok(build_client(model)?)
}

async fn open_store(config: &ShiftCrewConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    let store: Arc<dyn RecordStore> = match &config.store.data_dir {
        Some(dir) => Arc::new(FileRecordStore::new(dir.clone()).await?),
        None => Arc::new(MemoryRecordStore::new()),
    };

    let existing = store
        .query(&Criteria::table(EMPLOYEES_TABLE).limit(1))
        .await?;
    if existing.is_empty() {
        let roster = demo_roster(config.store.roster_size);
        let count = store
            .insert_bulk(
                EMPLOYEES_TABLE,
                roster.iter().map(|e| e.to_record()).collect(),
            )
            .await?;
        info!(count, "Seeded demo roster");
    }
    Ok(store)
}

fn build_orchestrator(
    config: &ShiftCrewConfig,
    bus: &EventBus,
) -> anyhow::Result<Orchestrator> {
    let client = reasoning_client(config.model.clone())?;
    Ok(
        Orchestrator::new(client, scheduling_pipeline(config.pipeline.stage_timeout()))
            .with_event_bus(bus.clone())
            .with_global_deadline(config.pipeline.global_deadline()),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config).await?;
    let bus = EventBus::new(config.pipeline.history_capacity);
    let store = open_store(&config).await?;

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);

            info!("Starting ShiftCrew gateway on {}:{}", host, port);

            let orchestrator = Arc::new(build_orchestrator(&config, &bus)?);
            let state = AppState::with_bridged_topics(
                bus.clone(),
                orchestrator,
                store,
                config.broadcast.bridged_topics.as_slice(),
            );
            let cors = CorsConfig::new(config.server.cors_origins.clone());
            let app = GatewayServer::build_with_cors(state.clone(), cors);

            let _heartbeat = spawn_heartbeat(
                bus.clone(),
                state.connections.clone(),
                Duration::from_secs(config.broadcast.heartbeat_secs.max(1)),
            );
            let _live = spawn_live_events(
                bus.clone(),
                Duration::from_secs(config.broadcast.live_event_secs),
            );
            log_platform_event(
                &bus,
                "gateway",
                "server_started",
                serde_json::json!({ "host": host, "port": port }),
            );

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!("ShiftCrew gateway listening on {}", addr);
            axum::serve(listener, app).await?;
        }
        Commands::Plan {
            departments,
            date_range,
        } => {
            let mut request = PipelineRequest::default();
            if !departments.is_empty() {
                request.departments = departments;
            }
            if let Some(date_range) = date_range {
                request.date_range = date_range;
            }
            request.employees = load_employees(store.as_ref(), None, None).await?;

            let outcome = build_orchestrator(&config, &bus)?.run(&request).await;
            for degraded in &outcome.degraded {
                warn!(
                    stage = %degraded.stage,
                    reason = %degraded.reason,
                    "Stage used fallback"
                );
            }
            println!("{}", serde_json::to_string_pretty(&outcome.plan)?);
        }
    }

    Ok(())
}
