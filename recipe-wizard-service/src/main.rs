use recipe_flow::{
    HttpWorkflowClient, InMemorySnapshotStorage, PostgresSnapshotStorage, SnapshotStorage,
    WorkflowApi,
};
use recipe_wizard_service::{AppState, LogFormat, ServiceConfig, build_router};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(log_format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "recipe_wizard_service=debug,recipe_flow=debug,tower_http=debug".into()
    });

    match log_format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

async fn create_snapshot_storage(database_url: Option<&str>) -> Arc<dyn SnapshotStorage> {
    let Some(database_url) = database_url else {
        info!("Using in-memory snapshot storage (set DATABASE_URL to use PostgreSQL)");
        return Arc::new(InMemorySnapshotStorage::new());
    };

    info!("Using PostgreSQL snapshot storage");
    match PostgresSnapshotStorage::connect(database_url).await {
        Ok(storage) => Arc::new(storage),
        Err(e) => {
            error!(
                "Failed to connect to PostgreSQL: {}. Falling back to in-memory storage.",
                e
            );
            Arc::new(InMemorySnapshotStorage::new())
        }
    }
}

fn spawn_session_sweeper(state: AppState, max_idle: Duration) {
    let period = (max_idle / 4).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            state.sweep(max_idle);
        }
    });
    info!(max_idle_secs = max_idle.as_secs(), "Idle session sweeper started");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env();
    init_tracing(
        config
            .as_ref()
            .map(|c| c.log_format)
            .unwrap_or(LogFormat::Json),
    );
    let config = config.inspect_err(|e| error!("Invalid configuration: {e:#}"))?;

    let api: Arc<dyn WorkflowApi> = Arc::new(HttpWorkflowClient::new(config.workflow.clone())?);
    let storage = create_snapshot_storage(config.database_url.as_deref()).await;

    let state = AppState::new(storage, api);
    spawn_session_sweeper(state.clone(), config.session_idle);

    let app = build_router(state);
    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    let addr = listener.local_addr()?;

    info!("Recipe Wizard Service starting on {}", addr);
    info!(
        endpoint = %config.workflow.endpoint,
        user_language = %config.workflow.user_language,
        "Workflow webhook configured"
    );

    axum::serve(listener, app).await?;

    Ok(())
}
