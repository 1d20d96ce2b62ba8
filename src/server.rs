/// Server setup and initialization
///
/// Wires together all components: database, project type registry, file store,
/// job queue, maintenance scheduler and HTTP routes.

use crate::{
    api::{create_api_routes, AppState},
    catalog::{ProjectTypeRegistry, ProjectTypeStorage},
    config::Config,
    database::Database,
    files::FileStore,
    jobs::{mailer_from_config, JobQueue, MaintenanceScheduler},
    services::Marketplace,
};
use anyhow::Result;
use axum::{extract::DefaultBodyLimit, routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

/// Fully wired application: the router plus the handles the server keeps alive
pub struct App {
    pub router: Router,
    pub market: Arc<Marketplace>,
    pub database: Database,
}

/// Create the main Axum application with all routes and middleware
///
/// Opens the database, loads project types, starts the job worker and builds the
/// router. The maintenance scheduler is started separately by `start_server`.
pub async fn create_app(config: Config) -> Result<App> {
    tracing::info!("🗄️ Initializing marketplace database");
    let database = Database::open(&config.database.data_dir).await?;

    tracing::info!("📊 Initializing project type registry");
    let project_types = Arc::new(ProjectTypeRegistry::new(ProjectTypeStorage::new(
        database.pool().clone(),
    )));
    project_types
        .init_from_storage()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load project types from storage: {}", e))?;

    tracing::info!("📁 Ensuring upload directory exists: {}", config.storage.upload_dir);
    FileStore::new(&config.storage.upload_dir).ensure_root().await?;

    tracing::info!("📬 Starting job queue ({:?} mail transport)", config.mail.transport);
    let mailer = mailer_from_config(&config.mail);
    let jobs = JobQueue::spawn(Marketplace::job_processor(&database, mailer));

    let market = Arc::new(Marketplace::new(&database, &config, project_types, jobs));
    let state = AppState::new(Arc::clone(&market));

    tracing::info!("📡 Creating HTTP router with all endpoints");
    let router = Router::new()
        .route("/healthz", get(health_check))
        .merge(create_api_routes().with_state(state))
        .layer(DefaultBodyLimit::max(config.storage.max_upload_bytes))
        .layer(TraceLayer::new_for_http());

    tracing::info!("✅ Application initialized successfully");

    Ok(App { router, market, database })
}

/// Start the HTTP server with the given configuration
///
/// Sets up logging, builds the application, starts the maintenance scheduler and
/// serves until the process is stopped.
pub async fn start_server(config: Config) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("modvault=info,tower_http=info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting modvault server...");

    let app = create_app(config.clone()).await?;

    let scheduler = MaintenanceScheduler::new(
        config.maintenance.clone(),
        app.database.pool().clone(),
        app.market.file_store().clone(),
    )
    .await?;
    scheduler.start().await?;

    let bind_addr = config.bind_addr();
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.router.into_make_service()).await?;

    scheduler.stop().await?;
    Ok(())
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}
