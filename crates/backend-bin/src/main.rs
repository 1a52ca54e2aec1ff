// ============================
// taskvault-server/src/main.rs
// ============================
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use taskvault_backend::{
    config::{LogFormat, Settings},
    create_router,
    notify::LogNotifier,
    storage::{MemoryStorage, PgStorage, Storage},
    AppState,
};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Users and tasks REST server.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long, env = "TASKVAULT_CONFIG")]
    config: Option<PathBuf>,

    /// Listen port, overriding `bind_addr`'s port
    #[arg(short, long)]
    port: Option<u16>,

    /// `development` or `production`
    #[arg(long)]
    env: Option<String>,
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.to_lowercase()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match settings.log_format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(port) = args.port {
        settings.bind_addr.set_port(port);
    }
    if let Some(env) = args.env {
        settings.environment = env;
    }
    settings.validate()?;

    init_tracing(&settings);

    let storage: Arc<dyn Storage> = match settings.database.dsn.as_deref() {
        Some(dsn) => Arc::new(
            PgStorage::connect(dsn, &settings.database)
                .await
                .context("connecting to the database")?,
        ),
        None => {
            warn!("no database configured, data is kept in memory and lost on exit");
            Arc::new(MemoryStorage::new())
        },
    };

    let addr = settings.bind_addr;
    let environment = settings.environment.clone();
    let state = AppState::new(settings, storage, Arc::new(LogNotifier))?;
    state.start_background_tasks();

    let app = create_router(state.clone());
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, environment = %environment, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    state.shutdown().await;
    info!("server stopped");
    Ok(())
}
