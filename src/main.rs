mod advice;
mod config;
mod db_types;
mod error;
mod gemini_types;
mod google_maps_types;
mod handlers;
mod maps;
mod polyline;
mod sms;
#[cfg(test)]
mod test;
mod twilio_types;
mod types;
mod users;

use crate::config::Config;
use crate::types::AppState;
use crate::users::UserStore;

use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str =
    "info,hyper=off,sqlx=warn,tower_http=debug,carefinder_gateway=debug";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_file(true)
                .with_line_number(true),
        )
        .with(filter)
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "refusing to start");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        error!(error = %e, "server stopped with an error");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!().run(&db_pool).await?;
    info!("database ready");

    let http_client = types::http_client(&config)?;
    let app_state = Arc::new(AppState::new(
        &config,
        http_client,
        UserStore::Postgres(db_pool),
    ));
    let app = handlers::router(app_state);

    info!(
        addr = %config.bind_addr,
        sms_enabled = config.twilio.is_some(),
        gemini_model = %config.gemini_model,
        "listening"
    );
    axum::Server::try_bind(&config.bind_addr)?
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
