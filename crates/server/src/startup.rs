use std::{env, net::SocketAddr, sync::Arc};

use axum::Router;
use common::logging::init_logging_default;
use dotenvy::dotenv;
use tracing::info;

use service::registration::RegistrationService;
use service::uniqueness::UniquenessValidator;

use crate::routes::{self, AppState};

/// Initialize logging via shared common utils
fn init_logging() {
    init_logging_default();
}

/// Load host/port from configs or env vars, with sensible fallbacks
fn load_bind_addr() -> anyhow::Result<SocketAddr> {
    let (host, port) = match configs::load_default() {
        Ok(cfg) => {
            let s = cfg.server;
            (s.host, s.port)
        }
        Err(_) => {
            let host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
            let port = env::var("SERVER_PORT")
                .ok()
                .and_then(|p| p.parse::<u16>().ok())
                .unwrap_or(8081);
            (host, port)
        }
    };
    Ok(format!("{}:{}", host, port).parse()?)
}

/// Public entry: build the app and run the HTTP server
pub async fn run() -> anyhow::Result<()> {
    dotenv().ok();
    init_logging();

    // Database pair: validated config first, env-derived URLs as fallback.
    let db = match configs::AppConfig::load_and_validate() {
        Ok(cfg) => models::db::connect(&cfg.database).await?,
        Err(_) => models::db::connect_default().await?,
    };

    let state = AppState {
        db,
        registration: Arc::new(RegistrationService::new(UniquenessValidator::new())),
    };

    let app: Router = routes::build_router(state);

    let addr = load_bind_addr()?;
    info!(%addr, "starting registration server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
