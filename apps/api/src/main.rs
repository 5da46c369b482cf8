// [apps/api/src/main.rs]
//! HTTP/WebSocket facade entry point: load environment, connect the
//! store, compose `AppState`, serve. The stalled-job reaper runs inside
//! `apps/worker`, the only process actually executing jobs.

mod config;
mod errors;
mod handlers;
mod middleware;
mod oauth_state;
mod routes;
mod state;

use aegis_infra_db::DbClient;
use tracing::info;

use config::Settings;
use state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    aegis_shared_telemetry::init_tracing("aegis-api");

    let settings = Settings::from_env();
    let bind_addr = settings.bind_addr.clone();

    let db = DbClient::connect(&settings.database_url, settings.database_auth_token.clone()).await?;
    let app_state = AppState::new(settings, db.clone());

    let router = routes::build_router(app_state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("aegis-api listening on {bind_addr}");

    axum::serve(listener, router).await?;
    Ok(())
}
