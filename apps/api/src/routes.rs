// [apps/api/src/routes.rs]
//! Router composition: one nested sub-router per resource, `auth_guard`
//! applied to everything except the OAuth callback (which arrives with
//! no bearer token — the identity provider, not the tenant's browser
//! session, makes that request) and the health check.

use std::time::Duration;

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::handlers::{automations, connections, events, feedback};
use crate::middleware::auth_guard;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let tenant_scoped = Router::new()
        .route("/connections", get(connections::list))
        .route("/connections/:id", post(connections::initiate).delete(connections::disconnect))
        .route("/connections/:id/discover", post(connections::discover))
        .route("/automations", get(automations::list))
        .route("/automations/:id", get(automations::detail))
        .route("/feedback", post(feedback::submit))
        .route("/feedback/ml-training-batch", get(feedback::ml_training_batch))
        .route("/ws", get(events::subscribe))
        .layer(middleware::from_fn(auth_guard));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/connections/:id/callback", get(connections::callback))
        .merge(tenant_scoped)
        .layer(cors)
        .with_state(state)
}
