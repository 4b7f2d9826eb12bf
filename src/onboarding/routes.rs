//! REST endpoints exposing onboarding state, the session user, and notices.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use super::orchestrator::OnboardingOrchestrator;
use crate::notify::BroadcastNotifier;
use crate::session::SessionStore;

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub orchestrator: Arc<OnboardingOrchestrator>,
    pub session: Arc<SessionStore>,
    pub notices: Arc<BroadcastNotifier>,
}

/// GET /api/onboarding/state
///
/// Returns the flow state, payment phase, and navigations issued so far.
async fn get_state(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    Json(state.orchestrator.status().await)
}

/// GET /api/onboarding/products
async fn get_products(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    let catalog = state.orchestrator.catalog().await;
    let active: Vec<_> = catalog.active().cloned().collect();
    Json(active)
}

/// GET /api/session
///
/// Returns the session user, or 404 if nobody is signed in.
async fn get_session(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    match state.session.current() {
        Some(user) => Json(user).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "No user in session"})),
        )
            .into_response(),
    }
}

/// GET /api/onboarding/notices
async fn get_notices(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    Json(state.notices.recent())
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/api/onboarding/state", get(get_state))
        .route("/api/onboarding/products", get(get_products))
        .route("/api/onboarding/notices", get(get_notices))
        .route("/api/session", get(get_session))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
