//! Web server module.
//!
//! This module exposes the partner bridge over HTTP:
//! - Receives signed webhooks from the counterpart
//! - Sends signed events to the counterpart on request
//! - Serves the event ledger, partner status and counterpart health
//!
//! Signing, verification and record keeping live in the library core; the
//! handlers only translate between HTTP and those calls.

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{
    clear_events, counterpart_health, health, list_events, partner_status, receive_webhook,
    register, send_event, AppState, HealthResponse, RegisterRequest, SendEventRequest,
    WebhookResponse,
};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let webhook_path = state.config.webhook_path.clone();

    Router::new()
        .route("/health", get(health))
        .route(&webhook_path, post(receive_webhook))
        .route("/api/events", get(list_events).delete(clear_events))
        .route("/api/register", post(register))
        .route("/api/send-event", post(send_event))
        .route("/api/status", get(partner_status))
        .route("/api/health-check", get(counterpart_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
