//! HTTP endpoint handlers.
//!
//! Handlers stay thin: they extract headers and bodies, call into the
//! processor, composer, ledger or registration client, and shape the JSON
//! response. Trust decisions for inbound webhooks belong to the processor.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use reqwest::Client;
use serde::{de::IgnoredAny, Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{RegistrationError, SessionError, TransportError};
use crate::inbound::WebhookProcessor;
use crate::ledger::{EventLedger, LedgerSnapshot, OutboundEvent, VerificationStatus};
use crate::outbound::{HttpSender, OutboundComposer};
use crate::registration::{CounterpartHealth, RegistrationClient};
use crate::session::{PartnerSession, SessionStatus};
use crate::signature::{PARTNER_ID_HEADER, SIGNATURE_HEADER};
use crate::Config;

/// Service name reported by the health endpoint.
const SERVICE_NAME: &str = "partner-bridge";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub session: PartnerSession,
    pub ledger: EventLedger,
    pub processor: WebhookProcessor,
    pub composer: OutboundComposer,
    pub registration: RegistrationClient,
}

impl AppState {
    pub fn new(config: Config, client: Client) -> Self {
        Self::with_clock(config, client, Arc::new(SystemClock))
    }

    pub fn with_clock(config: Config, client: Client, clock: Arc<dyn Clock>) -> Self {
        let session = PartnerSession::new();
        let ledger = EventLedger::new(config.max_events);

        let processor = WebhookProcessor::new(session.clone(), ledger.clone(), clock.clone());
        let composer = OutboundComposer::new(
            session.clone(),
            ledger.clone(),
            Arc::new(HttpSender::new(client.clone(), config.send_timeout())),
            clock,
            config.counterpart_url.clone(),
        )
        .with_timeout(config.send_timeout());
        let registration = RegistrationClient::new(client, session.clone(), &config);

        Self {
            config: Arc::new(config),
            session,
            ledger,
            processor,
            composer,
            registration,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub registered: bool,
    pub partner_id: Option<String>,
}

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        registered: state.session.is_registered(),
        partner_id: state.session.partner_id(),
    })
}

// =============================================================================
// Inbound Webhook
// =============================================================================

/// Acknowledgement for an inbound webhook.
#[derive(Serialize)]
pub struct WebhookResponse {
    pub received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<VerificationStatus>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Inbound webhook endpoint.
///
/// Every JSON body is acknowledged with `200` and the resulting status,
/// including bodies whose signature failed. Only bodies that are not JSON
/// are refused.
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    // Syntax check only; the processor builds the stored payload.
    if let Err(e) = serde_json::from_slice::<IgnoredAny>(&body) {
        warn!(error = %e, body_length = body.len(), "webhook_body_not_json");
        return (
            StatusCode::BAD_REQUEST,
            Json(WebhookResponse {
                received: false,
                event_id: None,
                event_type: None,
                status: None,
                message: "Request body must be JSON".to_string(),
                error: Some(e.to_string()),
            }),
        );
    }

    let signature = header_value(&headers, SIGNATURE_HEADER);
    let partner_id = header_value(&headers, PARTNER_ID_HEADER);

    let event = state.processor.process(&body, signature, partner_id).await;

    (
        StatusCode::OK,
        Json(WebhookResponse {
            received: true,
            message: format!("Webhook {} processed successfully", event.event_type),
            event_id: Some(event.id),
            event_type: Some(event.event_type),
            status: Some(event.verification_status),
            error: event.error_message,
        }),
    )
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// =============================================================================
// Ledger
// =============================================================================

/// All recorded events plus statistics, from one consistent snapshot.
pub async fn list_events(State(state): State<AppState>) -> Json<LedgerSnapshot> {
    Json(state.ledger.snapshot().await)
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Clear both event sequences.
pub async fn clear_events(State(state): State<AppState>) -> Json<MessageResponse> {
    state.ledger.clear().await;
    Json(MessageResponse {
        message: "All events cleared",
    })
}

// =============================================================================
// Registration
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub counterpart_url: Option<String>,
    #[serde(default)]
    pub events: Option<Vec<String>>,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribed_events: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

/// Register this service as a partner with the counterpart.
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> impl IntoResponse {
    match state
        .registration
        .register(request.counterpart_url.as_deref(), request.events)
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(RegisterResponse {
                success: true,
                partner_id: Some(outcome.partner_id),
                subscribed_events: Some(outcome.subscribed_events),
                message: Some("Successfully registered as partner"),
                error: None,
                status_code: None,
            }),
        ),
        Err(e) => {
            warn!(error = %e, "register_endpoint_failed");
            (
                registration_status(&e),
                Json(RegisterResponse {
                    success: false,
                    partner_id: None,
                    subscribed_events: None,
                    message: None,
                    error: Some(e.to_string()),
                    status_code: e.status_code(),
                }),
            )
        }
    }
}

fn registration_status(err: &RegistrationError) -> StatusCode {
    match err {
        RegistrationError::Conflict => StatusCode::CONFLICT,
        RegistrationError::Session(SessionError::AlreadyRegistered { .. }) => StatusCode::CONFLICT,
        RegistrationError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
        RegistrationError::Transport(TransportError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
        RegistrationError::Transport(TransportError::Connection(_))
        | RegistrationError::Rejected { .. }
        | RegistrationError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
    }
}

// =============================================================================
// Outbound Events
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SendEventRequest {
    pub event_type: String,
    #[serde(default = "empty_object")]
    pub data: Value,
    #[serde(default)]
    pub target_url: Option<String>,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

/// Send an event to the counterpart. Delivery failures are reported in the
/// returned record with a `200`.
pub async fn send_event(
    State(state): State<AppState>,
    Json(request): Json<SendEventRequest>,
) -> Json<OutboundEvent> {
    let event = state
        .composer
        .send(&request.event_type, request.data, request.target_url)
        .await;

    info!(
        event_id = %event.id,
        delivered = event.delivered,
        "send_event_complete"
    );

    Json(event)
}

// =============================================================================
// Status
// =============================================================================

#[derive(Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub session: SessionStatus,
    pub webhook_url: String,
    pub subscribed_events: Vec<String>,
}

/// Current registration status. Never includes the secret.
pub async fn partner_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        session: state.session.status(),
        webhook_url: state.config.webhook_url(),
        subscribed_events: state.config.subscribed_events.clone(),
    })
}

/// Reachability of the counterpart services.
pub async fn counterpart_health(State(state): State<AppState>) -> Json<CounterpartHealth> {
    Json(state.registration.check_health().await)
}
