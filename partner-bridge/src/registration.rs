//! Partner registration and counterpart health probing.
//!
//! Registration exchanges this service's webhook URL for a partner id and a
//! shared secret, which are written once into the [`PartnerSession`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{RegistrationError, SessionError, TransportError};
use crate::session::{PartnerCredentials, PartnerSession};

/// Registration body sent to the counterpart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub name: String,
    pub webhook_url: String,
    pub events: Vec<String>,
    pub description: String,
    pub contact_email: String,
}

/// Counterpart answer to a successful registration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistrationResponse {
    id: String,
    secret: String,
    #[serde(default)]
    subscribed_events: Vec<String>,
}

/// Result of a successful registration. The secret stays in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationOutcome {
    pub partner_id: String,
    pub subscribed_events: Vec<String>,
    pub registered_at: DateTime<Utc>,
    pub counterpart_url: String,
}

/// Reachability of one counterpart service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// Answered `200`.
    Online,
    /// Answered with any other status.
    Error,
    /// Did not answer.
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceHealth {
    pub status: ServiceStatus,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterpartHealth {
    pub counterpart: ServiceHealth,
    pub counterpart_payment: ServiceHealth,
}

/// Client for the counterpart's partner API.
#[derive(Clone)]
pub struct RegistrationClient {
    client: Client,
    session: PartnerSession,
    /// Held for a whole registration so only one request reaches the counterpart.
    registering: Arc<Mutex<()>>,
    counterpart_url: String,
    payment_url: String,
    webhook_url: String,
    default_events: Vec<String>,
    timeout: Duration,
    health_timeout: Duration,
}

impl RegistrationClient {
    pub fn new(client: Client, session: PartnerSession, config: &Config) -> Self {
        Self {
            client,
            session,
            registering: Arc::new(Mutex::new(())),
            counterpart_url: config.counterpart_url.clone(),
            payment_url: config.counterpart_payment_url.clone(),
            webhook_url: config.webhook_url(),
            default_events: config.subscribed_events.clone(),
            timeout: config.send_timeout(),
            health_timeout: config.health_timeout(),
        }
    }

    /// Register as a partner with the counterpart.
    ///
    /// # Arguments
    ///
    /// * `counterpart_url` - Counterpart base URL; defaults to the configured one
    /// * `events` - Events to subscribe to; defaults to the configured list
    pub async fn register(
        &self,
        counterpart_url: Option<&str>,
        events: Option<Vec<String>>,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        let _registering = self.registering.lock().await;
        if let Some(partner_id) = self.session.partner_id() {
            return Err(SessionError::AlreadyRegistered { partner_id }.into());
        }

        let base = counterpart_url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(&self.counterpart_url)
            .trim_end_matches('/')
            .to_string();
        Url::parse(&base)?;
        // Appended rather than joined so a path prefix on the base survives.
        let url = Url::parse(&format!("{base}/api/v1/partners/register"))?;

        let simple_id = Uuid::new_v4().simple().to_string();
        let request = RegistrationRequest {
            name: format!("partner-demo-{}", &simple_id[..8]),
            webhook_url: self.webhook_url.clone(),
            events: events
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| self.default_events.clone()),
            description: "Demo B2B Partner for webhook interoperability testing".to_string(),
            contact_email: "demo@partner.local".to_string(),
        };

        info!(
            url = %url,
            name = %request.name,
            events = ?request.events,
            "partner_registration_starting"
        );

        let response = self
            .client
            .post(url.clone())
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(url = %url, error = %e, "partner_registration_transport_error");
                TransportError::from(e)
            })?;

        match response.status() {
            StatusCode::CREATED => {}
            StatusCode::CONFLICT => {
                warn!(name = %request.name, "partner_registration_conflict");
                return Err(RegistrationError::Conflict);
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                warn!(status_code = status.as_u16(), "partner_registration_rejected");
                return Err(RegistrationError::Rejected {
                    status: status.as_u16(),
                    body,
                });
            }
        }

        let registered: RegistrationResponse = response
            .json()
            .await
            .map_err(|e| RegistrationError::MalformedResponse(e.to_string()))?;

        let registered_at = Utc::now();
        self.session.register(PartnerCredentials {
            partner_id: registered.id.clone(),
            secret: registered.secret,
            registered_at,
            counterpart_url: base.clone(),
        })?;

        info!(
            partner_id = %registered.id,
            subscribed_events = ?registered.subscribed_events,
            "partner_registration_complete"
        );

        Ok(RegistrationOutcome {
            partner_id: registered.id,
            subscribed_events: registered.subscribed_events,
            registered_at,
            counterpart_url: base,
        })
    }

    /// Probe both counterpart services concurrently.
    pub async fn check_health(&self) -> CounterpartHealth {
        let counterpart_url = self
            .session
            .credentials()
            .map(|c| c.counterpart_url)
            .unwrap_or_else(|| self.counterpart_url.clone());

        let (counterpart, counterpart_payment) = futures::future::join(
            self.probe(counterpart_url),
            self.probe(self.payment_url.clone()),
        )
        .await;

        CounterpartHealth {
            counterpart,
            counterpart_payment,
        }
    }

    async fn probe(&self, base: String) -> ServiceHealth {
        let url = format!("{}/health", base.trim_end_matches('/'));

        let status = match self
            .client
            .get(&url)
            .timeout(self.health_timeout)
            .send()
            .await
        {
            Ok(resp) if resp.status() == StatusCode::OK => ServiceStatus::Online,
            Ok(resp) => {
                warn!(url = %url, status_code = resp.status().as_u16(), "counterpart_health_error");
                ServiceStatus::Error
            }
            Err(e) => {
                warn!(url = %url, error = %e, "counterpart_health_offline");
                ServiceStatus::Offline
            }
        };

        ServiceHealth { status, url: base }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode as AxumStatus, routing::get, routing::post, Json, Router};
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    async fn spawn_server(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://127.0.0.1:{port}")
    }

    async fn unused_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{port}")
    }

    fn config(counterpart_url: &str, payment_url: &str) -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 8088,
            webhook_path: "/api/webhook".to_string(),
            public_base_url: "http://localhost:8088".to_string(),
            counterpart_url: counterpart_url.to_string(),
            counterpart_payment_url: payment_url.to_string(),
            send_timeout_ms: 2_000,
            health_timeout_ms: 2_000,
            max_events: 100,
            subscribed_events: vec!["payment.created".to_string()],
        }
    }

    #[tokio::test]
    async fn test_register_success_writes_session() {
        let seen: Arc<Mutex<Option<RegistrationRequest>>> = Arc::new(Mutex::new(None));
        let captured = seen.clone();
        let app = Router::new().route(
            "/api/v1/partners/register",
            post(move |Json(body): Json<RegistrationRequest>| {
                let captured = captured.clone();
                async move {
                    *captured.lock().unwrap() = Some(body);
                    (
                        AxumStatus::CREATED,
                        Json(serde_json::json!({
                            "id": "partner-7",
                            "secret": "s3cret",
                            "subscribedEvents": ["payment.created"]
                        })),
                    )
                }
            }),
        );
        let base = spawn_server(app).await;
        let session = PartnerSession::new();
        let client = RegistrationClient::new(Client::new(), session.clone(), &config(&base, &base));

        let outcome = client.register(None, None).await.unwrap();

        assert_eq!(outcome.partner_id, "partner-7");
        assert_eq!(outcome.subscribed_events, vec!["payment.created"]);
        assert_eq!(session.secret(), Some(b"s3cret".to_vec()));
        assert_eq!(session.credentials().unwrap().counterpart_url, base);

        let request = seen.lock().unwrap().clone().unwrap();
        assert!(request.name.starts_with("partner-demo-"));
        assert_eq!(request.name.len(), "partner-demo-".len() + 8);
        assert_eq!(request.webhook_url, "http://localhost:8088/api/webhook");
        assert_eq!(request.events, vec!["payment.created"]);
    }

    #[tokio::test]
    async fn test_register_conflict() {
        let app = Router::new().route(
            "/api/v1/partners/register",
            post(|| async { AxumStatus::CONFLICT }),
        );
        let base = spawn_server(app).await;
        let session = PartnerSession::new();
        let client = RegistrationClient::new(Client::new(), session.clone(), &config(&base, &base));

        let err = client.register(None, None).await.unwrap_err();

        assert!(matches!(err, RegistrationError::Conflict));
        assert!(!session.is_registered());
    }

    #[tokio::test]
    async fn test_register_rejected_keeps_body() {
        let app = Router::new().route(
            "/api/v1/partners/register",
            post(|| async { (AxumStatus::BAD_REQUEST, "events must not be empty") }),
        );
        let base = spawn_server(app).await;
        let client =
            RegistrationClient::new(Client::new(), PartnerSession::new(), &config(&base, &base));

        match client.register(Some(&base), None).await.unwrap_err() {
            RegistrationError::Rejected { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "events must not be empty");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_register_malformed_response() {
        let app = Router::new().route(
            "/api/v1/partners/register",
            post(|| async { (AxumStatus::CREATED, Json(serde_json::json!({"id": "p"}))) }),
        );
        let base = spawn_server(app).await;
        let session = PartnerSession::new();
        let client = RegistrationClient::new(Client::new(), session.clone(), &config(&base, &base));

        let err = client.register(None, None).await.unwrap_err();

        assert!(matches!(err, RegistrationError::MalformedResponse(_)));
        assert!(!session.is_registered());
    }

    #[tokio::test]
    async fn test_register_unreachable_counterpart() {
        let base = unused_url().await;
        let client =
            RegistrationClient::new(Client::new(), PartnerSession::new(), &config(&base, &base));

        let err = client.register(None, None).await.unwrap_err();

        assert!(matches!(
            err,
            RegistrationError::Transport(TransportError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn test_register_twice_short_circuits() {
        let session = PartnerSession::new();
        session
            .register(PartnerCredentials {
                partner_id: "partner-1".to_string(),
                secret: "abc123".to_string(),
                registered_at: Utc::now(),
                counterpart_url: "http://localhost:3000".to_string(),
            })
            .unwrap();
        // Nothing listens here; a network attempt would fail differently.
        let base = unused_url().await;
        let client = RegistrationClient::new(Client::new(), session, &config(&base, &base));

        let err = client.register(None, None).await.unwrap_err();

        assert!(matches!(
            err,
            RegistrationError::Session(SessionError::AlreadyRegistered { .. })
        ));
    }

    #[tokio::test]
    async fn test_register_keeps_base_path_prefix() {
        let app = Router::new()
            .route(
                "/mesa/api/v1/partners/register",
                post(|| async {
                    (
                        AxumStatus::CREATED,
                        Json(serde_json::json!({"id": "partner-9", "secret": "s"})),
                    )
                }),
            )
            .route(
                "/api/v1/partners/register",
                post(|| async { AxumStatus::NOT_FOUND }),
            );
        let base = format!("{}/mesa/", spawn_server(app).await);
        let session = PartnerSession::new();
        let client = RegistrationClient::new(Client::new(), session.clone(), &config(&base, &base));

        let outcome = client.register(None, None).await.unwrap();

        assert_eq!(outcome.partner_id, "partner-9");
        assert_eq!(outcome.counterpart_url, base.trim_end_matches('/'));
        assert_eq!(session.partner_id().as_deref(), Some("partner-9"));
    }

    #[tokio::test]
    async fn test_concurrent_register_reaches_counterpart_once() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = calls.clone();
        let app = Router::new().route(
            "/api/v1/partners/register",
            post(move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    (
                        AxumStatus::CREATED,
                        Json(serde_json::json!({"id": format!("p{n}"), "secret": format!("s{n}")})),
                    )
                }
            }),
        );
        let base = spawn_server(app).await;
        let session = PartnerSession::new();
        let client = RegistrationClient::new(Client::new(), session.clone(), &config(&base, &base));
        let other = client.clone();

        let (a, b) = tokio::join!(client.register(None, None), other.register(None, None));

        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        let loser = if a.is_ok() { b } else { a };
        assert!(matches!(
            loser.unwrap_err(),
            RegistrationError::Session(SessionError::AlreadyRegistered { .. })
        ));
        assert_eq!(session.partner_id().as_deref(), Some("p0"));
        assert_eq!(session.secret(), Some(b"s0".to_vec()));
    }

    #[tokio::test]
    async fn test_register_invalid_url() {
        let client = RegistrationClient::new(
            Client::new(),
            PartnerSession::new(),
            &config("http://localhost:3000", "http://localhost:8000"),
        );

        let err = client.register(Some("not a url"), None).await.unwrap_err();

        assert!(matches!(err, RegistrationError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_check_health() {
        let online = spawn_server(Router::new().route("/health", get(|| async { "ok" }))).await;
        let broken = spawn_server(
            Router::new().route("/health", get(|| async { AxumStatus::SERVICE_UNAVAILABLE })),
        )
        .await;
        let client =
            RegistrationClient::new(Client::new(), PartnerSession::new(), &config(&online, &broken));

        let health = client.check_health().await;
        assert_eq!(health.counterpart.status, ServiceStatus::Online);
        assert_eq!(health.counterpart.url, online);
        assert_eq!(health.counterpart_payment.status, ServiceStatus::Error);

        let offline = unused_url().await;
        let client =
            RegistrationClient::new(Client::new(), PartnerSession::new(), &config(&offline, &online));
        let health = client.check_health().await;
        assert_eq!(health.counterpart.status, ServiceStatus::Offline);
        assert_eq!(health.counterpart_payment.status, ServiceStatus::Online);
    }
}
