//! HTTP server: health check, slash commands and Events API callbacks.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use super::signature::{verify_slack_signature, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::channels::{SlackEvent, SlashCommand};
use crate::error::{ChannelError, GatewayError};
use crate::report::ReportPipeline;
use crate::sentiment::SentimentHandler;

/// Body of `GET /` and `GET /health`.
pub const HEALTH_TEXT: &str = "Service is running.";

/// Slash command that triggers an on-demand report.
pub const REPORT_COMMAND: &str = "/dailyreport";

const RETRY_HEADER: &str = "x-slack-retry-num";

/// Shared server state.
pub struct AppState {
    pub pipeline: Arc<ReportPipeline>,
    pub sentiment: Arc<SentimentHandler>,
    /// Slack routes are only mounted when this is set.
    pub signing_secret: Option<String>,
}

impl AppState {
    pub fn new(
        pipeline: Arc<ReportPipeline>,
        sentiment: Arc<SentimentHandler>,
        signing_secret: Option<String>,
    ) -> Self {
        Self {
            pipeline,
            sentiment,
            signing_secret: signing_secret.filter(|s| !s.is_empty()),
        }
    }

    fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), ChannelError> {
        let secret = self
            .signing_secret
            .as_deref()
            .ok_or_else(|| ChannelError::SignatureInvalid("no signing secret configured".to_string()))?;

        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| ChannelError::SignatureInvalid(format!("missing {} header", name)))
        };

        verify_slack_signature(
            secret,
            header(TIMESTAMP_HEADER)?,
            header(SIGNATURE_HEADER)?,
            body,
            chrono::Utc::now().timestamp(),
        )
    }
}

/// Build the router for `state`.
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler));

    if state.signing_secret.is_some() {
        app = app
            .route("/slack/commands", post(slash_command_handler))
            .route("/slack/events", post(events_handler));
    } else {
        error!("SLACK_SIGNING_SECRET is not set; slash commands and events are disabled");
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// The HTTP listener.
pub struct GatewayServer {
    state: Arc<AppState>,
    host: String,
    port: u16,
}

impl GatewayServer {
    /// Create a new gateway server.
    pub fn new(state: Arc<AppState>, host: &str, port: u16) -> Self {
        Self {
            state,
            host: host.to_string(),
            port,
        }
    }

    /// Get a reference to the server state.
    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Serve until `shutdown` resolves.
    pub async fn serve<F>(&self, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| GatewayError::InvalidAddress(format!("{}:{}: {}", self.host, self.port, e)))?;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::ServerError(e.to_string()))?;

        info!("Listening on {}", addr);

        axum::serve(listener, router(self.state.clone()))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| GatewayError::ServerError(e.to_string()))
    }
}

async fn health_handler() -> &'static str {
    HEALTH_TEXT
}

fn ephemeral(text: &str) -> Response {
    Json(json!({ "response_type": "ephemeral", "text": text })).into_response()
}

async fn slash_command_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(e) = state.verify(&headers, &body) {
        warn!(error = %e, "Rejected slash command");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let command = match SlashCommand::from_form(&body) {
        Ok(command) => command,
        Err(e) => {
            warn!(error = %e, "Malformed slash command");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    if command.command != REPORT_COMMAND {
        debug!(command = %command.command, "Unknown slash command");
        return ephemeral(&format!(
            "Unknown command `{}`. Try `{}`.",
            command.command, REPORT_COMMAND
        ));
    }

    info!(channel = %command.channel_id, user = %command.user_id, "On-demand report requested");

    let pipeline = state.pipeline.clone();
    let channel = command.channel_id.clone();
    tokio::spawn(async move {
        if let Err(e) = pipeline.run_on_demand(&channel).await {
            pipeline.notify_failure(&channel, &e).await;
        }
    });

    ephemeral("Generating the report for the last 24 hours...")
}

async fn events_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(e) = state.verify(&headers, &body) {
        warn!(error = %e, "Rejected event callback");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Malformed event payload");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match payload.get("type").and_then(Value::as_str) {
        Some("url_verification") => {
            let challenge = payload.get("challenge").cloned().unwrap_or(Value::Null);
            Json(json!({ "challenge": challenge })).into_response()
        }
        Some("event_callback") => {
            // Slack redelivers when the first ack was slow; the first delivery
            // already produced a summary.
            if let Some(retry) = headers.get(RETRY_HEADER) {
                debug!(retry = ?retry, "Skipping redelivered event");
                return StatusCode::OK.into_response();
            }

            if let Some(event) = payload.get("event").and_then(SlackEvent::from_event) {
                let sentiment = state.sentiment.clone();
                tokio::spawn(async move {
                    if let Err(e) = sentiment.handle(&event).await {
                        error!(error = %e, "Failed to summarize event sentiment");
                    }
                });
            }
            StatusCode::OK.into_response()
        }
        other => {
            debug!(kind = ?other, "Ignoring callback");
            StatusCode::OK.into_response()
        }
    }
}
