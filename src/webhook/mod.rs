//! ClickUp webhook trigger.
//!
//! `POST /clickup-webhook` turns task-created events and "adw" comments into
//! background workflow runs. `GET /health` reports the health check verdict.
//! Both always answer 200; the outcome is in the body's `status` field.

pub mod launcher;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::model::agent::make_adw_id;
pub use launcher::{HealthProbe, Launcher, ProbeError, ProcessLauncher};

const SERVICE_NAME: &str = "adw-clickup-webhook-trigger";
const SIGNATURE_HEADER: &str = "x-signature";

#[derive(Clone)]
pub struct WebhookState {
    pub secret: Option<String>,
    pub list_id: Option<String>,
    pub agents_dir: PathBuf,
    pub launcher: Arc<dyn Launcher>,
}

impl WebhookState {
    pub fn new(config: &AppConfig, launcher: Arc<dyn Launcher>) -> Self {
        Self {
            secret: config.clickup.webhook_secret.clone(),
            list_id: config.clickup.list_id.clone(),
            agents_dir: config.agent.agents_dir.clone(),
            launcher,
        }
    }
}

pub fn build_router(state: WebhookState) -> Router {
    Router::new()
        .route("/clickup-webhook", post(clickup_webhook))
        .route("/health", get(health))
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
}

/// A panicking handler still answers 200 with an error body.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = detail, "Error processing webhook");
    Json(json!({
        "status": "error",
        "message": "Internal error processing webhook",
    }))
    .into_response()
}

pub async fn serve(config: &AppConfig, port: u16) -> Result<()> {
    if config.clickup.webhook_secret.is_none() {
        warn!("CLICKUP_WEBHOOK_SECRET not set - signature verification disabled");
    }
    let launcher = Arc::new(ProcessLauncher::current()?);
    let app = build_router(WebhookState::new(config, launcher));

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Starting server on http://{addr}");
    info!("Webhook endpoint: POST /clickup-webhook");
    info!("Health check: GET /health");
    axum::serve(listener, app).await?;
    Ok(())
}

/// ClickUp sends ids as strings, but some payloads carry bare numbers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum FlexId {
    Text(String),
    Number(i64),
}

impl FlexId {
    fn into_string(self) -> String {
        match self {
            FlexId::Text(s) => s,
            FlexId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct HistoryItem {
    task_id: Option<FlexId>,
}

#[derive(Debug, Default, Deserialize)]
struct CommentBody {
    #[serde(default)]
    comment_text: String,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookEvent {
    #[serde(default)]
    event: String,
    task_id: Option<FlexId>,
    list_id: Option<FlexId>,
    #[serde(default)]
    history_items: Vec<HistoryItem>,
    comment: Option<CommentBody>,
}

impl WebhookEvent {
    fn task_id(&self) -> Option<String> {
        self.task_id
            .clone()
            .or_else(|| self.history_items.first().and_then(|h| h.task_id.clone()))
            .map(FlexId::into_string)
            .filter(|id| !id.is_empty())
    }
}

/// Whether an event should start a run, with the reason either way.
#[derive(Debug, PartialEq, Eq)]
enum Trigger {
    Fire(&'static str),
    Skip(String),
}

fn evaluate(event: &WebhookEvent, allowed_list: Option<&str>) -> Trigger {
    match event.event.as_str() {
        "taskCreated" => match allowed_list {
            Some(list) if event.list_id.clone().map(FlexId::into_string).as_deref() != Some(list) => {
                Trigger::Skip(format!("Task not in configured list {list}"))
            }
            _ => Trigger::Fire("New task created"),
        },
        "taskCommentPosted" => {
            let text = event
                .comment
                .as_ref()
                .map(|c| c.comment_text.trim().to_lowercase())
                .unwrap_or_default();
            if text == "adw" {
                Trigger::Fire("Comment with 'adw' command")
            } else {
                Trigger::Skip(format!("Not a triggering event (event={})", event.event))
            }
        }
        other => Trigger::Skip(format!("Not a triggering event (event={other})")),
    }
}

fn signature_ok(expected: Option<&str>, headers: &HeaderMap) -> bool {
    let Some(expected) = expected else {
        warn!("CLICKUP_WEBHOOK_SECRET not set - signature verification disabled");
        return true;
    };
    let received = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    received == Some(expected)
}

async fn clickup_webhook(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    info!("ClickUp webhook endpoint hit");

    if !signature_ok(state.secret.as_deref(), &headers) {
        warn!("Invalid webhook signature");
        return Json(json!({ "status": "error", "error": "Invalid signature" }));
    }

    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Webhook body is not valid JSON");
            return Json(json!({ "status": "error", "error": "Invalid JSON" }));
        }
    };

    if event.event == "ping" {
        info!("Received ping webhook from ClickUp");
        return Json(json!({
            "status": "ok",
            "message": "Pong! Webhook is configured correctly",
        }));
    }

    let Some(task_id) = event.task_id() else {
        warn!(event = %event.event, "No task_id found in payload");
        return Json(json!({ "status": "error", "error": "No task_id provided" }));
    };
    info!(task_id = %task_id, event = %event.event, "Webhook event received");

    match evaluate(&event, state.list_id.as_deref()) {
        Trigger::Fire(reason) => {
            let adw_id = make_adw_id();
            if let Err(e) = state.launcher.launch_workflow(&task_id, &adw_id) {
                error!(error = %format!("{e:#}"), "Error processing webhook");
                return Json(json!({
                    "status": "error",
                    "message": "Internal error processing webhook",
                }));
            }
            let log_dir = state.agents_dir.join(&adw_id).join("adw_plan_build");
            info!(
                task_id = %task_id,
                adw_id = %adw_id,
                logs = %log_dir.display(),
                "Background process started"
            );
            Json(json!({
                "status": "accepted",
                "task": task_id,
                "adw_id": adw_id,
                "message": format!("ADW workflow triggered for task #{task_id}"),
                "reason": reason,
                "logs": format!("{}/", log_dir.display()),
            }))
        }
        Trigger::Skip(reason) => {
            info!(event = %event.event, task_id = %task_id, reason = %reason, "Ignoring webhook");
            Json(json!({ "status": "ignored", "reason": reason }))
        }
    }
}

async fn health(State(state): State<WebhookState>) -> Json<Value> {
    match state.launcher.probe_health().await {
        Ok(probe) => {
            let (warnings, errors) = probe
                .report
                .map(|r| (r.warnings, r.errors))
                .unwrap_or_default();
            let status = if probe.healthy { "healthy" } else { "unhealthy" };
            Json(json!({
                "status": status,
                "service": SERVICE_NAME,
                "health_check": {
                    "success": probe.healthy,
                    "warnings": warnings,
                    "errors": errors,
                    "details": "Run adw health --platform clickup directly for full report",
                },
            }))
        }
        Err(e) => {
            error!(error = %e, "Health probe failed");
            Json(json!({
                "status": "unhealthy",
                "service": SERVICE_NAME,
                "error": e.to_string(),
            }))
        }
    }
}
