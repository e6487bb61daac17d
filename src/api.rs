//! HTTP control surface for the browser front end.
//!
//! Routes:
//! - `/api/relax`  start the relaxation scene (200 accepted, 409 already running)
//! - `/api/say`    TTS, `text` from the JSON body or the query string
//! - `/api/action` spoken directive, `command` from the body or the query
//! - `/api/stop`   stop playback, interrupt the scene
//! - `/api/config` read/write the persisted front-end config
//! - `/api/status` scene state and device variant
//!
//! Anything else is served from the static asset root.

use std::path::Path;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{info, warn};

use crate::controller::{SceneController, SceneStart};
use crate::error::ApiError;
use crate::store::ConfigStore;

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<SceneController>,
    pub store: Arc<ConfigStore>,
}

// --- Request/Response types ---

#[derive(Debug, Default, Deserialize)]
struct SayParams {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ActionParams {
    command: Option<String>,
}

/// Raw query pairs. Repeated keys are kept, the first one wins on lookup.
type QueryPairs = Result<Query<Vec<(String, String)>>, QueryRejection>;

/// `{status, message}` body returned by every control route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBody {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusBody {
    fn with_message(status: &str, message: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            message: Some(message.into()),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::with_message("success", message)
    }

    pub fn ignored(message: impl Into<String>) -> Self {
        Self::with_message("ignored", message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::with_message("error", message)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusReport {
    pub scene_running: bool,
    pub device: String,
}

/// Build the axum router.
pub fn router(state: AppState, assets_dir: &Path) -> Router {
    Router::new()
        .route("/api/relax", get(handle_relax).post(handle_relax))
        .route("/api/say", post(handle_say))
        .route("/api/action", post(handle_action))
        .route("/api/stop", get(handle_stop).post(handle_stop))
        .route("/api/config", get(handle_get_config).post(handle_save_config))
        .route("/api/status", get(handle_status))
        .fallback_service(ServeDir::new(assets_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// --- Handlers ---

async fn handle_relax(State(state): State<AppState>) -> (StatusCode, Json<StatusBody>) {
    match state.controller.start_scene() {
        SceneStart::Started => (
            StatusCode::OK,
            Json(StatusBody::success("Relaxing music started")),
        ),
        SceneStart::AlreadyRunning => (
            StatusCode::CONFLICT,
            Json(StatusBody::ignored("Already running")),
        ),
    }
}

async fn handle_say(
    State(state): State<AppState>,
    query: QueryPairs,
    body: Bytes,
) -> Result<Json<StatusBody>, ApiError> {
    let text = required(
        "text",
        lenient_body::<SayParams>(&body).text,
        query_param(query, "text"),
    )?;
    state.controller.speak_text(&text).await?;
    Ok(Json(StatusBody::success(format!("Said: {text}"))))
}

async fn handle_action(
    State(state): State<AppState>,
    query: QueryPairs,
    body: Bytes,
) -> Result<Json<StatusBody>, ApiError> {
    let command = required(
        "command",
        lenient_body::<ActionParams>(&body).command,
        query_param(query, "command"),
    )?;
    state.controller.execute_directive(&command).await?;
    Ok(Json(StatusBody::success(format!("Executed: {command}"))))
}

async fn handle_stop(State(state): State<AppState>) -> Result<Json<StatusBody>, ApiError> {
    state.controller.stop_all().await?;
    Ok(Json(StatusBody::success("Stopped")))
}

async fn handle_get_config(State(state): State<AppState>) -> Json<Value> {
    Json(state.store.load().await)
}

async fn handle_save_config(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<StatusBody>, ApiError> {
    let value: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Validation(format!("Invalid JSON body: {e}")))?;
    state.store.save(&value).await?;
    Ok(Json(StatusBody {
        status: "success".into(),
        message: None,
    }))
}

async fn handle_status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(StatusReport {
        scene_running: state.controller.is_running(),
        device: state.controller.device_kind().to_string(),
    })
}

/// Parse a JSON body, treating an absent or malformed one as empty.
fn lenient_body<T: DeserializeOwned + Default>(body: &[u8]) -> T {
    if body.is_empty() {
        return T::default();
    }
    serde_json::from_slice(body).unwrap_or_else(|e| {
        warn!("Ignoring unparseable request body: {e}");
        T::default()
    })
}

/// First value of `name` in the query string. An unparseable query has none.
fn query_param(query: QueryPairs, name: &str) -> Option<String> {
    let Query(pairs) = query
        .inspect_err(|e| warn!("Ignoring unparseable query string: {e}"))
        .ok()?;
    pairs.into_iter().find(|(k, _)| k == name).map(|(_, v)| v)
}

/// First non-empty value of a required field, body before query.
fn required(
    name: &str,
    from_body: Option<String>,
    from_query: Option<String>,
) -> Result<String, ApiError> {
    from_body
        .filter(|v| !v.is_empty())
        .or_else(|| from_query.filter(|v| !v.is_empty()))
        .ok_or_else(|| {
            info!("Rejected request: missing '{name}'");
            ApiError::Validation(format!("Missing '{name}' parameter"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_value_wins_over_query() {
        let got = required("text", Some("body".into()), Some("query".into())).expect("value");
        assert_eq!(got, "body");
    }

    #[test]
    fn empty_body_value_falls_back_to_query() {
        let got = required("text", Some(String::new()), Some("query".into())).expect("value");
        assert_eq!(got, "query");
    }

    #[test]
    fn missing_everywhere_is_validation_error() {
        let err = required("command", None, Some(String::new())).expect_err("missing");
        assert_eq!(err.to_string(), "Missing 'command' parameter");
    }

    #[test]
    fn repeated_query_key_takes_first_value() {
        let pairs = vec![
            ("text".to_string(), "a".to_string()),
            ("text".to_string(), "b".to_string()),
        ];
        assert_eq!(query_param(Ok(Query(pairs)), "text").as_deref(), Some("a"));
        assert_eq!(query_param(Ok(Query(Vec::new())), "text"), None);
    }

    #[test]
    fn malformed_body_reads_as_empty() {
        let params: SayParams = lenient_body(b"text=hello");
        assert!(params.text.is_none());
        let params: SayParams = lenient_body(br#"{"text": 5}"#);
        assert!(params.text.is_none());
        let params: SayParams = lenient_body(br#"{"text": "hi"}"#);
        assert_eq!(params.text.as_deref(), Some("hi"));
    }

    #[test]
    fn status_body_omits_absent_message() {
        let body = StatusBody {
            status: "success".into(),
            message: None,
        };
        assert_eq!(serde_json::to_string(&body).expect("json"), r#"{"status":"success"}"#);
        assert_eq!(
            serde_json::to_value(StatusBody::ignored("Already running")).expect("json"),
            serde_json::json!({ "status": "ignored", "message": "Already running" })
        );
    }
}
