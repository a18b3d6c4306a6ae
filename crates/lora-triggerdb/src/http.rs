//! HTTP endpoints consumed by the editor's browser UI.
//!
//! Bodies are parsed by hand from raw bytes so a malformed request still gets
//! the response shape the UI expects. Store and metadata work runs on the
//! blocking pool.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::loader::{LoadRequest, LoraLoader, TriggerSource};
use crate::store::{SaveOutcome, TriggerRecord};

#[derive(Clone)]
pub struct AppState {
    pub loader: Arc<LoraLoader>,
}

impl AppState {
    pub fn new(loader: LoraLoader) -> Self {
        Self {
            loader: Arc::new(loader),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/lora_triggers", post(fetch_triggers))
        .route("/lora_triggers_save", post(save_triggers))
        .route("/lora_triggers_metadata", post(metadata_triggers))
        .route("/lora_load", post(load_lora))
        .route("/health", get(health))
        .with_state(state)
}

// ---------- wire types ----------

fn null_as_empty<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NameRequest {
    #[serde(alias = "loraName", deserialize_with = "null_as_empty")]
    lora_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SaveRequest {
    #[serde(alias = "loraName", deserialize_with = "null_as_empty")]
    lora_name: String,
    #[serde(alias = "allTriggers", deserialize_with = "null_as_empty")]
    all_triggers: String,
    #[serde(alias = "activeTriggers", deserialize_with = "null_as_empty")]
    active_triggers: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct LoadBody {
    #[serde(alias = "loraName", deserialize_with = "null_as_empty")]
    lora_name: String,
    #[serde(alias = "strengthModel")]
    strength_model: f64,
    #[serde(alias = "allTriggers", deserialize_with = "null_as_empty")]
    all_triggers: String,
    #[serde(alias = "activeTriggers", deserialize_with = "null_as_empty")]
    active_triggers: String,
    autoload: bool,
}

impl Default for LoadBody {
    fn default() -> Self {
        Self {
            lora_name: String::new(),
            strength_model: 1.0,
            all_triggers: String::new(),
            active_triggers: String::new(),
            autoload: true,
        }
    }
}

impl From<LoadBody> for LoadRequest {
    fn from(b: LoadBody) -> Self {
        LoadRequest {
            lora_name: b.lora_name,
            strength_model: b.strength_model,
            all_triggers: b.all_triggers,
            active_triggers: b.active_triggers,
            autoload: b.autoload,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub success: bool,
    pub message: String,
}

impl SaveResponse {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetadataResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_triggers: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_triggers: Option<String>,
    pub message: String,
}

impl MetadataResponse {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            all_triggers: None,
            active_triggers: None,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoadResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lora_path: Option<String>,
    pub strength_model: f64,
    pub all_triggers: String,
    pub active_triggers: String,
    pub source: TriggerSource,
}

// ---------- handlers ----------

async fn fetch_triggers(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<TriggerRecord>) {
    let req: NameRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            tracing::warn!("error in /lora_triggers: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(TriggerRecord::default()));
        }
    };
    if req.lora_name.is_empty() {
        return (StatusCode::OK, Json(TriggerRecord::default()));
    }

    let loader = state.loader.clone();
    let name = req.lora_name.clone();
    match tokio::task::spawn_blocking(move || loader.store().load().record_for(&name)).await {
        Ok(rec) => {
            tracing::info!("served triggers for '{}'", req.lora_name);
            (StatusCode::OK, Json(rec))
        }
        Err(e) => {
            tracing::error!("trigger lookup task failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(TriggerRecord::default()))
        }
    }
}

async fn save_triggers(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<SaveResponse>) {
    let req: SaveRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            tracing::warn!("error in /lora_triggers_save: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SaveResponse::failed(format!("Error: {e}"))),
            );
        }
    };
    if req.lora_name.is_empty() {
        return (StatusCode::OK, Json(SaveResponse::failed("No LoRa name provided")));
    }

    let loader = state.loader.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let store = loader.store();
        let mut db = store.load();
        store.save(&mut db, &req.lora_name, &req.all_triggers, &req.active_triggers)
    })
    .await;

    let response = match joined {
        Ok(Ok(SaveOutcome::Saved { key })) => SaveResponse {
            success: true,
            message: format!("Saved triggers for {key}"),
        },
        Ok(Ok(SaveOutcome::NothingToSave)) => SaveResponse::failed("No trigger words to save"),
        Ok(Err(e)) => {
            tracing::warn!("error saving trigger store: {}", e);
            SaveResponse::failed(format!("Error saving: {e}"))
        }
        Err(e) => {
            tracing::error!("trigger save task failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SaveResponse::failed(format!("Error: {e}"))),
            );
        }
    };
    (StatusCode::OK, Json(response))
}

async fn metadata_triggers(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<MetadataResponse>) {
    let req: NameRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            tracing::warn!("error in /lora_triggers_metadata: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(MetadataResponse::failed(format!("Error: {e}"))),
            );
        }
    };
    if req.lora_name.is_empty() {
        return (
            StatusCode::OK,
            Json(MetadataResponse::failed("No LoRa name provided")),
        );
    }

    let loader = state.loader.clone();
    let name = req.lora_name.clone();
    match tokio::task::spawn_blocking(move || loader.metadata_triggers(&name)).await {
        Ok(Ok(rec)) => {
            tracing::info!("metadata triggers for '{}': {}", req.lora_name, rec.all_triggers);
            (
                StatusCode::OK,
                Json(MetadataResponse {
                    success: true,
                    all_triggers: Some(rec.all_triggers),
                    active_triggers: Some(rec.active_triggers),
                    message: format!("Found trigger words in metadata of {}", req.lora_name),
                }),
            )
        }
        Ok(Err(e)) => {
            tracing::debug!("metadata lookup for '{}' failed: {}", req.lora_name, e);
            (StatusCode::OK, Json(MetadataResponse::failed(e.to_string())))
        }
        Err(e) => {
            tracing::error!("metadata task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(MetadataResponse::failed(format!("Error: {e}"))),
            )
        }
    }
}

async fn load_lora(State(state): State<AppState>, body: Bytes) -> Response {
    let req: LoadBody = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": format!("Invalid JSON request: {e}") })),
            )
                .into_response();
        }
    };

    let loader = state.loader.clone();
    match tokio::task::spawn_blocking(move || loader.load(req.into())).await {
        Ok(out) => Json(LoadResponse {
            lora_path: out.lora_path.map(|p| p.to_string_lossy().into_owned()),
            strength_model: out.strength_model,
            all_triggers: out.all_triggers,
            active_triggers: out.active_triggers,
            source: out.source,
        })
        .into_response(),
        Err(e) => {
            tracing::error!("load task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "store": state.loader.store().path().display().to_string(),
    }))
}
