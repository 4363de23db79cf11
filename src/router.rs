use crate::error::ApiError;
use crate::host::{Network, Platform, StaticFiles};
use crate::meeting::MeetingService;
use crate::models::WifiCredentials;
use crate::sensor::Sensor;
use crate::store::{self, ConfigHandle, ConfigStore};
use crate::stream::StreamSettings;
use crate::{config_api, status, stream};
use axum::{
    extract::State,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    /// `None` when the persisted config could not be read at boot.
    pub config: Option<ConfigHandle>,
    pub store: Arc<dyn ConfigStore>,
    pub sensor: Arc<dyn Sensor>,
    pub network: Arc<dyn Network>,
    pub platform: Arc<dyn Platform>,
    pub files: Arc<dyn StaticFiles>,
    pub meeting: Option<Arc<MeetingService>>,
    pub stream: StreamSettings,
    pub reboot_delay: Duration,
    /// Set once a restart is scheduled; config writes are refused from then on.
    pub restart_pending: Arc<AtomicBool>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(status::status).fallback(fallback))
        .route(
            "/api/config",
            get(config_api::get_config)
                .post(config_api::post_config)
                .fallback(fallback),
        )
        .route("/api/meeting/status", get(meeting_status).fallback(fallback))
        .route(
            "/api/meeting/heartbeat",
            post(meeting_heartbeat).fallback(fallback),
        )
        .route("/api/reboot", post(reboot).fallback(fallback))
        .route("/api/factory_reset", post(factory_reset).fallback(fallback))
        .route("/stream", get(stream::stream).fallback(fallback))
        .fallback(fallback)
        .with_state(state)
}

/// Unmatched requests: GET goes to the UI bundle, everything else is 404.
async fn fallback(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    if method != Method::GET {
        return ApiError::NotFound.into_response();
    }
    let path = match uri.path() {
        "/" => "/index.html",
        other => other,
    };
    match state.files.read(path) {
        Some(bytes) => ([(header::CONTENT_TYPE, content_type_for(path))], bytes).into_response(),
        None => ApiError::NotFound.into_response(),
    }
}

pub fn content_type_for(path: &str) -> &'static str {
    match path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("html") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}

async fn meeting_status(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let handle = state.config.as_ref().ok_or(ApiError::ConfigUnavailable)?;
    let settings = handle.snapshot().await.meeting;
    let meeting_state = match &state.meeting {
        Some(meeting) => json!(meeting.state().status(state.platform.uptime_ms())),
        None => json!({ "error": "meeting_not_ready" }),
    };
    Ok(Json(json!({
        "ok": true,
        "config": settings,
        "state": meeting_state,
    })))
}

async fn meeting_heartbeat(State(state): State<AppState>) -> Result<Response, ApiError> {
    let meeting = state.meeting.as_ref().ok_or(ApiError::MeetingNotReady)?;
    let ok = meeting.send_heartbeat().await;
    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    let body = json!({
        "ok": ok,
        "meeting": meeting.state().status(state.platform.uptime_ms()),
    });
    Ok((status, Json(body)).into_response())
}

async fn reboot(State(state): State<AppState>) -> Json<serde_json::Value> {
    info!("reboot requested");
    schedule_restart(&state);
    Json(json!({ "ok": true }))
}

async fn factory_reset(State(state): State<AppState>) -> Json<serde_json::Value> {
    info!("factory reset requested");
    let cleared = match &state.config {
        Some(handle) => {
            let mut config = handle.lock().await;
            config.wifi = WifiCredentials::default();
            state.restart_pending.store(true, Ordering::SeqCst);
            let snapshot = config.clone();
            store::blocking(state.store.clone(), move |store| store.save(&snapshot))
                .await
                .map(|_| ())
        }
        None => {
            state.restart_pending.store(true, Ordering::SeqCst);
            store::blocking(state.store.clone(), |store| store.clear_network_credentials()).await
        }
    };
    if let Err(err) = cleared {
        warn!(error = %format!("{:#}", err), "clearing wifi credentials failed");
    }
    schedule_restart(&state);
    Json(json!({ "ok": true, "note": "rebooting" }))
}

/// Restarts once the response has had time to flush.
fn schedule_restart(state: &AppState) {
    state.restart_pending.store(true, Ordering::SeqCst);
    let platform = state.platform.clone();
    let delay = state.reboot_delay;
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        platform.restart();
    });
}

#[cfg(test)]
impl AppState {
    pub fn for_tests(
        sensor: Arc<dyn Sensor>,
        network: Arc<dyn Network>,
        platform: Arc<dyn Platform>,
    ) -> Self {
        use crate::models::DeviceConfig;
        use crate::server_api::ServerApi;
        use crate::testing::{MemoryFiles, MemoryStore};

        let config = ConfigHandle::new(DeviceConfig::default());
        let meeting = MeetingService::new(
            config.clone(),
            network.clone(),
            platform.clone(),
            ServerApi::new(Duration::from_secs(1)).unwrap(),
        );
        Self {
            config: Some(config),
            store: Arc::new(MemoryStore::default()),
            sensor,
            network,
            platform,
            files: Arc::new(MemoryFiles::default()),
            meeting: Some(Arc::new(meeting)),
            stream: StreamSettings {
                fps_limit: 0,
                boundary: "frame".to_string(),
            },
            reboot_delay: Duration::ZERO,
            restart_pending: Arc::new(AtomicBool::new(false)),
        }
    }
}
