use crate::error::ApiError;
use crate::models::{
    CameraSettings, DeviceConfig, FrameSize, MeetingSettings, JPEG_QUALITY_RANGE, TUNING_RANGE,
};
use crate::router::AppState;
use crate::store;
use axum::{body::Bytes, extract::State, Json};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::atomic::Ordering;
use tracing::{debug, info, warn};

pub const WIFI_NOTE: &str = "wifi_changes_require_reboot";

#[derive(Debug, Serialize)]
pub struct ConfigView {
    pub version: &'static str,
    pub wifi: WifiView,
    pub camera: CameraSettings,
    pub meeting: MeetingSettings,
}

#[derive(Debug, Serialize)]
pub struct WifiView {
    pub ssid: String,
    pub has_password: bool,
}

impl ConfigView {
    pub fn from_config(config: &DeviceConfig) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            wifi: WifiView {
                ssid: config.wifi.ssid.clone(),
                has_password: !config.wifi.password.is_empty(),
            },
            camera: config.camera.clone(),
            meeting: config.meeting.clone(),
        }
    }
}

pub async fn get_config(State(state): State<AppState>) -> Json<ConfigView> {
    let config = match &state.config {
        Some(handle) => handle.snapshot().await,
        None => DeviceConfig::default(),
    };
    Json(ConfigView::from_config(&config))
}

pub async fn post_config(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let doc: Value = serde_json::from_slice(&body).map_err(|err| {
        debug!(error = %err, "config body rejected");
        ApiError::InvalidJson
    })?;
    let handle = state.config.as_ref().ok_or(ApiError::ConfigNotReady)?;

    let mut config = handle.lock().await;
    if state.restart_pending.load(Ordering::SeqCst) {
        return Err(ApiError::RestartPending);
    }
    merge_partial(&mut config, &doc);
    if state.sensor.is_ready() && !state.sensor.apply_settings(&config.camera) {
        warn!("sensor rejected camera settings");
    }
    let snapshot = config.clone();
    match store::blocking(state.store.clone(), move |store| store.save(&snapshot)).await {
        Ok(path) => info!(path = %path.display(), "config saved"),
        Err(err) => warn!(error = %format!("{:#}", err), "config save failed"),
    }
    drop(config);

    Ok(Json(json!({ "ok": true, "note": WIFI_NOTE })))
}

/// Fields of the wrong JSON type or out of range are ignored, not rejected.
pub fn merge_partial(config: &mut DeviceConfig, doc: &Value) {
    if let Some(wifi) = section(doc, "wifi") {
        set_string(wifi, "ssid", &mut config.wifi.ssid);
        set_string(wifi, "password", &mut config.wifi.password);
    }

    if let Some(camera) = section(doc, "camera") {
        merge_camera(&mut config.camera, camera);
    }

    if let Some(meeting) = section(doc, "meeting") {
        if config.meeting.provisioned {
            debug!("meeting settings are provisioned; ignoring update");
        } else {
            merge_meeting(&mut config.meeting, meeting);
        }
    }
}

fn merge_camera(camera: &mut CameraSettings, fields: &Map<String, Value>) {
    if let Some(size) = int(fields, "frame_size").and_then(FrameSize::from_index) {
        camera.frame_size = size;
    }
    if let Some(quality) = int_in(fields, "jpeg_quality", &JPEG_QUALITY_RANGE) {
        camera.jpeg_quality = quality as u8;
    }
    if let Some(value) = int_in(fields, "brightness", &TUNING_RANGE) {
        camera.brightness = value as i8;
    }
    if let Some(value) = int_in(fields, "contrast", &TUNING_RANGE) {
        camera.contrast = value as i8;
    }
    if let Some(value) = int_in(fields, "saturation", &TUNING_RANGE) {
        camera.saturation = value as i8;
    }
    set_bool(fields, "vflip", &mut camera.vflip);
    set_bool(fields, "hmirror", &mut camera.hmirror);
}

fn merge_meeting(meeting: &mut MeetingSettings, fields: &Map<String, Value>) {
    set_bool(fields, "enabled", &mut meeting.enabled);
    set_string(fields, "api_url", &mut meeting.api_url);
    set_string(fields, "device_key", &mut meeting.device_key);
    if let Some(interval) = fields
        .get("heartbeat_interval")
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
    {
        meeting.heartbeat_interval = interval;
    }
    set_bool(fields, "provisioned", &mut meeting.provisioned);
}

fn section<'a>(doc: &'a Value, name: &str) -> Option<&'a Map<String, Value>> {
    doc.get(name).and_then(Value::as_object)
}

fn int(fields: &Map<String, Value>, key: &str) -> Option<i64> {
    fields.get(key).and_then(Value::as_i64)
}

fn int_in(
    fields: &Map<String, Value>,
    key: &str,
    range: &std::ops::RangeInclusive<i64>,
) -> Option<i64> {
    int(fields, key).filter(|value| range.contains(value))
}

fn set_string(fields: &Map<String, Value>, key: &str, target: &mut String) {
    if let Some(value) = fields.get(key).and_then(Value::as_str) {
        *target = value.to_string();
    }
}

fn set_bool(fields: &Map<String, Value>, key: &str, target: &mut bool) {
    if let Some(value) = fields.get(key).and_then(Value::as_bool) {
        *target = value;
    }
}
