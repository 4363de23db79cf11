use crate::models::{CameraSettings, MeetingStatus, NetworkMode};
use crate::router::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct StatusSnapshot {
    pub ts: String,
    pub version: &'static str,
    pub free_heap: u64,
    pub psram: bool,
    pub ip: String,
    pub mac: String,
    pub rssi: i32,
    pub wifi_mode: NetworkMode,
    pub camera_ready: bool,
    pub sensor: String,
    pub camera: CameraSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting: Option<MeetingStatus>,
}

pub async fn collect(state: &AppState) -> StatusSnapshot {
    let camera = match &state.config {
        Some(handle) => handle.snapshot().await.camera,
        None => CameraSettings::default(),
    };
    let now_ms = state.platform.uptime_ms();
    let associated = state.network.is_associated();

    StatusSnapshot {
        ts: crate::timestamp::now_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
        free_heap: state.platform.free_memory(),
        psram: state.platform.has_external_ram(),
        ip: state.network.current_ip(),
        mac: state.network.current_mac(),
        rssi: if associated {
            state.network.signal_strength()
        } else {
            0
        },
        wifi_mode: state.network.mode(),
        camera_ready: state.sensor.is_ready(),
        sensor: state.sensor.sensor_name(),
        camera,
        meeting: state
            .meeting
            .as_ref()
            .map(|meeting| meeting.state().status(now_ms)),
    }
}

pub async fn status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(collect(&state).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeNetwork, FakePlatform, FakeSensor};
    use std::sync::Arc;

    #[tokio::test]
    async fn snapshot_merges_collaborators() {
        let state = AppState::for_tests(
            Arc::new(FakeSensor::ready()),
            Arc::new(FakeNetwork::associated()),
            Arc::new(FakePlatform::at(5_000)),
        );
        let snapshot = collect(&state).await;

        assert_eq!(snapshot.ip, "192.168.1.20");
        assert_eq!(snapshot.rssi, -61);
        assert_eq!(snapshot.wifi_mode, NetworkMode::Sta);
        assert!(snapshot.camera_ready);
        assert_eq!(snapshot.sensor, "OV2640");
        assert_eq!(snapshot.free_heap, 123_456);
        assert!(snapshot.psram);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["wifi_mode"], "sta");
        assert_eq!(json["camera"]["jpeg_quality"], 12);
        assert_eq!(json["meeting"]["last_heartbeat_ago_ms"], 0);
        assert_eq!(json["meeting"]["connected"], false);
    }

    #[tokio::test]
    async fn disconnected_network_reports_zero_signal() {
        let state = AppState::for_tests(
            Arc::new(FakeSensor::not_ready()),
            Arc::new(FakeNetwork::disconnected()),
            Arc::new(FakePlatform::at(0)),
        );
        let snapshot = collect(&state).await;
        assert_eq!(snapshot.rssi, 0);
        assert_eq!(snapshot.wifi_mode, NetworkMode::Ap);
        assert!(!snapshot.camera_ready);
    }

    #[tokio::test]
    async fn unavailable_config_omits_meeting() {
        let mut state = AppState::for_tests(
            Arc::new(FakeSensor::ready()),
            Arc::new(FakeNetwork::associated()),
            Arc::new(FakePlatform::at(0)),
        );
        state.config = None;
        state.meeting = None;

        let json = serde_json::to_value(collect(&state).await).unwrap();
        assert!(json.get("meeting").is_none());
        assert_eq!(json["camera"]["frame_size"], 8);
    }
}
