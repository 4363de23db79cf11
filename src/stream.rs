use crate::error::ApiError;
use crate::router::AppState;
use crate::sensor::{FrameGuard, Sensor};
use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures_util::stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

const EMPTY_FRAME_RETRY: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub fps_limit: u32,
    pub boundary: String,
}

impl StreamSettings {
    pub fn frame_interval(&self) -> Option<Duration> {
        (self.fps_limit > 0).then(|| Duration::from_millis(1000 / u64::from(self.fps_limit)))
    }

    pub fn content_type(&self) -> String {
        format!("multipart/x-mixed-replace;boundary={}", self.boundary)
    }

    pub fn part_header(&self, len: usize) -> String {
        format!(
            "\r\n--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
            self.boundary, len
        )
    }
}

/// Pushes multipart frames into `tx` until the receiving side goes away.
///
/// A failed send means the peer disconnected. Every acquired frame is released
/// before the next acquisition, on the failed-send paths as well. Returns the
/// number of frames written in full.
pub async fn pump_frames(
    sensor: Arc<dyn Sensor>,
    settings: StreamSettings,
    tx: mpsc::Sender<Bytes>,
) -> u64 {
    let interval = settings.frame_interval();
    let mut last_sent: Option<Instant> = None;
    let mut sent = 0u64;

    loop {
        if let (Some(interval), Some(last)) = (interval, last_sent) {
            tokio::time::sleep_until(last + interval).await;
        }

        let started = Instant::now();
        let Some(frame) = FrameGuard::acquire(sensor.as_ref()) else {
            tokio::time::sleep(EMPTY_FRAME_RETRY).await;
            continue;
        };

        let data = frame.data();
        if tx
            .send(Bytes::from(settings.part_header(data.len())))
            .await
            .is_err()
        {
            break;
        }
        if tx.send(data).await.is_err() {
            break;
        }
        drop(frame);

        last_sent = Some(started);
        sent += 1;
    }
    sent
}

pub async fn stream(State(state): State<AppState>) -> Result<Response, ApiError> {
    if !state.sensor.is_ready() {
        return Err(ApiError::SensorNotReady);
    }

    let settings = state.stream.clone();
    let content_type = settings.content_type();
    let (tx, rx) = mpsc::channel::<Bytes>(1);
    let sensor = state.sensor.clone();
    tokio::spawn(async move {
        let sent = pump_frames(sensor, settings, tx).await;
        debug!(frames = sent, "stream client disconnected");
    });

    let body = Body::from_stream(stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (Ok::<_, Infallible>(chunk), rx))
    }));
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()),
        ],
        body,
    )
        .into_response())
}
