use crate::host::{Network, Platform};
use crate::models::{
    MeetingSettings, MeetingState, OnlineRequest, ServiceFlags, DEFAULT_HEARTBEAT_INTERVAL_SECS,
};
use crate::server_api::{PostOutcome, ServerApi};
use crate::store::ConfigHandle;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEVICE_TYPE: &str = "esp32";
pub const RESPONSE_EXCERPT_CHARS: usize = 120;

pub fn build_api_url(base_url: &str, endpoint: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let endpoint = if endpoint.starts_with('/') {
        endpoint.to_string()
    } else {
        format!("/{}", endpoint)
    };

    if base.ends_with("/api") && endpoint.starts_with("/api/") {
        return format!("{}{}", base, &endpoint["/api".len()..]);
    }
    format!("{}{}", base, endpoint)
}

pub fn online_endpoint(device_key: &str) -> String {
    format!("/api/devices/{}/online", device_key)
}

pub fn heartbeat_due(last_success_ms: Option<u64>, now_ms: u64, interval_secs: u32) -> bool {
    let interval_ms = u64::from(interval_secs.max(DEFAULT_HEARTBEAT_INTERVAL_SECS)) * 1000;
    match last_success_ms {
        None => true,
        Some(last) => now_ms.saturating_sub(last) >= interval_ms,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateFailure {
    Disabled,
    NotConfigured,
    WifiNotConnected,
}

impl GateFailure {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Disabled => "meeting_disabled",
            Self::NotConfigured => "meeting_not_configured",
            Self::WifiNotConnected => "wifi_not_connected",
        }
    }
}

pub fn check_gates(settings: &MeetingSettings, associated: bool) -> Result<(), GateFailure> {
    if !settings.enabled {
        return Err(GateFailure::Disabled);
    }
    if !settings.is_configured() {
        return Err(GateFailure::NotConfigured);
    }
    if !associated {
        return Err(GateFailure::WifiNotConnected);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Success { code: u16 },
    Failure { code: u16, error: String },
}

pub fn classify(outcome: &PostOutcome) -> Classification {
    match outcome {
        PostOutcome::Responded { code, .. } if (200..300).contains(code) => {
            Classification::Success { code: *code }
        }
        PostOutcome::Responded { code, body } => {
            let excerpt: String = body.chars().take(RESPONSE_EXCERPT_CHARS).collect();
            Classification::Failure {
                code: *code,
                error: format!("http_{}:{}", code, excerpt),
            }
        }
        PostOutcome::BeginFailed(_) => Classification::Failure {
            code: 0,
            error: "http_begin_failed".to_string(),
        },
        PostOutcome::PostFailed(_) => Classification::Failure {
            code: 0,
            error: "http_post_failed".to_string(),
        },
    }
}

#[derive(Clone, Default)]
pub struct MeetingHandle {
    inner: Arc<Mutex<MeetingState>>,
}

impl MeetingHandle {
    pub fn snapshot(&self) -> MeetingState {
        match self.inner.lock() {
            Ok(inner) => inner.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Returns the previous `last_error` so callers can log transitions.
    fn update<F>(&self, f: F) -> String
    where
        F: FnOnce(&mut MeetingState),
    {
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        let previous = inner.last_error.clone();
        f(&mut inner);
        previous
    }
}

pub struct MeetingService {
    config: ConfigHandle,
    network: Arc<dyn Network>,
    platform: Arc<dyn Platform>,
    api: ServerApi,
    state: MeetingHandle,
    attempt: tokio::sync::Mutex<()>,
}

impl MeetingService {
    pub fn new(
        config: ConfigHandle,
        network: Arc<dyn Network>,
        platform: Arc<dyn Platform>,
        api: ServerApi,
    ) -> Self {
        Self {
            config,
            network,
            platform,
            api,
            state: MeetingHandle::default(),
            attempt: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state(&self) -> MeetingState {
        self.state.snapshot()
    }

    /// Passive tick: heartbeats only once the interval has elapsed.
    pub async fn tick(&self) -> bool {
        self.run(false).await
    }

    /// Manual trigger: skips interval gating.
    pub async fn send_heartbeat(&self) -> bool {
        self.run(true).await
    }

    async fn run(&self, force: bool) -> bool {
        let _attempt = self.attempt.lock().await;
        let settings = self.config.snapshot().await.meeting;

        self.state.update(|state| {
            state.enabled = settings.enabled;
            state.configured = settings.is_configured();
        });

        if let Err(gate) = check_gates(&settings, self.network.is_associated()) {
            let previous = self.state.update(|state| {
                state.connected = false;
                state.last_error = gate.tag().to_string();
            });
            if previous != gate.tag() {
                debug!(reason = gate.tag(), "heartbeat skipped");
            }
            return false;
        }

        let last_success = self.state.snapshot().last_heartbeat_ms;
        if !force
            && !heartbeat_due(
                last_success,
                self.platform.uptime_ms(),
                settings.heartbeat_interval,
            )
        {
            return false;
        }

        let url = build_api_url(&settings.api_url, &online_endpoint(&settings.device_key));
        let request = OnlineRequest {
            ip_address: self.network.current_ip(),
            mac: self.network.current_mac(),
            device_type: DEVICE_TYPE.to_string(),
            services: ServiceFlags {
                http: true,
                mjpeg: true,
            },
            uptime_sec: self.platform.uptime_ms() / 1000,
        };

        let outcome = self.api.post_online(&url, &request).await;
        let now_ms = self.platform.uptime_ms();
        match classify(&outcome) {
            Classification::Success { code } => {
                let previous = self.state.update(|state| {
                    state.connected = true;
                    state.last_http_code = code;
                    state.last_error.clear();
                    state.last_heartbeat_ms = Some(now_ms);
                });
                if !previous.is_empty() {
                    info!(%url, code, "heartbeat accepted");
                }
                true
            }
            Classification::Failure { code, error } => {
                let previous = self.state.update(|state| {
                    state.connected = false;
                    state.last_http_code = code;
                    state.last_error = error.clone();
                });
                if previous != error {
                    match &outcome {
                        PostOutcome::BeginFailed(detail) | PostOutcome::PostFailed(detail) => {
                            warn!(%url, error = %error, detail = %detail, "heartbeat failed")
                        }
                        PostOutcome::Responded { .. } => {
                            warn!(%url, error = %error, "heartbeat rejected")
                        }
                    }
                }
                false
            }
        }
    }
}

/// Drives the passive tick for the lifetime of the process.
pub fn spawn(service: Arc<MeetingService>, tick: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            service.tick().await;
        }
    });
}
