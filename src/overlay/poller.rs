//! HTTP pollers used by the `watch` command
//!
//! `OverlayPoller` follows `/api/overlay-state` and `/api/overlay-settings`
//! through an [`OverlayClient`] and logs what an overlay would render.
//! `CaptureStatusPoller` follows `/api/obs/status` and logs health changes.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::capture::{CaptureHealth, CaptureStatus};
use crate::onair::OnAirState;
use crate::settings::VersionedSettings;

use super::sync::{OverlayClient, SyncOutcome};

const MIN_INTERVAL: Duration = Duration::from_millis(100);
/// Upper bound for one HTTP round trip, so a hung server cannot stall shutdown
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Keep the state poll between 100 ms and 2 s
pub fn clamp_state_interval(interval: Duration) -> Duration {
    interval.clamp(MIN_INTERVAL, Duration::from_millis(2000))
}

/// Which line an overlay follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayMode {
    #[default]
    Current,
    Next,
}

impl OverlayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverlayMode::Current => "current",
            OverlayMode::Next => "next",
        }
    }

    /// Unknown values fall back to the current line
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "next" => OverlayMode::Next,
            _ => OverlayMode::Current,
        }
    }
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Ticks that fell behind are delayed, not replayed in a burst
fn ticker(period: Duration) -> Interval {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tick
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    error: Option<String>,
}

async fn get_json<T: DeserializeOwned>(http: &reqwest::Client, url: &str) -> Result<T> {
    http.get(url)
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", url))?
        .error_for_status()
        .with_context(|| format!("Server rejected {}", url))?
        .json::<T>()
        .await
        .with_context(|| format!("Invalid JSON from {}", url))
}

pub struct OverlayPoller {
    http: reqwest::Client,
    base_url: String,
    mode: OverlayMode,
    state_interval: Duration,
    settings_interval: Duration,
    client: OverlayClient,
}

impl OverlayPoller {
    pub fn new(
        base_url: impl Into<String>,
        mode: OverlayMode,
        state_interval: Duration,
        settings_interval: Duration,
        hide_empty: bool,
    ) -> Self {
        Self {
            http: http_client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            mode,
            state_interval: clamp_state_interval(state_interval),
            settings_interval: settings_interval.max(MIN_INTERVAL),
            client: OverlayClient::new(hide_empty),
        }
    }

    /// Poll until `shutdown` flips to true
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Following {} line at {} every {:?}",
            self.mode.as_str(),
            self.base_url,
            self.state_interval
        );

        // Styles first, so the first render can animate
        self.poll_settings().await;
        self.poll_state().await;

        let mut state_tick = ticker(self.state_interval);
        let mut settings_tick = ticker(self.settings_interval);

        loop {
            tokio::select! {
                _ = state_tick.tick() => self.poll_state().await,
                _ = settings_tick.tick() => self.poll_settings().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Overlay poller stopped");
    }

    async fn poll_state(&mut self) {
        let url = format!("{}/api/overlay-state?mode={}", self.base_url, self.mode.as_str());
        match get_json::<OnAirState>(&self.http, &url).await {
            Ok(state) => {
                let before = self.client.view().clone();
                if let SyncOutcome::Rendered(changed) = self.client.apply_state(&state) {
                    let view = self.client.view();
                    info!(
                        apply_id = state.apply_id,
                        title = %view.title.text,
                        leader = %view.leader.text,
                        follower = %view.tail.text,
                        changed = changed.any(),
                        "Overlay rendered"
                    );
                    for (name, old, new) in [
                        ("title", &before.title, &view.title),
                        ("leader", &before.leader, &view.leader),
                        ("follower", &before.tail, &view.tail),
                    ] {
                        if new.animation.generation() > old.animation.generation() {
                            debug!(
                                field = name,
                                kind = new.animation.kind(),
                                duration_ms = new.animation.duration_ms(),
                                "Animation restarted"
                            );
                        }
                    }
                }
            }
            Err(e) => {
                self.client.poll_failed();
                debug!(failed = self.client.failed_polls(), "State poll failed: {:#}", e);
            }
        }
    }

    async fn poll_settings(&mut self) {
        let url = format!("{}/api/overlay-settings", self.base_url);
        match get_json::<VersionedSettings>(&self.http, &url).await {
            Ok(settings) => {
                let version = settings.version;
                if self.client.apply_settings(settings) {
                    info!(version, "Overlay style applied");
                }
            }
            Err(e) => debug!("Settings poll failed: {:#}", e),
        }
    }
}

/// Remembers the last health seen and reports changes
#[derive(Debug, Default)]
pub struct HealthTracker {
    last: Option<CaptureHealth>,
}

impl HealthTracker {
    /// Returns the previous health when `health` differs from it
    pub fn observe(&mut self, health: CaptureHealth) -> Option<Option<CaptureHealth>> {
        if self.last == Some(health) {
            return None;
        }
        Some(self.last.replace(health))
    }
}

pub struct CaptureStatusPoller {
    http: reqwest::Client,
    base_url: String,
    interval: Duration,
    tracker: HealthTracker,
}

impl CaptureStatusPoller {
    pub fn new(base_url: impl Into<String>, interval: Duration) -> Self {
        Self {
            http: http_client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            interval: interval.max(MIN_INTERVAL),
            tracker: HealthTracker::default(),
        }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut tick = ticker(self.interval);
        loop {
            tokio::select! {
                _ = tick.tick() => self.poll().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("Capture status poller stopped");
    }

    async fn poll(&mut self) {
        let url = format!("{}/api/obs/status", self.base_url);
        let status = match get_json::<Envelope<CaptureStatus>>(&self.http, &url).await {
            Ok(Envelope { data: Some(status), .. }) => status,
            Ok(Envelope { error, .. }) => {
                debug!("Status poll returned no data: {:?}", error);
                return;
            }
            Err(e) => {
                debug!("Status poll failed: {:#}", e);
                return;
            }
        };

        if let Some(previous) = self.tracker.observe(status.health) {
            match status.health {
                CaptureHealth::Ok => info!(?previous, endpoint = %status.endpoint, "OBS capture healthy"),
                CaptureHealth::Stale => warn!(
                    ?previous,
                    endpoint = %status.endpoint,
                    "OBS capture stale, no successful call recently"
                ),
                CaptureHealth::Disconnected => warn!(
                    ?previous,
                    endpoint = %status.endpoint,
                    error = %status.last_error_message,
                    "OBS capture disconnected"
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_interval_is_clamped() {
        assert_eq!(
            clamp_state_interval(Duration::from_millis(10)),
            Duration::from_millis(100)
        );
        assert_eq!(
            clamp_state_interval(Duration::from_secs(10)),
            Duration::from_millis(2000)
        );
        assert_eq!(
            clamp_state_interval(Duration::from_millis(250)),
            Duration::from_millis(250)
        );
    }

    #[tokio::test]
    async fn test_late_ticks_are_delayed() {
        let tick = ticker(Duration::from_millis(250));
        assert_eq!(tick.missed_tick_behavior(), MissedTickBehavior::Delay);
        assert_eq!(tick.period(), Duration::from_millis(250));
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(OverlayMode::parse("NEXT"), OverlayMode::Next);
        assert_eq!(OverlayMode::parse("current"), OverlayMode::Current);
        assert_eq!(OverlayMode::parse("bogus"), OverlayMode::Current);
    }

    #[test]
    fn test_health_tracker_reports_transitions_only() {
        let mut tracker = HealthTracker::default();
        assert_eq!(tracker.observe(CaptureHealth::Disconnected), Some(None));
        assert_eq!(tracker.observe(CaptureHealth::Disconnected), None);
        assert_eq!(
            tracker.observe(CaptureHealth::Ok),
            Some(Some(CaptureHealth::Disconnected))
        );
        assert_eq!(
            tracker.observe(CaptureHealth::Stale),
            Some(Some(CaptureHealth::Ok))
        );
    }

    #[test]
    fn test_envelope_parses_status() {
        let body = r#"{
            "success": true,
            "data": {
                "available": true,
                "connected": false,
                "stale": false,
                "health": "disconnected",
                "lastOkAt": null,
                "lastErrorAt": 1700000000000,
                "lastErrorMessage": "connection refused",
                "studioModeEnabled": false,
                "endpoint": "localhost:4455"
            },
            "error": null
        }"#;
        let envelope: Envelope<CaptureStatus> = serde_json::from_str(body).unwrap();
        let status = envelope.data.unwrap();
        assert_eq!(status.health, CaptureHealth::Disconnected);
        assert!(status.last_error_at.is_some());
        assert!(envelope.error.is_none());
    }
}
