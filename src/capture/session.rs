//! Capture session manager
//!
//! Owns the single mixer connection. Every remote call goes through
//! [`CaptureSessionManager::call`], which connects on demand, bounds the
//! call with a timeout and records the outcome. Nothing here retries on
//! its own: a failed call drops the connection and the next call (or an
//! explicit reconnect) opens a new one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{CaptureError, MixerError};
use crate::settings::SettingsStore;

use super::{MixerConnector, MixerSession};

/// Staleness threshold in poll intervals
const STALE_AFTER_INTERVALS: u32 = 3;

/// Time limits for mixer I/O
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(3),
            request: Duration::from_secs(3),
        }
    }
}

/// Bookkeeping of the connection, mutated only by the manager
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureSession {
    pub connected: bool,
    pub last_ok_at: Option<DateTime<Utc>>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub last_error_message: String,
    pub studio_mode_enabled: bool,
}

/// What the operator should do about the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureHealth {
    Ok,
    /// Connected, but nothing succeeded recently
    Stale,
    Disconnected,
}

/// Status served to the operator console
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureStatus {
    pub available: bool,
    pub connected: bool,
    pub stale: bool,
    pub health: CaptureHealth,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub last_ok_at: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub last_error_at: Option<DateTime<Utc>>,
    pub last_error_message: String,
    pub studio_mode_enabled: bool,
    pub endpoint: String,
}

pub struct CaptureSessionManager {
    connector: Arc<dyn MixerConnector>,
    settings: Arc<SettingsStore>,
    timeouts: Timeouts,
    /// Held for the whole of a connect or teardown
    connection: Mutex<Option<Arc<dyn MixerSession>>>,
    session: RwLock<CaptureSession>,
}

impl CaptureSessionManager {
    pub fn new(
        connector: Arc<dyn MixerConnector>,
        settings: Arc<SettingsStore>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            connector,
            settings,
            timeouts,
            connection: Mutex::new(None),
            session: RwLock::new(CaptureSession::default()),
        }
    }

    /// Return the live connection, opening one if there is none
    pub async fn ensure_connected(&self) -> Result<Arc<dyn MixerSession>, CaptureError> {
        let mut slot = self.connection.lock().await;
        self.connect_locked(&mut slot).await
    }

    /// Close any existing connection, then connect again
    pub async fn reconnect(&self) -> Result<Arc<dyn MixerSession>, CaptureError> {
        let mut slot = self.connection.lock().await;
        if let Some(old) = slot.take() {
            info!("Closing OBS connection for reconnect");
            self.close_quietly(old).await;
        }
        self.session.write().await.connected = false;
        self.connect_locked(&mut slot).await
    }

    /// Drop the connection without reconnecting, e.g. after the endpoint changed
    pub async fn invalidate(&self) {
        let mut slot = self.connection.lock().await;
        if let Some(old) = slot.take() {
            debug!("Dropping OBS connection");
            self.close_quietly(old).await;
        }
        self.session.write().await.connected = false;
    }

    async fn connect_locked(
        &self,
        slot: &mut Option<Arc<dyn MixerSession>>,
    ) -> Result<Arc<dyn MixerSession>, CaptureError> {
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        let endpoint = self.settings.current().await.endpoint();
        if !endpoint.is_configured() {
            let err = CaptureError::NotConfigured;
            self.record_failure(&err).await;
            return Err(err);
        }

        debug!("Connecting to OBS at {}", endpoint);
        let result = match timeout(self.timeouts.connect, self.connector.connect(&endpoint)).await {
            Ok(Ok(client)) => Ok(client),
            Ok(Err(e)) => Err(CaptureError::Connect {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(CaptureError::Timeout(self.timeouts.connect)),
        };

        match result {
            Ok(client) => {
                let client: Arc<dyn MixerSession> = Arc::from(client);
                *slot = Some(client.clone());
                self.record_success().await;
                info!("Connected to OBS WebSocket at {}", endpoint);
                Ok(client)
            }
            Err(err) => {
                self.record_failure(&err).await;
                Err(err)
            }
        }
    }

    /// Run one remote call on the live connection.
    ///
    /// Success refreshes `last_ok_at`. Failure or timeout records the error,
    /// marks the session disconnected and drops the connection.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T, CaptureError>
    where
        F: FnOnce(Arc<dyn MixerSession>) -> Fut,
        Fut: Future<Output = Result<T, MixerError>>,
    {
        let client = self.ensure_connected().await?;

        let err = match timeout(self.timeouts.request, op(client.clone())).await {
            Ok(Ok(value)) => {
                self.record_success_for(&client).await;
                return Ok(value);
            }
            Ok(Err(e)) => CaptureError::Request(e.to_string()),
            Err(_) => CaptureError::Timeout(self.timeouts.request),
        };

        self.discard(&client).await;
        self.record_failure(&err).await;
        Err(err)
    }

    /// Query studio mode and remember the answer
    pub async fn studio_mode_enabled(&self) -> Result<bool, CaptureError> {
        let enabled = self
            .call(|client| async move { client.studio_mode_enabled().await })
            .await?;
        self.session.write().await.studio_mode_enabled = enabled;
        Ok(enabled)
    }

    /// Drop `client` if it is still the live connection
    async fn discard(&self, client: &Arc<dyn MixerSession>) {
        let mut slot = self.connection.lock().await;
        let is_current = slot
            .as_ref()
            .map_or(false, |current| Arc::ptr_eq(current, client));
        if is_current {
            if let Some(old) = slot.take() {
                self.close_quietly(old).await;
            }
        }
    }

    /// A connection dropped mid-call must not read as connected afterwards
    async fn record_success_for(&self, client: &Arc<dyn MixerSession>) {
        let slot = self.connection.lock().await;
        let is_current = slot
            .as_ref()
            .map_or(false, |current| Arc::ptr_eq(current, client));
        if is_current {
            self.record_success().await;
        } else {
            debug!("OBS call finished on a dropped connection");
        }
    }

    async fn close_quietly(&self, client: Arc<dyn MixerSession>) {
        if timeout(self.timeouts.request, client.close()).await.is_err() {
            warn!("Timed out closing OBS connection");
        }
    }

    async fn record_success(&self) {
        let mut session = self.session.write().await;
        session.connected = true;
        session.last_ok_at = Some(Utc::now());
    }

    async fn record_failure(&self, err: &CaptureError) {
        warn!("OBS call failed: {}", err);
        let mut session = self.session.write().await;
        session.connected = false;
        session.last_error_at = Some(Utc::now());
        session.last_error_message = err.to_string();
    }

    pub async fn session(&self) -> CaptureSession {
        self.session.read().await.clone()
    }

    pub async fn status(&self) -> CaptureStatus {
        self.status_at(Utc::now()).await
    }

    /// Status as of `now`; staleness is derived from the configured interval
    pub async fn status_at(&self, now: DateTime<Utc>) -> CaptureStatus {
        let settings = self.settings.current().await;
        let session = self.session().await;

        let threshold = settings.poll_interval() * STALE_AFTER_INTERVALS;
        let stale = session.connected
            && session.last_ok_at.map_or(true, |ok| {
                (now - ok)
                    .to_std()
                    .map_or(false, |elapsed| elapsed > threshold)
            });

        let health = if !session.connected {
            CaptureHealth::Disconnected
        } else if stale {
            CaptureHealth::Stale
        } else {
            CaptureHealth::Ok
        };

        let endpoint = settings.endpoint();
        CaptureStatus {
            available: endpoint.is_configured(),
            connected: session.connected,
            stale,
            health,
            last_ok_at: session.last_ok_at,
            last_error_at: session.last_error_at,
            last_error_message: session.last_error_message,
            studio_mode_enabled: session.studio_mode_enabled,
            endpoint: endpoint.to_string(),
        }
    }
}
