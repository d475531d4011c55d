//! OBS capture bridge
//!
//! Keeps at most one obs-websocket connection alive and serves program and
//! preview stills to the operator console. The transport sits behind the
//! `MixerConnector` / `MixerSession` traits so the session bookkeeping can be
//! exercised without a running OBS.

mod obs;
mod screenshot;
mod session;

#[cfg(test)]
pub(crate) mod fake;

pub use obs::ObwsConnector;
pub use screenshot::{CapturedFrame, PreviewResult, ScreenshotPipeline};
pub use session::{CaptureHealth, CaptureSessionManager, CaptureStatus, Timeouts};

use futures::future::BoxFuture;
use std::fmt;

use crate::error::MixerError;

/// Where the mixer listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixerEndpoint {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

impl MixerEndpoint {
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty() && self.port != 0
    }
}

impl fmt::Display for MixerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Parameters of a still capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenshotRequest {
    pub width: u32,
    pub height: u32,
    pub quality: i32,
    pub format: String,
}

/// Opens connections to the mixer
pub trait MixerConnector: Send + Sync {
    fn connect<'a>(
        &'a self,
        endpoint: &'a MixerEndpoint,
    ) -> BoxFuture<'a, Result<Box<dyn MixerSession>, MixerError>>;
}

/// One live connection to the mixer
pub trait MixerSession: Send + Sync {
    fn current_program_scene(&self) -> BoxFuture<'_, Result<String, MixerError>>;

    fn current_preview_scene(&self) -> BoxFuture<'_, Result<String, MixerError>>;

    fn studio_mode_enabled(&self) -> BoxFuture<'_, Result<bool, MixerError>>;

    /// Still image of a source, in the transport's base64 encoding
    fn take_screenshot<'a>(
        &'a self,
        source: &'a str,
        request: &'a ScreenshotRequest,
    ) -> BoxFuture<'a, Result<String, MixerError>>;

    /// Close the connection. Calls after this fail with `MixerError::Closed`.
    fn close(&self) -> BoxFuture<'_, ()>;
}
