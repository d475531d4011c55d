//! In-memory mixer for tests

use base64::Engine;
use futures::future::{BoxFuture, FutureExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::MixerError;

use super::{MixerConnector, MixerEndpoint, MixerSession, ScreenshotRequest};

/// 1x1 transparent PNG
pub const PNG_PIXEL: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

#[derive(Debug)]
struct FakeState {
    reachable: bool,
    studio_mode: bool,
    fail_requests: bool,
    hang: bool,
    program_scene: String,
    preview_scene: String,
    connects: usize,
    closes: usize,
    open: usize,
    max_open: usize,
    screenshots: Vec<String>,
}

#[derive(Clone)]
pub struct FakeMixer {
    state: Arc<Mutex<FakeState>>,
}

impl FakeMixer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                reachable: true,
                studio_mode: false,
                fail_requests: false,
                hang: false,
                program_scene: "Program".to_string(),
                preview_scene: "Preview".to_string(),
                connects: 0,
                closes: 0,
                open: 0,
                max_open: 0,
                screenshots: Vec::new(),
            })),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.with(|s| s.reachable = reachable);
    }

    pub fn set_studio_mode(&self, enabled: bool) {
        self.with(|s| s.studio_mode = enabled);
    }

    pub fn set_fail_requests(&self, fail: bool) {
        self.with(|s| s.fail_requests = fail);
    }

    pub fn set_hang(&self, hang: bool) {
        self.with(|s| s.hang = hang);
    }

    pub fn connects(&self) -> usize {
        self.with(|s| s.connects)
    }

    pub fn closes(&self) -> usize {
        self.with(|s| s.closes)
    }

    pub fn open(&self) -> usize {
        self.with(|s| s.open)
    }

    pub fn max_open(&self) -> usize {
        self.with(|s| s.max_open)
    }

    /// Sources that were captured, in order
    pub fn screenshots(&self) -> Vec<String> {
        self.with(|s| s.screenshots.clone())
    }
}

impl MixerConnector for FakeMixer {
    fn connect<'a>(
        &'a self,
        _endpoint: &'a MixerEndpoint,
    ) -> BoxFuture<'a, Result<Box<dyn MixerSession>, MixerError>> {
        async move {
            let reachable = self.with(|s| {
                if s.reachable {
                    s.connects += 1;
                    s.open += 1;
                    s.max_open = s.max_open.max(s.open);
                }
                s.reachable
            });
            if !reachable {
                return Err(MixerError::Connect("connection refused".to_string()));
            }
            let session: Box<dyn MixerSession> = Box::new(FakeSession {
                mixer: self.clone(),
                closed: AtomicBool::new(false),
            });
            Ok(session)
        }
        .boxed()
    }
}

struct FakeSession {
    mixer: FakeMixer,
    closed: AtomicBool,
}

impl FakeSession {
    async fn request<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> Result<T, MixerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(MixerError::Closed);
        }
        let (hang, fail) = self.mixer.with(|s| (s.hang, s.fail_requests));
        if hang {
            futures::future::pending::<()>().await;
        }
        if fail {
            return Err(MixerError::Request("socket reset".to_string()));
        }
        Ok(self.mixer.with(f))
    }
}

impl MixerSession for FakeSession {
    fn current_program_scene(&self) -> BoxFuture<'_, Result<String, MixerError>> {
        self.request(|s| s.program_scene.clone()).boxed()
    }

    fn current_preview_scene(&self) -> BoxFuture<'_, Result<String, MixerError>> {
        async move {
            let (studio, scene) = self.request(|s| (s.studio_mode, s.preview_scene.clone())).await?;
            if !studio {
                return Err(MixerError::Request("studio mode is not active".to_string()));
            }
            Ok(scene)
        }
        .boxed()
    }

    fn studio_mode_enabled(&self) -> BoxFuture<'_, Result<bool, MixerError>> {
        self.request(|s| s.studio_mode).boxed()
    }

    fn take_screenshot<'a>(
        &'a self,
        source: &'a str,
        _request: &'a ScreenshotRequest,
    ) -> BoxFuture<'a, Result<String, MixerError>> {
        self.request(move |s| {
            s.screenshots.push(source.to_string());
            format!(
                "data:image/png;base64,{}",
                base64::engine::general_purpose::STANDARD.encode(PNG_PIXEL)
            )
        })
        .boxed()
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        async move {
            if !self.closed.swap(true, Ordering::SeqCst) {
                self.mixer.with(|s| {
                    s.closes += 1;
                    s.open -= 1;
                });
            }
        }
        .boxed()
    }
}
