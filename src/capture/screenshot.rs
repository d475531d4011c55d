//! Program and preview stills
//!
//! OBS answers `GetSourceScreenshot` with a base64 data URI. The pipeline
//! resolves the scene to capture, asks for a still at the configured size
//! and hands back raw image bytes.

use base64::Engine;
use std::sync::Arc;
use tracing::debug;

use crate::error::CaptureError;
use crate::settings::SettingsStore;

use super::CaptureSessionManager;

/// A decoded still of one scene
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    pub scene_name: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewResult {
    /// Studio mode is off and the program output may not stand in for it
    NoPreview,
    Frame {
        frame: CapturedFrame,
        studio_mode_enabled: bool,
        /// The still shows program output because studio mode is off
        program_fallback: bool,
    },
}

#[derive(Clone)]
pub struct ScreenshotPipeline {
    session: Arc<CaptureSessionManager>,
    settings: Arc<SettingsStore>,
}

impl ScreenshotPipeline {
    pub fn new(session: Arc<CaptureSessionManager>, settings: Arc<SettingsStore>) -> Self {
        Self { session, settings }
    }

    /// Still of the scene currently on air
    pub async fn get_program_frame(&self) -> Result<CapturedFrame, CaptureError> {
        let scene = self
            .session
            .call(|client| async move { client.current_program_scene().await })
            .await?;
        self.capture(scene).await
    }

    /// Still of the staged scene.
    ///
    /// The studio mode flag is read before anything is captured. When OBS
    /// cannot be asked, the last known flag decides.
    pub async fn get_preview_frame(&self) -> Result<PreviewResult, CaptureError> {
        let requires_studio = self.settings.current().await.preview_requires_staging_mode;

        let studio_mode_enabled = match self.session.studio_mode_enabled().await {
            Ok(enabled) => enabled,
            Err(err) => {
                let last_known = self.session.session().await.studio_mode_enabled;
                if !last_known && requires_studio {
                    debug!("Studio mode unknown ({}), treating preview as absent", err);
                    return Ok(PreviewResult::NoPreview);
                }
                return Err(err);
            }
        };

        if studio_mode_enabled {
            let scene = self
                .session
                .call(|client| async move { client.current_preview_scene().await })
                .await?;
            let frame = self.capture(scene).await?;
            return Ok(PreviewResult::Frame {
                frame,
                studio_mode_enabled,
                program_fallback: false,
            });
        }

        if requires_studio {
            return Ok(PreviewResult::NoPreview);
        }

        let frame = self.get_program_frame().await?;
        Ok(PreviewResult::Frame {
            frame,
            studio_mode_enabled,
            program_fallback: true,
        })
    }

    async fn capture(&self, scene: String) -> Result<CapturedFrame, CaptureError> {
        let request = self.settings.current().await.screenshot_request();

        let encoded = self
            .session
            .call(|client| {
                let scene = scene.clone();
                let request = request.clone();
                async move { client.take_screenshot(&scene, &request).await }
            })
            .await?;

        let bytes = decode_image(&encoded)?;
        let content_type = content_type_for(&bytes, &request.format);
        debug!(scene = %scene, size = bytes.len(), "Captured screenshot");

        Ok(CapturedFrame {
            scene_name: scene,
            bytes,
            content_type,
        })
    }
}

/// Decode a base64 payload, with or without a `data:<mime>;base64,` prefix
pub fn decode_image(encoded: &str) -> Result<Vec<u8>, CaptureError> {
    let payload = if encoded.starts_with("data:") {
        encoded
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| CaptureError::Decode("data URI without payload".to_string()))?
    } else {
        encoded
    };

    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| CaptureError::Decode(e.to_string()))
}

fn content_type_for(bytes: &[u8], requested_format: &str) -> String {
    match image::guess_format(bytes) {
        Ok(format) => format.to_mime_type().to_string(),
        Err(_) => match requested_format.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => "image/jpeg".to_string(),
            "png" => "image/png".to_string(),
            "webp" => "image/webp".to_string(),
            "bmp" => "image/bmp".to_string(),
            _ => "application/octet-stream".to_string(),
        },
    }
}
