//! obs-websocket 5 transport

use futures::future::{BoxFuture, FutureExt};
use obws::Client;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::MixerError;

use super::{MixerConnector, MixerEndpoint, MixerSession, ScreenshotRequest};

/// Connects to OBS through `obws`
#[derive(Debug, Default, Clone)]
pub struct ObwsConnector;

impl MixerConnector for ObwsConnector {
    fn connect<'a>(
        &'a self,
        endpoint: &'a MixerEndpoint,
    ) -> BoxFuture<'a, Result<Box<dyn MixerSession>, MixerError>> {
        async move {
            let client = Client::connect(
                endpoint.host.as_str(),
                endpoint.port,
                endpoint.password.as_deref(),
            )
            .await
            .map_err(|e| MixerError::Connect(e.to_string()))?;

            let session: Box<dyn MixerSession> = Box::new(ObwsSession {
                client: RwLock::new(Some(client)),
            });
            Ok(session)
        }
        .boxed()
    }
}

/// A connected `obws` client. Requests share the client; closing takes it.
struct ObwsSession {
    client: RwLock<Option<Client>>,
}

fn request_error(e: obws::error::Error) -> MixerError {
    MixerError::Request(e.to_string())
}

impl MixerSession for ObwsSession {
    fn current_program_scene(&self) -> BoxFuture<'_, Result<String, MixerError>> {
        async move {
            let guard = self.client.read().await;
            let client = guard.as_ref().ok_or(MixerError::Closed)?;
            let scene = client
                .scenes()
                .current_program_scene()
                .await
                .map_err(request_error)?;
            Ok(scene.id.name)
        }
        .boxed()
    }

    fn current_preview_scene(&self) -> BoxFuture<'_, Result<String, MixerError>> {
        async move {
            let guard = self.client.read().await;
            let client = guard.as_ref().ok_or(MixerError::Closed)?;
            let scene = client
                .scenes()
                .current_preview_scene()
                .await
                .map_err(request_error)?;
            Ok(scene.id.name)
        }
        .boxed()
    }

    fn studio_mode_enabled(&self) -> BoxFuture<'_, Result<bool, MixerError>> {
        async move {
            let guard = self.client.read().await;
            let client = guard.as_ref().ok_or(MixerError::Closed)?;
            client.ui().studio_mode_enabled().await.map_err(request_error)
        }
        .boxed()
    }

    fn take_screenshot<'a>(
        &'a self,
        source: &'a str,
        request: &'a ScreenshotRequest,
    ) -> BoxFuture<'a, Result<String, MixerError>> {
        async move {
            let guard = self.client.read().await;
            let client = guard.as_ref().ok_or(MixerError::Closed)?;
            client
                .sources()
                .take_screenshot(obws::requests::sources::TakeScreenshot {
                    source: source.into(),
                    width: Some(request.width),
                    height: Some(request.height),
                    format: request.format.as_str(),
                    compression_quality: Some(request.quality),
                })
                .await
                .map_err(request_error)
        }
        .boxed()
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        async move {
            let taken = self.client.write().await.take();
            if let Some(mut client) = taken {
                client.disconnect().await;
                debug!("Disconnected from OBS");
            }
        }
        .boxed()
    }
}
