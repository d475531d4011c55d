//! HTTP surface for the operator console and browser overlays

mod error;
mod handlers;

use anyhow::{Context, Result};
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};

use crate::capture::{CaptureSessionManager, MixerConnector, ScreenshotPipeline, Timeouts};
use crate::catalog::CatalogProvider;
use crate::onair::OnAirDesk;
use crate::presets::PresetStore;
use crate::settings::SettingsStore;

/// Everything the handlers share
pub struct AppContext {
    /// Current line, NEXT line and journal; one lock for all of them
    pub desk: Mutex<OnAirDesk>,
    pub catalog: Arc<dyn CatalogProvider>,
    pub settings: Arc<SettingsStore>,
    pub presets: Arc<PresetStore>,
    pub capture: Arc<CaptureSessionManager>,
    pub screenshots: ScreenshotPipeline,
}

impl AppContext {
    pub fn new(
        desk: OnAirDesk,
        catalog: Arc<dyn CatalogProvider>,
        settings: Arc<SettingsStore>,
        presets: Arc<PresetStore>,
        connector: Arc<dyn MixerConnector>,
        timeouts: Timeouts,
    ) -> Self {
        let capture = Arc::new(CaptureSessionManager::new(
            connector,
            settings.clone(),
            timeouts,
        ));
        let screenshots = ScreenshotPipeline::new(capture.clone(), settings.clone());

        Self {
            desk: Mutex::new(desk),
            catalog,
            settings,
            presets,
            capture,
            screenshots,
        }
    }
}

/// Build the router: JSON API under `/api`, static pages from `public_dir`
pub fn router(ctx: Arc<AppContext>, public_dir: Option<&Path>) -> Router {
    let api = Router::new()
        .route("/overlay-state", get(handlers::get_overlay_state))
        .route("/state", get(handlers::get_text_state))
        .route(
            "/overlay-settings",
            get(handlers::get_overlay_settings).post(handlers::save_overlay_settings),
        )
        .route(
            "/presets",
            get(handlers::list_presets).post(handlers::create_preset),
        )
        .route("/presets/apply", post(handlers::apply_preset))
        .route("/presets/:id", delete(handlers::delete_preset))
        .route("/onair/pair", post(handlers::apply_pair))
        .route("/onair/finals", post(handlers::apply_finals))
        .route("/onair/rounds", post(handlers::apply_rounds))
        .route("/onair/special", post(handlers::apply_special))
        .route("/onair/heat", post(handlers::apply_heat))
        .route("/onair/leader", post(handlers::apply_leader))
        .route("/onair/follower", post(handlers::apply_follower))
        .route("/onair/clear", post(handlers::clear))
        .route("/onair/hide", post(handlers::hide))
        .route("/onair/show", post(handlers::show))
        .route("/reset/onair", post(handlers::clear))
        .route("/next", post(handlers::apply_next))
        .route("/reset/next", post(handlers::reset_next))
        .route("/history", get(handlers::get_history))
        .route("/history/undo", post(handlers::undo))
        .route("/history/redo", post(handlers::redo))
        .route("/obs/status", get(handlers::obs_status))
        .route("/obs/reconnect", post(handlers::obs_reconnect))
        .route("/obs/program", get(handlers::obs_program))
        .route("/obs/preview", get(handlers::obs_preview))
        .route("/contests", get(handlers::get_contests))
        .route("/participants", get(handlers::get_participants))
        .route("/specials", get(handlers::get_specials))
        .route("/round-buttons", get(handlers::get_round_buttons));

    let mut app = Router::new().nest("/api", api);

    match public_dir {
        Some(dir) if dir.is_dir() => {
            info!("Serving static pages from {:?}", dir);
            app = app.fallback_service(ServeDir::new(dir));
        }
        Some(dir) => warn!("Public directory {:?} not found, static pages disabled", dir),
        None => {}
    }

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Serve until `shutdown` flips to true
pub async fn serve(
    ctx: Arc<AppContext>,
    listen_address: &str,
    public_dir: Option<&Path>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let app = router(ctx, public_dir);

    let listener = tokio::net::TcpListener::bind(listen_address)
        .await
        .with_context(|| format!("Failed to bind {}", listen_address))?;
    info!("Listening on http://{}", listen_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
            info!("HTTP server shutting down");
        })
        .await
        .context("HTTP server failed")
}
