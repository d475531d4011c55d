//! HTTP API handlers

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::capture::{CaptureStatus, CapturedFrame, PreviewResult};
use crate::catalog::{Contest, ContestKind, Participant, Special};
use crate::error::ValidationError;
use crate::onair::{HistorySnapshot, NextTitle, OnAirAction, OnAirState, PairRef, TextLines};
use crate::overlay::OverlayMode;
use crate::presets::Preset;
use crate::settings::{OverlayStyle, Settings, VersionedSettings};

use super::error::{ApiError, ApiJson, ApiResponse, ApiResult};
use super::AppContext;

const SCENE_HEADER: &str = "x-scene-name";
const STUDIO_MODE_HEADER: &str = "x-studio-mode";
const FALLBACK_HEADER: &str = "x-program-fallback";

#[derive(Debug, Default, Deserialize)]
pub struct OverlayStateQuery {
    pub mode: Option<String>,
}

/// Bare JSON, the shape browser overlays poll
pub async fn get_overlay_state(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<OverlayStateQuery>,
) -> Json<OnAirState> {
    let mode = query
        .mode
        .as_deref()
        .map(OverlayMode::parse)
        .unwrap_or_default();

    let desk = ctx.desk.lock().await;
    let state = match mode {
        OverlayMode::Current => desk.state().clone(),
        OverlayMode::Next => desk.next().as_overlay_state(),
    };
    Json(state)
}

/// Text-source lines, the shape older overlays read
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextState {
    #[serde(flatten)]
    pub lines: TextLines,
    pub updated_at: i64,
}

pub async fn get_text_state(State(ctx): State<Arc<AppContext>>) -> Json<TextState> {
    let lines = ctx.desk.lock().await.text_lines();
    Json(TextState {
        lines,
        updated_at: Utc::now().timestamp_millis(),
    })
}

pub async fn get_overlay_settings(State(ctx): State<Arc<AppContext>>) -> Json<VersionedSettings> {
    Json(ctx.settings.snapshot().await)
}

/// Replace the settings blob. A changed endpoint drops the OBS connection.
pub async fn save_overlay_settings(
    State(ctx): State<Arc<AppContext>>,
    ApiJson(settings): ApiJson<Settings>,
) -> ApiResult<VersionedSettings> {
    let previous = ctx.settings.current().await.endpoint();
    let saved = ctx.settings.replace(settings).await?;

    if saved.settings.endpoint() != previous {
        info!("OBS endpoint changed to {}", saved.settings.endpoint());
        ctx.capture.invalidate().await;
    }
    Ok(Json(ApiResponse::ok(saved)))
}

pub async fn list_presets(State(ctx): State<Arc<AppContext>>) -> ApiResult<Vec<Preset>> {
    Ok(Json(ApiResponse::ok(ctx.presets.list().await)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreatePresetRequest {
    pub name: String,
    pub settings: OverlayStyle,
}

pub async fn create_preset(
    State(ctx): State<Arc<AppContext>>,
    ApiJson(req): ApiJson<CreatePresetRequest>,
) -> ApiResult<Preset> {
    if req.name.trim().is_empty() {
        return Err(ValidationError::Missing("name").into());
    }
    let preset = ctx.presets.create(&req.name, req.settings).await?;
    Ok(Json(ApiResponse::ok(preset)))
}

/// Returns the presets left after the removal
pub async fn delete_preset(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Preset>> {
    if !ctx.presets.delete(&id).await? {
        return Err(ValidationError::UnknownPreset(id).into());
    }
    Ok(Json(ApiResponse::ok(ctx.presets.list().await)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApplyPresetRequest {
    pub id: String,
}

/// Copy a preset's style into the live settings; the endpoint is kept
pub async fn apply_preset(
    State(ctx): State<Arc<AppContext>>,
    ApiJson(req): ApiJson<ApplyPresetRequest>,
) -> ApiResult<VersionedSettings> {
    if req.id.trim().is_empty() {
        return Err(ValidationError::Missing("id").into());
    }
    let preset = ctx
        .presets
        .get(&req.id)
        .await
        .ok_or_else(|| ValidationError::UnknownPreset(req.id.clone()))?;

    let settings = ctx.settings.current().await.with_style(preset.settings);
    let saved = ctx.settings.replace(settings).await?;
    info!(id = %preset.id, version = saved.version, "Preset applied: {}", preset.name);
    Ok(Json(ApiResponse::ok(saved)))
}

async fn perform(ctx: &AppContext, action: OnAirAction) -> ApiResult<OnAirState> {
    let mut desk = ctx.desk.lock().await;
    let state = desk.perform(ctx.catalog.as_ref(), action)?;
    Ok(Json(ApiResponse::ok(state)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PairRequest {
    pub title: String,
    pub leader: Option<PairRef>,
    pub follower: Option<PairRef>,
    pub without_pair: bool,
}

pub async fn apply_pair(
    State(ctx): State<Arc<AppContext>>,
    ApiJson(req): ApiJson<PairRequest>,
) -> ApiResult<OnAirState> {
    perform(
        &ctx,
        OnAirAction::Pair {
            title: req.title,
            leader: req.leader,
            follower: req.follower,
            without_pair: req.without_pair,
        },
    )
    .await
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FinalsRequest {
    pub contest_id: String,
    pub first_number: Option<u32>,
    pub second_number: Option<u32>,
    /// Show only the first participant
    #[serde(alias = "noPair")]
    pub without_pair: bool,
}

pub async fn apply_finals(
    State(ctx): State<Arc<AppContext>>,
    ApiJson(req): ApiJson<FinalsRequest>,
) -> ApiResult<OnAirState> {
    let first = req
        .first_number
        .ok_or(ValidationError::Missing("firstNumber"))?;
    if req.second_number.is_none() && !req.without_pair {
        return Err(ValidationError::Missing("secondNumber").into());
    }
    perform(
        &ctx,
        OnAirAction::Finals {
            contest_id: req.contest_id,
            first,
            second: req.second_number,
            without_pair: req.without_pair,
        },
    )
    .await
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContestHeatRequest {
    pub contest_id: String,
    pub heat_label: Option<String>,
}

pub async fn apply_rounds(
    State(ctx): State<Arc<AppContext>>,
    ApiJson(req): ApiJson<ContestHeatRequest>,
) -> ApiResult<OnAirState> {
    perform(
        &ctx,
        OnAirAction::Rounds {
            contest_id: req.contest_id,
            heat_label: req.heat_label,
        },
    )
    .await
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpecialRequest {
    pub special_id: String,
    pub index: Option<usize>,
    /// Older consoles send the item text instead of its index
    pub item_text: Option<String>,
}

pub async fn apply_special(
    State(ctx): State<Arc<AppContext>>,
    ApiJson(req): ApiJson<SpecialRequest>,
) -> ApiResult<OnAirState> {
    if req.special_id.trim().is_empty() {
        return Err(ValidationError::Missing("specialId").into());
    }

    let index = match (req.index, req.item_text) {
        (Some(index), _) => index,
        (None, Some(text)) => {
            let text = text.trim();
            if text.is_empty() {
                return Err(ValidationError::Missing("itemText").into());
            }
            let special = ctx
                .catalog
                .special(&req.special_id)
                .ok_or_else(|| ValidationError::UnknownSpecial(req.special_id.clone()))?;
            special
                .items
                .iter()
                .position(|item| item == text)
                .ok_or_else(|| ValidationError::UnknownItemText(req.special_id.clone()))?
        }
        (None, None) => return Err(ValidationError::Missing("index").into()),
    };

    perform(
        &ctx,
        OnAirAction::Special {
            special_id: req.special_id,
            index,
        },
    )
    .await
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HeatRequest {
    pub title: String,
    pub heat_label: Option<String>,
}

pub async fn apply_heat(
    State(ctx): State<Arc<AppContext>>,
    ApiJson(req): ApiJson<HeatRequest>,
) -> ApiResult<OnAirState> {
    perform(
        &ctx,
        OnAirAction::Heat {
            title: req.title,
            heat_label: req.heat_label,
        },
    )
    .await
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NameRequest {
    pub name: String,
}

pub async fn apply_leader(
    State(ctx): State<Arc<AppContext>>,
    ApiJson(req): ApiJson<NameRequest>,
) -> ApiResult<OnAirState> {
    perform(&ctx, OnAirAction::Leader(req.name)).await
}

pub async fn apply_follower(
    State(ctx): State<Arc<AppContext>>,
    ApiJson(req): ApiJson<NameRequest>,
) -> ApiResult<OnAirState> {
    perform(&ctx, OnAirAction::Follower(req.name)).await
}

pub async fn clear(State(ctx): State<Arc<AppContext>>) -> ApiResult<OnAirState> {
    perform(&ctx, OnAirAction::Clear).await
}

pub async fn hide(State(ctx): State<Arc<AppContext>>) -> ApiResult<OnAirState> {
    perform(&ctx, OnAirAction::Hide).await
}

pub async fn show(State(ctx): State<Arc<AppContext>>) -> ApiResult<OnAirState> {
    perform(&ctx, OnAirAction::Show).await
}

pub async fn apply_next(
    State(ctx): State<Arc<AppContext>>,
    ApiJson(req): ApiJson<ContestHeatRequest>,
) -> ApiResult<NextTitle> {
    let mut desk = ctx.desk.lock().await;
    let next = desk.apply_next(
        ctx.catalog.as_ref(),
        &req.contest_id,
        req.heat_label.as_deref(),
    )?;
    Ok(Json(ApiResponse::ok(next)))
}

pub async fn reset_next(State(ctx): State<Arc<AppContext>>) -> ApiResult<NextTitle> {
    let next = ctx.desk.lock().await.clear_next();
    Ok(Json(ApiResponse::ok(next)))
}

pub async fn get_history(State(ctx): State<Arc<AppContext>>) -> ApiResult<HistorySnapshot> {
    let history = ctx.desk.lock().await.history();
    Ok(Json(ApiResponse::ok(history)))
}

/// `data` is null when there is nothing to undo
pub async fn undo(State(ctx): State<Arc<AppContext>>) -> ApiResult<Option<OnAirState>> {
    let state = ctx.desk.lock().await.undo();
    Ok(Json(ApiResponse::ok(state)))
}

/// `data` is null when there is nothing to redo
pub async fn redo(State(ctx): State<Arc<AppContext>>) -> ApiResult<Option<OnAirState>> {
    let state = ctx.desk.lock().await.redo();
    Ok(Json(ApiResponse::ok(state)))
}

pub async fn obs_status(State(ctx): State<Arc<AppContext>>) -> ApiResult<CaptureStatus> {
    Ok(Json(ApiResponse::ok(ctx.capture.status().await)))
}

pub async fn obs_reconnect(State(ctx): State<Arc<AppContext>>) -> ApiResult<CaptureStatus> {
    ctx.capture.reconnect().await?;
    Ok(Json(ApiResponse::ok(ctx.capture.status().await)))
}

pub async fn obs_program(State(ctx): State<Arc<AppContext>>) -> Result<Response, ApiError> {
    let frame = ctx.screenshots.get_program_frame().await?;
    Ok(image_response(frame, HeaderMap::new()))
}

pub async fn obs_preview(State(ctx): State<Arc<AppContext>>) -> Result<Response, ApiError> {
    match ctx.screenshots.get_preview_frame().await? {
        PreviewResult::NoPreview => Ok(StatusCode::NO_CONTENT.into_response()),
        PreviewResult::Frame {
            frame,
            studio_mode_enabled,
            program_fallback,
        } => {
            let mut headers = HeaderMap::new();
            headers.insert(
                HeaderName::from_static(STUDIO_MODE_HEADER),
                HeaderValue::from_static(if studio_mode_enabled { "1" } else { "0" }),
            );
            headers.insert(
                HeaderName::from_static(FALLBACK_HEADER),
                HeaderValue::from_static(if program_fallback { "1" } else { "0" }),
            );
            Ok(image_response(frame, headers))
        }
    }
}

fn image_response(frame: CapturedFrame, mut headers: HeaderMap) -> Response {
    if let Ok(content_type) = HeaderValue::from_str(&frame.content_type) {
        headers.insert(header::CONTENT_TYPE, content_type);
    }
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    // Scene names outside visible ASCII are left out of the header
    if let Ok(scene) = HeaderValue::from_str(&frame.scene_name) {
        headers.insert(HeaderName::from_static(SCENE_HEADER), scene);
    }
    (headers, frame.bytes).into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct ContestsQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

pub async fn get_contests(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<ContestsQuery>,
) -> ApiResult<Vec<Contest>> {
    let contests = match query.kind.as_deref() {
        None | Some("") | Some("all") => ctx.catalog.contests(None),
        Some("finals") => ctx.catalog.contests(Some(ContestKind::Finals)),
        Some("rounds") => ctx.catalog.contests(Some(ContestKind::Rounds)),
        Some(_) => Vec::new(),
    };
    Ok(Json(ApiResponse::ok(contests)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantsQuery {
    pub contest_id: Option<String>,
}

pub async fn get_participants(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<ParticipantsQuery>,
) -> ApiResult<Vec<Participant>> {
    let participants = match query.contest_id.as_deref() {
        Some(id) if !id.is_empty() => ctx.catalog.participants_for_contest(id),
        _ => ctx.catalog.participants(),
    };
    Ok(Json(ApiResponse::ok(participants)))
}

pub async fn get_specials(State(ctx): State<Arc<AppContext>>) -> ApiResult<Vec<Special>> {
    Ok(Json(ApiResponse::ok(ctx.catalog.specials())))
}

pub async fn get_round_buttons(State(ctx): State<Arc<AppContext>>) -> ApiResult<Vec<String>> {
    Ok(Json(ApiResponse::ok(ctx.catalog.round_buttons())))
}
