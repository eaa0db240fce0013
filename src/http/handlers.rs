//! HTTP request handlers

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use mixdown_lib::{pair_hints, parse_hints, MixError, ResolvedSegment};

use crate::error::ServerError;
use crate::http::upload::{read_mix_upload, UploadedFile};
use crate::state::{AppState, RenderStatus};

/// Placement of one background in the finished mix
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentSummary {
    pub index: usize,
    pub file: String,
    pub start_time: f64,
    pub end_time: f64,
    pub volume: f64,
    pub audible: bool,
}

/// A background left out of the mix
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedSummary {
    pub index: usize,
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub message: String,
    pub download_url: String,
    pub segments: Vec<SegmentSummary>,
    pub dropped: Vec<DroppedSummary>,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}

/// Version endpoint
pub async fn version_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": crate::APP_NAME,
        "version": crate::VERSION,
        "ffmpeg": mixdown_lib::ffmpeg_version_info(),
    }))
}

/// Renders in flight
/// GET /debug/renders
pub async fn active_renders(State(state): State<Arc<AppState>>) -> Json<Vec<RenderStatus>> {
    Json(state.active_renders())
}

/// Mix uploaded background tracks over the uploaded main track
/// POST /process
pub async fn process_mix(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ProcessResponse>, ServerError> {
    if state.shutdown.load(Ordering::SeqCst) {
        return Err(ServerError::Busy);
    }
    let multipart = multipart.map_err(|e| ServerError::BadUpload(e.body_text()))?;
    let upload = read_mix_upload(
        multipart,
        &state.storage,
        state.config.limits.max_background_tracks,
    )
    .await?;

    let hints = match upload.metadata.as_deref() {
        Some(raw) => parse_hints(raw).map_err(MixError::from)?,
        None => Vec::new(),
    };
    let backgrounds = pair_hints(
        upload.backgrounds.iter().map(|f| f.path.clone()).collect(),
        &hints,
    );

    let queue = Duration::from_secs(state.config.limits.render_queue_secs);
    let _permit = match tokio::time::timeout(queue, state.render_slots.acquire()).await {
        Ok(Ok(permit)) => permit,
        Ok(Err(_)) => return Err(ServerError::Internal("render slots closed".into())),
        Err(_) => return Err(ServerError::Busy),
    };

    let artifact = state.storage.artifact_name(&upload.main.original_name);
    let output = state.storage.artifact_path(&artifact);
    let ticket = state.begin_render(&artifact, backgrounds.len());

    tracing::info!(
        render = ticket.id(),
        main = %upload.main.original_name,
        backgrounds = backgrounds.len(),
        output = %artifact,
        "processing mix"
    );

    let outcome = state
        .compositor
        .compose_and_render(
            &upload.main.path,
            &backgrounds,
            output,
            Some(ticket.progress_fn()),
        )
        .await?;

    let segments = outcome
        .segments
        .iter()
        .map(|s| summarize_segment(s, &upload.backgrounds))
        .collect();
    let dropped = outcome
        .dropped
        .iter()
        .map(|d| DroppedSummary {
            index: d.ordinal,
            file: original_name(&upload.backgrounds, d.ordinal),
            reason: d.reason.clone(),
        })
        .collect();

    Ok(Json(ProcessResponse {
        message: "Audio processed successfully".to_string(),
        download_url: format!("/download/{}", artifact),
        segments,
        dropped,
    }))
}

/// Fetch a rendered mix
/// GET /download/{filename}
pub async fn download_artifact(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response, ServerError> {
    let path = state
        .storage
        .resolve_artifact(&filename)
        .await
        .ok_or(ServerError::NotFound)?;
    let data = tokio::fs::read(&path).await?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("audio/aac"));
    // Name already matched [A-Za-z0-9._-]+, so it is a valid header value.
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));

    Ok((headers, data).into_response())
}

fn summarize_segment(segment: &ResolvedSegment, uploads: &[UploadedFile]) -> SegmentSummary {
    SegmentSummary {
        index: segment.ordinal,
        file: original_name(uploads, segment.ordinal),
        start_time: segment.start_secs,
        end_time: segment.effective_end_secs,
        volume: segment.volume,
        audible: segment.is_audible(),
    }
}

fn original_name(uploads: &[UploadedFile], ordinal: usize) -> String {
    uploads
        .get(ordinal)
        .map(|f| f.original_name.clone())
        .unwrap_or_default()
}
