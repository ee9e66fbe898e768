use std::io::Cursor;

use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use arcade_ingest::IngestReceipt;
use arcade_sync::PushJob;
use arcade_types::BundleId;

use crate::auth::{authenticate, authorize_admin, Credentials};
use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

/// Multipart field carrying the archive.
pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub ok: bool,
    pub game_id: String,
    pub play_url: String,
}

impl From<&IngestReceipt> for UploadResponse {
    fn from(receipt: &IngestReceipt) -> Self {
        Self {
            ok: true,
            game_id: receipt.bundle_id.to_string(),
            play_url: receipt.playback_path.clone(),
        }
    }
}

pub async fn root_handler() -> &'static str {
    "arcade bundle server"
}

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Accept a zipped bundle, ingest it and queue it for pushing.
pub async fn upload_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ServerResult<Json<UploadResponse>> {
    let uploader = authenticate(state.tokens.as_ref(), &Credentials::from_headers(&headers)).await?;

    let mut archive: Option<Bytes> = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some(UPLOAD_FIELD) {
            archive = Some(field.bytes().await.map_err(multipart_error)?);
            break;
        }
    }
    let archive = archive
        .ok_or_else(|| ServerError::BadRequest(format!("missing file field '{UPLOAD_FIELD}'")))?;

    let ingestor = state.ingestor.clone();
    let receipt = tokio::task::spawn_blocking(move || ingestor.ingest(Cursor::new(archive)))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;

    info!(
        uploader = %uploader.name,
        bundle = %receipt.bundle_id,
        files = receipt.files,
        "bundle uploaded"
    );

    if let Some(queue) = &state.push_queue {
        let job = PushJob {
            bundle_id: receipt.bundle_id,
            root: receipt.root.clone(),
        };
        // The bundle is already servable locally; a push that cannot be
        // queued is left to the operator.
        if let Err(e) = queue.enqueue(job).await {
            warn!(bundle = %receipt.bundle_id, error = %e, "could not queue push");
        }
    }

    Ok(Json(UploadResponse::from(&receipt)))
}

fn multipart_error(e: MultipartError) -> ServerError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::PayloadTooLarge("upload exceeds the size limit".into())
    } else {
        ServerError::BadRequest(format!("failed to parse form: {}", e.body_text()))
    }
}

/// `GET /play/:id` and `GET /play/:id/`: the bundle's entry page.
pub async fn play_index_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Response> {
    serve_asset(&state, &id, "").await
}

/// `GET /play/:id/*asset`.
pub async fn play_asset_handler(
    State(state): State<AppState>,
    Path((id, asset)): Path<(String, String)>,
) -> ServerResult<Response> {
    serve_asset(&state, &id, &asset).await
}

async fn serve_asset(state: &AppState, id: &str, asset: &str) -> ServerResult<Response> {
    let id = BundleId::parse(id).map_err(|_| ServerError::BadRequest("invalid game id".into()))?;
    let path = state
        .content()
        .resolve_asset(&id, asset)
        .map_err(|_| ServerError::BadRequest("invalid asset path".into()))?;

    let is_file = tokio::fs::metadata(&path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(ServerError::NotFound("not found".into()));
    }
    let data = tokio::fs::read(&path).await?;
    let content_type = if asset.is_empty() {
        "text/html; charset=utf-8"
    } else {
        content_type_for(asset)
    };
    Ok(([(header::CONTENT_TYPE, content_type)], data).into_response())
}

/// Content type served for an asset, by extension.
pub fn content_type_for(asset: &str) -> &'static str {
    let base = asset.rsplit('/').next().unwrap_or(asset);
    let ext = base
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "js" | "mjs" => "application/javascript",
        "css" => "text/css; charset=utf-8",
        "json" => "application/json",
        "wasm" => "application/wasm",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "xml" => "application/xml",
        "txt" => "text/plain; charset=utf-8",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "eot" => "application/vnd.ms-fontobject",
        "manifest" => "text/cache-manifest",
        _ => "application/octet-stream",
    }
}

/// `GET /removeGame/:id`, guarded by the admin token.
pub async fn remove_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ServerResult<Json<serde_json::Value>> {
    authorize_admin(state.admin_token.as_deref(), &Credentials::from_headers(&headers))?;
    let id = BundleId::parse(&id).map_err(|_| ServerError::BadRequest("invalid game id".into()))?;

    let report = state.remover.remove(id).await?;
    if !report.found() {
        return Err(ServerError::NotFound("game not found".into()));
    }
    Ok(Json(json!({
        "ok": true,
        "gameId": id.to_string(),
        "localRemoved": report.local_removed,
        "remoteDeleted": report.remote_deleted,
    })))
}
