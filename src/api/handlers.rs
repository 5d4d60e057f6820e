use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::auth::CurrentSession;
use crate::errors::AppError;
use crate::models::identity::Caller;
use crate::models::item::{Category, Item, ItemDraftRequest, ItemKind, ReviewDecision};
use crate::store::image_store::content_type_for;
use crate::workflow::PublicQuery;
use crate::AppState;

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Deserialize)]
pub struct PublicItemsParams {
    #[serde(rename = "type")]
    pub kind: Option<ItemKind>,
    pub category: Option<String>,
    pub q: Option<String>,
}

#[derive(Deserialize)]
pub struct UploadParams {
    pub file_name: Option<String>,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub url: String,
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub decision: ReviewDecision,
    pub note: Option<String>,
}

#[derive(Serialize)]
pub struct ReviewResponse {
    pub item: Item,
    pub updated: bool,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub user_id: Option<Uuid>,
    pub is_admin: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

fn parse_item_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| {
        tracing::warn!("invalid item id: {}", raw);
        AppError::validation("id", "invalid item id")
    })
}

fn body_error(rejection: JsonRejection) -> AppError {
    AppError::validation("body", rejection.body_text())
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /api/v1/categories — the fixed category list
pub async fn list_categories() -> Json<Vec<&'static str>> {
    Json(Category::ALL.iter().map(|c| c.as_str()).collect())
}

/// GET /api/v1/items — approved items, newest first
pub async fn list_public_items(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PublicItemsParams>,
) -> Result<Json<Vec<Item>>, AppError> {
    let category = match params.category.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(raw) => Some(Category::parse(raw).ok_or_else(|| {
            AppError::validation("category", format!("unknown category '{}'", raw))
        })?),
    };
    let query = PublicQuery {
        kind: params.kind,
        category,
        text: params.q.filter(|q| !q.trim().is_empty()),
    };
    Ok(Json(state.workflow.list_public(&query).await?))
}

/// POST /api/v1/items — submit a lost/found report for moderation
pub async fn create_item(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<ItemDraftRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Item>), AppError> {
    if caller.user_id.is_none() {
        return Err(AppError::Unauthenticated);
    }
    let Json(request) = payload.map_err(body_error)?;
    let draft = request.validate()?;
    let item = state.workflow.submit(draft, &caller).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /api/v1/items/mine — the caller's own items in any status
pub async fn list_my_items(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<Item>>, AppError> {
    Ok(Json(state.workflow.list_own(&caller).await?))
}

/// GET /api/v1/items/:id — single item regardless of status
pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<Json<Item>, AppError> {
    let id = parse_item_id(&id_str)?;
    Ok(Json(state.workflow.get_by_id(id).await?))
}

/// POST /api/v1/images?file_name=… — raw image body, returns its public URL
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    if caller.user_id.is_none() {
        return Err(AppError::Unauthenticated);
    }
    let file_name = params
        .file_name
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| AppError::validation("file_name", "file_name is required"))?;
    if body.is_empty() {
        return Err(AppError::validation("file", "image is empty"));
    }
    if body.len() > state.config.max_image_bytes {
        return Err(AppError::validation(
            "file",
            format!("image exceeds {} bytes", state.config.max_image_bytes),
        ));
    }
    let url = state.workflow.upload_image(&file_name, body, &caller).await?;
    Ok((StatusCode::CREATED, Json(UploadResponse { url })))
}

/// GET /images/*key — serve a stored image
pub async fn serve_image(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let data = state
        .workflow
        .images()
        .get(&key)
        .await
        .map_err(|e| AppError::Storage(format!("{:#}", e)))?
        .ok_or(AppError::NotFound)?;
    Ok(([(header::CONTENT_TYPE, content_type_for(&key))], data).into_response())
}

/// GET /api/v1/admin/items — every item, any status
pub async fn admin_list_items(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<Item>>, AppError> {
    Ok(Json(state.workflow.list_all(&caller).await?))
}

/// GET /api/v1/admin/items/pending — the moderation queue
pub async fn admin_list_pending(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<Item>>, AppError> {
    Ok(Json(state.workflow.list_pending(&caller).await?))
}

/// POST /api/v1/admin/items/:id/review — approve or reject an item
pub async fn review_item(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id_str): Path<String>,
    payload: Result<Json<ReviewRequest>, JsonRejection>,
) -> Result<Json<ReviewResponse>, AppError> {
    if !caller.is_admin {
        return Err(AppError::Forbidden);
    }
    let id = parse_item_id(&id_str)?;
    let Json(request) = payload.map_err(body_error)?;
    let outcome = state
        .workflow
        .review(id, request.decision, request.note, &caller)
        .await?;
    Ok(Json(ReviewResponse {
        item: outcome.item,
        updated: outcome.changed,
    }))
}

/// GET /api/v1/session — who the caller is
pub async fn get_session(
    Extension(caller): Extension<Caller>,
    Extension(session): Extension<CurrentSession>,
) -> Json<SessionResponse> {
    Json(SessionResponse {
        user_id: caller.user_id,
        is_admin: caller.is_admin,
        expires_at: session.0.map(|s| s.expires_at),
    })
}

/// POST /api/v1/session/sign-out — end the current session
pub async fn sign_out(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
) -> Result<StatusCode, AppError> {
    let session = session.0.ok_or(AppError::Unauthenticated)?;
    state.identity.sign_out(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}
