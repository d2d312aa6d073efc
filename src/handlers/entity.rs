//! Resource handlers: list, search, count, options, read, create, update, delete.
//!
//! Handlers only extract the path, query and body; everything else lives in `ResourceService`.

use crate::error::AppError;
use crate::extractors::QueryParams;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;

/// A body that is not JSON at all is answered like a body of the wrong shape.
fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, AppError> {
    body.map(|Json(v)| v)
        .map_err(|e| AppError::Unprocessable(e.body_text()))
}

pub async fn list(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    QueryParams(params): QueryParams,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.service.list(&resource, &params).await?))
}

pub async fn search(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    QueryParams(params): QueryParams,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.service.search(&resource, &params).await?))
}

pub async fn count(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    QueryParams(params): QueryParams,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.service.count(&resource, &params).await?))
}

pub async fn options(
    State(state): State<AppState>,
    Path(resource): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.service.options(&resource).await?))
}

pub async fn read(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    QueryParams(params): QueryParams,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.service.read(&resource, &id, &params).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    QueryParams(params): QueryParams,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let body = json_body(body)?;
    let created = state.service.create(&resource, body, &params).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT and PATCH.
pub async fn update(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    QueryParams(params): QueryParams,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let body = json_body(body)?;
    Ok(Json(state.service.update(&resource, &id, body, &params).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.service.delete(&resource, &id).await?))
}
