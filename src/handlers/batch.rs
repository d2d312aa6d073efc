//! `POST /batch`.

use crate::batch::BatchDispatcher;
use crate::error::AppError;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;

pub type BatchState = Arc<BatchDispatcher<Router>>;

/// Body is a list of entries, or an object whose values are entries (in key order).
pub async fn batch(
    State(dispatcher): State<BatchState>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(body) = body.map_err(|e| AppError::Unprocessable(e.body_text()))?;
    let output = match &body {
        Value::Array(entries) => dispatcher.run(&headers, entries).await,
        Value::Object(entries) => dispatcher.run(&headers, entries.values()).await,
        _ => {
            return Err(AppError::Unprocessable(
                "batch body must be a list of requests".into(),
            ))
        }
    };
    Ok(Json(output))
}
