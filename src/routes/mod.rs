//! Router assembly.

pub mod batch;
pub mod common;
pub mod entity;

pub use batch::batch_routes;
pub use common::common_routes;
pub use entity::entity_routes;

use crate::state::AppState;
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Resource and batch routes under `prefix`, common routes at the root.
///
/// Batch entries are dispatched into the resource routes only, so a batch cannot nest another batch.
pub fn api_router(state: AppState, prefix: &str, body_limit: usize) -> Router {
    let prefix = prefix.trim().trim_matches('/');
    let resources = entity_routes(state.clone());
    let api = resources.clone().merge(batch_routes(resources, &format!("/{}", prefix)));
    let mounted = if prefix.is_empty() {
        Router::new().merge(api)
    } else {
        Router::new().nest(&format!("/{}", prefix), api)
    };
    mounted
        .merge(common_routes(state))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
}
