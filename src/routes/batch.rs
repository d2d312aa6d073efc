use crate::batch::BatchDispatcher;
use crate::handlers::batch::batch;
use axum::{routing::post, Router};
use std::sync::Arc;

/// `POST /batch`, dispatching each entry into `target` after removing `prefix` from its url.
pub fn batch_routes(target: Router, prefix: &str) -> Router {
    let dispatcher = BatchDispatcher::new(target).with_strip_prefix(prefix);
    Router::new()
        .route("/batch", post(batch))
        .with_state(Arc::new(dispatcher))
}
