//! Resource routes. The resource name is a path parameter; the service resolves it.

use crate::handlers::entity::{count, create, delete, list, options, read, search, update};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route("/:resource", get(list).post(create))
        .route("/:resource/search", get(search))
        .route("/:resource/count", get(count))
        .route("/:resource/options", get(options))
        .route(
            "/:resource/:id",
            get(read).put(update).patch(update).delete(delete),
        )
        .with_state(state)
}
