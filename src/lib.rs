//! Resource SDK: configuration-driven REST resources with query-string filtering and batch requests.

pub mod batch;
pub mod case;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod query;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;

pub use batch::{BatchDispatcher, Dispatch, DispatchError};
pub use config::{load_from_path, load_from_str, resolve, EntityDescriptor, ResolvedModel};
pub use error::{AppError, ConfigError};
pub use routes::{api_router, batch_routes, common_routes, entity_routes};
pub use service::{Registry, ResourceService};
pub use settings::Settings;
pub use state::AppState;
pub use store::{MemoryStore, PgStore, Store};
