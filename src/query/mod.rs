//! Query translation: request parameters to a store-independent `AbstractQuery`.

mod abstract_query;
pub mod allowlist;
pub mod operator;
pub mod params;
pub mod translator;

pub use abstract_query::*;
pub use allowlist::FieldAllowlist;
pub use operator::{Comparison, OperatorDescriptor};
pub use params::RequestParams;
pub use translator::{resolve_relation, PageRequest, QueryTranslator, DEFAULT_PAGE_SIZE, UNBOUNDED_LIMIT};
