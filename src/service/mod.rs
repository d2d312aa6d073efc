//! Resource actions plus the pluggable per-entity transformer and validator.

mod registry;
mod resource;
mod transform;
mod validation;

pub use registry::Registry;
pub use resource::ResourceService;
pub use transform::{CamelCaseTransformer, DefaultTransformer, Transformer};
pub use validation::{RuleValidator, Validator};
