//! Postgres rendering of `AbstractQuery`: identifiers come from the resolved model, values are bound.

mod builder;
pub mod params;
pub use builder::*;
pub use params::*;
