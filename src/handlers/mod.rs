//! HTTP handlers for resources and batch requests.

pub mod batch;
pub mod entity;
