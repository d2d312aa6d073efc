//! Raw query string into ordered `RequestParams`.

use crate::error::AppError;
use crate::query::RequestParams;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Every query-string pair, in request order. A missing query string yields no params.
#[derive(Clone, Debug, Default)]
pub struct QueryParams(pub RequestParams);

impl QueryParams {
    pub fn parse(query: &str) -> Result<Self, AppError> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
            .map_err(|e| AppError::BadRequest(format!("malformed query string: {}", e)))?;
        Ok(QueryParams(pairs.into_iter().collect()))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for QueryParams
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.uri.query() {
            Some(query) => Self::parse(query),
            None => Ok(QueryParams::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_brackets_and_keeps_order() {
        let QueryParams(params) = QueryParams::parse("status=active&filters%5Bname%5D=like:bo&sort=-id").unwrap();
        let keys: Vec<&str> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["status", "filters[name]", "sort"]);
        assert_eq!(params.named_filters().next(), Some(("name", "like:bo")));
    }

    #[test]
    fn empty_value_is_kept_as_empty_string() {
        let QueryParams(params) = QueryParams::parse("status=&x").unwrap();
        assert_eq!(params.get("status"), Some(""));
        assert_eq!(params.get("x"), Some(""));
    }
}
