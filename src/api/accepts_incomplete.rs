use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::{request::Parts, Uri},
};
use serde::Deserialize;
use std::convert::Infallible;

/// Whether the caller sent `accepts_incomplete=true`.
///
/// Only the literal `true` (any case) counts; a missing or unparsable query
/// means the caller does not accept asynchronous operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcceptsIncomplete(pub bool);

#[derive(Debug, Deserialize)]
struct AsyncQuery {
    accepts_incomplete: Option<String>,
}

impl AcceptsIncomplete {
    pub fn from_uri(uri: &Uri) -> Self {
        let accepted = Query::<AsyncQuery>::try_from_uri(uri)
            .ok()
            .and_then(|Query(query)| query.accepts_incomplete)
            .map(|value| value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Self(accepted)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AcceptsIncomplete
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_uri(&parts.uri))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepts(uri: &str) -> bool {
        AcceptsIncomplete::from_uri(&uri.parse::<Uri>().unwrap()).0
    }

    #[test]
    fn test_accepts_incomplete_parsing() {
        assert!(accepts("/v2/service_instances/x?accepts_incomplete=true"));
        assert!(accepts("/v2/service_instances/x?plan_id=p&accepts_incomplete=TRUE"));
        assert!(!accepts("/v2/service_instances/x?accepts_incomplete=false"));
        assert!(!accepts("/v2/service_instances/x?accepts_incomplete="));
        assert!(!accepts("/v2/service_instances/x"));
    }
}
