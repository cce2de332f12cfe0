//! Extract the project scope from the `X-Project-ID` header.

use crate::error::AppError;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

pub const PROJECT_ID_HEADER: &str = "X-Project-ID";

/// Project the request is scoped to, if any. A malformed header is rejected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProjectScope(pub Option<Uuid>);

#[async_trait]
impl<S> FromRequestParts<S> for ProjectScope
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(PROJECT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty());
        match value {
            None => Ok(ProjectScope(None)),
            Some(s) => Uuid::parse_str(s)
                .map(|id| ProjectScope(Some(id)))
                .map_err(|_| {
                    AppError::BadRequest(format!("invalid {PROJECT_ID_HEADER} header {s:?}"))
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<ProjectScope, AppError> {
        let mut req = Request::builder().uri("/v1/environments");
        if let Some(h) = header {
            req = req.header(PROJECT_ID_HEADER, h);
        }
        let (mut parts, _) = req.body(()).unwrap().into_parts();
        ProjectScope::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn header_is_optional() {
        assert_eq!(extract(None).await.unwrap(), ProjectScope(None));
        assert_eq!(extract(Some("  ")).await.unwrap(), ProjectScope(None));
    }

    #[tokio::test]
    async fn header_must_be_a_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(extract(Some(&id.to_string())).await.unwrap(), ProjectScope(Some(id)));
        assert!(extract(Some("nope")).await.is_err());
    }
}
