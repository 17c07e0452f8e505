//! Owner scope extraction.
//!
//! The caller's scope comes from the `X-User-Id` header. Requests without it
//! act on the shared scope (owner 0).

use axum::{extract::FromRequestParts, http::request::Parts};
use taleweaver_domain::OwnerId;

use super::http::ApiError;

pub const USER_ID_HEADER: &str = "X-User-Id";

/// Extractor for the owner every operation is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerScope(pub OwnerId);

impl<S> FromRequestParts<S> for OwnerScope
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(USER_ID_HEADER) else {
            return Ok(OwnerScope(OwnerId::SHARED));
        };

        let owner = value
            .to_str()
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .ok_or_else(|| {
                ApiError::Unprocessable(format!("{USER_ID_HEADER} must be an integer"))
            })?;
        let owner =
            OwnerId::new(owner).map_err(|e| ApiError::Unprocessable(e.to_string()))?;
        Ok(OwnerScope(owner))
    }
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    use super::*;

    async fn echo(OwnerScope(owner): OwnerScope) -> String {
        format!("owner:{}", owner.get())
    }

    async fn send(header: Option<&str>) -> (StatusCode, String) {
        let app = Router::new().route("/", get(echo));
        let mut request = Request::builder().uri("/");
        if let Some(value) = header {
            request = request.header(USER_ID_HEADER, value);
        }
        let response = app
            .oneshot(request.body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn missing_header_means_shared_scope() {
        assert_eq!(send(None).await, (StatusCode::OK, "owner:0".to_string()));
    }

    #[tokio::test]
    async fn numeric_header_selects_owner() {
        assert_eq!(
            send(Some("42")).await,
            (StatusCode::OK, "owner:42".to_string())
        );
    }

    #[tokio::test]
    async fn malformed_or_negative_header_is_rejected() {
        assert_eq!(
            send(Some("alice")).await.0,
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(send(Some("-1")).await.0, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
