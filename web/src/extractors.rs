//! Custom Axum extractors.
//!
//! `AuthenticatedPrincipal` is the caller, as asserted by the trusted gateway.
//! Authentication itself happens upstream. The gateway forwards the verified caller
//! in three headers:
//!
//! ```text
//! X-Principal-Id:         <uuid>
//! X-Principal-Role:       admin | manager | user
//! X-Principal-Department: <department>
//! ```

use crate::error::AppError;
use access_request_core::types::{Principal, PrincipalId, Role};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use uuid::Uuid;

/// Header carrying the caller id.
pub const PRINCIPAL_ID_HEADER: &str = "X-Principal-Id";
/// Header carrying the caller role.
pub const PRINCIPAL_ROLE_HEADER: &str = "X-Principal-Role";
/// Header carrying the caller department.
pub const PRINCIPAL_DEPARTMENT_HEADER: &str = "X-Principal-Department";

/// The authenticated caller of a request.
///
/// Rejects with 401 when any principal header is missing or malformed.
///
/// # Example
///
/// ```ignore
/// async fn handler(AuthenticatedPrincipal(principal): AuthenticatedPrincipal) -> String {
///     format!("Hello {}", principal.id)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthenticatedPrincipal(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedPrincipal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        principal_from_headers(&parts.headers).map(Self).ok_or_else(|| {
            tracing::debug!("Missing or invalid principal headers");
            AppError::unauthorized("Authentication required")
        })
    }
}

fn principal_from_headers(headers: &HeaderMap) -> Option<Principal> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let id = Uuid::parse_str(header(PRINCIPAL_ID_HEADER)?).ok()?;
    let role = Role::parse(header(PRINCIPAL_ROLE_HEADER)?)?;
    let department = header(PRINCIPAL_DEPARTMENT_HEADER)?;
    Some(Principal::new(PrincipalId::from_uuid(id), role, department))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder();
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).expect("Valid request").into_parts().0
    }

    #[tokio::test]
    async fn test_principal_from_headers() {
        let id = Uuid::new_v4();
        let id_header = id.to_string();
        let mut parts = parts(&[
            (PRINCIPAL_ID_HEADER, id_header.as_str()),
            (PRINCIPAL_ROLE_HEADER, "Manager"),
            (PRINCIPAL_DEPARTMENT_HEADER, "Finance"),
        ]);

        let AuthenticatedPrincipal(principal) = AuthenticatedPrincipal::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(principal.id, PrincipalId::from_uuid(id));
        assert_eq!(principal.role, Role::Manager);
        assert_eq!(principal.department, "Finance");
    }

    #[tokio::test]
    async fn test_missing_or_bad_headers_are_unauthorized() {
        let id = Uuid::new_v4().to_string();
        let id = id.as_str();
        let cases: [&[(&str, &str)]; 4] = [
            &[],
            &[(PRINCIPAL_ID_HEADER, "not-a-uuid"), (PRINCIPAL_ROLE_HEADER, "admin"), (PRINCIPAL_DEPARTMENT_HEADER, "IT")],
            &[(PRINCIPAL_ID_HEADER, id), (PRINCIPAL_ROLE_HEADER, "root"), (PRINCIPAL_DEPARTMENT_HEADER, "IT")],
            &[(PRINCIPAL_ID_HEADER, id), (PRINCIPAL_ROLE_HEADER, "admin"), (PRINCIPAL_DEPARTMENT_HEADER, " ")],
        ];

        for headers in cases {
            let mut parts = parts(headers);
            let err = AuthenticatedPrincipal::from_request_parts(&mut parts, &())
                .await
                .unwrap_err();
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        }
    }
}
