//! API-key authentication (`token: <apikey>` header, §6) is explicitly
//! an external collaborator's concern (§1: "Authentication, API-key
//! storage, and credit metering"). This module extracts the header and
//! defers the actual validation decision to an injected
//! `ApiKeyValidator` — the HTTP layer never decides authorization, it
//! only plumbs the caller context through (§6 `[EXPANSION]` "Auth
//! middleware").

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use escrow_orchestrator::{CallerContext, Role};
use uuid::Uuid;

/// The external collaborator this crate defers credential validation to.
/// A production deployment wires a real implementation backed by the
/// `ApiKey`/`ApiKeyUnitValue` tables (§6); tests and local runs can use
/// `AllowAllValidator`.
#[async_trait]
pub trait ApiKeyValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Option<CallerContext>;
}

/// Accepts any non-empty token as a standard-role caller keyed by a
/// stable id derived from the token. Useful for local development and
/// integration tests where credit metering is out of scope.
pub struct AllowAllValidator;

#[async_trait]
impl ApiKeyValidator for AllowAllValidator {
    async fn validate(&self, token: &str) -> Option<CallerContext> {
        if token.is_empty() {
            return None;
        }
        let role = if token.starts_with("admin_") { Role::Admin } else { Role::Standard };
        Some(CallerContext {
            requester_id: Uuid::new_v5(&Uuid::NAMESPACE_URL, token.as_bytes()),
            role,
        })
    }
}

/// Extracted by handlers that require an authenticated caller. Built by
/// reading the `token` header and asking the app's `ApiKeyValidator`.
pub struct AuthenticatedCaller(pub CallerContext);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedCaller
where
    S: AsRef<dyn ApiKeyValidator> + Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("token")
            .and_then(|v| v.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "missing token header"))?;

        let validator = state.as_ref();
        let caller = validator.validate(token).await.ok_or((StatusCode::UNAUTHORIZED, "invalid API key"))?;
        Ok(AuthenticatedCaller(caller))
    }
}
