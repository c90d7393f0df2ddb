//! Session gate for the matrix routes.
//!
//! A [`SessionVerifier`] turns request headers into a [`Session`]; the
//! middleware rejects requests without one and hands handlers a
//! [`RequestContext`] through request extensions.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use url::Url;

use crate::context::{RequestContext, Session};
use crate::error::AuthError;

/// Validates the session carried by a request.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    /// [`AuthError::Unauthorized`] means the request carries no valid session.
    async fn verify(&self, headers: &HeaderMap) -> Result<Session, AuthError>;
}

/// Accepts `Authorization: Bearer <token>` matching a configured token.
pub struct BearerTokenVerifier {
    token: SecretString,
    user_id: String,
}

impl BearerTokenVerifier {
    pub fn new(token: SecretString, user_id: impl Into<String>) -> Self {
        Self {
            token,
            user_id: user_id.into(),
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

#[async_trait]
impl SessionVerifier for BearerTokenVerifier {
    async fn verify(&self, headers: &HeaderMap) -> Result<Session, AuthError> {
        let presented = bearer_token(headers).ok_or(AuthError::Unauthorized)?;
        let matches: bool = presented
            .as_bytes()
            .ct_eq(self.token.expose_secret().as_bytes())
            .into();
        if !matches {
            return Err(AuthError::Unauthorized);
        }
        Ok(Session {
            user_id: self.user_id.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SessionUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SessionPayload {
    user: SessionUser,
}

/// Asks an external auth provider whether the request's cookies or
/// bearer token belong to a live session.
pub struct RemoteSessionVerifier {
    client: reqwest::Client,
    session_url: Url,
}

impl RemoteSessionVerifier {
    pub fn new(session_url: Url) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            session_url,
        })
    }
}

#[async_trait]
impl SessionVerifier for RemoteSessionVerifier {
    async fn verify(&self, headers: &HeaderMap) -> Result<Session, AuthError> {
        let mut request = self.client.get(self.session_url.clone());
        let mut forwarded = false;
        for name in [header::COOKIE, header::AUTHORIZATION] {
            if let Some(value) = headers.get(&name) {
                request = request.header(name.as_str(), value.as_bytes());
                forwarded = true;
            }
        }
        if !forwarded {
            return Err(AuthError::Unauthorized);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?;
        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "session provider rejected request");
            return Err(AuthError::Unauthorized);
        }

        let payload: Option<SessionPayload> = response
            .json()
            .await
            .map_err(|e| AuthError::ProviderUnavailable(format!("invalid session body: {e}")))?;
        payload
            .map(|p| Session { user_id: p.user.id })
            .ok_or(AuthError::Unauthorized)
    }
}

/// State for the auth middleware.
#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<dyn SessionVerifier>,
}

/// Rejects requests without a valid session; otherwise inserts a
/// [`RequestContext`] for the handlers.
pub async fn auth_middleware(
    State(auth): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    match auth.verifier.verify(request.headers()).await {
        Ok(session) => {
            request
                .extensions_mut()
                .insert(RequestContext::new(session));
            next.run(request).await
        }
        Err(AuthError::Unauthorized) => {
            (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
        }
        Err(AuthError::ProviderUnavailable(reason)) => {
            tracing::warn!(%reason, "session provider unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Session provider unavailable",
            )
                .into_response()
        }
    }
}
