// Session resolution.
//
// A session is a signed token in the session cookie. Resolving it never fails
// the request: any problem with the token or the user behind it yields an
// anonymous caller.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use spike_core::db::models::User;
use spike_core::error::SpikeError;

use crate::context::AccessContext;
use crate::cookies::get_session_token;
use crate::crypto::{sign_jwt, verify_jwt};

/// Claims carried by a session token (next to `iat`/`exp`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub user_id: String,
    /// Present only when device binding is enforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSession {
    pub user_id: String,
    pub username: String,
    pub is_entitled: bool,
    pub pro_expires: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Authenticated(AuthenticatedSession),
    Anonymous,
}

impl SessionState {
    pub fn user(&self) -> Option<&AuthenticatedSession> {
        match self {
            SessionState::Authenticated(session) => Some(session),
            SessionState::Anonymous => None,
        }
    }
}

/// Body of `GET /session` for a signed-in caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: SessionUserView,
    pub is_entitled: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUserView {
    pub id: String,
    pub username: String,
    pub pro_expires: Option<DateTime<Utc>>,
}

/// Mint a session token for `user`.
pub fn create_session_token(
    ctx: &AccessContext,
    user: &User,
    device_id: &str,
) -> Result<String, SpikeError> {
    let claims = SessionClaims {
        user_id: user.id.clone(),
        device_id: ctx
            .options
            .session
            .enforce_device_binding
            .then(|| device_id.to_string()),
    };
    sign_jwt(&claims, &ctx.secret, ctx.options.session.expires_in)
}

/// Resolve the caller from a `Cookie` header.
pub async fn resolve_session(ctx: &AccessContext, cookie_header: Option<&str>) -> SessionState {
    let token = match cookie_header.and_then(|h| get_session_token(h, &ctx.session_cookie)) {
        Some(token) => token,
        None => return SessionState::Anonymous,
    };
    let claims: SessionClaims = match verify_jwt(&token, &ctx.secret) {
        Some(claims) => claims,
        None => {
            tracing::debug!("Ignoring invalid or expired session token");
            return SessionState::Anonymous;
        }
    };

    let user = match ctx.adapter.find_user_by_id(&claims.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::debug!(user_id = %claims.user_id, "Session token for unknown user");
            return SessionState::Anonymous;
        }
        Err(e) => {
            tracing::warn!(user_id = %claims.user_id, error = %e, "Session user lookup failed");
            return SessionState::Anonymous;
        }
    };

    if ctx.options.session.enforce_device_binding
        && claims.device_id.as_deref() != user.active_device_id.as_deref()
    {
        tracing::info!(
            user_id = %user.id,
            token_device = ?claims.device_id,
            active_device = ?user.active_device_id,
            "Session belongs to a displaced device"
        );
        return SessionState::Anonymous;
    }

    SessionState::Authenticated(AuthenticatedSession {
        is_entitled: user.is_entitled_at(Utc::now()),
        pro_expires: user.pro_expires,
        user_id: user.id,
        username: user.username,
    })
}

/// `GET /session`: `None` serializes as `null`.
pub async fn handle_get_session(
    ctx: Arc<AccessContext>,
    cookie_header: Option<&str>,
) -> Option<SessionResponse> {
    resolve_session(&ctx, cookie_header)
        .await
        .user()
        .map(|s| SessionResponse {
            user: SessionUserView {
                id: s.user_id.clone(),
                username: s.username.clone(),
                pro_expires: s.pro_expires,
            },
            is_entitled: s.is_entitled,
        })
}
