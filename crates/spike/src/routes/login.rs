// Login: POST /login
//
// Verifies credentials, makes the presented device the account's only
// active device, and issues the session cookie.
//
// Binding rule: a login on a new calendar day always rebinds; a second
// login on the same day from a different device displaces the first one
// (last login wins). Either way the outcome is the same single write, so
// concurrent logins cannot leave two devices bound.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;

use spike_core::error::ApiError;

use crate::context::AccessContext;
use crate::cookies::ResponseCookies;
use crate::crypto::password::{DUMMY_PASSWORD_HASH, verify_password};
use crate::routes::session::create_session_token;
use crate::routes::{SuccessResponse, required, store_failure};
use crate::utils::date::today_at_offset;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
}

/// Login result including the session cookie to set.
#[derive(Debug)]
pub struct LoginResult {
    pub response: SuccessResponse,
    pub cookies: ResponseCookies,
}

pub async fn handle_login(
    ctx: Arc<AccessContext>,
    body: LoginRequest,
) -> Result<LoginResult, ApiError> {
    let username = required("username", body.username.as_deref())?;
    let device_id = required("deviceId", body.device_id.as_deref())?;
    required("password", body.password.as_deref())?;
    let password = body.password.as_deref().unwrap_or_default();

    let user = match ctx
        .adapter
        .find_user_by_username(username)
        .await
        .map_err(|e| store_failure("User lookup failed", e))?
    {
        Some(user) => user,
        None => {
            // Unknown usernames cost the same as wrong passwords.
            if let Err(e) = verify_password(DUMMY_PASSWORD_HASH, password) {
                tracing::error!(error = %e, "Dummy password check failed");
            }
            return Err(ApiError::invalid_credentials());
        }
    };

    let valid = verify_password(&user.password_hash, password).unwrap_or_else(|e| {
        tracing::error!(user_id = %user.id, error = %e, "Stored password hash is unreadable");
        false
    });
    if !valid {
        return Err(ApiError::invalid_credentials());
    }

    let today = today_at_offset(Utc::now(), ctx.options.session.day_boundary_offset_minutes);
    match user.active_device_id.as_deref() {
        Some(previous) if previous != device_id && user.last_login_date == Some(today) => {
            tracing::info!(
                user_id = %user.id,
                previous_device = %previous,
                device = %device_id,
                "Same-day login from another device; displacing the previous device"
            );
        }
        Some(previous) if previous != device_id => {
            tracing::debug!(user_id = %user.id, device = %device_id, "Rebinding device on a new day");
        }
        _ => {}
    }

    let user = ctx
        .adapter
        .bind_device(&user.id, device_id, today)
        .await
        .map_err(|e| store_failure("Device binding failed", e))?;

    let token = create_session_token(&ctx, &user, device_id)
        .map_err(|e| store_failure("Session token signing failed", e))?;

    let mut cookies = ResponseCookies::new();
    cookies.set_cookie(&ctx.session_cookie.name, &ctx.session_cookie.to_attributes(&token));

    tracing::info!(user_id = %user.id, device = %device_id, "User logged in");
    Ok(LoginResult {
        response: SuccessResponse::ok(),
        cookies,
    })
}
