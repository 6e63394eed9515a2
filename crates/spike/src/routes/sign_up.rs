// Sign-up: POST /signup
//
// 1. Rate limit (per IP, then per device)
// 2. Validate username and password
// 3. Reject taken usernames
// 4. Hash password, create user
//
// Sign-up does not log the user in; the client follows up with /login so the
// device binding happens in one place.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use spike_core::db::models::User;
use spike_core::error::{ApiError, ErrorCode};
use spike_core::utils::generate_id;

use crate::context::AccessContext;
use crate::crypto::password::hash_password;
use crate::internal_adapter::AdapterError;
use crate::routes::{required, store_failure};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignUpResponse {
    pub success: bool,
    pub user: SignUpUser,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignUpUser {
    pub id: String,
    pub username: String,
}

fn validate_username(ctx: &AccessContext, username: &str) -> Result<(), ApiError> {
    let limits = &ctx.options.username;
    let len = username.chars().count();
    if len < limits.min_length || len > limits.max_length {
        return Err(ApiError::invalid_input(format!(
            "username must be between {} and {} characters",
            limits.min_length, limits.max_length
        )));
    }
    if username.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ApiError::invalid_input("username must not contain spaces"));
    }
    Ok(())
}

fn validate_password(ctx: &AccessContext, password: &str) -> Result<(), ApiError> {
    let len = password.chars().count();
    if len < ctx.options.password.min_length {
        return Err(ApiError::bad_request(ErrorCode::PasswordTooShort));
    }
    if len > ctx.options.password.max_length {
        return Err(ApiError::bad_request(ErrorCode::PasswordTooLong));
    }
    Ok(())
}

/// `client_ip` is the resolved caller address used for the per-IP rule.
pub async fn handle_sign_up(
    ctx: Arc<AccessContext>,
    body: SignUpRequest,
    client_ip: &str,
) -> Result<SignUpResponse, ApiError> {
    ctx.rate_limiter
        .check_signup(client_ip, body.device_id.as_deref())
        .await?;

    let username = required("username", body.username.as_deref())?;
    required("password", body.password.as_deref())?;
    let password = body.password.as_deref().unwrap_or_default();
    validate_username(&ctx, username)?;
    validate_password(&ctx, password)?;

    let taken = ctx
        .adapter
        .find_user_by_username(username)
        .await
        .map_err(|e| store_failure("User lookup failed", e))?;
    if taken.is_some() {
        return Err(ApiError::bad_request(ErrorCode::UsernameTaken));
    }

    let password_hash =
        hash_password(password).map_err(|e| store_failure("Password hashing failed", e))?;
    let user = User::new(generate_id(), username.to_string(), password_hash);

    let user = match ctx.adapter.create_user(&user).await {
        Ok(user) => user,
        // Lost a race with a concurrent sign-up for the same name.
        Err(AdapterError::Duplicate(_)) => {
            return Err(ApiError::bad_request(ErrorCode::UsernameTaken));
        }
        Err(e) => return Err(store_failure("User creation failed", e)),
    };

    tracing::info!(user_id = %user.id, username = %user.username, "User signed up");
    Ok(SignUpResponse {
        success: true,
        user: SignUpUser {
            id: user.id,
            username: user.username,
        },
    })
}
