// Access checks: GET /access/check and GET /access/live
//
// `check` answers for an anonymous device only. `live` is the gate the
// stream player calls: a signed-in subscriber passes on their account,
// otherwise the device's own grant decides.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use spike_core::error::ApiError;

use crate::context::AccessContext;
use crate::routes::session::resolve_session;
use crate::routes::{required, store_failure};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessCheckResponse {
    pub has_access: bool,
    /// End of the active grant; `null` when there is none.
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessSource {
    Subscription,
    Device,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveAccessResponse {
    pub has_access: bool,
    pub source: Option<AccessSource>,
}

/// Active grant expiry for a device, if any.
async fn active_grant(
    ctx: &AccessContext,
    device_id: &str,
) -> Result<Option<DateTime<Utc>>, ApiError> {
    let grant = ctx
        .adapter
        .find_device_access(device_id)
        .await
        .map_err(|e| store_failure("Device access lookup failed", e))?;
    let now = Utc::now();
    Ok(grant.filter(|g| g.is_active_at(now)).map(|g| g.expires_at))
}

pub async fn handle_check_access(
    ctx: Arc<AccessContext>,
    device_id: Option<&str>,
) -> Result<AccessCheckResponse, ApiError> {
    let device_id = required("deviceId", device_id)?;
    let expires_at = active_grant(&ctx, device_id).await?;
    Ok(AccessCheckResponse {
        has_access: expires_at.is_some(),
        expires_at,
    })
}

pub async fn handle_live_access(
    ctx: Arc<AccessContext>,
    cookie_header: Option<&str>,
    device_id: Option<&str>,
) -> Result<LiveAccessResponse, ApiError> {
    let session = resolve_session(&ctx, cookie_header).await;
    if session.user().is_some_and(|s| s.is_entitled) {
        return Ok(LiveAccessResponse {
            has_access: true,
            source: Some(AccessSource::Subscription),
        });
    }

    let device_id = device_id.map(str::trim).filter(|d| !d.is_empty());
    if let Some(device_id) = device_id {
        if active_grant(&ctx, device_id).await?.is_some() {
            return Ok(LiveAccessResponse {
                has_access: true,
                source: Some(AccessSource::Device),
            });
        }
    }

    Ok(LiveAccessResponse {
        has_access: false,
        source: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::test_ctx;
    use crate::routes::session::create_session_token;
    use chrono::Duration;
    use spike_core::db::models::User;
    use spike_core::error::ErrorCode;

    #[tokio::test]
    async fn test_check_access_without_grant() {
        let (ctx, _) = test_ctx().await;
        let response = handle_check_access(ctx, Some("dev-1")).await.unwrap();
        assert_eq!(response, AccessCheckResponse { has_access: false, expires_at: None });
    }

    #[tokio::test]
    async fn test_check_access_expired_grant_is_no_grant() {
        let (ctx, _) = test_ctx().await;
        ctx.adapter
            .upsert_device_access("dev-1", Utc::now() - Duration::seconds(1))
            .await
            .unwrap();
        let response = handle_check_access(ctx, Some("dev-1")).await.unwrap();
        assert!(!response.has_access);
        assert!(response.expires_at.is_none());
    }

    #[tokio::test]
    async fn test_check_access_active_grant() {
        let (ctx, _) = test_ctx().await;
        let expires = Utc::now() + Duration::days(10);
        ctx.adapter.upsert_device_access("dev-1", expires).await.unwrap();
        let response = handle_check_access(ctx, Some("dev-1")).await.unwrap();
        assert!(response.has_access);
        assert_eq!(response.expires_at, Some(expires));
    }

    #[tokio::test]
    async fn test_check_access_requires_device() {
        let (ctx, _) = test_ctx().await;
        let err = handle_check_access(ctx, Some("")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
    }

    #[tokio::test]
    async fn test_live_access_sources() {
        let (ctx, _) = test_ctx().await;
        let none = handle_live_access(ctx.clone(), None, None).await.unwrap();
        assert_eq!(none, LiveAccessResponse { has_access: false, source: None });

        ctx.adapter
            .upsert_device_access("dev-1", Utc::now() + Duration::days(1))
            .await
            .unwrap();
        let device = handle_live_access(ctx.clone(), None, Some("dev-1")).await.unwrap();
        assert_eq!(device.source, Some(AccessSource::Device));

        let mut user = User::new("u1".into(), "fan".into(), "x:y".into());
        user.pro_expires = Some(Utc::now() + Duration::days(5));
        ctx.adapter.create_user(&user).await.unwrap();
        let token = create_session_token(&ctx, &user, "phone").unwrap();
        let cookie = format!("{}={}", ctx.session_cookie.name, token);
        let sub = handle_live_access(ctx.clone(), Some(&cookie), Some("dev-2")).await.unwrap();
        assert_eq!(sub.source, Some(AccessSource::Subscription));

        let json = serde_json::to_value(&sub).unwrap();
        assert_eq!(json, serde_json::json!({"hasAccess": true, "source": "subscription"}));
    }

    #[tokio::test]
    async fn test_lapsed_subscriber_falls_back_to_device() {
        let (ctx, _) = test_ctx().await;
        let mut user = User::new("u1".into(), "fan".into(), "x:y".into());
        user.pro_expires = Some(Utc::now() - Duration::days(1));
        ctx.adapter.create_user(&user).await.unwrap();
        let token = create_session_token(&ctx, &user, "phone").unwrap();
        let cookie = format!("{}={}", ctx.session_cookie.name, token);

        let denied = handle_live_access(ctx.clone(), Some(&cookie), Some("dev-9")).await.unwrap();
        assert!(!denied.has_access);
    }
}
