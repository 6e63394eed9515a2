// Session tokens: HS256 sign/verify using the `jsonwebtoken` crate.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use spike_core::error::SpikeError;

/// Sign a JWT with HS256.
///
/// The payload's fields sit at the top level of the claims next to `iat`
/// and `exp`.
pub fn sign_jwt<T: Serialize>(
    payload: &T,
    secret: &str,
    expires_in_secs: u64,
) -> Result<String, SpikeError> {
    let now = chrono::Utc::now().timestamp().max(0) as u64;

    let claims = JwtClaims {
        payload: serde_json::to_value(payload)
            .map_err(|e| SpikeError::Crypto(format!("Failed to serialize JWT payload: {e}")))?,
        iat: now,
        exp: now.saturating_add(expires_in_secs),
    };

    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    jsonwebtoken::encode(&header, &claims, &key)
        .map_err(|e| SpikeError::Crypto(format!("JWT signing failed: {e}")))
}

/// Verify and decode a JWT signed with HS256.
///
/// Returns `None` if the token is malformed, tampered with, signed with a
/// different secret, or expired.
pub fn verify_jwt<T: DeserializeOwned>(token: &str, secret: &str) -> Option<T> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.leeway = 0;
    validation.required_spec_claims.clear();

    let token_data = jsonwebtoken::decode::<JwtClaims>(token, &key, &validation).ok()?;
    serde_json::from_value(token_data.claims.payload).ok()
}

#[derive(Debug, Serialize, Deserialize)]
struct JwtClaims {
    #[serde(flatten)]
    payload: serde_json::Value,
    iat: u64,
    exp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct TestPayload {
        user_id: String,
    }

    fn payload() -> TestPayload {
        TestPayload { user_id: "user123".into() }
    }

    #[test]
    fn test_sign_and_verify() {
        let token = sign_jwt(&payload(), "test-secret-key", 3600).unwrap();
        let decoded: Option<TestPayload> = verify_jwt(&token, "test-secret-key");
        assert_eq!(decoded, Some(payload()));
    }

    #[test]
    fn test_claims_are_flat() {
        let token = sign_jwt(&payload(), "s", 60).unwrap();
        let claims: serde_json::Value = verify_jwt(&token, "s").unwrap();
        assert_eq!(claims["userId"], "user123");
        assert!(claims["exp"].as_u64().unwrap() > claims["iat"].as_u64().unwrap());
    }

    #[test]
    fn test_wrong_secret_fails() {
        let token = sign_jwt(&payload(), "correct-secret", 3600).unwrap();
        assert!(verify_jwt::<TestPayload>(&token, "wrong-secret").is_none());
    }

    #[test]
    fn test_expired_token_fails() {
        let now = chrono::Utc::now().timestamp() as u64;
        let claims = JwtClaims {
            payload: serde_json::json!({"userId": "user123"}),
            iat: now - 120,
            exp: now - 60,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert!(verify_jwt::<TestPayload>(&token, "secret").is_none());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(verify_jwt::<TestPayload>("not.a.jwt", "secret").is_none());
        assert!(verify_jwt::<TestPayload>("", "secret").is_none());
    }
}
