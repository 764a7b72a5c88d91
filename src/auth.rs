// Access-token claims as seen from the client side.
// The backend signs its tokens; we never hold that key, so claims are read
// without signature validation and only used for expiry and display.

use anyhow::{Context, Result};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>, // Expiration time (seconds since epoch)
}

impl AccessClaims {
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp.is_some_and(|exp| exp <= now)
    }

    pub fn display_name(&self) -> Option<&str> {
        self.username.as_deref().or(self.sub.as_deref())
    }
}

pub fn peek_claims(token: &str) -> Result<AccessClaims> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let decoded = decode::<AccessClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .context("Failed to read access token claims")?;
    Ok(decoded.claims)
}

// Opaque (non-JWT) tokens are never considered expired locally
pub fn token_expired(token: &str) -> bool {
    match peek_claims(token) {
        Ok(claims) => claims.is_expired_at(chrono::Utc::now().timestamp()),
        Err(_) => false,
    }
}

#[cfg(test)]
pub(crate) fn test_token(username: &str, exp: i64) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};
    let claims = AccessClaims {
        sub: Some("17".into()),
        username: Some(username.into()),
        exp: Some(exp),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(b"server-side-secret")).unwrap()
}
