//! Credentials for the HTTP surface.
//!
//! Access tokens are short-lived HS256 JWTs. Refresh tokens are opaque random
//! strings; only their SHA-256 digest is persisted, so a leaked table cannot
//! be replayed.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 8;
const REFRESH_TOKEN_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum AuthnError {
    #[error("invalid or expired token")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,
}

pub type AuthnResult<T> = Result<T, AuthnError>;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
}

impl AuthConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            access_ttl_minutes: 15,
            refresh_ttl_days: 7,
        }
    }

    pub fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.jwt_secret.as_bytes())
    }

    pub fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.jwt_secret.as_bytes())
    }

    pub fn access_ttl(&self) -> Duration {
        Duration::minutes(self.access_ttl_minutes)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::days(self.refresh_ttl_days)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role_id: Option<Uuid>,
    pub employee_id: Option<Uuid>,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub fn issue_access_token(
    user_id: Uuid,
    role_id: Option<Uuid>,
    employee_id: Option<Uuid>,
    config: &AuthConfig,
) -> AuthnResult<AccessToken> {
    let now = Utc::now();
    let expires_at = now.checked_add_signed(config.access_ttl()).unwrap_or(now);
    let claims = Claims {
        sub: user_id,
        role_id,
        employee_id,
        exp: expires_at.timestamp() as usize,
        iat: now.timestamp() as usize,
    };
    let token = jsonwebtoken::encode(&Header::default(), &claims, &config.encoding_key())?;
    Ok(AccessToken { token, expires_at })
}

pub fn decode_access_token(token: &str, config: &AuthConfig) -> AuthnResult<Claims> {
    let data = jsonwebtoken::decode::<Claims>(token, &config.decoding_key(), &Validation::default())?;
    Ok(data.claims)
}

pub fn ensure_password_strength(password: &str) -> AuthnResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthnError::WeakPassword);
    }
    Ok(())
}

pub fn hash_password(password: &str) -> AuthnResult<String> {
    let salt_bytes: [u8; 16] = rand::random();
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|err| AuthnError::PasswordHash(err.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthnError::PasswordHash(err.to_string()))
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable.
pub fn verify_password(password: &str, stored_hash: &str) -> AuthnResult<bool> {
    let parsed =
        PasswordHash::new(stored_hash).map_err(|err| AuthnError::PasswordHash(err.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// A freshly minted refresh token. `token` goes to the client, `hash` to the
/// database.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub token: String,
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

pub fn generate_refresh_token(config: &AuthConfig) -> RefreshToken {
    let bytes: [u8; REFRESH_TOKEN_BYTES] = rand::random();
    let token = URL_SAFE_NO_PAD.encode(bytes);
    let hash = hash_refresh_token(&token);
    let now = Utc::now();
    RefreshToken {
        token,
        hash,
        expires_at: now.checked_add_signed(config.refresh_ttl()).unwrap_or(now),
    }
}

pub fn hash_refresh_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig::new("test-secret-with-enough-entropy")
    }

    #[test]
    fn access_token_round_trip() {
        let user = Uuid::new_v4();
        let role = Uuid::new_v4();
        let issued = issue_access_token(user, Some(role), None, &config()).unwrap();
        let claims = decode_access_token(&issued.token, &config()).unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.role_id, Some(role));
        assert_eq!(claims.employee_id, None);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let issued = issue_access_token(Uuid::new_v4(), None, None, &config()).unwrap();
        let other = AuthConfig::new("a-different-secret");
        assert!(matches!(
            decode_access_token(&issued.token, &other),
            Err(AuthnError::Token(_))
        ));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let mut expired = config();
        expired.access_ttl_minutes = -10;
        let issued = issue_access_token(Uuid::new_v4(), None, None, &expired).unwrap();
        assert!(decode_access_token(&issued.token, &config()).is_err());
    }

    #[test]
    fn passwords_verify_against_their_hash() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }

    #[test]
    fn short_passwords_are_weak() {
        assert!(matches!(
            ensure_password_strength("short"),
            Err(AuthnError::WeakPassword)
        ));
        assert!(ensure_password_strength("long enough").is_ok());
    }

    #[test]
    fn refresh_tokens_store_only_a_digest() {
        let minted = generate_refresh_token(&config());
        assert_ne!(minted.token, minted.hash);
        assert_eq!(hash_refresh_token(&minted.token), minted.hash);
        assert!(minted.expires_at > Utc::now() + Duration::days(6));
        let other = generate_refresh_token(&config());
        assert_ne!(minted.token, other.token);
    }
}
