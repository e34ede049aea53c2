use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
/// The claims that are stored in the JWT.
pub struct Claims {
    /// The subject of the token, i.e. the user id.
    pub sub: String,
    /// Issue time, seconds since UNIX_EPOCH.
    pub iat: i64,
    /// Expiry time, seconds since UNIX_EPOCH.
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token invalid")]
    Invalid(#[source] Option<jsonwebtoken::errors::Error>),
    #[error("failed to sign token")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Issues and verifies HS256 session tokens signed with the server secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: chrono::Duration,
}

impl TokenService {
    pub fn new(secret: &SecretString, ttl: chrono::Duration) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            ttl,
        }
    }

    pub fn ttl(&self) -> chrono::Duration { self.ttl }

    /// Create a new token for the given user id.
    pub fn issue(&self, user_id: Uuid) -> Result<SecretString, TokenError> {
        self.issue_at(user_id, Utc::now())
    }

    /// Create a token as if issued at `now`.
    pub fn issue_at(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<SecretString, TokenError> {
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        let header = Header { alg: ALGORITHM, ..Default::default() };
        let token = encode(&header, &claims, &self.encoding).map_err(TokenError::Signing)?;
        Ok(SecretString::from(token))
    }

    /// Verify signature and expiry, returning the user id the token was issued for.
    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(Some(e)),
        })?;
        Uuid::parse_str(&data.claims.sub).map_err(|_| TokenError::Invalid(None))
    }
}
