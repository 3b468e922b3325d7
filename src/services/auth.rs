//! Signed tokens: admin bearer tokens and presigned media URLs for the local
//! object store. Both are HS256 JWTs keyed by the service secret and told
//! apart by their subject.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use super::{ServiceError, ServiceResult};

const ADMIN_SUBJECT: &str = "admin";
const MEDIA_SUBJECT: &str = "media";
const ADMIN_TOKEN_HOURS: i64 = 12;

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct MediaClaims {
    sub: String,
    key: String,
    exp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Password check and bearer token issue/validation for admin routes.
#[derive(Clone)]
pub struct AdminAuth {
    password_digest: [u8; 16],
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl AdminAuth {
    pub fn new(password: impl Into<String>, secret: &str) -> Self {
        Self {
            password_digest: md5::compute(password.into()).0,
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Exchange the admin password for a bearer token.
    pub fn login(&self, password: &str) -> ServiceResult<IssuedToken> {
        if !digests_match(&md5::compute(password).0, &self.password_digest) {
            return Err(ServiceError::Unauthorized("wrong password".into()));
        }

        let now = Utc::now();
        let expires_at = now + Duration::hours(ADMIN_TOKEN_HOURS);
        let claims = AdminClaims {
            sub: ADMIN_SUBJECT.into(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|err| ServiceError::Unauthorized(format!("cannot issue token: {err}")))?;

        Ok(IssuedToken { token, expires_at })
    }

    pub fn verify(&self, token: &str) -> ServiceResult<AdminClaims> {
        let data = decode::<AdminClaims>(token, &self.decoding, &Validation::default())
            .map_err(|_| ServiceError::Unauthorized("invalid token".into()))?;
        if data.claims.sub != ADMIN_SUBJECT {
            return Err(ServiceError::Unauthorized("invalid token".into()));
        }
        Ok(data.claims)
    }
}

/// Issues and checks `/media/{token}` URLs served by the local object store.
#[derive(Clone)]
pub struct MediaTokens {
    public_base: String,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl MediaTokens {
    pub fn new(public_base: &str, secret: &str) -> Self {
        Self {
            public_base: public_base.trim_end_matches('/').to_string(),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Absolute URL that resolves to `key` until `ttl` elapses.
    pub fn url_for(&self, key: &str, ttl: std::time::Duration) -> Result<String, String> {
        let ttl = Duration::from_std(ttl).map_err(|err| err.to_string())?;
        let claims = MediaClaims {
            sub: MEDIA_SUBJECT.into(),
            key: key.to_string(),
            exp: (Utc::now() + ttl).timestamp(),
        };
        let token =
            encode(&Header::default(), &claims, &self.encoding).map_err(|err| err.to_string())?;
        Ok(format!("{}/media/{}", self.public_base, token))
    }

    /// The object key a token grants access to, if it is valid and unexpired.
    pub fn key_for(&self, token: &str) -> Option<String> {
        let data = decode::<MediaClaims>(token, &self.decoding, &Validation::default()).ok()?;
        (data.claims.sub == MEDIA_SUBJECT).then_some(data.claims.key)
    }
}

/// Compares every byte regardless of where the first difference is.
fn digests_match(a: &[u8; 16], b: &[u8; 16]) -> bool {
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}
