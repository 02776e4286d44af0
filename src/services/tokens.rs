//! JWT issuance and verification.
//!
//! One HS256 secret signs both token kinds. Refresh tokens are marked by
//! the `type: "refresh"` claim on the token itself; there is no
//! server-side token state.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::models::TokenPairResponse;

const REFRESH_KIND: &str = "refresh";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("wrong token kind")]
    WrongKind,
    #[error("token encoding failed: {0}")]
    Encode(jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl Claims {
    fn is_refresh(&self) -> bool {
        self.kind.as_deref() == Some(REFRESH_KIND)
    }
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        TokenService {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl: Duration::hours(1),
            refresh_ttl: Duration::days(7),
        }
    }

    /// Issue an access/refresh pair for one subject.
    pub fn issue_pair(&self, user_id: &str) -> Result<TokenPairResponse, TokenError> {
        let now = Utc::now();
        let access_expires_at = now + self.access_ttl;
        let refresh_expires_at = now + self.refresh_ttl;

        let access = Claims {
            sub: user_id.to_string(),
            exp: access_expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
            kind: None,
        };
        let refresh = Claims {
            sub: user_id.to_string(),
            exp: refresh_expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
            kind: Some(REFRESH_KIND.to_string()),
        };

        Ok(TokenPairResponse {
            access_token: self.encode(&access)?,
            access_token_expires_at: access_expires_at,
            refresh_token: self.encode(&refresh)?,
            refresh_token_expires_at: refresh_expires_at,
        })
    }

    /// Verify a token presented for resource access. Refresh tokens are
    /// rejected with [`TokenError::WrongKind`].
    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.decode(token)?;
        if claims.is_refresh() {
            return Err(TokenError::WrongKind);
        }
        Ok(claims)
    }

    /// Verify a token presented to the refresh endpoint; it must carry the
    /// refresh kind.
    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.decode(token)?;
        if !claims.is_refresh() {
            return Err(TokenError::WrongKind);
        }
        Ok(claims)
    }

    fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::default(), claims, &self.encoding_key).map_err(TokenError::Encode)
    }

    fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| TokenError::Invalid)
    }
}
