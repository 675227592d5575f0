//! Bearer token authentication
//!
//! Tokens are `base64url(claims).base64url(hmac_sha256(claims))`, signed with
//! the configured secret. Account management is an external concern; this
//! module only turns a token into an `Identity`.

use crate::error::{Result, TriviaError};
use crate::types::Identity;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Trait for resolving a bearer token to a player identity
#[async_trait]
pub trait TokenAuthenticator: Send + Sync {
    /// Verify a token. Fails with `NotAuthenticated` when it is not valid.
    async fn authenticate(&self, token: &str) -> Result<Identity>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    level: Option<u32>,
    iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<i64>,
}

/// HMAC-SHA256 signed token authenticator
pub struct HmacTokenAuthenticator {
    secret: Vec<u8>,
}

impl HmacTokenAuthenticator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Issue a token for an identity, optionally expiring after `ttl_seconds`
    pub fn issue(&self, identity: &Identity, ttl_seconds: Option<i64>) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: identity.player_id.clone(),
            name: identity.username.clone(),
            level: identity.level,
            iat: now,
            exp: ttl_seconds.map(|ttl| now + ttl),
        };

        let payload = serde_json::to_vec(&claims)?;
        let signature = self.mac()?.chain_update(&payload).finalize().into_bytes();

        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret).map_err(|e| {
            TriviaError::ConfigurationError {
                message: format!("Invalid token secret: {}", e),
            }
            .into()
        })
    }

    fn reject(reason: &str) -> anyhow::Error {
        TriviaError::NotAuthenticated {
            reason: reason.to_string(),
        }
        .into()
    }
}

#[async_trait]
impl TokenAuthenticator for HmacTokenAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Identity> {
        let (payload_part, signature_part) = token
            .split_once('.')
            .ok_or_else(|| Self::reject("malformed token"))?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_part)
            .map_err(|_| Self::reject("malformed token payload"))?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature_part)
            .map_err(|_| Self::reject("malformed token signature"))?;

        self.mac()?
            .chain_update(&payload)
            .verify_slice(&signature)
            .map_err(|_| Self::reject("invalid token signature"))?;

        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| Self::reject("invalid token claims"))?;

        if let Some(exp) = claims.exp {
            if exp <= Utc::now().timestamp() {
                return Err(Self::reject("token expired"));
            }
        }
        if claims.sub.trim().is_empty() {
            return Err(Self::reject("token has no subject"));
        }

        debug!("Authenticated player '{}'", claims.sub);
        Ok(Identity {
            player_id: claims.sub,
            username: claims.name,
            level: claims.level,
        })
    }
}

/// Authenticator backed by a fixed token table, for tests and local runs
#[derive(Debug, Default)]
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, Identity>,
}

impl StaticTokenAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token; the username defaults to the player id
    pub fn with_token(mut self, token: impl Into<String>, player_id: impl Into<String>) -> Self {
        let player_id = player_id.into();
        self.tokens.insert(
            token.into(),
            Identity {
                username: player_id.clone(),
                player_id,
                level: None,
            },
        );
        self
    }
}

#[async_trait]
impl TokenAuthenticator for StaticTokenAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Identity> {
        self.tokens.get(token).cloned().ok_or_else(|| {
            TriviaError::NotAuthenticated {
                reason: "unknown token".to_string(),
            }
            .into()
        })
    }
}
