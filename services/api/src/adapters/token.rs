//! services/api/src/adapters/token.rs
//!
//! HMAC-SHA256 signed session tokens.
//!
//! A token is `base64url(claims json) "." hex(hmac(base64url part))`. The claims
//! carry the account id, its role and an absolute expiry in unix seconds.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use shop_core::domain::{Role, SessionClaims};
use shop_core::ports::{Clock, PortError, PortResult, TokenService};
use tracing::debug;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    role: String,
    exp: i64,
}

#[derive(Clone)]
pub struct HmacTokenService {
    secret: SecretString,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl HmacTokenService {
    pub fn new(secret: SecretString, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { secret, ttl, clock }
    }

    fn mac(&self) -> PortResult<HmacSha256> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| PortError::Unexpected(format!("Invalid token key: {}", e)))
    }
}

impl TokenService for HmacTokenService {
    fn issue(&self, account_id: Uuid, role: Role) -> PortResult<String> {
        let claims = Claims {
            sub: account_id,
            role: role.as_str().to_string(),
            exp: self
                .clock
                .now()
                .checked_add_signed(self.ttl)
                .ok_or_else(|| PortError::Unexpected("Token expiry out of range".to_string()))?
                .timestamp(),
        };
        let json = serde_json::to_vec(&claims).map_err(|e| PortError::Unexpected(e.to_string()))?;
        let payload = URL_SAFE_NO_PAD.encode(json);

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", payload, signature))
    }

    fn verify(&self, token: &str) -> PortResult<SessionClaims> {
        let (payload, signature) = token.split_once('.').ok_or(PortError::Unauthorized)?;
        let signature = hex::decode(signature).map_err(|_| PortError::Unauthorized)?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        // Constant-time comparison
        mac.verify_slice(&signature).map_err(|_| {
            debug!("Token signature mismatch");
            PortError::Unauthorized
        })?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| PortError::Unauthorized)?;
        let claims: Claims = serde_json::from_slice(&json).map_err(|_| PortError::Unauthorized)?;

        let expires_at =
            DateTime::<Utc>::from_timestamp(claims.exp, 0).ok_or(PortError::Unauthorized)?;
        if self.clock.now() >= expires_at {
            debug!(account_id = %claims.sub, "Token expired");
            return Err(PortError::Unauthorized);
        }

        Ok(SessionClaims {
            account_id: claims.sub,
            role: Role::parse(&claims.role).ok_or(PortError::Unauthorized)?,
            expires_at,
        })
    }
}
