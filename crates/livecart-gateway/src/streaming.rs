//! Live-stream room provider seam.
//!
//! Room lifecycle calls go through the side-effect worker; token minting is
//! cheap and runs inline in the HTTP handler.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use livecart_core::config::StreamingConfig;
use livecart_core::types::StreamRoom;
use serde::Serialize;
use serde_json::{json, Value};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, info};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("invalid signing key")]
    InvalidKey,

    #[error("malformed token")]
    MalformedToken,

    #[error("token signature mismatch")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("provider error: {0}")]
    Provider(String),
}

/// Viewer credential for joining a room.
#[derive(Debug, Clone, Serialize)]
pub struct StreamToken {
    pub token: String,
    pub room_id: String,
    pub identity: String,
    /// Unix seconds.
    pub expires_at: i64,
}

#[async_trait]
pub trait StreamProvider: Send + Sync {
    /// Open the room at the provider. Returns provider metadata stored on the
    /// room record.
    async fn create_room(&self, room: &StreamRoom) -> Result<Value, StreamError>;

    async fn delete_room(&self, room: &StreamRoom) -> Result<(), StreamError>;

    fn mint_token(&self, room_id: &str, identity: &str) -> Result<StreamToken, StreamError>;

    /// Check a token from `mint_token`. Returns `(room_id, identity)`.
    fn verify_token(&self, token: &str) -> Result<(String, String), StreamError>;
}

/// Self-hosted provider: tracks open rooms in memory and signs tokens with
/// HMAC-SHA256.
///
/// Token layout: `<room>.<identity>.<expiry>.<hex signature>`.
pub struct LocalStreamProvider {
    secret: String,
    ttl_secs: u64,
    open: Mutex<HashSet<String>>,
}

impl LocalStreamProvider {
    pub fn new(cfg: &StreamingConfig) -> Self {
        Self {
            secret: cfg.signing_secret.clone(),
            ttl_secs: cfg.token_ttl_secs,
            open: Mutex::new(HashSet::new()),
        }
    }

    #[cfg(test)]
    pub fn is_open(&self, room_id: &str) -> bool {
        self.open
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(room_id)
    }

    fn mac(&self) -> Result<HmacSha256, StreamError> {
        HmacSha256::new_from_slice(self.secret.as_bytes()).map_err(|_| StreamError::InvalidKey)
    }

    fn open_rooms(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StreamProvider for LocalStreamProvider {
    async fn create_room(&self, room: &StreamRoom) -> Result<Value, StreamError> {
        self.open_rooms().insert(room.id.clone());
        info!(room_id = %room.id, name = %room.name, "stream room opened");
        Ok(json!({ "provider": "local", "room_name": room.name }))
    }

    async fn delete_room(&self, room: &StreamRoom) -> Result<(), StreamError> {
        if !self.open_rooms().remove(&room.id) {
            debug!(room_id = %room.id, "closing a room that was not open");
        }
        info!(room_id = %room.id, "stream room closed");
        Ok(())
    }

    fn mint_token(&self, room_id: &str, identity: &str) -> Result<StreamToken, StreamError> {
        if room_id.contains('.') {
            return Err(StreamError::Provider("room id must not contain '.'".into()));
        }
        let expires_at = chrono::Utc::now().timestamp() + self.ttl_secs as i64;
        let claims = format!("{room_id}.{identity}.{expires_at}");

        let mut mac = self.mac()?;
        mac.update(claims.as_bytes());
        let sig = hex::encode(mac.finalize().into_bytes());

        Ok(StreamToken {
            token: format!("{claims}.{sig}"),
            room_id: room_id.to_string(),
            identity: identity.to_string(),
            expires_at,
        })
    }

    fn verify_token(&self, token: &str) -> Result<(String, String), StreamError> {
        let (claims, sig_hex) = token.rsplit_once('.').ok_or(StreamError::MalformedToken)?;
        let (rest, expiry) = claims.rsplit_once('.').ok_or(StreamError::MalformedToken)?;
        let (room_id, identity) = rest.split_once('.').ok_or(StreamError::MalformedToken)?;
        let expiry: i64 = expiry.parse().map_err(|_| StreamError::MalformedToken)?;
        let expected = hex::decode(sig_hex).map_err(|_| StreamError::MalformedToken)?;

        let mut mac = self.mac()?;
        mac.update(claims.as_bytes());
        mac.verify_slice(&expected)
            .map_err(|_| StreamError::BadSignature)?;

        if expiry < chrono::Utc::now().timestamp() {
            return Err(StreamError::Expired);
        }
        Ok((room_id.to_string(), identity.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(ttl_secs: u64) -> LocalStreamProvider {
        LocalStreamProvider::new(&StreamingConfig {
            signing_secret: "s3cret".into(),
            token_ttl_secs: ttl_secs,
        })
    }

    fn room() -> StreamRoom {
        StreamRoom {
            id: "r1".into(),
            name: "Abendshow".into(),
            provider: Value::Null,
            created_at: "2024-09-15T18:03:22.412Z".into(),
        }
    }

    #[test]
    fn minted_token_verifies() {
        let p = provider(60);
        let token = p.mint_token("r1", "viewer.anna").unwrap();
        assert_eq!(
            p.verify_token(&token.token).unwrap(),
            ("r1".to_string(), "viewer.anna".to_string())
        );
    }

    #[test]
    fn tampered_token_is_rejected() {
        let p = provider(60);
        let token = p.mint_token("r1", "anna").unwrap().token;
        let forged = token.replacen("anna", "bert", 1);
        assert!(matches!(p.verify_token(&forged), Err(StreamError::BadSignature)));
        assert!(matches!(p.verify_token("nonsense"), Err(StreamError::MalformedToken)));
    }

    #[test]
    fn other_secret_does_not_verify() {
        let token = provider(60).mint_token("r1", "anna").unwrap().token;
        let other = LocalStreamProvider::new(&StreamingConfig {
            signing_secret: "different".into(),
            token_ttl_secs: 60,
        });
        assert!(matches!(other.verify_token(&token), Err(StreamError::BadSignature)));
    }

    #[tokio::test]
    async fn rooms_open_and_close() {
        let p = provider(60);
        let meta = p.create_room(&room()).await.unwrap();
        assert_eq!(meta["room_name"], "Abendshow");
        assert!(p.is_open("r1"));
        p.delete_room(&room()).await.unwrap();
        assert!(!p.is_open("r1"));
    }
}
