use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::types::Access;

/// Shared slot for the current access token. Clones share the slot.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    token: Arc<RwLock<Option<String>>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<String> {
        self.token.read().clone()
    }

    pub fn set(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }

    pub fn clear(&self) {
        *self.token.write() = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.read().is_some()
    }

    pub fn claims(&self) -> Option<TokenClaims> {
        self.get().as_deref().and_then(decode_claims)
    }
}

/// Claims the server puts in its access tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    pub user_id: String,
    pub folder_id: String,
    #[serde(default)]
    pub folder_name: Option<String>,
    pub access: Access,
}

/// Read the claims out of a JWT payload. The signature is not checked.
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: TokenClaims = serde_json::from_slice(&bytes).ok()?;

    if claims.user_id.is_empty() || claims.folder_id.is_empty() {
        return None;
    }
    Some(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE;

    fn jwt(payload: &str) -> String {
        format!("eyJhbGciOiJIUzI1NiJ9.{}.sig", URL_SAFE_NO_PAD.encode(payload))
    }

    #[test]
    fn test_decode_claims() {
        let token = jwt(r#"{"user_id":"u1","folder_id":"f1","folder_name":"Trip","access":"rw","exp":1}"#);
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.user_id, "u1");
        assert_eq!(claims.folder_id, "f1");
        assert_eq!(claims.folder_name.as_deref(), Some("Trip"));
        assert_eq!(claims.access, Access::ReadWrite);
    }

    #[test]
    fn test_decode_padded_payload() {
        let payload = URL_SAFE.encode(r#"{"user_id":"u","folder_id":"f","access":"r"}"#);
        let token = format!("h.{payload}.s");
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.folder_name, None);
    }

    #[test]
    fn test_rejects_incomplete_claims() {
        assert!(decode_claims(&jwt(r#"{"user_id":"u","access":"r"}"#)).is_none());
        assert!(decode_claims(&jwt(r#"{"user_id":"","folder_id":"f","access":"r"}"#)).is_none());
        assert!(decode_claims(&jwt(r#"{"user_id":"u","folder_id":"f","access":"x"}"#)).is_none());
        assert!(decode_claims("not-a-token").is_none());
        assert!(decode_claims("a.!!!.c").is_none());
    }

    #[test]
    fn test_token_store_shared_between_clones() {
        let store = TokenStore::new();
        let other = store.clone();
        store.set(jwt(r#"{"user_id":"u","folder_id":"f","access":"w"}"#));

        assert!(other.is_authenticated());
        assert_eq!(other.claims().unwrap().access, Access::Write);

        other.clear();
        assert!(store.get().is_none());
    }
}
