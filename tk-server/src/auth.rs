//! API-key authentication: structured key parsing, O(1) secret
//! lookup, HMAC-SHA256 verification, revocation, and throttled
//! `last_used_at` updates.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::RwLock;
use subtle::ConstantTimeEq;
use tk_core::identity::{ApiKeyId, EntityIdType, HmacSecretId, TenantId, Timestamp};

use crate::constants::{API_KEY_PREFIX, API_KEY_TOTAL_LEN, LAST_USED_THROTTLE};
use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// A loaded HMAC secret, keyed by `secret_id`.
#[derive(Clone)]
pub struct HmacSecret {
    pub secret_id: HmacSecretId,
    pub secret_bytes: Vec<u8>,
}

/// A stored API-key record: everything the authenticator needs to verify
/// a presented key without ever holding the plaintext.
#[derive(Clone)]
pub struct ApiKeyRecord {
    pub key_id: ApiKeyId,
    pub tenant_id: TenantId,
    pub secret_id: HmacSecretId,
    pub hmac: Vec<u8>,
    pub revoked_at: Option<Timestamp>,
    pub last_used_at: Option<Timestamp>,
}

/// The outcome of a successful authentication: the tenant the request acts
/// as, resolved from the matched API-key record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub tenant_id: TenantId,
    pub key_id: ApiKeyId,
}

struct ParsedKey {
    secret_id: HmacSecretId,
}

fn parse_api_key(full_key: &str) -> Result<ParsedKey, AuthError> {
    if full_key.len() != API_KEY_TOTAL_LEN {
        return Err(AuthError::Malformed);
    }
    let rest = full_key.strip_prefix(API_KEY_PREFIX).ok_or(AuthError::Malformed)?;
    let (secret_hex, random_hex) = rest.split_once('-').ok_or(AuthError::Malformed)?;
    if secret_hex.len() != 32 || random_hex.is_empty() {
        return Err(AuthError::Malformed);
    }
    let mut bytes = [0u8; 16];
    hex::decode_to_slice(secret_hex, &mut bytes).map_err(|_| AuthError::Malformed)?;
    Ok(ParsedKey {
        secret_id: HmacSecretId::new(uuid::Uuid::from_bytes(bytes)),
    })
}

fn compute_hmac(secret_bytes: &[u8], full_key: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret_bytes).expect("HMAC accepts any key length");
    mac.update(full_key.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Authenticates API keys against an in-memory secret map and a backing
/// store of key records. Built once at startup; secret lookups are
/// lock-free reads thereafter.
pub struct Authenticator<S> {
    secrets: HashMap<HmacSecretId, HmacSecret>,
    keys: S,
    last_throttled: RwLock<HashMap<ApiKeyId, Timestamp>>,
}

/// Backing lookup/update for API-key records, implemented by the store
/// layer (kept separate from [`tk_store::RuleStore`]/`EventSink` since key
/// records are a distinct lifecycle).
#[async_trait::async_trait]
pub trait ApiKeyLookup: Send + Sync {
    async fn find_by_secret(
        &self,
        secret_id: HmacSecretId,
        computed_hmac: &[u8],
    ) -> Option<ApiKeyRecord>;

    async fn touch_last_used(&self, key_id: ApiKeyId, at: Timestamp);
}

/// An in-memory [`ApiKeyLookup`], suitable for single-instance deployments
/// and tests. Keyed by `secret_id` for O(1) lookup; reads
/// and writes are lock-free via `DashMap`.
#[derive(Default)]
pub struct InMemoryApiKeyLookup {
    by_secret: dashmap::DashMap<HmacSecretId, Vec<ApiKeyRecord>>,
}

impl InMemoryApiKeyLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: ApiKeyRecord) {
        self.by_secret.entry(record.secret_id).or_default().push(record);
    }
}

#[async_trait::async_trait]
impl ApiKeyLookup for InMemoryApiKeyLookup {
    async fn find_by_secret(
        &self,
        secret_id: HmacSecretId,
        computed_hmac: &[u8],
    ) -> Option<ApiKeyRecord> {
        self.by_secret.get(&secret_id)?.iter().find(|r| r.hmac == computed_hmac).cloned()
    }

    async fn touch_last_used(&self, key_id: ApiKeyId, at: Timestamp) {
        if let Some(mut records) = self.by_secret.iter_mut().find(|entry| {
            entry.value().iter().any(|r| r.key_id == key_id)
        }) {
            if let Some(record) = records.value_mut().iter_mut().find(|r| r.key_id == key_id) {
                record.last_used_at = Some(at);
            }
        }
    }
}

impl<S: ApiKeyLookup> Authenticator<S> {
    pub fn new(secrets: impl IntoIterator<Item = HmacSecret>, keys: S) -> Self {
        Self {
            secrets: secrets.into_iter().map(|s| (s.secret_id, s)).collect(),
            keys,
            last_throttled: RwLock::new(HashMap::new()),
        }
    }

    /// Runs the full verification sequence for a presented key: parse,
    /// look up, compare, check revocation, throttle the usage timestamp.
    /// Records the outcome to the auth-attempts metric regardless of result.
    pub async fn authenticate(
        &self,
        full_key: &str,
        now: Timestamp,
    ) -> Result<AuthContext, AuthError> {
        let result = self.authenticate_inner(full_key, now).await;
        let outcome = match &result {
            Ok(_) => "accepted",
            Err(AuthError::Missing) => "missing",
            Err(AuthError::Malformed) => "malformed",
            Err(AuthError::UnknownKey) => "unknown_key",
            Err(AuthError::Revoked) => "revoked",
            Err(AuthError::BadSignature) => "bad_signature",
        };
        if let Ok(metrics) = crate::telemetry::METRICS.as_ref() {
            metrics.record_auth_attempt(outcome);
        }
        result
    }

    async fn authenticate_inner(
        &self,
        full_key: &str,
        now: Timestamp,
    ) -> Result<AuthContext, AuthError> {
        let parsed = parse_api_key(full_key)?;

        let secret = self
            .secrets
            .get(&parsed.secret_id)
            .ok_or(AuthError::UnknownKey)?;

        let computed = compute_hmac(&secret.secret_bytes, full_key);

        let record = self
            .keys
            .find_by_secret(parsed.secret_id, &computed)
            .await
            .ok_or(AuthError::UnknownKey)?;

        if record.hmac.ct_eq(&computed).unwrap_u8() != 1 {
            return Err(AuthError::BadSignature);
        }

        if record.revoked_at.is_some() {
            return Err(AuthError::Revoked);
        }

        self.maybe_touch_last_used(record.key_id, now).await;

        Ok(AuthContext {
            tenant_id: record.tenant_id,
            key_id: record.key_id,
        })
    }

    async fn maybe_touch_last_used(&self, key_id: ApiKeyId, now: Timestamp) {
        let should_write = {
            let guard = self.last_throttled.read().expect("lock poisoned");
            match guard.get(&key_id) {
                Some(last) => now.signed_duration_since(*last).to_std().unwrap_or_default()
                    >= LAST_USED_THROTTLE,
                None => true,
            }
        };
        if !should_write {
            return;
        }
        {
            let mut guard = self.last_throttled.write().expect("lock poisoned");
            guard.insert(key_id, now);
        }
        self.keys.touch_last_used(key_id, now).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedKeys(ApiKeyRecord);

    #[async_trait::async_trait]
    impl ApiKeyLookup for FixedKeys {
        async fn find_by_secret(
            &self,
            secret_id: HmacSecretId,
            _computed_hmac: &[u8],
        ) -> Option<ApiKeyRecord> {
            (self.0.secret_id == secret_id).then(|| self.0.clone())
        }

        async fn touch_last_used(&self, _key_id: ApiKeyId, _at: Timestamp) {}
    }

    fn make_key(secret_bytes: &[u8]) -> (HmacSecretId, String) {
        let secret_id = HmacSecretId::now_v7();
        let random_hex = "a".repeat(63);
        let secret_hex = hex::encode(secret_id.as_uuid().as_bytes());
        let full_key = format!("{}{}-{}", API_KEY_PREFIX, secret_hex, random_hex);
        assert_eq!(full_key.len(), API_KEY_TOTAL_LEN);
        let _ = secret_bytes;
        (secret_id, full_key)
    }

    #[tokio::test]
    async fn accepts_a_valid_key() {
        let secret_bytes = b"super-secret-bytes".to_vec();
        let (secret_id, full_key) = make_key(&secret_bytes);
        let hmac = compute_hmac(&secret_bytes, &full_key);
        let record = ApiKeyRecord {
            key_id: ApiKeyId::now_v7(),
            tenant_id: TenantId::now_v7(),
            secret_id,
            hmac,
            revoked_at: None,
            last_used_at: None,
        };
        let auth = Authenticator::new(
            [HmacSecret {
                secret_id,
                secret_bytes,
            }],
            FixedKeys(record.clone()),
        );

        let ctx = auth.authenticate(&full_key, chrono::Utc::now()).await.unwrap();
        assert_eq!(ctx.tenant_id, record.tenant_id);
    }

    #[tokio::test]
    async fn rejects_malformed_key() {
        let auth = Authenticator::new(
            [],
            FixedKeys(ApiKeyRecord {
                key_id: ApiKeyId::now_v7(),
                tenant_id: TenantId::now_v7(),
                secret_id: HmacSecretId::now_v7(),
                hmac: vec![],
                revoked_at: None,
                last_used_at: None,
            }),
        );
        let err = auth
            .authenticate("not-a-key", chrono::Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Malformed));
    }

    #[tokio::test]
    async fn rejects_revoked_key() {
        let secret_bytes = b"another-secret".to_vec();
        let (secret_id, full_key) = make_key(&secret_bytes);
        let hmac = compute_hmac(&secret_bytes, &full_key);
        let record = ApiKeyRecord {
            key_id: ApiKeyId::now_v7(),
            tenant_id: TenantId::now_v7(),
            secret_id,
            hmac,
            revoked_at: Some(chrono::Utc::now()),
            last_used_at: None,
        };
        let auth = Authenticator::new(
            [HmacSecret {
                secret_id,
                secret_bytes,
            }],
            FixedKeys(record),
        );

        let err = auth.authenticate(&full_key, chrono::Utc::now()).await.unwrap_err();
        assert!(matches!(err, AuthError::Revoked));
    }

    #[tokio::test]
    async fn rejects_unknown_secret_id() {
        let auth = Authenticator::new(
            [],
            FixedKeys(ApiKeyRecord {
                key_id: ApiKeyId::now_v7(),
                tenant_id: TenantId::now_v7(),
                secret_id: HmacSecretId::now_v7(),
                hmac: vec![],
                revoked_at: None,
                last_used_at: None,
            }),
        );
        let (_secret_id, full_key) = make_key(b"whatever");
        let err = auth.authenticate(&full_key, chrono::Utc::now()).await.unwrap_err();
        assert!(matches!(err, AuthError::UnknownKey));
    }
}
