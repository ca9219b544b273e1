//! Identity types shared across TrapperKeeper crates.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use uuid::Uuid;

/// Trait for type-safe, time-ordered entity IDs.
///
/// Every identifier in TrapperKeeper is a 128-bit UUIDv7: a 48-bit
/// millisecond timestamp prefix followed by random bits. This trait keeps
/// entity IDs from being accidentally mixed
/// up across rules, sensors, API keys, and HMAC secrets.
pub trait EntityIdType:
    Copy
    + Clone
    + Eq
    + PartialEq
    + Hash
    + fmt::Debug
    + fmt::Display
    + FromStr
    + Serialize
    + serde::de::DeserializeOwned
    + Send
    + Sync
    + 'static
{
    const ENTITY_NAME: &'static str;

    fn new(uuid: Uuid) -> Self;
    fn as_uuid(&self) -> Uuid;

    fn nil() -> Self {
        Self::new(Uuid::nil())
    }

    /// Mint a new time-ordered ID (UUIDv7: 48-bit ms timestamp + random tail).
    fn now_v7() -> Self {
        Self::new(Uuid::now_v7())
    }
}

/// Error parsing an entity ID from its string form.
#[derive(Debug, Clone)]
pub struct EntityIdParseError {
    pub entity_name: &'static str,
    pub input: String,
    pub source: uuid::Error,
}

impl fmt::Display for EntityIdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to parse {} id from '{}': {}",
            self.entity_name, self.input, self.source
        )
    }
}

impl std::error::Error for EntityIdParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

macro_rules! define_entity_id {
    ($name:ident, $entity:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(Uuid);

        impl EntityIdType for $name {
            const ENTITY_NAME: &'static str = $entity;

            fn new(uuid: Uuid) -> Self {
                Self(uuid)
            }

            fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = EntityIdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::from_str(s)
                    .map(Self::new)
                    .map_err(|e| EntityIdParseError {
                        entity_name: Self::ENTITY_NAME,
                        input: s.to_string(),
                        source: e,
                    })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::nil()
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                self.0.serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                Uuid::deserialize(deserializer).map(Self::new)
            }
        }
    };
}

define_entity_id!(RuleId, "rule", "Identifier for a compiled rule.");
define_entity_id!(SensorId, "sensor", "Identifier for an ephemeral sensor.");
define_entity_id!(
    HmacSecretId,
    "hmac_secret",
    "Identifier for a rotatable HMAC secret."
);
define_entity_id!(ApiKeyId, "api_key", "Identifier for an issued API key.");
define_entity_id!(TenantId, "tenant", "Identifier for a tenant.");
define_entity_id!(EventId, "event", "Identifier for an ingested event.");

/// UTC timestamp used throughout the data model.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// SHA-256 content hash, used for event payload dedup/integrity checks.
pub type ContentHash = [u8; 32];

/// Compute the SHA-256 hash of a byte slice.
pub fn compute_content_hash(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_type_safety() {
        let rule_id = RuleId::now_v7();
        let sensor_id = SensorId::now_v7();
        assert_ne!(rule_id.as_uuid(), sensor_id.as_uuid());
    }

    #[test]
    fn entity_id_display_and_debug() {
        let id = RuleId::new(Uuid::nil());
        assert_eq!(
            format!("{:?}", id),
            "RuleId(00000000-0000-0000-0000-000000000000)"
        );
        assert_eq!(format!("{}", id), "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn entity_id_from_str_roundtrip() {
        let uuid_str = "550e8400-e29b-41d4-a716-446655440000";
        let id: RuleId = uuid_str.parse().expect("valid uuid should parse");
        assert_eq!(id.to_string(), uuid_str);
    }

    #[test]
    fn entity_id_parse_error_names_entity() {
        let result: Result<RuleId, _> = "not-a-uuid".parse();
        let err = result.unwrap_err();
        assert_eq!(err.entity_name, "rule");
    }

    #[test]
    fn entity_id_serde_is_transparent() {
        let id = SensorId::now_v7();
        let json = serde_json::to_string(&id).unwrap();
        assert!(json.starts_with('"') && json.ends_with('"'));
        let back: SensorId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn content_hash_is_deterministic() {
        assert_eq!(compute_content_hash(b"abc"), compute_content_hash(b"abc"));
        assert_ne!(compute_content_hash(b"abc"), compute_content_hash(b"abd"));
    }
}
