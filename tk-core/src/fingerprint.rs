//! Content-addressed rule-set fingerprint, used as the sync protocol's ETAG.

use crate::identity::{RuleId, Timestamp};
use sha2::{Digest, Sha256};

/// A rule-set fingerprint, rendered as lowercase hex for transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Fingerprint(pub String);

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compute the fingerprint of a rule snapshot: SHA-256 over the
/// concatenation of `(rule_id, modified_at)` tuples, sorted by rule id.
///
/// Deterministic and order-independent in its input: callers may pass
/// snapshots in any order. Cheap to compare (string equality on the
/// resulting hex digest).
pub fn compute_fingerprint(rules: &[(RuleId, Timestamp)]) -> Fingerprint {
    let mut sorted: Vec<&(RuleId, Timestamp)> = rules.iter().collect();
    sorted.sort_by_key(|(id, _)| id.as_uuid());

    let mut hasher = Sha256::new();
    for (id, modified_at) in sorted {
        hasher.update(id.as_uuid().as_bytes());
        hasher.update(modified_at.timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
    }
    Fingerprint(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::EntityIdType;

    #[test]
    fn same_rule_set_yields_same_fingerprint_regardless_of_input_order() {
        let now = chrono::Utc::now();
        let a = (RuleId::now_v7(), now);
        let b = (RuleId::now_v7(), now);
        let fp1 = compute_fingerprint(&[a, b]);
        let fp2 = compute_fingerprint(&[b, a]);
        assert_eq!(fp1, fp2);
    }

    #[test]
    fn changing_modified_at_changes_the_fingerprint() {
        let id = RuleId::now_v7();
        let t1 = chrono::Utc::now();
        let t2 = t1 + chrono::Duration::seconds(1);
        assert_ne!(
            compute_fingerprint(&[(id, t1)]),
            compute_fingerprint(&[(id, t2)])
        );
    }

    #[test]
    fn empty_set_has_a_stable_fingerprint() {
        assert_eq!(compute_fingerprint(&[]), compute_fingerprint(&[]));
    }
}
