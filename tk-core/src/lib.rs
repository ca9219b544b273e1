//! Rule model, compiler, and evaluation engine.
//!
//! This crate has no I/O: field-path resolution, type coercion, condition
//! and rule evaluation, the DNF compiler, the cost model, and the sync
//! fingerprint are all pure functions over injected data. `tk-store`,
//! `tk-server`, and `tk-sdk` build the I/O-bearing system around this core.

pub mod clock;
pub mod coerce;
pub mod compiler;
pub mod condition;
pub mod cost;
pub mod error;
pub mod eval;
pub mod fingerprint;
pub mod health;
pub mod identity;
pub mod path;
pub mod rng;
pub mod rule;

pub use clock::{Clock, SystemClock};
pub use compiler::{compile, CompiledCondition, CompiledGroup, CompiledRule};
pub use error::{CompileError, CompileWarning, CoreError, CoreResult, EvalError, RuleLocation};
pub use eval::{evaluate_rule, evaluate_rule_set, MatchedCondition, RuleMatch};
pub use fingerprint::{compute_fingerprint, Fingerprint};
pub use health::{HealthCheck, HealthStatus};
pub use identity::{
    compute_content_hash, ApiKeyId, ContentHash, EntityIdParseError, EntityIdType, EventId,
    HmacSecretId, RuleId, SensorId, TenantId, Timestamp,
};
pub use path::{resolve, FieldPath, Segment};
pub use rng::{RandomSource, SecureRandomSource};
pub use rule::{
    Action, Comparand, Condition, FieldPolicy, FieldType, Operator, OrGroup, Rule, RuleBody,
    RuleState,
};
