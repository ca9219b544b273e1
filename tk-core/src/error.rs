//! Error types for rule compilation and evaluation.

use crate::identity::RuleId;
use crate::path::FieldPath;
use thiserror::Error;

/// Where in a rule's body a compile error occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleLocation {
    pub rule_id: RuleId,
    pub group_index: usize,
    pub condition_index: Option<usize>,
}

impl RuleLocation {
    pub fn rule(rule_id: RuleId) -> Self {
        Self {
            rule_id,
            group_index: 0,
            condition_index: None,
        }
    }

    pub fn group(rule_id: RuleId, group_index: usize) -> Self {
        Self {
            rule_id,
            group_index,
            condition_index: None,
        }
    }

    pub fn condition(rule_id: RuleId, group_index: usize, condition_index: usize) -> Self {
        Self {
            rule_id,
            group_index,
            condition_index: Some(condition_index),
        }
    }
}

impl std::fmt::Display for RuleLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.condition_index {
            Some(c) => write!(
                f,
                "rule {} group {} condition {}",
                self.rule_id, self.group_index, c
            ),
            None => write!(f, "rule {} group {}", self.rule_id, self.group_index),
        }
    }
}

/// Errors raised while compiling a declarative rule into a predicate tree.
///
/// Compilation is total: every rejection names the offending location so a
/// caller can report it back to whoever authored the rule.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("{location}: rule body must contain at least one group")]
    EmptyRuleBody { location: RuleLocation },

    #[error("{location}: group must contain at least one condition")]
    EmptyGroup { location: RuleLocation },

    #[error("{location}: operator {op:?} is not compatible with field_type {field_type:?}")]
    IncompatibleOperator {
        location: RuleLocation,
        op: crate::rule::Operator,
        field_type: crate::rule::FieldType,
    },

    #[error("{location}: field_ref path must not contain a wildcard segment")]
    WildcardInFieldRef { location: RuleLocation },

    #[error("{location}: field path has {count} wildcard segments, exceeding the budget of 2")]
    TooManyWildcards { location: RuleLocation, count: usize },

    #[error("{location}: `value` and `values` and `field_ref` are mutually exclusive, but {set_count} were set")]
    ComparandConflict {
        location: RuleLocation,
        set_count: usize,
    },

    #[error("{location}: operator requires a comparand but none of value/values/field_ref was set")]
    MissingComparand { location: RuleLocation },

    #[error("{location}: `in` requires `values`, got {other}")]
    InRequiresValues {
        location: RuleLocation,
        other: &'static str,
    },

    #[error("{location}: `values` carries {count} elements, exceeding the limit of 64")]
    TooManyValues { location: RuleLocation, count: usize },

    #[error("{location}: `values` must be homogeneous in type")]
    HeterogeneousValues { location: RuleLocation },

    #[error("{location}: rule name must be 1-128 characters, got {len}")]
    InvalidName { location: RuleLocation, len: usize },

    #[error("{location}: rule description must be at most 1024 characters, got {len}")]
    DescriptionTooLong { location: RuleLocation, len: usize },

    #[error("{location}: sample_rate must be within [0, 1], got {value}")]
    InvalidSampleRate { location: RuleLocation, value: f64 },

    #[error("{location}: estimated cost {cost} exceeds the hard per-rule budget of {budget}")]
    CostBudgetExceeded {
        location: RuleLocation,
        cost: u64,
        budget: u64,
    },

    #[error("{location}: field path is empty")]
    EmptyFieldPath { location: RuleLocation },
}

impl CompileError {
    pub fn location(&self) -> &RuleLocation {
        match self {
            CompileError::EmptyRuleBody { location }
            | CompileError::EmptyGroup { location }
            | CompileError::IncompatibleOperator { location, .. }
            | CompileError::WildcardInFieldRef { location }
            | CompileError::TooManyWildcards { location, .. }
            | CompileError::ComparandConflict { location, .. }
            | CompileError::MissingComparand { location }
            | CompileError::InRequiresValues { location, .. }
            | CompileError::TooManyValues { location, .. }
            | CompileError::HeterogeneousValues { location }
            | CompileError::InvalidName { location, .. }
            | CompileError::DescriptionTooLong { location, .. }
            | CompileError::InvalidSampleRate { location, .. }
            | CompileError::CostBudgetExceeded { location, .. }
            | CompileError::EmptyFieldPath { location } => location,
        }
    }
}

/// A non-fatal compile-time observation: the rule was accepted, but a
/// caller may want to surface this to whoever authored it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileWarning {
    pub location: RuleLocation,
    pub message: String,
}

/// Errors raised while evaluating a compiled rule against a record.
///
/// Most of these never escape a single condition: `on_missing_field` and
/// `on_coercion_fail` absorb the common cases. Only the `error` policy
/// variant surfaces here, and only for the rule currently being evaluated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error("{location}: field {field} is missing and on_missing_field=error")]
    MissingField {
        location: RuleLocation,
        field: FieldPath,
    },

    #[error("{location}: field {field} could not be coerced to {field_type:?} and on_coercion_fail=error")]
    CoercionFailed {
        location: RuleLocation,
        field: FieldPath,
        field_type: crate::rule::FieldType,
    },
}

impl EvalError {
    pub fn location(&self) -> &RuleLocation {
        match self {
            EvalError::MissingField { location, .. } => location,
            EvalError::CoercionFailed { location, .. } => location,
        }
    }
}

/// Top-level error aggregating the failure modes of `tk-core`.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),
}

pub type CoreResult<T> = Result<T, CoreError>;
