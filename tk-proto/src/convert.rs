//! Conversions between the wire representation and `tk-core`'s in-memory
//! rule model. Kept in one place so the server and SDK share exactly one
//! reading of the schema.

use crate::{
    self as proto, path_segment, scalar_value, Condition as ProtoCondition,
    FieldPath as ProtoFieldPath, FieldPolicy as ProtoFieldPolicy, FieldType as ProtoFieldType,
    OrGroup as ProtoOrGroup, Operator as ProtoOperator, PathSegment, Rule as ProtoRule,
    RuleAction, RuleState as ProtoRuleState, ScalarValue, ScalarValueList,
};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeSet;
use tk_core::identity::{EntityIdType, RuleId};
use tk_core::path::{FieldPath, Segment};
use tk_core::rule::{
    Action, Comparand, Condition, FieldPolicy, FieldType, Operator, OrGroup, Rule, RuleBody,
    RuleState,
};

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("invalid rule id {0:?}")]
    InvalidId(String),
    #[error("condition carries no comparand for an operator that requires one")]
    MissingComparand,
    #[error("malformed scalar value")]
    MalformedScalar,
}

pub trait ToProtoTimestamp {
    fn to_proto(&self) -> proto::Timestamp;
}

impl ToProtoTimestamp for DateTime<Utc> {
    fn to_proto(&self) -> proto::Timestamp {
        proto::Timestamp {
            seconds: self.timestamp(),
            nanos: self.timestamp_subsec_nanos() as i32,
        }
    }
}

pub trait FromProtoTimestamp {
    fn from_proto(ts: &proto::Timestamp) -> DateTime<Utc>;
}

impl FromProtoTimestamp for DateTime<Utc> {
    fn from_proto(ts: &proto::Timestamp) -> DateTime<Utc> {
        Utc.timestamp_opt(ts.seconds, ts.nanos.max(0) as u32)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

fn segment_to_proto(segment: &Segment) -> PathSegment {
    let kind = match segment {
        Segment::Key(k) => path_segment::Kind::Key(k.clone()),
        Segment::Index(i) => path_segment::Kind::Index(*i),
        Segment::Wildcard => path_segment::Kind::Wildcard(true),
    };
    PathSegment { kind: Some(kind) }
}

fn segment_from_proto(segment: &PathSegment) -> Segment {
    match &segment.kind {
        Some(path_segment::Kind::Key(k)) => Segment::Key(k.clone()),
        Some(path_segment::Kind::Index(i)) => Segment::Index(*i),
        Some(path_segment::Kind::Wildcard(_)) | None => Segment::Wildcard,
    }
}

fn field_path_to_proto(path: &FieldPath) -> ProtoFieldPath {
    ProtoFieldPath {
        segments: path.0.iter().map(segment_to_proto).collect(),
    }
}

fn field_path_from_proto(path: &ProtoFieldPath) -> FieldPath {
    FieldPath::new(path.segments.iter().map(segment_from_proto).collect())
}

fn field_type_to_proto(ft: FieldType) -> ProtoFieldType {
    match ft {
        FieldType::Any => ProtoFieldType::FieldTypeAny,
        FieldType::Numeric => ProtoFieldType::FieldTypeNumeric,
        FieldType::Text => ProtoFieldType::FieldTypeText,
        FieldType::Boolean => ProtoFieldType::FieldTypeBoolean,
    }
}

fn field_type_from_proto(ft: ProtoFieldType) -> FieldType {
    match ft {
        ProtoFieldType::FieldTypeNumeric => FieldType::Numeric,
        ProtoFieldType::FieldTypeText => FieldType::Text,
        ProtoFieldType::FieldTypeBoolean => FieldType::Boolean,
        ProtoFieldType::FieldTypeAny => FieldType::Any,
    }
}

fn operator_to_proto(op: Operator) -> ProtoOperator {
    match op {
        Operator::Eq => ProtoOperator::OperatorEq,
        Operator::Neq => ProtoOperator::OperatorNeq,
        Operator::Lt => ProtoOperator::OperatorLt,
        Operator::Lte => ProtoOperator::OperatorLte,
        Operator::Gt => ProtoOperator::OperatorGt,
        Operator::Gte => ProtoOperator::OperatorGte,
        Operator::Prefix => ProtoOperator::OperatorPrefix,
        Operator::Suffix => ProtoOperator::OperatorSuffix,
        Operator::In => ProtoOperator::OperatorIn,
        Operator::IsNull => ProtoOperator::OperatorIsNull,
        Operator::Exists => ProtoOperator::OperatorExists,
    }
}

fn operator_from_proto(op: ProtoOperator) -> Operator {
    match op {
        ProtoOperator::OperatorEq | ProtoOperator::OperatorUnspecified => Operator::Eq,
        ProtoOperator::OperatorNeq => Operator::Neq,
        ProtoOperator::OperatorLt => Operator::Lt,
        ProtoOperator::OperatorLte => Operator::Lte,
        ProtoOperator::OperatorGt => Operator::Gt,
        ProtoOperator::OperatorGte => Operator::Gte,
        ProtoOperator::OperatorPrefix => Operator::Prefix,
        ProtoOperator::OperatorSuffix => Operator::Suffix,
        ProtoOperator::OperatorIn => Operator::In,
        ProtoOperator::OperatorIsNull => Operator::IsNull,
        ProtoOperator::OperatorExists => Operator::Exists,
    }
}

fn policy_to_proto(p: FieldPolicy) -> ProtoFieldPolicy {
    match p {
        FieldPolicy::Skip => ProtoFieldPolicy::FieldPolicySkip,
        FieldPolicy::Match => ProtoFieldPolicy::FieldPolicyMatch,
        FieldPolicy::Error => ProtoFieldPolicy::FieldPolicyError,
    }
}

fn policy_from_proto(p: ProtoFieldPolicy) -> FieldPolicy {
    match p {
        ProtoFieldPolicy::FieldPolicySkip => FieldPolicy::Skip,
        ProtoFieldPolicy::FieldPolicyMatch => FieldPolicy::Match,
        ProtoFieldPolicy::FieldPolicyError => FieldPolicy::Error,
    }
}

fn scalar_to_json(v: &serde_json::Value) -> ScalarValue {
    let kind = match v {
        serde_json::Value::Bool(b) => scalar_value::Kind::Boolean(*b),
        serde_json::Value::Number(n) => scalar_value::Kind::Numeric(n.as_f64().unwrap_or(0.0)),
        other => scalar_value::Kind::Text(
            other.as_str().map(str::to_string).unwrap_or_else(|| other.to_string()),
        ),
    };
    ScalarValue { kind: Some(kind) }
}

fn scalar_from_json(v: &ScalarValue) -> Result<serde_json::Value, ConvertError> {
    match &v.kind {
        Some(scalar_value::Kind::Numeric(n)) => Ok(serde_json::json!(n)),
        Some(scalar_value::Kind::Text(t)) => Ok(serde_json::Value::String(t.clone())),
        Some(scalar_value::Kind::Boolean(b)) => Ok(serde_json::Value::Bool(*b)),
        None => Err(ConvertError::MalformedScalar),
    }
}

fn condition_to_proto(condition: &Condition) -> ProtoCondition {
    use proto::condition::Comparand as ProtoComparandOneof;

    let comparand = condition.comparand.as_ref().map(|c| match c {
        Comparand::Value(v) => ProtoComparandOneof::Value(scalar_to_json(v)),
        Comparand::Values(vs) => ProtoComparandOneof::Values(ScalarValueList {
            values: vs.iter().map(scalar_to_json).collect(),
        }),
        Comparand::FieldRef(path) => ProtoComparandOneof::FieldRef(field_path_to_proto(path)),
    });

    ProtoCondition {
        field: Some(field_path_to_proto(&condition.field)),
        field_type: field_type_to_proto(condition.field_type) as i32,
        op: operator_to_proto(condition.op) as i32,
        comparand,
        on_missing_field: policy_to_proto(condition.on_missing_field) as i32,
        on_coercion_fail: policy_to_proto(condition.on_coercion_fail) as i32,
    }
}

fn condition_from_proto(condition: &ProtoCondition) -> Result<Condition, ConvertError> {
    use proto::condition::Comparand as ProtoComparandOneof;

    let comparand = match &condition.comparand {
        Some(ProtoComparandOneof::Value(v)) => Some(Comparand::Value(scalar_from_json(v)?)),
        Some(ProtoComparandOneof::Values(vs)) => Some(Comparand::Values(
            vs.values.iter().map(scalar_from_json).collect::<Result<_, _>>()?,
        )),
        Some(ProtoComparandOneof::FieldRef(path)) => {
            Some(Comparand::FieldRef(field_path_from_proto(path)))
        }
        None => None,
    };

    Ok(Condition {
        field: condition
            .field
            .as_ref()
            .map(field_path_from_proto)
            .unwrap_or_default(),
        field_type: field_type_from_proto(ProtoFieldType::try_from(condition.field_type).unwrap_or_default()),
        op: operator_from_proto(ProtoOperator::try_from(condition.op).unwrap_or_default()),
        comparand,
        on_missing_field: policy_from_proto(
            ProtoFieldPolicy::try_from(condition.on_missing_field).unwrap_or_default(),
        ),
        on_coercion_fail: policy_from_proto(
            ProtoFieldPolicy::try_from(condition.on_coercion_fail).unwrap_or_default(),
        ),
    })
}

fn or_group_to_proto(group: &OrGroup, group_index: usize) -> ProtoOrGroup {
    ProtoOrGroup {
        group_index: group_index as u32,
        conditions: group.conditions.iter().map(condition_to_proto).collect(),
    }
}

fn or_group_from_proto(group: &ProtoOrGroup) -> Result<OrGroup, ConvertError> {
    Ok(OrGroup {
        conditions: group
            .conditions
            .iter()
            .map(condition_from_proto)
            .collect::<Result<_, _>>()?,
    })
}

pub fn rule_to_proto(rule: &Rule) -> ProtoRule {
    let action = match rule.action {
        Action::Observe => RuleAction::RuleActionObserve,
        Action::Drop => RuleAction::RuleActionDrop,
        Action::Error => RuleAction::RuleActionError,
    };
    let state = match rule.state {
        RuleState::Draft => ProtoRuleState::RuleStateDraft,
        RuleState::Active => ProtoRuleState::RuleStateActive,
        RuleState::Disabled => ProtoRuleState::RuleStateDisabled,
    };

    ProtoRule {
        id: rule.id.to_string(),
        name: rule.name.clone(),
        description: rule.description.clone(),
        state: state as i32,
        action: action as i32,
        sample_rate: rule.sample_rate,
        scope_tags: rule.scope_tags.iter().cloned().collect(),
        or_groups: rule
            .body
            .groups
            .iter()
            .enumerate()
            .map(|(i, g)| or_group_to_proto(g, i))
            .collect(),
        created_at: Some(rule.created_at.to_proto()),
        modified_at: Some(rule.modified_at.to_proto()),
    }
}

pub fn rule_from_proto(rule: &ProtoRule) -> Result<Rule, ConvertError> {
    let id = rule
        .id
        .parse::<uuid::Uuid>()
        .map(RuleId::new)
        .map_err(|_| ConvertError::InvalidId(rule.id.clone()))?;

    let action = match RuleAction::try_from(rule.action).unwrap_or(RuleAction::RuleActionObserve) {
        RuleAction::RuleActionDrop => Action::Drop,
        RuleAction::RuleActionError => Action::Error,
        RuleAction::RuleActionObserve => Action::Observe,
    };
    let state = match ProtoRuleState::try_from(rule.state).unwrap_or(ProtoRuleState::RuleStateDraft)
    {
        ProtoRuleState::RuleStateActive => RuleState::Active,
        ProtoRuleState::RuleStateDisabled => RuleState::Disabled,
        ProtoRuleState::RuleStateDraft => RuleState::Draft,
    };

    let groups = rule
        .or_groups
        .iter()
        .map(or_group_from_proto)
        .collect::<Result<_, _>>()?;

    let created_at = rule
        .created_at
        .as_ref()
        .map(DateTime::<Utc>::from_proto)
        .unwrap_or_else(Utc::now);
    let modified_at = rule
        .modified_at
        .as_ref()
        .map(DateTime::<Utc>::from_proto)
        .unwrap_or(created_at);

    Ok(Rule {
        id,
        name: rule.name.clone(),
        description: rule.description.clone(),
        action,
        sample_rate: rule.sample_rate,
        scope_tags: rule.scope_tags.iter().cloned().collect::<BTreeSet<_>>(),
        state,
        body: RuleBody { groups },
        created_at,
        modified_at,
        deleted_at: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tk_core::rule::{Action, Comparand, FieldType, Operator, RuleState};

    fn sample_rule() -> Rule {
        let now = Utc::now();
        Rule {
            id: RuleId::now_v7(),
            name: "high temp".into(),
            description: String::new(),
            action: Action::Observe,
            sample_rate: 1.0,
            scope_tags: ["prod".to_string()].into_iter().collect(),
            state: RuleState::Active,
            body: RuleBody {
                groups: vec![OrGroup {
                    conditions: vec![Condition {
                        field: FieldPath::new(vec![Segment::Key("temp".into())]),
                        field_type: FieldType::Numeric,
                        op: Operator::Gt,
                        comparand: Some(Comparand::Value(serde_json::json!(100.0))),
                        on_missing_field: FieldPolicy::Skip,
                        on_coercion_fail: FieldPolicy::Skip,
                    }],
                }],
            },
            created_at: now,
            modified_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn rule_round_trips_through_proto() {
        let original = sample_rule();
        let proto = rule_to_proto(&original);
        let restored = rule_from_proto(&proto).unwrap();

        assert_eq!(restored.id, original.id);
        assert_eq!(restored.name, original.name);
        assert_eq!(restored.body, original.body);
        assert_eq!(restored.scope_tags, original.scope_tags);
    }

    #[test]
    fn timestamp_round_trips_to_the_second() {
        let now = Utc::now();
        let proto = now.to_proto();
        let restored = DateTime::<Utc>::from_proto(&proto);
        assert_eq!(now.timestamp(), restored.timestamp());
    }
}
