use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::json;
use std::hint::black_box;
use std::collections::BTreeSet;
use tk_core::{
    compile, evaluate_rule, Action, Comparand, Condition, EntityIdType, FieldPolicy, FieldType,
    Operator, OrGroup, RandomSource, Rule, RuleBody, RuleId, RuleState, SecureRandomSource,
    Segment,
};
use tk_core::path::FieldPath;

fn wildcard_rule() -> Rule {
    let now = chrono::Utc::now();
    Rule {
        id: RuleId::now_v7(),
        name: "bench rule".into(),
        description: String::new(),
        action: Action::Observe,
        sample_rate: 1.0,
        scope_tags: BTreeSet::new(),
        state: RuleState::Active,
        body: RuleBody {
            groups: vec![OrGroup {
                conditions: vec![Condition {
                    field: FieldPath::new(vec![
                        Segment::Key("readings".into()),
                        Segment::Wildcard,
                        Segment::Key("temp".into()),
                    ]),
                    field_type: FieldType::Numeric,
                    op: Operator::Gt,
                    comparand: Some(Comparand::Value(json!(100))),
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

fn bench_evaluate(c: &mut Criterion) {
    let rule = wildcard_rule();
    let (compiled, _) = compile(&rule).expect("compile bench rule");
    let record = json!({"readings": (0..20).map(|i| json!({"temp": i * 10})).collect::<Vec<_>>()});
    let mut rng = SecureRandomSource;

    c.bench_function("eval/wildcard_short_circuit", |b| {
        b.iter(|| {
            let result = evaluate_rule(&compiled, black_box(&record), &mut rng).expect("evaluate");
            black_box(result);
        });
    });
}

criterion_group!(benches, bench_evaluate);
criterion_main!(benches);
