//! Benchmarks the executor's per-step bookkeeping: `$STEPn` substitution and
//! dependency-satisfaction checks run once per step, so their cost scales
//! with plan size the same way the classifier's does.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use hermit::models::{ExecutionContext, Plan, RiskLevel, StepResult};

fn plan_with_chained_steps(n: u32) -> Plan {
    let text = format!(
        r#"{{"description": "chained", "steps": [{}]}}"#,
        (1..=n)
            .map(|id| {
                let deps = if id == 1 {
                    "[]".to_string()
                } else {
                    format!("[{}]", id - 1)
                };
                format!(
                    r#"{{"step_id": {id}, "depends_on": {deps}, "action": {{"action": "run_command", "command": "echo $STEP{}"}}}}"#,
                    id.saturating_sub(1).max(1)
                )
            })
            .collect::<Vec<_>>()
            .join(",")
    );
    serde_json::from_str(&text).expect("benchmark plan is well-formed")
}

fn bench_substitute(c: &mut Criterion) {
    let mut context = ExecutionContext::new();
    for id in 1..=20u32 {
        context.record(StepResult {
            step_id: id,
            command: format!("step {id} command"),
            output: format!("output-of-step-{id}"),
            success: true,
            risk: RiskLevel::Low,
            skipped: false,
            error: None,
        });
    }

    c.bench_function("ExecutionContext::substitute with 20 recorded steps", |b| {
        b.iter(|| black_box(context.substitute(black_box("see $STEP1, $STEP10, and $STEP20"))))
    });
}

fn bench_validate_dependencies(c: &mut Criterion) {
    let plan = plan_with_chained_steps(50);
    c.bench_function("Plan::validate_dependencies 50-step chain", |b| {
        b.iter(|| black_box(plan.validate_dependencies()))
    });
}

criterion_group!(benches, bench_substitute, bench_validate_dependencies);
criterion_main!(benches);
