//! Benchmarks for error location and command construction.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tesslaflow::config::ToolchainConfig;
use tesslaflow::core::ProjectContext;
use tesslaflow::diagnostics::extract_spec_error;
use tesslaflow::stages::{CompileSpecification, RunBinary, Stage, StageContext};

fn spec_error_benchmark(c: &mut Criterion) {
    let noise = "warning: unused definition\n".repeat(200);
    let blob = format!("{noise}ParserError((12, 4 - 12, 19): unexpected token ')')\n");

    c.bench_function("extract_spec_error", |b| {
        b.iter(|| extract_spec_error(black_box(&blob)));
    });
    c.bench_function("extract_spec_error_no_match", |b| {
        b.iter(|| extract_spec_error(black_box(&noise)));
    });
}

fn command_benchmark(c: &mut Criterion) {
    let project = ProjectContext::from_root("/work/demo project");
    let config = ToolchainConfig::default().with_docker(true);
    let ctx = StageContext::new(&project, &config);

    c.bench_function("plan_run_binary_containerized", |b| {
        b.iter(|| RunBinary.plan(black_box(&ctx)).map(|plan| plan.command.to_string()));
    });
    c.bench_function("plan_compile_spec_missing_input", |b| {
        b.iter(|| CompileSpecification.plan(black_box(&ctx)).is_err());
    });
}

criterion_group!(benches, spec_error_benchmark, command_benchmark);
criterion_main!(benches);
