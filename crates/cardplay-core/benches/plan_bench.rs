//! Benchmarks for plan compilation and window evaluation.
//!
//! Run with: `cargo bench -p cardplay-core`

#![allow(missing_docs)]

use cardplay_core::{
    CardCategory, CardDefinition, CardError, Compiler, Event, Executor, ExecutorConfig, Graph,
    GraphNode, PortSpec, PortTypeDef, ProcessContext, RegistrySet, RuntimeValue, TickWindow,
    TransportState, ValueKind, topo_order,
};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

fn pulse(ctx: &mut ProcessContext<'_>) -> Result<(), CardError> {
    let step = ctx.transport.ticks_per_division(4);
    let mut tick = (ctx.window.from + step - 1).div_euclid(step) * step;
    let mut events = Vec::new();
    while tick < ctx.window.to {
        events.push(Event::note(format!("{}#{tick}", ctx.node), tick, step, 60, 100));
        tick += step;
    }
    ctx.set_output("out", RuntimeValue::EventStream(events));
    Ok(())
}

fn pass(ctx: &mut ProcessContext<'_>) -> Result<(), CardError> {
    let events = ctx.events("in").to_vec();
    ctx.set_output("out", RuntimeValue::EventStream(events));
    Ok(())
}

fn registries() -> RegistrySet {
    let mut set = RegistrySet::new();
    set.register_port_type(PortTypeDef::new("notes", ValueKind::EventStream))
        .unwrap();
    set.register_card(
        CardDefinition::new("pulse", CardCategory::Generator, pulse).output(PortSpec::new("out", "notes")),
    )
    .unwrap();
    set.register_card(
        CardDefinition::new("pass", CardCategory::Transform, pass)
            .input(PortSpec::new("in", "notes"))
            .output(PortSpec::new("out", "notes")),
    )
    .unwrap();
    set
}

/// A pulse generator followed by `len` pass-through cards.
fn chain(len: usize) -> Graph {
    let mut g = Graph::new();
    g.add_node(GraphNode::new("gen", "pulse")).unwrap();
    let mut prev = "gen".to_string();
    for i in 0..len {
        let id = format!("p{i:04}");
        g.add_node(GraphNode::new(id.as_str(), "pass")).unwrap();
        g.connect(&prev, "out", &id, "in");
        prev = id;
    }
    g
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

fn bench_compile(c: &mut Criterion) {
    let regs = registries();
    let mut group = c.benchmark_group("plan/compile");
    for len in [16, 128, 1024] {
        let graph = chain(len);
        group.bench_with_input(BenchmarkId::new("topo", len), &graph, |b, g| {
            b.iter(|| black_box(topo_order(g, &regs)));
        });
        group.bench_with_input(BenchmarkId::new("cached", len), &graph, |b, g| {
            let mut compiler = Compiler::new();
            b.iter(|| black_box(compiler.compile(g, &regs)));
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

fn bench_evaluate(c: &mut Criterion) {
    let regs = registries();
    let transport = TransportState::default();
    let mut group = c.benchmark_group("plan/evaluate");
    for len in [16, 128] {
        let graph = chain(len);
        let plan = Compiler::new().compile(&graph, &regs);
        group.bench_with_input(BenchmarkId::new("one_beat", len), &graph, |b, g| {
            let mut executor = Executor::new(ExecutorConfig::default());
            let mut from = 0;
            b.iter(|| {
                let window = TickWindow::new(from, from + 96);
                from += 96;
                black_box(executor.evaluate(&plan, g, &regs, window, &transport).unwrap())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile, bench_evaluate);
criterion_main!(benches);
