use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flowlang_core::builder::build;
use flowlang_core::lexer::tokenize;
use flowlang_core::parser::parse;
use flowlang_core::selection::select_edge;
use flowlang_core::validator::validate;

const LINEAR_PIPELINE: &str = r#"
digraph G {
    goal = "benchmark pipeline";
    start [shape=Mdiamond];
    fetch [shape=box, max_retries=2];
    transform [shape=box];
    check [shape=diamond];
    publish [shape=box];
    end [shape=Msquare];
    start -> fetch -> transform -> check;
    check -> publish [condition="outcome=success"];
    check -> transform [condition="outcome=retry"];
    publish -> end;
}
"#;

fn compile_benchmark(c: &mut Criterion) {
    c.bench_function("lex+parse+build+validate linear pipeline", |b| {
        b.iter(|| {
            let tokens = tokenize(black_box(LINEAR_PIPELINE)).unwrap();
            let ast = parse(&tokens).unwrap();
            let graph = build(&ast).unwrap();
            black_box(validate(&graph));
        });
    });
}

fn edge_selection_benchmark(c: &mut Criterion) {
    let tokens = tokenize(LINEAR_PIPELINE).unwrap();
    let ast = parse(&tokens).unwrap();
    let graph = build(&ast).unwrap();
    let edges = graph.outgoing_edges("check");

    c.bench_function("select_edge over a branching node", |b| {
        b.iter(|| {
            let outcome = flowlang_core::graph::Outcome::success();
            black_box(select_edge(black_box(&edges), &outcome, &std::collections::HashMap::new()));
        });
    });
}

criterion_group!(benches, compile_benchmark, edge_selection_benchmark);
criterion_main!(benches);
