use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rfa::attr::{AttrValue, NameAttrList};
use rfa::function::FunctionDef;
use rfa::graph::{Graph, NodeDef};
use rfa::library::FunctionLibrary;
use rfa::plan::plan_inputs;
use rfa::types::DataType::{self, Float, Resource};
use rfa::{PassOptions, RearrangePass};

// Synthetic programs: a chain of `depth` functions, each calling the next
// with interleaved resource and value arguments, fanned out `width` times
// per level.

fn types(ts: &[DataType]) -> AttrValue {
    AttrValue::TypeList(ts.to_vec())
}

fn level_name(level: usize) -> String {
    format!("level{}", level)
}

fn level_function(level: usize, depth: usize, width: usize) -> FunctionDef {
    let mut nodes = vec![
        NodeDef::arg("v", 0, Resource),
        NodeDef::arg("x", 1, Float),
        NodeDef::arg("w", 2, Resource),
        NodeDef::arg("y", 3, Float),
    ];
    if level + 1 < depth {
        for i in 0..width {
            nodes.push(
                NodeDef::new(format!("call{}", i), "StatefulPartitionedCall")
                    .with_attr("Tin", types(&[Resource, Float, Resource, Float]))
                    .with_attr("Tout", types(&[Float]))
                    .with_attr(
                        "f",
                        AttrValue::Func(NameAttrList::new(level_name(level + 1))),
                    )
                    .with_input("v")
                    .with_input("x")
                    .with_input("w")
                    .with_input("y"),
            );
        }
        nodes.push(NodeDef::retval("r", 0, Float, "call0"));
    } else {
        nodes.push(NodeDef::new("sum", "AddV2").with_input("x").with_input("y"));
        nodes.push(NodeDef::retval("r", 0, Float, "sum"));
    }
    FunctionDef::from_nodes(level_name(level), nodes).unwrap()
}

fn synthetic_program(depth: usize, width: usize) -> (Graph, FunctionLibrary) {
    let library =
        FunctionLibrary::from_defs((0..depth).map(|l| level_function(l, depth, width))).unwrap();
    let graph = Graph::from_node_defs(&[NodeDef::new("launch", "XlaLaunch").with_attr(
        "function",
        AttrValue::Func(NameAttrList::new(level_name(0))),
    )])
    .unwrap();
    (graph, library)
}

// Planner cost vs type-list width.
fn bench_plan_inputs(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan/inputs");

    for width in [4_usize, 16, 64, 256] {
        let list: Vec<DataType> = (0..width)
            .map(|i| if i % 3 == 0 { Resource } else { Float })
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(width), &list, |b, list| {
            b.iter(|| black_box(plan_inputs(black_box(list))));
        });
    }

    group.finish();
}

// Whole-pass latency vs call-chain depth.
fn bench_pass_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("pass/depth");
    let pass = RearrangePass::new(PassOptions::default());

    for depth in [1_usize, 5, 10, 20] {
        let program = synthetic_program(depth, 4);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}levels", depth)),
            &program,
            |b, program| {
                b.iter_batched(
                    || program.clone(),
                    |(mut graph, mut library)| {
                        let report = pass.run(&mut graph, &mut library).unwrap();
                        black_box(report);
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_plan_inputs, bench_pass_scaling);
criterion_main!(benches);
