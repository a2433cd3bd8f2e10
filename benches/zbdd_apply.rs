//! Apply/minimize hot-path benchmarks over synthetic fault trees.
//!
//! Run with:
//! ```bash
//! cargo bench --bench zbdd_apply
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use cutset_rs::graph::{FaultTree, GateType};
use cutset_rs::preprocessor::Preprocessor;
use cutset_rs::settings::Settings;
use cutset_rs::zbdd::Zbdd;

/// A layered OR-of-ANDs tree: `width` AND gates of `size` events each,
/// with every adjacent pair sharing one event so that the tree is not
/// trivially modular.
fn layered_tree(width: usize, size: usize) -> FaultTree {
    let mut tree = FaultTree::new();
    let events: Vec<u32> = (0..width * size).map(|_| tree.add_variable()).collect();
    let root = tree.add_gate(GateType::Or);
    for i in 0..width {
        let and = tree.add_gate(GateType::And);
        for j in 0..size {
            // Overlap: the first event of each gate is the last of the
            // previous one.
            let index = (i * size + j).saturating_sub(i.min(1));
            tree.add_arg(and, events[index] as i32).unwrap();
        }
        tree.add_arg(root, and as i32).unwrap();
    }
    tree.set_root(root);
    tree
}

fn bench_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("zbdd_analysis");
    for width in [8usize, 16, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            b.iter(|| {
                let mut tree = layered_tree(width, 4);
                Preprocessor::new(&mut tree).process();
                let mut zbdd = Zbdd::from_graph(&tree, &Settings::default());
                zbdd.analyze();
                zbdd.cut_sets().len()
            });
        });
    }
    group.finish();
}

fn bench_preprocessing(c: &mut Criterion) {
    c.bench_function("preprocess_atleast", |b| {
        b.iter(|| {
            let mut tree = FaultTree::new();
            let events: Vec<u32> = (0..8).map(|_| tree.add_variable()).collect();
            let root = tree.add_atleast_gate(3).unwrap();
            for &event in &events {
                tree.add_arg(root, event as i32).unwrap();
            }
            tree.set_root(root);
            Preprocessor::new(&mut tree).process();
            tree.root()
        });
    });
}

criterion_group!(benches, bench_analysis, bench_preprocessing);
criterion_main!(benches);
