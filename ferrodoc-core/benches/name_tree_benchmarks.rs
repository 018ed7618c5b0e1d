//! Name tree benchmarks
//!
//! Measures balanced insertion (sorted and shuffled key order) and lookups
//! on a populated tree.
//!
//! Run with: `cargo bench --bench name_tree_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ferrodoc::objects::{ObjectStore, PdfString};
use ferrodoc::structure::NameTree;

fn keys(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("dest{i:06}")).collect()
}

/// Deterministic permutation so runs are comparable.
fn shuffled(count: usize) -> Vec<String> {
    let mut keys = keys(count);
    let mut state: u64 = 0x2545_F491_4F6C_DD1D;
    for i in (1..keys.len()).rev() {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        keys.swap(i, (state % (i as u64 + 1)) as usize);
    }
    keys
}

fn populate(keys: &[String]) -> (ObjectStore, NameTree) {
    let mut store = ObjectStore::new();
    let tree = NameTree::create(&mut store).expect("allocate");
    for (i, key) in keys.iter().enumerate() {
        tree.add_value(&mut store, key.as_str(), i as i64)
            .expect("insert");
    }
    (store, tree)
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("name_tree_insert");
    for count in [100, 1_000, 10_000] {
        let sorted = keys(count);
        let random = shuffled(count);
        group.bench_with_input(BenchmarkId::new("sorted", count), &sorted, |b, keys| {
            b.iter(|| black_box(populate(keys)))
        });
        group.bench_with_input(BenchmarkId::new("shuffled", count), &random, |b, keys| {
            b.iter(|| black_box(populate(keys)))
        });
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("name_tree_lookup");
    for count in [1_000, 10_000] {
        let (store, tree) = populate(&shuffled(count));
        let probes: Vec<PdfString> = keys(count)
            .into_iter()
            .step_by(97)
            .map(PdfString::from)
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(count), &probes, |b, probes| {
            b.iter(|| {
                for probe in probes {
                    black_box(tree.get_value(&store, probe));
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_insert, bench_lookup);
criterion_main!(benches);
