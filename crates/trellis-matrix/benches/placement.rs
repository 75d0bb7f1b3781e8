//! Placement throughput benchmarks: direct fill vs deep spillover.

use std::sync::Arc;

use chrono::Utc;
use criterion::{Criterion, criterion_group, criterion_main};

use trellis_core::store::MemoryStore;
use trellis_core::traits::MatrixStore;
use trellis_core::types::WalletAddress;
use trellis_matrix::PlacementEngine;

fn wallet(seed: u16) -> WalletAddress {
    let mut bytes = [0u8; 20];
    bytes[18..].copy_from_slice(&seed.to_be_bytes());
    WalletAddress::from_bytes(bytes)
}

/// Fill a tree with `n` members all sponsored by the root, forcing BFS
/// spillover once the first layer is full.
fn fill_under_root(n: u16) {
    let store = Arc::new(MemoryStore::new());
    store.register_root(wallet(0)).unwrap();
    let engine = PlacementEngine::new(store);
    let now = Utc::now();
    for seed in 1..=n {
        engine.place(&wallet(seed), &wallet(0), now).unwrap();
    }
}

fn bench_placement(c: &mut Criterion) {
    c.bench_function("place_100_under_root", |b| {
        b.iter(|| fill_under_root(100));
    });
    c.bench_function("place_500_under_root", |b| {
        b.iter(|| fill_under_root(500));
    });
}

criterion_group!(benches, bench_placement);
criterion_main!(benches);
