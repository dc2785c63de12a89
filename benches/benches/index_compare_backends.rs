// Copyright 2025 the Plinth Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use plinth_index::{Aabb2D, Index};

/// Furniture-sized footprints laid out on a regular floor plan.
fn gen_floor_rects(n: usize, pitch: f64, size: f64) -> Vec<Aabb2D<f64>> {
    let mut out = Vec::with_capacity(n * n);
    for y in 0..n {
        for x in 0..n {
            out.push(Aabb2D::<f64>::from_xywh(
                x as f64 * pitch,
                y as f64 * pitch,
                size,
                size,
            ));
        }
    }
    out
}

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_f64(&mut self) -> f64 {
        let v = self.next_u64() >> 11;
        (v as f64) / ((1u64 << 53) as f64)
    }
}

/// Items scattered over a `extent` × `extent` floor, clustered into rooms.
fn gen_room_rects(rooms: usize, per_room: usize, extent: f64) -> Vec<Aabb2D<f64>> {
    let mut rng = Rng::new(0x9E37_79B9_7F4A_7C15);
    let mut out = Vec::with_capacity(rooms * per_room);
    for _ in 0..rooms {
        let cx = rng.next_f64() * extent;
        let cy = rng.next_f64() * extent;
        for _ in 0..per_room {
            let w = 0.5 + rng.next_f64() * 2.0;
            let h = 0.5 + rng.next_f64() * 2.0;
            let x = cx + (rng.next_f64() - 0.5) * 8.0;
            let y = cy + (rng.next_f64() - 0.5) * 8.0;
            out.push(Aabb2D::<f64>::from_xywh(x, y, w, h));
        }
    }
    out
}

fn bench_insert_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_query");
    for &n in &[16usize, 32, 64] {
        let rects = gen_floor_rects(n, 3.0, 2.0);
        group.throughput(Throughput::Elements((n * n) as u64));
        group.bench_function(format!("flatvec_n{n}"), |b| {
            b.iter_batched(
                Index::<f64, u32>::new,
                |mut idx| {
                    for (i, r) in rects.iter().copied().enumerate() {
                        let _ = idx.insert(r, i as u32);
                    }
                    let hits = idx
                        .query_rect(Aabb2D::<f64>::from_xywh(10.0, 10.0, 12.0, 12.0))
                        .count();
                    black_box(hits);
                },
                BatchSize::SmallInput,
            );
        });
        group.bench_function(format!("grid_n{n}"), |b| {
            b.iter_batched(
                || Index::<f64, u32>::with_uniform_grid(4.0, 4.0),
                |mut idx| {
                    for (i, r) in rects.iter().copied().enumerate() {
                        let _ = idx.insert(r, i as u32);
                    }
                    let hits = idx
                        .query_rect(Aabb2D::<f64>::from_xywh(10.0, 10.0, 12.0, 12.0))
                        .count();
                    black_box(hits);
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_drag(c: &mut Criterion) {
    // One item follows the pointer: update then query its neighborhood, many times.
    let mut group = c.benchmark_group("drag_update_query");
    let rects = gen_room_rects(24, 40, 200.0);
    let flat = || {
        let mut idx = Index::<f64, u32>::new();
        idx.reserve(rects.len());
        let keys: Vec<_> = rects
            .iter()
            .copied()
            .enumerate()
            .map(|(i, r)| idx.insert(r, i as u32))
            .collect();
        (idx, keys)
    };
    let grid = || {
        let mut idx = Index::<f64, u32>::with_uniform_grid(4.0, 4.0);
        idx.reserve(rects.len());
        let keys: Vec<_> = rects
            .iter()
            .copied()
            .enumerate()
            .map(|(i, r)| idx.insert(r, i as u32))
            .collect();
        (idx, keys)
    };
    group.bench_function("flatvec", |b| {
        b.iter_batched(
            flat,
            |(mut idx, keys)| {
                let mut total = 0;
                for step in 0..256 {
                    let r = Aabb2D::<f64>::from_xywh(step as f64 * 0.5, 100.0, 1.0, 1.0);
                    idx.update(keys[0], r);
                    total += idx.query_rect(r).count();
                }
                black_box(total);
            },
            BatchSize::SmallInput,
        );
    });
    group.bench_function("grid", |b| {
        b.iter_batched(
            grid,
            |(mut idx, keys)| {
                let mut total = 0;
                for step in 0..256 {
                    let r = Aabb2D::<f64>::from_xywh(step as f64 * 0.5, 100.0, 1.0, 1.0);
                    idx.update(keys[0], r);
                    total += idx.query_rect(r).count();
                }
                black_box(total);
            },
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_insert_query, bench_drag);
criterion_main!(benches);
