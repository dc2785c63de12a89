// Copyright 2025 the Plinth Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use kurbo::{Point, Rect, Size};
use plinth_scene::{Node, NodeId, NodeKind, Scene};

/// A level with `n` × `n` one-meter boxes on a two-meter pitch.
fn furnished(n: usize) -> (Scene, NodeId) {
    let mut scene = Scene::new();
    let _ = scene
        .create(Node::new(NodeKind::Building {}), None)
        .expect("building");
    let level = scene
        .create(Node::new(NodeKind::level(0.0)), None)
        .expect("level");
    for y in 0..n {
        for x in 0..n {
            let at = Point::new(x as f64 * 2.0, y as f64 * 2.0);
            let _ = scene
                .create(
                    Node::new(NodeKind::item("box", at, Size::new(1.0, 1.0))),
                    Some(&level),
                )
                .expect("item");
        }
    }
    (scene, level)
}

fn bench_can_place(c: &mut Criterion) {
    let mut group = c.benchmark_group("can_place_item");
    for &n in &[8usize, 16, 32] {
        let (scene, level) = furnished(n);
        group.bench_function(format!("sweep_n{n}"), |b| {
            b.iter(|| {
                let mut free = 0;
                for step in 0..(n * 4) {
                    let x = step as f64 * 0.5;
                    let candidate = Rect::new(x, x, x + 1.0, x + 1.0);
                    if scene.can_place_item(&level, candidate, None) {
                        free += 1;
                    }
                }
                black_box(free);
            });
        });
    }
    group.finish();
}

fn bench_build(c: &mut Criterion) {
    c.bench_function("build_and_index_32x32", |b| {
        b.iter(|| black_box(furnished(32).0.len()));
    });
}

criterion_group!(benches, bench_can_place, bench_build);
criterion_main!(benches);
