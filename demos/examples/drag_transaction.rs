// Copyright 2025 the Plinth Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Drag transaction.
//!
//! A pointer drag updates an item on every move; the transaction turns the whole drag
//! into one undo step.
//!
//! Run:
//! - `cargo run -p plinth_demos --example drag_transaction`

use kurbo::{Point, Size};
use plinth_history::History;
use plinth_scene::{Node, NodeKind, NodePatch, Scene};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut scene = Scene::new();
    scene
        .create(Node::new(NodeKind::Building {}), None)
        .unwrap();
    let level = scene.create(Node::new(NodeKind::level(0.0)), None).unwrap();
    let lamp = scene
        .create(
            Node::new(NodeKind::item("lamp", Point::ORIGIN, Size::new(0.5, 0.5))),
            Some(&level),
        )
        .unwrap();
    let changes = std::rc::Rc::new(std::cell::Cell::new(0));
    let seen = changes.clone();
    scene.subscribe(move |_| seen.set(seen.get() + 1));

    let mut history = History::for_scene(&scene);
    history.start_transaction(&mut scene, "Drag lamp");
    for step in 1..=40 {
        let to = Point::new(f64::from(step) * 0.1, f64::from(step) * 0.05);
        if let Some(tx) = history.transaction() {
            tx.update(&mut scene, &lamp, &NodePatch::new().position(to));
        }
    }
    history.commit_transaction(&mut scene);
    println!(
        "{} change notifications, {} undo step(s)",
        changes.get(),
        history.undo_depth()
    );

    history.undo(&mut scene);
    assert_eq!(
        scene.node(&lamp).unwrap().kind.position(),
        Some(Point::ORIGIN)
    );
    history.redo(&mut scene);
    println!("lamp at {:?}", scene.node(&lamp).unwrap().kind.position());
}
