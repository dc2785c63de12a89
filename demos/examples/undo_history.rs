// Copyright 2025 the Plinth Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Undo history.
//!
//! Add, group and ungroup furniture through the history, then walk it back and forth.
//!
//! Run:
//! - `cargo run -p plinth_demos --example undo_history`

use kurbo::{Point, Size};
use plinth_history::{AddNode, GroupNodes, History, UngroupNodes, UpdateNode};
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
    let mut history = History::for_scene(&scene);

    let mut ids = Vec::new();
    for (model, x) in [("table", 1.0), ("chair", 4.0)] {
        let add = AddNode::new(
            Node::new(NodeKind::item(model, Point::new(x, 1.0), Size::new(1.0, 1.0))),
            Some(level.clone()),
        );
        ids.push(add.id().clone());
        history.execute(&mut scene, add).unwrap();
    }
    let initial = scene.to_document();

    let group = GroupNodes::new(ids.clone());
    let g = group.group_id().clone();
    history.execute(&mut scene, group).unwrap();
    history
        .execute(&mut scene, UpdateNode::new(g.clone(), NodePatch::new().rotation(0.5)))
        .unwrap();
    history.execute(&mut scene, UngroupNodes::new(g)).unwrap();
    for id in &ids {
        println!("{id} now at {:?}", scene.absolute_frame(id));
    }

    // Back to the two loose items.
    for _ in 0..3 {
        println!("undo {:?}", history.undo_label());
        history.undo(&mut scene);
    }
    assert_eq!(scene.to_document(), initial);

    while history.can_redo() {
        println!("redo {:?}", history.redo_label());
        history.redo(&mut scene);
    }
    println!("undo depth {}", history.undo_depth());
}
