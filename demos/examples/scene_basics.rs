// Copyright 2025 the Plinth Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene basics.
//!
//! Build a small floor plan, check where a new item may go, and save it as JSON.
//!
//! Run:
//! - `cargo run -p plinth_demos --example scene_basics`

use kurbo::{Point, Rect, Size};
use plinth_scene::{
    AttachmentMode, CatalogItem, Node, NodeKind, Scene, SceneConfig, WallFixture, snap_to_grid,
};
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
    let wall = scene
        .create(
            Node::new(NodeKind::wall(Point::ORIGIN, Point::new(8.0, 0.0))),
            Some(&level),
        )
        .unwrap();
    let sofa = scene
        .create(
            Node::new(NodeKind::item("sofa", Point::new(2.0, 3.0), Size::new(2.0, 1.0)))
                .with_name("Sofa"),
            Some(&level),
        )
        .unwrap();

    // Snap a pointer to the tile grid and preview a chair there.
    let pointer = snap_to_grid(Point::new(3.2, 3.4), scene.config().tile_size);
    let chair = CatalogItem {
        model: "chair".into(),
        size: Size::new(1.0, 1.0),
        attach_to: AttachmentMode::Free,
    };
    let preview = scene
        .create(chair.preview_at(pointer, 0.0, None), Some(&level))
        .unwrap();
    let ok = scene.evaluate_placement(&preview);
    println!("chair at {pointer:?}: can place = {ok:?}");
    assert_eq!(ok, Some(false), "the chair overlaps the sofa");
    scene.delete_node(&preview);

    // Free floor next to the sofa.
    assert!(scene.can_place_item(&level, Rect::new(4.0, 3.0, 5.0, 4.0), None));
    println!(
        "items near the sofa: {:?}",
        scene.query(&level, Rect::new(1.0, 2.0, 5.0, 5.0))
    );

    // A door along the wall, clear of the wall ends.
    let door = WallFixture::new(3.0, 1.0);
    println!(
        "door at 3 m on the wall: {}",
        scene.can_place_on_wall(&wall, door, None)
    );

    let json = scene.to_json_pretty().unwrap();
    let back = Scene::from_json_str(&json, SceneConfig::default()).unwrap();
    assert_eq!(back.to_document(), scene.to_document());
    assert!(back.contains(&sofa));
    println!("{json}");
}
