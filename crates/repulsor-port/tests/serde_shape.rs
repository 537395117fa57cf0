// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use repulsor_port::{Axis, EngineSettings, EntityId, SceneDefinition};

#[test]
fn scene_json_fills_missing_fields_with_defaults() {
    let json = r#"{
        "name": "minimal",
        "entities": [
            { "id": 4, "base_name": "sphere", "simulated": true, "obstacle_ids": [-1],
              "geometry": { "vertices": [[0,0,0],[1,0,0],[0,1,0]], "simplices": [[0,1,2]] } }
        ]
    }"#;
    let scene: SceneDefinition = serde_json::from_str(json).unwrap();
    let e = &scene.entities[0];
    assert_eq!(e.id, EntityId(4));
    assert!(e.simulated && !e.interactive && !e.obstacle_source);
    assert_eq!(e.geometry.vertices.len(), 3);
    assert_eq!(e.transform, repulsor_port::DMat4::IDENTITY);
    assert_eq!(scene.camera.up, Axis::PosY);
}

#[test]
fn engine_settings_accept_partial_objects() {
    let s: EngineSettings = serde_json::from_str(r#"{ "thread_count": 0 }"#).unwrap();
    assert_eq!(s.thread_count, 0);
    assert_eq!(s.effective_thread_count(), 1);
    assert!((s.tree.theta - 10.0).abs() < f64::EPSILON);
    assert!((s.exponents.p - 12.0).abs() < f64::EPSILON);
}

#[test]
fn axis_uses_snake_case_names() {
    let text = serde_json::to_string(&Axis::NegZ).unwrap();
    assert_eq!(text, "\"neg_z\"");
}
