// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Geometry and scene fixtures.

use repulsor_port::{
    DVec3, EntityBlueprint, MeshGeometry, SceneDefinition, ALL_OTHER_SOURCES,
};

/// Unit right triangle in the XY plane.
pub fn triangle() -> MeshGeometry {
    MeshGeometry::new(
        vec![DVec3::ZERO, DVec3::X, DVec3::Y],
        vec![[0, 1, 2]],
    )
}

/// Closed tetrahedron with outward-facing triangles.
pub fn tetrahedron() -> MeshGeometry {
    MeshGeometry::new(
        vec![DVec3::ZERO, DVec3::X, DVec3::Y, DVec3::Z],
        vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
    )
}

/// `geometry` with every vertex moved by `offset`.
pub fn translated(mut geometry: MeshGeometry, offset: DVec3) -> MeshGeometry {
    for v in &mut geometry.vertices {
        *v += offset;
    }
    geometry
}

/// Interactive simulated tetrahedron `mover` (id 0) avoiding every other
/// source, plus a static obstacle-source triangle `wall` (id 1) at z = 2.
pub fn mover_and_wall() -> SceneDefinition {
    SceneDefinition::new("mover-and-wall")
        .with_entity(
            EntityBlueprint::new(0, "mover", tetrahedron())
                .interactive()
                .simulated()
                .with_obstacles([ALL_OTHER_SOURCES]),
        )
        .with_entity(
            EntityBlueprint::new(1, "wall", translated(triangle(), DVec3::new(0.0, 0.0, 2.0)))
                .obstacle_source(),
        )
}

/// Three interactive, simulated obstacle-source triangles (ids 0, 1, 2)
/// spaced along X, each avoiding all the others.
pub fn trio_all_simulated() -> SceneDefinition {
    (0..3).fold(SceneDefinition::new("trio"), |scene, i| {
        let offset = DVec3::new(3.0 * f64::from(i), 0.0, 0.0);
        scene.with_entity(
            EntityBlueprint::new(i, format!("body{i}"), translated(triangle(), offset))
                .interactive()
                .simulated()
                .obstacle_source()
                .with_obstacles([ALL_OTHER_SOURCES]),
        )
    })
}
