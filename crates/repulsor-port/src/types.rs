// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Core value types shared by every port.

use core::fmt;

use glam::DVec3;

/// Triangle given as three vertex indices into the owning vertex buffer.
pub type Simplex = [u32; 3];

/// Scene-stable entity identifier.
///
/// Blueprint ids are non-negative; `-1` only ever appears inside obstacle
/// dependency lists as [`crate::ALL_OTHER_SOURCES`].
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct EntityId(pub i32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-vertex vector quantities the viewer can display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VectorField {
    /// First-order energy sensitivity.
    Differential,
    /// Metric-preconditioned descent direction.
    Gradient,
}

impl VectorField {
    /// Name under which the field is attached to a viewer structure.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Differential => "Differential",
            Self::Gradient => "Gradient",
        }
    }
}

impl fmt::Display for VectorField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Triangle mesh geometry: vertex positions plus index triples.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeshGeometry {
    /// Vertex positions.
    pub vertices: Vec<DVec3>,
    /// Triangles indexing into `vertices`.
    pub simplices: Vec<Simplex>,
}

impl MeshGeometry {
    /// Creates geometry from its parts.
    pub fn new(vertices: Vec<DVec3>, simplices: Vec<Simplex>) -> Self {
        Self {
            vertices,
            simplices,
        }
    }

    /// True when there is nothing to build a mesh from.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.simplices.is_empty()
    }

    /// Returns the first simplex referencing a vertex outside the buffer.
    pub fn first_out_of_range(&self) -> Option<(usize, Simplex)> {
        let count = self.vertices.len();
        self.simplices
            .iter()
            .enumerate()
            .find(|(_, s)| s.iter().any(|&i| i as usize >= count))
            .map(|(at, s)| (at, *s))
    }
}
