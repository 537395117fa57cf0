// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Camera pose carried by scene definitions.

use glam::DVec3;

/// Signed coordinate axis used for the viewer's up and front directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum Axis {
    /// +X.
    PosX,
    /// -X.
    NegX,
    /// +Y.
    PosY,
    /// -Y.
    NegY,
    /// +Z.
    PosZ,
    /// -Z.
    NegZ,
}

impl Axis {
    /// Unit vector along the axis.
    pub const fn to_vec3(self) -> DVec3 {
        match self {
            Self::PosX => DVec3::X,
            Self::NegX => DVec3::NEG_X,
            Self::PosY => DVec3::Y,
            Self::NegY => DVec3::NEG_Y,
            Self::PosZ => DVec3::Z,
            Self::NegZ => DVec3::NEG_Z,
        }
    }
}

/// Initial camera placement for a scene.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CameraPose {
    /// Camera position in world space.
    pub position: DVec3,
    /// Look-at target in world space.
    pub target: DVec3,
    /// Viewer up direction.
    pub up: Axis,
    /// Viewer front direction.
    pub front: Axis,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: DVec3::new(0.0, 0.0, 5.0),
            target: DVec3::ZERO,
            up: Axis::PosY,
            front: Axis::NegZ,
        }
    }
}
