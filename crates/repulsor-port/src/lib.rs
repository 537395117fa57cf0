// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Port contract for the Repulsor scene coordinator.
//!
//! This crate defines the boundary between the coordination layer
//! (`repulsor-core`) and the collaborators it drives: the numerical physics
//! engine, the viewer, and whatever provides scene blueprints. It contains no
//! orchestration logic and no serialization format; JSON lives in the adapters.
//!
//! # Design Principles
//!
//! - **Engines are opaque**: meshes and energy objects are associated types
//!   the coordinator owns but never inspects.
//! - **Viewers are dumb**: they receive geometry, vector fields and
//!   highlights keyed by an entity's unique name. No domain logic.
//! - **Every engine call is fallible**: failures come back as
//!   [`EngineError`], never as sentinel values.
//!
//! # Crate Features
//!
//! - `serde`: derives `Serialize`/`Deserialize` for blueprints and parameters.

use thiserror::Error;

/// Error type for physics engine calls.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// The engine refused to build a mesh from the supplied geometry.
    #[error("mesh construction failed: {0}")]
    MeshConstruction(String),
    /// Geometry with no vertices or no simplices was supplied.
    #[error("empty geometry")]
    EmptyGeometry,
    /// The energy/metric parameter object could not be built.
    #[error("energy unavailable: {0}")]
    EnergyUnavailable(String),
    /// A numerical kernel failed.
    #[error("computation failed: {0}")]
    Computation(String),
    /// The iterative metric solve did not reach the requested tolerance.
    #[error("metric solve did not converge within {iterations} iterations")]
    SolverDiverged {
        /// Iteration cap that was hit.
        iterations: u32,
    },
    /// A per-vertex field had the wrong number of rows.
    #[error("shape mismatch: expected {expected} rows, got {actual}")]
    ShapeMismatch {
        /// Rows the mesh has.
        expected: usize,
        /// Rows the engine produced or received.
        actual: usize,
    },
    /// The engine panicked; the coordinator caught it at the boundary.
    #[error("engine panicked during {op}: {message}")]
    Panicked {
        /// Engine operation that was running.
        op: &'static str,
        /// Panic payload rendered as text.
        message: String,
    },
    /// A backend-specific error occurred.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Error type for viewer calls that can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VisualizationError {
    /// The viewer could not register a structure.
    #[error("registration of '{name}' failed: {reason}")]
    Registration {
        /// Unique name of the structure.
        name: String,
        /// Backend explanation.
        reason: String,
    },
}

/// Error type for scene blueprint providers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneSourceError {
    /// No scene with the given identifier exists.
    #[error("scene not found: {0}")]
    NotFound(String),
    /// The scene exists but could not be decoded.
    #[error("malformed scene '{id}': {reason}")]
    Malformed {
        /// Scene identifier.
        id: String,
        /// Decoder explanation.
        reason: String,
    },
    /// I/O failure while reading the scene.
    #[error("io error: {0}")]
    Io(String),
}

mod camera;
mod engine;
mod params;
mod port;
mod scene;
mod source;
mod types;

pub use camera::{Axis, CameraPose};
pub use engine::PhysicsEngine;
pub use params::{EngineSettings, Exponents, SolveParams, TreeSettings};
pub use port::VisualizationPort;
pub use scene::{EntityBlueprint, SceneDefinition, ALL_OTHER_SOURCES};
pub use source::SceneSource;
pub use types::{EntityId, MeshGeometry, Simplex, VectorField};

/// Re-export of the vector/matrix types used across the contract.
pub use glam::{DMat4, DVec3};
