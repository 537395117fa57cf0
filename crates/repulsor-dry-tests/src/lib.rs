// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for Repulsor crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`config`] - In-memory config store fake for testing without filesystem
//! - [`engine`] - Scriptable [`PhysicsEngine`](repulsor_port::PhysicsEngine) with failure injection
//! - [`fixtures`] - Geometry and scene builders
//! - [`scenes`] - In-memory scene source
//! - [`viz`] - Recording visualization port

pub mod config;
pub mod engine;
pub mod fixtures;
pub mod scenes;
pub mod viz;

pub use config::InMemoryConfigStore;
pub use engine::{EngineOp, FailMode, MockEnergy, MockEngine, MockMesh};
pub use fixtures::{mover_and_wall, tetrahedron, translated, triangle, trio_all_simulated};
pub use scenes::InMemorySceneSource;
pub use viz::{RecordingViz, VizMesh, VizObstacle};
