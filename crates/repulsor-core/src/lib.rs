// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Repulsor scene coordination.
//!
//! Keeps derived physics quantities consistent with a mutable scene of
//! transformable, simulated entities, and recombines world-space obstacle
//! geometry from moving sources whenever it is needed.
//!
//! # Layout
//!
//! - [`registry`] owns entities and loads scenes atomically.
//! - [`cache`] tracks differential/gradient validity per entity and globally.
//! - [`obstacle`] aggregates obstacle geometry and hands it to the engine.
//! - [`step`] runs the compute → apply → reaggregate physics loop.
//! - [`session`] is the single owner wiring all of the above to the ports.
//!
//! The numerical engine and the viewer are external; see [`repulsor_port`].
#![forbid(unsafe_code)]

pub mod cache;
pub mod engine;
pub mod entity;
pub mod obstacle;
pub mod registry;
pub mod scaling;
pub mod session;
pub mod step;
pub mod transform;

pub use cache::{CacheEntry, CacheState, DerivedCache, QuantityError};
pub use engine::EngineAdapter;
pub use entity::{unique_name, Entity, EntityError, EntityFlags};
pub use obstacle::{aggregate, ObstacleError, ObstacleGeometry, ObstacleSources};
pub use registry::{ActiveChange, Activation, SceneError, SceneRegistry};
pub use scaling::scale_for_display;
pub use session::{EnergyReading, Session, SessionError};
pub use step::{run_step, ApplyFailure, StepError, StepFailure};
pub use transform::{matrices_close, to_world, world_delta_to_local, TransformError};
