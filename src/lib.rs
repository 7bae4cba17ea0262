//! # Particle FX
//!
//! GPU particle simulation and instanced rendering for a fireworks layer
//! composited over live video.
//!
//! ## Features
//!
//! - **Struct-of-arrays store**: fixed capacity, swap-remove compaction, no per-frame allocation
//! - **Deterministic integrator**: gravity, exponential drag, rotation wrap, decay, deferred burst/spiral triggers
//! - **Two backends**: host simulation with an instanced vertex stream, or device simulation in compute shaders
//! - **Shape library**: circle, heart, star, paw and spiral silhouettes with a glow core
//! - **Capture friendly output**: straight alpha blending, optional load-preserving passes
//!
//! ## Architecture Design
//!
//! State and services are kept apart, as in the rest of the code base:
//! - **State**: `ParticleStore`, GPU buffers
//! - **Service**: `PhysicsIntegrator`, `BufferPacker`, `ShapeLibrary`, `ColorModel`, `PipelineBuilder`
//! - **Orchestration**: `ParticleSystem` drives one frame at a time
//!
//! ### Example
//!
//! ```ignore
//! use particle_fx::prelude::*;
//!
//! let ctx = pollster::block_on(GpuContext::new_headless())?;
//! let target = OffscreenTarget::new(&ctx.device, 1280, 720, OffscreenTarget::DEFAULT_FORMAT);
//! let mut system = ParticleSystem::new(&ctx, &FxConfig::default(), target.format)?;
//!
//! system.spawn(SpawnRequest::at(Vec2::new(640.0, 700.0)).with_velocity(Vec2::new(0.0, -600.0)))?;
//! system.render_frame(&ctx, &target.view, &ViewState::new(target.resolution()), 1.0 / 60.0)?;
//! ```
//!
//! ## Modules
//!
//! - [`core`]: error types, macros, logging
//! - [`config`]: TOML/JSON configuration
//! - [`simulation`]: particle store and integrator
//! - [`render`]: color/shape models, packing, GPU backends

/// Error types, shared macros and logging setup
pub mod core;
/// Configuration loading and validation
pub mod config;
/// Particle storage and physics integration
pub mod simulation;
/// Packing, pipelines and instanced rendering backends
pub mod render;

/// Commonly used types
pub mod prelude {
    pub use crate::config::{BackendKind, BoundaryMode, FxConfig, OverflowPolicy};
    pub use crate::core::{FxError, FxResult, RenderError, RenderResult};
    pub use crate::render::{
        FrameStats, GpuContext, InstancedRenderer, OffscreenTarget, ParticleSystem,
        ParticleSystemStats, ShapeType, ViewState,
    };
    pub use crate::simulation::{
        BurstEvent, BurstState, ParticleId, ParticleStore, PhysicsIntegrator, SpawnError,
        SpawnRequest,
    };
    pub use glam::Vec2;
}
