//! 粒子模拟
//!
//! - `store` - SoA 粒子存储，固定容量，swap-remove 压缩
//! - `integrator` - 每帧物理积分
//! - `clock` - 纪元可前移的模拟时钟

pub mod clock;
pub mod integrator;
pub mod store;

pub use clock::{ClockTick, SimulationClock};
pub use integrator::{wrap_angle, FrameUniforms, PhysicsIntegrator, StepReport};
pub use store::{
    BurstEvent, BurstState, Columns, ColumnsMut, ParticleId, ParticleStore, ParticleView,
    SpawnError, SpawnRequest,
};
