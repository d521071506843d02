//! Rain and snow
//!
//! A physics table keyed by (type, tier), the particle state, and the
//! system that spawns, advances, recycles and draws particles.

mod params;
mod particle;
mod system;

pub use params::{
    IntensityTier, PrecipitationRequest, PrecipitationTable, PrecipitationType, TierParams,
};
pub use particle::{Particle, DRIFT_SMOOTHING};
pub use system::{PrecipitationSystem, DEFAULT_SEED, MAX_PARTICLES};
