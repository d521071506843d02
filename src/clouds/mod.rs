//! Volumetric cloud field
//!
//! Archetype table and resolver, the noise density field, and the
//! ray-marching renderer that turns them into a cloud layer.

mod density;
mod renderer;
mod resolver;
mod types;

pub use density::{cloud_density, vertical_mask, DENSITY_SEED};
pub use renderer::{
    horizon_mask, sun_direction, CloudLayer, CloudOptions, CloudRenderer, DEFAULT_RENDER_SCALE,
    MAX_RENDER_SCALE, MIN_RENDER_SCALE,
};
pub use resolver::{determine_cloud_type, RAIN_HEAVY, RAIN_MODERATE, SNOW_HEAVY, SNOW_MODERATE};
pub use types::{CloudType, CloudTypeConfig, CloudTypeTable};
