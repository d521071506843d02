//! Sun pipeline
//!
//! Color/geometry model, the bounded sprite cache, and the atmospheric
//! effects layered over the sprite each frame.

mod effects;
mod layer;
mod model;
mod sprite;

pub use effects::{
    draw_ghosts, draw_occlusion, lens_ghosts, occlusion_blobs, Blob, Ghost, GhostInputs,
    APERTURE_FRACTION, GHOST_FRACTIONS, OCCLUSION_MIN_COVER,
};
pub use layer::SunLayer;
pub use model::{
    atmospheric_extinction, compute_render_state, elevation_t, extinction_tint,
    sun_screen_position, sun_visibility, tone_scale, SunInputs, SunRenderState, HORIZON_Y,
    SUN_AZIMUTH_X,
};
pub use sprite::{
    SpriteKey, SpriteParams, SunSprite, SunSpriteCache, DEFAULT_GRANULE_CAPACITY,
    DEFAULT_SPRITE_CAPACITY,
};
