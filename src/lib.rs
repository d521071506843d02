//! skyglass: an animated weather sky
//!
//! A [`sky::SkyRenderer`] turns a [`weather::WeatherObservation`] into a frame
//! of ray-marched clouds, a cached sun sprite with atmospheric effects, and
//! rain or snow particles. The `skyglass` binary hosts it in an SDL2 window.

pub mod clouds;
pub mod config;
pub mod display;
pub mod error;
pub mod logging;
pub mod math3d;
pub mod noise;
pub mod precipitation;
pub mod sky;
pub mod sun;
pub mod util;
pub mod weather;

pub use error::{Result, SkyError};
