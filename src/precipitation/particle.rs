//! A single raindrop or snowflake

use super::params::{IntensityTier, PrecipitationType, TierParams};
use crate::math3d::smoothstep;

/// Weight kept from the previous drift value each tick
pub const DRIFT_SMOOTHING: f32 = 0.95;

/// A particle carries its own type and tier so populations can crossfade
#[derive(Debug, Clone)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    /// Streak length (rain) or diameter (snow), px
    pub size: f32,
    pub opacity: f32,
    /// Radians; snow only
    pub rotation: f32,
    pub rotation_speed: f32,
    pub age: f32,
    pub lifetime: f32,
    pub kind: PrecipitationType,
    pub tier: IntensityTier,
    /// Where this particle samples the drift field
    pub noise_offset: f32,
    /// Smoothed drift, -1..1
    pub drift: f32,
}

impl Particle {
    #[inline]
    pub fn is_expired(&self, despawn_y: f32) -> bool {
        self.age >= self.lifetime || self.y > despawn_y
    }

    /// Blend the drift toward a new field sample
    #[inline]
    pub fn smooth_drift(&mut self, target: f32) {
        self.drift = self.drift * DRIFT_SMOOTHING + target * (1.0 - DRIFT_SMOOTHING);
    }

    /// Integrate one tick. `wind_x` is the horizontal wind speed in px/s.
    pub fn advance(&mut self, dt: f32, wind_x: f32, params: &TierParams) {
        match self.kind {
            PrecipitationType::Rain => {
                // Rain takes wind on x only
                self.vx = wind_x * (1.0 + 0.3 * self.drift);
                self.x += self.vx * dt;
                self.y += self.vy * dt;
            },
            PrecipitationType::Snow => {
                self.vx = wind_x + self.drift * params.drift;
                self.x += self.vx * dt;
                self.y += self.vy * (1.0 + 0.2 * self.drift) * dt;
                self.rotation += (self.rotation_speed + self.drift * 0.5) * dt;
            },
        }
        self.age += dt;
    }

    /// Fade in over the first 10% of life and out over the last 15%
    pub fn alpha(&self) -> f32 {
        if self.lifetime <= 0.0 {
            return 0.0;
        }
        let fade_in = smoothstep(0.0, self.lifetime * 0.1, self.age);
        let fade_out = 1.0 - smoothstep(self.lifetime * 0.85, self.lifetime, self.age);
        (self.opacity * fade_in * fade_out).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::precipitation::PrecipitationTable;

    fn flake() -> Particle {
        Particle {
            x: 100.0,
            y: 0.0,
            vx: 0.0,
            vy: 60.0,
            size: 3.0,
            opacity: 0.8,
            rotation: 0.0,
            rotation_speed: 1.0,
            age: 0.0,
            lifetime: 8.0,
            kind: PrecipitationType::Snow,
            tier: IntensityTier::Light,
            noise_offset: 0.0,
            drift: 0.0,
        }
    }

    #[test]
    fn test_drift_smoothing() {
        let mut p = flake();
        p.smooth_drift(1.0);
        assert!((p.drift - 0.05).abs() < 1e-6);
        for _ in 0..200 {
            p.smooth_drift(1.0);
        }
        assert!(p.drift > 0.99 && p.drift <= 1.0);
    }

    #[test]
    fn test_snow_rotates_and_falls() {
        let table = PrecipitationTable::default();
        let params = table.get(PrecipitationType::Snow, IntensityTier::Light);
        let mut p = flake();
        p.advance(0.5, 10.0, params);
        assert!((p.y - 30.0).abs() < 1e-4);
        assert!((p.x - 105.0).abs() < 1e-4);
        assert!(p.rotation > 0.0);
        assert_eq!(p.age, 0.5);
    }

    #[test]
    fn test_rain_ignores_rotation() {
        let table = PrecipitationTable::default();
        let params = table.get(PrecipitationType::Rain, IntensityTier::Heavy);
        let mut p = Particle {
            kind: PrecipitationType::Rain,
            vy: 2000.0,
            ..flake()
        };
        p.advance(0.01, -50.0, params);
        assert_eq!(p.rotation, 0.0);
        assert!(p.x < 100.0);
        assert!((p.y - 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_expiry() {
        let mut p = flake();
        assert!(!p.is_expired(500.0));
        p.age = 8.0;
        assert!(p.is_expired(500.0));
        let mut p = flake();
        p.y = 501.0;
        assert!(p.is_expired(500.0));
    }

    #[test]
    fn test_alpha_fades_at_both_ends() {
        let mut p = flake();
        assert_eq!(p.alpha(), 0.0);
        p.age = 4.0;
        assert!((p.alpha() - 0.8).abs() < 1e-6);
        p.age = 8.0;
        assert_eq!(p.alpha(), 0.0);
    }
}
