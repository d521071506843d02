//! Procedural cloud density field
//!
//! Four octaves of 3D gradient noise, thresholded by the archetype's
//! coverage bias and confined to a vertical slab. Positions are in world
//! units with +y up; the slab spans roughly h ∈ [-0.3, 0.8].

use super::CloudTypeConfig;
use crate::math3d::{smoothstep, Vec3};
use crate::noise::gradient_noise;

/// Seed shared by every density evaluation so the field is stable
pub const DENSITY_SEED: u32 = 0xC10D;

/// (frequency multiplier, weight) per octave
const OCTAVES: [(f32, f32); 4] = [(1.0, 1.0), (2.0, 0.3), (4.0, 0.15), (8.0, 0.075)];

/// Exponent applied to coverage for wispy archetypes
const WISPY_POWER: f32 = 1.6;

/// Raw fractal sum at an already-scaled position
#[inline]
fn fbm(q: Vec3) -> f32 {
    let mut sum = 0.0;
    for (i, &(freq, weight)) in OCTAVES.iter().enumerate() {
        sum += weight * gradient_noise(q.x * freq, q.y * freq, q.z * freq, DENSITY_SEED + i as u32);
    }
    sum
}

/// Vertical confinement: fade in above the floor, fade out toward the top.
/// Anvil archetypes keep density higher up before fading.
#[inline]
pub fn vertical_mask(h: f32, anvil: bool) -> f32 {
    let top_fade = if anvil {
        smoothstep(0.35, 0.9, h)
    } else {
        smoothstep(0.2, 0.8, h)
    };
    smoothstep(-0.3, 0.2, h) * (1.0 - top_fade)
}

/// Horizontal strata in [0.6, 1.0] for layered archetypes
#[inline]
fn banding(p: Vec3) -> f32 {
    let warp = gradient_noise(p.x * 0.7, 0.0, p.z * 0.7, DENSITY_SEED ^ 0xBA5D) * 2.0;
    0.8 + 0.2 * (p.y * 18.0 + warp).sin()
}

/// Cloud density at `p`. Always within [0, density_scale].
pub fn cloud_density(p: Vec3, config: &CloudTypeConfig) -> f32 {
    let s = config.size_scale;
    let q = Vec3::new(p.x * s, p.y * config.shape_scale * s, p.z * s);
    let sum = fbm(q);

    let cb = config.coverage_bias;
    let mut coverage = smoothstep(0.1 + cb * 0.2, 0.6 + cb * 0.2, sum);
    if config.wispy_edges {
        coverage = coverage.powf(WISPY_POWER);
    }

    let mut density = coverage * vertical_mask(p.y, config.anvil_clouds);
    if config.layered_effect {
        density *= banding(p);
    }

    let max = config.density_scale.max(0.0);
    (density * max).clamp(0.0, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clouds::{CloudType, CloudTypeTable};

    fn sample_points() -> impl Iterator<Item = Vec3> {
        (0..600).map(|i| {
            let t = i as f32;
            Vec3::new(
                (t * 0.173).sin() * 4.0,
                (t * 0.011) - 0.5,
                (t * 0.37).cos() * 3.0 + t * 0.01,
            )
        })
    }

    #[test]
    fn test_density_within_bounds_for_all_archetypes() {
        let table = CloudTypeTable::default();
        for t in CloudType::ALL {
            let config = table.get(t);
            for p in sample_points() {
                let d = cloud_density(p, config);
                assert!(
                    (0.0..=config.density_scale).contains(&d),
                    "{t}: density {d} out of range at {p:?}"
                );
            }
        }
    }

    #[test]
    fn test_negative_density_scale_yields_zero() {
        let mut config = *CloudTypeTable::default().get(CloudType::Overcast);
        config.density_scale = -1.0;
        for p in sample_points() {
            assert_eq!(cloud_density(p, &config), 0.0);
        }
    }

    #[test]
    fn test_nothing_outside_vertical_slab() {
        let table = CloudTypeTable::default();
        let config = table.get(CloudType::Thunderstorm);
        for x in 0..50 {
            let p_low = Vec3::new(x as f32 * 0.3, -0.5, 1.0);
            let p_high = Vec3::new(x as f32 * 0.3, 1.0, 1.0);
            assert_eq!(cloud_density(p_low, config), 0.0);
            assert_eq!(cloud_density(p_high, config), 0.0);
        }
    }

    #[test]
    fn test_overcast_denser_than_clear() {
        let table = CloudTypeTable::default();
        let total = |t: CloudType| -> f32 {
            sample_points()
                .map(|p| Vec3::new(p.x, 0.1, p.z))
                .map(|p| cloud_density(p, table.get(t)))
                .sum()
        };
        assert!(total(CloudType::Overcast) > total(CloudType::Clear));
    }

    #[test]
    fn test_anvil_mask_reaches_higher() {
        assert!(vertical_mask(0.6, true) > vertical_mask(0.6, false));
        assert_eq!(vertical_mask(-0.4, true), 0.0);
    }
}
