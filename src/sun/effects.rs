//! Per-frame atmospheric effects drawn over the cached sun sprite:
//! drifting cloud blobs occluding the disc, and lens ghosts.

use crate::display::{BlendMode, ClipCircle, GradientStop, PixelBuffer};
use crate::math3d::{mix, smoothstep, Vec2, Vec3};
use crate::noise::{hash_signed, hash_unit};

const BLOB_SEED: u32 = 0x0CC1;
/// No occlusion at or below this cover
pub const OCCLUSION_MIN_COVER: f32 = 0.08;

/// Positions along the sun→center axis; 1.0 is the screen center
pub const GHOST_FRACTIONS: [f32; 4] = [0.22, 0.46, 0.72, 0.92];
/// The faint ghost past the center
pub const APERTURE_FRACTION: f32 = 1.35;
const GHOST_SCALES: [f32; 4] = [0.035, 0.06, 0.025, 0.08];
const GHOST_TINTS: [Vec3; 4] = [
    Vec3::new(1.0, 0.8, 0.55),
    Vec3::new(0.6, 0.9, 0.7),
    Vec3::new(0.7, 0.75, 1.0),
    Vec3::new(0.9, 0.65, 1.0),
];

/// One soft occluding blob, in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blob {
    pub center: Vec2,
    pub radius: f32,
    pub alpha: f32,
}

/// Blob layout for this frame. Empty when the sky is clear enough.
pub fn occlusion_blobs(
    sun: Vec2,
    disc_radius: f32,
    cloud_cover: f32,
    wind_speed: f32,
    time: f32,
) -> Vec<Blob> {
    if cloud_cover <= OCCLUSION_MIN_COVER || disc_radius <= 0.0 {
        return Vec::new();
    }
    let count = 4 + (cloud_cover.clamp(0.0, 1.0) * 6.0).round() as u32;
    let phase = time * (0.35 + cloud_cover * 0.25) + wind_speed * 0.02;

    (0..count)
        .map(|i| {
            let ox = hash_signed(i, 0, BLOB_SEED);
            let oy = hash_signed(i, 1, BLOB_SEED);
            let size = 0.35 + 0.45 * hash_unit(i, 2, BLOB_SEED);
            let speed = 0.6 + 0.8 * hash_unit(i, 3, BLOB_SEED);
            let weight = 0.6 + 0.4 * hash_unit(i, 4, BLOB_SEED);
            let fi = i as f32;

            let dx = ox * 0.9 + (phase * speed + fi * 1.7).sin() * 0.35;
            let dy = oy * 0.6 + (phase * speed * 0.7 + fi).cos() * 0.2;
            Blob {
                center: Vec2::new(sun.x + dx * disc_radius, sun.y + dy * disc_radius),
                radius: size * disc_radius,
                alpha: (0.25 + 0.55 * cloud_cover) * weight,
            }
        })
        .collect()
}

/// Draw blobs clipped to the disc, tinted toward the sky behind
pub fn draw_occlusion(buffer: &mut PixelBuffer, blobs: &[Blob], sun: Vec2, disc_radius: f32, sky: Vec3) {
    if blobs.is_empty() {
        return;
    }
    let clip = ClipCircle {
        cx: sun.x,
        cy: sun.y,
        radius: disc_radius * 1.05,
    };
    let color = mix(sky, Vec3::new(0.78, 0.8, 0.84), 0.6).to_rgb8();
    for blob in blobs {
        let stops = [
            GradientStop::new(0.0, color, blob.alpha),
            GradientStop::new(0.6, color, blob.alpha * 0.6),
            GradientStop::new(1.0, color, 0.0),
        ];
        buffer.fill_radial_gradient(
            blob.center.x,
            blob.center.y,
            blob.radius,
            blob.radius,
            &stops,
            BlendMode::Over,
            Some(clip),
        );
    }
}

/// One lens ghost ring
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ghost {
    pub center: Vec2,
    pub radius: f32,
    pub color: Vec3,
    pub alpha: f32,
}

/// Inputs that gate and scale the ghosts
#[derive(Debug, Clone, Copy)]
pub struct GhostInputs {
    pub sun: Vec2,
    pub width: f32,
    pub height: f32,
    pub visibility: f32,
    pub cloud_cover: f32,
    pub fog_density: f32,
    pub elev_t: f32,
}

/// Ghosts along the sun→center axis. Empty when the sun is dim, the sky
/// overcast, or the sun too low.
pub fn lens_ghosts(inputs: &GhostInputs) -> Vec<Ghost> {
    if inputs.visibility <= 0.25 || inputs.cloud_cover >= 0.85 || inputs.elev_t <= 0.25 {
        return Vec::new();
    }
    let center = Vec2::new(inputs.width * 0.5, inputs.height * 0.5);
    let axis = center - inputs.sun;
    let half_diag = center.length().max(1.0);
    let off_center = smoothstep(0.05, 0.45, axis.length() / half_diag);

    let strength = inputs.visibility
        * (1.0 - inputs.cloud_cover)
        * (1.0 - inputs.fog_density.clamp(0.0, 1.0))
        * off_center;
    if strength <= 0.0 {
        return Vec::new();
    }

    let mut ghosts: Vec<Ghost> = GHOST_FRACTIONS
        .iter()
        .zip(GHOST_SCALES.iter())
        .zip(GHOST_TINTS.iter())
        .map(|((&f, &s), &tint)| Ghost {
            center: inputs.sun + axis * f,
            radius: inputs.height * s,
            color: tint,
            alpha: 0.16 * strength,
        })
        .collect();

    ghosts.push(Ghost {
        center: inputs.sun + axis * APERTURE_FRACTION,
        radius: inputs.height * 0.12,
        color: Vec3::new(0.85, 0.9, 1.0),
        alpha: 0.05 * strength,
    });
    ghosts
}

/// Draw ghosts as soft rings
pub fn draw_ghosts(buffer: &mut PixelBuffer, ghosts: &[Ghost]) {
    for g in ghosts {
        let c = g.color.to_rgb8();
        let stops = [
            GradientStop::new(0.0, c, g.alpha * 0.3),
            GradientStop::new(0.6, c, g.alpha * 0.5),
            GradientStop::new(0.85, c, g.alpha),
            GradientStop::new(1.0, c, 0.0),
        ];
        buffer.fill_radial_gradient(g.center.x, g.center.y, g.radius, g.radius, &stops, BlendMode::Screen, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ghost_inputs() -> GhostInputs {
        GhostInputs {
            sun: Vec2::new(650.0, 120.0),
            width: 960.0,
            height: 540.0,
            visibility: 0.9,
            cloud_cover: 0.1,
            fog_density: 0.0,
            elev_t: 1.0,
        }
    }

    #[test]
    fn test_no_blobs_on_clear_sky() {
        assert!(occlusion_blobs(Vec2::new(10.0, 10.0), 12.0, 0.08, 5.0, 3.0).is_empty());
        assert!(occlusion_blobs(Vec2::new(10.0, 10.0), 12.0, 0.0, 5.0, 3.0).is_empty());
    }

    #[test]
    fn test_blob_count_scales_with_cover() {
        let sun = Vec2::new(100.0, 100.0);
        assert_eq!(occlusion_blobs(sun, 12.0, 0.09, 0.0, 0.0).len(), 5);
        assert_eq!(occlusion_blobs(sun, 12.0, 0.5, 0.0, 0.0).len(), 7);
        assert_eq!(occlusion_blobs(sun, 12.0, 1.0, 0.0, 0.0).len(), 10);
    }

    #[test]
    fn test_blob_layout_is_deterministic() {
        let sun = Vec2::new(300.0, 80.0);
        let a = occlusion_blobs(sun, 15.0, 0.6, 4.0, 12.5);
        let b = occlusion_blobs(sun, 15.0, 0.6, 4.0, 12.5);
        assert_eq!(a, b);
        let later = occlusion_blobs(sun, 15.0, 0.6, 4.0, 13.5);
        assert_ne!(a, later);
    }

    #[test]
    fn test_blobs_drawn_only_inside_disc() {
        let sun = Vec2::new(40.0, 40.0);
        let blobs = occlusion_blobs(sun, 10.0, 0.9, 0.0, 1.0);
        let mut buf = PixelBuffer::with_size(80, 80);
        draw_occlusion(&mut buf, &blobs, sun, 10.0, Vec3::splat(0.5));
        assert_eq!(buf.get_pixel_rgba(40, 60).unwrap().3, 0);
        assert_eq!(buf.get_pixel_rgba(5, 5).unwrap().3, 0);
    }

    #[test]
    fn test_ghost_skip_conditions() {
        let mut i = ghost_inputs();
        assert_eq!(lens_ghosts(&i).len(), 5);

        i.visibility = 0.25;
        assert!(lens_ghosts(&i).is_empty());

        let mut i = ghost_inputs();
        i.cloud_cover = 0.85;
        assert!(lens_ghosts(&i).is_empty());

        let mut i = ghost_inputs();
        i.elev_t = 0.25;
        assert!(lens_ghosts(&i).is_empty());
    }

    #[test]
    fn test_ghosts_lie_on_axis() {
        let i = ghost_inputs();
        let ghosts = lens_ghosts(&i);
        let center = Vec2::new(480.0, 270.0);
        for (g, f) in ghosts.iter().zip(GHOST_FRACTIONS) {
            let expected = i.sun + (center - i.sun) * f;
            assert!((g.center - expected).length() < 1e-3);
        }
        // Aperture ghost sits past the center, opposite the sun
        let aperture = ghosts[4].center;
        assert!(aperture.x < center.x && aperture.y > center.y);
    }

    #[test]
    fn test_centered_sun_has_no_ghosts() {
        let mut i = ghost_inputs();
        i.sun = Vec2::new(480.0, 270.0);
        assert!(lens_ghosts(&i).is_empty());
    }
}
