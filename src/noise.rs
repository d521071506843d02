//! Noise Generation Utilities
//!
//! Hash-driven gradient (Perlin) noise for the cloud density field and the
//! precipitation drift field, plus the integer hashes used wherever visual
//! variation has to be deterministic (sprite edge noise, occlusion blobs).

/// Hash-based pseudo-random value for integer grid coordinates.
/// Returns a value in [0.0, 1.0).
#[inline]
pub fn noise_hash(x: i32, y: i32, z: i32, seed: u32) -> f32 {
    (hash3(x, y, z, seed) & 0x7fff) as f32 / 0x8000 as f32
}

/// Raw 32-bit lattice hash
#[inline]
fn hash3(x: i32, y: i32, z: i32, seed: u32) -> u32 {
    let mut h = seed.wrapping_add(x as u32).wrapping_mul(374761393);
    h = h.wrapping_add(y as u32).wrapping_mul(668265263);
    h = h.wrapping_add(z as u32).wrapping_mul(2147483647);
    h = (h ^ (h >> 13)).wrapping_mul(1274126177);
    h ^ (h >> 16)
}

/// Deterministic value in [0, 1) for an index and a channel.
/// Used for stable per-item layouts (blob offsets, flake seeds).
#[inline]
pub fn hash_unit(index: u32, channel: u32, seed: u32) -> f32 {
    noise_hash(index as i32, channel as i32, 0x51ED, seed)
}

/// Like `hash_unit` but mapped to [-1, 1)
#[inline]
pub fn hash_signed(index: u32, channel: u32, seed: u32) -> f32 {
    hash_unit(index, channel, seed) * 2.0 - 1.0
}

/// Quintic fade (Ken Perlin's improved curve): 6t⁵ - 15t⁴ + 10t³
#[inline]
pub fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Dot product of the offset with one of 12 cube-edge gradients
#[inline]
fn grad3(hash: u32, x: f32, y: f32, z: f32) -> f32 {
    match hash % 12 {
        0 => x + y,
        1 => -x + y,
        2 => x - y,
        3 => -x - y,
        4 => x + z,
        5 => -x + z,
        6 => x - z,
        7 => -x - z,
        8 => y + z,
        9 => -y + z,
        10 => y - z,
        _ => -y - z,
    }
}

#[inline]
fn grad2(hash: u32, x: f32, y: f32) -> f32 {
    match hash & 7 {
        0 => x + y,
        1 => -x + y,
        2 => x - y,
        3 => -x - y,
        4 => x,
        5 => -x,
        6 => y,
        _ => -y,
    }
}

/// 3D gradient noise. Returns a value in [-1.0, 1.0].
pub fn gradient_noise(x: f32, y: f32, z: f32, seed: u32) -> f32 {
    let ix = x.floor() as i32;
    let iy = y.floor() as i32;
    let iz = z.floor() as i32;
    let fx = x - ix as f32;
    let fy = y - iy as f32;
    let fz = z - iz as f32;
    let u = fade(fx);
    let v = fade(fy);
    let w = fade(fz);

    // Gradient contributions from the 8 corners of the unit cube
    let n000 = grad3(hash3(ix, iy, iz, seed), fx, fy, fz);
    let n100 = grad3(hash3(ix + 1, iy, iz, seed), fx - 1.0, fy, fz);
    let n010 = grad3(hash3(ix, iy + 1, iz, seed), fx, fy - 1.0, fz);
    let n110 = grad3(hash3(ix + 1, iy + 1, iz, seed), fx - 1.0, fy - 1.0, fz);
    let n001 = grad3(hash3(ix, iy, iz + 1, seed), fx, fy, fz - 1.0);
    let n101 = grad3(hash3(ix + 1, iy, iz + 1, seed), fx - 1.0, fy, fz - 1.0);
    let n011 = grad3(hash3(ix, iy + 1, iz + 1, seed), fx, fy - 1.0, fz - 1.0);
    let n111 = grad3(hash3(ix + 1, iy + 1, iz + 1, seed), fx - 1.0, fy - 1.0, fz - 1.0);

    let x0 = lerp(n000, n100, u);
    let x1 = lerp(n010, n110, u);
    let x2 = lerp(n001, n101, u);
    let x3 = lerp(n011, n111, u);

    let y0 = lerp(x0, x1, v);
    let y1 = lerp(x2, x3, v);

    lerp(y0, y1, w).clamp(-1.0, 1.0)
}

/// 2D gradient noise. Returns a value in [-1.0, 1.0].
pub fn gradient_noise_2d(x: f32, y: f32, seed: u32) -> f32 {
    let ix = x.floor() as i32;
    let iy = y.floor() as i32;
    let fx = x - ix as f32;
    let fy = y - iy as f32;
    let u = fade(fx);
    let v = fade(fy);

    let n00 = grad2(hash3(ix, iy, 0, seed), fx, fy);
    let n10 = grad2(hash3(ix + 1, iy, 0, seed), fx - 1.0, fy);
    let n01 = grad2(hash3(ix, iy + 1, 0, seed), fx, fy - 1.0);
    let n11 = grad2(hash3(ix + 1, iy + 1, 0, seed), fx - 1.0, fy - 1.0);

    let x0 = lerp(n00, n10, u);
    let x1 = lerp(n01, n11, u);

    lerp(x0, x1, v).clamp(-1.0, 1.0)
}
