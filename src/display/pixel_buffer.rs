use std::fmt;

use super::{DEFAULT_HEIGHT, DEFAULT_WIDTH};

// ============================================================================
// Blend Mode
// ============================================================================

/// Compositing blend mode for draws and `composite()`.
/// All modes operate on premultiplied alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// Standard source-over: dst = src + dst * (1 - src_alpha)
    Over,
    /// Additive: dst += src, saturating
    Additive,
    /// Screen: dst = src + dst - src * dst. Brightens, never exceeds 255.
    Screen,
}

/// Circular clip region in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipCircle {
    pub cx: f32,
    pub cy: f32,
    pub radius: f32,
}

impl ClipCircle {
    #[inline]
    fn contains(&self, x: f32, y: f32) -> bool {
        let dx = x - self.cx;
        let dy = y - self.cy;
        dx * dx + dy * dy <= self.radius * self.radius
    }
}

/// One stop of a radial gradient, like a canvas `addColorStop`.
/// `offset` runs from 0 (center) to 1 (rim); `alpha` is straight alpha.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    pub offset: f32,
    pub color: (u8, u8, u8),
    pub alpha: f32,
}

impl GradientStop {
    pub const fn new(offset: f32, color: (u8, u8, u8), alpha: f32) -> Self {
        Self {
            offset,
            color,
            alpha,
        }
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// Multiply two 8-bit values as fractions of 255, rounded
#[inline]
fn mul_255(a: u8, b: u8) -> u8 {
    let t = a as u16 * b as u16 + 128;
    ((t + (t >> 8)) >> 8) as u8
}

/// Write ABGR pixel to slice (RGBA8888 little-endian byte order)
#[inline]
fn write_pixel(dest: &mut [u8], r: u8, g: u8, b: u8, a: u8) {
    dest[0] = a; // A
    dest[1] = b; // B
    dest[2] = g; // G
    dest[3] = r; // R
}

/// Blend one premultiplied source pixel into an ABGR destination slice
#[inline]
fn blend_premultiplied(dest: &mut [u8], r: u8, g: u8, b: u8, a: u8, mode: BlendMode) {
    match mode {
        BlendMode::Over => {
            let inv = 255 - a;
            dest[0] = a.saturating_add(mul_255(dest[0], inv));
            dest[1] = b.saturating_add(mul_255(dest[1], inv));
            dest[2] = g.saturating_add(mul_255(dest[2], inv));
            dest[3] = r.saturating_add(mul_255(dest[3], inv));
        },
        BlendMode::Additive => {
            dest[0] = dest[0].saturating_add(a);
            dest[1] = dest[1].saturating_add(b);
            dest[2] = dest[2].saturating_add(g);
            dest[3] = dest[3].saturating_add(r);
        },
        BlendMode::Screen => {
            let screen = |s: u8, d: u8| -> u8 { (s as u16 + d as u16 - mul_255(s, d) as u16) as u8 };
            dest[0] = screen(a, dest[0]);
            dest[1] = screen(b, dest[1]);
            dest[2] = screen(g, dest[2]);
            dest[3] = screen(r, dest[3]);
        },
    }
}

#[inline]
fn unit_to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

/// Interpolate a sorted stop list at `t` ∈ [0, 1].
/// Returns straight (r, g, b, a) with colors in 0-255 and alpha in 0-1.
fn sample_stops(stops: &[GradientStop], t: f32) -> (f32, f32, f32, f32) {
    let Some(first) = stops.first() else {
        return (0.0, 0.0, 0.0, 0.0);
    };
    if t <= first.offset {
        return (
            first.color.0 as f32,
            first.color.1 as f32,
            first.color.2 as f32,
            first.alpha,
        );
    }
    for pair in stops.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if t <= b.offset {
            let span = (b.offset - a.offset).max(1e-6);
            let f = (t - a.offset) / span;
            let l = |x: u8, y: u8| x as f32 + (y as f32 - x as f32) * f;
            return (
                l(a.color.0, b.color.0),
                l(a.color.1, b.color.1),
                l(a.color.2, b.color.2),
                a.alpha + (b.alpha - a.alpha) * f,
            );
        }
    }
    let last = stops[stops.len() - 1];
    (
        last.color.0 as f32,
        last.color.1 as f32,
        last.color.2 as f32,
        last.alpha,
    )
}

// ============================================================================
// PixelBuffer
// ============================================================================

/// RGBA8888 pixel buffer for software rendering, premultiplied alpha.
/// Every sky layer renders to one of these; the host composites them.
#[derive(Clone)]
pub struct PixelBuffer {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl PixelBuffer {
    /// Create a new pixel buffer with default resolution
    pub fn new() -> Self {
        Self::with_size(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }

    /// Create a new, fully transparent pixel buffer with custom resolution
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            pixels: vec![0; (width as usize) * (height as usize) * 4],
            width,
            height,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// True once the storage has been released (or was never allocated)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Reallocate to a new size, clearing contents.
    /// Zero dimensions are ignored and the buffer keeps its current size.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        if width != self.width || height != self.height || self.pixels.is_empty() {
            self.width = width;
            self.height = height;
            self.pixels = vec![0; (width as usize) * (height as usize) * 4];
        }
        true
    }

    /// Drop the pixel storage. The buffer draws nothing until resized again.
    pub fn release(&mut self) {
        self.pixels = Vec::new();
        self.width = 0;
        self.height = 0;
    }

    /// Check if coordinates are within bounds
    #[inline]
    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32
    }

    /// Calculate byte offset for pixel at (x, y)
    #[inline]
    fn pixel_index(&self, x: u32, y: u32) -> usize {
        ((y as usize) * (self.width as usize) + x as usize) * 4
    }

    /// Clear to an opaque solid color
    pub fn clear(&mut self, r: u8, g: u8, b: u8) {
        self.clear_rgba(r, g, b, 255);
    }

    /// Clear to fully transparent (for layer surfaces)
    pub fn clear_transparent(&mut self) {
        self.pixels.fill(0);
    }

    /// Clear to a premultiplied color
    /// Optimized: uses u32 fill for maximum speed
    pub fn clear_rgba(&mut self, r: u8, g: u8, b: u8, a: u8) {
        let pixel = u32::from_ne_bytes([a, b, g, r]);
        let ptr = self.pixels.as_mut_ptr() as *mut u32;
        let len = self.pixels.len() / 4;
        for i in 0..len {
            // Safety: i < len keeps us inside the allocation, and
            // write_unaligned makes no assumption about Vec<u8> alignment.
            unsafe {
                ptr.add(i).write_unaligned(pixel);
            }
        }
    }

    /// Set a single premultiplied pixel (bounds checked)
    #[inline]
    pub fn set_pixel_rgba(&mut self, x: i32, y: i32, r: u8, g: u8, b: u8, a: u8) {
        if self.in_bounds(x, y) {
            let idx = self.pixel_index(x as u32, y as u32);
            write_pixel(&mut self.pixels[idx..idx + 4], r, g, b, a);
        }
    }

    /// Read all 4 channels of a pixel (bounds checked)
    /// Returns premultiplied (r, g, b, a) or None if out of bounds
    #[inline]
    pub fn get_pixel_rgba(&self, x: i32, y: i32) -> Option<(u8, u8, u8, u8)> {
        if self.in_bounds(x, y) {
            let idx = self.pixel_index(x as u32, y as u32);
            Some((
                self.pixels[idx + 3], // R
                self.pixels[idx + 2], // G
                self.pixels[idx + 1], // B
                self.pixels[idx],     // A
            ))
        } else {
            None
        }
    }

    /// Blend a straight-alpha color into a pixel
    #[inline]
    pub fn blend_pixel(&mut self, x: i32, y: i32, r: u8, g: u8, b: u8, a: u8, mode: BlendMode) {
        if a == 0 || !self.in_bounds(x, y) {
            return;
        }
        let idx = self.pixel_index(x as u32, y as u32);
        blend_premultiplied(
            &mut self.pixels[idx..idx + 4],
            mul_255(r, a),
            mul_255(g, a),
            mul_255(b, a),
            a,
            mode,
        );
    }

    /// Draw an opaque horizontal line
    pub fn hline(&mut self, x1: i32, x2: i32, y: i32, r: u8, g: u8, b: u8) {
        if y < 0 || y >= self.height as i32 {
            return;
        }
        let (x1, x2) = if x1 <= x2 { (x1, x2) } else { (x2, x1) };
        let start = x1.max(0);
        let end = x2.min(self.width as i32 - 1);
        if start > end {
            return;
        }

        // Compute starting index once, then increment by 4 per pixel
        let mut idx = self.pixel_index(start as u32, y as u32);
        let count = (end - start + 1) as usize;
        for _ in 0..count {
            write_pixel(&mut self.pixels[idx..idx + 4], r, g, b, 255);
            idx += 4;
        }
    }

    // ========================================================================
    // Anti-aliased Drawing
    // Composes: blend_pixel
    // ========================================================================

    /// Anti-aliased line using Xiaolin Wu's algorithm.
    /// Accepts f32 endpoints for subpixel precision; `alpha` scales coverage.
    pub fn line_aa(
        &mut self,
        mut x0: f32,
        mut y0: f32,
        mut x1: f32,
        mut y1: f32,
        color: (u8, u8, u8),
        alpha: f32,
        mode: BlendMode,
    ) {
        if !(x0.is_finite() && y0.is_finite() && x1.is_finite() && y1.is_finite()) {
            return;
        }
        let steep = (y1 - y0).abs() > (x1 - x0).abs();
        if steep {
            std::mem::swap(&mut x0, &mut y0);
            std::mem::swap(&mut x1, &mut y1);
        }
        if x0 > x1 {
            std::mem::swap(&mut x0, &mut x1);
            std::mem::swap(&mut y0, &mut y1);
        }

        let dx = x1 - x0;
        let dy = y1 - y0;
        let gradient = if dx.abs() < 0.001 { 1.0 } else { dy / dx };
        let (r, g, b) = color;

        let mut plot = |buf: &mut Self, px: i32, py: i32, coverage: f32| {
            let a = unit_to_u8(coverage * alpha);
            if steep {
                buf.blend_pixel(py, px, r, g, b, a, mode);
            } else {
                buf.blend_pixel(px, py, r, g, b, a, mode);
            }
        };

        // First endpoint
        let xend = x0.round();
        let yend = y0 + gradient * (xend - x0);
        let xgap = 1.0 - (x0 + 0.5).fract();
        let xpxl1 = xend as i32;
        let ypxl1 = yend.floor() as i32;
        let fpart = yend - yend.floor();
        plot(self, xpxl1, ypxl1, (1.0 - fpart) * xgap);
        plot(self, xpxl1, ypxl1 + 1, fpart * xgap);
        let mut intery = yend + gradient;

        // Second endpoint
        let xend = x1.round();
        let yend = y1 + gradient * (xend - x1);
        let xgap = (x1 + 0.5).fract();
        let xpxl2 = xend as i32;
        let ypxl2 = yend.floor() as i32;
        let fpart = yend - yend.floor();
        plot(self, xpxl2, ypxl2, (1.0 - fpart) * xgap);
        plot(self, xpxl2, ypxl2 + 1, fpart * xgap);

        // Main line body
        for x in (xpxl1 + 1)..xpxl2 {
            let ipart = intery.floor();
            let fpart = intery - ipart;
            plot(self, x, ipart as i32, 1.0 - fpart);
            plot(self, x, ipart as i32 + 1, fpart);
            intery += gradient;
        }
    }

    // ========================================================================
    // Gradient Primitives
    // ========================================================================

    /// Elliptical radial gradient, the software stand-in for a canvas
    /// `createRadialGradient` fill. `rx`/`ry` are the rim radii; stops are
    /// sampled by normalized elliptical distance. Pixels outside `clip`
    /// are left untouched.
    pub fn fill_radial_gradient(
        &mut self,
        cx: f32,
        cy: f32,
        rx: f32,
        ry: f32,
        stops: &[GradientStop],
        mode: BlendMode,
        clip: Option<ClipCircle>,
    ) {
        if rx <= 0.0 || ry <= 0.0 || stops.is_empty() || self.pixels.is_empty() {
            return;
        }
        let x_start = ((cx - rx).floor() as i32).max(0);
        let x_end = ((cx + rx).ceil() as i32).min(self.width as i32 - 1);
        let y_start = ((cy - ry).floor() as i32).max(0);
        let y_end = ((cy + ry).ceil() as i32).min(self.height as i32 - 1);
        let inv_rx = 1.0 / rx;
        let inv_ry = 1.0 / ry;

        for y in y_start..=y_end {
            let py = y as f32 + 0.5;
            let ny = (py - cy) * inv_ry;
            for x in x_start..=x_end {
                let px = x as f32 + 0.5;
                if let Some(c) = clip {
                    if !c.contains(px, py) {
                        continue;
                    }
                }
                let nx = (px - cx) * inv_rx;
                let d_sq = nx * nx + ny * ny;
                if d_sq > 1.0 {
                    continue;
                }
                let (r, g, b, a) = sample_stops(stops, d_sq.sqrt());
                let a8 = unit_to_u8(a);
                if a8 == 0 {
                    continue;
                }
                let idx = self.pixel_index(x as u32, y as u32);
                blend_premultiplied(
                    &mut self.pixels[idx..idx + 4],
                    mul_255(r as u8, a8),
                    mul_255(g as u8, a8),
                    mul_255(b as u8, a8),
                    a8,
                    mode,
                );
            }
        }
    }

    // ========================================================================
    // Buffer Operations
    // ========================================================================

    /// Composite a premultiplied source buffer onto this one at (dst_x, dst_y).
    /// `opacity` scales the whole source.
    pub fn composite(
        &mut self,
        src: &PixelBuffer,
        dst_x: i32,
        dst_y: i32,
        mode: BlendMode,
        opacity: f32,
    ) {
        self.composite_clipped(src, dst_x, dst_y, mode, opacity, None);
    }

    /// Like `composite`, restricted to a clip circle in destination space
    pub fn composite_clipped(
        &mut self,
        src: &PixelBuffer,
        dst_x: i32,
        dst_y: i32,
        mode: BlendMode,
        opacity: f32,
        clip: Option<ClipCircle>,
    ) {
        let op = unit_to_u8(opacity);
        if op == 0 {
            return;
        }
        let src_w = src.width() as i32;
        let src_h = src.height() as i32;
        let dst_w = self.width as i32;
        let dst_h = self.height as i32;

        for sy in 0..src_h {
            let dy = dst_y + sy;
            if dy < 0 || dy >= dst_h {
                continue;
            }

            for sx in 0..src_w {
                let dx = dst_x + sx;
                if dx < 0 || dx >= dst_w {
                    continue;
                }
                if let Some(c) = clip {
                    if !c.contains(dx as f32 + 0.5, dy as f32 + 0.5) {
                        continue;
                    }
                }

                let si = src.pixel_index(sx as u32, sy as u32);
                let sa = mul_255(src.pixels[si], op);
                if sa == 0 && mode == BlendMode::Over {
                    continue;
                }
                let sr = mul_255(src.pixels[si + 3], op);
                let sg = mul_255(src.pixels[si + 2], op);
                let sb = mul_255(src.pixels[si + 1], op);

                let di = self.pixel_index(dx as u32, dy as u32);
                blend_premultiplied(&mut self.pixels[di..di + 4], sr, sg, sb, sa, mode);
            }
        }
    }

    /// Stretch a (smaller) source over the whole buffer with bilinear filtering
    pub fn composite_upscaled(&mut self, src: &PixelBuffer, mode: BlendMode) {
        if src.is_empty() || self.pixels.is_empty() {
            return;
        }
        let sw = src.width as f32;
        let sh = src.height as f32;
        let scale_x = sw / self.width as f32;
        let scale_y = sh / self.height as f32;
        let max_x = src.width as i32 - 1;
        let max_y = src.height as i32 - 1;

        for y in 0..self.height {
            let fy = ((y as f32 + 0.5) * scale_y - 0.5).max(0.0);
            let y0 = (fy as i32).min(max_y);
            let y1 = (y0 + 1).min(max_y);
            let ty = fy - y0 as f32;
            for x in 0..self.width {
                let fx = ((x as f32 + 0.5) * scale_x - 0.5).max(0.0);
                let x0 = (fx as i32).min(max_x);
                let x1 = (x0 + 1).min(max_x);
                let tx = fx - x0 as f32;

                let i00 = src.pixel_index(x0 as u32, y0 as u32);
                let i10 = src.pixel_index(x1 as u32, y0 as u32);
                let i01 = src.pixel_index(x0 as u32, y1 as u32);
                let i11 = src.pixel_index(x1 as u32, y1 as u32);

                let mut out = [0u8; 4];
                for (c, slot) in out.iter_mut().enumerate() {
                    let top = src.pixels[i00 + c] as f32 * (1.0 - tx) + src.pixels[i10 + c] as f32 * tx;
                    let bot = src.pixels[i01 + c] as f32 * (1.0 - tx) + src.pixels[i11 + c] as f32 * tx;
                    *slot = (top * (1.0 - ty) + bot * ty + 0.5) as u8;
                }
                if out[0] == 0 && mode == BlendMode::Over {
                    continue;
                }
                let di = self.pixel_index(x, y);
                blend_premultiplied(
                    &mut self.pixels[di..di + 4],
                    out[3],
                    out[2],
                    out[1],
                    out[0],
                    mode,
                );
            }
        }
    }

    /// Draw `src` centered at (cx, cy), rotated by `angle` radians,
    /// nearest-neighbour sampled.
    pub fn draw_sprite_rotated(
        &mut self,
        src: &PixelBuffer,
        cx: f32,
        cy: f32,
        angle: f32,
        opacity: f32,
        mode: BlendMode,
    ) {
        let op = unit_to_u8(opacity);
        if op == 0 || src.is_empty() {
            return;
        }
        let half_w = src.width as f32 * 0.5;
        let half_h = src.height as f32 * 0.5;
        let reach = (half_w * half_w + half_h * half_h).sqrt();
        let (sin, cos) = angle.sin_cos();

        let x_start = ((cx - reach).floor() as i32).max(0);
        let x_end = ((cx + reach).ceil() as i32).min(self.width as i32 - 1);
        let y_start = ((cy - reach).floor() as i32).max(0);
        let y_end = ((cy + reach).ceil() as i32).min(self.height as i32 - 1);

        for y in y_start..=y_end {
            let dy = y as f32 + 0.5 - cy;
            for x in x_start..=x_end {
                let dx = x as f32 + 0.5 - cx;
                // Inverse rotation back into sprite space
                let sx = (dx * cos + dy * sin + half_w).floor() as i32;
                let sy = (-dx * sin + dy * cos + half_h).floor() as i32;
                if !src.in_bounds(sx, sy) {
                    continue;
                }
                let si = src.pixel_index(sx as u32, sy as u32);
                let sa = mul_255(src.pixels[si], op);
                if sa == 0 {
                    continue;
                }
                let di = self.pixel_index(x as u32, y as u32);
                blend_premultiplied(
                    &mut self.pixels[di..di + 4],
                    mul_255(src.pixels[si + 3], op),
                    mul_255(src.pixels[si + 2], op),
                    mul_255(src.pixels[si + 1], op),
                    sa,
                    mode,
                );
            }
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    // ========================================================================
    // Post-processing
    // ========================================================================

    /// Separable box blur over all four premultiplied channels using a sliding
    /// window. O(width*height) regardless of radius. Clamps at edges.
    pub fn box_blur(&mut self, radius: u32) {
        if radius == 0 || self.pixels.is_empty() {
            return;
        }
        let w = self.width as i32;
        let h = self.height as i32;
        let r = radius as i32;
        let div = 2 * radius + 1;
        let stride = self.width as usize;

        let mut temp = vec![0u8; self.pixels.len()];

        // --- Horizontal pass: self.pixels → temp ---
        for y in 0..h as usize {
            let mut sum = [0u32; 4];
            for i in -r..=r {
                let sx = i.clamp(0, w - 1) as usize;
                let idx = (y * stride + sx) * 4;
                for c in 0..4 {
                    sum[c] += self.pixels[idx + c] as u32;
                }
            }
            for x in 0..w {
                let idx = (y * stride + x as usize) * 4;
                for c in 0..4 {
                    temp[idx + c] = (sum[c] / div) as u8;
                }
                let leave = (x - r).clamp(0, w - 1) as usize;
                let enter = (x + r + 1).clamp(0, w - 1) as usize;
                let li = (y * stride + leave) * 4;
                let ei = (y * stride + enter) * 4;
                for c in 0..4 {
                    sum[c] = sum[c] + self.pixels[ei + c] as u32 - self.pixels[li + c] as u32;
                }
            }
        }

        // --- Vertical pass: temp → self.pixels ---
        for x in 0..w as usize {
            let mut sum = [0u32; 4];
            for i in -r..=r {
                let sy = i.clamp(0, h - 1) as usize;
                let idx = (sy * stride + x) * 4;
                for c in 0..4 {
                    sum[c] += temp[idx + c] as u32;
                }
            }
            for y in 0..h {
                let idx = (y as usize * stride + x) * 4;
                for c in 0..4 {
                    self.pixels[idx + c] = (sum[c] / div) as u8;
                }
                let leave = (y - r).clamp(0, h - 1) as usize;
                let enter = (y + r + 1).clamp(0, h - 1) as usize;
                let li = (leave * stride + x) * 4;
                let ei = (enter * stride + x) * 4;
                for c in 0..4 {
                    sum[c] = sum[c] + temp[ei + c] as u32 - temp[li + c] as u32;
                }
            }
        }
    }
}

impl Default for PixelBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_transparent() {
        let buf = PixelBuffer::with_size(4, 4);
        assert_eq!(buf.get_pixel_rgba(1, 1), Some((0, 0, 0, 0)));
        assert_eq!(buf.get_pixel_rgba(4, 0), None);
    }

    #[test]
    fn test_resize_ignores_zero_dimensions() {
        let mut buf = PixelBuffer::with_size(8, 6);
        assert!(!buf.resize(0, 10));
        assert!(!buf.resize(10, 0));
        assert_eq!((buf.width(), buf.height()), (8, 6));
        assert!(buf.resize(3, 2));
        assert_eq!(buf.as_bytes().len(), 3 * 2 * 4);
    }

    #[test]
    fn test_over_blend_onto_transparent_is_premultiplied() {
        let mut buf = PixelBuffer::with_size(1, 1);
        buf.blend_pixel(0, 0, 200, 100, 0, 128, BlendMode::Over);
        let (r, g, b, a) = buf.get_pixel_rgba(0, 0).unwrap();
        assert_eq!(a, 128);
        assert_eq!(r, mul_255(200, 128));
        assert_eq!(g, mul_255(100, 128));
        assert_eq!(b, 0);
    }

    #[test]
    fn test_screen_never_darkens() {
        let mut buf = PixelBuffer::with_size(1, 1);
        buf.clear(120, 60, 30);
        buf.blend_pixel(0, 0, 10, 10, 10, 255, BlendMode::Screen);
        let (r, g, b, a) = buf.get_pixel_rgba(0, 0).unwrap();
        assert!(r >= 120 && g >= 60 && b >= 30);
        assert_eq!(a, 255);
    }

    #[test]
    fn test_radial_gradient_respects_clip() {
        let mut buf = PixelBuffer::with_size(20, 20);
        let stops = [GradientStop::new(0.0, (255, 255, 255), 1.0), GradientStop::new(1.0, (255, 255, 255), 1.0)];
        let clip = ClipCircle {
            cx: 10.0,
            cy: 10.0,
            radius: 3.0,
        };
        buf.fill_radial_gradient(10.0, 10.0, 9.0, 9.0, &stops, BlendMode::Over, Some(clip));
        assert_eq!(buf.get_pixel_rgba(10, 10).map(|p| p.3), Some(255));
        assert_eq!(buf.get_pixel_rgba(10, 17).map(|p| p.3), Some(0));
    }

    #[test]
    fn test_box_blur_preserves_flat_field() {
        let mut buf = PixelBuffer::with_size(9, 7);
        buf.clear_rgba(40, 80, 120, 200);
        buf.box_blur(2);
        assert_eq!(buf.get_pixel_rgba(4, 3), Some((40, 80, 120, 200)));
        assert_eq!(buf.get_pixel_rgba(0, 0), Some((40, 80, 120, 200)));
    }

    #[test]
    fn test_upscale_fills_destination() {
        let mut small = PixelBuffer::with_size(2, 2);
        small.clear(255, 0, 0);
        let mut big = PixelBuffer::with_size(8, 8);
        big.composite_upscaled(&small, BlendMode::Over);
        assert_eq!(big.get_pixel_rgba(7, 7), Some((255, 0, 0, 255)));
        assert_eq!(big.get_pixel_rgba(0, 0), Some((255, 0, 0, 255)));
    }

    #[test]
    fn test_release_frees_storage() {
        let mut buf = PixelBuffer::with_size(16, 16);
        buf.release();
        assert!(buf.is_empty());
        // Drawing into a released buffer is harmless
        buf.blend_pixel(1, 1, 255, 255, 255, 255, BlendMode::Over);
        buf.box_blur(3);
    }

    #[test]
    fn test_debug_shows_size_not_pixels() {
        let buf = PixelBuffer::with_size(3, 2);
        let text = format!("{:?}", buf);
        assert_eq!(text, "PixelBuffer { width: 3, height: 2, .. }");
    }
}
