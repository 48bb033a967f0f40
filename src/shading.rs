//! Per-pixel stylization math.
//!
//! Every function here has a WGSL twin in `shaders/composite.wgsl` or
//! `shaders/finishing.wgsl`, and the two are kept formula-for-formula
//! identical. The Rust side exists so the shading can be reasoned about and
//! tested without a GPU, and so [`reference`](crate::reference) can run the
//! whole recipe on the CPU.
//!
//! All functions are pure: a pixel's result depends only on the samples it
//! is handed.

use glam::{Mat2, Vec2, Vec3, Vec4};

use crate::params::StylizeParams;

/// Rec. 601 luminance weights.
pub const LUMA_WEIGHTS: Vec3 = Vec3::new(0.299, 0.587, 0.114);

/// Base frequency of the halftone dot screen, in cells per pixel.
pub const HALFTONE_FREQUENCY: f32 = 0.05;

/// 45° rotation of the dot screen (columns of the WGSL `mat2x2f`).
pub const HALFTONE_BASIS: Mat2 =
    Mat2::from_cols(Vec2::new(0.707, -0.707), Vec2::new(0.707, 0.707));

/// Sobel weights, indexed `[row][column]` with row 0 at `dy = -1`.
const SOBEL_X: [[f32; 3]; 3] = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];
const SOBEL_Y: [[f32; 3]; 3] = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];

/// Radial falloff of the chromatic aberration offset.
pub const ABERRATION_FALLOFF: f32 = 0.7;

pub fn luma(rgb: Vec3) -> f32 {
    rgb.dot(LUMA_WEIGHTS)
}

/// GLSL/WGSL `smoothstep`. Undefined (NaN or a hard step) when `e0 == e1`.
pub fn smoothstep(e0: f32, e1: f32, x: f32) -> f32 {
    let t = ((x - e0) / (e1 - e0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn fract(v: Vec2) -> Vec2 {
    v - v.floor()
}

/// 3x3 Sobel gradient of the normal image around one pixel.
///
/// `sample(dx, dy)` returns the encoded normal at the given pixel offset.
/// The result holds the magnitude of the horizontal and vertical RGB
/// gradients, scaled by `contour`.
pub fn sobel(sample: impl Fn(i32, i32) -> Vec3, contour: f32) -> Vec2 {
    let mut gx = Vec3::ZERO;
    let mut gy = Vec3::ZERO;
    for (row, dy) in (-1..=1).enumerate() {
        for (col, dx) in (-1..=1).enumerate() {
            let n = sample(dx, dy);
            gx += SOBEL_X[row][col] * n;
            gy += SOBEL_Y[row][col] * n;
        }
    }
    contour * Vec2::new(gx.length(), gy.length())
}

/// 1 on flat surfaces, falling towards (and past) 0 at creases.
pub fn edge_strength(gradient: Vec2) -> f32 {
    1.0 - gradient.length()
}

/// Anti-aliased threshold of an edge strength around 0.5.
///
/// `aa` is the screen-space footprint of one pixel (the normalized length of
/// `fwidth` of the pixel coordinate). The composite runs as a full-screen
/// pass at capture resolution, where it is always exactly 1, so the band
/// half-width is `thickness` in practice.
pub fn edge_mask(edge: f32, thickness: f32, aa: f32) -> f32 {
    let w = thickness * aa;
    smoothstep(0.5 - w, 0.5 + w, edge)
}

pub fn remap_luma(l0: f32, min_luma: f32, max_luma: f32) -> f32 {
    smoothstep(min_luma, max_luma, l0)
}

/// Posterize into `levels + 1` evenly spaced bands.
///
/// Uses round-half-to-even like WGSL `round`. `levels = 0` divides by zero.
pub fn quantize(l: f32, levels: f32) -> f32 {
    (l * levels).round_ties_even() / levels
}

/// Halftone dot mask for one pixel: 1 inside a dot, 0 elsewhere.
///
/// Only pixels brighter than `1 - light` get dots; the dot radius grows with
/// how far `l0` exceeds that threshold.
pub fn halftone(l0: f32, pixel: Vec2, scale: f32, thickness: f32, light: f32) -> f32 {
    let threshold = 1.0 - light;
    if l0 <= threshold {
        return 0.0;
    }
    let w = thickness.clamp(0.0, 1.0);
    let st = HALFTONE_FREQUENCY * scale * (HALFTONE_BASIS * pixel);
    let cell = w * (2.0 * fract(st) - Vec2::ONE);
    let radius = (l0 - threshold).sqrt();
    if radius - cell.length() >= 0.0 { 1.0 } else { 0.0 }
}

/// Ink coverage: white at `shade = 1`, the ink color at `shade = 0`.
pub fn ink(shade: f32, ink_rgb: Vec3) -> Vec3 {
    Vec3::ONE.lerp(ink_rgb, 1.0 - shade)
}

pub fn blend_darken(a: Vec3, b: Vec3) -> Vec3 {
    a.min(b)
}

pub fn blend_screen(a: Vec3, b: Vec3) -> Vec3 {
    Vec3::ONE - (Vec3::ONE - a) * (Vec3::ONE - b)
}

/// Everything the composite needs to know about one pixel.
#[derive(Clone, Copy, Debug)]
pub struct CompositeSample {
    /// Scene color capture.
    pub color: Vec3,
    /// Normal gradient from [`sobel`].
    pub gradient: Vec2,
    /// Paper texture sample.
    pub paper: Vec3,
    /// Pixel-space coordinate of the fragment center.
    pub pixel: Vec2,
    /// Edge anti-aliasing footprint, see [`edge_mask`].
    pub aa: f32,
}

/// The full composite for one pixel. Alpha is always 1.
pub fn composite(sample: &CompositeSample, params: &StylizeParams) -> Vec4 {
    let mask = edge_mask(edge_strength(sample.gradient), params.thickness, sample.aa);

    let l0 = luma(sample.color);
    let l = remap_luma(l0, params.min_luma, params.max_luma);
    let shade = quantize(l, params.levels) * mask;

    let ink = ink(shade, Vec3::from_array(params.ink_rgb()));
    let dots = Vec3::splat(halftone(
        l0,
        sample.pixel,
        params.scale,
        params.thickness,
        params.light,
    ));

    blend_screen(blend_darken(sample.paper, ink), dots).extend(1.0)
}

/// Radial sample offset for the finishing pass at a normalized uv.
pub fn aberration_offset(uv: Vec2, delta: f32) -> Vec2 {
    let dir = uv - Vec2::splat(0.5);
    let d = ABERRATION_FALLOFF * dir.length();
    d * dir * delta
}

/// Finishing pass for one pixel: red and blue are fetched along opposite
/// radial offsets, green in place, and the result is desaturated.
///
/// `sample(uv)` reads the composite output at a normalized coordinate.
pub fn finish(sample: impl Fn(Vec2) -> Vec4, uv: Vec2, resolution: Vec2, delta: f32) -> Vec4 {
    let value = aberration_offset(uv, delta);
    let r = sample(uv - value / resolution.x).x;
    let g = sample(uv).y;
    let b = sample(uv + value / resolution.y).z;
    let c = luma(Vec3::new(r, g, b));
    Vec4::new(c, c, c, 1.0)
}
