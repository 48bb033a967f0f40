//! CPU rendition of the composite and finishing passes.
//!
//! Runs the same per-pixel math as the GPU passes over `image` float
//! buffers, one pixel at a time. It is much too slow for interactive use but
//! needs no adapter, so it doubles as a headless renderer for stills and as
//! the oracle the end-to-end tests check against.
//!
//! Conventions follow the GPU side: pixel `(x, y)` is sampled at its center
//! `(x + 0.5, y + 0.5)` with the origin in the top-left corner, captures are
//! read with clamp-to-edge addressing and the paper tiles.

use glam::{Vec2, Vec4};
use image::{Rgba, Rgba32FImage, RgbaImage};

use crate::params::StylizeParams;
use crate::shading::{self, CompositeSample};

/// Texture addressing outside `0..1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wrap {
    Clamp,
    Repeat,
}

/// Stylize a color and normal capture of identical size.
///
/// # Panics
///
/// Panics if `color` and `normals` differ in size; the orchestrator never
/// lets that happen, and a mismatch here is a caller bug.
pub fn stylize(
    color: &Rgba32FImage,
    normals: &Rgba32FImage,
    paper: &Rgba32FImage,
    params: &StylizeParams,
    paper_scale: f32,
) -> Rgba32FImage {
    assert_eq!(
        color.dimensions(),
        normals.dimensions(),
        "color and normal captures must share dimensions"
    );

    let (width, height) = color.dimensions();
    Rgba32FImage::from_fn(width, height, |x, y| {
        let pixel = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
        let normal_at = |dx: i32, dy: i32| fetch(normals, x as i32 + dx, y as i32 + dy).truncate();

        let sample = CompositeSample {
            color: fetch(color, x as i32, y as i32).truncate(),
            gradient: shading::sobel(normal_at, params.contour),
            paper: sample_bilinear(paper, paper_scale * pixel, Wrap::Repeat).truncate(),
            pixel,
            aa: 1.0,
        };
        to_pixel(shading::composite(&sample, params))
    })
}

/// Apply the finishing pass to a composite image.
pub fn finish(image: &Rgba32FImage, delta: f32) -> Rgba32FImage {
    let (width, height) = image.dimensions();
    let resolution = Vec2::new(width as f32, height as f32);

    Rgba32FImage::from_fn(width, height, |x, y| {
        let uv = Vec2::new(x as f32 + 0.5, y as f32 + 0.5) / resolution;
        let sample = |uv: Vec2| sample_bilinear(image, uv, Wrap::Clamp);
        to_pixel(shading::finish(sample, uv, resolution, delta))
    })
}

/// Decode an sRGB 8-bit image into linear floats, as the GPU does when it
/// samples an `Rgba8UnormSrgb` texture.
pub fn linear_from_srgb(image: &RgbaImage) -> Rgba32FImage {
    let decode = |c: u8| {
        let c = c as f32 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    Rgba32FImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        Rgba([decode(r), decode(g), decode(b), a as f32 / 255.0])
    })
}

/// A uniform image, handy for flat test scenes.
pub fn solid(width: u32, height: u32, color: Vec4) -> Rgba32FImage {
    Rgba32FImage::from_pixel(width, height, to_pixel(color))
}

/// Texel fetch with clamp-to-edge addressing.
fn fetch(image: &Rgba32FImage, x: i32, y: i32) -> Vec4 {
    let x = x.clamp(0, image.width() as i32 - 1) as u32;
    let y = y.clamp(0, image.height() as i32 - 1) as u32;
    Vec4::from_array(image.get_pixel(x, y).0)
}

fn wrap_texel(i: i32, size: u32, wrap: Wrap) -> i32 {
    match wrap {
        Wrap::Clamp => i.clamp(0, size as i32 - 1),
        Wrap::Repeat => i.rem_euclid(size as i32),
    }
}

/// Bilinear sample at a normalized coordinate.
pub fn sample_bilinear(image: &Rgba32FImage, uv: Vec2, wrap: Wrap) -> Vec4 {
    let size = Vec2::new(image.width() as f32, image.height() as f32);
    let texel = uv * size - Vec2::splat(0.5);
    let base = texel.floor();
    let t = texel - base;

    let texel_at = |dx: i32, dy: i32| {
        let x = wrap_texel(base.x as i32 + dx, image.width(), wrap);
        let y = wrap_texel(base.y as i32 + dy, image.height(), wrap);
        fetch(image, x, y)
    };

    let top = texel_at(0, 0).lerp(texel_at(1, 0), t.x);
    let bottom = texel_at(0, 1).lerp(texel_at(1, 1), t.x);
    top.lerp(bottom, t.y)
}

fn to_pixel(v: Vec4) -> Rgba<f32> {
    Rgba(v.to_array())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shading::luma;
    use glam::Vec3;

    const EPS: f32 = 1e-4;
    const FLAT_NORMAL: Vec4 = Vec4::new(0.5, 0.5, 1.0, 1.0);

    fn paper() -> Rgba32FImage {
        linear_from_srgb(&crate::texture::paper_image(16, 1))
    }

    fn rgb(p: &Rgba<f32>) -> Vec3 {
        Vec3::new(p[0], p[1], p[2])
    }

    #[test]
    fn white_scene_at_full_light_is_screened_white() {
        let params = StylizeParams {
            levels: 1.0,
            min_luma: 0.0,
            max_luma: 1.0,
            light: 1.0,
            thickness: 0.5,
            ..Default::default()
        };
        let color = solid(24, 16, Vec4::ONE);
        let normals = solid(24, 16, FLAT_NORMAL);

        let out = stylize(&color, &normals, &paper(), &params, 0.00025);
        for p in out.pixels() {
            assert!(rgb(p).abs_diff_eq(Vec3::ONE, EPS), "{p:?}");
            assert_eq!(p[3], 1.0);
        }
    }

    #[test]
    fn black_scene_is_solid_ink() {
        let params = StylizeParams::default();
        let color = solid(24, 16, Vec4::new(0.0, 0.0, 0.0, 1.0));
        let normals = solid(24, 16, FLAT_NORMAL);

        let out = stylize(&color, &normals, &paper(), &params, 0.00025);
        let ink = Vec3::from_array(params.ink_rgb());
        for p in out.pixels() {
            assert!(rgb(p).abs_diff_eq(ink, EPS), "{p:?}");
        }
    }

    #[test]
    fn normal_creases_are_inked() {
        let params = StylizeParams {
            levels: 1.0,
            min_luma: 0.0,
            max_luma: 1.0,
            light: 0.0,
            thickness: 0.5,
            ..Default::default()
        };
        let color = solid(32, 8, Vec4::new(0.9, 0.9, 0.9, 1.0));
        let normals = Rgba32FImage::from_fn(32, 8, |x, _| {
            if x < 16 {
                to_pixel(FLAT_NORMAL)
            } else {
                Rgba([1.0, 0.5, 0.5, 1.0])
            }
        });
        let paper = paper();

        let out = stylize(&color, &normals, &paper, &params, 0.00025);
        let ink = Vec3::from_array(params.ink_rgb());
        for y in 0..8 {
            assert!(rgb(out.get_pixel(15, y)).abs_diff_eq(ink, EPS));
            assert!(rgb(out.get_pixel(16, y)).abs_diff_eq(ink, EPS));
            // Away from the crease the paper shows through untouched.
            let far = rgb(out.get_pixel(4, y));
            let paper_here = sample_bilinear(&paper, 0.00025 * Vec2::new(4.5, y as f32 + 0.5), Wrap::Repeat);
            assert!(far.abs_diff_eq(paper_here.truncate(), EPS));
        }
    }

    #[test]
    #[should_panic(expected = "share dimensions")]
    fn mismatched_captures_panic() {
        let color = solid(8, 8, Vec4::ONE);
        let normals = solid(8, 4, FLAT_NORMAL);
        stylize(&color, &normals, &paper(), &StylizeParams::default(), 0.00025);
    }

    #[test]
    fn finish_without_aberration_is_luma_of_input() {
        let input = Rgba32FImage::from_fn(20, 10, |x, y| {
            Rgba([x as f32 / 20.0, y as f32 / 10.0, 0.3, 1.0])
        });
        let out = finish(&input, 0.0);
        for (x, y, p) in out.enumerate_pixels() {
            let expected = luma(rgb(input.get_pixel(x, y)));
            assert!((p[0] - expected).abs() < EPS, "({x}, {y})");
            assert_eq!(p[0], p[1]);
            assert_eq!(p[1], p[2]);
            assert_eq!(p[3], 1.0);
        }
    }

    #[test]
    fn finish_keeps_the_center_unshifted() {
        let input = Rgba32FImage::from_fn(21, 21, |x, _| Rgba([x as f32 / 21.0, 0.5, 0.0, 1.0]));
        let shifted = finish(&input, 50.0);
        let plain = finish(&input, 0.0);
        assert!((shifted.get_pixel(10, 10)[0] - plain.get_pixel(10, 10)[0]).abs() < EPS);
        assert!((shifted.get_pixel(20, 10)[0] - plain.get_pixel(20, 10)[0]).abs() > EPS);
    }

    #[test]
    fn bilinear_repeat_wraps_around() {
        let image = Rgba32FImage::from_fn(2, 1, |x, _| Rgba([x as f32, 0.0, 0.0, 1.0]));
        // Halfway between the last texel and the wrapped first one.
        let v = sample_bilinear(&image, Vec2::new(1.0, 0.5), Wrap::Repeat);
        assert!((v.x - 0.5).abs() < EPS);
        let v = sample_bilinear(&image, Vec2::new(1.0, 0.5), Wrap::Clamp);
        assert!((v.x - 1.0).abs() < EPS);
    }

    #[test]
    fn srgb_decode_hits_endpoints() {
        let image = RgbaImage::from_pixel(1, 1, Rgba([0, 255, 128, 255]));
        let p = *linear_from_srgb(&image).get_pixel(0, 0);
        assert_eq!(p[0], 0.0);
        assert!((p[1] - 1.0).abs() < EPS);
        assert!((p[2] - 0.2158).abs() < 1e-3);
        assert_eq!(p[3], 1.0);
    }
}
