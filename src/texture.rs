use image::RgbaImage;

use crate::error::Result;
use crate::gpu::GpuContext;

/// A sampled GPU texture, used for the paper asset.
///
/// Textures are uploaded as sRGB and sampled with repeat addressing, since
/// the paper is tiled across the frame.
#[derive(Debug)]
pub struct Texture {
    #[allow(dead_code)]
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) sampler: wgpu::Sampler,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    /// Create a texture from raw RGBA8 data.
    pub fn from_rgba(gpu: &GpuContext, data: &[u8], width: u32, height: u32, label: &str) -> Self {
        use wgpu::util::DeviceExt;

        let texture = gpu.device.create_texture_with_data(
            &gpu.queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            data,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{} Sampler", label)),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            width,
            height,
        }
    }

    pub fn from_image(gpu: &GpuContext, image: &RgbaImage, label: &str) -> Self {
        let (width, height) = image.dimensions();
        Self::from_rgba(gpu, image, width, height, label)
    }

    /// Load a texture from an image file.
    pub fn from_file(gpu: &GpuContext, path: &str) -> Result<Self> {
        let img = image::open(path)?.to_rgba8();
        log::debug!("loaded texture '{}' ({}x{})", path, img.width(), img.height());
        Ok(Self::from_image(gpu, &img, path))
    }

    /// A procedural paper texture for when no paper asset is supplied.
    pub fn paper(gpu: &GpuContext, size: u32, seed: u32) -> Self {
        Self::from_image(gpu, &paper_image(size, seed), "Procedural Paper")
    }
}

/// Generate a tileable off-white paper grain.
///
/// Coarse blotches (8x8 cells) carry the pulp variation and per-pixel noise
/// the fibre grain. Every feature is indexed modulo `size`, so the image
/// tiles seamlessly when `size` is a multiple of 8.
pub fn paper_image(size: u32, seed: u32) -> RgbaImage {
    const BASE: [i32; 3] = [238, 232, 218];
    const CELL: u32 = 8;

    let size = size.max(1);
    RgbaImage::from_fn(size, size, |x, y| {
        let blotch = (hash(x / CELL, y / CELL, seed) % 13) as i32 - 6;
        let grain = (hash(x, y, seed.wrapping_add(7919)) % 17) as i32 - 8;
        // Sparse darker fibres.
        let fibre = if hash(x, y, seed.wrapping_add(104_729)) % 23 == 0 {
            -14
        } else {
            0
        };
        let shift = blotch + grain + fibre;
        let channel = |c: i32| (c + shift).clamp(0, 255) as u8;
        image::Rgba([channel(BASE[0]), channel(BASE[1]), channel(BASE[2]), 255])
    })
}

/// Integer hash for procedural generation.
fn hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_add(x.wrapping_mul(374761393));
    h = h.wrapping_add(y.wrapping_mul(668265263));
    h ^= h >> 13;
    h = h.wrapping_mul(1274126177);
    h ^= h >> 16;
    h
}
