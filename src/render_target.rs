//! Off-screen render targets and the per-frame execution context.

use image::{Rgba, RgbaImage};

use crate::error::{Error, Result};
use crate::gpu::GpuContext;

/// Format of the color and normal capture buffers.
///
/// A float format keeps linear scene color and encoded normals unclamped and
/// unquantized before the composite pass reads them.
pub const CAPTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Depth format shared by both scene captures.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Clamp a requested size to something wgpu accepts.
///
/// Zero dimensions are promoted to 1, so a stylizer that has never been
/// sized renders a degenerate 1x1 image instead of failing validation.
pub fn target_extent(width: u32, height: u32) -> (u32, u32) {
    (width.max(1), height.max(1))
}

/// An off-screen texture that passes render into and later passes sample.
///
/// Unlike the swapchain, a render target's size is owned by whoever created
/// it and only changes through [`resize`](Self::resize).
pub struct RenderTarget {
    /// The underlying GPU texture.
    pub texture: wgpu::Texture,
    /// View used both as a color/depth attachment and as a shader input.
    pub view: wgpu::TextureView,
    label: String,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
}

impl RenderTarget {
    /// Allocate a target of the given size and format.
    ///
    /// Color formats can be rendered to, sampled and copied from. Depth
    /// formats are attachment-only.
    pub fn new(
        gpu: &GpuContext,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        let (width, height) = target_extent(width, height);

        let usage = if format.is_depth_stencil_format() {
            wgpu::TextureUsages::RENDER_ATTACHMENT
        } else {
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
        };

        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            label: label.to_owned(),
            format,
            width,
            height,
        }
    }

    /// Reallocate at a new size. Returns `true` if the texture was replaced.
    ///
    /// Contents are not preserved; every target is fully rewritten each frame.
    pub fn resize(&mut self, gpu: &GpuContext, width: u32, height: u32) -> bool {
        if self.size() == target_extent(width, height) {
            return false;
        }
        *self = Self::new(gpu, &self.label, width, height, self.format);
        true
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Copy the target back to the CPU, blocking until the GPU is done.
    ///
    /// Only 8-bit RGBA and BGRA targets can be read; BGRA is swizzled to RGBA.
    pub fn read_rgba8(&self, gpu: &GpuContext) -> Result<RgbaImage> {
        let swap_red_blue = match self.format {
            wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => false,
            wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb => true,
            other => return Err(Error::UnsupportedFormat(other)),
        };

        let bytes_per_row = padded_bytes_per_row(self.width);
        let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: bytes_per_row as u64 * self.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        gpu.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        let _ = gpu.device.poll(wgpu::PollType::wait_indefinitely());
        receiver.recv().unwrap_or(Err(wgpu::BufferAsyncError))?;

        let data = slice.get_mapped_range();
        let image = RgbaImage::from_fn(self.width, self.height, |x, y| {
            let i = (y * bytes_per_row + x * 4) as usize;
            let [r, g, b, a] = [data[i], data[i + 1], data[i + 2], data[i + 3]];
            if swap_red_blue {
                Rgba([b, g, r, a])
            } else {
                Rgba([r, g, b, a])
            }
        });
        drop(data);
        buffer.unmap();

        log::debug!("read back '{}' ({}x{})", self.label, self.width, self.height);
        Ok(image)
    }
}

/// Row pitch of a 4-byte-per-texel copy, padded to wgpu's copy alignment.
fn padded_bytes_per_row(width: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (4 * width).div_ceil(align) * align
}

/// Resources a pass needs while a frame is being recorded.
///
/// All passes of one frame append to the same encoder, so their submission
/// order is their recording order.
pub struct RenderContext<'a> {
    pub gpu: &'a GpuContext,
    pub encoder: &'a mut wgpu::CommandEncoder,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_extent_becomes_one_pixel() {
        assert_eq!(target_extent(0, 0), (1, 1));
        assert_eq!(target_extent(0, 480), (1, 480));
        assert_eq!(target_extent(640, 480), (640, 480));
    }

    #[test]
    fn readback_rows_are_aligned() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
    }

    #[test]
    fn capture_format_is_filterable_color() {
        assert!(!CAPTURE_FORMAT.is_depth_stencil_format());
        assert!(DEPTH_FORMAT.is_depth_stencil_format());
    }
}
