//! Optional finishing stage: radial chromatic aberration, then desaturation.

use crate::fullscreen;
use crate::gpu::GpuContext;
use crate::params::StylizeParams;
use crate::render_target::{RenderContext, RenderTarget};

const SHADER: &str = include_str!("shaders/finishing.wgsl");

/// Matches `Params` in `finishing.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FinishingUniforms {
    pub delta: f32,
    pub _padding: [f32; 3],
}

impl FinishingUniforms {
    pub fn from_params(params: &StylizeParams) -> Self {
        Self {
            delta: params.aberration_delta,
            _padding: [0.0; 3],
        }
    }
}

pub struct FinishingPass {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    output: RenderTarget,
}

impl FinishingPass {
    pub fn new(gpu: &GpuContext) -> Self {
        let bind_group_layout =
            gpu.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Finishing Bind Group Layout"),
                    entries: &[
                        fullscreen::uniform_entry(0),
                        fullscreen::texture_entry(1),
                        fullscreen::sampler_entry(2),
                    ],
                });

        // Offset channels land between texels and past the border.
        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Finishing Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let pipeline = fullscreen::pipeline(gpu, "Finishing Pipeline", SHADER, &bind_group_layout);
        let uniform_buffer = fullscreen::uniform_buffer::<FinishingUniforms>(gpu, "Finishing Uniforms");
        let output = RenderTarget::new(gpu, "Finishing Output", 1, 1, gpu.format());

        Self {
            pipeline,
            uniform_buffer,
            bind_group_layout,
            sampler,
            output,
        }
    }

    pub fn output(&self) -> &RenderTarget {
        &self.output
    }

    pub fn resize(&mut self, gpu: &GpuContext, width: u32, height: u32) -> bool {
        self.output.resize(gpu, width, height)
    }

    /// Record the finishing pass, sampling `input` and writing `target`.
    pub fn render(
        &self,
        ctx: &mut RenderContext,
        uniforms: &FinishingUniforms,
        input: &wgpu::TextureView,
        target: &wgpu::TextureView,
    ) {
        ctx.gpu
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));

        let bind_group = ctx.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Finishing Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(input),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        fullscreen::draw(ctx.encoder, "Finishing Pass", target, &self.pipeline, &bind_group);
    }

    pub fn render_to_output(
        &self,
        ctx: &mut RenderContext,
        uniforms: &FinishingUniforms,
        input: &wgpu::TextureView,
    ) {
        self.render(ctx, uniforms, input, &self.output.view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::testing::{headless, submit};
    use crate::reference;
    use crate::texture::Texture;
    use image::{Rgba, RgbaImage};

    #[test]
    fn uniforms_are_one_vec4() {
        assert_eq!(std::mem::size_of::<FinishingUniforms>(), 16);
    }

    #[test]
    fn uniforms_take_the_aberration_delta() {
        let params = StylizeParams {
            aberration_delta: 7.5,
            ..Default::default()
        };
        assert_eq!(FinishingUniforms::from_params(&params).delta, 7.5);
    }

    #[test]
    fn shader_declares_entry_points() {
        assert!(SHADER.contains("fn vs("));
        assert!(SHADER.contains("fn fs("));
        assert!(SHADER.contains("delta: f32"));
        assert!(SHADER.contains("@binding(2)"));
    }

    #[test]
    fn gpu_aberration_matches_cpu_reference() {
        let Some(gpu) = headless() else { return };
        let (width, height) = (48, 40);
        let delta = 20.0;

        // Red ramps across and blue ramps down, so a channel offset in the
        // wrong direction changes the luma near every border.
        let input = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([
                (x * 255 / (width - 1)) as u8,
                128,
                (y * 255 / (height - 1)) as u8,
                255,
            ])
        });
        let texture = Texture::from_image(&gpu, &input, "Test Composite");

        let mut pass = FinishingPass::new(&gpu);
        pass.resize(&gpu, width, height);
        let uniforms = FinishingUniforms {
            delta,
            _padding: [0.0; 3],
        };
        submit(&gpu, |ctx| pass.render_to_output(ctx, &uniforms, &texture.view));
        let actual = pass.output().read_rgba8(&gpu).unwrap();

        let linear = reference::linear_from_srgb(&input);
        let expected = reference::finish(&linear, delta);
        let unshifted = reference::finish(&linear, 0.0);
        let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as i32;

        let mut shifted = 0;
        for (x, y, p) in actual.enumerate_pixels() {
            let e = to_u8(expected.get_pixel(x, y)[0]);
            assert!((p[0] as i32 - e).abs() <= 2, "({x}, {y}): {} vs {e}", p[0]);
            assert_eq!(p[0], p[1]);
            assert_eq!(p[1], p[2]);
            if (e - to_u8(unshifted.get_pixel(x, y)[0])).abs() > 2 {
                shifted += 1;
            }
        }
        assert!(shifted > 0, "aberration left every pixel unchanged");
    }
}
