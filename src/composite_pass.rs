//! The ink composite pass.
//!
//! Reads the color capture, the normal capture and the paper texture, and
//! writes the stylized image. The per-pixel recipe lives in
//! `shaders/composite.wgsl`; its Rust mirror is [`shading::composite`].
//!
//! [`shading::composite`]: crate::shading::composite

use crate::fullscreen;
use crate::gpu::GpuContext;
use crate::params::StylizeParams;
use crate::render_target::{RenderContext, RenderTarget};
use crate::texture::Texture;

const SHADER: &str = include_str!("shaders/composite.wgsl");

/// Matches `Params` in `composite.wgsl`. 48 bytes, 16-byte aligned.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CompositeUniforms {
    /// 0-255 per channel.
    pub ink_color: [f32; 3],
    pub scale: f32,
    pub levels: f32,
    pub thickness: f32,
    pub contour: f32,
    pub min_luma: f32,
    pub max_luma: f32,
    pub light: f32,
    pub paper_scale: f32,
    pub _padding: f32,
}

impl CompositeUniforms {
    pub fn from_params(params: &StylizeParams, paper_scale: f32) -> Self {
        Self {
            ink_color: params.ink_color,
            scale: params.scale,
            levels: params.levels,
            thickness: params.thickness,
            contour: params.contour,
            min_luma: params.min_luma,
            max_luma: params.max_luma,
            light: params.light,
            paper_scale,
            _padding: 0.0,
        }
    }
}

/// Views the composite samples in one frame.
#[derive(Clone, Copy)]
pub struct CompositeInputs<'a> {
    pub color: &'a wgpu::TextureView,
    pub normals: &'a wgpu::TextureView,
    pub paper: &'a Texture,
}

pub struct CompositePass {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group_layout: wgpu::BindGroupLayout,
    output: RenderTarget,
}

impl CompositePass {
    pub fn new(gpu: &GpuContext) -> Self {
        let bind_group_layout =
            gpu.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Composite Bind Group Layout"),
                    entries: &[
                        fullscreen::uniform_entry(0),
                        // Color capture
                        fullscreen::texture_entry(1),
                        // Normal capture
                        fullscreen::texture_entry(2),
                        // Paper
                        fullscreen::texture_entry(3),
                        fullscreen::sampler_entry(4),
                    ],
                });

        let pipeline = fullscreen::pipeline(gpu, "Composite Pipeline", SHADER, &bind_group_layout);
        let uniform_buffer = fullscreen::uniform_buffer::<CompositeUniforms>(gpu, "Composite Uniforms");
        let output = RenderTarget::new(gpu, "Composite Output", 1, 1, gpu.format());

        log::info!("composite pass ready ({:?})", gpu.format());

        Self {
            pipeline,
            uniform_buffer,
            bind_group_layout,
            output,
        }
    }

    /// The pass's own output buffer, used when a later stage reads the result.
    pub fn output(&self) -> &RenderTarget {
        &self.output
    }

    pub fn resize(&mut self, gpu: &GpuContext, width: u32, height: u32) -> bool {
        self.output.resize(gpu, width, height)
    }

    /// Record the composite into `target`.
    ///
    /// Uniforms are uploaded here, so parameter changes made before this call
    /// are picked up by this frame and later ones are not.
    pub fn render(
        &self,
        ctx: &mut RenderContext,
        uniforms: &CompositeUniforms,
        inputs: CompositeInputs,
        target: &wgpu::TextureView,
    ) {
        ctx.gpu
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));

        let bind_group = ctx.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Composite Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(inputs.color),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(inputs.normals),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&inputs.paper.view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&inputs.paper.sampler),
                },
            ],
        });

        fullscreen::draw(ctx.encoder, "Composite Pass", target, &self.pipeline, &bind_group);
    }

    /// Record the composite into the pass's own output buffer.
    pub fn render_to_output(
        &self,
        ctx: &mut RenderContext,
        uniforms: &CompositeUniforms,
        inputs: CompositeInputs,
    ) {
        self.render(ctx, uniforms, inputs, &self.output.view);
    }
}
