//! Scene provider for the captures.
//!
//! The stylizer never looks inside a scene. It only asks a [`SceneSource`]
//! to draw itself twice per frame into capture buffers: once as it normally
//! looks and once with every surface replaced by the normal visualization.
//! The replacement is an argument of the call, so nothing about the scene
//! changes between the two draws and nothing can leak into the next frame.
//!
//! [`MeshScene`] is the built-in provider: a list of meshes placed with
//! transforms, lit by one directional light.

use std::num::NonZeroU64;

use glam::{Mat4, Vec3};

use crate::camera::Camera;
use crate::color::Color;
use crate::gpu::GpuContext;
use crate::mesh::{Mesh, Transform, Vertex3d};
use crate::render_target::{CAPTURE_FORMAT, DEPTH_FORMAT, RenderContext};

const SHADER: &str = include_str!("shaders/scene.wgsl");

/// Objects drawn per capture. Extra objects are skipped with a warning.
pub const MAX_OBJECTS: usize = 256;

/// Byte stride between uniform slots, the guaranteed dynamic offset
/// alignment.
const MODEL_STRIDE: u64 = 256;
const CAMERA_STRIDE: u64 = 256;

/// One uniform region per [`MaterialOverride`].
const MATERIAL_SLOTS: u64 = 2;

/// Material used for every surface during one draw.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MaterialOverride {
    /// The scene's own materials.
    #[default]
    None,
    /// View-space normals encoded as `0.5 * n + 0.5`, drawn double-sided.
    Normals,
}

impl MaterialOverride {
    /// Index of the uniform region draws with this material write to.
    fn slot(self) -> u64 {
        match self {
            MaterialOverride::None => 0,
            MaterialOverride::Normals => 1,
        }
    }

    /// Clear color for a capture drawn with this material.
    ///
    /// Normal captures clear to black so the background reads as one flat
    /// region in the edge detector.
    pub fn clear_color(self, background: Color) -> Color {
        match self {
            MaterialOverride::None => background,
            MaterialOverride::Normals => Color::BLACK,
        }
    }
}

/// Where one capture draw lands.
#[derive(Clone, Copy)]
pub struct CaptureTarget<'a> {
    pub color: &'a wgpu::TextureView,
    pub depth: &'a wgpu::TextureView,
    pub size: (u32, u32),
    pub background: Color,
}

impl CaptureTarget<'_> {
    pub fn aspect(&self) -> f32 {
        aspect_ratio(self.size)
    }
}

fn aspect_ratio((width, height): (u32, u32)) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}

/// Anything that can draw itself into a capture buffer.
///
/// Implementations must clear both attachments and must not retain any
/// state from a [`MaterialOverride`] past the call.
///
/// Both captures of a frame are recorded into one encoder before it is
/// submitted. Uniforms uploaded with `queue.write_buffer` land before the
/// whole submission, so an implementation has to keep the color and
/// normal draws in separate buffer regions. [`MeshScene`] keeps one region
/// per material, so recording it twice with the same material in one
/// encoder leaves both draws reading the last upload.
pub trait SceneSource {
    fn render(
        &self,
        ctx: &mut RenderContext,
        camera: &Camera,
        target: CaptureTarget,
        material: MaterialOverride,
    );
}

/// Camera and light uniforms. Matches `Camera` in `scene.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub position: [f32; 3],
    pub ambient: f32,
    pub to_light: [f32; 3],
    pub _padding: f32,
}

impl CameraUniforms {
    pub fn new(camera: &Camera, aspect: f32, to_light: Vec3, ambient: f32) -> Self {
        Self {
            view_proj: camera.view_projection(aspect).to_cols_array_2d(),
            view: camera.view_matrix().to_cols_array_2d(),
            position: camera.position.to_array(),
            ambient,
            to_light: to_light.normalize_or_zero().to_array(),
            _padding: 0.0,
        }
    }
}

/// Per-object uniforms. Matches `Model` in `scene.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelUniforms {
    pub model: [[f32; 4]; 4],
    /// Inverse transpose of `model`, so normals survive non-uniform scale.
    pub normal_matrix: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl ModelUniforms {
    pub fn new(transform: &Transform, color: Color) -> Self {
        let model = transform.matrix();
        Self {
            model: model.to_cols_array_2d(),
            normal_matrix: normal_matrix(model).to_cols_array_2d(),
            color: color.to_array(),
        }
    }
}

fn normal_matrix(model: Mat4) -> Mat4 {
    model.inverse().transpose()
}

/// Handle to a mesh owned by a [`MeshScene`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(usize);

/// Handle to an object placed in a [`MeshScene`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectId(usize);

#[derive(Clone, Copy, Debug)]
pub struct SceneObject {
    pub mesh: MeshId,
    pub transform: Transform,
    pub color: Color,
}

/// Meshes placed in the world under one directional light.
pub struct MeshScene {
    meshes: Vec<Mesh>,
    objects: Vec<SceneObject>,
    /// Direction towards the light, world space.
    pub to_light: Vec3,
    /// Fraction of the object color visible in full shadow.
    pub ambient: f32,
    pass: ScenePass,
}

impl MeshScene {
    pub fn new(gpu: &GpuContext) -> Self {
        Self {
            meshes: Vec::new(),
            objects: Vec::new(),
            to_light: Vec3::new(0.4, 1.0, 0.6),
            ambient: 0.15,
            pass: ScenePass::new(gpu),
        }
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.push(mesh);
        MeshId(self.meshes.len() - 1)
    }

    pub fn spawn(&mut self, mesh: MeshId, transform: Transform, color: Color) -> ObjectId {
        self.objects.push(SceneObject {
            mesh,
            transform,
            color,
        });
        ObjectId(self.objects.len() - 1)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.get_mut(id.0)
    }
}

impl SceneSource for MeshScene {
    fn render(
        &self,
        ctx: &mut RenderContext,
        camera: &Camera,
        target: CaptureTarget,
        material: MaterialOverride,
    ) {
        let camera = CameraUniforms::new(camera, target.aspect(), self.to_light, self.ambient);
        let draws: Vec<(&Mesh, ModelUniforms)> = self
            .objects
            .iter()
            .filter_map(|object| {
                let mesh = self.meshes.get(object.mesh.0)?;
                Some((mesh, ModelUniforms::new(&object.transform, object.color)))
            })
            .collect();

        self.pass.draw(ctx, &camera, &draws, target, material);
    }
}

/// GPU state for drawing a [`MeshScene`] into capture buffers.
///
/// Holds two pipelines over one vertex stage: the lit material and the
/// normal visualization. Both write [`CAPTURE_FORMAT`] color and test
/// against a [`DEPTH_FORMAT`] depth buffer.
struct ScenePass {
    lit_pipeline: wgpu::RenderPipeline,
    normals_pipeline: wgpu::RenderPipeline,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    model_buffer: wgpu::Buffer,
    model_bind_group: wgpu::BindGroup,
}

impl ScenePass {
    fn new(gpu: &GpuContext) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        // Camera uniform buffer (group 0)
        let camera_size = NonZeroU64::new(std::mem::size_of::<CameraUniforms>() as u64);
        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scene Camera Uniforms"),
            size: CAMERA_STRIDE * MATERIAL_SLOTS,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let camera_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Scene Camera Bind Group Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: camera_size,
                    },
                    count: None,
                }],
            });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Camera Bind Group"),
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &camera_buffer,
                    offset: 0,
                    size: camera_size,
                }),
            }],
        });

        // Model uniforms (group 1), one slot per object and material at a dynamic offset
        let model_size = NonZeroU64::new(std::mem::size_of::<ModelUniforms>() as u64);
        let model_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scene Model Uniforms"),
            size: MODEL_STRIDE * MAX_OBJECTS as u64 * MATERIAL_SLOTS,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let model_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Scene Model Bind Group Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: model_size,
                    },
                    count: None,
                }],
            });

        let model_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Model Bind Group"),
            layout: &model_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &model_buffer,
                    offset: 0,
                    size: model_size,
                }),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&camera_bind_group_layout, &model_bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = |label: &str, entry_point: &str, cull_mode: Option<wgpu::Face>| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs"),
                    buffers: &[Vertex3d::LAYOUT],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some(entry_point),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: CAPTURE_FORMAT,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode,
                    front_face: wgpu::FrontFace::Ccw,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        let lit_pipeline = pipeline("Scene Lit Pipeline", "fs_lit", Some(wgpu::Face::Back));
        let normals_pipeline = pipeline("Scene Normals Pipeline", "fs_normals", None);

        log::info!("scene pass ready (capture {CAPTURE_FORMAT:?}, depth {DEPTH_FORMAT:?})");

        Self {
            lit_pipeline,
            normals_pipeline,
            camera_buffer,
            camera_bind_group,
            model_buffer,
            model_bind_group,
        }
    }

    fn draw(
        &self,
        ctx: &mut RenderContext,
        camera: &CameraUniforms,
        draws: &[(&Mesh, ModelUniforms)],
        target: CaptureTarget,
        material: MaterialOverride,
    ) {
        let gpu = ctx.gpu;

        if draws.len() > MAX_OBJECTS {
            log::warn!(
                "scene has {} objects, only the first {MAX_OBJECTS} are captured",
                draws.len()
            );
        }
        let draws = &draws[..draws.len().min(MAX_OBJECTS)];

        gpu.queue.write_buffer(
            &self.camera_buffer,
            camera_offset(material) as u64,
            bytemuck::bytes_of(camera),
        );
        if !draws.is_empty() {
            gpu.queue.write_buffer(
                &self.model_buffer,
                model_offset(material, 0) as u64,
                &pack_models(draws.iter().map(|(_, m)| m)),
            );
        }

        let clear = material.clear_color(target.background).to_wgpu();
        let mut render_pass = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(match material {
                MaterialOverride::None => "Scene Color Capture",
                MaterialOverride::Normals => "Scene Normal Capture",
            }),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: target.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_pipeline(match material {
            MaterialOverride::None => &self.lit_pipeline,
            MaterialOverride::Normals => &self.normals_pipeline,
        });
        render_pass.set_bind_group(0, &self.camera_bind_group, &[camera_offset(material)]);

        for (index, (mesh, _)) in draws.iter().enumerate() {
            render_pass.set_bind_group(1, &self.model_bind_group, &[model_offset(material, index)]);
            render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }
}

/// Dynamic offset of the camera uniforms for draws with `material`.
fn camera_offset(material: MaterialOverride) -> u32 {
    (material.slot() * CAMERA_STRIDE) as u32
}

/// Dynamic offset of the `index`th object's uniforms for draws with `material`.
fn model_offset(material: MaterialOverride, index: usize) -> u32 {
    ((material.slot() * MAX_OBJECTS as u64 + index as u64) * MODEL_STRIDE) as u32
}

/// Lay per-object uniforms out at [`MODEL_STRIDE`] intervals.
fn pack_models<'a>(models: impl Iterator<Item = &'a ModelUniforms>) -> Vec<u8> {
    let mut bytes = Vec::new();
    for (index, model) in models.enumerate() {
        bytes.resize(index * MODEL_STRIDE as usize, 0);
        bytes.extend_from_slice(bytemuck::bytes_of(model));
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn uniform_sizes_match_wgsl() {
        assert_eq!(std::mem::size_of::<CameraUniforms>(), 160);
        assert_eq!(std::mem::size_of::<ModelUniforms>(), 144);
        assert!(std::mem::size_of::<ModelUniforms>() as u64 <= MODEL_STRIDE);
    }

    #[test]
    fn shader_has_both_materials() {
        assert!(SHADER.contains("fn vs("));
        assert!(SHADER.contains("fn fs_lit("));
        assert!(SHADER.contains("fn fs_normals("));
    }

    #[test]
    fn normal_capture_clears_to_black() {
        let bg = Color::rgb(0.9, 0.8, 0.7);
        assert_eq!(MaterialOverride::None.clear_color(bg), bg);
        assert_eq!(MaterialOverride::Normals.clear_color(bg), Color::BLACK);
        assert_eq!(MaterialOverride::default(), MaterialOverride::None);
    }

    #[test]
    fn normal_matrix_keeps_normals_perpendicular_under_squash() {
        let transform = Transform::new()
            .scale(Vec3::new(4.0, 1.0, 1.0))
            .rotation(Quat::from_rotation_y(0.3));
        let model = transform.matrix();
        let tangent = model.transform_vector3(Vec3::new(1.0, -1.0, 0.0));
        let normal = normal_matrix(model).transform_vector3(Vec3::new(1.0, 1.0, 0.0));
        assert!(tangent.dot(normal).abs() < 1e-4);
    }

    #[test]
    fn packed_models_sit_on_dynamic_offsets() {
        let a = ModelUniforms::new(&Transform::new(), Color::WHITE);
        let b = ModelUniforms::new(&Transform::from_position(Vec3::X), Color::BLACK);
        let bytes = pack_models([a, b].iter());

        let size = std::mem::size_of::<ModelUniforms>();
        assert_eq!(bytes.len(), MODEL_STRIDE as usize + size);
        let second = model_offset(MaterialOverride::None, 1) as usize;
        assert_eq!(&bytes[second..second + size], bytemuck::bytes_of(&b));
        assert_eq!(&bytes[..size], bytemuck::bytes_of(&a));
    }

    #[test]
    fn materials_upload_to_disjoint_uniform_regions() {
        let camera_size = std::mem::size_of::<CameraUniforms>() as u32;
        let color = camera_offset(MaterialOverride::None);
        let normals = camera_offset(MaterialOverride::Normals);
        assert!(color + camera_size <= normals);
        assert!(normals as u64 + camera_size as u64 <= CAMERA_STRIDE * MATERIAL_SLOTS);

        let last_color = model_offset(MaterialOverride::None, MAX_OBJECTS - 1);
        let first_normals = model_offset(MaterialOverride::Normals, 0);
        assert!(last_color as u64 + MODEL_STRIDE <= first_normals as u64);
        let last_normals = model_offset(MaterialOverride::Normals, MAX_OBJECTS - 1) as u64;
        assert!(last_normals + MODEL_STRIDE <= MODEL_STRIDE * MAX_OBJECTS as u64 * MATERIAL_SLOTS);
    }

    #[test]
    fn capture_aspect_ignores_zero_height() {
        assert_eq!(aspect_ratio((1280, 720)), 1280.0 / 720.0);
        assert_eq!(aspect_ratio((4, 0)), 4.0);
    }
}
