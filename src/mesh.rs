//! Mesh primitives and transforms for the demo scene provider.
//!
//! - [`Vertex3d`] is the vertex format read by the scene shader.
//! - [`Geometry`] is CPU-side vertex/index data. The built-in primitives are
//!   generated here so they can be inspected without a GPU.
//! - [`Mesh`] is geometry uploaded to GPU buffers.
//! - [`Transform`] places a mesh in the world.
//!
//! # Vertex Layout
//!
//! | Attribute | Format    | Offset | Shader Location |
//! |-----------|-----------|--------|-----------------|
//! | position  | Float32x3 | 0      | 0               |
//! | normal    | Float32x3 | 12     | 1               |
//! | uv        | Float32x2 | 24     | 2               |

use glam::{Mat4, Quat, Vec3};

use crate::gpu::GpuContext;

/// A vertex with position, normal and texture coordinates.
///
/// Normals are what the normal capture encodes, so primitives keep them
/// unit length and per-face where the surface has hard creases.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex3d {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex3d {
    /// Vertex buffer layout matching the table in the module docs.
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex3d>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            // position
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            // normal
            wgpu::VertexAttribute {
                offset: 12,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x3,
            },
            // uv
            wgpu::VertexAttribute {
                offset: 24,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32x2,
            },
        ],
    };

    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// CPU-side triangle list with counter-clockwise front faces.
#[derive(Clone, Debug, Default)]
pub struct Geometry {
    pub vertices: Vec<Vertex3d>,
    pub indices: Vec<u32>,
}

impl Geometry {
    /// A 1x1x1 cube centered at the origin with flat per-face normals.
    pub fn cube() -> Self {
        // (normal, tangent u, tangent v) per face; corners are n/2 ± u/2 ± v/2.
        let faces = [
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        ];

        let mut geometry = Self::default();
        for (normal, u, v) in faces {
            let base = geometry.vertices.len() as u32;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let position = 0.5 * (normal + su * u + sv * v);
                geometry.vertices.push(Vertex3d::new(
                    position.to_array(),
                    normal.to_array(),
                    [(su + 1.0) * 0.5, (sv + 1.0) * 0.5],
                ));
            }
            geometry
                .indices
                .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }
        geometry
    }

    /// A UV sphere of radius 0.5 with smooth normals.
    ///
    /// Produces `(segments + 1) * (rings + 1)` vertices and
    /// `segments * rings * 2` triangles.
    pub fn sphere(segments: u32, rings: u32) -> Self {
        let mut geometry = Self::default();

        for ring in 0..=rings {
            let phi = std::f32::consts::PI * ring as f32 / rings as f32;
            let (ring_radius, y) = phi.sin_cos();

            for seg in 0..=segments {
                let theta = std::f32::consts::TAU * seg as f32 / segments as f32;
                let normal = Vec3::new(ring_radius * theta.cos(), y, ring_radius * theta.sin());
                geometry.vertices.push(Vertex3d::new(
                    (normal * 0.5).to_array(),
                    normal.to_array(),
                    [seg as f32 / segments as f32, ring as f32 / rings as f32],
                ));
            }
        }

        for ring in 0..rings {
            for seg in 0..segments {
                let current = ring * (segments + 1) + seg;
                let next = current + segments + 1;
                geometry.indices.extend_from_slice(&[
                    current,
                    current + 1,
                    next,
                    current + 1,
                    next + 1,
                    next,
                ]);
            }
        }

        geometry
    }

    /// A square on the XZ plane facing +Y.
    pub fn plane(size: f32) -> Self {
        let half = size * 0.5;
        Self {
            vertices: vec![
                Vertex3d::new([-half, 0.0, half], [0.0, 1.0, 0.0], [0.0, 1.0]),
                Vertex3d::new([half, 0.0, half], [0.0, 1.0, 0.0], [1.0, 1.0]),
                Vertex3d::new([half, 0.0, -half], [0.0, 1.0, 0.0], [1.0, 0.0]),
                Vertex3d::new([-half, 0.0, -half], [0.0, 1.0, 0.0], [0.0, 0.0]),
            ],
            indices: vec![0, 1, 2, 2, 3, 0],
        }
    }
}

/// GPU-resident geometry. Immutable once uploaded.
#[derive(Debug)]
pub struct Mesh {
    pub(crate) vertex_buffer: wgpu::Buffer,
    pub(crate) index_buffer: wgpu::Buffer,
    pub(crate) index_count: u32,
}

impl Mesh {
    /// Upload raw vertex and index data.
    pub fn new(gpu: &GpuContext, vertices: &[Vertex3d], indices: &[u32]) -> Self {
        use wgpu::util::DeviceExt;

        let vertex_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Vertex Buffer"),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let index_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Index Buffer"),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        }
    }

    pub fn from_geometry(gpu: &GpuContext, geometry: &Geometry) -> Self {
        Self::new(gpu, &geometry.vertices, &geometry.indices)
    }

    pub fn cube(gpu: &GpuContext) -> Self {
        Self::from_geometry(gpu, &Geometry::cube())
    }

    pub fn sphere(gpu: &GpuContext, segments: u32, rings: u32) -> Self {
        Self::from_geometry(gpu, &Geometry::sphere(segments, rings))
    }

    pub fn plane(gpu: &GpuContext, size: f32) -> Self {
        Self::from_geometry(gpu, &Geometry::plane(size))
    }
}

/// Position, rotation and scale, applied in scale → rotate → translate order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::splat(scale);
        self
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_valid(geometry: &Geometry) {
        assert_eq!(geometry.indices.len() % 3, 0);
        let count = geometry.vertices.len() as u32;
        assert!(geometry.indices.iter().all(|&i| i < count));
        for v in &geometry.vertices {
            let n = Vec3::from_array(v.normal);
            assert!((n.length() - 1.0).abs() < 1e-4, "normal {n:?} is not unit length");
        }
    }

    /// Every triangle's winding must agree with its vertex normals.
    fn assert_ccw_faces_outward(geometry: &Geometry) {
        for tri in geometry.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| geometry.vertices[i as usize]);
            let pa = Vec3::from_array(a.position);
            let face = (Vec3::from_array(b.position) - pa).cross(Vec3::from_array(c.position) - pa);
            if face.length_squared() < 1e-12 {
                continue; // collapsed triangle at a sphere pole
            }
            let normal = Vec3::from_array(a.normal)
                + Vec3::from_array(b.normal)
                + Vec3::from_array(c.normal);
            assert!(face.dot(normal) > 0.0);
        }
    }

    #[test]
    fn cube_has_flat_faces() {
        let cube = Geometry::cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        assert_valid(&cube);
        assert_ccw_faces_outward(&cube);

        for v in &cube.vertices {
            let p = Vec3::from_array(v.position);
            assert!((p.abs().max_element() - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn sphere_counts_and_radius() {
        let sphere = Geometry::sphere(16, 8);
        assert_eq!(sphere.vertices.len(), 17 * 9);
        assert_eq!(sphere.indices.len(), 16 * 8 * 6);
        assert_valid(&sphere);
        assert_ccw_faces_outward(&sphere);

        for v in &sphere.vertices {
            assert!((Vec3::from_array(v.position).length() - 0.5).abs() < 1e-5);
        }
    }

    #[test]
    fn plane_faces_up() {
        let plane = Geometry::plane(4.0);
        assert_valid(&plane);
        assert_ccw_faces_outward(&plane);
        assert!(plane.vertices.iter().all(|v| v.position[1] == 0.0));
    }

    #[test]
    fn transform_applies_scale_then_translation() {
        let transform = Transform::new()
            .position(Vec3::new(1.0, 0.0, 0.0))
            .uniform_scale(2.0);
        let p = transform.matrix().transform_point3(Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(p, Vec3::new(3.0, 2.0, 2.0));
    }

    #[test]
    fn vertex_layout_matches_struct() {
        assert_eq!(std::mem::size_of::<Vertex3d>(), 32);
        assert_eq!(Vertex3d::LAYOUT.array_stride, 32);
    }
}
