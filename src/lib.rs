//! # Inkpost
//!
//! **Real-time ink and halftone stylization for wgpu scenes.**
//!
//! A [`Stylizer`] turns any [`SceneSource`] into a hand-inked drawing. Each
//! frame it captures the scene's color and its view-space normals, then a
//! single full-screen composite fuses normal-gradient contour lines,
//! posterized luminance, a paper texture and a rotated halftone dot screen.
//! An optional finishing pass adds radial chromatic aberration and
//! desaturates the result.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use inkpost::*;
//!
//! # fn demo(window: Arc<winit::window::Window>) -> inkpost::Result<()> {
//! let gpu = GpuContext::new(window)?;
//!
//! let mut scene = MeshScene::new(&gpu);
//! let cube = scene.add_mesh(Mesh::cube(&gpu));
//! scene.spawn(cube, Transform::new(), Color::WHITE);
//!
//! let paper = Texture::paper(&gpu, 256, 7);
//! let mut stylizer = Stylizer::new(&gpu, paper, StylizerConfig::default());
//! stylizer.set_size(&gpu, gpu.width(), gpu.height());
//! stylizer.apply_parameter("levels", 6.0)?;
//!
//! stylizer.render(&gpu, &scene, &Camera::default())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Without a GPU
//!
//! [`shading`] holds the per-pixel math of both passes as plain functions and
//! [`reference`] runs the composite and finishing passes over `image` buffers
//! on the CPU.

mod camera;
mod color;
mod composite_pass;
mod config;
mod error;
mod finishing_pass;
mod fullscreen;
mod gpu;
mod mesh;
mod params;
mod pipeline;
pub mod reference;
mod render_target;
pub mod scene;
pub mod shading;
mod texture;

pub use camera::Camera;
pub use color::Color;
pub use composite_pass::{CompositeInputs, CompositePass, CompositeUniforms};
pub use config::{DEFAULT_PAPER_SCALE, StylizerConfig};
pub use error::{Error, Result};
pub use finishing_pass::{FinishingPass, FinishingUniforms};
pub use gpu::GpuContext;
pub use mesh::{Geometry, Mesh, Transform, Vertex3d};
pub use params::{Param, ParamKind, ParamSpec, ParamValue, StylizeParams};
pub use pipeline::Stylizer;
pub use render_target::{CAPTURE_FORMAT, DEPTH_FORMAT, RenderContext, RenderTarget};
pub use scene::{CaptureTarget, MaterialOverride, MeshScene, SceneSource};
pub use texture::{Texture, paper_image};

// Re-export glam math types for convenience
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
