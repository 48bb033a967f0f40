//! Core GPU context and device management.
//!
//! [`GpuContext`] bundles the wgpu device, queue and the configuration every
//! pass reads its output format and size from. It comes in two flavours:
//!
//! - [`GpuContext::new`] creates a presentation surface for a winit window.
//! - [`GpuContext::headless`] skips the surface entirely. Frames can still be
//!   rendered into offscreen targets, which is how the GPU tests run.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use inkpost::GpuContext;
//!
//! # fn demo(window: Arc<winit::window::Window>) -> inkpost::Result<()> {
//! let mut gpu = GpuContext::new(window)?;
//! gpu.resize(1280, 720);
//! println!("{}x{} (aspect: {})", gpu.width(), gpu.height(), gpu.aspect());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use winit::window::Window;

use crate::error::Result;

/// Core GPU context holding wgpu resources.
///
/// All fields are public so callers can reach the raw wgpu API when needed.
/// The context is created once at startup and passed by reference to the
/// stylizer, the scene and every pass.
pub struct GpuContext {
    /// Presentation surface. `None` for headless contexts.
    pub surface: Option<wgpu::Surface<'static>>,
    /// The logical GPU device for creating resources and pipelines.
    pub device: wgpu::Device,
    /// The command queue for submitting work to the GPU.
    pub queue: wgpu::Queue,
    /// Output format and size. For headless contexts this is never applied to
    /// a surface but still drives pass output formats.
    pub config: wgpu::SurfaceConfiguration,
}

impl GpuContext {
    /// Create a GPU context that presents to the given window.
    ///
    /// Picks an sRGB surface format when one is available and configures the
    /// surface with Fifo presentation.
    pub fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;
        let (adapter, device, queue) = request_device(&instance, Some(&surface))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        log::info!(
            "surface configured: {:?} at {}x{}",
            config.format,
            config.width,
            config.height
        );

        Ok(Self {
            surface: Some(surface),
            device,
            queue,
            config,
        })
    }

    /// Create a GPU context without a window.
    ///
    /// `format` is the format pass outputs are rendered in; `width` and
    /// `height` are reported by [`width`](Self::width) and
    /// [`height`](Self::height) but nothing is allocated at that size.
    pub fn headless(width: u32, height: u32, format: wgpu::TextureFormat) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let (_adapter, device, queue) = request_device(&instance, None)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        Ok(Self {
            surface: None,
            device,
            queue,
            config,
        })
    }

    /// Resize the surface to new dimensions.
    ///
    /// Zero-sized dimensions (a minimized window) are ignored since wgpu
    /// rejects them.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::warn!("ignoring zero-sized surface resize to {width}x{height}");
            return;
        }

        self.config.width = width;
        self.config.height = height;
        if let Some(surface) = &self.surface {
            surface.configure(&self.device, &self.config);
        }
    }

    /// Returns the current surface width in pixels.
    pub fn width(&self) -> u32 {
        self.config.width
    }

    /// Returns the current surface height in pixels.
    pub fn height(&self) -> u32 {
        self.config.height
    }

    /// Returns the current aspect ratio (width / height).
    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height as f32
    }

    /// The format pass outputs are rendered in.
    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }
}

fn request_device(
    instance: &wgpu::Instance,
    surface: Option<&wgpu::Surface<'static>>,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue)> {
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::default(),
        compatible_surface: surface,
        force_fallback_adapter: false,
    }))?;

    let info = adapter.get_info();
    log::info!("using adapter '{}' ({:?})", info.name, info.backend);

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("Inkpost Device"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::default(),
        memory_hints: Default::default(),
        trace: Default::default(),
        experimental_features: Default::default(),
    }))?;

    Ok((adapter, device, queue))
}
