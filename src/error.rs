//! Error type shared by every fallible operation in the crate.
//!
//! Stylization parameter values never produce errors: a
//! degenerate value such as `levels = 0` is accepted and simply produces
//! degenerate pixels. Only structural mistakes (unknown parameter names,
//! wrong value kinds) and device/surface failures surface as errors.

use thiserror::Error;

/// Errors produced while setting up the GPU, loading assets, rendering a
/// frame, or dispatching a parameter update.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no suitable GPU adapter: {0}")]
    RequestAdapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to create GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("failed to create window surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    /// The frame's surface texture could not be acquired; the frame is dropped.
    #[error("failed to acquire surface texture: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    /// Presentation was requested on a headless context.
    #[error("GPU context has no presentation surface")]
    NoSurface,

    #[error("failed to load image: {0}")]
    Image(#[from] image::ImageError),

    #[error("failed to read back render target: {0}")]
    Readback(#[from] wgpu::BufferAsyncError),

    #[error("cannot read back {0:?} render targets")]
    UnsupportedFormat(wgpu::TextureFormat),

    #[error("unknown stylization parameter '{0}'")]
    UnknownParameter(String),

    #[error("parameter '{name}' expects a {expected} value")]
    ParameterType {
        name: &'static str,
        expected: &'static str,
    },
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
