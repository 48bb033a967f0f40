//! The stylization orchestrator.
//!
//! A [`Stylizer`] owns every buffer the recipe needs and runs the fixed pass
//! sequence each frame:
//!
//! 1. scene color into the color capture,
//! 2. scene normals into the normal capture (same scene, same camera),
//! 3. the composite, reading both captures and the paper,
//! 4. optionally the finishing pass, reading the composite output.
//!
//! All passes of a frame are recorded into one command encoder, so the GPU
//! sees them in exactly this order.
//!
//! # Example
//!
//! ```no_run
//! use inkpost::{Camera, GpuContext, MeshScene, Stylizer, StylizerConfig, Texture};
//!
//! # fn demo(gpu: &GpuContext) -> inkpost::Result<()> {
//! let paper = Texture::paper(gpu, 256, 1);
//! let mut stylizer = Stylizer::new(gpu, paper, StylizerConfig::default());
//! stylizer.set_size(gpu, gpu.width(), gpu.height());
//! stylizer.apply_parameter("levels", 4.0)?;
//!
//! let scene = MeshScene::new(gpu);
//! stylizer.render(gpu, &scene, &Camera::default())?;
//! # Ok(())
//! # }
//! ```

use crate::camera::Camera;
use crate::color::Color;
use crate::composite_pass::{CompositeInputs, CompositePass, CompositeUniforms};
use crate::config::StylizerConfig;
use crate::error::{Error, Result};
use crate::finishing_pass::{FinishingPass, FinishingUniforms};
use crate::gpu::GpuContext;
use crate::params::{Param, ParamValue, StylizeParams};
use crate::render_target::{CAPTURE_FORMAT, DEPTH_FORMAT, RenderContext, RenderTarget};
use crate::scene::{CaptureTarget, MaterialOverride, SceneSource};
use crate::texture::Texture;

pub struct Stylizer {
    color_capture: RenderTarget,
    normal_capture: RenderTarget,
    depth: RenderTarget,
    composite: CompositePass,
    finishing: FinishingPass,
    paper: Texture,
    params: StylizeParams,
    paper_scale: f32,
    background: Color,
    finishing_enabled: bool,
}

impl Stylizer {
    /// Build the passes and allocate every buffer at 1x1.
    ///
    /// Call [`set_size`](Self::set_size) before the first real frame; until
    /// then frames render a single pixel.
    pub fn new(gpu: &GpuContext, paper: Texture, config: StylizerConfig) -> Self {
        let stylizer = Self {
            color_capture: RenderTarget::new(gpu, "Color Capture", 1, 1, CAPTURE_FORMAT),
            normal_capture: RenderTarget::new(gpu, "Normal Capture", 1, 1, CAPTURE_FORMAT),
            depth: RenderTarget::new(gpu, "Capture Depth", 1, 1, DEPTH_FORMAT),
            composite: CompositePass::new(gpu),
            finishing: FinishingPass::new(gpu),
            paper,
            params: config.params,
            paper_scale: config.paper_scale,
            background: config.background,
            finishing_enabled: config.finishing,
        };

        log::info!(
            "stylizer ready (finishing {}, paper {}x{})",
            if stylizer.finishing_enabled { "on" } else { "off" },
            stylizer.paper.width,
            stylizer.paper.height
        );
        stylizer
    }

    /// Resize both captures, their depth buffer and both pass outputs.
    ///
    /// This is the only way any of them change size, so they always agree.
    /// Zero dimensions are promoted to 1.
    pub fn set_size(&mut self, gpu: &GpuContext, width: u32, height: u32) {
        let old = self.size();

        self.color_capture.resize(gpu, width, height);
        self.normal_capture.resize(gpu, width, height);
        self.depth.resize(gpu, width, height);
        self.composite.resize(gpu, width, height);
        self.finishing.resize(gpu, width, height);

        log::debug!(
            "stylizer resized {}x{} -> {}x{}",
            old.0,
            old.1,
            self.size().0,
            self.size().1
        );
    }

    pub fn size(&self) -> (u32, u32) {
        self.color_capture.size()
    }

    /// Render one frame and present it.
    ///
    /// If the surface texture cannot be acquired the frame is dropped and the
    /// error returned; nothing carries over to the next call.
    pub fn render<S: SceneSource + ?Sized>(
        &self,
        gpu: &GpuContext,
        scene: &S,
        camera: &Camera,
    ) -> Result<()> {
        let surface = gpu.surface.as_ref().ok_or(Error::NoSurface)?;
        let frame = surface.get_current_texture().inspect_err(|err| {
            log::warn!("dropping frame: {err}");
        })?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.render_to_view(gpu, scene, camera, &view);
        frame.present();
        Ok(())
    }

    /// Render one frame into an arbitrary view of the output format.
    pub fn render_to_view<S: SceneSource + ?Sized>(
        &self,
        gpu: &GpuContext,
        scene: &S,
        camera: &Camera,
        view: &wgpu::TextureView,
    ) {
        self.submit(gpu, |ctx| {
            self.record(ctx, scene, camera, Some(view));
        });
    }

    /// Render one frame into the stylizer's own pass outputs and return the
    /// last one written: the finishing output if enabled, else the composite.
    pub fn render_offscreen<S: SceneSource + ?Sized>(
        &self,
        gpu: &GpuContext,
        scene: &S,
        camera: &Camera,
    ) -> &RenderTarget {
        self.submit(gpu, |ctx| {
            self.record(ctx, scene, camera, None);
        });
        self.final_output()
    }

    fn submit(&self, gpu: &GpuContext, record: impl FnOnce(&mut RenderContext)) {
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Stylizer Encoder"),
            });

        let mut ctx = RenderContext {
            gpu,
            encoder: &mut encoder,
        };
        record(&mut ctx);

        gpu.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Record the full pass sequence. With no `target`, the last pass writes
    /// its own output buffer.
    fn record<S: SceneSource + ?Sized>(
        &self,
        ctx: &mut RenderContext,
        scene: &S,
        camera: &Camera,
        target: Option<&wgpu::TextureView>,
    ) {
        let (width, height) = self.size();
        log::trace!("capturing scene color at {width}x{height}");
        let color = self.capture_target(&self.color_capture);
        scene.render(ctx, camera, color, MaterialOverride::None);

        log::trace!("capturing scene normals");
        let normals = self.capture_target(&self.normal_capture);
        scene.render(ctx, camera, normals, MaterialOverride::Normals);

        let inputs = CompositeInputs {
            color: &self.color_capture.view,
            normals: &self.normal_capture.view,
            paper: &self.paper,
        };
        let composite_uniforms = CompositeUniforms::from_params(&self.params, self.paper_scale);

        if !self.finishing_enabled {
            log::trace!("compositing");
            match target {
                Some(view) => self.composite.render(ctx, &composite_uniforms, inputs, view),
                None => self.composite.render_to_output(ctx, &composite_uniforms, inputs),
            }
            return;
        }

        log::trace!("compositing into intermediate buffer, then finishing");
        self.composite.render_to_output(ctx, &composite_uniforms, inputs);
        let finishing_uniforms = FinishingUniforms::from_params(&self.params);
        let input = &self.composite.output().view;
        match target {
            Some(view) => self.finishing.render(ctx, &finishing_uniforms, input, view),
            None => self.finishing.render_to_output(ctx, &finishing_uniforms, input),
        }
    }

    fn capture_target<'a>(&'a self, buffer: &'a RenderTarget) -> CaptureTarget<'a> {
        CaptureTarget {
            color: &buffer.view,
            depth: &self.depth.view,
            size: buffer.size(),
            background: self.background,
        }
    }

    fn final_output(&self) -> &RenderTarget {
        if self.finishing_enabled {
            self.finishing.output()
        } else {
            self.composite.output()
        }
    }

    /// Push a new value for one parameter by name.
    ///
    /// The value is read the next time a frame is recorded.
    pub fn apply_parameter(&mut self, name: &str, value: impl Into<ParamValue>) -> Result<()> {
        let value = value.into();
        let param = self.params.apply_named(name, value)?;
        self.log_update(param);
        Ok(())
    }

    /// Typed counterpart of [`apply_parameter`](Self::apply_parameter).
    pub fn set(&mut self, param: Param, value: impl Into<ParamValue>) -> Result<()> {
        let value = value.into();
        self.params.apply(param, value)?;
        self.log_update(param);
        Ok(())
    }

    pub fn params(&self) -> &StylizeParams {
        &self.params
    }

    pub fn set_params(&mut self, params: StylizeParams) {
        self.params = params;
        log::debug!("parameters replaced");
    }

    /// Halftone frequency multiplier.
    pub fn set_scale(&mut self, scale: f32) {
        self.params.scale = scale;
        self.log_update(Param::Scale);
    }

    /// Edge softness, in pixels of anti-aliasing width.
    pub fn set_thickness(&mut self, thickness: f32) {
        self.params.thickness = thickness;
        self.log_update(Param::Thickness);
    }

    /// Gain on the normal gradient before edges are thresholded.
    pub fn set_contour(&mut self, contour: f32) {
        self.params.contour = contour;
        self.log_update(Param::Contour);
    }

    /// Ink RGB, 0-255 per channel.
    pub fn set_ink_color(&mut self, rgb: [f32; 3]) {
        self.params.ink_color = rgb;
        self.log_update(Param::InkColor);
    }

    /// Luma at and below which the shade is fully inked.
    pub fn set_min_luma(&mut self, min_luma: f32) {
        self.params.min_luma = min_luma;
        self.log_update(Param::MinLuma);
    }

    /// Luma at and above which the shade is fully paper.
    pub fn set_max_luma(&mut self, max_luma: f32) {
        self.params.max_luma = max_luma;
        self.log_update(Param::MaxLuma);
    }

    /// Fraction of the luma range, from the bright end, that gets halftone dots.
    pub fn set_light(&mut self, light: f32) {
        self.params.light = light;
        self.log_update(Param::Light);
    }

    /// Number of posterization steps.
    pub fn set_levels(&mut self, levels: f32) {
        self.params.levels = levels;
        self.log_update(Param::Levels);
    }

    /// Strength of the finishing pass's chromatic aberration.
    pub fn set_aberration_delta(&mut self, delta: f32) {
        self.params.aberration_delta = delta;
        self.log_update(Param::AberrationDelta);
    }

    fn log_update(&self, param: Param) {
        log::debug!("{param} = {}", self.params.get(param));
    }

    pub fn set_finishing(&mut self, enabled: bool) {
        if enabled != self.finishing_enabled {
            log::debug!("finishing pass {}", if enabled { "enabled" } else { "disabled" });
        }
        self.finishing_enabled = enabled;
    }

    pub fn finishing_enabled(&self) -> bool {
        self.finishing_enabled
    }

    /// Swap the paper asset. Takes effect on the next frame.
    pub fn set_paper(&mut self, paper: Texture) {
        log::debug!("paper replaced ({}x{})", paper.width, paper.height);
        self.paper = paper;
    }

    /// Paper UV per pixel. Takes effect on the next frame.
    pub fn set_paper_scale(&mut self, paper_scale: f32) {
        self.paper_scale = paper_scale;
        log::debug!("paperScale = {paper_scale}");
    }

    pub fn paper_scale(&self) -> f32 {
        self.paper_scale
    }

    pub fn color_capture(&self) -> &RenderTarget {
        &self.color_capture
    }

    pub fn normal_capture(&self) -> &RenderTarget {
        &self.normal_capture
    }

    pub fn composite_output(&self) -> &RenderTarget {
        self.composite.output()
    }

    pub fn finishing_output(&self) -> &RenderTarget {
        self.finishing.output()
    }

    /// Sizes of the four resizable surfaces: color capture, normal capture,
    /// composite output, finishing output.
    pub fn surface_sizes(&self) -> [(u32, u32); 4] {
        [
            self.color_capture.size(),
            self.normal_capture.size(),
            self.composite.output().size(),
            self.finishing.output().size(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::testing::{OUTPUT_FORMAT, headless};
    use crate::mesh::{Mesh, Transform};
    use crate::scene::MeshScene;

    fn stylizer(gpu: &GpuContext, config: StylizerConfig) -> Stylizer {
        Stylizer::new(gpu, Texture::paper(gpu, 64, 1), config)
    }

    fn assert_all_near(image: &image::RgbaImage, rgb: [u8; 3]) {
        for (x, y, p) in image.enumerate_pixels() {
            for c in 0..3 {
                let diff = (p[c] as i32 - rgb[c] as i32).abs();
                assert!(diff <= 1, "pixel ({x}, {y}) = {p:?}, expected {rgb:?}");
            }
            assert_eq!(p[3], 255);
        }
    }

    #[test]
    fn starts_degenerate_at_one_pixel() {
        let Some(gpu) = headless() else { return };
        let stylizer = stylizer(&gpu, StylizerConfig::default());
        assert_eq!(stylizer.surface_sizes(), [(1, 1); 4]);
        assert_eq!(stylizer.depth.size(), (1, 1));
    }

    #[test]
    fn set_size_resizes_every_surface_together() {
        let Some(gpu) = headless() else { return };
        let mut stylizer = stylizer(&gpu, StylizerConfig::default());

        stylizer.set_size(&gpu, 40, 30);
        assert_eq!(stylizer.surface_sizes(), [(40, 30); 4]);
        assert_eq!(stylizer.depth.size(), (40, 30));

        stylizer.set_size(&gpu, 17, 9);
        assert_eq!(stylizer.surface_sizes(), [(17, 9); 4]);
        assert_eq!(stylizer.depth.size(), (17, 9));

        stylizer.set_size(&gpu, 0, 0);
        assert_eq!(stylizer.surface_sizes(), [(1, 1); 4]);
    }

    #[test]
    fn pass_outputs_use_the_presentation_format() {
        let Some(gpu) = headless() else { return };
        let stylizer = stylizer(&gpu, StylizerConfig::default());
        assert_eq!(stylizer.composite_output().format(), OUTPUT_FORMAT);
        assert_eq!(stylizer.finishing_output().format(), OUTPUT_FORMAT);
        assert_eq!(stylizer.color_capture().format(), CAPTURE_FORMAT);
        assert_eq!(stylizer.normal_capture().format(), CAPTURE_FORMAT);
    }

    #[test]
    fn renders_before_any_resize() {
        let Some(gpu) = headless() else { return };
        let stylizer = stylizer(&gpu, StylizerConfig::default());
        let scene = MeshScene::new(&gpu);
        let output = stylizer.render_offscreen(&gpu, &scene, &Camera::default());
        let image = output.read_rgba8(&gpu).unwrap();
        assert_eq!(image.dimensions(), (1, 1));
    }

    #[test]
    fn black_scene_renders_solid_ink() {
        let Some(gpu) = headless() else { return };
        let config = StylizerConfig::new().background(Color::BLACK);
        let mut stylizer = stylizer(&gpu, config);
        stylizer.set_size(&gpu, 32, 24);

        let scene = MeshScene::new(&gpu);
        let output = stylizer.render_offscreen(&gpu, &scene, &Camera::default());
        let image = output.read_rgba8(&gpu).unwrap();

        assert_eq!(image.dimensions(), (32, 24));
        assert_all_near(&image, [13, 13, 13]);
    }

    #[test]
    fn finishing_desaturates_into_its_own_buffer() {
        let Some(gpu) = headless() else { return };
        let config = StylizerConfig::new().background(Color::BLACK).finishing(true);
        let mut stylizer = stylizer(&gpu, config);
        stylizer.set_size(&gpu, 16, 16);
        stylizer.set_ink_color([100.0, 0.0, 0.0]);
        stylizer.set_aberration_delta(0.0);

        let scene = MeshScene::new(&gpu);
        let output = stylizer.render_offscreen(&gpu, &scene, &Camera::default());
        assert_eq!(output.label(), "Finishing Output");

        // luma of (100, 0, 0) / 255; the paper is lighter than the ink
        let grey = (0.299f32 * 100.0).round() as u8;
        assert_all_near(&output.read_rgba8(&gpu).unwrap(), [grey; 3]);
    }

    #[test]
    fn parameter_updates_apply_to_the_next_frame() {
        let Some(gpu) = headless() else { return };
        let config = StylizerConfig::new().background(Color::BLACK);
        let mut stylizer = stylizer(&gpu, config);
        stylizer.set_size(&gpu, 8, 8);
        let scene = MeshScene::new(&gpu);

        let first = stylizer
            .render_offscreen(&gpu, &scene, &Camera::default())
            .read_rgba8(&gpu)
            .unwrap();
        assert_all_near(&first, [13, 13, 13]);

        stylizer.apply_parameter("inkColor", [0u8, 0, 100]).unwrap();
        let second = stylizer
            .render_offscreen(&gpu, &scene, &Camera::default())
            .read_rgba8(&gpu)
            .unwrap();
        assert_all_near(&second, [0, 0, 100]);
    }

    #[test]
    fn objects_leave_ink_outlines() {
        let Some(gpu) = headless() else { return };
        let mut stylizer = stylizer(&gpu, StylizerConfig::default());
        stylizer.set_size(&gpu, 64, 64);
        stylizer.set_light(0.0);

        let mut scene = MeshScene::new(&gpu);
        let cube = scene.add_mesh(Mesh::cube(&gpu));
        scene.spawn(cube, Transform::new().uniform_scale(1.5), Color::WHITE);

        let camera = Camera::new().at(2.0, 2.0, 3.0);
        let image = stylizer
            .render_offscreen(&gpu, &scene, &camera)
            .read_rgba8(&gpu)
            .unwrap();

        let inked = image.pixels().filter(|p| p[0] <= 14).count();
        assert!(inked > 0, "no ink pixels in {} total", image.pixels().len());
        assert!(inked < (64 * 64) / 2);
    }

    #[test]
    fn unknown_parameter_leaves_state_untouched() {
        let Some(gpu) = headless() else { return };
        let mut stylizer = stylizer(&gpu, StylizerConfig::default());
        assert!(stylizer.apply_parameter("exposure", 1.0).is_err());
        assert_eq!(*stylizer.params(), StylizeParams::default());

        stylizer.apply_parameter("min", 0.1).unwrap();
        assert_eq!(stylizer.params().min_luma, 0.1);
    }

    #[test]
    fn typed_setters_log_every_update() {
        let Some(gpu) = headless() else { return };
        capture_logs();
        let mut stylizer = stylizer(&gpu, StylizerConfig::default());

        stylizer.set_levels(7.0);
        stylizer.set_ink_color([1.0, 2.0, 3.0]);
        stylizer.set_aberration_delta(2.5);

        let logs = captured_logs();
        assert!(logs.iter().any(|line| line == "levels = 7.000"), "{logs:?}");
        assert!(logs.iter().any(|line| line == "inkColor = rgb(1, 2, 3)"), "{logs:?}");
        assert!(logs.iter().any(|line| line == "aberrationDelta = 2.500"), "{logs:?}");
    }

    #[test]
    fn paper_scale_is_adjustable_after_construction() {
        let Some(gpu) = headless() else { return };
        let mut stylizer = stylizer(&gpu, StylizerConfig::default());
        assert_eq!(stylizer.paper_scale(), crate::config::DEFAULT_PAPER_SCALE);

        stylizer.set_paper_scale(0.01);
        assert_eq!(stylizer.paper_scale(), 0.01);
        assert_eq!(
            CompositeUniforms::from_params(stylizer.params(), stylizer.paper_scale()).paper_scale,
            0.01
        );
    }

    static LOGS: std::sync::Mutex<Vec<String>> = std::sync::Mutex::new(Vec::new());

    struct CaptureLogger;

    impl log::Log for CaptureLogger {
        fn enabled(&self, _: &log::Metadata) -> bool {
            true
        }

        fn log(&self, record: &log::Record) {
            if let Ok(mut logs) = LOGS.lock() {
                logs.push(record.args().to_string());
            }
        }

        fn flush(&self) {}
    }

    fn capture_logs() {
        static LOGGER: CaptureLogger = CaptureLogger;
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(log::LevelFilter::Trace);
        }
    }

    fn captured_logs() -> Vec<String> {
        LOGS.lock().map(|logs| logs.clone()).unwrap_or_default()
    }
}
