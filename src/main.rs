//! Interactive demo: a rotating cube and sphere on a ground plane, inked.
//!
//! Keys: Tab / Shift+Tab select a parameter, Up / Down step it, F toggles the
//! finishing pass, R restores the defaults. Pass a paper image path as the
//! first argument to replace the procedural paper.

use std::sync::Arc;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, ModifiersState, PhysicalKey};
use winit::window::{Window, WindowId};

use inkpost::scene::ObjectId;
use inkpost::{
    Camera, Color, GpuContext, Mesh, MeshScene, Quat, StylizeParams, Stylizer, StylizerConfig,
    Texture, Transform, Vec3,
};

struct Running {
    window: Arc<Window>,
    gpu: GpuContext,
    stylizer: Stylizer,
    scene: MeshScene,
    spinning: Vec<ObjectId>,
}

struct App {
    paper_path: Option<String>,
    running: Option<Running>,
    camera: Camera,
    selected: usize,
    modifiers: ModifiersState,
    start_time: Instant,
}

impl App {
    fn new(paper_path: Option<String>) -> Self {
        Self {
            paper_path,
            running: None,
            camera: Camera::new().at(0.0, 2.2, 5.0).looking_at(0.0, 0.4, 0.0),
            selected: 0,
            modifiers: ModifiersState::empty(),
            start_time: Instant::now(),
        }
    }

    fn start(&self, window: Arc<Window>) -> inkpost::Result<Running> {
        let gpu = GpuContext::new(window.clone())?;

        let paper = match &self.paper_path {
            Some(path) => Texture::from_file(&gpu, path)?,
            None => Texture::paper(&gpu, 512, 7),
        };
        let mut stylizer = Stylizer::new(&gpu, paper, StylizerConfig::default());
        stylizer.set_size(&gpu, gpu.width(), gpu.height());

        let mut scene = MeshScene::new(&gpu);
        let cube = scene.add_mesh(Mesh::cube(&gpu));
        let sphere = scene.add_mesh(Mesh::sphere(&gpu, 48, 24));
        let plane = scene.add_mesh(Mesh::plane(&gpu, 8.0));

        scene.spawn(plane, Transform::new(), Color::from_rgb8(204, 204, 204));
        let spinning = vec![
            scene.spawn(
                cube,
                Transform::from_position(Vec3::new(-0.9, 0.6, 0.0)),
                Color::from_rgb8(230, 217, 204),
            ),
            scene.spawn(
                sphere,
                Transform::from_position(Vec3::new(0.9, 0.7, 0.3)).uniform_scale(1.4),
                Color::rgb(0.95, 0.95, 0.95),
            ),
        ];

        Ok(Running {
            window,
            gpu,
            stylizer,
            scene,
            spinning,
        })
    }

    fn handle_key(&mut self, key: KeyCode) {
        let Some(running) = &mut self.running else {
            return;
        };
        let stylizer = &mut running.stylizer;
        let schema = &StylizeParams::SCHEMA;

        match key {
            KeyCode::Tab => {
                self.selected = if self.modifiers.shift_key() {
                    (self.selected + schema.len() - 1) % schema.len()
                } else {
                    (self.selected + 1) % schema.len()
                };
                let spec = &schema[self.selected];
                log::info!("selected {} = {}", spec.param, stylizer.params().get(spec.param));
            }
            KeyCode::ArrowUp | KeyCode::ArrowDown => {
                let spec = &schema[self.selected];
                let steps = if key == KeyCode::ArrowUp { 1 } else { -1 };
                let value = spec.nudge(stylizer.params().get(spec.param), steps);
                match stylizer.set(spec.param, value) {
                    Ok(()) => log::info!("{} = {value}", spec.param),
                    Err(err) => log::warn!("{err}"),
                }
            }
            KeyCode::KeyF => {
                let enabled = !stylizer.finishing_enabled();
                stylizer.set_finishing(enabled);
                log::info!("finishing pass {}", if enabled { "on" } else { "off" });
            }
            KeyCode::KeyR => {
                stylizer.set_params(StylizeParams::default());
                log::info!("parameters reset");
            }
            _ => {}
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }
        let attributes = Window::default_attributes()
            .with_title("Inkpost")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("failed to create window: {err}");
                event_loop.exit();
                return;
            }
        };

        match self.start(window) {
            Ok(running) => {
                running.window.request_redraw();
                self.running = Some(running);
            }
            Err(err) => {
                log::error!("startup failed: {err}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::ModifiersChanged(modifiers) => self.modifiers = modifiers.state(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                if key == KeyCode::Escape {
                    event_loop.exit();
                } else {
                    self.handle_key(key);
                }
            }
            WindowEvent::Resized(size) => {
                if let Some(running) = &mut self.running {
                    running.gpu.resize(size.width, size.height);
                    running
                        .stylizer
                        .set_size(&running.gpu, size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                let Some(running) = &mut self.running else {
                    return;
                };
                let time = self.start_time.elapsed().as_secs_f32();

                for (i, id) in running.spinning.iter().enumerate() {
                    if let Some(object) = running.scene.object_mut(*id) {
                        let speed = 0.4 + 0.3 * i as f32;
                        object.transform.rotation =
                            Quat::from_rotation_y(time * speed) * Quat::from_rotation_x(0.3);
                    }
                }

                match running
                    .stylizer
                    .render(&running.gpu, &running.scene, &self.camera)
                {
                    Ok(()) => {}
                    Err(inkpost::Error::Surface(
                        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated,
                    )) => {
                        let (width, height) = (running.gpu.width(), running.gpu.height());
                        running.gpu.resize(width, height);
                    }
                    Err(err) => log::warn!("frame skipped: {err}"),
                }

                running.window.request_redraw();
            }
            _ => (),
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("inkpost=info"))
        .init();

    let paper_path = std::env::args().nth(1);

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(err) => {
            log::error!("failed to create event loop: {err}");
            return;
        }
    };
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(paper_path);
    if let Err(err) = event_loop.run_app(&mut app) {
        log::error!("event loop exited with error: {err}");
    }
}
