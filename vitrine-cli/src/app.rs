use std::sync::Arc;
use thiserror::Error;
use vitrine_core::{
    Catalog, ChangeSource, Config, Gallery, GalleryError, GpuError, HookRegistry, HotReloader,
    RenderBackend, WebGpuContext, WgpuBackend,
};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("Failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error(transparent)]
    Gpu(#[from] GpuError),
    #[error(transparent)]
    Gallery(#[from] GalleryError),
}

pub fn run(config: Config, catalog: Catalog, start: Option<String>) -> Result<(), AppError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App {
        config,
        catalog: Some(catalog),
        start,
        window: None,
        gallery: None,
        reloader: None,
        watched_cursor: None,
        title: String::new(),
        fatal: None,
    };
    event_loop.run_app(&mut app)?;

    match app.fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct App {
    config: Config,
    catalog: Option<Catalog>,
    start: Option<String>,
    window: Option<Arc<Window>>,
    gallery: Option<Gallery<WgpuBackend>>,
    reloader: Option<HotReloader>,
    watched_cursor: Option<usize>,
    title: String,
    fatal: Option<AppError>,
}

impl App {
    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<(), AppError> {
        let Some(catalog) = self.catalog.take() else {
            return Ok(());
        };

        let attributes = Window::default_attributes()
            .with_title(self.config.window.title.clone())
            .with_inner_size(PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));
        let window = Arc::new(event_loop.create_window(attributes)?);

        let instance = WebGpuContext::instance();
        let surface = instance
            .create_surface(window.clone())
            .map_err(GpuError::from)?;
        let context = pollster::block_on(WebGpuContext::new_with_surface(&instance, &surface))?;
        let size = window.inner_size();
        let backend = WgpuBackend::with_surface(
            context,
            surface,
            size.width,
            size.height,
            self.config.render.vsync,
        )?;

        let mut gallery = Gallery::new(
            catalog,
            HookRegistry::with_builtins(),
            backend,
            self.config.plan_options(),
        )?;
        // A broken first entry is shown as an error, not a startup failure.
        let selected = match self.start.take() {
            Some(key) => gallery.select(&key),
            None => gallery.next(),
        };
        if let Err(err) = selected {
            log::warn!("{}", err);
        }

        self.window = Some(window);
        self.gallery = Some(gallery);
        self.refresh_watcher();
        Ok(())
    }

    /// Re-arm the file watcher whenever the cursor moves to another entry.
    fn refresh_watcher(&mut self) {
        let Some(gallery) = &self.gallery else {
            return;
        };
        if !self.config.hot_reload_enabled() || gallery.cursor() == self.watched_cursor {
            return;
        }
        self.watched_cursor = gallery.cursor();
        self.reloader = None;

        let paths = gallery.cursor_source_paths();
        if paths.is_empty() {
            return;
        }
        match HotReloader::new_multi_file(&paths) {
            Ok(reloader) => self.reloader = Some(reloader),
            Err(e) => log::warn!("Failed to initialize hot reload: {}", e),
        }
    }

    fn check_hot_reload(&mut self) {
        let changed = self
            .reloader
            .as_ref()
            .is_some_and(|reloader| reloader.check_for_changes());
        if !changed {
            return;
        }
        if let Some(gallery) = self.gallery.as_mut() {
            match gallery.reload_active() {
                Ok(()) => log::info!("Shader reloaded"),
                Err(e) => log::warn!("Reload failed, keeping the running shader: {}", e),
            }
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, key: Key) {
        let Some(gallery) = self.gallery.as_mut() else {
            return;
        };
        if key == Key::Named(NamedKey::Escape) {
            event_loop.exit();
            return;
        }
        let result = apply_key(gallery, key.as_ref());
        if let Err(e) = result {
            log::debug!("{}", e);
        }
        self.refresh_watcher();
    }

    fn update_title(&mut self) {
        let (Some(window), Some(gallery)) = (&self.window, &self.gallery) else {
            return;
        };
        let entry = gallery
            .cursor()
            .and_then(|i| gallery.catalog().get_index(i))
            .map(|d| d.name.as_str())
            .unwrap_or("");
        let mut title = format!("{} - {}", self.config.window.title, entry);
        if !gallery.panel().is_empty() {
            title.push_str(" | ");
            title.push_str(&gallery.panel().summary());
        }
        if let Some(error) = gallery.last_error() {
            let first_line = error.lines().next().unwrap_or("");
            title.push_str(" | error: ");
            title.push_str(first_line);
        }
        if title != self.title {
            window.set_title(&title);
            self.title = title;
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            log::error!("{}", e);
            self.fatal = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(gallery) = self.gallery.as_mut() {
                    gallery.resize(size.width, size.height);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some(gallery) = self.gallery.as_mut() {
                    gallery.mouse_move(position.x as f32, position.y as f32);
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                if let Some(gallery) = self.gallery.as_mut() {
                    match state {
                        ElementState::Pressed => gallery.mouse_press(),
                        ElementState::Released => gallery.mouse_release(),
                    }
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key,
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => self.handle_key(event_loop, logical_key),
            WindowEvent::RedrawRequested => {
                self.check_hot_reload();
                if let Some(gallery) = self.gallery.as_mut() {
                    if let Err(e) = gallery.frame() {
                        log::debug!("{}", e);
                    }
                }
                self.update_title();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

/// Gallery navigation and panel keys. Failures are already recorded on the
/// gallery as its last error.
fn apply_key<B: RenderBackend>(
    gallery: &mut Gallery<B>,
    key: Key<&str>,
) -> Result<(), GalleryError> {
    match key {
        Key::Named(NamedKey::ArrowRight) => gallery.next(),
        Key::Named(NamedKey::ArrowLeft) => gallery.prev(),
        Key::Named(NamedKey::ArrowUp) => {
            gallery.panel_mut().select_prev();
            Ok(())
        }
        Key::Named(NamedKey::ArrowDown) => {
            gallery.panel_mut().select_next();
            Ok(())
        }
        Key::Character("+") | Key::Character("=") => {
            gallery.panel_mut().adjust(1);
            Ok(())
        }
        Key::Character("-") => {
            gallery.panel_mut().adjust(-1);
            Ok(())
        }
        Key::Character("0") => {
            gallery.panel_mut().reset_selected();
            Ok(())
        }
        Key::Character("r") | Key::Character("R") => gallery.reload_active(),
        _ => Ok(()),
    }
}
