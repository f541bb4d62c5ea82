// Application window on winit
//
// The render loop owns control flow, so events are pumped once per tick
// instead of handing the thread to `EventLoop::run_app`. The window is
// created non-resizable: the swapchain is never rebuilt.

use anyhow::{bail, Context, Result};
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle, RawDisplayHandle, RawWindowHandle};
use std::time::Duration;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window, WindowAttributes, WindowId},
};

use crate::backend::SurfaceSource;
use crate::config::WindowConfig;
use crate::render_loop::LoopWindow;

/// Receives winit callbacks between pumps.
struct WindowHandler {
    /// Taken when the window is created
    attributes: Option<WindowAttributes>,
    window: Option<Window>,
    create_error: Option<winit::error::OsError>,
    close_requested: bool,
}

impl ApplicationHandler for WindowHandler {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(attributes) = self.attributes.take() else {
            return;
        };

        match event_loop.create_window(attributes) {
            Ok(window) => self.window = Some(window),
            Err(e) => {
                log::error!("Failed to create window: {:?}", e);
                self.create_error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.close_requested = true;
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                log::info!("ESC pressed, exiting...");
                self.close_requested = true;
            }
            _ => {}
        }
    }
}

pub struct AppWindow {
    window: Window,
    handler: WindowHandler,
    event_loop: EventLoop<()>,
}

impl AppWindow {
    pub fn new(config: &WindowConfig) -> Result<Self> {
        let mut event_loop = EventLoop::new().context("Failed to create event loop")?;

        let attributes = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .with_resizable(false);

        let mut handler = WindowHandler {
            attributes: Some(attributes),
            window: None,
            create_error: None,
            close_requested: false,
        };

        // Desktop platforms deliver `resumed` on the first pump
        if let PumpStatus::Exit(code) = event_loop.pump_app_events(Some(Duration::ZERO), &mut handler) {
            if let Some(e) = handler.create_error.take() {
                return Err(e).context("Failed to create window");
            }
            bail!("Event loop exited during startup (code {})", code);
        }

        let window = handler
            .window
            .take()
            .context("Window was not created on the first event pump")?;

        log::info!(
            "Window: {}x{} ({})",
            config.width,
            config.height,
            config.title
        );

        Ok(Self {
            window,
            handler,
            event_loop,
        })
    }
}

impl SurfaceSource for AppWindow {
    fn display_handle(&self) -> RawDisplayHandle {
        self.window.raw_display_handle()
    }

    fn window_handle(&self) -> RawWindowHandle {
        self.window.raw_window_handle()
    }

    fn inner_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }
}

impl LoopWindow for AppWindow {
    fn poll_events(&mut self) {
        let status = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.handler);
        if let PumpStatus::Exit(_) = status {
            self.handler.close_requested = true;
        }
    }

    fn close_requested(&self) -> bool {
        self.handler.close_requested
    }

    fn set_title(&mut self, title: &str) {
        self.window.set_title(title);
    }
}
