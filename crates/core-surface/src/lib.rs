//! Presentation surface: a winit window with a softbuffer pixel surface.
//!
//! The runtime owns the loop, so the window never runs `EventLoop::run`;
//! every iteration pumps pending OS events with a zero timeout and
//! returns them as [`UiEvent`]s. Window creation happens inside the first
//! pump because winit 0.30 only hands out windows from `resumed()`.
//!
//! Field declaration order in [`KioskWindow`] is load-bearing (LIFO
//! drop): the surface drops before the context, the context before the
//! window, the window before the event loop.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use core_events::{KeyCode, UiEvent};
use core_render::Frame;
use softbuffer::{Context, Surface};
use tracing::{debug, info};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop, OwnedDisplayHandle};
use winit::keyboard::PhysicalKey;
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Fullscreen, Window as WinitWindow, WindowAttributes, WindowId};

/// Seam between the runtime loop and the concrete window, so dispatch
/// logic can run against a scripted surface in tests.
pub trait DisplaySurface {
    /// Drains pending OS events without blocking.
    fn pump_ui_events(&mut self) -> Vec<UiEvent>;

    /// Current drawable size in physical pixels.
    fn size(&self) -> (u32, u32);

    fn present(&mut self, frame: &Frame) -> Result<()>;

    fn set_title(&mut self, title: &str);

    fn toggle_fullscreen(&mut self);
}

/// How the window opens.
#[derive(Debug, Clone)]
pub struct SurfaceSettings {
    pub title: String,
    pub fullscreen: bool,
    /// Windowed-mode size; fullscreen uses the monitor's native size.
    pub width: u32,
    pub height: u32,
}

impl Default for SurfaceSettings {
    fn default() -> Self {
        Self {
            title: "Image Pair Viewer".to_string(),
            fullscreen: true,
            width: 640,
            height: 480,
        }
    }
}

type CreatedWindow = (
    Arc<WinitWindow>,
    Context<OwnedDisplayHandle>,
    Surface<OwnedDisplayHandle, Arc<WinitWindow>>,
);

pub struct KioskWindow {
    // Drops last.
    event_loop: Option<EventLoop<()>>,
    window: Arc<WinitWindow>,
    // Must outlive the surface; drops after it (LIFO).
    _context: Context<OwnedDisplayHandle>,
    surface: Surface<OwnedDisplayHandle, Arc<WinitWindow>>,

    size: (u32, u32),
    pending: Vec<UiEvent>,
}

impl KioskWindow {
    /// Opens the window and binds a pixel surface to it. This is the one
    /// startup step the kiosk treats as fatal when it fails.
    pub fn open(settings: &SurfaceSettings) -> Result<Self> {
        let mut event_loop = EventLoop::builder().build()?;

        let mut attrs = WindowAttributes::default()
            .with_title(settings.title.clone())
            .with_inner_size(PhysicalSize::new(settings.width.max(1), settings.height.max(1)));
        if settings.fullscreen {
            attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        // Windows are only handed out inside `resumed()`; one pump is
        // enough to fire it on every desktop platform.
        let mut creator = Creator {
            attrs: Some(attrs),
            created: None,
        };
        let _ = event_loop.pump_app_events(Some(Duration::from_millis(100)), &mut creator);
        let Some(created) = creator.created.take() else {
            return Err(anyhow!("window creation event never arrived"));
        };
        let (window, context, mut surface) = created?;

        window.set_cursor_visible(!settings.fullscreen);
        let inner = window.inner_size();
        let size = (inner.width, inner.height);
        if let (Some(w), Some(h)) = (NonZeroU32::new(size.0), NonZeroU32::new(size.1)) {
            surface.resize(w, h).map_err(|err| anyhow!("surface resize: {err}"))?;
        }
        info!(
            target: "surface.window",
            width = size.0,
            height = size.1,
            fullscreen = settings.fullscreen,
            "window_opened"
        );

        Ok(Self {
            event_loop: Some(event_loop),
            window,
            _context: context,
            surface,
            size,
            pending: Vec::new(),
        })
    }
}

struct Creator {
    attrs: Option<WindowAttributes>,
    created: Option<Result<CreatedWindow>>,
}

impl ApplicationHandler for Creator {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.created.is_some() {
            return;
        }
        let Some(attrs) = self.attrs.take() else {
            return;
        };
        self.created = Some(create_surface(event_loop, attrs));
    }

    fn window_event(&mut self, _: &ActiveEventLoop, _: WindowId, _: WindowEvent) {}
}

fn create_surface(event_loop: &ActiveEventLoop, attrs: WindowAttributes) -> Result<CreatedWindow> {
    let window = Arc::new(event_loop.create_window(attrs)?);
    let context = Context::new(event_loop.owned_display_handle())
        .map_err(|err| anyhow!("softbuffer context: {err}"))?;
    let surface = Surface::new(&context, window.clone())
        .map_err(|err| anyhow!("softbuffer surface: {err}"))?;
    Ok((window, context, surface))
}

impl ApplicationHandler for KioskWindow {
    fn resumed(&mut self, _: &ActiveEventLoop) {}

    fn window_event(&mut self, _: &ActiveEventLoop, _: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.pending.push(UiEvent::CloseRequested),
            WindowEvent::Resized(size) => {
                self.size = (size.width, size.height);
                self.pending.push(UiEvent::RedrawNeeded);
            }
            WindowEvent::RedrawRequested => self.pending.push(UiEvent::RedrawNeeded),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                if let Some(key) = map_key(code) {
                    self.pending.push(UiEvent::Key(key));
                }
            }
            _ => {}
        }
    }
}

impl DisplaySurface for KioskWindow {
    fn pump_ui_events(&mut self) -> Vec<UiEvent> {
        // The loop is taken out so `self` can serve as the handler, then
        // put back for the next iteration.
        if let Some(mut event_loop) = self.event_loop.take() {
            let status = event_loop.pump_app_events(Some(Duration::ZERO), self);
            self.event_loop = Some(event_loop);
            if matches!(status, PumpStatus::Exit(_)) {
                self.pending.push(UiEvent::CloseRequested);
            }
        }
        std::mem::take(&mut self.pending)
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn present(&mut self, frame: &Frame) -> Result<()> {
        // The surface is sized to the frame, never the other way around,
        // so the copy below cannot mismatch even mid-resize.
        let (Some(width), Some(height)) = (
            NonZeroU32::new(frame.width()),
            NonZeroU32::new(frame.height()),
        ) else {
            return Ok(());
        };
        self.surface
            .resize(width, height)
            .map_err(|err| anyhow!("surface resize: {err}"))?;
        let mut buffer = self
            .surface
            .buffer_mut()
            .map_err(|err| anyhow!("surface buffer: {err}"))?;
        buffer.copy_from_slice(frame.pixels());
        buffer
            .present()
            .map_err(|err| anyhow!("surface present: {err}"))?;
        Ok(())
    }

    fn set_title(&mut self, title: &str) {
        self.window.set_title(title);
    }

    fn toggle_fullscreen(&mut self) {
        let enter = self.window.fullscreen().is_none();
        if enter {
            self.window
                .set_fullscreen(Some(Fullscreen::Borderless(None)));
        } else {
            self.window.set_fullscreen(None);
        }
        self.window.set_cursor_visible(!enter);
        debug!(target: "surface.window", fullscreen = enter, "fullscreen_toggled");
    }
}

/// Physical-key translation into the kiosk's small key vocabulary.
fn map_key(code: winit::keyboard::KeyCode) -> Option<KeyCode> {
    use winit::keyboard::KeyCode as Winit;
    match code {
        Winit::Escape => Some(KeyCode::Esc),
        Winit::ArrowLeft => Some(KeyCode::Left),
        Winit::ArrowRight => Some(KeyCode::Right),
        Winit::KeyQ => Some(KeyCode::Char('q')),
        Winit::KeyN => Some(KeyCode::Char('n')),
        Winit::KeyP => Some(KeyCode::Char('p')),
        Winit::KeyR => Some(KeyCode::Char('r')),
        Winit::KeyF => Some(KeyCode::Char('f')),
        _ => None,
    }
}
