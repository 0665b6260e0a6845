//! Main window lifecycle.
//!
//! The application owns exactly one main window. [`WindowManager::init`]
//! claims it at startup and dropping the manager (or [`WindowManager::shutdown`])
//! releases it; components that show or hide the window hold an
//! `Arc<WindowManager>` instead of reaching for a global.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use eframe::egui;
use tracing::info;

use crate::error::{Error, Result};

pub const MAIN_WINDOW_WIDTH: f32 = 1200.0;
pub const MAIN_WINDOW_HEIGHT: f32 = 700.0;

/// Delay before dropping always-on-top when the window comes back.
const RESTORE_LEVEL_DELAY: Duration = Duration::from_millis(100);

static LIVE: AtomicBool = AtomicBool::new(false);

/// Window operations the manager needs from the toolkit.
pub trait WindowBackend: Send + Sync {
    fn set_visible(&self, visible: bool);
    fn focus(&self);
    /// Un-minimize.
    fn restore(&self);
    fn set_always_on_top(&self, on_top: bool);
    /// Excludes the window from screen capture.
    fn set_content_protection(&self, enabled: bool);
    fn set_ignore_mouse_events(&self, ignore: bool);
    fn set_fullscreen(&self, fullscreen: bool);
    fn is_fullscreen(&self) -> bool;
    fn cancel_close(&self);
}

pub struct WindowManager {
    backend: Arc<dyn WindowBackend>,
    // Set while a close waits for fullscreen to end.
    pending_hide: AtomicBool,
}

impl WindowManager {
    /// Claims the main window. Fails while another manager is alive.
    pub fn init(backend: Arc<dyn WindowBackend>) -> Result<Self> {
        if LIVE.swap(true, Ordering::SeqCst) {
            return Err(Error::Window("main window already initialized".into()));
        }
        info!("[window] main window created");
        Ok(Self {
            backend,
            pending_hide: AtomicBool::new(false),
        })
    }

    pub fn shutdown(self) {
        info!("[window] main window released");
    }

    pub fn show_inactive(&self) {
        self.backend.set_visible(true);
    }

    pub fn show(&self) {
        self.show_inactive();
        self.backend.focus();
    }

    pub fn set_content_protection(&self, enable: bool) {
        self.backend.set_content_protection(enable);
    }

    /// Close hides the window instead of quitting. A fullscreen window
    /// leaves fullscreen first and is hidden by [`Self::poll_pending_hide`]
    /// once the toolkit reports the transition done.
    pub fn handle_close_request(&self) {
        self.backend.cancel_close();
        if self.backend.is_fullscreen() {
            info!("[window] close requested, leaving fullscreen first");
            self.pending_hide.store(true, Ordering::SeqCst);
            self.backend.set_fullscreen(false);
        } else {
            info!("[window] close requested, hiding");
            self.backend.set_visible(false);
        }
    }

    /// Called every frame. Returns true when a deferred hide was applied.
    pub fn poll_pending_hide(&self) -> bool {
        if !self.pending_hide.load(Ordering::SeqCst) || self.backend.is_fullscreen() {
            return false;
        }
        self.pending_hide.store(false, Ordering::SeqCst);
        self.backend.set_visible(false);
        true
    }

    pub fn show_window(&self) {
        self.set_content_protection(false);
        self.backend.set_ignore_mouse_events(false);
        self.show();
        self.backend.restore();
    }

    /// Gets the window out of the agent's way while it works: hidden,
    /// excluded from capture, and on top once it comes back.
    pub fn hide_main_window(&self) {
        self.set_content_protection(true);
        self.backend.set_always_on_top(true);
        self.backend.set_visible(false);
    }

    pub fn show_main_window(&self) {
        self.set_content_protection(false);
        let backend = self.backend.clone();
        thread::spawn(move || {
            thread::sleep(RESTORE_LEVEL_DELAY);
            backend.set_always_on_top(false);
        });
        self.show();
    }
}

impl Drop for WindowManager {
    fn drop(&mut self) {
        LIVE.store(false, Ordering::SeqCst);
    }
}

/// [`WindowBackend`] for the eframe root viewport.
#[derive(Clone)]
pub struct EguiWindow {
    ctx: egui::Context,
}

impl EguiWindow {
    pub fn new(ctx: egui::Context) -> Self {
        Self { ctx }
    }

    fn send(&self, command: egui::ViewportCommand) {
        self.ctx.send_viewport_cmd(command);
        self.ctx.request_repaint();
    }
}

impl WindowBackend for EguiWindow {
    fn set_visible(&self, visible: bool) {
        self.send(egui::ViewportCommand::Visible(visible));
    }

    fn focus(&self) {
        self.send(egui::ViewportCommand::Focus);
    }

    fn restore(&self) {
        self.send(egui::ViewportCommand::Minimized(false));
    }

    fn set_always_on_top(&self, on_top: bool) {
        let level = if on_top {
            egui::WindowLevel::AlwaysOnTop
        } else {
            egui::WindowLevel::Normal
        };
        self.send(egui::ViewportCommand::WindowLevel(level));
    }

    fn set_content_protection(&self, enabled: bool) {
        self.send(egui::ViewportCommand::ContentProtected(enabled));
    }

    fn set_ignore_mouse_events(&self, ignore: bool) {
        self.send(egui::ViewportCommand::MousePassthrough(ignore));
    }

    fn set_fullscreen(&self, fullscreen: bool) {
        self.send(egui::ViewportCommand::Fullscreen(fullscreen));
    }

    fn is_fullscreen(&self) -> bool {
        self.ctx
            .input(|i| i.viewport().fullscreen.unwrap_or(false))
    }

    fn cancel_close(&self) {
        self.send(egui::ViewportCommand::CancelClose);
    }
}
