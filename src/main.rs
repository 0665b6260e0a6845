use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eframe::egui;
use global_hotkey::hotkey::{Code, HotKey, Modifiers};
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use ui_tars::action::{Prediction, Status, parse_action_call};
use ui_tars::capture::{ScreenSource, XcapScreen};
use ui_tars::chat::{self, ChatMessage};
use ui_tars::config::{Config, OperatorConfig};
use ui_tars::logging;
use ui_tars::operator;
use ui_tars::runner::{RunEvent, run_predictions};
use ui_tars::store::{AppState, OperatorKind, Permissions, Theme};
use ui_tars::window::{EguiWindow, MAIN_WINDOW_HEIGHT, MAIN_WINDOW_WIDTH, WindowManager};

const ACCENT: egui::Color32 = egui::Color32::from_rgb(100, 149, 237);
const ERROR_RED: egui::Color32 = egui::Color32::from_rgb(230, 90, 90);

struct ShellApp {
    state: AppState,
    input: String,
    /// Indices of messages the user expanded.
    expanded: HashSet<usize>,
    config: OperatorConfig,
    show_settings: bool,
    applied_theme: Option<Theme>,
    window: Arc<WindowManager>,
    runtime: tokio::runtime::Runtime,
    events: Option<mpsc::UnboundedReceiver<RunEvent>>,
    abort: Arc<AtomicBool>,
    // Registration lives as long as the manager.
    _hotkeys: Option<GlobalHotKeyManager>,
    quitting: bool,
}

impl ShellApp {
    fn new(
        cc: &eframe::CreationContext<'_>,
        config: OperatorConfig,
        runtime: tokio::runtime::Runtime,
    ) -> anyhow::Result<Self> {
        let window = Arc::new(WindowManager::init(Arc::new(EguiWindow::new(
            cc.egui_ctx.clone(),
        )))?);
        let abort = Arc::new(AtomicBool::new(false));
        let hotkeys = register_stop_hotkey(window.clone(), abort.clone());

        let mut state = AppState::default();
        state.ensure_permissions = Permissions {
            screen_capture: Some(XcapScreen.primary_display().is_ok()),
            accessibility: None,
        };

        Ok(Self {
            state,
            input: String::new(),
            expanded: HashSet::new(),
            config,
            show_settings: false,
            applied_theme: None,
            window,
            runtime,
            events: None,
            abort,
            _hotkeys: hotkeys,
            quitting: false,
        })
    }

    fn submit(&mut self, ctx: &egui::Context) {
        if self.state.is_running() {
            return;
        }
        let Some(instructions) = self.state.instant_instructions(&self.input) else {
            return;
        };
        self.input.clear();
        self.expanded.clear();
        self.state.begin_run(&instructions);

        let predictions = match parse_instructions(&instructions) {
            Ok(p) => p,
            Err(message) => {
                self.state.apply(RunEvent::StepError { message });
                self.state.apply(RunEvent::Done(Status::Error));
                return;
            }
        };

        info!("[shell] running {} action(s)", predictions.len());
        self.abort.store(false, Ordering::SeqCst);
        self.window.hide_main_window();

        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(rx);

        let config = self.config.clone();
        let abort = self.abort.clone();
        let window = self.window.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            let notify = |event: RunEvent| {
                let _ = tx.send(event);
                ctx.request_repaint();
            };
            match operator::local_computer(config.clone()) {
                Ok(op) => {
                    run_predictions(&op, &predictions, config.max_loop, &abort, notify).await;
                }
                Err(e) => {
                    error!("[shell] cannot start operator: {}", e);
                    notify(RunEvent::StepError {
                        message: e.to_string(),
                    });
                    notify(RunEvent::Done(Status::Error));
                }
            }
            window.show_main_window();
        });
    }

    fn stop(&mut self) {
        info!("[shell] stop requested");
        self.abort.store(true, Ordering::SeqCst);
    }

    fn drain_events(&mut self) {
        let Some(rx) = self.events.as_mut() else {
            return;
        };
        loop {
            match rx.try_recv() {
                Ok(event) => self.state.apply(event),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.events = None;
                    break;
                }
            }
        }
    }

    fn apply_theme(&mut self, ctx: &egui::Context) {
        if self.applied_theme == Some(self.state.theme) {
            return;
        }
        ctx.set_visuals(match self.state.theme {
            Theme::Dark => egui::Visuals::dark(),
            Theme::Light => egui::Visuals::light(),
        });
        self.applied_theme = Some(self.state.theme);
    }

    fn render_header(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.horizontal(|ui| {
            ui.heading(egui::RichText::new("UI-TARS").strong().color(ACCENT));
            ui.label(self.state.operator.label());
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("Quit").clicked() {
                    self.quitting = true;
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
                if ui.button("Settings").clicked() {
                    self.show_settings = !self.show_settings;
                }
                let theme_label = match self.state.theme {
                    Theme::Dark => "Light",
                    Theme::Light => "Dark",
                };
                if ui.button(theme_label).clicked() {
                    self.state.theme = match self.state.theme {
                        Theme::Dark => Theme::Light,
                        Theme::Light => Theme::Dark,
                    };
                }
                ui.label(format!("{:?}", self.state.status));
            });
        });
        if self.state.ensure_permissions.screen_capture == Some(false) {
            ui.colored_label(
                ERROR_RED,
                "Screen capture is unavailable. Grant screen recording permission and restart.",
            );
        }
    }

    fn render_messages(&mut self, ui: &mut egui::Ui) {
        let mut toggled = None;

        egui::ScrollArea::vertical()
            .auto_shrink([false; 2])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for (index, message) in self.state.messages.iter().enumerate() {
                    let expanded = self.expanded.contains(&index);
                    if render_message(ui, message, expanded) {
                        toggled = Some(index);
                    }
                    ui.add_space(8.0);
                }
                if self.state.thinking {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("Working...");
                    });
                }
            });

        if let Some(index) = toggled {
            if !self.expanded.remove(&index) {
                self.expanded.insert(index);
            }
        }
    }

    fn render_input(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let input_id = egui::Id::new("instructions");
        let focused = ui.memory(|m| m.has_focus(input_id));
        let submit_key = focused
            && !ui.input(|i| i.modifiers.shift)
            && ui.input_mut(|i| i.consume_key(egui::Modifiers::NONE, egui::Key::Enter));

        let hint = if self.state.status == Status::CallUser {
            "Press Enter to continue with the remaining actions, or type new action calls"
        } else {
            "One action call per line, e.g. click(start_box='[0.1, 0.1, 0.2, 0.2]')"
        };

        ui.horizontal(|ui| {
            let width = ui.available_width() - 90.0;
            ui.add_enabled(
                !self.state.is_running(),
                egui::TextEdit::multiline(&mut self.input)
                    .id(input_id)
                    .hint_text(hint)
                    .desired_rows(2)
                    .desired_width(width),
            );

            if self.state.is_running() {
                if ui
                    .add(egui::Button::new("Stop").fill(ERROR_RED).min_size(egui::vec2(70.0, 30.0)))
                    .clicked()
                {
                    self.stop();
                }
            } else {
                let run = ui.add(
                    egui::Button::new(egui::RichText::new("Run").strong())
                        .fill(ACCENT)
                        .min_size(egui::vec2(70.0, 30.0)),
                );
                if run.clicked() || submit_key {
                    self.submit(ctx);
                }
            }
        });
    }

    fn render_settings(&mut self, ctx: &egui::Context) {
        let mut open = self.show_settings;
        egui::Window::new("Settings")
            .open(&mut open)
            .resizable(false)
            .show(ctx, |ui| {
                let mut paste_ms = self.config.paste_delay.as_millis() as u64;
                let mut wait_secs = self.config.wait.as_secs();

                egui::Grid::new("settings_grid").num_columns(2).show(ui, |ui| {
                    ui.label("Operator");
                    egui::ComboBox::from_id_salt("operator")
                        .selected_text(self.state.operator.label())
                        .show_ui(ui, |ui| {
                            for kind in OperatorKind::ALL {
                                ui.add_enabled_ui(kind.is_supported(), |ui| {
                                    ui.selectable_value(&mut self.state.operator, kind, kind.label());
                                });
                            }
                        });
                    ui.end_row();

                    ui.label("Paste delay (ms)");
                    ui.add(egui::DragValue::new(&mut paste_ms).range(0..=2000));
                    ui.end_row();

                    ui.label("Wait action (s)");
                    ui.add(egui::DragValue::new(&mut wait_secs).range(0..=60));
                    ui.end_row();

                    ui.label("JPEG quality");
                    ui.add(egui::DragValue::new(&mut self.config.jpeg_quality).range(1..=100));
                    ui.end_row();

                    ui.label("Max actions per run");
                    ui.add(egui::DragValue::new(&mut self.config.max_loop).range(1..=1000));
                    ui.end_row();

                    ui.label("Type through clipboard");
                    ui.checkbox(&mut self.config.clipboard_typing, "");
                    ui.end_row();
                });

                self.config.paste_delay = Duration::from_millis(paste_ms);
                self.config.wait = Duration::from_secs(wait_secs);
            });
        self.show_settings = open;
    }
}

/// Draws one message. Returns true when its show more/less toggle was clicked.
fn render_message(ui: &mut egui::Ui, message: &ChatMessage, expanded: bool) -> bool {
    let mut toggled = false;
    match message {
        ChatMessage::Human(text) | ChatMessage::Assistant(text) => {
            let (text, fill, layout) = match message {
                ChatMessage::Human(_) => (
                    text.clone(),
                    egui::Color32::from_rgb(45, 55, 75),
                    egui::Layout::right_to_left(egui::Align::Min),
                ),
                _ => (
                    chat::clean_assistant_text(text),
                    egui::Color32::from_rgb(35, 35, 35),
                    egui::Layout::left_to_right(egui::Align::Min),
                ),
            };
            ui.with_layout(layout, |ui| {
                bubble(fill).show(ui, |ui| {
                    ui.set_max_width(MAIN_WINDOW_WIDTH * 0.6);
                    ui.vertical(|ui| {
                        ui.label(chat::display_text(&text, expanded));
                        if chat::should_truncate(&text) {
                            toggled = toggle_link(ui, expanded);
                        }
                    });
                });
            });
        }
        ChatMessage::Screenshot { scale_factor } => {
            ui.weak(format!("Screenshot taken (scale factor {scale_factor})"));
        }
        ChatMessage::Error(raw) => {
            let error = chat::parse_error(raw);
            bubble(egui::Color32::from_rgb(60, 30, 30)).show(ui, |ui| {
                ui.vertical(|ui| {
                    ui.colored_label(ERROR_RED, egui::RichText::new(&error.message).strong());
                    if !error.stack.is_empty() {
                        ui.monospace(error.stack_preview(expanded));
                    }
                    if error.has_more_lines() {
                        toggled = toggle_link(ui, expanded);
                    }
                });
            });
        }
    }
    toggled
}

fn bubble(fill: egui::Color32) -> egui::Frame {
    egui::Frame::new()
        .fill(fill)
        .corner_radius(8.0)
        .inner_margin(10.0)
}

fn toggle_link(ui: &mut egui::Ui, expanded: bool) -> bool {
    let label = if expanded { "Show less" } else { "Show more" };
    ui.link(label).clicked()
}

/// One action call per non-empty line.
fn parse_instructions(text: &str) -> Result<Vec<Prediction>, String> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| parse_action_call(line).map_err(|e| e.to_string()))
        .collect()
}

/// Ctrl+Alt+Escape stops a run from anywhere and brings the window back.
///
/// The handler runs off the UI thread because the window is hidden (and may
/// not repaint) while the agent works.
fn register_stop_hotkey(
    window: Arc<WindowManager>,
    abort: Arc<AtomicBool>,
) -> Option<GlobalHotKeyManager> {
    let manager = match GlobalHotKeyManager::new() {
        Ok(m) => m,
        Err(e) => {
            warn!("[shell] global hotkeys unavailable: {}", e);
            return None;
        }
    };
    let hotkey = HotKey::new(Some(Modifiers::CONTROL | Modifiers::ALT), Code::Escape);
    let id = hotkey.id();
    if let Err(e) = manager.register(hotkey) {
        warn!("[shell] cannot register stop hotkey: {}", e);
        return None;
    }

    GlobalHotKeyEvent::set_event_handler(Some(move |event: GlobalHotKeyEvent| {
        if event.id() == id && event.state() == HotKeyState::Pressed {
            info!("[shell] stop hotkey pressed");
            abort.store(true, Ordering::SeqCst);
            window.show_window();
        }
    }));
    Some(manager)
}

impl eframe::App for ShellApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();
        self.apply_theme(ctx);

        if ctx.input(|i| i.viewport().close_requested()) && !self.quitting {
            self.window.handle_close_request();
        }
        if self.window.poll_pending_hide() {
            info!("[shell] left fullscreen, window hidden");
        }

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(6.0);
            self.render_header(ui, ctx);
            ui.add_space(6.0);
        });

        egui::TopBottomPanel::bottom("input").show(ctx, |ui| {
            ui.add_space(8.0);
            self.render_input(ui, ctx);
            ui.add_space(8.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.render_messages(ui);
        });

        if self.show_settings {
            self.render_settings(ctx);
        }
    }
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();
    let _guard = logging::init(&config.log_dir, true)?;
    info!("Starting UI-TARS desktop...");

    let runtime = tokio::runtime::Runtime::new()?;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("UI-TARS")
            .with_inner_size([MAIN_WINDOW_WIDTH, MAIN_WINDOW_HEIGHT])
            .with_min_inner_size([480.0, 360.0]),
        ..Default::default()
    };

    let operator_config = config.operator;
    eframe::run_native(
        "UI-TARS",
        native_options,
        Box::new(move |cc| {
            let app = ShellApp::new(cc, operator_config, runtime)?;
            Ok(Box::new(app))
        }),
    )
    .map_err(|e| anyhow::anyhow!("window error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instructions_are_one_call_per_line() {
        let predictions =
            parse_instructions("click(start_box='[0.1, 0.1, 0.2, 0.2]')\n\n  finished()  ").unwrap();
        let names: Vec<_> = predictions.iter().map(|p| p.action_type.as_str()).collect();
        assert_eq!(names, vec!["click", "finished"]);
    }

    #[test]
    fn bad_line_reports_error() {
        assert!(parse_instructions("wait()\nclick(").is_err());
    }
}
