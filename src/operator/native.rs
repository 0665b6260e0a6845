use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use super::{Operator, blocking};
use crate::action::{Action, BoxCoords, ExecuteOutput, ScrollDirection, Status};
use crate::capture::{ScreenCapture, ScreenshotOutput};
use crate::config::OperatorConfig;
use crate::device::{Keyboard, Mouse, MouseButton};
use crate::error::Result;
use crate::keys::{Key, parse_chord};

const SCROLL_NOTCHES: i32 = 5;
const DRAG_SETTLE: Duration = Duration::from_millis(100);

/// Generic executor for the full action vocabulary, minus `system_command`.
pub struct NativeOperator {
    capture: Arc<ScreenCapture>,
    keyboard: Arc<dyn Keyboard>,
    mouse: Arc<dyn Mouse>,
    config: OperatorConfig,
}

impl NativeOperator {
    pub fn new(
        capture: Arc<ScreenCapture>,
        keyboard: Arc<dyn Keyboard>,
        mouse: Arc<dyn Mouse>,
        config: OperatorConfig,
    ) -> Self {
        Self {
            capture,
            keyboard,
            mouse,
            config,
        }
    }

    /// Resolves a box to the input library's coordinate space.
    fn locate(&self, target: &BoxCoords) -> Result<(i32, i32)> {
        let display = self.capture.source().primary_display()?;
        let (x, y) = target.to_screen(display.physical_size.width, display.physical_size.height);
        Ok(to_input_space(x, y, display.scale_factor))
    }

    fn move_to(&self, target: &BoxCoords) -> Result<()> {
        let (x, y) = self.locate(target)?;
        info!("[NativeOperator] move to ({}, {})", x, y);
        self.mouse.move_to(x, y)
    }

    fn type_text(&self, content: &str) -> Result<()> {
        let submit = content.ends_with("\\n") || content.ends_with('\n');
        let text = content
            .strip_suffix("\\n")
            .or_else(|| content.strip_suffix('\n'))
            .unwrap_or(content);

        if !text.is_empty() {
            self.keyboard.text(text)?;
        }
        if submit {
            self.keyboard.press(&[Key::Return])?;
            self.keyboard.release(&[Key::Return])?;
        }
        Ok(())
    }
}

/// Converts physical screen pixels into the coordinates enigo expects.
///
/// macOS and Windows take logical points, so the position is divided by the
/// same scale factor the screenshot reported.
pub fn to_input_space(x: f64, y: f64, scale_factor: f64) -> (i32, i32) {
    let scale = if cfg!(any(target_os = "macos", target_os = "windows")) && scale_factor > 0.0 {
        scale_factor
    } else {
        1.0
    };
    ((x / scale).round() as i32, (y / scale).round() as i32)
}

#[async_trait]
impl Operator for NativeOperator {
    async fn screenshot(&self) -> Result<ScreenshotOutput> {
        let capture = self.capture.clone();
        blocking(move || Ok(capture.capture_native()?)).await
    }

    async fn execute(&self, action: &Action) -> Result<ExecuteOutput> {
        info!("[NativeOperator] execute {}", action.name());

        let status = match action {
            Action::Click { start_box } => {
                self.move_to(start_box)?;
                self.mouse.click(MouseButton::Left, 1)?;
                Status::Running
            }
            Action::LeftDouble { start_box } => {
                self.move_to(start_box)?;
                self.mouse.click(MouseButton::Left, 2)?;
                Status::Running
            }
            Action::RightSingle { start_box } => {
                self.move_to(start_box)?;
                self.mouse.click(MouseButton::Right, 1)?;
                Status::Running
            }
            Action::Drag { start_box, end_box } => {
                self.move_to(start_box)?;
                self.mouse.press(MouseButton::Left)?;
                tokio::time::sleep(DRAG_SETTLE).await;
                self.move_to(end_box)?;
                self.mouse.release(MouseButton::Left)?;
                Status::Running
            }
            Action::Hotkey { key } => match parse_chord(key) {
                Ok(keys) => {
                    self.keyboard.press(&keys)?;
                    self.keyboard.release(&keys)?;
                    Status::Running
                }
                Err(e) => {
                    warn!("[NativeOperator] hotkey `{}` rejected: {}", key, e);
                    Status::Error
                }
            },
            Action::Type { content } => {
                self.type_text(content)?;
                Status::Running
            }
            Action::Scroll {
                start_box,
                direction,
            } => {
                if let Some(target) = start_box {
                    self.move_to(target)?;
                }
                let (amount, horizontal) = match direction {
                    ScrollDirection::Up => (-SCROLL_NOTCHES, false),
                    ScrollDirection::Down => (SCROLL_NOTCHES, false),
                    ScrollDirection::Left => (-SCROLL_NOTCHES, true),
                    ScrollDirection::Right => (SCROLL_NOTCHES, true),
                };
                self.mouse.scroll(amount, horizontal)?;
                Status::Running
            }
            Action::Wait {} => {
                tokio::time::sleep(self.config.wait).await;
                Status::Running
            }
            Action::Finished { .. } => Status::Finished,
            Action::CallUser {} => Status::CallUser,
            Action::SystemCommand { .. } | Action::Unsupported { .. } => {
                warn!("[NativeOperator] unsupported action: {:?}", action);
                Status::Error
            }
        };

        Ok(ExecuteOutput::new(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Size;
    use crate::capture::tests::FakeScreen;
    use crate::device::tests::{FakeDesktop, InputEvent};

    fn operator(desktop: Arc<FakeDesktop>) -> NativeOperator {
        let screen = FakeScreen::new(1, Size::new(1000, 500), 1.0, &["1"]);
        let capture = Arc::new(ScreenCapture::new(Arc::new(screen), 75));
        let config = OperatorConfig {
            wait: Duration::from_millis(1),
            ..OperatorConfig::default()
        };
        NativeOperator::new(capture, desktop.clone(), desktop, config)
    }

    fn run(op: &NativeOperator, action: Action) -> Status {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap()
            .block_on(op.execute(&action))
            .unwrap()
            .status
    }

    #[test]
    fn click_moves_to_box_centre() {
        let desktop = Arc::new(FakeDesktop::default());
        let op = operator(desktop.clone());
        let status = run(
            &op,
            Action::Click {
                start_box: "[0.2, 0.2, 0.4, 0.4]".parse().unwrap(),
            },
        );
        assert_eq!(status, Status::Running);
        assert_eq!(
            desktop.events(),
            vec![
                InputEvent::Move(300, 150),
                InputEvent::Click(MouseButton::Left, 1)
            ]
        );
    }

    #[test]
    fn click_against_physical_reporting_screen() {
        let desktop = Arc::new(FakeDesktop::default());
        let screen = FakeScreen::native(1, Size::new(1920, 1080), 1.5, &["1"]);
        let capture = Arc::new(ScreenCapture::new(Arc::new(screen), 75));
        let op = NativeOperator::new(capture, desktop.clone(), desktop.clone(), OperatorConfig::default());

        run(
            &op,
            Action::Click {
                start_box: "[0.5, 0.5, 0.5, 0.5]".parse().unwrap(),
            },
        );
        let expected = to_input_space(960.0, 540.0, 1.5);
        assert_eq!(desktop.events()[0], InputEvent::Move(expected.0, expected.1));
    }

    #[test]
    fn type_with_marker_submits() {
        let desktop = Arc::new(FakeDesktop::default());
        let op = operator(desktop.clone());
        run(
            &op,
            Action::Type {
                content: "hello\\n".into(),
            },
        );
        assert_eq!(
            desktop.events(),
            vec![
                InputEvent::Text("hello".into()),
                InputEvent::Press(vec![Key::Return]),
                InputEvent::Release(vec![Key::Return]),
            ]
        );
    }

    #[test]
    fn hotkey_and_bad_hotkey() {
        let desktop = Arc::new(FakeDesktop::default());
        let op = operator(desktop.clone());
        assert_eq!(
            run(&op, Action::Hotkey { key: "ctrl c".into() }),
            Status::Running
        );
        assert_eq!(
            run(&op, Action::Hotkey { key: "".into() }),
            Status::Error
        );
        assert_eq!(desktop.events().len(), 2);
    }

    #[test]
    fn scroll_up_without_target() {
        let desktop = Arc::new(FakeDesktop::default());
        let op = operator(desktop.clone());
        run(
            &op,
            Action::Scroll {
                start_box: None,
                direction: ScrollDirection::Up,
            },
        );
        assert_eq!(desktop.events(), vec![InputEvent::Scroll(-5, false)]);
    }

    #[test]
    fn terminal_and_unsupported_actions() {
        let desktop = Arc::new(FakeDesktop::default());
        let op = operator(desktop.clone());
        assert_eq!(
            run(&op, Action::Finished { content: String::new() }),
            Status::Finished
        );
        assert_eq!(run(&op, Action::CallUser {}), Status::CallUser);
        assert_eq!(run(&op, Action::Wait {}), Status::Running);
        assert_eq!(
            run(
                &op,
                Action::SystemCommand {
                    command: String::new()
                }
            ),
            Status::Error
        );
        assert_eq!(
            run(
                &op,
                Action::Unsupported {
                    action_type: "teleport".into()
                }
            ),
            Status::Error
        );
        assert!(desktop.events().is_empty());
    }

    #[test]
    fn input_space_is_identity_at_scale_one() {
        assert_eq!(to_input_space(10.4, 20.6, 1.0), (10, 21));
    }
}
