use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::{Operator, blocking};
use crate::action::{Action, ExecuteOutput, Status};
use crate::capture::{ScreenCapture, ScreenshotOutput};
use crate::command;
use crate::config::OperatorConfig;
use crate::device::{Clipboard, Keyboard};
use crate::error::Result;
use crate::keys::Key;

/// Dispatcher for the local computer.
///
/// Branches, in priority order:
/// 1. `system_command` with a non-empty command runs in the host shell.
/// 2. `type` with non-empty content is pasted through the clipboard when
///    clipboard typing is on.
/// 3. Everything else goes to the wrapped operator.
pub struct DesktopOperator<B> {
    base: B,
    capture: Arc<ScreenCapture>,
    clipboard: Arc<dyn Clipboard>,
    keyboard: Arc<dyn Keyboard>,
    config: OperatorConfig,
}

impl<B: Operator> DesktopOperator<B> {
    pub fn new(
        base: B,
        capture: Arc<ScreenCapture>,
        clipboard: Arc<dyn Clipboard>,
        keyboard: Arc<dyn Keyboard>,
        config: OperatorConfig,
    ) -> Self {
        Self {
            base,
            capture,
            clipboard,
            keyboard,
            config,
        }
    }

    pub fn base(&self) -> &B {
        &self.base
    }

    async fn system_command(&self, command: &str) -> ExecuteOutput {
        info!("[device] system_command {}", command);

        match command::try_run(command).await {
            Ok(output) => {
                info!("[device] system_command completed successfully");
                if !output.stdout.is_empty() {
                    debug!("[device] system_command stdout: {}", output.stdout);
                }
                if !output.stderr.is_empty() {
                    warn!("[device] system_command stderr: {}", output.stderr);
                }
                ExecuteOutput::new(Status::Running)
            }
            Err(e) => {
                error!("[device] system_command error: {}", e);
                ExecuteOutput::new(Status::Error)
            }
        }
    }

    /// Pastes `content` via the clipboard, then puts the previous clipboard
    /// text back.
    ///
    /// Each step finishes before the next starts. The two pauses give the OS
    /// time to consume the paste; restoring earlier pastes the old text.
    async fn paste_text(&self, content: &str) -> Result<ExecuteOutput> {
        let text = strip_newline_markers(content);
        info!("[device] type {}", text);

        let original = self.clipboard.read_text()?;
        self.clipboard.write_text(&text)?;

        let chord = [Key::paste_modifier(), Key::Char('v')];
        let pasted = self.paste_chord(&chord).await;
        let restored = self.clipboard.write_text(&original);
        pasted?;
        restored?;

        info!("[device] type completed successfully");
        Ok(ExecuteOutput::new(Status::Running))
    }

    async fn paste_chord(&self, chord: &[Key]) -> Result<()> {
        self.keyboard.press(chord)?;
        tokio::time::sleep(self.config.paste_delay).await;
        self.keyboard.release(chord)?;
        tokio::time::sleep(self.config.paste_delay).await;
        Ok(())
    }
}

/// Trims `content` and drops up to two trailing literal `\n` markers.
pub fn strip_newline_markers(content: &str) -> String {
    let mut text = content.trim();
    for _ in 0..2 {
        text = text.strip_suffix("\\n").unwrap_or(text);
    }
    text.to_string()
}

#[async_trait]
impl<B: Operator> Operator for DesktopOperator<B> {
    async fn screenshot(&self) -> Result<ScreenshotOutput> {
        let capture = self.capture.clone();
        match blocking(move || Ok(capture.capture()?)).await {
            Ok(shot) => Ok(shot),
            Err(e) => {
                error!("[screenshot] falling back to default capture: {}", e);
                self.base.screenshot().await
            }
        }
    }

    async fn execute(&self, action: &Action) -> Result<ExecuteOutput> {
        match action {
            Action::SystemCommand { command } if !command.is_empty() => {
                Ok(self.system_command(command).await)
            }
            Action::Type { content } if self.config.clipboard_typing && !content.is_empty() => {
                self.paste_text(content).await
            }
            _ => self.base.execute(action).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::action::Prediction;
    use crate::capture::tests::FakeScreen;
    use crate::capture::{Size, decode_screenshot};
    use crate::device::tests::{FakeDesktop, InputEvent};
    use crate::error::Error;
    use image::GenericImageView;

    /// Base operator that records what reached it.
    #[derive(Default)]
    struct RecordingBase {
        seen: Mutex<Vec<String>>,
        screenshots: Mutex<usize>,
    }

    #[async_trait]
    impl Operator for RecordingBase {
        async fn screenshot(&self) -> Result<ScreenshotOutput> {
            *self.screenshots.lock().unwrap() += 1;
            Ok(ScreenshotOutput {
                base64: "ZmFsbGJhY2s=".into(),
                scale_factor: 1.0,
            })
        }

        async fn execute(&self, action: &Action) -> Result<ExecuteOutput> {
            self.seen.lock().unwrap().push(action.name().to_string());
            Ok(ExecuteOutput::new(Status::Running))
        }
    }

    fn operator(
        desktop: Arc<FakeDesktop>,
        screen: FakeScreen,
        clipboard_typing: bool,
    ) -> DesktopOperator<RecordingBase> {
        let config = OperatorConfig {
            paste_delay: Duration::from_millis(5),
            clipboard_typing,
            ..OperatorConfig::default()
        };
        let capture = Arc::new(ScreenCapture::new(Arc::new(screen), 75));
        DesktopOperator::new(
            RecordingBase::default(),
            capture,
            desktop.clone(),
            desktop,
            config,
        )
    }

    fn default_screen() -> FakeScreen {
        FakeScreen::new(2, Size::new(200, 100), 2.0, &["2"])
    }

    fn action(prediction: Prediction) -> Action {
        Action::from_prediction(&prediction).unwrap()
    }

    #[test]
    fn strips_up_to_two_markers() {
        assert_eq!(strip_newline_markers("hello\\n\\n"), "hello");
        assert_eq!(strip_newline_markers("hello\\n"), "hello");
        assert_eq!(strip_newline_markers("  hello  "), "hello");
        assert_eq!(strip_newline_markers("hello\\n\\n\\n"), "hello\\n");
    }

    #[tokio::test]
    async fn type_pastes_and_restores_clipboard() {
        let desktop = Arc::new(FakeDesktop::with_clipboard("previous"));
        let op = operator(desktop.clone(), default_screen(), true);

        let out = op
            .execute(&action(Prediction::new("type").with_input("content", "Hello\\n")))
            .await
            .unwrap();

        assert_eq!(out.status, Status::Running);
        assert_eq!(desktop.clipboard_text(), "previous");

        let chord = vec![Key::paste_modifier(), Key::Char('v')];
        assert_eq!(
            desktop.events(),
            vec![
                InputEvent::ClipboardWrite("Hello".into()),
                InputEvent::Press(chord.clone()),
                InputEvent::Release(chord),
                InputEvent::ClipboardWrite("previous".into()),
            ]
        );
        assert!(op.base().seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn paste_waits_before_release_and_restore() {
        let desktop = Arc::new(FakeDesktop::with_clipboard("previous"));
        let op = operator(desktop.clone(), default_screen(), true);
        let delay = op.config.paste_delay;

        op.execute(&action(Prediction::new("type").with_input("content", "slow")))
            .await
            .unwrap();

        let timeline = desktop.timeline();
        let at = |wanted: &InputEvent| {
            timeline
                .iter()
                .find(|(_, event)| event == wanted)
                .map(|(time, _)| *time)
                .unwrap()
        };
        let chord = vec![Key::paste_modifier(), Key::Char('v')];
        let pressed = at(&InputEvent::Press(chord.clone()));
        let released = at(&InputEvent::Release(chord));
        let restored = at(&InputEvent::ClipboardWrite("previous".into()));

        assert!(released - pressed >= delay);
        assert!(restored - released >= delay);
    }

    #[tokio::test]
    async fn failed_press_still_restores_clipboard() {
        let desktop = Arc::new(FakeDesktop::with_clipboard("previous"));
        desktop.fail_press.store(true, Ordering::SeqCst);
        let op = operator(desktop.clone(), default_screen(), true);

        let result = op
            .execute(&action(Prediction::new("type").with_input("content", "lost")))
            .await;

        assert!(matches!(result, Err(Error::Input(_))));
        assert_eq!(desktop.clipboard_text(), "previous");
        assert_eq!(
            desktop.events(),
            vec![
                InputEvent::ClipboardWrite("lost".into()),
                InputEvent::ClipboardWrite("previous".into()),
            ]
        );
    }

    #[tokio::test]
    async fn failed_release_still_restores_clipboard() {
        let desktop = Arc::new(FakeDesktop::with_clipboard("previous"));
        desktop.fail_release.store(true, Ordering::SeqCst);
        let op = operator(desktop.clone(), default_screen(), true);

        let result = op
            .execute(&action(Prediction::new("type").with_input("content", "stuck")))
            .await;

        assert!(result.is_err());
        assert_eq!(desktop.clipboard_text(), "previous");
        assert_eq!(
            desktop.events().last(),
            Some(&InputEvent::ClipboardWrite("previous".into()))
        );
    }

    #[tokio::test]
    async fn pasted_text_keeps_unicode_and_drops_markers() {
        for (content, pasted) in [
            ("héllo 世界 🚀\\n", "héllo 世界 🚀"),
            ("\\n", ""),
        ] {
            let desktop = Arc::new(FakeDesktop::with_clipboard("previous"));
            let op = operator(desktop.clone(), default_screen(), true);

            let out = op
                .execute(&action(Prediction::new("type").with_input("content", content)))
                .await
                .unwrap();

            assert_eq!(out.status, Status::Running);
            assert_eq!(desktop.clipboard_text(), "previous");
            let events = desktop.events();
            assert_eq!(events.first(), Some(&InputEvent::ClipboardWrite(pasted.into())));
            assert_eq!(
                events.last(),
                Some(&InputEvent::ClipboardWrite("previous".into()))
            );
            assert!(op.base().seen.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn type_without_clipboard_typing_goes_to_base() {
        let desktop = Arc::new(FakeDesktop::with_clipboard("keep"));
        let op = operator(desktop.clone(), default_screen(), false);

        op.execute(&action(Prediction::new("type").with_input("content", "hi")))
            .await
            .unwrap();

        assert_eq!(*op.base().seen.lock().unwrap(), vec!["type".to_string()]);
        assert!(desktop.events().is_empty());
    }

    #[tokio::test]
    async fn empty_type_goes_to_base() {
        let desktop = Arc::new(FakeDesktop::default());
        let op = operator(desktop.clone(), default_screen(), true);

        op.execute(&action(Prediction::new("type").with_input("content", "")))
            .await
            .unwrap();

        assert_eq!(*op.base().seen.lock().unwrap(), vec!["type".to_string()]);
    }

    #[tokio::test]
    async fn empty_command_falls_through() {
        let desktop = Arc::new(FakeDesktop::default());
        let op = operator(desktop, default_screen(), true);

        let prediction = Prediction::new("system_command")
            .with_input("command", "")
            .with_input("reflection", "nothing to run");
        op.execute(&action(prediction)).await.unwrap();

        assert_eq!(
            *op.base().seen.lock().unwrap(),
            vec!["system_command".to_string()]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn system_command_status() {
        let desktop = Arc::new(FakeDesktop::default());
        let op = operator(desktop, default_screen(), true);

        let ok = op
            .execute(&action(
                Prediction::new("system_command").with_input("command", "echo fine"),
            ))
            .await
            .unwrap();
        assert_eq!(ok.status, Status::Running);

        let failed = op
            .execute(&action(
                Prediction::new("system_command").with_input("command", "exit 7"),
            ))
            .await
            .unwrap();
        assert_eq!(failed.status, Status::Error);

        assert!(op.base().seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn other_actions_are_delegated() {
        let desktop = Arc::new(FakeDesktop::default());
        let op = operator(desktop, default_screen(), true);

        op.execute(&action(Prediction::new("finished"))).await.unwrap();
        op.execute(&action(Prediction::new("teleport"))).await.unwrap();

        assert_eq!(
            *op.base().seen.lock().unwrap(),
            vec!["finished".to_string(), "teleport".to_string()]
        );
    }

    #[tokio::test]
    async fn screenshot_is_physical_size() {
        let desktop = Arc::new(FakeDesktop::default());
        let op = operator(desktop, default_screen(), true);

        let shot = op.screenshot().await.unwrap();
        assert_eq!(shot.scale_factor, 2.0);
        assert_eq!(decode_screenshot(&shot).unwrap().dimensions(), (400, 200));
        assert_eq!(*op.base().screenshots.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn screenshot_falls_back_without_sources() {
        let desktop = Arc::new(FakeDesktop::default());
        let screen = FakeScreen::new(2, Size::new(200, 100), 2.0, &[]);
        let op = operator(desktop, screen, true);

        let shot = op.screenshot().await.unwrap();
        assert_eq!(shot.base64, "ZmFsbGJhY2s=");
        assert!(shot.scale_factor > 0.0);
        assert_eq!(*op.base().screenshots.lock().unwrap(), 1);
    }
}
