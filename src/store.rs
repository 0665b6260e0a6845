//! Application state shared by the desktop shell.

use serde::{Deserialize, Serialize};

use crate::action::Status;
use crate::chat::ChatMessage;
use crate::runner::RunEvent;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    pub screen_capture: Option<bool>,
    pub accessibility: Option<bool>,
}

/// Which surface the agent drives. Only [`OperatorKind::LocalComputer`] is
/// backed by an operator in this crate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperatorKind {
    RemoteComputer,
    RemoteBrowser,
    #[default]
    LocalComputer,
    LocalBrowser,
}

impl OperatorKind {
    pub const ALL: [OperatorKind; 4] = [
        OperatorKind::RemoteComputer,
        OperatorKind::RemoteBrowser,
        OperatorKind::LocalComputer,
        OperatorKind::LocalBrowser,
    ];

    pub fn label(self) -> &'static str {
        match self {
            OperatorKind::RemoteComputer => "Remote Computer Operator",
            OperatorKind::RemoteBrowser => "Remote Browser Operator",
            OperatorKind::LocalComputer => "Local Computer Operator",
            OperatorKind::LocalBrowser => "Local Browser Operator",
        }
    }

    pub fn is_supported(self) -> bool {
        self == OperatorKind::LocalComputer
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub theme: Theme,
    pub ensure_permissions: Permissions,
    pub instructions: Option<String>,
    pub status: Status,
    pub error_msg: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub thinking: bool,
    pub operator: OperatorKind,
    /// Steps of `instructions` already executed when the run stopped on
    /// CALL_USER.
    pub resume_after: Option<usize>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            ensure_permissions: Permissions::default(),
            instructions: None,
            status: Status::Init,
            error_msg: None,
            messages: Vec::new(),
            thinking: false,
            operator: OperatorKind::default(),
            resume_after: None,
        }
    }
}

impl AppState {
    pub fn is_running(&self) -> bool {
        self.status == Status::Running
    }

    /// Instructions to send: the typed text, or the saved action calls the
    /// agent had not reached when it stopped to wait on the user.
    pub fn instant_instructions(&self, typed: &str) -> Option<String> {
        if !typed.trim().is_empty() {
            return Some(typed.to_string());
        }
        if self.status != Status::CallUser {
            return None;
        }
        let saved = self.instructions.as_deref()?;
        let remaining: Vec<&str> = saved
            .lines()
            .filter(|line| !line.trim().is_empty())
            .skip(self.resume_after.unwrap_or(0))
            .collect();
        if remaining.is_empty() {
            None
        } else {
            Some(remaining.join("\n"))
        }
    }

    pub fn begin_run(&mut self, instructions: &str) {
        self.instructions = Some(instructions.to_string());
        self.status = Status::Running;
        self.error_msg = None;
        self.thinking = true;
        self.resume_after = None;
        self.messages.push(ChatMessage::Human(instructions.to_string()));
    }

    pub fn apply(&mut self, event: RunEvent) {
        match event {
            RunEvent::Step { number, action } => {
                self.thinking = true;
                self.messages
                    .push(ChatMessage::Assistant(format!("Step {number}: {action}")));
            }
            RunEvent::Executed { number, status } => {
                self.thinking = false;
                if status == Status::CallUser {
                    self.resume_after = Some(number);
                }
                self.status = match status {
                    Status::Running | Status::Init | Status::Pause => Status::Running,
                    other => other,
                };
            }
            RunEvent::Screenshot(shot) => self.messages.push(ChatMessage::Screenshot {
                scale_factor: shot.scale_factor,
            }),
            RunEvent::StepError { message } => {
                self.error_msg = Some(message.clone());
                self.messages.push(ChatMessage::Error(message));
            }
            RunEvent::Done(status) => {
                self.thinking = false;
                self.status = status;
            }
        }
    }
}
