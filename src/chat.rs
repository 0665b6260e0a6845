//! Chat message model and the text heuristics the shell renders with.

use serde::Deserialize;

pub const MAX_CHARS: usize = 500;
pub const MAX_LINES: usize = 6;
/// Stack lines shown while an error message is collapsed.
pub const ERROR_STACK_LINES: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum ChatMessage {
    Human(String),
    Assistant(String),
    Screenshot { scale_factor: f64 },
    Error(String),
}

pub fn should_truncate(text: &str) -> bool {
    text.chars().count() > MAX_CHARS || text.split('\n').count() > MAX_LINES
}

/// Cuts `text` to at most `max_chars` characters, preferring the last space
/// at or before the limit.
pub fn truncate_text(text: &str, max_chars: usize) -> &str {
    let Some((limit, at_limit)) = text.char_indices().nth(max_chars) else {
        return text;
    };
    // Search includes a space sitting exactly on the limit.
    let window = &text[..limit + at_limit.len_utf8()];
    match window.rfind(' ') {
        Some(i) if i > 0 => &text[..i],
        _ => &text[..limit],
    }
}

/// Text to render for a message, collapsed or expanded.
pub fn display_text(text: &str, expanded: bool) -> String {
    if expanded || !should_truncate(text) {
        text.to_string()
    } else {
        format!("{}...", truncate_text(text, MAX_CHARS))
    }
}

/// Assistant output carries literal `\n` markers from the model.
pub fn clean_assistant_text(text: &str) -> String {
    text.replace("\\n", "\n")
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorDisplay {
    pub message: String,
    pub stack: String,
}

impl ErrorDisplay {
    pub fn has_more_lines(&self) -> bool {
        self.stack.split('\n').count() > ERROR_STACK_LINES
    }

    pub fn stack_preview(&self, expanded: bool) -> String {
        if expanded {
            self.stack.clone()
        } else {
            self.stack
                .split('\n')
                .take(ERROR_STACK_LINES)
                .collect::<Vec<_>>()
                .join("\n")
        }
    }
}

#[derive(Deserialize)]
struct ErrorPayload {
    status: Option<serde_json::Value>,
    message: Option<String>,
    stack: Option<String>,
}

/// Parses an error payload (`{"status", "message", "stack"}`) for display.
/// Anything that is not JSON is shown as the stack under a bare title.
pub fn parse_error(text: &str) -> ErrorDisplay {
    let Ok(payload) = serde_json::from_str::<ErrorPayload>(text) else {
        return ErrorDisplay {
            message: "Error:".to_string(),
            stack: text.to_string(),
        };
    };

    let detail = payload.message.unwrap_or_default();
    let status = match payload.status {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    let message = match status {
        Some(status) if !status.is_empty() => format!("{}: {}", error_status_label(&status), detail),
        _ => format!("Error: {detail}"),
    };
    ErrorDisplay {
        message,
        stack: payload.stack.unwrap_or_else(|| text.to_string()),
    }
}

fn error_status_label(status: &str) -> &'static str {
    match status {
        "-100000" | "SCREENSHOT_RETRY_ERROR" => "SCREENSHOT_RETRY_ERROR",
        "-100001" | "INVOKE_RETRY_ERROR" => "INVOKE_RETRY_ERROR",
        "-100002" | "EXECUTE_RETRY_ERROR" => "EXECUTE_RETRY_ERROR",
        "-100099" | "UNKNOWN_ERROR" => "UNKNOWN_ERROR",
        _ => "Error",
    }
}
