use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error as ThisError;

use crate::manifest;

/// Raw prediction exactly as the upstream parser hands it over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub action_type: String,
    #[serde(default)]
    pub action_inputs: Map<String, Value>,
}

impl Prediction {
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            action_inputs: Map::new(),
        }
    }

    pub fn with_input(mut self, name: &str, value: impl Into<String>) -> Self {
        self.action_inputs
            .insert(name.to_string(), Value::String(value.into()));
        self
    }
}

/// One agent action with its statically typed parameters.
///
/// Variant names serialize to the manifest names (`left_double`, `system_command`, ...).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action_type", content = "action_inputs", rename_all = "snake_case")]
pub enum Action {
    Click {
        start_box: BoxCoords,
    },
    LeftDouble {
        start_box: BoxCoords,
    },
    RightSingle {
        start_box: BoxCoords,
    },
    Drag {
        start_box: BoxCoords,
        end_box: BoxCoords,
    },
    Hotkey {
        #[serde(default)]
        key: String,
    },
    Type {
        #[serde(default)]
        content: String,
    },
    Scroll {
        #[serde(default, deserialize_with = "optional_box")]
        start_box: Option<BoxCoords>,
        #[serde(default)]
        direction: ScrollDirection,
    },
    Wait {},
    SystemCommand {
        #[serde(default)]
        command: String,
    },
    Finished {
        #[serde(default)]
        content: String,
    },
    CallUser {},
    /// Anything outside the manifest. Routed to the fallback executor untouched.
    #[serde(skip)]
    Unsupported { action_type: String },
}

impl Action {
    pub fn from_prediction(prediction: &Prediction) -> Result<Self, ActionError> {
        if !manifest::is_known(&prediction.action_type) {
            return Ok(Action::Unsupported {
                action_type: prediction.action_type.clone(),
            });
        }

        let tagged = json!({
            "action_type": prediction.action_type,
            "action_inputs": prediction.action_inputs,
        });
        serde_json::from_value(tagged).map_err(|e| ActionError::InvalidInputs {
            action_type: prediction.action_type.clone(),
            reason: e.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Action::Click { .. } => "click",
            Action::LeftDouble { .. } => "left_double",
            Action::RightSingle { .. } => "right_single",
            Action::Drag { .. } => "drag",
            Action::Hotkey { .. } => "hotkey",
            Action::Type { .. } => "type",
            Action::Scroll { .. } => "scroll",
            Action::Wait {} => "wait",
            Action::SystemCommand { .. } => "system_command",
            Action::Finished { .. } => "finished",
            Action::CallUser {} => "call_user",
            Action::Unsupported { action_type } => action_type,
        }
    }
}

impl TryFrom<&Prediction> for Action {
    type Error = ActionError;

    fn try_from(prediction: &Prediction) -> Result<Self, Self::Error> {
        Action::from_prediction(prediction)
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum ActionError {
    #[error("invalid inputs for `{action_type}`: {reason}")]
    InvalidInputs { action_type: String, reason: String },

    #[error("malformed action call: {0}")]
    Syntax(String),
}

/// A target region, either a box `[x1, y1, x2, y2]` or a point `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "String")]
pub struct BoxCoords {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoxCoords {
    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Maps the box centre onto a screen of `width` x `height` pixels.
    ///
    /// Coordinates no larger than 1.0 are fractions of the screen, anything
    /// larger is read as per-mille.
    pub fn to_screen(&self, width: u32, height: u32) -> (f64, f64) {
        let (cx, cy) = self.center();
        let max = self.x1.max(self.y1).max(self.x2).max(self.y2);
        let divisor = if max <= 1.0 { 1.0 } else { 1000.0 };
        (
            cx / divisor * f64::from(width),
            cy / divisor * f64::from(height),
        )
    }
}

impl TryFrom<String> for BoxCoords {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl std::str::FromStr for BoxCoords {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let inner = raw
            .trim()
            .trim_start_matches(['[', '('])
            .trim_end_matches([']', ')']);
        let values = inner
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("bad coordinate in `{raw}`: {e}"))?;

        match values.as_slice() {
            [x, y] => Ok(BoxCoords {
                x1: *x,
                y1: *y,
                x2: *x,
                y2: *y,
            }),
            [x1, y1, x2, y2] => Ok(BoxCoords {
                x1: *x1,
                y1: *y1,
                x2: *x2,
                y2: *y2,
            }),
            _ => Err(format!("expected 2 or 4 coordinates, got `{raw}`")),
        }
    }
}

fn optional_box<'de, D>(deserializer: D) -> Result<Option<BoxCoords>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        Some(s) if !s.trim().is_empty() => s.parse().map(Some).map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum ScrollDirection {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl TryFrom<String> for ScrollDirection {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        match raw.trim().to_lowercase().as_str() {
            "up" => Ok(ScrollDirection::Up),
            "down" => Ok(ScrollDirection::Down),
            "left" => Ok(ScrollDirection::Left),
            "right" => Ok(ScrollDirection::Right),
            other => Err(format!("unknown scroll direction `{other}`")),
        }
    }
}

/// Control-loop disposition reported after each action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Init,
    Running,
    Pause,
    End,
    CallUser,
    UserStopped,
    Error,
    MaxLoop,
    Finished,
}

impl Status {
    /// Whether the drive loop should stop after seeing this status.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Status::Init | Status::Running | Status::Pause)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteOutput {
    pub status: Status,
}

impl ExecuteOutput {
    pub fn new(status: Status) -> Self {
        Self { status }
    }
}

/// Parses a model-written call such as `click(start_box='[1, 2, 3, 4]')`.
///
/// Values are kept verbatim apart from quote unescaping, so a literal `\n`
/// marker inside `content` survives for the operator to strip.
pub fn parse_action_call(text: &str) -> Result<Prediction, ActionError> {
    let text = text.trim();
    let text = text.strip_prefix("Action:").unwrap_or(text).trim();

    let open = text
        .find('(')
        .ok_or_else(|| ActionError::Syntax(format!("missing `(` in `{text}`")))?;
    let body = text[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| ActionError::Syntax(format!("missing closing `)` in `{text}`")))?;

    let action_type = text[..open].trim();
    if action_type.is_empty() {
        return Err(ActionError::Syntax(format!("missing action name in `{text}`")));
    }

    let mut prediction = Prediction::new(action_type);
    for (name, value) in parse_arguments(body)? {
        prediction = prediction.with_input(&name, value);
    }
    Ok(prediction)
}

fn parse_arguments(body: &str) -> Result<Vec<(String, String)>, ActionError> {
    let mut args = Vec::new();
    let mut chars = body.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace() || *c == ',') {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut name = String::new();
        for c in chars.by_ref() {
            if c == '=' {
                break;
            }
            name.push(c);
        }
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(ActionError::Syntax(format!("argument without a name in `{body}`")));
        }

        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }

        let mut value = String::new();
        match chars.peek().copied() {
            Some(quote @ ('\'' | '"')) => {
                chars.next();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    if c == '\\' && chars.peek() == Some(&quote) {
                        value.push(quote);
                        chars.next();
                    } else if c == quote {
                        closed = true;
                        break;
                    } else {
                        value.push(c);
                    }
                }
                if !closed {
                    return Err(ActionError::Syntax(format!("unterminated value for `{name}`")));
                }
            }
            _ => {
                while let Some(c) = chars.peek().copied() {
                    if c == ',' {
                        break;
                    }
                    value.push(c);
                    chars.next();
                }
                value = value.trim().to_string();
            }
        }

        args.push((name, value));
    }

    Ok(args)
}
