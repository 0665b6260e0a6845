//! Action vocabulary advertised to the model.
//!
//! The model picks actions by name from this list, so every entry must be
//! something [`crate::action::Action`] can represent and the operators execute.

pub static ACTION_SPACES: [&str; 11] = [
    "click(start_box='[x1, y1, x2, y2]')",
    "left_double(start_box='[x1, y1, x2, y2]')",
    "right_single(start_box='[x1, y1, x2, y2]')",
    "drag(start_box='[x1, y1, x2, y2]', end_box='[x3, y3, x4, y4]')",
    "hotkey(key='')",
    "type(content='') #If you want to submit your input, use \"\\n\" at the end of `content`.",
    "scroll(start_box='[x1, y1, x2, y2]', direction='down or up or right or left')",
    "wait() #Sleep for 5s and take a screenshot to check for any changes.",
    "system_command(command='') #Execute a system command in the terminal.",
    "finished()",
    "call_user() # Submit the task and call the user when the task is unsolvable, or when you need the user's help.",
];

/// Action names in manifest order (`click`, `left_double`, ...).
pub fn action_names() -> impl Iterator<Item = &'static str> {
    ACTION_SPACES
        .iter()
        .copied()
        .map(|entry| entry.split_once('(').map_or(entry, |(name, _)| name))
}

pub fn is_known(action_type: &str) -> bool {
    action_names().any(|name| name == action_type)
}

/// The manifest as a prompt block, one template per line.
pub fn render() -> String {
    ACTION_SPACES.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, Prediction, parse_action_call};

    #[test]
    fn names_in_order() {
        let names: Vec<_> = action_names().collect();
        assert_eq!(
            names,
            [
                "click",
                "left_double",
                "right_single",
                "drag",
                "hotkey",
                "type",
                "scroll",
                "wait",
                "system_command",
                "finished",
                "call_user",
            ]
        );
    }

    #[test]
    fn every_template_maps_to_a_typed_action() {
        for entry in ACTION_SPACES.iter() {
            let call = entry.split(" #").next().unwrap().trim();
            let mut prediction: Prediction = parse_action_call(call).unwrap();
            // Replace placeholder boxes with real coordinates.
            for value in prediction.action_inputs.values_mut() {
                if value.as_str().is_some_and(|s| s.contains("x1") || s.contains("x3")) {
                    *value = "[0.1, 0.1, 0.2, 0.2]".into();
                }
                if value.as_str() == Some("down or up or right or left") {
                    *value = "down".into();
                }
            }
            let action = Action::from_prediction(&prediction).unwrap();
            assert!(!matches!(action, Action::Unsupported { .. }), "{entry}");
            assert_eq!(action.name(), prediction.action_type);
        }
    }

    #[test]
    fn render_keeps_every_entry() {
        let rendered = render();
        assert_eq!(rendered.lines().count(), ACTION_SPACES.len());
        assert!(rendered.contains("system_command(command='')"));
    }
}
