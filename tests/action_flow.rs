use std::sync::Mutex;
use std::sync::atomic::AtomicBool;

use async_trait::async_trait;

use ui_tars::action::{Action, ExecuteOutput, Status, parse_action_call};
use ui_tars::capture::ScreenshotOutput;
use ui_tars::manifest;
use ui_tars::operator::Operator;
use ui_tars::runner::{RunEvent, run_predictions};

#[derive(Default)]
struct Journal {
    actions: Mutex<Vec<Action>>,
}

#[async_trait]
impl Operator for Journal {
    async fn screenshot(&self) -> ui_tars::Result<ScreenshotOutput> {
        Ok(ScreenshotOutput {
            base64: String::new(),
            scale_factor: 1.0,
        })
    }

    async fn execute(&self, action: &Action) -> ui_tars::Result<ExecuteOutput> {
        self.actions.lock().unwrap().push(action.clone());
        Ok(ExecuteOutput::new(match action {
            Action::Finished { .. } => Status::Finished,
            Action::CallUser {} => Status::CallUser,
            _ => Status::Running,
        }))
    }
}

#[tokio::test]
async fn model_output_drives_operator() {
    let lines = [
        "Action: click(start_box='[0.10, 0.20, 0.30, 0.40]')",
        r"type(content='hello world\n')",
        "hotkey(key='ctrl c')",
        "finished(content='done')",
    ];
    let predictions: Vec<_> = lines
        .iter()
        .map(|l| parse_action_call(l).unwrap())
        .collect();
    assert!(predictions.iter().all(|p| manifest::is_known(&p.action_type)));

    let operator = Journal::default();
    let abort = AtomicBool::new(false);
    let mut done = None;
    let status = run_predictions(&operator, &predictions, 10, &abort, |e| {
        if let RunEvent::Done(s) = e {
            done = Some(s);
        }
    })
    .await;

    assert_eq!(status, Status::Finished);
    assert_eq!(done, Some(Status::Finished));

    let actions = operator.actions.lock().unwrap();
    assert_eq!(actions.len(), 4);
    assert_eq!(
        actions[1],
        Action::Type {
            content: r"hello world\n".into()
        }
    );
}

#[tokio::test]
async fn call_user_hands_control_back() {
    let predictions = vec![
        parse_action_call("wait()").unwrap(),
        parse_action_call("call_user()").unwrap(),
        parse_action_call("wait()").unwrap(),
    ];
    let operator = Journal::default();
    let abort = AtomicBool::new(false);

    let status = run_predictions(&operator, &predictions, 10, &abort, |_| {}).await;
    assert_eq!(status, Status::CallUser);
    assert_eq!(operator.actions.lock().unwrap().len(), 2);
}
