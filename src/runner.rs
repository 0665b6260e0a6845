//! Sequential drive loop: one action at a time, re-observe after each.
//!
//! Abort requests are honoured between actions only; an action in flight
//! always runs to completion.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::action::{Action, Prediction, Status};
use crate::capture::ScreenshotOutput;
use crate::operator::Operator;

#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Step { number: usize, action: String },
    Executed { number: usize, status: Status },
    Screenshot(ScreenshotOutput),
    StepError { message: String },
    Done(Status),
}

/// Runs `predictions` against `operator` and returns the final status.
///
/// Stops at the first terminal status, at the first error, when `abort` is
/// raised, or after `max_loop` actions.
pub async fn run_predictions<O, F>(
    operator: &O,
    predictions: &[Prediction],
    max_loop: usize,
    abort: &AtomicBool,
    mut on_event: F,
) -> Status
where
    O: Operator + ?Sized,
    F: FnMut(RunEvent),
{
    let status = drive(operator, predictions, max_loop, abort, &mut on_event).await;
    info!("[runner] finished with {:?}", status);
    on_event(RunEvent::Done(status));
    status
}

async fn drive<O, F>(
    operator: &O,
    predictions: &[Prediction],
    max_loop: usize,
    abort: &AtomicBool,
    on_event: &mut F,
) -> Status
where
    O: Operator + ?Sized,
    F: FnMut(RunEvent),
{
    for (index, prediction) in predictions.iter().enumerate() {
        if abort.load(Ordering::SeqCst) {
            info!("[runner] stopped by user");
            return Status::UserStopped;
        }
        if index >= max_loop {
            warn!("[runner] step limit reached ({})", max_loop);
            return Status::MaxLoop;
        }

        let number = index + 1;
        on_event(RunEvent::Step {
            number,
            action: prediction.action_type.clone(),
        });

        let action = match Action::from_prediction(prediction) {
            Ok(a) => a,
            Err(e) => {
                on_event(RunEvent::StepError {
                    message: e.to_string(),
                });
                return Status::Error;
            }
        };

        let status = match operator.execute(&action).await {
            Ok(out) => out.status,
            Err(e) => {
                on_event(RunEvent::StepError {
                    message: e.to_string(),
                });
                return Status::Error;
            }
        };
        on_event(RunEvent::Executed { number, status });

        if status.is_terminal() {
            return status;
        }

        match operator.screenshot().await {
            Ok(shot) => on_event(RunEvent::Screenshot(shot)),
            Err(e) => warn!("[runner] screenshot after step {} failed: {}", number, e),
        }
    }

    Status::End
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::action::ExecuteOutput;
    use crate::error::{Error, Result};

    struct ScriptedOperator {
        executed: Mutex<Vec<String>>,
        raise_abort_after: Option<(usize, &'static AtomicBool)>,
    }

    impl ScriptedOperator {
        fn new() -> Self {
            Self {
                executed: Mutex::new(Vec::new()),
                raise_abort_after: None,
            }
        }
    }

    #[async_trait]
    impl Operator for ScriptedOperator {
        async fn screenshot(&self) -> Result<ScreenshotOutput> {
            Ok(ScreenshotOutput {
                base64: String::new(),
                scale_factor: 1.0,
            })
        }

        async fn execute(&self, action: &Action) -> Result<ExecuteOutput> {
            let mut executed = self.executed.lock().unwrap();
            executed.push(action.name().to_string());
            if let Some((n, flag)) = self.raise_abort_after {
                if executed.len() == n {
                    flag.store(true, Ordering::SeqCst);
                }
            }
            match action {
                Action::Finished { .. } => Ok(ExecuteOutput::new(Status::Finished)),
                Action::Hotkey { key } if key == "boom" => Err(Error::Input("boom".into())),
                _ => Ok(ExecuteOutput::new(Status::Running)),
            }
        }
    }

    fn calls(lines: &[&str]) -> Vec<Prediction> {
        lines
            .iter()
            .map(|l| crate::action::parse_action_call(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn stops_at_finished() {
        let op = ScriptedOperator::new();
        let abort = AtomicBool::new(false);
        let mut events = Vec::new();
        let status = run_predictions(
            &op,
            &calls(&["wait()", "finished()", "call_user()"]),
            10,
            &abort,
            |e| events.push(e),
        )
        .await;

        assert_eq!(status, Status::Finished);
        assert_eq!(*op.executed.lock().unwrap(), vec!["wait", "finished"]);
        assert_eq!(events.last(), Some(&RunEvent::Done(Status::Finished)));
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, RunEvent::Screenshot(_)))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn runs_out_of_predictions() {
        let op = ScriptedOperator::new();
        let abort = AtomicBool::new(false);
        let status = run_predictions(&op, &calls(&["wait()"]), 10, &abort, |_| {}).await;
        assert_eq!(status, Status::End);
    }

    #[tokio::test]
    async fn max_loop_guard() {
        let op = ScriptedOperator::new();
        let abort = AtomicBool::new(false);
        let status =
            run_predictions(&op, &calls(&["wait()", "wait()", "wait()"]), 2, &abort, |_| {})
                .await;
        assert_eq!(status, Status::MaxLoop);
        assert_eq!(op.executed.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn abort_between_actions() {
        static ABORT: AtomicBool = AtomicBool::new(false);
        let mut op = ScriptedOperator::new();
        op.raise_abort_after = Some((1, &ABORT));

        let status =
            run_predictions(&op, &calls(&["wait()", "wait()"]), 10, &ABORT, |_| {}).await;
        assert_eq!(status, Status::UserStopped);
        assert_eq!(op.executed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn errors_stop_the_run() {
        let op = ScriptedOperator::new();
        let abort = AtomicBool::new(false);
        let mut messages = Vec::new();
        let status = run_predictions(
            &op,
            &calls(&["hotkey(key='boom')", "wait()"]),
            10,
            &abort,
            |e| {
                if let RunEvent::StepError { message } = e {
                    messages.push(message);
                }
            },
        )
        .await;
        assert_eq!(status, Status::Error);
        assert_eq!(messages.len(), 1);

        let status = run_predictions(&op, &calls(&["click()"]), 10, &abort, |_| {}).await;
        assert_eq!(status, Status::Error);
    }
}
