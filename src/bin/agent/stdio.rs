//! JSON-lines session for an external agent loop.
//!
//! Each stdin line is one request, each stdout line one response, in order.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use ui_tars::action::{Action, Prediction, Status};
use ui_tars::capture::ScreenshotOutput;
use ui_tars::manifest;
use ui_tars::operator::Operator;

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Execute(Prediction),
    Screenshot,
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Response {
    Executed { status: Status },
    Screenshot(ScreenshotOutput),
    Error { message: String },
}

pub async fn handle<O: Operator + ?Sized>(operator: &O, line: &str) -> Response {
    let request = match serde_json::from_str::<Request>(line) {
        Ok(r) => r,
        Err(e) => {
            return Response::Error {
                message: format!("bad request: {e}"),
            };
        }
    };

    match request {
        Request::Execute(prediction) => {
            if !manifest::is_known(&prediction.action_type) {
                warn!("[stdio] action outside the manifest: {}", prediction.action_type);
            }
            let action = match Action::from_prediction(&prediction) {
                Ok(a) => a,
                Err(e) => {
                    return Response::Error {
                        message: e.to_string(),
                    };
                }
            };
            match operator.execute(&action).await {
                Ok(out) => Response::Executed { status: out.status },
                Err(e) => Response::Error {
                    message: e.to_string(),
                },
            }
        }
        Request::Screenshot => match operator.screenshot().await {
            Ok(shot) => Response::Screenshot(shot),
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },
    }
}

/// Serves requests from stdin until EOF.
pub async fn serve<O: Operator + ?Sized>(operator: &O) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    info!("[stdio] session started");
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = handle(operator, &line).await;
        write_response(&mut stdout, &response).await?;
    }
    info!("[stdio] session closed");
    Ok(())
}

async fn write_response<W: AsyncWrite + Unpin>(out: &mut W, response: &Response) -> anyhow::Result<()> {
    let mut encoded = serde_json::to_vec(response)?;
    encoded.push(b'\n');
    out.write_all(&encoded).await?;
    out.flush().await?;
    Ok(())
}
