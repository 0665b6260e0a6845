mod stdio;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tracing::{info, warn};

use ui_tars::action::{Prediction, Status, parse_action_call};
use ui_tars::config::Config;
use ui_tars::operator::{self, Operator};
use ui_tars::runner::{RunEvent, run_predictions};
use ui_tars::{logging, manifest};

#[derive(Debug, Parser)]
#[command(name = "agent", version, about = "Drive the local computer with GUI agent action calls")]
struct Cli {
    /// Type through the clipboard instead of keystrokes.
    #[arg(long, global = true)]
    clipboard_typing: Option<bool>,

    /// Upper bound on actions per run.
    #[arg(long, global = true)]
    max_loop: Option<usize>,

    /// Mirror logs to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the action vocabulary.
    Actions,
    /// Capture the primary display to a JPEG file.
    Screenshot {
        #[arg(long, default_value = "screenshot.jpg")]
        out: PathBuf,
    },
    /// Run action calls in order, e.g. `click(start_box='[0.1,0.1,0.2,0.2]')`.
    Exec {
        #[arg(required = true)]
        calls: Vec<String>,
    },
    /// Serve JSON-lines requests on stdin.
    Stdio,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(enabled) = cli.clipboard_typing {
        config.operator.clipboard_typing = enabled;
    }
    if let Some(max_loop) = cli.max_loop {
        config.operator.max_loop = max_loop.max(1);
    }
    let _guard = logging::init(&config.log_dir, cli.verbose)
        .with_context(|| format!("cannot open log directory {}", config.log_dir.display()))?;

    if let Command::Actions = cli.command {
        println!("{}", manifest::render());
        return Ok(());
    }

    let max_loop = config.operator.max_loop;
    let operator = operator::local_computer(config.operator)?;

    match cli.command {
        Command::Actions => Ok(()),
        Command::Screenshot { out } => screenshot(&operator, &out).await,
        Command::Exec { calls } => exec(&operator, &calls, max_loop).await,
        Command::Stdio => stdio::serve(&operator).await,
    }
}

async fn screenshot<O: Operator>(operator: &O, out: &Path) -> Result<()> {
    let shot = operator.screenshot().await?;
    let bytes = BASE64_STANDARD
        .decode(&shot.base64)
        .context("screenshot is not valid base64")?;
    tokio::fs::write(out, &bytes)
        .await
        .with_context(|| format!("cannot write {}", out.display()))?;
    println!(
        "{} ({} bytes, scale factor {})",
        out.display(),
        bytes.len(),
        shot.scale_factor
    );
    Ok(())
}

async fn exec<O: Operator>(operator: &O, calls: &[String], max_loop: usize) -> Result<()> {
    let predictions = calls
        .iter()
        .map(|call| parse_action_call(call))
        .collect::<Result<Vec<Prediction>, _>>()?;

    let abort = Arc::new(AtomicBool::new(false));
    let on_ctrl_c = abort.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("[agent] interrupt, stopping after the current action");
            on_ctrl_c.store(true, Ordering::SeqCst);
        }
    });

    info!("[agent] running {} action(s)", predictions.len());
    let status = run_predictions(operator, &predictions, max_loop, &abort, print_event).await;

    match status {
        Status::Error => anyhow::bail!("run failed"),
        _ => Ok(()),
    }
}

fn print_event(event: RunEvent) {
    match event {
        RunEvent::Step { number, action } => println!("[{number}] {action}"),
        RunEvent::Executed { number, status } => println!("[{number}] -> {status:?}"),
        RunEvent::Screenshot(shot) => {
            println!("    screenshot ({} bytes base64)", shot.base64.len())
        }
        RunEvent::StepError { message } => eprintln!("    error: {message}"),
        RunEvent::Done(status) => println!("done: {status:?}"),
    }
}
