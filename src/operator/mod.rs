//! Operators turn agent actions into OS effects.
//!
//! [`NativeOperator`] is the generic executor for the whole action vocabulary.
//! [`DesktopOperator`] wraps any [`Operator`], handles shell commands and
//! clipboard typing itself, and delegates everything else.

mod desktop;
mod native;

use std::sync::Arc;

use async_trait::async_trait;

pub use desktop::{DesktopOperator, strip_newline_markers};
pub use native::{NativeOperator, to_input_space};

pub use crate::action::{Action, ExecuteOutput, Status};
pub use crate::capture::ScreenshotOutput;

use crate::capture::{ScreenCapture, XcapScreen};
use crate::config::OperatorConfig;
use crate::device::{NativeInput, SystemClipboard};
use crate::error::{Error, Result};

/// Base capability every operator exposes to the agent loop.
#[async_trait]
pub trait Operator: Send + Sync {
    async fn screenshot(&self) -> Result<ScreenshotOutput>;

    async fn execute(&self, action: &Action) -> Result<ExecuteOutput>;
}

#[async_trait]
impl<T: Operator + ?Sized> Operator for Arc<T> {
    async fn screenshot(&self) -> Result<ScreenshotOutput> {
        (**self).screenshot().await
    }

    async fn execute(&self, action: &Action) -> Result<ExecuteOutput> {
        (**self).execute(action).await
    }
}

/// Builds the desktop operator over the real screen, clipboard and input devices.
pub fn local_computer(config: OperatorConfig) -> Result<DesktopOperator<NativeOperator>> {
    let capture = Arc::new(ScreenCapture::new(
        Arc::new(XcapScreen),
        config.jpeg_quality,
    ));
    let input = Arc::new(NativeInput::new()?);
    let clipboard = Arc::new(SystemClipboard::new()?);

    let base = NativeOperator::new(capture.clone(), input.clone(), input.clone(), config.clone());
    Ok(DesktopOperator::new(base, capture, clipboard, input, config))
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Capture(crate::capture::CaptureError::Backend(e.to_string())))?
}
