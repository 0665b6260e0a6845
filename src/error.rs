use thiserror::Error as ThisError;

use crate::capture::CaptureError;

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("clipboard error: {0}")]
    Clipboard(String),

    #[error("input error: {0}")]
    Input(String),

    #[error("window error: {0}")]
    Window(String),
}

pub type Result<T> = core::result::Result<T, Error>;
