//! Primary-display screen capture.
//!
//! Some capture backends hand out bitmaps thumbnailed to the logical display
//! size, so the chosen bitmap is scaled to physical pixels before encoding when
//! it is not already that size. Click targets computed against the screenshot
//! then line up with the screen.

use std::io::Cursor;
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use tracing::{debug, error, info};
use xcap::Monitor;

pub const DEFAULT_JPEG_QUALITY: u8 = 75;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    fn scaled(self, factor: f64) -> Size {
        Size {
            width: (f64::from(self.width) * factor).round() as u32,
            height: (f64::from(self.height) * factor).round() as u32,
        }
    }
}

/// Units a backend reports monitor sizes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeUnits {
    Logical,
    Physical,
}

impl SizeUnits {
    /// xcap reports device pixels on Windows and points elsewhere.
    pub fn xcap() -> Self {
        if cfg!(target_os = "windows") {
            SizeUnits::Physical
        } else {
            SizeUnits::Logical
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayInfo {
    pub id: u32,
    pub physical_size: Size,
    pub logical_size: Size,
    pub scale_factor: f64,
}

impl DisplayInfo {
    /// Builds display info from its logical size; physical = logical * scale.
    pub fn from_logical(id: u32, logical_size: Size, scale_factor: f64) -> Self {
        let scale_factor = sanitize_scale(scale_factor);
        Self {
            id,
            physical_size: logical_size.scaled(scale_factor),
            logical_size,
            scale_factor,
        }
    }

    /// Builds display info from its physical size; logical = physical / scale.
    pub fn from_physical(id: u32, physical_size: Size, scale_factor: f64) -> Self {
        let scale_factor = sanitize_scale(scale_factor);
        Self {
            id,
            physical_size,
            logical_size: physical_size.scaled(1.0 / scale_factor),
            scale_factor,
        }
    }

    pub fn from_reported(id: u32, size: Size, scale_factor: f64, units: SizeUnits) -> Self {
        match units {
            SizeUnits::Logical => Self::from_logical(id, size, scale_factor),
            SizeUnits::Physical => Self::from_physical(id, size, scale_factor),
        }
    }
}

fn sanitize_scale(scale_factor: f64) -> f64 {
    if scale_factor.is_finite() && scale_factor > 0.0 {
        scale_factor
    } else {
        1.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotOutput {
    /// Base64 of the JPEG bytes.
    pub base64: String,
    pub scale_factor: f64,
}

#[derive(Debug, ThisError)]
pub enum CaptureError {
    #[error("primary display source not found (display {display_id}, available {available:?})")]
    SourceNotFound {
        display_id: u32,
        available: Vec<String>,
    },

    #[error("no display available")]
    NoDisplay,

    #[error("screen backend error: {0}")]
    Backend(String),

    #[error("encode error: {0}")]
    Encode(#[from] image::ImageError),
}

/// Display enumeration and raw capture.
pub trait ScreenSource: Send + Sync {
    fn primary_display(&self) -> Result<DisplayInfo, CaptureError>;

    /// Display ids of every capturable screen.
    fn source_ids(&self) -> Result<Vec<String>, CaptureError>;

    /// Bitmap of one screen. Backends may thumbnail to `requested` instead of
    /// capturing at native resolution.
    fn capture_source(&self, display_id: &str, requested: Size) -> Result<RgbaImage, CaptureError>;

    /// Native-resolution capture of the primary display plus its scale factor.
    fn capture_primary(&self) -> Result<(RgbaImage, f64), CaptureError>;
}

pub struct ScreenCapture {
    source: Arc<dyn ScreenSource>,
    quality: u8,
}

impl ScreenCapture {
    pub fn new(source: Arc<dyn ScreenSource>, quality: u8) -> Self {
        Self {
            source,
            quality: quality.clamp(1, 100),
        }
    }

    pub fn source(&self) -> Arc<dyn ScreenSource> {
        self.source.clone()
    }

    /// Captures the primary display at physical resolution.
    ///
    /// Falls back to the first enumerated source when none matches the
    /// primary display id; only an empty source list is an error.
    pub fn capture(&self) -> Result<ScreenshotOutput, CaptureError> {
        let primary = self.source.primary_display()?;
        info!(
            "[screenshot] [primaryDisplay] logicalSize: {}x{} scaleFactor: {}",
            primary.logical_size.width, primary.logical_size.height, primary.scale_factor
        );

        let sources = self.source.source_ids()?;
        let wanted = primary.id.to_string();

        let index = match sources.iter().position(|id| *id == wanted) {
            Some(i) => i,
            None if !sources.is_empty() => {
                debug!("[screenshot] no source for display {}, using {}", wanted, sources[0]);
                0
            }
            None => {
                error!(
                    "[screenshot] Primary display source not found: primaryDisplayId={} availableSources={:?}",
                    primary.id, sources
                );
                return Err(CaptureError::SourceNotFound {
                    display_id: primary.id,
                    available: sources,
                });
            }
        };

        let bitmap = self.source.capture_source(&sources[index], primary.logical_size)?;
        let physical = primary.physical_size;
        let resized = if bitmap.dimensions() == (physical.width, physical.height) {
            bitmap
        } else {
            image::imageops::resize(&bitmap, physical.width, physical.height, FilterType::Triangle)
        };

        let jpeg = encode_jpeg(&resized, self.quality)?;
        Ok(ScreenshotOutput {
            base64: BASE64_STANDARD.encode(jpeg),
            scale_factor: primary.scale_factor,
        })
    }

    /// Generic capture without source matching or resizing.
    pub fn capture_native(&self) -> Result<ScreenshotOutput, CaptureError> {
        let (image, scale_factor) = self.source.capture_primary()?;
        let jpeg = encode_jpeg(&image, self.quality)?;
        Ok(ScreenshotOutput {
            base64: BASE64_STANDARD.encode(jpeg),
            scale_factor: if scale_factor > 0.0 { scale_factor } else { 1.0 },
        })
    }
}

pub fn encode_jpeg(image: &RgbaImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(Cursor::new(&mut out), quality).encode_image(&rgb)?;
    Ok(out)
}

/// Decodes a screenshot back into pixels.
pub fn decode_screenshot(shot: &ScreenshotOutput) -> crate::Result<DynamicImage> {
    let bytes = BASE64_STANDARD
        .decode(&shot.base64)
        .map_err(|e| crate::Error::Capture(CaptureError::Backend(e.to_string())))?;
    Ok(image::load_from_memory(&bytes)?)
}

/// [`ScreenSource`] backed by xcap.
///
/// Captures are always native resolution. Reported monitor sizes are in the
/// units given by [`SizeUnits::xcap`].
#[derive(Debug, Default)]
pub struct XcapScreen;

impl XcapScreen {
    fn monitors() -> Result<Vec<Monitor>, CaptureError> {
        Monitor::all().map_err(backend)
    }

    fn primary(monitors: &[Monitor]) -> Result<&Monitor, CaptureError> {
        monitors
            .iter()
            .find(|m| m.is_primary().unwrap_or(false))
            .or_else(|| monitors.first())
            .ok_or(CaptureError::NoDisplay)
    }
}

impl ScreenSource for XcapScreen {
    fn primary_display(&self) -> Result<DisplayInfo, CaptureError> {
        let monitors = Self::monitors()?;
        let primary = Self::primary(&monitors)?;
        Ok(DisplayInfo::from_reported(
            primary.id().map_err(backend)?,
            Size::new(
                primary.width().map_err(backend)?,
                primary.height().map_err(backend)?,
            ),
            f64::from(primary.scale_factor().map_err(backend)?),
            SizeUnits::xcap(),
        ))
    }

    fn source_ids(&self) -> Result<Vec<String>, CaptureError> {
        Self::monitors()?
            .iter()
            .map(|m| m.id().map(|id| id.to_string()).map_err(backend))
            .collect()
    }

    fn capture_source(&self, display_id: &str, _requested: Size) -> Result<RgbaImage, CaptureError> {
        let monitors = Self::monitors()?;
        let monitor = monitors
            .iter()
            .find(|m| m.id().is_ok_and(|id| id.to_string() == display_id))
            .ok_or(CaptureError::NoDisplay)?;
        monitor.capture_image().map_err(backend)
    }

    fn capture_primary(&self) -> Result<(RgbaImage, f64), CaptureError> {
        let monitors = Self::monitors()?;
        let primary = Self::primary(&monitors)?;
        let image = primary.capture_image().map_err(backend)?;
        let scale = f64::from(primary.scale_factor().map_err(backend)?);
        Ok((image, scale))
    }
}

fn backend(e: impl std::fmt::Display) -> CaptureError {
    CaptureError::Backend(e.to_string())
}
