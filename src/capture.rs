//! Rasterizer adapter: turns a region of a rendered page into one raster image.
//!
//! The actual rendering is delegated to a [`RasterBackend`] capability (the
//! offline HTML renderer, or headless Chrome behind the `cdp` feature). The
//! adapter runs the backend off the async executor and normalizes every
//! failure into [`Error::CaptureFailed`], so callers see an atomic capture:
//! either a whole image or an error.

use crate::{Error, Result};
use image::{ImageFormat, ImageReader, RgbaImage};
use log::debug;
use std::io::Cursor;
use std::sync::Arc;

/// Identifies the visual region to capture (a CSS selector on the loaded page).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionHandle {
    pub selector: String,
}

impl RegionHandle {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }
}

/// A captured pixel snapshot of a region, PNG-encoded.
///
/// Owned by a single export invocation and never mutated after capture.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub width_px: u32,
    pub height_px: u32,
    pub png_data: Vec<u8>,
}

impl RasterImage {
    pub fn new(width_px: u32, height_px: u32, png_data: Vec<u8>) -> Self {
        Self {
            width_px,
            height_px,
            png_data,
        }
    }

    /// Wrap PNG bytes, reading the dimensions from the PNG header.
    pub fn from_png(png_data: Vec<u8>) -> Result<Self> {
        let (width_px, height_px) = ImageReader::with_format(Cursor::new(&png_data), ImageFormat::Png)
            .into_dimensions()
            .map_err(|e| Error::CaptureFailed(format!("capture is not a valid PNG: {}", e)))?;
        Ok(Self::new(width_px, height_px, png_data))
    }

    /// Encode an RGBA pixel buffer as PNG.
    pub fn from_rgba(pixels: &RgbaImage) -> Result<Self> {
        let mut png_data = Vec::new();
        pixels
            .write_to(&mut Cursor::new(&mut png_data), ImageFormat::Png)
            .map_err(|e| Error::CaptureFailed(format!("PNG encoding failed: {}", e)))?;
        Ok(Self::new(pixels.width(), pixels.height(), png_data))
    }
}

/// The external "render region to pixels" capability.
///
/// Implementations are synchronous and may block; the adapter moves them onto
/// a blocking thread.
pub trait RasterBackend: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Render `region` at `scale` device pixels per CSS pixel.
    fn render_region(&self, region: &RegionHandle, scale: f64) -> Result<RasterImage>;
}

/// Async wrapper over a loaded [`RasterBackend`] with a fixed oversampling scale.
#[derive(Clone)]
pub struct RasterizerAdapter {
    backend: Arc<dyn RasterBackend>,
    scale: f64,
}

impl RasterizerAdapter {
    pub fn new(backend: Arc<dyn RasterBackend>, scale: f64) -> Self {
        Self { backend, scale }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Capture `region` as a single raster image.
    pub async fn capture(&self, region: &RegionHandle) -> Result<RasterImage> {
        let backend = Arc::clone(&self.backend);
        let owned_region = region.clone();
        let scale = self.scale;

        let res = tokio::task::spawn_blocking(move || backend.render_region(&owned_region, scale))
            .await
            .map_err(|e| Error::CaptureFailed(format!("capture task aborted: {}", e)))?;

        let image = res.map_err(|e| match e {
            Error::CaptureFailed(_) => e,
            other => Error::CaptureFailed(other.to_string()),
        })?;

        debug!(
            "captured '{}' via {} at {}x: {}x{} px",
            region.selector,
            self.backend.name(),
            scale,
            image.width_px,
            image.height_px
        );
        Ok(image)
    }
}
