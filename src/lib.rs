//! snapdoc
//!
//! Capture an already-rendered page region (of any height) and export it as a
//! fixed-page-size, multi-page PDF.
//!
//! # Pipeline
//!
//! - **Capture**: a [`RasterBackend`] renders the region to one raster image
//!   at a fixed oversampling scale ([`capture`]).
//! - **Split**: the image is scaled to the page width and divided into
//!   page-sized windows ([`split`]). This is a pure function.
//! - **Emit**: one page per window, each showing the full image shifted up
//!   by the height already shown, serialized and saved ([`document`]).
//!
//! External capabilities (the rasterizer and the document library) are
//! obtained through [`CapabilityProvider`]s and cached process-wide
//! ([`capability`]).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use snapdoc::{ExportConfig, Exporter, HtmlRasterizerProvider, HtmlSource, RegionHandle, ReportMeta};
//! use snapdoc::document::{DirectoryTarget, PdfBackendProvider};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ExportConfig::default();
//! let html = std::fs::read_to_string("report.html")?;
//! let exporter = Exporter::new(
//!     config.clone(),
//!     Arc::new(HtmlRasterizerProvider::new(HtmlSource::Inline(html), config.viewport_width)),
//!     Arc::new(PdfBackendProvider::default()),
//!     Arc::new(DirectoryTarget::new(".")),
//! )?;
//! let artifact = exporter
//!     .export(&RegionHandle::new("#report"), &ReportMeta::named("Acme"))
//!     .await?;
//! println!("{} pages written to {:?}", artifact.page_count, artifact.location);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod error;
pub use error::{Error, Result};

pub mod capability;
pub mod capture;
pub mod document;
pub mod export;
pub mod geometry;
pub mod html;
pub mod rendering;
pub mod report;
pub mod split;

// Chrome-backed rasterizer (feature-gated)
#[cfg(feature = "cdp")]
pub mod cdp;

pub use capability::{CapabilityCache, CapabilityId, CapabilityKind, CapabilityProvider};
pub use capture::{RasterBackend, RasterImage, RasterizerAdapter, RegionHandle};
pub use document::{DocumentArtifact, DocumentEmitter};
pub use export::{ExportOutcome, Exporter};
pub use geometry::{LengthUnit, Orientation, PageGeometry, PaperSize};
pub use html::{HtmlRasterizerProvider, HtmlSource};
pub use report::ReportMeta;
pub use split::{split_into_pages, PageImagePlacement, ScaledImage};

/// Oversampling factor used when capturing, for export sharpness
pub const DEFAULT_CAPTURE_SCALE: f64 = 2.0;

/// Configuration for exports
///
/// Every field has a default, so a JSON config file only needs the fields it
/// changes.
///
/// # Examples
///
/// ```
/// let cfg = snapdoc::ExportConfig::default();
/// assert_eq!(cfg.scale, 2.0);
/// assert_eq!(cfg.geometry.page_width_units, 210.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Capture oversampling factor (device pixels per CSS pixel)
    pub scale: f64,
    /// Size of every output page
    pub geometry: PageGeometry,
    /// Layout width, in CSS pixels, for rasterizer backends
    pub viewport_width: u32,
    /// Timeout for fetching pages and launching browsers, in milliseconds
    pub timeout_ms: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            scale: DEFAULT_CAPTURE_SCALE,
            geometry: PageGeometry::a4(),
            viewport_width: 1280,
            timeout_ms: 30000,
        }
    }
}

impl ExportConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ExportConfig =
            serde_json::from_str(json).map_err(|e| Error::ConfigError(format!("invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("cannot read config {}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(Error::ConfigError(format!("scale must be positive, got {}", self.scale)));
        }
        if self.viewport_width == 0 {
            return Err(Error::ConfigError("viewport_width must be at least 1".into()));
        }
        self.geometry.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExportConfig::default();
        assert_eq!(config.scale, 2.0);
        assert_eq!(config.viewport_width, 1280);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ExportConfig::from_json_str(
            r#"{"geometry": {"page_width_units": 8.5, "page_height_units": 11, "unit": "in"}}"#,
        )
        .unwrap();
        assert_eq!(config.scale, 2.0);
        assert_eq!(config.geometry.unit, LengthUnit::In);
        assert_eq!(config.geometry.page_height_units, 11.0);
    }

    #[test]
    fn json_with_bad_geometry_is_rejected() {
        let err = ExportConfig::from_json_str(r#"{"geometry": {"page_width_units": 0, "page_height_units": 11}}"#)
            .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn zero_viewport_is_rejected() {
        let config = ExportConfig {
            viewport_width: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
