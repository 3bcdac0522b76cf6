//! Browser-less rasterizer backend built on the offline renderer.
//!
//! The page is either supplied inline or fetched over HTTP (feature `fetch`)
//! when the capability is loaded; captures then render regions of that page.

use crate::capability::{CapabilityId, CapabilityProvider};
use crate::capture::{RasterBackend, RasterImage, RegionHandle};
use crate::rendering;
use crate::{Error, Result};
use log::debug;
use std::sync::Arc;
#[cfg(feature = "fetch")]
use std::time::Duration;

/// Where the page containing the export region comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtmlSource {
    Inline(String),
    Url(String),
}

/// Renders regions of a loaded HTML page.
#[derive(Debug)]
pub struct HtmlRasterizer {
    html: String,
    viewport_width: u32,
}

impl HtmlRasterizer {
    pub fn new(html: impl Into<String>, viewport_width: u32) -> Self {
        Self {
            html: html.into(),
            viewport_width,
        }
    }
}

impl RasterBackend for HtmlRasterizer {
    fn name(&self) -> &str {
        "html"
    }

    fn render_region(&self, region: &RegionHandle, scale: f64) -> Result<RasterImage> {
        rendering::render_region(&self.html, &region.selector, self.viewport_width, scale)
    }
}

/// Loads an [`HtmlRasterizer`], fetching the page first for URL sources.
#[derive(Debug, Clone)]
pub struct HtmlRasterizerProvider {
    source: HtmlSource,
    viewport_width: u32,
    timeout_ms: u64,
}

impl HtmlRasterizerProvider {
    pub fn new(source: HtmlSource, viewport_width: u32) -> Self {
        Self {
            source,
            viewport_width,
            timeout_ms: 30000,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    #[cfg(feature = "fetch")]
    fn fetch(&self, address: &str) -> Result<String> {
        let parsed = url::Url::parse(address)
            .map_err(|e| Error::CaptureFailed(format!("invalid page URL '{}': {}", address, e)))?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(self.timeout_ms))
            .build()
            .map_err(|e| Error::CaptureFailed(format!("Failed to build HTTP client: {}", e)))?;
        let res = client
            .get(parsed)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::CaptureFailed(format!("HTTP GET failed: {}", e)))?;
        res.text()
            .map_err(|e| Error::CaptureFailed(format!("Failed to read response body: {}", e)))
    }

    #[cfg(not(feature = "fetch"))]
    fn fetch(&self, address: &str) -> Result<String> {
        Err(Error::CaptureFailed(format!(
            "cannot fetch '{}': built without the `fetch` feature",
            address
        )))
    }
}

impl CapabilityProvider for HtmlRasterizerProvider {
    type Output = dyn RasterBackend;

    fn id(&self) -> CapabilityId {
        match &self.source {
            HtmlSource::Inline(html) => {
                // Distinct inline pages must not share a cache slot.
                use sha2::{Digest, Sha256};
                let digest = Sha256::digest(html.as_bytes());
                CapabilityId::rasterizer(format!("html:inline:{}@{}", &hex::encode(digest)[..16], self.viewport_width))
            }
            HtmlSource::Url(u) => CapabilityId::rasterizer(format!("html:{}@{}", u, self.viewport_width)),
        }
    }

    fn load(&self) -> Result<Arc<dyn RasterBackend>> {
        let html = match &self.source {
            HtmlSource::Inline(html) => html.clone(),
            HtmlSource::Url(address) => {
                debug!("fetching export page {}", address);
                self.fetch(address)?
            }
        };
        Ok(Arc::new(HtmlRasterizer::new(html, self.viewport_width)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_ids_differ_by_content() {
        let a = HtmlRasterizerProvider::new(HtmlSource::Inline("<p>a</p>".into()), 800);
        let b = HtmlRasterizerProvider::new(HtmlSource::Inline("<p>b</p>".into()), 800);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.clone().id());
    }

    #[test]
    fn inline_provider_loads_without_network() {
        let provider = HtmlRasterizerProvider::new(HtmlSource::Inline("<div id=r><p>x</p></div>".into()), 100);
        let backend = provider.load().unwrap();
        let img = backend.render_region(&RegionHandle::new("#r"), 1.0).unwrap();
        assert_eq!(img.width_px, 100);
    }

    #[cfg(feature = "fetch")]
    #[test]
    fn bad_url_is_capture_failure() {
        let provider = HtmlRasterizerProvider::new(HtmlSource::Url("not a url".into()), 100);
        assert!(matches!(provider.load(), Err(Error::CaptureFailed(_))));
    }
}
