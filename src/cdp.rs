//! Chrome DevTools Protocol rasterizer backend (uses the `headless_chrome` crate)

use crate::capability::{CapabilityId, CapabilityProvider};
use crate::capture::{RasterBackend, RasterImage, RegionHandle};
use crate::{Error, Result};
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions};
use log::debug;
use std::sync::Arc;
use std::time::Duration;

/// Captures regions of a page loaded in headless Chrome.
///
/// The browser is launched and the page navigated once, when the capability
/// is loaded; each capture clips a screenshot to the region's margin box.
pub struct CdpRasterizer {
    // Kept alive for as long as the tab is in use.
    _browser: Browser,
    tab: Arc<Tab>,
}

impl CdpRasterizer {
    pub fn launch(page_url: &str, viewport_width: u32, timeout_ms: u64) -> Result<Self> {
        url::Url::parse(page_url)
            .map_err(|e| Error::CaptureFailed(format!("invalid page URL '{}': {}", page_url, e)))?;

        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((viewport_width, 1024)))
            .idle_browser_timeout(Duration::from_millis(timeout_ms.max(1000)))
            .build()
            .map_err(|e| Error::CaptureFailed(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::CaptureFailed(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::CaptureFailed(format!("Failed to create tab: {}", e)))?;

        tab.navigate_to(page_url)
            .map_err(|e| Error::CaptureFailed(format!("Navigation failed: {}", e)))?;
        tab.wait_until_navigated()
            .map_err(|e| Error::CaptureFailed(format!("Wait for navigation failed: {}", e)))?;

        Ok(Self { _browser: browser, tab })
    }
}

impl RasterBackend for CdpRasterizer {
    fn name(&self) -> &str {
        "cdp"
    }

    fn render_region(&self, region: &RegionHandle, scale: f64) -> Result<RasterImage> {
        let element = self
            .tab
            .find_element(&region.selector)
            .map_err(|e| Error::CaptureFailed(format!("region '{}' is not attached to the page: {}", region.selector, e)))?;

        let box_model = element
            .get_box_model()
            .map_err(|e| Error::CaptureFailed(format!("Failed to measure region '{}': {}", region.selector, e)))?;

        let mut clip = box_model.margin_viewport();
        if clip.width < 1.0 || clip.height < 1.0 {
            return Err(Error::CaptureFailed(format!("region '{}' is empty", region.selector)));
        }
        clip.scale = scale;
        debug!(
            "cdp clip for '{}': {}x{} at ({}, {}) scale {}",
            region.selector, clip.width, clip.height, clip.x, clip.y, scale
        );

        let png = self
            .tab
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, Some(clip), true)
            .map_err(|e| Error::CaptureFailed(format!("Screenshot failed: {}", e)))?;

        RasterImage::from_png(png)
    }
}

/// Launches Chrome and loads `page_url` when the capability is first needed.
#[derive(Debug, Clone)]
pub struct CdpRasterizerProvider {
    page_url: String,
    viewport_width: u32,
    timeout_ms: u64,
}

impl CdpRasterizerProvider {
    pub fn new(page_url: impl Into<String>, viewport_width: u32) -> Self {
        Self {
            page_url: page_url.into(),
            viewport_width,
            timeout_ms: 30000,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

impl CapabilityProvider for CdpRasterizerProvider {
    type Output = dyn RasterBackend;

    fn id(&self) -> CapabilityId {
        CapabilityId::rasterizer(format!("cdp:{}@{}", self.page_url, self.viewport_width))
    }

    fn load(&self) -> Result<Arc<dyn RasterBackend>> {
        let rasterizer = CdpRasterizer::launch(&self.page_url, self.viewport_width, self.timeout_ms)?;
        Ok(Arc::new(rasterizer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_id_includes_url() {
        let p = CdpRasterizerProvider::new("http://127.0.0.1:9/report", 1280);
        assert_eq!(p.id().name, "cdp:http://127.0.0.1:9/report@1280");
    }

    #[test]
    fn launch_rejects_invalid_url() {
        let err = CdpRasterizer::launch("::nope", 800, 1000).err().unwrap();
        assert!(matches!(err, Error::CaptureFailed(_)));
    }
}
