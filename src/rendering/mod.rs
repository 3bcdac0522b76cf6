//! Offline region renderer: HTML → block layout → paint list → pixels.
//!
//! This is a deliberately small renderer: blocks stack vertically, text is
//! drawn as one filled cell per character, and charts/images become framed
//! placeholders. It needs no browser, which makes exports reproducible in
//! tests and on machines without Chrome.

pub mod layout;
pub mod paint;
pub mod raster;

use crate::capture::RasterImage;
use crate::Result;
use scraper::Html;

/// Render the region matched by `selector` in `html` to a PNG raster.
pub fn render_region(html: &str, selector: &str, viewport_width: u32, scale: f64) -> Result<RasterImage> {
    let document = Html::parse_document(html);
    let region = layout::layout_region(&document, selector, viewport_width)?;
    let commands = paint::build_display_list(&region);
    let pixels = raster::rasterize(&commands, region.width, region.height, scale);
    RasterImage::from_rgba(&pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_region_produces_scaled_png() {
        let html = "<div id=r><h1>Heading</h1><p>Hello world</p></div>";
        let img = render_region(html, "#r", 200, 2.0).unwrap();
        assert_eq!(img.width_px, 400);
        assert!(img.height_px > 0);
        assert_eq!(&img.png_data[0..8], b"\x89PNG\r\n\x1a\n");
    }
}
