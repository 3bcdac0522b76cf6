//! Page splitter: all of the pagination arithmetic, no I/O.
//!
//! The captured image is scaled to the page width (aspect ratio preserved) and
//! the same full image is placed on every page, shifted up by the height
//! already shown on earlier pages. The splitter only decides how many pages
//! there are and what each page's vertical offset is.

use crate::capture::RasterImage;
use crate::geometry::PageGeometry;
use crate::{Error, Result};
use log::debug;
use serde::Serialize;

/// Relative slack (as a fraction of the page height) under which leftover
/// content counts as none. Absorbs floating-point residue so a boundary-aligned
/// image never produces a blank trailing page.
const BOUNDARY_TOLERANCE: f64 = 1e-9;

/// Largest number of pages a single export may produce.
pub const MAX_PAGES: usize = 10_000;

/// The captured image scaled to fill the page width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScaledImage {
    pub width_units: f64,
    pub height_units: f64,
}

impl ScaledImage {
    pub fn of(image: &RasterImage, geometry: &PageGeometry) -> Result<Self> {
        check_dimensions(image)?;
        let height_units = image.height_px as f64 * geometry.page_width_units / image.width_px as f64;
        if !height_units.is_finite() {
            return Err(Error::ConfigError(format!(
                "a {}x{} px image scaled to page width {} has no finite height",
                image.width_px, image.height_px, geometry.page_width_units
            )));
        }
        Ok(Self {
            width_units: geometry.page_width_units,
            height_units,
        })
    }
}

/// Where the full scaled image sits on one output page.
///
/// `vertical_offset_units` is the top edge of the image relative to the top of
/// the page; it is zero on the first page and negative afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageImagePlacement {
    pub page_index: usize,
    pub vertical_offset_units: f64,
}

/// A full pagination result, as printed by `snapdoc plan`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagePlan {
    pub geometry: PageGeometry,
    pub scaled: ScaledImage,
    pub placements: Vec<PageImagePlacement>,
}

fn check_dimensions(image: &RasterImage) -> Result<()> {
    if image.width_px == 0 || image.height_px == 0 {
        return Err(Error::InvalidImageDimensions {
            width_px: image.width_px,
            height_px: image.height_px,
        });
    }
    Ok(())
}

// Page 0 sits at +0.0, not -0.0.
fn page_offset(page_index: usize, page_height: f64) -> f64 {
    if page_index == 0 {
        0.0
    } else {
        -(page_index as f64 * page_height)
    }
}

/// Split `image` into page-sized windows for `geometry`.
///
/// Always yields at least one page. A new page is only started while content
/// remains strictly below the bottom of the previous page, so an image whose
/// scaled height is an exact multiple `k` of the page height yields exactly
/// `k` pages. More than [`MAX_PAGES`] pages is a configuration error.
pub fn split_into_pages(image: &RasterImage, geometry: &PageGeometry) -> Result<Vec<PageImagePlacement>> {
    geometry.validate()?;
    let scaled = ScaledImage::of(image, geometry)?;
    let page_height = geometry.page_height_units;
    let slack = page_height * BOUNDARY_TOLERANCE;

    let estimate = ((scaled.height_units - slack) / page_height).ceil();
    if !estimate.is_finite() || estimate > MAX_PAGES as f64 {
        return Err(Error::ConfigError(format!(
            "content of height {} would need {} pages of height {}, more than the {} page limit",
            scaled.height_units, estimate, page_height, MAX_PAGES
        )));
    }

    let mut placements = Vec::with_capacity((estimate as usize).max(1));
    let mut page_index = 0usize;
    let mut remaining: f64;

    loop {
        placements.push(PageImagePlacement {
            page_index,
            vertical_offset_units: page_offset(page_index, page_height),
        });
        page_index += 1;
        // Measured from the start each time so error does not accumulate
        // over long documents.
        remaining = scaled.height_units - page_index as f64 * page_height;
        if remaining <= slack {
            break;
        }
        if page_index >= MAX_PAGES {
            return Err(Error::ConfigError(format!(
                "content of height {} needs more than {} pages",
                scaled.height_units, MAX_PAGES
            )));
        }
    }

    debug!(
        "split {}x{} px into {} page(s): scaled height {:.3}, page height {:.3}, leftover {:.3}",
        image.width_px,
        image.height_px,
        placements.len(),
        scaled.height_units,
        page_height,
        remaining
    );
    Ok(placements)
}

/// Compute the scaled image together with its placements.
pub fn plan(image: &RasterImage, geometry: &PageGeometry) -> Result<PagePlan> {
    let placements = split_into_pages(image, geometry)?;
    Ok(PagePlan {
        geometry: *geometry,
        scaled: ScaledImage::of(image, geometry)?,
        placements,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::LengthUnit;

    fn image(width_px: u32, height_px: u32) -> RasterImage {
        RasterImage::new(width_px, height_px, Vec::new())
    }

    fn a4() -> PageGeometry {
        PageGeometry::new(210.0, 297.0, LengthUnit::Mm).unwrap()
    }

    fn offsets(placements: &[PageImagePlacement]) -> Vec<f64> {
        placements.iter().map(|p| p.vertical_offset_units).collect()
    }

    #[test]
    fn tall_image_spans_three_pages() {
        // 4000 * 210 / 1000 = 840 units
        let pages = split_into_pages(&image(1000, 4000), &a4()).unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(offsets(&pages), vec![0.0, -297.0, -594.0]);
        assert_eq!(pages[2].page_index, 2);
    }

    #[test]
    fn exact_multiple_has_no_trailing_blank_page() {
        // 594 * 210 / 210 = 594 = 2 * 297
        let pages = split_into_pages(&image(210, 594), &a4()).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(offsets(&pages), vec![0.0, -297.0]);
    }

    #[test]
    fn exactly_one_page_tall() {
        let pages = split_into_pages(&image(210, 297), &a4()).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].vertical_offset_units, 0.0);
    }

    #[test]
    fn short_image_is_one_page_at_zero() {
        let pages = split_into_pages(&image(1000, 10), &a4()).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page_index, 0);
        assert_eq!(pages[0].vertical_offset_units, 0.0);
    }

    #[test]
    fn just_over_a_boundary_adds_a_page() {
        // 595 units: one unit past two full pages
        let pages = split_into_pages(&image(210, 595), &a4()).unwrap();
        assert_eq!(pages.len(), 3);
    }

    #[test]
    fn zero_width_is_rejected() {
        let err = split_into_pages(&image(0, 4000), &a4()).unwrap_err();
        assert!(matches!(err, Error::InvalidImageDimensions { width_px: 0, height_px: 4000 }));
    }

    #[test]
    fn zero_height_is_rejected() {
        let err = split_into_pages(&image(1000, 0), &a4()).unwrap_err();
        assert!(matches!(err, Error::InvalidImageDimensions { .. }));
    }

    #[test]
    fn invalid_geometry_is_rejected() {
        let geometry = PageGeometry {
            page_width_units: 210.0,
            page_height_units: 0.0,
            unit: LengthUnit::Mm,
        };
        let err = split_into_pages(&image(10, 10), &geometry).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn plan_reports_scaled_size() {
        let plan = plan(&image(1000, 4000), &a4()).unwrap();
        assert_eq!(plan.scaled.width_units, 210.0);
        assert_eq!(plan.scaled.height_units, 840.0);
        assert_eq!(plan.placements.len(), 3);
    }
    #[test]
    fn float_residue_at_a_boundary_does_not_add_a_page() {
        // 3 * 0.1 / 1 == 0.30000000000000004, a hair above one page of 0.3
        let geometry = PageGeometry::new(0.1, 0.3, LengthUnit::Pt).unwrap();
        let scaled = ScaledImage::of(&image(1, 3), &geometry).unwrap();
        assert!(scaled.height_units > 0.3);
        let pages = split_into_pages(&image(1, 3), &geometry).unwrap();
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn first_page_offset_is_positive_zero() {
        let pages = split_into_pages(&image(1000, 4000), &a4()).unwrap();
        assert!(pages[0].vertical_offset_units.is_sign_positive());
        let plan = plan(&image(1000, 4000), &a4()).unwrap();
        let json = serde_json::to_string(&plan).unwrap();
        assert!(!json.contains("-0.0"), "{}", json);
    }

    #[test]
    fn unbounded_scaled_height_is_rejected() {
        let geometry = PageGeometry::new(1e308, 297.0, LengthUnit::Pt).unwrap();
        let err = split_into_pages(&image(1, 2), &geometry).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn page_count_above_limit_is_rejected() {
        let geometry = PageGeometry::new(210.0, 1e-6, LengthUnit::Mm).unwrap();
        let err = split_into_pages(&image(1000, 4000), &geometry).unwrap_err();
        match err {
            Error::ConfigError(msg) => assert!(msg.contains("page limit"), "{}", msg),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn page_count_at_limit_is_allowed() {
        let geometry = PageGeometry::new(10.0, 10.0, LengthUnit::Pt).unwrap();
        let pages = split_into_pages(&image(10, (10 * MAX_PAGES) as u32), &geometry).unwrap();
        assert_eq!(pages.len(), MAX_PAGES);
        assert!(split_into_pages(&image(10, (10 * MAX_PAGES) as u32 + 1), &geometry).is_err());
    }
}
