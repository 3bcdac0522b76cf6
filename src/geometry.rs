//! Physical page geometry shared by the splitter and the document emitter

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Unit in which a [`PageGeometry`] is expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    #[default]
    Mm,
    Pt,
    In,
}

impl LengthUnit {
    /// Number of PDF points (1/72 inch) in one unit
    pub fn points_per_unit(self) -> f64 {
        match self {
            LengthUnit::Mm => 72.0 / 25.4,
            LengthUnit::Pt => 1.0,
            LengthUnit::In => 72.0,
        }
    }

    pub fn to_points(self, value: f64) -> f64 {
        value * self.points_per_unit()
    }
}

/// Standard paper sizes, portrait dimensions in millimetres
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperSize {
    A3,
    A4,
    A5,
    Letter,
    Legal,
}

impl PaperSize {
    pub fn dimensions_mm(self) -> (f64, f64) {
        match self {
            PaperSize::A3 => (297.0, 420.0),
            PaperSize::A4 => (210.0, 297.0),
            PaperSize::A5 => (148.0, 210.0),
            PaperSize::Letter => (215.9, 279.4),
            PaperSize::Legal => (215.9, 355.6),
        }
    }
}

impl FromStr for PaperSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a3" => Ok(PaperSize::A3),
            "a4" => Ok(PaperSize::A4),
            "a5" => Ok(PaperSize::A5),
            "letter" => Ok(PaperSize::Letter),
            "legal" => Ok(PaperSize::Legal),
            other => Err(Error::ConfigError(format!("unknown paper size '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// The fixed physical size of every output page.
///
/// Geometry is configuration: it is constant for a given document and never
/// derived from the captured content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub page_width_units: f64,
    pub page_height_units: f64,
    #[serde(default)]
    pub unit: LengthUnit,
}

impl PageGeometry {
    /// Build a geometry, rejecting non-finite or non-positive sizes.
    pub fn new(page_width_units: f64, page_height_units: f64, unit: LengthUnit) -> Result<Self> {
        let geometry = Self {
            page_width_units,
            page_height_units,
            unit,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    pub fn a4() -> Self {
        Self::from_paper(PaperSize::A4, Orientation::Portrait)
    }

    pub fn from_paper(paper: PaperSize, orientation: Orientation) -> Self {
        let (w, h) = paper.dimensions_mm();
        let (page_width_units, page_height_units) = match orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        };
        Self {
            page_width_units,
            page_height_units,
            unit: LengthUnit::Mm,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let ok = |v: f64| v.is_finite() && v > 0.0;
        if !ok(self.page_width_units) || !ok(self.page_height_units) {
            return Err(Error::ConfigError(format!(
                "page geometry must be positive and finite, got {}x{}",
                self.page_width_units, self.page_height_units
            )));
        }
        Ok(())
    }

    pub fn width_pt(&self) -> f64 {
        self.unit.to_points(self.page_width_units)
    }

    pub fn height_pt(&self) -> f64 {
        self.unit.to_points(self.page_height_units)
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::a4()
    }
}
