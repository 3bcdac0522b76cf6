//! Error types for the export pipeline

use thiserror::Error;

/// Result type alias for export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing, paginating or emitting a document
#[derive(Error, Debug)]
pub enum Error {
    /// The region could not be captured (missing/detached region, or the
    /// rasterization capability is unavailable)
    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    /// The captured raster has a zero dimension
    #[error("Invalid image dimensions: {width_px}x{height_px}")]
    InvalidImageDimensions { width_px: u32, height_px: u32 },

    /// Serializing or saving the document failed
    #[error("Emit failed: {0}")]
    EmitFailed(String),

    /// Any other failure from an external capability
    #[error("Export failed: {0}")]
    ExportFailed(String),

    /// Invalid configuration or page geometry
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Another export is already running on the same exporter
    #[error("An export is already in progress")]
    ExportInProgress,
}

impl Error {
    /// The single sentence shown to the user when an export fails.
    pub fn user_message(&self) -> String {
        match self {
            Error::CaptureFailed(reason) => {
                format!("Could not capture the report for export ({}). Please try again.", reason)
            }
            Error::InvalidImageDimensions { .. } => {
                "The report rendered as an empty image and could not be exported.".to_string()
            }
            Error::EmitFailed(reason) => {
                format!("The document could not be saved ({}). Please try again.", reason)
            }
            Error::ExportFailed(reason) => {
                format!("Export is unavailable right now ({}). Please try again.", reason)
            }
            Error::ConfigError(reason) => format!("Export is misconfigured: {}", reason),
            Error::ExportInProgress => {
                "An export is already running. Please wait for it to finish.".to_string()
            }
        }
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        Error::EmitFailed(err.to_string())
    }
}
