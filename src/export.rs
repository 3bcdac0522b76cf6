//! The export trigger: capture → split → emit, with every failure recovered
//! into a single user-facing message.

use crate::capability::{CapabilityCache, CapabilityProvider};
use crate::capture::{RasterBackend, RasterizerAdapter, RegionHandle};
use crate::document::{DocumentArtifact, DocumentBackend, DocumentEmitter, SaveTarget};
use crate::report::ReportMeta;
use crate::split::split_into_pages;
use crate::{Error, ExportConfig, Result};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub type RasterProvider = Arc<dyn CapabilityProvider<Output = dyn RasterBackend>>;
pub type DocumentProvider = Arc<dyn CapabilityProvider<Output = dyn DocumentBackend>>;

/// What the user observes after triggering an export
#[derive(Debug, Clone)]
pub enum ExportOutcome {
    Downloaded(DocumentArtifact),
    Failed { message: String },
}

impl ExportOutcome {
    pub fn is_downloaded(&self) -> bool {
        matches!(self, ExportOutcome::Downloaded(_))
    }
}

/// Runs exports of one page region. One export at a time: a trigger that
/// arrives while another export is running is rejected, not queued.
pub struct Exporter {
    config: ExportConfig,
    cache: Arc<CapabilityCache>,
    rasterizer: RasterProvider,
    document: DocumentProvider,
    target: Arc<dyn SaveTarget>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when the export finishes, however it finishes.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Exporter {
    /// Create an exporter that shares the process-wide capability cache.
    pub fn new(
        config: ExportConfig,
        rasterizer: RasterProvider,
        document: DocumentProvider,
        target: Arc<dyn SaveTarget>,
    ) -> Result<Self> {
        Self::with_cache(config, CapabilityCache::global(), rasterizer, document, target)
    }

    pub fn with_cache(
        config: ExportConfig,
        cache: Arc<CapabilityCache>,
        rasterizer: RasterProvider,
        document: DocumentProvider,
        target: Arc<dyn SaveTarget>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cache,
            rasterizer,
            document,
            target,
            in_flight: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn is_exporting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Export `region` as a paginated document named after `report`.
    pub async fn export(&self, region: &RegionHandle, report: &ReportMeta) -> Result<DocumentArtifact> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::ExportInProgress);
        }
        let _guard = InFlightGuard(&self.in_flight);

        info!("exporting region '{}' for '{}'", region.selector, report.name);

        let (raster_backend, document_backend) = futures::try_join!(
            self.cache.ensure_loaded(Arc::clone(&self.rasterizer)),
            self.cache.ensure_loaded(Arc::clone(&self.document)),
        )?;

        let adapter = RasterizerAdapter::new(raster_backend, self.config.scale);
        let image = adapter.capture(region).await?;

        let geometry = self.config.geometry;
        let placements = split_into_pages(&image, &geometry)?;
        debug!("{} page(s) planned", placements.len());

        let emitter = DocumentEmitter::new(document_backend, Arc::clone(&self.target));
        let file_name = report.file_name(emitter.extension());
        let artifact = emitter.emit(&placements, &image, &geometry, &file_name)?;

        info!(
            "exported {} ({} page(s), {} bytes)",
            artifact.file_name,
            artifact.page_count,
            artifact.bytes.len()
        );
        Ok(artifact)
    }

    /// The user-facing trigger: never fails, never retries.
    pub async fn trigger(&self, region: &RegionHandle, report: &ReportMeta) -> ExportOutcome {
        match self.export(region, report).await {
            Ok(artifact) => ExportOutcome::Downloaded(artifact),
            Err(e) => {
                warn!("export of '{}' failed: {}", region.selector, e);
                ExportOutcome::Failed {
                    message: e.user_message(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityId;
    use crate::capture::RasterImage;
    use crate::document::{MemoryTarget, PdfBackendProvider};
    use image::{Rgba, RgbaImage};
    use std::time::Duration;

    struct SlowBackend;

    impl RasterBackend for SlowBackend {
        fn name(&self) -> &str {
            "slow"
        }

        fn render_region(&self, _region: &RegionHandle, _scale: f64) -> Result<RasterImage> {
            std::thread::sleep(Duration::from_millis(200));
            RasterImage::from_rgba(&RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255])))
        }
    }

    struct SlowProvider;

    impl CapabilityProvider for SlowProvider {
        type Output = dyn RasterBackend;

        fn id(&self) -> CapabilityId {
            CapabilityId::rasterizer("slow")
        }

        fn load(&self) -> Result<Arc<dyn RasterBackend>> {
            Ok(Arc::new(SlowBackend))
        }
    }

    fn exporter(target: Arc<MemoryTarget>) -> Exporter {
        Exporter::with_cache(
            ExportConfig::default(),
            Arc::new(CapabilityCache::new()),
            Arc::new(SlowProvider),
            Arc::new(PdfBackendProvider::default()),
            target,
        )
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn overlapping_export_is_rejected() {
        let target = Arc::new(MemoryTarget::new());
        let exporter = exporter(target.clone());
        let region = RegionHandle::new("#report");
        let report = ReportMeta::named("Acme");

        let (first, second) = tokio::join!(exporter.export(&region, &report), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            exporter.export(&region, &report).await
        });

        assert!(first.is_ok());
        assert!(matches!(second, Err(Error::ExportInProgress)));
        assert_eq!(target.saved().len(), 1);
        assert!(!exporter.is_exporting());
    }

    #[tokio::test]
    async fn trigger_reports_success() {
        let target = Arc::new(MemoryTarget::new());
        let outcome = exporter(target.clone())
            .trigger(&RegionHandle::new("#report"), &ReportMeta::named("Acme"))
            .await;
        match outcome {
            ExportOutcome::Downloaded(artifact) => {
                assert_eq!(artifact.file_name, "Acme_Market_Report.pdf");
                assert_eq!(artifact.page_count, 1);
            }
            ExportOutcome::Failed { message } => panic!("export failed: {}", message),
        }
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = ExportConfig {
            scale: 0.0,
            ..Default::default()
        };
        let res = Exporter::with_cache(
            config,
            Arc::new(CapabilityCache::new()),
            Arc::new(SlowProvider),
            Arc::new(PdfBackendProvider::default()),
            Arc::new(MemoryTarget::new()),
        );
        assert!(matches!(res, Err(Error::ConfigError(_))));
    }
}
