//! Document emitter: materializes page placements into a saved document.
//!
//! The document library is reached through the [`DocumentBackend`]
//! capability; the default backend writes PDF with `lopdf`. The full scaled
//! image is placed on every page at that page's vertical offset and the page
//! bounds clip it, so content is pixel-identical across page boundaries and
//! the image is embedded only once.

use crate::capability::{CapabilityId, CapabilityProvider};
use crate::capture::RasterImage;
use crate::geometry::PageGeometry;
use crate::split::{PageImagePlacement, ScaledImage};
use crate::{Error, Result};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::ImageFormat;
use log::{debug, info};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Handle to an image registered with a [`DocumentWriter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRef(usize);

/// Page-relative image rectangle in geometry units; `y` is the distance of
/// the image's top edge below the page's top edge (negative = above the page).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// The external document-authoring capability.
pub trait DocumentBackend: Send + Sync {
    fn name(&self) -> &str;

    /// File extension of produced documents, without the dot
    fn extension(&self) -> &str;

    /// Create a document whose first page already exists and has `geometry`.
    fn create(&self, geometry: &PageGeometry) -> Result<Box<dyn DocumentWriter>>;
}

/// An in-progress document. Drawing operations apply to the last page.
pub trait DocumentWriter {
    fn register_image(&mut self, image: &RasterImage) -> Result<ImageRef>;

    fn add_page(&mut self, geometry: &PageGeometry) -> Result<()>;

    fn place_image(&mut self, image: ImageRef, rect: ImageRect) -> Result<()>;

    fn page_count(&self) -> usize;

    /// Serialize the document.
    fn finish(self: Box<Self>) -> Result<Vec<u8>>;
}

/// PDF output through `lopdf`
#[derive(Debug, Clone)]
pub struct PdfBackend {
    pub pdf_version: String,
    pub producer: String,
}

impl Default for PdfBackend {
    fn default() -> Self {
        Self {
            pdf_version: "1.5".to_string(),
            producer: format!("snapdoc {}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl DocumentBackend for PdfBackend {
    fn name(&self) -> &str {
        "pdf"
    }

    fn extension(&self) -> &str {
        "pdf"
    }

    fn create(&self, geometry: &PageGeometry) -> Result<Box<dyn DocumentWriter>> {
        geometry.validate()?;
        let mut doc = Document::with_version(self.pdf_version.as_str());
        let pages_id = doc.new_object_id();
        Ok(Box::new(PdfWriter {
            doc,
            pages_id,
            producer: self.producer.clone(),
            pages: vec![PdfPage::new(*geometry)],
            images: Vec::new(),
        }))
    }
}

struct PdfPage {
    geometry: PageGeometry,
    operations: Vec<Operation>,
    images: Vec<usize>,
}

impl PdfPage {
    fn new(geometry: PageGeometry) -> Self {
        Self {
            geometry,
            operations: Vec::new(),
            images: Vec::new(),
        }
    }
}

struct PdfWriter {
    doc: Document,
    pages_id: ObjectId,
    producer: String,
    pages: Vec<PdfPage>,
    images: Vec<ObjectId>,
}

fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

fn image_name(index: usize) -> String {
    format!("Im{}", index)
}

/// Decode a PNG raster into a deflated DeviceRGB image XObject, flattening
/// any transparency onto white.
fn image_xobject(image: &RasterImage) -> Result<Stream> {
    let decoded = image::load_from_memory_with_format(&image.png_data, ImageFormat::Png)
        .map_err(|e| Error::EmitFailed(format!("cannot decode captured image: {}", e)))?
        .to_rgba8();

    let mut rgb = Vec::with_capacity(decoded.width() as usize * decoded.height() as usize * 3);
    for px in decoded.pixels() {
        let [r, g, b, a] = px.0;
        let a = a as u32;
        for c in [r, g, b] {
            rgb.push(((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8);
        }
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&rgb)
        .map_err(|e| Error::EmitFailed(format!("image compression failed: {}", e)))?;
    let compressed = encoder
        .finish()
        .map_err(|e| Error::EmitFailed(format!("image compression failed: {}", e)))?;

    Ok(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => decoded.width() as i64,
            "Height" => decoded.height() as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8i64,
            "Filter" => "FlateDecode",
        },
        compressed,
    ))
}

impl DocumentWriter for PdfWriter {
    fn register_image(&mut self, image: &RasterImage) -> Result<ImageRef> {
        let stream = image_xobject(image)?;
        let id = self.doc.add_object(stream);
        self.images.push(id);
        Ok(ImageRef(self.images.len() - 1))
    }

    fn add_page(&mut self, geometry: &PageGeometry) -> Result<()> {
        geometry.validate()?;
        self.pages.push(PdfPage::new(*geometry));
        Ok(())
    }

    fn place_image(&mut self, image: ImageRef, rect: ImageRect) -> Result<()> {
        if image.0 >= self.images.len() {
            return Err(Error::EmitFailed(format!("unknown image reference {}", image.0)));
        }
        let page = self
            .pages
            .last_mut()
            .ok_or_else(|| Error::EmitFailed("document has no pages".into()))?;

        let unit = page.geometry.unit;
        let w = unit.to_points(rect.width);
        let h = unit.to_points(rect.height);
        let x = unit.to_points(rect.x);
        // PDF origin is bottom-left; rect.y is measured down from the page top.
        let y = page.geometry.height_pt() - unit.to_points(rect.y) - h;

        page.operations.extend([
            Operation::new("q", vec![]),
            Operation::new("cm", vec![real(w), real(0.0), real(0.0), real(h), real(x), real(y)]),
            Operation::new("Do", vec![Object::Name(image_name(image.0).into_bytes())]),
            Operation::new("Q", vec![]),
        ]);
        if !page.images.contains(&image.0) {
            page.images.push(image.0);
        }
        Ok(())
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>> {
        let PdfWriter {
            mut doc,
            pages_id,
            producer,
            pages,
            images,
        } = *self;

        let mut kids = Vec::with_capacity(pages.len());
        for page in pages {
            let content = Content {
                operations: page.operations,
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

            let mut xobjects = Dictionary::new();
            for index in &page.images {
                xobjects.set(image_name(*index), images[*index]);
            }

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![Object::Integer(0), Object::Integer(0), real(page.geometry.width_pt()), real(page.geometry.height_pt())],
                "Contents" => content_id,
                "Resources" => dictionary! { "XObject" => xobjects },
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(dictionary! {
            "Producer" => Object::string_literal(producer),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|e| Error::EmitFailed(format!("PDF serialization failed: {}", e)))?;
        Ok(bytes)
    }
}

/// Provides the lopdf-backed [`PdfBackend`].
#[derive(Debug, Clone, Default)]
pub struct PdfBackendProvider {
    backend: PdfBackend,
}

impl PdfBackendProvider {
    pub fn new(backend: PdfBackend) -> Self {
        Self { backend }
    }
}

impl CapabilityProvider for PdfBackendProvider {
    type Output = dyn DocumentBackend;

    fn id(&self) -> CapabilityId {
        CapabilityId::document(format!("pdf:lopdf:{}", self.backend.pdf_version))
    }

    fn load(&self) -> Result<Arc<dyn DocumentBackend>> {
        Ok(Arc::new(self.backend.clone()))
    }
}

/// Where finished documents are delivered (the "download").
pub trait SaveTarget: Send + Sync {
    /// Save `bytes` under `file_name`, returning the saved location if any.
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<Option<PathBuf>>;
}

/// Saves into a directory. Files are written to a temporary file first and
/// renamed into place, so a failed save leaves any earlier file untouched.
#[derive(Debug, Clone)]
pub struct DirectoryTarget {
    dir: PathBuf,
}

impl DirectoryTarget {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SaveTarget for DirectoryTarget {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<Option<PathBuf>> {
        if file_name.is_empty() || file_name.contains(|c| c == '/' || c == '\\') || file_name == "." || file_name == ".." {
            return Err(Error::EmitFailed(format!("refusing to save under '{}'", file_name)));
        }
        let path = self.dir.join(file_name);

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| Error::EmitFailed(format!("cannot write to {}: {}", self.dir.display(), e)))?;
        tmp.write_all(bytes)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| Error::EmitFailed(format!("cannot write {}: {}", path.display(), e)))?;
        tmp.persist(&path)
            .map_err(|e| Error::EmitFailed(format!("cannot save {}: {}", path.display(), e.error)))?;

        info!("saved {} ({} bytes)", path.display(), bytes.len());
        Ok(Some(path))
    }
}

/// Keeps saved documents in memory, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryTarget {
    saved: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Saved documents as `(file_name, bytes)`, oldest first
    pub fn saved(&self) -> Vec<(String, Vec<u8>)> {
        self.saved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl SaveTarget for MemoryTarget {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<Option<PathBuf>> {
        self.saved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((file_name.to_string(), bytes.to_vec()));
        Ok(None)
    }
}

/// A finished, saved document
#[derive(Debug, Clone)]
pub struct DocumentArtifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub page_count: usize,
    /// Filesystem location when the target saved to disk
    pub location: Option<PathBuf>,
}

impl DocumentArtifact {
    pub fn sha256_hex(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }
}

/// Turns a placement sequence into a saved document.
#[derive(Clone)]
pub struct DocumentEmitter {
    backend: Arc<dyn DocumentBackend>,
    target: Arc<dyn SaveTarget>,
}

impl DocumentEmitter {
    pub fn new(backend: Arc<dyn DocumentBackend>, target: Arc<dyn SaveTarget>) -> Self {
        Self { backend, target }
    }

    pub fn extension(&self) -> &str {
        self.backend.extension()
    }

    /// Build one page per placement, each showing the full scaled image at the
    /// placement's offset, then serialize and save under `file_name`.
    pub fn emit(
        &self,
        placements: &[PageImagePlacement],
        image: &RasterImage,
        geometry: &PageGeometry,
        file_name: &str,
    ) -> Result<DocumentArtifact> {
        if placements.is_empty() {
            return Err(Error::EmitFailed("no pages to emit".into()));
        }
        let scaled = ScaledImage::of(image, geometry)?;

        let bytes = self.render(placements, image, geometry, &scaled).map_err(|e| match e {
            Error::EmitFailed(_) | Error::InvalidImageDimensions { .. } => e,
            other => Error::EmitFailed(other.to_string()),
        })?;

        let location = self.target.save(file_name, &bytes).map_err(|e| match e {
            Error::EmitFailed(_) => e,
            other => Error::EmitFailed(other.to_string()),
        })?;

        Ok(DocumentArtifact {
            file_name: file_name.to_string(),
            bytes,
            page_count: placements.len(),
            location,
        })
    }

    fn render(
        &self,
        placements: &[PageImagePlacement],
        image: &RasterImage,
        geometry: &PageGeometry,
        scaled: &ScaledImage,
    ) -> Result<Vec<u8>> {
        let mut writer = self.backend.create(geometry)?;
        let image_ref = writer.register_image(image)?;

        for placement in placements {
            // The first page is created with the document.
            if placement.page_index > 0 {
                writer.add_page(geometry)?;
            }
            writer.place_image(
                image_ref,
                ImageRect {
                    x: 0.0,
                    y: placement.vertical_offset_units,
                    width: scaled.width_units,
                    height: scaled.height_units,
                },
            )?;
        }

        debug!(
            "{} writer built {} page(s) for {} placement(s)",
            self.backend.name(),
            writer.page_count(),
            placements.len()
        );
        writer.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split::split_into_pages;
    use image::{Rgba, RgbaImage};

    fn raster(width: u32, height: u32) -> RasterImage {
        RasterImage::from_rgba(&RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]))).unwrap()
    }

    fn emitter(target: Arc<dyn SaveTarget>) -> DocumentEmitter {
        DocumentEmitter::new(Arc::new(PdfBackend::default()), target)
    }

    #[test]
    fn emits_one_pdf_page_per_placement() {
        let image = raster(100, 400); // 840 mm tall at A4 width
        let geometry = PageGeometry::a4();
        let placements = split_into_pages(&image, &geometry).unwrap();
        let target = Arc::new(MemoryTarget::new());

        let artifact = emitter(target.clone()).emit(&placements, &image, &geometry, "Acme_Market_Report.pdf").unwrap();
        assert_eq!(artifact.page_count, 3);
        assert!(artifact.bytes.starts_with(b"%PDF-1.5"));
        assert!(artifact.location.is_none());

        let doc = Document::load_mem(&artifact.bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 3);

        let saved = target.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, "Acme_Market_Report.pdf");
    }

    #[test]
    fn image_is_embedded_once_and_shifted_per_page() {
        let image = raster(210, 594); // exactly two A4 pages
        let geometry = PageGeometry::a4();
        let placements = split_into_pages(&image, &geometry).unwrap();
        let artifact = emitter(Arc::new(MemoryTarget::new()))
            .emit(&placements, &image, &geometry, "x.pdf")
            .unwrap();

        let doc = Document::load_mem(&artifact.bytes).unwrap();
        let image_objects = doc
            .objects
            .values()
            .filter(|o| matches!(o, Object::Stream(s) if s.dict.get(b"Subtype").and_then(|n| n.as_name()).ok() == Some(b"Image".as_slice())))
            .count();
        assert_eq!(image_objects, 1);

        let mut translations = Vec::new();
        for (_, page_id) in doc.get_pages() {
            let content = doc.get_page_content(page_id).unwrap();
            let ops = Content::decode(&content).unwrap().operations;
            let cm = ops.iter().find(|op| op.operator == "cm").unwrap();
            translations.push(cm.operands[5].as_float().unwrap());
        }
        // page height 841.89pt, image height 1683.78pt: first page shows the top half
        assert!((translations[0] - -841.89).abs() < 0.1);
        assert!((translations[1] - 0.0).abs() < 0.1);
    }

    #[test]
    fn transparent_pixels_flatten_to_white() {
        let image = RasterImage::from_rgba(&RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0]))).unwrap();
        let stream = image_xobject(&image).unwrap();
        let data = stream.decompressed_content().unwrap();
        assert_eq!(data, vec![255u8; 12]);
    }

    #[test]
    fn empty_placements_are_rejected() {
        let err = emitter(Arc::new(MemoryTarget::new()))
            .emit(&[], &raster(1, 1), &PageGeometry::a4(), "x.pdf")
            .unwrap_err();
        assert!(matches!(err, Error::EmitFailed(_)));
    }

    struct BlockedTarget;

    impl SaveTarget for BlockedTarget {
        fn save(&self, _file_name: &str, _bytes: &[u8]) -> Result<Option<PathBuf>> {
            Err(Error::ExportFailed("download blocked".into()))
        }
    }

    #[test]
    fn save_failure_is_emit_failed() {
        let image = raster(10, 10);
        let geometry = PageGeometry::a4();
        let placements = split_into_pages(&image, &geometry).unwrap();
        let err = emitter(Arc::new(BlockedTarget)).emit(&placements, &image, &geometry, "x.pdf").unwrap_err();
        match err {
            Error::EmitFailed(msg) => assert!(msg.contains("download blocked")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn directory_target_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = DirectoryTarget::new(dir.path());
        let path = target.save("a.pdf", b"%PDF-1.5").unwrap().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.5");
        assert!(target.save("../escape.pdf", b"x").is_err());
    }

    #[test]
    fn directory_target_missing_dir_keeps_error_local() {
        let dir = tempfile::tempdir().unwrap();
        let target = DirectoryTarget::new(dir.path().join("missing"));
        assert!(matches!(target.save("a.pdf", b"x"), Err(Error::EmitFailed(_))));
    }

    #[test]
    fn artifact_digest_is_stable() {
        let image = raster(50, 50);
        let geometry = PageGeometry::a4();
        let placements = split_into_pages(&image, &geometry).unwrap();
        let e = emitter(Arc::new(MemoryTarget::new()));
        let a = e.emit(&placements, &image, &geometry, "x.pdf").unwrap();
        let b = e.emit(&placements, &image, &geometry, "x.pdf").unwrap();
        assert_eq!(a.sha256_hex(), b.sha256_hex());
        assert_eq!(a.sha256_hex().len(), 64);
    }
}
