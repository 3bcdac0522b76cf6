use std::fs;
use std::path::PathBuf;

use scraper::Html;
use sha2::{Digest, Sha256};
use snapdoc::rendering::layout::layout_region;
use snapdoc::rendering::paint::build_display_list;
use snapdoc::rendering::raster::rasterize;
use snapdoc::rendering::render_region;

fn golden_path(name: &str) -> PathBuf {
    let mut p = PathBuf::from("tests/goldens/expected");
    p.push(name);
    p
}

/// `"<width>x<height> <sha256 of the raw RGBA pixels>"`
fn raster_digest(page: &str) -> String {
    let document = Html::parse_document(page);
    let layout = layout_region(&document, "#report", 640).expect("layout fixture region");
    let pixels = rasterize(&build_display_list(&layout), layout.width, layout.height, 2.0);
    format!(
        "{}x{} {}",
        pixels.width(),
        pixels.height(),
        hex::encode(Sha256::digest(pixels.as_raw()))
    )
}

#[test]
fn golden_region_raster_matches_fixture() {
    let page = fs::read_to_string("tests/fixtures/report.html").expect("read fixture");
    let digest = raster_digest(&page);

    let expected_path = golden_path("report.sha256");
    if std::env::var("UPDATE_GOLDENS").is_ok() {
        fs::create_dir_all("tests/goldens/expected").ok();
        fs::write(&expected_path, format!("{}\n", digest)).expect("write golden");
        println!("Updated golden: {:?}", expected_path);
        return;
    }

    let exp = fs::read_to_string(&expected_path).expect("unable to read golden; run with UPDATE_GOLDENS=1");
    assert_eq!(digest, exp.trim());
}

#[test]
fn png_capture_has_golden_dimensions() {
    let page = fs::read_to_string("tests/fixtures/report.html").expect("read fixture");
    let image = render_region(&page, "#report", 640, 2.0).expect("render fixture region");
    let exp = fs::read_to_string(golden_path("report.sha256")).expect("unable to read golden");
    let dims = exp.split_whitespace().next().unwrap_or_default();
    assert_eq!(format!("{}x{}", image.width_px, image.height_px), dims);
}
