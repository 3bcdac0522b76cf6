/// Rasterizer: paint commands to RGBA pixels at an oversampling scale

use crate::rendering::layout::{CHAR_WIDTH, LINE_HEIGHT};
use crate::rendering::paint::{PaintCommand, Rgba};
use image::{Rgba as Pixel, RgbaImage};

fn scaled(v: i64, scale: f64) -> i64 {
    (v as f64 * scale).round() as i64
}

fn fill(img: &mut RgbaImage, x: i64, y: i64, w: i64, h: i64, scale: f64, rgba: Rgba) {
    let (iw, ih) = (img.width() as i64, img.height() as i64);
    let x0 = scaled(x, scale).clamp(0, iw);
    let y0 = scaled(y, scale).clamp(0, ih);
    let x1 = scaled(x + w, scale).clamp(0, iw);
    let y1 = scaled(y + h, scale).clamp(0, ih);
    let px = Pixel([rgba.0, rgba.1, rgba.2, rgba.3]);
    for py in y0..y1 {
        for pxx in x0..x1 {
            img.put_pixel(pxx as u32, py as u32, px);
        }
    }
}

/// Rasterize `commands` over a `width`x`height` CSS-pixel canvas.
///
/// The output is `round(width * scale)` by `round(height * scale)` pixels
/// (never smaller than 1x1). Rendering is deterministic.
pub fn rasterize(commands: &[PaintCommand], width: u32, height: u32, scale: f64) -> RgbaImage {
    let out_w = scaled(width as i64, scale).max(1) as u32;
    let out_h = scaled(height as i64, scale).max(1) as u32;
    let mut img = RgbaImage::from_pixel(out_w, out_h, Pixel([255, 255, 255, 255]));

    for cmd in commands {
        match cmd {
            PaintCommand::SolidRect {
                x,
                y,
                width,
                height,
                rgba,
            } => fill(&mut img, *x as i64, *y as i64, *width as i64, *height as i64, scale, *rgba),
            PaintCommand::Text {
                x,
                y,
                text,
                scale: text_scale,
                rgba,
            } => {
                let cell_w = (CHAR_WIDTH * text_scale) as i64;
                let cell_h = (LINE_HEIGHT * text_scale) as i64;
                let s = *text_scale as i64;
                for (row, line) in text.lines().enumerate() {
                    let top = *y as i64 + row as i64 * cell_h;
                    for (col, ch) in line.chars().enumerate() {
                        if ch.is_whitespace() {
                            continue;
                        }
                        let left = *x as i64 + col as i64 * cell_w;
                        // glyph box inset within its cell
                        fill(&mut img, left + s, top + 2 * s, cell_w - 2 * s, cell_h - 4 * s, scale, *rgba);
                    }
                }
            }
        }
    }

    img
}
