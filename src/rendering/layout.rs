/// Block layout for a region of an HTML document

use crate::{Error, Result};
use scraper::{ElementRef, Html, Node, Selector};

/// Width of one character cell in CSS pixels (before text scale)
pub const CHAR_WIDTH: u32 = 8;
/// Height of one text line in CSS pixels (before text scale)
pub const LINE_HEIGHT: u32 = 12;

const REGION_PADDING: u32 = 8;
const DEFAULT_FIGURE_HEIGHT: u32 = 150;

const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "b", "bdi", "br", "cite", "code", "em", "i", "kbd", "mark", "q", "s", "small",
    "span", "strong", "sub", "sup", "time", "u",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxModel {
    pub margin: u32,
    pub border: u32,
    pub padding: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutBox {
    pub rect: Rect,
    pub box_model: BoxModel,
}

impl LayoutBox {
    pub fn content_width(&self) -> u32 {
        let total = self.box_model.border + self.box_model.padding;
        self.rect.width.saturating_sub(total * 2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Heading(u8),
    Paragraph,
    ListItem,
    TableRow,
    Preformatted,
    Rule,
    /// Chart or image placeholder (`svg`, `canvas`, `img`)
    Figure,
}

/// A laid-out block: its box, wrapped text and the text scale.
#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub lb: LayoutBox,
    pub text: String,
    pub elem_type: ElementType,
    pub scale: u32,
}

/// The laid-out region, in CSS pixels.
#[derive(Debug, Clone)]
pub struct RegionLayout {
    pub width: u32,
    pub height: u32,
    pub nodes: Vec<LayoutNode>,
}

fn classify(el: &ElementRef) -> Option<ElementType> {
    let name = el.value().name();
    match name {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = name[1..].parse::<u8>().unwrap_or(6);
            Some(ElementType::Heading(level))
        }
        "p" | "blockquote" | "figcaption" | "caption" | "dt" | "dd" => Some(ElementType::Paragraph),
        "li" => Some(ElementType::ListItem),
        "tr" => Some(ElementType::TableRow),
        "pre" => Some(ElementType::Preformatted),
        "hr" => Some(ElementType::Rule),
        "svg" | "canvas" | "img" => Some(ElementType::Figure),
        "div" | "section" | "article" if !inline_text(el).is_empty() => Some(ElementType::Paragraph),
        _ => None,
    }
}

fn collect_inline(el: &ElementRef, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(e) if INLINE_TAGS.contains(&e.name()) => {
                if e.name() == "br" {
                    out.push(' ');
                } else if let Some(child_el) = ElementRef::wrap(child) {
                    collect_inline(&child_el, out);
                }
            }
            _ => {}
        }
    }
}

/// Text directly owned by a block: its text nodes and inline descendants,
/// whitespace collapsed.
fn inline_text(el: &ElementRef) -> String {
    let mut raw = String::new();
    collect_inline(el, &mut raw);
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn row_text(el: &ElementRef) -> String {
    let cells = el
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|c| matches!(c.value().name(), "td" | "th"))
        .map(|c| c.text().collect::<Vec<_>>().join(" "))
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>();
    cells.join(" | ")
}

fn wrap_text(text: &str, chars_per_line: usize) -> String {
    let mut lines = Vec::new();
    let mut cur = String::new();
    for word in text.split_whitespace() {
        if cur.len() + word.len() + 1 > chars_per_line && !cur.is_empty() {
            lines.push(cur);
            cur = word.to_string();
        } else {
            if !cur.is_empty() {
                cur.push(' ');
            }
            cur.push_str(word);
        }
    }
    if !cur.is_empty() {
        lines.push(cur);
    }
    lines.join("\n")
}

fn attr_px(el: &ElementRef, name: &str) -> Option<u32> {
    el.value()
        .attr(name)
        .map(|v| v.trim().trim_end_matches("px"))
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(|v| v.round() as u32)
}

/// Lay out the element matched by `selector` at `viewport_width` CSS pixels.
///
/// Blocks are stacked vertically with fixed margins; the region grows as tall
/// as its content requires.
pub fn layout_region(document: &Html, selector: &str, viewport_width: u32) -> Result<RegionLayout> {
    let sel = Selector::parse(selector)
        .map_err(|e| Error::CaptureFailed(format!("invalid region selector '{}': {:?}", selector, e)))?;
    let region = document
        .select(&sel)
        .next()
        .ok_or_else(|| Error::CaptureFailed(format!("region '{}' is not attached to the page", selector)))?;

    let mut y = REGION_PADDING;
    let block_width = viewport_width.saturating_sub(REGION_PADDING * 2);
    let mut nodes = Vec::new();

    for el in region.descendants().filter_map(ElementRef::wrap) {
        let Some(elem_type) = classify(&el) else {
            continue;
        };

        let (margin, padding, scale) = match elem_type {
            ElementType::Heading(1) | ElementType::Heading(2) => (8u32, 8u32, 2u32),
            ElementType::Heading(_) => (6, 6, 1),
            ElementType::Rule => (6, 0, 1),
            _ => (6, 6, 1),
        };

        let mut lb = LayoutBox {
            rect: Rect {
                x: REGION_PADDING as i32,
                y: y as i32,
                width: block_width,
                height: 0,
            },
            box_model: BoxModel {
                margin,
                border: 0,
                padding,
            },
        };
        let content_w = lb.content_width();

        let (text, box_h) = match elem_type {
            ElementType::Rule => (String::new(), 2),
            ElementType::Figure => {
                let w = attr_px(&el, "width").unwrap_or(content_w).max(1);
                let h = attr_px(&el, "height").unwrap_or(DEFAULT_FIGURE_HEIGHT);
                // shrink to fit, keep aspect ratio
                let h = if w > content_w {
                    (h as u64 * content_w as u64 / w as u64) as u32
                } else {
                    h
                };
                let label = el.value().attr("alt").or_else(|| el.value().attr("aria-label"));
                (label.unwrap_or_default().to_string(), h.max(1) + padding * 2)
            }
            _ => {
                let raw = match elem_type {
                    ElementType::TableRow => row_text(&el),
                    ElementType::Preformatted => el.text().collect::<String>(),
                    _ => inline_text(&el),
                };
                if raw.trim().is_empty() {
                    continue;
                }
                let cell = CHAR_WIDTH * scale;
                let indent = if elem_type == ElementType::ListItem { 2 * CHAR_WIDTH } else { 0 };
                let chars_per_line = (content_w.saturating_sub(indent) / cell).max(1) as usize;
                let text = if elem_type == ElementType::Preformatted {
                    raw.trim_matches('\n').to_string()
                } else {
                    wrap_text(&raw, chars_per_line)
                };
                let lines = (text.lines().count() as u32).max(1);
                (text, lines * LINE_HEIGHT * scale + padding * 2)
            }
        };

        lb.rect.height = box_h;
        nodes.push(LayoutNode {
            lb,
            text,
            elem_type,
            scale,
        });
        y += box_h + margin;
    }

    if nodes.is_empty() {
        return Err(Error::CaptureFailed(format!("region '{}' is empty", selector)));
    }

    Ok(RegionLayout {
        width: viewport_width,
        height: y + REGION_PADDING,
        nodes,
    })
}
