/// Paint command list built from a region layout

use crate::rendering::layout::{ElementType, RegionLayout, CHAR_WIDTH};

pub type Rgba = (u8, u8, u8, u8);

pub const WHITE: Rgba = (255, 255, 255, 255);
pub const INK: Rgba = (0, 0, 0, 255);
const MUTED: Rgba = (200, 200, 200, 255);
const SHADE: Rgba = (240, 240, 240, 255);
const FIGURE_FILL: Rgba = (214, 226, 240, 255);
const FIGURE_EDGE: Rgba = (120, 144, 176, 255);

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    SolidRect {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        rgba: Rgba,
    },
    /// Text drawn as one filled cell per non-space character
    Text {
        x: i32,
        y: i32,
        text: String,
        scale: u32,
        rgba: Rgba,
    },
}

fn rect(x: i32, y: i32, width: u32, height: u32, rgba: Rgba) -> PaintCommand {
    PaintCommand::SolidRect {
        x,
        y,
        width,
        height,
        rgba,
    }
}

/// Build the display list for `layout`, back to front.
pub fn build_display_list(layout: &RegionLayout) -> Vec<PaintCommand> {
    let mut cmds = vec![rect(0, 0, layout.width, layout.height, WHITE)];

    for node in &layout.nodes {
        let r = &node.lb.rect;
        let pad = node.lb.box_model.padding as i32;
        let text_x = r.x + pad;
        let text_y = r.y + pad;

        match node.elem_type {
            ElementType::Rule => {
                cmds.push(rect(r.x, r.y, r.width, r.height, MUTED));
            }
            ElementType::Figure => {
                cmds.push(rect(r.x, r.y, r.width, r.height, FIGURE_EDGE));
                cmds.push(rect(
                    r.x + 1,
                    r.y + 1,
                    r.width.saturating_sub(2),
                    r.height.saturating_sub(2),
                    FIGURE_FILL,
                ));
            }
            ElementType::Preformatted => {
                cmds.push(rect(r.x, r.y, r.width, r.height, SHADE));
            }
            ElementType::TableRow => {
                cmds.push(rect(r.x, r.bottom() - 1, r.width, 1, MUTED));
            }
            ElementType::Heading(level) if level <= 2 => {
                cmds.push(rect(r.x, r.bottom() - 1, r.width, 1, MUTED));
            }
            _ => {}
        }

        if node.text.is_empty() {
            continue;
        }
        let x = if node.elem_type == ElementType::ListItem {
            // bullet
            cmds.push(rect(text_x + 2, text_y + 4, 4, 4, INK));
            text_x + 2 * CHAR_WIDTH as i32
        } else {
            text_x
        };
        cmds.push(PaintCommand::Text {
            x,
            y: text_y,
            text: node.text.clone(),
            scale: node.scale,
            rgba: INK,
        });
    }

    cmds
}
