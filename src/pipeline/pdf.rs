//! PDF writing: laid-out text (and optionally the chart) → PDF bytes.
//!
//! ## Data Flow
//!
//! ```text
//! Layout ──► one content stream per page ──► lopdf Document ──► bytes
//!              BT /F1 12 Tf x y Td (..) Tj ET
//!              q w 0 0 h x y cm /Im1 Do Q      (chart, if any)
//! ```
//!
//! Text uses the standard Helvetica font with WinAnsiEncoding, so nothing is
//! embedded and characters outside Latin-1 print as `?`. The document has no
//! Info dictionary and no timestamps: the same layout always produces the
//! same bytes.

use crate::error::ReportError;
use crate::pipeline::layout::{Block, Layout, FONT_SIZE, PAGE_HEIGHT, PAGE_WIDTH};
use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::debug;

const FONT_NAME: &str = "F1";
const IMAGE_NAME: &str = "Im1";

/// Encode text for a WinAnsiEncoding font.
///
/// Latin-1 characters map to their byte value; everything else becomes `?`.
pub fn win_ansi_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match u32::from(c) {
            cp @ (0x20..=0x7E | 0xA0..=0xFF) => cp as u8,
            _ => b'?',
        })
        .collect()
}

fn text_ops(ops: &mut Vec<Operation>, x: f32, y: f32, text: &str) {
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new(
        "Tf",
        vec![FONT_NAME.into(), FONT_SIZE.into()],
    ));
    ops.push(Operation::new("Td", vec![x.into(), y.into()]));
    ops.push(Operation::new(
        "Tj",
        vec![Object::String(win_ansi_bytes(text), StringFormat::Literal)],
    ));
    ops.push(Operation::new("ET", vec![]));
}

fn image_ops(ops: &mut Vec<Operation>, block: &Block) {
    ops.push(Operation::new("q", vec![]));
    ops.push(Operation::new(
        "cm",
        vec![
            block.width.into(),
            0.0_f32.into(),
            0.0_f32.into(),
            block.height.into(),
            block.x.into(),
            block.y.into(),
        ],
    ));
    ops.push(Operation::new("Do", vec![IMAGE_NAME.into()]));
    ops.push(Operation::new("Q", vec![]));
}

fn image_xobject(img: &RgbImage) -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(img.width()),
            "Height" => i64::from(img.height()),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8_i64,
        },
        img.as_raw().clone(),
    )
}

fn render_err(e: impl std::fmt::Display) -> ReportError {
    ReportError::PdfRender(e.to_string())
}

/// Write `layout` as a PDF, drawing `image` into its block when given.
pub fn write_pdf(layout: &Layout, image: Option<(&Block, &RgbImage)>) -> Result<Vec<u8>, ReportError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let mut resources = dictionary! {
        "Font" => dictionary! { FONT_NAME => font_id },
    };
    if let Some((_, img)) = image {
        let image_id: ObjectId = doc.add_object(image_xobject(img));
        resources.set("XObject", dictionary! { IMAGE_NAME => image_id });
    }
    let resources_id = doc.add_object(resources);

    let page_count = image
        .map_or(0, |(block, _)| block.page + 1)
        .max(layout.page_count());

    let mut kids: Vec<Object> = Vec::with_capacity(page_count);
    for page in 0..page_count {
        let mut ops = Vec::new();
        for line in layout.lines_on(page) {
            text_ops(&mut ops, line.x, line.y, &line.text);
        }
        if let Some((block, _)) = image.filter(|(b, _)| b.page == page) {
            image_ops(&mut ops, block);
        }

        let content = Content { operations: ops };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().map_err(render_err)?,
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count as i64,
        "Resources" => resources_id,
        "MediaBox" => vec![0.0_f32.into(), 0.0_f32.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut buf = Vec::new();
    doc.save_to(&mut buf).map_err(render_err)?;

    debug!(
        "Wrote PDF: {} pages, {} lines, image={} → {} bytes",
        page_count,
        layout.lines.len(),
        image.is_some(),
        buf.len()
    );
    Ok(buf)
}
