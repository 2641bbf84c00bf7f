//! Text layout for report documents.
//!
//! Coordinates are PDF points on a US-Letter page with the origin at the
//! bottom-left corner. The layout is fixed: a title at the top, then per
//! sheet a `Sheet: <name>` line, one indented `<column>: <value>` line per
//! column, and a blank line.
//!
//! With pagination on, a line that would land below [`BOTTOM_MARGIN`] starts
//! a new page at [`TOP_Y`]. With it off every line stays on the first page
//! and long reports run past its bottom edge.

use crate::report::Report;

pub const PAGE_WIDTH: f32 = 612.0;
pub const PAGE_HEIGHT: f32 = 792.0;
pub const FONT_SIZE: f32 = 12.0;
pub const LINE_HEIGHT: f32 = 20.0;
pub const TOP_Y: f32 = 750.0;
pub const BOTTOM_MARGIN: f32 = 72.0;
/// Left edge of the title and sheet lines.
pub const SHEET_X: f32 = 100.0;
/// Left edge of the column lines.
pub const COLUMN_X: f32 = 120.0;

/// One line of text placed on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    /// 0-based page index.
    pub page: usize,
    pub x: f32,
    /// Baseline.
    pub y: f32,
    pub text: String,
}

/// A rectangle reserved below the text, e.g. for the chart image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Block {
    pub page: usize,
    pub x: f32,
    /// Bottom edge.
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Vertical write position across pages.
#[derive(Debug, Clone, Copy)]
struct PageCursor {
    page: usize,
    y: f32,
    paginate: bool,
}

impl PageCursor {
    fn new(paginate: bool) -> Self {
        Self {
            page: 0,
            y: TOP_Y,
            paginate,
        }
    }

    fn break_page(&mut self) {
        self.page += 1;
        self.y = TOP_Y;
    }

    /// Position for the next line, then advance one line.
    fn line(&mut self) -> (usize, f32) {
        if self.paginate && self.y < BOTTOM_MARGIN {
            self.break_page();
        }
        let at = (self.page, self.y);
        self.y -= LINE_HEIGHT;
        at
    }

    fn skip(&mut self) {
        self.y -= LINE_HEIGHT;
    }

    /// Reserve `height` points whose top edge sits at the cursor.
    fn block(&mut self, height: f32) -> (usize, f32) {
        if self.paginate && self.y - height < BOTTOM_MARGIN && self.y < TOP_Y {
            self.break_page();
        }
        let bottom = self.y - height;
        let at = (self.page, bottom);
        self.y = bottom - LINE_HEIGHT;
        at
    }
}

/// Report text placed on one or more pages.
#[derive(Debug, Clone)]
pub struct Layout {
    pub lines: Vec<TextLine>,
    pub blocks: Vec<Block>,
    cursor: PageCursor,
}

impl Layout {
    /// Number of pages the content occupies (at least one).
    pub fn page_count(&self) -> usize {
        let text_pages = self.lines.iter().map(|l| l.page);
        let block_pages = self.blocks.iter().map(|b| b.page);
        text_pages.chain(block_pages).max().map_or(1, |p| p + 1)
    }

    pub fn lines_on(&self, page: usize) -> impl Iterator<Item = &TextLine> {
        self.lines.iter().filter(move |l| l.page == page)
    }

    /// Reserve a `width` × `height` block at `x`, directly below the text.
    pub fn reserve_block(&mut self, x: f32, width: f32, height: f32) -> Block {
        let (page, y) = self.cursor.block(height);
        let block = Block {
            page,
            x,
            y,
            width,
            height,
        };
        self.blocks.push(block);
        block
    }

    fn push_line(&mut self, x: f32, text: String) {
        let (page, y) = self.cursor.line();
        self.lines.push(TextLine { page, x, y, text });
    }
}

/// Lay out `report` under `title`.
pub fn layout_report(title: &str, report: &Report, paginate: bool) -> Layout {
    let mut layout = Layout {
        lines: Vec::new(),
        blocks: Vec::new(),
        cursor: PageCursor::new(paginate),
    };

    layout.push_line(SHEET_X, title.to_string());
    for (sheet, values) in report.sheets() {
        layout.push_line(SHEET_X, format!("Sheet: {sheet}"));
        for (column, value) in values {
            layout.push_line(COLUMN_X, format!("{column}: {}", format_value(*value)));
        }
        layout.cursor.skip();
    }
    layout
}

/// Shortest round-trip text for an aggregate value (`6`, `2.5`).
pub fn format_value(v: f64) -> String {
    format!("{v}")
}
