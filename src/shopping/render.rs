//! Shopping list documents.
//!
//! Layout is computed first as plain text pages, then drawn onto A4 PDF pages
//! (or joined into a text file). Every page carries the same header and a
//! footer with page numbering. Body lines are wrapped by their drawn width,
//! measured with the advance widths of the font that will draw them.

use std::borrow::Cow;
use std::io::Cursor;

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference};

use crate::config::ExportConfig;
use crate::shopping::aggregate::ShoppingList;

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const HEADER_Y_MM: f32 = 280.0;
const BODY_TOP_MM: f32 = 265.0;
const BODY_BOTTOM_MM: f32 = 25.0;
const FOOTER_Y_MM: f32 = 12.0;
const LINE_HEIGHT_MM: f32 = 7.0;
const HEADER_FONT_SIZE: f32 = 14.0;
const BODY_FONT_SIZE: f32 = 11.0;
const FOOTER_FONT_SIZE: f32 = 9.0;
const PT_TO_MM: f32 = 25.4 / 72.0;

/// Usable width between the left and right margins.
pub const BODY_WIDTH_MM: f32 = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;

/// Body lines that fit between header and footer.
pub const LINES_PER_PAGE: usize = ((BODY_TOP_MM - BODY_BOTTOM_MM) / LINE_HEIGHT_MM) as usize + 1;

/// DejaVu Sans, embedded unless another font is configured.
pub static DEFAULT_FONT: &[u8] = include_bytes!("../../fonts/DejaVuSans.ttf");

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("character {ch:?} in {text:?} has no glyph in the configured font")]
    UnsupportedCharacter { ch: char, text: String },
    #[error("failed to load font: {0}")]
    Font(String),
    #[error("failed to write PDF: {0}")]
    Pdf(String),
}

#[derive(Debug, Clone)]
pub enum FontSource {
    /// Helvetica; Latin-1 only.
    Builtin,
    TrueType(Cow<'static, [u8]>),
}

impl FontSource {
    pub fn embedded() -> Self {
        FontSource::TrueType(Cow::Borrowed(DEFAULT_FONT))
    }
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub title: String,
    pub footer: String,
    pub font: FontSource,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { title: "Shopping list".to_string(), footer: "Foodgram".to_string(), font: FontSource::embedded() }
    }
}

impl RenderOptions {
    /// Reads the configured font file, if any. Blocking.
    pub fn from_config(cfg: &ExportConfig) -> Result<Self, RenderError> {
        let font = match cfg.font_path.as_deref() {
            Some(path) => FontSource::TrueType(Cow::Owned(
                std::fs::read(path).map_err(|e| RenderError::Font(format!("{}: {}", path, e)))?,
            )),
            None if cfg.builtin_font => FontSource::Builtin,
            None => FontSource::embedded(),
        };
        Ok(Self { title: cfg.title.clone(), footer: cfg.footer.clone(), font })
    }
}

#[derive(Debug)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

/// Text of one page, ready to be drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLayout {
    pub header: String,
    pub body: Vec<String>,
    pub footer: String,
}

// Helvetica advance widths (1/1000 em) for U+0020..=U+007E
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // space to /
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0 to ?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @ to O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P to _
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // ` to o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // p to ~
];

// Helvetica advance widths for U+00A0..=U+00FF
const HELVETICA_LATIN1: [u16; 96] = [
    278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556, 584, 333, 737, 333,
    400, 584, 333, 333, 333, 556, 537, 278, 333, 333, 365, 556, 834, 834, 834, 611,
    667, 667, 667, 667, 667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611,
    556, 556, 556, 556, 556, 556, 889, 500, 556, 556, 556, 556, 278, 278, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500,
];

/// Advance widths of the font a document is drawn with.
enum FontMetrics<'a> {
    Helvetica,
    TrueType { face: ttf_parser::Face<'a>, units_per_em: f32 },
}

impl<'a> FontMetrics<'a> {
    fn new(source: &'a FontSource) -> Result<Self, RenderError> {
        match source {
            FontSource::Builtin => Ok(FontMetrics::Helvetica),
            FontSource::TrueType(bytes) => {
                let face = ttf_parser::Face::parse(bytes.as_ref(), 0).map_err(|e| RenderError::Font(format!("{:?}", e)))?;
                let units_per_em = f32::from(face.units_per_em().max(1));
                Ok(FontMetrics::TrueType { face, units_per_em })
            }
        }
    }

    /// Advance of `ch` in em, `None` when the font cannot draw it.
    fn advance_em(&self, ch: char) -> Option<f32> {
        match self {
            FontMetrics::Helvetica => {
                let width = match ch as u32 {
                    c @ 0x20..=0x7E => HELVETICA_ASCII[(c - 0x20) as usize],
                    c @ 0xA0..=0xFF => HELVETICA_LATIN1[(c - 0xA0) as usize],
                    _ => return None,
                };
                Some(f32::from(width) / 1000.0)
            }
            FontMetrics::TrueType { face, units_per_em } => {
                let glyph = face.glyph_index(ch)?;
                face.glyph_hor_advance(glyph).map(|w| f32::from(w) / units_per_em)
            }
        }
    }

    fn char_width_mm(&self, ch: char, size_pt: f32) -> f32 {
        self.advance_em(ch).unwrap_or(0.0) * size_pt * PT_TO_MM
    }

    /// Drawn width of `text`; fails on the first character without a glyph.
    fn width_mm(&self, text: &str, size_pt: f32) -> Result<f32, RenderError> {
        let mut em = 0.0;
        for ch in text.chars() {
            em += self
                .advance_em(ch)
                .ok_or_else(|| RenderError::UnsupportedCharacter { ch, text: text.to_string() })?;
        }
        Ok(em * size_pt * PT_TO_MM)
    }
}

/// Logical body lines, one per ingredient, before wrapping.
pub fn summary_lines(list: &ShoppingList) -> Vec<String> {
    let mut lines = Vec::new();
    if !list.recipes.is_empty() {
        lines.push(format!("Recipes: {}.", list.recipes.join(", ")));
    }
    if !list.ingredients.is_empty() {
        lines.push("You will need:".to_string());
        for item in &list.ingredients {
            let text = format!("{} - {} {}", item.name, item.amount, item.measurement_unit);
            lines.push(text.trim_end().to_string());
        }
    }
    lines
}

/// Splits body lines into pages. Always yields at least one (possibly empty) page.
pub fn paginate(lines: Vec<String>, per_page: usize) -> Vec<Vec<String>> {
    let per_page = per_page.max(1);
    if lines.is_empty() {
        return vec![Vec::new()];
    }
    lines.chunks(per_page).map(|c| c.to_vec()).collect()
}

/// Word-wraps `text` so no line is wider than `max_mm` at `size_pt`. Words
/// wider than a line are split between characters.
fn wrap(text: &str, max_mm: f32, size_pt: f32, metrics: &FontMetrics<'_>) -> Result<Vec<String>, RenderError> {
    metrics.width_mm(text, size_pt)?;
    let space = metrics.char_width_mm(' ', size_pt);

    let mut out = Vec::new();
    let mut current = String::new();
    let mut current_mm = 0.0f32;

    for word in text.split_whitespace() {
        let word_mm = metrics.width_mm(word, size_pt)?;
        if !current.is_empty() && current_mm + space + word_mm <= max_mm {
            current.push(' ');
            current.push_str(word);
            current_mm += space + word_mm;
            continue;
        }
        if !current.is_empty() {
            out.push(std::mem::take(&mut current));
            current_mm = 0.0;
        }
        for ch in word.chars() {
            let ch_mm = metrics.char_width_mm(ch, size_pt);
            // A line always takes at least one character
            if !current.is_empty() && current_mm + ch_mm > max_mm {
                out.push(std::mem::take(&mut current));
                current_mm = 0.0;
            }
            current.push(ch);
            current_mm += ch_mm;
        }
    }
    if !current.is_empty() || out.is_empty() {
        out.push(current);
    }
    Ok(out)
}

fn footer_text(footer: &str, page: usize, total: usize) -> String {
    format!("{}    Page {} of {}", footer, page, total)
}

/// Wraps and paginates the list for drawing with `opts.font`.
pub fn layout(list: &ShoppingList, opts: &RenderOptions) -> Result<Vec<PageLayout>, RenderError> {
    let metrics = FontMetrics::new(&opts.font)?;
    metrics.width_mm(&opts.title, HEADER_FONT_SIZE)?;

    let mut lines = Vec::new();
    for line in summary_lines(list) {
        lines.extend(wrap(&line, BODY_WIDTH_MM, BODY_FONT_SIZE, &metrics)?);
    }
    let pages = paginate(lines, LINES_PER_PAGE);
    let total = pages.len();
    metrics.width_mm(&footer_text(&opts.footer, total, total), FOOTER_FONT_SIZE)?;

    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(i, body)| PageLayout {
            header: opts.title.clone(),
            body,
            footer: footer_text(&opts.footer, i + 1, total),
        })
        .collect())
}

fn load_font(doc: &PdfDocumentReference, source: &FontSource) -> Result<IndirectFontRef, RenderError> {
    match source {
        FontSource::Builtin => {
            doc.add_builtin_font(BuiltinFont::Helvetica).map_err(|e| RenderError::Font(format!("{:?}", e)))
        }
        FontSource::TrueType(bytes) => doc
            .add_external_font(Cursor::new(bytes.as_ref()))
            .map_err(|e| RenderError::Font(format!("{:?}", e))),
    }
}

/// Renders the shopping list as a paginated PDF.
pub fn render_pdf(list: &ShoppingList, opts: &RenderOptions) -> Result<RenderedDocument, RenderError> {
    let pages = layout(list, opts)?;

    let (doc, first_page, first_layer) =
        PdfDocument::new(opts.title.as_str(), Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
    let font = load_font(&doc, &opts.font)?;

    for (i, page_layout) in pages.iter().enumerate() {
        let (page, layer) = if i == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), format!("Layer {}", i + 1))
        };
        let layer = doc.get_page(page).get_layer(layer);

        layer.use_text(page_layout.header.as_str(), HEADER_FONT_SIZE, Mm(MARGIN_MM), Mm(HEADER_Y_MM), &font);

        let mut y = BODY_TOP_MM;
        for line in &page_layout.body {
            layer.use_text(line.as_str(), BODY_FONT_SIZE, Mm(MARGIN_MM), Mm(y), &font);
            y -= LINE_HEIGHT_MM;
        }

        layer.use_text(page_layout.footer.as_str(), FOOTER_FONT_SIZE, Mm(MARGIN_MM), Mm(FOOTER_Y_MM), &font);
    }

    let bytes = doc.save_to_bytes().map_err(|e| RenderError::Pdf(format!("{:?}", e)))?;
    Ok(RenderedDocument { bytes, page_count: pages.len() })
}

/// Plain-text rendering: one page with the same header, body and footer.
/// Lines are not wrapped.
pub fn render_text(list: &ShoppingList, opts: &RenderOptions) -> String {
    let mut out = String::new();
    out.push_str(&opts.title);
    out.push_str("\n\n");
    for line in summary_lines(list) {
        out.push_str(&line);
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&footer_text(&opts.footer, 1, 1));
    out.push('\n');
    out
}
