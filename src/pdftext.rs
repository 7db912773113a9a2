use pdf::{content::Operation, file::File, object::Page, primitive::Primitive};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Result, SignalError};

/// Page geometry used to rebuild lines from positioned text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    /// Objects whose baselines differ by less than this share a line.
    pub line_tolerance: f32,
    /// Text below this baseline is footer (page numbers) and is dropped.
    pub footer_cutoff: f32,
}

impl PageLayout {
    pub fn new(line_tolerance: f32, footer_cutoff: f32) -> Self {
        Self {
            line_tolerance,
            footer_cutoff,
        }
    }
}

impl Default for PageLayout {
    fn default() -> Self {
        Self::new(2.0, 27.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct TextObject<'src> {
    pub x: f32,
    pub y: f32,
    pub text: Cow<'src, str>,
}

#[derive(Debug, Clone)]
struct TextObjectParser<'src> {
    ops: std::slice::Iter<'src, Operation>,
}

impl<'src> Iterator for TextObjectParser<'src> {
    type Item = TextObject<'src>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut last_coords = None;
        let mut last_text: Option<Cow<'src, str>> = None;

        while let Some(Operation { operator, operands }) = self.ops.next() {
            match (operator.as_str(), operands.as_slice()) {
                ("BT", _) => {
                    // begin text: forget anything half-seen
                    last_coords = None;
                    last_text = None;
                }
                ("Td", [Primitive::Number(x), Primitive::Number(y)]) => {
                    last_coords = Some((*x, *y));
                }
                ("Tm", [.., e, f]) if operands.len() == 6 => {
                    if let (Ok(x), Ok(y)) = (e.as_number(), f.as_number()) {
                        last_coords = Some((x, y));
                    }
                }
                ("Tj", [Primitive::String(text)]) => {
                    last_text = text.as_str().ok();
                }
                ("TJ" | "Tj", [Primitive::Array(parts)]) => {
                    let combined: String = parts
                        .iter()
                        .filter_map(|part| match part {
                            Primitive::String(text) => text.as_str().ok(),
                            _ => None,
                        })
                        .collect();
                    last_text = Some(Cow::from(combined));
                }
                ("ET", _) => {
                    if let (Some((x, y)), Some(text)) = (last_coords.take(), last_text.take()) {
                        return Some(TextObject { x, y, text });
                    }
                }
                _ => continue,
            }
        }

        None
    }
}

fn text_objects(operations: &[Operation]) -> impl Iterator<Item = TextObject<'_>> + '_ {
    TextObjectParser {
        ops: operations.iter(),
    }
}

fn lines_on_page(page: &Page, layout: &PageLayout) -> Vec<String> {
    match &page.contents {
        Some(content) => assemble_lines(text_objects(&content.operations).collect(), layout),
        None => Vec::new(),
    }
}

/// Group objects into lines by baseline, top to bottom, then read each line
/// left to right. Objects are separated by a space unless one side already
/// carries whitespace.
fn assemble_lines(objects: Vec<TextObject<'_>>, layout: &PageLayout) -> Vec<String> {
    let mut objects: Vec<TextObject> = objects
        .into_iter()
        .filter(|o| o.y > layout.footer_cutoff)
        .collect();
    objects.sort_by(|a, b| b.y.partial_cmp(&a.y).unwrap_or(Ordering::Equal));

    let mut rows: Vec<Vec<TextObject>> = Vec::new();
    for object in objects {
        match rows.last_mut() {
            Some(row) if (row[0].y - object.y).abs() < layout.line_tolerance => row.push(object),
            _ => rows.push(vec![object]),
        }
    }

    rows.into_iter()
        .filter_map(|mut row| {
            row.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));
            let mut line = String::new();
            for object in &row {
                let needs_space = !line.is_empty()
                    && !line.ends_with(char::is_whitespace)
                    && !object.text.starts_with(char::is_whitespace);
                if needs_space {
                    line.push(' ');
                }
                line.push_str(&object.text);
            }
            let line = line.trim_end().to_string();
            (!line.is_empty()).then_some(line)
        })
        .collect()
}

/// Extract the text of a PDF transcript, one output line per rendered line.
pub fn extract_text(path: impl AsRef<Path>, layout: &PageLayout) -> Result<String> {
    let path = path.as_ref();
    let pdf = File::<Vec<u8>>::open(path).map_err(|e| SignalError::Pdf(e.to_string()))?;

    let mut lines = Vec::new();
    for (i, page) in pdf.pages().enumerate() {
        let page =
            page.map_err(|e| SignalError::Pdf(format!("unable to read page {}: {}", i + 1, e)))?;
        let page_lines = lines_on_page(&page, layout);
        debug!(page = i + 1, lines = page_lines.len(), "extracted page");
        lines.extend(page_lines);
    }

    info!(path = %path.display(), lines = lines.len(), "extracted pdf transcript");
    Ok(lines.join("\n"))
}
