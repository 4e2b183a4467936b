//! PDF rendering of an [`AnalysisReport`].
//!
//! A4 pages, built-in Helvetica fonts, greedy word wrap. Text outside
//! ASCII is transliterated where there is an obvious equivalent and
//! replaced with `?` otherwise, since the standard fonts carry no Unicode
//! mapping.

use anyhow::Result;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::analyze::AnalysisReport;

pub const REPORT_TITLE: &str = "Non-Conformance Analysis Report";
pub const REPORT_FOOTER: &str = "Prepared by Smart NC Analyzer";

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 42;
const KEY_COLUMN: i64 = 113;
const BODY_SIZE: i64 = 10;
const HEADING_SIZE: i64 = 12;
const TITLE_SIZE: i64 = 16;
const LINE_HEIGHT: i64 = 17;
/// Characters per body line at 10pt Helvetica across the text column.
const BODY_WRAP: usize = 100;
const VALUE_WRAP: usize = 78;

#[derive(Clone, Copy)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

/// Accumulates text operations and breaks pages as the cursor runs out.
struct Layout {
    pages: Vec<Vec<Operation>>,
    y: i64,
}

impl Layout {
    fn new() -> Self {
        Self {
            pages: vec![Vec::new()],
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn ensure_room(&mut self, height: i64) {
        if self.y - height < MARGIN {
            self.pages.push(Vec::new());
            self.y = PAGE_HEIGHT - MARGIN;
        }
    }

    fn text(&mut self, font: Font, size: i64, x: i64, text: &str) {
        let ops = self.pages.last_mut();
        if let Some(ops) = ops {
            ops.push(Operation::new("BT", vec![]));
            ops.push(Operation::new(
                "Tf",
                vec![font.resource().into(), Object::Integer(size)],
            ));
            ops.push(Operation::new(
                "Td",
                vec![Object::Integer(x), Object::Integer(self.y)],
            ));
            ops.push(Operation::new("Tj", vec![Object::string_literal(text)]));
            ops.push(Operation::new("ET", vec![]));
        }
    }

    fn line(&mut self, font: Font, size: i64, x: i64, text: &str) {
        self.ensure_room(LINE_HEIGHT);
        self.y -= LINE_HEIGHT;
        self.text(font, size, x, text);
    }

    fn gap(&mut self, height: i64) {
        self.y -= height;
    }

    fn title(&mut self, text: &str) {
        // Centered using Helvetica-Bold's average glyph width.
        let width = text.len() as i64 * TITLE_SIZE * 55 / 100;
        let x = ((PAGE_WIDTH - width) / 2).max(MARGIN);
        self.line(Font::Bold, TITLE_SIZE, x, text);
    }

    fn key_value(&mut self, key: &str, value: &str) {
        let lines = wrap(value, VALUE_WRAP);
        self.ensure_room(LINE_HEIGHT);
        self.y -= LINE_HEIGHT;
        self.text(Font::Bold, BODY_SIZE, MARGIN, &format!("{}:", key));
        let mut first = true;
        for l in lines {
            if first {
                self.text(Font::Regular, BODY_SIZE, MARGIN + KEY_COLUMN, &l);
                first = false;
            } else {
                self.line(Font::Regular, BODY_SIZE, MARGIN + KEY_COLUMN, &l);
            }
        }
    }

    fn heading(&mut self, text: &str) {
        self.line(Font::Bold, HEADING_SIZE, MARGIN, text);
    }

    fn paragraph(&mut self, text: &str) {
        for l in wrap(text, BODY_WRAP) {
            self.line(Font::Regular, BODY_SIZE, MARGIN, &l);
        }
    }
}

/// Render the report as PDF bytes.
pub fn render_pdf(report: &AnalysisReport) -> Result<Vec<u8>> {
    let ctx = &report.context;
    let notes = ctx.notes().trim();
    let evidence = report.evidence_text.trim_end();

    let mut layout = Layout::new();
    layout.title(REPORT_TITLE);
    layout.gap(6);

    layout.key_value("Timestamp", &report.timestamp);
    layout.key_value("Factory", &ctx.factory);
    layout.key_value("Shift", &ctx.shift.to_string());
    layout.key_value("Machine", &ctx.machine);
    layout.key_value("Issue", &ctx.issue);
    layout.key_value("Additional Notes", if notes.is_empty() { "None" } else { notes });
    layout.gap(6);

    layout.heading("Historical Evidence:");
    layout.paragraph(if evidence.trim().is_empty() {
        "None found"
    } else {
        evidence
    });
    layout.gap(3);

    layout.heading("Expanded Root Cause:");
    layout.paragraph(&report.narrative.expanded_root_cause);
    layout.gap(3);

    layout.heading("Suggested CAPA:");
    layout.paragraph(&report.narrative.capa);
    layout.gap(12);

    layout.line(Font::Regular, BODY_SIZE, MARGIN, REPORT_FOOTER);

    let bytes = assemble(layout.pages)?;
    tracing::info!(report = %report.id, bytes = bytes.len(), "rendered PDF report");
    Ok(bytes)
}

fn assemble(pages: Vec<Vec<Operation>>) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let media_box: Vec<Object> = vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(PAGE_WIDTH),
        Object::Integer(PAGE_HEIGHT),
    ];
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => media_box,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

/// `NC_Report_YYYYMMDD_HHMMSS.pdf` from the report's generation time.
pub fn default_file_name(report: &AnalysisReport) -> String {
    format!("NC_Report_{}.pdf", report.generated_at.format("%Y%m%d_%H%M%S"))
}

fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\r' => {}
            '\t' => out.push_str("    "),
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\u{2013}' | '\u{2014}' => out.push('-'),
            '\u{2022}' => out.push('*'),
            '\u{2026}' => out.push_str("..."),
            '\u{2192}' => out.push_str("->"),
            c if c.is_ascii() => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

/// Greedy word wrap; words longer than `width` are split. Blank input
/// lines are kept as empty lines.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let text = sanitize(text);
    let mut lines = Vec::new();

    for raw in text.split('\n') {
        let mut current = String::new();
        for word in raw.split(' ').filter(|w| !w.is_empty()) {
            let mut word = word.to_string();
            while word.len() > width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let rest = word.split_off(width);
                lines.push(word);
                word = rest;
            }
            if current.is_empty() {
                current = word;
            } else if current.len() + 1 + word.len() <= width {
                current.push(' ');
                current.push_str(&word);
            } else {
                lines.push(std::mem::replace(&mut current, word));
            }
        }
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_respects_width() {
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let lines = wrap(text, 12);
        assert!(lines.iter().all(|l| l.len() <= 12));
        assert_eq!(lines.join(" "), text);
    }

    #[test]
    fn test_wrap_splits_long_words_and_keeps_blank_lines() {
        let lines = wrap("abcdefghij\n\nxy", 4);
        assert_eq!(lines, vec!["abcd", "efgh", "ij", "", "xy"]);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("\u{201C}die\u{201D} \u{2013} ok\r"), "\"die\" - ok");
        assert_eq!(sanitize("\u{00e9}"), "?");
    }
}
