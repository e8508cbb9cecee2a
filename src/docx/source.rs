//! Paragraphs, runs, notes and the metadata table of a docx package.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use log::debug;

use crate::docx::package::DocxPackage;
use crate::model::{
    FontFlags, MetadataRow, Note, NoteKind, NoteRef, NoteSpan, Paragraph, Run, SourceDocument,
};
use crate::xml::{find_attr, parse_events, XmlEvent};

const DOCUMENT_PART: &str = "word/document.xml";
const STYLES_PART: &str = "word/styles.xml";
const FOOTNOTES_PART: &str = "word/footnotes.xml";
const ENDNOTES_PART: &str = "word/endnotes.xml";

const DEFAULT_PARAGRAPH_STYLE: &str = "Normal";
const STRONG_STYLE_ID: &str = "X-EmphasisStrong";

pub fn read_document(path: &Path) -> anyhow::Result<SourceDocument> {
    let package = DocxPackage::read(path)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    read_package(&name, &package).with_context(|| format!("parse docx: {}", path.display()))
}

pub fn read_package(name: &str, package: &DocxPackage) -> anyhow::Result<SourceDocument> {
    let style_names = match package.part(STYLES_PART) {
        Some(bytes) => parse_style_names(&parse_events(STYLES_PART, bytes)?),
        None => HashMap::new(),
    };
    let body = package
        .part(DOCUMENT_PART)
        .with_context(|| format!("missing {DOCUMENT_PART}"))?;
    let body = parse_body(&parse_events(DOCUMENT_PART, body)?, &style_names);

    let mut doc = SourceDocument::new(name);
    for (part, kind) in [
        (FOOTNOTES_PART, NoteKind::Footnote),
        (ENDNOTES_PART, NoteKind::Endnote),
    ] {
        if let Some(bytes) = package.part(part) {
            for note in parse_notes(&parse_events(part, bytes)?, kind) {
                doc.notes.insert(note);
            }
        }
    }
    for (note_ref, hint) in &body.hints {
        if let Some(note) = doc.notes.get_mut(note_ref.kind, &note_ref.id) {
            note.set_hint(hint);
        }
    }

    doc.paragraphs = body.paragraphs;
    doc.metadata = body.metadata;
    doc.merge_runs();
    debug!(
        "{name}: {} paragraphs, {} notes, {} metadata rows",
        doc.paragraphs.len(),
        doc.notes.len(),
        doc.metadata.len()
    );
    Ok(doc)
}

/// Style id -> display name from `styles.xml`.
pub fn parse_style_names(events: &[XmlEvent]) -> HashMap<String, String> {
    let mut names = HashMap::new();
    let mut current_id: Option<String> = None;
    for ev in events {
        match ev {
            XmlEvent::Start { name, attrs } if name == "w:style" => {
                current_id = find_attr(attrs, "w:styleId").map(str::to_string);
            }
            XmlEvent::End { name } if name == "w:style" => current_id = None,
            XmlEvent::Start { name, attrs } | XmlEvent::Empty { name, attrs } if name == "w:name" => {
                if let (Some(id), Some(val)) = (&current_id, find_attr(attrs, "w:val")) {
                    names.insert(id.clone(), val.to_string());
                }
            }
            _ => {}
        }
    }
    names
}

/// On/off run property: absent `w:val` means on.
fn toggle_on(attrs: &[(String, String)]) -> bool {
    !matches!(
        find_attr(attrs, "w:val").map(str::to_ascii_lowercase).as_deref(),
        Some("0" | "false" | "off" | "none")
    )
}

fn control_text(name: &str, attrs: &[(String, String)]) -> Option<char> {
    match name {
        "w:tab" | "w:ptab" => Some('\t'),
        "w:cr" => Some('\n'),
        "w:br" => (find_attr(attrs, "w:type").unwrap_or("textWrapping") == "textWrapping")
            .then_some('\n'),
        "w:noBreakHyphen" => Some('-'),
        _ => None,
    }
}

#[derive(Default)]
struct RunCapture {
    style_id: Option<String>,
    font: FontFlags,
    lang: Option<String>,
    has_props: bool,
    text: String,
    in_props: bool,
    in_text: bool,
}

impl RunCapture {
    fn property(&mut self, name: &str, attrs: &[(String, String)]) {
        self.has_props = true;
        match name {
            "w:rStyle" => self.style_id = find_attr(attrs, "w:val").map(str::to_string),
            "w:b" => self.font.bold = toggle_on(attrs),
            "w:i" => self.font.italic = toggle_on(attrs),
            "w:u" => self.font.underline = toggle_on(attrs),
            "w:lang" => {
                if find_attr(attrs, "w:bidi") == Some("bo-CN") {
                    self.lang = Some("tib".to_string());
                }
            }
            _ => {}
        }
    }
}

#[derive(Default)]
struct ParaCapture {
    style_id: Option<String>,
    runs: Vec<Run>,
    run: Option<RunCapture>,
    in_props: bool,
}

impl ParaCapture {
    fn text(&self) -> String {
        let mut text: String = self.runs.iter().map(|r| r.text.as_str()).collect();
        if let Some(run) = &self.run {
            text.push_str(&run.text);
        }
        text
    }

    fn flush_text(&mut self, style_names: &HashMap<String, String>) {
        let Some(run) = self.run.as_mut() else {
            return;
        };
        if run.text.is_empty() {
            return;
        }
        let style = resolve_style(style_names, run.style_id.as_deref());
        self.runs.push(Run {
            text: std::mem::take(&mut run.text),
            style,
            font: run.font,
            note: None,
        });
    }
}

fn resolve_style(style_names: &HashMap<String, String>, id: Option<&str>) -> String {
    match id {
        Some(id) => style_names.get(id).cloned().unwrap_or_else(|| id.to_string()),
        None => String::new(),
    }
}

#[derive(Default)]
pub struct BodyContent {
    pub paragraphs: Vec<Paragraph>,
    pub metadata: Vec<MetadataRow>,
    /// Note references with the paragraph text preceding them.
    pub hints: Vec<(NoteRef, String)>,
}

/// Walk `document.xml`. Body-level paragraphs are returned; the first table becomes the
/// metadata.
pub fn parse_body(events: &[XmlEvent], style_names: &HashMap<String, String>) -> BodyContent {
    let mut out = BodyContent::default();
    let mut para: Option<ParaCapture> = None;
    let mut p_depth = 0usize;
    let mut table_depth = 0usize;
    let mut tables_seen = 0usize;
    let mut row: Option<MetadataRow> = None;
    let mut cell: Option<Vec<String>> = None;

    let capturing_table = |tables_seen: usize, table_depth: usize| tables_seen == 1 && table_depth == 1;

    for ev in events {
        match ev {
            XmlEvent::Start { name, attrs } => match name.as_str() {
                "w:tbl" => {
                    table_depth += 1;
                    if table_depth == 1 {
                        tables_seen += 1;
                    }
                }
                "w:tr" if capturing_table(tables_seen, table_depth) => {
                    row = Some(MetadataRow::default());
                }
                "w:tc" if capturing_table(tables_seen, table_depth) => cell = Some(Vec::new()),
                "w:p" => {
                    p_depth += 1;
                    if p_depth == 1 {
                        para = Some(ParaCapture::default());
                    }
                }
                _ => on_element(&mut para, &mut out.hints, name, attrs, true, style_names),
            },
            XmlEvent::Empty { name, attrs } => match name.as_str() {
                "w:p" if p_depth == 0 => {
                    if table_depth == 0 {
                        out.paragraphs
                            .push(Paragraph::new(DEFAULT_PARAGRAPH_STYLE, Vec::new()));
                    } else if let Some(cell) = cell.as_mut() {
                        cell.push(String::new());
                    }
                }
                _ => on_element(&mut para, &mut out.hints, name, attrs, false, style_names),
            },
            XmlEvent::End { name } => match name.as_str() {
                "w:tbl" => table_depth = table_depth.saturating_sub(1),
                "w:tr" => {
                    if let Some(r) = row.take() {
                        out.metadata.push(r);
                    }
                }
                "w:tc" => {
                    if let (Some(r), Some(c)) = (row.as_mut(), cell.take()) {
                        r.cells.push(c);
                    }
                }
                "w:p" => {
                    p_depth = p_depth.saturating_sub(1);
                    if p_depth > 0 {
                        continue;
                    }
                    let Some(mut cap) = para.take() else {
                        continue;
                    };
                    cap.flush_text(style_names);
                    if table_depth == 0 {
                        let style = cap
                            .style_id
                            .as_deref()
                            .map(|id| resolve_style(style_names, Some(id)))
                            .unwrap_or_else(|| DEFAULT_PARAGRAPH_STYLE.to_string());
                        out.paragraphs.push(Paragraph::new(&style, cap.runs));
                    } else if let Some(c) = cell.as_mut() {
                        c.push(cap.text());
                    }
                }
                "w:pPr" => {
                    if let Some(p) = para.as_mut() {
                        p.in_props = false;
                    }
                }
                "w:r" => {
                    if let Some(p) = para.as_mut() {
                        p.flush_text(style_names);
                        p.run = None;
                    }
                }
                "w:rPr" | "w:t" => {
                    if let Some(run) = para.as_mut().and_then(|p| p.run.as_mut()) {
                        if name == "w:rPr" {
                            run.in_props = false;
                        } else {
                            run.in_text = false;
                        }
                    }
                }
                _ => {}
            },
            XmlEvent::Text { text } => {
                if let Some(run) = para.as_mut().and_then(|p| p.run.as_mut()) {
                    if run.in_text {
                        run.text.push_str(text);
                    }
                }
            }
            XmlEvent::Comment { .. } => {}
        }
    }
    out
}

fn on_element(
    para: &mut Option<ParaCapture>,
    hints: &mut Vec<(NoteRef, String)>,
    name: &str,
    attrs: &[(String, String)],
    is_start: bool,
    style_names: &HashMap<String, String>,
) {
    let Some(p) = para.as_mut() else {
        return;
    };
    if name == "w:pPr" {
        p.in_props = is_start;
        return;
    }
    if p.in_props && p.run.is_none() {
        if name == "w:pStyle" {
            p.style_id = find_attr(attrs, "w:val").map(str::to_string);
        }
        return;
    }
    if name == "w:r" {
        p.run = Some(RunCapture::default());
        return;
    }
    let Some(run) = p.run.as_mut() else {
        return;
    };
    match name {
        "w:rPr" => run.in_props = is_start,
        _ if run.in_props => run.property(name, attrs),
        "w:t" => run.in_text = is_start,
        "w:footnoteReference" | "w:endnoteReference" => {
            let kind = if name == "w:footnoteReference" {
                NoteKind::Footnote
            } else {
                NoteKind::Endnote
            };
            let Some(id) = find_attr(attrs, "w:id") else {
                return;
            };
            let note = NoteRef {
                kind,
                id: id.to_string(),
            };
            let style_id = run.style_id.clone();
            p.flush_text(style_names);
            let hint = p.text();
            p.runs.push(Run {
                text: String::new(),
                style: resolve_style(style_names, style_id.as_deref()),
                font: FontFlags::default(),
                note: Some(note.clone()),
            });
            hints.push((note, hint));
        }
        _ => {
            if let Some(c) = control_text(name, attrs) {
                run.text.push(c);
            }
        }
    }
}

/// Language code of a note span from the script of its first character.
pub fn lang_by_char(c: char) -> Option<&'static str> {
    match c as u32 {
        0x0F00..=0x0FFF => Some("tib"),
        0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF => Some("chi"),
        0x0900..=0x097F => Some("san"),
        _ => None,
    }
}

fn is_skipped_note_type(attrs: &[(String, String)]) -> bool {
    matches!(
        find_attr(attrs, "w:type"),
        Some("separator" | "continuationSeparator" | "continuationNotice")
    )
}

fn push_span(spans: &mut Vec<NoteSpan>, span: NoteSpan) {
    match spans.last_mut() {
        Some(last) if last.rend == span.rend && last.lang == span.lang => {
            last.text.push_str(&span.text)
        }
        _ => spans.push(span),
    }
}

/// Notes of `footnotes.xml` / `endnotes.xml`, with their styled spans.
pub fn parse_notes(events: &[XmlEvent], kind: NoteKind) -> Vec<Note> {
    let tag = match kind {
        NoteKind::Footnote => "w:footnote",
        NoteKind::Endnote => "w:endnote",
    };
    let mut notes = Vec::new();
    let mut current: Option<(String, String, Vec<NoteSpan>)> = None;
    let mut run: Option<RunCapture> = None;

    for ev in events {
        match ev {
            XmlEvent::Start { name, attrs } if name == tag => {
                current = match find_attr(attrs, "w:id") {
                    Some(id) if !is_skipped_note_type(attrs) => {
                        Some((id.to_string(), String::new(), Vec::new()))
                    }
                    _ => None,
                };
            }
            XmlEvent::End { name } if name == tag => {
                if let Some((id, text, spans)) = current.take() {
                    let mut note = Note::new(kind, &id, &text);
                    note.spans = spans;
                    notes.push(note);
                }
            }
            XmlEvent::Start { name, attrs } | XmlEvent::Empty { name, attrs } => {
                let is_start = matches!(ev, XmlEvent::Start { .. });
                match name.as_str() {
                    "w:r" if is_start => run = Some(RunCapture::default()),
                    "w:rPr" => {
                        if let Some(r) = run.as_mut() {
                            r.in_props = is_start;
                            r.has_props = true;
                        }
                    }
                    "w:t" => {
                        if let Some(r) = run.as_mut() {
                            r.in_text = is_start;
                        }
                    }
                    _ => {
                        if let Some(r) = run.as_mut().filter(|r| r.in_props) {
                            r.property(name, attrs);
                        }
                    }
                }
            }
            XmlEvent::End { name } => match name.as_str() {
                "w:r" => run = None,
                "w:rPr" | "w:t" => {
                    if let Some(r) = run.as_mut() {
                        if name == "w:rPr" {
                            r.in_props = false;
                        } else {
                            r.in_text = false;
                        }
                    }
                }
                _ => {}
            },
            XmlEvent::Text { text } => {
                let (Some((_, plain, spans)), Some(r)) = (current.as_mut(), run.as_ref()) else {
                    continue;
                };
                if !r.in_text || text.is_empty() {
                    continue;
                }
                plain.push_str(text);
                push_span(spans, note_span(r, text));
            }
            XmlEvent::Comment { .. } => {}
        }
    }
    notes
}

fn note_span(run: &RunCapture, text: &str) -> NoteSpan {
    if !run.has_props {
        return NoteSpan {
            text: text.to_string(),
            ..Default::default()
        };
    }
    let mut rend = Vec::new();
    if run.style_id.as_deref() == Some(STRONG_STYLE_ID) {
        rend.push("strong".to_string());
    }
    if run.font.italic {
        rend.push("weak".to_string());
    }
    if run.font.underline {
        rend.push("underline".to_string());
    }
    let lang = run.lang.clone().or_else(|| {
        text.chars()
            .next()
            .and_then(lang_by_char)
            .map(str::to_string)
    });
    NoteSpan {
        text: text.to_string(),
        rend,
        lang,
    }
}
