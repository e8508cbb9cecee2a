use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::convert::apparatus::is_annotation_text;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontFlags {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
}

impl FontFlags {
    /// `rend` value of the wrapper element carrying these flags, if any.
    pub fn rend(&self) -> Option<String> {
        let mut parts: Vec<&str> = Vec::new();
        if self.bold {
            parts.push("strong");
        }
        if self.italic {
            parts.push("weak");
        }
        if self.underline {
            parts.push("underline");
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    Footnote,
    Endnote,
}

impl NoteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Footnote => "footnote",
            Self::Endnote => "endnote",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRef {
    pub kind: NoteKind,
    pub id: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Run {
    pub text: String,
    /// Character style name; empty for the default paragraph font.
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub font: FontFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<NoteRef>,
}

impl Run {
    pub fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Default::default()
        }
    }

    pub fn styled(text: &str, style: &str) -> Self {
        Self {
            text: text.to_string(),
            style: style.to_string(),
            ..Default::default()
        }
    }

    pub fn footnote_ref(id: &str) -> Self {
        Self {
            style: "footnote reference".to_string(),
            note: Some(NoteRef {
                kind: NoteKind::Footnote,
                id: id.to_string(),
            }),
            ..Default::default()
        }
    }

    fn mergeable_with(&self, other: &Run) -> bool {
        self.note.is_none() && other.note.is_none() && self.style == other.style && self.font == other.font
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Paragraph {
    pub style: String,
    pub runs: Vec<Run>,
}

impl Paragraph {
    pub fn new(style: &str, runs: Vec<Run>) -> Self {
        Self {
            style: style.to_string(),
            runs,
        }
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    /// Merge consecutive runs that share style and font flags. Note references never merge.
    pub fn merge_runs(&mut self) {
        let mut merged: Vec<Run> = Vec::with_capacity(self.runs.len());
        for run in self.runs.drain(..) {
            match merged.last_mut() {
                Some(last) if last.mergeable_with(&run) => last.text.push_str(&run.text),
                _ => merged.push(run),
            }
        }
        self.runs = merged;
    }
}

/// A styled piece of a note's text, resolved from the host document's run properties.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NoteSpan {
    pub text: String,
    #[serde(default)]
    pub rend: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Note {
    pub kind: NoteKind,
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub spans: Vec<NoteSpan>,
    /// Text of the runs preceding the reference in the body, when known.
    #[serde(default)]
    pub preceding_hint: String,
    #[serde(default)]
    pub annotation: bool,
}

impl Note {
    pub fn new(kind: NoteKind, id: &str, text: &str) -> Self {
        let mut note = Self {
            kind,
            id: id.to_string(),
            text: text.to_string(),
            spans: Vec::new(),
            preceding_hint: String::new(),
            annotation: false,
        };
        note.classify();
        note
    }

    pub fn with_hint(mut self, hint: &str) -> Self {
        self.set_hint(hint);
        self
    }

    pub fn set_hint(&mut self, hint: &str) {
        self.preceding_hint = hint.to_string();
        self.classify();
    }

    pub fn classify(&mut self) {
        self.annotation =
            self.preceding_hint.trim_end().ends_with('}') || is_annotation_text(&self.text);
    }
}

struct NoteEntry {
    note: Note,
    consumed: bool,
}

/// Footnotes and endnotes keyed by kind and id.
///
/// Lookups never depend on storage order; a consumed flag is kept per entry so a note
/// referenced twice can be reported.
#[derive(Default)]
pub struct NoteTable {
    entries: HashMap<(NoteKind, String), NoteEntry>,
}

impl NoteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, note: Note) {
        let key = (note.kind, note.id.clone());
        self.entries.insert(
            key,
            NoteEntry {
                note,
                consumed: false,
            },
        );
    }

    pub fn get(&self, kind: NoteKind, id: &str) -> Option<&Note> {
        self.entries.get(&(kind, id.to_string())).map(|e| &e.note)
    }

    pub fn get_mut(&mut self, kind: NoteKind, id: &str) -> Option<&mut Note> {
        self.entries.get_mut(&(kind, id.to_string())).map(|e| &mut e.note)
    }

    /// Mark a note consumed and return it with its previous consumed state.
    pub fn consume(&mut self, kind: NoteKind, id: &str) -> Option<(&Note, bool)> {
        let entry = self.entries.get_mut(&(kind, id.to_string()))?;
        let was_consumed = entry.consumed;
        entry.consumed = true;
        Some((&entry.note, was_consumed))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn unconsumed(&self) -> Vec<&Note> {
        let mut out: Vec<&Note> = self
            .entries
            .values()
            .filter(|e| !e.consumed)
            .map(|e| &e.note)
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.entries.values().map(|e| &e.note)
    }
}

/// One row of the metadata table: the texts of its cells, each cell as its paragraphs.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MetadataRow {
    pub cells: Vec<Vec<String>>,
}

impl MetadataRow {
    pub fn cell_text(&self, index: usize) -> Option<String> {
        self.cells.get(index).map(|ps| ps.join("\n").trim().to_string())
    }
}

/// Everything the converter needs from a source document.
#[derive(Default)]
pub struct SourceDocument {
    pub name: String,
    pub paragraphs: Vec<Paragraph>,
    pub notes: NoteTable,
    pub metadata: Vec<MetadataRow>,
}

impl SourceDocument {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn merge_runs(&mut self) {
        for p in &mut self.paragraphs {
            p.merge_runs();
        }
    }
}
