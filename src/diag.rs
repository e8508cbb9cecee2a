use std::fmt;

use log::warn;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    SkippedHeadingLevel,
    InvalidHeadingLevel,
    SkippedListLevel,
    ListOutsideList,
    ContentBeforeDivision,
    MissingDivisionTag,
    UnknownSectionStyle,
    DefaultedParagraphStyle,
    UnknownCharacterStyle,
    UnmatchedMilestone,
    MalformedLemma,
    MissingNote,
    NoteReused,
    UnterminatedSpan,
    SpanWithoutSigla,
    UnparsedSiglum,
}

#[derive(Clone, Debug, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub paragraph: Option<usize>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.paragraph {
            Some(p) => write!(f, "[para {}] {:?}: {}", p + 1, self.kind, self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

/// Per-document record of recoverable conditions. Every entry is also logged.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    paragraph: Option<usize>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_paragraph(&mut self, index: usize) {
        self.paragraph = Some(index);
    }

    pub fn report(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        let diag = Diagnostic {
            kind,
            paragraph: self.paragraph,
            message: message.into(),
        };
        warn!("{diag}");
        self.entries.push(diag);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_kind_and_tags_paragraph() {
        let mut diags = Diagnostics::new();
        diags.report(DiagnosticKind::MissingNote, "note 3");
        diags.set_paragraph(4);
        diags.report(DiagnosticKind::UnknownCharacterStyle, "Foo");
        diags.report(DiagnosticKind::UnknownCharacterStyle, "Bar");

        assert_eq!(diags.count(DiagnosticKind::UnknownCharacterStyle), 2);
        assert_eq!(diags.count(DiagnosticKind::MissingNote), 1);
        assert_eq!(diags.entries()[0].paragraph, None);
        assert_eq!(diags.entries()[1].to_string(), "[para 5] UnknownCharacterStyle: Foo");
    }
}
