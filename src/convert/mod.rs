//! Paragraph-by-paragraph reconstruction of the document structure.

pub mod apparatus;
pub mod classify;
pub mod ids;
pub mod milestone;
pub mod runs;
pub mod span;
pub mod structure;

use log::{debug, info};

use crate::diag::{DiagnosticKind, Diagnostics};
use crate::error::ConvertError;
use crate::model::{NoteTable, Paragraph, SourceDocument};
use crate::styles::StyleLookup;
use crate::tree::{NodeId, Tree};

use self::classify::{classify, ParaKind};
use self::runs::{capture_heading_number, RunAssembler};
use self::span::{closes_span, render_span, starts_span, PendingSpan};
use self::structure::{Placement, StructureBuilder};

#[derive(Clone, Debug)]
pub struct ConvertSettings {
    /// Witness of the lemma when a note names none.
    pub base_sigil: String,
    /// Replaces the first component of every division id.
    pub chapter_number: Option<String>,
}

impl Default for ConvertSettings {
    fn default() -> Self {
        Self {
            base_sigil: "base".to_string(),
            chapter_number: None,
        }
    }
}

/// Per-document conversion state. Nothing here outlives one document.
pub struct Converter<'a> {
    tree: &'a mut Tree,
    styles: &'a dyn StyleLookup,
    notes: &'a mut NoteTable,
    diags: &'a mut Diagnostics,
    settings: &'a ConvertSettings,
    builder: StructureBuilder,
    next_span: u32,
}

impl<'a> Converter<'a> {
    pub fn new(
        tree: &'a mut Tree,
        text: NodeId,
        styles: &'a dyn StyleLookup,
        notes: &'a mut NoteTable,
        diags: &'a mut Diagnostics,
        settings: &'a ConvertSettings,
    ) -> Self {
        Self {
            tree,
            styles,
            notes,
            diags,
            settings,
            builder: StructureBuilder::new(text),
            next_span: 1,
        }
    }

    pub fn builder(&self) -> &StructureBuilder {
        &self.builder
    }

    fn assembler(&mut self) -> (RunAssembler<'_>, &mut StructureBuilder) {
        (
            RunAssembler {
                tree: &mut *self.tree,
                styles: self.styles,
                notes: &mut *self.notes,
                diags: &mut *self.diags,
                base_sigil: &self.settings.base_sigil,
            },
            &mut self.builder,
        )
    }

    pub fn run(&mut self, paragraphs: &[Paragraph]) -> Result<(), ConvertError> {
        let mut pending = PendingSpan::default();
        for (index, paragraph) in paragraphs.iter().enumerate() {
            self.diags.set_paragraph(index);
            let text = paragraph.text();

            if pending.is_empty() && starts_span(&text) {
                info!("multi-paragraph apparatus begins: {text}");
                pending.push(index, paragraph);
            } else if !pending.is_empty() {
                pending.push(index, paragraph);
                if closes_span(&text) {
                    self.flush_span(pending.take(), true)?;
                }
            } else {
                self.paragraph(paragraph, &text)?;
            }
            self.builder.advance(&paragraph.style);
        }
        if !pending.is_empty() {
            self.flush_span(pending.take(), false)?;
        }
        Ok(())
    }

    fn flush_span(&mut self, paragraphs: Vec<(usize, &Paragraph)>, terminated: bool) -> Result<(), ConvertError> {
        let span_id = self.next_span;
        self.next_span += 1;
        let (mut asm, builder) = self.assembler();
        render_span(&mut asm, builder, &paragraphs, span_id, terminated)
    }

    fn paragraph(&mut self, paragraph: &Paragraph, text: &str) -> Result<(), ConvertError> {
        let style = paragraph.style.as_str();
        let kind = classify(style);
        let opens_division = matches!(kind, ParaKind::Heading { level: Some(0), .. });
        if !self.builder.has_division() && !opens_division {
            if !text.trim().is_empty() {
                self.diags.report(
                    DiagnosticKind::ContentBeforeDivision,
                    format!("'{style}' paragraph before any front/body/back division skipped: {text}"),
                );
            }
            return Ok(());
        }

        let placement = self.builder.place(self.tree, self.diags, style, &kind, text)?;
        let Placement::Fill(container) = placement else {
            return Ok(());
        };
        let (mut asm, builder) = self.assembler();
        let current = asm.fill(&paragraph.runs, container)?;
        if matches!(kind, ParaKind::Heading { .. }) {
            capture_heading_number(asm.tree, container);
        }
        builder.set_current(current);
        Ok(())
    }

    pub fn finish(self) -> usize {
        let text = self.builder.text();
        let chapter = self.settings.chapter_number.as_deref();
        let assigned = ids::assign_ids(self.tree, text, chapter);
        for note in self.notes.unconsumed() {
            debug!("{} {} was never referenced", note.kind.as_str(), note.id);
        }
        assigned
    }
}

/// Convert a document's paragraphs into `text`, which must already sit in `tree`.
pub fn convert_document(
    doc: &mut SourceDocument,
    tree: &mut Tree,
    text: NodeId,
    styles: &dyn StyleLookup,
    settings: &ConvertSettings,
) -> Result<Diagnostics, ConvertError> {
    let mut diags = Diagnostics::new();
    let mut converter = Converter::new(tree, text, styles, &mut doc.notes, &mut diags, settings);
    converter.run(&doc.paragraphs)?;
    let assigned = converter.finish();
    debug!("{}: {assigned} division ids assigned", doc.name);
    Ok(diags)
}
