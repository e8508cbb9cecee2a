//! Apparatus readings that run across whole paragraphs.
//!
//! A paragraph opening with `{` and holding no `}` starts a span; the span ends with the
//! first paragraph that opens with `}`. All paragraphs of the span become one `<rdg>`
//! bounded by an `app-open`/`app-close` anchor pair. The closing paragraph's note
//! supplies the reading's witnesses.

use log::info;

use crate::convert::apparatus::{parse_annotation, render_variant, Witnesses};
use crate::convert::runs::{splice, RunAssembler};
use crate::convert::structure::{Placement, StructureBuilder};
use crate::diag::DiagnosticKind;
use crate::error::ConvertError;
use crate::model::{Paragraph, Run};

pub fn starts_span(text: &str) -> bool {
    text.trim_start().starts_with('{') && !text.contains('}')
}

pub fn closes_span(text: &str) -> bool {
    text.trim_start().starts_with('}')
}

/// Drop the first non-blank character of the runs when it is `brace`.
fn strip_leading(runs: &[Run], brace: char) -> Vec<Run> {
    let mut runs = runs.to_vec();
    if let Some(run) = runs.iter_mut().find(|r| !r.text.trim().is_empty()) {
        let trimmed = run.text.trim_start();
        if let Some(rest) = trimmed.strip_prefix(brace) {
            run.text = rest.to_string();
        }
    }
    runs
}

/// Paragraphs collected since the opening brace, with their source indices.
#[derive(Default)]
pub struct PendingSpan<'p> {
    paragraphs: Vec<(usize, &'p Paragraph)>,
}

impl<'p> PendingSpan<'p> {
    pub fn push(&mut self, index: usize, paragraph: &'p Paragraph) {
        self.paragraphs.push((index, paragraph));
    }

    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }

    pub fn take(&mut self) -> Vec<(usize, &'p Paragraph)> {
        std::mem::take(&mut self.paragraphs)
    }
}

/// Render one collected span after the builder's current position.
///
/// `terminated` is false when the document ended before a closing paragraph.
pub fn render_span(
    asm: &mut RunAssembler<'_>,
    builder: &mut StructureBuilder,
    paragraphs: &[(usize, &Paragraph)],
    span_id: u32,
    terminated: bool,
) -> Result<(), ConvertError> {
    let Some(&(first_index, _)) = paragraphs.first() else {
        return Ok(());
    };
    asm.diags.set_paragraph(first_index);
    if !builder.has_division() {
        asm.diags.report(
            DiagnosticKind::ContentBeforeDivision,
            "multi-paragraph apparatus before any front/body/back division is dropped",
        );
        return Ok(());
    }

    builder.reset_current(asm.tree);
    let Placement::Fill(p) = builder.paragraph(asm.tree, "{")? else {
        return Ok(());
    };
    let app = asm.tree.create("app");
    let rdg = asm.tree.create("rdg");
    asm.tree.append_child(p, app);
    asm.tree.append_child(app, rdg);
    let corresp = format!("span-{span_id}");
    let open = asm
        .tree
        .create_with_attrs("anchor", &[("type", "app-open"), ("corresp", &corresp)]);
    asm.tree.append_child(rdg, open);

    let last = paragraphs.len() - 1;
    let mut closing_notes = Vec::new();
    let mut cursor = rdg;
    for (pos, &(index, paragraph)) in paragraphs.iter().enumerate() {
        asm.diags.set_paragraph(index);
        let mut runs = if pos == 0 {
            strip_leading(&paragraph.runs, '{')
        } else {
            paragraph.runs.clone()
        };
        if terminated && pos == last {
            runs = strip_leading(&runs, '}');
            closing_notes = runs.iter().filter_map(|r| r.note.clone()).collect();
            runs.retain(|r| r.note.is_none());
        }

        if pos > 0 {
            let lb = asm.tree.create("lb");
            asm.tree.append_child(rdg, lb);
            cursor = lb;
        }
        if !runs.is_empty() {
            let fragment = asm.assemble(&runs);
            cursor = splice(asm.tree, fragment, cursor)?;
        }
    }
    let close = asm
        .tree
        .create_with_attrs("anchor", &[("type", "app-close"), ("corresp", &corresp)]);
    asm.tree.append_child(rdg, close);

    let mut witnesses: Option<Witnesses> = None;
    let mut lemma_clause: Option<String> = None;
    for note_ref in &closing_notes {
        let Some(note) = asm.take_note(note_ref) else {
            continue;
        };
        let analysis = parse_annotation(&note.text);
        if analysis.lemma_witnesses.is_some() {
            witnesses = analysis.lemma_witnesses.clone();
            lemma_clause = analysis.lemma_clause.clone();
        }
        for variant in &analysis.variants {
            let el = render_variant(asm.tree, variant);
            asm.tree.append_child(app, el);
        }
    }

    if !terminated {
        asm.diags.report(
            DiagnosticKind::UnterminatedSpan,
            format!("{corresp} has no closing paragraph before the end of the document"),
        );
    } else if witnesses.is_none() {
        asm.diags.report(
            DiagnosticKind::SpanWithoutSigla,
            format!("closing paragraph of {corresp} names no witnesses; using the base sigil"),
        );
    }
    let (sigla, pages) = match &witnesses {
        Some(w) => (w.sigla.clone(), w.pages.clone()),
        None => (asm.base_sigil.to_string(), String::new()),
    };
    asm.tree.set_attr(rdg, "wit", &sigla);
    if !pages.is_empty() {
        asm.tree.set_attr(rdg, "n", &pages);
    }
    asm.tree.set_attr(open, "n", &sigla);
    asm.tree.set_attr(open, "to", lemma_clause.as_deref().unwrap_or(&sigla));

    info!("multi-paragraph apparatus {corresp} finished ({} paragraphs)", paragraphs.len());
    builder.set_current(p);
    Ok(())
}
