//! One document from docx to TEI file, and input discovery for a batch.

use std::path::{Path, PathBuf};

use anyhow::Context;
use log::{debug, info};

use crate::convert::{convert_document, ConvertSettings};
use crate::diag::Diagnostics;
use crate::docx::read_document;
use crate::model::SourceDocument;
use crate::styles::StyleTable;
use crate::tei::pages::{number_milestones, start_from_stem, PageNumbering};
use crate::tei::serialize::{doctype, output_path, to_xml_string, write_document};
use crate::tei::template::{attach_entities, build_tree, fill_template, tidy, today_iso};

pub struct BatchOptions {
    pub out_dir: PathBuf,
    pub log_dir: Option<PathBuf>,
    /// Template markup, already loaded.
    pub template: String,
    pub dtd_path: String,
    /// Used when the metadata table gives no edition sigla.
    pub base_sigil: String,
    pub overwrite: bool,
    pub text_folders: bool,
    pub styles: StyleTable,
    /// Renumber page and line milestones after conversion.
    pub page_numbering: Option<PageNumbering>,
}

pub struct DocumentOutcome {
    pub output: PathBuf,
    pub diagnostics: Diagnostics,
}

/// Expand directories into their `.docx` files (sorted, Word lock files skipped).
pub fn collect_inputs(inputs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            out.push(input.clone());
            continue;
        }
        let mut found = Vec::new();
        let rd = std::fs::read_dir(input)
            .with_context(|| format!("read input dir: {}", input.display()))?;
        for entry in rd {
            let path = entry
                .with_context(|| format!("read input dir: {}", input.display()))?
                .path();
            let is_docx = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("docx"));
            let is_lock = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('~'));
            if path.is_file() && is_docx && !is_lock {
                found.push(path);
            }
        }
        found.sort();
        out.extend(found);
    }
    Ok(out)
}

/// Fill the template from `doc`'s metadata, convert its body, optionally renumber its
/// milestones and serialize the result.
pub fn render_document(
    doc: &mut SourceDocument,
    opts: &BatchOptions,
    today: &str,
) -> anyhow::Result<(String, Diagnostics)> {
    let filled = fill_template(&opts.template, &doc.metadata, today);
    let (mut tree, text) = build_tree(&filled.xml)
        .with_context(|| format!("parse filled template for {}", doc.name))?;

    let base_sigil = filled
        .metadata
        .edition_sigla
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| opts.base_sigil.clone());
    let settings = ConvertSettings {
        base_sigil,
        chapter_number: filled.metadata.chapter_number.clone(),
    };
    debug!("{}: base sigil {}", doc.name, settings.base_sigil);

    let diagnostics = convert_document(doc, &mut tree, text, &opts.styles, &settings)
        .with_context(|| format!("convert {}", doc.name))?;

    if let Some(numbering) = opts.page_numbering {
        let start = start_from_stem(&doc.name).unwrap_or(numbering.start);
        let numbered = number_milestones(&mut tree, PageNumbering { start, ..numbering })
            .with_context(|| format!("number milestones of {}", doc.name))?;
        debug!("{}: {numbered} milestones numbered from page {start}", doc.name);
    }

    let removed = tidy(&mut tree);
    debug!("{}: {removed} empty respStmt removed", doc.name);
    let genid = filled.metadata.generic_id();
    if let Some(id) = genid.as_deref() {
        attach_entities(&mut tree, id)?;
    }
    let xml = to_xml_string(&tree, &doctype(&opts.dtd_path, genid.as_deref()));
    Ok((xml, diagnostics))
}

pub fn convert_file(input: &Path, opts: &BatchOptions) -> anyhow::Result<DocumentOutcome> {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
        .to_string();
    let output = output_path(&opts.out_dir, &stem, opts.text_folders);
    if output.exists() && !opts.overwrite {
        anyhow::bail!(
            "output exists: {} (use --overwrite to replace it)",
            output.display()
        );
    }

    let mut doc = read_document(input)?;
    let (xml, diagnostics) = render_document(&mut doc, opts, &today_iso())?;
    write_document(&output, &xml, opts.overwrite)?;
    info!("{} -> {}", input.display(), output.display());

    if let Some(dir) = opts.log_dir.as_deref() {
        write_log(dir, &stem, &diagnostics)?;
    }
    Ok(DocumentOutcome {
        output,
        diagnostics,
    })
}

fn write_log(dir: &Path, stem: &str, diagnostics: &Diagnostics) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create log dir: {}", dir.display()))?;
    let path = dir.join(format!("{stem}.log"));
    let mut body = String::new();
    for d in diagnostics.entries() {
        body.push_str(&d.to_string());
        body.push('\n');
    }
    std::fs::write(&path, body).with_context(|| format!("write log: {}", path.display()))
}
