use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use once_cell::sync::Lazy;
use quick_xml::escape::{escape, partial_escape};
use regex::Regex;

use crate::tree::{NodeId, Segment, Tree};

static FOLDER_DIGITS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-(\d{4})-").expect("folder digits regex"));
static TEXT_FOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^-]+-(\d{4})").expect("text folder regex"));

const INDENT: &str = "  ";

/// Document type declaration. With a generic text id the bibliography entity is declared
/// alongside the shared catalog entities.
pub fn doctype(dtd_path: &str, generic_id: Option<&str>) -> String {
    let Some(genid) = generic_id else {
        return format!("<!DOCTYPE TEI.2 SYSTEM \"{dtd_path}xtib3.dtd\">");
    };
    let folder = FOLDER_DIGITS_RE
        .captures(genid)
        .and_then(|c| c[1].chars().next())
        .unwrap_or('0');
    format!(
        "<!DOCTYPE TEI.2 SYSTEM \"{dtd_path}xtib3.dtd\" [\n\
         \t<!ENTITY % thlnotent SYSTEM \"{dtd_path}catalog-refs.dtd\" >\n\
         \t%thlnotent;\n\
         \t<!ENTITY {genid} SYSTEM \"../../{folder}/{genid}-bib.xml\">\n\
         ]>"
    )
}

/// At least one child element and no text but whitespace. Content made only of entity
/// references stays inline.
fn is_element_only(tree: &Tree, id: NodeId) -> bool {
    let content = &tree.get(id).content;
    content.iter().any(|s| matches!(s, Segment::Child(_)))
        && content.iter().all(|s| match s {
            Segment::Text(t) => t.trim().is_empty(),
            _ => true,
        })
}

/// `--` may not appear inside a comment, nor may it end with `-`.
fn comment_body(text: &str) -> String {
    let mut body = text.to_string();
    while body.contains("--") {
        body = body.replace("--", "- -");
    }
    if body.ends_with('-') {
        body.push(' ');
    }
    body
}

fn write_start(out: &mut String, tree: &Tree, id: NodeId, empty: bool) {
    let el = tree.get(id);
    out.push('<');
    out.push_str(&el.tag);
    for (k, v) in &el.attrs {
        out.push(' ');
        out.push_str(k);
        out.push_str("=\"");
        out.push_str(&escape(v.as_str()));
        out.push('"');
    }
    out.push_str(if empty { "/>" } else { ">" });
}

fn write_element(out: &mut String, tree: &Tree, id: NodeId, depth: usize, pretty: bool) {
    let el = tree.get(id);
    if el.content.is_empty() {
        write_start(out, tree, id, true);
        return;
    }
    write_start(out, tree, id, false);

    // mixed content is written as is, including everything below it
    let indent_children = pretty && is_element_only(tree, id);
    for seg in &el.content {
        if indent_children {
            if matches!(seg, Segment::Text(_)) {
                continue;
            }
            out.push('\n');
            out.push_str(&INDENT.repeat(depth + 1));
        }
        match seg {
            Segment::Text(t) => out.push_str(&partial_escape(t.as_str())),
            Segment::Child(c) => write_element(out, tree, *c, depth + 1, indent_children),
            Segment::Comment(c) => {
                out.push_str("<!--");
                out.push_str(&comment_body(c));
                out.push_str("-->");
            }
            Segment::Entity(e) => {
                out.push('&');
                out.push_str(e);
                out.push(';');
            }
        }
    }
    if indent_children {
        out.push('\n');
        out.push_str(&INDENT.repeat(depth));
    }
    out.push_str("</");
    out.push_str(&el.tag);
    out.push('>');
}

/// Serialize the whole tree with the XML declaration and `doctype`.
pub fn to_xml_string(tree: &Tree, doctype: &str) -> String {
    let mut out = String::with_capacity(tree.node_count() * 32);
    out.push_str("<?xml version='1.0' encoding='utf-8'?>\n");
    out.push_str(doctype);
    out.push('\n');
    write_element(&mut out, tree, tree.root(), 0, true);
    out.push('\n');
    out
}

/// `<out>/<stem>.xml`, or `<out>/NNNN/<stem>.xml` for `<prefix>-NNNN...` stems when
/// `text_folders` is set.
pub fn output_path(out_dir: &Path, stem: &str, text_folders: bool) -> PathBuf {
    let file = format!("{stem}.xml");
    if text_folders {
        if let Some(caps) = TEXT_FOLDER_RE.captures(stem) {
            return out_dir.join(&caps[1]).join(file);
        }
    }
    out_dir.join(file)
}

pub fn write_document(path: &Path, xml: &str, overwrite: bool) -> anyhow::Result<()> {
    if path.exists() && !overwrite {
        bail!(
            "output exists: {} (use --overwrite to replace it)",
            path.display()
        );
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create output dir: {}", dir.display()))?;
    }
    std::fs::write(path, xml).with_context(|| format!("write xml: {}", path.display()))
}
