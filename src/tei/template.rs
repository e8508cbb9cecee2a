//! TEI skeleton with `{Label}` placeholders filled from the document's metadata table.

use std::path::Path;

use anyhow::{anyhow, Context};
use log::{debug, warn};
use once_cell::sync::Lazy;
use quick_xml::escape::partial_escape;
use regex::Regex;

use crate::model::MetadataRow;
use crate::tree::{NodeId, Tree};
use crate::xml::{parse_events, XmlEvent};

pub const DEFAULT_TEMPLATE: &str = include_str!("../../templates/tei_text_template.xml");

const PROFILE_ENTITY: &str = "thdlprofiledesc";

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^}]+)\}").expect("placeholder regex"));

/// Values captured while filling the template.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
    pub text_id: Option<String>,
    pub edition_sigla: Option<String>,
    pub chapter_number: Option<String>,
}

impl Metadata {
    /// Text id without its `-text` suffix, used for the bibliography entity.
    pub fn generic_id(&self) -> Option<String> {
        self.text_id
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(|t| t.replace("-text", ""))
    }
}

pub fn load_template(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(p) => std::fs::read_to_string(p)
            .with_context(|| format!("read template: {}", p.display())),
        None => Ok(DEFAULT_TEMPLATE.to_string()),
    }
}

/// Distinct placeholder labels of a template, in order of first appearance.
pub fn list_placeholders(template: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let label = caps[1].to_string();
        if !out.contains(&label) {
            out.push(label);
        }
    }
    out
}

/// Canonical placeholder label for a metadata-table label.
pub fn normalize_label(label: &str) -> String {
    let label = label.split(" (").next().unwrap_or(label);
    let label = label
        .replace('\u{a0}', " ")
        .trim()
        .replace(" (if applicable)", "")
        .replace("Call་number", "Call-number");
    if matches!(
        label.as_str(),
        "Title on Cover" | "Title on Cover Page" | "Title on Title Page"
    ) {
        return "Cover Title Tib".to_string();
    }
    if label == "Cover Page" {
        return label;
    }
    label.replace("Cover Page", "Cover").replace("Title Page", "Cover")
}

/// Section headers of the metadata table are written in capitals.
fn is_header_label(label: &str) -> bool {
    label.chars().any(char::is_uppercase) && !label.chars().any(char::is_lowercase)
}

fn row_label_value(row: &MetadataRow, index: usize) -> Option<(String, String)> {
    let cell = |i: usize| row.cell_text(i).unwrap_or_default();
    match row.cells.len() {
        0 | 1 => {
            warn!("row {index} of metadata table has too few cells");
            None
        }
        2 => Some((cell(0), cell(1))),
        3 => {
            warn!("third column of metadata row {index} is ignored");
            Some((cell(0), cell(1)))
        }
        4 if cell(0) == cell(2) => Some((cell(2), cell(3))),
        _ => Some((cell(0), cell(1))),
    }
}

pub struct FilledTemplate {
    pub xml: String,
    pub metadata: Metadata,
}

/// Substitute metadata rows into `template`. Unfilled placeholders become comments.
pub fn fill_template(template: &str, rows: &[MetadataRow], today: &str) -> FilledTemplate {
    let mut xml = template.replace("{Digital Creation Date}", today);
    let mut metadata = Metadata::default();
    let mut problems_on = false;
    let mut problems: Vec<String> = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        if problems_on {
            if let Some(first) = row.cells.first() {
                problems.extend(
                    first
                        .iter()
                        .map(|p| p.trim().to_string())
                        .filter(|p| !p.is_empty()),
                );
            }
            continue;
        }
        let Some((label, value)) = row_label_value(row, index) else {
            continue;
        };
        if label == "Text ID" {
            metadata.text_id = Some(value.clone());
        }
        if is_header_label(&label) {
            if label == "PROBLEMS" {
                problems_on = true;
            }
            continue;
        }

        let label = normalize_label(&label);
        xml = xml.replace(&format!("{{{label}}}"), &partial_escape(&value));
        match label.to_lowercase().as_str() {
            "edition sigla" => metadata.edition_sigla = Some(value),
            "chapter number" => metadata.chapter_number = Some(value),
            _ => {}
        }
    }

    let problems = if problems.is_empty() {
        "<p>No problems</p>".to_string()
    } else {
        debug!("{} problems listed in metadata", problems.len());
        problems
            .iter()
            .map(|p| format!("<p>{}</p>", partial_escape(p)))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let xml = xml.replace("{Problems}", &problems);
    let xml = PLACEHOLDER_RE.replace_all(&xml, "<!--$1-->").into_owned();
    FilledTemplate { xml, metadata }
}

fn open_element(
    tree: &mut Option<Tree>,
    stack: &[NodeId],
    name: &str,
    attrs: &[(String, String)],
) -> anyhow::Result<NodeId> {
    if tree.is_none() {
        let mut t = Tree::new(name);
        let root = t.root();
        for (k, v) in attrs {
            t.set_attr(root, k, v);
        }
        *tree = Some(t);
        return Ok(root);
    }
    let (Some(t), Some(&parent)) = (tree.as_mut(), stack.last()) else {
        return Err(anyhow!("template has more than one root element"));
    };
    let id = t.create(name);
    for (k, v) in attrs {
        t.set_attr(id, k, v);
    }
    t.append_child(parent, id);
    Ok(id)
}

/// Parse filled template markup into a tree. Returns the tree and its `text` element.
/// Whitespace-only text is dropped.
pub fn build_tree(xml: &str) -> anyhow::Result<(Tree, NodeId)> {
    let events = parse_events("template", xml.as_bytes())?;
    let mut tree: Option<Tree> = None;
    let mut stack: Vec<NodeId> = Vec::new();

    for ev in events {
        match ev {
            XmlEvent::Start { name, attrs } => {
                let id = open_element(&mut tree, &stack, &name, &attrs)?;
                stack.push(id);
            }
            XmlEvent::Empty { name, attrs } => {
                open_element(&mut tree, &stack, &name, &attrs)?;
            }
            XmlEvent::End { .. } => {
                stack.pop();
            }
            XmlEvent::Text { text } => {
                if let (Some(t), Some(&top)) = (tree.as_mut(), stack.last()) {
                    if !text.trim().is_empty() {
                        t.push_text(top, &text);
                    }
                }
            }
            XmlEvent::Comment { text } => {
                if let (Some(t), Some(&top)) = (tree.as_mut(), stack.last()) {
                    t.push_comment(top, &text);
                }
            }
        }
    }

    let mut tree = tree.ok_or_else(|| anyhow!("template has no root element"))?;
    let root = tree.root();
    let text = match tree.find_descendant(root, "text") {
        Some(t) => t,
        None => {
            let t = tree.create("text");
            tree.append_child(root, t);
            t
        }
    };
    Ok((tree, text))
}

/// Drop publication responsibility statements whose agent name was left empty.
pub fn tidy(tree: &mut Tree) -> usize {
    let root = tree.root();
    let mut empty: Vec<NodeId> = Vec::new();
    for stmt in tree.descendants(root) {
        if !tree.is(stmt, "publicationStmt") {
            continue;
        }
        for resp in tree.children(stmt).filter(|c| tree.is(*c, "respStmt")) {
            let unnamed = tree.children(resp).any(|n| {
                tree.is(n, "name")
                    && tree.attr(n, "n") == Some("agent")
                    && tree.text_content(n).trim().is_empty()
            });
            if unnamed {
                empty.push(resp);
            }
        }
    }
    for resp in &empty {
        tree.detach(*resp);
    }
    empty.len()
}

/// Replace the profile description by its shared entity and add the bibliography entity
/// after the first source description.
pub fn attach_entities(tree: &mut Tree, generic_id: &str) -> anyhow::Result<()> {
    let root = tree.root();
    if let Some(profile) = tree.find_descendant(root, "profileDesc") {
        tree.replace_with_entity(profile, PROFILE_ENTITY);
    }
    if let Some(source) = tree.find_descendant(root, "sourceDesc") {
        let bibl = tree.create_with_attrs("sourceDesc", &[("n", "tibbibl")]);
        tree.push_entity(bibl, generic_id);
        tree.insert_after(source, bibl)
            .context("place tibbibl source description")?;
    }
    Ok(())
}

/// Today's local date as `YYYY-MM-DD`.
pub fn today_iso() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> MetadataRow {
        MetadataRow {
            cells: cells.iter().map(|c| vec![c.to_string()]).collect(),
        }
    }

    #[test]
    fn labels_are_normalized() {
        assert_eq!(normalize_label("Publisher (if known)"), "Publisher");
        assert_eq!(normalize_label("Call\u{a0}Number"), "Call Number");
        assert_eq!(normalize_label("Call་number"), "Call-number");
        assert_eq!(normalize_label("Title on Cover Page"), "Cover Title Tib");
        assert_eq!(normalize_label("Title Page Title"), "Cover Title");
        assert_eq!(normalize_label("Cover Page"), "Cover Page");
    }

    #[test]
    fn fills_rows_and_captures_values() {
        let template = "<a><i>{Text ID}</i><s>{Edition Sigla}</s><c>{Chapter Number}</c>\
            <d>{Digital Creation Date}</d><t>{Title Tib}</t><n>{Problems}</n><x>{Unused}</x></a>";
        let rows = vec![
            row(&["BIBLIOGRAPHY", ""]),
            row(&["Text ID", "kt-d-0123-text"]),
            row(&["Edition Sigla", "Dg"]),
            row(&["Title Tib", "Title Tib", "Title Tib", "chos & dbyings"]),
            row(&["Chapter Number", "4"]),
        ];
        let filled = fill_template(template, &rows, "2024-05-06");
        assert_eq!(filled.metadata.text_id.as_deref(), Some("kt-d-0123-text"));
        assert_eq!(filled.metadata.edition_sigla.as_deref(), Some("Dg"));
        assert_eq!(filled.metadata.chapter_number.as_deref(), Some("4"));
        assert_eq!(filled.metadata.generic_id().as_deref(), Some("kt-d-0123"));
        assert!(filled.xml.contains("<d>2024-05-06</d>"));
        assert!(filled.xml.contains("<t>chos &amp; dbyings</t>"));
        assert!(filled.xml.contains("<n><p>No problems</p></n>"));
        assert!(filled.xml.contains("<x><!--Unused--></x>"));
    }

    #[test]
    fn problems_section_collects_rows() {
        let rows = vec![
            row(&["PROBLEMS", ""]),
            row(&["page 3 is missing", ""]),
            row(&["line 4 unclear", ""]),
        ];
        let filled = fill_template("<n>{Problems}</n>", &rows, "2024-01-01");
        assert_eq!(
            filled.xml,
            "<n><p>page 3 is missing</p>\n<p>line 4 unclear</p></n>"
        );
    }

    #[test]
    fn default_template_builds_and_tidies() {
        let filled = fill_template(DEFAULT_TEMPLATE, &[row(&["Inputter", "Tashi"])], "2024-01-01");
        let (mut tree, text) = build_tree(&filled.xml).expect("tree");
        assert_eq!(tree.tag(tree.root()), "TEI.2");
        assert!(tree.is(text, "text"));

        let removed = tidy(&mut tree);
        assert_eq!(removed, 2);
        let root = tree.root();
        let names: Vec<String> = tree
            .descendants(root)
            .into_iter()
            .filter(|n| tree.is(*n, "name"))
            .map(|n| tree.text_content(n))
            .collect();
        assert!(names.contains(&"Tashi".to_string()));

        attach_entities(&mut tree, "kt-d-0123").expect("entities");
        assert!(tree.find_descendant(root, "profileDesc").is_none());
        let sources: Vec<NodeId> = tree
            .descendants(root)
            .into_iter()
            .filter(|n| tree.is(*n, "sourceDesc"))
            .collect();
        assert_eq!(sources.len(), 2);
        assert_eq!(tree.attr(sources[1], "n"), Some("tibbibl"));
    }

    #[test]
    fn placeholders_listed_once() {
        let labels = list_placeholders("{A} {B} {A}");
        assert_eq!(labels, vec!["A", "B"]);
        assert!(list_placeholders(DEFAULT_TEMPLATE).contains(&"Text ID".to_string()));
    }

    #[test]
    fn today_is_the_local_calendar_date() {
        let today = today_iso();
        let parsed = chrono::NaiveDate::parse_from_str(&today, "%Y-%m-%d").expect("iso date");
        assert_eq!(parsed, chrono::Local::now().date_naive());
    }
}
