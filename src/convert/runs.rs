//! Character-level content of one paragraph.
//!
//! Runs are rendered into a detached `temp` fragment first, then spliced into the
//! paragraph's container.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::convert::apparatus::{parse_annotation, render_apparatus, split_lemma, Lemma, LemmaSplit};
use crate::convert::milestone::{parse_milestone, split_tokens};
use crate::diag::{DiagnosticKind, Diagnostics};
use crate::error::ConvertError;
use crate::model::{Note, NoteRef, Run};
use crate::model::NoteTable;
use crate::styles::StyleLookup;
use crate::tree::{NodeId, Tree};

static HEADING_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^((?:\d+\.?)+)").expect("heading number regex"));

const MARKER_TAGS: &[&str] = &["lb", "pb", "milestone"];

fn is_default_style(style: &str) -> bool {
    style.is_empty() || style.contains("Default Paragraph Font")
}

fn is_note_style(style: &str) -> bool {
    let lower = style.to_lowercase();
    lower.contains("footnote") || lower.contains("endnote")
}

fn is_milestone_style(style: &str) -> bool {
    let lower = style.to_lowercase();
    lower.contains("page number") || lower.contains("line number")
}

pub fn is_marker(tree: &Tree, id: NodeId) -> bool {
    MARKER_TAGS.contains(&tree.tag(id))
}

pub struct RunAssembler<'a> {
    pub tree: &'a mut Tree,
    pub styles: &'a dyn StyleLookup,
    pub notes: &'a mut NoteTable,
    pub diags: &'a mut Diagnostics,
    pub base_sigil: &'a str,
}

impl RunAssembler<'_> {
    /// Render the runs and splice them into `container`. Returns the new current position.
    pub fn fill(&mut self, runs: &[Run], container: NodeId) -> Result<NodeId, ConvertError> {
        if runs.is_empty() {
            return Ok(container);
        }
        let fragment = self.assemble(runs);
        splice(self.tree, fragment, container)
    }

    pub fn assemble(&mut self, runs: &[Run]) -> NodeId {
        let fragment = self.tree.create("temp");
        // style of the last child while it still accepts text from following runs
        let mut open_style: Option<&str> = None;
        let mut unknown: Vec<String> = Vec::new();

        for run in runs {
            let style = run.style.as_str();
            if let Some(note_ref) = &run.note {
                self.note_reference(fragment, note_ref);
                open_style = None;
            } else if is_default_style(style) {
                match run.font.rend() {
                    Some(rend) => {
                        let hi = self.tree.create_with_attrs("hi", &[("rend", &rend)]);
                        self.tree.push_text(hi, &run.text);
                        self.tree.append_child(fragment, hi);
                    }
                    None => self.tree.push_text(fragment, &run.text),
                }
                open_style = None;
            } else if is_note_style(style) {
                self.tree.push_text(fragment, &run.text);
                open_style = None;
            } else if is_milestone_style(style) {
                for token in split_tokens(&run.text) {
                    let ms = self.milestone(style, &token);
                    self.tree.append_child(fragment, ms);
                }
                open_style = None;
            } else if open_style == Some(style) {
                if let Some(last) = self.tree.last_child(fragment) {
                    self.tree.push_text(last, &run.text);
                }
            } else {
                open_style = self.styled_run(fragment, run, &mut unknown);
            }
        }
        fragment
    }

    /// `unknown` holds the unknown styles already reported for this paragraph.
    fn styled_run<'r>(
        &mut self,
        fragment: NodeId,
        run: &'r Run,
        unknown: &mut Vec<String>,
    ) -> Option<&'r str> {
        let style = run.style.as_str();
        let Some(def) = self.styles.lookup(style) else {
            self.tree.push_text(fragment, &run.text);
            if !self.styles.is_ignorable(style) && !unknown.iter().any(|u| u == style) {
                unknown.push(style.to_string());
                self.diags.report(
                    DiagnosticKind::UnknownCharacterStyle,
                    format!("no element for character style '{style}': {}", run.text),
                );
            }
            return None;
        };

        let el = self.tree.create(&def.tag);
        for (k, v) in def.attributes_for(&run.text) {
            self.tree.set_attr(el, &k, &v);
        }
        self.tree.append_child(fragment, el);
        if def.is_templated() {
            None
        } else {
            self.tree.push_text(el, &run.text);
            Some(style)
        }
    }

    fn milestone(&mut self, style: &str, token: &str) -> NodeId {
        let parsed = parse_milestone(token, style);
        if !parsed.matched {
            self.diags.report(
                DiagnosticKind::UnmatchedMilestone,
                format!("no match for milestone parts in '{token}'"),
            );
        }
        let ms = match self.styles.lookup(style) {
            Some(def) => {
                let el = self.tree.create(&def.tag);
                for (k, v) in &def.attributes {
                    self.tree.set_attr(el, k, v);
                }
                el
            }
            None => self.tree.create("milestone"),
        };
        let m = parsed.milestone;
        self.tree.set_attr(ms, "unit", &m.unit);
        if !m.edition.is_empty() {
            self.tree.set_attr(ms, "ed", &m.edition);
        }
        self.tree.set_attr(ms, "n", &m.number);
        ms
    }

    /// Take a note out of the table, reporting a miss or a second use.
    pub fn take_note(&mut self, note_ref: &NoteRef) -> Option<Note> {
        let Some((note, reused)) = self
            .notes
            .consume(note_ref.kind, &note_ref.id)
            .map(|(n, r)| (n.clone(), r))
        else {
            self.diags.report(
                DiagnosticKind::MissingNote,
                format!("{} {} is referenced but not present", note_ref.kind.as_str(), note_ref.id),
            );
            return None;
        };
        if reused {
            self.diags.report(
                DiagnosticKind::NoteReused,
                format!("{} {} is referenced more than once", note_ref.kind.as_str(), note_ref.id),
            );
        }
        Some(note)
    }

    fn note_reference(&mut self, fragment: NodeId, note_ref: &NoteRef) {
        let Some(note) = self.take_note(note_ref) else {
            return;
        };

        // the back-text is the fragment's end, or the end of its last styled child
        let host = match self.tree.last_child(fragment) {
            Some(last)
                if self.tree.trailing_text(fragment).is_empty() && !is_marker(self.tree, last) =>
            {
                last
            }
            _ => fragment,
        };
        let back_text = self.tree.trailing_text(host).to_string();

        let split = if note.annotation {
            split_lemma(&back_text)
        } else {
            LemmaSplit::NotApparatus
        };
        let (retained, lemma) = match split {
            LemmaSplit::Found { retained, lemma } => (retained, Lemma::Text(lemma)),
            LemmaSplit::Malformed { retained } => {
                self.diags.report(
                    DiagnosticKind::MalformedLemma,
                    format!(
                        "{} {} follows a closing brace with no opening brace: '{back_text}' (note: {})",
                        note.kind.as_str(),
                        note.id,
                        note.text
                    ),
                );
                (retained, Lemma::NeedsManualFix)
            }
            LemmaSplit::NotApparatus => {
                let el = render_plain_note(self.tree, &note);
                self.tree.append_child(fragment, el);
                return;
            }
        };

        let analysis = parse_annotation(&note.text);
        for clause in &analysis.unparsed {
            self.diags.report(
                DiagnosticKind::UnparsedSiglum,
                format!("clause '{clause}' of {} {} taken as sigla", note.kind.as_str(), note.id),
            );
        }
        let app = render_apparatus(self.tree, &lemma, &analysis, self.base_sigil);
        self.tree.set_trailing_text(host, &retained);
        self.tree.append_child(host, app);
    }
}

/// An informational note with the note's own styled spans.
pub fn render_plain_note(tree: &mut Tree, note: &Note) -> NodeId {
    let el = tree.create_with_attrs("note", &[("type", note.kind.as_str())]);
    if note.spans.is_empty() {
        tree.push_text(el, &note.text);
        return el;
    }
    for span in &note.spans {
        if span.rend.is_empty() && span.lang.is_none() {
            tree.push_text(el, &span.text);
            continue;
        }
        let hi = tree.create("hi");
        if !span.rend.is_empty() {
            tree.set_attr(hi, "rend", &span.rend.join(" "));
        }
        if let Some(lang) = &span.lang {
            tree.set_attr(hi, "lang", lang);
        }
        tree.push_text(hi, &span.text);
        tree.append_child(el, hi);
    }
    el
}

/// Move the fragment's content into `container` and return the new current position.
///
/// A marker container (`lb`, `pb`, `milestone`) takes the fragment's leading text as its tail
/// and its children as following siblings; the position then rises to the marker's parent.
pub fn splice(tree: &mut Tree, fragment: NodeId, container: NodeId) -> Result<NodeId, ConvertError> {
    if !is_marker(tree, container) {
        tree.move_content(fragment, container);
        return Ok(container);
    }

    let lead = tree.leading_text(fragment).to_string();
    tree.set_leading_text(fragment, "");
    let tail = format!("{}{lead}", tree.tail(container));
    tree.set_tail(container, &tail);

    let children: Vec<NodeId> = tree.children(fragment).collect();
    let mut anchor = container;
    for child in children {
        let child_tail = tree.tail(child).to_string();
        tree.set_tail(child, "");
        tree.insert_after(anchor, child)?;
        tree.set_tail(child, &child_tail);
        anchor = child;
    }
    Ok(tree.parent(container).unwrap_or(container))
}

/// Turn a leading `1.2.` heading numeral into a `num` element at the start of `head`.
pub fn capture_heading_number(tree: &mut Tree, head: NodeId) {
    let lead = tree.leading_text(head).to_string();
    let Some(m) = HEADING_NUMBER_RE.find(&lead) else {
        return;
    };
    let number = m.as_str().to_string();
    let rest = lead[m.end()..].to_string();
    tree.set_leading_text(head, "");
    let num = tree.create("num");
    tree.push_text(num, &number);
    tree.prepend_child(head, num);
    tree.set_tail(num, &rest);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NoteKind, NoteSpan};
    use crate::styles::StyleTable;

    struct Fixture {
        tree: Tree,
        notes: NoteTable,
        diags: Diagnostics,
        styles: StyleTable,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                tree: Tree::new("p"),
                notes: NoteTable::new(),
                diags: Diagnostics::new(),
                styles: StyleTable::builtin(),
            }
        }

        fn fill(&mut self, runs: &[Run]) -> NodeId {
            let root = self.tree.root();
            let mut asm = RunAssembler {
                tree: &mut self.tree,
                styles: &self.styles,
                notes: &mut self.notes,
                diags: &mut self.diags,
                base_sigil: "base",
            };
            asm.fill(runs, root).expect("fill")
        }
    }

    #[test]
    fn unknown_style_degrades_to_text_once() {
        let mut fx = Fixture::new();
        fx.fill(&[
            Run::plain("before "),
            Run::styled("mystery", "Totally Unknown Style"),
            Run::plain(" after"),
        ]);
        let root = fx.tree.root();
        assert_eq!(fx.tree.text_content(root), "before mystery after");
        assert!(!fx.tree.has_children(root));
        assert_eq!(fx.diags.count(DiagnosticKind::UnknownCharacterStyle), 1);
        assert_eq!(fx.diags.len(), 1);
    }

    #[test]
    fn unknown_style_reported_once_across_font_changes() {
        let mut fx = Fixture::new();
        let mut bold = Run::styled("two", "Totally Unknown Style");
        bold.font.bold = true;
        fx.fill(&[
            Run::styled("one ", "Totally Unknown Style"),
            bold,
            Run::plain(" mid "),
            Run::styled("three", "Totally Unknown Style"),
            Run::styled("other", "Another Unknown Style"),
        ]);
        assert_eq!(fx.tree.text_content(fx.tree.root()), "one two mid threeother");
        assert_eq!(fx.diags.count(DiagnosticKind::UnknownCharacterStyle), 2);
    }

    #[test]
    fn ignorable_style_has_no_diagnostic() {
        let mut fx = Fixture::new();
        fx.fill(&[Run::styled("text", "Paragraph Char")]);
        assert!(fx.diags.is_empty());
    }

    #[test]
    fn styled_runs_and_font_flags() {
        let mut fx = Fixture::new();
        let mut bold = Run::plain("bold");
        bold.font.bold = true;
        fx.fill(&[
            Run::plain("a "),
            Run::styled("chos", "X-Term Tibetan"),
            Run::plain(" b "),
            bold,
        ]);
        let root = fx.tree.root();
        let kids: Vec<NodeId> = fx.tree.children(root).collect();
        assert_eq!(fx.tree.tag(kids[0]), "term");
        assert_eq!(fx.tree.attr(kids[0], "lang"), Some("tib"));
        assert_eq!(fx.tree.tail(kids[0]), " b ");
        assert_eq!(fx.tree.attr(kids[1], "rend"), Some("strong"));
        assert_eq!(fx.tree.leading_text(root), "a ");
    }

    #[test]
    fn merged_milestones_split() {
        let mut fx = Fixture::new();
        fx.fill(&[
            Run::plain("text"),
            Run::styled("[Page 3][Line 3.1]", "Page Number"),
        ]);
        let root = fx.tree.root();
        let kids: Vec<NodeId> = fx.tree.children(root).collect();
        assert_eq!(kids.len(), 2);
        assert_eq!(fx.tree.attr(kids[0], "unit"), Some("page"));
        assert_eq!(fx.tree.attr(kids[0], "n"), Some("3"));
        assert_eq!(fx.tree.attr(kids[1], "unit"), Some("line"));
        assert_eq!(fx.tree.attr(kids[1], "ed"), Some("3"));
        assert_eq!(fx.tree.attr(kids[1], "n"), Some("1"));
    }

    #[test]
    fn apparatus_replaces_braced_lemma() {
        let mut fx = Fixture::new();
        fx.notes
            .insert(Note::new(NoteKind::Footnote, "7", "Dg, Pk: bskad; Nk: *omits"));
        fx.fill(&[
            Run::plain("de nas sa{skad}"),
            Run::footnote_ref("7"),
            Run::plain(" gsungs"),
        ]);
        let root = fx.tree.root();
        assert_eq!(fx.tree.leading_text(root), "de nas sa");
        let app = fx.tree.first_child_named(root, "app").expect("app");
        assert_eq!(fx.tree.tail(app), " gsungs");
        let lem = fx.tree.first_child_named(app, "lem").expect("lem");
        assert_eq!(fx.tree.text_content(lem), "skad");
        assert_eq!(fx.tree.attr(lem, "wit"), Some("base"));
        assert_eq!(fx.tree.children(app).count(), 3);
        assert!(fx.diags.is_empty());
    }

    #[test]
    fn notes_are_looked_up_by_id() {
        let mut fx = Fixture::new();
        fx.notes.insert(Note::new(NoteKind::Footnote, "1", "first note"));
        fx.notes.insert(Note::new(NoteKind::Footnote, "2", "second note"));
        fx.fill(&[
            Run::plain("a"),
            Run::footnote_ref("2"),
            Run::plain("b"),
            Run::footnote_ref("1"),
        ]);
        let root = fx.tree.root();
        let notes: Vec<String> = fx
            .tree
            .children(root)
            .map(|n| fx.tree.text_content(n))
            .collect();
        assert_eq!(notes, vec!["second note", "first note"]);
    }

    #[test]
    fn missing_and_reused_notes() {
        let mut fx = Fixture::new();
        fx.notes.insert(Note::new(NoteKind::Footnote, "1", "once"));
        fx.fill(&[
            Run::footnote_ref("1"),
            Run::footnote_ref("1"),
            Run::footnote_ref("9"),
        ]);
        assert_eq!(fx.diags.count(DiagnosticKind::NoteReused), 1);
        assert_eq!(fx.diags.count(DiagnosticKind::MissingNote), 1);
    }

    #[test]
    fn malformed_lemma_is_marked() {
        let mut fx = Fixture::new();
        fx.notes.insert(Note::new(NoteKind::Footnote, "3", "Dg: bskad"));
        fx.fill(&[Run::plain("no brace}"), Run::footnote_ref("3")]);
        let root = fx.tree.root();
        assert_eq!(fx.diags.count(DiagnosticKind::MalformedLemma), 1);
        let app = fx.tree.first_child_named(root, "app").expect("app");
        let lem = fx.tree.first_child_named(app, "lem").expect("lem");
        assert_eq!(fx.tree.attr(lem, "type"), Some("needs-manual-fix"));
        assert_eq!(fx.tree.leading_text(root), "no brace");
    }

    #[test]
    fn plain_note_keeps_spans() {
        let mut fx = Fixture::new();
        let mut note = Note::new(NoteKind::Endnote, "1", "See chos");
        note.spans = vec![
            NoteSpan {
                text: "See ".into(),
                ..Default::default()
            },
            NoteSpan {
                text: "chos".into(),
                rend: vec!["weak".into()],
                lang: Some("tib".into()),
            },
        ];
        fx.notes.insert(note);
        let mut reference = Run::footnote_ref("1");
        if let Some(r) = reference.note.as_mut() {
            r.kind = NoteKind::Endnote;
        }
        fx.fill(&[Run::plain("text"), reference]);
        let root = fx.tree.root();
        let note = fx.tree.first_child_named(root, "note").expect("note");
        assert_eq!(fx.tree.attr(note, "type"), Some("endnote"));
        let hi = fx.tree.first_child_named(note, "hi").expect("hi");
        assert_eq!(fx.tree.attr(hi, "lang"), Some("tib"));
        assert_eq!(fx.tree.leading_text(note), "See ");
    }

    #[test]
    fn splice_into_marker_rises_to_parent() {
        let mut tree = Tree::new("rdg");
        let root = tree.root();
        let lb = tree.create("lb");
        tree.append_child(root, lb);
        let fragment = tree.create("temp");
        tree.push_text(fragment, "line two ");
        let hi = tree.create("hi");
        tree.append_child(fragment, hi);
        tree.push_text(fragment, " end");

        let current = splice(&mut tree, fragment, lb).expect("splice");
        assert_eq!(current, root);
        assert_eq!(tree.tail(lb), "line two ");
        assert_eq!(tree.children(root).collect::<Vec<_>>(), vec![lb, hi]);
        assert_eq!(tree.tail(hi), " end");
    }

    #[test]
    fn heading_numeral_becomes_num() {
        let mut tree = Tree::new("head");
        let head = tree.root();
        tree.push_text(head, "1.2. The path");
        capture_heading_number(&mut tree, head);
        let num = tree.first_child_named(head, "num").expect("num");
        assert_eq!(tree.text_content(num), "1.2.");
        assert_eq!(tree.tail(num), " The path");
        assert_eq!(tree.leading_text(head), "");
    }
}
