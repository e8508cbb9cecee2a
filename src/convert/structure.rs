//! Ancestor stack and current-position state machine.
//!
//! `head_stack[0]` is the open front/body/back element and each further entry is one heading
//! level deeper. `current` is where the next paragraph's run content goes; it can sit at any
//! depth below the top of the stack.

use crate::convert::classify::{
    list_level, BlockStyle, Division, ListKind, ParaKind, SectionKind, VerseStyle,
};
use crate::diag::{DiagnosticKind, Diagnostics};
use crate::error::ConvertError;
use crate::tree::{NodeId, Tree};

/// Result of positioning one paragraph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// Run content goes into this element.
    Fill(NodeId),
    /// The paragraph is complete; its runs are not rendered.
    Done,
}

pub struct StructureBuilder {
    text: NodeId,
    head_stack: Vec<NodeId>,
    current: Option<NodeId>,
    previous_style: String,
}

impl StructureBuilder {
    /// `text` is the element top-level divisions are appended to.
    pub fn new(text: NodeId) -> Self {
        Self {
            text,
            head_stack: Vec::new(),
            current: None,
            previous_style: String::new(),
        }
    }

    pub fn text(&self) -> NodeId {
        self.text
    }

    pub fn head_stack(&self) -> &[NodeId] {
        &self.head_stack
    }

    pub fn depth(&self) -> usize {
        self.head_stack.len().saturating_sub(1)
    }

    pub fn current(&self) -> Option<NodeId> {
        self.current
    }

    pub fn set_current(&mut self, id: NodeId) {
        self.current = Some(id);
    }

    pub fn has_division(&self) -> bool {
        !self.head_stack.is_empty()
    }

    pub fn previous_style(&self) -> &str {
        &self.previous_style
    }

    /// Record the style of a paragraph that has been handled, whatever its outcome.
    pub fn advance(&mut self, style: &str) {
        self.previous_style = style.to_string();
    }

    fn top(&self, heading: &str) -> Result<NodeId, ConvertError> {
        self.head_stack
            .last()
            .copied()
            .ok_or_else(|| ConvertError::EmptyHeadStack {
                heading: heading.to_string(),
            })
    }

    fn current_or_top(&self) -> Result<NodeId, ConvertError> {
        match self.current {
            Some(c) => Ok(c),
            None => self.top(""),
        }
    }

    /// Insert `new` after `anchor`, or append it when `anchor` is an open stack entry.
    fn place_after(&self, tree: &mut Tree, anchor: NodeId, new: NodeId) -> Result<(), ConvertError> {
        if tree.parent(anchor).is_none() || self.head_stack.contains(&anchor) {
            tree.append_child(anchor, new);
            Ok(())
        } else {
            tree.insert_after(anchor, new)
        }
    }

    /// Position a classified paragraph. `text` is the paragraph's plain text.
    pub fn place(
        &mut self,
        tree: &mut Tree,
        diags: &mut Diagnostics,
        style: &str,
        kind: &ParaKind,
        text: &str,
    ) -> Result<Placement, ConvertError> {
        match kind {
            ParaKind::Heading { level, division } => {
                let level = match *level {
                    Some(l) => l,
                    None => {
                        let kept = self.depth().max(1) as u32;
                        diags.report(
                            DiagnosticKind::InvalidHeadingLevel,
                            format!("heading style '{style}' has no usable level; kept level {kept}"),
                        );
                        kept
                    }
                };
                let division = match (level, division) {
                    (0, None) => {
                        diags.report(
                            DiagnosticKind::MissingDivisionTag,
                            format!("level-0 heading style '{style}' has no front/body/back tag; using body"),
                        );
                        Some(Division::Body)
                    }
                    (_, d) => *d,
                };
                self.heading(tree, diags, level, division, text).map(Placement::Fill)
            }
            ParaKind::List { level, kind } => {
                self.list(tree, diags, *level, *kind).map(Placement::Fill)
            }
            ParaKind::Verse(v) => self.verse(tree, style, *v).map(Placement::Fill),
            ParaKind::Citation(c) => self.citation(tree, style, *c).map(Placement::Fill),
            ParaKind::Section(s) => self.section(tree, diags, s, text),
            ParaKind::Speech(s) => self.speech(tree, *s).map(Placement::Fill),
            ParaKind::Paragraph { regular } => {
                if !regular {
                    diags.report(
                        DiagnosticKind::DefaultedParagraphStyle,
                        format!("style '{style}' defaulting to paragraph"),
                    );
                }
                self.reset_current(tree);
                self.paragraph(tree, text)
            }
        }
    }

    pub fn heading(
        &mut self,
        tree: &mut Tree,
        diags: &mut Diagnostics,
        level: u32,
        division: Option<Division>,
        label: &str,
    ) -> Result<NodeId, ConvertError> {
        let head = tree.create("head");
        if level == 0 {
            let tag = division.unwrap_or(Division::Body).tag();
            let division_el = tree.create(tag);
            tree.append_child(division_el, head);
            tree.append_child(self.text, division_el);
            self.head_stack = vec![division_el];
            self.current = Some(head);
            return Ok(head);
        }

        let level_str = level.to_string();
        let div = tree.create_with_attrs("div", &[("n", &level_str)]);
        tree.append_child(div, head);

        let level = level as usize;
        let depth = self.head_stack.len() as isize - 1;
        if level as isize > depth {
            let top = self.top(label)?;
            if level as isize - depth > 1 {
                diags.report(
                    DiagnosticKind::SkippedHeadingLevel,
                    format!("heading level {level} follows depth {depth}: {label}"),
                );
            }
            tree.append_child(top, div);
            self.head_stack.push(div);
        } else if level as isize == depth {
            let top = self.top(label)?;
            tree.insert_after(top, div)?;
            if let Some(slot) = self.head_stack.last_mut() {
                *slot = div;
            }
        } else {
            self.head_stack.truncate(level);
            let top = self.top(label)?;
            tree.append_child(top, div);
            self.head_stack.push(div);
        }
        self.current = Some(head);
        Ok(head)
    }

    pub fn list(
        &mut self,
        tree: &mut Tree,
        diags: &mut Diagnostics,
        level: u32,
        kind: ListKind,
    ) -> Result<NodeId, ConvertError> {
        let current = self.current_or_top()?;
        let previous = list_level(&self.previous_style);
        let item = tree.create("item");

        if previous == 0 {
            if level > 1 {
                diags.report(
                    DiagnosticKind::ListOutsideList,
                    format!("list level {level} added when not in a list"),
                );
            }
            let list = new_list(tree, kind);
            tree.append_child(list, item);
            self.place_after(tree, current, list)?;
        } else if level > previous {
            if level > previous + 1 {
                diags.report(
                    DiagnosticKind::SkippedListLevel,
                    format!("list level {level} follows level {previous}"),
                );
            }
            let list = new_list(tree, kind);
            tree.append_child(list, item);
            if tree.is(current, "item") {
                tree.append_child(current, list);
            } else {
                self.place_after(tree, current, list)?;
            }
        } else if level == previous {
            if tree.is(current, "item") {
                tree.insert_after(current, item)?;
            } else {
                let list = new_list(tree, kind);
                tree.append_child(list, item);
                self.place_after(tree, current, list)?;
            }
        } else {
            match ancestor_list(tree, current, previous, level) {
                Some(list) => tree.append_child(list, item),
                None => {
                    diags.report(
                        DiagnosticKind::ListOutsideList,
                        format!("no enclosing list at level {level}; using the outermost list"),
                    );
                    let outer = tree
                        .ancestors(current)
                        .filter(|a| tree.is(*a, "list"))
                        .last();
                    match outer {
                        Some(list) => tree.append_child(list, item),
                        None => {
                            let list = new_list(tree, kind);
                            tree.append_child(list, item);
                            self.place_after(tree, current, list)?;
                        }
                    }
                }
            }
        }
        self.current = Some(item);
        Ok(item)
    }

    pub fn verse(
        &mut self,
        tree: &mut Tree,
        style_name: &str,
        style: VerseStyle,
    ) -> Result<NodeId, ConvertError> {
        let current = self.current_or_top()?;
        let prev = self.previous_style.to_lowercase();

        if style.level2 {
            let line = tree.create("l");
            let anchor = match tree.parent(current) {
                Some(parent) if !style.nested && prev.contains("nested") => parent,
                _ => current,
            };
            self.place_after(tree, anchor, line)?;
            self.current = Some(line);
            return Ok(line);
        }

        let (group, line) = line_group(tree);
        if style.citation {
            let same_family =
                prev.replace('2', "1") == style_name.to_lowercase().replace('2', "1");
            if same_family {
                let anchor = tree.parent(current).unwrap_or(current);
                self.place_after(tree, anchor, group)?;
            } else if style.nested && prev.contains("citation") && prev.contains("paragraph") {
                self.place_after(tree, current, group)?;
            } else {
                let quote = tree.create("quote");
                tree.append_child(quote, group);
                if style.nested {
                    tree.append_child(current, quote);
                } else {
                    let top = self.top("")?;
                    tree.append_child(top, quote);
                }
            }
        } else if style.nested {
            self.place_after(tree, current, group)?;
        } else {
            let top = self.top("")?;
            if style.speech {
                let q = tree.create("q");
                tree.append_child(q, group);
                tree.append_child(top, q);
            } else {
                tree.append_child(top, group);
            }
        }
        self.current = Some(line);
        Ok(line)
    }

    pub fn citation(
        &mut self,
        tree: &mut Tree,
        style_name: &str,
        style: BlockStyle,
    ) -> Result<NodeId, ConvertError> {
        let current = self.current_or_top()?;
        let prev = self.previous_style.to_lowercase();

        if style.continued || (style.nested && style_name == self.previous_style) {
            let p = tree.create_with_attrs("p", &[("rend", "cont")]);
            let anchor = match tree.parent(current) {
                Some(parent) if prev.contains("verse") => parent,
                _ => current,
            };
            self.place_after(tree, anchor, p)?;
            self.current = Some(p);
            return Ok(p);
        }

        let quote = tree.create("quote");
        let p = tree.create("p");
        tree.append_child(quote, p);
        if style.nested {
            tree.append_child(current, quote);
        } else {
            let anchor = match tree.parent(current) {
                Some(parent) if prev.contains("nested") => parent,
                _ => current,
            };
            self.place_after(tree, anchor, quote)?;
        }
        self.current = Some(p);
        Ok(p)
    }

    pub fn section(
        &mut self,
        tree: &mut Tree,
        diags: &mut Diagnostics,
        kind: &SectionKind,
        text: &str,
    ) -> Result<Placement, ConvertError> {
        let top = self.top(text)?;
        let milestone_n = match kind {
            SectionKind::Numbered(n) => Some(n.as_str()),
            SectionKind::ChapterElement => Some("cle"),
            SectionKind::Interstitial | SectionKind::Unknown => None,
        };
        if let Some(n) = milestone_n {
            let ms = tree.create_with_attrs(
                "milestone",
                &[("unit", "section"), ("n", n), ("rend", text)],
            );
            tree.append_child(top, ms);
            self.current = Some(ms);
            return Ok(Placement::Done);
        }

        let div_type = if *kind == SectionKind::Interstitial {
            "interstitial"
        } else {
            diags.report(
                DiagnosticKind::UnknownSectionStyle,
                format!("unknown section type with header: {text}"),
            );
            "section"
        };
        let div = tree.create_with_attrs("div", &[("type", div_type)]);
        let head = tree.create("head");
        tree.append_child(div, head);
        tree.append_child(top, div);
        self.current = Some(head);
        Ok(Placement::Fill(head))
    }

    pub fn speech(&mut self, tree: &mut Tree, style: BlockStyle) -> Result<NodeId, ConvertError> {
        let mut current = self.current_or_top()?;
        let prev = self.previous_style.to_lowercase();

        if style.continued {
            let p = tree.create_with_attrs("p", &[("rend", "cont")]);
            let anchor = match tree.parent(current) {
                Some(parent) if prev.contains("nested") && !style.nested => parent,
                _ => current,
            };
            self.place_after(tree, anchor, p)?;
            self.current = Some(p);
            return Ok(p);
        }

        let q = tree.create("q");
        let p = tree.create("p");
        tree.append_child(q, p);
        if !style.nested {
            // speech never sits inside a line group or a list
            if tree.is(current, "l") {
                current = outermost_ancestor(tree, current, "lg")
                    .or_else(|| tree.parent(current))
                    .unwrap_or(current);
            }
            if tree.is(current, "item") {
                current = outermost_ancestor(tree, current, "list")
                    .or_else(|| tree.parent(current))
                    .unwrap_or(current);
            }
        }
        self.place_after(tree, current, q)?;
        self.current = Some(p);
        Ok(p)
    }

    /// Point `current` at the last element of the open division, leaving nested groups.
    pub fn reset_current(&mut self, tree: &Tree) {
        if let Some(top) = self.head_stack.last().copied() {
            self.current = Some(tree.last_child(top).unwrap_or(top));
        }
    }

    /// A plain paragraph after `current`. Blank paragraphs produce nothing.
    pub fn paragraph(&mut self, tree: &mut Tree, text: &str) -> Result<Placement, ConvertError> {
        if text.trim().is_empty() {
            return Ok(Placement::Done);
        }
        let current = self.current_or_top()?;
        let p = tree.create("p");
        if tree.is(current, "div") {
            tree.append_child(current, p);
        } else {
            self.place_after(tree, current, p)?;
        }
        self.current = Some(p);
        Ok(Placement::Fill(p))
    }
}

fn new_list(tree: &mut Tree, kind: ListKind) -> NodeId {
    match kind {
        ListKind::Bullet => tree.create_with_attrs("list", &[("rend", "bullet")]),
        ListKind::Numbered => tree.create_with_attrs("list", &[("rend", "1"), ("n", "1")]),
    }
}

fn line_group(tree: &mut Tree) -> (NodeId, NodeId) {
    let group = tree.create("lg");
    let line = tree.create("l");
    tree.append_child(group, line);
    (group, line)
}

/// Walk up from an item at `from` to the list holding items at level `to`.
fn ancestor_list(tree: &Tree, current: NodeId, from: u32, to: u32) -> Option<NodeId> {
    let mut level = from;
    let mut node = tree.parent(current)?;
    while level != to {
        node = tree.parent(node)?;
        if tree.is(node, "list") {
            level -= 1;
        }
    }
    tree.is(node, "list").then_some(node)
}

fn outermost_ancestor(tree: &Tree, id: NodeId, tag: &str) -> Option<NodeId> {
    tree.ancestors(id).filter(|a| tree.is(*a, tag)).last()
}
