//! Arena-backed markup tree with interleaved text/element content.
//!
//! Every element owns an ordered list of [`Segment`]s. The text that follows a child element
//! inside its parent (its "tail") is simply the `Text` segment right after the `Child` segment.

use crate::error::ConvertError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Child(NodeId),
    Comment(String),
    /// Reference to an entity declared in the document type, written as `&name;`.
    Entity(String),
}

#[derive(Clone, Debug)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub parent: Option<NodeId>,
    pub content: Vec<Segment>,
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attrs: Vec::new(),
            parent: None,
            content: Vec::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Tree {
    nodes: Vec<Element>,
    root: NodeId,
}

impl Tree {
    pub fn new(root_tag: &str) -> Self {
        Self {
            nodes: vec![Element::new(root_tag)],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn get(&self, id: NodeId) -> &Element {
        &self.nodes[id.index()]
    }

    fn get_mut(&mut self, id: NodeId) -> &mut Element {
        &mut self.nodes[id.index()]
    }

    /// Allocate a detached element.
    pub fn create(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Element::new(tag));
        id
    }

    pub fn create_with_attrs(&mut self, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let id = self.create(tag);
        for (k, v) in attrs {
            self.set_attr(id, k, v);
        }
        id
    }

    pub fn tag(&self, id: NodeId) -> &str {
        &self.get(id).tag
    }

    pub fn is(&self, id: NodeId, tag: &str) -> bool {
        self.get(id).tag == tag
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.get(id)
            .attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        let attrs = &mut self.get_mut(id).attrs;
        if let Some(slot) = attrs.iter_mut().find(|(k, _)| k == name) {
            slot.1 = value.to_string();
        } else {
            attrs.push((name.to_string(), value.to_string()));
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).parent
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.get(id).content.iter().filter_map(|s| match s {
            Segment::Child(c) => Some(*c),
            _ => None,
        })
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).content.iter().rev().find_map(|s| match s {
            Segment::Child(c) => Some(*c),
            _ => None,
        })
    }

    pub fn has_children(&self, id: NodeId) -> bool {
        self.last_child(id).is_some()
    }

    pub fn first_child_named(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        self.children(id).find(|c| self.is(*c, tag))
    }

    /// Ancestors of `id`, nearest first (excluding `id`).
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.parent(id),
        }
    }

    pub fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        ancestor == id || self.ancestors(id).any(|a| a == ancestor)
    }

    /// Depth-first pre-order walk starting at (and including) `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            out.push(cur);
            let mut kids: Vec<NodeId> = self.children(cur).collect();
            kids.reverse();
            stack.extend(kids);
        }
        out
    }

    pub fn find_descendant(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        self.descendants(id).into_iter().find(|n| self.is(*n, tag))
    }

    /// Text before the first child element.
    pub fn leading_text(&self, id: NodeId) -> &str {
        match self.get(id).content.first() {
            Some(Segment::Text(t)) => t.as_str(),
            _ => "",
        }
    }

    pub fn set_leading_text(&mut self, id: NodeId, text: &str) {
        let content = &mut self.get_mut(id).content;
        let has_leading = matches!(content.first(), Some(Segment::Text(_)));
        match (has_leading, text.is_empty()) {
            (true, true) => {
                content.remove(0);
            }
            (true, false) => content[0] = Segment::Text(text.to_string()),
            (false, false) => content.insert(0, Segment::Text(text.to_string())),
            (false, true) => {}
        }
    }

    /// Append text at the end of `id`'s content: the leading text when there are no children,
    /// otherwise the tail of the last child.
    pub fn push_text(&mut self, id: NodeId, text: &str) {
        if text.is_empty() {
            return;
        }
        let content = &mut self.get_mut(id).content;
        if let Some(Segment::Text(t)) = content.last_mut() {
            t.push_str(text);
        } else {
            content.push(Segment::Text(text.to_string()));
        }
    }

    pub fn push_comment(&mut self, id: NodeId, text: &str) {
        self.get_mut(id).content.push(Segment::Comment(text.to_string()));
    }

    pub fn push_entity(&mut self, id: NodeId, name: &str) {
        self.get_mut(id).content.push(Segment::Entity(name.to_string()));
    }

    /// Replace element `id` in its parent by an entity reference.
    pub fn replace_with_entity(&mut self, id: NodeId, name: &str) {
        if let Some((parent, pos)) = self.position_in_parent(id) {
            self.get_mut(parent).content[pos] = Segment::Entity(name.to_string());
        }
        self.get_mut(id).parent = None;
    }

    /// Text at the very end of `id`'s content.
    pub fn trailing_text(&self, id: NodeId) -> &str {
        match self.get(id).content.last() {
            Some(Segment::Text(t)) => t.as_str(),
            _ => "",
        }
    }

    pub fn set_trailing_text(&mut self, id: NodeId, text: &str) {
        let content = &mut self.get_mut(id).content;
        let has_trailing = matches!(content.last(), Some(Segment::Text(_)));
        match (has_trailing, text.is_empty()) {
            (true, true) => {
                content.pop();
            }
            (true, false) => {
                if let Some(last) = content.last_mut() {
                    *last = Segment::Text(text.to_string());
                }
            }
            (false, false) => content.push(Segment::Text(text.to_string())),
            (false, true) => {}
        }
    }

    fn position_in_parent(&self, id: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.parent(id)?;
        let pos = self
            .get(parent)
            .content
            .iter()
            .position(|s| *s == Segment::Child(id))?;
        Some((parent, pos))
    }

    pub fn tail(&self, id: NodeId) -> &str {
        match self.position_in_parent(id) {
            Some((parent, pos)) => match self.get(parent).content.get(pos + 1) {
                Some(Segment::Text(t)) => t.as_str(),
                _ => "",
            },
            None => "",
        }
    }

    pub fn set_tail(&mut self, id: NodeId, text: &str) {
        let Some((parent, pos)) = self.position_in_parent(id) else {
            return;
        };
        let content = &mut self.get_mut(parent).content;
        let has_tail = matches!(content.get(pos + 1), Some(Segment::Text(_)));
        match (has_tail, text.is_empty()) {
            (true, true) => {
                content.remove(pos + 1);
            }
            (true, false) => content[pos + 1] = Segment::Text(text.to_string()),
            (false, false) => content.insert(pos + 1, Segment::Text(text.to_string())),
            (false, true) => {}
        }
    }

    /// Remove `id` from its parent, keeping its tail text in place.
    pub fn detach(&mut self, id: NodeId) {
        if let Some((parent, pos)) = self.position_in_parent(id) {
            self.get_mut(parent).content.remove(pos);
            self.merge_text_at(parent, pos);
        }
        self.get_mut(id).parent = None;
    }

    fn merge_text_at(&mut self, parent: NodeId, pos: usize) {
        if pos == 0 {
            return;
        }
        let content = &mut self.get_mut(parent).content;
        let both_text = matches!(
            (content.get(pos - 1), content.get(pos)),
            (Some(Segment::Text(_)), Some(Segment::Text(_)))
        );
        if !both_text {
            return;
        }
        if let Segment::Text(next) = content.remove(pos) {
            if let Some(Segment::Text(prev)) = content.get_mut(pos - 1) {
                prev.push_str(&next);
            }
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if self.parent(child).is_some() {
            self.detach(child);
        }
        self.get_mut(child).parent = Some(parent);
        self.get_mut(parent).content.push(Segment::Child(child));
    }

    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        if self.parent(child).is_some() {
            self.detach(child);
        }
        self.get_mut(child).parent = Some(parent);
        self.get_mut(parent).content.insert(0, Segment::Child(child));
    }

    /// Insert `new` as the following sibling of `anchor`, after the anchor's tail text.
    pub fn insert_after(&mut self, anchor: NodeId, new: NodeId) -> Result<(), ConvertError> {
        if self.parent(new).is_some() {
            self.detach(new);
        }
        let (parent, pos) = self
            .position_in_parent(anchor)
            .ok_or_else(|| ConvertError::Detached {
                tag: self.tag(anchor).to_string(),
            })?;
        let mut at = pos + 1;
        if let Some(Segment::Text(_)) = self.get(parent).content.get(at) {
            at += 1;
        }
        self.get_mut(new).parent = Some(parent);
        self.get_mut(parent).content.insert(at, Segment::Child(new));
        Ok(())
    }

    /// Move all content of `from` to the end of `to`. `from` is left empty.
    pub fn move_content(&mut self, from: NodeId, to: NodeId) {
        let segments = std::mem::take(&mut self.get_mut(from).content);
        for seg in segments {
            match seg {
                Segment::Text(t) => self.push_text(to, &t),
                Segment::Child(c) => {
                    self.get_mut(c).parent = Some(to);
                    self.get_mut(to).content.push(Segment::Child(c));
                }
                Segment::Comment(c) => self.push_comment(to, &c),
                Segment::Entity(e) => self.push_entity(to, &e),
            }
        }
    }

    /// Concatenated text of `id` and its descendants, excluding tails of `id` itself.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        for seg in &self.get(id).content {
            match seg {
                Segment::Text(t) => out.push_str(t),
                Segment::Child(c) => self.collect_text(*c, out),
                Segment::Comment(_) | Segment::Entity(_) => {}
            }
        }
    }
}

pub struct Ancestors<'a> {
    tree: &'a Tree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.next?;
        self.next = self.tree.parent(cur);
        Some(cur)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_after_keeps_anchor_tail() {
        let mut tree = Tree::new("p");
        let root = tree.root();
        let a = tree.create("a");
        tree.append_child(root, a);
        tree.set_tail(a, " after a");
        let b = tree.create("b");
        tree.insert_after(a, b).expect("insert");

        assert_eq!(tree.tail(a), " after a");
        assert_eq!(tree.children(root).collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(tree.tail(b), "");
    }

    #[test]
    fn insert_after_detached_anchor_is_error() {
        let mut tree = Tree::new("p");
        let a = tree.create("a");
        let b = tree.create("b");
        assert!(matches!(
            tree.insert_after(a, b),
            Err(ConvertError::Detached { .. })
        ));
    }

    #[test]
    fn push_text_goes_to_tail_of_last_child() {
        let mut tree = Tree::new("p");
        let root = tree.root();
        tree.push_text(root, "lead ");
        let hi = tree.create("hi");
        tree.append_child(root, hi);
        tree.push_text(hi, "bold");
        tree.push_text(root, " tail");
        tree.push_text(root, "!");

        assert_eq!(tree.leading_text(root), "lead ");
        assert_eq!(tree.tail(hi), " tail!");
        assert_eq!(tree.text_content(root), "lead bold tail!");
    }

    #[test]
    fn detach_merges_surrounding_text() {
        let mut tree = Tree::new("p");
        let root = tree.root();
        tree.push_text(root, "x");
        let a = tree.create("a");
        tree.append_child(root, a);
        tree.push_text(root, "y");
        tree.detach(a);

        assert_eq!(tree.get(root).content, vec![Segment::Text("xy".to_string())]);
        assert!(tree.parent(a).is_none());
    }

    #[test]
    fn move_content_joins_text() {
        let mut tree = Tree::new("div");
        let root = tree.root();
        let head = tree.create("head");
        tree.append_child(root, head);
        tree.push_text(head, "Title ");

        let temp = tree.create("temp");
        tree.push_text(temp, "continues");
        let num = tree.create("num");
        tree.append_child(temp, num);
        tree.move_content(temp, head);

        assert_eq!(tree.leading_text(head), "Title continues");
        assert_eq!(tree.parent(num), Some(head));
        assert!(!tree.has_children(temp));
    }

    #[test]
    fn trailing_text_is_end_of_content() {
        let mut tree = Tree::new("p");
        let root = tree.root();
        tree.push_text(root, "lead");
        assert_eq!(tree.trailing_text(root), "lead");
        let hi = tree.create("hi");
        tree.append_child(root, hi);
        assert_eq!(tree.trailing_text(root), "");
        tree.set_trailing_text(root, "tail{x}");
        assert_eq!(tree.tail(hi), "tail{x}");
        tree.set_trailing_text(root, "tail");
        assert_eq!(tree.tail(hi), "tail");
        assert_eq!(tree.leading_text(root), "lead");
    }

    #[test]
    fn ancestors_nearest_first() {
        let mut tree = Tree::new("TEI.2");
        let root = tree.root();
        let text = tree.create("text");
        let body = tree.create("body");
        tree.append_child(root, text);
        tree.append_child(text, body);

        assert_eq!(tree.ancestors(body).collect::<Vec<_>>(), vec![text, root]);
        assert!(tree.is_ancestor_or_self(root, body));
        assert!(!tree.is_ancestor_or_self(body, text));
    }
}
