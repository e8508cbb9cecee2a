use crate::convert::classify::Division;
use crate::tree::{NodeId, Tree};

/// 1-based position of `id` among the `div` siblings up to and including itself.
fn div_position(tree: &Tree, id: NodeId) -> usize {
    let Some(parent) = tree.parent(id) else {
        return 1;
    };
    tree.children(parent)
        .filter(|c| tree.is(*c, "div"))
        .take_while(|c| *c != id)
        .count()
        + 1
}

fn div_id(tree: &Tree, div: NodeId, chapter_number: Option<&str>) -> Option<String> {
    let mut parts = vec![div_position(tree, div).to_string()];
    let mut letter = None;
    for anc in tree.ancestors(div) {
        if let Some(l) = Division::letter(tree.tag(anc)) {
            letter = Some(l);
            break;
        }
        if tree.is(anc, "div") {
            parts.push(div_position(tree, anc).to_string());
        }
    }
    let letter = letter?;
    parts.reverse();
    if let Some(chapter) = chapter_number.filter(|c| !c.is_empty()) {
        parts[0] = chapter.to_string();
    }
    Some(format!("{letter}{}", parts.join("-")))
}

/// Give every `div` below the front/body/back divisions of `text` its hierarchical id.
pub fn assign_ids(tree: &mut Tree, text: NodeId, chapter_number: Option<&str>) -> usize {
    let divs: Vec<NodeId> = tree
        .descendants(text)
        .into_iter()
        .filter(|n| tree.is(*n, "div"))
        .collect();
    let mut assigned = 0;
    for div in divs {
        if let Some(id) = div_id(tree, div, chapter_number) {
            tree.set_attr(div, "id", &id);
            assigned += 1;
        }
    }
    assigned
}
