//! Sequential page and line numbers for the milestones of a converted document.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ConvertError;
use crate::tree::Tree;

static STEM_START_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"text-p(\d+)-\d+$").expect("stem start regex"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageNumbering {
    /// Number given to the first page milestone.
    pub start: u64,
    /// Add a `<page>.1` line milestone after every page milestone.
    pub first_line: bool,
}

impl Default for PageNumbering {
    fn default() -> Self {
        Self {
            start: 1,
            first_line: false,
        }
    }
}

/// First page number carried by a `...text-pNN-MM` file stem.
pub fn start_from_stem(stem: &str) -> Option<u64> {
    STEM_START_RE
        .captures(stem)
        .and_then(|c| c[1].parse().ok())
}

/// Renumber every page and line milestone in document order. Pages count up from
/// `numbering.start`, shifted by a numeric `rend` on the root; lines restart at each page as
/// `<page>.<line>`. Milestones of other units are left alone. Returns the number of
/// milestones numbered, including inserted first lines.
pub fn number_milestones(tree: &mut Tree, numbering: PageNumbering) -> Result<usize, ConvertError> {
    let root = tree.root();
    let offset: u64 = tree
        .attr(root, "rend")
        .and_then(|r| r.parse().ok())
        .unwrap_or(0);
    let milestones: Vec<_> = tree
        .descendants(root)
        .into_iter()
        .filter(|n| tree.is(*n, "milestone"))
        .collect();

    let line_unit = milestones
        .iter()
        .filter_map(|ms| tree.attr(*ms, "unit"))
        .find(|u| u.to_lowercase().contains("line"))
        .unwrap_or("line")
        .to_string();

    let mut page = (numbering.start + offset).saturating_sub(1);
    let mut line = 0u64;
    let mut numbered = 0;
    for ms in milestones {
        let unit = tree.attr(ms, "unit").unwrap_or_default().to_lowercase();
        if unit.contains("page") {
            page += 1;
            line = 0;
            tree.set_attr(ms, "n", &page.to_string());
            numbered += 1;
            if numbering.first_line {
                let first = tree.create_with_attrs(
                    "milestone",
                    &[("unit", line_unit.as_str()), ("n", &format!("{page}.1"))],
                );
                // the page's tail text belongs to its first line
                let tail = tree.tail(ms).to_string();
                tree.set_tail(ms, "");
                tree.insert_after(ms, first)?;
                tree.set_tail(first, &tail);
                line = 1;
                numbered += 1;
            }
        } else if unit.contains("line") {
            line += 1;
            tree.set_attr(ms, "n", &format!("{page}.{line}"));
            numbered += 1;
        }
    }
    debug!("{numbered} milestones numbered, last page {page}");
    Ok(numbered)
}
