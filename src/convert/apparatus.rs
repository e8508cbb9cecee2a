//! Critical-apparatus notes: lemma extraction from the running text and the variant grammar
//! of the note body.
//!
//! A note body is a `;`-separated list of clauses, one per edition group:
//!
//! ```text
//! Dg, Pk(12a): bskad; Nk: *omits [editor's remark]. free interpretation
//! ```
//!
//! A clause without a reading names the lemma's own witnesses.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::tree::{NodeId, Tree};

const SIGIL: &str = r"[A-Z][A-Za-z0-9_.]*(?:\s*\([^)]*\))?";

static CLAUSE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(?P<sigla>{SIGIL}(?:\s*,\s*{SIGIL})*)\s*(?::\s*(?P<colon>.*)|\s+(?P<free>.+))?$"
    ))
    .expect("clause regex")
});

static STRICT_CLAUSE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^\*?\s*{SIGIL}\s*\*?(?:\s*,\s*\*?\s*{SIGIL}\s*\*?)*\s*(?::.*)?$"
    ))
    .expect("strict clause regex")
});

static SIGIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^(]*)(?:\(([^)]*)\)?)?").expect("sigil regex"));

static REMARK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\[\]]*)\]\s*$").expect("remark regex"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Marker {
    Omit,
    Illegible,
    Unclear,
    Corrupt,
}

impl Marker {
    fn from_reading(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "omit" | "omits" => Some(Self::Omit),
            "illegible" => Some(Self::Illegible),
            "unclear" => Some(Self::Unclear),
            "corrupt" => Some(Self::Corrupt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Omit => "omit",
            Self::Illegible => "illegible",
            Self::Unclear => "unclear",
            Self::Corrupt => "corrupt",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reading {
    Text(String),
    Marker(Marker),
}

/// Space-joined sigla and their page references, as written to `wit` and `n`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Witnesses {
    pub sigla: String,
    pub pages: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Variant {
    pub witnesses: Witnesses,
    pub preferred: bool,
    pub reading: Reading,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NoteAnalysis {
    /// Witnesses named by a clause without a reading.
    pub lemma_witnesses: Option<Witnesses>,
    /// Raw text of that clause.
    pub lemma_clause: Option<String>,
    pub variants: Vec<Variant>,
    pub remark: Option<String>,
    pub interpretation: Option<String>,
    /// Clauses matched by neither the pattern nor a colon split.
    pub unparsed: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LemmaSplit {
    /// Back-text ends in `{lemma}`; `retained` is the text before the opening brace.
    Found { retained: String, lemma: String },
    /// Back-text ends in `}` but has no opening brace.
    Malformed { retained: String },
    NotApparatus,
}

pub fn split_lemma(back_text: &str) -> LemmaSplit {
    let trimmed = back_text.trim_end();
    let Some(before_close) = trimmed.strip_suffix('}') else {
        return LemmaSplit::NotApparatus;
    };
    match before_close.rfind('{') {
        Some(open) => LemmaSplit::Found {
            retained: before_close[..open].to_string(),
            lemma: before_close[open + 1..].trim().to_string(),
        },
        None => LemmaSplit::Malformed {
            retained: before_close.to_string(),
        },
    }
}

/// Separate the trailing `[remark]` and the interpretation after the first ". ".
fn split_remarks(text: &str) -> (String, Option<String>, Option<String>) {
    let mut body = text.trim().to_string();
    let mut remark = None;
    let found = REMARK_RE
        .captures(&body)
        .map(|m| (m.get(0).map_or(0, |g| g.start()), m[1].trim().to_string()));
    if let Some((start, text)) = found {
        remark = Some(text);
        body.truncate(start);
    }
    let mut interpretation = None;
    if let Some(idx) = body.find(". ") {
        let rest = body[idx + 2..].trim().to_string();
        if !rest.is_empty() {
            interpretation = Some(rest);
        }
        body.truncate(idx);
    }
    let body = body.trim().trim_end_matches('.').trim().to_string();
    (body, remark.filter(|r| !r.is_empty()), interpretation)
}

/// Whether a note's own text reads as a variant listing.
pub fn is_annotation_text(text: &str) -> bool {
    let (body, _, _) = split_remarks(text);
    if body.is_empty() {
        return false;
    }
    body.split(';')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .all(|clause| STRICT_CLAUSE_RE.is_match(clause))
}

fn parse_witnesses(list: &str) -> Witnesses {
    let mut sigla: Vec<String> = Vec::new();
    let mut pages: Vec<String> = Vec::new();
    for token in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let (name, page) = match SIGIL_RE.captures(token) {
            Some(caps) => (
                caps.get(1).map(|m| m.as_str().trim()).unwrap_or(token),
                caps.get(2).map(|m| m.as_str().trim()).unwrap_or(""),
            ),
            None => (token, ""),
        };
        if !name.is_empty() {
            sigla.push(name.to_string());
        }
        if !page.is_empty() {
            pages.push(page.to_string());
        }
    }
    Witnesses {
        sigla: sigla.join(" "),
        pages: pages.join(" "),
    }
}

pub fn parse_annotation(text: &str) -> NoteAnalysis {
    let (body, remark, interpretation) = split_remarks(text);
    let mut analysis = NoteAnalysis {
        remark,
        interpretation,
        ..Default::default()
    };

    for raw in body.split(';') {
        let preferred = raw.contains('*');
        let clause = raw.replace('*', "");
        let clause = clause.trim();
        if clause.is_empty() {
            continue;
        }

        let (sigla, reading) = if let Some(caps) = CLAUSE_RE.captures(clause) {
            let reading = caps
                .name("colon")
                .or_else(|| caps.name("free"))
                .map(|m| m.as_str().trim().to_string());
            (caps["sigla"].to_string(), reading)
        } else if let Some((sigla, reading)) = clause.split_once(':') {
            (sigla.to_string(), Some(reading.trim().to_string()))
        } else {
            analysis.unparsed.push(clause.to_string());
            (clause.to_string(), None)
        };

        let witnesses = parse_witnesses(&sigla);
        match reading.filter(|r| !r.is_empty()) {
            None => {
                analysis.lemma_witnesses = Some(witnesses);
                analysis.lemma_clause = Some(sigla.trim().to_string());
            }
            Some(text) => {
                let reading = match Marker::from_reading(&text) {
                    Some(marker) => Reading::Marker(marker),
                    None => Reading::Text(text),
                };
                analysis.variants.push(Variant {
                    witnesses,
                    preferred,
                    reading,
                });
            }
        }
    }
    analysis
}

/// Lemma state of a rendered apparatus group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lemma {
    Text(String),
    NeedsManualFix,
}

pub fn render_variant(tree: &mut Tree, variant: &Variant) -> NodeId {
    let rdg = tree.create_with_attrs("rdg", &[("wit", &variant.witnesses.sigla)]);
    if !variant.witnesses.pages.is_empty() {
        tree.set_attr(rdg, "n", &variant.witnesses.pages);
    }
    if variant.preferred {
        tree.set_attr(rdg, "rend", "pref");
    }
    match &variant.reading {
        Reading::Text(text) => tree.push_text(rdg, text),
        Reading::Marker(marker) => tree.set_attr(rdg, "type", marker.as_str()),
    }
    rdg
}

pub fn render_remarks(tree: &mut Tree, app: NodeId, analysis: &NoteAnalysis) {
    if let Some(remark) = &analysis.remark {
        let note = tree.create_with_attrs("note", &[("type", "editorial")]);
        tree.push_text(note, remark);
        tree.append_child(app, note);
    }
    if let Some(interp) = &analysis.interpretation {
        let note = tree.create_with_attrs("note", &[("type", "interpretation")]);
        tree.push_text(note, interp);
        tree.append_child(app, note);
    }
}

/// Build a detached `<app>` group for one lemma.
pub fn render_apparatus(
    tree: &mut Tree,
    lemma: &Lemma,
    analysis: &NoteAnalysis,
    base_sigil: &str,
) -> NodeId {
    let app = tree.create("app");
    let lem = tree.create("lem");
    match lemma {
        Lemma::Text(text) => {
            let (wit, pages) = match &analysis.lemma_witnesses {
                Some(w) => (w.sigla.as_str(), w.pages.as_str()),
                None => (base_sigil, ""),
            };
            tree.set_attr(lem, "wit", wit);
            if !pages.is_empty() {
                tree.set_attr(lem, "n", pages);
            }
            tree.push_text(lem, text);
        }
        Lemma::NeedsManualFix => tree.set_attr(lem, "type", "needs-manual-fix"),
    }
    tree.append_child(app, lem);

    for variant in &analysis.variants {
        let rdg = render_variant(tree, variant);
        tree.append_child(app, rdg);
    }
    render_remarks(tree, app, analysis);
    app
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lemma_and_variants_from_braced_back_text() {
        let split = split_lemma("...sa{skad}");
        assert_eq!(
            split,
            LemmaSplit::Found {
                retained: "...sa".to_string(),
                lemma: "skad".to_string()
            }
        );

        let analysis = parse_annotation("Dg, Pk: bskad; Nk: *omits");
        assert!(analysis.lemma_witnesses.is_none());
        assert_eq!(analysis.variants.len(), 2);

        let first = &analysis.variants[0];
        assert_eq!(first.witnesses.sigla, "Dg Pk");
        assert_eq!(first.reading, Reading::Text("bskad".to_string()));
        assert!(!first.preferred);

        let second = &analysis.variants[1];
        assert_eq!(second.witnesses.sigla, "Nk");
        assert_eq!(second.reading, Reading::Marker(Marker::Omit));
        assert!(second.preferred);

        let mut tree = Tree::new("p");
        let app = render_apparatus(&mut tree, &Lemma::Text("skad".into()), &analysis, "base");
        let kids: Vec<NodeId> = tree.children(app).collect();
        assert_eq!(tree.attr(kids[0], "wit"), Some("base"));
        assert_eq!(tree.text_content(kids[0]), "skad");
        assert_eq!(tree.attr(kids[2], "type"), Some("omit"));
        assert_eq!(tree.attr(kids[2], "rend"), Some("pref"));
        assert!(!tree.has_children(kids[2]) && tree.text_content(kids[2]).is_empty());
    }

    #[test]
    fn clause_without_reading_names_lemma_witnesses() {
        let analysis = parse_annotation("Tk(3a), Dg(12b); Pk: bskal");
        let lem = analysis.lemma_witnesses.expect("lemma witnesses");
        assert_eq!(lem.sigla, "Tk Dg");
        assert_eq!(lem.pages, "3a 12b");
        assert_eq!(analysis.lemma_clause.as_deref(), Some("Tk(3a), Dg(12b)"));
        assert_eq!(analysis.variants.len(), 1);
    }

    #[test]
    fn remark_and_interpretation_are_separate() {
        let analysis =
            parse_annotation("Pk: bskal. Probably a scribal error [checked against Dg]");
        assert_eq!(analysis.remark.as_deref(), Some("checked against Dg"));
        assert_eq!(
            analysis.interpretation.as_deref(),
            Some("Probably a scribal error")
        );
        assert_eq!(analysis.variants.len(), 1);
        assert_eq!(
            analysis.variants[0].reading,
            Reading::Text("bskal".to_string())
        );
    }

    #[test]
    fn malformed_and_plain_back_text() {
        assert_eq!(
            split_lemma("no opening}"),
            LemmaSplit::Malformed {
                retained: "no opening".to_string()
            }
        );
        assert_eq!(split_lemma("plain text"), LemmaSplit::NotApparatus);
        assert_eq!(split_lemma(""), LemmaSplit::NotApparatus);
    }

    #[test]
    fn colon_split_fallback_and_unparsed_clause() {
        let analysis = parse_annotation("dg ed: bskad; ???");
        assert_eq!(analysis.variants.len(), 1);
        assert_eq!(analysis.variants[0].witnesses.sigla, "dg ed");
        assert_eq!(analysis.unparsed, vec!["???".to_string()]);
    }

    #[test]
    fn annotation_detection() {
        assert!(is_annotation_text("Dg, Pk: bskad; Nk: *omits"));
        assert!(is_annotation_text("Dg"));
        assert!(!is_annotation_text("See the introduction for details."));
        assert!(!is_annotation_text("cf. chapter three"));
    }

    #[test]
    fn keyword_readings_are_case_insensitive() {
        let analysis = parse_annotation("Dg: Illegible; Pk: UNCLEAR; Nk: corrupt");
        let markers: Vec<&Reading> = analysis.variants.iter().map(|v| &v.reading).collect();
        assert_eq!(
            markers,
            vec![
                &Reading::Marker(Marker::Illegible),
                &Reading::Marker(Marker::Unclear),
                &Reading::Marker(Marker::Corrupt)
            ]
        );
    }
}
