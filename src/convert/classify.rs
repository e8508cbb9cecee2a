use once_cell::sync::Lazy;
use regex::Regex;

static HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Heading (?:Tibetan\s*)?(\d+)[,\s]*(Front|Body|Back)?").expect("heading regex")
});
static STYLE_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\d]+\s+(\d+)").expect("style number regex"));
static SECTION_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^section\s+(\d)").expect("section regex"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Division {
    Front,
    Body,
    Back,
}

impl Division {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Body => "body",
            Self::Back => "back",
        }
    }

    /// Identifier letter of the division.
    pub fn letter(tag: &str) -> Option<&'static str> {
        match tag {
            "front" => Some("a"),
            "body" => Some("b"),
            "back" => Some("c"),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListKind {
    Bullet,
    Numbered,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VerseStyle {
    pub citation: bool,
    pub speech: bool,
    pub nested: bool,
    pub level2: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockStyle {
    pub nested: bool,
    pub continued: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SectionKind {
    Numbered(String),
    ChapterElement,
    Interstitial,
    Unknown,
}

/// Paragraph category derived from the style name alone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParaKind {
    /// `level` is `None` when the style's number does not fit a level.
    Heading {
        level: Option<u32>,
        division: Option<Division>,
    },
    List {
        level: u32,
        kind: ListKind,
    },
    Verse(VerseStyle),
    Citation(BlockStyle),
    Section(SectionKind),
    Speech(BlockStyle),
    Paragraph {
        regular: bool,
    },
}

/// First integer following the style's leading words, e.g. `List Bullet 2` -> 2.
pub fn style_number(style: &str) -> Option<u32> {
    STYLE_NUMBER_RE
        .captures(style)
        .and_then(|c| c[1].parse().ok())
}

/// List level of a style, or 0 when it is not a list style.
pub fn list_level(style: &str) -> u32 {
    if style.contains("List") {
        style_number(style).unwrap_or(1)
    } else {
        0
    }
}

pub fn is_regular_paragraph(style: &str) -> bool {
    style.contains("Paragraph") || style.contains("Outline") || style.contains("Normal")
}

pub fn classify(style: &str) -> ParaKind {
    if let Some(caps) = HEADING_RE.captures(style) {
        let level = caps[1].parse().ok();
        let division = caps.get(2).map(|m| match m.as_str() {
            "Front" => Division::Front,
            "Back" => Division::Back,
            _ => Division::Body,
        });
        return ParaKind::Heading { level, division };
    }

    let lower = style.to_lowercase();
    if style.contains("List") {
        let kind = if style.contains("Bullet") {
            ListKind::Bullet
        } else {
            ListKind::Numbered
        };
        return ParaKind::List {
            level: style_number(style).unwrap_or(1),
            kind,
        };
    }
    if style.contains("Verse") {
        return ParaKind::Verse(VerseStyle {
            citation: lower.contains("citation"),
            speech: lower.contains("speech"),
            nested: lower.contains("nested"),
            level2: style.contains('2'),
        });
    }
    if style.contains("Citation") {
        return ParaKind::Citation(BlockStyle {
            nested: lower.contains("nested"),
            continued: lower.contains("continued"),
        });
    }
    if style.contains("Section") {
        let kind = if let Some(caps) = SECTION_NUMBER_RE.captures(style) {
            SectionKind::Numbered(caps[1].to_string())
        } else if lower.contains("chapter element") {
            SectionKind::ChapterElement
        } else if lower.contains("interstitial") {
            SectionKind::Interstitial
        } else {
            SectionKind::Unknown
        };
        return ParaKind::Section(kind);
    }
    if style.contains("Speech") {
        return ParaKind::Speech(BlockStyle {
            nested: lower.contains("nested"),
            continued: lower.contains("continued"),
        });
    }
    ParaKind::Paragraph {
        regular: is_regular_paragraph(style),
    }
}
