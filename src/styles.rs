//! Character-style name to output element mapping.

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Styles that degrade to plain text without a diagnostic.
pub const IGNORABLE_STYLES: &[&str] = &["Paragraph Char", "List Bullet Char"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDef {
    pub tag: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl ElementDef {
    fn from_static(tag: &str, attrs: &[(&str, &str)]) -> Self {
        Self {
            tag: tag.to_string(),
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Whether an attribute takes the run text (`%TXT%` / `%0%`) instead of a text body.
    pub fn is_templated(&self) -> bool {
        self.attributes
            .values()
            .any(|v| v.contains("%TXT%") || v.contains("%0%"))
    }

    /// Attributes with the run text substituted into any templated value.
    pub fn attributes_for(&self, text: &str) -> Vec<(String, String)> {
        self.attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.replace("%TXT%", text).replace("%0%", text)))
            .collect()
    }
}

/// Read-only style resolution used by the run assembler.
pub trait StyleLookup {
    fn lookup(&self, style_name: &str) -> Option<ElementDef>;

    fn is_ignorable(&self, style_name: &str) -> bool {
        IGNORABLE_STYLES.contains(&style_name)
    }
}

// key -> Word style names sharing that key's element
static STYLE_KEYS: &[(&str, &[&str])] = &[
    ("abbr", &["Abbreviation"]),
    ("add-by-ed", &["Added by Editor"]),
    ("annotations", &["Annotations"]),
    ("auth-chi", &["author Chinese"]),
    ("auth-eng", &["author English"]),
    ("auth-gen", &["X-Author Generic"]),
    ("auth-ind", &["X-Author Indian"]),
    ("auth-san", &["author Sanskrit"]),
    ("auth-tib", &["X-Author Tibetan", "author Tibetan"]),
    ("author", &["author"]),
    ("date-range", &["Date", "Date Range", "Dates"]),
    ("dates", &["X-Dates"]),
    ("dox-cat", &["Doxographical-Bibliographical Category", "X-Doxo-Biblio Category"]),
    ("emph-strong", &["Emphasis Strong", "X-Emphasis Strong", "Strong"]),
    ("emph-weak", &["Emphasis Weak", "Subtle Emphasis1", "X-Emphasis Weak"]),
    ("epithet", &["Epithet"]),
    ("hyperlink", &["Hyperlink", "FollowedHyperlink"]),
    ("illegible", &["Illegible"]),
    ("lang-chi", &["Lang Chinese"]),
    ("lang-eng", &["Lang English"]),
    ("lang-fre", &["Lang French"]),
    ("lang-ger", &["Lang German"]),
    ("lang-jap", &["Lang Japanese"]),
    ("lang-kor", &["Lang Korean"]),
    ("lang-mon", &["Lang Mongolian"]),
    ("lang-nep", &["Lang Nepali"]),
    ("lang-pali", &["Lang Pali"]),
    ("lang-sans", &["Lang Sanskrit"]),
    ("lang-span", &["Lang Spanish"]),
    ("lang-tib", &["Lang Tibetan"]),
    ("line-num", &["line number", "LineNumber"]),
    ("line-num-dig", &["Line Number,digital"]),
    ("line-num-print", &["Line Number Print"]),
    ("line-num-tib", &["Line Number Tib"]),
    ("mantra", &["X-Mantra"]),
    ("monuments", &["Monuments", "X-Monuments"]),
    ("name-bud-deity", &["X-Name Buddhist  Deity", "Name Buddhist  Deity"]),
    (
        "name-bud-deity-coll",
        &["X-Name Buddhist Deity Collective", "Name Buddhist Deity Collective"],
    ),
    ("name-ethnic", &["X-Name Ethnicity", "Name of ethnicity"]),
    ("name-fest", &["Name festival", "X-Name Festival"]),
    ("name-gen", &["X-Name Generic", "Name generic"]),
    ("name-org", &["X-Name Organization", "Name organization"]),
    ("name-org-clan", &["X-Name Clan", "Name org clan"]),
    ("name-org-line", &["X-Name Lineage", "Name org lineage"]),
    ("name-org-monastery", &["X-Name Monastery", "Name organization monastery"]),
    ("name-pers-human", &["X-Name Personal Human", "Name Personal Human"]),
    ("name-pers-other", &["X-Name Personal Other", "Name Personal Other"]),
    ("name-place", &["X-Name Place", "Name Place"]),
    ("name-rel-pract", &["X-Religious Practice", "Religious practice", "Name ritual"]),
    ("page-num", &["PageNumber", "page number"]),
    ("page-num-print-ed", &["Page Number Print Edition"]),
    ("pages", &["Pages"]),
    ("plain-text", &["Plain Text"]),
    ("pub-place", &["publication place"]),
    ("publisher", &["publisher"]),
    ("root-text", &["Root Text", "Root text"]),
    ("sa-bcad", &["Sa bcad"]),
    (
        "speak-bud-deity",
        &[
            "X-Speaker Buddhist Deity",
            "SpeakerBuddhistDeity",
            "Epithet Buddhist Deity",
            "Speaker Epithet Buddhist Deity",
        ],
    ),
    ("speak-bud-deity-coll", &["Speaker Buddhist Deity Collective"]),
    ("speak-human", &["X-Speaker Human", "SpeakerHuman"]),
    ("speak-other", &["SpeakerOther", "X-Speaker Other"]),
    ("speak-unknown", &["X-Speaker Unknown"]),
    ("speak-gene", &["Speaker generic"]),
    ("speech-inline", &["Speech Inline"]),
    ("term-chi", &["X-Term Chinese", "term Chinese"]),
    ("term-eng", &["term English", "X-Term English"]),
    ("term-fre", &["term French"]),
    ("term-ger", &["term German"]),
    ("term-jap", &["term Japanese"]),
    ("term-kor", &["term Korean"]),
    ("term-mon", &["term Mongolian", "X-Term Mongolian"]),
    ("term-nep", &["term Nepali"]),
    ("term-pali", &["term Pali", "X-Term Pali"]),
    ("term-sans", &["X-Term Sanskrit", "term Sanskrit"]),
    ("term-span", &["term Spanish"]),
    ("term-tech", &["X-Term Technical"]),
    ("term-tib", &["X-Term Tibetan", "term Tibetan"]),
    ("text-group", &["TextGroup", "X-Text Group"]),
    ("text-title", &["Text Title"]),
    ("text-title-san", &["Text Title Sanksrit"]),
    ("text-title-tib", &["Text Title Tibetan"]),
    ("tib-line-number", &["TibLineNumber"]),
    ("title", &["Title"]),
    (
        "title-chap",
        &["Title of Chapter", "Colophon Chapter Title", "Text Title in Chapter Colophon"],
    ),
    ("title-cite-other", &["Title in Citing Other Texts"]),
    ("title-own-non-tib", &["Title (Own) Non-Tibetan Language"]),
    (
        "title-own-tib",
        &[
            "Title (Own) Tibetan",
            "Colophon Text Titlle",
            "Colophon Text Title",
            "Text Title in Colophon",
        ],
    ),
    ("title-section", &["Title of Section"]),
    ("unclear", &["Unclear"]),
];

// key -> (tag, attributes)
static ELEMENTS: &[(&str, &str, &[(&str, &str)])] = &[
    ("abbr", "abbr", &[("expan", "")]),
    ("add-by-ed", "add", &[("n", "editor")]),
    ("annotations", "note", &[("type", "annotation")]),
    ("auth-chi", "persName", &[("type", "author"), ("n", "chinese")]),
    ("auth-eng", "persName", &[("type", "author"), ("n", "engish")]),
    ("auth-gen", "persName", &[("type", "author"), ("n", "generic")]),
    ("auth-ind", "persName", &[("type", "author"), ("n", "indian")]),
    ("auth-san", "persName", &[("type", "author"), ("n", "sanskrit")]),
    ("auth-tib", "persName", &[("type", "author"), ("n", "tibetan")]),
    ("author", "persName", &[("type", "author")]),
    ("date-range", "dateRange", &[("from", ""), ("to", "")]),
    ("dates", "date", &[]),
    ("dox-cat", "term", &[("type", "doxcat")]),
    ("emph-strong", "hi", &[("rend", "strong")]),
    ("emph-weak", "hi", &[("rend", "weak")]),
    ("epithet", "name", &[("type", "epithet")]),
    ("hyperlink", "xref", &[("n", "%0%"), ("type", "url")]),
    ("illegible", "gap", &[("n", ""), ("reason", "illegible")]),
    ("lang-chi", "seg", &[("lang", "chi")]),
    ("lang-eng", "seg", &[("lang", "eng")]),
    ("lang-fre", "seg", &[("lang", "fre")]),
    ("lang-ger", "seg", &[("lang", "ger")]),
    ("lang-jap", "seg", &[("lang", "jap")]),
    ("lang-kor", "seg", &[("lang", "kor")]),
    ("lang-mon", "seg", &[("lang", "mon")]),
    ("lang-nep", "seg", &[("lang", "nep")]),
    ("lang-pali", "seg", &[("lang", "pli")]),
    ("lang-sans", "seg", &[("lang", "san")]),
    ("lang-span", "seg", &[("lang", "spa")]),
    ("lang-tib", "seg", &[("lang", "tib")]),
    ("line-num", "milestone", &[("unit", "line"), ("n", "%TXT%")]),
    ("line-num-dig", "milestone", &[("unit", "digline")]),
    ("line-num-print", "milestone", &[("unit", "line"), ("n", "%TXT%")]),
    ("line-num-tib", "milestone", &[("unit", "tibline"), ("n", "%TXT%")]),
    ("mantra", "rs", &[("type", "mantra")]),
    ("monuments", "placeName", &[("type", "monument")]),
    ("name-bud-deity", "persName", &[("type", "bud-deity")]),
    ("name-bud-deity-coll", "orgName", &[("type", "bud-deity")]),
    ("name-ethnic", "orgName", &[("type", "ethnicity")]),
    ("name-fest", "term", &[("type", "festival")]),
    ("name-gen", "persName", &[("type", "generic")]),
    ("name-org", "orgName", &[]),
    ("name-org-clan", "orgName", &[("type", "clan")]),
    ("name-org-line", "orgName", &[("type", "lineage")]),
    ("name-org-monastery", "placeName", &[("type", "monastery")]),
    ("name-pers-human", "persName", &[("type", "human")]),
    ("name-pers-other", "persName", &[("type", "other")]),
    ("name-place", "placeName", &[]),
    ("name-rel-pract", "term", &[("type", "religious-practice")]),
    ("page-num", "milestone", &[("unit", "page"), ("n", "%TXT%")]),
    ("page-num-print-ed", "milestone", &[("unit", "page"), ("n", "%TXT%")]),
    ("pages", "num", &[("type", "page-range")]),
    ("plain-text", "hi", &[("rend", "plain")]),
    ("pub-place", "pubPlace", &[]),
    ("publisher", "publisher", &[]),
    ("root-text", "seg", &[("type", "roottext")]),
    ("sa-bcad", "rs", &[("type", "sabcad")]),
    ("speak-bud-deity", "persName", &[("type", "speaker-bud-deity")]),
    ("speak-bud-deity-coll", "persName", &[("type", "speaker-bud-deity-coll")]),
    ("speak-human", "persName", &[("type", "speaker-human")]),
    ("speak-other", "persName", &[("type", "speaker-other")]),
    ("speak-unknown", "persName", &[("type", "speaker-unknown")]),
    ("speak-gene", "persName", &[("type", "speaker-generic")]),
    ("speech-inline", "q", &[("rend", "inline")]),
    ("term-chi", "term", &[("lang", "chi")]),
    ("term-eng", "term", &[("lang", "eng")]),
    ("term-fre", "term", &[("lang", "fre")]),
    ("term-ger", "term", &[("lang", "ger")]),
    ("term-jap", "term", &[("lang", "jap")]),
    ("term-kor", "term", &[("lang", "kor")]),
    ("term-mon", "term", &[("lang", "mon")]),
    ("term-nep", "term", &[("lang", "nep")]),
    ("term-pali", "term", &[("lang", "pli")]),
    ("term-sans", "term", &[("lang", "san")]),
    ("term-span", "term", &[("lang", "spa")]),
    ("term-tech", "term", &[("n", "technical")]),
    ("term-tib", "term", &[("lang", "tib")]),
    ("text-group", "title", &[("level", "s"), ("n", "text-group")]),
    ("text-title", "title", &[("level", "m")]),
    ("text-title-san", "title", &[("level", "m"), ("lang", "san")]),
    ("text-title-tib", "title", &[("level", "m"), ("lang", "tib")]),
    ("tib-line-number", "milestone", &[("unit", "line"), ("lang", "tib")]),
    ("title", "title", &[]),
    (
        "title-chap",
        "title",
        &[("level", "a"), ("n", "chapter"), ("type", "internal")],
    ),
    ("title-cite-other", "title", &[("level", "m"), ("type", "external")]),
    (
        "title-own-non-tib",
        "title",
        &[("level", "m"), ("n", "non-tib"), ("type", "internal")],
    ),
    (
        "title-own-tib",
        "title",
        &[("level", "m"), ("lang", "tib"), ("type", "internal")],
    ),
    (
        "title-section",
        "title",
        &[("level", "a"), ("n", "section"), ("type", "internal")],
    ),
    ("unclear", "unclear", &[]),
];

static BUILTIN_ELEMENTS: Lazy<HashMap<&'static str, ElementDef>> = Lazy::new(|| {
    ELEMENTS
        .iter()
        .map(|(key, tag, attrs)| (*key, ElementDef::from_static(tag, attrs)))
        .collect()
});

static STYLE_TO_KEY: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for (key, names) in STYLE_KEYS {
        for name in *names {
            map.insert(*name, *key);
        }
    }
    map
});

/// Built-in table plus configured overrides. Overrides win.
#[derive(Clone, Debug, Default)]
pub struct StyleTable {
    overrides: HashMap<String, ElementDef>,
}

impl StyleTable {
    pub fn builtin() -> Self {
        Self::default()
    }

    pub fn with_overrides(overrides: HashMap<String, ElementDef>) -> Self {
        Self { overrides }
    }

    pub fn builtin_def(style_name: &str) -> Option<&'static ElementDef> {
        let key = if BUILTIN_ELEMENTS.contains_key(style_name) {
            style_name
        } else {
            STYLE_TO_KEY.get(style_name).copied()?
        };
        BUILTIN_ELEMENTS.get(key)
    }

    pub fn builtin_style_names() -> Vec<&'static str> {
        let mut names: Vec<&'static str> = STYLE_TO_KEY.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl StyleLookup for StyleTable {
    fn lookup(&self, style_name: &str) -> Option<ElementDef> {
        if let Some(def) = self.overrides.get(style_name) {
            return Some(def.clone());
        }
        Self::builtin_def(style_name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_style_names_and_keys() {
        let table = StyleTable::builtin();
        let def = table.lookup("X-Term Tibetan").expect("term style");
        assert_eq!(def.tag, "term");
        assert_eq!(def.attributes.get("lang").map(String::as_str), Some("tib"));

        let by_key = table.lookup("emph-strong").expect("key lookup");
        assert_eq!(by_key.tag, "hi");
        assert!(table.lookup("Totally Unknown Style").is_none());
    }

    #[test]
    fn every_style_key_has_an_element() {
        for (key, _) in STYLE_KEYS {
            assert!(BUILTIN_ELEMENTS.contains_key(key), "missing element for {key}");
        }
    }

    #[test]
    fn templated_attributes_take_run_text() {
        let table = StyleTable::builtin();
        let def = table.lookup("Hyperlink").expect("hyperlink");
        assert!(def.is_templated());
        let attrs = def.attributes_for("http://example.org");
        assert!(attrs.contains(&("n".to_string(), "http://example.org".to_string())));
        assert!(!table.lookup("Lang Tibetan").expect("seg").is_templated());
    }

    #[test]
    fn overrides_take_precedence() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "Strong".to_string(),
            ElementDef {
                tag: "emph".to_string(),
                attributes: BTreeMap::new(),
            },
        );
        overrides.insert(
            "Local Style".to_string(),
            ElementDef {
                tag: "seg".to_string(),
                attributes: BTreeMap::from([("type".to_string(), "local".to_string())]),
            },
        );
        let table = StyleTable::with_overrides(overrides);
        assert_eq!(table.lookup("Strong").map(|d| d.tag), Some("emph".to_string()));
        assert_eq!(table.lookup("Local Style").map(|d| d.tag), Some("seg".to_string()));
        assert_eq!(table.lookup("Emphasis Strong").map(|d| d.tag), Some("hi".to_string()));
    }

    #[test]
    fn ignorable_styles() {
        let table = StyleTable::builtin();
        assert!(table.is_ignorable("Paragraph Char"));
        assert!(!table.is_ignorable("Strong"));
    }
}
