use once_cell::sync::Lazy;
use regex::Regex;

static UNIT_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\[?(Page|Line)\s+([^\]]+)\]?").expect("milestone regex"));
// "[21-page Dg]": digits before the unit, edition label after it
static DIGIT_PAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\[?(\d+)-page\s+([^\]]+)\]?").expect("digit-page regex"));

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Milestone {
    pub unit: String,
    pub edition: String,
    pub number: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedMilestone {
    pub milestone: Milestone,
    /// False when neither token form matched and the bracket interior was used as is.
    pub matched: bool,
}

/// Split a merged milestone run (`[Page 1][Page 2]`) into its tokens.
pub fn split_tokens(text: &str) -> Vec<String> {
    let parts: Vec<&str> = text.split("][").collect();
    let last = parts.len().saturating_sub(1);
    parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            let mut token = part.to_string();
            if i > 0 {
                token.insert(0, '[');
            }
            if i < last {
                token.push(']');
            }
            token
        })
        .collect()
}

/// Parse one bracketed token. `style_name` only supplies the unit when the token is irregular.
pub fn parse_milestone(token: &str, style_name: &str) -> ParsedMilestone {
    let token = token.trim();
    let (unit, raw_number, matched) = if let Some(caps) = UNIT_NUMBER_RE.captures(token) {
        (caps[1].to_lowercase(), caps[2].trim().to_string(), true)
    } else if let Some(caps) = DIGIT_PAGE_RE.captures(token) {
        (
            "page".to_string(),
            format!("{}-{}", caps[2].trim(), &caps[1]),
            true,
        )
    } else {
        let unit = if style_name.to_lowercase().contains("line") {
            "line"
        } else {
            "page"
        };
        (unit.to_string(), token.replace(['[', ']'], ""), false)
    };

    let sep = if raw_number.contains('.') { '.' } else { '-' };
    let parts: Vec<&str> = raw_number.split(sep).collect();
    let (edition, number) = if parts.len() > 1 {
        (parts[0].to_string(), parts[1].to_string())
    } else {
        (String::new(), parts[0].to_string())
    };

    ParsedMilestone {
        milestone: Milestone {
            unit,
            edition,
            number,
        },
        matched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triple(token: &str) -> (String, String, String) {
        let m = parse_milestone(token, "page number").milestone;
        (m.unit, m.edition, m.number)
    }

    #[test]
    fn regular_tokens() {
        assert_eq!(triple("[Page 12]"), ("page".into(), "".into(), "12".into()));
        assert_eq!(triple("[Line 3.4]"), ("line".into(), "3".into(), "4".into()));
        assert_eq!(triple("[page 7-2]"), ("page".into(), "7".into(), "2".into()));
    }

    #[test]
    fn irregular_digit_page_token() {
        assert_eq!(triple("[21-page Dg]"), ("page".into(), "Dg".into(), "21".into()));
    }

    #[test]
    fn unmatched_token_falls_back_to_interior() {
        let parsed = parse_milestone("[12a]", "page number");
        assert!(!parsed.matched);
        assert_eq!(parsed.milestone.unit, "page");
        assert_eq!(parsed.milestone.number, "12a");

        let parsed = parse_milestone("[5]", "line number");
        assert_eq!(parsed.milestone.unit, "line");
    }

    #[test]
    fn splits_merged_tokens_on_boundary() {
        assert_eq!(
            split_tokens("[Page 1][Line 1.2][Page 2]"),
            vec!["[Page 1]", "[Line 1.2]", "[Page 2]"]
        );
        assert_eq!(split_tokens("[Page 1]"), vec!["[Page 1]"]);
    }
}
