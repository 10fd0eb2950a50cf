//! Blueprint extraction from LLM responses.
//!
//! Responses carry structured UX concepts inside a bracketed marker grammar:
//!
//! ```text
//! [[LUKEUX_BLUEPRINTS_V1]]
//! [[C1]]
//! title: Guided onboarding
//! summary: Three-step checklist on first login
//! [[/C1]]
//! [[C2]]
//! ...
//! [[/C2]]
//! [[/LUKEUX_BLUEPRINTS_V1]]
//! ```
//!
//! A wrapper without `[[C<n>]]` sub-blocks is read as a single concept, so a
//! model that emits one wrapper per concept still parses. Anything outside
//! complete wrappers is returned as prose.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub const WRAPPER_OPEN: &str = "[[LUKEUX_BLUEPRINTS_V1]]";
pub const WRAPPER_CLOSE: &str = "[[/LUKEUX_BLUEPRINTS_V1]]";

/// Appended to the system prompt of every generation request.
pub const FORMAT_INSTRUCTIONS: &str = "\
After your explanation, list each UX concept you propose inside a blueprint block.
Use exactly this format, one `key: value` pair per line:

[[LUKEUX_BLUEPRINTS_V1]]
[[C1]]
title: <short concept name>
summary: <one or two sentences>
user_goal: <what the user is trying to achieve>
key_screens: <comma separated screen names>
success_metric: <how success is measured>
[[/C1]]
[[C2]]
...
[[/C2]]
[[/LUKEUX_BLUEPRINTS_V1]]

Number concepts from 1. Do not nest blocks and do not put markdown inside the block.";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintField {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub index: u32,
    pub fields: Vec<BlueprintField>,
}

impl Concept {
    /// First value stored under `key` (compared after key normalization).
    pub fn get(&self, key: &str) -> Option<&str> {
        let key = normalize_key(key);
        self.fields
            .iter()
            .find(|f| f.key == key)
            .map(|f| f.value.as_str())
    }

    pub fn title(&self) -> Option<&str> {
        self.get("title").or_else(|| self.get("name"))
    }

    pub fn summary(&self) -> Option<&str> {
        self.get("summary").or_else(|| self.get("description"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Blueprints {
    pub concepts: Vec<Concept>,
    /// The response with every complete wrapper removed.
    pub prose: String,
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

static SUB_OPEN_RE: OnceLock<Regex> = OnceLock::new();
static FIELD_RE: OnceLock<Regex> = OnceLock::new();
static MARKER_LINE_RE: OnceLock<Regex> = OnceLock::new();

fn sub_open_re() -> &'static Regex {
    SUB_OPEN_RE.get_or_init(|| Regex::new(r"\[\[C(\d+)\]\]").unwrap())
}

fn field_re() -> &'static Regex {
    FIELD_RE.get_or_init(|| {
        Regex::new(r"^(?:[-*]\s+)?(?:\*\*)?([A-Za-z][A-Za-z0-9 _\-]{0,39})(?:\*\*)?\s*:\s*(.*)$")
            .unwrap()
    })
}

fn marker_line_re() -> &'static Regex {
    MARKER_LINE_RE.get_or_init(|| Regex::new(r"^\[\[/?[A-Z0-9_]+\]\]$").unwrap())
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Extract every blueprint concept from `text`.
///
/// Never fails: text without a complete wrapper yields no concepts and the
/// whole (trimmed) text as prose.
pub fn parse_blueprints(text: &str) -> Blueprints {
    let mut concepts = Vec::new();
    let mut prose = String::new();
    let mut cursor = 0;

    while let Some(rel) = text[cursor..].find(WRAPPER_OPEN) {
        let mut open = cursor + rel;
        let Some(close_rel) = text[open + WRAPPER_OPEN.len()..].find(WRAPPER_CLOSE) else {
            break;
        };
        let close = open + WRAPPER_OPEN.len() + close_rel;

        // An earlier opener with no closer of its own is prose; pair the
        // closer with the nearest opener.
        if let Some(inner) = text[open + WRAPPER_OPEN.len()..close].rfind(WRAPPER_OPEN) {
            open = open + WRAPPER_OPEN.len() + inner;
        }

        prose.push_str(&text[cursor..open]);
        extract_wrapper(&text[open + WRAPPER_OPEN.len()..close], &mut concepts);
        cursor = close + WRAPPER_CLOSE.len();
    }
    prose.push_str(&text[cursor..]);

    Blueprints {
        concepts,
        prose: prose.trim().to_string(),
    }
}

fn extract_wrapper(body: &str, concepts: &mut Vec<Concept>) {
    let blocks = sub_blocks(body);
    if blocks.is_empty() {
        let fields = parse_fields(body);
        if !fields.is_empty() {
            concepts.push(Concept {
                index: concepts.len() as u32 + 1,
                fields,
            });
        }
        return;
    }
    for (index, inner) in blocks {
        let fields = parse_fields(inner);
        if !fields.is_empty() {
            concepts.push(Concept { index, fields });
        }
    }
}

/// Complete `[[C<n>]]...[[/C<n>]]` blocks in order. Openers without a
/// matching closer are skipped.
fn sub_blocks(body: &str) -> Vec<(u32, &str)> {
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(caps) = sub_open_re().captures_at(body, pos) {
        let whole = caps.get(0).expect("group 0 always present");
        pos = whole.end();
        let Ok(index) = caps[1].parse::<u32>() else {
            continue;
        };
        let closer = format!("[[/C{index}]]");
        if let Some(rel) = body[whole.end()..].find(&closer) {
            let end = whole.end() + rel;
            out.push((index, &body[whole.end()..end]));
            pos = end + closer.len();
        }
    }
    out
}

fn parse_fields(block: &str) -> Vec<BlueprintField> {
    let mut fields: Vec<BlueprintField> = Vec::new();
    for raw in block.lines() {
        let line = raw.trim();
        if line.is_empty() || marker_line_re().is_match(line) {
            continue;
        }
        if let Some(field) = parse_field_line(line) {
            fields.push(field);
        } else if let Some(last) = fields.last_mut() {
            if !last.value.is_empty() {
                last.value.push('\n');
            }
            last.value.push_str(line);
        }
    }
    fields
}

fn parse_field_line(line: &str) -> Option<BlueprintField> {
    let caps = field_re().captures(line)?;
    let value = caps[2].trim();
    // "https://..." is a continuation, not a key named "https".
    if value.starts_with("//") {
        return None;
    }
    let key = normalize_key(&caps[1]);
    if key.is_empty() {
        return None;
    }
    Some(BlueprintField {
        key,
        value: value.to_string(),
    })
}

/// Lowercase `snake_case`: spaces and hyphens collapse to single underscores.
pub fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for ch in key.trim().chars() {
        if ch == ' ' || ch == '-' || ch == '_' {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
        } else {
            out.push(ch.to_ascii_lowercase());
        }
    }
    out.trim_end_matches('_').to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_without_markers_has_no_concepts() {
        let out = parse_blueprints("  Here are some thoughts on your checkout flow.  ");
        assert!(out.concepts.is_empty());
        assert_eq!(out.prose, "Here are some thoughts on your checkout flow.");
    }

    #[test]
    fn wrapper_with_sub_blocks() {
        let text = "\
Intro paragraph.

[[LUKEUX_BLUEPRINTS_V1]]
[[C1]]
title: Guided onboarding
summary: Checklist on first login
[[/C1]]
[[C2]]
title: Progressive profile
key_screens: Welcome, Profile
[[/C2]]
[[/LUKEUX_BLUEPRINTS_V1]]

Closing note.";
        let out = parse_blueprints(text);
        assert_eq!(out.concepts.len(), 2);
        assert_eq!(out.concepts[0].index, 1);
        assert_eq!(out.concepts[0].title(), Some("Guided onboarding"));
        assert_eq!(out.concepts[0].summary(), Some("Checklist on first login"));
        assert_eq!(out.concepts[1].index, 2);
        assert_eq!(out.concepts[1].get("Key Screens"), Some("Welcome, Profile"));
        assert_eq!(out.prose, "Intro paragraph.\n\n\n\nClosing note.");
    }

    #[test]
    fn wrapper_without_sub_blocks_is_one_concept() {
        let text = "[[LUKEUX_BLUEPRINTS_V1]]\nname: Dark mode\ndescription: Theme toggle\n[[/LUKEUX_BLUEPRINTS_V1]]";
        let out = parse_blueprints(text);
        assert_eq!(out.concepts.len(), 1);
        assert_eq!(out.concepts[0].index, 1);
        assert_eq!(out.concepts[0].title(), Some("Dark mode"));
        assert_eq!(out.concepts[0].summary(), Some("Theme toggle"));
        assert_eq!(out.prose, "");
    }

    #[test]
    fn multiple_independent_wrappers() {
        let text = "\
First idea:
[[LUKEUX_BLUEPRINTS_V1]]
title: Search filters
[[/LUKEUX_BLUEPRINTS_V1]]
Second idea:
[[LUKEUX_BLUEPRINTS_V1]]
title: Saved searches
[[/LUKEUX_BLUEPRINTS_V1]]";
        let out = parse_blueprints(text);
        let titles: Vec<_> = out.concepts.iter().filter_map(|c| c.title()).collect();
        assert_eq!(titles, vec!["Search filters", "Saved searches"]);
        assert_eq!(out.concepts[1].index, 2);
        assert_eq!(out.prose, "First idea:\n\nSecond idea:");
    }

    #[test]
    fn mismatched_sub_block_is_ignored() {
        let text = "[[LUKEUX_BLUEPRINTS_V1]][[C1]]\ntitle: Orphan\n[[/C2]]\n[[C3]]\ntitle: Kept\n[[/C3]][[/LUKEUX_BLUEPRINTS_V1]]";
        let out = parse_blueprints(text);
        assert_eq!(out.concepts.len(), 1);
        assert_eq!(out.concepts[0].index, 3);
        assert_eq!(out.concepts[0].title(), Some("Kept"));
    }

    #[test]
    fn unterminated_wrapper_yields_nothing() {
        let text = "Ideas\n[[LUKEUX_BLUEPRINTS_V1]]\n[[C1]]\ntitle: Lost\n[[/C1]]";
        let out = parse_blueprints(text);
        assert!(out.concepts.is_empty());
        assert_eq!(out.prose, text);
    }

    #[test]
    fn stray_opener_pairs_closer_with_nearest_opener() {
        let text = "[[LUKEUX_BLUEPRINTS_V1]] draft\n[[LUKEUX_BLUEPRINTS_V1]]\ntitle: Real\n[[/LUKEUX_BLUEPRINTS_V1]]";
        let out = parse_blueprints(text);
        assert_eq!(out.concepts.len(), 1);
        assert_eq!(out.concepts[0].title(), Some("Real"));
        assert_eq!(out.prose, "[[LUKEUX_BLUEPRINTS_V1]] draft");
    }

    #[test]
    fn continuation_lines_and_urls_join_previous_value() {
        let text = "[[LUKEUX_BLUEPRINTS_V1]][[C1]]
title: Help center
summary: Searchable articles
grouped by task
reference: see
https://example.com/help
[[/C1]][[/LUKEUX_BLUEPRINTS_V1]]";
        let out = parse_blueprints(text);
        let c = &out.concepts[0];
        assert_eq!(c.summary(), Some("Searchable articles\ngrouped by task"));
        assert_eq!(c.get("reference"), Some("see\nhttps://example.com/help"));
    }

    #[test]
    fn bullets_and_bold_keys_are_accepted() {
        let text = "[[LUKEUX_BLUEPRINTS_V1]]\n- **Title**: Bold concept\n* User-Goal : finish faster\n[[/LUKEUX_BLUEPRINTS_V1]]";
        let out = parse_blueprints(text);
        let c = &out.concepts[0];
        assert_eq!(c.title(), Some("Bold concept"));
        assert_eq!(c.get("user_goal"), Some("finish faster"));
    }

    #[test]
    fn blocks_without_fields_produce_no_concept() {
        let text = "[[LUKEUX_BLUEPRINTS_V1]][[C1]]\njust prose here\n[[/C1]][[C2]]\ntitle: Real\n[[/C2]][[/LUKEUX_BLUEPRINTS_V1]]";
        let out = parse_blueprints(text);
        assert_eq!(out.concepts.len(), 1);
        assert_eq!(out.concepts[0].index, 2);
    }

    #[test]
    fn inline_markers_on_one_line() {
        let out = parse_blueprints("[[LUKEUX_BLUEPRINTS_V1]][[C7]] title: Inline [[/C7]][[/LUKEUX_BLUEPRINTS_V1]]");
        assert_eq!(out.concepts.len(), 1);
        assert_eq!(out.concepts[0].index, 7);
        assert_eq!(out.concepts[0].title(), Some("Inline"));
    }

    #[test]
    fn normalize_key_forms() {
        assert_eq!(normalize_key(" Key Screens "), "key_screens");
        assert_eq!(normalize_key("success-metric"), "success_metric");
        assert_eq!(normalize_key("A  -  B"), "a_b");
    }
}
