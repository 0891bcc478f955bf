/*!
 * Placeholder protection for non-translatable spans.
 *
 * `protect` swaps spans the oracle must not touch (inline code, link
 * targets, URLs, HTML attribute values, footnote ids, table delimiters,
 * trailing hard breaks) for opaque tokens of the form `⟦PH<n>⟧`. `restore`
 * is a single-pass substitution back to the original text and refuses to
 * guess when a token went missing, was duplicated, or was invented.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

use crate::errors::PlaceholderError;

static TOKEN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"⟦PH(\d+)⟧").expect("Invalid placeholder token regex"));

static INLINE_CODE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"``[^`\n]+?``|`[^`\n]+`").expect("Invalid inline code regex"));

// `](target "title")` and reference definitions `[id]: target`
static LINK_TARGET_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\]\((?:<[^>\n]*>|[^)\s]+)(?:\s+"[^"\n]*")?\)"#).expect("Invalid link target regex")
});
static LINK_DEFINITION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]{0,3}\[[^\]\n]+\]:[ \t]+(\S+)").expect("Invalid link definition regex")
});

static HTML_TAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"</?[A-Za-z][A-Za-z0-9-]*(?:\s[^<>\n]*)?/?>").expect("Invalid HTML tag regex")
});
static HTML_ATTR_VALUE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"=\s*("[^"\n]*"|'[^'\n]*')"#).expect("Invalid HTML attribute regex")
});

static ABSOLUTE_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<https?://[^>\s]+>|https?://[^\s<>()\[\]"'`]*[^\s<>()\[\]"'`.,;:!?]"#)
        .expect("Invalid URL regex")
});
static RELATIVE_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[\s(])((?:\.{1,2}/|/)[A-Za-z0-9_\-./#?=&%~+]*[A-Za-z0-9_\-/#=&%~+])")
        .expect("Invalid relative URL regex")
});

static FOOTNOTE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\^[^\]\s]+\]").expect("Invalid footnote regex"));

static TABLE_ALIGNMENT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*\|?[ \t]*:?-+:?[ \t]*(?:\|[ \t]*:?-+:?[ \t]*)+\|?[ \t]*$")
        .expect("Invalid table alignment regex")
});

static HARD_BREAK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)( {2,})$").expect("Invalid hard break regex"));

/// What kind of span a token stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderCategory {
    InlineCode,
    LinkTarget,
    HtmlAttribute,
    Url,
    Footnote,
    TableDelimiter,
    HardBreak,
}

impl fmt::Display for PlaceholderCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InlineCode => "inline_code",
            Self::LinkTarget => "link_target",
            Self::HtmlAttribute => "html_attribute",
            Self::Url => "url",
            Self::Footnote => "footnote",
            Self::TableDelimiter => "table_delimiter",
            Self::HardBreak => "hard_break",
        };
        write!(f, "{}", name)
    }
}

/// One protected span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderToken {
    pub id: usize,
    pub category: PlaceholderCategory,
    pub original_text: String,
}

impl PlaceholderToken {
    /// Token text as it appears in masked text
    pub fn marker(&self) -> String {
        token_marker(self.id)
    }
}

/// Tokens produced by one protect call; consumed by restore
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenMap {
    tokens: Vec<PlaceholderToken>,
}

impl TokenMap {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlaceholderToken> {
        self.tokens.iter()
    }

    /// Markers in id order
    pub fn markers(&self) -> Vec<String> {
        self.tokens.iter().map(PlaceholderToken::marker).collect()
    }
}

/// Result of masking one text
#[derive(Debug, Clone)]
pub struct Protected {
    pub masked: String,
    pub tokens: TokenMap,
}

/// Token text for an id
pub fn token_marker(id: usize) -> String {
    format!("⟦PH{}⟧", id)
}

/// All token markers in order of appearance
pub fn find_tokens(text: &str) -> Vec<String> {
    TOKEN_REGEX
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Whether the text contains anything that looks like a token
pub fn contains_token_syntax(text: &str) -> bool {
    TOKEN_REGEX.is_match(text)
}

/// Text with every token removed
pub fn strip_tokens(text: &str) -> String {
    TOKEN_REGEX.replace_all(text, "").into_owned()
}

/// Masks and restores non-translatable spans
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderProtector;

impl PlaceholderProtector {
    pub fn new() -> Self {
        Self
    }

    /// Mask protected spans, most specific pattern first.
    ///
    /// Ids start at 0 for every call, so protecting the same text twice
    /// yields the same masked text.
    pub fn protect(&self, text: &str) -> Result<Protected, PlaceholderError> {
        if contains_token_syntax(text) {
            return Err(PlaceholderError::TokenSyntaxInInput);
        }

        let mut state = MaskState {
            text: text.to_string(),
            tokens: Vec::new(),
        };

        state.mask(PlaceholderCategory::InlineCode, whole_matches(&INLINE_CODE_REGEX));
        state.mask(PlaceholderCategory::LinkTarget, |t| {
            let mut spans: Vec<Range<usize>> = LINK_TARGET_REGEX
                .find_iter(t)
                // keep the closing bracket of the link text
                .map(|m| m.start() + 1..m.end())
                .collect();
            spans.extend(group_matches(&LINK_DEFINITION_REGEX, 1)(t));
            spans
        });
        state.mask(PlaceholderCategory::HtmlAttribute, |t| {
            HTML_TAG_REGEX
                .find_iter(t)
                .flat_map(|tag| {
                    HTML_ATTR_VALUE_REGEX
                        .captures_iter(tag.as_str())
                        .filter_map(|c| c.get(1))
                        .map(|v| tag.start() + v.start()..tag.start() + v.end())
                        .collect::<Vec<_>>()
                })
                .collect()
        });
        state.mask(PlaceholderCategory::Url, whole_matches(&ABSOLUTE_URL_REGEX));
        state.mask(PlaceholderCategory::Url, group_matches(&RELATIVE_URL_REGEX, 1));
        state.mask(PlaceholderCategory::Footnote, whole_matches(&FOOTNOTE_REGEX));
        state.mask(PlaceholderCategory::TableDelimiter, whole_matches(&TABLE_ALIGNMENT_REGEX));
        state.mask(PlaceholderCategory::TableDelimiter, unescaped_pipes);
        state.mask(PlaceholderCategory::HardBreak, group_matches(&HARD_BREAK_REGEX, 1));

        Ok(Protected {
            masked: state.text,
            tokens: TokenMap {
                tokens: state.tokens,
            },
        })
    }

    /// Substitute every token back.
    ///
    /// Each token in the map must occur exactly once and no other token may
    /// appear.
    pub fn restore(&self, masked: &str, tokens: TokenMap) -> Result<String, PlaceholderError> {
        let by_id: HashMap<usize, &PlaceholderToken> = tokens.tokens.iter().map(|t| (t.id, t)).collect();
        let mut seen: HashMap<usize, usize> = HashMap::new();

        for caps in TOKEN_REGEX.captures_iter(masked) {
            let marker = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            let id: usize = caps[1]
                .parse()
                .map_err(|_| PlaceholderError::UnknownToken(marker.to_string()))?;
            if !by_id.contains_key(&id) {
                return Err(PlaceholderError::UnknownToken(marker.to_string()));
            }
            let count = seen.entry(id).or_insert(0);
            *count += 1;
            if *count > 1 {
                return Err(PlaceholderError::DuplicatedToken(marker.to_string()));
            }
        }

        if let Some(missing) = tokens.tokens.iter().find(|t| !seen.contains_key(&t.id)) {
            return Err(PlaceholderError::MissingToken(missing.marker()));
        }

        let restored = TOKEN_REGEX.replace_all(masked, |caps: &regex::Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|id| by_id.get(&id))
                .map(|t| t.original_text.clone())
                .unwrap_or_default()
        });

        Ok(restored.into_owned())
    }
}

struct MaskState {
    text: String,
    tokens: Vec<PlaceholderToken>,
}

impl MaskState {
    fn mask<F>(&mut self, category: PlaceholderCategory, find: F)
    where
        F: Fn(&str) -> Vec<Range<usize>>,
    {
        let mut spans: Vec<Range<usize>> = find(&self.text)
            .into_iter()
            .filter(|span| !span.is_empty())
            // never mask inside an existing token
            .filter(|span| {
                let piece = &self.text[span.clone()];
                !piece.contains('⟦') && !piece.contains('⟧')
            })
            .collect();
        if spans.is_empty() {
            return;
        }
        spans.sort_by_key(|s| s.start);

        let mut out = String::with_capacity(self.text.len());
        let mut cursor = 0;
        for span in spans {
            if span.start < cursor {
                continue;
            }
            let id = self.tokens.len();
            out.push_str(&self.text[cursor..span.start]);
            out.push_str(&token_marker(id));
            self.tokens.push(PlaceholderToken {
                id,
                category,
                original_text: self.text[span.clone()].to_string(),
            });
            cursor = span.end;
        }
        out.push_str(&self.text[cursor..]);
        self.text = out;
    }
}

fn whole_matches(regex: &'static Regex) -> impl Fn(&str) -> Vec<Range<usize>> {
    move |text| regex.find_iter(text).map(|m| m.range()).collect()
}

fn group_matches(regex: &'static Regex, group: usize) -> impl Fn(&str) -> Vec<Range<usize>> {
    move |text| {
        regex
            .captures_iter(text)
            .filter_map(|c| c.get(group))
            .map(|m| m.range())
            .collect()
    }
}

fn unescaped_pipes(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut previous = None;
    for (idx, ch) in text.char_indices() {
        if ch == '|' && previous != Some('\\') {
            spans.push(idx..idx + 1);
        }
        previous = Some(ch);
    }
    spans
}
