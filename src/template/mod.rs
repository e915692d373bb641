//! Naming pattern rendering.
//!
//! Patterns reference fields as `{field_name}`; `{{` and `}}` are literal
//! braces. Names that are not in the field map are left in place verbatim
//! (configuration validation reports them, rendering never fails).
//!
//! The rendered text is then made safe as a single path component:
//! reserved characters become their full-width look-alikes, a run of them
//! collapses to one, empty bracket pairs left by missing fields disappear,
//! whitespace collapses and leading/trailing dots are trimmed.

use regex::Regex;
use std::sync::LazyLock;

use crate::model::{Field, FieldMap};

/// Longest file name (in characters, before the extension).
pub const MAX_FILE_NAME_CHARS: usize = 200;

/// What the rendered string will be used as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    /// A directory name
    Folder,
    /// A file name without extension; truncated to [`MAX_FILE_NAME_CHARS`]
    File,
}

static EMPTY_BRACKETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\s*\)|\[\s*\]").expect("bracket pattern is valid"));

/// Substitute `fields` into `pattern` and sanitize the result.
pub fn render(pattern: &str, fields: &FieldMap, kind: NameKind) -> String {
    sanitize(&substitute(pattern, fields), kind)
}

/// Field names referenced by a pattern, in order of appearance.
pub fn placeholders(pattern: &str) -> Vec<String> {
    let mut names = Vec::new();
    for token in tokenize(pattern) {
        if let Token::Field(name) = token
            && !names.iter().any(|n| n == name)
        {
            names.push(name.to_string());
        }
    }
    names
}

/// Make `name` safe to use as one path component.
pub fn sanitize(name: &str, kind: NameKind) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_replaced = false;
    for c in name.chars() {
        if c.is_control() {
            continue;
        }
        match fullwidth(c) {
            Some(replacement) => {
                if !last_replaced {
                    out.push(replacement);
                }
                last_replaced = true;
            }
            None => {
                out.push(c);
                last_replaced = false;
            }
        }
    }

    // Removing one pair can expose another, e.g. "([ ])"
    let mut cleaned = out;
    while EMPTY_BRACKETS.is_match(&cleaned) {
        cleaned = EMPTY_BRACKETS.replace_all(&cleaned, "").into_owned();
    }

    let mut result = collapse_whitespace(&cleaned);
    if kind == NameKind::File && result.chars().count() > MAX_FILE_NAME_CHARS {
        result = result.chars().take(MAX_FILE_NAME_CHARS).collect();
        result = trim_edges(&result).to_string();
    }

    if result.is_empty() {
        "_".to_string()
    } else {
        result
    }
}

fn collapse_whitespace(s: &str) -> String {
    let joined = s.split_whitespace().collect::<Vec<_>>().join(" ");
    trim_edges(&joined).to_string()
}

fn trim_edges(s: &str) -> &str {
    s.trim_matches(|c: char| c == '.' || c.is_whitespace())
}

fn fullwidth(c: char) -> Option<char> {
    match c {
        '/' => Some('／'),
        '\\' => Some('＼'),
        ':' => Some('：'),
        '*' => Some('＊'),
        '?' => Some('？'),
        '"' => Some('＂'),
        '<' => Some('＜'),
        '>' => Some('＞'),
        '|' => Some('｜'),
        _ => None,
    }
}

// ============================================================================
// Pattern parsing
// ============================================================================

#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Text(&'a str),
    Field(&'a str),
}

fn tokenize(pattern: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = pattern;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("{{") {
            tokens.push(Token::Text("{"));
            rest = after;
        } else if let Some(after) = rest.strip_prefix("}}") {
            tokens.push(Token::Text("}"));
            rest = after;
        } else if let Some(after) = rest.strip_prefix('{') {
            match after.find('}') {
                Some(end) if is_field_name(&after[..end]) => {
                    tokens.push(Token::Field(&after[..end]));
                    rest = &after[end + 1..];
                }
                _ => {
                    tokens.push(Token::Text("{"));
                    rest = after;
                }
            }
        } else {
            let end = rest.find(['{', '}']).unwrap_or(rest.len());
            // a lone '}' is plain text
            let end = if end == 0 { 1 } else { end };
            tokens.push(Token::Text(&rest[..end]));
            rest = &rest[end..];
        }
    }
    tokens
}

fn is_field_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Field value by name, accepting older spellings of field names.
fn lookup<'a>(fields: &'a FieldMap, name: &str) -> Option<&'a String> {
    fields
        .get(name)
        .or_else(|| Field::from_name(name).and_then(|field| fields.get(field.name())))
}

fn substitute(pattern: &str, fields: &FieldMap) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    for token in tokenize(pattern) {
        match token {
            Token::Text(text) => out.push_str(text),
            Token::Field(name) => match lookup(fields, name) {
                Some(value) => out.push_str(value),
                None => {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                }
            },
        }
    }
    out
}


/// Property-based tests using proptest
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    const RESERVED: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

    fn arbitrary_value() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-zA-Z0-9 ./:*?\"<>|()\\[\\]_-]{0,40}").unwrap()
    }

    proptest! {
        /// Rendered names never contain separators or reserved characters
        #[test]
        fn render_output_is_path_safe(title in arbitrary_value(), artist in arbitrary_value()) {
            let mut f = FieldMap::new();
            f.insert("track_title", title);
            f.insert("album_artist", artist);
            let out = render("{album_artist}/{track_title}", &f, NameKind::File);
            for c in RESERVED {
                prop_assert!(!out.contains(c), "found {} in {}", c, out);
            }
            prop_assert!(!out.is_empty());
            prop_assert!(!out.starts_with('.'));
        }

        /// Rendering twice gives the same string
        #[test]
        fn render_is_idempotent(title in arbitrary_value()) {
            let mut f = FieldMap::new();
            f.insert("track_title", title);
            prop_assert_eq!(
                render("{track_number} {track_title}", &f, NameKind::File),
                render("{track_number} {track_title}", &f, NameKind::File)
            );
        }

        /// Sanitizing an already sanitized name changes nothing
        #[test]
        fn sanitize_is_stable(input in arbitrary_value()) {
            let once = sanitize(&input, NameKind::Folder);
            prop_assert_eq!(sanitize(&once, NameKind::Folder), once.clone());
        }
    }
}
