//! Filter pattern to regex translation
//!
//! Handles the Adblock pattern grammar:
//!
//! | syntax          | meaning                                              |
//! |-----------------|------------------------------------------------------|
//! | `/re/`          | raw regular expression                               |
//! | `\|\|host`      | optional scheme and subdomains, then `host`          |
//! | `\|` (leading)  | match from the start of the URL                      |
//! | `\|` (trailing) | match through the end of the URL                     |
//! | `*`             | any sequence of characters                           |
//! | `^`             | one separator character, or the end of the URL       |
//!
//! Everything else is literal text.

/// Regex for the `^` separator placeholder.
pub const SEPARATOR: &str = r"(?:[^a-zA-Z0-9_\-.%]|$)";

/// Prefix emitted for `||host` rules.
pub const HOST_ANCHOR_PREFIX: &str = r"^(?:https?://)?(?:[^/?#]+\.)?";

/// Boundary required after the host of `||host^` and `||host|`.
pub const HOST_BOUNDARY: &str = r"(?:[/?#]|$)";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslateError {
    #[error("empty pattern")]
    Empty,
    #[error("pattern has no literal text and would match every URL")]
    Degenerate,
    #[error("malformed anchor: {0}")]
    MalformedAnchor(&'static str),
    #[error("invalid regex: {0}")]
    InvalidRegex(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    None,
    Start,
    Host,
}

/// Translate a rule body (no `@@`, no `$options`) into a regex.
pub fn translate(body: &str) -> Result<String, TranslateError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(TranslateError::Empty);
    }

    if let Some(inner) = regex_literal(body) {
        return translate_regex_literal(inner);
    }

    let (anchor, rest) = if let Some(rest) = body.strip_prefix("||") {
        (Anchor::Host, rest)
    } else if let Some(rest) = body.strip_prefix('|') {
        (Anchor::Start, rest)
    } else {
        (Anchor::None, body)
    };

    if rest.starts_with('|') {
        return Err(TranslateError::MalformedAnchor("too many leading pipes"));
    }

    let (rest, end_anchor) = match rest.strip_suffix('|') {
        Some(stripped) => (stripped, true),
        None => (rest, false),
    };

    if rest.contains('|') {
        return Err(TranslateError::MalformedAnchor("pipe inside pattern"));
    }

    match anchor {
        Anchor::Host => translate_host_anchored(rest, end_anchor),
        Anchor::Start | Anchor::None => {
            if !has_literal_text(rest) {
                return Err(TranslateError::Degenerate);
            }
            let mut out = String::with_capacity(rest.len() * 2);
            if anchor == Anchor::Start {
                out.push('^');
            }
            push_segment(&mut out, rest);
            if end_anchor {
                out.push('$');
            }
            Ok(out)
        }
    }
}

/// Inner text of a `/.../` body.
fn regex_literal(body: &str) -> Option<&str> {
    if body.len() > 1 && body.starts_with('/') && body.ends_with('/') {
        Some(&body[1..body.len() - 1])
    } else {
        None
    }
}

fn translate_regex_literal(inner: &str) -> Result<String, TranslateError> {
    if inner.is_empty() {
        return Err(TranslateError::Degenerate);
    }
    let compiled = regex::Regex::new(inner).map_err(|e| TranslateError::InvalidRegex(e.to_string()))?;
    // Matching "" means matching at some position of every URL
    if compiled.is_match("") {
        return Err(TranslateError::Degenerate);
    }
    Ok(inner.to_string())
}

fn translate_host_anchored(rest: &str, end_anchor: bool) -> Result<String, TranslateError> {
    let rest = rest.strip_prefix('.').unwrap_or(rest);
    let host_end = rest
        .find(|c: char| matches!(c, '^' | '/' | '*' | '?' | ':'))
        .unwrap_or(rest.len());
    let host = &rest[..host_end];
    if host.is_empty() {
        return Err(TranslateError::MalformedAnchor("host anchor without a host"));
    }

    let mut out = String::with_capacity(HOST_ANCHOR_PREFIX.len() + rest.len() * 2);
    out.push_str(HOST_ANCHOR_PREFIX);
    out.push_str(&regex::escape(host));

    let mut remainder = &rest[host_end..];
    let mut end_anchor = end_anchor;
    if let Some(after) = remainder.strip_prefix('^') {
        out.push_str(HOST_BOUNDARY);
        remainder = after;
    } else if remainder.is_empty() && end_anchor {
        out.push_str(HOST_BOUNDARY);
        end_anchor = false;
    }

    push_segment(&mut out, remainder);
    if end_anchor {
        out.push('$');
    }
    Ok(out)
}

/// Anything besides wildcards and separators.
fn has_literal_text(segment: &str) -> bool {
    segment.chars().any(|c| c != '*' && c != '^')
}

/// Append a pattern segment: `*` and `^` become regex, the rest is escaped.
fn push_segment(out: &mut String, segment: &str) {
    let mut literal = String::new();
    for c in segment.chars() {
        match c {
            '*' | '^' => {
                if !literal.is_empty() {
                    out.push_str(&regex::escape(&literal));
                    literal.clear();
                }
                out.push_str(if c == '*' { ".*" } else { SEPARATOR });
            }
            _ => literal.push(c),
        }
    }
    if !literal.is_empty() {
        out.push_str(&regex::escape(&literal));
    }
}
