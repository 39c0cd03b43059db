//! Element hiding selector decomposition
//!
//! The matcher treats selectors as opaque text. This breakdown only feeds
//! diagnostics (which ids, classes and attributes a list targets).

use tg_core::types::{AttrOp, AttributeConstraint, SelectorInfo, SelectorKind};

/// Decompose a CSS selector. Returns `None` for an empty selector.
pub fn parse_selector(text: &str) -> Option<SelectorInfo> {
    let text = text.trim();
    let first = text.chars().next()?;

    let kind = match first {
        '#' => SelectorKind::Id,
        '.' => SelectorKind::Class,
        '[' => SelectorKind::Attribute,
        c if c.is_ascii_alphabetic() => SelectorKind::Tag,
        _ => SelectorKind::Other,
    };

    let attributes = attribute_groups(text)
        .into_iter()
        .filter_map(parse_attribute)
        .collect::<Vec<_>>();

    let name = match kind {
        SelectorKind::Id | SelectorKind::Class => simple_name(&text[1..]),
        SelectorKind::Tag => simple_name(text),
        SelectorKind::Attribute => attributes.first().map(|a| a.name.clone()).unwrap_or_default(),
        SelectorKind::Other => String::new(),
    };

    let style_properties = attributes
        .iter()
        .filter(|a| a.name.eq_ignore_ascii_case("style"))
        .filter_map(|a| a.value.as_deref())
        .flat_map(style_property_names)
        .collect();

    Some(SelectorInfo {
        kind,
        name,
        attributes,
        style_properties,
        combinators: count_combinators(text),
    })
}

/// Leading identifier (up to the next selector syntax character).
fn simple_name(text: &str) -> String {
    text.chars()
        .take_while(|c| c.is_alphanumeric() || *c == '-' || *c == '_' || *c == '\\')
        .collect()
}

/// Contents of every top-level `[...]` group, honoring quotes.
fn attribute_groups(text: &str) -> Vec<&str> {
    let mut groups = Vec::new();
    let mut start = None;
    let mut quote: Option<char> = None;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' if start.is_some() => quote = Some(c),
            '[' if start.is_none() => start = Some(i + 1),
            ']' => {
                if let Some(s) = start.take() {
                    groups.push(&text[s..i]);
                }
            }
            _ => {}
        }
    }

    groups
}

fn parse_attribute(group: &str) -> Option<AttributeConstraint> {
    const OPS: [(&str, AttrOp); 6] = [
        ("^=", AttrOp::Prefix),
        ("$=", AttrOp::Suffix),
        ("*=", AttrOp::Contains),
        ("~=", AttrOp::Word),
        ("|=", AttrOp::DashMatch),
        ("=", AttrOp::Equals),
    ];

    let group = group.trim();
    let Some(eq) = group.find('=') else {
        return (!group.is_empty()).then(|| AttributeConstraint {
            name: group.to_string(),
            op: AttrOp::Exists,
            value: None,
        });
    };

    // Two-character operators end at the '='
    let (name_end, op) = OPS
        .iter()
        .find(|(token, _)| token.len() == 2 && eq >= 1 && group[..=eq].ends_with(token))
        .map(|&(_, op)| (eq - 1, op))
        .unwrap_or((eq, AttrOp::Equals));

    let name = group[..name_end].trim();
    if name.is_empty() {
        return None;
    }

    Some(AttributeConstraint {
        name: name.to_string(),
        op,
        value: Some(unquote(&group[eq + 1..]).to_string()),
    })
}

/// Strip surrounding quotes and a trailing ` i` / ` s` flag.
fn unquote(value: &str) -> &str {
    let mut value = value.trim();
    for flag in [" i", " s", " I", " S"] {
        if let Some(stripped) = value.strip_suffix(flag) {
            value = stripped.trim_end();
        }
    }
    for q in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// `"width: 300px; height: 250px;"` -> `["width", "height"]`
fn style_property_names(style: &str) -> Vec<String> {
    style
        .split(';')
        .filter_map(|decl| decl.split(':').next())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Count combinator steps outside brackets, parentheses and quotes.
fn count_combinators(text: &str) -> usize {
    let mut count = 0;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut pending_space = false;
    let mut after_combinator = true;

    for c in text.trim().chars() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            _ if depth > 0 => {}
            '>' | '+' | '~' => {
                count += 1;
                pending_space = false;
                after_combinator = true;
                continue;
            }
            c if c.is_whitespace() => {
                pending_space = true;
                continue;
            }
            _ => {}
        }

        // Whitespace between two compound selectors is a descendant combinator
        if pending_space && !after_combinator {
            count += 1;
        }
        pending_space = false;
        after_combinator = false;
    }

    count
}
