use std::net::IpAddr;

use tg_core::types::{DomainScope, Rule, RuleKind, RuleOptions, Selector};

use crate::selector::parse_selector;
use crate::translate::{translate, TranslateError};

/// Why a single filter line was dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error(transparent)]
    Pattern(#[from] TranslateError),
    #[error("element hiding rule without a selector")]
    EmptySelector,
    #[error("unsupported cosmetic syntax '{0}'")]
    UnsupportedCosmetic(&'static str),
    /// `127.0.0.1 localhost`, `0.0.0.0 0.0.0.0`, a lone address, ...
    #[error("hosts entry without a blockable host")]
    IgnoredHostsEntry,
}

/// Cosmetic separators this compiler does not implement.
const UNSUPPORTED_COSMETIC: [&str; 5] = ["#?#", "#@?#", "#$#", "#@$#", "#%#"];

pub fn is_comment_line(line: &str) -> bool {
    line.starts_with('!') || line.starts_with('[')
}

/// Parse one trimmed, non-comment filter line into a rule with the given id.
pub fn parse_rule(line: &str, id: u32) -> Result<Rule, RuleError> {
    if let Some(result) = parse_hosts_file_rule(line, id) {
        return result;
    }

    let (is_exception, body) = match line.strip_prefix("@@") {
        Some(rest) => (true, rest.trim_start()),
        None => (false, line),
    };

    if let Some((pos, separator)) = find_cosmetic_separator(body) {
        return parse_element_hiding(line, id, is_exception, body, pos, separator);
    }

    if let Some(separator) = UNSUPPORTED_COSMETIC.iter().find(|s| body.contains(*s)) {
        return Err(RuleError::UnsupportedCosmetic(separator));
    }

    let (pattern_text, options_text) = split_rule_options(body);
    let mut options = RuleOptions::default();
    let mut domain_scope = DomainScope::default();
    if let Some(options_text) = options_text {
        parse_options(options_text, &mut options, &mut domain_scope);
    }

    let pattern = translate(pattern_text)?;

    Ok(Rule {
        id,
        raw: line.to_string(),
        kind: RuleKind::from_markers(is_exception, false),
        pattern: Some(pattern),
        options,
        domain_scope,
        selector: None,
    })
}

/// Position and separator of the first `##` or `#@#`.
fn find_cosmetic_separator(body: &str) -> Option<(usize, &'static str)> {
    let hide = body.find("##").map(|pos| (pos, "##"));
    let unhide = body.find("#@#").map(|pos| (pos, "#@#"));
    match (hide, unhide) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn parse_element_hiding(
    line: &str,
    id: u32,
    is_exception: bool,
    body: &str,
    pos: usize,
    separator: &str,
) -> Result<Rule, RuleError> {
    let domains = &body[..pos];
    let selector_text = body[pos + separator.len()..].trim();
    if selector_text.is_empty() {
        return Err(RuleError::EmptySelector);
    }

    let mut domain_scope = DomainScope::default();
    for token in domains.split(',') {
        domain_scope.add_token(token);
    }

    let is_exception = is_exception || separator == "#@#";

    Ok(Rule {
        id,
        raw: line.to_string(),
        kind: RuleKind::from_markers(is_exception, true),
        pattern: None,
        options: RuleOptions::default(),
        domain_scope,
        selector: Some(Selector {
            text: selector_text.to_string(),
            info: parse_selector(selector_text),
        }),
    })
}

/// Split at the last unescaped `$`. A `/regex/` body keeps its own `$`s.
fn split_rule_options(body: &str) -> (&str, Option<&str>) {
    if body.len() > 1 && body.starts_with('/') && body.ends_with('/') {
        return (body, None);
    }

    let bytes = body.as_bytes();
    let dollar = (0..bytes.len())
        .rev()
        .find(|&i| bytes[i] == b'$' && (i == 0 || bytes[i - 1] != b'\\'));

    match dollar {
        Some(pos) => (&body[..pos], Some(&body[pos + 1..])),
        None => (body, None),
    }
}

fn parse_options(text: &str, options: &mut RuleOptions, domain_scope: &mut DomainScope) {
    for raw in text.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        if let Some((key, value)) = raw.split_once('=') {
            let key = key.trim().to_ascii_lowercase();
            if key == "domain" {
                for token in value.split('|') {
                    domain_scope.add_token(token);
                }
            } else {
                options.values.insert(key, value.to_string());
            }
            continue;
        }

        let name = raw.to_ascii_lowercase();
        match name.strip_prefix('~') {
            Some(negated) => options.set(negated, false),
            None => options.set(&name, true),
        }
    }
}

/// `0.0.0.0 tracker.example.com` is treated like `||tracker.example.com^`.
///
/// Returns `None` when the line does not start with an IP address. Any line
/// that does is a hosts entry: it becomes a rule or is rejected, never
/// reparsed as a URL pattern.
fn parse_hosts_file_rule(line: &str, id: u32) -> Option<Result<Rule, RuleError>> {
    let mut parts = line.split_whitespace();
    parts.next()?.parse::<IpAddr>().ok()?;

    let Some(second) = parts.next() else {
        return Some(Err(RuleError::IgnoredHostsEntry));
    };
    if !second
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-' || b == b'_')
    {
        return Some(Err(RuleError::IgnoredHostsEntry));
    }

    let host = second.trim_matches('.').to_ascii_lowercase();
    if host.is_empty()
        || host == "localhost"
        || host.starts_with("localhost.")
        || host.parse::<IpAddr>().is_ok()
    {
        return Some(Err(RuleError::IgnoredHostsEntry));
    }

    let pattern = match translate(&format!("||{host}^")) {
        Ok(pattern) => pattern,
        Err(err) => return Some(Err(err.into())),
    };
    Some(Ok(Rule {
        id,
        raw: line.to_string(),
        kind: RuleKind::Blocking,
        pattern: Some(pattern),
        options: RuleOptions::default(),
        domain_scope: DomainScope::default(),
        selector: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tg_core::types::{ContextFlags, SelectorKind};

    #[test]
    fn parses_blocking_rule_with_options() {
        let rule = parse_rule("||ads.example.com^$script,~third-party,domain=a.com|~b.a.com", 3)
            .expect("rule should parse");
        assert_eq!(rule.id, 3);
        assert_eq!(rule.kind, RuleKind::Blocking);
        assert!(rule.options.required.contains(ContextFlags::SCRIPT));
        assert!(rule.options.forbidden.contains(ContextFlags::THIRD_PARTY));
        assert!(rule.domain_scope.include.contains("a.com"));
        assert!(rule.domain_scope.exclude.contains("b.a.com"));
        assert_eq!(
            rule.pattern.as_deref(),
            Some(r"^(?:https?://)?(?:[^/?#]+\.)?ads\.example\.com(?:[/?#]|$)")
        );
    }

    #[test]
    fn parses_exception_rule() {
        let rule = parse_rule("@@||ads.example.com^$domain=example.com", 0).expect("rule");
        assert_eq!(rule.kind, RuleKind::Exception);
        assert_eq!(rule.raw, "@@||ads.example.com^$domain=example.com");
        assert!(rule.domain_scope.include.contains("example.com"));
    }

    #[test]
    fn keeps_value_options_verbatim() {
        let rule = parse_rule("||example.com^$csp=script-src 'self',redirect=noop.js", 0).expect("rule");
        assert_eq!(rule.options.value("csp"), Some("script-src 'self'"));
        assert_eq!(rule.options.value("redirect"), Some("noop.js"));
    }

    #[test]
    fn unknown_bare_options_are_recorded() {
        let rule = parse_rule("/ads/$collapse,~match-case", 0).expect("rule");
        assert_eq!(rule.options.get("collapse"), Some(true));
        assert_eq!(rule.options.get("match-case"), Some(false));
        assert!(!rule.options.match_case());
    }

    #[test]
    fn splits_at_last_unescaped_dollar() {
        assert_eq!(split_rule_options("a$b$script"), ("a$b", Some("script")));
        assert_eq!(split_rule_options(r"a\$b"), (r"a\$b", None));
        assert_eq!(split_rule_options(r"/ads\.js$/"), (r"/ads\.js$/", None));
        assert_eq!(split_rule_options(r"/ads\.js$/$image"), (r"/ads\.js$/", Some("image")));
    }

    #[test]
    fn parses_element_hiding_rules() {
        let rule = parse_rule("example.com,~sub.example.com##.ad-banner", 1).expect("rule");
        assert_eq!(rule.kind, RuleKind::ElementHiding);
        assert!(rule.pattern.is_none());
        assert!(rule.domain_scope.include.contains("example.com"));
        assert!(rule.domain_scope.exclude.contains("sub.example.com"));
        let selector = rule.selector.expect("selector");
        assert_eq!(selector.text, ".ad-banner");
        assert_eq!(selector.info.map(|i| i.kind), Some(SelectorKind::Class));
    }

    #[test]
    fn element_hiding_selector_may_contain_dollar() {
        let rule = parse_rule(r#"##a[href$=".exe"]"#, 0).expect("rule");
        assert_eq!(rule.selector.map(|s| s.text), Some(r#"a[href$=".exe"]"#.to_string()));
        assert!(rule.domain_scope.is_unrestricted());
    }

    #[test]
    fn parses_element_hiding_exceptions() {
        // A bare `#@#` unhides on its own; it is not filed under plain
        // element hiding the way some list parsers do.
        let rule = parse_rule("example.com#@#.ad", 0).expect("rule");
        assert_eq!(rule.kind, RuleKind::ElementHidingException);

        let rule = parse_rule("@@example.com##.ad", 0).expect("rule");
        assert_eq!(rule.kind, RuleKind::ElementHidingException);
    }

    #[test]
    fn rejects_bad_lines() {
        assert_eq!(parse_rule("example.com##", 0), Err(RuleError::EmptySelector));
        assert!(matches!(parse_rule("example.com#?#div:has(.ad)", 0), Err(RuleError::UnsupportedCosmetic(_))));
        assert!(matches!(parse_rule("@@", 0), Err(RuleError::Pattern(TranslateError::Empty))));
        assert!(matches!(parse_rule("*$image", 0), Err(RuleError::Pattern(TranslateError::Degenerate))));
        assert!(matches!(parse_rule("/ad(s/", 0), Err(RuleError::Pattern(TranslateError::InvalidRegex(_)))));
        assert!(matches!(parse_rule("/.*/", 0), Err(RuleError::Pattern(TranslateError::Degenerate))));
        assert!(matches!(parse_rule("@@/a*/$script", 0), Err(RuleError::Pattern(TranslateError::Degenerate))));
    }

    #[test]
    fn parses_hosts_file_entries() {
        let rule = parse_rule("0.0.0.0 tracker.example.com", 4).expect("rule");
        assert_eq!(rule.kind, RuleKind::Blocking);
        assert_eq!(rule.raw, "0.0.0.0 tracker.example.com");
        assert!(rule.pattern.as_deref().is_some_and(|p| p.contains(r"tracker\.example\.com")));

        // Not a hosts entry at all: left to pattern translation
        assert!(parse_hosts_file_rule("||tracker.example.com^", 0).is_none());
    }

    #[test]
    fn ignores_hosts_entries_without_a_host() {
        for line in [
            "127.0.0.1 localhost",
            "127.0.0.1 localhost.localdomain",
            "0.0.0.0 0.0.0.0",
            "::1 localhost",
            "0.0.0.0",
            "0.0.0.0 bad/host",
        ] {
            assert_eq!(parse_rule(line, 0), Err(RuleError::IgnoredHostsEntry), "{line}");
        }
    }

    #[test]
    fn comment_lines() {
        assert!(is_comment_line("! Title: EasyList"));
        assert!(is_comment_line("[Adblock Plus 2.0]"));
        assert!(!is_comment_line("||ads.example.com^"));
    }
}
