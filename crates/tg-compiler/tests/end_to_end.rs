//! Compile, persist, reload and query filter lists end to end.

use std::sync::Arc;
use std::thread;

use tg_compiler::{compile, compile_with_stats};
use tg_core::snapshot;
use tg_core::{
    Classification, EngineConfig, ListMatcher, ListRole, MatchContext, Matcher, ResourceType,
    RuleKind, Verdict,
};

const EASYLIST_SAMPLE: &str = "\
[Adblock Plus 2.0]
! Title: EasyList sample
! Expires: 4 days

||ads.example.com^
@@||ads.example.com^$domain=example.com
||track.example.com^$domain=news.example.com
/banner/*.png$image
||example.com^$~third-party
|http://popup.example.net^$popup
||cdn.example.org/ads/$script,match-case
example.com##.ad-banner
~shop.example.com,example.com###sidebar-ad
example.com#@##sidebar-ad
##a[href$=\".exe\"]
*$image
||
example.com#$#body { overflow: auto; }
0.0.0.0 metrics.tracker.net
";

fn matcher() -> Matcher {
    Matcher::new(compile(EASYLIST_SAMPLE))
}

fn rule_id(matcher: &Matcher, raw: &str) -> u32 {
    matcher
        .rule_set()
        .iter()
        .find(|rule| rule.raw == raw)
        .map(|rule| rule.id)
        .unwrap_or_else(|| panic!("rule {raw} should be compiled"))
}

#[test]
fn test_malformed_lines_do_not_abort() {
    let (rules, stats) = compile_with_stats(EASYLIST_SAMPLE.lines());
    assert_eq!(stats.dropped, 3);
    assert_eq!(stats.accepted, rules.len());
    assert_eq!(rules.len(), 12);
    assert_eq!(rules.blocking().len(), 7);
    assert_eq!(rules.exceptions().len(), 1);
    assert_eq!(rules.element_hiding().len(), 3);
    assert_eq!(rules.element_hiding_exceptions().len(), 1);
}

#[test]
fn test_snapshot_round_trip() {
    let rules = compile(EASYLIST_SAMPLE);
    let bytes = snapshot::save(&rules).expect("save");
    let loaded = snapshot::load(&bytes).expect("load");
    assert_eq!(loaded, rules);

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("lists").join("easylist.json");
    snapshot::save_to_path(&path, &rules).expect("save to path");
    let loaded = snapshot::load_from_path(&path).expect("load from path");
    assert_eq!(loaded, rules);

    // A reloaded rule set answers queries exactly like the compiled one
    let compiled = Matcher::new(rules);
    let reloaded = Matcher::new(loaded);
    let ctx = MatchContext::new().with_domain("blog.example.org");
    for url in [
        "http://ads.example.com/x.js",
        "https://cdn.example.com/banner/123.png",
        "http://safe.example.org/",
    ] {
        assert_eq!(compiled.should_block(url, &ctx), reloaded.should_block(url, &ctx));
    }
}

#[test]
fn test_exception_priority() {
    let matcher = matcher();
    let ctx = MatchContext::new().with_domain("example.com");
    let decision = matcher.should_block("http://ads.example.com/x.js", &ctx);
    assert!(!decision.blocked);
    assert_eq!(decision.rule_id, None);
    assert_eq!(
        decision.exception_id,
        Some(rule_id(&matcher, "@@||ads.example.com^$domain=example.com"))
    );

    // Exception scope covers subdomains of example.com
    let ctx = MatchContext::new().with_domain("www.example.com");
    assert!(!matcher.should_block("http://ads.example.com/x.js", &ctx).blocked);

    // Elsewhere the blocking rule wins
    let ctx = MatchContext::new().with_domain("other.org");
    let decision = matcher.should_block("http://ads.example.com/x.js", &ctx);
    assert!(decision.blocked);
    assert_eq!(decision.rule_id, Some(rule_id(&matcher, "||ads.example.com^")));
}

#[test]
fn test_domain_scoping() {
    let matcher = matcher();
    let url = "http://track.example.com/p.gif";

    let ctx = MatchContext::new().with_domain("other.example.com").third_party(true);
    assert!(!matcher.should_block(url, &ctx).blocked);

    let ctx = MatchContext::new().with_domain("news.example.com").third_party(true);
    assert!(matcher.should_block(url, &ctx).blocked);

    // No requesting domain: scoped rules never apply
    assert!(!matcher.should_block(url, &MatchContext::new().third_party(true)).blocked);
}

#[test]
fn test_wildcard_rule_reports_its_id() {
    let matcher = matcher();
    let ctx = MatchContext::new().with_resource_type(ResourceType::Image);
    let decision = matcher.should_block("http://cdn.example.com/banner/123.png", &ctx);
    assert!(decision.blocked);
    assert_eq!(decision.rule_id, Some(rule_id(&matcher, "/banner/*.png$image")));
}

#[test]
fn test_negative_option_exclusion() {
    let matcher = matcher();
    let url = "https://example.com/index.html";

    let ctx = MatchContext::new().third_party(true);
    assert!(!matcher.should_block(url, &ctx).blocked);

    let ctx = MatchContext::new().third_party(false);
    assert!(matcher.should_block(url, &ctx).blocked);
}

#[test]
fn test_positive_options_are_advisory_unless_strict() {
    let url = "http://popup.example.net/window";

    let lenient = matcher();
    assert!(lenient.should_block(url, &MatchContext::new()).blocked);

    let config = EngineConfig { strict_type_options: true, ..EngineConfig::default() };
    let strict = Matcher::with_config(compile(EASYLIST_SAMPLE), &config);
    assert!(!strict.should_block(url, &MatchContext::new()).blocked);
    assert!(strict.should_block(url, &MatchContext::new().popup(true)).blocked);
}

#[test]
fn test_match_case_option() {
    let matcher = matcher();
    let ctx = MatchContext::new().with_resource_type(ResourceType::Script);
    assert!(matcher.should_block("https://cdn.example.org/ads/a.js", &ctx).blocked);
    assert!(!matcher.should_block("https://cdn.example.org/ADS/a.js", &ctx).blocked);

    // Without match-case, patterns ignore case
    assert!(matcher.should_block("HTTP://ADS.EXAMPLE.COM/X.JS", &MatchContext::new()).blocked);
}

#[test]
fn test_hosts_file_entry_blocks_subdomains() {
    let matcher = matcher();
    let decision = matcher.should_block("https://eu.metrics.tracker.net/collect", &MatchContext::new());
    assert!(decision.blocked);
    assert_eq!(decision.rule_id, Some(rule_id(&matcher, "0.0.0.0 metrics.tracker.net")));
}

#[test]
fn test_element_hiding_selectors() {
    let matcher = matcher();

    let selectors = matcher.get_element_hiding_selectors(Some("example.com"));
    assert!(selectors.contains(&".ad-banner".to_string()));
    let selectors = matcher.get_element_hiding_selectors(Some("sub.example.com"));
    assert!(selectors.contains(&".ad-banner".to_string()));
    let selectors = matcher.get_element_hiding_selectors(Some("other.com"));
    assert!(!selectors.contains(&".ad-banner".to_string()));

    // The generic rule applies everywhere, even without a domain
    assert_eq!(matcher.get_element_hiding_selectors(None), vec![r#"a[href$=".exe"]"#.to_string()]);

    // Excluded subdomain
    let selectors = matcher.get_element_hiding_selectors(Some("shop.example.com"));
    assert!(!selectors.contains(&"#sidebar-ad".to_string()));
}

#[test]
fn test_visible_selectors_subtract_exceptions() {
    let matcher = matcher();
    let all = matcher.get_element_hiding_selectors(Some("example.com"));
    let visible = matcher.visible_selectors(Some("example.com"));
    assert!(all.contains(&"#sidebar-ad".to_string()));
    assert!(!visible.contains(&"#sidebar-ad".to_string()));
    assert!(visible.contains(&".ad-banner".to_string()));
}

#[test]
fn test_selector_info_is_filled() {
    let rules = compile(EASYLIST_SAMPLE);
    let rule = rules
        .element_hiding()
        .iter()
        .find(|rule| rule.raw == r#"##a[href$=".exe"]"#)
        .expect("generic rule");
    assert_eq!(rule.kind, RuleKind::ElementHiding);
    let info = rule.selector.as_ref().and_then(|s| s.info.as_ref()).expect("selector info");
    assert_eq!(info.name, "a");
    assert_eq!(info.attributes.len(), 1);
}

#[test]
fn test_repeated_queries_are_identical() {
    let matcher = matcher();
    let ctx = MatchContext::new().with_domain("news.example.com");
    let first = matcher.should_block("http://track.example.com/p.gif", &ctx);
    for _ in 0..100 {
        assert_eq!(matcher.should_block("http://track.example.com/p.gif", &ctx), first);
    }
}

#[test]
fn test_concurrent_queries_share_one_matcher() {
    let matcher = Arc::new(matcher());
    let domains = ["example.com", "news.example.com", "other.example.com", "a.b.c.example.org"];

    let expected: Vec<_> = domains
        .iter()
        .map(|domain| {
            let ctx = MatchContext::new().with_domain(domain);
            (
                matcher.should_block("http://ads.example.com/x.js", &ctx),
                matcher.should_block("http://track.example.com/p.gif", &ctx),
            )
        })
        .collect();
    matcher.cache().clear();

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let matcher = Arc::clone(&matcher);
            thread::spawn(move || {
                let mut seen = Vec::new();
                for i in 0..200 {
                    let domain = domains[(worker + i) % domains.len()];
                    let ctx = MatchContext::new().with_domain(domain);
                    seen.push((
                        domain,
                        matcher.should_block("http://ads.example.com/x.js", &ctx),
                        matcher.should_block("http://track.example.com/p.gif", &ctx),
                    ));
                }
                seen
            })
        })
        .collect();

    for handle in handles {
        for (domain, ads, track) in handle.join().expect("worker panicked") {
            let index = domains.iter().position(|d| *d == domain).expect("known domain");
            assert_eq!((ads, track), expected[index]);
        }
    }
    assert_eq!(matcher.cache().len(), domains.len());
}

#[test]
fn test_multi_list_classification() {
    let tracking = Matcher::new(compile("||metrics.tracker.net^\n@@||metrics.tracker.net/optout^\n"));
    let ads = Matcher::new(compile("||ads.example.com^\n/optout\n"));
    let lists = ListMatcher::new()
        .with_list("privacy", ListRole::Tracking, tracking)
        .with_list("ads", ListRole::Advertising, ads);

    let ctx = MatchContext::new();
    let result = lists.classify("https://metrics.tracker.net/collect", &ctx);
    assert_eq!(result.verdict, Verdict::Tracker);
    assert_eq!(result.list.as_deref(), Some("privacy"));

    let result = lists.classify("https://ads.example.com/banner.js", &ctx);
    assert_eq!(result.verdict, Verdict::Ad);

    // Allowed by the tracking list's exception, still caught by the ad list
    let result = lists.classify("https://metrics.tracker.net/optout", &ctx);
    assert_eq!(result.verdict, Verdict::Ad);
    assert_eq!(result.rule_id, Some(1));

    assert_eq!(lists.classify("https://example.org/", &ctx), Classification::safe());
}

#[test]
fn test_empty_list_blocks_nothing() {
    let matcher = Matcher::new(compile(""));
    assert!(matcher.rule_set().is_empty());
    assert!(!matcher.should_block("http://ads.example.com/", &MatchContext::new()).blocked);
    assert!(matcher.get_element_hiding_selectors(Some("example.com")).is_empty());
}
