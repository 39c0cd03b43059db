//! Core Matching Engine
//!
//! Every request goes through [`Matcher::should_block`]. The rule set is
//! immutable after construction; the only shared mutable state is the
//! domain suffix cache, so one `Matcher` can serve many worker threads.
//!
//! # Precedence
//!
//! Block queries run in two phases:
//!
//! 1. **Exceptions.** The first exception rule that fires allows the request,
//!    no matter how many blocking rules would match.
//! 2. **Blocking.** Otherwise the first blocking rule that fires, in list
//!    order, blocks the request and is reported as evidence.
//!
//! A rule fires when its domain scope applies to the requesting domain, the
//! request carries none of the rule's `~option` attributes, and its pattern
//! matches the URL. Positive options (`$script`, `$third-party`, ...) only
//! gate matching when [`EngineConfig::strict_type_options`] is set.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use regex::{Regex, RegexBuilder};

use crate::config::EngineConfig;
use crate::domain::{applies_chain, DomainVariantCache};
use crate::types::{ContextFlags, Decision, MatchContext, Rule, RuleKind, RuleOptions, RuleSet};

// =============================================================================
// Matcher
// =============================================================================

/// Network rule with its compiled pattern.
#[derive(Debug)]
struct CompiledEntry {
    /// Position in the rule set partition
    index: usize,
    regex: Regex,
}

/// The core matching engine.
#[derive(Debug)]
pub struct Matcher {
    rules: RuleSet,
    exceptions: Vec<CompiledEntry>,
    blocking: Vec<CompiledEntry>,
    by_id: HashMap<u32, (RuleKind, usize)>,
    cache: DomainVariantCache,
    strict_type_options: bool,
}

impl Matcher {
    /// Create a matcher with the default configuration.
    pub fn new(rules: RuleSet) -> Self {
        Self::with_config(rules, &EngineConfig::default())
    }

    /// Create a matcher, compiling every network pattern once.
    ///
    /// A pattern that does not compile (only possible for rule sets that did
    /// not come from the compiler) is logged and its rule never fires.
    pub fn with_config(rules: RuleSet, config: &EngineConfig) -> Self {
        let exceptions = compile_partition(rules.exceptions());
        let blocking = compile_partition(rules.blocking());

        let mut by_id = HashMap::with_capacity(rules.len());
        for kind in [
            RuleKind::Blocking,
            RuleKind::Exception,
            RuleKind::ElementHiding,
            RuleKind::ElementHidingException,
        ] {
            for (index, rule) in rules.partition(kind).iter().enumerate() {
                by_id.insert(rule.id, (kind, index));
            }
        }

        log::debug!(
            "matcher ready: {} blocking, {} exception, {} element hiding rules",
            blocking.len(),
            exceptions.len(),
            rules.element_hiding().len(),
        );

        Self {
            rules,
            exceptions,
            blocking,
            by_id,
            cache: DomainVariantCache::new(config.domain_cache_capacity),
            strict_type_options: config.strict_type_options,
        }
    }

    pub fn rule_set(&self) -> &RuleSet {
        &self.rules
    }

    pub fn cache(&self) -> &DomainVariantCache {
        &self.cache
    }

    /// Look up a rule by id (decision evidence).
    pub fn rule(&self, id: u32) -> Option<&Rule> {
        let &(kind, index) = self.by_id.get(&id)?;
        self.rules.partition(kind).get(index)
    }

    /// Decide whether a request should be blocked.
    pub fn should_block(&self, url: &str, ctx: &MatchContext<'_>) -> Decision {
        let chain = self.domain_chain(ctx.domain);
        let flags = ctx.flags();

        // Phase 1: exceptions have absolute priority
        if let Some(rule) = self.first_firing(&self.exceptions, RuleKind::Exception, url, &chain, flags) {
            return Decision::allowed_by(rule.id);
        }

        // Phase 2: first blocking rule in list order
        if let Some(rule) = self.first_firing(&self.blocking, RuleKind::Blocking, url, &chain, flags) {
            return Decision::block(rule.id);
        }

        Decision::allow()
    }

    /// Selectors of every element hiding rule that applies on `domain`,
    /// in list order. Element hiding exceptions are not subtracted.
    pub fn get_element_hiding_selectors(&self, domain: Option<&str>) -> Vec<String> {
        let chain = self.domain_chain(domain);
        self.rules
            .element_hiding()
            .iter()
            .filter(|rule| applies_chain(&chain, &rule.domain_scope))
            .filter_map(|rule| rule.selector.as_ref().map(|s| s.text.clone()))
            .collect()
    }

    /// Like [`Self::get_element_hiding_selectors`], minus selectors disabled
    /// on `domain` by an element hiding exception with the same selector.
    pub fn visible_selectors(&self, domain: Option<&str>) -> Vec<String> {
        let chain = self.domain_chain(domain);

        let disabled: HashSet<&str> = self
            .rules
            .element_hiding_exceptions()
            .iter()
            .filter(|rule| applies_chain(&chain, &rule.domain_scope))
            .filter_map(|rule| rule.selector.as_ref().map(|s| s.text.as_str()))
            .collect();

        self.rules
            .element_hiding()
            .iter()
            .filter(|rule| applies_chain(&chain, &rule.domain_scope))
            .filter_map(|rule| rule.selector.as_ref())
            .filter(|selector| !disabled.contains(selector.text.as_str()))
            .map(|selector| selector.text.clone())
            .collect()
    }

    fn domain_chain(&self, domain: Option<&str>) -> Arc<[String]> {
        match domain {
            Some(domain) if !domain.trim().is_empty() => self.cache.get_or_insert(domain),
            _ => Arc::from(Vec::<String>::new()),
        }
    }

    fn first_firing(
        &self,
        entries: &[CompiledEntry],
        kind: RuleKind,
        url: &str,
        chain: &[String],
        flags: ContextFlags,
    ) -> Option<&Rule> {
        let partition = self.rules.partition(kind);
        entries
            .iter()
            .map(|entry| (entry, &partition[entry.index]))
            .find(|(entry, rule)| {
                applies_chain(chain, &rule.domain_scope)
                    && options_allow(&rule.options, flags, self.strict_type_options)
                    && entry.regex.is_match(url)
            })
            .map(|(_, rule)| rule)
    }
}

/// Patterns match case-insensitively unless the rule sets `$match-case`.
/// Engines that compile filter regexes as-is are case-sensitive for every
/// rule, so an uppercase pattern here can match more URLs than it would there.
fn compile_partition(rules: &[Rule]) -> Vec<CompiledEntry> {
    rules
        .iter()
        .enumerate()
        .filter_map(|(index, rule)| {
            let pattern = rule.pattern.as_deref()?;
            match RegexBuilder::new(pattern)
                .case_insensitive(!rule.options.match_case())
                .build()
            {
                Ok(regex) => Some(CompiledEntry { index, regex }),
                Err(e) => {
                    log::warn!("rule {} ({}) has an unusable pattern: {}", rule.id, rule.raw, e);
                    None
                }
            }
        })
        .collect()
}

/// Check a rule's options against the request attributes.
fn options_allow(options: &RuleOptions, flags: ContextFlags, strict: bool) -> bool {
    // `~option`: never fire on a request carrying the attribute
    if options.forbidden.intersects(flags) {
        return false;
    }

    if strict {
        let required_types = options.required & ContextFlags::RESOURCE_TYPES;
        if !required_types.is_empty() && !required_types.intersects(flags) {
            return false;
        }
        let required_attrs = options.required - ContextFlags::RESOURCE_TYPES;
        if !flags.contains(required_attrs) {
            return false;
        }
    }

    true
}
