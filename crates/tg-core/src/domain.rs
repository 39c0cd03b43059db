//! Domain scope evaluation
//!
//! A rule's domain scope is checked against every dot-delimited suffix of
//! the requesting domain, most specific first:
//!
//! ```
//! use tg_core::domain::suffix_chain;
//!
//! assert_eq!(
//!     suffix_chain("a.b.example.com"),
//!     vec!["a.b.example.com", "b.example.com", "example.com", "com"],
//! );
//! ```
//!
//! The bare top-level label is part of the chain, so a scope listing `com`
//! covers every `.com` domain.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::types::DomainScope;

/// Default number of domains kept by [`DomainVariantCache`].
pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

// =============================================================================
// Suffix Chain
// =============================================================================

/// Get the parent domain (strip leftmost label).
pub fn get_parent_domain(host: &str) -> Option<&str> {
    match host.find('.') {
        Some(idx) if idx < host.len() - 1 => Some(&host[idx + 1..]),
        _ => None,
    }
}

/// Iterator over a domain and each of its parents.
pub struct SuffixIter<'a> {
    current: Option<&'a str>,
}

impl<'a> Iterator for SuffixIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.current?;
        self.current = get_parent_domain(result);
        Some(result)
    }
}

/// Walk suffixes of an already normalized host, most specific first.
pub fn walk_suffixes(host: &str) -> SuffixIter<'_> {
    SuffixIter {
        current: if host.is_empty() { None } else { Some(host) },
    }
}

/// Lower-case a domain and drop surrounding dots.
pub fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_matches('.').to_ascii_lowercase()
}

/// Ordered suffix chain of `domain`. Empty for an empty domain.
pub fn suffix_chain(domain: &str) -> Vec<String> {
    let normalized = normalize_domain(domain);
    walk_suffixes(&normalized).map(str::to_string).collect()
}

// =============================================================================
// Scope Evaluation
// =============================================================================

/// Decide whether a rule with `scope` applies on `domain`.
///
/// An absent domain has no suffixes, so only scopes without includes apply.
pub fn applies(domain: Option<&str>, scope: &DomainScope) -> bool {
    if scope.is_unrestricted() {
        return true;
    }
    let chain = domain.map(suffix_chain).unwrap_or_default();
    applies_chain(&chain, scope)
}

/// Same as [`applies`], for a precomputed suffix chain.
pub fn applies_chain<S: AsRef<str>>(chain: &[S], scope: &DomainScope) -> bool {
    if scope.is_unrestricted() {
        return true;
    }

    // Exclusion wins over inclusion
    if !scope.exclude.is_empty()
        && chain.iter().any(|suffix| scope.exclude.contains(suffix.as_ref()))
    {
        return false;
    }

    if !scope.include.is_empty() {
        return chain.iter().any(|suffix| scope.include.contains(suffix.as_ref()));
    }

    true
}

// =============================================================================
// Domain Variant Cache
// =============================================================================

/// Shared memo of domain -> suffix chain.
///
/// Safe for concurrent use: lookups take a read lock, a miss computes the
/// chain without holding any lock and then inserts under the write lock.
/// Two workers missing on the same key both compute the same chain; the first
/// insert is kept. Values are handed out as `Arc`s, so a reader never sees a
/// partially built chain. Once `capacity` entries are stored the map is
/// cleared before the next insert.
#[derive(Debug)]
pub struct DomainVariantCache {
    capacity: usize,
    entries: RwLock<HashMap<String, Arc<[String]>>>,
}

impl Default for DomainVariantCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl DomainVariantCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Suffix chain of `domain`, computing and storing it on a miss.
    ///
    /// Entries are keyed by the normalized domain, so `Example.COM.` and
    /// `example.com` share one slot.
    pub fn get_or_insert(&self, domain: &str) -> Arc<[String]> {
        let key = normalize_domain(domain);
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(chain) = entries.get(&key) {
                return Arc::clone(chain);
            }
        }

        let chain: Arc<[String]> = walk_suffixes(&key).map(str::to_string).collect();

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = entries.get(&key) {
            return Arc::clone(existing);
        }
        if entries.len() >= self.capacity {
            log::debug!("domain cache full ({} entries), clearing", entries.len());
            entries.clear();
        }
        entries.insert(key, Arc::clone(&chain));
        chain
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
