//! TrackGate Core Library
//!
//! This crate provides the rule model and matching engine for TrackGate.
//!
//! # Architecture
//!
//! Filter lists are compiled once (see the `tg-compiler` crate) into an
//! immutable [`RuleSet`]. A [`Matcher`] wraps the rule set with compiled
//! patterns and a shared domain cache, and answers block and element hiding
//! queries from any number of threads.
//!
//! # Modules
//!
//! - `types`: Rule model, match context and decisions
//! - `domain`: Domain suffix chains, scope evaluation and the suffix cache
//! - `matcher`: Two-phase (exception, then blocking) request matching
//! - `classify`: Verdicts across several filter lists
//! - `snapshot`: JSON persistence of compiled rule sets
//! - `url`: URL helpers for building match contexts
//! - `config`: Engine configuration

pub mod classify;
pub mod config;
pub mod domain;
pub mod matcher;
pub mod snapshot;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use classify::{Classification, ListMatcher, ListRole, Verdict};
pub use config::EngineConfig;
pub use domain::{applies, suffix_chain, DomainVariantCache};
pub use matcher::Matcher;
pub use types::{
    ContextFlags, Decision, DomainScope, MatchContext, ResourceType, Rule, RuleKind, RuleOptions,
    RuleSet, Selector, SelectorInfo,
};
