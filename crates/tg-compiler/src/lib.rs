//! TrackGate Filter List Compiler
//!
//! This crate compiles Adblock Plus style filter lists into a [`RuleSet`]
//! ready for [`tg_core::Matcher`]. Lines that cannot be compiled are
//! dropped with a warning; compilation itself never fails.

pub mod parser;
pub mod selector;
pub mod translate;

use tg_core::types::{Rule, RuleSet};

pub use parser::{parse_rule, RuleError};
pub use selector::parse_selector;
pub use translate::{translate, TranslateError};

/// Line accounting for one compile run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileStats {
    /// Lines read, including blanks and comments
    pub lines: usize,
    /// Blank and comment lines, and hosts entries with nothing to block
    pub skipped: usize,
    pub accepted: usize,
    /// Lines that looked like rules but failed to compile
    pub dropped: usize,
}

/// Compile the full text of a filter list.
pub fn compile(text: &str) -> RuleSet {
    compile_lines(text.lines())
}

pub fn compile_lines<I, S>(lines: I) -> RuleSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    compile_with_stats(lines).0
}

/// Compile and report how many lines were accepted, skipped and dropped.
///
/// Rule ids are assigned sequentially, in input order, to accepted rules.
pub fn compile_with_stats<I, S>(lines: I) -> (RuleSet, CompileStats)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut stats = CompileStats::default();
    let mut rules: Vec<Rule> = Vec::new();

    for (index, raw_line) in lines.into_iter().enumerate() {
        stats.lines += 1;
        let line = raw_line.as_ref().trim();
        if line.is_empty() || parser::is_comment_line(line) {
            stats.skipped += 1;
            continue;
        }

        let id = rules.len() as u32;
        match parse_rule(line, id) {
            Ok(rule) => {
                for domain in rule.domain_scope.conflicts() {
                    log::debug!("line {}: {} is both included and excluded", index + 1, domain);
                }
                rules.push(rule);
            }
            Err(RuleError::IgnoredHostsEntry) => {
                log::debug!("line {}: ignoring hosts entry: {}", index + 1, line);
                stats.skipped += 1;
            }
            Err(RuleError::UnsupportedCosmetic(syntax)) => {
                log::debug!("line {}: skipping {} rule: {}", index + 1, syntax, line);
                stats.dropped += 1;
            }
            Err(err) => {
                log::warn!("line {}: dropping rule '{}': {}", index + 1, line, err);
                stats.dropped += 1;
            }
        }
    }

    stats.accepted = rules.len();
    log::info!(
        "compiled {} rules from {} lines ({} skipped, {} dropped)",
        stats.accepted,
        stats.lines,
        stats.skipped,
        stats.dropped
    );

    (RuleSet::from_rules(rules), stats)
}
