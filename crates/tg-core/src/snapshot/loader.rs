//! Snapshot save/load with validation

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::types::{RuleKind, RuleSet};
use super::format::*;

/// Error type for snapshot loading.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid format tag: {0}")]
    InvalidFormat(String),
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u32),
    #[error("Rule count mismatch: stored={stored}, actual={actual}")]
    CountMismatch { stored: usize, actual: usize },
    #[error("Duplicate rule id: {0}")]
    DuplicateRuleId(u32),
    #[error("Rule {id} stored in the {expected} partition but has kind {found}")]
    KindMismatch { id: u32, expected: RuleKind, found: RuleKind },
    #[error("Network rule {0} has no pattern")]
    MissingPattern(u32),
    #[error("Element hiding rule {0} has no selector")]
    MissingSelector(u32),
}

/// Serialize a rule set.
pub fn save(rules: &RuleSet) -> Result<Vec<u8>, SnapshotError> {
    let envelope = Envelope {
        format: SNAPSHOT_FORMAT.to_string(),
        version: SNAPSHOT_VERSION,
        rule_count: rules.len(),
        rules,
    };
    Ok(serde_json::to_vec_pretty(&envelope)?)
}

/// Deserialize and validate a rule set.
pub fn load(data: &[u8]) -> Result<RuleSet, SnapshotError> {
    let envelope: Envelope<RuleSet> = serde_json::from_slice(data)?;

    if envelope.format != SNAPSHOT_FORMAT {
        return Err(SnapshotError::InvalidFormat(envelope.format));
    }
    if envelope.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(envelope.version));
    }
    if envelope.rule_count != envelope.rules.len() {
        return Err(SnapshotError::CountMismatch {
            stored: envelope.rule_count,
            actual: envelope.rules.len(),
        });
    }

    validate(&envelope.rules)?;
    Ok(envelope.rules)
}

/// Check the invariants `compile` guarantees, for rule sets from outside.
pub fn validate(rules: &RuleSet) -> Result<(), SnapshotError> {
    let mut seen = HashSet::with_capacity(rules.len());

    for kind in [
        RuleKind::Blocking,
        RuleKind::Exception,
        RuleKind::ElementHiding,
        RuleKind::ElementHidingException,
    ] {
        for rule in rules.partition(kind) {
            if !seen.insert(rule.id) {
                return Err(SnapshotError::DuplicateRuleId(rule.id));
            }
            if rule.kind != kind {
                return Err(SnapshotError::KindMismatch {
                    id: rule.id,
                    expected: kind,
                    found: rule.kind,
                });
            }
            if kind.is_element_hiding() {
                if rule.selector.is_none() {
                    return Err(SnapshotError::MissingSelector(rule.id));
                }
            } else if rule.pattern.as_deref().map_or(true, str::is_empty) {
                return Err(SnapshotError::MissingPattern(rule.id));
            }
        }
    }

    Ok(())
}

pub fn save_to_path(path: &Path, rules: &RuleSet) -> Result<(), SnapshotError> {
    let bytes = save(rules)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, bytes)?;
    log::debug!("wrote {} rules to {}", rules.len(), path.display());
    Ok(())
}

pub fn load_from_path(path: &Path) -> Result<RuleSet, SnapshotError> {
    let bytes = fs::read(path)?;
    load(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DomainScope, Rule, RuleOptions, Selector};

    fn network_rule(id: u32, kind: RuleKind, pattern: &str) -> Rule {
        let mut options = RuleOptions::default();
        options.set("script", true);
        options.set("third-party", false);
        options.values.insert("csp".to_string(), "script-src 'self'".to_string());
        let mut domain_scope = DomainScope::default();
        domain_scope.add_token("example.com");
        domain_scope.add_token("~safe.example.com");
        Rule {
            id,
            raw: format!("raw-{id}"),
            kind,
            pattern: Some(pattern.to_string()),
            options,
            domain_scope,
            selector: None,
        }
    }

    fn hiding_rule(id: u32, selector: &str) -> Rule {
        Rule {
            id,
            raw: format!("##{selector}"),
            kind: RuleKind::ElementHiding,
            pattern: None,
            options: RuleOptions::default(),
            domain_scope: DomainScope::default(),
            selector: Some(Selector { text: selector.to_string(), info: None }),
        }
    }

    fn sample() -> RuleSet {
        RuleSet::from_rules(vec![
            network_rule(0, RuleKind::Blocking, r"^ads\.js"),
            network_rule(1, RuleKind::Exception, r"good"),
            hiding_rule(2, ".ad-banner"),
        ])
    }

    #[test]
    fn test_round_trip() {
        let rules = sample();
        let bytes = save(&rules).expect("save");
        let loaded = load(&bytes).expect("load");
        assert_eq!(loaded, rules);
        assert_eq!(loaded.get(1).map(|r| r.kind), Some(RuleKind::Exception));
    }

    #[test]
    fn test_round_trip_empty() {
        let rules = RuleSet::default();
        let loaded = load(&save(&rules).expect("save")).expect("load");
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_round_trip_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("rules.json");
        save_to_path(&path, &sample()).expect("save to path");
        assert_eq!(load_from_path(&path).expect("load from path"), sample());
    }

    #[test]
    fn test_rejects_wrong_format() {
        let text = r#"{"format":"other","version":1,"rule_count":0,"rules":{"blocking":[],"exceptions":[],"element_hiding":[],"element_hiding_exceptions":[]}}"#;
        assert!(matches!(load(text.as_bytes()), Err(SnapshotError::InvalidFormat(_))));
    }

    #[test]
    fn test_rejects_wrong_version() {
        let text = r#"{"format":"trackgate-rules","version":9,"rule_count":0,"rules":{"blocking":[],"exceptions":[],"element_hiding":[],"element_hiding_exceptions":[]}}"#;
        assert!(matches!(load(text.as_bytes()), Err(SnapshotError::UnsupportedVersion(9))));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(load(b"not json"), Err(SnapshotError::Json(_))));
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let rules = RuleSet::from_rules(vec![
            network_rule(4, RuleKind::Blocking, "a"),
            network_rule(4, RuleKind::Exception, "b"),
        ]);
        let bytes = save(&rules).expect("save");
        assert!(matches!(load(&bytes), Err(SnapshotError::DuplicateRuleId(4))));
    }

    #[test]
    fn test_rejects_misplaced_rule() {
        let rules = sample();
        let mut value: serde_json::Value = serde_json::from_slice(&save(&rules).expect("save")).expect("json");
        value["rules"]["blocking"][0]["kind"] = serde_json::Value::String("exception".to_string());
        let bytes = serde_json::to_vec(&value).expect("json");
        assert!(matches!(load(&bytes), Err(SnapshotError::KindMismatch { id: 0, .. })));
    }

    #[test]
    fn test_rejects_missing_pattern() {
        let mut rule = network_rule(0, RuleKind::Blocking, "x");
        rule.pattern = None;
        let bytes = save(&RuleSet::from_rules(vec![rule])).expect("save");
        assert!(matches!(load(&bytes), Err(SnapshotError::MissingPattern(0))));
    }
}
