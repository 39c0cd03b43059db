//! Multi-list classification
//!
//! A crawl usually loads a tracking list and an advertising list side by
//! side. Lists are consulted in the order they were added; the first list
//! that blocks a request decides its verdict. An exception rule only
//! affects its own list.

use serde::{Deserialize, Serialize};

use crate::matcher::Matcher;
use crate::types::MatchContext;

/// What a filter list is used to detect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListRole {
    Tracking,
    Advertising,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Tracker,
    Ad,
    Safe,
}

impl From<ListRole> for Verdict {
    fn from(role: ListRole) -> Self {
        match role {
            ListRole::Tracking => Self::Tracker,
            ListRole::Advertising => Self::Ad,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub verdict: Verdict,
    /// Name of the list that blocked the request
    pub list: Option<String>,
    pub rule_id: Option<u32>,
}

impl Classification {
    pub fn safe() -> Self {
        Self { verdict: Verdict::Safe, list: None, rule_id: None }
    }
}

#[derive(Debug)]
struct NamedList {
    name: String,
    role: ListRole,
    matcher: Matcher,
}

/// Ordered set of matchers, one per filter list.
#[derive(Debug, Default)]
pub struct ListMatcher {
    lists: Vec<NamedList>,
}

impl ListMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a list; earlier lists take priority.
    pub fn push(&mut self, name: impl Into<String>, role: ListRole, matcher: Matcher) {
        self.lists.push(NamedList { name: name.into(), role, matcher });
    }

    pub fn with_list(mut self, name: impl Into<String>, role: ListRole, matcher: Matcher) -> Self {
        self.push(name, role, matcher);
        self
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    pub fn matcher(&self, name: &str) -> Option<&Matcher> {
        self.lists.iter().find(|list| list.name == name).map(|list| &list.matcher)
    }

    pub fn classify(&self, url: &str, ctx: &MatchContext<'_>) -> Classification {
        for list in &self.lists {
            let decision = list.matcher.should_block(url, ctx);
            if decision.blocked {
                return Classification {
                    verdict: list.role.into(),
                    list: Some(list.name.clone()),
                    rule_id: decision.rule_id,
                };
            }
        }
        Classification::safe()
    }
}
