//! Core type definitions for TrackGate
//!
//! These types are produced by the compiler, persisted by the snapshot
//! adapter and consumed by the matching engine.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

// =============================================================================
// Rule Kinds
// =============================================================================

/// What a compiled rule does. Fixed when the rule is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Network rule that blocks matching requests
    Blocking,
    /// Exception rule (@@...) - overrides any blocking rule
    Exception,
    /// Cosmetic rule (##) - hides a CSS selector
    ElementHiding,
    /// Cosmetic exception (#@# or @@...##)
    ElementHidingException,
}

impl RuleKind {
    pub fn from_markers(is_exception: bool, is_element_hiding: bool) -> Self {
        match (is_exception, is_element_hiding) {
            (false, false) => Self::Blocking,
            (true, false) => Self::Exception,
            (false, true) => Self::ElementHiding,
            (true, true) => Self::ElementHidingException,
        }
    }

    #[inline]
    pub fn is_exception(self) -> bool {
        matches!(self, Self::Exception | Self::ElementHidingException)
    }

    #[inline]
    pub fn is_element_hiding(self) -> bool {
        matches!(self, Self::ElementHiding | Self::ElementHidingException)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blocking => "blocking",
            Self::Exception => "exception",
            Self::ElementHiding => "element_hiding",
            Self::ElementHidingException => "element_hiding_exception",
        }
    }
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Context Flags (bit flags for option requirements and request attributes)
// =============================================================================

bitflags::bitflags! {
    /// Request attributes a rule option can refer to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ContextFlags: u32 {
        const OTHER = 1 << 0;
        const SCRIPT = 1 << 1;
        const IMAGE = 1 << 2;
        const STYLESHEET = 1 << 3;
        const OBJECT = 1 << 4;
        const SUBDOCUMENT = 1 << 5;  // iframe/frame
        const DOCUMENT = 1 << 6;     // main document
        const XMLHTTPREQUEST = 1 << 7;
        const WEBSOCKET = 1 << 8;
        const FONT = 1 << 9;
        const MEDIA = 1 << 10;
        const PING = 1 << 11;
        const OBJECT_SUBREQUEST = 1 << 12;

        /// Request goes to a different origin than the page
        const THIRD_PARTY = 1 << 16;
        /// Request was opened as a popup window
        const POPUP = 1 << 17;

        /// All resource types
        const RESOURCE_TYPES = 0x1FFF;
    }
}

impl Default for ContextFlags {
    fn default() -> Self {
        Self::empty()
    }
}

impl ContextFlags {
    /// Resolve a filter option name to the attribute it constrains.
    ///
    /// The boolean is `true` for inverted aliases: `first-party` means
    /// "not third-party".
    pub fn from_option_name(name: &str) -> Option<(Self, bool)> {
        let flag = match name {
            "script" => Self::SCRIPT,
            "image" => Self::IMAGE,
            "stylesheet" => Self::STYLESHEET,
            "object" => Self::OBJECT,
            "object-subrequest" => Self::OBJECT_SUBREQUEST,
            "subdocument" => Self::SUBDOCUMENT,
            "document" => Self::DOCUMENT,
            "xmlhttprequest" | "xhr" => Self::XMLHTTPREQUEST,
            "websocket" => Self::WEBSOCKET,
            "font" => Self::FONT,
            "media" => Self::MEDIA,
            "ping" => Self::PING,
            "other" => Self::OTHER,
            "third-party" | "thirdparty" | "3p" => Self::THIRD_PARTY,
            "popup" => Self::POPUP,
            "first-party" | "firstparty" | "1p" => return Some((Self::THIRD_PARTY, true)),
            _ => return None,
        };
        Some((flag, false))
    }
}

// =============================================================================
// Resource Types
// =============================================================================

/// Resource type tag of a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Script,
    Image,
    Stylesheet,
    Object,
    ObjectSubrequest,
    Subdocument,
    Document,
    XmlHttpRequest,
    WebSocket,
    Font,
    Media,
    Ping,
    Other,
}

impl ResourceType {
    /// Parse a resource type tag, accepting the browser request type names too.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "script" => Self::Script,
            "image" | "imageset" => Self::Image,
            "stylesheet" => Self::Stylesheet,
            "object" => Self::Object,
            "object-subrequest" => Self::ObjectSubrequest,
            "subdocument" | "sub_frame" => Self::Subdocument,
            "document" | "main_frame" => Self::Document,
            "xmlhttprequest" | "xhr" | "fetch" => Self::XmlHttpRequest,
            "websocket" => Self::WebSocket,
            "font" => Self::Font,
            "media" => Self::Media,
            "ping" | "beacon" => Self::Ping,
            _ => Self::Other,
        }
    }

    pub fn flag(self) -> ContextFlags {
        match self {
            Self::Script => ContextFlags::SCRIPT,
            Self::Image => ContextFlags::IMAGE,
            Self::Stylesheet => ContextFlags::STYLESHEET,
            Self::Object => ContextFlags::OBJECT,
            Self::ObjectSubrequest => ContextFlags::OBJECT_SUBREQUEST,
            Self::Subdocument => ContextFlags::SUBDOCUMENT,
            Self::Document => ContextFlags::DOCUMENT,
            Self::XmlHttpRequest => ContextFlags::XMLHTTPREQUEST,
            Self::WebSocket => ContextFlags::WEBSOCKET,
            Self::Font => ContextFlags::FONT,
            Self::Media => ContextFlags::MEDIA,
            Self::Ping => ContextFlags::PING,
            Self::Other => ContextFlags::OTHER,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Image => "image",
            Self::Stylesheet => "stylesheet",
            Self::Object => "object",
            Self::ObjectSubrequest => "object-subrequest",
            Self::Subdocument => "subdocument",
            Self::Document => "document",
            Self::XmlHttpRequest => "xmlhttprequest",
            Self::WebSocket => "websocket",
            Self::Font => "font",
            Self::Media => "media",
            Self::Ping => "ping",
            Self::Other => "other",
        }
    }
}

// =============================================================================
// Rule Options
// =============================================================================

/// Parsed `$option` list of a network rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOptions {
    /// Attributes listed as bare `key`
    pub required: ContextFlags,
    /// Attributes listed as `~key`
    pub forbidden: ContextFlags,
    /// Options that do not name a request attribute (`match-case`, `collapse`, ...)
    pub other: BTreeMap<String, bool>,
    /// `key=value` options other than `domain=`, kept verbatim
    pub values: BTreeMap<String, String>,
}

impl RuleOptions {
    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
            && self.forbidden.is_empty()
            && self.other.is_empty()
            && self.values.is_empty()
    }

    /// Record a bare option token. `enabled` is false for `~key`.
    pub fn set(&mut self, name: &str, enabled: bool) {
        match ContextFlags::from_option_name(name) {
            Some((flag, inverted)) => {
                let (add, remove) = if enabled != inverted {
                    (&mut self.required, &mut self.forbidden)
                } else {
                    (&mut self.forbidden, &mut self.required)
                };
                add.insert(flag);
                remove.remove(flag);
            }
            None => {
                self.other.insert(name.to_string(), enabled);
            }
        }
    }

    /// Name -> requirement view of the options. `Some(true)` means the rule
    /// only applies when the attribute is present, `Some(false)` means never.
    pub fn get(&self, name: &str) -> Option<bool> {
        match ContextFlags::from_option_name(name) {
            Some((flag, inverted)) => {
                let state = if self.required.contains(flag) {
                    Some(true)
                } else if self.forbidden.contains(flag) {
                    Some(false)
                } else {
                    None
                };
                state.map(|s| s != inverted)
            }
            None => self.other.get(name).copied(),
        }
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// `$match-case` - match the pattern case-sensitively.
    pub fn match_case(&self) -> bool {
        self.other.get("match-case").copied().unwrap_or(false)
    }
}

// =============================================================================
// Domain Scope
// =============================================================================

/// Where a rule applies (`$domain=` or the prefix of a `##` rule).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainScope {
    pub include: BTreeSet<String>,
    pub exclude: BTreeSet<String>,
}

impl DomainScope {
    /// No include and no exclude entries.
    #[inline]
    pub fn is_unrestricted(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Add one domain token; a leading `~` marks an exclusion.
    pub fn add_token(&mut self, token: &str) {
        let token = token.trim();
        let (is_exclude, domain) = match token.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, token),
        };
        let domain = domain.trim().trim_end_matches('.').to_ascii_lowercase();
        if domain.is_empty() {
            return;
        }
        if is_exclude {
            self.exclude.insert(domain);
        } else {
            self.include.insert(domain);
        }
    }

    /// Domains listed both with and without `~`.
    pub fn conflicts(&self) -> impl Iterator<Item = &str> {
        self.include.intersection(&self.exclude).map(String::as_str)
    }
}

// =============================================================================
// Selectors
// =============================================================================

/// First simple selector of an element-hiding selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    Id,
    Class,
    Attribute,
    Tag,
    Other,
}

/// Attribute selector operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrOp {
    /// `[attr]`
    Exists,
    /// `[attr=v]`
    Equals,
    /// `[attr^=v]`
    Prefix,
    /// `[attr$=v]`
    Suffix,
    /// `[attr*=v]`
    Contains,
    /// `[attr~=v]`
    Word,
    /// `[attr|=v]`
    DashMatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeConstraint {
    pub name: String,
    pub op: AttrOp,
    pub value: Option<String>,
}

/// Structured view of a selector, for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorInfo {
    pub kind: SelectorKind,
    pub name: String,
    pub attributes: Vec<AttributeConstraint>,
    /// CSS properties named by a `[style=...]` / `[style^=...]` constraint
    pub style_properties: Vec<String>,
    /// Number of combinator steps (`>`, `+`, `~`, descendant)
    pub combinators: usize,
}

/// Element-hiding selector. Matching treats `text` as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    pub text: String,
    pub info: Option<SelectorInfo>,
}

// =============================================================================
// Rules
// =============================================================================

/// One compiled filter directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: u32,
    pub raw: String,
    pub kind: RuleKind,
    /// Translated regex; present for network rules only
    pub pattern: Option<String>,
    pub options: RuleOptions,
    pub domain_scope: DomainScope,
    /// Present for element-hiding rules only
    pub selector: Option<Selector>,
}

/// The four partitions produced by one compilation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    blocking: Vec<Rule>,
    exceptions: Vec<Rule>,
    element_hiding: Vec<Rule>,
    element_hiding_exceptions: Vec<Rule>,
}

impl RuleSet {
    /// Partition rules by kind, keeping their relative order.
    pub fn from_rules(rules: impl IntoIterator<Item = Rule>) -> Self {
        let mut set = Self::default();
        for rule in rules {
            match rule.kind {
                RuleKind::Blocking => set.blocking.push(rule),
                RuleKind::Exception => set.exceptions.push(rule),
                RuleKind::ElementHiding => set.element_hiding.push(rule),
                RuleKind::ElementHidingException => set.element_hiding_exceptions.push(rule),
            }
        }
        set
    }

    pub fn partition(&self, kind: RuleKind) -> &[Rule] {
        match kind {
            RuleKind::Blocking => &self.blocking,
            RuleKind::Exception => &self.exceptions,
            RuleKind::ElementHiding => &self.element_hiding,
            RuleKind::ElementHidingException => &self.element_hiding_exceptions,
        }
    }

    pub fn blocking(&self) -> &[Rule] {
        &self.blocking
    }

    pub fn exceptions(&self) -> &[Rule] {
        &self.exceptions
    }

    pub fn element_hiding(&self) -> &[Rule] {
        &self.element_hiding
    }

    pub fn element_hiding_exceptions(&self) -> &[Rule] {
        &self.element_hiding_exceptions
    }

    pub fn len(&self) -> usize {
        self.blocking.len()
            + self.exceptions.len()
            + self.element_hiding.len()
            + self.element_hiding_exceptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All rules, partition by partition.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.blocking
            .iter()
            .chain(&self.exceptions)
            .chain(&self.element_hiding)
            .chain(&self.element_hiding_exceptions)
    }

    pub fn get(&self, id: u32) -> Option<&Rule> {
        self.iter().find(|rule| rule.id == id)
    }
}

// =============================================================================
// Match Context
// =============================================================================

/// Attributes of one request being matched.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchContext<'a> {
    /// Requesting (page) domain
    pub domain: Option<&'a str>,
    pub resource_type: Option<ResourceType>,
    pub third_party: bool,
    pub popup: bool,
    /// Any further attributes
    pub extra: ContextFlags,
}

impl<'a> MatchContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_domain(mut self, domain: &'a str) -> Self {
        self.domain = Some(domain);
        self
    }

    pub fn with_resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = Some(resource_type);
        self
    }

    pub fn third_party(mut self, third_party: bool) -> Self {
        self.third_party = third_party;
        self
    }

    pub fn popup(mut self, popup: bool) -> Self {
        self.popup = popup;
        self
    }

    pub fn with_flags(mut self, flags: ContextFlags) -> Self {
        self.extra |= flags;
        self
    }

    /// All attributes carried by this context.
    pub fn flags(&self) -> ContextFlags {
        let mut flags = self.extra;
        if let Some(resource_type) = self.resource_type {
            flags |= resource_type.flag();
        }
        if self.third_party {
            flags |= ContextFlags::THIRD_PARTY;
        }
        if self.popup {
            flags |= ContextFlags::POPUP;
        }
        flags
    }
}

// =============================================================================
// Decision
// =============================================================================

/// Result of a block query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub blocked: bool,
    /// Blocking rule that fired; absent when not blocked
    pub rule_id: Option<u32>,
    /// Exception rule that overrode blocking, for diagnostics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_id: Option<u32>,
}

impl Decision {
    /// Nothing matched.
    pub const fn allow() -> Self {
        Self { blocked: false, rule_id: None, exception_id: None }
    }

    /// An exception rule matched.
    pub const fn allowed_by(exception_id: u32) -> Self {
        Self { blocked: false, rule_id: None, exception_id: Some(exception_id) }
    }

    pub const fn block(rule_id: u32) -> Self {
        Self { blocked: true, rule_id: Some(rule_id), exception_id: None }
    }
}
