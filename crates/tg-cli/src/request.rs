//! Request records for `check`, `classify` and `batch`

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use tg_core::url::{extract_host, infer_resource_type, is_third_party};
use tg_core::{Decision, MatchContext, Matcher, ResourceType};

/// One request to evaluate. Mirrors a JSON line of `batch` input.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Request {
    pub url: String,
    /// Requesting domain; defaults to the host of `page`
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default, rename = "type")]
    pub resource_type: Option<String>,
    /// Defaults to comparing the origins of `url` and `page`
    #[serde(default)]
    pub third_party: Option<bool>,
    #[serde(default)]
    pub popup: bool,
    /// URL of the page that issued the request
    #[serde(default)]
    pub page: Option<String>,
}

impl Request {
    pub fn domain(&self) -> Option<&str> {
        self.domain
            .as_deref()
            .or_else(|| self.page.as_deref().and_then(extract_host))
    }

    /// Explicit type tag, else a guess from the URL's file extension.
    pub fn resource_type(&self) -> Option<ResourceType> {
        match self.resource_type.as_deref() {
            Some(tag) => Some(ResourceType::from_tag(tag)),
            None => infer_resource_type(&self.url),
        }
    }

    pub fn third_party(&self) -> bool {
        self.third_party.unwrap_or_else(|| {
            self.page
                .as_deref()
                .is_some_and(|page| is_third_party(&self.url, page))
        })
    }

    pub fn context(&self) -> MatchContext<'_> {
        let mut ctx = MatchContext::new()
            .third_party(self.third_party())
            .popup(self.popup);
        if let Some(domain) = self.domain() {
            ctx = ctx.with_domain(domain);
        }
        if let Some(resource_type) = self.resource_type() {
            ctx = ctx.with_resource_type(resource_type);
        }
        ctx
    }
}

/// One JSON line of `batch` output.
#[derive(Debug, Serialize)]
pub struct Outcome<'a> {
    pub url: &'a str,
    #[serde(flatten)]
    pub decision: Decision,
    /// Raw text of the blocking rule
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<&'a str>,
}

/// Parse JSON-lines input. Blank lines are ignored.
pub fn parse_requests(text: &str) -> Result<Vec<Request>, String> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|e| format!("Invalid request on line {}: {}", index + 1, e))
        })
        .collect()
}

/// Evaluate requests on a pool of `workers` threads, keeping input order.
pub fn evaluate_all(matcher: &Matcher, requests: &[Request], workers: usize) -> Result<Vec<String>, String> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| format!("Failed to start worker pool: {}", e))?;

    pool.install(|| {
        requests
            .par_iter()
            .map(|request| {
                let decision = matcher.should_block(&request.url, &request.context());
                let outcome = Outcome {
                    url: &request.url,
                    decision,
                    rule: decision
                        .rule_id
                        .and_then(|id| matcher.rule(id))
                        .map(|rule| rule.raw.as_str()),
                };
                serde_json::to_string(&outcome).map_err(|e| format!("Failed to encode result: {}", e))
            })
            .collect()
    })
}
