//! Per-polarity rule index.
//!
//! Each [`RuleIndex`] holds one half (blacklist or whitelist) of a rule set,
//! split three ways:
//!
//! - simple rules, folded into one combined regex for a single-pass check
//! - rules with a require-present `domain=` entry, keyed by that domain
//! - rules carrying options but no required domain, scanned in order
//!
//! Rule ids index into the owning rule set's rule vector.

use std::collections::HashMap;

use regex::Regex;

use crate::domain::{fold_domain, walk_domain_variants};
use crate::rule::Rule;
use crate::types::RequestContext;

#[derive(Debug, Clone, Default)]
pub struct RuleIndex {
    combined: Option<Regex>,
    simple: Vec<u32>,
    by_domain: HashMap<String, Vec<u32>>,
    with_options: Vec<u32>,
}

impl RuleIndex {
    pub fn new(
        combined: Option<Regex>,
        simple: Vec<u32>,
        by_domain: HashMap<String, Vec<u32>>,
        with_options: Vec<u32>,
    ) -> Self {
        Self {
            combined,
            simple,
            by_domain,
            with_options,
        }
    }

    /// Combined alternation of every simple rule, absent when there are none.
    pub fn combined(&self) -> Option<&Regex> {
        self.combined.as_ref()
    }

    pub fn simple_ids(&self) -> &[u32] {
        &self.simple
    }

    pub fn by_domain(&self) -> &HashMap<String, Vec<u32>> {
        &self.by_domain
    }

    pub fn with_options_ids(&self) -> &[u32] {
        &self.with_options
    }

    /// Total number of index entries (a rule keyed under several domains counts once per key).
    pub fn len(&self) -> usize {
        self.simple.len()
            + self.by_domain.values().map(Vec::len).sum::<usize>()
            + self.with_options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether any rule of this polarity matches.
    pub fn matches(&self, rules: &[Rule], url: &str, ctx: &RequestContext<'_>) -> bool {
        if let Some(combined) = &self.combined {
            if combined.is_match(url) {
                return true;
            }
        }

        self.find_candidate(rules, url, ctx).is_some()
    }

    /// First matching rule of this polarity.
    ///
    /// When the combined regex fires, the simple rules are scanned in
    /// insertion order to recover which one matched.
    pub fn find<'r>(&self, rules: &'r [Rule], url: &str, ctx: &RequestContext<'_>) -> Option<&'r Rule> {
        if let Some(combined) = &self.combined {
            if combined.is_match(url) {
                let hit = self
                    .simple
                    .iter()
                    .filter_map(|&id| rules.get(id as usize))
                    .find(|rule| rule.pattern().is_some_and(|p| p.is_match(url)));
                if hit.is_some() {
                    return hit;
                }
            }
        }

        self.find_candidate(rules, url, ctx)
    }

    /// Domain-keyed rules for the context domain's variant chain, then option-only rules.
    fn find_candidate<'r>(
        &self,
        rules: &'r [Rule],
        url: &str,
        ctx: &RequestContext<'_>,
    ) -> Option<&'r Rule> {
        if let Some(domain) = ctx.domain {
            if !self.by_domain.is_empty() {
                let domain = fold_domain(domain);
                for variant in walk_domain_variants(&domain) {
                    let Some(ids) = self.by_domain.get(variant) else {
                        continue;
                    };
                    if let Some(rule) = first_match(rules, ids, url, ctx) {
                        return Some(rule);
                    }
                }
            }
        }

        first_match(rules, &self.with_options, url, ctx)
    }
}

fn first_match<'r>(
    rules: &'r [Rule],
    ids: &[u32],
    url: &str,
    ctx: &RequestContext<'_>,
) -> Option<&'r Rule> {
    ids.iter()
        .filter_map(|&id| rules.get(id as usize))
        .find(|rule| rule.matches_url(url, ctx))
}
