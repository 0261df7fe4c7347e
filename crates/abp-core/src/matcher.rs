//! Rule Set Matching
//!
//! A [`RuleSet`] owns every compiled rule and one [`RuleIndex`] per polarity.
//! Whitelist (exception) rules are consulted first and always win.
//! The set is immutable once built and can be shared between threads freely.

use crate::index::RuleIndex;
use crate::rule::Rule;
use crate::types::{MatchDecision, RequestContext};

/// Result of matching a URL, with the rule that decided it.
#[derive(Debug, Clone, Copy)]
pub struct MatchResult<'r> {
    pub decision: MatchDecision,
    /// Deciding rule; `None` when nothing matched
    pub rule: Option<&'r Rule>,
}

impl MatchResult<'_> {
    pub fn is_blocked(&self) -> bool {
        self.decision == MatchDecision::Block
    }
}

/// The compiled, queryable form of a batch of rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    blacklist: RuleIndex,
    whitelist: RuleIndex,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>, blacklist: RuleIndex, whitelist: RuleIndex) -> Self {
        Self {
            rules,
            blacklist,
            whitelist,
        }
    }

    /// Whether `url` should be blocked. Exceptions take precedence.
    pub fn should_block(&self, url: &str, ctx: &RequestContext<'_>) -> bool {
        if self.is_whitelisted(url, ctx) {
            return false;
        }
        self.is_blacklisted(url, ctx)
    }

    pub fn is_whitelisted(&self, url: &str, ctx: &RequestContext<'_>) -> bool {
        self.whitelist.matches(&self.rules, url, ctx)
    }

    pub fn is_blacklisted(&self, url: &str, ctx: &RequestContext<'_>) -> bool {
        self.blacklist.matches(&self.rules, url, ctx)
    }

    /// Same decision as [`should_block`](Self::should_block), reporting the deciding rule.
    pub fn decide(&self, url: &str, ctx: &RequestContext<'_>) -> MatchResult<'_> {
        if let Some(rule) = self.whitelist.find(&self.rules, url, ctx) {
            return MatchResult {
                decision: MatchDecision::Allow,
                rule: Some(rule),
            };
        }

        match self.blacklist.find(&self.rules, url, ctx) {
            Some(rule) => MatchResult {
                decision: MatchDecision::Block,
                rule: Some(rule),
            },
            None => MatchResult {
                decision: MatchDecision::Allow,
                rule: None,
            },
        }
    }

    /// Every rule held by the set, in insertion order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn blacklist(&self) -> &RuleIndex {
        &self.blacklist
    }

    pub fn whitelist(&self) -> &RuleIndex {
        &self.whitelist
    }

    /// Option-free blocking rules (the ones behind the combined regex).
    pub fn blacklist_rules(&self) -> impl Iterator<Item = &Rule> + '_ {
        self.resolve(self.blacklist.simple_ids())
    }

    /// Option-free exception rules.
    pub fn whitelist_rules(&self) -> impl Iterator<Item = &Rule> + '_ {
        self.resolve(self.whitelist.simple_ids())
    }

    fn resolve<'a>(&'a self, ids: &'a [u32]) -> impl Iterator<Item = &'a Rule> + 'a {
        ids.iter().filter_map(move |&id| self.rules.get(id as usize))
    }
}
