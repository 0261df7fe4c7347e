//! Compiled filter rules.
//!
//! A [`Rule`] is produced once by the compiler and never mutated afterwards.
//! Rules own their compiled [`Pattern`] and know how to decide, for a single
//! URL and request context, whether they apply.

use std::collections::BTreeMap;

use regex::{Regex, RegexBuilder};

use crate::domain::{fold_domain, walk_domain_variants};
use crate::types::{BinaryOption, BinaryOptions, OptionMask, RequestContext, RuleKind};

// =============================================================================
// Pattern
// =============================================================================

/// A rule's regex source together with its compiled form.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    match_case: bool,
    regex: Regex,
}

impl Pattern {
    /// Compile `source`, case-insensitively unless `match_case` is set.
    pub fn new(source: impl Into<String>, match_case: bool) -> Result<Self, regex::Error> {
        let source = source.into();
        let regex = RegexBuilder::new(&source)
            .case_insensitive(!match_case)
            .build()?;
        Ok(Self {
            source,
            match_case,
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match_case(&self) -> bool {
        self.match_case
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    #[inline]
    pub fn is_match(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.match_case == other.match_case
    }
}

impl Eq for Pattern {}

// =============================================================================
// Rule Options
// =============================================================================

/// Options parsed from the `$...` suffix of a rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RuleOptions {
    /// Binary options: `true` requires the flag present, `false` absent
    pub binary: BinaryOptions,
    /// `domain=` entries: `true` restricts to the domain, `false` excludes it
    pub domains: BTreeMap<String, bool>,
    /// Option tokens outside the known vocabulary
    pub unknown: Vec<String>,
}

impl RuleOptions {
    pub fn is_empty(&self) -> bool {
        self.binary.is_empty() && self.domains.is_empty() && self.unknown.is_empty()
    }

    /// True if at least one `domain=` entry is require-present.
    pub fn has_required_domain(&self) -> bool {
        self.domains.values().any(|&required| required)
    }
}

// =============================================================================
// Rule
// =============================================================================

/// One compiled filter directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    raw: String,
    text: String,
    kind: RuleKind,
    is_exception: bool,
    options: RuleOptions,
    pattern: Option<Pattern>,
}

impl Rule {
    /// Assemble a rule. Comment and element-hiding rules never carry a
    /// pattern or the exception flag.
    pub fn new(
        raw: impl Into<String>,
        text: impl Into<String>,
        kind: RuleKind,
        is_exception: bool,
        options: RuleOptions,
        pattern: Option<Pattern>,
    ) -> Self {
        let standard = kind == RuleKind::Standard;
        Self {
            raw: raw.into(),
            text: text.into(),
            kind,
            is_exception: standard && is_exception,
            options,
            pattern: if standard { pattern } else { None },
        }
    }

    /// The original line.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Rule text with the exception marker and options stripped.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    pub fn is_comment(&self) -> bool {
        self.kind == RuleKind::Comment
    }

    pub fn is_element_hiding(&self) -> bool {
        self.kind == RuleKind::ElementHiding
    }

    pub fn is_exception(&self) -> bool {
        self.is_exception
    }

    pub fn pattern(&self) -> Option<&Pattern> {
        self.pattern.as_ref()
    }

    /// Regex source, empty for rules without a pattern.
    pub fn regex_string(&self) -> &str {
        self.pattern.as_ref().map_or("", Pattern::as_str)
    }

    pub fn options(&self) -> &RuleOptions {
        &self.options
    }

    pub fn binary_options(&self) -> &BinaryOptions {
        &self.options.binary
    }

    pub fn domain_options(&self) -> &BTreeMap<String, bool> {
        &self.options.domains
    }

    pub fn is_match_case(&self) -> bool {
        self.options.binary.get(BinaryOption::MatchCase) == Some(true)
    }

    /// Keys a context must supply for this rule to be evaluated.
    ///
    /// `match-case` never gates applicability and is left out.
    pub fn option_keys(&self) -> OptionMask {
        let mut keys = self.options.binary.keys() - OptionMask::MATCH_CASE;
        if !self.options.domains.is_empty() {
            keys |= OptionMask::DOMAIN;
        }
        keys
    }

    /// No options of any kind: eligible for the combined regex.
    pub fn is_simple(&self) -> bool {
        self.options.is_empty()
    }

    /// Has at least one require-present domain entry.
    pub fn requires_domain(&self) -> bool {
        self.options.has_required_domain()
    }

    /// Whether an engine supporting `supports` can evaluate this rule.
    pub fn matching_supported(&self, supports: OptionMask) -> bool {
        self.kind == RuleKind::Standard
            && self.options.unknown.is_empty()
            && supports.contains(self.option_keys())
    }

    /// Whether `ctx` supplies every key this rule needs.
    pub fn is_applicable(&self, ctx: &RequestContext<'_>) -> bool {
        self.options.unknown.is_empty() && ctx.keys().contains(self.option_keys())
    }

    /// Whether the rule applies to requests from `domain`.
    ///
    /// The most specific suffix listed in the rule decides. Unlisted domains
    /// are excluded when the rule names any require-present domain.
    pub fn domain_matches(&self, domain: &str) -> bool {
        let domains = &self.options.domains;
        if domains.is_empty() {
            return true;
        }
        for variant in walk_domain_variants(domain) {
            if let Some(&applies) = domains.get(variant) {
                return applies;
            }
        }
        !self.options.has_required_domain()
    }

    /// Full per-rule evaluation: option keys, option values, domain, pattern.
    pub fn matches_url(&self, url: &str, ctx: &RequestContext<'_>) -> bool {
        let pattern = match &self.pattern {
            Some(pattern) => pattern,
            None => return false,
        };

        if !self.is_applicable(ctx) {
            return false;
        }

        let compared = self.options.binary.keys() - OptionMask::MATCH_CASE;
        if !self.options.binary.mismatched(&ctx.options, compared).is_empty() {
            return false;
        }

        if let Some(domain) = ctx.domain {
            if !self.domain_matches(&fold_domain(domain)) {
                return false;
            }
        }

        pattern.is_match(url)
    }
}
