use std::collections::HashMap;

use log::{debug, info, warn};
use regex::{Regex, RegexBuilder};

use abp_core::index::RuleIndex;
use abp_core::matcher::RuleSet;
use abp_core::rule::Rule;
use abp_core::types::{OptionMask, RuleKind};

use crate::optimizer::dedupe_rules;
use crate::parser::{compile_rule, CompileError};

/// Compiled-program size limit for a combined regex. Full filter lists join
/// tens of thousands of patterns, far beyond the regex crate's default.
const COMBINED_SIZE_LIMIT: usize = 512 * (1 << 20);
const COMBINED_DFA_SIZE_LIMIT: usize = 64 * (1 << 20);

/// How a batch of rule lines is turned into a rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSetOptions {
    /// Option keys the engine evaluates; rules needing others are dropped
    pub supports: OptionMask,
    /// Fail on the first rule with an unsupported option instead of dropping it
    pub reject_unsupported: bool,
    /// Fail on the first malformed rule instead of skipping it
    pub strict: bool,
}

impl Default for RuleSetOptions {
    fn default() -> Self {
        Self {
            supports: OptionMask::all(),
            reject_unsupported: false,
            strict: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("line {line}: {source}")]
    Compile {
        line: usize,
        #[source]
        source: CompileError,
    },

    #[error("line {line}: rule '{raw}' uses unsupported options: {options}")]
    Unsupported {
        line: usize,
        raw: String,
        options: String,
    },

    #[error("rule set holds {count} rules, more than a u32 rule id can address")]
    TooManyRules { count: usize },

    #[error("cannot combine {count} patterns: {source}")]
    Combine {
        count: usize,
        #[source]
        source: regex::Error,
    },
}

/// Counters collected while building a rule set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub lines: usize,
    pub blank: usize,
    pub comments: usize,
    pub element_hiding: usize,
    pub invalid: usize,
    pub unsupported: usize,
    pub deduped: usize,
    pub blacklist: PartitionStats,
    pub whitelist: PartitionStats,
}

impl BuildStats {
    /// Rules that ended up in the rule set.
    pub fn rules(&self) -> usize {
        self.blacklist.total() + self.whitelist.total()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionStats {
    pub simple: usize,
    pub domain_required: usize,
    pub option_only: usize,
}

impl PartitionStats {
    pub fn total(&self) -> usize {
        self.simple + self.domain_required + self.option_only
    }
}

/// Build a rule set from filter-list lines.
pub fn build_rule_set<I, S>(lines: I, options: &RuleSetOptions) -> Result<RuleSet, BuildError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    build_rule_set_with_stats(lines, options).map(|(rule_set, _)| rule_set)
}

/// Build a rule set from the full text of a filter list.
pub fn compile_filter_list(text: &str, options: &RuleSetOptions) -> Result<RuleSet, BuildError> {
    build_rule_set(text.lines(), options)
}

/// Build a rule set and report what happened to each line.
pub fn build_rule_set_with_stats<I, S>(
    lines: I,
    options: &RuleSetOptions,
) -> Result<(RuleSet, BuildStats), BuildError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut stats = BuildStats::default();
    let mut rules = Vec::new();

    for (index, line) in lines.into_iter().enumerate() {
        let line = line.as_ref();
        let line_no = index + 1;
        stats.lines += 1;

        // Blank lines are not rules; compiling one would match every URL.
        if line.trim().is_empty() {
            stats.blank += 1;
            continue;
        }

        let rule = match compile_rule(line) {
            Ok(rule) => rule,
            Err(source) if options.strict => {
                return Err(BuildError::Compile {
                    line: line_no,
                    source,
                });
            }
            Err(err) => {
                warn!("skipping line {}: {}", line_no, err);
                stats.invalid += 1;
                continue;
            }
        };

        match rule.kind() {
            RuleKind::Comment => {
                stats.comments += 1;
                continue;
            }
            RuleKind::ElementHiding => {
                stats.element_hiding += 1;
                continue;
            }
            RuleKind::Standard => {}
        }

        if !rule.matching_supported(options.supports) {
            let unsupported = describe_unsupported(&rule, options.supports);
            if options.reject_unsupported {
                return Err(BuildError::Unsupported {
                    line: line_no,
                    raw: rule.raw().to_string(),
                    options: unsupported,
                });
            }
            debug!("dropping line {} ({}): unsupported {}", line_no, rule.raw(), unsupported);
            stats.unsupported += 1;
            continue;
        }

        rules.push(rule);
    }

    stats.deduped = dedupe_rules(&mut rules).deduped;

    let mut blacklist = PartitionBuilder::default();
    let mut whitelist = PartitionBuilder::default();

    for (id, rule) in rules.iter().enumerate() {
        let target = if rule.is_exception() {
            &mut whitelist
        } else {
            &mut blacklist
        };
        target.add(rule_id(id, rules.len())?, rule);
    }

    stats.blacklist = blacklist.stats();
    stats.whitelist = whitelist.stats();

    let blacklist = blacklist.finish(&rules)?;
    let whitelist = whitelist.finish(&rules)?;

    info!(
        "built rule set: {} rules from {} lines ({} blocking, {} exceptions, {} unsupported, {} invalid)",
        rules.len(),
        stats.lines,
        stats.blacklist.total(),
        stats.whitelist.total(),
        stats.unsupported,
        stats.invalid,
    );

    Ok((RuleSet::new(rules, blacklist, whitelist), stats))
}

fn rule_id(index: usize, count: usize) -> Result<u32, BuildError> {
    u32::try_from(index).map_err(|_| BuildError::TooManyRules { count })
}

fn describe_unsupported(rule: &Rule, supports: OptionMask) -> String {
    let mut names: Vec<String> = (rule.option_keys() - supports)
        .names()
        .into_iter()
        .map(str::to_string)
        .collect();
    names.extend(rule.options().unknown.iter().cloned());
    names.join(", ")
}

/// Accumulates one polarity's partitions before the combined regex is built.
#[derive(Default)]
struct PartitionBuilder {
    simple: Vec<u32>,
    by_domain: HashMap<String, Vec<u32>>,
    domain_required: usize,
    with_options: Vec<u32>,
}

impl PartitionBuilder {
    fn add(&mut self, id: u32, rule: &Rule) {
        if rule.is_simple() {
            self.simple.push(id);
        } else if rule.requires_domain() {
            self.domain_required += 1;
            for (domain, &required) in rule.domain_options() {
                if required {
                    self.by_domain.entry(domain.clone()).or_default().push(id);
                }
            }
        } else {
            self.with_options.push(id);
        }
    }

    fn stats(&self) -> PartitionStats {
        PartitionStats {
            simple: self.simple.len(),
            domain_required: self.domain_required,
            option_only: self.with_options.len(),
        }
    }

    fn finish(self, rules: &[Rule]) -> Result<RuleIndex, BuildError> {
        let combined = combined_regex(rules, &self.simple)?;
        debug!(
            "partition: {} simple, {} domain keys, {} option-only",
            self.simple.len(),
            self.by_domain.len(),
            self.with_options.len()
        );
        Ok(RuleIndex::new(combined, self.simple, self.by_domain, self.with_options))
    }
}

/// Alternation of the given rules' patterns; `None` when there are none.
fn combined_regex(rules: &[Rule], ids: &[u32]) -> Result<Option<Regex>, BuildError> {
    let parts: Vec<String> = ids
        .iter()
        .filter_map(|&id| rules.get(id as usize))
        .map(|rule| format!("(?:{})", rule.regex_string()))
        .collect();

    if parts.is_empty() {
        return Ok(None);
    }

    RegexBuilder::new(&parts.join("|"))
        .case_insensitive(true)
        .size_limit(COMBINED_SIZE_LIMIT)
        .dfa_size_limit(COMBINED_DFA_SIZE_LIMIT)
        .build()
        .map(Some)
        .map_err(|source| BuildError::Combine {
            count: parts.len(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use abp_core::types::{BinaryOption, MatchDecision, RequestContext};

    use super::*;

    // https://easylist.adblockplus.org/en/
    const EASYLIST_EXCERPT: &str = r#"
[Adblock Plus 2.0]
! Checksum: eQVrgYVjRUGJWOyE1JwG+A
! Version: 201507270530
! Title: EasyList
! Last modified: 27 Jul 2015 05:30 UTC
! Expires: 4 days (update frequency)
! Homepage: https://easylist.adblockplus.org/
!
!-----------------------General advert blocking filters-----------------------!
! *** easylist:easylist/easylist_general_block.txt ***
&ad_box_
&ad_channel=
@@||adultadworld.com/adhandler/$subdocument
@@||desihoes.com/advertisement.js
@@||fapxl.com^$elemhide
@@||fuqer.com^*/advertisement.js
@@||gaybeeg.info/wp-content/plugins/blockalyzer-adblock-counter/$image,domain=gaybeeg.info
@@||hentaimoe.com/js/advertisement.js
@@||imgadult.com/js/advertisement.js
@@||indiangilma.com^$elemhide
@@||jav4.me^$script,domain=jav4.me
@@||javfee.com^$script,domain=javfee.com
@@||javpee.com/eroex.js
@@||jkhentai.tv^$script,domain=jkhentai.tv
@@||jporn4u.com/js/ads.js
@@||lfporn.com^$elemhide
@@||mongoporn.com^*/adframe/$subdocument
||jamo.tv
||google.com/ads/$domain=invalid.example.com
"#;

    fn build(text: &str) -> RuleSet {
        compile_filter_list(text, &RuleSetOptions::default()).expect("rule set should build")
    }

    #[test]
    fn blocks_easylist_excerpt() {
        let rules = build(EASYLIST_EXCERPT);

        assert!(rules.should_block("http://jamo.tv/js/app.js", &RequestContext::new()));
        assert!(!rules.should_block(
            "http://google.com/ads/app.js",
            &RequestContext::new().with_domain("valid.example.com")
        ));
        assert!(rules.should_block(
            "http://google.com/ads/app.js",
            &RequestContext::new().with_domain("invalid.example.com")
        ));
        assert!(rules.should_block(
            "http://google.com/ads/app.js",
            &RequestContext::new().with_domain("sub.invalid.example.com")
        ));
        assert!(!rules.should_block("http://google.com/ads/app.js", &RequestContext::new()));
    }

    #[test]
    fn partitions_easylist_excerpt() {
        let (rules, stats) =
            build_rule_set_with_stats(EASYLIST_EXCERPT.lines(), &RuleSetOptions::default()).unwrap();

        assert_eq!(stats.comments, 10);
        assert_eq!(stats.element_hiding, 0);
        assert_eq!(stats.blacklist, PartitionStats { simple: 3, domain_required: 1, option_only: 0 });
        assert_eq!(stats.whitelist, PartitionStats { simple: 6, domain_required: 4, option_only: 5 });
        assert_eq!(stats.rules(), rules.len());

        assert!(rules.blacklist().combined().is_some());
        assert_eq!(rules.blacklist().by_domain().get("invalid.example.com").map(Vec::len), Some(1));
        assert_eq!(
            rules.blacklist_rules().map(|rule| rule.raw()).collect::<Vec<_>>(),
            vec!["&ad_box_", "&ad_channel=", "||jamo.tv"]
        );
    }

    #[test]
    fn whitelist_overrides_blacklist() {
        let rules = build("||ads.example.com^\n@@||ads.example.com/allowed/");
        let ctx = RequestContext::new();

        assert!(rules.should_block("https://ads.example.com/banner.js", &ctx));
        assert!(rules.is_blacklisted("https://ads.example.com/allowed/x.js", &ctx));
        assert!(!rules.should_block("https://ads.example.com/allowed/x.js", &ctx));

        let result = rules.decide("https://ads.example.com/allowed/x.js", &ctx);
        assert_eq!(result.decision, MatchDecision::Allow);
        assert_eq!(result.rule.map(|rule| rule.raw()), Some("@@||ads.example.com/allowed/"));
    }

    #[test]
    fn domain_scoped_exception() {
        let rules = build("||cdn.net/ads/\n@@||cdn.net/ads/$domain=partner.com");

        let url = "http://cdn.net/ads/a.js";
        assert!(!rules.should_block(url, &RequestContext::new().with_domain("partner.com")));
        assert!(!rules.should_block(url, &RequestContext::new().with_domain("www.partner.com")));
        assert!(rules.should_block(url, &RequestContext::new().with_domain("other.com")));
        assert!(rules.should_block(url, &RequestContext::new()));
    }

    #[test]
    fn negated_domain_rule_applies_elsewhere() {
        let rules = build("/banner/$domain=~foo.com");

        let url = "http://cdn.net/banner/1.png";
        assert!(!rules.should_block(url, &RequestContext::new().with_domain("foo.com")));
        assert!(!rules.should_block(url, &RequestContext::new().with_domain("img.foo.com")));
        assert!(rules.should_block(url, &RequestContext::new().with_domain("bar.com")));
        assert!(!rules.should_block(url, &RequestContext::new()));
        assert_eq!(rules.blacklist().with_options_ids().len(), 1);
    }

    #[test]
    fn binary_options_gate_matching() {
        let rules = build("||tracker.net^$third-party,~image");
        let url = "http://tracker.net/pixel";

        let ctx = RequestContext::new()
            .with_option(BinaryOption::ThirdParty, true)
            .with_option(BinaryOption::Image, false);
        assert!(rules.should_block(url, &ctx));

        let ctx = RequestContext::new()
            .with_option(BinaryOption::ThirdParty, true)
            .with_option(BinaryOption::Image, true);
        assert!(!rules.should_block(url, &ctx));

        let ctx = RequestContext::new().with_option(BinaryOption::ThirdParty, true);
        assert!(!rules.should_block(url, &ctx));
    }

    #[test]
    fn comments_and_element_hiding_never_match() {
        let rules = build("! ads\n[Adblock Plus 2.0]\n##.ads\nexample.com#@#.banner");
        assert!(rules.is_empty());
        assert!(rules.blacklist().combined().is_none());
        assert!(rules.whitelist().combined().is_none());
        for url in ["http://x.com/ads", "http://example.com/banner", ""] {
            assert!(!rules.should_block(url, &RequestContext::new().with_domain("example.com")));
        }
    }

    #[test]
    fn blank_lines_are_skipped() {
        let (rules, stats) =
            build_rule_set_with_stats(["", "   ", "||ads.com^"], &RuleSetOptions::default()).unwrap();
        assert_eq!(stats.blank, 2);
        assert_eq!(rules.len(), 1);
        assert!(!rules.should_block("http://example.com/", &RequestContext::new()));
    }

    #[test]
    fn unsupported_rules_are_dropped() {
        let options = RuleSetOptions {
            supports: OptionMask::SCRIPT | OptionMask::DOMAIN,
            ..RuleSetOptions::default()
        };
        let (rules, stats) = build_rule_set_with_stats(
            ["||a.com^$script", "||b.com^$image", "||c.com^$important", "||d.com^"],
            &options,
        )
        .unwrap();

        assert_eq!(stats.unsupported, 2);
        assert_eq!(rules.len(), 2);
        let ctx = RequestContext::new().with_option(BinaryOption::Image, true);
        assert!(!rules.should_block("http://b.com/x", &ctx));
        assert!(!rules.should_block("http://c.com/x", &RequestContext::new()));
        assert!(rules.should_block("http://d.com/x", &RequestContext::new()));
    }

    #[test]
    fn reject_unsupported_reports_line() {
        let options = RuleSetOptions {
            supports: OptionMask::BINARY,
            reject_unsupported: true,
            ..RuleSetOptions::default()
        };
        let err = build_rule_set(["||a.com^", "||b.com^$domain=x.com"], &options).unwrap_err();
        match err {
            BuildError::Unsupported { line, raw, options } => {
                assert_eq!(line, 2);
                assert_eq!(raw, "||b.com^$domain=x.com");
                assert_eq!(options, "domain");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_rules_skipped_unless_strict() {
        let lines = ["||a.com^", "/ad(s/", "||b.com^"];

        let (rules, stats) = build_rule_set_with_stats(lines, &RuleSetOptions::default()).unwrap();
        assert_eq!(stats.invalid, 1);
        assert_eq!(rules.len(), 2);

        let strict = RuleSetOptions {
            strict: true,
            ..RuleSetOptions::default()
        };
        match build_rule_set(lines, &strict).unwrap_err() {
            BuildError::Compile { line, source } => {
                assert_eq!(line, 2);
                assert_eq!(source.raw, "/ad(s/");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicate_rules_are_indexed_once() {
        let (rules, stats) =
            build_rule_set_with_stats(["||ads.com^", "||ads.com^", "@@||ads.com^"], &RuleSetOptions::default())
                .unwrap();
        assert_eq!(stats.deduped, 1);
        assert_eq!(rules.len(), 2);
        assert!(!rules.should_block("http://ads.com/x", &RequestContext::new()));
    }

    #[test]
    fn rule_with_several_required_domains_is_keyed_under_each() {
        let rules = build("/promo/$domain=a.com|b.com|~x.b.com");
        let index = rules.blacklist();
        assert_eq!(index.by_domain().len(), 2);
        assert_eq!(index.by_domain().get("a.com"), Some(&vec![0]));
        assert_eq!(index.by_domain().get("b.com"), Some(&vec![0]));

        let url = "http://cdn.net/promo/1.js";
        assert!(rules.should_block(url, &RequestContext::new().with_domain("a.com")));
        assert!(rules.should_block(url, &RequestContext::new().with_domain("www.b.com")));
        assert!(!rules.should_block(url, &RequestContext::new().with_domain("x.b.com")));
        assert!(!rules.should_block(url, &RequestContext::new().with_domain("c.com")));
    }

    #[test]
    fn bare_anchor_lines_match_nothing() {
        let rules = build("||");
        assert_eq!(rules.len(), 1);
        assert!(!rules.should_block("https://www.wikipedia.org/", &RequestContext::new()));

        let rules = build("@@||\n||ads.com^");
        assert!(rules.should_block("http://ads.com/banner.gif", &RequestContext::new()));
    }

    #[test]
    fn domain_lists_keep_hosts_named_like_options() {
        let (rules, stats) = build_rule_set_with_stats(
            ["/promo/$domain=a.com,media.net,script.org,~image.a.com"],
            &RuleSetOptions::default(),
        )
        .unwrap();
        assert_eq!(stats.unsupported, 0);
        assert_eq!(rules.len(), 1);

        let url = "http://cdn.net/promo/1.js";
        assert!(rules.should_block(url, &RequestContext::new().with_domain("media.net")));
        assert!(rules.should_block(url, &RequestContext::new().with_domain("script.org")));
        assert!(!rules.should_block(url, &RequestContext::new().with_domain("image.a.com")));
    }

    #[test]
    fn rule_ids_must_fit_in_u32() {
        assert_eq!(rule_id(7, 8).unwrap(), 7);
        assert_eq!(rule_id(u32::MAX as usize, 1).unwrap(), u32::MAX);
        #[cfg(target_pointer_width = "64")]
        assert!(matches!(
            rule_id(u32::MAX as usize + 1, 1),
            Err(BuildError::TooManyRules { count: 1 })
        ));
    }

    #[test]
    fn simple_rules_are_case_insensitive() {
        let rules = build("/BANNER/");
        assert!(rules.should_block("http://x.com/banner/1.gif", &RequestContext::new()));
    }

    #[test]
    fn rule_set_shared_across_threads() {
        let rules = std::sync::Arc::new(build(EASYLIST_EXCERPT));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let rules = std::sync::Arc::clone(&rules);
                std::thread::spawn(move || rules.should_block("http://jamo.tv/js/app.js", &RequestContext::new()))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
