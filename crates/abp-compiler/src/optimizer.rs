use std::collections::HashSet;

use abp_core::rule::{Rule, RuleOptions};

pub struct OptimizeStats {
    pub before: usize,
    pub after: usize,
    pub deduped: usize,
}

/// Drop rules that repeat an earlier rule's polarity, pattern and options.
///
/// First occurrences keep their relative order.
pub fn dedupe_rules(rules: &mut Vec<Rule>) -> OptimizeStats {
    let before = rules.len();

    let mut seen: HashSet<RuleKey> = HashSet::new();
    let mut deduped = 0usize;
    rules.retain(|rule| {
        if seen.insert(RuleKey::from(rule)) {
            true
        } else {
            deduped += 1;
            false
        }
    });

    OptimizeStats {
        before,
        after: rules.len(),
        deduped,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RuleKey {
    is_exception: bool,
    pattern: String,
    options: RuleOptions,
}

impl From<&Rule> for RuleKey {
    fn from(rule: &Rule) -> Self {
        Self {
            is_exception: rule.is_exception(),
            pattern: rule.regex_string().to_string(),
            options: rule.options().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::compile_rule;

    fn compile_all(lines: &[&str]) -> Vec<Rule> {
        lines.iter().map(|line| compile_rule(line).unwrap()).collect()
    }

    #[test]
    fn removes_exact_duplicates() {
        let mut rules = compile_all(&["||ads.com^", "||ads.com^", "  ||ads.com^  ", "||track.com^"]);
        let stats = dedupe_rules(&mut rules);
        assert_eq!(stats.before, 4);
        assert_eq!(stats.after, 2);
        assert_eq!(stats.deduped, 2);
        assert_eq!(rules[0].raw(), "||ads.com^");
        assert_eq!(rules[1].raw(), "||track.com^");
    }

    #[test]
    fn keeps_rules_differing_in_polarity_or_options() {
        let mut rules = compile_all(&[
            "||ads.com^",
            "@@||ads.com^",
            "||ads.com^$script",
            "||ads.com^$~script",
            "||ads.com^$domain=a.com",
            "||ads.com^$match-case",
        ]);
        let stats = dedupe_rules(&mut rules);
        assert_eq!(stats.deduped, 0);
        assert_eq!(rules.len(), 6);
    }
}
