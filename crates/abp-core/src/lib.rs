//! AdBlock Plus Matching Core
//!
//! This crate provides the rule model and matching engine for AdBlock Plus
//! network filter rules. Rules are compiled by `abp-compiler` into a
//! [`RuleSet`]; this crate only evaluates them.
//!
//! # Architecture
//!
//! A rule set is split by polarity (blocking vs. exception) and then by
//! strategy: option-free rules are folded into one combined regex, rules
//! restricted to specific source domains are keyed by domain, and the rest
//! are evaluated one by one. Exception rules are always checked first.
//!
//! # Modules
//!
//! - `domain`: Domain suffix chains for hierarchical domain matching
//! - `types`: Option vocabulary, request context, decisions
//! - `rule`: Compiled rule and pattern
//! - `index`: Per-polarity rule partitions
//! - `matcher`: Rule set and block/allow decision

pub mod domain;
pub mod index;
pub mod matcher;
pub mod rule;
pub mod types;

// Re-export commonly used types
pub use domain::{domain_variants, walk_domain_variants};
pub use index::RuleIndex;
pub use matcher::{MatchResult, RuleSet};
pub use rule::{Pattern, Rule, RuleOptions};
pub use types::{
    BinaryOption, BinaryOptions, MatchDecision, OptionMask, RequestContext, RuleKind, UnknownOption,
};
