//! AdBlock Plus Filter List Compiler
//!
//! This crate compiles filter-list lines into a queryable `abp_core::RuleSet`:
//! each line is classified and translated into a regex, unsupported rules are
//! dropped, and the survivors are partitioned by polarity and matching strategy.

pub mod pattern;
pub mod parser;
pub mod optimizer;
pub mod builder;

pub use builder::{
    build_rule_set, build_rule_set_with_stats, compile_filter_list, BuildError, BuildStats, PartitionStats,
    RuleSetOptions,
};
pub use optimizer::dedupe_rules;
pub use parser::{compile_rule, CompileError};
pub use pattern::{translate, PatternError};
