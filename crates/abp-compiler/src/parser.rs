use once_cell::sync::Lazy;
use regex::Regex;

use abp_core::rule::{Pattern, Rule, RuleOptions};
use abp_core::types::{BinaryOption, RuleKind};

use crate::pattern::{translate, PatternError};

/// A rule line that could not be compiled.
#[derive(Debug, Clone, thiserror::Error)]
#[error("cannot compile rule '{raw}': {source}")]
pub struct CompileError {
    pub raw: String,
    #[source]
    pub source: PatternError,
}

/// Matches the start of an option token: `~?`, a known option name, then `=`, `,` or the end.
static OPTION_START: Lazy<Regex> = Lazy::new(|| {
    let names: Vec<&str> = BinaryOption::ALL
        .iter()
        .map(|opt| opt.name())
        .chain(std::iter::once("domain"))
        .collect();
    Regex::new(&format!("^~?(?:{})(?:=|,|$)", names.join("|"))).expect("option names form a valid regex")
});

/// Compile one raw filter-list line.
///
/// Comment and element-hiding lines always succeed and carry no pattern.
/// Standard rules fail only when their pattern cannot be compiled.
pub fn compile_rule(raw: &str) -> Result<Rule, CompileError> {
    let line = raw.trim();

    if is_comment_line(line) {
        return Ok(Rule::new(raw, line, RuleKind::Comment, false, RuleOptions::default(), None));
    }

    if is_element_hiding_line(line) {
        return Ok(Rule::new(
            raw,
            line,
            RuleKind::ElementHiding,
            false,
            RuleOptions::default(),
            None,
        ));
    }

    let (is_exception, line) = match line.strip_prefix("@@") {
        Some(rest) => (true, rest),
        None => (false, line),
    };

    let (text, options) = match split_rule_options(line) {
        (text, Some(options_text)) => (text, parse_options(options_text)),
        (text, None) => (text, RuleOptions::default()),
    };

    let match_case = options.binary.get(BinaryOption::MatchCase) == Some(true);
    let pattern = translate(text)
        .and_then(|source| compile_pattern(source, match_case))
        .map_err(|source| CompileError {
            raw: raw.to_string(),
            source,
        })?;

    Ok(Rule::new(
        raw,
        text,
        RuleKind::Standard,
        is_exception,
        options,
        Some(pattern),
    ))
}

fn compile_pattern(source: String, match_case: bool) -> Result<Pattern, PatternError> {
    Pattern::new(source.clone(), match_case).map_err(|err| PatternError::InvalidRegex {
        pattern: source,
        source: err,
    })
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with('!') || line.starts_with("[Adblock")
}

fn is_element_hiding_line(line: &str) -> bool {
    line.contains("##") || line.contains("#@#")
}

fn split_rule_options(line: &str) -> (&str, Option<&str>) {
    match line.find('$') {
        Some(pos) => (&line[..pos], Some(&line[pos + 1..])),
        None => (line, None),
    }
}

/// Split an option list on commas that precede a known option name.
///
/// Commas inside a `domain=` value are kept with that value.
fn split_options(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for (pos, _) in text.match_indices(',') {
        if OPTION_START.is_match(&text[pos + 1..]) {
            parts.push(&text[start..pos]);
            start = pos + 1;
        }
    }
    parts.push(&text[start..]);
    parts
}

fn parse_options(text: &str) -> RuleOptions {
    let mut options = RuleOptions::default();
    let lowered = text.to_ascii_lowercase();

    for raw in split_options(&lowered) {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        if let Some(value) = raw.strip_prefix("domain=") {
            parse_domain_option(value, &mut options);
            continue;
        }

        let name = raw.trim_start_matches('~');
        match BinaryOption::from_name(name) {
            Some(option) => options.binary.insert(option, !raw.starts_with('~')),
            None => options.unknown.push(raw.to_string()),
        }
    }

    options
}

fn parse_domain_option(value: &str, options: &mut RuleOptions) {
    for entry in value.split([',', '|']) {
        let entry = entry.trim();
        let domain = entry.trim_start_matches('~');
        if domain.is_empty() {
            continue;
        }
        options
            .domains
            .insert(domain.to_string(), !entry.starts_with('~'));
    }
}
