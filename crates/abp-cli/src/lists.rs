use std::fs;
use std::path::Path;
use std::time::Instant;

use abp_compiler::{build_rule_set_with_stats, BuildError, BuildStats, RuleSetOptions};
use abp_core::matcher::RuleSet;

#[derive(Debug, Clone)]
pub struct LoadStats {
    pub build: BuildStats,
    pub total_ms: f64,
}

/// Read a filter list, one rule per line, with line endings stripped.
pub fn read_rule_lines(path: &str) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    Ok(content
        .lines()
        .map(|line| line.trim_end_matches(['\r', '\n']).to_string())
        .collect())
}

/// Compile every input list into a single rule set.
pub fn load_rule_set(inputs: &[String], options: &RuleSetOptions, verbose: bool) -> Result<(RuleSet, LoadStats), String> {
    if inputs.is_empty() {
        return Err("No input files specified".to_string());
    }

    let start = Instant::now();
    let mut all_lines = Vec::new();
    let mut spans = Vec::with_capacity(inputs.len());

    for (list_id, path) in inputs.iter().enumerate() {
        let lines = read_rule_lines(path)?;

        if verbose {
            println!(
                "  [{}] {} - {} lines",
                list_id,
                Path::new(path).file_name().unwrap_or_default().to_string_lossy(),
                lines.len()
            );
        }

        spans.push((path.as_str(), lines.len()));
        all_lines.extend(lines);
    }

    let (rule_set, build) = build_rule_set_with_stats(&all_lines, options)
        .map_err(|e| describe_build_error(&e, &spans))?;

    let stats = LoadStats {
        build,
        total_ms: start.elapsed().as_secs_f64() * 1000.0,
    };

    Ok((rule_set, stats))
}

/// Rewrite a build error's combined line number as `file:line`.
fn describe_build_error(err: &BuildError, spans: &[(&str, usize)]) -> String {
    let line = match err {
        BuildError::Compile { line, .. } | BuildError::Unsupported { line, .. } => *line,
        BuildError::Combine { .. } | BuildError::TooManyRules { .. } => {
            return format!("Failed to build rule set: {}", err)
        }
    };

    match locate_line(spans, line) {
        Some((path, local)) => format!("{}:{}: {}", path, local, err),
        None => format!("Failed to build rule set: {}", err),
    }
}

fn locate_line<'a>(spans: &[(&'a str, usize)], mut line: usize) -> Option<(&'a str, usize)> {
    for &(path, count) in spans {
        if line <= count {
            return Some((path, line));
        }
        line -= count;
    }
    None
}
