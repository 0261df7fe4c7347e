use std::collections::BTreeMap;
use std::fs;

use serde::Deserialize;

use abp_core::types::{BinaryOption, BinaryOptions, RequestContext};

/// One request line: `{"url": "...", "domain": "...", "options": {"script": true}}`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRequest {
    url: String,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    options: BTreeMap<String, bool>,
}

/// A request to evaluate, with option names already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    pub domain: Option<String>,
    pub options: BinaryOptions,
}

impl Request {
    pub fn new(url: impl Into<String>, domain: Option<&str>, options: BinaryOptions) -> Self {
        Self {
            url: url.into(),
            domain: domain.map(str::to_ascii_lowercase),
            options,
        }
    }

    pub fn context(&self) -> RequestContext<'_> {
        RequestContext {
            domain: self.domain.as_deref(),
            options: self.options,
        }
    }

    fn from_raw(raw: RawRequest) -> Result<Self, String> {
        let mut options = BinaryOptions::new();
        for (name, value) in raw.options {
            let option = name.parse::<BinaryOption>().map_err(|e| e.to_string())?;
            options.insert(option, value);
        }
        Ok(Self::new(raw.url, raw.domain.as_deref(), options))
    }
}

/// Parse a `--option` flag: `name`, `~name` or `name=true|false`.
pub fn parse_option_flag(flag: &str) -> Result<(BinaryOption, bool), String> {
    let (name, value) = match flag.split_once('=') {
        Some((name, value)) => {
            let value = value
                .parse::<bool>()
                .map_err(|_| format!("Invalid value in option '{}'", flag))?;
            (name, value)
        }
        None => match flag.strip_prefix('~') {
            Some(name) => (name, false),
            None => (flag, true),
        },
    };

    let option = name
        .trim()
        .to_ascii_lowercase()
        .parse::<BinaryOption>()
        .map_err(|e| e.to_string())?;
    Ok((option, value))
}

/// Parse JSON-lines request text, skipping blank lines.
pub fn parse_requests(text: &str) -> Result<Vec<Request>, String> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let raw: RawRequest = serde_json::from_str(trimmed)
            .map_err(|e| format!("line {}: {}", idx + 1, e))?;
        out.push(Request::from_raw(raw).map_err(|e| format!("line {}: {}", idx + 1, e))?);
    }
    Ok(out)
}

pub fn load_requests(path: &str) -> Result<Vec<Request>, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    let requests = parse_requests(&text).map_err(|e| format!("{}: {}", path, e))?;
    if requests.is_empty() {
        return Err(format!("No requests in '{}'", path));
    }
    Ok(requests)
}
