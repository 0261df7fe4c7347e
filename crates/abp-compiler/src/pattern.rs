//! Filter pattern to regex translation.
//!
//! # Examples
//!
//! ```
//! use abp_compiler::pattern::translate;
//!
//! assert_eq!(translate("").unwrap(), ".*");
//! assert_eq!(translate("|http://ad.").unwrap(), r"^http://ad\.");
//! assert_eq!(translate("/banner[0-9]+/").unwrap(), "banner[0-9]+");
//! ```

use regex::Regex;

/// `^`: any character outside `[A-Za-z0-9_\-.%]`, or end of input.
const SEPARATOR: &str = r"(?:[^\w\-.%]|$)";

/// `||`: optional scheme, optional `//` and subdomain labels, then the host.
const DOMAIN_ANCHOR: &str = r"^(?:[^:/?#]+:)?(?://(?:[^/?#]*\.)?)?";

/// Errors from translating a rule's match text.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PatternError {
    #[error("invalid regex '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Translate filter match text into a regex source string.
///
/// `/.../` text is passed through as a regex after validation; anything else
/// is escaped and its wildcards and anchors rewritten.
pub fn translate(text: &str) -> Result<String, PatternError> {
    if text.is_empty() {
        return Ok(".*".to_string());
    }

    if let Some(body) = regex_literal(text) {
        Regex::new(body).map_err(|source| PatternError::InvalidRegex {
            pattern: body.to_string(),
            source,
        })?;
        return Ok(body.to_string());
    }

    // The end anchor is taken first, so `||` reads as `|` plus `|`.
    let (rest, suffix) = match text.strip_suffix('|') {
        Some(rest) => (rest, "$"),
        None => (text, ""),
    };

    let (prefix, body) = if let Some(body) = rest.strip_prefix("||") {
        (DOMAIN_ANCHOR, body)
    } else if let Some(body) = rest.strip_prefix('|') {
        ("^", body)
    } else {
        ("", rest)
    };

    let mut out = String::with_capacity(prefix.len() + body.len() * 2 + suffix.len());
    out.push_str(prefix);
    for ch in body.chars() {
        match ch {
            '.' | '$' | '+' | '?' | '{' | '}' | '(' | ')' | '[' | ']' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            '^' => out.push_str(SEPARATOR),
            '*' => out.push_str(".*"),
            // Pipe away from either end is not an anchor.
            '|' => out.push_str(r"\|"),
            _ => out.push(ch),
        }
    }
    out.push_str(suffix);

    Ok(out)
}

/// Body of a `/.../` regex rule.
fn regex_literal(text: &str) -> Option<&str> {
    if text.len() >= 2 {
        text.strip_prefix('/')?.strip_suffix('/')
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiled(text: &str) -> Regex {
        Regex::new(&translate(text).unwrap()).unwrap()
    }

    #[test]
    fn test_empty_matches_everything() {
        let re = compiled("");
        assert!(re.is_match(""));
        assert!(re.is_match("http://anything/at/all"));
    }

    #[test]
    fn test_domain_anchor() {
        let re = compiled("||example.com^");
        assert!(re.is_match("http://example.com/ad.js"));
        assert!(re.is_match("https://sub.example.com/x"));
        assert!(re.is_match("example.com"));
        assert!(!re.is_match("http://notexample.com/x"));
        assert!(!re.is_match("http://example.com.evil.net/x"));
    }

    #[test]
    fn test_wildcard() {
        let re = compiled("ad*.js");
        assert!(re.is_match("adfoo.js"));
        assert!(re.is_match("http://x.com/ad.js"));
        assert!(!re.is_match("http://x.com/adfoo.css"));
    }

    #[test]
    fn test_end_anchor() {
        let re = compiled("banner|");
        assert!(re.is_match("http://x.com/banner"));
        assert!(!re.is_match("http://x.com/banner.gif"));
    }

    #[test]
    fn test_start_anchor() {
        let re = compiled("|http://ads.");
        assert!(re.is_match("http://ads.example.com/"));
        assert!(!re.is_match("https://x.com/?u=http://ads.example.com/"));
    }

    #[test]
    fn test_separator() {
        let re = compiled("/ads^");
        assert!(re.is_match("http://x.com/ads/img.png"));
        assert!(re.is_match("http://x.com/ads?id=1"));
        assert!(re.is_match("http://x.com/ads"));
        assert!(!re.is_match("http://x.com/adsense.js"));
        assert!(!re.is_match("http://x.com/ads.js"));
        assert!(!re.is_match("http://x.com/ads-top.js"));
    }

    #[test]
    fn test_escapes_special_characters() {
        assert_eq!(translate("a.b+c?d").unwrap(), r"a\.b\+c\?d");
        assert_eq!(translate("(x)[y]{z}$\\").unwrap(), r"\(x\)\[y\]\{z\}\$\\");
        let re = compiled("&ad_box_");
        assert!(re.is_match("http://x.com/?q=1&ad_box_=2"));
    }

    #[test]
    fn test_internal_pipe_is_literal() {
        assert_eq!(translate("a|b").unwrap(), r"a\|b");
        let re = compiled("a|b");
        assert!(re.is_match("x/a|b"));
        assert!(!re.is_match("x/a"));
    }

    #[test]
    fn test_combined_anchors() {
        assert_eq!(translate("|a|").unwrap(), "^a$");
        let re = compiled("||ads.example.com/banner|");
        assert!(re.is_match("https://ads.example.com/banner"));
        assert!(!re.is_match("https://ads.example.com/banner2"));
    }

    #[test]
    fn test_bare_double_pipe_matches_nothing() {
        assert_eq!(translate("||").unwrap(), "^$");
        let re = compiled("||");
        assert!(!re.is_match("https://www.wikipedia.org/"));
        assert_eq!(translate("|||").unwrap(), format!("{}$", DOMAIN_ANCHOR));
    }

    #[test]
    fn test_regex_literal_passthrough() {
        assert_eq!(translate(r"/ads?\d+/").unwrap(), r"ads?\d+");
        assert_eq!(translate("/").unwrap(), "/");
    }

    #[test]
    fn test_malformed_regex_literal() {
        let err = translate("/ad(s/").unwrap_err();
        assert!(matches!(err, PatternError::InvalidRegex { ref pattern, .. } if pattern == "ad(s"));
    }
}
