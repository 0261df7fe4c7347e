use std::fs;

use serde::Deserialize;

use abp_compiler::RuleSetOptions;
use abp_core::types::OptionMask;

/// On-disk build configuration (JSON). Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Supported option names, `domain` included; defaults to all
    pub supports: Option<Vec<String>>,
    pub reject_unsupported: bool,
    pub strict: bool,
}

impl ConfigFile {
    pub fn parse(text: &str) -> Result<Self, String> {
        serde_json::from_str(text).map_err(|e| format!("Invalid config: {}", e))
    }

    pub fn into_options(self) -> Result<RuleSetOptions, String> {
        let supports = match self.supports {
            Some(names) => OptionMask::from_names(&names).map_err(|e| format!("Invalid config: {}", e))?,
            None => OptionMask::all(),
        };
        Ok(RuleSetOptions {
            supports,
            reject_unsupported: self.reject_unsupported,
            strict: self.strict,
        })
    }
}

/// Build options from an optional config file, then command-line overrides.
pub fn load_options(path: Option<&str>, strict: bool, reject_unsupported: bool) -> Result<RuleSetOptions, String> {
    let config = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .map_err(|e| format!("Failed to read '{}': {}", path, e))?;
            tracing::debug!(path, "loaded config file");
            ConfigFile::parse(&text)?
        }
        None => ConfigFile::default(),
    };

    let mut options = config.into_options()?;
    options.strict |= strict;
    options.reject_unsupported |= reject_unsupported;
    Ok(options)
}
