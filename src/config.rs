//! Analysis configuration.
//!
//! Loaded from JSON; every field has a default so an empty object is valid.

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_PACKAGE: &str = "+global";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Package for declarations outside of any namespace.
    pub default_package: String,
    /// Package name patterns hidden from resolution. `*` matches any run of
    /// characters, including namespace separators.
    pub ignore_packages: Vec<String>,
    /// Persist declaration token lists to the attached cache driver.
    pub cache_tokens: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_package: DEFAULT_PACKAGE.to_string(),
            ignore_packages: Vec::new(),
            cache_tokens: true,
        }
    }
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Config, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn package_filter(&self) -> Result<PackageFilter, ConfigError> {
        PackageFilter::new(&self.ignore_packages)
    }
}

/// Predicate over package names; rejected packages are invisible to parent
/// and interface resolution.
#[derive(Debug, Clone, Default)]
pub struct PackageFilter {
    rejected: Vec<Regex>,
}

impl PackageFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<PackageFilter, ConfigError> {
        let rejected = patterns
            .iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                let source = format!("(?i)^{}$", regex::escape(pattern).replace(r"\*", ".*"));
                Regex::new(&source).map_err(|source| ConfigError::Pattern { pattern: pattern.to_string(), source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PackageFilter { rejected })
    }

    /// Filter accepting every package.
    pub fn accept_all() -> PackageFilter {
        PackageFilter::default()
    }

    pub fn accept(&self, package: &str) -> bool {
        !self.rejected.iter().any(|re| re.is_match(package))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_empty_object() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.default_package, "+global");
        assert!(config.cache_tokens);
    }

    #[test]
    fn wildcard_patterns() {
        let filter = PackageFilter::new(&["Vendor\\*", "+global"]).unwrap();
        assert!(!filter.accept("Vendor\\Lib"));
        assert!(!filter.accept("vendor\\lib\\deep"));
        assert!(!filter.accept("+global"));
        assert!(filter.accept("App"));
    }
}
