//! Facade configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::key::Tag;

/// Default owner tag key.
pub const DEFAULT_OWNER_KEY: &str = "owner";

/// Default owner tag value.
pub const DEFAULT_OWNER_VALUE: &str = "evcache";

/// Configuration for a [`MetricsFacade`](crate::MetricsFacade).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Tag appended to every instrument handed to the registry.
    pub owner_tag: Tag,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            owner_tag: Tag::new(DEFAULT_OWNER_KEY, DEFAULT_OWNER_VALUE),
        }
    }
}

impl MetricsConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the owner tag value, keeping the default `owner` key.
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner_tag = Tag::new(DEFAULT_OWNER_KEY, owner);
        self
    }

    /// Set the full owner tag.
    pub fn with_owner_tag(mut self, tag: Tag) -> Self {
        self.owner_tag = tag;
        self
    }

    /// Parse and validate a JSON configuration. Missing fields use defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the owner tag is usable.
    pub fn validate(&self) -> Result<()> {
        if self.owner_tag.key.trim().is_empty() {
            return Err(Error::Config("owner tag key must not be empty".to_string()));
        }
        if self.owner_tag.value.trim().is_empty() {
            return Err(Error::Config("owner tag value must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_owner() {
        let config = MetricsConfig::default();
        assert_eq!(config.owner_tag, Tag::new("owner", "evcache"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = MetricsConfig::new().with_owner("evcache-proxy");
        assert_eq!(config.owner_tag, Tag::new("owner", "evcache-proxy"));

        let config = MetricsConfig::new().with_owner_tag(Tag::new("subsystem", "client"));
        assert_eq!(config.owner_tag.key, "subsystem");
    }

    #[test]
    fn test_from_json() {
        let json = r#"{"owner_tag": {"key": "owner", "value": "moneta"}}"#;
        let config = MetricsConfig::from_json(json).unwrap();
        assert_eq!(config.owner_tag.value, "moneta");
    }

    #[test]
    fn test_from_json_defaults() {
        assert_eq!(MetricsConfig::from_json("{}").unwrap(), MetricsConfig::default());
    }

    #[test]
    fn test_from_json_invalid() {
        assert!(matches!(MetricsConfig::from_json("not json"), Err(Error::Config(_))));

        let empty_value = r#"{"owner_tag": {"key": "owner", "value": ""}}"#;
        assert!(matches!(MetricsConfig::from_json(empty_value), Err(Error::Config(_))));
    }
}
