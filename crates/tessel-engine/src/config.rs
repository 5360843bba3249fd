//! Engine Configuration

use serde::Deserialize;

/// Engine configuration options
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rethrow expression evaluation errors instead of rendering `undefined`
    pub strict_expressions: bool,

    /// Permit `{{{ }}}` and `data-html` raw output
    pub allow_raw_html: bool,

    /// Text substituted for null/undefined interpolations
    pub empty_placeholder: String,

    /// Recursion guard for tree processing
    pub max_depth: usize,

    /// Upper bound for numeric `data-repeat` counts (`n in 5`)
    pub max_repeat_count: usize,

    /// Cached successful fetches expire after this many milliseconds
    pub fetch_cache_ttl_ms: Option<u64>,

    /// Id of the element the application renders into
    pub mount_id: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strict_expressions: false,
            allow_raw_html: false,
            empty_placeholder: String::new(),
            max_depth: 128,
            max_repeat_count: 10_000,
            fetch_cache_ttl_ms: None,
            mount_id: "app".into(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load from JSON; missing fields keep their defaults
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Config builder
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn strict_expressions(mut self, strict: bool) -> Self {
        self.config.strict_expressions = strict;
        self
    }

    pub fn allow_raw_html(mut self, allow: bool) -> Self {
        self.config.allow_raw_html = allow;
        self
    }

    pub fn empty_placeholder(mut self, placeholder: &str) -> Self {
        self.config.empty_placeholder = placeholder.to_string();
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    pub fn max_repeat_count(mut self, count: usize) -> Self {
        self.config.max_repeat_count = count;
        self
    }

    pub fn fetch_cache_ttl_ms(mut self, ttl: u64) -> Self {
        self.config.fetch_cache_ttl_ms = Some(ttl);
        self
    }

    pub fn mount_id(mut self, id: &str) -> Self {
        self.config.mount_id = id.to_string();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.strict_expressions);
        assert!(!config.allow_raw_html);
        assert_eq!(config.max_depth, 128);
        assert_eq!(config.max_repeat_count, 10_000);
        assert_eq!(config.mount_id, "app");
        assert_eq!(config.fetch_cache_ttl_ms, None);
    }

    #[test]
    fn test_from_json_partial() {
        let config = Config::from_json(r#"{"allow_raw_html": true, "fetch_cache_ttl_ms": 500}"#).unwrap();
        assert!(config.allow_raw_html);
        assert_eq!(config.fetch_cache_ttl_ms, Some(500));
        assert_eq!(config.empty_placeholder, "");
        assert!(Config::from_json("{\"max_depth\": \"deep\"}").is_err());
    }

    #[test]
    fn test_builder() {
        let config = Config::builder().strict_expressions(true).empty_placeholder("-").mount_id("root").build();
        assert!(config.strict_expressions);
        assert_eq!(config.empty_placeholder, "-");
        assert_eq!(config.mount_id, "root");
    }
}
