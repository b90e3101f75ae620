use super::error::FilterError;
use serde::{Deserialize, Serialize};

/// Where the storage blob lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageScope {
    /// Per-tab, cleared when the tab closes (`sessionStorage`)
    #[default]
    Session,
    /// Shared by every tab of the origin (`localStorage`)
    Persistent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterConfig {
    pub storage_scope: StorageScope,
    pub storage_key: String,
    /// URL params look like `?{prefix}-mealType=breakfast`
    pub url_param_prefix: String,
    pub max_history_size: usize,
    pub debounce_delay_ms: u32,
    pub enable_url_sync: bool,
    pub enable_history: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            storage_scope: StorageScope::Session,
            storage_key: "meal-planner-filters".to_string(),
            url_param_prefix: "filter".to_string(),
            max_history_size: 50,
            debounce_delay_ms: 150,
            enable_url_sync: true,
            enable_history: true,
        }
    }
}

/// Overrides accepted by `initialize_with`/`reconfigure`. Unset fields keep
/// their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub storage_scope: Option<StorageScope>,
    /// Older pages pass a flag instead of a scope
    pub persist_across_sessions: Option<bool>,
    pub storage_key: Option<String>,
    pub url_param_prefix: Option<String>,
    pub max_history_size: Option<usize>,
    pub debounce_delay_ms: Option<u32>,
    pub enable_url_sync: Option<bool>,
    pub enable_history: Option<bool>,
}

impl FilterConfig {
    /// Parse a (possibly partial) JSON configuration document.
    pub fn from_json(raw: &str) -> Result<Self, FilterError> {
        let config: FilterConfig = serde_json::from_str(raw).map_err(FilterError::Config)?;
        Ok(config.normalized())
    }

    pub fn with_options(mut self, options: &FilterOptions) -> Self {
        if let Some(persist) = options.persist_across_sessions {
            self.storage_scope = if persist {
                StorageScope::Persistent
            } else {
                StorageScope::Session
            };
        }
        if let Some(scope) = options.storage_scope {
            self.storage_scope = scope;
        }
        if let Some(key) = &options.storage_key {
            self.storage_key = key.clone();
        }
        if let Some(prefix) = &options.url_param_prefix {
            self.url_param_prefix = prefix.clone();
        }
        if let Some(size) = options.max_history_size {
            self.max_history_size = size;
        }
        if let Some(delay) = options.debounce_delay_ms {
            self.debounce_delay_ms = delay;
        }
        if let Some(enabled) = options.enable_url_sync {
            self.enable_url_sync = enabled;
        }
        if let Some(enabled) = options.enable_history {
            self.enable_history = enabled;
        }
        self.normalized()
    }

    fn normalized(mut self) -> Self {
        // the current entry must always fit
        self.max_history_size = self.max_history_size.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FilterConfig::default();
        assert_eq!(config.storage_scope, StorageScope::Session);
        assert_eq!(config.storage_key, "meal-planner-filters");
        assert_eq!(config.url_param_prefix, "filter");
        assert_eq!(config.max_history_size, 50);
        assert_eq!(config.debounce_delay_ms, 150);
        assert!(config.enable_url_sync);
        assert!(config.enable_history);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            FilterConfig::from_json(r#"{"storageScope":"persistent","maxHistorySize":0}"#)
                .unwrap();
        assert_eq!(config.storage_scope, StorageScope::Persistent);
        assert_eq!(config.max_history_size, 1);
        assert_eq!(config.storage_key, "meal-planner-filters");
    }

    #[test]
    fn test_options_override() {
        let options: FilterOptions = serde_json::from_str(
            r#"{"persistAcrossSessions":true,"urlParamPrefix":"f","enableHistory":false}"#,
        )
        .unwrap();
        let config = FilterConfig::default().with_options(&options);
        assert_eq!(config.storage_scope, StorageScope::Persistent);
        assert_eq!(config.url_param_prefix, "f");
        assert!(!config.enable_history);
        assert_eq!(config.debounce_delay_ms, 150);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(FilterConfig::from_json("{not json").is_err());
    }
}
