//! Initial state restoration from a prioritized list of sources.
//!
//! Sources are asked in order; the first one that yields at least one
//! recognized key wins entirely. There is no field-by-field merge across
//! sources.

use super::config::StorageScope;
use super::error::FilterError;
use super::navigation::Navigator;
use super::query;
use super::storage::FilterStorage;
use contracts::shared::filters::{FilterPatch, FilterSchema, FilterState};

#[derive(Debug, Clone, PartialEq)]
pub enum Restored {
    NoData,
    /// Only some keys; applied over the schema defaults
    Partial(FilterPatch),
    /// A complete mapping; used as is
    Full(FilterState),
}

pub trait StateProvider {
    fn name(&self) -> &'static str;

    fn provide(&self, schema: &FilterSchema) -> Result<Restored, FilterError>;
}

/// Filters encoded in the current URL's query string.
pub struct UrlProvider<'a> {
    pub navigator: &'a dyn Navigator,
    pub prefix: &'a str,
}

impl StateProvider for UrlProvider<'_> {
    fn name(&self) -> &'static str {
        "url"
    }

    fn provide(&self, schema: &FilterSchema) -> Result<Restored, FilterError> {
        let patch = query::parse_query(&self.navigator.search(), schema, self.prefix);
        if patch.is_empty() {
            Ok(Restored::NoData)
        } else {
            Ok(Restored::Partial(patch))
        }
    }
}

/// The blob saved by a previous page view.
pub struct StorageProvider<'a> {
    pub storage: &'a dyn FilterStorage,
    pub scope: StorageScope,
    pub key: &'a str,
}

impl StorageProvider<'_> {
    /// Read and sanitize the stored blob. `Ok(None)` when nothing is stored.
    pub fn load(&self, schema: &FilterSchema) -> Result<Option<FilterState>, FilterError> {
        let Some(raw) = self.storage.get_item(self.scope, self.key)? else {
            return Ok(None);
        };
        let state: FilterState =
            serde_json::from_str(&raw).map_err(FilterError::CorruptStorage)?;
        Ok(Some(schema.sanitize(state)))
    }
}

impl StateProvider for StorageProvider<'_> {
    fn name(&self) -> &'static str {
        "storage"
    }

    fn provide(&self, schema: &FilterSchema) -> Result<Restored, FilterError> {
        Ok(match self.load(schema)? {
            Some(state) => Restored::Full(state),
            None => Restored::NoData,
        })
    }
}

pub struct DefaultsProvider;

impl StateProvider for DefaultsProvider {
    fn name(&self) -> &'static str {
        "defaults"
    }

    fn provide(&self, schema: &FilterSchema) -> Result<Restored, FilterError> {
        Ok(Restored::Full(schema.defaults()))
    }
}

#[derive(Debug)]
pub struct Restoration {
    pub state: FilterState,
    /// Name of the provider that won
    pub provider: &'static str,
    /// Failures of providers that were skipped
    pub errors: Vec<FilterError>,
}

pub fn restore(providers: &[&dyn StateProvider], schema: &FilterSchema) -> Restoration {
    let mut errors = Vec::new();

    for provider in providers {
        let restored = match provider.provide(schema) {
            Ok(restored) => restored,
            Err(e) => {
                log::warn!("{} provider failed, trying next source: {}", provider.name(), e);
                errors.push(e);
                continue;
            }
        };

        let state = match restored {
            Restored::NoData => continue,
            Restored::Partial(patch) if schema.recognized_len(&patch) > 0 => {
                schema.apply(&schema.defaults(), &patch)
            }
            Restored::Partial(_) => continue,
            Restored::Full(state) => {
                let state = schema.sanitize(state);
                if state.is_empty() {
                    continue;
                }
                state
            }
        };

        log::debug!("restored filter state from {}", provider.name());
        return Restoration {
            state,
            provider: provider.name(),
            errors,
        };
    }

    Restoration {
        state: schema.defaults(),
        provider: DefaultsProvider.name(),
        errors,
    }
}
