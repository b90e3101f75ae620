use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Value of a single filter key.
///
/// Serialized untagged: a plain string for single-valued keys, an array of
/// strings for multi-valued keys (`category`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    One(String),
    Many(BTreeSet<String>),
}

impl FilterValue {
    pub fn many<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilterValue::Many(values.into_iter().map(Into::into).collect())
    }

    /// An empty string or an empty set carries no filter at all.
    pub fn is_empty(&self) -> bool {
        match self {
            FilterValue::One(value) => value.is_empty(),
            FilterValue::Many(values) => values.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FilterValue::One(value) => Some(value),
            FilterValue::Many(_) => None,
        }
    }

    /// All values, in stable order (a set iterates sorted).
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let (one, many) = match self {
            FilterValue::One(value) => (Some(value.as_str()), None),
            FilterValue::Many(values) => (None, Some(values.iter().map(String::as_str))),
        };
        one.into_iter().chain(many.into_iter().flatten())
    }

    pub fn contains(&self, value: &str) -> bool {
        self.iter().any(|v| v == value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::One(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::One(value)
    }
}

/// Current filter selection: a flat mapping from filter key to value.
///
/// The map is kept normalized: a key that would hold `null`, an empty string
/// or an empty set is simply not stored, so "no value" and "key absent" compare
/// equal. Serializes as the raw JSON object used for the storage blob.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct FilterState {
    values: BTreeMap<String, FilterValue>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.values.get(key)
    }

    /// Value of a single-valued key.
    pub fn scalar(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(FilterValue::as_str)
    }

    /// Every value stored under `key`, empty when the key is absent.
    pub fn values(&self, key: &str) -> Vec<&str> {
        self.values
            .get(key)
            .map(|value| value.iter().collect())
            .unwrap_or_default()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn contains_value(&self, key: &str, value: &str) -> bool {
        self.values
            .get(key)
            .map(|current| current.contains(value))
            .unwrap_or(false)
    }

    /// Replace the value under `key`; `None` (or an empty value) removes it.
    /// Returns whether the state changed.
    pub fn set(&mut self, key: impl Into<String>, value: Option<FilterValue>) -> bool {
        let key = key.into();
        match value.filter(|v| !v.is_empty()) {
            Some(value) => self.values.insert(key, value.clone()).as_ref() != Some(&value),
            None => self.values.remove(&key).is_some(),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<FilterValue> {
        self.values.remove(key)
    }

    /// Add one value to a multi-valued key. Adding a value that is already
    /// present changes nothing.
    pub fn insert_value(&mut self, key: &str, value: &str) -> bool {
        if value.is_empty() {
            return false;
        }
        match self.values.get_mut(key) {
            Some(FilterValue::Many(values)) => values.insert(value.to_string()),
            Some(FilterValue::One(current)) => {
                if current.as_str() == value {
                    return false;
                }
                let previous = std::mem::take(current);
                self.values.insert(
                    key.to_string(),
                    FilterValue::many([previous, value.to_string()]),
                );
                true
            }
            None => {
                self.values
                    .insert(key.to_string(), FilterValue::many([value]));
                true
            }
        }
    }

    /// Remove one value from a key. Removing the last value removes the key.
    pub fn remove_value(&mut self, key: &str, value: &str) -> bool {
        let (changed, now_empty) = match self.values.get_mut(key) {
            Some(FilterValue::Many(values)) => {
                let changed = values.remove(value);
                (changed, values.is_empty())
            }
            Some(FilterValue::One(current)) if current.as_str() == value => (true, true),
            _ => (false, false),
        };
        if now_empty {
            self.values.remove(key);
        }
        changed
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, FilterValue)> for FilterState {
    fn from_iter<I: IntoIterator<Item = (String, FilterValue)>>(iter: I) -> Self {
        let mut state = FilterState::new();
        for (key, value) in iter {
            state.set(key, Some(value));
        }
        state
    }
}

impl<'de> Deserialize<'de> for FilterState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, Option<FilterValue>>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .filter_map(|(key, value)| value.map(|value| (key, value)))
            .collect())
    }
}

/// Partial update for [`FilterState`]: `Some` overwrites a key, `None` clears it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterPatch {
    entries: BTreeMap<String, Option<FilterValue>>,
}

impl FilterPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries
            .insert(key.into(), Some(FilterValue::One(value.into())));
        self
    }

    pub fn set_values<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries
            .insert(key.into(), Some(FilterValue::many(values)));
        self
    }

    pub fn clear(mut self, key: impl Into<String>) -> Self {
        self.entries.insert(key.into(), None);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Option<FilterValue>) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Option<FilterValue>> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&FilterValue>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<FilterState> for FilterPatch {
    fn from(state: FilterState) -> Self {
        Self {
            entries: state
                .values
                .into_iter()
                .map(|(key, value)| (key, Some(value)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nulls_and_empty_values_are_dropped() {
        let state: FilterState = serde_json::from_str(
            r#"{"mealType":"all","dateFrom":null,"dateTo":"","category":[]}"#,
        )
        .unwrap();
        assert_eq!(state.len(), 1);
        assert_eq!(state.scalar("mealType"), Some("all"));
        assert!(!state.contains_key("dateFrom"));
        assert!(!state.contains_key("category"));
    }

    #[test]
    fn test_serializes_as_flat_mapping() {
        let mut state = FilterState::new();
        state.set("mealType", Some("lunch".into()));
        state.insert_value("category", "fruits");
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"category":["fruits"],"mealType":"lunch"}"#);
    }

    #[test]
    fn test_insert_value_is_idempotent() {
        let mut state = FilterState::new();
        assert!(state.insert_value("category", "fruits"));
        assert!(!state.insert_value("category", "fruits"));
        assert!(state.insert_value("category", "dairy"));
        assert_eq!(state.values("category"), vec!["dairy", "fruits"]);
    }

    #[test]
    fn test_removing_last_value_removes_key() {
        let mut state = FilterState::new();
        state.insert_value("category", "fruits");
        assert!(state.remove_value("category", "fruits"));
        assert!(!state.remove_value("category", "fruits"));
        assert!(!state.contains_key("category"));
        assert_eq!(state, FilterState::new());
    }

    #[test]
    fn test_set_reports_change() {
        let mut state = FilterState::new();
        assert!(state.set("mealType", Some("dinner".into())));
        assert!(!state.set("mealType", Some("dinner".into())));
        assert!(state.set("mealType", None));
        assert!(!state.set("mealType", None));
    }

    #[test]
    fn test_patch_accepts_nulls() {
        let patch: FilterPatch =
            serde_json::from_str(r#"{"mealType":"snack","dateFrom":null}"#).unwrap();
        assert_eq!(patch.len(), 2);
        assert_eq!(patch.get("dateFrom"), Some(&None));
    }
}
