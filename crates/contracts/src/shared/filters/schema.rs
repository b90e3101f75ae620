use super::state::{FilterPatch, FilterState, FilterValue};
use serde::{Deserialize, Serialize};

/// Sentinel value meaning "no filter applied" for a key.
pub const NO_FILTER: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// One value (or none) per key
    Single,
    /// A small set of values per key
    Multi,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterField {
    pub key: String,
    pub kind: FieldKind,
    /// Value the key holds after a reset
    pub default: Option<String>,
    /// Prefix used in the human-readable description
    pub label: Option<String>,
}

impl FilterField {
    pub fn single(key: &str) -> Self {
        Self {
            key: key.to_string(),
            kind: FieldKind::Single,
            default: None,
            label: None,
        }
    }

    pub fn multi(key: &str) -> Self {
        Self {
            kind: FieldKind::Multi,
            ..Self::single(key)
        }
    }

    pub fn with_default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    /// Coerce a value to this field's kind. A single value given to a
    /// multi-valued key becomes a one-element set; a set given to a
    /// single-valued key is not representable and is dropped.
    fn coerce(&self, value: FilterValue) -> Option<FilterValue> {
        match (self.kind, value) {
            (FieldKind::Single, FilterValue::One(value)) => Some(FilterValue::One(value)),
            (FieldKind::Single, FilterValue::Many(_)) => None,
            (FieldKind::Multi, FilterValue::One(value)) => Some(FilterValue::many([value])),
            (FieldKind::Multi, many @ FilterValue::Many(_)) => Some(many),
        }
    }
}

/// The fixed, ordered set of recognized filter keys.
///
/// Declaration order is the order used for URL parameters and for the
/// filter description, so both are reproducible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSchema {
    fields: Vec<FilterField>,
}

impl FilterSchema {
    pub fn new(fields: Vec<FilterField>) -> Self {
        Self { fields }
    }

    /// Filters of the meal log dashboard.
    pub fn meal_planner() -> Self {
        Self::new(vec![
            FilterField::single("mealType").with_default(NO_FILTER),
            FilterField::single("dateFrom").with_label("from"),
            FilterField::single("dateTo").with_label("to"),
            FilterField::multi("category").with_label("category:"),
        ])
    }

    pub fn fields(&self) -> &[FilterField] {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<&FilterField> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn recognizes(&self, key: &str) -> bool {
        self.field(key).is_some()
    }

    /// Hard defaults: every field holding its declared default.
    pub fn defaults(&self) -> FilterState {
        self.fields
            .iter()
            .filter_map(|f| {
                f.default
                    .as_ref()
                    .map(|d| (f.key.clone(), FilterValue::One(d.clone())))
            })
            .collect()
    }

    /// Drop unknown keys and coerce values to their field kind.
    pub fn sanitize(&self, state: FilterState) -> FilterState {
        let mut clean = FilterState::new();
        for (key, value) in state.iter() {
            if let Some(field) = self.field(key) {
                clean.set(key, field.coerce(value.clone()));
            }
        }
        clean
    }

    /// Shallow last-write-wins merge of `patch` over `base`, restricted to
    /// recognized keys.
    pub fn apply(&self, base: &FilterState, patch: &FilterPatch) -> FilterState {
        let mut next = base.clone();
        for (key, value) in patch.iter() {
            let Some(field) = self.field(key) else {
                continue;
            };
            next.set(key, value.cloned().and_then(|v| field.coerce(v)));
        }
        next
    }

    /// Every recognized key with its value in `state`; keys `state` does not
    /// hold are explicit clears. Applying it over any state yields `state`.
    pub fn complete_patch(&self, state: &FilterState) -> FilterPatch {
        let mut patch = FilterPatch::new();
        for field in &self.fields {
            patch.insert(field.key.clone(), state.get(&field.key).cloned());
        }
        patch
    }

    /// Number of recognized keys a patch would touch.
    pub fn recognized_len(&self, patch: &FilterPatch) -> usize {
        patch.iter().filter(|(key, _)| self.recognizes(key)).count()
    }

    pub fn is_field_active(&self, state: &FilterState, field: &FilterField) -> bool {
        state
            .get(&field.key)
            .map(|value| value.iter().any(|v| v != NO_FILTER))
            .unwrap_or(false)
    }

    pub fn has_active_filters(&self, state: &FilterState) -> bool {
        self.fields.iter().any(|f| self.is_field_active(state, f))
    }

    /// Short human-readable summary of every active filter, in declared
    /// field order.
    pub fn describe(&self, state: &FilterState) -> String {
        let parts: Vec<String> = self
            .fields
            .iter()
            .filter(|f| self.is_field_active(state, f))
            .map(|f| {
                let values: Vec<&str> = state
                    .values(&f.key)
                    .into_iter()
                    .filter(|v| *v != NO_FILTER)
                    .collect();
                let joined = values.join(" or ");
                match &f.label {
                    Some(label) => format!("{} {}", label, joined),
                    None => joined,
                }
            })
            .collect();

        if parts.is_empty() {
            "No filters applied".to_string()
        } else {
            format!("Filtering by: {}", parts.join(", "))
        }
    }
}

impl Default for FilterSchema {
    fn default() -> Self {
        Self::meal_planner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let schema = FilterSchema::meal_planner();
        let defaults = schema.defaults();
        assert_eq!(defaults.scalar("mealType"), Some("all"));
        assert_eq!(defaults.len(), 1);
        assert!(!schema.has_active_filters(&defaults));
    }

    #[test]
    fn test_apply_ignores_unknown_keys() {
        let schema = FilterSchema::meal_planner();
        let patch = FilterPatch::new()
            .set("mealType", "lunch")
            .set("colour", "blue");
        let next = schema.apply(&schema.defaults(), &patch);
        assert_eq!(next.scalar("mealType"), Some("lunch"));
        assert!(!next.contains_key("colour"));
        assert_eq!(schema.recognized_len(&patch), 1);
    }

    #[test]
    fn test_apply_merges_and_clears() {
        let schema = FilterSchema::meal_planner();
        let first = schema.apply(
            &schema.defaults(),
            &FilterPatch::new().set("dateFrom", "2025-01-01"),
        );
        let second = schema.apply(
            &first,
            &FilterPatch::new().set("mealType", "dinner").clear("dateFrom"),
        );
        assert_eq!(second.scalar("mealType"), Some("dinner"));
        assert!(!second.contains_key("dateFrom"));
    }

    #[test]
    fn test_complete_patch_overrides_any_base() {
        let schema = FilterSchema::meal_planner();
        let mut target = schema.defaults();
        target.set("dateTo", Some("2025-02-01".into()));
        let patch = schema.complete_patch(&target);
        assert_eq!(patch.len(), schema.fields().len());
        assert_eq!(patch.get("dateFrom"), Some(&None));

        let mut other = schema.defaults();
        other.set("mealType", Some("lunch".into()));
        other.set("dateFrom", Some("2025-01-01".into()));
        other.insert_value("category", "dairy");
        assert_eq!(schema.apply(&other, &patch), target);
    }

    #[test]
    fn test_sanitize_coerces_kinds() {
        let schema = FilterSchema::meal_planner();
        let raw: FilterState = serde_json::from_str(
            r#"{"category":"fruits","mealType":["a","b"],"other":"x"}"#,
        )
        .unwrap();
        let clean = schema.sanitize(raw);
        assert_eq!(clean.values("category"), vec!["fruits"]);
        assert!(!clean.contains_key("mealType"));
        assert!(!clean.contains_key("other"));
    }

    #[test]
    fn test_describe_uses_declared_order() {
        let schema = FilterSchema::meal_planner();
        let mut state = schema.defaults();
        state.set("dateTo", Some("2025-01-31".into()));
        state.insert_value("category", "vegetables");
        state.insert_value("category", "fruits");
        state.set("mealType", Some("breakfast".into()));
        state.set("dateFrom", Some("2025-01-01".into()));
        assert_eq!(
            schema.describe(&state),
            "Filtering by: breakfast, from 2025-01-01, to 2025-01-31, category: fruits or vegetables"
        );
    }

    #[test]
    fn test_describe_without_filters() {
        let schema = FilterSchema::meal_planner();
        assert_eq!(schema.describe(&schema.defaults()), "No filters applied");
        assert_eq!(schema.describe(&FilterState::new()), "No filters applied");
    }
}
