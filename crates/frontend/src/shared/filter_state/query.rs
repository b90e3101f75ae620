//! Query string encoding of the filter state.
//!
//! Each recognized key `k` becomes `{prefix}-{k}=value`; multi-valued keys
//! repeat the parameter once per value. Null values and the "no filter"
//! sentinel are never written, so the query string stays minimal.

use contracts::shared::filters::{
    FieldKind, FilterPatch, FilterSchema, FilterState, FilterValue, NO_FILTER,
};
use std::collections::BTreeSet;

pub fn build_query(state: &FilterState, schema: &FilterSchema, prefix: &str) -> String {
    let mut params = Vec::new();
    for field in schema.fields() {
        let Some(value) = state.get(&field.key) else {
            continue;
        };
        let name = urlencoding::encode(&format!("{}-{}", prefix, field.key)).into_owned();
        for v in value.iter().filter(|v| *v != NO_FILTER) {
            params.push(format!("{}={}", name, urlencoding::encode(v)));
        }
    }
    params.join("&")
}

/// Read prefixed filter params from a query string (with or without the
/// leading `?`). Unrecognized or undecodable params are skipped.
pub fn parse_query(search: &str, schema: &FilterSchema, prefix: &str) -> FilterPatch {
    let marker = format!("{}-", prefix);
    let mut singles: Vec<(String, Option<FilterValue>)> = Vec::new();
    let mut multis: Vec<(String, BTreeSet<String>)> = Vec::new();

    for pair in search.trim_start_matches('?').split('&') {
        if pair.is_empty() {
            continue;
        }
        let (raw_name, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let (Some(name), Some(value)) = (decode_component(raw_name), decode_component(raw_value))
        else {
            log::debug!("skipping undecodable query param {:?}", pair);
            continue;
        };
        let Some(key) = name.strip_prefix(&marker) else {
            continue;
        };
        let Some(field) = schema.field(key) else {
            log::debug!("ignoring unrecognized filter param {:?}", name);
            continue;
        };

        match field.kind {
            FieldKind::Single => {
                let value = (value != "null").then(|| FilterValue::One(value));
                singles.retain(|(existing, _)| existing != key);
                singles.push((key.to_string(), value));
            }
            FieldKind::Multi => {
                match multis.iter_mut().find(|(existing, _)| existing == key) {
                    Some((_, values)) => {
                        values.insert(value);
                    }
                    None => multis.push((key.to_string(), BTreeSet::from([value]))),
                }
            }
        }
    }

    let mut patch = FilterPatch::new();
    for (key, value) in singles {
        patch.insert(key, value);
    }
    for (key, values) in multis {
        patch.insert(key, Some(FilterValue::Many(values)));
    }
    patch
}

/// `application/x-www-form-urlencoded` decoding: `+` is a space.
fn decode_component(raw: &str) -> Option<String> {
    urlencoding::decode(&raw.replace('+', " "))
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// Replace the query part of `href`, keeping path and fragment. An empty
/// query removes the `?` entirely.
pub fn with_query(href: &str, query: &str) -> String {
    let (without_fragment, fragment) = match href.find('#') {
        Some(pos) => href.split_at(pos),
        None => (href, ""),
    };
    let base = without_fragment
        .split_once('?')
        .map(|(base, _)| base)
        .unwrap_or(without_fragment);

    if query.is_empty() {
        format!("{}{}", base, fragment)
    } else {
        format!("{}?{}{}", base, query, fragment)
    }
}

/// Query part of an absolute or relative URL, without the `?`.
pub fn query_of(href: &str) -> &str {
    let without_fragment = href.split('#').next().unwrap_or(href);
    without_fragment
        .split_once('?')
        .map(|(_, query)| query)
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> FilterSchema {
        FilterSchema::meal_planner()
    }

    #[test]
    fn test_build_omits_defaults_and_nulls() {
        let schema = schema();
        assert_eq!(build_query(&schema.defaults(), &schema, "filter"), "");

        let mut state = schema.defaults();
        state.set("mealType", Some("lunch".into()));
        state.set("dateTo", Some("2025-02-01".into()));
        assert_eq!(
            build_query(&state, &schema, "filter"),
            "filter-mealType=lunch&filter-dateTo=2025-02-01"
        );
    }

    #[test]
    fn test_build_repeats_multi_values_and_encodes() {
        let schema = schema();
        let mut state = FilterState::new();
        state.insert_value("category", "dairy & eggs");
        state.insert_value("category", "fruits");
        assert_eq!(
            build_query(&state, &schema, "filter"),
            "filter-category=dairy%20%26%20eggs&filter-category=fruits"
        );
    }

    #[test]
    fn test_parse_reads_recognized_keys_only() {
        let patch = parse_query(
            "?filter-mealType=dinner&filter-colour=red&page=2&filter-dateFrom=null",
            &schema(),
            "filter",
        );
        assert_eq!(patch.len(), 2);
        assert_eq!(
            patch.get("mealType"),
            Some(&Some(FilterValue::One("dinner".into())))
        );
        assert_eq!(patch.get("dateFrom"), Some(&None));
    }

    #[test]
    fn test_parse_collects_multi_values() {
        let patch = parse_query(
            "filter-category=fruits&filter-category=dairy+%26+eggs&filter-category=fruits",
            &schema(),
            "filter",
        );
        assert_eq!(
            patch.get("category"),
            Some(&Some(FilterValue::many(["dairy & eggs", "fruits"])))
        );
    }

    #[test]
    fn test_parse_respects_prefix() {
        let patch = parse_query("f-mealType=snack&filter-mealType=lunch", &schema(), "f");
        assert_eq!(
            patch.get("mealType"),
            Some(&Some(FilterValue::One("snack".into())))
        );
    }

    #[test]
    fn test_with_query() {
        assert_eq!(
            with_query("https://app.test/log?old=1#top", "filter-mealType=lunch"),
            "https://app.test/log?filter-mealType=lunch#top"
        );
        assert_eq!(with_query("https://app.test/log?old=1", ""), "https://app.test/log");
        assert_eq!(query_of("https://app.test/log?a=1#x"), "a=1");
        assert_eq!(query_of("https://app.test/log"), "");
    }
}
