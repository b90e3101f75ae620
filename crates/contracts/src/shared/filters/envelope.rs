use super::state::{FilterPatch, FilterState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const EXPORT_VERSION: u32 = 1;

/// Shareable export of the filter selection (`{version, state, timestamp}`).
///
/// `state` names every recognized key, with `null` for cleared ones, so
/// importing it merges back to exactly the exported selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEnvelope {
    pub version: u32,
    pub state: FilterPatch,
    pub timestamp: DateTime<Utc>,
}

impl ExportEnvelope {
    pub fn new(state: FilterPatch, timestamp: DateTime<Utc>) -> Self {
        Self {
            version: EXPORT_VERSION,
            state,
            timestamp,
        }
    }
}

/// Data attached to a browser history entry so back/forward navigation can
/// restore filters without re-parsing the URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationState {
    pub filters: FilterState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::filters::FilterSchema;

    #[test]
    fn test_envelope_shape() {
        let mut current = FilterState::new();
        current.set("mealType", Some("lunch".into()));
        let state = FilterSchema::meal_planner().complete_patch(&current);
        let timestamp = DateTime::parse_from_rfc3339("2025-01-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let json = serde_json::to_value(ExportEnvelope::new(state, timestamp)).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["state"]["mealType"], "lunch");
        assert!(json["state"]["dateFrom"].is_null());
        assert!(json["state"]["category"].is_null());
        assert_eq!(json["timestamp"], "2025-01-01T10:00:00Z");
    }
}
