use contracts::shared::filters::FilterState;
use serde::Serialize;
use std::collections::VecDeque;

/// Snapshot of the undo stack position, carried by history-change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryInfo {
    pub size: usize,
    /// Position of the current entry; `None` while the history is empty
    pub index: Option<usize>,
    pub can_undo: bool,
    pub can_redo: bool,
}

/// Bounded linear undo stack of full state snapshots.
///
/// Entries after `index` form the redo tail. Pushing truncates that tail,
/// and once `max_size` is exceeded the oldest entries are evicted with the
/// index shifted so it keeps addressing the same logical entry.
#[derive(Debug, Clone)]
pub struct StateHistory {
    entries: VecDeque<FilterState>,
    index: usize,
    max_size: usize,
}

impl StateHistory {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            index: 0,
            max_size: max_size.max(1),
        }
    }

    /// Start over with a single entry.
    pub fn reset(&mut self, initial: FilterState) {
        self.entries.clear();
        self.entries.push_back(initial);
        self.index = 0;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index = 0;
    }

    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size.max(1);
        self.evict();
    }

    pub fn push(&mut self, state: FilterState) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }
        self.entries.push_back(state);
        self.index = self.entries.len() - 1;
        self.evict();
    }

    fn evict(&mut self) {
        let overflow = self.entries.len().saturating_sub(self.max_size);
        if overflow > 0 {
            self.entries.drain(..overflow);
            self.index = self.index.saturating_sub(overflow);
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty() && self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        !self.entries.is_empty() && self.index + 1 < self.entries.len()
    }

    /// Step back and return the entry that is now current.
    pub fn undo(&mut self) -> Option<&FilterState> {
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        self.entries.get(self.index)
    }

    /// Step forward and return the entry that is now current.
    pub fn redo(&mut self) -> Option<&FilterState> {
        if !self.can_redo() {
            return None;
        }
        self.index += 1;
        self.entries.get(self.index)
    }

    pub fn current(&self) -> Option<&FilterState> {
        self.entries.get(self.index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn info(&self) -> HistoryInfo {
        HistoryInfo {
            size: self.entries.len(),
            index: (!self.entries.is_empty()).then_some(self.index),
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meal(value: &str) -> FilterState {
        let mut state = FilterState::new();
        state.set("mealType", Some(value.into()));
        state
    }

    #[test]
    fn test_empty_history() {
        let history = StateHistory::new(10);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(history.info().index, None);
    }

    #[test]
    fn test_undo_redo_walks_entries() {
        let mut history = StateHistory::new(10);
        history.reset(meal("all"));
        history.push(meal("breakfast"));
        history.push(meal("lunch"));

        assert_eq!(history.undo(), Some(&meal("breakfast")));
        assert_eq!(history.undo(), Some(&meal("all")));
        assert_eq!(history.undo(), None);
        assert_eq!(history.redo(), Some(&meal("breakfast")));
        assert!(history.can_redo());
    }

    #[test]
    fn test_push_truncates_redo_tail() {
        let mut history = StateHistory::new(10);
        history.reset(meal("all"));
        history.push(meal("breakfast"));
        history.push(meal("lunch"));
        history.undo();
        history.undo();

        history.push(meal("dinner"));
        assert!(!history.can_redo());
        assert_eq!(history.len(), 2);
        assert_eq!(history.undo(), Some(&meal("all")));
    }

    #[test]
    fn test_eviction_keeps_index_on_current_entry() {
        let mut history = StateHistory::new(3);
        history.reset(meal("s0"));
        for i in 1..=5 {
            history.push(meal(&format!("s{i}")));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.current(), Some(&meal("s5")));
        assert_eq!(history.info().index, Some(2));

        // oldest retained entry is reachable, not an error
        assert_eq!(history.undo(), Some(&meal("s4")));
        assert_eq!(history.undo(), Some(&meal("s3")));
        assert_eq!(history.undo(), None);
    }

    #[test]
    fn test_shrinking_max_size_evicts_oldest() {
        let mut history = StateHistory::new(10);
        history.reset(meal("s0"));
        history.push(meal("s1"));
        history.push(meal("s2"));
        history.undo();

        history.set_max_size(2);
        assert_eq!(history.len(), 2);
        assert_eq!(history.current(), Some(&meal("s1")));
        assert!(history.can_redo());
    }
}
