//! Leptos controls bound to a [`FilterStateManager`].
//!
//! The manager stays the single source of truth; signals in
//! [`FilterContext`] only mirror what it reports through its listeners.

pub mod controls;
pub mod share;
pub mod toolbar;

pub use controls::{CategoryChips, DateRangeInputs, MealTypeButtons};
pub use toolbar::FilterToolbar;

use crate::shared::filter_state::{FilterStateManager, HistoryInfo};
use contracts::shared::filters::FilterState;
use leptos::prelude::*;

#[derive(Clone, Copy)]
pub struct FilterContext {
    manager: StoredValue<FilterStateManager, LocalStorage>,
    pub state: RwSignal<FilterState>,
    pub history: RwSignal<HistoryInfo>,
    /// Last error reported by the manager, shown under the toolbar
    pub last_error: RwSignal<Option<String>>,
}

impl FilterContext {
    pub fn new(manager: FilterStateManager) -> Self {
        let state = RwSignal::new(manager.state());
        let history = RwSignal::new(manager.history_info());
        let last_error = RwSignal::new(None);

        manager.on_state_change(move |event| {
            state.set(event.state.clone());
            Ok(())
        });
        manager.on_history_change(move |info| {
            history.set(*info);
            Ok(())
        });
        manager.on_error(move |event| {
            last_error.set(Some(format!("{}: {}", event.message, event.error)));
            Ok(())
        });

        Self {
            manager: StoredValue::new_local(manager),
            state,
            history,
            last_error,
        }
    }

    pub fn manager(&self) -> FilterStateManager {
        self.manager.get_value()
    }

    pub fn clear_error(&self) {
        self.last_error.set(None);
    }
}

pub fn provide_filter_context(manager: FilterStateManager) -> FilterContext {
    let ctx = FilterContext::new(manager);
    provide_context(ctx);
    ctx
}

pub fn use_filter_context() -> FilterContext {
    expect_context::<FilterContext>()
}
