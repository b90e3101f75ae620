use crate::shared::filter_panel::{
    provide_filter_context, CategoryChips, DateRangeInputs, FilterToolbar, MealTypeButtons,
};
use crate::shared::filter_state::web::init_browser_manager;
use crate::shared::filter_state::{Collaborators, FilterConfig, FilterOptions, FilterStateManager};
use contracts::shared::filters::FilterSchema;
use leptos::prelude::*;

fn filter_manager() -> FilterStateManager {
    match init_browser_manager(FilterSchema::meal_planner(), &FilterOptions::default()) {
        Ok(manager) => manager,
        Err(e) => {
            log::error!("browser filter state unavailable, keeping filters in memory: {}", e);
            let manager = FilterStateManager::new(
                FilterSchema::meal_planner(),
                FilterConfig::default(),
                Collaborators::in_memory(),
            );
            manager.initialize();
            manager
        }
    }
}

#[component]
pub fn App() -> impl IntoView {
    // Provide the filter manager to every control via context.
    provide_filter_context(filter_manager());

    view! {
        <main class="meal-planner">
            <h1>"Meal log"</h1>
            <FilterToolbar />
            <section class="meal-planner__filters">
                <MealTypeButtons />
                <DateRangeInputs />
                <CategoryChips />
            </section>
        </main>
    }
}
