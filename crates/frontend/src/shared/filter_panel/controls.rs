use super::use_filter_context;
use crate::shared::filter_state::SetOptions;
use contracts::shared::filters::{FilterPatch, NO_FILTER};
use leptos::prelude::*;

pub const MEAL_TYPES: &[(&str, &str)] = &[
    (NO_FILTER, "All meals"),
    ("breakfast", "Breakfast"),
    ("lunch", "Lunch"),
    ("dinner", "Dinner"),
    ("snack", "Snack"),
];

pub const CATEGORIES: &[(&str, &str)] = &[
    ("fruits", "Fruits"),
    ("vegetables", "Vegetables"),
    ("grains", "Grains"),
    ("protein", "Protein"),
    ("dairy", "Dairy"),
];

/// One pressed button per meal type; "All meals" clears the filter.
#[component]
pub fn MealTypeButtons() -> impl IntoView {
    let ctx = use_filter_context();

    view! {
        <div class="filter-group meal-type-buttons" role="group" aria-label="Meal type">
            {MEAL_TYPES
                .iter()
                .map(|&(value, label)| {
                    let pressed = move || {
                        ctx.state.with(|s| s.scalar("mealType").unwrap_or(NO_FILTER) == value)
                    };
                    view! {
                        <button
                            type="button"
                            class=move || if pressed() { "button button--primary" } else { "button button--secondary" }
                            aria-pressed=move || pressed().to_string()
                            on:click=move |_| {
                                let patch = FilterPatch::new().set("mealType", value);
                                if let Err(e) = ctx.manager().set_state(patch, SetOptions::tagged("meal-type")) {
                                    log::warn!("meal type not applied: {}", e);
                                }
                            }
                        >
                            {label}
                        </button>
                    }
                })
                .collect_view()}
        </div>
    }
}

#[component]
pub fn DateRangeInputs() -> impl IntoView {
    let ctx = use_filter_context();

    let date_input = move |key: &'static str, label: &'static str| {
        let value = move || ctx.state.with(|s| s.scalar(key).unwrap_or_default().to_string());
        view! {
            <label class="filter-date">
                <span>{label}</span>
                <input
                    type="date"
                    prop:value=value
                    on:change=move |ev| {
                        let raw = event_target_value(&ev);
                        let patch = if raw.is_empty() {
                            FilterPatch::new().clear(key)
                        } else {
                            FilterPatch::new().set(key, raw)
                        };
                        if let Err(e) = ctx.manager().set_state(patch, SetOptions::tagged("date-range")) {
                            log::warn!("{} not applied: {}", key, e);
                        }
                    }
                />
            </label>
        }
    };

    view! {
        <div class="filter-group date-range">
            {date_input("dateFrom", "From")}
            {date_input("dateTo", "To")}
        </div>
    }
}

/// Toggle chips for the multi-valued `category` filter.
#[component]
pub fn CategoryChips() -> impl IntoView {
    let ctx = use_filter_context();

    view! {
        <div class="filter-group category-chips" role="group" aria-label="Category">
            {CATEGORIES
                .iter()
                .map(|&(value, label)| {
                    let active = move || ctx.state.with(|s| s.contains_value("category", value));
                    view! {
                        <button
                            type="button"
                            class=move || if active() { "filter-chip filter-chip--active" } else { "filter-chip" }
                            aria-pressed=move || active().to_string()
                            on:click=move |_| {
                                let manager = ctx.manager();
                                let result = if manager.is_filter_active("category", value) {
                                    manager.remove_filter("category", value)
                                } else {
                                    manager.add_filter("category", value)
                                };
                                if let Err(e) = result {
                                    log::warn!("category {} not toggled: {}", value, e);
                                }
                            }
                        >
                            {label}
                        </button>
                    }
                })
                .collect_view()}
        </div>
    }
}
