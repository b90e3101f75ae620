//! Browser implementations of the collaborators: `sessionStorage` /
//! `localStorage`, `history.replaceState` + `popstate`, and `setTimeout`.

use super::config::{FilterConfig, FilterOptions, StorageScope};
use super::error::FilterError;
use super::handle::Handle;
use super::manager::{Collaborators, FilterStateManager};
use super::navigation::{NavigationWatcher, Navigator};
use super::scheduler::{Scheduler, Task};
use super::storage::{FilterStorage, StorageChange, StorageWatcher};
use contracts::shared::filters::{FilterSchema, NavigationState};
use gloo_timers::callback::Timeout;
use serde::Serialize;
use std::rc::Rc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{DomException, Event, EventTarget, PopStateEvent, Storage, StorageEvent, Window};

fn window() -> Result<Window, FilterError> {
    web_sys::window().ok_or_else(|| FilterError::StorageUnavailable("no window".to_string()))
}

fn js_message(value: &JsValue) -> String {
    value
        .dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.message()))
        .or_else(|| value.as_string())
        .unwrap_or_else(|| format!("{:?}", value))
}

/// Event listener that detaches itself when dropped.
struct DomListener {
    target: EventTarget,
    event: &'static str,
    closure: Closure<dyn FnMut(Event)>,
}

impl DomListener {
    fn attach(
        target: EventTarget,
        event: &'static str,
        handler: impl FnMut(Event) + 'static,
    ) -> Option<Self> {
        let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
        if let Err(e) =
            target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
        {
            log::error!("failed to listen for {}: {}", event, js_message(&e));
            return None;
        }
        Some(Self {
            target,
            event,
            closure,
        })
    }
}

impl Drop for DomListener {
    fn drop(&mut self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(self.event, self.closure.as_ref().unchecked_ref());
    }
}

fn attach(
    target: EventTarget,
    event: &'static str,
    handler: impl FnMut(Event) + 'static,
) -> Handle {
    match DomListener::attach(target, event, handler) {
        Some(listener) => Handle::new(listener),
        None => Handle::noop(),
    }
}

// ============================================================================
// Storage
// ============================================================================

/// `sessionStorage` or `localStorage`, picked per call by scope.
#[derive(Clone, Default)]
pub struct WebStorage;

impl WebStorage {
    fn area(scope: StorageScope) -> Result<Storage, FilterError> {
        let window = window()?;
        let area = match scope {
            StorageScope::Session => window.session_storage(),
            StorageScope::Persistent => window.local_storage(),
        };
        match area {
            Ok(Some(storage)) => Ok(storage),
            Ok(None) => Err(FilterError::StorageUnavailable(format!(
                "{:?} storage is not available",
                scope
            ))),
            Err(e) => Err(FilterError::StorageUnavailable(js_message(&e))),
        }
    }

    fn scope_of(event: &StorageEvent) -> Option<StorageScope> {
        let area = event.storage_area()?;
        let area: &JsValue = area.as_ref();
        let window = web_sys::window()?;
        let same = |candidate: Result<Option<Storage>, JsValue>| {
            candidate
                .ok()
                .flatten()
                .map(|storage| {
                    let storage: &JsValue = storage.as_ref();
                    storage == area
                })
                .unwrap_or(false)
        };
        if same(window.local_storage()) {
            Some(StorageScope::Persistent)
        } else if same(window.session_storage()) {
            Some(StorageScope::Session)
        } else {
            None
        }
    }
}

impl FilterStorage for WebStorage {
    fn get_item(&self, scope: StorageScope, key: &str) -> Result<Option<String>, FilterError> {
        Self::area(scope)?
            .get_item(key)
            .map_err(|e| FilterError::StorageUnavailable(js_message(&e)))
    }

    fn set_item(&self, scope: StorageScope, key: &str, value: &str) -> Result<(), FilterError> {
        Self::area(scope)?.set_item(key, value).map_err(|e| {
            let quota = e
                .dyn_ref::<DomException>()
                .map(|d| d.name() == "QuotaExceededError")
                .unwrap_or(false);
            if quota {
                FilterError::QuotaExceeded
            } else {
                FilterError::StorageUnavailable(js_message(&e))
            }
        })
    }

    fn remove_item(&self, scope: StorageScope, key: &str) -> Result<(), FilterError> {
        Self::area(scope)?
            .remove_item(key)
            .map_err(|e| FilterError::StorageUnavailable(js_message(&e)))
    }

    /// The browser only fires `storage` in other tabs, so our own writes are
    /// never echoed back.
    fn watch(&self, watcher: StorageWatcher) -> Handle {
        let Ok(window) = window() else {
            return Handle::noop();
        };
        attach(window.into(), "storage", move |event: Event| {
            let Some(event) = event.dyn_ref::<StorageEvent>() else {
                return;
            };
            // key == null means storage.clear()
            let (Some(key), Some(scope)) = (event.key(), Self::scope_of(event)) else {
                return;
            };
            watcher(&StorageChange {
                scope,
                key,
                new_value: event.new_value(),
            });
        })
    }
}

// ============================================================================
// Navigation
// ============================================================================

#[derive(Clone, Default)]
pub struct WebNavigator;

impl Navigator for WebNavigator {
    fn href(&self) -> String {
        web_sys::window()
            .and_then(|w| w.location().href().ok())
            .unwrap_or_default()
    }

    fn search(&self) -> String {
        web_sys::window()
            .and_then(|w| w.location().search().ok())
            .unwrap_or_default()
    }

    fn replace(&self, state: &NavigationState, url: &str) -> Result<(), FilterError> {
        let history = window()?
            .history()
            .map_err(|e| FilterError::Navigation(js_message(&e)))?;
        let value = state
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|e| FilterError::Navigation(e.to_string()))?;
        history
            .replace_state_with_url(&value, "", Some(url))
            .map_err(|e| FilterError::Navigation(js_message(&e)))
    }

    fn watch(&self, watcher: NavigationWatcher) -> Handle {
        let Ok(window) = window() else {
            return Handle::noop();
        };
        attach(window.into(), "popstate", move |event: Event| {
            let Some(event) = event.dyn_ref::<PopStateEvent>() else {
                return;
            };
            let raw = event.state();
            if raw.is_null() || raw.is_undefined() {
                watcher(None);
                return;
            }
            match serde_wasm_bindgen::from_value::<NavigationState>(raw) {
                Ok(entry) => watcher(Some(&entry)),
                Err(e) => {
                    // entry written by someone else
                    log::debug!("ignoring foreign history state: {}", e);
                    watcher(None);
                }
            }
        })
    }
}

// ============================================================================
// Timers
// ============================================================================

#[derive(Clone, Default)]
pub struct TimeoutScheduler;

impl Scheduler for TimeoutScheduler {
    fn schedule(&self, delay_ms: u32, task: Task) -> Handle {
        // dropping a Timeout clears it
        Handle::new(Timeout::new(delay_ms, task))
    }
}

// ============================================================================
// Wiring
// ============================================================================

pub fn browser_collaborators() -> Result<Collaborators, FilterError> {
    // fail early outside a browser
    window()?;
    Ok(Collaborators {
        storage: Rc::new(WebStorage),
        navigator: Rc::new(WebNavigator),
        scheduler: Rc::new(TimeoutScheduler),
    })
}

/// Build a manager bound to the current page and initialize it.
pub fn init_browser_manager(
    schema: FilterSchema,
    options: &FilterOptions,
) -> Result<FilterStateManager, FilterError> {
    let collaborators = browser_collaborators()?;
    let manager = FilterStateManager::new(schema, FilterConfig::default(), collaborators);
    manager.initialize_with(options);
    log::info!("filter state initialized: {}", manager.filter_description());
    Ok(manager)
}
