use super::config::{FilterConfig, FilterOptions};
use super::error::{FilterError, Phase};
use super::events::{
    ChangeSource, ErrorEvent, EventBus, HistoryChangeEvent, ListenerId, ListenerIds,
    StateChangeEvent,
};
use super::handle::Handle;
use super::history::{HistoryInfo, StateHistory};
use super::navigation::{MemoryNavigator, Navigator};
use super::query;
use super::restore::{self, DefaultsProvider, StateProvider, StorageProvider, UrlProvider};
use super::scheduler::{ManualScheduler, Scheduler};
use super::storage::{FilterStorage, MemoryStorage, StorageChange};
use chrono::Utc;
use contracts::shared::filters::{
    ExportEnvelope, FieldKind, FilterPatch, FilterSchema, FilterState, NavigationState, NO_FILTER,
};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// The outside world the manager talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub storage: Rc<dyn FilterStorage>,
    pub navigator: Rc<dyn Navigator>,
    pub scheduler: Rc<dyn Scheduler>,
}

impl Collaborators {
    /// Memory-backed store and address bar with a manual clock.
    pub fn in_memory() -> Self {
        Self {
            storage: Rc::new(MemoryStorage::new()),
            navigator: Rc::new(MemoryNavigator::new("http://localhost/")),
            scheduler: Rc::new(ManualScheduler::new()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetOptions {
    pub source: ChangeSource,
    /// Do not call the UI hook for this change
    pub skip_ui_update: bool,
}

impl SetOptions {
    pub fn source(source: ChangeSource) -> Self {
        Self {
            source,
            skip_ui_update: false,
        }
    }

    pub fn tagged(tag: &str) -> Self {
        Self::source(ChangeSource::Custom(tag.to_string()))
    }

    pub fn skip_ui_update(mut self) -> Self {
        self.skip_ui_update = true;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub current_state: FilterState,
    pub has_active_filters: bool,
    pub filter_description: String,
    pub history: HistoryInfo,
    pub config: FilterConfig,
    /// Length of the serialized storage blob
    pub storage_size: usize,
}

/// Shape accepted by `import_state`; `version` and `timestamp` are optional.
#[derive(Deserialize)]
struct ImportPayload {
    state: Option<FilterPatch>,
}

struct Core {
    state: FilterState,
    history: StateHistory,
}

type UiHook = Rc<dyn Fn(&FilterState)>;

struct Inner {
    schema: FilterSchema,
    config: RefCell<FilterConfig>,
    core: RefCell<Core>,
    phase: Cell<Phase>,
    storage: Rc<dyn FilterStorage>,
    navigator: Rc<dyn Navigator>,
    scheduler: Rc<dyn Scheduler>,
    pending_url_sync: RefCell<Option<Handle>>,
    watches: RefCell<Vec<Handle>>,
    ui_hook: RefCell<Option<UiHook>>,
    state_changed: EventBus<StateChangeEvent>,
    history_changed: EventBus<HistoryChangeEvent>,
    errors: EventBus<ErrorEvent>,
}

/// Owns the canonical filter state and keeps it in sync with storage, the
/// URL and the browser history.
///
/// Cloning gives another handle to the same manager. The type is
/// single-threaded (`!Send`); every mutation claims the [`Phase`] first, and
/// a claim made while another mutation is still running (for example from
/// inside a listener) is refused instead of recursing.
#[derive(Clone)]
pub struct FilterStateManager {
    inner: Rc<Inner>,
}

struct PhaseGuard<'a> {
    phase: &'a Cell<Phase>,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.phase.set(Phase::Idle);
    }
}

impl FilterStateManager {
    /// Create a manager holding the schema defaults. Call [`initialize`]
    /// once to restore saved state and attach to the collaborators.
    ///
    /// [`initialize`]: FilterStateManager::initialize
    pub fn new(schema: FilterSchema, config: FilterConfig, collaborators: Collaborators) -> Self {
        let state = schema.defaults();
        let mut history = StateHistory::new(config.max_history_size);
        if config.enable_history {
            history.reset(state.clone());
        }
        let ids = ListenerIds::default();

        Self {
            inner: Rc::new(Inner {
                schema,
                config: RefCell::new(config),
                core: RefCell::new(Core { state, history }),
                phase: Cell::new(Phase::Idle),
                storage: collaborators.storage,
                navigator: collaborators.navigator,
                scheduler: collaborators.scheduler,
                pending_url_sync: RefCell::new(None),
                watches: RefCell::new(Vec::new()),
                ui_hook: RefCell::new(None),
                state_changed: EventBus::new(ids.clone()),
                history_changed: EventBus::new(ids.clone()),
                errors: EventBus::new(ids),
            }),
        }
    }

    fn from_weak(inner: &Weak<Inner>) -> Option<Self> {
        inner.upgrade().map(|inner| Self { inner })
    }

    fn enter(&self, phase: Phase) -> Result<PhaseGuard<'_>, FilterError> {
        let current = self.inner.phase.get();
        if current != Phase::Idle {
            log::debug!("refusing {} while {}", phase, current);
            return Err(FilterError::Busy(current));
        }
        self.inner.phase.set(phase);
        Ok(PhaseGuard {
            phase: &self.inner.phase,
        })
    }

    // ===================================================================
    // Lifecycle
    // ===================================================================

    pub fn initialize(&self) {
        self.initialize_with(&FilterOptions::default());
    }

    /// Merge `options` into the configuration, restore state (URL, then
    /// storage, then defaults), attach to back/forward navigation and
    /// storage notifications, schedule a URL sync and emit an `init` event.
    ///
    /// Meant to be called once; a second call restores again.
    pub fn initialize_with(&self, options: &FilterOptions) {
        self.apply_options(options);

        let Ok(_guard) = self.enter(Phase::Restoring) else {
            log::warn!("initialize called during another filter update, ignored");
            return;
        };

        let restoration = self.restore_state();
        for error in restoration.errors {
            self.report("Failed to load from storage", error);
        }
        self.install_watchers();
        self.schedule_url_sync();

        self.emit_state(StateChangeEvent {
            state: restoration.state,
            previous: None,
            source: ChangeSource::Init,
        });
    }

    /// Change configuration after construction.
    pub fn reconfigure(&self, options: &FilterOptions) {
        self.apply_options(options);
        if !self.inner.config.borrow().enable_url_sync {
            self.inner.pending_url_sync.borrow_mut().take();
        }
    }

    fn apply_options(&self, options: &FilterOptions) {
        let config = {
            let mut config = self.inner.config.borrow_mut();
            *config = config.clone().with_options(options);
            config.clone()
        };

        let mut core = self.inner.core.borrow_mut();
        if config.enable_history {
            core.history.set_max_size(config.max_history_size);
            if core.history.is_empty() {
                let current = core.state.clone();
                core.history.reset(current);
            }
        } else {
            core.history.clear();
        }
    }

    fn restore_state(&self) -> restore::Restoration {
        let config = self.config();
        let url = UrlProvider {
            navigator: self.inner.navigator.as_ref(),
            prefix: &config.url_param_prefix,
        };
        let stored = StorageProvider {
            storage: self.inner.storage.as_ref(),
            scope: config.storage_scope,
            key: &config.storage_key,
        };
        let mut providers: Vec<&dyn StateProvider> = Vec::with_capacity(3);
        if config.enable_url_sync {
            providers.push(&url);
        }
        providers.push(&stored);
        providers.push(&DefaultsProvider);

        let restoration = restore::restore(&providers, &self.inner.schema);

        let mut core = self.inner.core.borrow_mut();
        core.state = restoration.state.clone();
        if config.enable_history {
            core.history.reset(restoration.state.clone());
        } else {
            core.history.clear();
        }
        restoration
    }

    fn install_watchers(&self) {
        let mut watches = self.inner.watches.borrow_mut();
        watches.clear();

        let weak = Rc::downgrade(&self.inner);
        watches.push(self.inner.navigator.watch(Rc::new(
            move |entry: Option<&NavigationState>| {
                if let Some(manager) = Self::from_weak(&weak) {
                    manager.apply_navigation(entry);
                }
            },
        )));

        let weak = Rc::downgrade(&self.inner);
        watches.push(
            self.inner
                .storage
                .watch(Rc::new(move |change: &StorageChange| {
                    if let Some(manager) = Self::from_weak(&weak) {
                        manager.apply_storage_change(change);
                    }
                })),
        );
    }

    // ===================================================================
    // State
    // ===================================================================

    /// Copy of the current state.
    pub fn state(&self) -> FilterState {
        self.inner.core.borrow().state.clone()
    }

    pub fn schema(&self) -> &FilterSchema {
        &self.inner.schema
    }

    pub fn config(&self) -> FilterConfig {
        self.inner.config.borrow().clone()
    }

    /// Merge `patch` over the current state (unknown keys are ignored),
    /// record it in history if it changed, persist it, schedule a URL sync,
    /// update the UI and emit a state-change event.
    ///
    /// Fails with [`FilterError::Busy`] while another update is running.
    pub fn set_state(&self, patch: FilterPatch, options: SetOptions) -> Result<(), FilterError> {
        let schema = &self.inner.schema;
        self.commit(options, |current| Some(schema.apply(current, &patch)))
            .map(|_| ())
    }

    /// Add one value to a filter key. Adding a value that is already active
    /// is a no-op. Returns whether the state changed.
    pub fn add_filter(&self, key: &str, value: &str) -> Result<bool, FilterError> {
        let Some(field) = self.inner.schema.field(key) else {
            log::debug!("add_filter: unrecognized key {:?}", key);
            return Ok(false);
        };
        let kind = field.kind;
        self.commit(SetOptions::default(), |current| {
            let mut next = current.clone();
            let changed = match kind {
                FieldKind::Multi => next.insert_value(key, value),
                FieldKind::Single => next.set(key, Some(value.into())),
            };
            changed.then_some(next)
        })
    }

    /// Remove one value from a filter key; the key disappears with its last
    /// value. Removing an absent value is a no-op. Returns whether the state
    /// changed.
    pub fn remove_filter(&self, key: &str, value: &str) -> Result<bool, FilterError> {
        self.commit(SetOptions::default(), |current| {
            let mut next = current.clone();
            next.remove_value(key, value).then_some(next)
        })
    }

    pub fn is_filter_active(&self, key: &str, value: &str) -> bool {
        value != NO_FILTER && self.inner.core.borrow().state.contains_value(key, value)
    }

    /// Replace the state with `defaults` (sanitized) or the schema defaults.
    pub fn reset(&self, defaults: Option<FilterState>) -> Result<(), FilterError> {
        let schema = &self.inner.schema;
        let next = match defaults {
            Some(defaults) => schema.sanitize(defaults),
            None => schema.defaults(),
        };
        self.commit(SetOptions::source(ChangeSource::Reset), |_| Some(next))
            .map(|_| ())
    }

    /// Shared path of every local mutation. `next` returns `None` when there
    /// is nothing to do.
    fn commit<F>(&self, options: SetOptions, next: F) -> Result<bool, FilterError>
    where
        F: FnOnce(&FilterState) -> Option<FilterState>,
    {
        let _guard = self.enter(Phase::Mutating)?;

        let enable_history = self.inner.config.borrow().enable_history;
        let (state, previous, history) = {
            let mut core = self.inner.core.borrow_mut();
            let Some(state) = next(&core.state) else {
                return Ok(false);
            };
            let previous = std::mem::replace(&mut core.state, state.clone());
            let history = if enable_history && previous != state {
                core.history.push(state.clone());
                Some(core.history.info())
            } else {
                None
            };
            (state, previous, history)
        };

        self.persist();
        self.schedule_url_sync();
        if !options.skip_ui_update {
            self.update_ui(&state);
        }
        if let Some(info) = history {
            self.emit_history(info);
        }
        self.emit_state(StateChangeEvent {
            state,
            previous: Some(previous),
            source: options.source,
        });
        Ok(true)
    }

    // ===================================================================
    // History
    // ===================================================================

    pub fn undo(&self) -> bool {
        self.step(ChangeSource::Undo)
    }

    pub fn redo(&self) -> bool {
        self.step(ChangeSource::Redo)
    }

    pub fn can_undo(&self) -> bool {
        self.inner.core.borrow().history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.inner.core.borrow().history.can_redo()
    }

    pub fn history_info(&self) -> HistoryInfo {
        self.inner.core.borrow().history.info()
    }

    fn step(&self, source: ChangeSource) -> bool {
        let Ok(_guard) = self.enter(Phase::Restoring) else {
            return false;
        };

        let (state, previous, info) = {
            let mut core = self.inner.core.borrow_mut();
            let target = match source {
                ChangeSource::Undo => core.history.undo().cloned(),
                _ => core.history.redo().cloned(),
            };
            let Some(target) = target else {
                return false;
            };
            let previous = std::mem::replace(&mut core.state, target.clone());
            (target, previous, core.history.info())
        };

        self.persist();
        self.schedule_url_sync();
        self.update_ui(&state);
        self.emit_state(StateChangeEvent {
            state,
            previous: Some(previous),
            source,
        });
        self.emit_history(info);
        true
    }

    // ===================================================================
    // External changes
    // ===================================================================

    /// Back/forward navigation. Uses the state attached to the history entry,
    /// or whatever filters the URL encodes when the entry carries none.
    /// Nothing is written back to the URL or the store.
    pub fn apply_navigation(&self, entry: Option<&NavigationState>) -> bool {
        let schema = &self.inner.schema;
        let next = match entry {
            Some(entry) => schema.sanitize(entry.filters.clone()),
            None => {
                let prefix = self.inner.config.borrow().url_param_prefix.clone();
                let patch = query::parse_query(&self.inner.navigator.search(), schema, &prefix);
                if schema.recognized_len(&patch) == 0 {
                    return false;
                }
                schema.apply(&schema.defaults(), &patch)
            }
        };
        self.apply_external(next, ChangeSource::PopState)
    }

    /// A write to the configured storage key made by another tab, merged over
    /// the current state. Blobs written by a manager name every recognized
    /// key, with `null` for cleared ones.
    pub fn apply_storage_change(&self, change: &StorageChange) -> bool {
        {
            let config = self.inner.config.borrow();
            if change.key != config.storage_key || change.scope != config.storage_scope {
                return false;
            }
        }
        let Some(raw) = change.new_value.as_deref() else {
            return false;
        };
        let saved: FilterPatch = match serde_json::from_str(raw) {
            Ok(saved) => saved,
            Err(e) => {
                self.report(
                    "Failed to restore state from storage event",
                    FilterError::CorruptStorage(e),
                );
                return false;
            }
        };

        let schema = &self.inner.schema;
        let next = schema.apply(&self.state(), &saved);
        self.apply_external(next, ChangeSource::Storage)
    }

    fn apply_external(&self, next: FilterState, source: ChangeSource) -> bool {
        let Ok(_guard) = self.enter(Phase::Restoring) else {
            return false;
        };

        let previous = {
            let mut core = self.inner.core.borrow_mut();
            if core.state == next {
                return false;
            }
            std::mem::replace(&mut core.state, next.clone())
        };

        self.update_ui(&next);
        self.emit_state(StateChangeEvent {
            state: next,
            previous: Some(previous),
            source,
        });
        true
    }

    /// Serialized form of the current state shared by the storage blob and
    /// the export: every recognized key, cleared ones as `null`.
    fn complete_patch(&self) -> FilterPatch {
        self.inner
            .schema
            .complete_patch(&self.inner.core.borrow().state)
    }

    // ===================================================================
    // Storage
    // ===================================================================

    pub fn save_to_storage(&self) {
        self.persist();
    }

    /// The stored blob, sanitized. Failures are reported and read as `None`.
    pub fn load_from_storage(&self) -> Option<FilterState> {
        let config = self.config();
        let provider = StorageProvider {
            storage: self.inner.storage.as_ref(),
            scope: config.storage_scope,
            key: &config.storage_key,
        };
        match provider.load(&self.inner.schema) {
            Ok(state) => state,
            Err(e) => {
                self.report("Failed to load from storage", e);
                None
            }
        }
    }

    pub fn clear_storage(&self) {
        let config = self.config();
        if let Err(e) = self
            .inner
            .storage
            .remove_item(config.storage_scope, &config.storage_key)
        {
            self.report("Failed to clear storage", e);
        }
    }

    fn persist(&self) {
        let config = self.config();
        let serialized = serde_json::to_string(&self.complete_patch());
        let raw = match serialized {
            Ok(raw) => raw,
            Err(e) => {
                self.report("Failed to save to storage", FilterError::Serialize(e));
                return;
            }
        };
        if let Err(e) = self
            .inner
            .storage
            .set_item(config.storage_scope, &config.storage_key, &raw)
        {
            let message = match e {
                FilterError::QuotaExceeded => "Storage quota exceeded",
                _ => "Failed to save to storage",
            };
            self.report(message, e);
        }
    }

    // ===================================================================
    // URL
    // ===================================================================

    /// Query string for the current state, without the leading `?`.
    pub fn build_query(&self) -> String {
        let prefix = self.inner.config.borrow().url_param_prefix.clone();
        query::build_query(&self.inner.core.borrow().state, &self.inner.schema, &prefix)
    }

    pub fn extract_filters_from_url(&self) -> FilterPatch {
        let prefix = self.inner.config.borrow().url_param_prefix.clone();
        query::parse_query(&self.inner.navigator.search(), &self.inner.schema, &prefix)
    }

    /// Restart the debounce window for the URL write.
    fn schedule_url_sync(&self) {
        let (enabled, delay) = {
            let config = self.inner.config.borrow();
            (config.enable_url_sync, config.debounce_delay_ms)
        };
        // dropping the old handle cancels the pending write
        self.inner.pending_url_sync.borrow_mut().take();
        if !enabled {
            return;
        }

        let weak = Rc::downgrade(&self.inner);
        let handle = self.inner.scheduler.schedule(
            delay,
            Box::new(move || {
                if let Some(manager) = Self::from_weak(&weak) {
                    manager.write_url();
                }
            }),
        );
        *self.inner.pending_url_sync.borrow_mut() = Some(handle);
    }

    /// Write the URL now instead of waiting for the debounce.
    pub fn sync_url_now(&self) {
        self.inner.pending_url_sync.borrow_mut().take();
        self.write_url();
    }

    fn write_url(&self) {
        if !self.inner.config.borrow().enable_url_sync {
            return;
        }
        let url = self.export_as_url();
        let entry = NavigationState {
            filters: self.state(),
        };
        if let Err(e) = self.inner.navigator.replace(&entry, &url) {
            self.report("Failed to sync state to URL", e);
        }
    }

    // ===================================================================
    // Export / import
    // ===================================================================

    pub fn export_state(&self) -> Result<String, FilterError> {
        let envelope = ExportEnvelope::new(self.complete_patch(), Utc::now());
        serde_json::to_string_pretty(&envelope).map_err(FilterError::Serialize)
    }

    /// Absolute URL of the current page carrying the current filters.
    pub fn export_as_url(&self) -> String {
        query::with_query(&self.inner.navigator.href(), &self.build_query())
    }

    /// Merge the `state` mapping of an export produced by [`export_state`]
    /// over the current state, like [`set_state`]. Input that is not JSON,
    /// has no `state` mapping, or names no recognized key leaves the state
    /// untouched and is reported on the error channel.
    ///
    /// [`export_state`]: FilterStateManager::export_state
    /// [`set_state`]: FilterStateManager::set_state
    pub fn import_state(&self, raw: &str) -> Result<(), FilterError> {
        let patch = match serde_json::from_str::<ImportPayload>(raw) {
            Ok(ImportPayload { state: Some(patch) }) => patch,
            Ok(ImportPayload { state: None }) => {
                return Err(self.reject_import("missing `state` mapping".to_string()));
            }
            Err(e) => return Err(self.reject_import(e.to_string())),
        };
        if self.inner.schema.recognized_len(&patch) == 0 {
            return Err(self.reject_import("no recognized filter keys".to_string()));
        }

        self.set_state(patch, SetOptions::source(ChangeSource::Import))
    }

    /// Apply the filters carried by a shared link.
    pub fn import_from_url(&self, url: &str) -> Result<(), FilterError> {
        let prefix = self.inner.config.borrow().url_param_prefix.clone();
        let patch = query::parse_query(query::query_of(url), &self.inner.schema, &prefix);
        if self.inner.schema.recognized_len(&patch) == 0 {
            return Err(self.reject_import("no filter parameters in URL".to_string()));
        }
        self.set_state(patch, SetOptions::source(ChangeSource::Import))
    }

    fn reject_import(&self, reason: String) -> FilterError {
        self.report("Failed to import state", FilterError::MalformedImport(reason.clone()));
        FilterError::MalformedImport(reason)
    }

    // ===================================================================
    // Derived queries
    // ===================================================================

    pub fn has_active_filters(&self) -> bool {
        self.inner
            .schema
            .has_active_filters(&self.inner.core.borrow().state)
    }

    pub fn filter_description(&self) -> String {
        self.inner.schema.describe(&self.inner.core.borrow().state)
    }

    pub fn debug_info(&self) -> DebugInfo {
        let state = self.state();
        let storage_size = serde_json::to_string(&self.complete_patch())
            .map(|raw| raw.len())
            .unwrap_or(0);
        DebugInfo {
            has_active_filters: self.has_active_filters(),
            filter_description: self.filter_description(),
            history: self.history_info(),
            config: self.config(),
            storage_size,
            current_state: state,
        }
    }

    // ===================================================================
    // Events
    // ===================================================================

    pub fn on_state_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&StateChangeEvent) -> anyhow::Result<()> + 'static,
    {
        self.inner.state_changed.subscribe(listener)
    }

    pub fn on_history_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&HistoryChangeEvent) -> anyhow::Result<()> + 'static,
    {
        self.inner.history_changed.subscribe(listener)
    }

    pub fn on_error<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ErrorEvent) -> anyhow::Result<()> + 'static,
    {
        self.inner.errors.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.state_changed.unsubscribe(id)
            || self.inner.history_changed.unsubscribe(id)
            || self.inner.errors.unsubscribe(id)
    }

    /// Hook that repaints controls after a change.
    pub fn set_ui_hook<F>(&self, hook: F)
    where
        F: Fn(&FilterState) + 'static,
    {
        *self.inner.ui_hook.borrow_mut() = Some(Rc::new(hook));
    }

    fn update_ui(&self, state: &FilterState) {
        let hook = self.inner.ui_hook.borrow().clone();
        if let Some(hook) = hook {
            hook(state);
        }
    }

    fn emit_state(&self, event: StateChangeEvent) {
        for failure in self.inner.state_changed.emit(&event) {
            self.report(
                "Error in statechange listener",
                FilterError::Listener(format!("{:#}", failure)),
            );
        }
    }

    fn emit_history(&self, info: HistoryInfo) {
        for failure in self.inner.history_changed.emit(&info) {
            self.report(
                "Error in historychange listener",
                FilterError::Listener(format!("{:#}", failure)),
            );
        }
    }

    fn report(&self, message: &str, error: FilterError) {
        log::error!("{}: {}", message, error);
        let event = ErrorEvent {
            message: message.to_string(),
            error,
        };
        for failure in self.inner.errors.emit(&event) {
            log::error!("Error in error listener: {:#}", failure);
        }
    }
}
