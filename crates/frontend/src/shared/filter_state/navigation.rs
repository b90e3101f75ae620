use super::error::FilterError;
use super::handle::Handle;
use super::query;
use contracts::shared::filters::NavigationState;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Called on back/forward navigation with the state attached to the entry
/// that became current (`None` for entries not written by the manager).
pub type NavigationWatcher = Rc<dyn Fn(Option<&NavigationState>)>;

/// Address bar and session history of the hosting page.
pub trait Navigator {
    /// Current absolute URL.
    fn href(&self) -> String;

    /// Current query string including the leading `?`, or empty.
    fn search(&self) -> String;

    /// Replace the current history entry without reloading; never pushes.
    fn replace(&self, state: &NavigationState, url: &str) -> Result<(), FilterError>;

    fn watch(&self, watcher: NavigationWatcher) -> Handle;
}

#[derive(Default)]
struct MemoryNavigatorInner {
    href: RefCell<String>,
    entry_state: RefCell<Option<NavigationState>>,
    replacements: RefCell<Vec<(NavigationState, String)>>,
    watchers: RefCell<Vec<(u64, NavigationWatcher)>>,
    next_watcher: Cell<u64>,
}

/// In-memory address bar that records every `replace` call.
#[derive(Clone, Default)]
pub struct MemoryNavigator {
    inner: Rc<MemoryNavigatorInner>,
}

impl MemoryNavigator {
    pub fn new(href: &str) -> Self {
        let navigator = Self::default();
        *navigator.inner.href.borrow_mut() = href.to_string();
        navigator
    }

    /// Every `(state, url)` passed to `replace`, oldest first.
    pub fn replacements(&self) -> Vec<(NavigationState, String)> {
        self.inner.replacements.borrow().clone()
    }

    pub fn entry_state(&self) -> Option<NavigationState> {
        self.inner.entry_state.borrow().clone()
    }

    /// Simulate back/forward onto an entry with the given URL and state.
    pub fn navigate(&self, href: &str, state: Option<NavigationState>) {
        *self.inner.href.borrow_mut() = href.to_string();
        *self.inner.entry_state.borrow_mut() = state.clone();

        let watchers: Vec<NavigationWatcher> = self
            .inner
            .watchers
            .borrow()
            .iter()
            .map(|(_, w)| w.clone())
            .collect();
        for watcher in watchers {
            watcher(state.as_ref());
        }
    }
}

impl Navigator for MemoryNavigator {
    fn href(&self) -> String {
        self.inner.href.borrow().clone()
    }

    fn search(&self) -> String {
        let href = self.inner.href.borrow();
        let query = query::query_of(&href);
        if query.is_empty() {
            String::new()
        } else {
            format!("?{}", query)
        }
    }

    fn replace(&self, state: &NavigationState, url: &str) -> Result<(), FilterError> {
        *self.inner.href.borrow_mut() = url.to_string();
        *self.inner.entry_state.borrow_mut() = Some(state.clone());
        self.inner
            .replacements
            .borrow_mut()
            .push((state.clone(), url.to_string()));
        Ok(())
    }

    fn watch(&self, watcher: NavigationWatcher) -> Handle {
        let id = self.inner.next_watcher.get();
        self.inner.next_watcher.set(id + 1);
        self.inner.watchers.borrow_mut().push((id, watcher));

        let inner = Rc::downgrade(&self.inner);
        Handle::on_drop(move || {
            if let Some(inner) = inner.upgrade() {
                inner.watchers.borrow_mut().retain(|(existing, _)| *existing != id);
            }
        })
    }
}
