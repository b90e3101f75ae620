use std::any::Any;

/// Keeps a listener attached or a timer armed for as long as it lives.
///
/// Dropping the handle detaches the listener / cancels the timer.
#[must_use = "dropping a Handle immediately detaches or cancels it"]
pub struct Handle {
    _inner: Option<Box<dyn Any>>,
}

impl Handle {
    /// Wrap a value whose `Drop` does the cleanup (a `gloo_timers` timeout,
    /// a DOM listener registration, ...).
    pub fn new<T: 'static>(inner: T) -> Self {
        Self {
            _inner: Some(Box::new(inner)),
        }
    }

    /// Run `cleanup` when the handle is dropped.
    pub fn on_drop<F: FnOnce() + 'static>(cleanup: F) -> Self {
        Self::new(OnDrop(Some(Box::new(cleanup))))
    }

    /// Nothing to clean up.
    pub fn noop() -> Self {
        Self { _inner: None }
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle").finish_non_exhaustive()
    }
}

struct OnDrop(Option<Box<dyn FnOnce()>>);

impl Drop for OnDrop {
    fn drop(&mut self) {
        if let Some(cleanup) = self.0.take() {
            cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_cleanup_runs_once_on_drop() {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let handle = Handle::on_drop(move || c.set(c.get() + 1));
        assert_eq!(count.get(), 0);
        drop(handle);
        assert_eq!(count.get(), 1);
    }
}
