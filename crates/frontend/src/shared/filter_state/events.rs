use super::error::FilterError;
use super::history::HistoryInfo;
use contracts::shared::filters::FilterState;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// What caused a state change.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeSource {
    Init,
    #[default]
    SetState,
    Reset,
    Undo,
    Redo,
    PopState,
    Storage,
    Import,
    /// Caller-supplied tag, for diagnostics only
    Custom(String),
}

impl fmt::Display for ChangeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeSource::Init => f.write_str("init"),
            ChangeSource::SetState => f.write_str("setState"),
            ChangeSource::Reset => f.write_str("reset"),
            ChangeSource::Undo => f.write_str("undo"),
            ChangeSource::Redo => f.write_str("redo"),
            ChangeSource::PopState => f.write_str("popstate"),
            ChangeSource::Storage => f.write_str("storage"),
            ChangeSource::Import => f.write_str("import"),
            ChangeSource::Custom(tag) => f.write_str(tag),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateChangeEvent {
    pub state: FilterState,
    /// `None` for the initial event
    pub previous: Option<FilterState>,
    pub source: ChangeSource,
}

pub type HistoryChangeEvent = HistoryInfo;

#[derive(Debug)]
pub struct ErrorEvent {
    pub message: String,
    pub error: FilterError,
}

/// Identifies a registered listener across all channels of one manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Listener<E> = Rc<dyn Fn(&E) -> anyhow::Result<()>>;

/// Shared id source so ids are unique across the three channels.
#[derive(Debug, Clone, Default)]
pub struct ListenerIds(Rc<Cell<u64>>);

impl ListenerIds {
    fn next(&self) -> ListenerId {
        let id = self.0.get();
        self.0.set(id + 1);
        ListenerId(id)
    }
}

/// Typed, synchronous event channel.
///
/// Delivery is in registration order. The listener list is snapshotted
/// before delivery, so listeners added or removed during an emit only see
/// the next event. A failing listener does not stop delivery to the others;
/// its error is returned to the caller of [`EventBus::emit`].
pub struct EventBus<E> {
    ids: ListenerIds,
    listeners: RefCell<Vec<(ListenerId, Listener<E>)>>,
}

impl<E> EventBus<E> {
    pub fn new(ids: ListenerIds) -> Self {
        Self {
            ids,
            listeners: RefCell::new(Vec::new()),
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&E) -> anyhow::Result<()> + 'static,
    {
        let id = self.ids.next();
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }

    /// Deliver `event` to every listener and collect the failures.
    pub fn emit(&self, event: &E) -> Vec<anyhow::Error> {
        let snapshot: Vec<Listener<E>> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        snapshot
            .into_iter()
            .filter_map(|listener| listener(event).err())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_in_registration_order() {
        let bus: EventBus<u32> = EventBus::new(ListenerIds::default());
        let seen = Rc::new(RefCell::new(Vec::new()));
        for tag in ["a", "b", "c"] {
            let seen = seen.clone();
            bus.subscribe(move |n: &u32| {
                seen.borrow_mut().push(format!("{tag}{n}"));
                Ok(())
            });
        }
        assert!(bus.emit(&1).is_empty());
        assert_eq!(*seen.borrow(), vec!["a1", "b1", "c1"]);
    }

    #[test]
    fn test_failing_listener_does_not_block_others() {
        let bus: EventBus<u32> = EventBus::new(ListenerIds::default());
        let delivered = Rc::new(Cell::new(0));
        bus.subscribe(|_| anyhow::bail!("boom"));
        let d = delivered.clone();
        bus.subscribe(move |_| {
            d.set(d.get() + 1);
            Ok(())
        });

        let failures = bus.emit(&7);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].to_string(), "boom");
        assert_eq!(delivered.get(), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let ids = ListenerIds::default();
        let first: EventBus<()> = EventBus::new(ids.clone());
        let second: EventBus<()> = EventBus::new(ids);
        let a = first.subscribe(|_| Ok(()));
        let b = second.subscribe(|_| Ok(()));
        assert_ne!(a, b);
        assert!(!second.unsubscribe(a));
        assert!(first.unsubscribe(a));
        assert!(first.is_empty());
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn test_listener_added_during_emit_sees_next_event() {
        let bus: Rc<EventBus<u32>> = Rc::new(EventBus::new(ListenerIds::default()));
        let late_calls = Rc::new(Cell::new(0));
        let bus_ref = Rc::downgrade(&bus);
        let late = late_calls.clone();
        bus.subscribe(move |_| {
            if let Some(bus) = bus_ref.upgrade() {
                let late = late.clone();
                bus.subscribe(move |_| {
                    late.set(late.get() + 1);
                    Ok(())
                });
            }
            Ok(())
        });

        bus.emit(&1);
        assert_eq!(late_calls.get(), 0);
        bus.emit(&2);
        assert_eq!(late_calls.get(), 1);
    }
}
