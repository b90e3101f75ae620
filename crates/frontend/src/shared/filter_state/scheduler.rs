use super::handle::Handle;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

pub type Task = Box<dyn FnOnce()>;

/// Runs a task once after a delay. Dropping the returned handle cancels it.
pub trait Scheduler {
    fn schedule(&self, delay_ms: u32, task: Task) -> Handle;
}

#[derive(Default)]
struct Queue {
    now_ms: u64,
    next_id: u64,
    tasks: BTreeMap<(u64, u64), Task>,
}

/// Scheduler driven by a virtual clock; time only moves on [`advance`].
///
/// [`advance`]: ManualScheduler::advance
#[derive(Clone, Default)]
pub struct ManualScheduler {
    queue: Rc<RefCell<Queue>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ms(&self) -> u64 {
        self.queue.borrow().now_ms
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().tasks.len()
    }

    /// Move the clock forward, running every task that comes due in order.
    /// Tasks scheduled while advancing run too if they fall inside the window.
    pub fn advance(&self, ms: u64) {
        let target = self.queue.borrow().now_ms + ms;
        loop {
            let task = {
                let mut queue = self.queue.borrow_mut();
                let due = queue
                    .tasks
                    .keys()
                    .next()
                    .copied()
                    .filter(|(at, _)| *at <= target);
                match due {
                    Some(key) => {
                        queue.now_ms = key.0;
                        queue.tasks.remove(&key)
                    }
                    None => None,
                }
            };
            match task {
                Some(task) => task(),
                None => break,
            }
        }
        self.queue.borrow_mut().now_ms = target;
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay_ms: u32, task: Task) -> Handle {
        let key = {
            let mut queue = self.queue.borrow_mut();
            let key = (queue.now_ms + u64::from(delay_ms), queue.next_id);
            queue.next_id += 1;
            queue.tasks.insert(key, task);
            key
        };

        let queue = Rc::downgrade(&self.queue);
        Handle::on_drop(move || {
            if let Some(queue) = queue.upgrade() {
                queue.borrow_mut().tasks.remove(&key);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_runs_when_due() {
        let scheduler = ManualScheduler::new();
        let ran = Rc::new(Cell::new(false));
        let r = ran.clone();
        let _handle = scheduler.schedule(150, Box::new(move || r.set(true)));

        scheduler.advance(149);
        assert!(!ran.get());
        scheduler.advance(1);
        assert!(ran.get());
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.now_ms(), 150);
    }

    #[test]
    fn test_dropping_handle_cancels() {
        let scheduler = ManualScheduler::new();
        let ran = Rc::new(Cell::new(false));
        let r = ran.clone();
        let handle = scheduler.schedule(10, Box::new(move || r.set(true)));
        drop(handle);
        scheduler.advance(100);
        assert!(!ran.get());
    }

    #[test]
    fn test_order_by_due_time() {
        let scheduler = ManualScheduler::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut handles = Vec::new();
        for (delay, tag) in [(30, "c"), (10, "a"), (20, "b")] {
            let order = order.clone();
            handles.push(scheduler.schedule(delay, Box::new(move || order.borrow_mut().push(tag))));
        }
        scheduler.advance(30);
        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
    }
}
