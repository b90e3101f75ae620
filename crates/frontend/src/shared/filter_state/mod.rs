//! Filter state for the meal planner pages.
//!
//! [`FilterStateManager`] owns the current filters and mirrors them into the
//! session store, the address bar and the browser history. Collaborators are
//! traits so the same manager runs against the browser ([`web`]) or the
//! in-memory doubles used by tests.

pub mod config;
pub mod error;
pub mod events;
pub mod handle;
pub mod history;
pub mod manager;
pub mod navigation;
pub mod query;
pub mod restore;
pub mod scheduler;
pub mod storage;
pub mod web;

pub use config::{FilterConfig, FilterOptions, StorageScope};
pub use error::{FilterError, Phase};
pub use events::{ChangeSource, ErrorEvent, HistoryChangeEvent, ListenerId, StateChangeEvent};
pub use handle::Handle;
pub use history::HistoryInfo;
pub use manager::{Collaborators, DebugInfo, FilterStateManager, SetOptions};
pub use navigation::{MemoryNavigator, Navigator};
pub use scheduler::{ManualScheduler, Scheduler};
pub use storage::{FilterStorage, MemoryStorage, StorageChange};
