//! Filter state data model shared between the filter manager and anything
//! that reads or writes its serialized forms (storage blob, share links,
//! export files, history entries).

pub mod envelope;
pub mod schema;
pub mod state;

pub use envelope::{ExportEnvelope, NavigationState, EXPORT_VERSION};
pub use schema::{FieldKind, FilterField, FilterSchema, NO_FILTER};
pub use state::{FilterPatch, FilterState, FilterValue};
