//! Package import
//!
//! - [`session`] - redb-backed session state with a TTL
//! - [`reconcile`] - one manifest record → one catalog entry
//! - [`variants`] - variation matching and sync under a variable parent
//! - [`batch`] - setup / process batch / cleanup orchestration

pub mod batch;
mod error;
mod fields;
mod media;
pub mod reconcile;
pub mod session;
mod terms;
pub mod variants;

pub use batch::{BatchResult, Importer, SetupResult, SweepReport, WORK_DIR_PREFIX};
pub use error::{ImportError, ImportResult};
pub use reconcile::{AcceptAll, ImportHook, ImportOutcome, Reconciler};
pub use session::{SessionError, SessionState, SessionStore};
