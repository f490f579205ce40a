//! Result cache
//!
//! Keeps recently computed query results in memory so repeated listings do
//! not re-run the same aggregate joins. Keys are fingerprints of the SQL and
//! its parameters, prefixed with a namespace that writers use for coarse
//! invalidation.

mod key;
mod store;

pub use key::compute_key;
pub use store::ResultCache;
