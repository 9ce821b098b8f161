//! Named cache stores and request resolution.
//!
//! Two stores are active at a time:
//! - the shell store, holding static application assets primed at install
//! - the data store, holding GET responses from the remote API
//!
//! Store names carry a version suffix. Activation deletes every store that is
//! not one of the two active names.

pub mod manager;
pub mod storage;

pub use manager::{ContentCache, InstallReport, Strategy};
pub use storage::{CacheStorage, CachedData};
