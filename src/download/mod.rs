pub mod set;
pub mod sync;

pub use set::{Artifact, Category, DownloadSet, HashKind, ALL_CATEGORIES};
pub use sync::{
    file_hash, hash_bytes, matches_expected, SyncEngine, SyncOutcome, SyncReport,
};
