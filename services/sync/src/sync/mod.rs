pub mod error;
pub mod normalize;
pub mod options;
pub mod orchestrator;
pub mod result;

pub use error::SyncError;
pub use options::{DateRange, DuplicatePolicy, SyncOptions, SyncScope, SyncSettings};
pub use orchestrator::{SyncHandle, SyncInvocation, SyncOrchestrator};
pub use result::{ItemError, ItemErrorKind, RunOutcome, SyncResult, SyncStats};
