/*!
 * Document synchronization.
 *
 * - `context`: shared state of a run (oracle, limiter, cache, policy)
 * - `pipeline`: line-locked sync of one document
 * - `report`: change, verification and run reports
 */

pub mod context;
pub mod pipeline;
pub mod report;

// Re-export main types
pub use context::SyncContext;
pub use pipeline::{FileSyncOutcome, FileSyncRequest, SyncPipeline};
pub use report::{ChangeReport, FileReport, FileStatus, RunReport, SyncStrategy, VerificationReport};
