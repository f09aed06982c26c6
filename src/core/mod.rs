pub mod engine;
pub mod file_state;
pub mod reconciler;
pub mod scanner;

pub use engine::{FileOutcome, GameError, SyncConfig, SyncReport, SyncRunner, SyncSpec};
pub use file_state::{format_timestamp, FileRef, FileState, Side};
pub use reconciler::{Decision, DecisionReason, Reconciler, SyncAction, DEFAULT_SKEW_TOLERANCE};
pub use scanner::{FileScanner, GlobPattern, TrackedNames};
