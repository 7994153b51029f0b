pub mod update;
pub mod work_item;

pub use update::{AttemptOutcome, BatchReport, FailureReason, ItemUpdate};
pub use work_item::{ItemStatus, WorkItem};
