pub mod outcome_journal;
pub mod result_writer;
pub mod retry_ledger;

pub use outcome_journal::{JournalEntry, OutcomeJournal, ReplaySummary};
pub use result_writer::ResultWriter;
pub use retry_ledger::{AttemptTicket, RetryLedger};
