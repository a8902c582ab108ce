//! Store layer
//!
//! Each store wraps the shared `SqlitePool` and is handed to the HTTP state
//! at startup; nothing here holds global state.

mod entries;
mod scores;
mod spark;

pub use entries::SubmissionStore;
pub use scores::{ScoreStore, SCORES_CSV_HEADER};
pub use spark::CheckpointStore;
