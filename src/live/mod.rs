//! Live progress publication and journal replay

pub mod events;
pub mod journal;
pub mod reporter;

pub use events::LiveEvent;
pub use journal::{fold_events, replay_journal, replay_str, JournalReplay, ReplayScope};
pub use reporter::{FileLiveReporter, LiveSink, MemoryLiveSink};
