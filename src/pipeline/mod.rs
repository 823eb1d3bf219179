//! Content pipeline.
//!
//! Messages from a chat source flow through:
//! 1. `MentionResolver`: `<@ID>` tokens and authors become display names
//! 2. `ImportanceScorer`: engagement and content signals against a threshold
//! 3. `TopicClassifier` + `DateExtractor`: important messages only
//! 4. `aggregator`: per-channel summaries, multi-channel reports
//!
//! Everything between fetching messages and directory lookups is synchronous
//! and free of side effects.

pub mod aggregator;
pub mod dates;
pub mod mentions;
pub mod processor;
pub mod rules;
pub mod scorer;
pub mod types;
