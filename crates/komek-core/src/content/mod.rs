//! Content store: chapter/lesson index files and their line formats.

mod records;
mod store;

pub use records::{AccessMode, Chapter, Lesson, OpeningDate, VideoStatus};
pub use store::ContentStore;
