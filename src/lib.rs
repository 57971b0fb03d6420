//! Personal attendance tracker for the terminal.
//! Keeps per-subject counters of attended and held classes, tells how many classes can still be
//! skipped or must be attended to stay above the minimum, and can fill itself from a photo of an
//! attendance table.
//!

pub mod attendance;
pub mod cli;
pub mod fs;
pub mod import;
pub mod tracker;
pub mod utils;
