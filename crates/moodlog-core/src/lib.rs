//! Moodlog core library - shared types, traits, and business logic.
//!
//! This crate contains no I/O and can be compiled for any target.

mod dateparse;
mod emotion;
mod error;
mod note;
mod service;
mod stats;
mod store;
mod title;

pub use dateparse::{format_datetime, parse_day, parse_end_date, parse_human_date, DATE_FORMAT};
pub use emotion::{normalize_labels, Emotion, EmotionPredictor};
pub use error::Error;
pub use note::{NoteInfo, NoteMeta, NoteQuery, NoteSummary, SortOrder};
pub use service::MoodlogService;
pub use stats::{count_emotions, EmotionCount, Period};
pub use store::NoteStore;
pub use title::{sanitize_title, FORBIDDEN_TITLE_CHARS};
