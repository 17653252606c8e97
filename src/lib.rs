//! Spaced repetition session engine for swipe-style vocabulary practice.
//!
//! The crate decides which cards a practice run shows, grades each answer,
//! and schedules when cards resurface. Rendering, gestures, and timers stay
//! with the caller: the engine is driven entirely through explicit calls and
//! read back through plain state.
//!
//! ```no_run
//! use std::sync::Arc;
//! use vocadeck::{
//!     BundledCatalog, JsonScheduleStore, PracticeLanguage, SessionEngine, StartOptions,
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let store = Arc::new(JsonScheduleStore::new(JsonScheduleStore::default_path())?);
//! let mut engine = SessionEngine::new(Arc::new(BundledCatalog::new()), store);
//!
//! engine.start_session(StartOptions::new(PracticeLanguage::Pt, 10));
//!
//! // One card: claim to know it, pick the right option, move on.
//! engine.swipe_right();
//! let correct = engine.state().and_then(|s| s.correct_choice_index);
//! if let Some(index) = correct {
//!     engine.choose_option(index);
//! }
//! engine.advance_to_next_card();
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod deck;
pub mod engine;
pub mod models;
pub mod persist;
pub mod scheduler;
pub mod session;
pub mod storage;

pub use catalog::{BundledCatalog, CardCatalog};
pub use config::Config;
pub use deck::{build_session_deck, SelectionStats};
pub use engine::{LastReview, SessionEngine, StartOptions};
pub use models::{sanitize_custom_cards, Card, PracticeLanguage};
pub use scheduler::{apply_review_grade, CardSchedule, ReviewGrade, ScheduleMap};
pub use session::{SessionState, UiState};
pub use storage::{JsonScheduleStore, MemoryScheduleStore, PracticeRecords, ScheduleStore};
