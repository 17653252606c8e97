//! The session engine: one practice run, end to end.
//!
//! `SessionEngine` is the piece a UI driver owns. It snapshots the catalog
//! and schedule map at session start, feeds user input through the pure
//! transitions in [`crate::session`], grades reviews, and hands map
//! snapshots to the background saver. All mutation happens through `&mut
//! self`; there is no ambient session anywhere.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::catalog::CardCatalog;
use crate::deck::{build_session_deck, SelectionStats};
use crate::models::{sanitize_custom_cards, Card, PracticeLanguage};
use crate::persist::ScheduleSaver;
use crate::scheduler::{
    apply_review_grade, preview_intervals, CardSchedule, ReviewGrade, ScheduleMap,
};
use crate::session::{CardPool, ReviewOutcome, SessionEvent, SessionState};
use crate::storage::ScheduleStore;

// ══════════════════════════════════════════════════════════════════════════
// Session Setup
// ══════════════════════════════════════════════════════════════════════════

/// What a session should look like. Kept by the engine so the next run can
/// reuse it.
#[derive(Debug, Clone)]
pub struct StartOptions {
    pub language: PracticeLanguage,
    /// Catalog cards per session. Custom cards join on top of this.
    pub card_count: usize,
    /// Caller-authored cards; sanitized before use.
    pub custom_cards: Vec<Card>,
}

impl StartOptions {
    pub fn new(language: PracticeLanguage, card_count: usize) -> Self {
        Self {
            language,
            card_count,
            custom_cards: Vec::new(),
        }
    }
}

/// Ticket tying a deck build to the start request that asked for it. A newer
/// request invalidates every earlier token, so a slow build can never
/// clobber the session that superseded it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildToken {
    generation: u64,
}

/// A fully prepared session waiting to be installed.
pub struct BuiltSession {
    token: BuildToken,
    options: StartOptions,
    schedules: ScheduleMap,
    pool: CardPool,
    deck: Vec<Card>,
    stats: SelectionStats,
}

/// The most recent graded review, for the debug surface.
#[derive(Debug, Clone, PartialEq)]
pub struct LastReview {
    pub card_id: String,
    pub grade: ReviewGrade,
    pub schedule: CardSchedule,
}

// ══════════════════════════════════════════════════════════════════════════
// Engine
// ══════════════════════════════════════════════════════════════════════════

pub struct SessionEngine {
    catalog: Arc<dyn CardCatalog>,
    store: Arc<dyn ScheduleStore>,
    saver: ScheduleSaver,
    options: Option<StartOptions>,
    state: Option<SessionState>,
    pool: CardPool,
    schedules: ScheduleMap,
    selection_stats: SelectionStats,
    last_review: Option<LastReview>,
    build_generation: u64,
    rng: ChaCha8Rng,
    now_override: Option<DateTime<Utc>>,
}

impl SessionEngine {
    pub fn new(catalog: Arc<dyn CardCatalog>, store: Arc<dyn ScheduleStore>) -> Self {
        Self::with_rng(catalog, store, ChaCha8Rng::from_entropy())
    }

    /// Engine with a fixed seed: same seed, same decks, same choice order.
    pub fn with_seed(
        catalog: Arc<dyn CardCatalog>,
        store: Arc<dyn ScheduleStore>,
        seed: u64,
    ) -> Self {
        Self::with_rng(catalog, store, ChaCha8Rng::seed_from_u64(seed))
    }

    fn with_rng(
        catalog: Arc<dyn CardCatalog>,
        store: Arc<dyn ScheduleStore>,
        rng: ChaCha8Rng,
    ) -> Self {
        let saver = ScheduleSaver::spawn(Arc::clone(&store));
        Self {
            catalog,
            store,
            saver,
            options: None,
            state: None,
            pool: CardPool::default(),
            schedules: ScheduleMap::new(),
            selection_stats: SelectionStats::default(),
            last_review: None,
            build_generation: 0,
            rng,
            now_override: None,
        }
    }

    /// Pin the engine clock, for simulations and tests. `None` returns to
    /// the system clock.
    pub fn set_reference_time(&mut self, now: Option<DateTime<Utc>>) {
        self.now_override = now;
    }

    fn now(&self) -> DateTime<Utc> {
        self.now_override.unwrap_or_else(Utc::now)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Session Lifecycle
    // ══════════════════════════════════════════════════════════════════════

    /// Start a session in one go. Equivalent to issuing a token, building,
    /// and installing; the token can't be stale on this path.
    pub fn start_session(&mut self, options: StartOptions) {
        let token = self.issue_build_token();
        let built = self.build_session(token, options);
        self.install_built(built);
    }

    /// Start another run with the previous options. `card_count` overrides
    /// (and becomes) the remembered count. Returns false when no session was
    /// ever started.
    pub fn start_new_session(&mut self, card_count: Option<usize>) -> bool {
        let Some(mut options) = self.options.clone() else {
            return false;
        };
        if let Some(count) = card_count {
            options.card_count = count;
        }
        self.start_session(options);
        true
    }

    /// Drop the current run. Graded reviews are already persisted; nothing
    /// else survives.
    pub fn stop_session(&mut self) {
        self.state = None;
    }

    /// Claim the next build slot. Any token issued earlier is stale from
    /// this point on.
    pub fn issue_build_token(&mut self) -> BuildToken {
        self.build_generation = self.build_generation.wrapping_add(1);
        BuildToken {
            generation: self.build_generation,
        }
    }

    /// Load schedules and assemble a deck for `options`. Pure preparation:
    /// nothing is installed until [`Self::install_built`] accepts the token.
    pub fn build_session(&mut self, token: BuildToken, options: StartOptions) -> BuiltSession {
        let now = self.now();

        // Queued saves must land before the reload, or a quick restart would
        // build its deck from a map missing the latest reviews.
        self.saver.flush();
        let schedules = match self.store.load(options.language) {
            Ok(map) => map,
            Err(e) => {
                log::warn!(
                    "Failed to load {} schedules, treating all cards as new: {:#}",
                    options.language.code(),
                    e
                );
                ScheduleMap::new()
            }
        };

        let catalog_cards = self.catalog.list_cards(options.language);
        let customs = sanitize_custom_cards(options.custom_cards.clone());

        let (deck, stats) = build_session_deck(
            &catalog_cards,
            &schedules,
            options.card_count,
            &customs,
            now,
            &mut self.rng,
        );

        // Distractors draw on the whole catalog, not just the deck.
        let mut pool_cards = catalog_cards;
        pool_cards.extend(customs);

        BuiltSession {
            token,
            options,
            schedules,
            pool: CardPool::new(pool_cards),
            deck,
            stats,
        }
    }

    /// Install a built session, unless a newer start superseded it.
    pub fn install_built(&mut self, built: BuiltSession) -> bool {
        if built.token.generation != self.build_generation {
            log::debug!(
                "Discarding stale session build (generation {} vs {})",
                built.token.generation,
                self.build_generation
            );
            return false;
        }

        let now = self.now();
        log::debug!(
            "Starting {} session: {} cards ({} due of {}, {} new of {})",
            built.options.language.code(),
            built.deck.len(),
            built.stats.selected_due,
            built.stats.due_available,
            built.stats.selected_new,
            built.stats.new_available
        );

        self.state = Some(SessionState::from_deck(&built.deck, now, &mut self.rng));
        self.pool = built.pool;
        self.schedules = built.schedules;
        self.selection_stats = built.stats;
        self.options = Some(built.options);
        self.last_review = None;
        true
    }

    // ══════════════════════════════════════════════════════════════════════
    // Card Transitions
    // ══════════════════════════════════════════════════════════════════════

    /// "Don't know": reveal the answer, requeue, grade `Again`.
    pub fn swipe_left(&mut self) {
        self.dispatch(SessionEvent::DontKnow);
    }

    /// "I know this": open the choice step (or accept a card that has no
    /// translation to test against).
    pub fn swipe_right(&mut self) {
        self.dispatch(SessionEvent::Know);
    }

    /// Attempt without full recall; a correct pick grades `Guess`.
    pub fn swipe_up(&mut self) {
        self.dispatch(SessionEvent::Guess);
    }

    pub fn choose_option(&mut self, index: usize) {
        self.dispatch(SessionEvent::Choose(index));
    }

    /// Feedback pause is over; show the next card. Driven by the UI timer,
    /// the engine never advances on its own.
    pub fn advance_to_next_card(&mut self) {
        self.dispatch(SessionEvent::Advance);
    }

    fn dispatch(&mut self, event: SessionEvent) {
        let Some(state) = self.state.take() else {
            return;
        };
        let now = self.now();
        let (state, outcome) = state.apply(event, &self.pool, now, &mut self.rng);
        self.state = Some(state);
        if let Some(outcome) = outcome {
            self.persist_review(outcome, now);
        }
    }

    /// Apply a graded review to the in-memory map, then hand the snapshot to
    /// the saver. The session keeps going on the in-memory state whether or
    /// not the write lands.
    fn persist_review(&mut self, outcome: ReviewOutcome, now: DateTime<Utc>) {
        let next = apply_review_grade(self.schedules.get(&outcome.card_id), outcome.grade, now);
        self.schedules.insert(outcome.card_id.clone(), next.clone());
        self.last_review = Some(LastReview {
            card_id: outcome.card_id,
            grade: outcome.grade,
            schedule: next,
        });

        if let Some(options) = &self.options {
            self.saver.submit(options.language, self.schedules.clone());
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Read Accessors
    // ══════════════════════════════════════════════════════════════════════

    pub fn state(&self) -> Option<&SessionState> {
        self.state.as_ref()
    }

    pub fn current_card(&self) -> Option<&Card> {
        let id = self.state.as_ref()?.current_card_id.as_deref()?;
        self.pool.get(id)
    }

    /// Cards not yet answered correctly; 0 with no session.
    pub fn remaining(&self) -> usize {
        self.state.as_ref().map_or(0, SessionState::remaining)
    }

    /// Time from start to clear, once the current run cleared.
    pub fn clear_time(&self) -> Option<Duration> {
        self.state.as_ref()?.clear_time()
    }

    pub fn selection_stats(&self) -> SelectionStats {
        self.selection_stats
    }

    pub fn last_review(&self) -> Option<&LastReview> {
        self.last_review.as_ref()
    }

    pub fn current_card_schedule(&self) -> Option<&CardSchedule> {
        let id = self.state.as_ref()?.current_card_id.as_deref()?;
        self.schedules.get(id)
    }

    /// The interval each grade would give the current card.
    pub fn interval_previews(&self) -> [(ReviewGrade, u32); 4] {
        preview_intervals(self.current_card_schedule())
    }
}
