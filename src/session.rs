//! Practice session state and transitions.
//!
//! The session is a small state machine driven entirely by the caller:
//! `SessionState::apply` consumes the current state plus one event and hands
//! back the next state, together with the review that should be recorded (if
//! the event graded a card). Nothing here touches a clock, storage, or any
//! ambient state, which keeps every transition replayable in tests.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::Card;
use crate::scheduler::ReviewGrade;

/// Options shown next to the correct translation in the choice step.
pub const DISTRACTOR_COUNT: usize = 2;

/// What the UI should be showing for the current card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiState {
    /// Term visible, waiting for a swipe.
    Prompt,
    /// The learner gave up; translation revealed.
    RevealDontKnow,
    /// Multiple-choice options visible.
    Choices,
    FeedbackCorrect,
    FeedbackWrong,
}

/// One step of user input, already stripped of gesture details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// "Don't know": reveal the answer and requeue the card.
    DontKnow,
    /// "I know this": verify through the choice step (or accept outright
    /// when the card has no translation to test against).
    Know,
    /// Attempt without full recall; graded more conservatively on success.
    Guess,
    /// A multiple-choice option was picked.
    Choose(usize),
    /// The feedback pause ended; move to the next card.
    Advance,
}

/// A review the caller must persist: which card, and how it went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewOutcome {
    pub card_id: String,
    pub grade: ReviewGrade,
}

/// The cards a session can draw on: the catalog snapshot taken at start plus
/// any custom cards. Keeps a vec for deterministic iteration (distractor
/// picking shuffles it under a seedable rng) and an index for lookups.
#[derive(Debug, Clone, Default)]
pub struct CardPool {
    cards: Vec<Card>,
    index: HashMap<String, usize>,
}

impl CardPool {
    pub fn new(cards: Vec<Card>) -> Self {
        let index = cards
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();
        Self { cards, index }
    }

    pub fn get(&self, id: &str) -> Option<&Card> {
        self.index.get(id).map(|&i| &self.cards[i])
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Full state of one practice run.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Remaining card ids in presentation order. A card appears at most once;
    /// requeueing filters before pushing to the back.
    pub queue: Vec<String>,
    /// Ids answered correctly. Grows monotonically; never re-enqueued.
    pub correct: HashSet<String>,
    /// Deck size at session start. Fixed for the whole run.
    pub deck_count: usize,
    pub started_at: DateTime<Utc>,
    pub cleared_at: Option<DateTime<Utc>>,
    pub cleared: bool,
    pub current_card_id: Option<String>,
    pub ui_state: UiState,
    /// Choice-step transients, reset on advance.
    pub choice_options: Vec<String>,
    pub correct_choice_index: Option<usize>,
    pub selected_choice_index: Option<usize>,
    pub current_card_was_guess: bool,
    pub right_count: u32,
    pub incorrect_count: u32,
    pub skipped_count: u32,
    pub guessed_count: u32,
}

impl SessionState {
    /// Start a run over the given deck. The deck builder already shuffled
    /// once; the queue gets its own shuffle so deck assembly order never
    /// leaks into presentation order. An empty deck clears immediately.
    pub fn from_deck<R: Rng + ?Sized>(deck: &[Card], now: DateTime<Utc>, rng: &mut R) -> Self {
        let mut queue: Vec<String> = deck.iter().map(|c| c.id.clone()).collect();
        queue.shuffle(rng);

        Self {
            deck_count: queue.len(),
            cleared: queue.is_empty(),
            current_card_id: queue.first().cloned(),
            queue,
            correct: HashSet::new(),
            started_at: now,
            cleared_at: None,
            ui_state: UiState::Prompt,
            choice_options: Vec::new(),
            correct_choice_index: None,
            selected_choice_index: None,
            current_card_was_guess: false,
            right_count: 0,
            incorrect_count: 0,
            skipped_count: 0,
            guessed_count: 0,
        }
    }

    /// Cards not yet answered correctly.
    pub fn remaining(&self) -> usize {
        self.deck_count.saturating_sub(self.correct.len())
    }

    /// First queued id not already answered correctly.
    pub fn peek_next_card_id(&self) -> Option<&str> {
        self.queue
            .iter()
            .find(|id| !self.correct.contains(id.as_str()))
            .map(String::as_str)
    }

    /// Time from start to clear, once cleared.
    pub fn clear_time(&self) -> Option<Duration> {
        self.cleared_at.map(|at| at - self.started_at)
    }

    /// Advance the machine by one event.
    ///
    /// Events that don't fit the current state (a swipe during feedback, a
    /// choice with no options up, anything after the session cleared) are
    /// identity transitions: stale UI callbacks must never corrupt a run.
    pub fn apply<R: Rng + ?Sized>(
        mut self,
        event: SessionEvent,
        pool: &CardPool,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> (Self, Option<ReviewOutcome>) {
        match event {
            SessionEvent::DontKnow => {
                if self.cleared || self.ui_state != UiState::Prompt {
                    return (self, None);
                }
                let Some(id) = self.current_card_id.clone() else {
                    return (self, None);
                };
                self.requeue_to_back(&id);
                self.skipped_count += 1;
                self.ui_state = UiState::RevealDontKnow;
                let outcome = ReviewOutcome {
                    card_id: id,
                    grade: ReviewGrade::Again,
                };
                (self, Some(outcome))
            }

            SessionEvent::Know => {
                if self.cleared || self.ui_state != UiState::Prompt {
                    return (self, None);
                }
                let Some(id) = self.current_card_id.clone() else {
                    return (self, None);
                };
                match translation_of(pool, &id) {
                    // Nothing to test against: take the learner's word for
                    // it. No grade is recorded, the card never entered a
                    // recall test.
                    None => {
                        self.mark_correct(&id, now);
                        (self, None)
                    }
                    Some(translation) => {
                        self.enter_choices(&id, &translation, false, pool, rng);
                        (self, None)
                    }
                }
            }

            SessionEvent::Guess => {
                if self.cleared || self.ui_state != UiState::Prompt {
                    return (self, None);
                }
                let Some(id) = self.current_card_id.clone() else {
                    return (self, None);
                };
                // Guessing needs options to guess among.
                let Some(translation) = translation_of(pool, &id) else {
                    return (self, None);
                };
                self.guessed_count += 1;
                self.enter_choices(&id, &translation, true, pool, rng);
                (self, None)
            }

            SessionEvent::Choose(index) => {
                if self.ui_state != UiState::Choices || self.choice_options.is_empty() {
                    return (self, None);
                }
                let Some(id) = self.current_card_id.clone() else {
                    return (self, None);
                };
                self.selected_choice_index = Some(index);

                if Some(index) == self.correct_choice_index {
                    let grade = if self.current_card_was_guess {
                        ReviewGrade::Guess
                    } else {
                        ReviewGrade::Good
                    };
                    self.mark_correct(&id, now);
                    (self, Some(ReviewOutcome { card_id: id, grade }))
                } else {
                    // Out-of-range indexes land here too.
                    self.requeue_to_back(&id);
                    self.incorrect_count += 1;
                    self.current_card_was_guess = false;
                    self.ui_state = UiState::FeedbackWrong;
                    let outcome = ReviewOutcome {
                        card_id: id,
                        grade: ReviewGrade::Hard,
                    };
                    (self, Some(outcome))
                }
            }

            SessionEvent::Advance => {
                if self.cleared {
                    return (self, None);
                }
                match self.peek_next_card_id().map(str::to_string) {
                    None => {
                        self.current_card_id = None;
                        self.cleared = true;
                        self.ui_state = UiState::Prompt;
                        (self, None)
                    }
                    Some(next_id) => {
                        self.current_card_id = Some(next_id);
                        self.ui_state = UiState::Prompt;
                        self.clear_choice_transients();
                        (self, None)
                    }
                }
            }
        }
    }

    fn enter_choices<R: Rng + ?Sized>(
        &mut self,
        card_id: &str,
        translation: &str,
        was_guess: bool,
        pool: &CardPool,
        rng: &mut R,
    ) {
        let mut options = vec![translation.to_string()];
        options.extend(pick_distractors(
            pool.cards(),
            translation,
            card_id,
            DISTRACTOR_COUNT,
            rng,
        ));
        options.shuffle(rng);

        self.correct_choice_index = options.iter().position(|o| o == translation);
        self.choice_options = options;
        self.selected_choice_index = None;
        self.current_card_was_guess = was_guess;
        self.ui_state = UiState::Choices;
    }

    fn mark_correct(&mut self, id: &str, now: DateTime<Utc>) {
        self.queue.retain(|q| q != id);
        self.correct.insert(id.to_string());
        self.right_count += 1;
        self.ui_state = UiState::FeedbackCorrect;
        if self.correct.len() >= self.deck_count {
            self.cleared = true;
            self.cleared_at = Some(now);
        }
    }

    fn requeue_to_back(&mut self, id: &str) {
        self.queue.retain(|q| q != id);
        self.queue.push(id.to_string());
    }

    fn clear_choice_transients(&mut self) {
        self.choice_options.clear();
        self.correct_choice_index = None;
        self.selected_choice_index = None;
        self.current_card_was_guess = false;
    }
}

fn translation_of(pool: &CardPool, id: &str) -> Option<String> {
    pool.get(id)
        .and_then(|c| c.translation.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Pick up to `count` wrong answers for a choice step.
///
/// Candidates need a non-empty translation that differs from the correct one
/// (case-insensitively) and must not be the card being asked. The picked set
/// never contains two options that differ only in case, and comes up short
/// when the pool is small rather than inventing filler.
pub fn pick_distractors<R: Rng + ?Sized>(
    pool: &[Card],
    correct_translation: &str,
    exclude_card_id: &str,
    count: usize,
    rng: &mut R,
) -> Vec<String> {
    let correct_key = correct_translation.trim().to_lowercase();

    let mut candidates: Vec<&Card> = pool
        .iter()
        .filter(|c| {
            if c.id == exclude_card_id {
                return false;
            }
            match c.translation.as_deref().map(str::trim) {
                Some(t) if !t.is_empty() => t.to_lowercase() != correct_key,
                _ => false,
            }
        })
        .collect();
    candidates.shuffle(rng);

    let mut seen = HashSet::new();
    let mut picked = Vec::new();
    for card in candidates {
        if picked.len() >= count {
            break;
        }
        let Some(t) = card.translation.as_deref().map(str::trim) else {
            continue;
        };
        if seen.insert(t.to_lowercase()) {
            picked.push(t.to_string());
        }
    }
    picked
}
