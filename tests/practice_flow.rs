//! End-to-end flows over the whole stack: engine, deck builder, scheduler,
//! and stores working together the way a UI driver would use them.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use vocadeck::{
    BundledCatalog, Card, CardCatalog, JsonScheduleStore, MemoryScheduleStore, PracticeLanguage,
    ReviewGrade, ScheduleStore, SessionEngine, StartOptions, UiState,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

struct TestCatalog(Vec<Card>);

impl CardCatalog for TestCatalog {
    fn list_cards(&self, _language: PracticeLanguage) -> Vec<Card> {
        self.0.clone()
    }
    fn get_card(&self, id: &str) -> Option<Card> {
        self.0.iter().find(|c| c.id == id).cloned()
    }
}

fn catalog(n: usize) -> Arc<TestCatalog> {
    Arc::new(TestCatalog(
        (0..n)
            .map(|i| Card {
                id: format!("w{:02}", i),
                term: format!("palavra-{}", i),
                translation: Some(format!("word-{}", i)),
                is_custom: false,
            })
            .collect(),
    ))
}

/// Answer the current card correctly through the choice step.
fn answer_correctly(engine: &mut SessionEngine) {
    engine.swipe_right();
    let index = engine
        .state()
        .and_then(|s| s.correct_choice_index)
        .expect("choices should be up");
    engine.choose_option(index);
}

/// Drive the session to completion, always answering correctly.
fn clear_session(engine: &mut SessionEngine) {
    for _ in 0..1000 {
        let Some(state) = engine.state() else {
            return;
        };
        if state.cleared {
            return;
        }
        match state.ui_state {
            UiState::Prompt => answer_correctly(engine),
            _ => engine.advance_to_next_card(),
        }
    }
    panic!("session failed to clear");
}

#[test]
fn bundled_practice_clears_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonScheduleStore::new(dir.path().to_path_buf()).unwrap());
    {
        let mut engine =
            SessionEngine::with_seed(Arc::new(BundledCatalog::new()), store.clone(), 3);
        engine.set_reference_time(Some(t0()));
        engine.start_session(StartOptions::new(PracticeLanguage::Pt, 10));

        assert_eq!(engine.state().unwrap().deck_count, 10);
        clear_session(&mut engine);

        let state = engine.state().unwrap();
        assert!(state.cleared);
        assert_eq!(state.right_count, 10);
        assert_eq!(state.incorrect_count, 0);
    }

    // Engine dropped, saver flushed: ten first reviews on disk.
    let map = store.load(PracticeLanguage::Pt).unwrap();
    assert_eq!(map.len(), 10);
    for schedule in map.values() {
        assert_eq!(schedule.repetitions, 1);
        assert_eq!(schedule.interval_days, 2);
    }
    assert!(store.load(PracticeLanguage::Fr).unwrap().is_empty());
}

#[test]
fn reviews_shape_the_next_days_deck() {
    let store = Arc::new(MemoryScheduleStore::new());
    let mut engine = SessionEngine::with_seed(catalog(4), store, 11);

    // Day 1: clear all four; every card leaves with a 2-day interval.
    engine.set_reference_time(Some(t0()));
    engine.start_session(StartOptions::new(PracticeLanguage::Pt, 4));
    clear_session(&mut engine);

    // Day 2: nothing due and nothing new, the deck fills from the future
    // pool.
    engine.set_reference_time(Some(t0() + Duration::days(1)));
    engine.start_session(StartOptions::new(PracticeLanguage::Pt, 4));
    let stats = engine.selection_stats();
    assert_eq!(stats.due_available, 0);
    assert_eq!(stats.new_available, 0);
    assert_eq!(engine.state().unwrap().deck_count, 4);

    // Day 3: the 2-day intervals land; everything is due.
    engine.set_reference_time(Some(t0() + Duration::days(2)));
    engine.start_session(StartOptions::new(PracticeLanguage::Pt, 4));
    let stats = engine.selection_stats();
    assert_eq!(stats.due_available, 4);
    assert_eq!(stats.selected_due, 4);
}

#[test]
fn wrong_choice_requeues_until_answered() {
    let store = Arc::new(MemoryScheduleStore::new());
    let mut engine = SessionEngine::with_seed(catalog(3), store, 5);
    engine.set_reference_time(Some(t0()));
    engine.start_session(StartOptions::new(PracticeLanguage::Pt, 3));

    let first = engine.current_card().unwrap().id.clone();

    engine.swipe_right();
    let state = engine.state().unwrap();
    let correct = state.correct_choice_index.unwrap();
    let wrong = (correct + 1) % state.choice_options.len();
    engine.choose_option(wrong);

    let state = engine.state().unwrap();
    assert_eq!(state.ui_state, UiState::FeedbackWrong);
    assert_eq!(state.incorrect_count, 1);
    assert_eq!(state.queue.last(), Some(&first));
    assert_eq!(engine.last_review().unwrap().grade, ReviewGrade::Hard);

    // The next card shown is a different one.
    engine.advance_to_next_card();
    assert_ne!(engine.current_card().unwrap().id, first);

    // The requeued card comes back around and the run still clears.
    clear_session(&mut engine);
    let state = engine.state().unwrap();
    assert!(state.cleared);
    assert_eq!(state.right_count, 3);
    assert_eq!(state.remaining(), 0);
    assert!(state.cleared_at.is_some());
}

#[test]
fn custom_cards_join_over_the_cap_and_get_schedules() {
    let store = Arc::new(MemoryScheduleStore::new());
    let mut engine = SessionEngine::with_seed(catalog(6), store.clone(), 13);
    engine.set_reference_time(Some(t0()));

    let custom = Card::new_custom(" saudade ".to_string(), Some(" longing ".to_string()));
    let custom_id = custom.id.clone();
    assert_eq!(custom_id.len(), 8);

    let mut options = StartOptions::new(PracticeLanguage::Pt, 2);
    options.custom_cards = vec![
        custom,
        // Empty id: sanitization drops it.
        Card {
            id: "".into(),
            term: "dropped".into(),
            translation: None,
            is_custom: true,
        },
    ];
    engine.start_session(options);

    // Two catalog cards plus the one surviving custom.
    assert_eq!(engine.state().unwrap().deck_count, 3);

    clear_session(&mut engine);
    drop(engine);

    // The minted id carried all the way through to the saved schedule.
    let map = store.load(PracticeLanguage::Pt).unwrap();
    assert_eq!(map.len(), 3);
    assert!(map.contains_key(&custom_id));
}

#[test]
fn guessing_grades_more_conservatively() {
    let store = Arc::new(MemoryScheduleStore::new());
    let mut engine = SessionEngine::with_seed(catalog(4), store, 17);
    engine.set_reference_time(Some(t0()));
    engine.start_session(StartOptions::new(PracticeLanguage::Pt, 2));

    engine.swipe_up();
    let state = engine.state().unwrap();
    assert_eq!(state.ui_state, UiState::Choices);
    assert_eq!(state.guessed_count, 1);
    let index = state.correct_choice_index.unwrap();
    engine.choose_option(index);

    let review = engine.last_review().unwrap();
    assert_eq!(review.grade, ReviewGrade::Guess);
    // Same 2-day first interval as a clean recall, but ease dips instead of
    // rising.
    assert_eq!(review.schedule.interval_days, 2);
    assert!(review.schedule.ease < 2.5);
}

#[test]
fn empty_deck_clears_instantly() {
    let store = Arc::new(MemoryScheduleStore::new());
    let mut engine = SessionEngine::with_seed(catalog(5), store, 1);
    engine.set_reference_time(Some(t0()));
    engine.start_session(StartOptions::new(PracticeLanguage::Pt, 0));

    let state = engine.state().unwrap();
    assert!(state.cleared);
    assert_eq!(state.deck_count, 0);
    assert_eq!(engine.remaining(), 0);
    assert!(engine.current_card().is_none());
    // Never went through an answer: no clear timestamp.
    assert_eq!(engine.clear_time(), None);
}

#[test]
fn damaged_schedule_files_degrade_to_new_cards() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("schedules-pt.json"), "{ not json").unwrap();
    let store = Arc::new(JsonScheduleStore::new(dir.path().to_path_buf()).unwrap());

    let mut engine = SessionEngine::with_seed(catalog(4), store, 2);
    engine.set_reference_time(Some(t0()));
    engine.start_session(StartOptions::new(PracticeLanguage::Pt, 4));

    let stats = engine.selection_stats();
    assert_eq!(stats.new_available, 4);
    assert_eq!(engine.state().unwrap().deck_count, 4);
}

#[test]
fn choices_draw_from_the_whole_catalog() {
    // Deck capped at two cards, but distractors still come from all ten.
    let store = Arc::new(MemoryScheduleStore::new());
    let mut engine = SessionEngine::with_seed(catalog(10), store, 21);
    engine.set_reference_time(Some(t0()));
    engine.start_session(StartOptions::new(PracticeLanguage::Pt, 2));

    engine.swipe_right();
    let current_translation = engine
        .current_card()
        .and_then(|c| c.translation.clone())
        .unwrap();
    let state = engine.state().unwrap();
    assert_eq!(state.ui_state, UiState::Choices);
    assert_eq!(state.choice_options.len(), 3);

    let correct_index = state.correct_choice_index.unwrap();
    assert_eq!(state.choice_options[correct_index], current_translation);
    for (i, option) in state.choice_options.iter().enumerate() {
        if i != correct_index {
            assert_ne!(option.to_lowercase(), current_translation.to_lowercase());
        }
    }
}
