//! vocadeck - headless spaced repetition practice simulator.
//!
//! Drives real sessions against the real engine, store, and catalog, one
//! simulated day at a time, and prints how the scheduler spreads the deck
//! out. Useful for eyeballing scheduling behavior without a UI on top.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use vocadeck::{
    BundledCatalog, Config, JsonScheduleStore, PracticeLanguage, ScheduleStore, SessionEngine,
    StartOptions, UiState,
};

// ══════════════════════════════════════════════════════════════════════════
// CLI Arguments
// ══════════════════════════════════════════════════════════════════════════

const DEFAULT_ACCURACY: f64 = 0.85;

#[derive(Parser, Debug)]
#[command(name = "vocadeck")]
#[command(author, version, about = "Headless spaced repetition practice simulator", long_about = None)]
struct Args {
    /// Language to practice (pt, fr)
    #[arg(short, long)]
    language: Option<PracticeLanguage>,

    /// Cards per session
    #[arg(short, long)]
    cards: Option<usize>,

    /// Days to simulate
    #[arg(short, long, default_value_t = 7, value_parser = clap::value_parser!(u32).range(1..=3650))]
    days: u32,

    /// Seed for deterministic runs
    #[arg(short, long, default_value_t = 1)]
    seed: u64,

    /// Chance of answering a card correctly, 0.0 to 1.0
    #[arg(long, default_value_t = DEFAULT_ACCURACY)]
    accuracy: f64,

    /// Directory for schedule files
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

// ══════════════════════════════════════════════════════════════════════════
// Main Entry Point
// ══════════════════════════════════════════════════════════════════════════

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = Config::load().unwrap_or_default();
    let language = args.language.unwrap_or(config.language);
    let card_count = args.cards.unwrap_or(config.default_card_count);
    let accuracy = effective_accuracy(args.accuracy);

    let data_dir = args
        .data_dir
        .clone()
        .unwrap_or_else(JsonScheduleStore::default_path);
    let store = Arc::new(JsonScheduleStore::new(data_dir)?);
    let catalog = Arc::new(BundledCatalog::new());

    println!(
        "Simulating {} days of {} practice ({} cards per session, accuracy {:.0}%)",
        args.days,
        language.label(),
        card_count,
        accuracy * 100.0
    );

    let mut records = store.load_records(language)?;
    let mut engine = SessionEngine::with_seed(catalog, store.clone(), args.seed);
    let mut policy = ChaCha8Rng::seed_from_u64(args.seed.wrapping_mul(0x9e37_79b9));
    let start = Utc::now();

    for day in 0..args.days {
        let day_start = start + Duration::days(i64::from(day));
        engine.set_reference_time(Some(day_start));
        engine.start_session(StartOptions::new(language, card_count));

        let stats = engine.selection_stats();
        let deck_count = engine.state().map_or(0, |s| s.deck_count);
        println!();
        println!(
            "Day {} ({}): {} cards ({} due of {}, {} new of {})",
            day + 1,
            day_start.format("%Y-%m-%d"),
            deck_count,
            stats.selected_due,
            stats.due_available,
            stats.selected_new,
            stats.new_available
        );

        play_session(&mut engine, &mut policy, accuracy, day_start);

        if let Some(state) = engine.state() {
            let outcome = if state.cleared {
                let secs = engine.clear_time().map_or(0, |t| t.num_seconds());
                format!("cleared in {}s", secs)
            } else {
                "stopped before clearing".to_string()
            };
            println!(
                "  {} - right {}, wrong {}, skipped {}, guessed {}",
                outcome,
                state.right_count,
                state.incorrect_count,
                state.skipped_count,
                state.guessed_count
            );
            if records.record_run(engine.clear_time()) {
                println!("  ✓ New best clear!");
            }
        }
        if let Some(review) = engine.last_review() {
            log::debug!(
                "last review: {} graded {}, next in {}d",
                review.card_id,
                review.grade.name(),
                review.schedule.interval_days
            );
        }
    }

    // Dropping the engine flushes every pending save.
    drop(engine);

    store.save_records(language, &records)?;
    print_schedule_summary(&store, language, start + Duration::days(i64::from(args.days)))?;
    println!();
    println!(
        "{} runs on record{}",
        records.runs_count,
        records
            .best_clear_ms
            .map_or(String::new(), |ms| format!(
                ", best clear {:.1}s",
                ms as f64 / 1000.0
            ))
    );

    Ok(())
}

/// Bound the accuracy argument to what `gen_bool` accepts. `clamp` passes
/// NaN through, so that case falls back to the default.
fn effective_accuracy(raw: f64) -> f64 {
    if raw.is_nan() {
        DEFAULT_ACCURACY
    } else {
        raw.clamp(0.0, 1.0)
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Session Playback
// ══════════════════════════════════════════════════════════════════════════

/// What the policy needs to know about the session right now. Copied out so
/// the engine is free to be driven mutably.
struct TurnView {
    cleared: bool,
    ui_state: UiState,
    correct_choice_index: Option<usize>,
    option_count: usize,
}

fn turn_view(engine: &SessionEngine) -> Option<TurnView> {
    engine.state().map(|s| TurnView {
        cleared: s.cleared,
        ui_state: s.ui_state,
        correct_choice_index: s.correct_choice_index,
        option_count: s.choice_options.len(),
    })
}

/// Play the current session to the end with a coin-flip answer policy.
fn play_session(
    engine: &mut SessionEngine,
    policy: &mut ChaCha8Rng,
    accuracy: f64,
    day_start: DateTime<Utc>,
) {
    let deck_count = engine.state().map_or(0, |s| s.deck_count);
    let max_turns = 50 * deck_count.max(1);
    let mut clock = day_start;

    for _ in 0..max_turns {
        let Some(view) = turn_view(engine) else {
            return;
        };
        if view.cleared {
            return;
        }

        // Every interaction costs a few simulated seconds, so clear times
        // and same-day due checks stay meaningful.
        clock = clock + Duration::seconds(3);
        engine.set_reference_time(Some(clock));

        match view.ui_state {
            UiState::Prompt => {
                if policy.gen_bool(accuracy) {
                    engine.swipe_right();
                    choose(engine, true, policy);
                } else if policy.gen_bool(0.5) {
                    engine.swipe_left();
                } else {
                    engine.swipe_right();
                    choose(engine, false, policy);
                }
            }
            _ => engine.advance_to_next_card(),
        }
    }
    log::warn!("Session hit the turn cap without clearing");
}

fn choose(engine: &mut SessionEngine, correctly: bool, policy: &mut ChaCha8Rng) {
    let Some(view) = turn_view(engine) else {
        return;
    };
    if view.ui_state != UiState::Choices {
        // The card had no translation and was accepted outright.
        return;
    }
    let Some(correct) = view.correct_choice_index else {
        return;
    };

    if correctly {
        engine.choose_option(correct);
    } else if view.option_count > 1 {
        let offset = policy.gen_range(1..view.option_count);
        engine.choose_option((correct + offset) % view.option_count);
    } else {
        // Only one option up: miss on purpose with an out-of-range pick.
        engine.choose_option(correct + 1);
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Reporting
// ══════════════════════════════════════════════════════════════════════════

fn print_schedule_summary(
    store: &JsonScheduleStore,
    language: PracticeLanguage,
    now: DateTime<Utc>,
) -> Result<()> {
    let map = store.load(language)?;
    if map.is_empty() {
        println!();
        println!("No schedules on disk yet.");
        return Ok(());
    }

    let due_now = map.values().filter(|s| s.is_due(now)).count();
    let lapses: u32 = map.values().map(|s| s.lapses).sum();
    let mut buckets = [0usize; 4];
    for schedule in map.values() {
        let bucket = match schedule.interval_days {
            0..=1 => 0,
            2..=3 => 1,
            4..=7 => 2,
            _ => 3,
        };
        buckets[bucket] += 1;
    }

    println!();
    println!(
        "Schedule state: {} cards tracked, {} due, {} lapses total",
        map.len(),
        due_now,
        lapses
    );
    println!(
        "  intervals: {} at <=1d, {} at 2-3d, {} at 4-7d, {} at 8d+",
        buckets[0], buckets[1], buckets[2], buckets[3]
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_argument_is_bounded() {
        assert_eq!(effective_accuracy(0.3), 0.3);
        assert_eq!(effective_accuracy(7.0), 1.0);
        assert_eq!(effective_accuracy(-2.0), 0.0);
        assert_eq!(effective_accuracy(f64::NAN), DEFAULT_ACCURACY);
    }
}
