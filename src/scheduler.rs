//! Spaced repetition scheduling.
//!
//! A simplified SM-2 variant: each card carries an ease factor that grows on
//! success and shrinks on failure, and the review interval is the previous
//! interval scaled by a grade-dependent factor. All functions here are pure;
//! the session engine decides when to call them and what to do with the
//! result.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_EASE: f64 = 1.3;
pub const MAX_EASE: f64 = 3.0;
pub const DEFAULT_EASE: f64 = 2.5;

/// Upper bound on intervals: a century. Unbounded growth would eventually
/// push `due_at` past chrono's representable range.
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// How a review went. Chosen by the session engine from the user's path
/// through a card, never taken directly from UI input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewGrade {
    /// Didn't know the card at all.
    Again,
    /// Got it after a wrong choice.
    Hard,
    /// Recalled it directly.
    Good,
    /// Got it right, but only by attempting without full recall.
    Guess,
}

impl ReviewGrade {
    pub const ALL: [ReviewGrade; 4] = [Self::Again, Self::Hard, Self::Good, Self::Guess];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Again => "again",
            Self::Hard => "hard",
            Self::Good => "good",
            Self::Guess => "guess",
        }
    }
}

/// Per-card scheduling state. One exists per (language, card id) pair,
/// created lazily on the card's first review and never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardSchedule {
    /// When the card next comes due. Persisted as ms since the epoch.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub due_at: DateTime<Utc>,
    pub interval_days: u32,
    pub ease: f64,
    /// Consecutive successful reviews since the last lapse.
    pub repetitions: u32,
    /// Cumulative failed reviews.
    pub lapses: u32,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

/// Full schedule state for one language, keyed by card id.
pub type ScheduleMap = HashMap<String, CardSchedule>;

impl CardSchedule {
    /// Schedule for a card that has never been reviewed: due immediately.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            due_at: now,
            interval_days: 0,
            ease: DEFAULT_EASE,
            repetitions: 0,
            lapses: 0,
            last_reviewed_at: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at <= now
    }

    /// Whether a loaded schedule is usable: ease finite and in range, the
    /// interval within the cap. Entries failing this are dropped at load
    /// time and the card is treated as new.
    pub fn is_valid(&self) -> bool {
        self.ease.is_finite()
            && (MIN_EASE..=MAX_EASE).contains(&self.ease)
            && self.interval_days <= MAX_INTERVAL_DAYS
    }
}

/// Apply a graded review to a card's schedule, returning the new schedule.
///
/// `current` is `None` for a card's first-ever review. The ease factor stays
/// within `[MIN_EASE, MAX_EASE]` and the produced interval stays within
/// `[1, MAX_INTERVAL_DAYS]`, whatever the incoming schedule holds.
pub fn apply_review_grade(
    current: Option<&CardSchedule>,
    grade: ReviewGrade,
    now: DateTime<Utc>,
) -> CardSchedule {
    let schedule = current
        .cloned()
        .unwrap_or_else(|| CardSchedule::new(now));

    // An interval of 0 (never reviewed) scales like an interval of 1.
    let base = f64::from(schedule.interval_days.max(1));

    let (interval_days, ease) = match grade {
        ReviewGrade::Again => {
            return CardSchedule {
                due_at: now + Duration::days(1),
                interval_days: 1,
                ease: (schedule.ease - 0.2).clamp(MIN_EASE, MAX_EASE),
                repetitions: 0,
                lapses: schedule.lapses + 1,
                last_reviewed_at: Some(now),
            };
        }
        ReviewGrade::Hard => (
            round_interval(base * 1.2),
            (schedule.ease - 0.15).clamp(MIN_EASE, MAX_EASE),
        ),
        ReviewGrade::Guess => {
            // Grows slower than a clean recall, but still moves forward.
            let factor = (schedule.ease * 0.75).max(1.15);
            (
                round_interval(base * factor),
                (schedule.ease - 0.05).clamp(MIN_EASE, MAX_EASE),
            )
        }
        ReviewGrade::Good => {
            let interval = if schedule.repetitions <= 1 {
                2
            } else {
                round_interval(base * schedule.ease)
            };
            (interval, (schedule.ease + 0.05).clamp(MIN_EASE, MAX_EASE))
        }
    };

    CardSchedule {
        due_at: now + Duration::days(i64::from(interval_days)),
        interval_days,
        ease,
        repetitions: schedule.repetitions + 1,
        lapses: schedule.lapses,
        last_reviewed_at: Some(now),
    }
}

/// The interval each grade would produce for this schedule, without applying
/// anything. Used for answer-button captions and the simulation printout.
pub fn preview_intervals(current: Option<&CardSchedule>) -> [(ReviewGrade, u32); 4] {
    // The produced interval does not depend on the review time.
    let now = Utc::now();
    ReviewGrade::ALL.map(|grade| (grade, apply_review_grade(current, grade, now).interval_days))
}

fn round_interval(value: f64) -> u32 {
    // The `as` cast saturates, so even absurd products land inside the clamp.
    (value.round() as u32).clamp(1, MAX_INTERVAL_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn schedule(ease: f64, interval_days: u32, repetitions: u32) -> CardSchedule {
        CardSchedule {
            due_at: t0(),
            interval_days,
            ease,
            repetitions,
            lapses: 0,
            last_reviewed_at: None,
        }
    }

    #[test]
    fn first_good_review_gives_two_days() {
        let next = apply_review_grade(None, ReviewGrade::Good, t0());
        assert_eq!(next.repetitions, 1);
        assert_eq!(next.interval_days, 2);
        assert!((next.ease - 2.55).abs() < 1e-9);
        assert_eq!(next.due_at, t0() + Duration::days(2));
        assert_eq!(next.lapses, 0);
        assert_eq!(next.last_reviewed_at, Some(t0()));
    }

    #[test]
    fn second_good_review_still_fixed_at_two_days() {
        let first = apply_review_grade(None, ReviewGrade::Good, t0());
        let second = apply_review_grade(Some(&first), ReviewGrade::Good, t0());
        // repetitions == 1 still takes the fixed early-interval path
        assert_eq!(second.interval_days, 2);
        assert_eq!(second.repetitions, 2);
    }

    #[test]
    fn mature_good_review_scales_by_ease() {
        let current = schedule(2.5, 5, 3);
        let next = apply_review_grade(Some(&current), ReviewGrade::Good, t0());
        // round(5 * 2.5) = 13
        assert_eq!(next.interval_days, 13);
        assert!((next.ease - 2.55).abs() < 1e-9);
        assert_eq!(next.repetitions, 4);
    }

    #[test]
    fn again_resets_progress_and_counts_a_lapse() {
        let current = schedule(2.5, 5, 3);
        let next = apply_review_grade(Some(&current), ReviewGrade::Again, t0());
        assert!((next.ease - 2.3).abs() < 1e-9);
        assert_eq!(next.interval_days, 1);
        assert_eq!(next.repetitions, 0);
        assert_eq!(next.lapses, 1);
        assert_eq!(next.due_at, t0() + Duration::days(1));
    }

    #[test]
    fn hard_grows_slowly_and_drops_ease() {
        let current = schedule(2.5, 10, 3);
        let next = apply_review_grade(Some(&current), ReviewGrade::Hard, t0());
        assert_eq!(next.interval_days, 12);
        assert!((next.ease - 2.35).abs() < 1e-9);
        assert_eq!(next.repetitions, 4);
    }

    #[test]
    fn guess_uses_dampened_ease() {
        // factor = max(1.15, 2.5 * 0.75) = 1.875
        let next = apply_review_grade(None, ReviewGrade::Guess, t0());
        assert_eq!(next.interval_days, 2);
        assert!((next.ease - 2.45).abs() < 1e-9);

        // With ease at the floor the 1.15 lower bound kicks in:
        // 1.3 * 0.75 = 0.975 < 1.15, so round(10 * 1.15) = 12.
        let low = schedule(MIN_EASE, 10, 5);
        let next = apply_review_grade(Some(&low), ReviewGrade::Guess, t0());
        assert_eq!(next.interval_days, 12);
    }

    #[test]
    fn ease_stays_clamped() {
        let mut current = CardSchedule::new(t0());
        for _ in 0..40 {
            current = apply_review_grade(Some(&current), ReviewGrade::Again, t0());
            assert!(current.ease >= MIN_EASE);
        }
        assert!((current.ease - MIN_EASE).abs() < 1e-9);

        for _ in 0..40 {
            current = apply_review_grade(Some(&current), ReviewGrade::Good, t0());
            assert!(current.ease <= MAX_EASE);
        }
        assert!((current.ease - MAX_EASE).abs() < 1e-9);
    }

    #[test]
    fn interval_never_below_one_day() {
        for grade in ReviewGrade::ALL {
            let next = apply_review_grade(None, grade, t0());
            assert!(next.interval_days >= 1, "{:?}", grade);
        }
        let floor = schedule(MIN_EASE, 0, 0);
        for grade in ReviewGrade::ALL {
            let next = apply_review_grade(Some(&floor), grade, t0());
            assert!(next.interval_days >= 1, "{:?}", grade);
        }
    }

    #[test]
    fn long_good_streaks_cap_the_interval() {
        // Ease-driven growth is geometric; year after year of clean recalls
        // must park at the cap instead of running off the end of chrono.
        let mut current = apply_review_grade(None, ReviewGrade::Good, t0());
        for _ in 0..30 {
            current = apply_review_grade(Some(&current), ReviewGrade::Good, t0());
            assert!(current.interval_days <= MAX_INTERVAL_DAYS);
            assert!(current.is_valid());
        }
        assert_eq!(current.interval_days, MAX_INTERVAL_DAYS);
        assert_eq!(
            current.due_at,
            t0() + Duration::days(i64::from(MAX_INTERVAL_DAYS))
        );
    }

    #[test]
    fn oversized_stored_intervals_grade_without_overflow() {
        // A hand-edited file can hold any u32; grading still stays in range.
        let broken = CardSchedule {
            interval_days: u32::MAX,
            ..schedule(2.5, 1, 3)
        };
        for grade in [ReviewGrade::Hard, ReviewGrade::Good, ReviewGrade::Guess] {
            let next = apply_review_grade(Some(&broken), grade, t0());
            assert_eq!(next.interval_days, MAX_INTERVAL_DAYS, "{:?}", grade);
            assert_eq!(
                next.due_at,
                t0() + Duration::days(i64::from(MAX_INTERVAL_DAYS))
            );
        }
    }

    #[test]
    fn due_check_is_inclusive() {
        let s = schedule(2.5, 1, 1);
        assert!(s.is_due(t0()));
        assert!(s.is_due(t0() + Duration::seconds(1)));
        assert!(!s.is_due(t0() - Duration::seconds(1)));
    }

    #[test]
    fn preview_matches_apply() {
        let current = schedule(2.2, 4, 2);
        for (grade, days) in preview_intervals(Some(&current)) {
            let applied = apply_review_grade(Some(&current), grade, t0());
            assert_eq!(days, applied.interval_days, "{:?}", grade);
        }
    }

    #[test]
    fn validity_rejects_broken_ease() {
        let mut s = CardSchedule::new(t0());
        assert!(s.is_valid());
        s.ease = f64::NAN;
        assert!(!s.is_valid());
        s.ease = 9.0;
        assert!(!s.is_valid());
        s.ease = 0.4;
        assert!(!s.is_valid());
    }

    #[test]
    fn validity_rejects_oversized_intervals() {
        let mut s = CardSchedule::new(t0());
        s.interval_days = MAX_INTERVAL_DAYS;
        assert!(s.is_valid());
        s.interval_days = MAX_INTERVAL_DAYS + 1;
        assert!(!s.is_valid());
        s.interval_days = 100_000_000;
        assert!(!s.is_valid());
    }

    #[test]
    fn timestamps_persist_as_epoch_millis() {
        let s = schedule(2.5, 3, 1);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["due_at"], serde_json::json!(t0().timestamp_millis()));
        // Unreviewed schedules omit the field entirely.
        assert!(json.get("last_reviewed_at").is_none());

        let back: CardSchedule = serde_json::from_value(json).unwrap();
        assert_eq!(back, s);
    }
}
