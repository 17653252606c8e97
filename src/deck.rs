//! Session deck assembly.
//!
//! Turns the full card catalog plus the schedule map into the bounded set of
//! cards one practice run works through: due cards first, then unseen cards,
//! then not-yet-due cards to fill whatever room is left.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::Card;
use crate::scheduler::ScheduleMap;

/// How the deck builder filled the session, kept for the debug surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionStats {
    pub due_available: usize,
    pub new_available: usize,
    pub selected_due: usize,
    pub selected_new: usize,
}

/// Assemble a session deck of at most `card_count` catalog cards plus every
/// custom card.
///
/// The catalog is shuffled before classification so that ties inside a pool
/// come out in random order, then due and future pools are sorted by their
/// due time (stable sort, shuffle order breaks ties). Selection is greedy:
/// due, then new, then future until the cap is reached. `custom_cards` are
/// expected to be pre-sanitized and ride along regardless of the cap. The
/// final deck order is one more uniform shuffle over everything selected.
///
/// Duplicate ids between catalog and customs are the caller's problem.
pub fn build_session_deck<R: Rng + ?Sized>(
    catalog_cards: &[Card],
    schedules: &ScheduleMap,
    card_count: usize,
    custom_cards: &[Card],
    now: DateTime<Utc>,
    rng: &mut R,
) -> (Vec<Card>, SelectionStats) {
    let mut pool: Vec<Card> = catalog_cards.to_vec();
    pool.shuffle(rng);

    let mut due = Vec::new();
    let mut fresh = Vec::new();
    let mut future = Vec::new();
    for card in pool {
        match schedules.get(&card.id) {
            None => fresh.push(card),
            Some(s) if s.is_due(now) => due.push(card),
            Some(_) => future.push(card),
        }
    }

    // Earliest due time first; both pools are guaranteed to have schedules.
    due.sort_by_key(|c| schedules.get(&c.id).map(|s| s.due_at));
    future.sort_by_key(|c| schedules.get(&c.id).map(|s| s.due_at));

    let mut stats = SelectionStats {
        due_available: due.len(),
        new_available: fresh.len(),
        ..Default::default()
    };

    // Selection can never exceed the catalog, so cap the reservation too;
    // `card_count` is caller input and may be absurdly large.
    let mut deck: Vec<Card> =
        Vec::with_capacity(card_count.min(catalog_cards.len()) + custom_cards.len());
    for card in due {
        if deck.len() >= card_count {
            break;
        }
        stats.selected_due += 1;
        deck.push(card);
    }
    for card in fresh {
        if deck.len() >= card_count {
            break;
        }
        stats.selected_new += 1;
        deck.push(card);
    }
    for card in future {
        if deck.len() >= card_count {
            break;
        }
        deck.push(card);
    }

    // Custom cards join on top of the cap, earliest schedule first. A custom
    // card the learner never reviewed counts as due right now.
    let mut customs: Vec<Card> = custom_cards.to_vec();
    customs.sort_by_key(|c| schedules.get(&c.id).map_or(now, |s| s.due_at));
    deck.extend(customs);

    deck.shuffle(rng);
    (deck, stats)
}
