//! Card catalogs.

use std::collections::HashMap;

use crate::models::{Card, PracticeLanguage};

/// Bundled starter vocabulary, one file per language.
const BUNDLED_PT: &str = include_str!("../bundled_words/pt.json");
const BUNDLED_FR: &str = include_str!("../bundled_words/fr.json");

/// Source of practice cards. Implementations are snapshotted at session
/// start; mid-session changes are invisible until the next start.
pub trait CardCatalog: Send + Sync {
    /// Every card available for a language.
    fn list_cards(&self, language: PracticeLanguage) -> Vec<Card>;
    fn get_card(&self, id: &str) -> Option<Card>;
}

/// The word lists shipped inside the binary.
pub struct BundledCatalog {
    cards: HashMap<PracticeLanguage, Vec<Card>>,
}

impl BundledCatalog {
    pub fn new() -> Self {
        let mut cards = HashMap::new();
        cards.insert(PracticeLanguage::Pt, parse_bundle(BUNDLED_PT, "pt"));
        cards.insert(PracticeLanguage::Fr, parse_bundle(BUNDLED_FR, "fr"));
        Self { cards }
    }
}

impl Default for BundledCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl CardCatalog for BundledCatalog {
    fn list_cards(&self, language: PracticeLanguage) -> Vec<Card> {
        self.cards.get(&language).cloned().unwrap_or_default()
    }

    fn get_card(&self, id: &str) -> Option<Card> {
        self.cards
            .values()
            .flatten()
            .find(|c| c.id == id)
            .cloned()
    }
}

fn parse_bundle(json: &str, name: &str) -> Vec<Card> {
    match serde_json::from_str(json) {
        Ok(cards) => cards,
        Err(e) => {
            log::warn!("Bundled {} word list failed to parse: {}", name, e);
            Vec::new()
        }
    }
}
