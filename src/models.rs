//! Data models for vocabulary cards and practice languages.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Language of the vocabulary being practiced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PracticeLanguage {
    Pt,
    Fr,
}

impl PracticeLanguage {
    pub const ALL: [PracticeLanguage; 2] = [Self::Pt, Self::Fr];

    /// Short code used in file names and config.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Pt => "pt",
            Self::Fr => "fr",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "pt" => Some(Self::Pt),
            "fr" => Some(Self::Fr),
            _ => None,
        }
    }

    /// Human-readable name for menus and stats output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pt => "Portuguese",
            Self::Fr => "French",
        }
    }
}

impl std::fmt::Display for PracticeLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for PracticeLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| format!("unknown practice language: {}", s))
    }
}

/// A single vocabulary card.
///
/// Cards are immutable during a session. A card without a translation can
/// still be practiced, but only through the direct know/don't-know path;
/// it never enters the multiple-choice flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub term: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    #[serde(default)]
    pub is_custom: bool,
}

impl Card {
    /// Create a user-authored card with a generated id.
    pub fn new_custom(term: String, translation: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string()[..8].to_string(),
            term,
            translation,
            is_custom: true,
        }
    }

    pub fn has_translation(&self) -> bool {
        self.translation
            .as_deref()
            .map_or(false, |t| !t.trim().is_empty())
    }
}

/// Clean up caller-supplied custom cards before they join a session.
///
/// Trims term and translation, drops cards with an empty id or term,
/// de-duplicates by id keeping the first occurrence, and forces the
/// `is_custom` flag so catalog cards can't be smuggled in.
pub fn sanitize_custom_cards(cards: Vec<Card>) -> Vec<Card> {
    let mut seen = std::collections::HashSet::new();
    let mut clean = Vec::new();

    for card in cards {
        let id = card.id.trim().to_string();
        let term = card.term.trim().to_string();
        if id.is_empty() || term.is_empty() {
            continue;
        }
        if !seen.insert(id.clone()) {
            continue;
        }

        let translation = card
            .translation
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        clean.push(Card {
            id,
            term,
            translation,
            is_custom: true,
        });
    }

    clean
}
