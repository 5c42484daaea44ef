// Deck/format validation boundary
// The real rules engine lives outside this crate; the lobby only needs the
// trait and the result shape. FormatSizeValidator covers size rules so the
// lobby flow works end to end without the engine.

use crate::lobby::{Deck, GameFormat};

/// Outcome of validating a deck against a format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckValidation {
    pub is_valid: bool,
    /// Playable despite soft violations (warnings only).
    pub can_play: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl DeckValidation {
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            can_play: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Format validation as consumed by the lobby manager.
pub trait DeckValidator: Send + Sync {
    fn validate(&self, deck: &Deck, format: GameFormat) -> DeckValidation;
}

/// Size-only rules: Standard needs 60+, Commander exactly 100, Draft 40+.
pub struct FormatSizeValidator;

impl DeckValidator for FormatSizeValidator {
    fn validate(&self, deck: &Deck, format: GameFormat) -> DeckValidation {
        let count = deck.cards.len();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        match format {
            GameFormat::Standard => {
                if count < 60 {
                    errors.push(format!("standard decks need at least 60 cards, got {}", count));
                }
                if count > 100 {
                    warnings.push("decks over 100 cards are hard to shuffle".to_string());
                }
            }
            GameFormat::Commander => {
                if count != 100 {
                    errors.push(format!("commander decks must be exactly 100 cards, got {}", count));
                }
            }
            GameFormat::Draft => {
                if count < 40 {
                    errors.push(format!("draft decks need at least 40 cards, got {}", count));
                }
            }
        }

        DeckValidation {
            is_valid: errors.is_empty(),
            can_play: errors.is_empty(),
            errors,
            warnings,
        }
    }
}
