//! Cards and Deck Construction

use std::collections::BTreeSet;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::rng::DeterministicRng;

/// Position index of a card in the deck.
pub type CardId = usize;

/// A single card on the board.
///
/// A card is never `matched` while face-down.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Stable position index.
    pub id: CardId,
    /// Symbol shared with exactly one other card.
    pub symbol: String,
    /// Face is currently shown.
    pub face_up: bool,
    /// Pair has been found.
    pub matched: bool,
}

impl Card {
    /// True if the card may be flipped by the player.
    pub fn is_selectable(&self) -> bool {
        !self.face_up && !self.matched
    }
}

/// Deck construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeckError {
    /// No symbols supplied.
    #[error("deck needs at least one symbol")]
    Empty,
    /// The same symbol was supplied twice.
    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

/// Build a shuffled deck holding two cards per symbol.
///
/// Card ids are assigned after shuffling, so `deck[i].id == i`.
pub fn build_deck<S: AsRef<str>>(
    symbols: &[S],
    rng: &mut DeterministicRng,
) -> Result<Vec<Card>, DeckError> {
    if symbols.is_empty() {
        return Err(DeckError::Empty);
    }

    let mut seen = BTreeSet::new();
    for symbol in symbols {
        let symbol = symbol.as_ref();
        if !seen.insert(symbol) {
            return Err(DeckError::DuplicateSymbol(symbol.to_string()));
        }
    }

    let mut faces: Vec<&str> = symbols
        .iter()
        .flat_map(|s| [s.as_ref(), s.as_ref()])
        .collect();
    rng.shuffle(&mut faces);

    Ok(faces
        .into_iter()
        .enumerate()
        .map(|(id, symbol)| Card {
            id,
            symbol: symbol.to_string(),
            face_up: false,
            matched: false,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use proptest::prelude::*;

    #[test]
    fn test_deck_has_two_of_each() {
        let mut rng = DeterministicRng::new(42);
        let deck = build_deck(&["cat", "dog", "sun"], &mut rng).unwrap();

        assert_eq!(deck.len(), 6);
        for symbol in ["cat", "dog", "sun"] {
            assert_eq!(deck.iter().filter(|c| c.symbol == symbol).count(), 2);
        }
    }

    #[test]
    fn test_ids_are_positions() {
        let mut rng = DeterministicRng::new(7);
        let deck = build_deck(&["a", "b", "c", "d"], &mut rng).unwrap();

        for (i, card) in deck.iter().enumerate() {
            assert_eq!(card.id, i);
            assert!(card.is_selectable());
        }
    }

    #[test]
    fn test_same_seed_same_layout() {
        let symbols = ["apple", "pear", "plum", "fig"];
        let a = build_deck(&symbols, &mut DeterministicRng::new(99)).unwrap();
        let b = build_deck(&symbols, &mut DeterministicRng::new(99)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_rejected() {
        let symbols: [&str; 0] = [];
        let result = build_deck(&symbols, &mut DeterministicRng::new(1));
        assert_eq!(result, Err(DeckError::Empty));
    }

    #[test]
    fn test_duplicate_rejected() {
        let result = build_deck(&["a", "b", "a"], &mut DeterministicRng::new(1));
        assert_eq!(result, Err(DeckError::DuplicateSymbol("a".to_string())));
    }

    proptest! {
        #[test]
        fn prop_grouping_recovers_symbols(
            seed: u64,
            symbols in proptest::collection::btree_set("[a-z]{1,6}", 1..20),
        ) {
            let symbols: Vec<String> = symbols.into_iter().collect();
            let deck = build_deck(&symbols, &mut DeterministicRng::new(seed)).unwrap();

            prop_assert_eq!(deck.len(), symbols.len() * 2);

            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for card in &deck {
                *counts.entry(card.symbol.as_str()).or_default() += 1;
            }
            prop_assert_eq!(counts.len(), symbols.len());
            prop_assert!(counts.values().all(|&n| n == 2));
        }
    }
}
