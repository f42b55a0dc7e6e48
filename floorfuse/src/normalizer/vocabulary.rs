//! Room label vocabulary
//!
//! Maps free-text labels ("MSTR BDRM", "Family Rm", "W.I.C.") onto canonical
//! [`RoomType`]s. Lookup order: whole-label phrase, multi-word phrase inside
//! the label, single tokens from the end of the label, then fuzzy token match.

use crate::types::RoomType;
use std::collections::HashMap;
use strsim::normalized_levenshtein;

const KEYWORDS: &[(RoomType, &[&str])] = &[
    (
        RoomType::Bedroom,
        &["bedroom", "bed", "master", "guest", "bdrm", "br", "nursery"],
    ),
    (
        RoomType::Bathroom,
        &["bathroom", "bath", "toilet", "wc", "shower", "powder", "ensuite", "lavatory"],
    ),
    (RoomType::Kitchen, &["kitchen", "kit", "pantry", "kitchenette"]),
    (
        RoomType::LivingRoom,
        &["living", "living room", "lounge", "family", "family room", "great room", "den", "sitting"],
    ),
    (
        RoomType::DiningRoom,
        &["dining", "dining room", "dinette", "breakfast"],
    ),
    (RoomType::Office, &["office", "study", "library", "workroom"]),
    (RoomType::Garage, &["garage", "carport"]),
    (RoomType::Laundry, &["laundry", "mud", "mudroom", "mud room"]),
    (
        RoomType::Closet,
        &["closet", "wardrobe", "wic", "walk in closet", "clo"],
    ),
    (RoomType::Storage, &["storage", "store", "shed"]),
    (RoomType::Utility, &["utility", "util"]),
    (
        RoomType::Mechanical,
        &["mechanical", "mech", "furnace", "boiler", "hvac"],
    ),
    (
        RoomType::Hallway,
        &["hall", "hallway", "corridor", "foyer", "entry", "vestibule", "landing"],
    ),
    (
        RoomType::Deck,
        &["deck", "patio", "balcony", "porch", "terrace"],
    ),
    (RoomType::Stairs, &["stairs", "stair", "stairway", "staircase"]),
];

/// Keyword table for room label classification
#[derive(Debug, Clone)]
pub struct RoomVocabulary {
    phrases: HashMap<&'static str, RoomType>,
    fuzzy_threshold: f64,
}

impl Default for RoomVocabulary {
    fn default() -> Self {
        Self::new(0.85)
    }
}

impl RoomVocabulary {
    pub fn new(fuzzy_threshold: f64) -> Self {
        let phrases = KEYWORDS
            .iter()
            .flat_map(|(room_type, words)| words.iter().map(move |w| (*w, *room_type)))
            .collect();
        Self {
            phrases,
            fuzzy_threshold,
        }
    }

    /// Classify a raw label; unknown labels map to `Unidentified`
    pub fn classify(&self, raw: &str) -> RoomType {
        let normalized = normalize_label(raw);
        if normalized.is_empty() {
            return RoomType::Unidentified;
        }

        // Underscored canonical names ("living_room") arrive as two tokens
        if let Some(room_type) = self.phrases.get(normalized.as_str()) {
            return *room_type;
        }

        let padded = format!(" {} ", normalized);
        let mut phrase_hit: Option<(&str, RoomType)> = None;
        for (phrase, room_type) in self.phrases.iter().filter(|(p, _)| p.contains(' ')) {
            if padded.contains(&format!(" {} ", phrase)) {
                // Longest phrase wins; ties resolve alphabetically for stability
                let better = match phrase_hit {
                    None => true,
                    Some((best, _)) => {
                        phrase.len() > best.len() || (phrase.len() == best.len() && *phrase < best)
                    }
                };
                if better {
                    phrase_hit = Some((phrase, *room_type));
                }
            }
        }
        if let Some((_, room_type)) = phrase_hit {
            return room_type;
        }

        // The head noun of an English room label comes last ("master bath")
        let tokens: Vec<&str> = normalized.split(' ').collect();
        for token in tokens.iter().rev() {
            if let Some(room_type) = self.phrases.get(token) {
                return *room_type;
            }
        }

        self.fuzzy_match(&tokens)
    }

    fn fuzzy_match(&self, tokens: &[&str]) -> RoomType {
        let mut best: Option<(f64, &str, RoomType)> = None;
        for token in tokens.iter().rev().filter(|t| t.len() >= 4) {
            for (keyword, room_type) in self.phrases.iter().filter(|(p, _)| !p.contains(' ')) {
                let similarity = normalized_levenshtein(token, keyword);
                if similarity < self.fuzzy_threshold {
                    continue;
                }
                let better = match best {
                    None => true,
                    Some((s, k, _)) => similarity > s || (similarity == s && *keyword < k),
                };
                if better {
                    best = Some((similarity, keyword, *room_type));
                }
            }
        }
        best.map(|(_, _, t)| t).unwrap_or(RoomType::Unidentified)
    }
}

/// Lowercase, drop abbreviation dots, blank out other symbols and digits
fn normalize_label(raw: &str) -> String {
    let cleaned: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| *c != '.' && *c != '\'')
        .map(|c| if c.is_alphabetic() { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_and_abbreviated_labels() {
        let vocab = RoomVocabulary::default();
        assert_eq!(vocab.classify("Bedroom 2"), RoomType::Bedroom);
        assert_eq!(vocab.classify("BDRM"), RoomType::Bedroom);
        assert_eq!(vocab.classify("W.C."), RoomType::Bathroom);
        assert_eq!(vocab.classify("living_room"), RoomType::LivingRoom);
        assert_eq!(vocab.classify("Great Room"), RoomType::LivingRoom);
    }

    #[test]
    fn test_head_noun_wins() {
        let vocab = RoomVocabulary::default();
        assert_eq!(vocab.classify("Master Bath"), RoomType::Bathroom);
        assert_eq!(vocab.classify("Guest Bedroom"), RoomType::Bedroom);
        assert_eq!(vocab.classify("Walk in closet"), RoomType::Closet);
    }

    #[test]
    fn test_fuzzy_match() {
        let vocab = RoomVocabulary::default();
        assert_eq!(vocab.classify("Bedrom"), RoomType::Bedroom);
        assert_eq!(vocab.classify("Kitchn"), RoomType::Kitchen);
    }

    #[test]
    fn test_unknown_label() {
        let vocab = RoomVocabulary::default();
        assert_eq!(vocab.classify("Zzyzx"), RoomType::Unidentified);
        assert_eq!(vocab.classify("12'-6\""), RoomType::Unidentified);
        assert_eq!(vocab.classify(""), RoomType::Unidentified);
    }
}
