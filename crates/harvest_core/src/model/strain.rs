//! Strain templates and seed inventory.
//!
//! # Responsibility
//! - Define cultivar templates that drive default stage durations.
//! - Track not-yet-placed propagation units per strain.
//!
//! # Invariants
//! - Only vegetative and flowering durations are strain-customizable.
//! - A seed record with `count == 0` is removed, never stored.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Stable strain identifier.
pub type StrainId = String;

/// Stable seed inventory identifier.
pub type SeedId = String;

const MAX_ABBREVIATION_CHARS: usize = 4;
const SINGLE_WORD_ABBREVIATION_CHARS: usize = 3;
const FALLBACK_ABBREVIATION: &str = "P";

static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9]+").expect("valid word regex"));

/// Photoperiod classification for a strain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrainKind {
    Photoperiod,
    Autoflower,
}

/// Cultivar template referenced by plants and seeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strain {
    pub id: StrainId,
    pub name: String,
    pub abbreviation: String,
    pub veg_days: u32,
    pub flower_days: u32,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<StrainKind>,
}

impl Strain {
    /// Creates a strain with a derived abbreviation.
    pub fn new(name: impl Into<String>, veg_days: u32, flower_days: u32) -> Self {
        let name = name.into();
        let abbreviation = derive_abbreviation(name.as_str());
        Self {
            id: super::new_id(),
            name,
            abbreviation,
            veg_days,
            flower_days,
            kind: None,
        }
    }
}

/// Derives a short uppercase abbreviation from a strain name.
///
/// Multi-word names use word initials (`"Blue Dream"` -> `BD`); single words
/// use their leading characters (`"Gelato"` -> `GEL`).
pub fn derive_abbreviation(name: &str) -> String {
    let words = WORD_RE
        .find_iter(name)
        .map(|m| m.as_str())
        .collect::<Vec<_>>();

    let abbreviation = match words.as_slice() {
        [] => String::new(),
        [single] => single.chars().take(SINGLE_WORD_ABBREVIATION_CHARS).collect(),
        many => many
            .iter()
            .filter_map(|word| word.chars().next())
            .take(MAX_ABBREVIATION_CHARS)
            .collect(),
    };

    if abbreviation.is_empty() {
        FALLBACK_ABBREVIATION.to_string()
    } else {
        abbreviation.to_uppercase()
    }
}

/// Not-yet-placed propagation units of one strain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seed {
    pub id: SeedId,
    pub strain_id: StrainId,
    pub count: u32,
    #[serde(default)]
    pub is_clone: bool,
}

impl Seed {
    pub fn new(strain_id: impl Into<StrainId>, count: u32, is_clone: bool) -> Self {
        Self {
            id: super::new_id(),
            strain_id: strain_id.into(),
            count,
            is_clone,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{derive_abbreviation, Strain};

    #[test]
    fn abbreviation_uses_initials_for_multi_word_names() {
        assert_eq!(derive_abbreviation("Blue Dream"), "BD");
        assert_eq!(derive_abbreviation("og kush #1"), "OK1");
        assert_eq!(derive_abbreviation("Gorilla Glue Number Four Five"), "GGNF");
    }

    #[test]
    fn abbreviation_truncates_single_words() {
        assert_eq!(derive_abbreviation("Gelato"), "GEL");
        assert_eq!(derive_abbreviation("OG"), "OG");
    }

    #[test]
    fn abbreviation_falls_back_for_symbol_only_names() {
        assert_eq!(derive_abbreviation("  --  "), "P");
    }

    #[test]
    fn new_strain_derives_abbreviation() {
        let strain = Strain::new("Northern Lights", 30, 56);
        assert_eq!(strain.abbreviation, "NL");
        assert_eq!(strain.kind, None);
    }
}
