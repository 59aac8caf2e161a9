//! Plantation aggregate root.
//!
//! # Responsibility
//! - Hold spaces, plants, strains and seed inventory as one load/save unit.
//! - Resolve id references and allocate unique plant codes.
//!
//! # Invariants
//! - Plant codes are unique across `plants`.
//! - Dangling strain ids resolve to `None`, never to an error.

use super::plant::{Plant, PlantId};
use super::space::{Space, SpaceId};
use super::strain::{Seed, Strain};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Stable plantation identifier.
pub type PlantationId = String;

/// Stable user identifier supplied by the identity collaborator.
pub type UserId = String;

/// Code prefix for plants without a strain.
pub const DEFAULT_CODE_PREFIX: &str = "P";

static PLANT_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+)-(\d+)$").expect("valid plant code regex"));

/// Mutable content of a plantation: everything that autosave writes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantationDocument {
    #[serde(default)]
    pub spaces: Vec<Space>,
    #[serde(default)]
    pub plants: Vec<Plant>,
    #[serde(default)]
    pub strains: Vec<Strain>,
    #[serde(default)]
    pub inventory: Vec<Seed>,
}

/// Aggregate root persisted by the storage collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plantation {
    pub id: PlantationId,
    pub owner_id: UserId,
    pub name: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(flatten)]
    pub document: PlantationDocument,
}

impl Plantation {
    /// Creates an empty plantation owned by `owner_id`.
    pub fn new(owner_id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            id: super::new_id(),
            owner_id: owner_id.into(),
            name: name.into(),
            is_public: false,
            document: PlantationDocument::default(),
        }
    }

    pub fn space(&self, space_id: &str) -> Option<&Space> {
        self.document.spaces.iter().find(|space| space.id == space_id)
    }

    pub fn space_mut(&mut self, space_id: &str) -> Option<&mut Space> {
        self.document
            .spaces
            .iter_mut()
            .find(|space| space.id == space_id)
    }

    pub fn plant(&self, plant_id: &str) -> Option<&Plant> {
        self.document.plants.iter().find(|plant| plant.id == plant_id)
    }

    pub fn plant_mut(&mut self, plant_id: &str) -> Option<&mut Plant> {
        self.document
            .plants
            .iter_mut()
            .find(|plant| plant.id == plant_id)
    }

    pub fn strain(&self, strain_id: &str) -> Option<&Strain> {
        self.document
            .strains
            .iter()
            .find(|strain| strain.id == strain_id)
    }

    /// Resolves the plant's strain; dangling references yield `None`.
    pub fn strain_for(&self, plant: &Plant) -> Option<&Strain> {
        plant
            .strain_id
            .as_deref()
            .and_then(|strain_id| self.strain(strain_id))
    }

    pub fn seed(&self, seed_id: &str) -> Option<&Seed> {
        self.document.inventory.iter().find(|seed| seed.id == seed_id)
    }

    /// Replaces one plant in place. Returns `false` when the id is unknown.
    pub fn replace_plant(&mut self, plant: Plant) -> bool {
        match self.plant_mut(plant.id.as_str()) {
            Some(slot) => {
                *slot = plant;
                true
            }
            None => false,
        }
    }

    /// Whether `code` is used by any plant other than `exclude`.
    pub fn is_code_taken(&self, code: &str, exclude: Option<&PlantId>) -> bool {
        self.document
            .plants
            .iter()
            .filter(|plant| Some(&plant.id) != exclude)
            .any(|plant| plant.code.eq_ignore_ascii_case(code))
    }

    /// Allocates the next `<prefix>-<n>` code for a strain.
    pub fn next_plant_code(&self, strain: Option<&Strain>) -> String {
        let prefix = strain
            .map(|strain| strain.abbreviation.trim())
            .filter(|abbreviation| !abbreviation.is_empty())
            .unwrap_or(DEFAULT_CODE_PREFIX);
        next_code_for_prefix(prefix, self.document.plants.iter().map(|p| p.code.as_str()))
    }

    /// Spaces sorted in display order (list order).
    pub fn space_ids(&self) -> Vec<SpaceId> {
        self.document
            .spaces
            .iter()
            .map(|space| space.id.clone())
            .collect()
    }
}

/// Returns `<prefix>-<max+1>` over existing codes sharing the prefix.
pub fn next_code_for_prefix<'a>(prefix: &str, existing: impl Iterator<Item = &'a str>) -> String {
    let highest = existing
        .filter_map(parse_plant_code)
        .filter(|(code_prefix, _)| code_prefix.eq_ignore_ascii_case(prefix))
        .map(|(_, number)| number)
        .max()
        .unwrap_or(0);
    format!("{prefix}-{}", highest.saturating_add(1))
}

/// Splits `OG-3` into `("OG", 3)`.
pub fn parse_plant_code(code: &str) -> Option<(&str, u32)> {
    let captures = PLANT_CODE_RE.captures(code.trim())?;
    let prefix = captures.get(1)?.as_str();
    let number = captures.get(2)?.as_str().parse::<u32>().ok()?;
    Some((prefix, number))
}

#[cfg(test)]
mod tests {
    use super::{next_code_for_prefix, parse_plant_code, Plantation};
    use crate::model::strain::Strain;

    #[test]
    fn parse_plant_code_splits_prefix_and_number() {
        assert_eq!(parse_plant_code("OG-3"), Some(("OG", 3)));
        assert_eq!(parse_plant_code("GSC-X-12"), Some(("GSC-X", 12)));
        assert_eq!(parse_plant_code("OG"), None);
        assert_eq!(parse_plant_code("OG-"), None);
    }

    #[test]
    fn next_code_increments_highest_matching_prefix() {
        let codes = ["OG-1", "OG-7", "BD-9", "og-3"];
        assert_eq!(next_code_for_prefix("OG", codes.into_iter()), "OG-8");
        assert_eq!(next_code_for_prefix("GEL", codes.into_iter()), "GEL-1");
    }

    #[test]
    fn next_plant_code_uses_default_prefix_without_strain() {
        let plantation = Plantation::new("owner", "Home");
        assert_eq!(plantation.next_plant_code(None), "P-1");

        let strain = Strain::new("OG", 30, 60);
        assert_eq!(plantation.next_plant_code(Some(&strain)), "OG-1");
    }

    #[test]
    fn plantation_serializes_document_fields_flat() {
        let plantation = Plantation::new("owner", "Home");
        let json = serde_json::to_value(&plantation).unwrap();
        assert_eq!(json["ownerId"], "owner");
        assert!(json["spaces"].as_array().unwrap().is_empty());
        assert!(json["inventory"].as_array().unwrap().is_empty());
        assert_eq!(json["isPublic"], false);
    }
}
