//! Canonical domain model for the harvest planner.
//!
//! # Responsibility
//! - Define the data structures shared by grid, timeline, gesture and store code.
//! - Keep the persisted JSON shape (camelCase, ISO dates) in one place.
//!
//! # Invariants
//! - Every entity is identified by a stable string id.
//! - Plants reference strains and spaces by id only; nothing is embedded.
//! - Core code only ever sees canonical records; legacy shapes are handled by
//!   `crate::migration` before they reach these types.

pub mod plant;
pub mod plantation;
pub mod space;
pub mod strain;

use uuid::Uuid;

/// Generates a fresh random entity id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
