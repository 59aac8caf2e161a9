//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the plantation persistence contract consumed by the planner.
//! - Isolate SQLite and JSON document details from service orchestration.
//!
//! # Invariants
//! - Every document read passes through [`crate::migration::migrate_document`]
//!   before it reaches callers.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod plantation_repo;

pub use plantation_repo::{
    LoadedPlantation, PlantationPatch, PlantationRepository, PlantationSummary, RepoError,
    RepoResult, SqlitePlantationRepository,
};
