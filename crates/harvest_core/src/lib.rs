//! Core domain logic for the perpetual-harvest planner.
//! This crate is the single source of truth for placement and timeline
//! invariants.

pub mod access;
pub mod config;
pub mod db;
pub mod gesture;
pub mod grid;
pub mod logging;
pub mod migration;
pub mod model;
pub mod render;
pub mod repo;
pub mod segment;
pub mod service;
pub mod stage;
pub mod store;
pub mod timeline;

pub use access::AccessPolicy;
pub use config::{ConfigError, GestureConfig, PlannerConfig, TimelineConfig};
pub use gesture::{Buttons, DragMode, DragPreview, GestureController, Selection, Tool, ViewMode};
pub use logging::{default_log_level, init_logging, logging_status};
pub use migration::{migrate_document, migrate_plantation, MigrationReport};
pub use model::plant::{Plant, PlantId, PlantSegment, PlantSize, SegmentId, Stage};
pub use model::plantation::{Plantation, PlantationDocument, PlantationId, UserId};
pub use model::space::{GridCell, LightSchedule, Space, SpaceId};
pub use model::strain::{Seed, SeedId, Strain, StrainId, StrainKind};
pub use render::{DrawPrimitive, Paint};
pub use repo::{
    PlantationPatch, PlantationRepository, PlantationSummary, RepoError, RepoResult,
    SqlitePlantationRepository,
};
pub use segment::{find_overlaps, SegmentError, SegmentOverlap};
pub use service::{PlannerService, PlannerSession, ServiceError};
pub use store::{CommandError, CommandResult, PlannerEvent, PlannerStore};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
