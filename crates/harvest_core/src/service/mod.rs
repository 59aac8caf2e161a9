//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Own planner sessions and their autosave lifecycle.

pub mod autosave;
pub mod planner_service;

pub use autosave::AutosaveScheduler;
pub use planner_service::{PlannerService, PlannerSession, ServiceError, ServiceResult};
