//! Plantation use-case service and planner sessions.
//!
//! # Responsibility
//! - Open planner sessions from persisted plantations, with access policy
//!   and configuration applied.
//! - Persist session changes through a debounced autosave driven by
//!   explicit `tick(now)` calls.
//! - Gate owner-only plantation operations (delete, visibility).
//!
//! # Invariants
//! - A store only exists for a fully loaded and migrated plantation.
//! - View-only sessions never write.
//! - Autosave failures are logged and never roll back the local state;
//!   the next change schedules another attempt.

use crate::access::AccessPolicy;
use crate::config::PlannerConfig;
use crate::migration::MigrationReport;
use crate::model::plantation::{Plantation, PlantationId};
use crate::repo::{PlantationPatch, PlantationRepository, PlantationSummary, RepoError};
use crate::service::autosave::AutosaveScheduler;
use crate::store::PlannerStore;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Service error for plantation use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Target plantation does not exist; hosts route back to the list view.
    PlantationNotFound(PlantationId),
    /// Caller does not own the plantation.
    Forbidden(PlantationId),
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PlantationNotFound(id) => write!(f, "plantation not found: {id}"),
            Self::Forbidden(id) => write!(f, "not allowed to modify plantation {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::PlantationNotFound(id),
            other => Self::Repo(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// One open plantation: the store plus its save bookkeeping.
#[derive(Debug)]
pub struct PlannerSession {
    store: PlannerStore,
    autosave: AutosaveScheduler,
    migration: MigrationReport,
    observed_revision: u64,
    saved_revision: u64,
    /// Load-time repairs not yet written back.
    repaired_unsaved: bool,
}

impl PlannerSession {
    pub fn store(&self) -> &PlannerStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut PlannerStore {
        &mut self.store
    }

    pub fn plantation_id(&self) -> &str {
        &self.store.plantation().id
    }

    /// What the load-time migration repaired.
    pub fn migration_report(&self) -> MigrationReport {
        self.migration
    }

    /// Whether local changes are not yet persisted.
    pub fn is_dirty(&self) -> bool {
        self.store.can_edit()
            && (self.repaired_unsaved || self.store.revision() != self.saved_revision)
    }

    pub fn autosave_pending(&self) -> bool {
        self.autosave.is_pending()
    }

    /// Restarts the debounce window when the store changed since last seen.
    fn observe_changes(&mut self, now: Instant) {
        let revision = self.store.revision();
        if revision != self.observed_revision {
            self.observed_revision = revision;
            self.autosave.mark_dirty(now);
        } else if self.repaired_unsaved && !self.autosave.is_pending() {
            self.autosave.mark_dirty(now);
        }
    }
}

/// Plantation service facade over repository implementations.
pub struct PlannerService<R: PlantationRepository> {
    repo: R,
}

impl<R: PlantationRepository> PlannerService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn create_plantation(&self, owner_id: &str, name: &str) -> ServiceResult<Plantation> {
        let plantation = self.repo.create(owner_id, name)?;
        info!(
            "event=plantation_create module=service status=ok plantation_id={}",
            plantation.id
        );
        Ok(plantation)
    }

    pub fn list_plantations(&self, owner_id: &str) -> ServiceResult<Vec<PlantationSummary>> {
        self.repo.list_for_owner(owner_id).map_err(Into::into)
    }

    /// Loads, migrates and wraps a plantation in a planner session.
    pub fn open_session(
        &self,
        plantation_id: &str,
        current_user: Option<&str>,
        view_only: bool,
        config: PlannerConfig,
    ) -> ServiceResult<PlannerSession> {
        let loaded = match self.repo.load(plantation_id) {
            Ok(loaded) => loaded,
            Err(err) => {
                warn!(
                    "event=session_open module=service status=error plantation_id={} error={}",
                    plantation_id, err
                );
                return Err(err.into());
            }
        };

        let access = AccessPolicy::for_plantation(&loaded.plantation, current_user, view_only);
        let editable = access.can_edit();
        let config = config.normalized();
        let autosave = AutosaveScheduler::new(config.autosave_debounce());
        let store = PlannerStore::new(loaded.plantation, access, config);
        info!(
            "event=session_open module=service status=ok plantation_id={} editable={} repaired={}",
            plantation_id,
            editable,
            !loaded.report.is_clean()
        );

        Ok(PlannerSession {
            observed_revision: store.revision(),
            saved_revision: store.revision(),
            repaired_unsaved: editable && !loaded.report.is_clean(),
            store,
            autosave,
            migration: loaded.report,
        })
    }

    /// Deletes a plantation owned by `current_user`.
    pub fn delete_plantation(&self, plantation_id: &str, current_user: &str) -> ServiceResult<()> {
        self.ensure_owner(plantation_id, current_user)?;
        self.repo.delete(plantation_id)?;
        info!(
            "event=plantation_delete module=service status=ok plantation_id={}",
            plantation_id
        );
        Ok(())
    }

    pub fn set_visibility(
        &self,
        plantation_id: &str,
        current_user: &str,
        is_public: bool,
    ) -> ServiceResult<()> {
        self.ensure_owner(plantation_id, current_user)?;
        self.repo
            .set_visibility(plantation_id, is_public)
            .map_err(Into::into)
    }

    /// Drives autosave. Returns `true` when a save happened.
    ///
    /// Save failures are logged, not returned.
    pub fn tick(&self, session: &mut PlannerSession, now: Instant) -> bool {
        if !session.store.can_edit() {
            return false;
        }
        session.observe_changes(now);
        if !session.autosave.poll(now) {
            return false;
        }
        match self.save_session(session) {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    "event=autosave module=service status=error plantation_id={} revision={} error={}",
                    session.plantation_id(),
                    session.store.revision(),
                    err
                );
                false
            }
        }
    }

    /// Saves pending changes immediately, e.g. before closing a session.
    pub fn flush(&self, session: &mut PlannerSession) -> ServiceResult<bool> {
        if !session.is_dirty() {
            return Ok(false);
        }
        session.autosave.clear();
        session.observed_revision = session.store.revision();
        self.save_session(session)?;
        Ok(true)
    }

    fn save_session(&self, session: &mut PlannerSession) -> ServiceResult<()> {
        let revision = session.store.revision();
        let patch = PlantationPatch::document(session.store.document());
        self.repo.save(session.plantation_id(), &patch)?;
        session.saved_revision = revision;
        session.repaired_unsaved = false;
        info!(
            "event=autosave module=service status=ok plantation_id={} revision={}",
            session.plantation_id(),
            revision
        );
        Ok(())
    }

    fn ensure_owner(&self, plantation_id: &str, current_user: &str) -> ServiceResult<()> {
        let owner_id = self.repo.load(plantation_id)?.plantation.owner_id;
        if owner_id != current_user {
            warn!(
                "event=owner_check module=service status=denied plantation_id={}",
                plantation_id
            );
            return Err(ServiceError::Forbidden(plantation_id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{PlannerService, ServiceError};
    use crate::config::PlannerConfig;
    use crate::db::open_db_in_memory;
    use crate::repo::{PlantationRepository, SqlitePlantationRepository};
    use std::time::{Duration, Instant};

    #[test]
    fn tick_saves_after_debounce_and_reload_sees_changes() {
        let conn = open_db_in_memory().unwrap();
        let service = PlannerService::new(SqlitePlantationRepository::new(&conn));
        let plantation = service.create_plantation("u1", "Garden").unwrap();
        let mut session = service
            .open_session(&plantation.id, Some("u1"), false, PlannerConfig::default())
            .unwrap();

        let start = Instant::now();
        assert!(!service.tick(&mut session, start));
        session
            .store_mut()
            .add_space("Tent", 0.0, 0.0, 2, 2)
            .unwrap();
        assert!(session.is_dirty());
        assert!(!service.tick(&mut session, start));
        assert!(!service.tick(&mut session, start + Duration::from_millis(1_000)));
        assert!(service.tick(&mut session, start + Duration::from_millis(1_600)));
        assert!(!session.is_dirty());

        let reloaded = SqlitePlantationRepository::new(&conn)
            .load(&plantation.id)
            .unwrap();
        assert_eq!(reloaded.plantation.document.spaces.len(), 1);
    }

    #[test]
    fn view_only_sessions_never_save() {
        let conn = open_db_in_memory().unwrap();
        let service = PlannerService::new(SqlitePlantationRepository::new(&conn));
        let plantation = service.create_plantation("u1", "Garden").unwrap();
        let mut session = service
            .open_session(&plantation.id, Some("u2"), false, PlannerConfig::default())
            .unwrap();

        assert!(!session.store().can_edit());
        assert!(session.store_mut().add_space("Tent", 0.0, 0.0, 1, 1).is_err());
        assert!(!service.tick(&mut session, Instant::now() + Duration::from_secs(60)));
        assert!(!service.flush(&mut session).unwrap());
    }

    #[test]
    fn failed_save_keeps_local_state() {
        let conn = open_db_in_memory().unwrap();
        let service = PlannerService::new(SqlitePlantationRepository::new(&conn));
        let plantation = service.create_plantation("u1", "Garden").unwrap();
        let mut session = service
            .open_session(&plantation.id, Some("u1"), false, PlannerConfig::default())
            .unwrap();
        service.delete_plantation(&plantation.id, "u1").unwrap();

        let start = Instant::now();
        session
            .store_mut()
            .add_space("Tent", 0.0, 0.0, 1, 1)
            .unwrap();
        assert!(!service.tick(&mut session, start));
        assert!(!service.tick(&mut session, start + Duration::from_secs(2)));
        assert_eq!(session.store().document().spaces.len(), 1);
        assert!(session.is_dirty());
    }

    #[test]
    fn only_owner_may_delete_or_publish() {
        let conn = open_db_in_memory().unwrap();
        let service = PlannerService::new(SqlitePlantationRepository::new(&conn));
        let plantation = service.create_plantation("u1", "Garden").unwrap();

        assert!(matches!(
            service.set_visibility(&plantation.id, "u2", true),
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.delete_plantation(&plantation.id, "u2"),
            Err(ServiceError::Forbidden(_))
        ));
        service.set_visibility(&plantation.id, "u1", true).unwrap();
        service.delete_plantation(&plantation.id, "u1").unwrap();
        assert!(matches!(
            service.open_session(&plantation.id, Some("u1"), false, PlannerConfig::default()),
            Err(ServiceError::PlantationNotFound(_))
        ));
    }
}
