//! Plantation repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Store one JSON document per plantation next to its owner, name and
//!   visibility columns.
//! - Apply merge-style partial saves: only the document keys present in a
//!   patch are replaced, everything else is kept.
//!
//! # Invariants
//! - Saves are last-write-wins; there is no version check.
//! - Loaded documents are always canonical (segments present, light
//!   schedules as bitmasks).

use crate::db::DbError;
use crate::migration::{migrate_document, DocumentRecord, MigrationReport};
use crate::model::plant::Plant;
use crate::model::plantation::{Plantation, PlantationDocument, PlantationId, UserId};
use crate::model::space::Space;
use crate::model::strain::{Seed, Strain};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

const PLANTATION_SELECT_SQL: &str = "SELECT
    id,
    owner_id,
    name,
    is_public,
    document,
    updated_at
FROM plantations";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for plantation persistence.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    Json(serde_json::Error),
    NotFound(PlantationId),
    InvalidName,
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Json(err) => write!(f, "invalid plantation document: {err}"),
            Self::NotFound(id) => write!(f, "plantation not found: {id}"),
            Self::InvalidName => write!(f, "plantation name must not be blank"),
            Self::InvalidData(message) => {
                write!(f, "invalid persisted plantation data: {message}")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::NotFound(_) | Self::InvalidName | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Partial update of a stored plantation.
///
/// `None` fields are left untouched in storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlantationPatch {
    pub name: Option<String>,
    pub spaces: Option<Vec<Space>>,
    pub plants: Option<Vec<Plant>>,
    pub strains: Option<Vec<Strain>>,
    pub inventory: Option<Vec<Seed>>,
}

impl PlantationPatch {
    /// Patch replacing all four document collections.
    pub fn document(document: &PlantationDocument) -> Self {
        Self {
            name: None,
            spaces: Some(document.spaces.clone()),
            plants: Some(document.plants.clone()),
            strains: Some(document.strains.clone()),
            inventory: Some(document.inventory.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.spaces.is_none()
            && self.plants.is_none()
            && self.strains.is_none()
            && self.inventory.is_none()
    }

    fn merge_into(&self, document: &mut Map<String, Value>) -> RepoResult<()> {
        if let Some(spaces) = &self.spaces {
            document.insert("spaces".to_string(), serde_json::to_value(spaces)?);
        }
        if let Some(plants) = &self.plants {
            document.insert("plants".to_string(), serde_json::to_value(plants)?);
        }
        if let Some(strains) = &self.strains {
            document.insert("strains".to_string(), serde_json::to_value(strains)?);
        }
        if let Some(inventory) = &self.inventory {
            document.insert("inventory".to_string(), serde_json::to_value(inventory)?);
        }
        Ok(())
    }
}

/// Row of the plantation list view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlantationSummary {
    pub id: PlantationId,
    pub owner_id: UserId,
    pub name: String,
    pub is_public: bool,
    /// Update timestamp in epoch milliseconds.
    pub updated_at: i64,
}

/// Canonical plantation plus what the load-time migration repaired.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedPlantation {
    pub plantation: Plantation,
    pub report: MigrationReport,
}

/// Repository interface for plantation persistence.
pub trait PlantationRepository {
    /// Creates an empty plantation owned by `owner_id`.
    fn create(&self, owner_id: &str, name: &str) -> RepoResult<Plantation>;
    /// Loads and migrates one plantation; `NotFound` when missing.
    fn load(&self, id: &str) -> RepoResult<LoadedPlantation>;
    /// Merges `patch` into the stored plantation.
    fn save(&self, id: &str, patch: &PlantationPatch) -> RepoResult<()>;
    fn delete(&self, id: &str) -> RepoResult<()>;
    fn set_visibility(&self, id: &str, is_public: bool) -> RepoResult<()>;
    /// Plantations of one owner, most recently updated first.
    fn list_for_owner(&self, owner_id: &str) -> RepoResult<Vec<PlantationSummary>>;
}

/// SQLite-backed plantation repository.
pub struct SqlitePlantationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePlantationRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn stored_document(&self, id: &str) -> RepoResult<Map<String, Value>> {
        let raw = self
            .conn
            .query_row(
                "SELECT document FROM plantations WHERE id = ?1;",
                params![id],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .ok_or_else(|| RepoError::NotFound(id.to_string()))?;
        parse_document_object(&raw)
    }
}

impl PlantationRepository for SqlitePlantationRepository<'_> {
    fn create(&self, owner_id: &str, name: &str) -> RepoResult<Plantation> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RepoError::InvalidName);
        }

        let plantation = Plantation::new(owner_id, name);
        let document = serde_json::to_string(&plantation.document)?;

        self.conn.execute(
            "INSERT INTO plantations (id, owner_id, name, is_public, document)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                plantation.id.as_str(),
                plantation.owner_id.as_str(),
                plantation.name.as_str(),
                bool_to_int(plantation.is_public),
                document,
            ],
        )?;

        Ok(plantation)
    }

    fn load(&self, id: &str) -> RepoResult<LoadedPlantation> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PLANTATION_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query(params![id])?;
        let Some(row) = rows.next()? else {
            return Err(RepoError::NotFound(id.to_string()));
        };

        let summary = parse_summary_row(row)?;
        let raw_document: String = row.get(4)?;
        let record: DocumentRecord = serde_json::from_str(&raw_document)?;
        let (document, report) = migrate_document(record);

        Ok(LoadedPlantation {
            plantation: Plantation {
                id: summary.id,
                owner_id: summary.owner_id,
                name: summary.name,
                is_public: summary.is_public,
                document,
            },
            report,
        })
    }

    fn save(&self, id: &str, patch: &PlantationPatch) -> RepoResult<()> {
        let mut document = self.stored_document(id)?;
        patch.merge_into(&mut document)?;

        let name = match &patch.name {
            Some(name) if name.trim().is_empty() => return Err(RepoError::InvalidName),
            Some(name) => Some(name.trim()),
            None => None,
        };

        let changed = self.conn.execute(
            "UPDATE plantations
             SET
                name = COALESCE(?1, name),
                document = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?3;",
            params![name, Value::Object(document).to_string(), id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }

        Ok(())
    }

    fn delete(&self, id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM plantations WHERE id = ?1;", params![id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn set_visibility(&self, id: &str, is_public: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE plantations
             SET
                is_public = ?1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?2;",
            params![bool_to_int(is_public), id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn list_for_owner(&self, owner_id: &str) -> RepoResult<Vec<PlantationSummary>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PLANTATION_SELECT_SQL}
             WHERE owner_id = ?1
             ORDER BY updated_at DESC, name ASC;"
        ))?;
        let mut rows = stmt.query(params![owner_id])?;

        let mut summaries = Vec::new();
        while let Some(row) = rows.next()? {
            summaries.push(parse_summary_row(row)?);
        }
        Ok(summaries)
    }
}

fn parse_summary_row(row: &Row<'_>) -> RepoResult<PlantationSummary> {
    Ok(PlantationSummary {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        is_public: int_to_bool(row.get::<_, i64>(3)?)?,
        updated_at: row.get(5)?,
    })
}

fn parse_document_object(raw: &str) -> RepoResult<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(RepoError::InvalidData(format!(
            "document must be a JSON object, found {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

fn int_to_bool(value: i64) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid is_public value: {other}"
        ))),
    }
}
