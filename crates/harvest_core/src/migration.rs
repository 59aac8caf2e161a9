//! Load-time migration and compatibility layer.
//!
//! # Responsibility
//! - Accept stored plantation records in any historical shape.
//! - Normalize legacy single-location plants into segment lists.
//! - Normalize legacy light-schedule strings into the canonical bitmask.
//! - Self-heal plausible defects (unordered or zero-length segments, missing
//!   codes) instead of failing the load.
//!
//! # Invariants
//! - Every migration step is idempotent: `f(f(x)) == f(x)`.
//! - Synthesized segment ids are derived from the plant id, so repeated loads
//!   of the same legacy record produce the same canonical record.
//! - Output plants always have at least one segment.

use crate::model::plant::{
    Generation, Plant, PlantId, PlantSegment, PlantSize, Stage, StageOverrides,
};
use crate::model::plantation::{
    next_code_for_prefix, Plantation, PlantationDocument, PlantationId, UserId,
    DEFAULT_CODE_PREFIX,
};
use crate::model::space::{LightSchedule, Space, SpaceId};
use crate::model::strain::{Seed, Strain, StrainId};
use chrono::NaiveDate;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

const DEFAULT_SPACE_NAME: &str = "Space";

static LEGACY_LIGHT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d{1,2})\s*/\s*(\d{1,2})\s*$").expect("valid light regex"));

/// Stored plant shape: canonical or legacy single-location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantRecord {
    pub id: PlantId,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub strain_id: Option<StrainId>,
    #[serde(default = "default_stage")]
    pub stage: Stage,
    #[serde(default = "default_size")]
    pub size: PlantSize,
    #[serde(default)]
    pub generation: Generation,
    #[serde(deserialize_with = "lenient_date")]
    pub started_at: NaiveDate,
    #[serde(default, deserialize_with = "lenient_optional_date")]
    pub stage_started_at: Option<NaiveDate>,
    #[serde(default)]
    pub stage_overrides: StageOverrides,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<PlantSegment>>,
    /// Legacy single placement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_id: Option<SpaceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_y: Option<i32>,
}

fn default_stage() -> Stage {
    Stage::Germinating
}

fn default_size() -> PlantSize {
    PlantSize::Single
}

impl From<Plant> for PlantRecord {
    fn from(plant: Plant) -> Self {
        Self {
            id: plant.id,
            code: plant.code,
            strain_id: plant.strain_id,
            stage: plant.stage,
            size: plant.size,
            generation: plant.generation,
            started_at: plant.started_at,
            stage_started_at: Some(plant.stage_started_at),
            stage_overrides: plant.stage_overrides,
            segments: Some(plant.segments),
            space_id: None,
            grid_x: None,
            grid_y: None,
        }
    }
}

/// Stored space shape: canonical bitmask or legacy schedule string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceRecord {
    pub id: SpaceId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "default_dimension")]
    pub width: u32,
    #[serde(default = "default_dimension")]
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_light_schedule: Option<u32>,
    /// Legacy enum such as `"18/6"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light_schedule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

fn default_dimension() -> u32 {
    1
}

impl From<Space> for SpaceRecord {
    fn from(space: Space) -> Self {
        Self {
            id: space.id,
            name: space.name,
            x: space.x,
            y: space.y,
            width: space.width,
            height: space.height,
            custom_light_schedule: space.custom_light_schedule.map(LightSchedule::bits),
            light_schedule: None,
            color: space.color,
        }
    }
}

/// Stored document content.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    #[serde(default)]
    pub spaces: Vec<SpaceRecord>,
    #[serde(default)]
    pub plants: Vec<PlantRecord>,
    #[serde(default)]
    pub strains: Vec<Strain>,
    #[serde(default)]
    pub inventory: Vec<Seed>,
}

/// Stored plantation: metadata plus document content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantationRecord {
    pub id: PlantationId,
    pub owner_id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(flatten)]
    pub document: DocumentRecord,
}

/// Counters describing what one migration pass changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MigrationReport {
    pub legacy_plants: usize,
    pub legacy_light_schedules: usize,
    pub healed_plants: usize,
    pub assigned_codes: usize,
    pub dropped_seeds: usize,
}

impl MigrationReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// Synthesizes one open segment from the legacy placement when the record
/// has no segments. Records with segments are returned unchanged.
pub fn migrate_plant_to_segments(record: PlantRecord) -> PlantRecord {
    if record
        .segments
        .as_ref()
        .is_some_and(|segments| !segments.is_empty())
    {
        return record;
    }

    let segment = PlantSegment {
        id: legacy_segment_id(record.id.as_str()),
        space_id: record.space_id.clone(),
        grid_x: record.grid_x.unwrap_or(0),
        grid_y: record.grid_y.unwrap_or(0),
        start_date: record.started_at,
        end_date: None,
    };
    PlantRecord {
        segments: Some(vec![segment]),
        space_id: None,
        grid_x: None,
        grid_y: None,
        ..record
    }
}

/// Maps a legacy light-schedule string onto the canonical bitmask and drops
/// the legacy field. Canonical records are returned unchanged.
pub fn migrate_space_light_schedule(record: SpaceRecord) -> SpaceRecord {
    let Some(legacy) = record.light_schedule.as_deref() else {
        return record;
    };

    let canonical = match record.custom_light_schedule {
        Some(bits) => Some(bits),
        None => {
            let parsed = parse_legacy_light_schedule(legacy).map(LightSchedule::bits);
            if parsed.is_none() {
                warn!(
                    "event=light_schedule_migrate module=migration status=skipped space_id={} value={}",
                    record.id, legacy
                );
            }
            parsed
        }
    };

    SpaceRecord {
        custom_light_schedule: canonical,
        light_schedule: None,
        ..record
    }
}

/// Parses `"<on>/<off>"` schedules whose hours add up to 24.
pub fn parse_legacy_light_schedule(value: &str) -> Option<LightSchedule> {
    let captures = LEGACY_LIGHT_RE.captures(value)?;
    let on = captures.get(1)?.as_str().parse::<u32>().ok()?;
    let off = captures.get(2)?.as_str().parse::<u32>().ok()?;
    (on + off == 24).then(|| LightSchedule::lit_hours(on))
}

fn legacy_segment_id(plant_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{plant_id}:segment:0").as_bytes()).to_string()
}

/// Orders segments and repairs overlaps, open middles and zero-length
/// intervals. Returns `None` when nothing changed.
pub fn heal_segments(
    plant_id: &str,
    started_at: NaiveDate,
    segments: &[PlantSegment],
) -> Option<Vec<PlantSegment>> {
    let mut healed = segments.to_vec();
    healed.sort_by_key(|segment| segment.start_date);

    let next_starts = healed
        .iter()
        .skip(1)
        .map(|segment| segment.start_date)
        .collect::<Vec<_>>();
    for (segment, next_start) in healed.iter_mut().zip(next_starts) {
        if segment.end_date.map_or(true, |end| end > next_start) {
            segment.end_date = Some(next_start);
        }
    }
    healed.retain(|segment| segment.end_date.map_or(true, |end| end > segment.start_date));

    if healed.is_empty() {
        healed.push(PlantSegment {
            id: legacy_segment_id(plant_id),
            space_id: None,
            grid_x: 0,
            grid_y: 0,
            start_date: started_at,
            end_date: None,
        });
    }

    (healed.as_slice() != segments).then_some(healed)
}

fn canonical_space(record: SpaceRecord) -> Space {
    let record = migrate_space_light_schedule(record);
    let name = if record.name.trim().is_empty() {
        DEFAULT_SPACE_NAME.to_string()
    } else {
        record.name
    };
    Space {
        id: record.id,
        name,
        x: record.x,
        y: record.y,
        width: record.width.max(1),
        height: record.height.max(1),
        custom_light_schedule: record.custom_light_schedule.map(LightSchedule::from_bits),
        color: record.color,
    }
}

fn canonical_plant(record: PlantRecord, report: &mut MigrationReport) -> Plant {
    if record.segments.as_ref().map_or(true, |segments| segments.is_empty()) {
        report.legacy_plants += 1;
    }
    let record = migrate_plant_to_segments(record);
    let segments = record.segments.unwrap_or_default();
    let segments = match heal_segments(record.id.as_str(), record.started_at, &segments) {
        Some(healed) => {
            report.healed_plants += 1;
            healed
        }
        None => segments,
    };

    Plant {
        stage_started_at: record.stage_started_at.unwrap_or(record.started_at),
        id: record.id,
        code: record.code.trim().to_string(),
        strain_id: record.strain_id,
        stage: record.stage,
        size: record.size,
        generation: record.generation,
        started_at: record.started_at,
        stage_overrides: record.stage_overrides,
        segments,
    }
}

/// Normalizes one stored document into canonical form.
pub fn migrate_document(record: DocumentRecord) -> (PlantationDocument, MigrationReport) {
    let mut report = MigrationReport {
        legacy_light_schedules: record
            .spaces
            .iter()
            .filter(|space| space.light_schedule.is_some())
            .count(),
        ..MigrationReport::default()
    };

    let spaces = record.spaces.into_iter().map(canonical_space).collect();
    let mut plants = record
        .plants
        .into_iter()
        .map(|plant| canonical_plant(plant, &mut report))
        .collect::<Vec<_>>();
    let strains = record.strains;
    report.assigned_codes = assign_missing_codes(&mut plants, &strains);

    let before = record.inventory.len();
    let inventory = record
        .inventory
        .into_iter()
        .filter(|seed| seed.count > 0)
        .collect::<Vec<_>>();
    report.dropped_seeds = before - inventory.len();

    let document = PlantationDocument {
        spaces,
        plants,
        strains,
        inventory,
    };
    (document, report)
}

/// Normalizes a stored plantation; runs on every load.
pub fn migrate_plantation(record: PlantationRecord) -> (Plantation, MigrationReport) {
    let (document, report) = migrate_document(record.document);
    if !report.is_clean() {
        info!(
            "event=plantation_migrate module=migration status=ok plantation_id={} legacy_plants={} legacy_light_schedules={} healed_plants={} assigned_codes={} dropped_seeds={}",
            record.id,
            report.legacy_plants,
            report.legacy_light_schedules,
            report.healed_plants,
            report.assigned_codes,
            report.dropped_seeds
        );
    }
    let plantation = Plantation {
        id: record.id,
        owner_id: record.owner_id,
        name: record.name,
        is_public: record.is_public,
        document,
    };
    (plantation, report)
}

/// Gives blank or duplicate plant codes a fresh `<ABBR>-<n>` code.
fn assign_missing_codes(plants: &mut [Plant], strains: &[Strain]) -> usize {
    let mut seen = HashSet::new();
    let mut needs_code = Vec::new();
    for (index, plant) in plants.iter().enumerate() {
        if plant.code.is_empty() || !seen.insert(plant.code.to_ascii_uppercase()) {
            needs_code.push(index);
        }
    }

    for index in &needs_code {
        let prefix = plants[*index]
            .strain_id
            .as_deref()
            .and_then(|strain_id| strains.iter().find(|strain| strain.id == strain_id))
            .map(|strain| strain.abbreviation.trim().to_string())
            .filter(|abbreviation| !abbreviation.is_empty())
            .unwrap_or_else(|| DEFAULT_CODE_PREFIX.to_string());
        let code = next_code_for_prefix(prefix.as_str(), plants.iter().map(|p| p.code.as_str()));
        plants[*index].code = code;
    }
    needs_code.len()
}

fn lenient_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_lenient_date(raw.as_str()).map_err(serde::de::Error::custom)
}

fn lenient_optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.map(|value| parse_lenient_date(value.as_str()))
        .transpose()
        .map_err(serde::de::Error::custom)
}

/// Accepts `YYYY-MM-DD` or a full ISO timestamp and keeps the date part.
fn parse_lenient_date(raw: &str) -> Result<NaiveDate, String> {
    let trimmed = raw.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|err| format!("invalid date `{trimmed}`: {err}"))
}
