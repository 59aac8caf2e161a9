//! Plant and placement segment model.
//!
//! # Responsibility
//! - Define the plant lifecycle, footprint and per-stage overrides.
//! - Define placement segments: time-bounded `(space, cell)` assignments.
//!
//! # Invariants
//! - A canonical plant has at least one segment.
//! - Segments are chronologically ordered and non-overlapping.
//! - Only the last segment may be open (`end_date == None`).
//! - Segment intervals are half-open: `[start_date, end_date)`.

use super::space::{GridCell, SpaceId};
use super::strain::StrainId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable plant identifier.
pub type PlantId = String;

/// Stable segment identifier.
pub type SegmentId = String;

/// Lifecycle stage, strictly ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Germinating,
    Seedling,
    Vegetative,
    Flowering,
    Harvested,
}

impl Stage {
    /// Fixed lifecycle order.
    pub const ALL: [Stage; 5] = [
        Stage::Germinating,
        Stage::Seedling,
        Stage::Vegetative,
        Stage::Flowering,
        Stage::Harvested,
    ];

    /// Stages that occupy scheduled time on the timeline.
    pub const SCHEDULED: [Stage; 4] = [
        Stage::Germinating,
        Stage::Seedling,
        Stage::Vegetative,
        Stage::Flowering,
    ];

    pub fn index(self) -> usize {
        match self {
            Self::Germinating => 0,
            Self::Seedling => 1,
            Self::Vegetative => 2,
            Self::Flowering => 3,
            Self::Harvested => 4,
        }
    }

    pub fn next(self) -> Option<Stage> {
        Self::ALL.get(self.index() + 1).copied()
    }

    /// Whether the end boundary of this stage can be dragged in the time view.
    pub fn is_resizable(self) -> bool {
        matches!(self, Self::Seedling | Self::Vegetative | Self::Flowering)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Germinating => "germinating",
            Self::Seedling => "seedling",
            Self::Vegetative => "vegetative",
            Self::Flowering => "flowering",
            Self::Harvested => "harvested",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Footprint size in grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PlantSize {
    /// 1x1.
    Single,
    /// 2x1, horizontal.
    Double,
    /// 2x2.
    Quad,
}

const SINGLE_OFFSETS: &[(i32, i32)] = &[(0, 0)];
const DOUBLE_OFFSETS: &[(i32, i32)] = &[(0, 0), (1, 0)];
const QUAD_OFFSETS: &[(i32, i32)] = &[(0, 0), (1, 0), (0, 1), (1, 1)];

impl PlantSize {
    pub fn cell_count(self) -> u8 {
        match self {
            Self::Single => 1,
            Self::Double => 2,
            Self::Quad => 4,
        }
    }

    pub fn width(self) -> i32 {
        match self {
            Self::Single => 1,
            Self::Double | Self::Quad => 2,
        }
    }

    pub fn height(self) -> i32 {
        match self {
            Self::Single | Self::Double => 1,
            Self::Quad => 2,
        }
    }

    /// Cell offsets relative to the anchor (top-left) cell.
    pub fn offsets(self) -> &'static [(i32, i32)] {
        match self {
            Self::Single => SINGLE_OFFSETS,
            Self::Double => DOUBLE_OFFSETS,
            Self::Quad => QUAD_OFFSETS,
        }
    }

    /// Cells covered when anchored at `anchor`.
    pub fn footprint(self, anchor: GridCell) -> Vec<GridCell> {
        self.offsets()
            .iter()
            .map(|(dx, dy)| anchor.offset(*dx, *dy))
            .collect()
    }
}

/// Rejected footprint size value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidPlantSize(pub u8);

impl Display for InvalidPlantSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "plant size must be 1, 2 or 4 cells, got {}", self.0)
    }
}

impl Error for InvalidPlantSize {}

impl TryFrom<u8> for PlantSize {
    type Error = InvalidPlantSize;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Single),
            2 => Ok(Self::Double),
            4 => Ok(Self::Quad),
            other => Err(InvalidPlantSize(other)),
        }
    }
}

impl From<PlantSize> for u8 {
    fn from(value: PlantSize) -> Self {
        value.cell_count()
    }
}

/// Propagation origin. Tracked only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Generation {
    #[default]
    Seed,
    Clone,
}

/// Per-plant stage duration overrides, in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub germinating: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seedling: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vegetative: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flowering: Option<u32>,
}

impl StageOverrides {
    pub fn get(&self, stage: Stage) -> Option<u32> {
        match stage {
            Stage::Germinating => self.germinating,
            Stage::Seedling => self.seedling,
            Stage::Vegetative => self.vegetative,
            Stage::Flowering => self.flowering,
            Stage::Harvested => None,
        }
    }

    /// Sets one override. Harvested has no duration and is ignored.
    pub fn set(&mut self, stage: Stage, days: Option<u32>) {
        match stage {
            Stage::Germinating => self.germinating = days,
            Stage::Seedling => self.seedling = days,
            Stage::Vegetative => self.vegetative = days,
            Stage::Flowering => self.flowering = days,
            Stage::Harvested => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One contiguous placement interval of a plant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantSegment {
    pub id: SegmentId,
    /// `None` means floating: not attached to any space.
    pub space_id: Option<SpaceId>,
    pub grid_x: i32,
    pub grid_y: i32,
    /// Inclusive.
    pub start_date: NaiveDate,
    /// Exclusive; `None` extends to the plant's computed end date.
    pub end_date: Option<NaiveDate>,
}

impl PlantSegment {
    /// Creates an open segment with a generated id.
    pub fn open(space_id: Option<SpaceId>, cell: GridCell, start_date: NaiveDate) -> Self {
        Self {
            id: super::new_id(),
            space_id,
            grid_x: cell.x,
            grid_y: cell.y,
            start_date,
            end_date: None,
        }
    }

    pub fn cell(&self) -> GridCell {
        GridCell::new(self.grid_x, self.grid_y)
    }

    pub fn is_open(&self) -> bool {
        self.end_date.is_none()
    }

    /// Half-open containment test; open segments cover every later date.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && self.end_date.map_or(true, |end| date < end)
    }

    /// Whether both segments occupy the same space and anchor cell.
    pub fn same_slot(&self, other: &PlantSegment) -> bool {
        self.space_id == other.space_id && self.cell() == other.cell()
    }
}

/// Central mutable entity: one plant and its placement history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plant {
    pub id: PlantId,
    /// Short code unique across the plantation, e.g. `OG-3`.
    pub code: String,
    pub strain_id: Option<StrainId>,
    pub stage: Stage,
    pub size: PlantSize,
    #[serde(default)]
    pub generation: Generation,
    pub started_at: NaiveDate,
    pub stage_started_at: NaiveDate,
    #[serde(default, skip_serializing_if = "StageOverrides::is_empty")]
    pub stage_overrides: StageOverrides,
    pub segments: Vec<PlantSegment>,
}

/// Request for a freshly placed plant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlant {
    pub code: String,
    pub strain_id: Option<StrainId>,
    pub size: PlantSize,
    pub generation: Generation,
    pub started_at: NaiveDate,
    pub space_id: Option<SpaceId>,
    pub cell: GridCell,
}

impl Plant {
    /// Creates a germinating plant with one open segment at the placement.
    pub fn new(request: NewPlant) -> Self {
        Self {
            id: super::new_id(),
            code: request.code,
            strain_id: request.strain_id,
            stage: Stage::Germinating,
            size: request.size,
            generation: request.generation,
            started_at: request.started_at,
            stage_started_at: request.started_at,
            stage_overrides: StageOverrides::default(),
            segments: vec![PlantSegment::open(
                request.space_id,
                request.cell,
                request.started_at,
            )],
        }
    }

    pub fn segment(&self, segment_id: &str) -> Option<&PlantSegment> {
        self.segments.iter().find(|segment| segment.id == segment_id)
    }

    pub fn segment_index(&self, segment_id: &str) -> Option<usize> {
        self.segments
            .iter()
            .position(|segment| segment.id == segment_id)
    }

    /// Whether any segment of this plant references `space_id`.
    pub fn touches_space(&self, space_id: &str) -> bool {
        self.segments
            .iter()
            .any(|segment| segment.space_id.as_deref() == Some(space_id))
    }
}

#[cfg(test)]
mod tests {
    use super::{GridCell, NewPlant, Plant, PlantSegment, PlantSize, Stage, StageOverrides};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn stage_order_is_fixed() {
        assert!(Stage::Germinating < Stage::Seedling);
        assert!(Stage::Flowering < Stage::Harvested);
        assert_eq!(Stage::Vegetative.next(), Some(Stage::Flowering));
        assert_eq!(Stage::Harvested.next(), None);
    }

    #[test]
    fn only_middle_stages_are_resizable() {
        let resizable = Stage::ALL
            .iter()
            .copied()
            .filter(|stage| stage.is_resizable())
            .collect::<Vec<_>>();
        assert_eq!(
            resizable,
            vec![Stage::Seedling, Stage::Vegetative, Stage::Flowering]
        );
    }

    #[test]
    fn footprint_matches_size() {
        let anchor = GridCell::new(2, 3);
        assert_eq!(PlantSize::Single.footprint(anchor), vec![anchor]);
        assert_eq!(
            PlantSize::Double.footprint(anchor),
            vec![GridCell::new(2, 3), GridCell::new(3, 3)]
        );
        assert_eq!(PlantSize::Quad.footprint(anchor).len(), 4);
        assert!(PlantSize::Quad
            .footprint(anchor)
            .contains(&GridCell::new(3, 4)));
    }

    #[test]
    fn plant_size_serializes_as_cell_count() {
        let json = serde_json::to_value(PlantSize::Quad).unwrap();
        assert_eq!(json, serde_json::json!(4));
        let err = serde_json::from_value::<PlantSize>(serde_json::json!(3)).unwrap_err();
        assert!(err.to_string().contains("1, 2 or 4"));
    }

    #[test]
    fn overrides_ignore_harvested() {
        let mut overrides = StageOverrides::default();
        overrides.set(Stage::Harvested, Some(10));
        assert!(overrides.is_empty());
        overrides.set(Stage::Flowering, Some(63));
        assert_eq!(overrides.get(Stage::Flowering), Some(63));
    }

    #[test]
    fn segment_contains_is_half_open() {
        let mut segment = PlantSegment::open(None, GridCell::new(0, 0), date(2024, 1, 1));
        assert!(segment.contains(date(2030, 1, 1)));
        segment.end_date = Some(date(2024, 2, 1));
        assert!(segment.contains(date(2024, 1, 31)));
        assert!(!segment.contains(date(2024, 2, 1)));
        assert!(!segment.contains(date(2023, 12, 31)));
    }

    #[test]
    fn new_plant_starts_with_one_open_segment() {
        let plant = Plant::new(NewPlant {
            code: "OG-1".to_string(),
            strain_id: None,
            size: PlantSize::Single,
            generation: Default::default(),
            started_at: date(2024, 1, 1),
            space_id: Some("a".to_string()),
            cell: GridCell::new(1, 0),
        });
        assert_eq!(plant.stage, Stage::Germinating);
        assert_eq!(plant.segments.len(), 1);
        assert!(plant.segments[0].is_open());
        assert_eq!(plant.segments[0].start_date, date(2024, 1, 1));
        assert!(plant.touches_space("a"));
    }

    #[test]
    fn segment_serializes_with_wire_field_names() {
        let segment = PlantSegment {
            id: "s1".to_string(),
            space_id: None,
            grid_x: 2,
            grid_y: 3,
            start_date: date(2024, 1, 1),
            end_date: None,
        };
        let json = serde_json::to_value(&segment).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "s1",
                "spaceId": null,
                "gridX": 2,
                "gridY": 3,
                "startDate": "2024-01-01",
                "endDate": null
            })
        );
    }
}
