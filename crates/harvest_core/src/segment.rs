//! Segment model operations.
//!
//! # Responsibility
//! - Resolve which placement segment is current on a date.
//! - Split, merge, relocate and shift segments as pure plant -> plant'
//!   transformations.
//! - Report advisory placement conflicts between plants.
//!
//! # Invariants
//! - Every operation leaves its input untouched and either returns a new plant
//!   or a validation error.
//! - Returned plants keep segments ordered, non-overlapping, with at most the
//!   last one open.
//! - Splitting never relocates; relocation is a separate move.
//! - Overlaps are reported, never prevented.

use crate::grid::can_place;
use crate::model::new_id;
use crate::model::plant::{Plant, PlantId, PlantSegment, SegmentId, Stage};
use crate::model::plantation::PlantationDocument;
use crate::model::space::{GridCell, Space, SpaceId};
use crate::model::strain::Strain;
use crate::stage::{clamp_stage_days, plant_end_date};
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Validation errors for segment operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentError {
    /// Plant has no segments at all.
    NoSegments(PlantId),
    SegmentNotFound(SegmentId),
    /// Split date is not strictly inside the segment.
    InvalidSplitDate { segment_id: SegmentId, at: NaiveDate },
    /// Merge target is the last segment.
    NoFollowingSegment(SegmentId),
    /// Merge candidates do not share a boundary date.
    NotAdjacent { first: SegmentId, second: SegmentId },
    /// Merge candidates occupy different slots (a genuine move).
    DifferentSlots { first: SegmentId, second: SegmentId },
    /// Target footprint is out of bounds or occupied.
    PlacementBlocked { space_id: SpaceId, cell: GridCell },
    /// Shift would overflow the calendar.
    InvalidShift { days: i64 },
    StageNotResizable(Stage),
    /// Stored segments break ordering invariants.
    InvalidOrdering { segment_id: SegmentId, reason: &'static str },
}

impl Display for SegmentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSegments(plant_id) => write!(f, "plant has no segments: {plant_id}"),
            Self::SegmentNotFound(id) => write!(f, "segment not found: {id}"),
            Self::InvalidSplitDate { segment_id, at } => write!(
                f,
                "split date {at} is not strictly inside segment {segment_id}"
            ),
            Self::NoFollowingSegment(id) => {
                write!(f, "segment {id} has no following segment to merge")
            }
            Self::NotAdjacent { first, second } => {
                write!(f, "segments {first} and {second} are not adjacent")
            }
            Self::DifferentSlots { first, second } => write!(
                f,
                "segments {first} and {second} occupy different slots and cannot merge"
            ),
            Self::PlacementBlocked { space_id, cell } => write!(
                f,
                "cell ({}, {}) in space {space_id} is occupied or out of bounds",
                cell.x, cell.y
            ),
            Self::InvalidShift { days } => write!(f, "cannot shift plant by {days} days"),
            Self::StageNotResizable(stage) => write!(f, "stage `{stage}` cannot be resized"),
            Self::InvalidOrdering { segment_id, reason } => {
                write!(f, "segment {segment_id} is invalid: {reason}")
            }
        }
    }
}

impl Error for SegmentError {}

pub type SegmentResult<T> = Result<T, SegmentError>;

/// Index of the segment covering `as_of`.
///
/// Scans newest to oldest; when nothing contains the date the last segment
/// is used, so an open tail covers every future date.
pub fn current_segment_index(plant: &Plant, as_of: NaiveDate) -> Option<usize> {
    if plant.segments.is_empty() {
        return None;
    }
    let found = plant
        .segments
        .iter()
        .rposition(|segment| segment.contains(as_of));
    Some(found.unwrap_or(plant.segments.len() - 1))
}

/// Segment covering `as_of`; `None` only for a plant without segments.
pub fn current_segment(plant: &Plant, as_of: NaiveDate) -> Option<&PlantSegment> {
    current_segment_index(plant, as_of).map(|index| &plant.segments[index])
}

/// Resolved exclusive end of a segment; open ends use the plant end date.
pub fn segment_end_date(
    segment: &PlantSegment,
    plant: &Plant,
    strain: Option<&Strain>,
) -> NaiveDate {
    segment
        .end_date
        .unwrap_or_else(|| plant_end_date(plant, strain).max(segment.start_date))
}

/// Checks ordering invariants of a plant's segment list.
pub fn validate_segments(plant: &Plant) -> SegmentResult<()> {
    let Some(last_index) = plant.segments.len().checked_sub(1) else {
        return Err(SegmentError::NoSegments(plant.id.clone()));
    };
    for (index, segment) in plant.segments.iter().enumerate() {
        match segment.end_date {
            Some(end) if end <= segment.start_date => {
                return Err(invalid(segment, "end date must be after start date"));
            }
            None if index != last_index => {
                return Err(invalid(segment, "only the last segment may be open"));
            }
            _ => {}
        }
        if let Some(next) = plant.segments.get(index + 1) {
            if segment.end_date.map_or(true, |end| end > next.start_date) {
                return Err(invalid(next, "segment overlaps its predecessor"));
            }
        }
    }
    Ok(())
}

fn invalid(segment: &PlantSegment, reason: &'static str) -> SegmentError {
    SegmentError::InvalidOrdering {
        segment_id: segment.id.clone(),
        reason,
    }
}

fn find_index(plant: &Plant, segment_id: &str) -> SegmentResult<usize> {
    plant
        .segment_index(segment_id)
        .ok_or_else(|| SegmentError::SegmentNotFound(segment_id.to_string()))
}

/// Splits one segment at `at`, keeping slot and open/closed state.
///
/// The earlier half keeps the original id; the later half gets a new id.
pub fn split_segment(plant: &Plant, segment_id: &str, at: NaiveDate) -> SegmentResult<Plant> {
    let index = find_index(plant, segment_id)?;
    let original = &plant.segments[index];
    let strictly_inside =
        at > original.start_date && original.end_date.map_or(true, |end| at < end);
    if !strictly_inside {
        return Err(SegmentError::InvalidSplitDate {
            segment_id: segment_id.to_string(),
            at,
        });
    }

    let mut head = original.clone();
    head.end_date = Some(at);
    let tail = PlantSegment {
        id: new_id(),
        space_id: original.space_id.clone(),
        grid_x: original.grid_x,
        grid_y: original.grid_y,
        start_date: at,
        end_date: original.end_date,
    };

    let mut next = plant.clone();
    next.segments[index] = head;
    next.segments.insert(index + 1, tail);
    Ok(next)
}

/// Merges `segment_id` with the segment after it when both share a slot.
pub fn merge_segments(plant: &Plant, segment_id: &str) -> SegmentResult<Plant> {
    let index = find_index(plant, segment_id)?;
    let first = &plant.segments[index];
    let second = plant
        .segments
        .get(index + 1)
        .ok_or_else(|| SegmentError::NoFollowingSegment(segment_id.to_string()))?;

    if first.end_date != Some(second.start_date) {
        return Err(SegmentError::NotAdjacent {
            first: first.id.clone(),
            second: second.id.clone(),
        });
    }
    if !first.same_slot(second) {
        return Err(SegmentError::DifferentSlots {
            first: first.id.clone(),
            second: second.id.clone(),
        });
    }

    let mut next = plant.clone();
    next.segments[index].end_date = second.end_date;
    next.segments.remove(index + 1);
    Ok(next)
}

/// Whether `segment_id` can be merged with its successor.
pub fn can_merge(plant: &Plant, segment_id: &str) -> bool {
    merge_segments(plant, segment_id).is_ok()
}

/// Rewrites one segment's slot after checking the target footprint.
///
/// Occupancy is evaluated on the segment's start date, excluding this plant.
pub fn move_segment_to_slot(
    plant: &Plant,
    segment_id: &str,
    target: &Space,
    cell: GridCell,
    plants: &[Plant],
) -> SegmentResult<Plant> {
    let index = find_index(plant, segment_id)?;
    let as_of = plant.segments[index].start_date;
    if !can_place(target, cell, plant.size, plants, Some(plant.id.as_str()), as_of) {
        return Err(SegmentError::PlacementBlocked {
            space_id: target.id.clone(),
            cell,
        });
    }

    let mut next = plant.clone();
    let segment = &mut next.segments[index];
    segment.space_id = Some(target.id.clone());
    segment.grid_x = cell.x;
    segment.grid_y = cell.y;
    Ok(next)
}

/// Moves the plant to a new slot starting on `as_of`.
///
/// When the current segment started before `as_of` it is split there and only
/// the later half moves, recording the relocation in the timeline.
pub fn relocate_plant_at(
    plant: &Plant,
    as_of: NaiveDate,
    target: &Space,
    cell: GridCell,
    plants: &[Plant],
) -> SegmentResult<Plant> {
    let index = current_segment_index(plant, as_of)
        .ok_or_else(|| SegmentError::NoSegments(plant.id.clone()))?;
    let current = &plant.segments[index];
    if current.space_id.as_deref() == Some(target.id.as_str()) && current.cell() == cell {
        return Ok(plant.clone());
    }

    if current.start_date < as_of && current.contains(as_of) {
        let split = split_segment(plant, current.id.as_str(), as_of)?;
        let tail_id = split.segments[index + 1].id.clone();
        return move_segment_to_slot(&split, tail_id.as_str(), target, cell, plants);
    }
    move_segment_to_slot(plant, current.id.as_str(), target, cell, plants)
}

/// Shifts the start and every segment bound by `delta_days`.
pub fn shift_plant_start(plant: &Plant, delta_days: i64) -> SegmentResult<Plant> {
    let shift = |date: NaiveDate| -> SegmentResult<NaiveDate> {
        Duration::try_days(delta_days)
            .and_then(|delta| date.checked_add_signed(delta))
            .ok_or(SegmentError::InvalidShift { days: delta_days })
    };

    let mut next = plant.clone();
    next.started_at = shift(plant.started_at)?;
    next.stage_started_at = shift(plant.stage_started_at)?;
    for segment in &mut next.segments {
        segment.start_date = shift(segment.start_date)?;
        segment.end_date = segment.end_date.map(shift).transpose()?;
    }
    validate_segments(&next)?;
    Ok(next)
}

/// Sets a stage duration override, clamped to the minimum stage length.
pub fn resize_stage(plant: &Plant, stage: Stage, new_duration_days: u32) -> SegmentResult<Plant> {
    if !stage.is_resizable() {
        return Err(SegmentError::StageNotResizable(stage));
    }
    let mut next = plant.clone();
    next.stage_overrides
        .set(stage, Some(clamp_stage_days(new_duration_days)));
    Ok(next)
}

/// Reference to one segment of one plant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SegmentRef {
    pub plant_id: PlantId,
    pub segment_id: SegmentId,
}

/// Advisory conflict between two plants sharing a slot at the same time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentOverlap {
    pub first: SegmentRef,
    pub second: SegmentRef,
    pub space_id: SpaceId,
    /// Shared footprint cells, in grid order; never empty.
    pub cells: Vec<GridCell>,
    pub start: NaiveDate,
    /// Exclusive; open segments end at their plant's lifecycle end.
    pub end: NaiveDate,
}

struct PlacedInterval<'a> {
    plant: &'a Plant,
    segment: &'a PlantSegment,
    end: NaiveDate,
}

/// Reports every pair of segments of different plants whose footprints
/// share a cell of the same space while their resolved date ranges
/// intersect. Each segment pair is reported once.
pub fn find_overlaps(document: &PlantationDocument) -> Vec<SegmentOverlap> {
    let mut by_slot: BTreeMap<(&str, GridCell), Vec<PlacedInterval<'_>>> = BTreeMap::new();
    for plant in &document.plants {
        let strain = plant
            .strain_id
            .as_deref()
            .and_then(|id| document.strains.iter().find(|strain| strain.id == id));
        for segment in &plant.segments {
            let Some(space_id) = segment.space_id.as_deref() else {
                continue;
            };
            let end = segment_end_date(segment, plant, strain);
            if end <= segment.start_date {
                continue;
            }
            for cell in plant.size.footprint(segment.cell()) {
                by_slot
                    .entry((space_id, cell))
                    .or_default()
                    .push(PlacedInterval {
                        plant,
                        segment,
                        end,
                    });
            }
        }
    }

    let mut overlaps: BTreeMap<(SegmentRef, SegmentRef), SegmentOverlap> = BTreeMap::new();
    for ((space_id, cell), entries) in by_slot {
        for (i, a) in entries.iter().enumerate() {
            for b in entries.iter().skip(i + 1) {
                if a.plant.id == b.plant.id {
                    continue;
                }
                let start = a.segment.start_date.max(b.segment.start_date);
                let end = a.end.min(b.end);
                if start >= end {
                    continue;
                }
                let first = SegmentRef {
                    plant_id: a.plant.id.clone(),
                    segment_id: a.segment.id.clone(),
                };
                let second = SegmentRef {
                    plant_id: b.plant.id.clone(),
                    segment_id: b.segment.id.clone(),
                };
                overlaps
                    .entry((first.clone(), second.clone()))
                    .and_modify(|overlap| overlap.cells.push(cell))
                    .or_insert_with(|| SegmentOverlap {
                        first,
                        second,
                        space_id: space_id.to_string(),
                        cells: vec![cell],
                        start,
                        end,
                    });
            }
        }
    }
    overlaps.into_values().collect()
}
