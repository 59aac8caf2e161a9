//! Planner state container and command interface.
//!
//! # Responsibility
//! - Own the loaded plantation for one editing session.
//! - Expose every model mutation as a discrete command that either commits
//!   fully or leaves the plantation untouched.
//! - Record undo snapshots and publish one typed event per commit.
//!
//! # Invariants
//! - A store only exists for an already loaded plantation.
//! - Commands are rejected with `ReadOnly` unless the access policy allows
//!   editing.
//! - Each successful command that changes the plantation records exactly one
//!   undo snapshot taken before the change and bumps `revision` by one.
//!   Commands that leave it equal commit nothing and publish nothing.

pub mod events;
pub mod history;

pub use events::{EventBus, PlannerEvent, SubscriptionId};
pub use history::History;

use crate::access::AccessPolicy;
use crate::config::PlannerConfig;
use crate::grid::{can_place, snap_to_grid};
use crate::model::plant::{Generation, NewPlant, Plant, PlantId, PlantSize, SegmentId, Stage};
use crate::model::plantation::{Plantation, PlantationDocument};
use crate::model::space::{GridCell, LightSchedule, Space, SpaceId, SpaceValidationError};
use crate::model::strain::{derive_abbreviation, Seed, SeedId, Strain, StrainId, StrainKind};
use crate::segment::{
    current_segment, find_overlaps, merge_segments, move_segment_to_slot, relocate_plant_at,
    resize_stage, shift_plant_start, split_segment, SegmentError, SegmentOverlap,
};
use chrono::NaiveDate;
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CommandResult<T> = Result<T, CommandError>;

/// Rejection reasons for store commands. The plantation is unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The session may not edit this plantation.
    ReadOnly,
    SpaceNotFound(SpaceId),
    PlantNotFound(PlantId),
    StrainNotFound(StrainId),
    SeedNotFound(SeedId),
    InvalidSpace(SpaceValidationError),
    Segment(SegmentError),
    /// A resize would cut off part of these plants' footprints.
    PlantsOutOfBounds {
        space_id: SpaceId,
        plant_ids: Vec<PlantId>,
    },
    DuplicateCode(String),
    BlankCode,
    BlankStrainName,
    InvalidSeedCount,
}

impl Display for CommandError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "plantation is read-only for this session"),
            Self::SpaceNotFound(id) => write!(f, "space not found: {id}"),
            Self::PlantNotFound(id) => write!(f, "plant not found: {id}"),
            Self::StrainNotFound(id) => write!(f, "strain not found: {id}"),
            Self::SeedNotFound(id) => write!(f, "seed record not found: {id}"),
            Self::InvalidSpace(err) => write!(f, "{err}"),
            Self::Segment(err) => write!(f, "{err}"),
            Self::PlantsOutOfBounds {
                space_id,
                plant_ids,
            } => write!(
                f,
                "resize of space {space_id} would cut off {} plant(s)",
                plant_ids.len()
            ),
            Self::DuplicateCode(code) => write!(f, "plant code `{code}` is already in use"),
            Self::BlankCode => write!(f, "plant code must not be blank"),
            Self::BlankStrainName => write!(f, "strain name must not be blank"),
            Self::InvalidSeedCount => write!(f, "seed count must be positive"),
        }
    }
}

impl Error for CommandError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidSpace(err) => Some(err),
            Self::Segment(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SpaceValidationError> for CommandError {
    fn from(value: SpaceValidationError) -> Self {
        Self::InvalidSpace(value)
    }
}

impl From<SegmentError> for CommandError {
    fn from(value: SegmentError) -> Self {
        Self::Segment(value)
    }
}

/// Target geometry for a space resize, in world pixels and cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpaceBounds {
    pub x: f64,
    pub y: f64,
    pub width: u32,
    pub height: u32,
}

impl From<&Space> for SpaceBounds {
    fn from(space: &Space) -> Self {
        Self {
            x: space.x,
            y: space.y,
            width: space.width,
            height: space.height,
        }
    }
}

/// Where a newly placed plant comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlantSource {
    /// Consumes one unit from a seed inventory record.
    Seed(SeedId),
    Strain(StrainId),
    /// No strain; system default durations apply.
    Unassigned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacePlant {
    pub source: PlantSource,
    pub space_id: SpaceId,
    pub cell: GridCell,
    pub size: PlantSize,
    pub started_at: NaiveDate,
}

/// Partial strain edit; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrainUpdate {
    pub name: Option<String>,
    pub abbreviation: Option<String>,
    pub veg_days: Option<u32>,
    pub flower_days: Option<u32>,
    pub kind: Option<Option<StrainKind>>,
}

/// Explicit state container for one planner session.
#[derive(Debug)]
pub struct PlannerStore {
    plantation: Plantation,
    access: AccessPolicy,
    config: PlannerConfig,
    history: History,
    events: EventBus,
    revision: u64,
}

impl PlannerStore {
    pub fn new(plantation: Plantation, access: AccessPolicy, config: PlannerConfig) -> Self {
        let config = config.normalized();
        Self {
            history: History::new(config.history_limit),
            plantation,
            access,
            config,
            events: EventBus::new(),
            revision: 0,
        }
    }

    pub fn plantation(&self) -> &Plantation {
        &self.plantation
    }

    pub fn document(&self) -> &PlantationDocument {
        &self.plantation.document
    }

    pub fn access(&self) -> &AccessPolicy {
        &self.access
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn can_edit(&self) -> bool {
        self.access.can_edit()
    }

    /// Number of commits since the store was created.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&PlannerEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Advisory slot conflicts across all plants.
    pub fn overlaps(&self) -> Vec<SegmentOverlap> {
        find_overlaps(&self.plantation.document)
    }

    pub fn add_space(
        &mut self,
        name: &str,
        x: f64,
        y: f64,
        width: u32,
        height: u32,
    ) -> CommandResult<SpaceId> {
        let cell_size = self.config.cell_size;
        let name = name.trim().to_string();
        self.execute("add_space", move |plantation| {
            let space = Space::new(
                name,
                snap_to_grid(x, cell_size),
                snap_to_grid(y, cell_size),
                width,
                height,
            );
            space.validate()?;
            let space_id = space.id.clone();
            plantation.document.spaces.push(space);
            Ok((space_id.clone(), PlannerEvent::SpaceAdded { space_id }))
        })
    }

    /// Moves a space; plants keep their cells and move with it.
    pub fn move_space(&mut self, space_id: &str, x: f64, y: f64) -> CommandResult<()> {
        let cell_size = self.config.cell_size;
        self.execute("move_space", |plantation| {
            let space = space_mut(plantation, space_id)?;
            space.x = snap_to_grid(x, cell_size);
            space.y = snap_to_grid(y, cell_size);
            let event = PlannerEvent::SpaceMoved {
                space_id: space_id.to_string(),
            };
            Ok(((), event))
        })
    }

    /// Resizes a space, shifting plant cells so plants keep their world
    /// position when the west or north edge moves.
    pub fn resize_space(&mut self, space_id: &str, bounds: SpaceBounds) -> CommandResult<()> {
        let cell_size = self.config.cell_size;
        self.execute("resize_space", |plantation| {
            let current = plantation
                .space(space_id)
                .ok_or_else(|| CommandError::SpaceNotFound(space_id.to_string()))?;
            let mut resized = current.clone();
            resized.x = snap_to_grid(bounds.x, cell_size);
            resized.y = snap_to_grid(bounds.y, cell_size);
            resized.width = bounds.width;
            resized.height = bounds.height;
            resized.validate()?;

            let shift = GridCell::new(
                ((current.x - resized.x) / cell_size).round() as i32,
                ((current.y - resized.y) / cell_size).round() as i32,
            );

            let mut cut_off = Vec::new();
            for plant in &mut plantation.document.plants {
                let mut fits = true;
                for segment in &mut plant.segments {
                    if segment.space_id.as_deref() != Some(space_id) {
                        continue;
                    }
                    let cell = segment.cell().offset(shift.x, shift.y);
                    segment.grid_x = cell.x;
                    segment.grid_y = cell.y;
                    fits &= plant
                        .size
                        .footprint(cell)
                        .iter()
                        .all(|cell| resized.contains_cell(*cell));
                }
                if !fits {
                    cut_off.push(plant.id.clone());
                }
            }
            if !cut_off.is_empty() {
                return Err(CommandError::PlantsOutOfBounds {
                    space_id: space_id.to_string(),
                    plant_ids: cut_off,
                });
            }

            *space_mut(plantation, space_id)? = resized;
            let event = PlannerEvent::SpaceResized {
                space_id: space_id.to_string(),
            };
            Ok(((), event))
        })
    }

    pub fn rename_space(&mut self, space_id: &str, name: &str) -> CommandResult<()> {
        let name = name.trim().to_string();
        self.execute("rename_space", |plantation| {
            let space = space_mut(plantation, space_id)?;
            space.name = name;
            space.validate()?;
            let event = PlannerEvent::SpaceRenamed {
                space_id: space_id.to_string(),
            };
            Ok(((), event))
        })
    }

    /// Sets or clears a space's custom light schedule.
    pub fn set_light_schedule(
        &mut self,
        space_id: &str,
        schedule: Option<LightSchedule>,
    ) -> CommandResult<()> {
        self.execute("set_light_schedule", |plantation| {
            space_mut(plantation, space_id)?.custom_light_schedule = schedule;
            let event = PlannerEvent::LightScheduleChanged {
                space_id: space_id.to_string(),
            };
            Ok(((), event))
        })
    }

    /// Deletes a space together with every plant currently placed in it.
    ///
    /// Past segments of surviving plants that referenced the space become
    /// floating. Returns the ids of deleted plants.
    pub fn delete_space(
        &mut self,
        space_id: &str,
        as_of: NaiveDate,
    ) -> CommandResult<Vec<PlantId>> {
        self.execute("delete_space", |plantation| {
            let index = plantation
                .document
                .spaces
                .iter()
                .position(|space| space.id == space_id)
                .ok_or_else(|| CommandError::SpaceNotFound(space_id.to_string()))?;
            plantation.document.spaces.remove(index);

            let plants = &mut plantation.document.plants;
            let removed = plants
                .iter()
                .filter(|plant| {
                    current_segment(plant, as_of)
                        .and_then(|segment| segment.space_id.as_deref())
                        == Some(space_id)
                })
                .map(|plant| plant.id.clone())
                .collect::<Vec<_>>();
            plants.retain(|plant| !removed.contains(&plant.id));
            for segment in plants.iter_mut().flat_map(|plant| plant.segments.iter_mut()) {
                if segment.space_id.as_deref() == Some(space_id) {
                    segment.space_id = None;
                }
            }

            let event = PlannerEvent::SpaceDeleted {
                space_id: space_id.to_string(),
                removed_plants: removed.clone(),
            };
            Ok((removed, event))
        })
    }

    pub fn add_strain(
        &mut self,
        name: &str,
        veg_days: u32,
        flower_days: u32,
        kind: Option<StrainKind>,
    ) -> CommandResult<StrainId> {
        let name = name.trim().to_string();
        self.execute("add_strain", move |plantation| {
            if name.is_empty() {
                return Err(CommandError::BlankStrainName);
            }
            let mut strain = Strain::new(name, veg_days, flower_days);
            strain.kind = kind;
            let strain_id = strain.id.clone();
            plantation.document.strains.push(strain);
            Ok((strain_id.clone(), PlannerEvent::StrainAdded { strain_id }))
        })
    }

    /// Edits a strain. A rename re-derives the abbreviation unless it was
    /// customized or is set in the same update.
    pub fn update_strain(&mut self, strain_id: &str, update: StrainUpdate) -> CommandResult<()> {
        self.execute("update_strain", |plantation| {
            let strain = plantation
                .document
                .strains
                .iter_mut()
                .find(|strain| strain.id == strain_id)
                .ok_or_else(|| CommandError::StrainNotFound(strain_id.to_string()))?;

            if let Some(name) = update.name {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err(CommandError::BlankStrainName);
                }
                if strain.abbreviation == derive_abbreviation(&strain.name) {
                    strain.abbreviation = derive_abbreviation(&name);
                }
                strain.name = name;
            }
            if let Some(abbreviation) = update.abbreviation {
                let abbreviation = abbreviation.trim().to_uppercase();
                strain.abbreviation = if abbreviation.is_empty() {
                    derive_abbreviation(&strain.name)
                } else {
                    abbreviation
                };
            }
            if let Some(days) = update.veg_days {
                strain.veg_days = days;
            }
            if let Some(days) = update.flower_days {
                strain.flower_days = days;
            }
            if let Some(kind) = update.kind {
                strain.kind = kind;
            }
            let event = PlannerEvent::StrainUpdated {
                strain_id: strain_id.to_string(),
            };
            Ok(((), event))
        })
    }

    /// Removes a strain. Plants keep the dangling id and fall back to
    /// default durations.
    pub fn delete_strain(&mut self, strain_id: &str) -> CommandResult<()> {
        self.execute("delete_strain", |plantation| {
            let strains = &mut plantation.document.strains;
            let before = strains.len();
            strains.retain(|strain| strain.id != strain_id);
            if strains.len() == before {
                return Err(CommandError::StrainNotFound(strain_id.to_string()));
            }
            let event = PlannerEvent::StrainDeleted {
                strain_id: strain_id.to_string(),
            };
            Ok(((), event))
        })
    }

    /// Adds propagation units, merging into an existing record of the same
    /// strain and origin.
    pub fn add_seeds(
        &mut self,
        strain_id: &str,
        count: u32,
        is_clone: bool,
    ) -> CommandResult<SeedId> {
        self.execute("add_seeds", |plantation| {
            if count == 0 {
                return Err(CommandError::InvalidSeedCount);
            }
            if plantation.strain(strain_id).is_none() {
                return Err(CommandError::StrainNotFound(strain_id.to_string()));
            }
            let inventory = &mut plantation.document.inventory;
            let seed_id = match inventory
                .iter_mut()
                .find(|seed| seed.strain_id == strain_id && seed.is_clone == is_clone)
            {
                Some(seed) => {
                    seed.count = seed.count.saturating_add(count);
                    seed.id.clone()
                }
                None => {
                    let seed = Seed::new(strain_id, count, is_clone);
                    let seed_id = seed.id.clone();
                    inventory.push(seed);
                    seed_id
                }
            };
            Ok((seed_id.clone(), PlannerEvent::SeedsAdded { seed_id, count }))
        })
    }

    /// Places a new germinating plant with an auto-assigned code.
    pub fn place_plant(&mut self, request: PlacePlant) -> CommandResult<PlantId> {
        self.execute("place_plant", move |plantation| {
            let space = plantation
                .space(&request.space_id)
                .ok_or_else(|| CommandError::SpaceNotFound(request.space_id.clone()))?;
            if !can_place(
                space,
                request.cell,
                request.size,
                &plantation.document.plants,
                None,
                request.started_at,
            ) {
                return Err(SegmentError::PlacementBlocked {
                    space_id: request.space_id.clone(),
                    cell: request.cell,
                }
                .into());
            }

            let (strain_id, generation) = match &request.source {
                PlantSource::Seed(seed_id) => {
                    let inventory = &mut plantation.document.inventory;
                    let index = inventory
                        .iter()
                        .position(|seed| &seed.id == seed_id)
                        .ok_or_else(|| CommandError::SeedNotFound(seed_id.clone()))?;
                    let seed = &mut inventory[index];
                    let taken = (
                        Some(seed.strain_id.clone()),
                        if seed.is_clone {
                            Generation::Clone
                        } else {
                            Generation::Seed
                        },
                    );
                    seed.count = seed.count.saturating_sub(1);
                    if seed.count == 0 {
                        inventory.remove(index);
                    }
                    taken
                }
                PlantSource::Strain(strain_id) => {
                    if plantation.strain(strain_id).is_none() {
                        return Err(CommandError::StrainNotFound(strain_id.clone()));
                    }
                    (Some(strain_id.clone()), Generation::Seed)
                }
                PlantSource::Unassigned => (None, Generation::Seed),
            };

            let strain = strain_id.as_deref().and_then(|id| plantation.strain(id));
            let code = plantation.next_plant_code(strain);
            let plant = Plant::new(NewPlant {
                code,
                strain_id,
                size: request.size,
                generation,
                started_at: request.started_at,
                space_id: Some(request.space_id.clone()),
                cell: request.cell,
            });
            let plant_id = plant.id.clone();
            plantation.document.plants.push(plant);
            Ok((plant_id.clone(), PlannerEvent::PlantPlaced { plant_id }))
        })
    }

    /// Spatial-view move effective from `as_of`.
    pub fn relocate_plant(
        &mut self,
        plant_id: &str,
        as_of: NaiveDate,
        space_id: &str,
        cell: GridCell,
    ) -> CommandResult<()> {
        self.execute("relocate_plant", |plantation| {
            let plant = plant_ref(plantation, plant_id)?;
            let space = plantation
                .space(space_id)
                .ok_or_else(|| CommandError::SpaceNotFound(space_id.to_string()))?;
            let next = relocate_plant_at(plant, as_of, space, cell, &plantation.document.plants)?;
            plantation.replace_plant(next);
            let event = PlannerEvent::PlantRelocated {
                plant_id: plant_id.to_string(),
            };
            Ok(((), event))
        })
    }

    /// Splits a segment and returns the id of the later half.
    pub fn split_segment(
        &mut self,
        plant_id: &str,
        segment_id: &str,
        at: NaiveDate,
    ) -> CommandResult<SegmentId> {
        self.execute("split_segment", |plantation| {
            let plant = plant_ref(plantation, plant_id)?;
            let next = split_segment(plant, segment_id, at)?;
            let tail_id = next
                .segment_index(segment_id)
                .and_then(|index| next.segments.get(index + 1))
                .map(|segment| segment.id.clone())
                .ok_or_else(|| SegmentError::SegmentNotFound(segment_id.to_string()))?;
            plantation.replace_plant(next);
            let event = PlannerEvent::SegmentSplit {
                plant_id: plant_id.to_string(),
                segment_id: segment_id.to_string(),
            };
            Ok((tail_id, event))
        })
    }

    pub fn merge_segments(&mut self, plant_id: &str, segment_id: &str) -> CommandResult<()> {
        self.execute("merge_segments", |plantation| {
            let next = merge_segments(plant_ref(plantation, plant_id)?, segment_id)?;
            plantation.replace_plant(next);
            let event = PlannerEvent::SegmentsMerged {
                plant_id: plant_id.to_string(),
                segment_id: segment_id.to_string(),
            };
            Ok(((), event))
        })
    }

    pub fn move_segment(
        &mut self,
        plant_id: &str,
        segment_id: &str,
        space_id: &str,
        cell: GridCell,
    ) -> CommandResult<()> {
        self.execute("move_segment", |plantation| {
            let plant = plant_ref(plantation, plant_id)?;
            let space = plantation
                .space(space_id)
                .ok_or_else(|| CommandError::SpaceNotFound(space_id.to_string()))?;
            let next =
                move_segment_to_slot(plant, segment_id, space, cell, &plantation.document.plants)?;
            plantation.replace_plant(next);
            let event = PlannerEvent::SegmentMoved {
                plant_id: plant_id.to_string(),
                segment_id: segment_id.to_string(),
            };
            Ok(((), event))
        })
    }

    /// Time-view drag commit: shifts the whole plant and optionally moves
    /// one segment to another slot, as one undoable change.
    pub fn move_plant_in_time(
        &mut self,
        plant_id: &str,
        segment_id: &str,
        shift_days: i64,
        target: Option<(SpaceId, GridCell)>,
    ) -> CommandResult<()> {
        self.execute("move_plant_in_time", |plantation| {
            let plant = plant_ref(plantation, plant_id)?;
            let mut next = if shift_days == 0 {
                plant.clone()
            } else {
                shift_plant_start(plant, shift_days)?
            };

            let mut moved_segment = None;
            if let Some((space_id, cell)) = target {
                let segment = next
                    .segment(segment_id)
                    .ok_or_else(|| SegmentError::SegmentNotFound(segment_id.to_string()))?;
                if segment.space_id.as_deref() != Some(space_id.as_str()) || segment.cell() != cell
                {
                    let space = plantation
                        .space(&space_id)
                        .ok_or_else(|| CommandError::SpaceNotFound(space_id.clone()))?;
                    next = move_segment_to_slot(
                        &next,
                        segment_id,
                        space,
                        cell,
                        &plantation.document.plants,
                    )?;
                    moved_segment = Some(segment_id.to_string());
                }
            }

            plantation.replace_plant(next);
            let event = PlannerEvent::PlantMovedInTime {
                plant_id: plant_id.to_string(),
                shift_days,
                moved_segment,
            };
            Ok(((), event))
        })
    }

    pub fn shift_plant_start(&mut self, plant_id: &str, delta_days: i64) -> CommandResult<()> {
        self.execute("shift_plant_start", |plantation| {
            let next = shift_plant_start(plant_ref(plantation, plant_id)?, delta_days)?;
            plantation.replace_plant(next);
            let event = PlannerEvent::PlantMovedInTime {
                plant_id: plant_id.to_string(),
                shift_days: delta_days,
                moved_segment: None,
            };
            Ok(((), event))
        })
    }

    /// Overrides a stage duration; returns the clamped day count stored.
    pub fn resize_stage(&mut self, plant_id: &str, stage: Stage, days: u32) -> CommandResult<u32> {
        self.execute("resize_stage", |plantation| {
            let next = resize_stage(plant_ref(plantation, plant_id)?, stage, days)?;
            let stored = next.stage_overrides.get(stage).unwrap_or(days);
            plantation.replace_plant(next);
            let event = PlannerEvent::StageResized {
                plant_id: plant_id.to_string(),
                stage,
                days: stored,
            };
            Ok((stored, event))
        })
    }

    /// Records the plant's actual lifecycle stage as of `on`.
    pub fn set_plant_stage(
        &mut self,
        plant_id: &str,
        stage: Stage,
        on: NaiveDate,
    ) -> CommandResult<()> {
        self.execute("set_plant_stage", |plantation| {
            let plant = plant_mut(plantation, plant_id)?;
            plant.stage = stage;
            plant.stage_started_at = on;
            let event = PlannerEvent::PlantStageChanged {
                plant_id: plant_id.to_string(),
                stage,
            };
            Ok(((), event))
        })
    }

    /// Manual code rename; codes stay unique case-insensitively.
    pub fn rename_plant_code(&mut self, plant_id: &str, code: &str) -> CommandResult<()> {
        let code = code.trim().to_string();
        self.execute("rename_plant_code", |plantation| {
            if code.is_empty() {
                return Err(CommandError::BlankCode);
            }
            let owned_id = plant_ref(plantation, plant_id)?.id.clone();
            if plantation.is_code_taken(&code, Some(&owned_id)) {
                return Err(CommandError::DuplicateCode(code));
            }
            plant_mut(plantation, plant_id)?.code = code.clone();
            let event = PlannerEvent::PlantCodeChanged {
                plant_id: plant_id.to_string(),
                code,
            };
            Ok(((), event))
        })
    }

    pub fn delete_plant(&mut self, plant_id: &str) -> CommandResult<()> {
        self.execute("delete_plant", |plantation| {
            let plants = &mut plantation.document.plants;
            let before = plants.len();
            plants.retain(|plant| plant.id != plant_id);
            if plants.len() == before {
                return Err(CommandError::PlantNotFound(plant_id.to_string()));
            }
            let event = PlannerEvent::PlantDeleted {
                plant_id: plant_id.to_string(),
            };
            Ok(((), event))
        })
    }

    /// Restores the previous snapshot. `Ok(false)` when nothing to undo.
    pub fn undo(&mut self) -> CommandResult<bool> {
        self.ensure_editable("undo")?;
        let current = self.plantation.document.clone();
        match self.history.undo(current) {
            Some(previous) => {
                self.plantation.document = previous;
                self.finish("undo", PlannerEvent::Undone);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Re-applies the last undone snapshot. `Ok(false)` when nothing to redo.
    pub fn redo(&mut self) -> CommandResult<bool> {
        self.ensure_editable("redo")?;
        let current = self.plantation.document.clone();
        match self.history.redo(current) {
            Some(next) => {
                self.plantation.document = next;
                self.finish("redo", PlannerEvent::Redone);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn ensure_editable(&self, command: &'static str) -> CommandResult<()> {
        if self.access.can_edit() {
            return Ok(());
        }
        debug!("event=store_command module=store status=denied command={command}");
        Err(CommandError::ReadOnly)
    }

    fn execute<T>(
        &mut self,
        command: &'static str,
        apply: impl FnOnce(&mut Plantation) -> CommandResult<(T, PlannerEvent)>,
    ) -> CommandResult<T> {
        self.ensure_editable(command)?;

        let mut draft = self.plantation.clone();
        let (value, event) = match apply(&mut draft) {
            Ok(applied) => applied,
            Err(err) => {
                warn!(
                    "event=store_command module=store status=rejected command={} error={}",
                    command, err
                );
                return Err(err);
            }
        };

        if draft == self.plantation {
            debug!("event=store_command module=store status=unchanged command={command}");
            return Ok(value);
        }

        let before = std::mem::replace(&mut self.plantation, draft);
        self.history.record(before.document);
        self.finish(command, event);
        Ok(value)
    }

    fn finish(&mut self, command: &'static str, event: PlannerEvent) {
        self.revision += 1;
        info!(
            "event=store_command module=store status=ok command={} change={} revision={}",
            command,
            event.name(),
            self.revision
        );
        self.events.publish(&event);
    }
}

fn space_mut<'a>(plantation: &'a mut Plantation, space_id: &str) -> CommandResult<&'a mut Space> {
    plantation
        .space_mut(space_id)
        .ok_or_else(|| CommandError::SpaceNotFound(space_id.to_string()))
}

fn plant_ref<'a>(plantation: &'a Plantation, plant_id: &str) -> CommandResult<&'a Plant> {
    plantation
        .plant(plant_id)
        .ok_or_else(|| CommandError::PlantNotFound(plant_id.to_string()))
}

fn plant_mut<'a>(plantation: &'a mut Plantation, plant_id: &str) -> CommandResult<&'a mut Plant> {
    plantation
        .plant_mut(plant_id)
        .ok_or_else(|| CommandError::PlantNotFound(plant_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::{CommandError, PlacePlant, PlannerEvent, PlannerStore, PlantSource, SpaceBounds};
    use crate::access::AccessPolicy;
    use crate::config::PlannerConfig;
    use crate::model::plant::PlantSize;
    use crate::model::plantation::Plantation;
    use crate::model::space::GridCell;
    use chrono::NaiveDate;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn owner_store() -> PlannerStore {
        let plantation = Plantation::new("owner", "Home");
        PlannerStore::new(
            plantation,
            AccessPolicy::owner("owner"),
            PlannerConfig::default(),
        )
    }

    fn place(store: &mut PlannerStore, space_id: &str, cell: GridCell) -> String {
        store
            .place_plant(PlacePlant {
                source: PlantSource::Unassigned,
                space_id: space_id.to_string(),
                cell,
                size: PlantSize::Single,
                started_at: date(2024, 1, 1),
            })
            .unwrap()
    }

    #[test]
    fn read_only_sessions_reject_commands_without_changes() {
        let plantation = Plantation::new("owner", "Home");
        let mut store = PlannerStore::new(
            plantation,
            AccessPolicy::new("owner", Some("guest".to_string()), false),
            PlannerConfig::default(),
        );
        assert_eq!(
            store.add_space("Tent", 0.0, 0.0, 2, 2),
            Err(CommandError::ReadOnly)
        );
        assert_eq!(store.undo(), Err(CommandError::ReadOnly));
        assert_eq!(store.revision(), 0);
        assert!(store.document().spaces.is_empty());
    }

    #[test]
    fn add_space_snaps_origin_to_grid() {
        let mut store = owner_store();
        let id = store.add_space("Tent", 70.0, 130.0, 2, 3).unwrap();
        let space = store.plantation().space(&id).unwrap();
        assert_eq!((space.x, space.y), (56.0, 112.0));
        assert!(matches!(
            store.add_space("  ", 0.0, 0.0, 1, 1),
            Err(CommandError::InvalidSpace(_))
        ));
    }

    #[test]
    fn commands_publish_one_event_and_support_undo() {
        let mut store = owner_store();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        store.subscribe(move |event| sink.borrow_mut().push(event.clone()));

        let space_id = store.add_space("Tent", 0.0, 0.0, 2, 2).unwrap();
        store.rename_space(&space_id, "Veg tent").unwrap();
        assert_eq!(store.revision(), 2);
        assert_eq!(seen.borrow().len(), 2);

        assert!(store.undo().unwrap());
        assert_eq!(store.plantation().space(&space_id).unwrap().name, "Tent");
        assert!(store.redo().unwrap());
        assert_eq!(store.plantation().space(&space_id).unwrap().name, "Veg tent");
        assert!(!store.redo().unwrap());
        assert_eq!(seen.borrow().last(), Some(&PlannerEvent::Redone));
    }

    #[test]
    fn rejected_commands_record_no_history() {
        let mut store = owner_store();
        let space_id = store.add_space("Tent", 0.0, 0.0, 1, 1).unwrap();
        place(&mut store, &space_id, GridCell::new(0, 0));
        let revision = store.revision();

        let blocked = store.place_plant(PlacePlant {
            source: PlantSource::Unassigned,
            space_id: space_id.clone(),
            cell: GridCell::new(0, 0),
            size: PlantSize::Single,
            started_at: date(2024, 1, 1),
        });
        assert!(matches!(blocked, Err(CommandError::Segment(_))));
        assert_eq!(store.revision(), revision);
        assert_eq!(store.document().plants.len(), 1);
    }

    #[test]
    fn west_edge_resize_keeps_plant_world_positions() {
        let mut store = owner_store();
        let space_id = store.add_space("Tent", 112.0, 0.0, 2, 1).unwrap();
        let plant_id = place(&mut store, &space_id, GridCell::new(0, 0));

        store
            .resize_space(
                &space_id,
                SpaceBounds {
                    x: 56.0,
                    y: 0.0,
                    width: 3,
                    height: 1,
                },
            )
            .unwrap();
        let plant = store.plantation().plant(&plant_id).unwrap();
        assert_eq!(plant.segments[0].cell(), GridCell::new(1, 0));
    }

    #[test]
    fn shrinking_over_a_plant_is_rejected() {
        let mut store = owner_store();
        let space_id = store.add_space("Tent", 0.0, 0.0, 2, 2).unwrap();
        let plant_id = place(&mut store, &space_id, GridCell::new(1, 1));
        let err = store
            .resize_space(
                &space_id,
                SpaceBounds {
                    x: 0.0,
                    y: 0.0,
                    width: 1,
                    height: 2,
                },
            )
            .unwrap_err();
        assert_eq!(
            err,
            CommandError::PlantsOutOfBounds {
                space_id: space_id.clone(),
                plant_ids: vec![plant_id.clone()],
            }
        );
        assert_eq!(
            store.plantation().plant(&plant_id).unwrap().segments[0].cell(),
            GridCell::new(1, 1)
        );
    }

    #[test]
    fn duplicate_codes_are_rejected_case_insensitively() {
        let mut store = owner_store();
        let space_id = store.add_space("Tent", 0.0, 0.0, 2, 1).unwrap();
        let first = place(&mut store, &space_id, GridCell::new(0, 0));
        let second = place(&mut store, &space_id, GridCell::new(1, 0));
        assert_eq!(store.plantation().plant(&first).unwrap().code, "P-1");
        assert_eq!(store.plantation().plant(&second).unwrap().code, "P-2");

        assert_eq!(
            store.rename_plant_code(&second, "p-1"),
            Err(CommandError::DuplicateCode("p-1".to_string()))
        );
        store.rename_plant_code(&second, "Mother").unwrap();
        assert_eq!(store.plantation().plant(&second).unwrap().code, "Mother");
        assert_eq!(store.rename_plant_code(&first, " "), Err(CommandError::BlankCode));
    }
}
