//! Typed mutation events and the subscriber bus.
//!
//! # Invariants
//! - Every successful store command publishes exactly one event.
//! - Subscribers run synchronously, in subscription order.

use crate::model::plant::{PlantId, SegmentId, Stage};
use crate::model::space::SpaceId;
use crate::model::strain::{SeedId, StrainId};

/// One committed change to the plantation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannerEvent {
    SpaceAdded { space_id: SpaceId },
    SpaceMoved { space_id: SpaceId },
    SpaceResized { space_id: SpaceId },
    SpaceRenamed { space_id: SpaceId },
    LightScheduleChanged { space_id: SpaceId },
    SpaceDeleted {
        space_id: SpaceId,
        removed_plants: Vec<PlantId>,
    },
    StrainAdded { strain_id: StrainId },
    StrainUpdated { strain_id: StrainId },
    StrainDeleted { strain_id: StrainId },
    SeedsAdded { seed_id: SeedId, count: u32 },
    PlantPlaced { plant_id: PlantId },
    PlantRelocated { plant_id: PlantId },
    PlantMovedInTime {
        plant_id: PlantId,
        shift_days: i64,
        moved_segment: Option<SegmentId>,
    },
    PlantCodeChanged { plant_id: PlantId, code: String },
    PlantStageChanged { plant_id: PlantId, stage: Stage },
    PlantDeleted { plant_id: PlantId },
    SegmentSplit {
        plant_id: PlantId,
        segment_id: SegmentId,
    },
    SegmentsMerged {
        plant_id: PlantId,
        segment_id: SegmentId,
    },
    SegmentMoved {
        plant_id: PlantId,
        segment_id: SegmentId,
    },
    StageResized {
        plant_id: PlantId,
        stage: Stage,
        days: u32,
    },
    Undone,
    Redone,
}

impl PlannerEvent {
    /// Stable snake_case name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SpaceAdded { .. } => "space_added",
            Self::SpaceMoved { .. } => "space_moved",
            Self::SpaceResized { .. } => "space_resized",
            Self::SpaceRenamed { .. } => "space_renamed",
            Self::LightScheduleChanged { .. } => "light_schedule_changed",
            Self::SpaceDeleted { .. } => "space_deleted",
            Self::StrainAdded { .. } => "strain_added",
            Self::StrainUpdated { .. } => "strain_updated",
            Self::StrainDeleted { .. } => "strain_deleted",
            Self::SeedsAdded { .. } => "seeds_added",
            Self::PlantPlaced { .. } => "plant_placed",
            Self::PlantRelocated { .. } => "plant_relocated",
            Self::PlantMovedInTime { .. } => "plant_moved_in_time",
            Self::PlantCodeChanged { .. } => "plant_code_changed",
            Self::PlantStageChanged { .. } => "plant_stage_changed",
            Self::PlantDeleted { .. } => "plant_deleted",
            Self::SegmentSplit { .. } => "segment_split",
            Self::SegmentsMerged { .. } => "segments_merged",
            Self::SegmentMoved { .. } => "segment_moved",
            Self::StageResized { .. } => "stage_resized",
            Self::Undone => "undone",
            Self::Redone => "redone",
        }
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&PlannerEvent)>;

#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&PlannerEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener. Returns `false` for an unknown id.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(candidate, _)| *candidate != id);
        self.listeners.len() != before
    }

    pub fn publish(&mut self, event: &PlannerEvent) {
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
