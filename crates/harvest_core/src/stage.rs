//! Stage-duration resolver.
//!
//! # Responsibility
//! - Derive per-stage durations from plant overrides, strain values and
//!   system defaults.
//! - Derive cumulative day offsets, stage intervals and plant end dates.
//!
//! # Invariants
//! - Resolution order: plant override -> strain (vegetative/flowering only)
//!   -> system default.
//! - `Harvested` always lasts 0 days.
//! - `cumulative_day_offset` is non-decreasing along `Stage::ALL`.

use crate::model::plant::{Plant, Stage};
use crate::model::strain::Strain;
use chrono::{Days, NaiveDate};

/// Shortest duration a stage can be resized to.
pub const MIN_STAGE_DAYS: u32 = 7;

pub const DEFAULT_GERMINATING_DAYS: u32 = 7;
pub const DEFAULT_SEEDLING_DAYS: u32 = 14;
pub const DEFAULT_VEGETATIVE_DAYS: u32 = 28;
pub const DEFAULT_FLOWERING_DAYS: u32 = 56;

/// System default duration for a stage.
pub fn default_stage_duration(stage: Stage) -> u32 {
    match stage {
        Stage::Germinating => DEFAULT_GERMINATING_DAYS,
        Stage::Seedling => DEFAULT_SEEDLING_DAYS,
        Stage::Vegetative => DEFAULT_VEGETATIVE_DAYS,
        Stage::Flowering => DEFAULT_FLOWERING_DAYS,
        Stage::Harvested => 0,
    }
}

/// Resolved duration of `stage` for `plant`, in days.
pub fn stage_duration(stage: Stage, plant: &Plant, strain: Option<&Strain>) -> u32 {
    if stage == Stage::Harvested {
        return 0;
    }
    if let Some(days) = plant.stage_overrides.get(stage) {
        return days;
    }
    let from_strain = strain.and_then(|strain| match stage {
        Stage::Vegetative => Some(strain.veg_days),
        Stage::Flowering => Some(strain.flower_days),
        _ => None,
    });
    from_strain.unwrap_or_else(|| default_stage_duration(stage))
}

/// Sum of durations of all stages strictly before `stage`.
pub fn cumulative_day_offset(stage: Stage, plant: &Plant, strain: Option<&Strain>) -> u32 {
    Stage::ALL
        .iter()
        .take_while(|candidate| **candidate < stage)
        .map(|candidate| stage_duration(*candidate, plant, strain))
        .sum()
}

/// Total scheduled lifecycle length in days.
pub fn total_lifecycle_days(plant: &Plant, strain: Option<&Strain>) -> u32 {
    cumulative_day_offset(Stage::Harvested, plant, strain)
}

/// `started_at + sum(durations of every non-harvested stage)`.
pub fn plant_end_date(plant: &Plant, strain: Option<&Strain>) -> NaiveDate {
    add_days(plant.started_at, total_lifecycle_days(plant, strain))
}

/// Calendar date on which `stage` begins.
pub fn stage_start_date(stage: Stage, plant: &Plant, strain: Option<&Strain>) -> NaiveDate {
    add_days(plant.started_at, cumulative_day_offset(stage, plant, strain))
}

/// Half-open date interval of one scheduled stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageInterval {
    pub stage: Stage,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl StageInterval {
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Intersection with `[start, end)`, `None` when empty.
    pub fn clip(&self, start: NaiveDate, end: NaiveDate) -> Option<StageInterval> {
        let clipped_start = self.start.max(start);
        let clipped_end = self.end.min(end);
        (clipped_start < clipped_end).then_some(StageInterval {
            stage: self.stage,
            start: clipped_start,
            end: clipped_end,
        })
    }
}

/// Intervals for every scheduled stage, skipping zero-length ones.
pub fn stage_intervals(plant: &Plant, strain: Option<&Strain>) -> Vec<StageInterval> {
    let mut cursor = plant.started_at;
    let mut intervals = Vec::with_capacity(Stage::SCHEDULED.len());
    for stage in Stage::SCHEDULED {
        let end = add_days(cursor, stage_duration(stage, plant, strain));
        if end > cursor {
            intervals.push(StageInterval {
                stage,
                start: cursor,
                end,
            });
        }
        cursor = end;
    }
    intervals
}

/// Scheduled stage on `date`; dates past the end report `Harvested`.
pub fn stage_at(plant: &Plant, strain: Option<&Strain>, date: NaiveDate) -> Stage {
    if date < plant.started_at {
        return Stage::Germinating;
    }
    stage_intervals(plant, strain)
        .into_iter()
        .find(|interval| date >= interval.start && date < interval.end)
        .map_or(Stage::Harvested, |interval| interval.stage)
}

/// Clamps a requested duration to [`MIN_STAGE_DAYS`].
pub fn clamp_stage_days(days: u32) -> u32 {
    days.max(MIN_STAGE_DAYS)
}

pub(crate) fn add_days(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX)
}

#[cfg(test)]
mod tests {
    use super::{
        clamp_stage_days, cumulative_day_offset, plant_end_date, stage_at, stage_duration,
        stage_intervals, stage_start_date, MIN_STAGE_DAYS,
    };
    use crate::model::plant::{NewPlant, Plant, PlantSize, Stage};
    use crate::model::space::GridCell;
    use crate::model::strain::Strain;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn plant(strain: Option<&Strain>) -> Plant {
        Plant::new(NewPlant {
            code: "OG-1".to_string(),
            strain_id: strain.map(|strain| strain.id.clone()),
            size: PlantSize::Single,
            generation: Default::default(),
            started_at: date(2024, 1, 1),
            space_id: None,
            cell: GridCell::new(0, 0),
        })
    }

    #[test]
    fn end_date_sums_all_scheduled_stages() {
        let strain = Strain::new("OG", 30, 60);
        let plant = plant(Some(&strain));
        assert_eq!(plant_end_date(&plant, Some(&strain)), date(2024, 4, 21));
        assert_eq!(
            (plant_end_date(&plant, Some(&strain)) - plant.started_at).num_days(),
            111
        );
    }

    #[test]
    fn override_beats_strain_beats_default() {
        let strain = Strain::new("OG", 30, 60);
        let mut plant = plant(Some(&strain));
        assert_eq!(stage_duration(Stage::Vegetative, &plant, None), 28);
        assert_eq!(stage_duration(Stage::Vegetative, &plant, Some(&strain)), 30);
        plant.stage_overrides.set(Stage::Vegetative, Some(21));
        assert_eq!(stage_duration(Stage::Vegetative, &plant, Some(&strain)), 21);
    }

    #[test]
    fn strains_do_not_override_fixed_stages() {
        let strain = Strain::new("OG", 30, 60);
        let plant = plant(Some(&strain));
        assert_eq!(stage_duration(Stage::Germinating, &plant, Some(&strain)), 7);
        assert_eq!(stage_duration(Stage::Seedling, &plant, Some(&strain)), 14);
        assert_eq!(stage_duration(Stage::Harvested, &plant, Some(&strain)), 0);
    }

    #[test]
    fn cumulative_offsets_are_monotonic() {
        let strain = Strain::new("OG", 0, 45);
        let mut plant = plant(Some(&strain));
        plant.stage_overrides.set(Stage::Seedling, Some(0));
        for strain in [None, Some(&strain)] {
            let offsets = Stage::ALL
                .iter()
                .map(|stage| cumulative_day_offset(*stage, &plant, strain))
                .collect::<Vec<_>>();
            assert!(offsets.windows(2).all(|pair| pair[0] <= pair[1]));
            assert_eq!(offsets[0], 0);
        }
    }

    #[test]
    fn stage_intervals_tile_the_lifecycle() {
        let strain = Strain::new("OG", 30, 60);
        let plant = plant(Some(&strain));
        let intervals = stage_intervals(&plant, Some(&strain));
        assert_eq!(intervals.len(), 4);
        assert_eq!(intervals[0].start, plant.started_at);
        assert!(intervals.windows(2).all(|pair| pair[0].end == pair[1].start));
        assert_eq!(intervals[3].end, plant_end_date(&plant, Some(&strain)));
        assert_eq!(
            stage_start_date(Stage::Flowering, &plant, Some(&strain)),
            intervals[3].start
        );
    }

    #[test]
    fn stage_at_reports_harvested_after_end() {
        let plant = plant(None);
        assert_eq!(stage_at(&plant, None, date(2024, 1, 1)), Stage::Germinating);
        assert_eq!(stage_at(&plant, None, date(2024, 1, 8)), Stage::Seedling);
        assert_eq!(stage_at(&plant, None, date(2025, 1, 1)), Stage::Harvested);
    }

    #[test]
    fn clamp_enforces_minimum() {
        assert_eq!(clamp_stage_days(3), MIN_STAGE_DAYS);
        assert_eq!(clamp_stage_days(70), 70);
    }
}
