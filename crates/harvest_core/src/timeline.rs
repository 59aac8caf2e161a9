//! Time-view geometry.
//!
//! # Responsibility
//! - Lay out the vertical slot axis (space headers + one row per cell).
//! - Map dates to screen x and back under pan/zoom.
//! - Turn segments into bars with per-stage sub-rectangles, connectors,
//!   stage-boundary handles and conflict highlights.
//!
//! # Invariants
//! - `screen_x_to_date(date_to_screen_x(d)) == d` for every date.
//! - The split gap is a rendering inset only; bar dates are never shifted.
//! - Layout is a pure function of the model and the viewport.

use crate::config::TimelineConfig;
use crate::grid::{Point, Rect};
use crate::model::plant::{Plant, PlantId, SegmentId, Stage};
use crate::model::plantation::Plantation;
use crate::model::space::{GridCell, Space, SpaceId};
use crate::segment::{find_overlaps, segment_end_date, SegmentOverlap};
use crate::stage::{stage_intervals, StageInterval};
use chrono::{Days, NaiveDate};
use std::collections::HashSet;

/// Vertical share of a slot left empty above and below a bar.
const BAR_INSET_RATIO: f64 = 0.15;
/// Horizontal reach of connector control points.
const CONNECTOR_BULGE: f64 = 24.0;
/// Tolerance absorbing float error when converting x back to days.
const DAY_EPSILON: f64 = 1e-6;

/// Pan/zoom state of the time view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineViewport {
    pub pan_x: f64,
    pub pan_y: f64,
    pub zoom: f64,
    /// Date drawn at `left_margin + pan_x`.
    pub reference_date: NaiveDate,
}

impl TimelineViewport {
    pub fn new(reference_date: NaiveDate) -> Self {
        Self {
            pan_x: 0.0,
            pan_y: 0.0,
            zoom: 1.0,
            reference_date,
        }
    }

    pub fn day_width(&self, config: &TimelineConfig) -> f64 {
        config.day_width * self.zoom
    }

    pub fn date_to_x(&self, date: NaiveDate, config: &TimelineConfig) -> f64 {
        date_to_screen_x(date, self.pan_x, self.reference_date, self.zoom, config)
    }

    pub fn x_to_date(&self, x: f64, config: &TimelineConfig) -> NaiveDate {
        screen_x_to_date(x, self.pan_x, self.reference_date, self.zoom, config)
    }

    /// Re-zooms the date axis keeping the date under `anchor_x` fixed.
    pub fn zoom_around(&mut self, anchor_x: f64, new_zoom: f64, config: &TimelineConfig) {
        let days = screen_x_to_day_offset(anchor_x, self.pan_x, self.zoom, config);
        self.zoom = new_zoom;
        self.pan_x = anchor_x - config.left_margin - days * config.day_width * new_zoom;
    }
}

/// `left_margin + pan_x + (date - reference).days * day_width * zoom`.
pub fn date_to_screen_x(
    date: NaiveDate,
    pan_x: f64,
    reference_date: NaiveDate,
    zoom: f64,
    config: &TimelineConfig,
) -> f64 {
    let days = (date - reference_date).num_days() as f64;
    config.left_margin + pan_x + days * config.day_width * zoom
}

/// Fractional day offset from the reference date under screen x.
pub fn screen_x_to_day_offset(x: f64, pan_x: f64, zoom: f64, config: &TimelineConfig) -> f64 {
    (x - config.left_margin - pan_x) / (config.day_width * zoom)
}

/// Date whose day column contains screen x. Inverse of [`date_to_screen_x`].
pub fn screen_x_to_date(
    x: f64,
    pan_x: f64,
    reference_date: NaiveDate,
    zoom: f64,
    config: &TimelineConfig,
) -> NaiveDate {
    let days = (screen_x_to_day_offset(x, pan_x, zoom, config) + DAY_EPSILON).floor() as i64;
    offset_date(reference_date, days)
}

/// Adds a signed day count, saturating at the calendar bounds.
pub fn offset_date(date: NaiveDate, days: i64) -> NaiveDate {
    let magnitude = Days::new(days.unsigned_abs());
    let shifted = if days >= 0 {
        date.checked_add_days(magnitude)
    } else {
        date.checked_sub_days(magnitude)
    };
    shifted.unwrap_or(if days >= 0 {
        NaiveDate::MAX
    } else {
        NaiveDate::MIN
    })
}

/// Rounds a day delta to whole weeks.
pub fn snap_days_to_weeks(days: f64) -> i64 {
    ((days / 7.0).round() as i64) * 7
}

/// Identity of one row on the vertical axis.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotKey {
    /// One grid cell of one space.
    Cell { space_id: SpaceId, cell: GridCell },
    /// Row for a plant's floating (space-less) segments.
    Floating { plant_id: PlantId },
}

impl SlotKey {
    pub fn cell(space_id: impl Into<SpaceId>, cell: GridCell) -> Self {
        Self::Cell {
            space_id: space_id.into(),
            cell,
        }
    }
}

/// One row of the slot list, with its top y in content coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotEntry {
    /// Space header; `space_id == None` heads the floating section.
    Header {
        space_id: Option<SpaceId>,
        y: f64,
        collapsed: bool,
    },
    Slot { key: SlotKey, y: f64 },
}

impl SlotEntry {
    pub fn y(&self) -> f64 {
        match self {
            Self::Header { y, .. } | Self::Slot { y, .. } => *y,
        }
    }
}

/// Ordered vertical layout of the time view.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SlotList {
    pub entries: Vec<SlotEntry>,
    pub total_height: f64,
    slot_height: f64,
    header_height: f64,
}

impl SlotList {
    /// Top y of a slot in content coordinates.
    pub fn slot_y(&self, key: &SlotKey) -> Option<f64> {
        self.entries.iter().find_map(|entry| match entry {
            SlotEntry::Slot { key: candidate, y } if candidate == key => Some(*y),
            _ => None,
        })
    }

    /// Entry under a content-space y coordinate.
    pub fn entry_at(&self, y: f64) -> Option<&SlotEntry> {
        self.entries.iter().find(|entry| {
            let height = match entry {
                SlotEntry::Header { .. } => self.header_height,
                SlotEntry::Slot { .. } => self.slot_height,
            };
            y >= entry.y() && y < entry.y() + height
        })
    }

    /// Slot under a content-space y coordinate; headers yield `None`.
    pub fn slot_at(&self, y: f64) -> Option<&SlotKey> {
        match self.entry_at(y)? {
            SlotEntry::Slot { key, .. } => Some(key),
            SlotEntry::Header { .. } => None,
        }
    }

    pub fn slot_height(&self) -> f64 {
        self.slot_height
    }

    pub fn header_height(&self) -> f64 {
        self.header_height
    }

    pub fn slot_keys(&self) -> impl Iterator<Item = &SlotKey> {
        self.entries.iter().filter_map(|entry| match entry {
            SlotEntry::Slot { key, .. } => Some(key),
            SlotEntry::Header { .. } => None,
        })
    }
}

/// Builds the slot axis: per space a header then its cells row-major.
///
/// Collapsed spaces keep their header but contribute no rows. Plants with
/// floating segments get one row each in a trailing floating section.
pub fn build_slot_list(
    spaces: &[Space],
    plants: &[Plant],
    collapsed: &HashSet<SpaceId>,
    config: &TimelineConfig,
) -> SlotList {
    let mut entries = Vec::new();
    let mut y = 0.0;

    for space in spaces {
        let is_collapsed = collapsed.contains(&space.id);
        entries.push(SlotEntry::Header {
            space_id: Some(space.id.clone()),
            y,
            collapsed: is_collapsed,
        });
        y += config.header_height;
        if is_collapsed {
            continue;
        }
        for cell in space.cells() {
            entries.push(SlotEntry::Slot {
                key: SlotKey::cell(space.id.clone(), cell),
                y,
            });
            y += config.slot_height;
        }
    }

    let floating = plants
        .iter()
        .filter(|plant| {
            plant
                .segments
                .iter()
                .any(|segment| is_floating(segment.space_id.as_deref(), spaces))
        })
        .collect::<Vec<_>>();
    if !floating.is_empty() {
        entries.push(SlotEntry::Header {
            space_id: None,
            y,
            collapsed: false,
        });
        y += config.header_height;
        for plant in floating {
            entries.push(SlotEntry::Slot {
                key: SlotKey::Floating {
                    plant_id: plant.id.clone(),
                },
                y,
            });
            y += config.slot_height;
        }
    }

    SlotList {
        entries,
        total_height: y,
        slot_height: config.slot_height,
        header_height: config.header_height,
    }
}

fn is_floating(space_id: Option<&str>, spaces: &[Space]) -> bool {
    match space_id {
        None => true,
        Some(space_id) => !spaces.iter().any(|space| space.id == space_id),
    }
}

/// Slot a segment is drawn in.
pub fn slot_key_for(
    plant: &Plant,
    space_id: Option<&str>,
    cell: GridCell,
    spaces: &[Space],
) -> SlotKey {
    match space_id {
        Some(space_id) if !is_floating(Some(space_id), spaces) => SlotKey::cell(space_id, cell),
        _ => SlotKey::Floating {
            plant_id: plant.id.clone(),
        },
    }
}

/// Sub-rectangle of a bar covering one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageRect {
    pub stage: Stage,
    pub rect: Rect,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Screen geometry of one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentBar {
    pub plant_id: PlantId,
    pub segment_id: SegmentId,
    pub slot: SlotKey,
    pub rect: Rect,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub stages: Vec<StageRect>,
}

impl SegmentBar {
    pub fn center_y(&self) -> f64 {
        self.rect.y + self.rect.height / 2.0
    }
}

/// Curve joining consecutive segments that sit in different slots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Connector {
    pub from: Point,
    pub to: Point,
}

impl Connector {
    /// Cubic Bezier control points for an S-shaped curve.
    pub fn control_points(&self) -> (Point, Point) {
        (
            Point::new(self.from.x + CONNECTOR_BULGE, self.from.y),
            Point::new(self.to.x - CONNECTOR_BULGE, self.to.y),
        )
    }
}

/// Draggable boundary at the end of a resizable stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageHandle {
    pub plant_id: PlantId,
    pub stage: Stage,
    pub date: NaiveDate,
    pub rect: Rect,
}

/// Highlighted region where two plants claim the same slot.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictRect {
    pub overlap: SegmentOverlap,
    pub rect: Rect,
}

/// Bars for every segment of one plant that has a visible slot.
pub fn segment_bars(
    plant: &Plant,
    plantation: &Plantation,
    slots: &SlotList,
    viewport: &TimelineViewport,
    config: &TimelineConfig,
) -> Vec<SegmentBar> {
    let strain = plantation.strain_for(plant);
    let intervals = stage_intervals(plant, strain);
    let spaces = &plantation.document.spaces;
    let half_gap = config.split_gap / 2.0;
    let inset = slots.slot_height() * BAR_INSET_RATIO;

    let mut bars = Vec::with_capacity(plant.segments.len());
    for (index, segment) in plant.segments.iter().enumerate() {
        let key = slot_key_for(plant, segment.space_id.as_deref(), segment.cell(), spaces);
        let Some(slot_y) = slots.slot_y(&key) else {
            continue;
        };
        let start = segment.start_date;
        let end = segment_end_date(segment, plant, strain);
        if end <= start {
            continue;
        }

        let split_before = index > 0
            && plant.segments[index - 1].end_date == Some(segment.start_date);
        let split_after = plant
            .segments
            .get(index + 1)
            .is_some_and(|next| segment.end_date == Some(next.start_date));

        let mut left = viewport.date_to_x(start, config);
        let mut right = viewport.date_to_x(end, config);
        if split_before {
            left += half_gap;
        }
        if split_after {
            right -= half_gap;
        }
        let top = slot_y + viewport.pan_y + inset;
        let height = slots.slot_height() - inset * 2.0;
        let rect = Rect::new(left, top, (right - left).max(0.0), height);

        let stages = intervals
            .iter()
            .filter_map(|interval| interval.clip(start, end))
            .map(|clipped| stage_rect(&clipped, &rect, viewport, config))
            .collect();

        bars.push(SegmentBar {
            plant_id: plant.id.clone(),
            segment_id: segment.id.clone(),
            slot: key,
            rect,
            start,
            end,
            stages,
        });
    }
    bars
}

fn stage_rect(
    interval: &StageInterval,
    bar: &Rect,
    viewport: &TimelineViewport,
    config: &TimelineConfig,
) -> StageRect {
    let left = viewport.date_to_x(interval.start, config).max(bar.x);
    let right = viewport.date_to_x(interval.end, config).min(bar.right());
    StageRect {
        stage: interval.stage,
        rect: Rect::new(left, bar.y, (right - left).max(0.0), bar.height),
        start: interval.start,
        end: interval.end,
    }
}

/// Connectors between consecutive bars of one plant in different slots.
pub fn segment_connectors(plant: &Plant, bars: &[SegmentBar]) -> Vec<Connector> {
    plant
        .segments
        .windows(2)
        .filter(|pair| pair[0].end_date == Some(pair[1].start_date))
        .filter_map(|pair| {
            let from = bars.iter().find(|bar| bar.segment_id == pair[0].id)?;
            let to = bars.iter().find(|bar| bar.segment_id == pair[1].id)?;
            (from.slot != to.slot).then(|| Connector {
                from: Point::new(from.rect.right(), from.center_y()),
                to: Point::new(to.rect.x, to.center_y()),
            })
        })
        .collect()
}

/// Handles at the end boundary of each resizable stage.
pub fn stage_handles(
    plant: &Plant,
    plantation: &Plantation,
    bars: &[SegmentBar],
    viewport: &TimelineViewport,
    config: &TimelineConfig,
) -> Vec<StageHandle> {
    let strain = plantation.strain_for(plant);
    stage_intervals(plant, strain)
        .into_iter()
        .filter(|interval| interval.stage.is_resizable())
        .filter_map(|interval| {
            let bar = bars
                .iter()
                .filter(|bar| bar.plant_id == plant.id)
                .find(|bar| interval.end > bar.start && interval.end <= bar.end)?;
            let x = viewport.date_to_x(interval.end, config);
            Some(StageHandle {
                plant_id: plant.id.clone(),
                stage: interval.stage,
                date: interval.end,
                rect: Rect::new(
                    x - config.handle_width / 2.0,
                    bar.rect.y,
                    config.handle_width,
                    bar.rect.height,
                ),
            })
        })
        .collect()
}

/// Full time-view layout for one frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimelineLayout {
    pub slots: SlotList,
    pub bars: Vec<SegmentBar>,
    pub connectors: Vec<Connector>,
    pub handles: Vec<StageHandle>,
    pub conflicts: Vec<ConflictRect>,
}

impl TimelineLayout {
    /// Computes the layout; handles are produced for `selected_plant` only.
    pub fn compute(
        plantation: &Plantation,
        collapsed: &HashSet<SpaceId>,
        selected_plant: Option<&str>,
        viewport: &TimelineViewport,
        config: &TimelineConfig,
    ) -> Self {
        let document = &plantation.document;
        let slots = build_slot_list(&document.spaces, &document.plants, collapsed, config);

        let mut bars = Vec::new();
        let mut connectors = Vec::new();
        let mut handles = Vec::new();
        for plant in &document.plants {
            let plant_bars = segment_bars(plant, plantation, &slots, viewport, config);
            connectors.extend(segment_connectors(plant, &plant_bars));
            if selected_plant == Some(plant.id.as_str()) {
                handles.extend(stage_handles(plant, plantation, &plant_bars, viewport, config));
            }
            bars.extend(plant_bars);
        }

        let conflicts = find_overlaps(document)
            .into_iter()
            .flat_map(|overlap| conflict_rects(overlap, &slots, viewport, config))
            .collect();

        Self {
            slots,
            bars,
            connectors,
            handles,
            conflicts,
        }
    }

    /// Stage handle under a screen point.
    pub fn handle_at(&self, point: Point) -> Option<&StageHandle> {
        self.handles.iter().find(|handle| handle.rect.contains(point))
    }

    /// Segment bar under a screen point; later bars win.
    pub fn bar_at(&self, point: Point) -> Option<&SegmentBar> {
        self.bars.iter().rev().find(|bar| bar.rect.contains(point))
    }

    /// Slot under a screen y coordinate.
    pub fn slot_at_screen_y(&self, y: f64, viewport: &TimelineViewport) -> Option<&SlotKey> {
        self.slots.slot_at(y - viewport.pan_y)
    }
}

fn conflict_rects(
    overlap: SegmentOverlap,
    slots: &SlotList,
    viewport: &TimelineViewport,
    config: &TimelineConfig,
) -> Vec<ConflictRect> {
    let left = viewport.date_to_x(overlap.start, config);
    let right = viewport.date_to_x(overlap.end, config);
    overlap
        .cells
        .iter()
        .filter_map(|cell| slots.slot_y(&SlotKey::cell(overlap.space_id.clone(), *cell)))
        .map(|slot_y| ConflictRect {
            rect: Rect::new(left, slot_y + viewport.pan_y, right - left, slots.slot_height()),
            overlap: overlap.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        build_slot_list, date_to_screen_x, screen_x_to_date, snap_days_to_weeks, SlotEntry,
        SlotKey, TimelineLayout, TimelineViewport,
    };
    use crate::config::TimelineConfig;
    use crate::grid::Point;
    use crate::model::plant::{NewPlant, Plant, PlantSize, Stage};
    use crate::model::plantation::Plantation;
    use crate::model::space::{GridCell, Space};
    use crate::segment::{move_segment_to_slot, split_segment};
    use chrono::NaiveDate;
    use std::collections::HashSet;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn plant_in(space: &Space, cell: GridCell) -> Plant {
        Plant::new(NewPlant {
            code: "P-1".to_string(),
            strain_id: None,
            size: PlantSize::Single,
            generation: Default::default(),
            started_at: date(2024, 1, 1),
            space_id: Some(space.id.clone()),
            cell,
        })
    }

    #[test]
    fn date_axis_round_trips() {
        let config = TimelineConfig::default();
        let reference = date(2024, 1, 1);
        for zoom in [0.2, 0.5, 1.0, 1.7, 8.0] {
            for pan_x in [-1234.5, 0.0, 77.25] {
                for days in [-400_i64, -1, 0, 1, 13, 365, 1000] {
                    let day = super::offset_date(reference, days);
                    let x = date_to_screen_x(day, pan_x, reference, zoom, &config);
                    assert_eq!(screen_x_to_date(x, pan_x, reference, zoom, &config), day);
                }
            }
        }
    }

    #[test]
    fn zoom_around_keeps_anchor_date() {
        let config = TimelineConfig::default();
        let mut viewport = TimelineViewport::new(date(2024, 1, 1));
        viewport.pan_x = -300.0;
        let anchor_x = 500.0;
        let before = viewport.x_to_date(anchor_x, &config);
        viewport.zoom_around(anchor_x, 3.0, &config);
        assert_eq!(viewport.x_to_date(anchor_x, &config), before);
    }

    #[test]
    fn week_snapping_rounds_to_nearest_week() {
        assert_eq!(snap_days_to_weeks(3.4), 0);
        assert_eq!(snap_days_to_weeks(3.6), 7);
        assert_eq!(snap_days_to_weeks(-10.0), -7);
        assert_eq!(snap_days_to_weeks(20.0), 21);
    }

    #[test]
    fn slot_list_accumulates_offsets_and_skips_collapsed_cells() {
        let config = TimelineConfig::default();
        let a = Space::new("A", 0.0, 0.0, 2, 1);
        let b = Space::new("B", 200.0, 0.0, 1, 2);
        let c = Space::new("C", 400.0, 0.0, 1, 1);
        let collapsed = HashSet::from([b.id.clone()]);

        let slots = build_slot_list(&[a.clone(), b.clone(), c.clone()], &[], &collapsed, &config);
        let h = config.header_height;
        let s = config.slot_height;
        assert_eq!(slots.entries.len(), 3 + 2 + 1);
        assert_eq!(
            slots.entries[0],
            SlotEntry::Header {
                space_id: Some(a.id.clone()),
                y: 0.0,
                collapsed: false
            }
        );
        assert_eq!(slots.slot_y(&SlotKey::cell(a.id.clone(), GridCell::new(1, 0))), Some(h + s));
        assert_eq!(
            slots.entries[3],
            SlotEntry::Header {
                space_id: Some(b.id.clone()),
                y: h + 2.0 * s,
                collapsed: true
            }
        );
        assert_eq!(
            slots.slot_y(&SlotKey::cell(c.id.clone(), GridCell::new(0, 0))),
            Some(3.0 * h + 2.0 * s)
        );
        assert!(slots.slot_y(&SlotKey::cell(b.id, GridCell::new(0, 0))).is_none());
        assert_eq!(slots.total_height, 3.0 * h + 3.0 * s);
    }

    #[test]
    fn floating_plants_get_a_trailing_section() {
        let config = TimelineConfig::default();
        let a = Space::new("A", 0.0, 0.0, 1, 1);
        let mut plant = plant_in(&a, GridCell::new(0, 0));
        plant.segments[0].space_id = None;

        let slots = build_slot_list(&[a], &[plant.clone()], &HashSet::new(), &config);
        assert_eq!(
            slots.slot_keys().last(),
            Some(&SlotKey::Floating { plant_id: plant.id })
        );
    }

    #[test]
    fn bars_split_into_stage_rects_with_cosmetic_gap() {
        let config = TimelineConfig::default();
        let a = Space::new("A", 0.0, 0.0, 2, 1);
        let mut plantation = Plantation::new("owner", "Home");
        let plant = plant_in(&a, GridCell::new(0, 0));
        let first_id = plant.segments[0].id.clone();
        let plant = split_segment(&plant, first_id.as_str(), date(2024, 1, 15)).unwrap();
        plantation.document.spaces.push(a);
        plantation.document.plants.push(plant.clone());

        let viewport = TimelineViewport::new(date(2024, 1, 1));
        let collapsed = HashSet::new();
        let layout =
            TimelineLayout::compute(&plantation, &collapsed, Some(&plant.id), &viewport, &config);

        assert_eq!(layout.bars.len(), 2);
        let first = &layout.bars[0];
        let second = &layout.bars[1];
        assert_eq!(first.end, date(2024, 1, 15));
        assert_eq!(second.start, date(2024, 1, 15));

        let boundary_x = viewport.date_to_x(date(2024, 1, 15), &config);
        assert_eq!(first.rect.right(), boundary_x - config.split_gap / 2.0);
        assert_eq!(second.rect.x, boundary_x + config.split_gap / 2.0);

        let first_stages = first.stages.iter().map(|s| s.stage).collect::<Vec<_>>();
        assert_eq!(first_stages, vec![Stage::Germinating, Stage::Seedling]);
        assert_eq!(first.stages[1].start, date(2024, 1, 8));
        assert_eq!(first.stages[1].end, date(2024, 1, 15));
        assert_eq!(second.stages[0].stage, Stage::Seedling);
        assert_eq!(second.stages.last().unwrap().stage, Stage::Flowering);

        assert!(layout.connectors.is_empty());
        let handle_stages = layout.handles.iter().map(|h| h.stage).collect::<Vec<_>>();
        assert_eq!(
            handle_stages,
            vec![Stage::Seedling, Stage::Vegetative, Stage::Flowering]
        );
    }

    #[test]
    fn moves_across_slots_produce_connectors() {
        let config = TimelineConfig::default();
        let a = Space::new("A", 0.0, 0.0, 2, 1);
        let plant = plant_in(&a, GridCell::new(0, 0));
        let first_id = plant.segments[0].id.clone();
        let plant = split_segment(&plant, first_id.as_str(), date(2024, 2, 1)).unwrap();
        let tail_id = plant.segments[1].id.clone();
        let plant =
            move_segment_to_slot(&plant, tail_id.as_str(), &a, GridCell::new(1, 0), &[]).unwrap();

        let mut plantation = Plantation::new("owner", "Home");
        plantation.document.spaces.push(a);
        plantation.document.plants.push(plant);
        let viewport = TimelineViewport::new(date(2024, 1, 1));
        let collapsed = HashSet::new();
        let layout = TimelineLayout::compute(&plantation, &collapsed, None, &viewport, &config);

        assert_eq!(layout.connectors.len(), 1);
        let connector = layout.connectors[0];
        assert!(connector.to.y > connector.from.y);
        assert!(layout.handles.is_empty());
    }

    #[test]
    fn hit_tests_find_bars_and_slots() {
        let config = TimelineConfig::default();
        let a = Space::new("A", 0.0, 0.0, 1, 1);
        let plant = plant_in(&a, GridCell::new(0, 0));
        let mut plantation = Plantation::new("owner", "Home");
        plantation.document.spaces.push(a.clone());
        plantation.document.plants.push(plant.clone());
        let viewport = TimelineViewport::new(date(2024, 1, 1));
        let collapsed = HashSet::new();
        let layout = TimelineLayout::compute(&plantation, &collapsed, None, &viewport, &config);

        let y = config.header_height + config.slot_height / 2.0;
        let x = viewport.date_to_x(date(2024, 1, 10), &config);
        assert_eq!(layout.bar_at(Point::new(x, y)).unwrap().plant_id, plant.id);
        assert_eq!(
            layout.slot_at_screen_y(y, &viewport),
            Some(&SlotKey::cell(a.id, GridCell::new(0, 0)))
        );
        assert!(layout.slot_at_screen_y(1.0, &viewport).is_none());
    }

    #[test]
    fn conflicts_are_highlighted_on_the_shared_slot() {
        let config = TimelineConfig::default();
        let a = Space::new("A", 0.0, 0.0, 1, 1);
        let mut first = plant_in(&a, GridCell::new(0, 0));
        first.segments[0].end_date = Some(date(2024, 2, 15));
        let mut second = plant_in(&a, GridCell::new(0, 0));
        second.id = "second".to_string();
        second.started_at = date(2024, 2, 1);
        second.segments[0].start_date = date(2024, 2, 1);

        let mut plantation = Plantation::new("owner", "Home");
        plantation.document.spaces.push(a);
        plantation.document.plants.extend([first, second]);
        let viewport = TimelineViewport::new(date(2024, 1, 1));
        let collapsed = HashSet::new();
        let layout = TimelineLayout::compute(&plantation, &collapsed, None, &viewport, &config);

        assert_eq!(layout.conflicts.len(), 1);
        let rect = layout.conflicts[0].rect;
        assert_eq!(rect.x, viewport.date_to_x(date(2024, 2, 1), &config));
        assert_eq!(rect.right(), viewport.date_to_x(date(2024, 2, 15), &config));
    }

    #[test]
    fn conflicts_highlight_every_shared_footprint_slot() {
        let config = TimelineConfig::default();
        let a = Space::new("A", 0.0, 0.0, 2, 2);
        let mut quad = plant_in(&a, GridCell::new(0, 0));
        quad.size = PlantSize::Quad;
        let mut double = plant_in(&a, GridCell::new(0, 1));
        double.id = "double".to_string();
        double.size = PlantSize::Double;

        let mut plantation = Plantation::new("owner", "Home");
        plantation.document.spaces.push(a.clone());
        plantation.document.plants.extend([quad, double]);
        let viewport = TimelineViewport::new(date(2024, 1, 1));
        let collapsed = HashSet::new();
        let layout = TimelineLayout::compute(&plantation, &collapsed, None, &viewport, &config);

        let mut rows = layout
            .conflicts
            .iter()
            .map(|conflict| conflict.rect.y)
            .collect::<Vec<_>>();
        rows.sort_by(f64::total_cmp);
        let expected = [GridCell::new(0, 1), GridCell::new(1, 1)]
            .into_iter()
            .map(|cell| {
                layout
                    .slots
                    .slot_y(&SlotKey::cell(a.id.clone(), cell))
                    .unwrap()
            })
            .collect::<Vec<_>>();
        assert_eq!(rows, expected);
        assert_eq!(
            layout.conflicts[0].rect.x,
            viewport.date_to_x(date(2024, 1, 1), &config)
        );
    }
}
