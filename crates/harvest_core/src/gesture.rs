//! Pointer gesture state machine.
//!
//! # Responsibility
//! - Turn pointer, wheel and multi-pointer input into view changes and
//!   store commands for both the spatial and the time view.
//! - Expose the in-progress drag as a preview for rendering.
//!
//! # Invariants
//! - The drag mode is chosen once at pointer-down and never re-evaluated
//!   while the pointer stays down.
//! - A drag commits at most one store command, at pointer-up. Releasing
//!   always commits; there is no cancel path.
//! - Movement below the drag threshold is a tap.
//! - While two or more pointers are down only pinch-zoom is active.
//! - Rejected commands never panic; read-only rejections are silent.

use crate::config::{GestureConfig, PlannerConfig, TimelineConfig};
use crate::grid::{
    can_place, find_plant_at, find_space_at, footprint_world_rect, space_world_rect,
    world_to_cell, Point, Rect, Viewport,
};
use crate::model::plant::{PlantId, PlantSize, SegmentId, Stage};
use crate::model::space::{GridCell, SpaceId};
use crate::render::{self, DrawPrimitive, SpaceViewState, TimeViewState};
use crate::segment::current_segment;
use crate::stage::stage_duration;
use crate::store::{
    CommandError, CommandResult, PlacePlant, PlannerStore, PlantSource, SpaceBounds,
};
use crate::timeline::{
    screen_x_to_day_offset, snap_days_to_weeks, SlotKey, TimelineLayout, TimelineViewport,
};
use chrono::NaiveDate;
use log::debug;
use std::collections::{BTreeMap, HashSet};

/// Host-assigned pointer identifier (mouse, pen or touch contact).
pub type PointerId = u64;

/// Pressed device buttons as a bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Buttons(u8);

impl Buttons {
    pub const NONE: Buttons = Buttons(0);
    /// Left mouse button, pen contact or touch.
    pub const PRIMARY: Buttons = Buttons(1);
    pub const SECONDARY: Buttons = Buttons(2);
    pub const MIDDLE: Buttons = Buttons(4);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Buttons) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    /// Secondary or middle button drags always pan.
    fn forces_pan(self) -> bool {
        self.contains(Self::SECONDARY) || self.contains(Self::MIDDLE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Select,
    /// Draw new spaces.
    Space,
    /// Place plants from the placement template.
    Plant,
    Erase,
    /// Split segments in the time view.
    Split,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Space,
    Time,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Space(SpaceId),
    Plant(PlantId),
}

/// Edge or corner of a space being dragged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResizeHandle {
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl ResizeHandle {
    /// Hit-test order: corners before edges.
    pub const ALL: [ResizeHandle; 8] = [
        ResizeHandle::NorthWest,
        ResizeHandle::NorthEast,
        ResizeHandle::SouthWest,
        ResizeHandle::SouthEast,
        ResizeHandle::North,
        ResizeHandle::South,
        ResizeHandle::West,
        ResizeHandle::East,
    ];

    /// `(horizontal, vertical)` edge directions: -1 west/north, 1 east/south.
    fn directions(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::South => (0, 1),
            Self::East => (1, 0),
            Self::West => (-1, 0),
            Self::NorthEast => (1, -1),
            Self::NorthWest => (-1, -1),
            Self::SouthEast => (1, 1),
            Self::SouthWest => (-1, 1),
        }
    }

    /// Handle position on a rectangle.
    pub fn anchor(self, rect: &Rect) -> Point {
        let (h, v) = self.directions();
        let x = match h {
            -1 => rect.x,
            1 => rect.right(),
            _ => rect.x + rect.width / 2.0,
        };
        let y = match v {
            -1 => rect.y,
            1 => rect.bottom(),
            _ => rect.y + rect.height / 2.0,
        };
        Point::new(x, y)
    }

    /// Moves the dragged edges by whole cells, keeping at least 1x1.
    ///
    /// The opposite edges stay fixed.
    pub fn apply(self, bounds: SpaceBounds, dx: i32, dy: i32, cell_size: f64) -> SpaceBounds {
        let (h, v) = self.directions();
        let (x, width) = resize_axis(bounds.x, bounds.width, h, dx, cell_size);
        let (y, height) = resize_axis(bounds.y, bounds.height, v, dy, cell_size);
        SpaceBounds {
            x,
            y,
            width,
            height,
        }
    }
}

fn resize_axis(origin: f64, length: u32, direction: i32, delta: i32, cell_size: f64) -> (f64, u32) {
    let length = i64::from(length);
    let delta = i64::from(delta);
    match direction {
        1 => (origin, (length + delta).max(1) as u32),
        -1 => {
            let applied = delta.min(length - 1);
            (origin + applied as f64 * cell_size, (length - applied) as u32)
        }
        _ => (origin, length as u32),
    }
}

/// Handle of `rect` within `radius` of `point`, corners first.
pub fn resize_handle_at(rect: &Rect, point: Point, radius: f64) -> Option<ResizeHandle> {
    ResizeHandle::ALL.into_iter().find(|handle| {
        let anchor = handle.anchor(rect);
        (point.x - anchor.x).abs() <= radius && (point.y - anchor.y).abs() <= radius
    })
}

/// What the plant tool places on tap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementTemplate {
    pub source: PlantSource,
    pub size: PlantSize,
}

impl Default for PlacementTemplate {
    fn default() -> Self {
        Self {
            source: PlantSource::Unassigned,
            size: PlantSize::Single,
        }
    }
}

/// Active drag mode, latched at pointer-down.
#[derive(Debug, Clone, PartialEq)]
pub enum DragMode {
    Idle,
    /// Continuous pan; `origin_pan` is the pan at pointer-down.
    Panning { origin_pan: Point },
    /// `anchor` is the content point under the starting pinch midpoint.
    PinchZooming {
        anchor: Point,
        start_distance: f64,
        start_zoom: f64,
    },
    SpaceDragPreview,
    SpaceMove { space_id: SpaceId },
    SpaceResize {
        space_id: SpaceId,
        handle: ResizeHandle,
    },
    /// `grab_offset` is the grabbed cell relative to the plant anchor.
    PlantDrag {
        plant_id: PlantId,
        grab_offset: GridCell,
    },
    TimePlantMove {
        plant_id: PlantId,
        segment_id: SegmentId,
    },
    TimeStageResize { plant_id: PlantId, stage: Stage },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PointerSession {
    pointer_id: PointerId,
    origin: Point,
    current: Point,
    dragging: bool,
}

/// In-progress drag shown by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum DragPreview {
    /// Snapped world rectangle of a space being drawn.
    NewSpace { world: Rect },
    /// Snapped world rectangle of a space being moved or resized.
    Space { space_id: SpaceId, world: Rect },
    /// Snapped footprint of a plant being dragged.
    Plant {
        plant_id: PlantId,
        world: Rect,
        valid: bool,
    },
    /// Week-snapped shift and target slot of a time-view move.
    TimeMove {
        plant_id: PlantId,
        segment_id: SegmentId,
        shift_days: i64,
        target: Option<SlotKey>,
    },
    StageResize {
        plant_id: PlantId,
        stage: Stage,
        days: u32,
    },
}

/// Gesture controller for one planner view.
#[derive(Debug, Clone)]
pub struct GestureController {
    gesture: GestureConfig,
    timeline: TimelineConfig,
    cell_size: f64,
    tool: Tool,
    view_mode: ViewMode,
    view_date: NaiveDate,
    placement: PlacementTemplate,
    selection: Option<Selection>,
    viewport: Viewport,
    time_viewport: TimelineViewport,
    collapsed: HashSet<SpaceId>,
    pointers: BTreeMap<PointerId, Point>,
    session: Option<PointerSession>,
    mode: DragMode,
    last_rejection: Option<CommandError>,
}

impl GestureController {
    pub fn new(config: &PlannerConfig, view_date: NaiveDate) -> Self {
        let config = config.clone().normalized();
        Self {
            gesture: config.gesture,
            timeline: config.timeline,
            cell_size: config.cell_size,
            tool: Tool::default(),
            view_mode: ViewMode::default(),
            view_date,
            placement: PlacementTemplate::default(),
            selection: None,
            viewport: Viewport::default(),
            time_viewport: TimelineViewport::new(view_date),
            collapsed: HashSet::new(),
            pointers: BTreeMap::new(),
            session: None,
            mode: DragMode::Idle,
            last_rejection: None,
        }
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// Selects a tool. Read-only sessions stay on `Select`.
    pub fn set_tool(&mut self, store: &PlannerStore, tool: Tool) {
        self.tool = if store.can_edit() { tool } else { Tool::Select };
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn set_view_mode(&mut self, view_mode: ViewMode) {
        self.view_mode = view_mode;
    }

    /// Date at which the spatial view shows placements.
    pub fn view_date(&self) -> NaiveDate {
        self.view_date
    }

    pub fn set_view_date(&mut self, date: NaiveDate) {
        self.view_date = date;
    }

    pub fn placement(&self) -> &PlacementTemplate {
        &self.placement
    }

    pub fn set_placement(&mut self, placement: PlacementTemplate) {
        self.placement = placement;
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn select(&mut self, selection: Option<Selection>) {
        self.selection = selection;
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn time_viewport(&self) -> &TimelineViewport {
        &self.time_viewport
    }

    pub fn mode(&self) -> &DragMode {
        &self.mode
    }

    pub fn collapsed(&self) -> &HashSet<SpaceId> {
        &self.collapsed
    }

    /// Collapses or expands a space header in the time view.
    pub fn toggle_collapsed(&mut self, space_id: &str) {
        if !self.collapsed.remove(space_id) {
            self.collapsed.insert(space_id.to_string());
        }
    }

    /// Last rejected command, for an inline message. Read-only rejections
    /// are never recorded.
    pub fn take_rejection(&mut self) -> Option<CommandError> {
        self.last_rejection.take()
    }

    pub fn on_pointer_down(
        &mut self,
        store: &mut PlannerStore,
        pointer_id: PointerId,
        point: Point,
        buttons: Buttons,
    ) {
        self.pointers.insert(pointer_id, point);
        if self.pointers.len() >= 2 {
            self.begin_pinch();
            return;
        }
        if self.session.is_some() {
            return;
        }

        self.mode = if buttons.forces_pan() {
            self.panning()
        } else {
            match self.view_mode {
                ViewMode::Space => self.space_mode_at(store, point),
                ViewMode::Time => self.time_mode_at(store, point),
            }
        };
        debug!(
            "event=gesture_start module=gesture view={:?} tool={:?} mode={}",
            self.view_mode,
            self.tool,
            mode_name(&self.mode)
        );
        self.session = Some(PointerSession {
            pointer_id,
            origin: point,
            current: point,
            dragging: false,
        });
    }

    pub fn on_pointer_move(&mut self, pointer_id: PointerId, point: Point) {
        match self.pointers.get_mut(&pointer_id) {
            Some(tracked) => *tracked = point,
            None => return,
        }
        if matches!(self.mode, DragMode::PinchZooming { .. }) {
            self.update_pinch();
            return;
        }

        let threshold = self.gesture.drag_threshold_px;
        let Some(session) = self
            .session
            .as_mut()
            .filter(|session| session.pointer_id == pointer_id)
        else {
            return;
        };
        session.current = point;
        if !session.dragging && session.origin.distance(point) >= threshold {
            session.dragging = true;
        }
        let session = *session;

        if let DragMode::Panning { origin_pan } = self.mode {
            if session.dragging {
                self.apply_pan(origin_pan, session);
            }
        }
    }

    pub fn on_pointer_up(&mut self, store: &mut PlannerStore, pointer_id: PointerId, point: Point) {
        self.pointers.remove(&pointer_id);
        if matches!(self.mode, DragMode::PinchZooming { .. }) {
            if self.pointers.len() < 2 {
                self.mode = DragMode::Idle;
            }
            return;
        }

        let Some(mut session) = self.session.take() else {
            return;
        };
        if session.pointer_id != pointer_id {
            self.session = Some(session);
            return;
        }
        session.current = point;
        session.dragging |= session.origin.distance(point) >= self.gesture.drag_threshold_px;

        let mode = std::mem::replace(&mut self.mode, DragMode::Idle);
        if session.dragging {
            self.commit_drag(store, mode, session);
        } else {
            self.tap(store, session.origin);
        }
    }

    /// Wheel zoom around `point`; negative `delta_y` zooms in.
    pub fn on_wheel(&mut self, point: Point, delta_y: f64) {
        let factor = self.gesture.wheel_zoom_step.powf(-delta_y / 100.0);
        match self.view_mode {
            ViewMode::Space => {
                let zoom = clamp_zoom(self.viewport.zoom * factor, &self.gesture);
                self.viewport.zoom_around(point, zoom);
            }
            ViewMode::Time => {
                let zoom = (self.time_viewport.zoom * factor)
                    .clamp(self.timeline.min_zoom, self.timeline.max_zoom);
                self.time_viewport.zoom_around(point.x, zoom, &self.timeline);
            }
        }
    }

    /// Preview of the drag in progress, once past the threshold.
    pub fn preview(&self, store: &PlannerStore) -> Option<DragPreview> {
        let session = self.session.filter(|session| session.dragging)?;
        let plantation = store.plantation();
        match &self.mode {
            DragMode::SpaceDragPreview => self
                .new_space_bounds(session)
                .map(|bounds| DragPreview::NewSpace {
                    world: bounds_rect(&bounds, self.cell_size),
                }),
            DragMode::SpaceMove { space_id } => {
                let space = plantation.space(space_id)?;
                let (dx, dy) = self.cell_delta(session);
                let mut rect = space_world_rect(space, self.cell_size);
                rect.x += f64::from(dx) * self.cell_size;
                rect.y += f64::from(dy) * self.cell_size;
                Some(DragPreview::Space {
                    space_id: space_id.clone(),
                    world: rect,
                })
            }
            DragMode::SpaceResize { space_id, handle } => {
                let space = plantation.space(space_id)?;
                let (dx, dy) = self.cell_delta(session);
                let bounds = handle.apply(SpaceBounds::from(space), dx, dy, self.cell_size);
                Some(DragPreview::Space {
                    space_id: space_id.clone(),
                    world: bounds_rect(&bounds, self.cell_size),
                })
            }
            DragMode::PlantDrag {
                plant_id,
                grab_offset,
            } => {
                let (space_id, cell) = self.plant_drop_target(store, session, *grab_offset)?;
                let plant = plantation.plant(plant_id)?;
                let space = plantation.space(&space_id)?;
                let valid = can_place(
                    space,
                    cell,
                    plant.size,
                    &plantation.document.plants,
                    Some(plant_id.as_str()),
                    self.view_date,
                );
                Some(DragPreview::Plant {
                    plant_id: plant_id.clone(),
                    world: footprint_world_rect(space, cell, plant.size, self.cell_size),
                    valid,
                })
            }
            DragMode::TimePlantMove {
                plant_id,
                segment_id,
            } => {
                let layout = self.timeline_layout(store);
                Some(DragPreview::TimeMove {
                    plant_id: plant_id.clone(),
                    segment_id: segment_id.clone(),
                    shift_days: self.week_delta(session),
                    target: layout
                        .slot_at_screen_y(session.current.y, &self.time_viewport)
                        .cloned(),
                })
            }
            DragMode::TimeStageResize { plant_id, stage } => {
                let days = self.resized_stage_days(store, plant_id, *stage, session)?;
                Some(DragPreview::StageResize {
                    plant_id: plant_id.clone(),
                    stage: *stage,
                    days,
                })
            }
            DragMode::Idle | DragMode::Panning { .. } | DragMode::PinchZooming { .. } => None,
        }
    }

    /// Draw list for the active view, including any drag preview.
    pub fn snapshot(&self, store: &PlannerStore) -> Vec<DrawPrimitive> {
        let preview = self.preview(store);
        match self.view_mode {
            ViewMode::Space => render::space_view(
                store.plantation(),
                &SpaceViewState {
                    viewport: self.viewport,
                    cell_size: self.cell_size,
                    view_date: self.view_date,
                    selection: self.selection.as_ref(),
                    preview: preview.as_ref(),
                    handle_size: self.gesture.resize_handle_px,
                    show_handles: store.can_edit(),
                },
            ),
            ViewMode::Time => render::time_view(
                store.plantation(),
                &self.timeline_layout(store),
                &TimeViewState {
                    viewport: self.time_viewport,
                    config: &self.timeline,
                    selection: self.selection.as_ref(),
                    preview: preview.as_ref(),
                },
            ),
        }
    }

    /// Time-view layout for the current selection and viewport.
    pub fn timeline_layout(&self, store: &PlannerStore) -> TimelineLayout {
        let selected_plant = match &self.selection {
            Some(Selection::Plant(plant_id)) => Some(plant_id.as_str()),
            _ => None,
        };
        TimelineLayout::compute(
            store.plantation(),
            &self.collapsed,
            selected_plant,
            &self.time_viewport,
            &self.timeline,
        )
    }

    fn panning(&self) -> DragMode {
        let origin_pan = match self.view_mode {
            ViewMode::Space => self.viewport.pan,
            ViewMode::Time => Point::new(self.time_viewport.pan_x, self.time_viewport.pan_y),
        };
        DragMode::Panning { origin_pan }
    }

    fn apply_pan(&mut self, origin_pan: Point, session: PointerSession) {
        let dx = session.current.x - session.origin.x;
        let dy = session.current.y - session.origin.y;
        match self.view_mode {
            ViewMode::Space => {
                self.viewport.pan = Point::new(origin_pan.x + dx, origin_pan.y + dy);
            }
            ViewMode::Time => {
                self.time_viewport.pan_x = origin_pan.x + dx;
                self.time_viewport.pan_y = origin_pan.y + dy;
            }
        }
    }

    fn space_mode_at(&mut self, store: &PlannerStore, point: Point) -> DragMode {
        if !store.can_edit() {
            return self.panning();
        }
        let plantation = store.plantation();
        let document = &plantation.document;
        let world = self.viewport.screen_to_world(point);

        match self.tool {
            Tool::Space => DragMode::SpaceDragPreview,
            Tool::Select => {
                if let Some(Selection::Space(space_id)) = &self.selection {
                    if let Some(space) = plantation.space(space_id) {
                        let rect = self.screen_rect(&space_world_rect(space, self.cell_size));
                        if let Some(handle) =
                            resize_handle_at(&rect, point, self.gesture.resize_handle_px)
                        {
                            return DragMode::SpaceResize {
                                space_id: space_id.clone(),
                                handle,
                            };
                        }
                    }
                }

                let hit_plant = find_plant_at(
                    world,
                    &document.plants,
                    &document.spaces,
                    self.cell_size,
                    self.view_date,
                );
                if let Some(plant) = hit_plant {
                    let grab_offset = current_segment(plant, self.view_date)
                        .and_then(|segment| {
                            let space = plantation.space(segment.space_id.as_deref()?)?;
                            let grabbed = world_to_cell(space, world, self.cell_size);
                            Some(grabbed.offset(-segment.grid_x, -segment.grid_y))
                        })
                        .unwrap_or(GridCell::new(0, 0));
                    self.selection = Some(Selection::Plant(plant.id.clone()));
                    return DragMode::PlantDrag {
                        plant_id: plant.id.clone(),
                        grab_offset,
                    };
                }

                if let Some(space) = find_space_at(world, &document.spaces, self.cell_size) {
                    self.selection = Some(Selection::Space(space.id.clone()));
                    return DragMode::SpaceMove {
                        space_id: space.id.clone(),
                    };
                }
                self.panning()
            }
            Tool::Plant | Tool::Erase | Tool::Split => self.panning(),
        }
    }

    fn time_mode_at(&mut self, store: &PlannerStore, point: Point) -> DragMode {
        if !store.can_edit() || self.tool != Tool::Select {
            return self.panning();
        }
        let layout = self.timeline_layout(store);
        if let Some(handle) = layout.handle_at(point) {
            return DragMode::TimeStageResize {
                plant_id: handle.plant_id.clone(),
                stage: handle.stage,
            };
        }
        if let Some(bar) = layout.bar_at(point) {
            self.selection = Some(Selection::Plant(bar.plant_id.clone()));
            return DragMode::TimePlantMove {
                plant_id: bar.plant_id.clone(),
                segment_id: bar.segment_id.clone(),
            };
        }
        self.panning()
    }

    fn begin_pinch(&mut self) {
        let mut points = self.pointers.values().copied();
        let (Some(first), Some(second)) = (points.next(), points.next()) else {
            return;
        };
        let midpoint = first.midpoint(second);
        let (anchor, start_zoom) = match self.view_mode {
            ViewMode::Space => (self.viewport.screen_to_world(midpoint), self.viewport.zoom),
            ViewMode::Time => (
                Point::new(
                    screen_x_to_day_offset(
                        midpoint.x,
                        self.time_viewport.pan_x,
                        self.time_viewport.zoom,
                        &self.timeline,
                    ),
                    midpoint.y - self.time_viewport.pan_y,
                ),
                self.time_viewport.zoom,
            ),
        };
        if self.session.take().is_some() {
            debug!("event=gesture_pinch module=gesture status=override");
        }
        self.mode = DragMode::PinchZooming {
            anchor,
            start_distance: first.distance(second).max(f64::EPSILON),
            start_zoom,
        };
    }

    fn update_pinch(&mut self) {
        let DragMode::PinchZooming {
            anchor,
            start_distance,
            start_zoom,
        } = self.mode
        else {
            return;
        };
        let mut points = self.pointers.values().copied();
        let (Some(first), Some(second)) = (points.next(), points.next()) else {
            return;
        };
        let midpoint = first.midpoint(second);
        let scale = first.distance(second) / start_distance;

        match self.view_mode {
            ViewMode::Space => {
                let zoom = clamp_zoom(start_zoom * scale, &self.gesture);
                self.viewport.zoom = zoom;
                self.viewport.pan =
                    Point::new(midpoint.x - anchor.x * zoom, midpoint.y - anchor.y * zoom);
            }
            ViewMode::Time => {
                let zoom =
                    (start_zoom * scale).clamp(self.timeline.min_zoom, self.timeline.max_zoom);
                self.time_viewport.zoom = zoom;
                self.time_viewport.pan_x = midpoint.x
                    - self.timeline.left_margin
                    - anchor.x * self.timeline.day_width * zoom;
                self.time_viewport.pan_y = midpoint.y - anchor.y;
            }
        }
    }

    fn commit_drag(&mut self, store: &mut PlannerStore, mode: DragMode, session: PointerSession) {
        let cell_size = self.cell_size;
        match mode {
            DragMode::Idle | DragMode::Panning { .. } | DragMode::PinchZooming { .. } => {}
            DragMode::SpaceDragPreview => {
                if let Some(bounds) = self.new_space_bounds(session) {
                    let name = format!("Space {}", store.document().spaces.len() + 1);
                    let result =
                        store.add_space(&name, bounds.x, bounds.y, bounds.width, bounds.height);
                    if let Some(space_id) = self.report("add_space", result) {
                        self.selection = Some(Selection::Space(space_id));
                    }
                }
            }
            DragMode::SpaceMove { space_id } => {
                let (dx, dy) = self.cell_delta(session);
                let Some(space) = store.plantation().space(&space_id) else {
                    return;
                };
                if dx != 0 || dy != 0 {
                    let x = space.x + f64::from(dx) * cell_size;
                    let y = space.y + f64::from(dy) * cell_size;
                    let result = store.move_space(&space_id, x, y);
                    self.report("move_space", result);
                }
            }
            DragMode::SpaceResize { space_id, handle } => {
                let (dx, dy) = self.cell_delta(session);
                let Some(space) = store.plantation().space(&space_id) else {
                    return;
                };
                let current = SpaceBounds::from(space);
                let bounds = handle.apply(current, dx, dy, cell_size);
                if bounds != current {
                    let result = store.resize_space(&space_id, bounds);
                    self.report("resize_space", result);
                }
            }
            DragMode::PlantDrag {
                plant_id,
                grab_offset,
            } => {
                let target = self.plant_drop_target(store, session, grab_offset);
                if let Some((space_id, cell)) = target {
                    let result = store.relocate_plant(&plant_id, self.view_date, &space_id, cell);
                    self.report("relocate_plant", result);
                }
            }
            DragMode::TimePlantMove {
                plant_id,
                segment_id,
            } => {
                let shift_days = self.week_delta(session);
                let target = match self
                    .timeline_layout(store)
                    .slot_at_screen_y(session.current.y, &self.time_viewport)
                {
                    Some(SlotKey::Cell { space_id, cell }) => Some((space_id.clone(), *cell)),
                    _ => None,
                };
                let moves_slot = target.as_ref().is_some_and(|(space_id, cell)| {
                    store
                        .plantation()
                        .plant(&plant_id)
                        .and_then(|plant| plant.segment(&segment_id))
                        .is_some_and(|segment| {
                            segment.space_id.as_ref() != Some(space_id) || segment.cell() != *cell
                        })
                });
                if shift_days != 0 || moves_slot {
                    let target = if moves_slot { target } else { None };
                    let result =
                        store.move_plant_in_time(&plant_id, &segment_id, shift_days, target);
                    self.report("move_plant_in_time", result);
                }
            }
            DragMode::TimeStageResize { plant_id, stage } => {
                let Some(days) = self.resized_stage_days(store, &plant_id, stage, session) else {
                    return;
                };
                if self.week_delta(session) != 0 {
                    let result = store.resize_stage(&plant_id, stage, days);
                    self.report("resize_stage", result);
                }
            }
        }
    }

    fn tap(&mut self, store: &mut PlannerStore, point: Point) {
        match self.view_mode {
            ViewMode::Space => self.space_tap(store, point),
            ViewMode::Time => self.time_tap(store, point),
        }
    }

    fn space_tap(&mut self, store: &mut PlannerStore, point: Point) {
        let world = self.viewport.screen_to_world(point);
        let document = store.document();
        let hit_plant = find_plant_at(
            world,
            &document.plants,
            &document.spaces,
            self.cell_size,
            self.view_date,
        )
        .map(|plant| plant.id.clone());
        let hit_space = find_space_at(world, &document.spaces, self.cell_size)
            .map(|space| (space.id.clone(), world_to_cell(space, world, self.cell_size)));

        match self.tool {
            Tool::Select => {
                self.selection = hit_plant
                    .map(Selection::Plant)
                    .or_else(|| hit_space.map(|(space_id, _)| Selection::Space(space_id)));
            }
            Tool::Plant => {
                let Some((space_id, cell)) = hit_space else {
                    return;
                };
                let result = store.place_plant(PlacePlant {
                    source: self.placement.source.clone(),
                    space_id,
                    cell,
                    size: self.placement.size,
                    started_at: self.view_date,
                });
                if let Some(plant_id) = self.report("place_plant", result) {
                    self.selection = Some(Selection::Plant(plant_id));
                }
            }
            Tool::Erase => {
                if let Some(plant_id) = hit_plant {
                    let result = store.delete_plant(&plant_id);
                    self.report("delete_plant", result);
                } else if let Some((space_id, _)) = hit_space {
                    let result = store.delete_space(&space_id, self.view_date);
                    self.report("delete_space", result);
                }
                self.selection = None;
            }
            Tool::Space | Tool::Split => {}
        }
    }

    fn time_tap(&mut self, store: &mut PlannerStore, point: Point) {
        let layout = self.timeline_layout(store);
        let hit = layout
            .bar_at(point)
            .map(|bar| (bar.plant_id.clone(), bar.segment_id.clone()));

        match self.tool {
            Tool::Select => {
                self.selection = hit.map(|(plant_id, _)| Selection::Plant(plant_id));
            }
            Tool::Split => {
                if let Some((plant_id, segment_id)) = hit {
                    let at = self.time_viewport.x_to_date(point.x, &self.timeline);
                    let result = store.split_segment(&plant_id, &segment_id, at);
                    self.report("split_segment", result);
                }
            }
            Tool::Erase => {
                if let Some((plant_id, _)) = hit {
                    let result = store.delete_plant(&plant_id);
                    self.report("delete_plant", result);
                    self.selection = None;
                }
            }
            Tool::Space | Tool::Plant => {}
        }
    }

    /// Records a rejected command; read-only rejections stay silent.
    fn report<T>(&mut self, action: &'static str, result: CommandResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(CommandError::ReadOnly) => None,
            Err(err) => {
                debug!(
                    "event=gesture_commit module=gesture status=rejected action={} error={}",
                    action, err
                );
                self.last_rejection = Some(err);
                None
            }
        }
    }

    fn screen_rect(&self, world: &Rect) -> Rect {
        let top_left = self.viewport.world_to_screen(Point::new(world.x, world.y));
        Rect::new(
            top_left.x,
            top_left.y,
            world.width * self.viewport.zoom,
            world.height * self.viewport.zoom,
        )
    }

    /// Drag delta in whole cells, rounded.
    fn cell_delta(&self, session: PointerSession) -> (i32, i32) {
        let step = self.cell_size * self.viewport.zoom;
        (
            ((session.current.x - session.origin.x) / step).round() as i32,
            ((session.current.y - session.origin.y) / step).round() as i32,
        )
    }

    /// Horizontal time-view drag delta in whole weeks of days.
    fn week_delta(&self, session: PointerSession) -> i64 {
        let day_px = self.time_viewport.day_width(&self.timeline);
        snap_days_to_weeks((session.current.x - session.origin.x) / day_px)
    }

    fn new_space_bounds(&self, session: PointerSession) -> Option<SpaceBounds> {
        let start = self.viewport.screen_to_world(session.origin);
        let end = self.viewport.screen_to_world(session.current);
        let rect = Rect::from_corners(start, end);
        let left = (rect.x / self.cell_size).floor();
        let top = (rect.y / self.cell_size).floor();
        let right = (rect.right() / self.cell_size).ceil();
        let bottom = (rect.bottom() / self.cell_size).ceil();
        let width = (right - left).max(0.0) as u32;
        let height = (bottom - top).max(0.0) as u32;
        (width >= 1 && height >= 1).then(|| SpaceBounds {
            x: left * self.cell_size,
            y: top * self.cell_size,
            width,
            height,
        })
    }

    fn plant_drop_target(
        &self,
        store: &PlannerStore,
        session: PointerSession,
        grab_offset: GridCell,
    ) -> Option<(SpaceId, GridCell)> {
        let world = self.viewport.screen_to_world(session.current);
        let space = find_space_at(world, &store.document().spaces, self.cell_size)?;
        let cell =
            world_to_cell(space, world, self.cell_size).offset(-grab_offset.x, -grab_offset.y);
        Some((space.id.clone(), cell))
    }

    fn resized_stage_days(
        &self,
        store: &PlannerStore,
        plant_id: &str,
        stage: Stage,
        session: PointerSession,
    ) -> Option<u32> {
        let plantation = store.plantation();
        let plant = plantation.plant(plant_id)?;
        let current = i64::from(stage_duration(stage, plant, plantation.strain_for(plant)));
        let days = (current + self.week_delta(session)).clamp(0, i64::from(u32::MAX));
        u32::try_from(days).ok()
    }
}

fn clamp_zoom(zoom: f64, config: &GestureConfig) -> f64 {
    zoom.clamp(config.min_zoom, config.max_zoom)
}

fn bounds_rect(bounds: &SpaceBounds, cell_size: f64) -> Rect {
    Rect::new(
        bounds.x,
        bounds.y,
        f64::from(bounds.width) * cell_size,
        f64::from(bounds.height) * cell_size,
    )
}

fn mode_name(mode: &DragMode) -> &'static str {
    match mode {
        DragMode::Idle => "idle",
        DragMode::Panning { .. } => "panning",
        DragMode::PinchZooming { .. } => "pinch_zooming",
        DragMode::SpaceDragPreview => "space_drag_preview",
        DragMode::SpaceMove { .. } => "space_move",
        DragMode::SpaceResize { .. } => "space_resize",
        DragMode::PlantDrag { .. } => "plant_drag",
        DragMode::TimePlantMove { .. } => "time_plant_move",
        DragMode::TimeStageResize { .. } => "time_stage_resize",
    }
}

#[cfg(test)]
mod tests {
    use super::{resize_handle_at, Buttons, ResizeHandle};
    use crate::grid::{Point, Rect};
    use crate::store::SpaceBounds;

    const CELL: f64 = 56.0;

    fn bounds(x: f64, y: f64, width: u32, height: u32) -> SpaceBounds {
        SpaceBounds {
            x,
            y,
            width,
            height,
        }
    }

    #[test]
    fn east_and_south_handles_grow_without_moving_origin() {
        let resized = ResizeHandle::SouthEast.apply(bounds(0.0, 0.0, 2, 2), 1, 3, CELL);
        assert_eq!(resized, bounds(0.0, 0.0, 3, 5));
    }

    #[test]
    fn west_handle_moves_origin_and_keeps_east_edge() {
        let resized = ResizeHandle::West.apply(bounds(112.0, 0.0, 3, 1), -1, 5, CELL);
        assert_eq!(resized, bounds(56.0, 0.0, 4, 1));
        let shrunk = ResizeHandle::West.apply(bounds(112.0, 0.0, 3, 1), 10, 0, CELL);
        assert_eq!(shrunk, bounds(224.0, 0.0, 1, 1));
    }

    #[test]
    fn north_handle_never_collapses_below_one_cell() {
        let resized = ResizeHandle::North.apply(bounds(0.0, 0.0, 2, 2), 0, 4, CELL);
        assert_eq!(resized, bounds(0.0, 56.0, 2, 1));
    }

    #[test]
    fn corner_handles_win_over_edges() {
        let rect = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert_eq!(
            resize_handle_at(&rect, Point::new(2.0, 3.0), 10.0),
            Some(ResizeHandle::NorthWest)
        );
        assert_eq!(
            resize_handle_at(&rect, Point::new(50.0, 98.0), 10.0),
            Some(ResizeHandle::South)
        );
        assert_eq!(resize_handle_at(&rect, Point::new(50.0, 50.0), 10.0), None);
    }

    #[test]
    fn button_sets_detect_pan_buttons() {
        assert!(Buttons::from_bits(0b110).forces_pan());
        assert!(!Buttons::PRIMARY.forces_pan());
        assert!(!Buttons::NONE.contains(Buttons::NONE));
    }
}
