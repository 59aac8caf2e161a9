//! Grid and coordinate engine.
//!
//! # Responsibility
//! - Convert between screen, pan/zoom world and discrete grid cell space.
//! - Answer occupancy, placement-validity and hit-test queries.
//!
//! # Invariants
//! - `world_to_screen(screen_to_world(p)) == p` within float tolerance.
//! - Hit tests use half-open intervals `[origin, origin + size)`.
//! - Negative cells are never placeable.

use crate::model::plant::{Plant, PlantSize};
use crate::model::space::{GridCell, Space};
use crate::segment::current_segment;
use chrono::NaiveDate;
use std::collections::HashSet;

/// Point in screen or world pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a normalized rect spanning two corners.
    pub fn from_corners(a: Point, b: Point) -> Self {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        Self::new(x, y, (a.x - b.x).abs(), (a.y - b.y).abs())
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Half-open containment.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    pub fn expand(&self, by: f64) -> Rect {
        Rect::new(
            self.x - by,
            self.y - by,
            self.width + by * 2.0,
            self.height + by * 2.0,
        )
    }
}

/// Pan/zoom state of the spatial view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub pan: Point,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            pan: Point::default(),
            zoom: 1.0,
        }
    }
}

impl Viewport {
    pub fn screen_to_world(&self, screen: Point) -> Point {
        screen_to_world(screen, self.pan, self.zoom)
    }

    pub fn world_to_screen(&self, world: Point) -> Point {
        world_to_screen(world, self.pan, self.zoom)
    }

    /// Re-zooms keeping the world point under `anchor` fixed on screen.
    pub fn zoom_around(&mut self, anchor: Point, new_zoom: f64) {
        let world = self.screen_to_world(anchor);
        self.zoom = new_zoom;
        self.pan = Point::new(anchor.x - world.x * new_zoom, anchor.y - world.y * new_zoom);
    }
}

/// `world = (screen - pan) / zoom`.
pub fn screen_to_world(screen: Point, pan: Point, zoom: f64) -> Point {
    Point::new((screen.x - pan.x) / zoom, (screen.y - pan.y) / zoom)
}

/// Inverse of [`screen_to_world`].
pub fn world_to_screen(world: Point, pan: Point, zoom: f64) -> Point {
    Point::new(world.x * zoom + pan.x, world.y * zoom + pan.y)
}

/// Floors a world coordinate to the nearest cell boundary at or below it.
pub fn snap_to_grid(value: f64, cell_size: f64) -> f64 {
    (value / cell_size).floor() * cell_size
}

/// World rectangle covered by a space.
pub fn space_world_rect(space: &Space, cell_size: f64) -> Rect {
    Rect::new(
        space.x,
        space.y,
        f64::from(space.width) * cell_size,
        f64::from(space.height) * cell_size,
    )
}

/// Cell of `space` under a world point (may lie outside the grid).
pub fn world_to_cell(space: &Space, world: Point, cell_size: f64) -> GridCell {
    GridCell::new(
        ((world.x - space.x) / cell_size).floor() as i32,
        ((world.y - space.y) / cell_size).floor() as i32,
    )
}

/// Top-left world point of a cell.
pub fn cell_to_world(space: &Space, cell: GridCell, cell_size: f64) -> Point {
    Point::new(
        space.x + f64::from(cell.x) * cell_size,
        space.y + f64::from(cell.y) * cell_size,
    )
}

/// World rectangle of a plant footprint anchored at `anchor`.
pub fn footprint_world_rect(
    space: &Space,
    anchor: GridCell,
    size: PlantSize,
    cell_size: f64,
) -> Rect {
    let origin = cell_to_world(space, anchor, cell_size);
    Rect::new(
        origin.x,
        origin.y,
        f64::from(size.width()) * cell_size,
        f64::from(size.height()) * cell_size,
    )
}

/// Cells a plant occupies on `as_of`, with the space they belong to.
///
/// Floating plants (no space on their current segment) occupy nothing.
pub fn cells_occupied_by(plant: &Plant, as_of: NaiveDate) -> Option<(&str, Vec<GridCell>)> {
    let segment = current_segment(plant, as_of)?;
    let space_id = segment.space_id.as_deref()?;
    Some((space_id, plant.size.footprint(segment.cell())))
}

/// Occupied cells of `space` on `as_of`, ignoring `exclude_plant_id`.
pub fn occupied_cells(
    space: &Space,
    plants: &[Plant],
    exclude_plant_id: Option<&str>,
    as_of: NaiveDate,
) -> HashSet<GridCell> {
    plants
        .iter()
        .filter(|plant| Some(plant.id.as_str()) != exclude_plant_id)
        .filter_map(|plant| cells_occupied_by(plant, as_of))
        .filter(|(space_id, _)| *space_id == space.id)
        .flat_map(|(_, cells)| cells)
        .collect()
}

/// Whether a footprint fits inside `space` without touching other plants.
pub fn can_place(
    space: &Space,
    anchor: GridCell,
    size: PlantSize,
    plants: &[Plant],
    exclude_plant_id: Option<&str>,
    as_of: NaiveDate,
) -> bool {
    let footprint = size.footprint(anchor);
    if !footprint.iter().all(|cell| space.contains_cell(*cell)) {
        return false;
    }
    let occupied = occupied_cells(space, plants, exclude_plant_id, as_of);
    footprint.iter().all(|cell| !occupied.contains(cell))
}

/// First space whose world rectangle contains `world`.
pub fn find_space_at<'a>(world: Point, spaces: &'a [Space], cell_size: f64) -> Option<&'a Space> {
    spaces
        .iter()
        .find(|space| space_world_rect(space, cell_size).contains(world))
}

/// First plant whose footprint contains `world` on `as_of`.
pub fn find_plant_at<'a>(
    world: Point,
    plants: &'a [Plant],
    spaces: &[Space],
    cell_size: f64,
    as_of: NaiveDate,
) -> Option<&'a Plant> {
    plants.iter().find(|plant| {
        let Some(segment) = current_segment(plant, as_of) else {
            return false;
        };
        let Some(space) = segment
            .space_id
            .as_deref()
            .and_then(|space_id| spaces.iter().find(|space| space.id == space_id))
        else {
            return false;
        };
        footprint_world_rect(space, segment.cell(), plant.size, cell_size).contains(world)
    })
}
