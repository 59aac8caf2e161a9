//! Grow space model.
//!
//! # Responsibility
//! - Describe one rectangular grid area in world coordinates.
//! - Encode the space light schedule as a canonical 24-bit hour mask.
//!
//! # Invariants
//! - `width >= 1` and `height >= 1`.
//! - `x`/`y` are world pixels and stay aligned to the grid cell size.
//! - `LightSchedule` never carries bits above hour 23.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable space identifier.
pub type SpaceId = String;

/// Mask with one bit per hour of day.
pub const LIGHT_SCHEDULE_MASK: u32 = 0x00FF_FFFF;

/// Discrete cell coordinate relative to a space origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub x: i32,
    pub y: i32,
}

impl GridCell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Hour-resolution light schedule (bit `h` set = light on during hour `h`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LightSchedule(u32);

impl LightSchedule {
    /// Builds a schedule from a raw mask, dropping bits above hour 23.
    pub fn from_bits(bits: u32) -> Self {
        Self(bits & LIGHT_SCHEDULE_MASK)
    }

    /// Lights on for the first `hours_on` hours of the day.
    pub fn lit_hours(hours_on: u32) -> Self {
        let hours_on = hours_on.min(24);
        if hours_on == 24 {
            return Self(LIGHT_SCHEDULE_MASK);
        }
        Self((1u32 << hours_on) - 1)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn is_on(self, hour: u32) -> bool {
        hour < 24 && self.0 & (1 << hour) != 0
    }

    pub fn hours_on(self) -> u32 {
        self.0.count_ones()
    }

    pub fn with_hour(self, hour: u32, on: bool) -> Self {
        if hour >= 24 {
            return self;
        }
        if on {
            Self(self.0 | (1 << hour))
        } else {
            Self(self.0 & !(1 << hour))
        }
    }
}

/// Validation errors for space geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpaceValidationError {
    BlankName,
    EmptyGrid { width: u32, height: u32 },
}

impl Display for SpaceValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "space name must not be blank"),
            Self::EmptyGrid { width, height } => {
                write!(f, "space grid must be at least 1x1, got {width}x{height}")
            }
        }
    }
}

impl Error for SpaceValidationError {}

/// Rectangular grid area that plants are placed into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Space {
    pub id: SpaceId,
    pub name: String,
    /// World-space origin, in pixels.
    pub x: f64,
    pub y: f64,
    /// Grid size in cells.
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_light_schedule: Option<LightSchedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Space {
    /// Creates a space with a generated id.
    pub fn new(name: impl Into<String>, x: f64, y: f64, width: u32, height: u32) -> Self {
        Self {
            id: super::new_id(),
            name: name.into(),
            x,
            y,
            width,
            height,
            custom_light_schedule: None,
            color: None,
        }
    }

    /// Validates geometry and naming invariants.
    pub fn validate(&self) -> Result<(), SpaceValidationError> {
        if self.name.trim().is_empty() {
            return Err(SpaceValidationError::BlankName);
        }
        if self.width == 0 || self.height == 0 {
            return Err(SpaceValidationError::EmptyGrid {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// Returns whether a cell lies inside `[0, width) x [0, height)`.
    pub fn contains_cell(&self, cell: GridCell) -> bool {
        cell.x >= 0
            && cell.y >= 0
            && i64::from(cell.x) < i64::from(self.width)
            && i64::from(cell.y) < i64::from(self.height)
    }

    /// Number of cells in the grid.
    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Iterates cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = GridCell> + '_ {
        (0..self.height as i32)
            .flat_map(move |y| (0..self.width as i32).map(move |x| GridCell::new(x, y)))
    }
}

#[cfg(test)]
mod tests {
    use super::{GridCell, LightSchedule, Space, SpaceValidationError};

    #[test]
    fn lit_hours_sets_leading_bits() {
        assert_eq!(LightSchedule::lit_hours(18).bits(), 0x03_FFFF);
        assert_eq!(LightSchedule::lit_hours(12).bits(), 0xFFF);
        assert_eq!(LightSchedule::lit_hours(24).bits(), 0xFF_FFFF);
        assert_eq!(LightSchedule::lit_hours(0).bits(), 0);
        assert_eq!(LightSchedule::lit_hours(18).hours_on(), 18);
    }

    #[test]
    fn from_bits_drops_hours_past_midnight() {
        let schedule = LightSchedule::from_bits(0xFFFF_FFFF);
        assert_eq!(schedule.bits(), 0xFF_FFFF);
        assert!(!schedule.is_on(24));
        assert!(schedule.is_on(23));
    }

    #[test]
    fn with_hour_toggles_single_bit() {
        let schedule = LightSchedule::lit_hours(12).with_hour(3, false).with_hour(20, true);
        assert!(!schedule.is_on(3));
        assert!(schedule.is_on(20));
        assert_eq!(schedule.hours_on(), 12);
    }

    #[test]
    fn contains_cell_uses_half_open_bounds() {
        let space = Space::new("Tent", 0.0, 0.0, 2, 3);
        assert!(space.contains_cell(GridCell::new(0, 0)));
        assert!(space.contains_cell(GridCell::new(1, 2)));
        assert!(!space.contains_cell(GridCell::new(2, 0)));
        assert!(!space.contains_cell(GridCell::new(0, 3)));
        assert!(!space.contains_cell(GridCell::new(-1, 0)));
    }

    #[test]
    fn cells_iterate_row_major() {
        let space = Space::new("Tent", 0.0, 0.0, 2, 2);
        let cells = space.cells().collect::<Vec<_>>();
        assert_eq!(
            cells,
            vec![
                GridCell::new(0, 0),
                GridCell::new(1, 0),
                GridCell::new(0, 1),
                GridCell::new(1, 1)
            ]
        );
    }

    #[test]
    fn validate_rejects_empty_grid() {
        let mut space = Space::new("Tent", 0.0, 0.0, 1, 1);
        space.width = 0;
        assert_eq!(
            space.validate().unwrap_err(),
            SpaceValidationError::EmptyGrid {
                width: 0,
                height: 1
            }
        );
    }
}
