//! Backend-agnostic draw lists for the spatial and time views.
//!
//! # Responsibility
//! - Flatten the plantation plus view state into ordered draw primitives.
//! - Tag every primitive with a semantic paint role; the host maps roles to
//!   colors and fonts.
//!
//! # Invariants
//! - Snapshots are pure functions of their inputs and are recomputed on
//!   demand; nothing here is cached or mutated.
//! - Primitives are emitted back to front.

use crate::config::TimelineConfig;
use crate::gesture::{DragPreview, ResizeHandle, Selection};
use crate::grid::{footprint_world_rect, space_world_rect, Point, Rect, Viewport};
use crate::model::plant::Stage;
use crate::model::plantation::Plantation;
use crate::segment::current_segment;
use crate::stage::{stage_at, stage_start_date};
use crate::timeline::{offset_date, SlotEntry, SlotKey, TimelineLayout, TimelineViewport};
use chrono::NaiveDate;

/// Semantic paint role of a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paint {
    SpaceFill,
    SpaceOutline,
    SpaceSelected,
    GridLine,
    PlantFill(Stage),
    PlantSelected,
    /// Drag preview; `valid == false` marks a blocked drop.
    Ghost { valid: bool },
    ResizeHandle,
    SlotHeader { collapsed: bool },
    SlotRow,
    StageFill(Stage),
    BarSelected,
    StageHandle,
    Connector,
    ConflictHighlight,
    Label,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawPrimitive {
    Rect { rect: Rect, paint: Paint },
    Text {
        position: Point,
        text: String,
        paint: Paint,
    },
    Line { from: Point, to: Point, paint: Paint },
    /// Cubic Bezier.
    Curve {
        from: Point,
        c1: Point,
        c2: Point,
        to: Point,
        paint: Paint,
    },
}

/// View inputs of the spatial view.
#[derive(Debug, Clone, Copy)]
pub struct SpaceViewState<'a> {
    pub viewport: Viewport,
    pub cell_size: f64,
    pub view_date: NaiveDate,
    pub selection: Option<&'a Selection>,
    pub preview: Option<&'a DragPreview>,
    /// Side length of resize handles around the selected space.
    pub handle_size: f64,
    pub show_handles: bool,
}

/// View inputs of the time view.
#[derive(Debug, Clone, Copy)]
pub struct TimeViewState<'a> {
    pub viewport: TimelineViewport,
    pub config: &'a TimelineConfig,
    pub selection: Option<&'a Selection>,
    pub preview: Option<&'a DragPreview>,
}

const LABEL_PADDING: f64 = 4.0;

/// Spaces with grid lines, plants placed on `view_date`, selection and
/// the drag preview, all in screen coordinates.
pub fn space_view(plantation: &Plantation, state: &SpaceViewState<'_>) -> Vec<DrawPrimitive> {
    let document = &plantation.document;
    let cell = state.cell_size;
    let mut out = Vec::new();

    for space in &document.spaces {
        let rect = to_screen(&state.viewport, &space_world_rect(space, cell));
        out.push(DrawPrimitive::Rect {
            rect,
            paint: Paint::SpaceFill,
        });
        let step = cell * state.viewport.zoom;
        for column in 1..space.width {
            let x = rect.x + f64::from(column) * step;
            out.push(DrawPrimitive::Line {
                from: Point::new(x, rect.y),
                to: Point::new(x, rect.bottom()),
                paint: Paint::GridLine,
            });
        }
        for row in 1..space.height {
            let y = rect.y + f64::from(row) * step;
            out.push(DrawPrimitive::Line {
                from: Point::new(rect.x, y),
                to: Point::new(rect.right(), y),
                paint: Paint::GridLine,
            });
        }
        let selected = matches!(state.selection, Some(Selection::Space(id)) if *id == space.id);
        out.push(DrawPrimitive::Rect {
            rect,
            paint: if selected {
                Paint::SpaceSelected
            } else {
                Paint::SpaceOutline
            },
        });
        out.push(DrawPrimitive::Text {
            position: Point::new(rect.x + LABEL_PADDING, rect.y + LABEL_PADDING),
            text: space.name.clone(),
            paint: Paint::Label,
        });
    }

    for plant in &document.plants {
        let Some(segment) = current_segment(plant, state.view_date) else {
            continue;
        };
        let Some(space) = segment
            .space_id
            .as_deref()
            .and_then(|space_id| plantation.space(space_id))
        else {
            continue;
        };
        let world = footprint_world_rect(space, segment.cell(), plant.size, cell);
        let rect = to_screen(&state.viewport, &world);
        let stage = stage_at(plant, plantation.strain_for(plant), state.view_date);
        out.push(DrawPrimitive::Rect {
            rect,
            paint: Paint::PlantFill(stage),
        });
        if matches!(state.selection, Some(Selection::Plant(id)) if *id == plant.id) {
            out.push(DrawPrimitive::Rect {
                rect,
                paint: Paint::PlantSelected,
            });
        }
        out.push(DrawPrimitive::Text {
            position: Point::new(rect.x + rect.width / 2.0, rect.y + rect.height / 2.0),
            text: plant.code.clone(),
            paint: Paint::Label,
        });
    }

    if state.show_handles {
        if let Some(Selection::Space(space_id)) = state.selection {
            if let Some(space) = plantation.space(space_id) {
                let rect = to_screen(&state.viewport, &space_world_rect(space, cell));
                let half = state.handle_size / 2.0;
                for handle in ResizeHandle::ALL {
                    let anchor = handle.anchor(&rect);
                    out.push(DrawPrimitive::Rect {
                        rect: Rect::new(
                            anchor.x - half,
                            anchor.y - half,
                            state.handle_size,
                            state.handle_size,
                        ),
                        paint: Paint::ResizeHandle,
                    });
                }
            }
        }
    }

    match state.preview {
        Some(DragPreview::NewSpace { world }) | Some(DragPreview::Space { world, .. }) => {
            out.push(DrawPrimitive::Rect {
                rect: to_screen(&state.viewport, world),
                paint: Paint::Ghost { valid: true },
            });
        }
        Some(DragPreview::Plant { world, valid, .. }) => {
            out.push(DrawPrimitive::Rect {
                rect: to_screen(&state.viewport, world),
                paint: Paint::Ghost { valid: *valid },
            });
        }
        _ => {}
    }
    out
}

/// Slot axis, segment bars, connectors, conflicts, stage handles and the
/// drag preview of the time view.
pub fn time_view(
    plantation: &Plantation,
    layout: &TimelineLayout,
    state: &TimeViewState<'_>,
) -> Vec<DrawPrimitive> {
    let config = state.config;
    let pan_y = state.viewport.pan_y;
    let mut out = Vec::new();

    for entry in &layout.slots.entries {
        let y = entry.y() + pan_y;
        match entry {
            SlotEntry::Header {
                space_id,
                collapsed,
                ..
            } => {
                out.push(DrawPrimitive::Rect {
                    rect: Rect::new(0.0, y, config.left_margin, layout.slots.header_height()),
                    paint: Paint::SlotHeader {
                        collapsed: *collapsed,
                    },
                });
                if let Some(space) = space_id.as_deref().and_then(|id| plantation.space(id)) {
                    out.push(label(Point::new(LABEL_PADDING, y + LABEL_PADDING), &space.name));
                }
            }
            SlotEntry::Slot { key, .. } => {
                out.push(DrawPrimitive::Rect {
                    rect: Rect::new(0.0, y, config.left_margin, layout.slots.slot_height()),
                    paint: Paint::SlotRow,
                });
                let text = match key {
                    SlotKey::Cell { cell, .. } => format!("{},{}", cell.x, cell.y),
                    SlotKey::Floating { plant_id } => plantation
                        .plant(plant_id)
                        .map(|plant| plant.code.clone())
                        .unwrap_or_default(),
                };
                out.push(label(Point::new(LABEL_PADDING * 2.0, y + LABEL_PADDING), &text));
            }
        }
    }

    let selected_plant = match state.selection {
        Some(Selection::Plant(plant_id)) => Some(plant_id.as_str()),
        _ => None,
    };
    for bar in &layout.bars {
        for stage in &bar.stages {
            out.push(DrawPrimitive::Rect {
                rect: stage.rect,
                paint: Paint::StageFill(stage.stage),
            });
        }
        if selected_plant == Some(bar.plant_id.as_str()) {
            out.push(DrawPrimitive::Rect {
                rect: bar.rect,
                paint: Paint::BarSelected,
            });
        }
        if let Some(plant) = plantation.plant(&bar.plant_id) {
            out.push(label(
                Point::new(bar.rect.x + LABEL_PADDING, bar.rect.y),
                &plant.code,
            ));
        }
    }

    for connector in &layout.connectors {
        let (c1, c2) = connector.control_points();
        out.push(DrawPrimitive::Curve {
            from: connector.from,
            c1,
            c2,
            to: connector.to,
            paint: Paint::Connector,
        });
    }
    for conflict in &layout.conflicts {
        out.push(DrawPrimitive::Rect {
            rect: conflict.rect,
            paint: Paint::ConflictHighlight,
        });
    }
    for handle in &layout.handles {
        out.push(DrawPrimitive::Rect {
            rect: handle.rect,
            paint: Paint::StageHandle,
        });
    }

    if let Some(preview) = state.preview {
        out.extend(time_preview(plantation, layout, state, preview));
    }
    out
}

fn time_preview(
    plantation: &Plantation,
    layout: &TimelineLayout,
    state: &TimeViewState<'_>,
    preview: &DragPreview,
) -> Vec<DrawPrimitive> {
    let config = state.config;
    match preview {
        DragPreview::TimeMove {
            segment_id,
            shift_days,
            target,
            ..
        } => {
            let Some(bar) = layout.bars.iter().find(|bar| bar.segment_id == *segment_id) else {
                return Vec::new();
            };
            let dx = *shift_days as f64 * state.viewport.day_width(config);
            let inset = (layout.slots.slot_height() - bar.rect.height) / 2.0;
            let y = target
                .as_ref()
                .and_then(|key| layout.slots.slot_y(key))
                .map_or(bar.rect.y, |slot_y| slot_y + state.viewport.pan_y + inset);
            vec![DrawPrimitive::Rect {
                rect: Rect::new(bar.rect.x + dx, y, bar.rect.width, bar.rect.height),
                paint: Paint::Ghost {
                    valid: target.is_some(),
                },
            }]
        }
        DragPreview::StageResize {
            plant_id,
            stage,
            days,
        } => {
            let Some(plant) = plantation.plant(plant_id) else {
                return Vec::new();
            };
            let start = stage_start_date(*stage, plant, plantation.strain_for(plant));
            let x = state
                .viewport
                .date_to_x(offset_date(start, i64::from(*days)), config);
            layout
                .bars
                .iter()
                .filter(|bar| bar.plant_id == *plant_id)
                .map(|bar| DrawPrimitive::Line {
                    from: Point::new(x, bar.rect.y),
                    to: Point::new(x, bar.rect.bottom()),
                    paint: Paint::Ghost { valid: true },
                })
                .collect()
        }
        DragPreview::NewSpace { .. } | DragPreview::Space { .. } | DragPreview::Plant { .. } => {
            Vec::new()
        }
    }
}

fn label(position: Point, text: &str) -> DrawPrimitive {
    DrawPrimitive::Text {
        position,
        text: text.to_string(),
        paint: Paint::Label,
    }
}

fn to_screen(viewport: &Viewport, world: &Rect) -> Rect {
    let top_left = viewport.world_to_screen(Point::new(world.x, world.y));
    Rect::new(
        top_left.x,
        top_left.y,
        world.width * viewport.zoom,
        world.height * viewport.zoom,
    )
}

#[cfg(test)]
mod tests {
    use super::{space_view, time_view, DrawPrimitive, Paint, SpaceViewState, TimeViewState};
    use crate::config::TimelineConfig;
    use crate::gesture::{DragPreview, Selection};
    use crate::grid::{Rect, Viewport};
    use crate::model::plant::{NewPlant, Plant, PlantSize, Stage};
    use crate::model::plantation::Plantation;
    use crate::model::space::{GridCell, Space};
    use crate::timeline::{TimelineLayout, TimelineViewport};
    use chrono::NaiveDate;
    use std::collections::HashSet;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn plantation() -> Plantation {
        let mut plantation = Plantation::new("owner", "Garden");
        let space = Space::new("Tent", 56.0, 0.0, 2, 2);
        let plant = Plant::new(NewPlant {
            code: "P-1".to_string(),
            strain_id: None,
            size: PlantSize::Single,
            generation: Default::default(),
            started_at: date(2024, 1, 1),
            space_id: Some(space.id.clone()),
            cell: GridCell::new(1, 0),
        });
        plantation.document.spaces.push(space);
        plantation.document.plants.push(plant);
        plantation
    }

    fn rects_with(primitives: &[DrawPrimitive], wanted: Paint) -> Vec<Rect> {
        primitives
            .iter()
            .filter_map(|primitive| match primitive {
                DrawPrimitive::Rect { rect, paint } if *paint == wanted => Some(*rect),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn space_view_places_plants_in_screen_coordinates() {
        let plantation = plantation();
        let plant_id = plantation.document.plants[0].id.clone();
        let selection = Selection::Plant(plant_id);
        let state = SpaceViewState {
            viewport: Viewport {
                pan: crate::grid::Point::new(10.0, 20.0),
                zoom: 2.0,
            },
            cell_size: 56.0,
            view_date: date(2024, 1, 3),
            selection: Some(&selection),
            preview: None,
            handle_size: 10.0,
            show_handles: true,
        };
        let primitives = space_view(&plantation, &state);

        assert_eq!(
            rects_with(&primitives, Paint::SpaceFill),
            vec![Rect::new(122.0, 20.0, 224.0, 224.0)]
        );
        assert_eq!(
            rects_with(&primitives, Paint::PlantFill(Stage::Germinating)),
            vec![Rect::new(234.0, 20.0, 112.0, 112.0)]
        );
        assert_eq!(rects_with(&primitives, Paint::PlantSelected).len(), 1);
        let grid_lines = primitives
            .iter()
            .filter(|primitive| {
                matches!(primitive, DrawPrimitive::Line { paint: Paint::GridLine, .. })
            })
            .count();
        assert_eq!(grid_lines, 2);
        assert!(rects_with(&primitives, Paint::ResizeHandle).is_empty());
    }

    #[test]
    fn selected_space_shows_handles_and_preview_ghost() {
        let plantation = plantation();
        let selection = Selection::Space(plantation.document.spaces[0].id.clone());
        let preview = DragPreview::Plant {
            plant_id: plantation.document.plants[0].id.clone(),
            world: Rect::new(56.0, 56.0, 56.0, 56.0),
            valid: false,
        };
        let state = SpaceViewState {
            viewport: Viewport::default(),
            cell_size: 56.0,
            view_date: date(2024, 1, 3),
            selection: Some(&selection),
            preview: Some(&preview),
            handle_size: 10.0,
            show_handles: true,
        };
        let primitives = space_view(&plantation, &state);

        assert_eq!(rects_with(&primitives, Paint::ResizeHandle).len(), 8);
        assert_eq!(rects_with(&primitives, Paint::SpaceSelected).len(), 1);
        assert_eq!(
            rects_with(&primitives, Paint::Ghost { valid: false }),
            vec![Rect::new(56.0, 56.0, 56.0, 56.0)]
        );
    }

    #[test]
    fn time_view_draws_one_fill_per_scheduled_stage() {
        let plantation = plantation();
        let config = TimelineConfig::default();
        let viewport = TimelineViewport::new(date(2024, 1, 1));
        let layout =
            TimelineLayout::compute(&plantation, &HashSet::new(), None, &viewport, &config);
        let state = TimeViewState {
            viewport,
            config: &config,
            selection: None,
            preview: None,
        };
        let primitives = time_view(&plantation, &layout, &state);

        for stage in [
            Stage::Germinating,
            Stage::Seedling,
            Stage::Vegetative,
            Stage::Flowering,
        ] {
            assert_eq!(rects_with(&primitives, Paint::StageFill(stage)).len(), 1);
        }
        assert_eq!(
            rects_with(&primitives, Paint::SlotHeader { collapsed: false }).len(),
            1
        );
        assert_eq!(rects_with(&primitives, Paint::SlotRow).len(), 4);
        assert!(rects_with(&primitives, Paint::ConflictHighlight).is_empty());
    }
}
