//! Projection of a reduced state onto one floor of the building.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::analysis::reduction::ReducedState;
use crate::building::{Building, Floor};
use crate::location::{extract_floor, extract_room_token};

/// What a floor-plan renderer needs for a single floor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloorView<'a> {
    pub floor: &'a Floor,
    /// Room tokens on this floor whose location is currently on fire.
    pub fire_room_tokens: BTreeSet<String>,
}

/// Builds the view of `floor` for `reduced`. Returns `None` when the floor
/// does not exist.
///
/// Fire locations that do not parse to a floor and room are left off every
/// floor; they still count in the reduced totals.
pub fn floor_view<'a>(
    building: &'a Building,
    floor: u8,
    reduced: &ReducedState,
) -> Option<FloorView<'a>> {
    let floor_ref = building.floor(floor)?;

    let fire_room_tokens = reduced
        .fire_locations
        .iter()
        .filter(|key| extract_floor(key) == Some(floor))
        .filter_map(|key| extract_room_token(key))
        .collect();

    Some(FloorView {
        floor: floor_ref,
        fire_room_tokens,
    })
}

/// Floors that currently hold at least one fire, lowest first.
pub fn fire_floors(reduced: &ReducedState) -> BTreeSet<u8> {
    reduced
        .fire_locations
        .iter()
        .filter_map(|key| extract_floor(key))
        .collect()
}
