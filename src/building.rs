/// Building layout for the monitored site.
///
/// Defines the canonical floor/room graph used to place sensor locations on
/// a floor plan. The layout is a pure function of the floor count: eight
/// floors, each with the same eighteen positions from left to right:
///
///   0      end classroom    (`{f}E1`)
///   1      side classroom   (`{f}S1`)
///   2      stairs           (`STAIRS_L_{f}`)
///   3..=14 main classrooms  (`{f}01` .. `{f}12`)
///   15     stairs           (`STAIRS_R_{f}`)
///   16     side classroom   (`{f}S2`)
///   17     end classroom    (`{f}E2`)
///
/// Regenerating the building is cheap and always yields the same structure,
/// so callers are free to build it once and share it read-only.

use serde::Serialize;

pub const TOTAL_FLOORS: u8 = 8;
pub const MAIN_ROOMS_PER_FLOOR: u8 = 12;
pub const ROOMS_PER_FLOOR: usize = 18;

const FLOOR_NAMES: [&str; TOTAL_FLOORS as usize] = [
    "Ground", "First", "Second", "Third", "Fourth", "Fifth", "Sixth", "Seventh",
];

// ---------------------------------------------------------------------------
// Topology types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RoomKind {
    EndClassroom,
    SideClassroom,
    MainClassroom,
    Stairs,
}

/// A single room (or stairwell) on a floor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Room {
    /// Identifier sensors are tagged with, e.g. "307" or "STAIRS_L_3".
    pub id: String,
    pub display_name: String,
    /// 1-based floor number.
    pub floor: u8,
    /// Left-to-right slot on the floor plan, 0..=17.
    pub position_index: usize,
    pub is_stairs: bool,
    pub kind: RoomKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Floor {
    pub number: u8,
    pub name: String,
    /// Always `ROOMS_PER_FLOOR` rooms, ordered by `position_index`.
    pub rooms: Vec<Room>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Building {
    pub floors: Vec<Floor>,
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Generates the full building, floors numbered 1..=8.
pub fn generate_building() -> Building {
    Building {
        floors: (1..=TOTAL_FLOORS).map(generate_floor).collect(),
    }
}

fn generate_floor(f: u8) -> Floor {
    let mut slots: Vec<(String, RoomKind)> = Vec::with_capacity(ROOMS_PER_FLOOR);

    slots.push((format!("{}E1", f), RoomKind::EndClassroom));
    slots.push((format!("{}S1", f), RoomKind::SideClassroom));
    slots.push((format!("STAIRS_L_{}", f), RoomKind::Stairs));
    for r in 1..=MAIN_ROOMS_PER_FLOOR {
        slots.push((format!("{}{:02}", f, r), RoomKind::MainClassroom));
    }
    slots.push((format!("STAIRS_R_{}", f), RoomKind::Stairs));
    slots.push((format!("{}S2", f), RoomKind::SideClassroom));
    slots.push((format!("{}E2", f), RoomKind::EndClassroom));

    let rooms = slots
        .into_iter()
        .enumerate()
        .map(|(position_index, (id, kind))| {
            let is_stairs = kind == RoomKind::Stairs;
            let display_name = if is_stairs {
                "Stairs".to_string()
            } else {
                format!("Classroom {}", id)
            };
            Room {
                id,
                display_name,
                floor: f,
                position_index,
                is_stairs,
                kind,
            }
        })
        .collect();

    Floor {
        number: f,
        name: FLOOR_NAMES[usize::from(f - 1)].to_string(),
        rooms,
    }
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

impl Building {
    /// Looks up a floor by its 1-based number. Returns `None` outside 1..=8.
    pub fn floor(&self, number: u8) -> Option<&Floor> {
        self.floors.iter().find(|fl| fl.number == number)
    }

    /// Looks up a room by id across all floors. Returns `None` if not found.
    pub fn lookup_room(&self, room_id: &str) -> Option<&Room> {
        self.floors
            .iter()
            .flat_map(|fl| fl.rooms.iter())
            .find(|room| room.id == room_id)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.floors.iter().flat_map(|fl| fl.rooms.iter())
    }
}

/// Checks whether a room id names a stairwell.
pub fn is_stairs_room(room_id: &str) -> bool {
    room_id.starts_with("STAIRS_")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
