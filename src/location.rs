//! Location identifier parsing.
//!
//! Sensor locations are free-form strings typed in by whoever installed the
//! device ("305", "3-07", "STAIRS_L_4", "4-02 lab"). These helpers recover the
//! floor number and the room token used on the floor plan. They never fail
//! hard: an identifier that cannot be placed yields `None`, and callers keep
//! the reading in aggregate counts while leaving it off the floor plan.

use crate::model::FireWatchError;

const STAIRS_PREFIX: &str = "STAIRS_";

/// Returns the floor a location or device id belongs to.
///
/// - `STAIRS_<side>_<floor>`: the third `_`-separated token.
/// - anything else: the value of the first character if it is a digit.
///
/// A hyphenated id such as "3-07" resolves through its leading digit only.
pub fn extract_floor(id: &str) -> Option<u8> {
    if id.starts_with(STAIRS_PREFIX) {
        let parts: Vec<&str> = id.split('_').collect();
        if parts.len() != 3 {
            return None;
        }
        return parts[2].parse().ok();
    }

    id.chars()
        .next()
        .and_then(|c| c.to_digit(10))
        .map(|d| d as u8)
}

/// Returns the room token a location maps to on the floor plan.
///
/// Stairwell ids are their own token; otherwise the part before the first
/// `-` (or the whole id), trimmed. Only an empty id has no token; "-5"
/// yields an empty one.
pub fn extract_room_token(id: &str) -> Option<String> {
    if id.is_empty() {
        return None;
    }
    if id.starts_with(STAIRS_PREFIX) {
        return Some(id.to_string());
    }

    let token = match id.split_once('-') {
        Some((before, _)) => before,
        None => id,
    };
    Some(token.trim().to_string())
}

/// Both halves at once, or a `MalformedIdentifier` error naming the input.
pub fn locate(id: &str) -> Result<(u8, String), FireWatchError> {
    match (extract_floor(id), extract_room_token(id)) {
        (Some(floor), Some(token)) if !token.is_empty() => Ok((floor, token)),
        _ => Err(FireWatchError::MalformedIdentifier(id.to_string())),
    }
}
