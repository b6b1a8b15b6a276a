/// Data shaping for the fire monitoring service.
///
/// Everything here is pure: raw rows in, projections out. Every
/// presentation surface (console, floor map, admin listing) reads the same
/// `ReducedState` so they cannot drift apart.
///
/// Submodules:
/// - `reduction` : collapses the raw status rows into one record per
///   location and classifies the building.
/// - `floor_view` : projects a reduced state onto one floor of the building.

pub mod floor_view;
pub mod reduction;
