//! Status backend access.
//!
//! The monitor only ever sees the two traits below; `supabase` provides the
//! live implementation and `dev_mode::FixtureSource` an offline one.

pub mod supabase;

use crate::model::{FireWatchError, SensorReading};

/// Read side of the status backend.
pub trait StatusSource {
    /// All status rows, newest first by `updated_at`.
    fn fetch_status(&self) -> Result<Vec<SensorReading>, FireWatchError>;
}

/// Write side of the status backend. Reading never goes through here.
pub trait DeviceControl {
    fn set_system_active(&self, device_id: &str, active: bool) -> Result<(), FireWatchError>;

    /// Reassigns a device. Empty strings clear the field.
    fn update_location(&self, device_id: &str, location: &str, block: &str) -> Result<(), FireWatchError>;
}
