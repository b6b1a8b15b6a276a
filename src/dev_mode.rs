/// Development mode: serve status rows from a fixture file
///
/// When the live backend is unavailable (or must not be touched), point the
/// service at a JSON file holding status rows in the backend wire format.
/// Maintenance toggles and location edits are applied to the in-memory copy
/// only; the file on disk is never rewritten.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::analysis::reduction::compare_timestamps;
use crate::ingest::{DeviceControl, StatusSource};
use crate::ingest::supabase::parse_status;
use crate::logging::{self, Component};
use crate::model::{FireWatchError, SensorReading};

pub struct FixtureSource {
    path: PathBuf,
    rows: Mutex<Vec<SensorReading>>,
}

impl FixtureSource {
    /// Loads fixture rows from `path`.
    pub fn load(path: &Path) -> Result<Self, FireWatchError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| FireWatchError::Config(format!("{}: {}", path.display(), e)))?;
        let rows = parse_status(&raw)?;

        logging::info(
            Component::System,
            None,
            &format!("Dev mode: {} fixture row(s) from {}", rows.len(), path.display()),
        );
        Ok(Self::from_rows(path, rows))
    }

    pub fn from_rows(path: &Path, rows: Vec<SensorReading>) -> Self {
        Self {
            path: path.to_path_buf(),
            rows: Mutex::new(rows),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Device ids in the fixture, in file order.
    pub fn device_ids(&self) -> Vec<String> {
        self.with_rows(|rows| rows.iter().map(|r| r.device_id.clone()).collect())
            .unwrap_or_default()
    }

    fn with_rows<T>(&self, f: impl FnOnce(&mut Vec<SensorReading>) -> T) -> Result<T, FireWatchError> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| FireWatchError::Transport("fixture lock poisoned".to_string()))?;
        Ok(f(&mut rows))
    }

    fn update_device<F>(&self, device_id: &str, mut f: F) -> Result<(), FireWatchError>
    where
        F: FnMut(&mut SensorReading),
    {
        let touched = self.with_rows(|rows| {
            rows.iter_mut()
                .filter(|r| r.device_id == device_id)
                .map(|r| f(r))
                .count()
        })?;

        // An id with no fixture row is reported as not found.
        if touched == 0 {
            return Err(FireWatchError::HttpError(404));
        }
        Ok(())
    }
}

impl StatusSource for FixtureSource {
    fn fetch_status(&self) -> Result<Vec<SensorReading>, FireWatchError> {
        let mut rows = self.with_rows(|rows| rows.clone())?;
        // Newest first, unparseable or missing timestamps last.
        rows.sort_by(|a, b| match (a.updated_at.as_deref(), b.updated_at.as_deref()) {
            (Some(x), Some(y)) => compare_timestamps(y, x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        Ok(rows)
    }
}

impl DeviceControl for FixtureSource {
    fn set_system_active(&self, device_id: &str, active: bool) -> Result<(), FireWatchError> {
        self.update_device(device_id, |row| row.system_active = Some(active))
    }

    fn update_location(&self, device_id: &str, location: &str, block: &str) -> Result<(), FireWatchError> {
        let location = Some(location.trim()).filter(|l| !l.is_empty()).map(String::from);
        let block = Some(block.trim()).filter(|b| !b.is_empty()).map(String::from);
        self.update_device(device_id, |row| {
            row.location = location.clone();
            row.block = block.clone();
        })
    }
}
