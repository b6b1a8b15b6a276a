pub mod alert;
pub mod analysis;
pub mod building;
pub mod config;
pub mod dev_mode;
pub mod ingest;
pub mod location;
pub mod logging;
pub mod maintenance;
pub mod model;
pub mod monitor;
pub mod notify;
pub mod scheduler;
pub mod verify;
