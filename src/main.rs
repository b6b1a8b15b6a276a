use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};

use firewatch_service::analysis::floor_view::{fire_floors, floor_view};
use firewatch_service::building::{TOTAL_FLOORS, generate_building};
use firewatch_service::config::Config;
use firewatch_service::dev_mode::FixtureSource;
use firewatch_service::ingest::supabase::{DEFAULT_LOG_LIMIT, SupabaseClient};
use firewatch_service::ingest::{DeviceControl, StatusSource};
use firewatch_service::logging::{self, Component};
use firewatch_service::maintenance::{SagaOutcome, set_maintenance};
use firewatch_service::model::{LogSeverity, format_timestamp};
use firewatch_service::monitor::{Monitor, PollOutcome, Snapshot};
use firewatch_service::notify::LogNotifier;
use firewatch_service::scheduler::{PollSupervisor, SharedSource};
use firewatch_service::verify::{VerificationStatus, print_summary, verify_backend};

#[derive(Parser, Debug)]
#[command(author, version, about = "Building fire monitoring client")]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serve statuses from a JSON fixture instead of the backend
    #[arg(long, value_name = "FIXTURE")]
    dev: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll continuously and print every snapshot (default)
    Run,
    /// Poll once and print the building state
    Once,
    /// Poll once and print one floor of the building
    Floor { number: u8 },
    /// Print sensor history, optionally for one device
    Logs { device: Option<String> },
    /// Put every device into or out of maintenance
    Maintenance { mode: Option<Toggle> },
    /// Check that the backend tables answer
    Verify,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Toggle {
    On,
    Off,
}

/// Where statuses come from and where device updates go.
enum Backend {
    Live(Arc<SupabaseClient>),
    Fixture(Arc<FixtureSource>),
}

impl Backend {
    fn source(&self) -> SharedSource {
        match self {
            Backend::Live(client) => Arc::clone(client) as SharedSource,
            Backend::Fixture(fixture) => Arc::clone(fixture) as SharedSource,
        }
    }

    fn status(&self) -> &dyn StatusSource {
        match self {
            Backend::Live(client) => &**client,
            Backend::Fixture(fixture) => &**fixture,
        }
    }

    fn control(&self) -> &dyn DeviceControl {
        match self {
            Backend::Live(client) => &**client,
            Backend::Fixture(fixture) => &**fixture,
        }
    }

    fn live(&self) -> Result<&SupabaseClient, Box<dyn Error>> {
        match self {
            Backend::Live(client) => Ok(&**client),
            Backend::Fixture(_) => Err("this command needs the live backend (drop --dev)".into()),
        }
    }
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = match &args.dev {
        Some(_) => Config::load_offline(args.config.as_deref())?,
        None => Config::load(args.config.as_deref())?,
    };

    logging::init_logger(
        config.logging.min_level()?,
        config.logging.file.as_deref(),
        config.logging.timestamps,
    );

    let backend = match &args.dev {
        Some(path) => Backend::Fixture(Arc::new(FixtureSource::load(path)?)),
        None => Backend::Live(Arc::new(SupabaseClient::new(&config.backend)?)),
    };

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run_monitor(&config, &backend),
        Command::Once => {
            let mut monitor = Monitor::from_config(&config, Box::new(LogNotifier::new()));
            let snapshot = monitor.poll_once(backend.status());
            print_snapshot(&snapshot);
            print_locations(&snapshot);
            Ok(())
        }
        Command::Floor { number } => print_floor(&config, &backend, number),
        Command::Logs { device } => print_logs(backend.live()?, device.as_deref()),
        Command::Maintenance { mode } => {
            let enabled = match mode {
                Some(Toggle::On) => true,
                Some(Toggle::Off) => false,
                None => config.monitoring.maintenance_mode,
            };
            apply_maintenance(&backend, enabled)
        }
        Command::Verify => {
            let report = verify_backend(backend.live()?);
            print_summary(&report);
            if report.overall == VerificationStatus::Failed {
                return Err("backend verification failed".into());
            }
            Ok(())
        }
    }
}

fn run_monitor(config: &Config, backend: &Backend) -> Result<(), Box<dyn Error>> {
    if !config.monitoring.enabled {
        logging::info(Component::System, None, "Monitoring is disabled in configuration");
        return Ok(());
    }

    let mut monitor = Monitor::from_config(config, Box::new(LogNotifier::new()));
    let snapshots = monitor.subscribe();

    let mut supervisor = PollSupervisor::new(config.monitoring.poll_interval());
    supervisor.start(backend.source(), monitor)?;

    for snapshot in snapshots {
        print_snapshot(&snapshot);
    }

    supervisor.stop();
    Ok(())
}

fn print_snapshot(snapshot: &Snapshot) {
    let updated = snapshot
        .outcome
        .reduced()
        .map(|r| format_timestamp(r.last_updated_at.as_deref()))
        .unwrap_or_else(|| "Unknown".to_string());

    println!(
        "[{}] {} (last update {})",
        snapshot.observed_at.format("%H:%M:%S"),
        snapshot.outcome.headline(),
        updated
    );
}

fn print_locations(snapshot: &Snapshot) {
    let reduced = match &snapshot.outcome {
        PollOutcome::Reduced(reduced) => reduced,
        PollOutcome::Unreachable(reason) => {
            println!("   {}", reason);
            return;
        }
    };

    for row in &reduced.retained {
        let status = reduced
            .per_location
            .get(row.location_key())
            .map(|s| s.label())
            .unwrap_or("Unknown");
        println!(
            "   {:<20} {:<12} {:<12} {}",
            row.display_name(),
            row.device_id,
            status,
            format_timestamp(row.updated_at.as_deref())
        );
    }

    let floors = fire_floors(reduced);
    if !floors.is_empty() {
        let list: Vec<String> = floors.iter().map(u8::to_string).collect();
        println!("   Fire on floor(s): {}", list.join(", "));
    }
}

fn print_floor(config: &Config, backend: &Backend, number: u8) -> Result<(), Box<dyn Error>> {
    let building = generate_building();
    let mut monitor = Monitor::from_config(config, Box::new(LogNotifier::new()));
    let snapshot = monitor.poll_once(backend.status());

    let reduced = snapshot
        .outcome
        .reduced()
        .ok_or_else(|| snapshot.outcome.headline())?;
    let view = floor_view(&building, number, reduced)
        .ok_or_else(|| format!("floor must be between 1 and {}", TOTAL_FLOORS))?;

    println!("{} (floor {})", view.floor.name, view.floor.number);
    for room in &view.floor.rooms {
        let marker = if view.fire_room_tokens.contains(&room.id) { "🔥" } else { "  " };
        println!("  {} {:<12} {}", marker, room.id, room.display_name);
    }
    Ok(())
}

fn print_logs(client: &SupabaseClient, device: Option<&str>) -> Result<(), Box<dyn Error>> {
    let entries = match device {
        Some(id) => client.fetch_device_logs(id)?,
        None => client.fetch_logs(DEFAULT_LOG_LIMIT)?,
    };

    if entries.is_empty() {
        println!("No history rows");
        return Ok(());
    }

    for entry in &entries {
        let marker = match entry.severity() {
            LogSeverity::Critical => "🔥",
            LogSeverity::Offline => "⚠",
            LogSeverity::Normal => " ",
        };
        println!(
            "{} {:<16} {:<12} {}",
            marker,
            format_timestamp(entry.timestamp.as_deref()),
            entry.device_id,
            entry.status
        );
    }
    Ok(())
}

fn apply_maintenance(backend: &Backend, enabled: bool) -> Result<(), Box<dyn Error>> {
    let rows = backend.status().fetch_status()?;
    let device_ids: Vec<&str> = rows.iter().map(|r| r.device_id.as_str()).collect();

    let report = set_maintenance(backend.control(), &device_ids, enabled);
    let message = report.summary()?;
    if report.outcome() == SagaOutcome::PartialFailure {
        logging::warn(Component::Maintenance, None, &message);
    }
    println!("{}", message);
    Ok(())
}
