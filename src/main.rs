use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use log::info;
use uuid::Uuid;

use pitwall::companion::CompanionMessage;
use pitwall::config::AppConfig;
use pitwall::device::{ConnectionStatus, DeviceHandle, SimulatedTransport};
use pitwall::errors::PitwallError;
use pitwall::service::CompanionService;
use pitwall::storage::{Database, Session};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Work with the locally stored lap sessions
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// List the known wearable devices
    Devices,
    /// Forget a known device by uuid
    Forget { uuid: Uuid },
    /// Feed a device-selection response URL to the registry
    Pair {
        url: String,
        /// Identifier of the application the URL came from, when known
        #[arg(short, long)]
        source: Option<String>,
    },
    /// Run the companion event loop against the simulated transport
    Run,
}

#[derive(Subcommand, Debug)]
enum SessionCommands {
    /// Print stored sessions, newest first
    List,
    /// Record a session summary by hand
    Add {
        #[arg(short, long)]
        stats: String,
        #[arg(long)]
        lap_count: Option<u32>,
        #[arg(long)]
        best_lap: Option<f64>,
        #[arg(long)]
        total: Option<f64>,
        #[arg(long)]
        lat: Option<f64>,
        #[arg(long)]
        lon: Option<f64>,
    },
    /// Delete a session by id
    Delete { id: i64 },
}

fn open_database(config: &AppConfig) -> Result<Database, PitwallError> {
    Database::open(&config.database_path()?)
}

fn format_date(date_s: f64) -> String {
    match Local.timestamp_opt(date_s as i64, 0) {
        chrono::LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        _ => format!("{date_s}"),
    }
}

fn sessions(config: &AppConfig, command: &SessionCommands) -> Result<(), PitwallError> {
    let db = open_database(config)?;
    match command {
        SessionCommands::List => {
            let sessions = db.list_sessions()?;
            if sessions.is_empty() {
                println!("No sessions recorded.");
                return Ok(());
            }
            for session in sessions {
                let laps = session
                    .lap_count
                    .map(|n| format!("{n} laps"))
                    .unwrap_or_else(|| "laps n/a".to_string());
                let best = session
                    .best_lap_time_s
                    .map(|t| format!("best {t:.1}s"))
                    .unwrap_or_else(|| "best n/a".to_string());
                println!(
                    "#{:<4} {}  {:<10} {:<12} {}",
                    session.id.unwrap_or_default(),
                    format_date(session.date_s),
                    laps,
                    best,
                    session.stats
                );
            }
        }
        SessionCommands::Add {
            stats,
            lap_count,
            best_lap,
            total,
            lat,
            lon,
        } => {
            let session = Session {
                lap_count: *lap_count,
                best_lap_time_s: *best_lap,
                total_time_s: *total,
                latitude: *lat,
                longitude: *lon,
                ..Session::recorded_now(stats.clone())
            };
            let id = db.insert_session(&session)?;
            println!("Recorded session #{id}");
        }
        SessionCommands::Delete { id } => {
            db.delete_session(*id)?;
            println!("Deleted session #{id} (if it existed)");
        }
    }
    Ok(())
}

fn devices(config: &AppConfig) -> Result<(), PitwallError> {
    let db = open_database(config)?;
    let devices = db.list_devices()?;
    if devices.is_empty() {
        println!("No known devices. Pair one with `pitwall pair <url>`.");
        return Ok(());
    }
    for device in devices {
        let friendly = device
            .friendly_name
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {:<20} {:<20} last seen {}",
            device.uuid,
            device.display_name,
            friendly,
            format_date(device.last_updated_s)
        );
    }
    Ok(())
}

fn build_service(
    config: &AppConfig,
    transport: Arc<SimulatedTransport>,
) -> Result<CompanionService, PitwallError> {
    let (registry_tx, registry_rx) = mpsc::channel();
    // Surface the typed change events the way a UI layer would consume them.
    thread::spawn(move || {
        for event in registry_rx {
            info!("registry event: {event:?}");
        }
    });
    CompanionService::new(open_database(config)?, transport, config.clone(), registry_tx)
}

fn forget(config: &AppConfig, uuid: &Uuid) -> Result<(), PitwallError> {
    let (transport_tx, _transport_rx) = mpsc::channel();
    let transport = Arc::new(SimulatedTransport::new(transport_tx));
    let mut service = build_service(config, transport)?;
    service.forget_device(uuid)?;
    println!("Forgot device {uuid}");
    Ok(())
}

fn pair(config: &AppConfig, url: &str, source: Option<&str>) -> Result<(), PitwallError> {
    let (transport_tx, _transport_rx) = mpsc::channel();
    let transport = Arc::new(SimulatedTransport::new(transport_tx));
    let mut service = build_service(config, transport)?;
    if service.handle_open_url(url, source)? {
        println!("Paired {} device(s).", service.db().list_devices()?.len());
    } else {
        println!("URL was not a selection response for this app; ignored.");
    }
    Ok(())
}

/// Soak harness: a scripted wearable connects, greets, and reports a lap
/// session, exercising the full event path against the real database.
fn run(config: &AppConfig) -> Result<(), PitwallError> {
    let (transport_tx, transport_rx) = mpsc::channel();
    let transport = Arc::new(SimulatedTransport::new(transport_tx));
    let mut service = build_service(config, transport.clone())?;

    let demo = DeviceHandle {
        uuid: Uuid::new_v4(),
        display_name: "Fenix 7 (simulated)".to_string(),
        friendly_name: Some("Demo watch".to_string()),
        device_type: Some("watch".to_string()),
    };
    transport.script_selection(vec![demo.clone()]);

    let wearable = transport.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(500));
        wearable.set_status(demo.uuid, ConnectionStatus::Connected);
        thread::sleep(Duration::from_millis(500));
        wearable.deliver_message(
            demo.uuid,
            CompanionMessage::SessionSummary {
                stats: "Simulated stint".to_string(),
                date: None,
                latitude: None,
                longitude: None,
                lap_count: Some(12),
                best_lap_time: Some(92.4),
                total_time: Some(1180.7),
            }
            .encode(),
        );
    });

    service.begin_discovery()?;
    service.run(transport_rx);
    Ok(())
}

fn main() {
    colog::init();

    let cli = Args::parse();
    ctrlc::set_handler(move || {
        println!("Exiting...");
        std::process::exit(0);
    })
    .expect("Could not set Ctrl-C handler");

    let config = AppConfig::from_local_file().unwrap_or_default();

    let result = match &cli.command {
        Commands::Sessions { command } => sessions(&config, command),
        Commands::Devices => devices(&config),
        Commands::Forget { uuid } => forget(&config, uuid),
        Commands::Pair { url, source } => pair(&config, url, source.as_deref()),
        Commands::Run => run(&config),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
