use std::fs::create_dir_all;
use std::fs::File;
use std::fs::OpenOptions;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use autorail::Autopilot;
use autorail::AutopilotBuilder;
use autorail::Block;
use autorail::BlockSide;
use autorail::Error;
use autorail::LocoId;
use autorail::Locomotive;
use autorail::MemoryLayoutStore;
use autorail::RailTypeConfig;
use autorail::Result;
use autorail::Route;
use autorail::RouteElement;
use autorail::SensorAddress;
use autorail::Settings;
use autorail::SignalAddress;
use autorail::SimStation;
use autorail::TurnoutAddress;
use autorail::TurnoutPosition;
use autorail::TurnoutSetting;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

/// Travel delay between arming a sensor and the simulated train reaching it
const TRAVEL_TIME: Duration = Duration::from_millis(1500);

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let settings = Settings::load(None)?;

    // Initializing Logs
    let _guard = init_observability(&settings.log.dir)?;

    // Demo plan: a three-block oval with two trains chasing each other
    let layout = Arc::new(MemoryLayoutStore::new());
    seed_demo_layout(&layout)?;
    let station = Arc::new(SimStation::new(&settings.station));

    // Build Engine
    let pilot = AutopilotBuilder::from_settings(settings)
        .layout(layout)
        .station(station.clone())
        .build()
        .ready()?;

    for loco in [LocoId::from("ice1"), LocoId::from("br218")] {
        pilot.start(&loco).await?;
        simulate_track(&pilot, &station, &loco);
    }

    info!("Engine started. Waiting for CTRL+C signal...");
    graceful_shutdown(&pilot).await;

    println!("Exiting program.");
    Ok(())
}

async fn graceful_shutdown(pilot: &Autopilot<RailTypeConfig>) {
    let mut sigint = signal(SignalKind::interrupt()).unwrap();
    let mut sigterm = signal(SignalKind::terminate()).unwrap();
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    pilot.shutdown();
    pilot.join_all().await;
    info!("Shutdown completed");
}

/// Three blocks in a circle, every leg entered through the Minus side, two
/// turnouts on the way round. `ice1` starts in `b1`, `br218` in `b2`.
fn seed_demo_layout(layout: &MemoryLayoutStore) -> Result<()> {
    for n in 1..=3u16 {
        let mut block = Block::new(
            format!("b{n}"),
            format!("t{n}"),
            SensorAddress::new(20, 2 * n - 1),
            SensorAddress::new(20, 2 * n),
        );
        block.signal_plus = Some(SignalAddress(100 + n));
        layout.add_block(block);
    }

    let mut r12 = Route::new("r12", "t1", BlockSide::Plus, "t2", BlockSide::Minus);
    r12.elements = vec![RouteElement {
        tile: "x30".into(),
        turnout: Some(TurnoutSetting {
            address: TurnoutAddress(30),
            position: TurnoutPosition::Straight,
        }),
        order: 0,
    }];
    layout.add_route(r12);

    layout.add_route(Route::new("r23", "t2", BlockSide::Plus, "t3", BlockSide::Minus));

    let mut r31 = Route::new("r31", "t3", BlockSide::Plus, "t1", BlockSide::Minus);
    r31.elements = vec![RouteElement {
        tile: "x31".into(),
        turnout: Some(TurnoutSetting {
            address: TurnoutAddress(31),
            position: TurnoutPosition::Diverging,
        }),
        order: 0,
    }];
    layout.add_route(r31);

    layout.add_locomotive(Locomotive::new("ice1"));
    layout.add_locomotive(Locomotive::new("br218"));
    layout.place_locomotive(&"ice1".into(), &"b1".into())?;
    layout.place_locomotive(&"br218".into(), &"b2".into())?;
    Ok(())
}

/// Stand-in for the track hardware: whenever the dispatcher arms a sensor,
/// report that sensor after a travel delay, the way a train rolling over
/// the contact would.
fn simulate_track(
    pilot: &Autopilot<RailTypeConfig>,
    station: &Arc<SimStation>,
    loco: &LocoId,
) {
    let Some(mut phases) = pilot.watch(loco) else {
        return;
    };
    let station = station.clone();
    let loco = loco.clone();
    tokio::spawn(async move {
        // one pulse per armed sensor; the marker clears at every rest
        let mut pulsed = None;
        loop {
            let awaited = phases.borrow_and_update().awaiting;
            match awaited {
                Some(sensor) if pulsed != Some(sensor) => {
                    tokio::time::sleep(TRAVEL_TIME).await;
                    station.pulse(sensor);
                    pulsed = Some(sensor);
                }
                Some(_) => {}
                None => pulsed = None,
            }
            if phases.changed().await.is_err() {
                info!(loco = %loco, "phase feed ended; track sim stops");
                return;
            }
        }
    });
}

pub fn init_observability(log_dir: &Path) -> Result<WorkerGuard> {
    let log_file = open_file_for_append(log_dir.join("autorail.log"))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(base_subscriber).init();

    Ok(guard)
}

fn open_file_for_append(path: PathBuf) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            create_dir_all(parent)
                .map_err(|e| Error::Fatal(format!("Failed to create log directory: {e}")))?;
        }
    }
    OpenOptions::new()
        .append(true)
        .create(true)
        .open(&path)
        .map_err(|e| Error::Fatal(format!("Failed to open log file {}: {e}", path.display())))
}
