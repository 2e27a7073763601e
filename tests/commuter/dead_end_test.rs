//! Case: a commuter backs out of a dead end and shuttles.
//!
//! Scenario:
//!
//! 1. Commuter `vt628` is parked in dead end `b2`; the only route out leads
//!    back through the side it came in.
//! 2. Start it with the track simulation running.
//!
//! Expected Result:
//!
//! - The engine reverses the running direction instead of giving up.
//! - The train reaches `b1`, then shuttles back into `b2` on the next leg.
//! - Each leg is preceded by a direction command to the track.

use autorail::Direction;
use autorail::LocoId;
use autorail::StationCommand;

use crate::commons::dead_end_layout;
use crate::commons::launch_engine;
use crate::commons::occupied_block;
use crate::commons::spawn_track_sim;
use crate::commons::wait_until;

#[tracing::instrument]
#[tokio::test]
async fn test_commuter_shuttles_dead_end() -> autorail::Result<()> {
    crate::enable_logger();

    let layout = dead_end_layout();
    let (pilot, station) = launch_engine(layout.clone())?;
    let vt = LocoId::from("vt628");

    pilot.start(&vt).await?;
    spawn_track_sim(&pilot, &station, &vt);

    wait_until("vt628 backs out into b1", || {
        occupied_block(&layout, "vt628").as_ref().map(|id| id.as_str()) == Some("b1")
    })
    .await;
    wait_until("vt628 shuttles back into b2", || {
        occupied_block(&layout, "vt628").as_ref().map(|id| id.as_str()) == Some("b2")
    })
    .await;

    pilot.stop(&vt).await?;
    wait_until("dispatcher parks", || !pilot.is_running(&vt)).await;

    let directions: Vec<Direction> = station
        .commands()
        .into_iter()
        .filter_map(|command| match command {
            StationCommand::Direction(id, direction) if id == vt => Some(direction),
            _ => None,
        })
        .collect();
    assert_eq!(directions, vec![Direction::Backwards, Direction::Forwards]);
    Ok(())
}
