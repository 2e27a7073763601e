//! Case: a lone train laps a three-block oval and parks on request.
//!
//! Scenario:
//!
//! 1. Start `ice1` in `b1` on an oval b1 -> b2 -> b3 -> b1.
//! 2. Let the track simulation feed it every sensor it arms.
//! 3. Watch it arrive in `b2`, `b3` and back in `b1`.
//! 4. Ask the dispatcher to stop.
//!
//! Expected Result:
//!
//! - The train visits the blocks in track order.
//! - The dispatcher parks at the rest point and its task exits.
//! - Every route lock is released and only `b1` stays occupied.

use autorail::LayoutStore;
use autorail::LocoId;

use crate::commons::launch_engine;
use crate::commons::occupied_block;
use crate::commons::oval_layout;
use crate::commons::spawn_track_sim;
use crate::commons::wait_until;

#[tracing::instrument]
#[tokio::test]
async fn test_full_lap_then_park() -> autorail::Result<()> {
    crate::enable_logger();

    let layout = oval_layout();
    let (pilot, station) = launch_engine(layout.clone())?;
    let ice = LocoId::from("ice1");

    pilot.start(&ice).await?;
    spawn_track_sim(&pilot, &station, &ice);

    // one full lap, block by block
    for stop in ["b2", "b3", "b1"] {
        wait_until(&format!("ice1 reaches {stop}"), || {
            occupied_block(&layout, "ice1").as_ref().map(|id| id.as_str()) == Some(stop)
        })
        .await;
    }

    // park at the rest point before the next leg launches
    pilot.stop(&ice).await?;
    wait_until("dispatcher parks", || !pilot.is_running(&ice)).await;

    assert_eq!(occupied_block(&layout, "ice1"), Some("b1".into()));
    assert_eq!(station.last_velocity(&ice), Some(0));
    for route in ["r12", "r23", "r31"] {
        assert!(!layout.route(&route.into())?.is_locked(), "{route} still locked");
    }
    for block in ["b2", "b3"] {
        assert!(layout.block(&block.into())?.is_free(), "{block} not released");
    }
    Ok(())
}
