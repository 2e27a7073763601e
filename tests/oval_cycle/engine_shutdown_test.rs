//! Case: engine shutdown overtakes a rolling train.
//!
//! Scenario:
//!
//! 1. Start `ice1` on the oval with no track simulation, so it launches and
//!    keeps waiting for its enter sensor.
//! 2. Shut the engine down while the train is rolling.
//!
//! Expected Result:
//!
//! - The dispatcher exits without waiting for the sensor.
//! - A stop command reaches the track before the engine is gone.
//! - The reservation stays on the layout for the operator to resolve.

use autorail::BlockState;
use autorail::LayoutStore;
use autorail::LocoId;
use autorail::Phase;

use crate::commons::launch_engine;
use crate::commons::oval_layout;
use crate::commons::wait_for_phase;
use crate::commons::wait_until;

#[tracing::instrument]
#[tokio::test]
async fn test_shutdown_stops_rolling_train() -> autorail::Result<()> {
    crate::enable_logger();

    let layout = oval_layout();
    let (pilot, station) = launch_engine(layout.clone())?;
    let ice = LocoId::from("ice1");

    pilot.start(&ice).await?;
    let mut phases = pilot.watch(&ice).expect("phase feed");
    wait_for_phase(&mut phases, Phase::Starting).await;
    wait_until("cruise command reaches the track", || {
        station.last_velocity(&ice) == Some(600)
    })
    .await;

    pilot.shutdown();
    pilot.join_all().await;

    assert!(!pilot.is_running(&ice));
    assert_eq!(station.last_velocity(&ice), Some(0));
    // the interrupted run keeps its locks; recovery is the operator's call
    assert!(layout.route(&"r12".into())?.is_locked_by(&ice));
    assert_eq!(layout.block(&"b2".into())?.state, BlockState::Locked);
    Ok(())
}
