//! Case: two trains race for one destination over a shared turnout.
//!
//! Scenario:
//!
//! 1. `ice1` (in `b1`) and `br218` (in `b3`) both aim for `b2`; their
//!    routes cross turnout 40 in opposite positions.
//! 2. Start both dispatchers with the track simulation feeding each.
//!
//! Expected Result:
//!
//! - Exactly one train reaches `b2`; the other keeps waiting at home.
//! - The turnout is thrown exactly once, for the winner's route.
//! - Both dispatchers park cleanly on `stop_all`.

use autorail::BlockId;
use autorail::LayoutStore;
use autorail::LocoId;
use autorail::StationCommand;

use crate::commons::contention_layout;
use crate::commons::launch_engine;
use crate::commons::occupied_block;
use crate::commons::spawn_track_sim;
use crate::commons::wait_until;

#[tracing::instrument]
#[tokio::test]
async fn test_shared_turnout_single_winner() -> autorail::Result<()> {
    crate::enable_logger();

    let layout = contention_layout();
    let (pilot, station) = launch_engine(layout.clone())?;
    let ice = LocoId::from("ice1");
    let br = LocoId::from("br218");

    pilot.start(&ice).await?;
    pilot.start(&br).await?;
    spawn_track_sim(&pilot, &station, &ice);
    spawn_track_sim(&pilot, &station, &br);

    wait_until("a winner occupies b2", || {
        layout
            .block(&"b2".into())
            .map(|block| block.occupant.is_some())
            .unwrap_or(false)
    })
    .await;

    let winner = layout.block(&"b2".into())?.occupant.expect("occupant");
    let (loser, home): (LocoId, BlockId) = if winner == ice {
        (br.clone(), "b3".into())
    } else {
        (ice.clone(), "b1".into())
    };
    assert_eq!(occupied_block(&layout, loser.as_str()), Some(home));

    let thrown: Vec<StationCommand> = station
        .commands()
        .into_iter()
        .filter(|command| matches!(command, StationCommand::Turnout(..)))
        .collect();
    assert_eq!(thrown.len(), 1, "one committed route, one thrown turnout: {thrown:?}");

    pilot.stop_all().await;
    wait_until("both dispatchers park", || {
        !pilot.is_running(&ice) && !pilot.is_running(&br)
    })
    .await;
    assert_eq!(layout.block(&"b2".into())?.occupant, Some(winner));
    Ok(())
}
