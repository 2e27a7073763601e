use super::*;
use crate::config::StationConfig;
use crate::errors::StationError;
use crate::model::Direction;
use crate::model::SensorAddress;
use crate::model::SignalAddress;
use crate::model::SignalAspect;
use crate::model::TurnoutAddress;
use crate::model::TurnoutPosition;
use crate::test_utils;

#[tokio::test]
async fn test_commands_recorded_in_order() {
    test_utils::enable_logger();
    let station = SimStation::default();
    let loco = "ice1".into();

    station
        .switch_turnout(TurnoutAddress(30), TurnoutPosition::Diverging)
        .await
        .expect("turnout");
    station
        .set_direction(&loco, Direction::Forwards)
        .await
        .expect("direction");
    station.set_velocity(&loco, 600).await.expect("velocity");
    station.set_velocity(&loco, 300).await.expect("velocity");
    station
        .set_signal(SignalAddress(5), SignalAspect::Clear)
        .await
        .expect("signal");

    assert_eq!(
        station.commands(),
        vec![
            StationCommand::Turnout(TurnoutAddress(30), TurnoutPosition::Diverging),
            StationCommand::Direction(loco.clone(), Direction::Forwards),
            StationCommand::Velocity(loco.clone(), 600),
            StationCommand::Velocity(loco.clone(), 300),
            StationCommand::Signal(SignalAddress(5), SignalAspect::Clear),
        ]
    );
    assert_eq!(station.last_velocity(&loco), Some(300));
}

#[tokio::test]
async fn test_disconnected_station_rejects_commands() {
    test_utils::enable_logger();
    let station = SimStation::default();
    station.set_connected(false);

    let result = station.set_velocity(&"ice1".into(), 600).await;

    assert!(matches!(result, Err(StationError::NotConnected)));
    assert!(station.commands().is_empty());
}

#[tokio::test]
async fn test_velocity_above_scale_is_rejected() {
    test_utils::enable_logger();
    let station = SimStation::default();

    let result = station.set_velocity(&"ice1".into(), 1001).await;

    assert!(matches!(result, Err(StationError::CommandRejected { .. })));
    assert!(station.commands().is_empty());
}

/// # Case 1: subscribers receive injected transitions in order
///
/// # Case 2: a pulse delivers the active edge and its release
#[tokio::test]
async fn test_sensor_feed_delivery() {
    test_utils::enable_logger();
    let station = SimStation::new(&StationConfig::default());
    let mut feed = station.subscribe_sensors();
    let address = SensorAddress::new(20, 3);

    station.pulse(address);

    let on = feed.recv().await.expect("active edge");
    assert_eq!(on.address, address);
    assert!(on.active);

    let off = feed.recv().await.expect("release edge");
    assert!(!off.active);
}

#[tokio::test]
async fn test_trigger_without_subscribers_is_harmless() {
    test_utils::enable_logger();
    let station = SimStation::default();

    station.trigger(SensorAddress::new(20, 3), true);
}
