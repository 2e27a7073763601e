use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::trace;

use crate::config::StationConfig;
use crate::errors::StationError;
use crate::model::Direction;
use crate::model::LocoId;
use crate::model::SensorAddress;
use crate::model::SensorEvent;
use crate::model::SignalAddress;
use crate::model::SignalAspect;
use crate::model::TurnoutAddress;
use crate::model::TurnoutPosition;
use crate::model::VELOCITY_MAX;
use crate::CommandStation;

/// A command the simulator has accepted, in acceptance order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationCommand {
    Turnout(TurnoutAddress, TurnoutPosition),
    Signal(SignalAddress, SignalAspect),
    Velocity(LocoId, u16),
    Direction(LocoId, Direction),
}

/// Loopback command station: records every accepted command and lets the
/// caller inject sensor transitions, standing in for the hardware link in
/// tests and the demo binary.
#[derive(Debug)]
pub struct SimStation {
    connected: AtomicBool,
    latency: Duration,
    events: broadcast::Sender<SensorEvent>,
    history: Mutex<Vec<StationCommand>>,
}

impl SimStation {
    pub fn new(config: &StationConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity);
        Self {
            connected: AtomicBool::new(true),
            latency: config.command_latency(),
            events,
            history: Mutex::new(Vec::new()),
        }
    }

    /// Inject one sensor transition, as the hardware would report it.
    pub fn trigger(
        &self,
        address: SensorAddress,
        active: bool,
    ) {
        let event = SensorEvent { address, active };
        trace!(sensor = %address, active, "sim sensor trigger");
        // nobody listening yet is fine
        let _ = self.events.send(event);
    }

    /// Momentary contact: active transition immediately followed by the
    /// release.
    pub fn pulse(
        &self,
        address: SensorAddress,
    ) {
        self.trigger(address, true);
        self.trigger(address, false);
    }

    pub fn set_connected(
        &self,
        connected: bool,
    ) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Snapshot of all accepted commands in order.
    pub fn commands(&self) -> Vec<StationCommand> {
        self.history.lock().clone()
    }

    pub fn clear_commands(&self) {
        self.history.lock().clear();
    }

    /// Last velocity commanded for the locomotive, if any.
    pub fn last_velocity(
        &self,
        loco: &LocoId,
    ) -> Option<u16> {
        self.history.lock().iter().rev().find_map(|command| match command {
            StationCommand::Velocity(id, velocity) if id == loco => Some(*velocity),
            _ => None,
        })
    }

    async fn accept(
        &self,
        command: StationCommand,
    ) -> Result<(), StationError> {
        if !self.is_connected() {
            return Err(StationError::NotConnected);
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        trace!(?command, "sim station accepted");
        self.history.lock().push(command);
        Ok(())
    }
}

#[async_trait]
impl CommandStation for SimStation {
    async fn switch_turnout(
        &self,
        address: TurnoutAddress,
        position: TurnoutPosition,
    ) -> Result<(), StationError> {
        self.accept(StationCommand::Turnout(address, position)).await
    }

    async fn set_signal(
        &self,
        address: SignalAddress,
        aspect: SignalAspect,
    ) -> Result<(), StationError> {
        self.accept(StationCommand::Signal(address, aspect)).await
    }

    async fn set_velocity(
        &self,
        loco: &LocoId,
        velocity: u16,
    ) -> Result<(), StationError> {
        if velocity > VELOCITY_MAX {
            return Err(StationError::CommandRejected {
                command: format!("velocity {velocity} for {loco}"),
                reason: format!("above the {VELOCITY_MAX} scale"),
            });
        }
        self.accept(StationCommand::Velocity(loco.clone(), velocity)).await
    }

    async fn set_direction(
        &self,
        loco: &LocoId,
        direction: Direction,
    ) -> Result<(), StationError> {
        self.accept(StationCommand::Direction(loco.clone(), direction)).await
    }

    fn subscribe_sensors(&self) -> broadcast::Receiver<SensorEvent> {
        self.events.subscribe()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Default for SimStation {
    fn default() -> Self {
        Self::new(&StationConfig::default())
    }
}
