//! Per-locomotive dispatch state machine.
//!
//! One `Dispatcher` task drives one locomotive through the block cycle:
//! reserve a route, run it sensor to sensor, finalize the arrival, rest,
//! repeat. All cross-dispatcher coordination happens through the shared
//! reservation gate and the sensor router; dispatchers never talk to each
//! other directly.

use std::sync::Arc;

use tokio::select;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::sync::Semaphore;
use tokio::time::sleep_until;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::ActiveReservation;
use super::ControlEvent;
use super::PauseTimer;
use super::Phase;
use super::PhaseChange;
use super::ReservationProtocol;
use super::SensorRouter;
use crate::alias::CSOF;
use crate::alias::LSOF;
use crate::alias::RCOF;
use crate::alias::TVOF;
use crate::config::AutopilotConfig;
use crate::errors::DispatchError;
use crate::errors::StationError;
use crate::model::Block;
use crate::model::LocoId;
use crate::model::Locomotive;
use crate::model::SensorAddress;
use crate::model::SensorEvent;
use crate::model::VELOCITY_STOP;
use crate::CommandStation;
use crate::LayoutStore;
use crate::Result;
use crate::TypeConfig;

/// Sensor events queue up here between loop passes; awaits are re-armed one
/// at a time, so the queue stays near empty.
const SENSOR_QUEUE_DEPTH: usize = 16;

pub struct Dispatcher<T>
where T: TypeConfig
{
    loco_id: LocoId,
    layout: Arc<LSOF<T>>,
    station: Arc<CSOF<T>>,
    router: Arc<SensorRouter<T>>,
    protocol: ReservationProtocol<T>,
    gate: Arc<Semaphore>,
    config: AutopilotConfig,
    shutdown: CancellationToken,

    ctrl_rx: mpsc::Receiver<ControlEvent>,
    phase_tx: watch::Sender<PhaseChange>,
    sensor_tx: mpsc::Sender<SensorEvent>,
    sensor_rx: mpsc::Receiver<SensorEvent>,

    phase: Phase,
    automode: bool,
    reset_requested: bool,
    /// A direction command must go out before the next launch
    first_move: bool,
    /// The stall timeout fired and the train was emergency-stopped
    stalled: bool,
    current: Option<ActiveReservation>,
    /// Continuation reservation while passing through
    next: Option<ActiveReservation>,
    awaiting: Option<SensorAddress>,
    ignored: Vec<SensorAddress>,
    timer: PauseTimer,
    stall_deadline: Option<Instant>,
}

impl<T> Dispatcher<T>
where T: TypeConfig
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        loco_id: LocoId,
        layout: Arc<LSOF<T>>,
        station: Arc<CSOF<T>>,
        view: Arc<TVOF<T>>,
        chooser: Arc<RCOF<T>>,
        router: Arc<SensorRouter<T>>,
        gate: Arc<Semaphore>,
        config: AutopilotConfig,
        shutdown: CancellationToken,
        ctrl_rx: mpsc::Receiver<ControlEvent>,
        phase_tx: watch::Sender<PhaseChange>,
    ) -> Self {
        let (sensor_tx, sensor_rx) = mpsc::channel(SENSOR_QUEUE_DEPTH);
        let protocol = ReservationProtocol::new(
            layout.clone(),
            station.clone(),
            view,
            chooser,
            config.clone(),
        );
        // step mode trades the rest pause for immediate re-dispatch
        let wait_range = if config.step_mode { (0, 0) } else { config.wait.range_ms() };
        let timer = PauseTimer::new(wait_range);

        Self {
            loco_id,
            layout,
            station,
            router,
            protocol,
            gate,
            config,
            shutdown,

            ctrl_rx,
            phase_tx,
            sensor_tx,
            sensor_rx,

            phase: Phase::Idle,
            automode: true,
            reset_requested: false,
            first_move: true,
            stalled: false,
            current: None,
            next: None,
            awaiting: None,
            ignored: Vec::new(),
            timer,
            stall_deadline: None,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        info!(loco = %self.loco_id, "dispatcher running");
        self.publish();

        loop {
            // Idle with automode off is the terminal rest point: stop,
            // reset and hard failures all funnel here
            if self.phase == Phase::Idle && !self.automode {
                info!(loco = %self.loco_id, "dispatcher parked");
                return Ok(());
            }

            let tick = sleep_until(self.next_deadline());
            select! {
                // Use biased to ensure branch order
                biased;
                // P0: engine shutdown
                _ = self.shutdown.cancelled() => {
                    self.teardown().await;
                    return Ok(());
                }
                // P1: control requests only latch flags
                Some(ctrl) = self.ctrl_rx.recv() => {
                    self.on_control(ctrl);
                }
                // P2: an armed sensor fired
                Some(event) = self.sensor_rx.recv() => {
                    if let Err(e) = self.on_sensor(event).await {
                        error!(loco = %self.loco_id, error = %e, "sensor handling failed");
                    }
                }
                // P3: phase tick
                _ = tick => {
                    if let Err(e) = self.tick().await {
                        error!(loco = %self.loco_id, error = %e, "tick failed");
                    }
                }
            }
        }
    }

    /// When the loop wakes up if no event arrives first.
    fn next_deadline(&self) -> Instant {
        if self.reset_requested {
            return Instant::now();
        }
        match self.phase {
            Phase::Waiting if self.automode => self.timer.next_deadline(),
            Phase::Waiting | Phase::PrepareRoute => Instant::now(),
            _ => Instant::now() + self.config.sensors.poll_interval(),
        }
    }

    fn on_control(
        &mut self,
        ctrl: ControlEvent,
    ) {
        match ctrl {
            ControlEvent::AutomodeOff => {
                info!(loco = %self.loco_id, "automode off requested");
                self.automode = false;
            }
            ControlEvent::Reset => {
                info!(loco = %self.loco_id, "reset requested");
                self.reset_requested = true;
            }
        }
    }

    async fn tick(&mut self) -> Result<()> {
        if self.reset_requested {
            self.perform_reset().await;
            return Ok(());
        }

        match self.phase {
            Phase::Idle => {
                if self.automode {
                    self.transition(Phase::PrepareRoute);
                }
            }
            Phase::PrepareRoute => self.prepare_route().await?,
            Phase::Starting | Phase::Entering | Phase::Proceeding => {
                self.check_stall().await;
            }
            Phase::PrepareNext => {
                self.check_stall().await;
                if self.automode {
                    self.attempt_next().await?;
                } else {
                    // automode off declines the continuation; stop here
                    self.transition(Phase::Entering);
                }
            }
            Phase::Waiting => {
                if !self.automode {
                    self.transition(Phase::Idle);
                } else if self.timer.is_expired() {
                    self.transition(Phase::PrepareRoute);
                }
            }
            // these complete inline at their entry sites
            Phase::Braking | Phase::Resetting => {}
        }
        Ok(())
    }

    async fn on_sensor(
        &mut self,
        event: SensorEvent,
    ) -> Result<()> {
        if Some(event.address) != self.awaiting {
            // a replaced registration can leave one old event in the queue
            trace!(loco = %self.loco_id, sensor = %event.address, "stale sensor event");
            return Ok(());
        }
        if !event.active {
            trace!(loco = %self.loco_id, sensor = %event.address, "awaited contact released");
            return Ok(());
        }
        if self.reset_requested {
            // the latched reset wins; the tick handles it
            return Ok(());
        }

        if self.stalled {
            self.resume_after_stall().await;
        }

        match self.phase {
            Phase::Starting => self.enter_block().await,
            Phase::Entering | Phase::PrepareNext => self.brake_and_finalize().await,
            Phase::Proceeding => self.complete_pass().await,
            _ => {
                trace!(
                    loco = %self.loco_id,
                    phase = %self.phase,
                    "sensor event outside a sensor wait"
                );
                Ok(())
            }
        }
    }

    /// PrepareRoute: reserve the next route under the global gate.
    async fn prepare_route(&mut self) -> Result<()> {
        let Ok(permit) = self.gate.try_acquire() else {
            trace!(loco = %self.loco_id, "reservation gate busy");
            self.to_waiting();
            return Ok(());
        };

        let mut loco = match self.layout.locomotive(&self.loco_id) {
            Ok(loco) => loco,
            Err(e) => {
                drop(permit);
                error!(loco = %self.loco_id, error = %e, "locomotive vanished from the layout");
                self.park();
                return Ok(());
            }
        };
        let Some(departure) = self.layout.block_of_locomotive(&self.loco_id) else {
            drop(permit);
            let e = DispatchError::NotPlaced(self.loco_id.clone());
            error!(loco = %self.loco_id, error = %e, "cannot dispatch");
            self.park();
            return Ok(());
        };

        let outcome = self.protocol.reserve_standing(&loco, &departure).await;
        drop(permit);

        match outcome {
            Ok(reservation) => {
                if reservation.flip_direction {
                    loco.direction = !loco.direction;
                    if let Err(e) = self.layout.save_locomotive(&loco) {
                        error!(loco = %self.loco_id, error = %e, "direction flip not persisted");
                        self.protocol.rollback(reservation).await;
                        self.park();
                        return Ok(());
                    }
                    // the decoder must hear the new direction before moving
                    self.first_move = true;
                }
                self.begin_run(reservation, &loco, &departure).await
            }
            Err(e) if e.is_retryable() => {
                debug!(loco = %self.loco_id, reason = %e, "no route for now");
                self.to_waiting();
                Ok(())
            }
            Err(e) => {
                error!(loco = %self.loco_id, error = %e, "reservation failed hard");
                self.park();
                Ok(())
            }
        }
    }

    /// A route is reserved: arm the sensors, then set the train in motion.
    async fn begin_run(
        &mut self,
        reservation: ActiveReservation,
        loco: &Locomotive,
        departure: &Block,
    ) -> Result<()> {
        // our own boundary contacts will trip while pulling out
        for address in [departure.sensor_plus, departure.sensor_minus] {
            self.router.register_ignore(address, &self.loco_id);
            self.ignored.push(address);
        }

        let enter_sensor = reservation.enter_sensor;
        self.current = Some(reservation);

        // arm before moving; a missed enter event is unrecoverable
        if let Err(e) = self.arm(enter_sensor) {
            warn!(loco = %self.loco_id, error = %e, "enter sensor contended; backing off");
            self.abort_run().await;
            self.to_waiting();
            return Ok(());
        }

        if let Err(e) = self.launch(loco).await {
            error!(loco = %self.loco_id, error = %e, "station refused the launch");
            self.abort_run().await;
            self.park();
            return Ok(());
        }

        self.arm_stall();
        self.transition(Phase::Starting);
        Ok(())
    }

    async fn launch(
        &mut self,
        loco: &Locomotive,
    ) -> Result<()> {
        if self.first_move {
            self.station.set_direction(&loco.id, loco.direction).await?;
            self.first_move = false;
        }
        self.command_velocity(loco.cruise_velocity()).await?;
        Ok(())
    }

    /// Issue a speed command and record it on the locomotive entity, so the
    /// stored velocity always reflects the last command sent.
    async fn command_velocity(
        &self,
        velocity: u16,
    ) -> std::result::Result<(), StationError> {
        self.station.set_velocity(&self.loco_id, velocity).await?;
        if let Ok(mut loco) = self.layout.locomotive(&self.loco_id) {
            loco.velocity = velocity;
            if let Err(e) = self.layout.save_locomotive(&loco) {
                warn!(loco = %self.loco_id, error = %e, "commanded velocity not recorded");
            }
        }
        Ok(())
    }

    /// Starting -> Entering: the train hit the destination's enter sensor.
    async fn enter_block(&mut self) -> Result<()> {
        let loco = match self.layout.locomotive(&self.loco_id) {
            Ok(loco) => loco,
            Err(e) => {
                error!(loco = %self.loco_id, error = %e, "locomotive vanished while entering");
                self.abort_run().await;
                self.to_waiting();
                return Ok(());
            }
        };
        let (in_sensor, destination_id) = match self.current.as_ref() {
            Some(reservation) => (reservation.in_sensor, reservation.destination.clone()),
            None => {
                warn!(loco = %self.loco_id, "enter sensor fired without a reservation");
                return Ok(());
            }
        };
        let through_allowed = match self.layout.block(&destination_id) {
            Ok(block) => block.through_allowed,
            Err(e) => {
                warn!(loco = %self.loco_id, error = %e, "destination lookup failed; will stop there");
                false
            }
        };

        // slow down first; the remaining stop distance is one block
        if let Err(e) = self.command_velocity(loco.approach_velocity()).await {
            error!(loco = %self.loco_id, error = %e, "approach speed refused");
            self.abort_run().await;
            self.to_waiting();
            return Ok(());
        }

        if let Some(reservation) = self.current.as_mut() {
            if let Err(e) = self.protocol.mark_crossing(reservation) {
                error!(loco = %self.loco_id, error = %e, "crossing bookkeeping failed");
                self.abort_run().await;
                self.to_waiting();
                return Ok(());
            }
        }

        self.disarm();
        if let Err(e) = self.arm(in_sensor) {
            error!(loco = %self.loco_id, error = %e, "in sensor contended");
            self.abort_run().await;
            self.to_waiting();
            return Ok(());
        }
        self.arm_stall();

        self.transition(Phase::Entering);
        if through_allowed && self.automode {
            self.transition(Phase::PrepareNext);
        }
        Ok(())
    }

    /// PrepareNext: try to reserve a continuation without ever blocking the
    /// moving train.
    async fn attempt_next(&mut self) -> Result<()> {
        let (entry_side, departure_id) = match self.current.as_ref() {
            Some(reservation) => (reservation.arrival_side, reservation.destination.clone()),
            None => {
                warn!(loco = %self.loco_id, "no active reservation while preparing a continuation");
                self.transition(Phase::Entering);
                return Ok(());
            }
        };
        // identity reads only; everything availability-deciding happens
        // under the gate inside the protocol
        let loco = match self.layout.locomotive(&self.loco_id) {
            Ok(loco) => loco,
            Err(e) => {
                error!(loco = %self.loco_id, error = %e, "layout lookup failed; stopping here");
                self.transition(Phase::Entering);
                return Ok(());
            }
        };
        let departure = match self.layout.block(&departure_id) {
            Ok(block) => block,
            Err(e) => {
                error!(loco = %self.loco_id, error = %e, "layout lookup failed; stopping here");
                self.transition(Phase::Entering);
                return Ok(());
            }
        };

        let Ok(permit) = self.gate.try_acquire() else {
            // never stall the decision on the gate; next tick retries
            return Ok(());
        };
        let outcome = self.protocol.reserve_moving(&loco, &departure, entry_side).await;
        drop(permit);

        match outcome {
            Ok(continuation) => {
                if let Some(reservation) = self.current.as_mut() {
                    if let Err(e) = self.protocol.mark_passthrough(reservation) {
                        error!(loco = %self.loco_id, error = %e, "pass-through marking failed");
                        self.protocol.rollback(continuation).await;
                        self.transition(Phase::Entering);
                        return Ok(());
                    }
                }
                // back to cruise for the pass; a refused command only means
                // the pass happens at approach speed
                if let Err(e) = self.command_velocity(loco.cruise_velocity()).await {
                    warn!(loco = %self.loco_id, error = %e, "cruise restore refused");
                }
                debug!(
                    loco = %self.loco_id,
                    route = %continuation.route_id,
                    "continuation reserved; passing through"
                );
                self.next = Some(continuation);
                self.transition(Phase::Proceeding);
            }
            Err(e) if e.is_retryable() => {
                debug!(loco = %self.loco_id, reason = %e, "no continuation; stopping here");
                self.transition(Phase::Entering);
            }
            Err(e) => {
                error!(loco = %self.loco_id, error = %e, "continuation search failed");
                self.transition(Phase::Entering);
            }
        }
        Ok(())
    }

    /// Entering/PrepareNext -> Waiting: the train reached the in sensor and
    /// stops here.
    async fn brake_and_finalize(&mut self) -> Result<()> {
        self.transition(Phase::Braking);

        let loco = match self.layout.locomotive(&self.loco_id) {
            Ok(loco) => loco,
            Err(e) => {
                error!(loco = %self.loco_id, error = %e, "locomotive vanished while braking");
                self.to_waiting();
                return Ok(());
            }
        };

        if let Err(e) = self.command_velocity(VELOCITY_STOP).await {
            // the train is on the in sensor; the bookkeeping must happen
            // regardless
            error!(loco = %self.loco_id, error = %e, "stop command failed");
        }

        self.clear_registrations();
        self.stall_deadline = None;
        self.stalled = false;

        // a continuation is only held in Proceeding; give back a stray one
        if let Some(next) = self.next.take() {
            self.protocol.rollback(next).await;
        }

        let Some(reservation) = self.current.take() else {
            warn!(loco = %self.loco_id, "in sensor fired without a reservation");
            self.to_waiting();
            return Ok(());
        };
        if let Err(e) = self.protocol.release_after_stop(reservation, &loco).await {
            error!(loco = %self.loco_id, error = %e, "arrival bookkeeping failed");
        }

        self.to_waiting();
        Ok(())
    }

    /// Proceeding -> Starting: the in sensor fired with a continuation held.
    /// The pass completes and the continuation becomes the active run.
    async fn complete_pass(&mut self) -> Result<()> {
        let loco = match self.layout.locomotive(&self.loco_id) {
            Ok(loco) => loco,
            Err(e) => {
                error!(loco = %self.loco_id, error = %e, "locomotive vanished while passing");
                self.abort_run().await;
                self.to_waiting();
                return Ok(());
            }
        };

        let Some(finished) = self.current.take() else {
            warn!(loco = %self.loco_id, "in sensor fired without a reservation");
            self.to_waiting();
            return Ok(());
        };
        let Some(continuation) = self.next.take() else {
            // should not happen: Proceeding is only entered with one held
            warn!(loco = %self.loco_id, "proceeding without a continuation; braking instead");
            self.current = Some(finished);
            return self.brake_and_finalize().await;
        };

        let passed_id = finished.destination.clone();
        if let Err(e) = self.protocol.release_passthrough(finished, &loco).await {
            error!(loco = %self.loco_id, error = %e, "pass completion failed");
            self.protocol.rollback(continuation).await;
            self.abort_run().await;
            self.to_waiting();
            return Ok(());
        }

        // the block just passed becomes the new departure
        self.clear_registrations();
        match self.layout.block(&passed_id) {
            Ok(passed) => {
                for address in [passed.sensor_plus, passed.sensor_minus] {
                    self.router.register_ignore(address, &self.loco_id);
                    self.ignored.push(address);
                }
            }
            Err(e) => {
                warn!(loco = %self.loco_id, error = %e, "cannot ignore the passed block's contacts");
            }
        }

        let enter_sensor = continuation.enter_sensor;
        self.current = Some(continuation);
        if let Err(e) = self.arm(enter_sensor) {
            error!(loco = %self.loco_id, error = %e, "next enter sensor contended");
            self.abort_run().await;
            self.to_waiting();
            return Ok(());
        }
        self.arm_stall();

        // already rolling at cruise; no direction or speed reissue
        self.transition(Phase::Starting);
        Ok(())
    }

    /// Resetting: abort whatever is in flight and park.
    async fn perform_reset(&mut self) {
        self.transition(Phase::Resetting);

        if let Err(e) = self.command_velocity(VELOCITY_STOP).await {
            error!(loco = %self.loco_id, error = %e, "stop command failed during reset");
        }

        // sweep instead of the tracked list; reset must leave nothing behind
        self.router.clear_locomotive(&self.loco_id);
        self.ignored.clear();
        self.awaiting = None;

        if let Some(next) = self.next.take() {
            self.protocol.rollback(next).await;
        }
        if let Some(current) = self.current.take() {
            self.protocol.rollback(current).await;
        }

        self.reset_requested = false;
        self.first_move = true;
        self.stalled = false;
        self.stall_deadline = None;
        // the operator took over; automode must be re-enabled explicitly
        self.automode = false;

        self.transition(Phase::Idle);
        info!(loco = %self.loco_id, "reset complete");
    }

    /// Emergency-stop on an expired sensor wait. The await stays armed so a
    /// late genuine event resumes the run.
    async fn check_stall(&mut self) {
        let Some(deadline) = self.stall_deadline else {
            return;
        };
        if Instant::now() < deadline {
            return;
        }

        self.stall_deadline = None;
        self.stalled = true;
        if let Some(sensor) = self.awaiting {
            let stall = DispatchError::Stalled {
                loco: self.loco_id.clone(),
                sensor,
            };
            warn!(loco = %self.loco_id, error = %stall, "emergency stop; await stays armed");
        }
        if let Err(e) = self.command_velocity(VELOCITY_STOP).await {
            error!(loco = %self.loco_id, error = %e, "emergency stop failed");
        }
    }

    /// A late sensor event after a stall: bring the speed back for the
    /// current phase, then let the normal handler run.
    async fn resume_after_stall(&mut self) {
        self.stalled = false;
        let velocity = match self.layout.locomotive(&self.loco_id) {
            Ok(loco) => match self.phase {
                Phase::Entering | Phase::PrepareNext => loco.approach_velocity(),
                _ => loco.cruise_velocity(),
            },
            Err(_) => return,
        };
        info!(loco = %self.loco_id, "late sensor event; resuming the run");
        if let Err(e) = self.command_velocity(velocity).await {
            error!(loco = %self.loco_id, error = %e, "resume speed command failed");
        }
    }

    /// Stop the train and give back every reservation and registration.
    /// Does not transition; the caller picks where to park.
    async fn abort_run(&mut self) {
        if let Err(e) = self.command_velocity(VELOCITY_STOP).await {
            error!(loco = %self.loco_id, error = %e, "stop command failed during abort");
        }
        self.clear_registrations();
        if let Some(next) = self.next.take() {
            self.protocol.rollback(next).await;
        }
        if let Some(current) = self.current.take() {
            self.protocol.rollback(current).await;
        }
        self.stall_deadline = None;
        self.stalled = false;
    }

    async fn teardown(&mut self) {
        info!(loco = %self.loco_id, "dispatcher shutting down");
        if self.phase.awaits_sensor() {
            // never leave a train rolling on engine exit
            if let Err(e) = self.command_velocity(VELOCITY_STOP).await {
                error!(loco = %self.loco_id, error = %e, "stop on shutdown failed");
            }
        }
        self.router.clear_locomotive(&self.loco_id);
        self.ignored.clear();
        self.awaiting = None;
    }

    fn arm(
        &mut self,
        address: SensorAddress,
    ) -> std::result::Result<(), DispatchError> {
        self.router.register_await(address, &self.loco_id, self.sensor_tx.clone())?;
        self.awaiting = Some(address);
        Ok(())
    }

    fn disarm(&mut self) {
        if let Some(address) = self.awaiting.take() {
            self.router.clear_await(address, &self.loco_id);
        }
    }

    fn clear_registrations(&mut self) {
        self.disarm();
        for address in self.ignored.drain(..) {
            self.router.remove_ignore(address, &self.loco_id);
        }
    }

    fn arm_stall(&mut self) {
        self.stalled = false;
        self.stall_deadline = self
            .config
            .sensors
            .stall_timeout()
            .map(|timeout| Instant::now() + timeout);
    }

    fn to_waiting(&mut self) {
        self.timer.reset();
        self.transition(Phase::Waiting);
    }

    /// Hard failure: this dispatcher gives up, others keep running.
    fn park(&mut self) {
        self.automode = false;
        self.transition(Phase::Idle);
    }

    /// The single transition site: every phase change funnels through here
    /// and is published on the watch channel.
    fn transition(
        &mut self,
        to: Phase,
    ) {
        debug!(loco = %self.loco_id, from = %self.phase, to = %to, "phase transition");
        self.phase = to;
        self.publish();
    }

    fn publish(&self) {
        let change = PhaseChange {
            loco: self.loco_id.clone(),
            phase: self.phase,
            awaiting: self.awaiting,
            route: self.current.as_ref().map(|r| r.route_id.clone()),
        };
        if self.phase_tx.send(change).is_err() {
            trace!(loco = %self.loco_id, "no phase listeners");
        }
    }
}
