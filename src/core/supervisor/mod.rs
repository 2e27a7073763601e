//! Engine-wide supervision of the dispatcher fleet.
//!
//! ## Key Responsibilities
//! - Owns the dispatcher lifecycle (start, cooperative stop, reset, shutdown)
//! - Pumps sensor feedback from the command station into the [`SensorRouter`]
//! - Holds the reservation gate every dispatcher must acquire before deciding
//!   on track availability
//! - Publishes each dispatcher's phase as the engine's observation surface
//!
//! ## Example Usage
//! ```rust,ignore
//! let pilot = AutopilotBuilder::new(None).build().ready()?;
//! pilot.start(&loco_id).await?;
//! ```

mod builder;

#[doc(hidden)]
pub use builder::*;


use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use tokio::select;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::ControlEvent;
use super::Dispatcher;
use super::PhaseChange;
use super::SensorRouter;
use crate::alias::CSOF;
use crate::alias::LSOF;
use crate::alias::RCOF;
use crate::alias::TVOF;
use crate::config::AutopilotConfig;
use crate::errors::DispatchError;
use crate::errors::StationError;
use crate::model::LocoId;
use crate::CommandStation;
use crate::LayoutStore;
use crate::Result;
use crate::TypeConfig;

/// Control traffic is rare; the queue only absorbs bursts of operator
/// requests.
const CTRL_QUEUE_DEPTH: usize = 8;

/// Bookkeeping for one spawned dispatcher: control channel in, phase watch
/// out, task handle for joining.
struct DispatcherHandle {
    ctrl_tx: mpsc::Sender<ControlEvent>,
    phase_rx: watch::Receiver<PhaseChange>,
    task: JoinHandle<()>,
}

pub struct Autopilot<T>
where T: TypeConfig
{
    layout: Arc<LSOF<T>>,
    station: Arc<CSOF<T>>,
    view: Arc<TVOF<T>>,
    chooser: Arc<RCOF<T>>,
    router: Arc<SensorRouter<T>>,
    /// Every availability decision across all dispatchers happens while
    /// holding one of these permits
    gate: Arc<Semaphore>,
    config: AutopilotConfig,
    dispatchers: DashMap<LocoId, DispatcherHandle>,
    shutdown: CancellationToken,
}

impl<T> Autopilot<T>
where T: TypeConfig
{
    pub fn new(
        layout: Arc<LSOF<T>>,
        station: Arc<CSOF<T>>,
        view: Arc<TVOF<T>>,
        chooser: Arc<RCOF<T>>,
        config: AutopilotConfig,
    ) -> Self {
        let router = Arc::new(SensorRouter::new(layout.clone()));
        let gate = Arc::new(Semaphore::new(config.reservation.permits));

        Self {
            layout,
            station,
            view,
            chooser,
            router,
            gate,
            config,
            dispatchers: DashMap::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Pump sensor feedback from the command station into the router until
    /// shutdown. Run this on its own task; dispatchers starve without it.
    pub async fn run(&self) -> Result<()> {
        let mut feed = self.station.subscribe_sensors();
        info!("sensor feed pump running");

        loop {
            select! {
                // Use biased to ensure branch order
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("sensor feed pump stopped");
                    return Ok(());
                }
                received = feed.recv() => match received {
                    Ok(event) => self.router.dispatch(event).await,
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "sensor feed lagged; transitions were dropped");
                    }
                    Err(RecvError::Closed) => {
                        error!("sensor feed ended; no further events will arrive");
                        return Err(StationError::FeedClosed.into());
                    }
                }
            }
        }
    }

    /// Spawn a dispatcher for the locomotive and turn its automode on.
    ///
    /// A second start while the dispatcher task is alive changes nothing; a
    /// start after the task parked spawns a fresh one.
    ///
    /// # Errors
    /// Fatal for this locomotive only: the command station is disconnected,
    /// the locomotive is unknown, or it is not placed in any block. No task
    /// is spawned and other dispatchers keep running.
    pub async fn start(
        &self,
        loco_id: &LocoId,
    ) -> Result<()> {
        if let Some(handle) = self.dispatchers.get(loco_id) {
            if !handle.task.is_finished() {
                debug!(loco = %loco_id, "dispatcher already active; start ignored");
                return Ok(());
            }
        }

        if !self.station.is_connected() {
            error!(loco = %loco_id, "command station not connected; dispatcher never starts");
            return Err(StationError::NotConnected.into());
        }
        self.layout.locomotive(loco_id)?;
        if self.layout.block_of_locomotive(loco_id).is_none() {
            error!(loco = %loco_id, "locomotive is not placed in any block; dispatcher never starts");
            return Err(DispatchError::NotPlaced(loco_id.clone()).into());
        }

        let (ctrl_tx, ctrl_rx) = mpsc::channel(CTRL_QUEUE_DEPTH);
        let (phase_tx, phase_rx) = watch::channel(PhaseChange::idle(loco_id.clone()));
        let mut dispatcher = Dispatcher::<T>::new(
            loco_id.clone(),
            self.layout.clone(),
            self.station.clone(),
            self.view.clone(),
            self.chooser.clone(),
            self.router.clone(),
            self.gate.clone(),
            self.config.clone(),
            self.shutdown.clone(),
            ctrl_rx,
            phase_tx,
        );

        let loco = loco_id.clone();
        let task = tokio::spawn(async move {
            match dispatcher.run().await {
                Ok(_) => info!(loco = %loco, "dispatcher exited"),
                Err(e) => error!(loco = %loco, error = %e, "dispatcher exited with error"),
            }
        });

        self.dispatchers.insert(
            loco_id.clone(),
            DispatcherHandle {
                ctrl_tx,
                phase_rx,
                task,
            },
        );
        info!(loco = %loco_id, "dispatcher started");
        Ok(())
    }

    /// Ask one dispatcher to finish its cycle and park. Cooperative: the
    /// request latches at the next loop pass and the train only stops at a
    /// rest point, never between blocks.
    pub async fn stop(
        &self,
        loco_id: &LocoId,
    ) -> Result<()> {
        self.send_control(loco_id, ControlEvent::AutomodeOff).await
    }

    /// Abort one dispatcher's run: stop the train where it stands, roll the
    /// reservation back and park. Wins over the current phase's normal exit.
    pub async fn reset(
        &self,
        loco_id: &LocoId,
    ) -> Result<()> {
        self.send_control(loco_id, ControlEvent::Reset).await
    }

    /// [`Self::stop`] for every dispatcher. Best effort; already-parked
    /// dispatchers are skipped.
    pub async fn stop_all(&self) {
        self.broadcast_control(ControlEvent::AutomodeOff).await;
    }

    /// [`Self::reset`] for every dispatcher. Best effort.
    pub async fn reset_all(&self) {
        self.broadcast_control(ControlEvent::Reset).await;
    }

    /// Cancel the engine token. Dispatcher loops observe it with top
    /// priority and exit once their in-flight action completes; rolling
    /// trains get a stop command on the way out.
    pub fn shutdown(&self) {
        info!("engine shutdown requested");
        self.shutdown.cancel();
    }

    /// Wait for every dispatcher task to exit and drop its handle. Call
    /// after [`Self::shutdown`] or once every dispatcher was stopped;
    /// joining a dispatcher that was never asked to park waits forever.
    pub async fn join_all(&self) {
        let locos: Vec<LocoId> = self.dispatchers.iter().map(|entry| entry.key().clone()).collect();

        let mut tasks = Vec::new();
        for loco in locos {
            if let Some((loco, handle)) = self.dispatchers.remove(&loco) {
                tasks.push(async move {
                    if let Err(e) = handle.task.await {
                        error!(loco = %loco, error = %e, "dispatcher task failed to join");
                    }
                });
            }
        }
        join_all(tasks).await;
        info!("all dispatchers joined");
    }

    /// Phase snapshot of every dispatcher, ordered by locomotive id.
    ///
    /// This is the engine's only failure surface: a dispatcher that cannot
    /// make progress shows up as a phase that stops changing, not as a
    /// separate error channel.
    pub fn status(&self) -> Vec<PhaseChange> {
        let mut phases: Vec<PhaseChange> = self
            .dispatchers
            .iter()
            .map(|entry| entry.value().phase_rx.borrow().clone())
            .collect();
        phases.sort_by(|a, b| a.loco.cmp(&b.loco));
        phases
    }

    /// Subscribe to one dispatcher's phase feed.
    pub fn watch(
        &self,
        loco_id: &LocoId,
    ) -> Option<watch::Receiver<PhaseChange>> {
        self.dispatchers.get(loco_id).map(|handle| handle.phase_rx.clone())
    }

    /// True while the locomotive's dispatcher task is alive. Parked
    /// dispatchers have exited and report false.
    pub fn is_running(
        &self,
        loco_id: &LocoId,
    ) -> bool {
        self.dispatchers
            .get(loco_id)
            .map(|handle| !handle.task.is_finished())
            .unwrap_or(false)
    }

    async fn send_control(
        &self,
        loco_id: &LocoId,
        ctrl: ControlEvent,
    ) -> Result<()> {
        let Some(ctrl_tx) = self.dispatchers.get(loco_id).map(|handle| handle.ctrl_tx.clone()) else {
            debug!(loco = %loco_id, ?ctrl, "no dispatcher for control request");
            return Ok(());
        };

        ctrl_tx
            .send(ctrl)
            .await
            .map_err(|_| DispatchError::ControlChannelClosed)?;
        Ok(())
    }

    async fn broadcast_control(
        &self,
        ctrl: ControlEvent,
    ) {
        let targets: Vec<(LocoId, mpsc::Sender<ControlEvent>)> = self
            .dispatchers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().ctrl_tx.clone()))
            .collect();

        for (loco, ctrl_tx) in targets {
            if ctrl_tx.send(ctrl).await.is_err() {
                debug!(loco = %loco, ?ctrl, "dispatcher already gone");
            }
        }
    }
}
