use std::collections::HashSet;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::alias::LSOF;
use crate::errors::DispatchError;
use crate::model::LocoId;
use crate::model::Sensor;
use crate::model::SensorAddress;
use crate::model::SensorEvent;
use crate::LayoutStore;
use crate::TypeConfig;

#[derive(Debug, Clone)]
struct Awaiter {
    loco: LocoId,
    tx: mpsc::Sender<SensorEvent>,
}

/// Routes sensor transitions from the command station to dispatchers.
///
/// Each sensor has at most one awaiter; any dispatcher may additionally mark
/// sensors it expects to trip meaninglessly (its own departure block
/// boundaries) as ignored. Await delivery is checked before ignore
/// consumption, so one dispatcher's ignore can never swallow another
/// dispatcher's awaited transition.
///
/// The router is also the single write path for [`Sensor`] entities.
pub struct SensorRouter<T>
where T: TypeConfig
{
    layout: Arc<LSOF<T>>,
    awaiters: DashMap<SensorAddress, Awaiter>,
    ignores: DashMap<SensorAddress, HashSet<LocoId>>,
    ghost_events: AtomicU64,
}

impl<T> SensorRouter<T>
where T: TypeConfig
{
    pub fn new(layout: Arc<LSOF<T>>) -> Self {
        Self {
            layout,
            awaiters: DashMap::new(),
            ignores: DashMap::new(),
            ghost_events: AtomicU64::new(0),
        }
    }

    /// Arm a sensor wait. Re-arming by the same locomotive replaces the
    /// previous registration; a different locomotive is rejected.
    pub fn register_await(
        &self,
        address: SensorAddress,
        loco: &LocoId,
        tx: mpsc::Sender<SensorEvent>,
    ) -> Result<(), DispatchError> {
        match self.awaiters.entry(address) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                if &occupied.get().loco != loco {
                    return Err(DispatchError::SensorConflict {
                        sensor: address,
                        holder: occupied.get().loco.clone(),
                    });
                }
                occupied.insert(Awaiter {
                    loco: loco.clone(),
                    tx,
                });
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(Awaiter {
                    loco: loco.clone(),
                    tx,
                });
            }
        }
        trace!(sensor = %address, %loco, "sensor await armed");
        Ok(())
    }

    /// Drop an await if the locomotive still owns it.
    pub fn clear_await(
        &self,
        address: SensorAddress,
        loco: &LocoId,
    ) {
        self.awaiters.remove_if(&address, |_, awaiter| &awaiter.loco == loco);
    }

    /// Mark a sensor as not meaningful for this locomotive right now.
    pub fn register_ignore(
        &self,
        address: SensorAddress,
        loco: &LocoId,
    ) {
        self.ignores.entry(address).or_default().insert(loco.clone());
        trace!(sensor = %address, %loco, "sensor ignore registered");
    }

    pub fn remove_ignore(
        &self,
        address: SensorAddress,
        loco: &LocoId,
    ) {
        if let Some(mut entry) = self.ignores.get_mut(&address) {
            entry.remove(loco);
        }
        self.ignores.remove_if(&address, |_, locos| locos.is_empty());
    }

    /// Drop every await and ignore the locomotive holds. Reset and teardown
    /// path; leaves other dispatchers' registrations untouched.
    pub fn clear_locomotive(
        &self,
        loco: &LocoId,
    ) {
        self.awaiters.retain(|_, awaiter| &awaiter.loco != loco);
        for mut entry in self.ignores.iter_mut() {
            entry.value_mut().remove(loco);
        }
        self.ignores.retain(|_, locos| !locos.is_empty());
    }

    /// Fold one wire transition into the sensor entity and deliver it.
    pub async fn dispatch(
        &self,
        event: SensorEvent,
    ) {
        self.persist(&event);

        // await delivery first -- ignores must not suppress it
        let awaiter = self.awaiters.get(&event.address).map(|entry| entry.value().clone());
        if let Some(awaiter) = awaiter {
            if awaiter.tx.send(event).await.is_err() {
                warn!(
                    sensor = %event.address,
                    loco = %awaiter.loco,
                    "awaiting dispatcher is gone; dropping its registration"
                );
                self.clear_await(event.address, &awaiter.loco);
            }
            return;
        }

        let ignored = self
            .ignores
            .get(&event.address)
            .map(|locos| !locos.is_empty())
            .unwrap_or(false);
        if ignored {
            debug!(sensor = %event.address, active = event.active, "sensor event suppressed by ignore");
            return;
        }

        if event.active {
            self.ghost_events.fetch_add(1, Ordering::Relaxed);
            warn!(
                sensor = %event.address,
                "ghost sensor event: no dispatcher awaits or ignores this contact"
            );
        } else {
            trace!(sensor = %event.address, "unmatched sensor release");
        }
    }

    /// Number of active transitions that matched neither registry.
    pub fn ghost_count(&self) -> u64 {
        self.ghost_events.load(Ordering::Relaxed)
    }

    fn persist(
        &self,
        event: &SensorEvent,
    ) {
        let mut sensor = self
            .layout
            .sensor(event.address)
            .unwrap_or_else(|| Sensor::new(event.address));
        if sensor.apply(event) {
            if let Err(e) = self.layout.save_sensor(&sensor) {
                warn!(sensor = %event.address, error = %e, "failed to persist sensor state");
            }
        }
    }

    #[cfg(test)]
    pub fn awaited_by(
        &self,
        address: SensorAddress,
    ) -> Option<LocoId> {
        self.awaiters.get(&address).map(|entry| entry.value().loco.clone())
    }

    #[cfg(test)]
    pub fn is_ignored_by(
        &self,
        address: SensorAddress,
        loco: &LocoId,
    ) -> bool {
        self.ignores
            .get(&address)
            .map(|locos| locos.contains(loco))
            .unwrap_or(false)
    }
}
