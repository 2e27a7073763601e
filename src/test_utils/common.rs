use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tokio::time::timeout;

use crate::Phase;
use crate::PhaseChange;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
}

/// Follow a dispatcher's phase feed until the wanted phase shows up.
pub async fn wait_for_phase(
    rx: &mut watch::Receiver<PhaseChange>,
    phase: Phase,
) -> PhaseChange {
    timeout(Duration::from_secs(5), async {
        loop {
            let current = rx.borrow_and_update().clone();
            if current.phase == phase {
                return current;
            }
            rx.changed().await.expect("phase feed open");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for phase {phase}"))
}

/// Poll until the predicate holds.
pub async fn wait_until(
    what: &str,
    predicate: impl Fn() -> bool,
) {
    let outcome = timeout(Duration::from_secs(5), async {
        while !predicate() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(outcome.is_ok(), "timed out waiting until {what}");
}
