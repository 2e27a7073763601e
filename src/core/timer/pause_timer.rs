use rand::Rng;
use tokio::time::Duration;
use tokio::time::Instant;

/// Rest-delay timer for the Wait phase. Every reset draws a fresh uniform
/// delay from the configured window, so parked trains do not move in
/// lockstep.
#[derive(Clone, Debug)]
pub struct PauseTimer {
    pub next_deadline: Instant,
    pub pause_range: (u64, u64),
}

impl PauseTimer {
    /// @param: pause_range: (WAIT_MIN_MS, WAIT_MAX_MS)
    ///
    pub fn new(pause_range: (u64, u64)) -> Self {
        let (min, max) = pause_range;
        Self {
            next_deadline: Instant::now() + Self::random_duration(min, max),
            pause_range,
        }
    }

    pub fn reset(&mut self) {
        let (min, max) = self.pause_range;
        self.next_deadline = Instant::now() + Self::random_duration(min, max);
    }

    /// Collapse the remaining delay; the next expiry check fires right away.
    pub fn expire_now(&mut self) {
        self.next_deadline = Instant::now();
    }

    pub fn random_duration(
        min: u64,
        max: u64,
    ) -> Duration {
        let mut rng = rand::thread_rng();
        let pause = rng.gen_range(min..=max);
        Duration::from_millis(pause)
    }

    pub fn remaining(&self) -> Duration {
        if self.is_expired() {
            Duration::from_millis(0)
        } else {
            self.next_deadline.saturating_duration_since(Instant::now())
        }
    }

    pub fn next_deadline(&self) -> Instant {
        self.next_deadline
    }

    pub fn is_expired(&self) -> bool {
        self.next_deadline <= Instant::now()
    }
}
