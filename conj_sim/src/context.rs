//! Simulation context implementing `EngineContext` for deterministic testing.

use async_trait::async_trait;
use conj_env::EngineContext;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Simulation context backed by deterministic time and RNG.
///
/// Implements `EngineContext` using a virtual clock that can be advanced
/// manually and a seeded ChaCha8 RNG for deterministic synthetic scenario
/// generation. `spawn` runs on a plain `tokio::spawn` — the simulation is
/// driven by advancing virtual time between ticks, not by controlling task
/// scheduling itself.
pub struct SimContext {
    seed: u64,
    virtual_time_ns: Arc<Mutex<u64>>,
    rng: Arc<Mutex<ChaCha8Rng>>,
    /// Virtual time 0 maps to this wall-clock instant.
    epoch: SystemTime,
}

impl SimContext {
    pub fn new(seed: u64) -> Self {
        SimContext {
            seed,
            virtual_time_ns: Arc::new(Mutex::new(0)),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
            epoch: UNIX_EPOCH + Duration::from_secs(1_704_067_200), // 2024-01-01 UTC
        }
    }

    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    pub fn advance_time(&self, duration: Duration) {
        let mut time = self.virtual_time_ns.lock().unwrap();
        *time += duration.as_nanos() as u64;
    }

    pub fn time_ns(&self) -> u64 {
        *self.virtual_time_ns.lock().unwrap()
    }

    /// Draws a deterministic `f64` in `[0, 1)` from the context's RNG, for
    /// synthetic scenario generation (jitter, sampling).
    pub fn next_f64(&self) -> f64 {
        use rand::Rng;
        self.rng.lock().unwrap().gen()
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        SimContext {
            seed: self.seed,
            virtual_time_ns: Arc::clone(&self.virtual_time_ns),
            rng: Arc::clone(&self.rng),
            epoch: self.epoch,
        }
    }
}

#[async_trait]
impl EngineContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(*self.virtual_time_ns.lock().unwrap())
    }

    fn system_time(&self) -> SystemTime {
        self.epoch + self.now()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance_time(duration);
    }

    fn spawn<F>(&self, name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let _name = name.to_string();
        tokio::spawn(async move {
            future.await;
        });
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_context_time() {
        let ctx = SimContext::new(42);
        assert_eq!(ctx.now(), Duration::ZERO);

        ctx.advance_time(Duration::from_secs(1));
        assert_eq!(ctx.now(), Duration::from_secs(1));

        ctx.advance_time(Duration::from_millis(500));
        assert_eq!(ctx.now(), Duration::from_millis(1500));
    }

    #[test]
    fn test_sim_context_seed() {
        let ctx = SimContext::new(12345);
        assert_eq!(ctx.seed(), 12345);
    }

    #[test]
    fn test_sim_context_clone_shares_time() {
        let ctx1 = SimContext::new(42);
        let ctx2 = ctx1.clone();

        ctx1.advance_time(Duration::from_secs(5));

        assert_eq!(ctx1.now(), ctx2.now());
    }

    #[test]
    fn test_sim_context_rng_is_deterministic_per_seed() {
        let a = SimContext::new(7);
        let b = SimContext::new(7);
        assert_eq!(a.next_f64(), b.next_f64());
    }
}
