//! Core environment context trait for the conjunction engine.

use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, SystemTime};

/// The central interface for environment interaction.
///
/// This trait abstracts the "real world" so the engine can run identically
/// against a production async runtime or a deterministic virtual clock.
///
/// # Implementations
///
/// - **Production**: `TokioContext` — wraps `tokio::time`, `tokio::spawn`.
/// - **Simulation**: `SimContext` (in the simulation crate) — wraps a
///   manually-advanced virtual clock and a seeded RNG.
///
/// # Determinism
///
/// For deterministic simulation, every method that would normally
/// introduce non-determinism (time, randomness) is controlled by the
/// implementation rather than by ambient OS state.
#[async_trait]
pub trait EngineContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// Used for internal timers and duration measurements. In simulation,
    /// this is the virtual clock time.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time for logical-time bookkeeping and report
    /// generation timestamps. In simulation, this is derived from the
    /// virtual clock plus an epoch offset.
    fn system_time(&self) -> SystemTime;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`.
    /// In simulation: advances the virtual clock.
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task.
    ///
    /// In production: `tokio::spawn`.
    /// In simulation: runs on the same deterministic executor the harness
    /// drives.
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded). In simulation, returns the
    /// master seed.
    fn seed(&self) -> u64;
}
