//! Environment abstraction layer for the conjunction engine.
//!
//! This crate provides the "sans-IO" abstraction allowing the engine to run
//! identically against a production async runtime and a deterministic
//! virtual clock.
//!
//! # Core concept
//!
//! For deterministic simulation, the engine's only sources of
//! non-determinism — time and task spawning — are routed through a single
//! [`EngineContext`] trait. A production deployment implements it over
//! `tokio`; a test harness implements it over a manually-advanced virtual
//! clock, so a failure found against a given seed is reproducible.
//!
//! # Example
//!
//! ```ignore
//! use conj_env::EngineContext;
//!
//! async fn tick_loop<Ctx: EngineContext>(ctx: &Ctx, resolution: std::time::Duration) {
//!     loop {
//!         ctx.sleep(resolution).await;
//!         // advance the engine's clock
//!     }
//! }
//! ```

mod context;
mod error;
mod tokio_impl;

pub use context::EngineContext;
pub use error::EnvError;
pub use tokio_impl::TokioContext;
