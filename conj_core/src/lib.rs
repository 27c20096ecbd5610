//! conj_core - streaming spatial conjunction engine for satellite proximity
//! alerting.
//!
//! TLEs arrive in batches and are interned; a rolling window of per-tick
//! Tick Index Shards each maintain a single-writer spatial index keyed by a
//! fixed-resolution cell grid; each shard diffs its proximity pairs against
//! its own previous state and hands the result to a Refiner, which
//! re-samples the closest approach, thresholds and throttles it, and builds
//! a content-addressed Report.

pub mod cell_grid;
pub mod config;
pub mod engine;
pub mod error;
pub mod intern;
pub mod propagator;
pub mod refiner;
pub mod report;
pub mod shard;
pub mod spatial_index;
pub mod tle;
pub mod types;

pub use cell_grid::{CellGrid, CellId};
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, Warning};
pub use intern::{IndexInput, InternedRecord, Interns};
pub use propagator::{CoordinateConverter, Ephemeris, Propagator};
pub use refiner::Refiner;
pub use report::{LatLonAlt, Metrics, ObjectState, Report};
pub use shard::{Shard, ShardTask};
pub use spatial_index::{SpatialIndex, UpdateOutcome};
pub use tle::TleRecord;
pub use types::{CatalogNum, Key, KeyState, Pair, Pos, Publisher, RecordId, StoredPoint, Vect};
