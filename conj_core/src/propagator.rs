//! The Propagator capability: the boundary between this crate and the
//! TLE parser / SGP4 analytic propagator, both of which are external
//! collaborators and out of scope here.

use crate::error::EngineError;
use crate::types::Vect;

/// Position (km) and velocity (m/s) in the Earth-centred inertial frame at
/// some instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ephemeris {
    /// Cartesian position, km.
    pub eci: Vect,
    /// Velocity, m/s.
    pub v: Vect,
}

/// Anything that can predict where an object is at a given instant.
///
/// Implementations wrap an SGP4 propagator (or, in tests, a synthetic
/// motion model); this crate never performs orbital mechanics itself.
pub trait Propagator: Send + Sync {
    /// Predicts position and velocity at `t` (seconds since the Unix
    /// epoch). Returns [`EngineError::PropagatorDecayed`] if the object has
    /// decayed (re-entered) as of `t`; that variant is silently skipped by
    /// the refiner and the shard task, never logged as a warning.
    fn propagate(&self, t: f64) -> Result<Ephemeris, EngineError>;
}

/// Optional capability converting an ECI position to latitude/longitude/
/// altitude for the report envelope. Coordinate conversion proper is out
/// of scope here; the refiner consumes this purely as an opaque
/// collaborator and carries on with `lla = None` if it isn't configured.
pub trait CoordinateConverter: Send + Sync {
    fn to_lla(&self, t: f64, eci: Vect) -> Option<crate::report::LatLonAlt>;
}
