//! Cell Grid: a fixed-resolution spherical partition.
//!
//! Maps a 3D Cartesian point to the cell that covers it, and produces a
//! cell's one-ring neighbourhood. The engine only ever searches
//! `{c} ∪ neighbors(c)`, so `level` must be picked so a cell's edge length
//! exceeds the index proximity threshold — otherwise a conjunction can
//! straddle a two-cell gap and be missed. This is a configuration-time
//! precondition, not something the grid itself can enforce.

use h3o::{CellIndex, LatLng, Resolution};

use crate::error::EngineError;
use crate::types::Pos;

/// Opaque identifier of a cell in the spherical partition at a chosen level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(pub u64);

impl From<CellIndex> for CellId {
    fn from(c: CellIndex) -> Self {
        CellId(c.into())
    }
}

/// Approximate edge length in meters for each H3 resolution, used to size
/// the one-ring neighbour search when converting a distance threshold into
/// a cell level at configuration time. Source: h3geo.org/docs/core-library/restable.
const H3_EDGE_LENGTH_M: [f64; 16] = [
    1_107_712.591,
    418_676.005,
    158_244.655,
    59_810.857,
    22_606.379,
    8_544.408,
    3_229.482,
    1_220.629,
    461.354,
    174.375,
    65.907,
    24.910,
    9.415,
    3.559,
    1.348,
    0.509,
];

/// Edge length in meters for a given resolution, for documentation /
/// configuration-validation purposes.
pub fn edge_length_meters(resolution: Resolution) -> f64 {
    H3_EDGE_LENGTH_M[u8::from(resolution) as usize]
}

/// A fixed-resolution covering of the unit sphere.
///
/// `find` treats a `Pos` as a direction from the Earth's center (the engine
/// operates on ECI positions, so this is an approximation good enough for
/// cell assignment, not for precision geodesy — geodetic conversion proper
/// is an external collaborator, out of scope here).
pub struct CellGrid {
    resolution: Resolution,
}

impl CellGrid {
    pub fn new(level: u8) -> Self {
        let resolution = Resolution::try_from(level).unwrap_or(Resolution::Five);
        CellGrid { resolution }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Deterministic mapping from a 3D point to its covering cell.
    ///
    /// The point is projected onto the unit sphere (as a direction from
    /// the origin) and converted to latitude/longitude before cell lookup.
    /// Fails with `PointUnmappable` if the point cannot be normalized (it
    /// lies at the origin) or if H3 rejects the resulting coordinates.
    pub fn find(&self, pos: Pos) -> Result<CellId, EngineError> {
        let norm = ((pos.x as f64).powi(2) + (pos.y as f64).powi(2) + (pos.z as f64).powi(2)).sqrt();
        if !norm.is_finite() || norm == 0.0 {
            return Err(EngineError::PointUnmappable(pos));
        }

        let (x, y, z) = (pos.x as f64 / norm, pos.y as f64 / norm, pos.z as f64 / norm);
        let lat = z.clamp(-1.0, 1.0).asin().to_degrees();
        let lon = y.atan2(x).to_degrees();

        let ll = LatLng::new(lat, lon).map_err(|_| EngineError::PointUnmappable(pos))?;
        Ok(CellId::from(ll.to_cell(self.resolution)))
    }

    /// All immediate neighbours of `c` at the same level, not including `c`
    /// itself. On the hexagonal H3 grid this is six cells almost
    /// everywhere, five at the twelve icosahedral pentagons.
    pub fn neighbors(&self, c: CellId) -> Vec<CellId> {
        let Ok(idx) = CellIndex::try_from(c.0) else {
            return Vec::new();
        };
        idx.grid_disk_safe(1)
            .filter(|n| *n != idx)
            .map(CellId::from)
            .collect()
    }
}
