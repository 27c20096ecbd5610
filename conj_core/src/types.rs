//! Core data model: the identity and geometry types shared by the cell grid,
//! the spatial index, and the intern tables.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A compact integer handle for an externally assigned object id.
///
/// `0` is reserved to mean "unknown" — two `StoredPoint`s both carrying
/// `CatalogNum(0)` are never considered the same real object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CatalogNum(pub u32);

impl CatalogNum {
    pub const UNKNOWN: CatalogNum = CatalogNum(0);

    pub fn is_unknown(&self) -> bool {
        self.0 == 0
    }
}

/// A compact integer handle for the originator of a TLE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Publisher(pub u32);

/// Identifies a (object, source) opinion slot in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    pub catalog: CatalogNum,
    pub publisher: Publisher,
}

impl Key {
    pub fn new(catalog: CatalogNum, publisher: Publisher) -> Self {
        Key { catalog, publisher }
    }
}

/// Opaque identity of a specific stored TLE record, unique among currently
/// live records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub u32);

/// A 3D Cartesian position in km, single precision (ECI frame).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pos {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Pos {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Pos { x, y, z }
    }

    /// Euclidean distance between two positions, in km.
    pub fn dist(&self, other: &Pos) -> f32 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        let dz = (self.z - other.z) as f64;
        (dx * dx + dy * dy + dz * dz).sqrt() as f32
    }
}

/// A 3-vector used for velocity (m/s) and other non-positional quantities
/// that share `Pos`'s Euclidean-distance semantics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vect {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vect {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Vect { x, y, z }
    }

    pub fn dist(&self, other: &Vect) -> f32 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        let dz = (self.z - other.z) as f64;
        (dx * dx + dy * dy + dz * dz).sqrt() as f32
    }
}

/// What lives inside a cell: a stored record's identity, owning catalog
/// number, and position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoredPoint {
    pub record_id: RecordId,
    pub catalog: CatalogNum,
    pub pos: Pos,
}

impl StoredPoint {
    pub fn new(record_id: RecordId, catalog: CatalogNum, pos: Pos) -> Self {
        StoredPoint { record_id, catalog, pos }
    }
}

/// The index's current belief for a `Key`: a record identity, its catalog
/// number, and the (possibly multi-valued) list of positions it occupies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyState {
    pub record_id: RecordId,
    pub catalog: CatalogNum,
    pub positions: Vec<Pos>,
}

/// Lexicographic "less than" on `(RecordId, x, y, z)`, used to canonically
/// order the two endpoints of a `Pair`.
///
/// The comparator intentionally runs the same four-field comparison chain
/// twice in sequence; the second pass is unreachable once the first has
/// resolved one way or the other, matching the reference implementation's
/// comparator exactly rather than simplifying it away.
fn at_less(a: &StoredPoint, b: &StoredPoint) -> bool {
    match a.record_id.cmp(&b.record_id) {
        Ordering::Less => return true,
        Ordering::Greater => return false,
        Ordering::Equal => {}
    }
    match a.pos.x.partial_cmp(&b.pos.x) {
        Some(Ordering::Less) => return true,
        Some(Ordering::Greater) => return false,
        _ => {}
    }
    match a.pos.y.partial_cmp(&b.pos.y) {
        Some(Ordering::Less) => return true,
        Some(Ordering::Greater) => return false,
        _ => {}
    }
    match a.pos.z.partial_cmp(&b.pos.z) {
        Some(Ordering::Less) => return true,
        Some(Ordering::Greater) => return false,
        _ => {}
    }

    // Dead duplicate of the chain above, preserved from the reference
    // implementation. Unreachable: by this point a and b compare equal on
    // all four fields, so every branch below falls through to `false`.
    match a.record_id.cmp(&b.record_id) {
        Ordering::Less => return true,
        Ordering::Greater => return false,
        Ordering::Equal => {}
    }
    match a.pos.x.partial_cmp(&b.pos.x) {
        Some(Ordering::Less) => return true,
        Some(Ordering::Greater) => return false,
        _ => {}
    }
    match a.pos.y.partial_cmp(&b.pos.y) {
        Some(Ordering::Less) => return true,
        Some(Ordering::Greater) => return false,
        _ => {}
    }
    match a.pos.z.partial_cmp(&b.pos.z) {
        Some(Ordering::Less) => return true,
        Some(Ordering::Greater) => return false,
        _ => {}
    }

    false
}

/// An ordered pair of `StoredPoint`s with a scalar distance. Canonically
/// ordered so `(a, b)` and `(b, a)` compare and hash identically.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pair {
    pub a: StoredPoint,
    pub b: StoredPoint,
    pub dist: f32,
}

impl Pair {
    /// Builds a pair, canonically ordering its two endpoints.
    pub fn new(p: StoredPoint, q: StoredPoint, dist: f32) -> Self {
        if at_less(&q, &p) {
            Pair { a: q, b: p, dist }
        } else {
            Pair { a: p, b: q, dist }
        }
    }
}

impl PartialEq for Pair {
    fn eq(&self, other: &Self) -> bool {
        self.a.record_id == other.a.record_id
            && self.a.pos == other.a.pos
            && self.b.record_id == other.b.record_id
            && self.b.pos == other.b.pos
            && self.dist == other.dist
    }
}
impl Eq for Pair {}

impl std::hash::Hash for Pair {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.a.record_id.hash(state);
        self.a.pos.x.to_bits().hash(state);
        self.a.pos.y.to_bits().hash(state);
        self.a.pos.z.to_bits().hash(state);
        self.b.record_id.hash(state);
        self.b.pos.x.to_bits().hash(state);
        self.b.pos.y.to_bits().hash(state);
        self.b.pos.z.to_bits().hash(state);
        self.dist.to_bits().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sp(id: u32, cat: u32, x: f32) -> StoredPoint {
        StoredPoint::new(RecordId(id), CatalogNum(cat), Pos::new(x, 0.0, 0.0))
    }

    #[test]
    fn pair_ordering_is_symmetric() {
        let p = sp(1, 10, 0.0);
        let q = sp(2, 20, 1.0);
        assert_eq!(Pair::new(p, q, 1.0), Pair::new(q, p, 1.0));
    }

    #[test]
    fn pair_equality_requires_identical_endpoints_and_distance() {
        let p = sp(1, 10, 0.0);
        let q = sp(2, 20, 1.0);
        let r = sp(3, 30, 2.0);
        assert_ne!(Pair::new(p, q, 1.0), Pair::new(p, r, 1.0));
    }

    #[test]
    fn catalog_zero_is_unknown() {
        assert!(CatalogNum::UNKNOWN.is_unknown());
        assert!(!CatalogNum(5).is_unknown());
    }
}
