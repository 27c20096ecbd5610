//! Spatial Index: a mutable `{cell -> stored points}` map plus a
//! `{key -> current belief}` map, with an `update` operation that returns
//! the proximity pairs that appeared and disappeared for a `Key` relative
//! to its previous state.
//!
//! Not safe for concurrent mutation; the single-writer invariant is
//! enforced externally by the owning shard.

use std::collections::{HashMap, HashSet};

use crate::cell_grid::{CellGrid, CellId};
use crate::error::EngineError;
use crate::types::{CatalogNum, Key, KeyState, Pair, Pos, RecordId, StoredPoint};

/// The set of stored points whose position maps to one cell.
#[derive(Debug, Default, Clone)]
pub struct Cell {
    items: Vec<StoredPoint>,
}

impl Cell {
    fn add(&mut self, p: StoredPoint) {
        self.items.push(p);
    }

    /// Removes the first item matching `record_id` and `pos` exactly, via
    /// linear scan and swap-remove (cells are expected to hold few points;
    /// a hash-keyed removal is a possible future optimization, not
    /// warranted without a benchmark motivating it).
    fn remove(&mut self, record_id: RecordId, pos: Pos) -> bool {
        if let Some(i) = self
            .items
            .iter()
            .position(|it| it.record_id == record_id && it.pos == pos)
        {
            self.items.swap_remove(i);
            true
        } else {
            false
        }
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StoredPoint> {
        self.items.iter()
    }
}

/// Returned by [`SpatialIndex::update`]: the pairs that disappeared and
/// appeared for a `Key`, plus the record id that was current before this
/// call (if any).
pub struct UpdateOutcome {
    pub cancelled: Vec<Pair>,
    pub novel: Vec<Pair>,
    pub previous_record_id: Option<RecordId>,
}

pub struct SpatialIndex {
    cells: HashMap<CellId, Cell>,
    keys: HashMap<Key, KeyState>,
    proximity_threshold: f32,
}

impl SpatialIndex {
    pub fn new(proximity_threshold: f32) -> Self {
        SpatialIndex {
            cells: HashMap::new(),
            keys: HashMap::new(),
            proximity_threshold,
        }
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Average number of stored points per non-empty cell.
    pub fn keys_per_cell(&self) -> f64 {
        if self.cells.is_empty() {
            return 0.0;
        }
        let total: usize = self.cells.values().map(Cell::count).sum();
        total as f64 / self.cells.len() as f64
    }

    /// Proximity scan at the cell containing `probe`: searches `{c} ∪
    /// neighbors(c)` for existing stored points within the configured
    /// threshold, skipping same-nonzero-catalog pairs.
    fn search(&self, grid: &CellGrid, cid: CellId, probe: StoredPoint) -> Vec<Pair> {
        let mut out = Vec::new();
        let mut to_scan = grid.neighbors(cid);
        to_scan.push(cid);

        for cell_id in to_scan {
            let Some(cell) = self.cells.get(&cell_id) else {
                continue;
            };
            for &q in cell.iter() {
                if q.record_id == probe.record_id && q.pos == probe.pos {
                    continue;
                }
                if !probe.catalog.is_unknown() && !q.catalog.is_unknown() && probe.catalog == q.catalog {
                    continue;
                }
                let d = probe.pos.dist(&q.pos);
                if d <= self.proximity_threshold {
                    out.push(Pair::new(probe, q, d));
                }
            }
        }
        out
    }

    /// Updates the belief for `key`, returning the cancelled and novel
    /// proximity pairs relative to its previous state.
    ///
    /// If `grid.find()` fails on any position, the call returns
    /// immediately with that error; the key's state is left inconsistent
    /// and callers must treat it as poisoned (propagator output is
    /// expected to map cleanly, so this is a programmer-error path, not a
    /// steady-state condition).
    pub fn update(
        &mut self,
        grid: &CellGrid,
        record_id: RecordId,
        key: Key,
        positions: &[Pos],
    ) -> Result<UpdateOutcome, EngineError> {
        let previous = self.keys.get(&key).cloned();
        let previous_record_id = previous.as_ref().map(|s| s.record_id);

        let mut old_pairs = Vec::new();
        if let Some(state) = &previous {
            for &pos in &state.positions {
                let cid = grid.find(pos)?;
                let probe = StoredPoint::new(state.record_id, state.catalog, pos);
                if let Some(cell) = self.cells.get_mut(&cid) {
                    cell.remove(probe.record_id, probe.pos);
                    if cell.count() == 0 {
                        self.cells.remove(&cid);
                    }
                }
                old_pairs.extend(self.search(grid, cid, probe));
            }
        }

        let mut new_pairs = Vec::new();
        for &pos in positions {
            let cid = grid.find(pos)?;
            let probe = StoredPoint::new(record_id, key.catalog, pos);
            new_pairs.extend(self.search(grid, cid, probe));
            self.cells.entry(cid).or_default().add(probe);
        }

        self.keys.insert(
            key,
            KeyState {
                record_id,
                catalog: key.catalog,
                positions: positions.to_vec(),
            },
        );

        let old_set: HashSet<Pair> = old_pairs.into_iter().collect();
        let new_set: HashSet<Pair> = new_pairs.into_iter().collect();

        let cancelled = old_set.difference(&new_set).copied().collect();
        let novel = new_set.difference(&old_set).copied().collect();

        Ok(UpdateOutcome {
            cancelled,
            novel,
            previous_record_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Publisher;

    fn key(cat: u32) -> Key {
        Key::new(CatalogNum(cat), Publisher(1))
    }

    #[test]
    fn two_close_objects_emit_one_novel_pair() {
        let grid = CellGrid::new(5);
        let mut idx = SpatialIndex::new(10.0);

        idx.update(&grid, RecordId(1), key(10), &[Pos::new(7000.0, 0.0, 0.0)])
            .unwrap();
        let out = idx
            .update(&grid, RecordId(2), key(20), &[Pos::new(7000.0001, 0.0, 0.0)])
            .unwrap();

        assert_eq!(out.novel.len(), 1);
        assert_eq!(out.cancelled.len(), 0);
    }

    #[test]
    fn same_nonzero_catalog_suppressed() {
        let grid = CellGrid::new(5);
        let mut idx = SpatialIndex::new(10.0);

        idx.update(&grid, RecordId(1), key(5), &[Pos::new(7000.0, 0.0, 0.0)])
            .unwrap();
        let out = idx
            .update(&grid, RecordId(2), key(5), &[Pos::new(7000.0001, 0.0, 0.0)])
            .unwrap();

        assert_eq!(out.novel.len(), 0);
    }

    #[test]
    fn moving_away_cancels_the_pair() {
        let grid = CellGrid::new(5);
        let mut idx = SpatialIndex::new(10.0);

        idx.update(&grid, RecordId(1), key(10), &[Pos::new(7000.0, 0.0, 0.0)])
            .unwrap();
        idx.update(&grid, RecordId(2), key(20), &[Pos::new(7000.0001, 0.0, 0.0)])
            .unwrap();

        let out = idx
            .update(&grid, RecordId(2), key(20), &[Pos::new(7000.0, 2000.0, 0.0)])
            .unwrap();

        assert_eq!(out.cancelled.len(), 1);
        assert_eq!(out.novel.len(), 0);
    }

    #[test]
    fn repeated_update_same_position_is_a_diff_noop() {
        let grid = CellGrid::new(5);
        let mut idx = SpatialIndex::new(10.0);

        idx.update(&grid, RecordId(1), key(10), &[Pos::new(7000.0, 0.0, 0.0)])
            .unwrap();
        idx.update(&grid, RecordId(2), key(20), &[Pos::new(7000.0001, 0.0, 0.0)])
            .unwrap();

        let first = idx
            .update(&grid, RecordId(2), key(20), &[Pos::new(7000.0002, 0.0, 0.0)])
            .unwrap();
        let second = idx
            .update(&grid, RecordId(2), key(20), &[Pos::new(7000.0002, 0.0, 0.0)])
            .unwrap();

        assert_eq!(first.cancelled.len(), second.cancelled.len());
        assert_eq!(first.novel.len(), second.novel.len());
    }

    #[test]
    fn cell_emptied_after_last_point_removed() {
        let grid = CellGrid::new(5);
        let mut idx = SpatialIndex::new(10.0);
        idx.update(&grid, RecordId(1), key(10), &[Pos::new(7000.0, 0.0, 0.0)])
            .unwrap();
        assert_eq!(idx.cell_count(), 1);

        idx.update(&grid, RecordId(1), key(10), &[Pos::new(-7000.0, 0.0, 0.0)])
            .unwrap();
        assert_eq!(idx.cell_count(), 1);
    }
}
