//! Intern Tables: the record intern (stable identity per distinct TLE
//! instance), the string intern (catalog-number / publisher strings to
//! compact handles), and the key-to-record tracker that reclaims stale
//! records. All three live behind one readers-writer lock — writers are
//! ingest and retirement, readers are refinement lookups, and nothing here
//! ever takes a nested lock.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use std::sync::RwLock;

use crate::error::EngineError;
use crate::propagator::Propagator;
use crate::tle::TleRecord;
use crate::types::{CatalogNum, Key, Publisher, RecordId};

/// One ingested record's identity plus a handle to propagate it, as handed
/// to a Tick Index Shard and retained in the live table for replay into
/// freshly created shards.
#[derive(Clone)]
pub struct IndexInput {
    pub record_id: RecordId,
    pub key: Key,
    pub propagator: Arc<dyn Propagator>,
}

/// Draws a random `u32` and linearly probes up to `probe_window` slots for
/// one not already present in `taken`, tolerating a nearly-full namespace
/// without hot-spotting on a single counter.
fn gen_id<V>(taken: &HashMap<u32, V>, probe_window: u32) -> Result<u32, EngineError> {
    let base: u32 = rand::thread_rng().gen();
    for i in 0..probe_window {
        let candidate = base.wrapping_add(i);
        if !taken.contains_key(&candidate) {
            return Ok(candidate);
        }
    }
    Err(EngineError::IdSpaceExhausted { attempts: probe_window })
}

/// A bidirectional `key-string <-> id` map, generic over the value stored
/// alongside each id.
struct Intern<V> {
    probe_window: u32,
    forward: HashMap<String, u32>,
    inverse: HashMap<u32, V>,
}

impl<V> Intern<V> {
    fn new(probe_window: u32) -> Self {
        Intern {
            probe_window,
            forward: HashMap::new(),
            inverse: HashMap::new(),
        }
    }

    fn intern(&mut self, key: String, make_value: impl FnOnce(u32) -> V) -> Result<(u32, bool), EngineError> {
        if let Some(&id) = self.forward.get(&key) {
            return Ok((id, true));
        }
        let id = gen_id(&self.inverse, self.probe_window)?;
        self.inverse.insert(id, make_value(id));
        self.forward.insert(key, id);
        Ok((id, false))
    }

    fn find(&self, id: u32) -> Option<&V> {
        self.inverse.get(&id)
    }

    fn remove(&mut self, id: u32) -> bool {
        if self.inverse.remove(&id).is_some() {
            self.forward.retain(|_, v| *v != id);
            true
        } else {
            false
        }
    }

    fn count(&self) -> usize {
        self.inverse.len()
    }
}

/// Result of interning a TLE record.
pub struct InternedRecord {
    pub record_id: RecordId,
    pub already_existed: bool,
}

struct InternState {
    /// `RecordId <-> TleRecord`, keyed by `publisher/line0/line1/line2`.
    /// Narrower probe window: records are expected to churn quickly and the
    /// live-record namespace stays far from full.
    records: Intern<TleRecord>,
    /// Compact handles for catalog-number and publisher strings, sharing
    /// one id space (mirrors how the reference engine interns both through
    /// a single string table).
    strings: Intern<String>,
    /// The latest interned record id for each Key.
    key_to_record: HashMap<Key, RecordId>,
    /// Current belief per Key, kept so a freshly created shard can be
    /// seeded with a replay of every live record.
    live: HashMap<Key, IndexInput>,
}

/// The engine's owned intern state, behind a single readers-writer lock.
pub struct Interns {
    inner: RwLock<InternState>,
}

impl Interns {
    pub fn new() -> Self {
        Interns {
            inner: RwLock::new(InternState {
                records: Intern::new(32),
                strings: Intern::new(128),
                key_to_record: HashMap::new(),
                live: HashMap::new(),
            }),
        }
    }

    /// Interns a TLE record under its composite key. If it already exists,
    /// returns the existing id with `already_existed = true` and performs
    /// no mutation (idempotent re-ingest).
    pub fn intern_record(&self, rec: TleRecord) -> Result<InternedRecord, EngineError> {
        let mut state = self.inner.write().unwrap();
        let key = rec.intern_key();
        let (id, already_existed) = state.records.intern(key, move |_| rec)?;
        Ok(InternedRecord {
            record_id: RecordId(id),
            already_existed,
        })
    }

    /// Ingests a batch of TLE records: interns each one, dropping any that
    /// already existed, and stores the rest in the live table under their
    /// compact `Key`. Returns one `IndexInput` per newly interned record,
    /// in the order given.
    pub fn ingest(&self, records: Vec<TleRecord>) -> Result<Vec<IndexInput>, EngineError> {
        let mut state = self.inner.write().unwrap();
        let mut inputs = Vec::with_capacity(records.len());

        for rec in records {
            let record_key = rec.intern_key();
            let propagator = rec.propagator.clone();
            let catalog_string = rec.catalog_string();
            let publisher_string = rec.publisher.clone();

            let (record_id, already_existed) = state.records.intern(record_key, move |_| rec)?;
            if already_existed {
                continue;
            }

            let catalog = match catalog_string {
                Some(s) => {
                    let (id, _) = state.strings.intern(s.clone(), move |_| s)?;
                    CatalogNum(id)
                }
                None => CatalogNum::UNKNOWN,
            };
            let (publisher_id, _) = state.strings.intern(publisher_string.clone(), move |_| publisher_string)?;

            let input = IndexInput {
                record_id: RecordId(record_id),
                key: Key::new(catalog, Publisher(publisher_id)),
                propagator,
            };
            state.live.insert(input.key, input.clone());
            inputs.push(input);
        }

        Ok(inputs)
    }

    /// A snapshot of every currently live `IndexInput`, for replaying into a
    /// freshly created shard.
    pub fn live_snapshot(&self) -> Vec<IndexInput> {
        let state = self.inner.read().unwrap();
        state.live.values().cloned().collect()
    }

    pub fn live_count(&self) -> usize {
        self.inner.read().unwrap().live.len()
    }

    /// Interns a catalog-number or publisher string, returning a compact
    /// handle and whether it already existed.
    pub fn intern_string(&self, s: &str) -> Result<(u32, bool), EngineError> {
        let mut state = self.inner.write().unwrap();
        state.strings.intern(s.to_string(), |_| s.to_string())
    }

    pub fn find_record(&self, id: RecordId) -> Option<TleRecord> {
        let state = self.inner.read().unwrap();
        state.records.find(id.0).cloned()
    }

    pub fn find_string(&self, id: u32) -> Option<String> {
        let state = self.inner.read().unwrap();
        state.strings.find(id).cloned()
    }

    pub fn catalog_string(&self, catalog: CatalogNum) -> Option<String> {
        if catalog.is_unknown() {
            return None;
        }
        self.find_string(catalog.0)
    }

    pub fn publisher_string(&self, publisher: Publisher) -> Option<String> {
        self.find_string(publisher.0)
    }

    /// Records `record_id` as the current belief for `key`, retiring
    /// whatever record previously held that slot (the only mechanism by
    /// which stale TLE records are reclaimed).
    pub fn update_key_tracker(&self, key: Key, record_id: RecordId) {
        let mut state = self.inner.write().unwrap();
        let old = state.key_to_record.insert(key, record_id);
        if let Some(old_id) = old {
            if old_id != record_id {
                state.records.remove(old_id.0);
            }
        }
    }

    pub fn record_count(&self) -> usize {
        self.inner.read().unwrap().records.count()
    }

    pub fn string_count(&self) -> usize {
        self.inner.read().unwrap().strings.count()
    }
}

impl Default for Interns {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::propagator::{Ephemeris, Propagator};
    use std::sync::Arc;

    struct Stub;
    impl Propagator for Stub {
        fn propagate(&self, _t: f64) -> Result<Ephemeris, EngineError> {
            unimplemented!()
        }
    }

    fn rec(line1: &str) -> TleRecord {
        TleRecord::new("pub-a", "0 NAME", line1, "2 ...", "payload", None, Arc::new(Stub))
    }

    #[test]
    fn reinterning_same_record_is_a_noop() {
        let interns = Interns::new();
        let a = interns.intern_record(rec("1 X")).unwrap();
        assert!(!a.already_existed);
        let b = interns.intern_record(rec("1 X")).unwrap();
        assert!(b.already_existed);
        assert_eq!(a.record_id.0, b.record_id.0);
    }

    #[test]
    fn key_tracker_reclaims_stale_record() {
        let interns = Interns::new();
        let key = Key::new(CatalogNum(1), Publisher(1));

        let first = interns.intern_record(rec("1 X")).unwrap();
        interns.update_key_tracker(key, first.record_id);
        assert!(interns.find_record(first.record_id).is_some());

        let second = interns.intern_record(rec("1 Y")).unwrap();
        interns.update_key_tracker(key, second.record_id);

        assert!(interns.find_record(first.record_id).is_none());
        assert!(interns.find_record(second.record_id).is_some());
    }

    #[test]
    fn string_intern_returns_existing_handle() {
        let interns = Interns::new();
        let (id1, existed1) = interns.intern_string("25544").unwrap();
        assert!(!existed1);
        let (id2, existed2) = interns.intern_string("25544").unwrap();
        assert!(existed2);
        assert_eq!(id1, id2);
    }

    #[test]
    fn ingest_populates_live_table_and_skips_duplicates() {
        let interns = Interns::new();
        let inputs = interns.ingest(vec![rec("1 00001U"), rec("1 00001U")]).unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(interns.live_count(), 1);

        let snapshot = interns.live_snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].record_id, inputs[0].record_id);
    }

    #[test]
    fn ingesting_a_new_record_for_the_same_key_overwrites_the_live_entry() {
        let interns = Interns::new();
        let first = interns.ingest(vec![rec("1 00001U")]).unwrap();
        assert_eq!(first.len(), 1);
        let second = interns.ingest(vec![rec("1 00001V")]).unwrap();
        assert_eq!(second.len(), 1);

        assert_eq!(interns.live_count(), 1);
        let snapshot = interns.live_snapshot();
        assert_eq!(snapshot[0].record_id, second[0].record_id);
    }
}
