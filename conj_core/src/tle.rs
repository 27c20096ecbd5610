//! `TleRecord`: the opaque unit of input the engine interns and tracks.
//!
//! The TLE textual parser and the SGP4 propagator are external
//! collaborators (out of scope); a `TleRecord` carries already-parsed text
//! lines, a pre-classified object type, and a ready-to-use [`Propagator`]
//! handle. This crate never tokenizes TLE text itself — the one exception
//! is the catalog-number substring, which the external interfaces section
//! pins to a fixed offset into line 1.

use std::sync::Arc;

use crate::propagator::Propagator;

/// A single TLE observation plus everything the engine needs to intern and
/// propagate it.
#[derive(Clone)]
pub struct TleRecord {
    pub publisher: String,
    pub line0: String,
    pub line1: String,
    pub line2: String,
    /// Opaque classification ("payload" / "rocket" / "debris" / ...),
    /// supplied by the upstream parser. The engine copies this verbatim
    /// into reports; it never classifies TLE text itself.
    pub object_type: String,
    /// The TLE's epoch, unix seconds, supplied by the upstream parser
    /// (decoding the epoch fields of line 1 is TLE-parsing logic, out of
    /// scope here). `None` if the epoch could not be determined upstream;
    /// age is then reported as zero.
    pub epoch_unix: Option<f64>,
    pub propagator: Arc<dyn Propagator>,
}

impl TleRecord {
    pub fn new(
        publisher: impl Into<String>,
        line0: impl Into<String>,
        line1: impl Into<String>,
        line2: impl Into<String>,
        object_type: impl Into<String>,
        epoch_unix: Option<f64>,
        propagator: Arc<dyn Propagator>,
    ) -> Self {
        TleRecord {
            publisher: publisher.into(),
            line0: line0.into(),
            line1: line1.into(),
            line2: line2.into(),
            object_type: object_type.into(),
            epoch_unix,
            propagator,
        }
    }

    /// Approximate age, seconds, as of `t0` (unix seconds). Zero if the
    /// epoch is unknown.
    pub fn approx_age(&self, t0: f64) -> f64 {
        self.epoch_unix.map(|epoch| t0 - epoch).unwrap_or(0.0)
    }

    /// The catalog-number substring, `line1[2..7]` trimmed of whitespace.
    /// Returns `None` (mapped to `CatalogNum::UNKNOWN` by the caller) if
    /// line 1 is too short to contain that range.
    pub fn catalog_string(&self) -> Option<String> {
        let bytes = self.line1.as_bytes();
        if bytes.len() <= 8 {
            return None;
        }
        let s: String = self.line1.chars().skip(2).take(5).collect();
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// The composite key used by the record intern: `publisher + "/" +
    /// line0 + "/" + line1 + "/" + line2`.
    pub fn intern_key(&self) -> String {
        format!("{}/{}/{}/{}", self.publisher, self.line0, self.line1, self.line2)
    }

    /// `catnum`, or `catnum + "/" + publisher` when the publisher string is
    /// non-empty, matching the reference `Name()` method.
    pub fn display_name(&self, catalog_string: &str) -> String {
        if self.publisher.is_empty() {
            catalog_string.to_string()
        } else {
            format!("{}/{}", catalog_string, self.publisher)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::propagator::Ephemeris;

    struct Stub;
    impl Propagator for Stub {
        fn propagate(&self, _t: f64) -> Result<Ephemeris, EngineError> {
            unimplemented!()
        }
    }

    fn rec(line1: &str) -> TleRecord {
        TleRecord::new("publisher-a", "0 ISS", line1, "2 25544  ...", "payload", None, Arc::new(Stub))
    }

    #[test]
    fn catalog_string_extracts_fixed_offset() {
        let r = rec("1 25544U 98067A   24001.50000000  .00001234  00000-0  12345-4 0  9991");
        assert_eq!(r.catalog_string().as_deref(), Some("25544"));
    }

    #[test]
    fn catalog_string_none_when_line_too_short() {
        let r = rec("1 2554");
        assert_eq!(r.catalog_string(), None);
    }

    #[test]
    fn intern_key_is_composite_of_publisher_and_lines() {
        let r = rec("1 25544U");
        assert_eq!(r.intern_key(), "publisher-a/0 ISS/1 25544U/2 25544  ...");
    }

    #[test]
    fn display_name_includes_publisher_when_present() {
        let r = rec("1 25544U");
        assert_eq!(r.display_name("25544"), "25544/publisher-a");
    }
}
