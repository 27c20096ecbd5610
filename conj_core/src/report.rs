//! Report envelope, object state, and the deterministic content hashes
//! (`Sig` / `Id`) that let downstream consumers join a cancellation
//! message back to the report it cancels.

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::types::Vect;

/// Latitude/longitude/altitude, supplied by an external coordinate
/// converter (out of scope for this crate); `None` if no converter was
/// configured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLonAlt {
    pub lat: f32,
    pub lon: f32,
    pub alt: f32,
}

/// One side of a conjunction report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectState {
    /// `catnum`, or `catnum/publisher` when the publisher string is non-empty.
    pub name: String,
    /// Opaque classification supplied by the TLE collaborator ("payload",
    /// "rocket", "debris", ...).
    pub object_type: String,
    /// Approximate age of the underlying TLE, in seconds, at report time.
    pub age_secs: f64,
    /// Position in the Earth-centred inertial frame, km.
    pub eci: Vect,
    /// Velocity, m/s.
    pub velocity: Vect,
    /// Geodetic position, if a coordinate converter was configured.
    pub lla: Option<LatLonAlt>,
}

/// The fields that participate in `Sig` — everything describing *what*
/// happened, but not *whether it's still true* or *when we found out*.
#[derive(Serialize)]
struct SigPayload<'a> {
    at: f64,
    dist: f32,
    speed: f32,
    objs: &'a [ObjectState; 2],
}

/// A conjunction report: a refined close-approach prediction between two
/// objects, plus the bookkeeping needed to correlate its cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Closest-approach logical time, unix seconds.
    pub at: f64,
    /// Refined distance, km.
    pub dist: f32,
    /// Relative speed at closest approach, m/s.
    pub speed: f32,
    pub objs: [ObjectState; 2],
    /// Stable hash of the payload without `cancelled`/`generated`. Equal
    /// between a report and the message that later cancels it.
    pub sig: String,
    /// Stable hash of the full payload, including `cancelled`/`generated`.
    /// Differs between a report and its cancellation.
    pub id: String,
    pub cancelled: bool,
    /// Wall-clock time this report was generated, unix seconds.
    pub generated: f64,
}

fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{:02x}", b);
    }
    s
}

impl Report {
    /// Builds a report, computing `Sig` from the invariant fields and `Id`
    /// from the full payload (including the `cancelled`/`generated` values
    /// passed in here).
    pub fn build(at: f64, dist: f32, speed: f32, objs: [ObjectState; 2], cancelled: bool, generated: f64) -> Self {
        let sig_payload = SigPayload { at, dist, speed, objs: &objs };
        let sig_json = serde_json::to_vec(&sig_payload).expect("report payload is always serializable");
        let sig = sha1_hex(&sig_json);

        let mut report = Report {
            at,
            dist,
            speed,
            objs,
            sig,
            id: String::new(),
            cancelled,
            generated,
        };

        let id_json = serde_json::to_vec(&report).expect("report payload is always serializable");
        report.id = sha1_hex(&id_json);
        report
    }

    /// Builds the cancellation counterpart of this report: same `Sig`,
    /// `cancelled = true`, a fresh `generated` timestamp, and therefore a
    /// different `Id`.
    pub fn cancel(&self, generated: f64) -> Report {
        Report::build(self.at, self.dist, self.speed, self.objs.clone(), true, generated)
    }
}

/// A snapshot of engine-wide counters, emitted on every tick advance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    pub wall_time: f64,
    pub virtual_time: f64,
    pub recent_ingest_count: u64,
    pub live_count: u64,
    pub worker_count: u64,
    /// Wall time minus the scheduled tick time, seconds.
    pub lag: f64,
    pub interned_string_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(name: &str) -> ObjectState {
        ObjectState {
            name: name.to_string(),
            object_type: "payload".to_string(),
            age_secs: 10.0,
            eci: Vect::new(7000.0, 0.0, 0.0),
            velocity: Vect::new(0.0, 7.5, 0.0),
            lla: None,
        }
    }

    #[test]
    fn sig_is_stable_across_cancellation() {
        let r = Report::build(1000.0, 0.001, 10.0, [state("a"), state("b")], false, 1.0);
        let c = r.cancel(2.0);
        assert_eq!(r.sig, c.sig);
    }

    #[test]
    fn id_differs_between_report_and_cancellation() {
        let r = Report::build(1000.0, 0.001, 10.0, [state("a"), state("b")], false, 1.0);
        let c = r.cancel(2.0);
        assert_ne!(r.id, c.id);
    }

    #[test]
    fn sig_depends_on_payload_not_identity_fields() {
        let a = Report::build(1000.0, 0.001, 10.0, [state("a"), state("b")], false, 1.0);
        let b = Report::build(1000.0, 0.001, 10.0, [state("a"), state("b")], false, 999.0);
        assert_eq!(a.sig, b.sig);
    }

    #[test]
    fn sig_changes_with_distance() {
        let a = Report::build(1000.0, 0.001, 10.0, [state("a"), state("b")], false, 1.0);
        let b = Report::build(1000.0, 0.002, 10.0, [state("a"), state("b")], false, 1.0);
        assert_ne!(a.sig, b.sig);
    }
}
