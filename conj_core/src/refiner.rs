//! Refiner: turns a candidate `Pair` from the spatial index into a final
//! `Report`, by optionally re-sampling both objects' trajectories across a
//! sub-tick window, applying the final distance threshold, throttling
//! slow-relative-velocity pairs, and computing the report's identity
//! hashes.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::intern::Interns;
use crate::propagator::{CoordinateConverter, Ephemeris, Propagator};
use crate::report::{ObjectState, Report};
use crate::types::Pair;

/// Walks `[t - tick/2, t + tick/2)` in `tick/samples` steps (or a single
/// sample at `t` if `do_it` is false), tracking the closest approach.
/// Early-exits once a step's distance drops below `cut_dist`.
fn scan_pair(
    do_it: bool,
    t: f64,
    tick_secs: f64,
    samples: u32,
    a: &dyn Propagator,
    b: &dyn Propagator,
    cut_dist: f32,
) -> Result<(f32, Ephemeris, Ephemeris, f64), EngineError> {
    if !do_it || samples == 0 {
        let ea = a.propagate(t)?;
        let eb = b.propagate(t)?;
        let d = ea.eci.dist(&eb.eci);
        return Ok((d, ea, eb, t));
    }

    let step = tick_secs / samples as f64;
    let start = t - tick_secs / 2.0;
    let end = t + tick_secs / 2.0;

    let mut best_a = a.propagate(t)?;
    let mut best_b = b.propagate(t)?;
    let mut closest = best_a.eci.dist(&best_b.eci);
    let mut then = t;

    let mut ts = start;
    while ts < end {
        let ea = a.propagate(ts)?;
        let eb = b.propagate(ts)?;
        let d = ea.eci.dist(&eb.eci);
        if d < closest {
            closest = d;
            then = ts;
            best_a = ea;
            best_b = eb;
        }
        if d < cut_dist {
            break;
        }
        ts += step;
    }

    Ok((closest, best_a, best_b, then))
}

/// Computes the slow-approach throttling modulus for relative speed `v`
/// against `slow_sample_threshold`, per the final component design.
fn throttle_modulus(v: f32, slow_sample: u32, slow_sample_threshold: f32) -> u32 {
    let scaled = (1.0 - v / slow_sample_threshold).clamp(0.0, 1.0);
    1 + ((slow_sample as f32 - 1.0) * scaled).floor() as u32
}

pub struct Refiner {
    config: EngineConfig,
    coordinate_converter: Option<Arc<dyn CoordinateConverter>>,
}

impl Refiner {
    pub fn new(config: EngineConfig) -> Self {
        Refiner { config, coordinate_converter: None }
    }

    pub fn with_coordinate_converter(mut self, converter: Arc<dyn CoordinateConverter>) -> Self {
        self.coordinate_converter = Some(converter);
        self
    }

    /// Refines one candidate pair at logical time `t` into a `Report`, if
    /// it survives the distance threshold and throttling rule.
    ///
    /// `now` is the wall-clock generation timestamp (unix seconds);
    /// `cancelled` marks whether this pair came from the index's
    /// `cancelled` set (vs. `novel`).
    pub fn refine(
        &self,
        interns: &Interns,
        pair: &Pair,
        t: f64,
        cancelled: bool,
        now: f64,
    ) -> Result<Option<Report>, EngineError> {
        let rec_a = interns
            .find_record(pair.a.record_id)
            .ok_or(EngineError::StaleRecord(pair.a.record_id.0))?;
        let rec_b = interns
            .find_record(pair.b.record_id)
            .ok_or(EngineError::StaleRecord(pair.b.record_id.0))?;

        let tick_secs = self.config.resolution.as_secs_f64();
        let scan = scan_pair(
            self.config.scan,
            t,
            tick_secs,
            self.config.scan_samples,
            rec_a.propagator.as_ref(),
            rec_b.propagator.as_ref(),
            0.0,
        );

        let (dist, eph_a, eph_b, then) = match scan {
            Ok(v) => v,
            Err(EngineError::PropagatorDecayed) => return Ok(None),
            Err(other) => return Err(other),
        };

        if dist > self.config.scan_dist {
            return Ok(None);
        }

        let v = eph_a.v.dist(&eph_b.v);
        if self.config.slow_sample > 0 && v < self.config.slow_sample_threshold {
            let m = throttle_modulus(v, self.config.slow_sample, self.config.slow_sample_threshold) as i64;
            if (t.floor() as i64).rem_euclid(m) != 0 {
                return Ok(None);
            }
        }

        // Age and LLA are reported as of the tick's logical time, not the
        // sub-tick closest-approach instant: only `Report.at` uses `then`.
        let state_a = self.object_state(&rec_a, t, eph_a);
        let state_b = self.object_state(&rec_b, t, eph_b);

        Ok(Some(Report::build(then, dist, v, [state_a, state_b], cancelled, now)))
    }

    fn object_state(&self, rec: &crate::tle::TleRecord, t: f64, eph: Ephemeris) -> ObjectState {
        let catalog = rec.catalog_string().unwrap_or_else(|| "unknown".to_string());
        ObjectState {
            name: rec.display_name(&catalog),
            object_type: rec.object_type.clone(),
            age_secs: rec.approx_age(t),
            eci: eph.eci,
            velocity: eph.v,
            lla: self
                .coordinate_converter
                .as_ref()
                .and_then(|c| c.to_lla(t, eph.eci)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CatalogNum, Key, Publisher, RecordId, StoredPoint};
    use crate::types::Pos as TypePos;
    use crate::types::Vect;
    use std::time::Duration;

    struct Linear {
        start: Vect,
        vel: Vect,
    }
    impl Propagator for Linear {
        fn propagate(&self, t: f64) -> Result<Ephemeris, EngineError> {
            Ok(Ephemeris {
                eci: Vect::new(
                    self.start.x + self.vel.x * t as f32,
                    self.start.y + self.vel.y * t as f32,
                    self.start.z + self.vel.z * t as f32,
                ),
                v: self.vel,
            })
        }
    }

    fn pair_with(interns: &Interns, a_pos: Vect, b_pos: Vect) -> Pair {
        let rec_a = crate::tle::TleRecord::new(
            "pub",
            "0 A",
            "1 00001U",
            "2 00001",
            "payload",
            None,
            Arc::new(Linear { start: a_pos, vel: Vect::new(0.0, 0.0, 0.0) }),
        );
        let rec_b = crate::tle::TleRecord::new(
            "pub",
            "0 B",
            "1 00002U",
            "2 00002",
            "payload",
            None,
            Arc::new(Linear { start: b_pos, vel: Vect::new(0.0, 0.0, 0.0) }),
        );
        let ra = interns.intern_record(rec_a).unwrap().record_id;
        let rb = interns.intern_record(rec_b).unwrap().record_id;
        interns.update_key_tracker(Key::new(CatalogNum(1), Publisher(1)), ra);
        interns.update_key_tracker(Key::new(CatalogNum(2), Publisher(1)), rb);

        let sp_a = StoredPoint::new(ra, CatalogNum(1), TypePos::new(a_pos.x, a_pos.y, a_pos.z));
        let sp_b = StoredPoint::new(rb, CatalogNum(2), TypePos::new(b_pos.x, b_pos.y, b_pos.z));
        Pair::new(sp_a, sp_b, a_pos.dist(&b_pos))
    }

    #[test]
    fn close_pair_produces_a_report() {
        let interns = Interns::new();
        let pair = pair_with(&interns, Vect::new(0.0, 0.0, 0.0), Vect::new(0.0001, 0.0, 0.0));
        let cfg = EngineConfig::default()
            .with_scan(false)
            .with_scan_dist(10.0)
            .with_slow_sample(0);
        let refiner = Refiner::new(cfg);
        let report = refiner.refine(&interns, &pair, 0.0, false, 1.0).unwrap();
        assert!(report.is_some());
        assert!(!report.unwrap().cancelled);
    }

    #[test]
    fn pair_beyond_scan_dist_is_dropped() {
        let interns = Interns::new();
        let pair = pair_with(&interns, Vect::new(0.0, 0.0, 0.0), Vect::new(50.0, 0.0, 0.0));
        let cfg = EngineConfig::default().with_scan(false).with_scan_dist(10.0);
        let refiner = Refiner::new(cfg);
        let report = refiner.refine(&interns, &pair, 0.0, false, 1.0).unwrap();
        assert!(report.is_none());
    }

    #[test]
    fn stale_record_is_reported_as_such() {
        let interns = Interns::new();
        let sp_a = StoredPoint::new(RecordId(999), CatalogNum(1), TypePos::new(0.0, 0.0, 0.0));
        let sp_b = StoredPoint::new(RecordId(998), CatalogNum(2), TypePos::new(1.0, 0.0, 0.0));
        let pair = Pair::new(sp_a, sp_b, 1.0);
        let refiner = Refiner::new(EngineConfig::default().with_scan(false));
        let err = refiner.refine(&interns, &pair, 0.0, false, 1.0).unwrap_err();
        assert!(matches!(err, EngineError::StaleRecord(_)));
    }

    #[test]
    fn throttle_modulus_grows_as_v_approaches_zero() {
        let m_far = throttle_modulus(0.099, 10, 0.1);
        let m_near_zero = throttle_modulus(0.0001, 10, 0.1);
        assert!(m_near_zero >= m_far);
        assert!(m_near_zero <= 10);
        assert!(m_far >= 1);
    }

    #[test]
    fn scan_disabled_uses_a_single_sample() {
        let _ = Duration::from_secs(1);
        let a = Linear { start: Vect::new(0.0, 0.0, 0.0), vel: Vect::new(0.0, 0.0, 0.0) };
        let b = Linear { start: Vect::new(1.0, 0.0, 0.0), vel: Vect::new(0.0, 0.0, 0.0) };
        let (d, _, _, then) = scan_pair(false, 5.0, 1.0, 100, &a, &b, 0.0).unwrap();
        assert_eq!(then, 5.0);
        assert_eq!(d, 1.0);
    }
}
