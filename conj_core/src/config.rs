//! Engine configuration, mirroring the external interface's option table
//! exactly, with the reference system's own defaults.

use std::time::Duration;

/// Recognized configuration options and their effects.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of ticks kept in the rolling window.
    pub horizon: u32,
    /// Tick duration.
    pub resolution: Duration,
    /// Enable sub-tick refinement scanning.
    pub scan: bool,
    /// Final report distance threshold, km.
    pub scan_dist: f32,
    /// Index proximity threshold, km. Must be `<=` the cell's edge length
    /// at `index_level`, or pairs can straddle a two-cell gap undetected.
    pub index_dist: f32,
    /// Cell level (finer = more, smaller cells). The default, 3, is chosen
    /// for the default `index_dist` of 50 km: level 3's edge is ~59.8 km
    /// (see `cell_grid::edge_length_meters`), the finest h3 resolution that
    /// still bounds it. Level 5 (~8.5 km edges) was the reference system's
    /// literal default under its own S2-based partition and does not carry
    /// over here — an h3 cell at that resolution is far smaller than a 50 km
    /// threshold, which would let a conjunction straddle an undetected
    /// two-cell gap. Overriding `index_dist` should come with a matching
    /// `index_level` override.
    pub index_level: u8,
    /// Maximum throttling modulus for slow approaches.
    pub slow_sample: u32,
    /// Relative speed cutoff (m/s) below which slow-approach throttling
    /// applies.
    pub slow_sample_threshold: f32,
    /// Logical start time (unix seconds). `None` means "now, UTC,
    /// rounded down to `resolution`".
    pub t0: Option<f64>,
    /// Worker pool size.
    pub workers: u32,
    /// Sample count for the sub-tick scan (default 100).
    pub scan_samples: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            horizon: 60,
            resolution: Duration::from_secs(1),
            scan: true,
            scan_dist: 20.0,
            index_dist: 50.0,
            index_level: 3,
            slow_sample: 10,
            slow_sample_threshold: 0.1,
            t0: None,
            workers: num_cpus(),
            scan_samples: 100,
        }
    }
}

fn num_cpus() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}

impl EngineConfig {
    pub fn with_horizon(mut self, horizon: u32) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn with_resolution(mut self, resolution: Duration) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_scan(mut self, scan: bool) -> Self {
        self.scan = scan;
        self
    }

    pub fn with_scan_dist(mut self, scan_dist: f32) -> Self {
        self.scan_dist = scan_dist;
        self
    }

    pub fn with_index_dist(mut self, index_dist: f32) -> Self {
        self.index_dist = index_dist;
        self
    }

    pub fn with_index_level(mut self, index_level: u8) -> Self {
        self.index_level = index_level;
        self
    }

    pub fn with_slow_sample(mut self, slow_sample: u32) -> Self {
        self.slow_sample = slow_sample;
        self
    }

    pub fn with_slow_sample_threshold(mut self, threshold: f32) -> Self {
        self.slow_sample_threshold = threshold;
        self
    }

    pub fn with_t0(mut self, t0: f64) -> Self {
        self.t0 = Some(t0);
        self
    }

    pub fn with_workers(mut self, workers: u32) -> Self {
        self.workers = workers;
        self
    }

    /// Rounds `t` down to the nearest multiple of `resolution`, matching
    /// the reference system's truncating-division tick-rounding rule.
    pub fn round_to_resolution(&self, t: f64) -> f64 {
        let res = self.resolution.as_secs_f64();
        if res <= 0.0 {
            return t;
        }
        (t / res).floor() * res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_system() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.horizon, 60);
        assert_eq!(cfg.resolution, Duration::from_secs(1));
        assert_eq!(cfg.index_dist, 50.0);
        assert_eq!(cfg.index_level, 3);
        assert!(cfg.scan);
        assert_eq!(cfg.scan_dist, 20.0);
        assert_eq!(cfg.slow_sample, 10);
        assert_eq!(cfg.slow_sample_threshold, 0.1);
    }

    #[test]
    fn round_to_resolution_truncates() {
        let cfg = EngineConfig::default().with_resolution(Duration::from_secs(5));
        assert_eq!(cfg.round_to_resolution(12.9), 10.0);
        assert_eq!(cfg.round_to_resolution(10.0), 10.0);
    }
}
