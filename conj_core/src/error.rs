//! Typed errors for the conjunction engine, with the disposition (log-and-continue
//! vs. fatal) encoded in the type rather than left to caller string-matching.

use thiserror::Error;

/// Errors raised anywhere in the engine.
///
/// Every variant here corresponds to a row of the error-handling table: ingest
/// parse failures, propagator failures, cell-mapping failures, stale record
/// lookups, interner exhaustion, and cancellation. Disposition is determined
/// by the call site, not by the variant alone, except where noted.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A TLE triple could not be parsed into a usable record. Logged and the
    /// record is dropped; never fatal.
    #[error("parse error: {0}")]
    ParseError(String),

    /// The propagator reported the object has decayed (re-entered). Silently
    /// skipped; not even logged as a warning, since it is an expected steady
    /// state for old catalog entries.
    #[error("propagator reports decayed object")]
    PropagatorDecayed,

    /// The propagator failed for a reason other than decay. Logged per
    /// occurrence; the one record is dropped for that tick.
    #[error("propagator error: {0}")]
    PropagatorOther(String),

    /// The cell grid could not assign a covering cell to a point. Surfaced as
    /// an index error; the key being updated is considered poisoned for that
    /// call.
    #[error("point could not be mapped to a cell: {0:?}")]
    PointUnmappable(crate::types::Pos),

    /// A pair referenced a record id that is no longer present in the
    /// interns (it was superseded or retired between indexing and
    /// refinement). Warn and drop the pair.
    #[error("stale record id {0}")]
    StaleRecord(u32),

    /// The record or string intern table could not find a free id within its
    /// probe window. Fatal: the process terminates after logging.
    #[error("id space exhausted after {attempts} probes")]
    IdSpaceExhausted { attempts: u32 },

    /// The engine's cancellation signal fired. Not an error condition by
    /// itself; loops observing this abort cleanly.
    #[error("cancelled")]
    Cancelled,

    /// A channel closed out from under a send/receive. Treated like
    /// cancellation: abort the loop cleanly.
    #[error("channel closed")]
    ChannelClosed,
}

impl EngineError {
    /// True for error kinds that must terminate the process once logged.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::IdSpaceExhausted { .. })
    }

    /// True for error kinds that are not even worth a warning log (expected,
    /// steady-state conditions).
    pub fn is_silent(&self) -> bool {
        matches!(self, EngineError::PropagatorDecayed)
    }
}

/// Wraps an [`EngineError`] to mark it explicitly as a non-fatal warning,
/// so call sites that need to distinguish "log and continue" from "log and
/// abort" can match on the wrapper instead of re-deriving disposition from
/// the inner variant.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct Warning(pub Box<EngineError>);

impl Warning {
    pub fn new(err: EngineError) -> Self {
        Warning(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
