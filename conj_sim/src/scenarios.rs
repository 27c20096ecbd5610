//! Scenario identifiers for the six literal end-to-end scenarios.

/// One of the literal end-to-end scenarios driven by the scenario runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// Start engine, ingest nothing, advance the clock a few ticks: expect
    /// zero reports and an empty live table.
    EmptyWindow,
    /// Ingest a single TLE: a lone object can never conjunct with itself.
    SingleObject,
    /// Two objects close enough to conjunct, distinct nonzero catalogs:
    /// expect one novel report per tick.
    TwoApproaching,
    /// Continuation of `TwoApproaching` with one object moved far away:
    /// expect a cancellation of the prior report and no new novel one.
    ObjectMovesAway,
    /// Same geometry as `TwoApproaching`, but both sides share one nonzero
    /// catalog number: expect zero reports.
    SameCatalogSuppression,
    /// Two objects whose relative speed sits below `slow_sample_threshold`:
    /// expect the throttled emission rate the slow-approach rule predicts.
    Throttling,
}

impl ScenarioId {
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::EmptyWindow => "empty-window",
            ScenarioId::SingleObject => "single-object",
            ScenarioId::TwoApproaching => "two-approaching",
            ScenarioId::ObjectMovesAway => "object-moves-away",
            ScenarioId::SameCatalogSuppression => "same-catalog-suppression",
            ScenarioId::Throttling => "throttling",
        }
    }

    pub const ALL: [ScenarioId; 6] = [
        ScenarioId::EmptyWindow,
        ScenarioId::SingleObject,
        ScenarioId::TwoApproaching,
        ScenarioId::ObjectMovesAway,
        ScenarioId::SameCatalogSuppression,
        ScenarioId::Throttling,
    ];

    pub fn from_name(name: &str) -> Option<ScenarioId> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_name_round_trips_with_name() {
        for s in ScenarioId::ALL {
            assert_eq!(ScenarioId::from_name(s.name()), Some(s));
        }
    }

    #[test]
    fn unknown_name_is_none() {
        assert_eq!(ScenarioId::from_name("nope"), None);
    }
}
