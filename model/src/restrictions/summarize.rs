use gtfs::{StopID, Trip};

use super::{RestrictionMode, RestrictionStore, Rule};

/// What a group of trips shows at one stop, for display and for pre-loading the bulk editor.
#[derive(Clone, Debug, PartialEq)]
pub enum RuleSummary {
    /// Nothing to summarize; the caller passed no trips
    NoTrips,
    /// The trips disagree, either on mode or on Custom membership sets
    Mixed,
    Uniform(Rule),
}

/// Summarize the rules a list of trips (normally one route variant) has at one stop. Trips with
/// no stored rule count as Normal. Pure read; the store is untouched.
pub fn summarize_stop(
    store: &RestrictionStore,
    trips: &[&Trip],
    stop_id: StopID,
) -> RuleSummary {
    let mut rules = trips.iter().map(|trip| store.get_rule(trip.id, stop_id));
    let first = match rules.next() {
        Some(rule) => rule,
        None => return RuleSummary::NoTrips,
    };
    for rule in rules {
        if rule.mode != first.mode {
            return RuleSummary::Mixed;
        }
        // For Custom, agreement on the mode isn't enough; the membership sets have to match
        // exactly too, or the bulk editor would show one trip's sets as if they covered all
        if first.mode == RestrictionMode::Custom && rule != first {
            return RuleSummary::Mixed;
        }
    }
    RuleSummary::Uniform(first)
}
