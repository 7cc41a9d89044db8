use gtfs::{StopID, Trip};

use super::{RestrictionStore, Rule};

/// Write (or clear, with None) one rule at one stop for every trip in the list. The list is
/// whatever section of trips the caller is editing; the trips don't have to share a stop
/// sequence, so Custom membership sets are re-clamped against each trip's own upstream and
/// downstream stops as they're written. A trip where the stop has no valid side just gets empty
/// sets.
pub fn apply_to_trips(
    store: &mut RestrictionStore,
    trips: &[&Trip],
    stop_id: StopID,
    rule: Option<&Rule>,
) {
    for trip in trips {
        match rule {
            Some(rule) => store.set_rule(trip, stop_id, rule.clone()),
            None => store.set_rule(trip, stop_id, Rule::simple(super::RestrictionMode::Normal)),
        }
    }
    debug!(
        "Applied {} at {:?} to {} trips",
        rule.map(|r| r.mode.as_str()).unwrap_or("clear"),
        stop_id,
        trips.len()
    );
}
