mod apply;
mod compile;
mod overrides;
mod summarize;

use std::collections::{BTreeMap, BTreeSet};

use gtfs::{StopID, Trip, TripID};

pub use apply::apply_to_trips;
pub use compile::{compile, MaterializedStopTime, MaterializedTrip, PickupDropOffType};
pub use overrides::{export_overrides, import_overrides, ImportCounts};
pub use summarize::{summarize_stop, RuleSummary};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum RestrictionMode {
    /// Board and alight freely. Never stored; a missing rule means the same thing.
    Normal,
    /// Passengers may board here, but not alight
    PickupOnly,
    /// Passengers may alight here, but not board
    DropoffOnly,
    /// Boarding/alighting restricted by where the passenger is going / came from
    Custom,
}

impl RestrictionMode {
    /// Tolerant of snake_case, camelCase and stray casing. Anything unrecognized reads as
    /// Normal.
    pub fn parse(x: &str) -> Self {
        match x.to_ascii_lowercase().replace('_', "").replace('-', "").as_str() {
            "pickuponly" => Self::PickupOnly,
            "dropoffonly" => Self::DropoffOnly,
            "custom" => Self::Custom,
            _ => Self::Normal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::PickupOnly => "pickup_only",
            Self::DropoffOnly => "dropoff_only",
            Self::Custom => "custom",
        }
    }
}

/// One boarding/alighting rule at one (trip, stop). The membership sets only mean something
/// under Custom: an empty set there says "nothing recorded in this direction", not "forbidden
/// from everywhere".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    pub mode: RestrictionMode,
    /// Alighting here is only allowed for passengers who boarded at one of these stops. Always a
    /// subset of the owning trip's stops strictly before this one.
    pub dropoff_only_from: BTreeSet<StopID>,
    /// Boarding here is only allowed for passengers travelling to one of these stops. Always a
    /// subset of the owning trip's stops strictly after this one.
    pub pickup_only_to: BTreeSet<StopID>,
}

impl Rule {
    pub fn simple(mode: RestrictionMode) -> Self {
        Self {
            mode,
            dropoff_only_from: BTreeSet::new(),
            pickup_only_to: BTreeSet::new(),
        }
    }

    pub fn custom(dropoff_only_from: BTreeSet<StopID>, pickup_only_to: BTreeSet<StopID>) -> Self {
        Self {
            mode: RestrictionMode::Custom,
            dropoff_only_from,
            pickup_only_to,
        }
    }

    pub fn is_normal(&self) -> bool {
        self.mode == RestrictionMode::Normal
    }

    /// Drop set members that aren't valid for this (trip, stop): dropoff origins must lie
    /// strictly upstream, pickup destinations strictly downstream. Out-of-range members vanish
    /// silently. Non-Custom rules carry no sets at all.
    fn clamped(mut self, trip: &Trip, stop_id: StopID) -> Self {
        if self.mode != RestrictionMode::Custom {
            self.dropoff_only_from.clear();
            self.pickup_only_to.clear();
            return self;
        }
        let upstream = trip.upstream_of(stop_id);
        let downstream = trip.downstream_of(stop_id);
        self.dropoff_only_from = &self.dropoff_only_from & &upstream;
        self.pickup_only_to = &self.pickup_only_to & &downstream;
        self
    }
}

/// Sparse per-(trip, stop) rules. Absence means full service. The store never holds a Normal
/// rule; writing one deletes the entry.
pub struct RestrictionStore {
    rules: BTreeMap<(TripID, StopID), Rule>,
}

impl RestrictionStore {
    pub fn new() -> Self {
        Self {
            rules: BTreeMap::new(),
        }
    }

    /// Takes the whole Trip, not just its ID, because clamping needs the trip's own stop order.
    pub fn set_rule(&mut self, trip: &Trip, stop_id: StopID, rule: Rule) {
        if rule.is_normal() {
            self.rules.remove(&(trip.id, stop_id));
        } else {
            self.rules.insert((trip.id, stop_id), rule.clamped(trip, stop_id));
        }
    }

    pub fn get_rule(&self, trip_id: TripID, stop_id: StopID) -> Rule {
        match self.rules.get(&(trip_id, stop_id)) {
            Some(rule) => rule.clone(),
            None => Rule::simple(RestrictionMode::Normal),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(TripID, StopID), &Rule)> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{gtfs_from, stop, trip};
    use super::*;

    #[test]
    fn custom_sets_clamp_to_the_trips_own_order() {
        let gtfs = gtfs_from(vec![("t1", "r1", vec!["A", "B", "C", "D"])]);
        let t1 = trip(&gtfs, "t1");
        let mut store = RestrictionStore::new();

        // D isn't upstream of C and A isn't downstream, so both vanish
        store.set_rule(
            t1,
            stop(&gtfs, "C"),
            Rule::custom(
                [stop(&gtfs, "A"), stop(&gtfs, "D")].into_iter().collect(),
                [stop(&gtfs, "A"), stop(&gtfs, "D")].into_iter().collect(),
            ),
        );
        let rule = store.get_rule(t1.id, stop(&gtfs, "C"));
        assert_eq!(
            rule.dropoff_only_from,
            [stop(&gtfs, "A")].into_iter().collect()
        );
        assert_eq!(rule.pickup_only_to, [stop(&gtfs, "D")].into_iter().collect());
    }

    #[test]
    fn writing_normal_deletes() {
        let gtfs = gtfs_from(vec![("t1", "r1", vec!["A", "B"])]);
        let t1 = trip(&gtfs, "t1");
        let mut store = RestrictionStore::new();

        store.set_rule(t1, stop(&gtfs, "B"), Rule::simple(RestrictionMode::PickupOnly));
        assert_eq!(store.len(), 1);
        store.set_rule(t1, stop(&gtfs, "B"), Rule::simple(RestrictionMode::Normal));
        assert!(store.is_empty());
        // Reading a missing key yields Normal
        assert!(store.get_rule(t1.id, stop(&gtfs, "B")).is_normal());
    }

    #[test]
    fn simple_modes_never_carry_sets() {
        let gtfs = gtfs_from(vec![("t1", "r1", vec!["A", "B", "C"])]);
        let t1 = trip(&gtfs, "t1");
        let mut store = RestrictionStore::new();

        let mut rule = Rule::simple(RestrictionMode::DropoffOnly);
        rule.pickup_only_to.insert(stop(&gtfs, "C"));
        store.set_rule(t1, stop(&gtfs, "B"), rule);
        assert!(store
            .get_rule(t1.id, stop(&gtfs, "B"))
            .pickup_only_to
            .is_empty());
    }

    #[test]
    fn mode_parsing_is_tolerant() {
        assert_eq!(RestrictionMode::parse("pickup_only"), RestrictionMode::PickupOnly);
        assert_eq!(RestrictionMode::parse("pickupOnly"), RestrictionMode::PickupOnly);
        assert_eq!(RestrictionMode::parse("DROPOFF-ONLY"), RestrictionMode::DropoffOnly);
        assert_eq!(RestrictionMode::parse("custom"), RestrictionMode::Custom);
        assert_eq!(RestrictionMode::parse("no such mode"), RestrictionMode::Normal);
    }
}
