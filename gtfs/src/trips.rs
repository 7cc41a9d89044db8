use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{orig, IDMapping, RouteID, ServiceID, ShapeID, StopID, StopTime, TripID};

#[derive(Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripID,
    pub orig_id: orig::TripID,
    pub route_id: RouteID,
    pub service_id: ServiceID,
    pub shape_id: ShapeID,
    pub headsign: Option<String>,

    /// Sorted by the input's stop_sequence. All derived ordering comes from here.
    pub stop_times: Vec<StopTime>,
}

impl Trip {
    /// The trip's stops in visit order. A stop visited twice appears twice.
    pub fn stop_sequence(&self) -> Vec<StopID> {
        self.stop_times.iter().map(|st| st.stop_id).collect()
    }

    /// Position of the first visit to this stop, if the trip visits it at all. Later visits to
    /// the same stop don't get their own position; this is a known limitation for loop trips.
    pub fn position_of(&self, stop_id: StopID) -> Option<usize> {
        self.stop_times.iter().position(|st| st.stop_id == stop_id)
    }

    /// All stops whose first visit is strictly before the first visit to this stop. Empty if the
    /// stop is first in the sequence, or not on the trip.
    pub fn upstream_of(&self, stop_id: StopID) -> BTreeSet<StopID> {
        self.relative_to(stop_id, |pos, idx| pos < idx)
    }

    /// All stops whose first visit is strictly after the first visit to this stop.
    pub fn downstream_of(&self, stop_id: StopID) -> BTreeSet<StopID> {
        self.relative_to(stop_id, |pos, idx| pos > idx)
    }

    fn relative_to<F: Fn(usize, usize) -> bool>(&self, stop_id: StopID, keep: F) -> BTreeSet<StopID> {
        let mut first_position: BTreeMap<StopID, usize> = BTreeMap::new();
        for (i, st) in self.stop_times.iter().enumerate() {
            first_position.entry(st.stop_id).or_insert(i);
        }
        let idx = match first_position.get(&stop_id) {
            Some(x) => *x,
            None => return BTreeSet::new(),
        };
        first_position
            .into_iter()
            .filter(|(_, pos)| keep(*pos, idx))
            .map(|(x, _)| x)
            .collect()
    }
}

pub fn load<R: std::io::Read>(reader: R) -> Result<(Vec<Trip>, IDMapping<orig::TripID, TripID>)> {
    let mut trips = Vec::new();
    let mut ids = IDMapping::new();
    for rec in csv::Reader::from_reader(reader).deserialize() {
        let rec: Record = rec?;
        let id = ids.insert_new(rec.trip_id.clone())?;
        trips.push(Trip {
            id,
            orig_id: rec.trip_id,
            route_id: rec.route_id,
            service_id: rec.service_id,
            shape_id: rec.shape_id,
            headsign: rec.trip_headsign,

            stop_times: Vec::new(),
        });
    }
    Ok((trips, ids))
}

#[derive(Deserialize)]
struct Record {
    trip_id: orig::TripID,
    route_id: RouteID,
    service_id: ServiceID,
    shape_id: ShapeID,
    trip_headsign: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CheapID;

    fn trip(stops: Vec<usize>) -> Trip {
        Trip {
            id: TripID::new(0),
            orig_id: orig::TripID::new("t0"),
            route_id: RouteID::new("r0"),
            service_id: ServiceID("s0".to_string()),
            shape_id: ShapeID("sh0".to_string()),
            headsign: None,
            stop_times: stops
                .into_iter()
                .map(|x| StopTime {
                    stop_id: StopID::new(x),
                    arrival_time: "08:00:00".to_string(),
                    departure_time: "08:00:00".to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn upstream_downstream() {
        let t = trip(vec![1, 2, 3, 4]);
        assert_eq!(t.upstream_of(StopID::new(1)), BTreeSet::new());
        assert_eq!(
            t.upstream_of(StopID::new(3)),
            [StopID::new(1), StopID::new(2)].into_iter().collect()
        );
        assert_eq!(t.downstream_of(StopID::new(4)), BTreeSet::new());
        assert_eq!(
            t.downstream_of(StopID::new(2)),
            [StopID::new(3), StopID::new(4)].into_iter().collect()
        );
        // A stop the trip doesn't visit has no upstream or downstream side
        assert_eq!(t.upstream_of(StopID::new(9)), BTreeSet::new());
        assert_eq!(t.downstream_of(StopID::new(9)), BTreeSet::new());
    }

    #[test]
    fn repeated_stop_uses_first_visit() {
        let t = trip(vec![1, 2, 1, 3]);
        assert_eq!(t.position_of(StopID::new(1)), Some(0));
        assert_eq!(t.upstream_of(StopID::new(1)), BTreeSet::new());
        // The second visit to stop 1 doesn't put the stop downstream of itself
        assert_eq!(
            t.downstream_of(StopID::new(1)),
            [StopID::new(2), StopID::new(3)].into_iter().collect()
        );
        // And stop 2's upstream is just stop 1, by its first visit
        assert_eq!(
            t.upstream_of(StopID::new(2)),
            [StopID::new(1)].into_iter().collect()
        );
    }
}
