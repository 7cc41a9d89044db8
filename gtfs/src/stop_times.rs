use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{orig, IDMapping, StopID, TripID};

/// One visit of one trip to one stop. Times are kept exactly as they appear in the input;
/// normalizing the HH:MM:SS forms (including hours past 24) is the serialization layer's job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StopTime {
    pub stop_id: StopID,
    pub arrival_time: String,
    pub departure_time: String,
}

pub fn load<R: std::io::Read>(
    reader: R,
    stop_ids: &mut IDMapping<orig::StopID, StopID>,
    trip_ids: &IDMapping<orig::TripID, TripID>,
) -> Result<BTreeMap<TripID, Vec<StopTime>>> {
    let mut per_trip: BTreeMap<TripID, Vec<(usize, StopTime)>> = BTreeMap::new();
    let mut unknown_trips = 0;
    for rec in csv::Reader::from_reader(reader).deserialize() {
        let rec: Record = rec?;
        let trip_id = match trip_ids.get(&rec.trip_id) {
            Some(x) => x,
            None => {
                unknown_trips += 1;
                continue;
            }
        };
        per_trip.entry(trip_id).or_insert_with(Vec::new).push((
            rec.stop_sequence,
            StopTime {
                stop_id: stop_ids.insert_idempotent(&rec.stop_id),
                arrival_time: rec.arrival_time,
                departure_time: rec.departure_time,
            },
        ));
    }
    if unknown_trips > 0 {
        warn!("Dropped {unknown_trips} stop time rows referencing unknown trips");
    }

    // Sort by stop_sequence, in case the file isn't in order. The sort is stable, so rows
    // repeating a sequence number keep their input order.
    let mut results = BTreeMap::new();
    for (trip_id, mut rows) in per_trip {
        rows.sort_by_key(|(seq, _)| *seq);
        results.insert(
            trip_id,
            rows.into_iter().map(|(_, stop_time)| stop_time).collect(),
        );
    }
    Ok(results)
}

#[derive(Deserialize)]
struct Record {
    trip_id: orig::TripID,
    arrival_time: String,
    departure_time: String,
    stop_id: orig::StopID,
    stop_sequence: usize,
}
