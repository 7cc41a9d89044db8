use anyhow::Result;
use serde::Serialize;

use gtfs::{orig, RouteID, ServiceID, ShapeID};

use crate::restrictions::{MaterializedTrip, PickupDropOffType};

/// The trips.txt fragment for the feed writer, one row per materialized trip.
pub fn write_trips(trips: &[MaterializedTrip]) -> Result<String> {
    let mut out = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut out);
        for trip in trips {
            writer.serialize(TripRow {
                trip_id: &trip.trip_id,
                route_id: &trip.route_id,
                service_id: &trip.service_id,
                shape_id: &trip.shape_id,
            })?;
        }
        writer.flush()?;
    }
    Ok(String::from_utf8(out)?)
}

/// The matching stop_times.txt fragment. Rows come out grouped per trip, in stop_sequence
/// order, because that's the order the compiler produced them in.
pub fn write_stop_times(trips: &[MaterializedTrip]) -> Result<String> {
    let mut out = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut out);
        for trip in trips {
            for st in &trip.stop_times {
                writer.serialize(StopTimeRow {
                    trip_id: &trip.trip_id,
                    arrival_time: &st.arrival_time,
                    departure_time: &st.departure_time,
                    stop_id: &st.stop_id,
                    stop_sequence: st.stop_sequence,
                    pickup_type: st.pickup_type,
                    drop_off_type: st.drop_off_type,
                })?;
            }
        }
        writer.flush()?;
    }
    Ok(String::from_utf8(out)?)
}

#[derive(Serialize)]
struct TripRow<'a> {
    trip_id: &'a str,
    route_id: &'a RouteID,
    service_id: &'a ServiceID,
    shape_id: &'a ShapeID,
}

#[derive(Serialize)]
struct StopTimeRow<'a> {
    trip_id: &'a str,
    arrival_time: &'a str,
    departure_time: &'a str,
    stop_id: &'a orig::StopID,
    stop_sequence: u32,
    pickup_type: PickupDropOffType,
    drop_off_type: PickupDropOffType,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::restrictions::testing::{gtfs_from, stop, trip};
    use crate::restrictions::{compile, RestrictionMode, RestrictionStore, Rule};

    #[test]
    fn fragments_have_flat_flags() {
        let gtfs = gtfs_from(vec![("t1", "r1", vec!["A", "B", "C"])]);
        let t1 = trip(&gtfs, "t1");
        let mut store = RestrictionStore::new();
        store.set_rule(t1, stop(&gtfs, "B"), Rule::simple(RestrictionMode::DropoffOnly));

        let compiled = compile(&gtfs, &store);
        let trips_txt = write_trips(&compiled).unwrap();
        assert_eq!(trips_txt, "trip_id,route_id,service_id,shape_id\nt1,r1,weekday,shape1\n");

        let stop_times_txt = write_stop_times(&compiled).unwrap();
        let mut lines = stop_times_txt.lines();
        assert_eq!(
            lines.next().unwrap(),
            "trip_id,arrival_time,departure_time,stop_id,stop_sequence,pickup_type,drop_off_type"
        );
        assert_eq!(lines.next().unwrap(), "t1,08:00:00,08:00:30,A,1,0,0");
        assert_eq!(lines.next().unwrap(), "t1,08:01:00,08:01:30,B,2,1,0");
        assert_eq!(lines.next().unwrap(), "t1,08:02:00,08:02:30,C,3,0,0");
        assert_eq!(lines.next(), None);
    }
}
