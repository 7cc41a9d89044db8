use std::collections::BTreeMap;

use gtfs::{orig, RouteID, ServiceID, ShapeID, StopID, Trip, GTFS};
use serde::Serialize;
use serde_repr::{Deserialize_repr, Serialize_repr};

use super::{RestrictionMode, RestrictionStore, Rule};

/// The only two flag values this editor ever emits. The target schema also knows 2 (phone the
/// agency) and 3 (flag the driver), but nothing here produces them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum PickupDropOffType {
    Regular = 0,
    NotAvailable = 1,
}

/// An output trip, ready for the feed writer. Either a source trip passed through with flags
/// filled in, or one of the synthesized `__segA`/`__segB`/`__bridge` clones a Custom rule
/// lowers to.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MaterializedTrip {
    pub trip_id: String,
    pub route_id: RouteID,
    pub service_id: ServiceID,
    pub shape_id: ShapeID,
    pub stop_times: Vec<MaterializedStopTime>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MaterializedStopTime {
    pub stop_id: orig::StopID,
    pub arrival_time: String,
    pub departure_time: String,
    /// Dense and 1-based, regardless of how the source rows were numbered
    pub stop_sequence: u32,
    pub pickup_type: PickupDropOffType,
    pub drop_off_type: PickupDropOffType,
}

/// Lower the rule set into trips with flat per-stop flags. Each source trip compiles
/// independently; trips without stop times produce nothing. Output order follows trip load
/// order, so compiling the same inputs twice gives identical output.
pub fn compile(gtfs: &GTFS, store: &RestrictionStore) -> Vec<MaterializedTrip> {
    // Materialized rows speak the feed's stop IDs, so invert the interning map once up front
    let mut stop_names: BTreeMap<StopID, orig::StopID> = BTreeMap::new();
    for (orig_id, cheap) in gtfs.stop_ids.borrow() {
        stop_names.insert(*cheap, orig_id.clone());
    }

    let mut output = Vec::new();
    let mut sources = 0;
    let mut split = 0;
    for trip in gtfs.trips.values() {
        if trip.stop_times.is_empty() {
            continue;
        }
        sources += 1;
        let materialized = compile_trip(trip, store, &stop_names);
        if materialized.len() > 1 {
            split += 1;
        }
        output.extend(materialized);
    }
    info!(
        "Materialized {} trips from {} source trips ({} split over a custom span)",
        output.len(),
        sources,
        split
    );
    output
}

/// Pure per-trip lowering, exactly one of two shapes:
///
/// Only simple rules: one output trip, same ID. DropoffOnly blocks boarding at that stop,
/// PickupOnly blocks alighting.
///
/// Any Custom rule: three output trips covering the span from the first Custom stop to the
/// last. segA (start..=lastC) carries passengers who boarded upstream and may only alight
/// through the span; segB (firstC..end) carries passengers boarding through the span to alight
/// downstream; bridge (the full trip) carries through-passengers, with both flags blocked
/// inside the span. Only the mode label drives this; the membership sets are an editing-time
/// concept the flat flags can't express.
fn compile_trip(
    trip: &Trip,
    store: &RestrictionStore,
    stop_names: &BTreeMap<StopID, orig::StopID>,
) -> Vec<MaterializedTrip> {
    let seq = trip.stop_sequence();
    let mut rules: BTreeMap<usize, Rule> = BTreeMap::new();
    for (i, stop_id) in seq.iter().enumerate() {
        let rule = store.get_rule(trip.id, *stop_id);
        if rule.is_normal() {
            continue;
        }
        // A trip with fewer than two stops has no upstream or downstream side, so a Custom rule
        // on it can't mean anything; treat it as unrestricted
        if rule.mode == RestrictionMode::Custom && seq.len() < 2 {
            continue;
        }
        rules.insert(i, rule);
    }

    let custom: Vec<usize> = rules
        .iter()
        .filter(|(_, rule)| rule.mode == RestrictionMode::Custom)
        .map(|(i, _)| *i)
        .collect();

    if custom.is_empty() {
        return vec![materialize_span(
            trip,
            0..seq.len(),
            &rules,
            None,
            stop_names,
        )];
    }

    let first_c = custom[0];
    let last_c = *custom.last().unwrap();
    use PickupDropOffType::{NotAvailable, Regular};
    vec![
        materialize_span(
            trip,
            0..last_c + 1,
            &rules,
            Some(("__segA", NotAvailable, Regular)),
            stop_names,
        ),
        materialize_span(
            trip,
            first_c..seq.len(),
            &rules,
            Some(("__segB", Regular, NotAvailable)),
            stop_names,
        ),
        materialize_span(
            trip,
            0..seq.len(),
            &rules,
            Some(("__bridge", NotAvailable, NotAvailable)),
            stop_names,
        ),
    ]
}

fn materialize_span(
    trip: &Trip,
    positions: std::ops::Range<usize>,
    rules: &BTreeMap<usize, Rule>,
    // Suffix for the synthesized trip ID, and the flag pair every Custom position gets
    custom: Option<(&str, PickupDropOffType, PickupDropOffType)>,
    stop_names: &BTreeMap<StopID, orig::StopID>,
) -> MaterializedTrip {
    use PickupDropOffType::{NotAvailable, Regular};

    let trip_id = match custom {
        Some((suffix, _, _)) => format!("{}{}", trip.orig_id.as_str(), suffix),
        None => trip.orig_id.as_str().to_string(),
    };

    let mut stop_times = Vec::new();
    for (out_idx, pos) in positions.enumerate() {
        let st = &trip.stop_times[pos];
        let (pickup_type, drop_off_type) = match rules.get(&pos).map(|rule| rule.mode) {
            None | Some(RestrictionMode::Normal) => (Regular, Regular),
            Some(RestrictionMode::DropoffOnly) => (NotAvailable, Regular),
            Some(RestrictionMode::PickupOnly) => (Regular, NotAvailable),
            Some(RestrictionMode::Custom) => match custom {
                Some((_, pickup, dropoff)) => (pickup, dropoff),
                // Can't happen; a Custom rule always puts us on the three-way path
                None => (Regular, Regular),
            },
        };
        stop_times.push(MaterializedStopTime {
            stop_id: stop_names[&st.stop_id].clone(),
            arrival_time: st.arrival_time.clone(),
            departure_time: st.departure_time.clone(),
            stop_sequence: (out_idx + 1) as u32,
            pickup_type,
            drop_off_type,
        });
    }

    MaterializedTrip {
        trip_id,
        route_id: trip.route_id.clone(),
        service_id: trip.service_id.clone(),
        shape_id: trip.shape_id.clone(),
        stop_times,
    }
}
