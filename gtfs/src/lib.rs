#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod ids;
mod routes;
mod stop_times;
mod trips;

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use zip::ZipArchive;

pub use ids::{orig, CheapID, IDMapping, ServiceID, ShapeID, StopID, TripID};
pub use routes::{Route, RouteID, RouteType, RouteVariant, RouteVariantID};
pub use stop_times::StopTime;
pub use trips::Trip;

/// The slice of a feed this editor core works on: trips and their stop times, plus route
/// metadata for display. Stops, shapes, calendars and the rest of the feed stay in the layer
/// that owns the full working set.
#[derive(Serialize, Deserialize)]
pub struct GTFS {
    pub routes: BTreeMap<RouteID, Route>,
    pub trips: BTreeMap<TripID, Trip>,

    pub stop_ids: IDMapping<orig::StopID, StopID>,
    pub trip_ids: IDMapping<orig::TripID, TripID>,
}

impl GTFS {
    pub fn load_from_zip<R: std::io::Read + std::io::Seek>(
        archive: &mut ZipArchive<R>,
    ) -> Result<Self> {
        let trips = read_zip_file(archive, "trips.txt")?;
        let stop_times = read_zip_file(archive, "stop_times.txt")?;
        // Optional; trips referencing routes not described here still load
        let routes = read_zip_file(archive, "routes.txt").ok();
        Self::load_from_readers(
            trips.as_bytes(),
            stop_times.as_bytes(),
            routes.as_deref().map(str::as_bytes),
        )
    }

    pub fn load_from_readers<R1: std::io::Read, R2: std::io::Read, R3: std::io::Read>(
        trips_reader: R1,
        stop_times_reader: R2,
        routes_reader: Option<R3>,
    ) -> Result<Self> {
        let mut gtfs = Self::empty();
        if let Some(reader) = routes_reader {
            gtfs.routes = routes::load(reader)?;
        }

        let (trips, trip_ids) = trips::load(trips_reader)?;
        gtfs.trip_ids = trip_ids;
        let mut per_trip =
            stop_times::load(stop_times_reader, &mut gtfs.stop_ids, &gtfs.trip_ids)?;

        let mut missing_stop_times = 0;
        for mut trip in trips {
            match per_trip.remove(&trip.id) {
                Some(list) => trip.stop_times = list,
                None => missing_stop_times += 1,
            }
            if !gtfs.routes.contains_key(&trip.route_id) {
                warn!("{:?} isn't in routes.txt; filling in a stub", trip.route_id);
                gtfs.routes.insert(
                    trip.route_id.clone(),
                    Route {
                        route_id: trip.route_id.clone(),
                        route_type: RouteType::Bus,
                        short_name: None,
                        long_name: None,
                        variants: Vec::new(),
                    },
                );
            }
            gtfs.trips.insert(trip.id, trip);
        }
        if missing_stop_times > 0 {
            // Not fatal; these trips just never produce output
            warn!("{missing_stop_times} trips have no stop times");
        }

        gtfs.regroup_variants();
        Ok(gtfs)
    }

    pub fn empty() -> Self {
        Self {
            routes: BTreeMap::new(),
            trips: BTreeMap::new(),
            stop_ids: IDMapping::new(),
            trip_ids: IDMapping::new(),
        }
    }

    /// Rebuild every route's variants from the current trips. Call after anything changes a
    /// trip's stop times; variants are pure derived state and are never edited directly.
    pub fn regroup_variants(&mut self) {
        for route in self.routes.values_mut() {
            route.variants.clear();
        }

        let mut per_route: BTreeMap<RouteID, BTreeMap<Vec<StopID>, Vec<TripID>>> = BTreeMap::new();
        for trip in self.trips.values() {
            per_route
                .entry(trip.route_id.clone())
                .or_insert_with(BTreeMap::new)
                .entry(trip.stop_sequence())
                .or_insert_with(Vec::new)
                .push(trip.id);
        }

        let mut id_counter = 0;
        for (route_id, groups) in per_route {
            for (stops, mut trip_list) in groups {
                trip_list.sort_by_key(|t| {
                    let trip = &self.trips[t];
                    (
                        trip.stop_times
                            .first()
                            .map(|st| st.arrival_time.clone())
                            .unwrap_or_default(),
                        trip.orig_id.clone(),
                    )
                });
                self.routes
                    .entry(route_id.clone())
                    .or_insert_with(|| Route {
                        route_id: route_id.clone(),
                        route_type: RouteType::Bus,
                        short_name: None,
                        long_name: None,
                        variants: Vec::new(),
                    })
                    .variants
                    .push(RouteVariant {
                        route_id: route_id.clone(),
                        variant_id: RouteVariantID(id_counter),
                        stops,
                        trips: trip_list,
                    });
                id_counter += 1;
            }
        }
    }

    pub fn variant(&self, id: RouteVariantID) -> &RouteVariant {
        // TODO If the ID encodes the route, we can be much better
        for route in self.routes.values() {
            for variant in &route.variants {
                if variant.variant_id == id {
                    return variant;
                }
            }
        }
        panic!("Unknown {:?}", id);
    }

    pub fn variant_trips(&self, id: RouteVariantID) -> Vec<&Trip> {
        self.variant(id)
            .trips
            .iter()
            .map(|t| &self.trips[t])
            .collect()
    }

    pub fn all_variants(&self) -> Vec<RouteVariantID> {
        self.routes
            .values()
            .flat_map(|route| route.variants.iter().map(|v| v.variant_id))
            .collect()
    }
}

// Adds the path to the error message, and detaches the contents from the archive's lifetime
fn read_zip_file<R: std::io::Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<String> {
    let mut file = archive
        .by_name(path)
        .map_err(|err| anyhow!("{path}: {err}"))?;
    let mut contents = String::new();
    std::io::Read::read_to_string(&mut file, &mut contents)?;
    Ok(contents)
}
