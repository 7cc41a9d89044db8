use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::{StopID, TripID};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RouteID(String);

impl RouteID {
    pub fn new<S: Into<String>>(x: S) -> Self {
        Self(x.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Route {
    pub route_id: RouteID,
    pub route_type: RouteType,
    pub short_name: Option<String>,
    pub long_name: Option<String>,

    /// Trips of this route, grouped by identical stop sequences. Derived; rebuilt by
    /// `GTFS::regroup_variants` whenever trips or their stop times change.
    pub variants: Vec<RouteVariant>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum RouteType {
    Tram = 0,
    Subway = 1,
    Rail = 2,
    Bus = 3,
    Ferry = 4,
    CableTram = 5,
    AerialLift = 6,
    Funicular = 7,
    Trolleybus = 11,
    Monorail = 12,
}

/// All trips of one route that visit the exact same ordered list of stops. Editing tools treat a
/// variant as one unit; bulk edits fan out to its trips.
#[derive(Clone, Serialize, Deserialize)]
pub struct RouteVariant {
    pub route_id: RouteID,
    pub variant_id: RouteVariantID,
    pub stops: Vec<StopID>,
    /// Sorted by first arrival time, ties by original trip ID
    pub trips: Vec<TripID>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RouteVariantID(pub usize);

impl Route {
    pub fn describe(&self) -> String {
        let name = self
            .short_name
            .as_ref()
            .or(self.long_name.as_ref())
            .map(|x| x.to_string())
            .unwrap_or_else(|| format!("{:?}", self.route_id));
        format!("{name} ({:?})", self.route_type)
    }
}

impl RouteVariant {
    pub fn describe(&self, route: &Route) -> String {
        format!(
            "{} {:?} - {} stops, {} trips",
            route.describe(),
            self.variant_id,
            self.stops.len(),
            self.trips.len()
        )
    }
}

pub fn load<R: std::io::Read>(reader: R) -> Result<BTreeMap<RouteID, Route>> {
    let mut routes = BTreeMap::new();
    for rec in csv::Reader::from_reader(reader).deserialize() {
        let rec: Record = rec?;
        if routes.contains_key(&rec.route_id) {
            bail!("Duplicate {:?}", rec.route_id);
        }
        routes.insert(
            rec.route_id.clone(),
            Route {
                route_id: rec.route_id,
                route_type: rec.route_type,
                short_name: rec.route_short_name,
                long_name: rec.route_long_name,

                variants: Vec::new(),
            },
        );
    }
    Ok(routes)
}

#[derive(Deserialize)]
struct Record {
    route_id: RouteID,
    route_type: RouteType,
    route_short_name: Option<String>,
    route_long_name: Option<String>,
}
