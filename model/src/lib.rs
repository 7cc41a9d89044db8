#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod export;
mod restrictions;

use anyhow::Result;
use zip::ZipArchive;

use gtfs::{RouteVariantID, StopID, TripID, GTFS};

pub use export::{write_stop_times, write_trips};
pub use restrictions::{
    apply_to_trips, compile, export_overrides, import_overrides, summarize_stop, ImportCounts,
    MaterializedStopTime, MaterializedTrip, PickupDropOffType, RestrictionMode, RestrictionStore,
    Rule, RuleSummary,
};

/// The editor's working state: the feed slice being edited, and the sparse OD restriction rules
/// layered on top of it. Everything derived (variants, compiled output) is recomputed from
/// these two.
pub struct Model {
    pub gtfs: GTFS,
    pub restrictions: RestrictionStore,
}

impl Model {
    pub fn empty() -> Self {
        Self {
            gtfs: GTFS::empty(),
            restrictions: RestrictionStore::new(),
        }
    }

    pub fn load_from_zip<R: std::io::Read + std::io::Seek>(
        archive: &mut ZipArchive<R>,
    ) -> Result<Self> {
        Ok(Self {
            gtfs: GTFS::load_from_zip(archive)?,
            restrictions: RestrictionStore::new(),
        })
    }

    /// What one variant's trips show at one of its stops
    pub fn summarize_variant_stop(&self, variant: RouteVariantID, stop_id: StopID) -> RuleSummary {
        summarize_stop(
            &self.restrictions,
            &self.gtfs.variant_trips(variant),
            stop_id,
        )
    }

    /// Bulk-edit one stop's rule across a section of trips. The section is by ID, so callers
    /// can span variants.
    pub fn apply_to_section(&mut self, trips: &[TripID], stop_id: StopID, rule: Option<&Rule>) {
        let trips: Vec<&gtfs::Trip> = trips.iter().map(|t| &self.gtfs.trips[t]).collect();
        apply_to_trips(&mut self.restrictions, &trips, stop_id, rule);
    }

    pub fn compile(&self) -> Vec<MaterializedTrip> {
        compile(&self.gtfs, &self.restrictions)
    }

    pub fn import_overrides(&mut self, raw: &str) -> Result<ImportCounts> {
        import_overrides(&self.gtfs, &mut self.restrictions, raw)
    }

    pub fn export_overrides(&self) -> Result<String> {
        export_overrides(&self.gtfs, &self.restrictions)
    }
}
