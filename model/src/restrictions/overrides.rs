use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use gtfs::{orig, StopID, TripID, GTFS};

use super::{RestrictionMode, RestrictionStore, Rule};

/// What happened to each entry of an imported overrides artifact. Nothing here aborts an
/// import; entries that can't be matched to the loaded feed are dropped and tallied for the
/// caller to surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImportCounts {
    pub matched: usize,
    pub trip_not_found: usize,
    pub stop_not_found_in_key: usize,
    pub stop_not_on_trip: usize,
}

/// Merge an overrides artifact into the store. The artifact is JSON, in either of the shapes
/// older exports produced: an object keyed by composite "trip<delim>stop" strings, or an array
/// of explicit records. Only a top-level parse failure is an error; everything below that is
/// per-entry and fail-open.
pub fn import_overrides(
    gtfs: &GTFS,
    store: &mut RestrictionStore,
    raw: &str,
) -> Result<ImportCounts> {
    let value: Value = serde_json::from_str(raw)?;
    let mut counts = ImportCounts::default();
    let mut entries: Vec<(String, String, Value)> = Vec::new();

    match value {
        Value::Object(map) => {
            for (key, rule) in map {
                match split_composite_key(&key) {
                    Some((trip, stop)) => {
                        entries.push((trip.to_string(), stop.to_string(), rule));
                    }
                    None => {
                        warn!("Overrides key {key:?} has no recognizable stop part");
                        counts.stop_not_found_in_key += 1;
                    }
                }
            }
        }
        Value::Array(list) => {
            for rec in list {
                let trip = rec.get("trip_id").and_then(Value::as_str).map(str::to_string);
                let stop = rec.get("stop_id").and_then(Value::as_str).map(str::to_string);
                match (trip, stop) {
                    (Some(trip), Some(stop)) => entries.push((trip, stop, rec)),
                    (None, _) => counts.trip_not_found += 1,
                    (_, None) => counts.stop_not_found_in_key += 1,
                }
            }
        }
        _ => bail!("Overrides artifact must be a JSON object or array"),
    }

    for (trip_name, stop_name, raw_rule) in entries {
        let trip_id = match gtfs.trip_ids.get(&orig::TripID::new(trip_name.as_str())) {
            Some(x) => x,
            None => {
                counts.trip_not_found += 1;
                continue;
            }
        };
        let trip = &gtfs.trips[&trip_id];
        // The stop has to actually be on this trip; a global match isn't enough
        let stop_id = gtfs
            .stop_ids
            .get(&orig::StopID::new(stop_name.as_str()))
            .filter(|x| trip.position_of(*x).is_some());
        let stop_id = match stop_id {
            Some(x) => x,
            None => {
                counts.stop_not_on_trip += 1;
                continue;
            }
        };
        store.set_rule(trip, stop_id, rule_from_value(gtfs, &raw_rule));
        counts.matched += 1;
    }

    info!(
        "Imported overrides: {} matched, {} unknown trip, {} unparsable key, {} stop not on trip",
        counts.matched, counts.trip_not_found, counts.stop_not_found_in_key, counts.stop_not_on_trip
    );
    Ok(counts)
}

/// Write the store back out in the canonical shape: an array of explicit records, stops and
/// trips by their feed IDs.
pub fn export_overrides(gtfs: &GTFS, store: &RestrictionStore) -> Result<String> {
    let mut trip_names: BTreeMap<TripID, &orig::TripID> = BTreeMap::new();
    for (orig_id, cheap) in gtfs.trip_ids.borrow() {
        trip_names.insert(*cheap, orig_id);
    }
    let mut stop_names: BTreeMap<StopID, &orig::StopID> = BTreeMap::new();
    for (orig_id, cheap) in gtfs.stop_ids.borrow() {
        stop_names.insert(*cheap, orig_id);
    }

    let mut records = Vec::new();
    for ((trip_id, stop_id), rule) in store.iter() {
        records.push(Record {
            trip_id: trip_names[trip_id].as_str(),
            stop_id: stop_names[stop_id].as_str(),
            mode: rule.mode.as_str(),
            dropoff_only_from: rule
                .dropoff_only_from
                .iter()
                .map(|x| stop_names[x].as_str())
                .collect(),
            pickup_only_to: rule
                .pickup_only_to
                .iter()
                .map(|x| stop_names[x].as_str())
                .collect(),
        });
    }
    Ok(serde_json::to_string_pretty(&records)?)
}

#[derive(Serialize)]
struct Record<'a> {
    trip_id: &'a str,
    stop_id: &'a str,
    mode: &'a str,
    #[serde(rename = "dropoffOnlyFrom", skip_serializing_if = "Vec::is_empty")]
    dropoff_only_from: Vec<&'a str>,
    #[serde(rename = "pickupOnlyTo", skip_serializing_if = "Vec::is_empty")]
    pickup_only_to: Vec<&'a str>,
}

/// Split a composite "trip<delim>stop" key. Exports from different eras used different
/// delimiters; try them in order of distinctiveness, splitting at the last occurrence since
/// trip IDs embed delimiters more often than stop IDs do. With no delimiter at all, peel a
/// trailing identifier-looking token off the end.
fn split_composite_key(key: &str) -> Option<(&str, &str)> {
    for delim in ["::", "|", "/", "\u{2014}", "\u{2013}", "-"] {
        if let Some(idx) = key.rfind(delim) {
            let trip = &key[..idx];
            let stop = &key[idx + delim.len()..];
            if !trip.is_empty() && !stop.is_empty() {
                return Some((trip, stop));
            }
        }
    }

    let is_ident = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let token_start = key
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_ident(*c))
        .last()
        .map(|(i, _)| i)?;
    let trip = key[..token_start].trim_end();
    if trip.is_empty() {
        return None;
    }
    Some((trip, &key[token_start..]))
}

fn rule_from_value(gtfs: &GTFS, value: &Value) -> Rule {
    // A malformed or missing mode reads as Normal, which clears the entry
    let mode = value
        .get("mode")
        .and_then(Value::as_str)
        .map(RestrictionMode::parse)
        .unwrap_or(RestrictionMode::Normal);
    Rule {
        mode,
        dropoff_only_from: stop_set(gtfs, value.get("dropoffOnlyFrom")),
        pickup_only_to: stop_set(gtfs, value.get("pickupOnlyTo")),
    }
}

/// Unknown stops in a membership set are dropped here; stops known to the feed but invalid for
/// the owning (trip, stop) get clamped by the store on write.
fn stop_set(gtfs: &GTFS, value: Option<&Value>) -> BTreeSet<StopID> {
    let mut result = BTreeSet::new();
    if let Some(Value::Array(list)) = value {
        for x in list {
            if let Some(stop_id) = x
                .as_str()
                .and_then(|name| gtfs.stop_ids.get(&orig::StopID::new(name)))
            {
                result.insert(stop_id);
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::super::testing::{gtfs_from, stop, trip};
    use super::*;

    fn test_gtfs() -> GTFS {
        gtfs_from(vec![
            ("t1", "r1", vec!["A", "B", "C", "D"]),
            ("t2", "r1", vec!["A", "B", "C", "D"]),
        ])
    }

    #[test]
    fn composite_keys_accept_many_delimiters() {
        assert_eq!(split_composite_key("t1::B"), Some(("t1", "B")));
        assert_eq!(split_composite_key("t1|B"), Some(("t1", "B")));
        assert_eq!(split_composite_key("t1/B"), Some(("t1", "B")));
        assert_eq!(split_composite_key("t1\u{2014}B"), Some(("t1", "B")));
        assert_eq!(split_composite_key("t1\u{2013}B"), Some(("t1", "B")));
        assert_eq!(split_composite_key("t1-B"), Some(("t1", "B")));
        // A delimiter inside the trip ID splits at the last occurrence
        assert_eq!(split_composite_key("wk-42-B"), Some(("wk-42", "B")));
        // Mixed delimiters prefer the more distinctive one
        assert_eq!(split_composite_key("wk-42::B"), Some(("wk-42", "B")));
        // No delimiter at all: peel the trailing token
        assert_eq!(split_composite_key("t1 B"), Some(("t1", "B")));
        assert_eq!(split_composite_key("B"), None);
        assert_eq!(split_composite_key(""), None);
    }

    #[test]
    fn map_shaped_import() {
        let gtfs = test_gtfs();
        let mut store = RestrictionStore::new();
        let raw = r#"{
            "t1::B": {"mode": "custom", "pickupOnlyTo": ["C", "D", "nosuchstop"]},
            "t2::B": {"mode": "pickup_only"}
        }"#;
        let counts = import_overrides(&gtfs, &mut store, raw).unwrap();
        assert_eq!(counts.matched, 2);
        assert_eq!(store.len(), 2);

        let t1 = trip(&gtfs, "t1");
        let rule = store.get_rule(t1.id, stop(&gtfs, "B"));
        assert_eq!(rule.mode, RestrictionMode::Custom);
        assert_eq!(
            rule.pickup_only_to,
            [stop(&gtfs, "C"), stop(&gtfs, "D")].into_iter().collect()
        );
    }

    #[test]
    fn array_shaped_import() {
        let gtfs = test_gtfs();
        let mut store = RestrictionStore::new();
        let raw = r#"[
            {"trip_id": "t1", "stop_id": "C", "mode": "dropoff_only"},
            {"trip_id": "t1", "stop_id": "B", "mode": "custom", "dropoffOnlyFrom": ["A"]}
        ]"#;
        let counts = import_overrides(&gtfs, &mut store, raw).unwrap();
        assert_eq!(counts.matched, 2);
        let t1 = trip(&gtfs, "t1");
        assert_eq!(
            store.get_rule(t1.id, stop(&gtfs, "C")).mode,
            RestrictionMode::DropoffOnly
        );
    }

    #[test]
    fn unmatched_entries_are_counted_not_fatal() {
        let gtfs = test_gtfs();
        let mut store = RestrictionStore::new();
        let raw = r#"{
            "ghost::B": {"mode": "pickup_only"},
            "t1::Z": {"mode": "pickup_only"},
            "::": {"mode": "pickup_only"},
            "t1::B": {"mode": "pickup_only"}
        }"#;
        let counts = import_overrides(&gtfs, &mut store, raw).unwrap();
        assert_eq!(
            counts,
            ImportCounts {
                matched: 1,
                trip_not_found: 1,
                stop_not_found_in_key: 1,
                stop_not_on_trip: 1,
            }
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn malformed_mode_reads_as_normal() {
        let gtfs = test_gtfs();
        let mut store = RestrictionStore::new();
        let raw = r#"{"t1::B": {"mode": 7}}"#;
        let counts = import_overrides(&gtfs, &mut store, raw).unwrap();
        // It matched, and applying Normal leaves no stored rule
        assert_eq!(counts.matched, 1);
        assert!(store.is_empty());
    }

    #[test]
    fn export_import_round_trips() {
        let gtfs = test_gtfs();
        let t1 = trip(&gtfs, "t1");
        let mut store = RestrictionStore::new();
        store.set_rule(t1, stop(&gtfs, "B"), Rule::simple(RestrictionMode::PickupOnly));
        store.set_rule(
            t1,
            stop(&gtfs, "C"),
            Rule::custom(
                [stop(&gtfs, "A")].into_iter().collect(),
                [stop(&gtfs, "D")].into_iter().collect(),
            ),
        );

        let exported = export_overrides(&gtfs, &store).unwrap();
        let mut reimported = RestrictionStore::new();
        let counts = import_overrides(&gtfs, &mut reimported, &exported).unwrap();
        assert_eq!(counts.matched, 2);
        assert_eq!(
            reimported.get_rule(t1.id, stop(&gtfs, "C")),
            store.get_rule(t1.id, stop(&gtfs, "C"))
        );
        assert_eq!(
            reimported.get_rule(t1.id, stop(&gtfs, "B")),
            store.get_rule(t1.id, stop(&gtfs, "B"))
        );
    }

    #[test]
    fn not_json_is_the_only_hard_error() {
        let gtfs = test_gtfs();
        let mut store = RestrictionStore::new();
        assert!(import_overrides(&gtfs, &mut store, "not json").is_err());
        assert!(import_overrides(&gtfs, &mut store, "\"a string\"").is_err());
    }
}
