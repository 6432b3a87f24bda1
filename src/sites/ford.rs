//! Ford nameplate pipeline
//!
//! Ford's shop surface is rendered client-side, but the nameplate index it
//! renders from is a JavaScript asset with the active-nameplates object
//! assigned inline. Two warm-up hops establish the session the asset
//! endpoint expects, then the script stage mines the object and emits one
//! record per nameplate-year.

use crate::config::SiteEntry;
use crate::engine::{Branch, FetchResponse, SitePipeline, Stage, StageOutcome, StageRequest};
use crate::record::VehicleRecord;
use crate::sites::common::{extract_script_object, price_from, value_string};
use crate::StageResult;
use serde_json::Value;
use std::collections::HashMap;

const HOME_URL: &str = "https://www.ford.com/";
const SHOWROOM_URL: &str = "https://shop.ford.com/showroom/?gnav=header-shop-bp&linktype=build#/";
const NAMEPLATES_URL: &str = "https://www.ford.com/fps/script/Ford/USA";
const NAMEPLATES_VAR: &str = "vdmActiveNameplates";

fn browser_headers() -> Vec<(String, String)> {
    [
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
        ("Accept-Language", "en-US,en;q=0.5"),
        ("Referer", HOME_URL),
    ]
    .iter()
    .map(|(n, v)| (n.to_string(), v.to_string()))
    .collect()
}

fn browser_get(url: &str) -> StageRequest {
    let mut request = StageRequest::get(url);
    for (name, value) in browser_headers() {
        request = request.header(name, value);
    }
    request
}

/// Builds the Ford pipeline from its site entry
pub fn pipeline(site: &SiteEntry) -> SitePipeline {
    let defaults = site.defaults.clone();

    SitePipeline {
        site: site.name.clone(),
        seeds: vec![Branch::new(
            browser_get(HOME_URL),
            VehicleRecord::seeded("Ford"),
        )],
        stages: vec![
            Stage::new("homepage", |_, record| {
                Ok(StageOutcome::Fork(vec![Branch::new(
                    browser_get(SHOWROOM_URL),
                    record.clone(),
                )]))
            }),
            Stage::new("showroom", |_, record| {
                Ok(StageOutcome::Fork(vec![Branch::new(
                    browser_get(NAMEPLATES_URL),
                    record.clone(),
                )]))
            }),
            Stage::new("nameplates", move |response, record| {
                nameplates_stage(response, record, &defaults)
            }),
        ],
        required_fields: vec!["make", "model"],
    }
}

/// Terminal stage: mines the nameplate object and emits per nameplate-year
fn nameplates_stage(
    response: &FetchResponse,
    record: &VehicleRecord,
    defaults: &HashMap<String, String>,
) -> StageResult {
    let nameplates = extract_script_object(&response.body, NAMEPLATES_VAR)?;
    let entries = match nameplates.as_object() {
        Some(map) if !map.is_empty() => map,
        _ => return Ok(StageOutcome::skip("nameplate index is empty")),
    };

    let mut records = Vec::new();
    for (name, entry) in entries {
        for year in entry_years(entry) {
            let mut child = record.clone();
            child.model = Some(name.clone());
            child.year = year;
            child.model_display_name = entry.get("displayName").and_then(value_string);
            child.body_type = entry.get("bodyType").and_then(value_string);
            child.msrp = entry.get("msrp").and_then(|m| price_from(m));
            child.image = entry.get("imageUrl").and_then(value_string);

            for (field, value) in defaults {
                child.apply_default(field, value);
            }
            records.push(child);
        }
    }

    Ok(StageOutcome::Emit(records))
}

/// Years a nameplate entry covers: a `years` list, a single `year`, or
/// neither (one record with the year left unset)
fn entry_years(entry: &Value) -> Vec<Option<String>> {
    if let Some(years) = entry.get("years").and_then(Value::as_array) {
        let listed: Vec<Option<String>> = years.iter().map(|y| value_string(y)).collect();
        if !listed.is_empty() {
            return listed;
        }
    }

    vec![entry.get("year").and_then(value_string)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StageError;

    fn create_test_site() -> SiteEntry {
        SiteEntry::named("ford")
    }

    fn response(body: &str) -> FetchResponse {
        FetchResponse::new(NAMEPLATES_URL, 200, body)
    }

    fn run_stage(depth: usize, body: &str, record: &VehicleRecord) -> StageResult {
        pipeline(&create_test_site())
            .stage(depth)
            .expect("stage exists")
            .run(&response(body), record)
    }

    #[test]
    fn test_warmup_chain() {
        let record = VehicleRecord::seeded("Ford");

        let outcome = run_stage(0, "<html></html>", &record).unwrap();
        let branches = match outcome {
            StageOutcome::Fork(branches) => branches,
            other => panic!("expected Fork, got {:?}", other),
        };
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].request.url, SHOWROOM_URL);

        let outcome = run_stage(1, "<html></html>", &record).unwrap();
        let branches = match outcome {
            StageOutcome::Fork(branches) => branches,
            other => panic!("expected Fork, got {:?}", other),
        };
        assert_eq!(branches[0].request.url, NAMEPLATES_URL);
    }

    #[test]
    fn test_nameplates_emit_per_year() {
        let js = r#"
            window.fps = {};
            var vdmActiveNameplates = {
                "F-150": {"displayName": "F-150", "years": [2024, 2025], "msrp": 38810},
                "Bronco": {"year": 2025, "imageUrl": "https://img.example/bronco.png"}
            };
        "#;

        let outcome = run_stage(2, js, &VehicleRecord::seeded("Ford")).unwrap();
        let records = match outcome {
            StageOutcome::Emit(records) => records,
            other => panic!("expected Emit, got {:?}", other),
        };

        assert_eq!(records.len(), 3);

        let f150: Vec<_> = records
            .iter()
            .filter(|r| r.model.as_deref() == Some("F-150"))
            .collect();
        assert_eq!(f150.len(), 2);
        assert_eq!(f150[0].year.as_deref(), Some("2024"));
        assert_eq!(f150[0].msrp.as_deref(), Some("38810"));
        assert_eq!(f150[0].make.as_deref(), Some("Ford"));

        let bronco = records
            .iter()
            .find(|r| r.model.as_deref() == Some("Bronco"))
            .unwrap();
        assert_eq!(bronco.year.as_deref(), Some("2025"));
        assert_eq!(bronco.image.as_deref(), Some("https://img.example/bronco.png"));
    }

    #[test]
    fn test_nameplates_missing_var_fails() {
        let result = run_stage(2, "var other = {};", &VehicleRecord::seeded("Ford"));
        assert!(matches!(result, Err(StageError::ScriptVar(_))));
    }

    #[test]
    fn test_nameplates_empty_object_skips() {
        let outcome = run_stage(
            2,
            "var vdmActiveNameplates = {};",
            &VehicleRecord::seeded("Ford"),
        )
        .unwrap();
        assert!(matches!(outcome, StageOutcome::Skip { .. }));
    }
}
