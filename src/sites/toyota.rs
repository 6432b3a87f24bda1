//! Toyota configurator pipeline
//!
//! Three GraphQL levels against the configurator orchestrator: the series
//! index, the grade/trim enumeration, and the per-grade configuration with
//! colors and packages. Every level posts to the same endpoint with a
//! different query.

use crate::config::SiteEntry;
use crate::engine::{Branch, FetchResponse, SitePipeline, Stage, StageOutcome, StageRequest};
use crate::record::{ColorOption, PackageOption, VehicleRecord};
use crate::sites::common::{price_from, require, value_string};
use crate::{StageError, StageResult};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};

const GRAPHQL_URL: &str = "https://orchestrator.configurator.toyota.com/graphql";
const DEFAULT_ZIP: &str = "33444";

const SERIES_QUERY: &str = "query GetSeries($brand: Brand!, $language: Language, $region: Region!) { \
    getSeries(brand: $brand, language: $language, region: $region) { \
    seriesData { id name yearSpecificData { year } } } }";

const TRIMS_QUERY: &str = "query GetSeries($brand: Brand!, $language: Language, $region: Region!, $seriesId: String, $year: Int) { \
    getSeries(brand: $brand, language: $language, region: $region, seriesId: $seriesId, year: $year) { \
    seriesData { id name yearSpecificData { year grades { gradeName image { url } \
    trims { code fuelType cabBed { label bedLength } msrp { value } defaultConfig { msrp { value } } \
    powertrain { drive { value } transmission { value } } } } } } } }";

const CONFIG_QUERY: &str = "query GetConfigByGrade($configInputGrade: ConfigInputGrade!) { \
    getConfigByGrade(configInputGrade: $configInputGrade) { \
    categories { value } \
    exteriorColors { title hexCode msrp { value } } \
    interiorColors { name hexCode msrp { value } } \
    grade { trims { code cabBed { bedLength } powertrain { drive { value } } packageIds { id msrp { value } } } } \
    packages { id title description msrp { value } } } }";

fn graphql_request(query: &str, variables: Value) -> StageRequest {
    StageRequest::post_json(GRAPHQL_URL, &json!({"query": query, "variables": variables}))
}

fn region(zip: &str) -> Value {
    json!({"zipCode": zip})
}

/// Builds the Toyota pipeline from its site entry
pub fn pipeline(site: &SiteEntry) -> SitePipeline {
    let zip = site
        .zip_code
        .clone()
        .unwrap_or_else(|| DEFAULT_ZIP.to_string());
    let defaults = site.defaults.clone();

    let trims_zip = zip.clone();
    let grades_zip = zip.clone();
    let seed_zip = zip;

    SitePipeline {
        site: site.name.clone(),
        seeds: vec![Branch::new(
            graphql_request(
                SERIES_QUERY,
                json!({"brand": "TOYOTA", "language": "EN", "region": region(&seed_zip)}),
            ),
            VehicleRecord::seeded("Toyota"),
        )],
        stages: vec![
            Stage::new("series", move |response, record| {
                series_stage(response, record, &trims_zip)
            }),
            Stage::new("grades", move |response, record| {
                grades_stage(response, record, &grades_zip)
            }),
            Stage::new("config", move |response, record| {
                config_stage(response, record, &defaults)
            }),
        ],
        required_fields: vec!["make", "model", "year", "trim"],
    }
}

/// Forks one branch per series-year
fn series_stage(response: &FetchResponse, record: &VehicleRecord, zip: &str) -> StageResult {
    let parsed: Value = serde_json::from_str(&response.body)?;
    let series = require(&parsed, "data.getSeries.seriesData")?
        .as_array()
        .ok_or_else(|| StageError::ShapeMismatch("seriesData is not a list".to_string()))?;

    let mut branches = Vec::new();
    for model in series {
        let years = model
            .get("yearSpecificData")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for year in years {
            let mut child = record.clone();
            child.model = model.get("name").and_then(value_string);
            child.year = year.get("year").and_then(value_string);

            let variables = json!({
                "brand": "TOYOTA",
                "language": "EN",
                "region": region(zip),
                "seriesId": model.get("id").cloned().unwrap_or(Value::Null),
                "year": year.get("year").cloned().unwrap_or(Value::Null),
            });
            branches.push(Branch::new(graphql_request(TRIMS_QUERY, variables), child));
        }
    }

    if branches.is_empty() {
        return Ok(StageOutcome::skip("series index is empty"));
    }
    Ok(StageOutcome::Fork(branches))
}

/// Forks one branch per unique grade/trim configuration
///
/// The same grade appears once per trim row, and trim rows repeat across
/// color-only variants, so configurations are deduplicated by the
/// (grade, code, bed, drive) identity before forking.
fn grades_stage(response: &FetchResponse, record: &VehicleRecord, zip: &str) -> StageResult {
    let parsed: Value = serde_json::from_str(&response.body)?;
    let series = require(&parsed, "data.getSeries.seriesData")?
        .as_array()
        .ok_or_else(|| StageError::ShapeMismatch("seriesData is not a list".to_string()))?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut branches = Vec::new();

    for series_data in series {
        let series_id = series_data.get("id").cloned().unwrap_or(Value::Null);

        let years = series_data
            .get("yearSpecificData")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for year_data in years {
            let grades = year_data
                .get("grades")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            for grade in grades {
                let grade_name = grade
                    .get("gradeName")
                    .and_then(value_string)
                    .unwrap_or_default();
                let grade_image = grade
                    .get("image")
                    .and_then(|i| i.get("url"))
                    .and_then(value_string);

                let trims = grade
                    .get("trims")
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default();

                for trim in trims {
                    let code = trim.get("code").and_then(value_string).unwrap_or_default();
                    let cab_bed = trim.get("cabBed").filter(|c| !c.is_null());
                    let bed_length = cab_bed
                        .and_then(|c| c.get("bedLength"))
                        .and_then(value_string)
                        .unwrap_or_default();
                    let powertrain = trim.get("powertrain").filter(|p| !p.is_null());
                    let drive = powertrain
                        .and_then(|p| p.get("drive"))
                        .and_then(|d| d.get("value"))
                        .and_then(value_string)
                        .unwrap_or_default();

                    let identity =
                        format!("{}_{}_{}_{}", grade_name, code, bed_length, drive);
                    if !seen.insert(identity) {
                        continue;
                    }

                    let mut child = record.clone();
                    child.trim = Some(grade_name.clone());
                    child.image = grade_image.clone().or(child.image);

                    if let Some(cab_bed) = cab_bed {
                        child.bed_length = Some(bed_length.clone());
                        child.cab_type = cab_bed.get("label").and_then(value_string);
                    }
                    if let Some(powertrain) = powertrain {
                        if !drive.is_empty() {
                            child.drive_type = Some(drive.clone());
                        }
                        child.transmission_type = powertrain
                            .get("transmission")
                            .and_then(|t| t.get("value"))
                            .and_then(value_string);
                    }
                    child.fuel_type = trim.get("fuelType").and_then(value_string);

                    // Trim MSRP, falling back to its default configuration
                    child.msrp = trim
                        .get("msrp")
                        .and_then(|m| price_from(m))
                        .or_else(|| {
                            trim.get("defaultConfig")
                                .and_then(|d| d.get("msrp"))
                                .and_then(|m| price_from(m))
                        })
                        .or(child.msrp);

                    let variables = json!({
                        "configInputGrade": {
                            "brand": "TOYOTA",
                            "language": "EN",
                            "region": region(zip),
                            "seriesId": series_id.clone(),
                            "year": year_data.get("year").cloned().unwrap_or(Value::Null),
                            "gradeName": grade_name.clone(),
                        }
                    });
                    branches.push(Branch::new(graphql_request(CONFIG_QUERY, variables), child));
                }
            }
        }
    }

    if branches.is_empty() {
        return Ok(StageOutcome::skip("no grades listed for this series-year"));
    }
    Ok(StageOutcome::Fork(branches))
}

/// Terminal stage: colors, body type, and packages from the per-grade config
fn config_stage(
    response: &FetchResponse,
    record: &VehicleRecord,
    defaults: &HashMap<String, String>,
) -> StageResult {
    let parsed: Value = serde_json::from_str(&response.body)?;
    let config = require(&parsed, "data.getConfigByGrade")?;

    let mut child = record.clone();
    child.exterior_colors = colors_from(config.get("exteriorColors"), "title");
    child.interior_colors = colors_from(config.get("interiorColors"), "name");

    if child.body_type.is_none() {
        child.body_type = config
            .get("categories")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("value"))
            .and_then(value_string);
    }

    child.packages = packages_from(config, &child);

    for (field, value) in defaults {
        child.apply_default(field, value);
    }

    Ok(StageOutcome::emit_one(child))
}

/// Reads a color list; the exterior list names swatches `title`, the
/// interior list `name`
fn colors_from(list: Option<&Value>, name_key: &str) -> Vec<ColorOption> {
    let entries = list
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    entries
        .iter()
        .map(|color| ColorOption {
            name: color.get(name_key).and_then(value_string).unwrap_or_default(),
            price: color
                .get("msrp")
                .and_then(|m| price_from(m))
                .unwrap_or_default(),
            image: None,
            hex: color
                .get("hexCode")
                .and_then(|h| h.get(0))
                .and_then(value_string),
        })
        .collect()
}

/// Resolves packages for the branch's configuration
///
/// Prefers the package ids of the grade trim row matching this branch's bed
/// length and drive type, resolved against the package catalog for titles
/// and descriptions. When no trim row matches (or it lists no packages),
/// the general package catalog is used as-is.
fn packages_from(config: &Value, record: &VehicleRecord) -> Vec<PackageOption> {
    let catalog = config
        .get("packages")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let trims = config
        .get("grade")
        .and_then(|g| g.get("trims"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let bed = record.bed_length.as_deref().unwrap_or_default();
    let drive = record.drive_type.as_deref().unwrap_or_default();

    let matching_trim = trims.iter().find(|trim| {
        let trim_bed = trim
            .get("cabBed")
            .and_then(|c| c.get("bedLength"))
            .and_then(value_string)
            .unwrap_or_default();
        let trim_drive = trim
            .get("powertrain")
            .and_then(|p| p.get("drive"))
            .and_then(|d| d.get("value"))
            .and_then(value_string)
            .unwrap_or_default();
        trim_bed == bed && trim_drive == drive
    });

    let mut packages = Vec::new();
    if let Some(trim) = matching_trim {
        let ids = trim
            .get("packageIds")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for entry in ids {
            let Some(id) = entry.get("id").and_then(value_string) else {
                continue;
            };
            let price = entry
                .get("msrp")
                .and_then(|m| price_from(m))
                .unwrap_or_default();

            if let Some(details) = catalog
                .iter()
                .find(|pkg| pkg.get("id").and_then(value_string).as_deref() == Some(&id))
            {
                packages.push(PackageOption {
                    id: Some(id),
                    title: details
                        .get("title")
                        .and_then(value_string)
                        .unwrap_or_default(),
                    price,
                    description: details.get("description").and_then(value_string),
                    options: Vec::new(),
                });
            }
        }
    }

    if packages.is_empty() {
        for pkg in catalog {
            let Some(id) = pkg.get("id").and_then(value_string) else {
                continue;
            };
            packages.push(PackageOption {
                id: Some(id),
                title: pkg.get("title").and_then(value_string).unwrap_or_default(),
                price: pkg
                    .get("msrp")
                    .and_then(|m| price_from(m))
                    .unwrap_or_default(),
                description: pkg.get("description").and_then(value_string),
                options: Vec::new(),
            });
        }
    }

    packages
}
