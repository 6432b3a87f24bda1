//! Chevrolet configurator pipeline
//!
//! Seven levels: a session warm-up against the configurator page, the JSON
//! catalogue, the body/drive enumeration (two payload shapes, see
//! [`body_drive_stage`]), the trims map, then three rendered DOM pages for
//! exterior colors, interior colors, and option packages.

use crate::config::SiteEntry;
use crate::engine::{Branch, FetchResponse, SitePipeline, Stage, StageOutcome, StageRequest};
use crate::record::VehicleRecord;
use crate::sites::common::{
    price_from, require, scrape_packages, scrape_swatches, split_body_description,
    value_string, PackageSelectors, SwatchSelectors,
};
use crate::{StageError, StageResult};
use serde_json::{json, Value};
use std::collections::HashMap;

const BASE: &str = "https://www.chevrolet.com";
const CONFIGURATOR_URL: &str = "https://www.chevrolet.com/shopping/configurator";
const CATALOGUE_URL: &str =
    "https://www.chevrolet.com/chevrolet/shopping/api/aec-cp-configurator-gateway/p/v1/catalogue";
const LINE_URL: &str =
    "https://www.chevrolet.com/chevrolet/shopping/api/aec-cp-configurator-gateway/p/v1/line";
const TRIM_URL: &str =
    "https://www.chevrolet.com/chevrolet/shopping/api/aec-cp-configurator-gateway/p/v1/trim";

const DEFAULT_ZIP: &str = "48243";
const DEFAULT_RADIUS: u32 = 250;

const COLOR_PRIMARY: SwatchSelectors = SwatchSelectors {
    container: "div.configurator-options-container div.configurator-option",
    name: "p.configurator-option-title",
    price: "div.swatch-pricing",
    image: Some("div.product-image img"),
};

const COLOR_FALLBACK: SwatchSelectors = SwatchSelectors {
    container: "div[class*='options'] div[class*='option']",
    name: "p[class*='title']",
    price: "div[class*='pricing']",
    image: None,
};

const PACKAGE_PRIMARY: PackageSelectors = PackageSelectors {
    container: "#packages_options div.package-grid-item",
    title: "h6",
    price: "p.package-card-pricing",
    options: Some("ul li div"),
};

const PACKAGE_FALLBACK: PackageSelectors = PackageSelectors {
    container: "div[class*='options']",
    title: "h6",
    price: "p[class*='pricing']",
    options: None,
};

/// Gateway identity headers sent with every API request
fn api_headers() -> Vec<(String, String)> {
    [
        ("Dealerid", "0"),
        ("Oemid", "GM"),
        ("Programid", "CHEVROLET"),
        ("Tenantid", "0"),
        ("Accept", "application/json, text/plain, */*"),
        ("Origin", BASE),
        ("Referer", CONFIGURATOR_URL),
    ]
    .iter()
    .map(|(n, v)| (n.to_string(), v.to_string()))
    .collect()
}

fn with_api_headers(mut request: StageRequest) -> StageRequest {
    for (name, value) in api_headers() {
        request = request.header(name, value);
    }
    request
}

/// Builds the Chevrolet pipeline from its site entry
pub fn pipeline(site: &SiteEntry) -> SitePipeline {
    let zip = site
        .zip_code
        .clone()
        .unwrap_or_else(|| DEFAULT_ZIP.to_string());
    let radius = site.search_radius.unwrap_or(DEFAULT_RADIUS);
    let excluded = site.excluded_body_types.clone();
    let defaults = site.defaults.clone();

    // One owned copy of the zip per stage closure
    let catalog_zip = zip.clone();
    let body_drive_zip = zip.clone();
    let trim_zip = zip.clone();
    let exterior_zip = zip.clone();
    let interior_zip = zip;

    SitePipeline {
        site: site.name.clone(),
        seeds: vec![Branch::new(
            with_api_headers(StageRequest::get(CONFIGURATOR_URL)),
            VehicleRecord::seeded("Chevrolet"),
        )],
        stages: vec![
            Stage::new("session", session_stage),
            Stage::new("catalog", move |response, record| {
                catalog_stage(response, record, &excluded, &catalog_zip)
            }),
            Stage::new("body_drive", move |response, record| {
                body_drive_stage(response, record, &body_drive_zip)
            }),
            Stage::new("trim", move |response, record| {
                trim_stage(response, record, &trim_zip, radius)
            }),
            Stage::new("exterior_colors", move |response, record| {
                exterior_stage(response, record, &exterior_zip, radius)
            }),
            Stage::new("interior_colors", move |response, record| {
                interior_stage(response, record, &interior_zip, radius)
            }),
            Stage::new("packages", move |response, record| {
                packages_stage(response, record, &defaults)
            }),
        ],
        required_fields: vec!["make", "model", "year", "trim"],
    }
}

/// The configurator page response is only needed for its cookies; the stage
/// immediately forks the catalogue request
fn session_stage(_response: &FetchResponse, record: &VehicleRecord) -> StageResult {
    let payload = json!({
        "make": "chevrolet",
        "yearFilter": ["2026", "2025", "2024"],
        "quickFilter": ["ELECTRIC", "SUV", "TRUCK", "CAR", "PERFORMANCE"],
    });

    Ok(StageOutcome::Fork(vec![Branch::new(
        with_api_headers(StageRequest::post_json(CATALOGUE_URL, &payload)),
        record.clone(),
    )]))
}

/// Splits the catalogue into per-model-per-year branches
///
/// Catalogue entries whose body type is on the site's exclusion list are
/// dropped before the model fan-out.
fn catalog_stage(
    response: &FetchResponse,
    record: &VehicleRecord,
    excluded: &[String],
    zip: &str,
) -> StageResult {
    let parsed: Value = serde_json::from_str(&response.body)?;
    let catalogue = require(&parsed, "data.catalogue")?
        .as_array()
        .ok_or_else(|| StageError::ShapeMismatch("catalogue is not a list".to_string()))?;

    let mut branches = Vec::new();
    for catalog in catalogue {
        let body_type = catalog.get("bodyType").and_then(value_string);
        if body_type
            .as_deref()
            .is_some_and(|b| excluded.iter().any(|e| e == b))
        {
            continue;
        }

        let models = catalog
            .get("models")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for model in models {
            let years = model
                .get("years")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            for year in years {
                let mut child = record.clone();
                if let Some(make) = year.get("make").and_then(value_string) {
                    child.make = Some(make);
                }
                child.model_display_name = year.get("displayName").and_then(value_string);
                child.model = year.get("model").and_then(value_string);
                child.year = year.get("year").and_then(value_string);
                child.body_type = year.get("bodyType").and_then(value_string);
                child.msrp = year.get("msrp").and_then(price_from);
                child.image = year.get("largeImage").and_then(value_string);
                child.body_style = year.get("bodyStyle").and_then(value_string);

                let payload = json!({
                    "make": "chevrolet",
                    "model": year.get("model").cloned().unwrap_or(Value::Null),
                    "bodyStyle": year.get("bodyStyle").cloned().unwrap_or(Value::Null),
                    "year": year.get("year").cloned().unwrap_or(Value::Null),
                    "zipCode": zip,
                });

                // Models still on the line flow use the line endpoint; the
                // rest go straight to the trim endpoint. Both answer with a
                // body/drive enumeration.
                let uses_line_flow = year
                    .get("navigation")
                    .and_then(|n| n.get(0))
                    .and_then(|n| n.get("key"))
                    .and_then(Value::as_str)
                    == Some("config");
                let url = if uses_line_flow { LINE_URL } else { TRIM_URL };

                branches.push(Branch::new(
                    with_api_headers(StageRequest::post_json(url, &payload)),
                    child,
                ));
            }
        }
    }

    if branches.is_empty() {
        return Ok(StageOutcome::skip("catalogue lists no eligible models"));
    }
    Ok(StageOutcome::Fork(branches))
}

/// Enumerates body style x drive type combinations
///
/// The gateway answers in one of two shapes: the line flow's `data.bodyTypes`
/// list or the trim flow's `data.trimOptions.bodyType.options` list. Both
/// carry a free-text description that is either a single body-type label or
/// a "cab, bed" pair; the split sets the matching record fields only.
fn body_drive_stage(response: &FetchResponse, record: &VehicleRecord, zip: &str) -> StageResult {
    let parsed: Value = serde_json::from_str(&response.body)?;
    let data = require(&parsed, "data")?;

    let mut branches = Vec::new();

    if let Some(body_types) = data.get("bodyTypes") {
        for body_type in body_types.as_array().map(Vec::as_slice).unwrap_or_default() {
            let drives = body_type
                .get("driveTypes")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            for drive in drives {
                let mut child = record.clone();
                apply_description(body_type, &mut child);
                child.drive_type = drive.get("driveType").and_then(value_string);
                child.image = body_type
                    .get("imageUrl")
                    .and_then(value_string)
                    .or(child.image);
                if let Some(msrp) = body_type.get("msrp").and_then(|m| price_from(m)) {
                    child.msrp = Some(msrp);
                }

                branches.push(trim_request(&child, body_type.get("id"), zip));
            }
        }
    } else if let Some(options) = data
        .get("trimOptions")
        .and_then(|t| t.get("bodyType"))
        .and_then(|b| b.get("options"))
    {
        for body_type in options.as_array().map(Vec::as_slice).unwrap_or_default() {
            let drives = body_type
                .get("driveType")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            for drive in drives {
                let mut child = record.clone();
                apply_description(body_type, &mut child);
                child.drive_type = drive.get("id").and_then(value_string);

                branches.push(trim_request(&child, body_type.get("bodyTypeID"), zip));
            }
        }
    } else if data.get("trimOptions").is_some() {
        // Known shape, no body-type options for this model-year
        return Ok(StageOutcome::skip("no body/drive options"));
    } else {
        return Err(StageError::ShapeMismatch(
            "neither bodyTypes nor trimOptions present".to_string(),
        ));
    }

    if branches.is_empty() {
        return Ok(StageOutcome::skip("no body/drive options"));
    }
    Ok(StageOutcome::Fork(branches))
}

fn apply_description(body_type: &Value, record: &mut VehicleRecord) {
    if let Some(description) = body_type.get("description").and_then(value_string) {
        split_body_description(&description).apply(record);
    }
}

fn trim_request(record: &VehicleRecord, body_type_id: Option<&Value>, zip: &str) -> Branch {
    let payload = json!({
        "make": record.make.as_deref().unwrap_or("chevrolet"),
        "model": record.model,
        "bodyStyle": record.body_style,
        "year": record.year,
        "zipCode": zip,
        "driveTypeId": record.drive_type,
        "bodyTypeId": body_type_id.cloned().unwrap_or(Value::Null),
    });

    Branch::new(
        with_api_headers(StageRequest::post_json(TRIM_URL, &payload)),
        record.clone(),
    )
}

/// Fans out over the trims map, one rendered exterior-page branch per trim
fn trim_stage(
    response: &FetchResponse,
    record: &VehicleRecord,
    zip: &str,
    radius: u32,
) -> StageResult {
    let parsed: Value = serde_json::from_str(&response.body)?;
    let trims = require(&parsed, "data.trims")?
        .as_object()
        .ok_or_else(|| StageError::ShapeMismatch("trims is not a map".to_string()))?;

    let mut branches = Vec::new();
    for trim in trims.values() {
        let mut child = record.clone();
        child.image = trim.get("imageUrl").and_then(value_string).or(child.image);
        child.trim = trim.get("name").and_then(value_string);
        if let Some(msrp) = trim.get("msrp").and_then(|m| price_from(m)) {
            child.msrp = Some(msrp);
        }

        let url = configurator_page_url(&child, "exterior", zip, radius);
        branches.push(Branch::new(
            with_api_headers(StageRequest::get(url).rendered()),
            child,
        ));
    }

    if branches.is_empty() {
        return Ok(StageOutcome::skip("no trims listed"));
    }
    Ok(StageOutcome::Fork(branches))
}

fn configurator_page_url(record: &VehicleRecord, page: &str, zip: &str, radius: u32) -> String {
    format!(
        "{}/shopping/configurator/{}/{}/{}/{}/{}?buildCode=&radius={}&zipCode={}",
        BASE,
        record.body_type.as_deref().unwrap_or_default(),
        record.year.as_deref().unwrap_or_default(),
        record.model.as_deref().unwrap_or_default(),
        record.body_style.as_deref().unwrap_or_default(),
        page,
        radius,
        zip
    )
}

fn exterior_stage(
    response: &FetchResponse,
    record: &VehicleRecord,
    zip: &str,
    radius: u32,
) -> StageResult {
    let mut child = record.clone();
    child.exterior_colors = scrape_swatches(&response.body, &COLOR_PRIMARY, &COLOR_FALLBACK)?;

    let url = configurator_page_url(&child, "interior", zip, radius);
    Ok(StageOutcome::Fork(vec![Branch::new(
        with_api_headers(StageRequest::get(url).rendered()),
        child,
    )]))
}

fn interior_stage(
    response: &FetchResponse,
    record: &VehicleRecord,
    zip: &str,
    radius: u32,
) -> StageResult {
    let mut child = record.clone();
    child.interior_colors = scrape_swatches(&response.body, &COLOR_PRIMARY, &COLOR_FALLBACK)?;

    let url = configurator_page_url(&child, "options", zip, radius);
    Ok(StageOutcome::Fork(vec![Branch::new(
        with_api_headers(StageRequest::get(url).rendered()),
        child,
    )]))
}

/// Terminal stage: option packages, then the record is complete
fn packages_stage(
    response: &FetchResponse,
    record: &VehicleRecord,
    defaults: &HashMap<String, String>,
) -> StageResult {
    let mut child = record.clone();
    child.packages = scrape_packages(&response.body, &PACKAGE_PRIMARY, &PACKAGE_FALLBACK)?;

    for (field, value) in defaults {
        child.apply_default(field, value);
    }

    Ok(StageOutcome::emit_one(child))
}
