//! Dealer inventory template
//!
//! Generic two-level pipeline for dealer platforms that render their new-car
//! inventory as a paginated listing with an embedded data-layer JSON array.
//! The index stage reads the pagination controls and forks one branch per
//! page; the listing stage walks the DOM item list alongside the data layer
//! and emits one record per vehicle. Seed URLs come from the site entry, so
//! one configuration covers any number of storefronts on the same platform.

use crate::config::SiteEntry;
use crate::engine::{Branch, FetchResponse, SitePipeline, Stage, StageOutcome, StageRequest};
use crate::record::{ColorOption, VehicleRecord};
use crate::sites::common::value_string;
use crate::{StageError, StageResult, TrawlError};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::HashMap;

const DATA_LAYER_START: &str = "DDC.dataLayer['vehicles'] = ";
const DATA_LAYER_END: &str = "DDC.dataLayer['confirmation']";

/// Builds a dealer pipeline from its site entry
///
/// Unlike the automaker pipelines, the seed URLs are configuration; an entry
/// without seeds is a configuration error.
pub fn pipeline(site: &SiteEntry) -> Result<SitePipeline, TrawlError> {
    if site.seeds.is_empty() {
        return Err(TrawlError::Pipeline(format!(
            "site '{}' uses the dealer template and needs at least one seed URL",
            site.name
        )));
    }

    let defaults = site.defaults.clone();

    let seeds = site
        .seeds
        .iter()
        .map(|seed| Branch::new(StageRequest::get(seed.as_str()), VehicleRecord::default()))
        .collect();

    Ok(SitePipeline {
        site: site.name.clone(),
        seeds,
        stages: vec![
            Stage::new("index", index_stage),
            Stage::new("listing", move |response, record| {
                listing_stage(response, record, &defaults)
            }),
        ],
        required_fields: vec!["make", "model", "year"],
    })
}

fn parse_selector(selector: &'static str) -> Result<Selector, StageError> {
    Selector::parse(selector).map_err(|_| StageError::Selector(selector.to_string()))
}

/// Forks one listing branch per inventory page
///
/// The pagination link carries the page count in `data-total-items` and the
/// per-page offset in its `?start=` href. Pages past the first are the same
/// URL with the offset appended; a listing without pagination is a single
/// page.
fn index_stage(response: &FetchResponse, record: &VehicleRecord) -> StageResult {
    let document = Html::parse_document(&response.body);
    let pagination = parse_selector("ul.pagination a[data-total-items]")?;

    let mut branches = vec![Branch::new(
        StageRequest::get(response.final_url.clone()),
        record.clone(),
    )];

    if let Some(link) = document.select(&pagination).next() {
        let total_pages: u32 = link
            .value()
            .attr("data-total-items")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);
        let offset: u32 = link
            .value()
            .attr("href")
            .and_then(|href| href.split("start=").nth(1))
            .and_then(|v| v.trim_matches('&').parse().ok())
            .unwrap_or(0);

        if total_pages > 1 && offset > 0 {
            for page in 1..total_pages {
                branches.push(Branch::new(
                    StageRequest::get(format!("{}?start={}", response.final_url, offset * page)),
                    record.clone(),
                ));
            }
        }
    }

    Ok(StageOutcome::Fork(branches))
}

/// Terminal stage: one record per listed vehicle
fn listing_stage(
    response: &FetchResponse,
    record: &VehicleRecord,
    defaults: &HashMap<String, String>,
) -> StageResult {
    let document = Html::parse_document(&response.body);

    let item_sel = parse_selector("ul.inventoryList li.item")?;
    let items: Vec<ElementRef> = document.select(&item_sel).collect();
    if items.is_empty() {
        return Ok(StageOutcome::skip("inventory page lists no vehicles"));
    }

    let data_layer = data_layer_vehicles(&document)?;

    let mut records = Vec::new();
    for (index, item) in items.iter().enumerate() {
        let mut child = record.clone();
        scrape_item(*item, &mut child)?;

        // The data layer array is index-aligned with the DOM item list
        if let Some(vehicle) = data_layer.get(index) {
            child.fuel_type = vehicle.get("normalFuelType").and_then(value_string);
        }

        for (field, value) in defaults {
            child.apply_default(field, value);
        }
        records.push(child);
    }

    Ok(StageOutcome::Emit(records))
}

/// Extracts the vehicles array from the tracking data layer
fn data_layer_vehicles(document: &Html) -> Result<Vec<Value>, StageError> {
    let script_sel = parse_selector("div.tracking-ddc-data-layer script")?;

    let script = document
        .select(&script_sel)
        .next()
        .map(|el| el.text().collect::<String>())
        .ok_or_else(|| StageError::ShapeMismatch("tracking data layer not found".to_string()))?;

    let after_start = script.split(DATA_LAYER_START).nth(1).ok_or_else(|| {
        StageError::ShapeMismatch("data layer has no vehicles assignment".to_string())
    })?;
    let payload = after_start
        .split(DATA_LAYER_END)
        .next()
        .unwrap_or(after_start)
        .trim()
        .trim_end_matches(';');

    // The platform escapes hyphens and hex sequences inside the inline JSON
    let unescaped = unescape_data_layer(payload)?;

    let vehicles: Value = serde_json::from_str(unescaped.trim())?;
    vehicles
        .as_array()
        .cloned()
        .ok_or_else(|| StageError::ShapeMismatch("data layer vehicles is not a list".to_string()))
}

fn unescape_data_layer(payload: &str) -> Result<String, StageError> {
    let dash = Regex::new(r"(\w)\\-(\w)")
        .map_err(|e| StageError::ShapeMismatch(format!("bad unescape pattern: {}", e)))?;
    let hex = Regex::new(r"(\w)\\x(\w)")
        .map_err(|e| StageError::ShapeMismatch(format!("bad unescape pattern: {}", e)))?;

    let step = dash.replace_all(payload, "${1}-${2}");
    Ok(hex.replace_all(&step, "${1}-${2}").into_owned())
}

/// Reads one inventory card into the record
fn scrape_item(item: ElementRef<'_>, record: &mut VehicleRecord) -> Result<(), StageError> {
    let hproduct_sel = parse_selector("div.hproduct")?;
    let hproduct = item
        .select(&hproduct_sel)
        .next()
        .ok_or_else(|| StageError::ShapeMismatch("inventory item has no hproduct".to_string()))?;

    let attr = |name: &str| {
        hproduct
            .value()
            .attr(name)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    record.make = attr("data-make");
    record.model = attr("data-model");
    record.trim = attr("data-trim");
    record.year = attr("data-year");
    record.body_style = attr("data-bodystyle");

    if let Some(color) = attr("data-exteriorcolor") {
        record.exterior_colors.push(ColorOption {
            name: color,
            price: String::new(),
            image: None,
            hex: None,
        });
    }

    let price_sel = parse_selector("span.final-price span.value")?;
    record.msrp = hproduct
        .select(&price_sel)
        .next()
        .map(|el| {
            el.text()
                .collect::<String>()
                .trim()
                .replace(['$', ','], "")
        })
        .filter(|v| !v.is_empty());

    let image_sel = parse_selector("div.media img")?;
    record.image = hproduct.select(&image_sel).next().and_then(|img| {
        img.value()
            .attr("data-src")
            .or_else(|| img.value().attr("src"))
            .map(str::to_string)
    });

    let details = description_pairs(hproduct)?;
    record.drive_type = details.get("Drive Line").cloned();
    record.transmission_type = details.get("Transmission").cloned();
    if let Some(color) = details.get("Interior Color") {
        record.interior_colors.push(ColorOption {
            name: color.clone(),
            price: String::new(),
            image: None,
            hex: None,
        });
    }

    Ok(())
}

/// Collects the description list's dt/dd pairs
///
/// Keys keep their dt text minus the trailing colon ("Drive Line",
/// "Transmission", "Interior Color").
fn description_pairs(hproduct: ElementRef<'_>) -> Result<HashMap<String, String>, StageError> {
    let dt_sel = parse_selector("div.description dt")?;
    let dd_sel = parse_selector("div.description dd")?;

    let keys = hproduct
        .select(&dt_sel)
        .map(|el| el.text().collect::<String>().trim().trim_end_matches(':').to_string());
    let values = hproduct
        .select(&dd_sel)
        .map(|el| el.text().collect::<String>().trim().to_string());

    Ok(keys.zip(values).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_site() -> SiteEntry {
        let mut site = SiteEntry::named("dealer");
        site.seeds = vec!["https://dealer.example/new-inventory/index.htm".to_string()];
        site.defaults
            .insert("transmissionType".to_string(), "Automatic".to_string());
        site
    }

    fn response(url: &str, body: &str) -> FetchResponse {
        FetchResponse::new(url, 200, body)
    }

    fn run_stage(depth: usize, url: &str, body: &str, record: &VehicleRecord) -> StageResult {
        pipeline(&create_test_site())
            .unwrap()
            .stage(depth)
            .expect("stage exists")
            .run(&response(url, body), record)
    }

    const LISTING_URL: &str = "https://dealer.example/new-inventory/index.htm";

    fn listing_page(data_layer: &str, items: &str) -> String {
        format!(
            r#"<html><body>
            <div class="tracking-ddc-data-layer"><script>
            DDC.dataLayer['vehicles'] = {};
            DDC.dataLayer['confirmation'] = {{}};
            </script></div>
            <ul class="inventoryList">{}</ul>
            </body></html>"#,
            data_layer, items
        )
    }

    const ITEM: &str = r#"
        <li class="item">
            <div class="hproduct" data-make="Acura" data-model="MDX" data-trim="A-Spec"
                 data-year="2025" data-bodystyle="SUV" data-exteriorcolor="Liquid Carbon">
                <div class="media"><a><img data-src="https://img.example/mdx.jpg"></a></div>
                <span class="final-price"><span class="value">$62,350</span></span>
                <div class="description"><dl>
                    <dt>Transmission:</dt><dd>10-Speed Automatic</dd>
                    <dt>Drive Line:</dt><dd>SH-AWD</dd>
                    <dt>Interior Color:</dt><dd>Ebony</dd>
                </dl></div>
            </div>
        </li>"#;

    #[test]
    fn test_missing_seeds_rejected() {
        let site = SiteEntry::named("dealer");
        assert!(pipeline(&site).is_err());
    }

    #[test]
    fn test_index_without_pagination_forks_single_page() {
        let body = listing_page("[]", "");
        let outcome = run_stage(0, LISTING_URL, &body, &VehicleRecord::default()).unwrap();
        let branches = match outcome {
            StageOutcome::Fork(branches) => branches,
            other => panic!("expected Fork, got {:?}", other),
        };

        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].request.url, LISTING_URL);
    }

    #[test]
    fn test_index_forks_per_page() {
        let body = r#"<html><body>
            <ul class="pagination"><li>
                <a data-total-items="3" href="?start=18&">2</a>
            </li></ul>
            </body></html>"#;

        let outcome = run_stage(0, LISTING_URL, body, &VehicleRecord::default()).unwrap();
        let branches = match outcome {
            StageOutcome::Fork(branches) => branches,
            other => panic!("expected Fork, got {:?}", other),
        };

        assert_eq!(branches.len(), 3);
        assert_eq!(branches[0].request.url, LISTING_URL);
        assert_eq!(branches[1].request.url, format!("{}?start=18", LISTING_URL));
        assert_eq!(branches[2].request.url, format!("{}?start=36", LISTING_URL));
    }

    #[test]
    fn test_listing_emits_vehicle_records() {
        let body = listing_page(r#"[{"normalFuelType": "Gasoline", "doors": "4"}]"#, ITEM);

        let outcome = run_stage(1, LISTING_URL, &body, &VehicleRecord::default()).unwrap();
        let records = match outcome {
            StageOutcome::Emit(records) => records,
            other => panic!("expected Emit, got {:?}", other),
        };

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.make.as_deref(), Some("Acura"));
        assert_eq!(record.model.as_deref(), Some("MDX"));
        assert_eq!(record.trim.as_deref(), Some("A-Spec"));
        assert_eq!(record.year.as_deref(), Some("2025"));
        assert_eq!(record.body_style.as_deref(), Some("SUV"));
        assert_eq!(record.msrp.as_deref(), Some("62350"));
        assert_eq!(record.image.as_deref(), Some("https://img.example/mdx.jpg"));
        assert_eq!(record.drive_type.as_deref(), Some("SH-AWD"));
        assert_eq!(record.transmission_type.as_deref(), Some("10-Speed Automatic"));
        assert_eq!(record.fuel_type.as_deref(), Some("Gasoline"));
        assert_eq!(record.exterior_colors[0].name, "Liquid Carbon");
        assert_eq!(record.interior_colors[0].name, "Ebony");
    }

    #[test]
    fn test_listing_applies_transmission_default() {
        let item = ITEM.replace("<dt>Transmission:</dt><dd>10-Speed Automatic</dd>", "");
        let body = listing_page("[{}]", &item);

        let outcome = run_stage(1, LISTING_URL, &body, &VehicleRecord::default()).unwrap();
        let records = match outcome {
            StageOutcome::Emit(records) => records,
            other => panic!("expected Emit, got {:?}", other),
        };
        assert_eq!(records[0].transmission_type.as_deref(), Some("Automatic"));
    }

    #[test]
    fn test_listing_empty_page_skips() {
        let body = listing_page("[]", "");
        let outcome = run_stage(1, LISTING_URL, &body, &VehicleRecord::default()).unwrap();
        assert!(matches!(outcome, StageOutcome::Skip { .. }));
    }

    #[test]
    fn test_listing_missing_data_layer_fails() {
        let body = format!(
            r#"<html><body><ul class="inventoryList">{}</ul></body></html>"#,
            ITEM
        );
        let result = run_stage(1, LISTING_URL, &body, &VehicleRecord::default());
        assert!(matches!(result, Err(StageError::ShapeMismatch(_))));
    }

    #[test]
    fn test_unescape_data_layer() {
        let unescaped = unescape_data_layer(r#"[{"trim": "A\-Spec", "code": "1\x2"}]"#).unwrap();
        assert_eq!(unescaped, r#"[{"trim": "A-Spec", "code": "1-2"}]"#);
    }
}
