//! Shared parse helpers
//!
//! The original spiders duplicated this logic per site: free-text body
//! description splitting, money extraction from JSON payloads, swatch and
//! package scraping with a broader fallback selector set, and mining JSON
//! objects out of JavaScript assets.

use crate::record::{ColorOption, PackageOption, VehicleRecord};
use crate::StageError;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

/// Classified body description
///
/// Configurator body descriptions come in two shapes: a single body-type
/// label ("Sedan") or a comma-separated cab-type + bed-length pair
/// ("Crew Cab, Short Bed"). The two shapes set different record fields and
/// must not be conflated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyDescription {
    Empty,
    Single(String),
    CabBed { cab: String, bed: String },
}

/// Splits a free-text body description into its classification
///
/// Tokens are comma-separated and trimmed; blank tokens are discarded.
/// One token is a body-type label; two or more are a cab-type + bed-length
/// pair (extra tokens are ignored, as the source feeds never carry more
/// than two meaningful components).
pub fn split_body_description(description: &str) -> BodyDescription {
    let tokens: Vec<&str> = description
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();

    match tokens.as_slice() {
        [] => BodyDescription::Empty,
        [single] => BodyDescription::Single((*single).to_string()),
        [cab, bed, ..] => BodyDescription::CabBed {
            cab: (*cab).to_string(),
            bed: (*bed).to_string(),
        },
    }
}

impl BodyDescription {
    /// Applies the classification to a record
    ///
    /// `Single` sets only `bodyType`; `CabBed` sets only `cabType` and
    /// `bedLength`; `Empty` touches nothing.
    pub fn apply(&self, record: &mut VehicleRecord) {
        match self {
            BodyDescription::Empty => {}
            BodyDescription::Single(body) => {
                record.body_type = Some(body.clone());
            }
            BodyDescription::CabBed { cab, bed } => {
                record.cab_type = Some(cab.clone());
                record.bed_length = Some(bed.clone());
            }
        }
    }
}

/// Renders a JSON leaf as a string, preserving the original token
///
/// Strings pass through; numbers keep their JSON representation (no float
/// coercion of money amounts); empty strings and other types are treated
/// as absent.
pub fn value_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Extracts a money amount from either a bare value or an `{value: ...}`
/// wrapper, the two shapes the configurator gateways use
pub fn price_from(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => map.get("value").and_then(value_string),
        other => value_string(other),
    }
}

/// Walks a dot-separated key path, failing with the full path on a miss
pub fn require<'a>(value: &'a Value, path: &str) -> Result<&'a Value, StageError> {
    let mut current = value;
    for key in path.split('.') {
        current = current
            .get(key)
            .ok_or_else(|| StageError::ShapeMismatch(format!("missing key '{}'", path)))?;
    }
    Ok(current)
}

/// Selector set for one swatch markup shape
#[derive(Debug, Clone, Copy)]
pub struct SwatchSelectors {
    /// One element per swatch option
    pub container: &'static str,
    /// Display name, relative to the container
    pub name: &'static str,
    /// Price label, relative to the container
    pub price: &'static str,
    /// Swatch image element, relative to the container
    pub image: Option<&'static str>,
}

/// Selector set for one package markup shape
#[derive(Debug, Clone, Copy)]
pub struct PackageSelectors {
    pub container: &'static str,
    pub title: &'static str,
    pub price: &'static str,
    /// Included option line-items, relative to the container
    pub options: Option<&'static str>,
}

fn parse_selector(selector: &str) -> Result<Selector, StageError> {
    Selector::parse(selector).map_err(|_| StageError::Selector(selector.to_string()))
}

fn first_text(element: ElementRef<'_>, selector: &Selector, default: &str) -> String {
    element
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Scrapes swatch options, preferring the primary selector set
///
/// The target sites rename their generated CSS classes between deploys, so
/// each swatch stage carries a broader fallback set. The first set that
/// matches at least one container wins outright; results are never merged
/// across sets. Both sets empty means the page genuinely has no options.
pub fn scrape_swatches(
    html: &str,
    primary: &SwatchSelectors,
    fallback: &SwatchSelectors,
) -> Result<Vec<ColorOption>, StageError> {
    let document = Html::parse_document(html);

    let from_primary = swatches_for(&document, primary)?;
    if !from_primary.is_empty() {
        return Ok(from_primary);
    }

    tracing::debug!(
        "Primary swatch selector '{}' matched nothing, trying fallback",
        primary.container
    );
    swatches_for(&document, fallback)
}

fn swatches_for(
    document: &Html,
    selectors: &SwatchSelectors,
) -> Result<Vec<ColorOption>, StageError> {
    let container = parse_selector(selectors.container)?;
    let name = parse_selector(selectors.name)?;
    let price = parse_selector(selectors.price)?;
    let image = selectors.image.map(parse_selector).transpose()?;

    let mut swatches = Vec::new();
    for element in document.select(&container) {
        let image_url = image
            .as_ref()
            .and_then(|sel| element.select(sel).next())
            .and_then(|el| el.value().attr("src"))
            .map(str::to_string);

        swatches.push(ColorOption {
            name: first_text(element, &name, "No name"),
            price: first_text(element, &price, "No price"),
            image: image_url,
            hex: None,
        });
    }

    Ok(swatches)
}

/// Scrapes package groups, preferring the primary selector set
///
/// Same first-match-wins fallback policy as [`scrape_swatches`].
pub fn scrape_packages(
    html: &str,
    primary: &PackageSelectors,
    fallback: &PackageSelectors,
) -> Result<Vec<PackageOption>, StageError> {
    let document = Html::parse_document(html);

    let from_primary = packages_for(&document, primary)?;
    if !from_primary.is_empty() {
        return Ok(from_primary);
    }

    tracing::debug!(
        "Primary package selector '{}' matched nothing, trying fallback",
        primary.container
    );
    packages_for(&document, fallback)
}

fn packages_for(
    document: &Html,
    selectors: &PackageSelectors,
) -> Result<Vec<PackageOption>, StageError> {
    let container = parse_selector(selectors.container)?;
    let title = parse_selector(selectors.title)?;
    let price = parse_selector(selectors.price)?;
    let options = selectors.options.map(parse_selector).transpose()?;

    let mut packages = Vec::new();
    for element in document.select(&container) {
        let line_items = options
            .as_ref()
            .map(|sel| {
                element
                    .select(sel)
                    .map(|el| el.text().collect::<String>().trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        packages.push(PackageOption {
            id: None,
            title: first_text(element, &title, "No title"),
            price: first_text(element, &price, "No price"),
            description: None,
            options: line_items,
        });
    }

    Ok(packages)
}

/// Mines a JSON object literal assigned to a JavaScript variable
///
/// Matches `var <name> = {...};` non-greedily across lines, the way the
/// nameplate index embeds its data.
pub fn extract_script_object(js: &str, var_name: &str) -> Result<Value, StageError> {
    let pattern = format!(r"(?s)var\s+{}\s*=\s*(\{{.*?\}});", regex::escape(var_name));
    let re = Regex::new(&pattern)
        .map_err(|e| StageError::ScriptVar(format!("{}: {}", var_name, e)))?;

    let captured = re
        .captures(js)
        .and_then(|c| c.get(1))
        .ok_or_else(|| StageError::ScriptVar(var_name.to_string()))?;

    Ok(serde_json::from_str(captured.as_str())?)
}
