//! Site pipelines
//!
//! One module per target site plus the shared parse helpers. The registry
//! maps a configured site name onto its pipeline constructor, collapsing
//! what used to be near-duplicate spiders into one engine parameterized per
//! site.

pub mod chevrolet;
pub mod common;
pub mod dealer;
pub mod ford;
pub mod toyota;

use crate::config::SiteEntry;
use crate::engine::SitePipeline;
use crate::TrawlError;

/// Names the registry knows how to build
pub const SITE_NAMES: &[&str] = &["chevrolet", "toyota", "ford", "dealer"];

/// Builds the pipeline for a configured site entry
///
/// # Arguments
///
/// * `entry` - The `[[site]]` table for the target site
///
/// # Returns
///
/// * `Ok(SitePipeline)` - Ready to hand to the driver
/// * `Err(TrawlError)` - Unknown site name or unusable entry
pub fn build_pipeline(entry: &SiteEntry) -> Result<SitePipeline, TrawlError> {
    match entry.name.as_str() {
        "chevrolet" => Ok(chevrolet::pipeline(entry)),
        "toyota" => Ok(toyota::pipeline(entry)),
        "ford" => Ok(ford::pipeline(entry)),
        "dealer" => dealer::pipeline(entry),
        other => Err(TrawlError::UnknownSite(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_builds_every_known_site() {
        for name in SITE_NAMES {
            let mut entry = SiteEntry::named(name);
            entry.seeds = vec!["https://dealer.example/new-inventory/index.htm".to_string()];

            let pipeline = build_pipeline(&entry).unwrap();
            assert_eq!(&pipeline.site, name);
            assert!(pipeline.depth() > 0);
            assert!(!pipeline.seeds.is_empty());
        }
    }

    #[test]
    fn test_registry_rejects_unknown_site() {
        let entry = SiteEntry::named("edsel");
        assert!(matches!(
            build_pipeline(&entry),
            Err(TrawlError::UnknownSite(_))
        ));
    }
}
