use crate::record::{ColorOption, PackageOption};
use serde::{Deserialize, Serialize};

/// Column order for tabular output
///
/// Matches the feed-export order of the original configurator feeds, with the
/// powertrain columns following the trim column.
pub const FIELD_ORDER: &[&str] = &[
    "make",
    "modelDisplayName",
    "model",
    "year",
    "bodyType",
    "msrp",
    "image",
    "bodyStyle",
    "cabType",
    "bedLength",
    "driveType",
    "trim",
    "transmissionType",
    "fuelType",
    "exteriorColors",
    "interiorColors",
    "packages",
];

/// Accumulated record for one vehicle configuration
///
/// The record is threaded through a site's discovery tree and progressively
/// enriched by each stage. Forking a branch clones the record, so every
/// branch owns its own copy; scalar fields stay unset until a stage fills
/// them. Money amounts (`msrp`, option prices) are carried verbatim as
/// strings, never coerced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VehicleRecord {
    pub make: Option<String>,
    pub model: Option<String>,
    pub model_display_name: Option<String>,
    pub year: Option<String>,
    pub body_type: Option<String>,
    pub msrp: Option<String>,
    pub image: Option<String>,
    pub body_style: Option<String>,
    pub cab_type: Option<String>,
    pub bed_length: Option<String>,
    pub drive_type: Option<String>,
    pub trim: Option<String>,
    pub transmission_type: Option<String>,
    pub fuel_type: Option<String>,
    pub exterior_colors: Vec<ColorOption>,
    pub interior_colors: Vec<ColorOption>,
    pub packages: Vec<PackageOption>,
}

impl VehicleRecord {
    /// Creates a record pre-seeded with the make constant
    pub fn seeded(make: &str) -> Self {
        Self {
            make: Some(make.to_string()),
            ..Self::default()
        }
    }

    /// Returns a scalar field by its column name
    pub fn scalar(&self, field: &str) -> Option<&str> {
        let value = match field {
            "make" => &self.make,
            "model" => &self.model,
            "modelDisplayName" => &self.model_display_name,
            "year" => &self.year,
            "bodyType" => &self.body_type,
            "msrp" => &self.msrp,
            "image" => &self.image,
            "bodyStyle" => &self.body_style,
            "cabType" => &self.cab_type,
            "bedLength" => &self.bed_length,
            "driveType" => &self.drive_type,
            "trim" => &self.trim,
            "transmissionType" => &self.transmission_type,
            "fuelType" => &self.fuel_type,
            _ => return None,
        };
        value.as_deref()
    }

    /// Sets a scalar field by its column name
    ///
    /// Unknown field names are ignored so site defaults can carry fields a
    /// particular pipeline does not use.
    pub fn set_scalar(&mut self, field: &str, value: String) {
        let slot = match field {
            "make" => &mut self.make,
            "model" => &mut self.model,
            "modelDisplayName" => &mut self.model_display_name,
            "year" => &mut self.year,
            "bodyType" => &mut self.body_type,
            "msrp" => &mut self.msrp,
            "image" => &mut self.image,
            "bodyStyle" => &mut self.body_style,
            "cabType" => &mut self.cab_type,
            "bedLength" => &mut self.bed_length,
            "driveType" => &mut self.drive_type,
            "trim" => &mut self.trim,
            "transmissionType" => &mut self.transmission_type,
            "fuelType" => &mut self.fuel_type,
            _ => return,
        };
        *slot = Some(value);
    }

    /// Fills a scalar field from a site default only when it is still unset
    pub fn apply_default(&mut self, field: &str, value: &str) {
        if self.scalar(field).map_or(true, str::is_empty) {
            self.set_scalar(field, value.to_string());
        }
    }

    /// Returns true if the field holds a non-empty value
    ///
    /// List fields count as populated when they contain at least one entry.
    pub fn has_value(&self, field: &str) -> bool {
        match field {
            "exteriorColors" => !self.exterior_colors.is_empty(),
            "interiorColors" => !self.interior_colors.is_empty(),
            "packages" => !self.packages.is_empty(),
            _ => self.scalar(field).is_some_and(|v| !v.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_record() -> VehicleRecord {
        let mut record = VehicleRecord::seeded("Chevrolet");
        record.model = Some("Silverado".to_string());
        record.year = Some("2025".to_string());
        record
    }

    #[test]
    fn test_seeded_sets_make_only() {
        let record = VehicleRecord::seeded("Toyota");
        assert_eq!(record.make.as_deref(), Some("Toyota"));
        assert!(record.model.is_none());
        assert!(record.exterior_colors.is_empty());
    }

    #[test]
    fn test_fork_preserves_ancestor_fields() {
        let parent = create_test_record();

        let mut child_a = parent.clone();
        let mut child_b = parent.clone();
        child_a.drive_type = Some("4WD".to_string());
        child_b.drive_type = Some("2WD".to_string());

        for child in [&child_a, &child_b] {
            assert_eq!(child.make, parent.make);
            assert_eq!(child.model, parent.model);
            assert_eq!(child.year, parent.year);
        }
    }

    #[test]
    fn test_fork_isolates_branches() {
        let parent = create_test_record();

        let mut child_a = parent.clone();
        let child_b = parent.clone();

        child_a.trim = Some("LT".to_string());
        child_a.exterior_colors.push(ColorOption {
            name: "Summit White".to_string(),
            price: "0".to_string(),
            image: None,
            hex: None,
        });

        // Sibling and parent are untouched
        assert!(child_b.trim.is_none());
        assert!(child_b.exterior_colors.is_empty());
        assert!(parent.trim.is_none());
        assert!(parent.exterior_colors.is_empty());
    }

    #[test]
    fn test_scalar_roundtrip_by_column_name() {
        let mut record = VehicleRecord::default();
        for field in FIELD_ORDER
            .iter()
            .filter(|f| !f.starts_with("exterior") && !f.starts_with("interior") && **f != "packages")
        {
            record.set_scalar(field, format!("value-{}", field));
            assert_eq!(record.scalar(field), Some(format!("value-{}", field).as_str()));
        }
    }

    #[test]
    fn test_apply_default_only_fills_unset() {
        let mut record = VehicleRecord::default();
        record.apply_default("transmissionType", "Automatic");
        assert_eq!(record.transmission_type.as_deref(), Some("Automatic"));

        record.transmission_type = Some("Manual".to_string());
        record.apply_default("transmissionType", "Automatic");
        assert_eq!(record.transmission_type.as_deref(), Some("Manual"));
    }

    #[test]
    fn test_apply_default_overwrites_empty_string() {
        let mut record = VehicleRecord::default();
        record.drive_type = Some(String::new());
        record.apply_default("driveType", "FWD");
        assert_eq!(record.drive_type.as_deref(), Some("FWD"));
    }

    #[test]
    fn test_has_value_for_lists() {
        let mut record = VehicleRecord::default();
        assert!(!record.has_value("packages"));

        record.packages.push(PackageOption {
            id: None,
            title: "Convenience Package".to_string(),
            price: "1,495".to_string(),
            description: None,
            options: vec![],
        });
        assert!(record.has_value("packages"));
    }

    #[test]
    fn test_unknown_field_ignored() {
        let mut record = VehicleRecord::default();
        record.set_scalar("doors", "4".to_string());
        assert_eq!(record.scalar("doors"), None);
        assert!(!record.has_value("doors"));
    }
}
