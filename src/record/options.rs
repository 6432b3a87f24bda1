use serde::{Deserialize, Serialize};

/// One color swatch option (exterior or interior)
///
/// `price` is the site's display label ("0", "$495", "No price"), carried as
/// scraped. DOM-backed sites populate `image`, GraphQL-backed sites `hex`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorOption {
    pub name: String,
    pub price: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hex: Option<String>,
}

/// One bundled option group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageOption {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub price: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Included option line-items
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub options: Vec<String>,
}
