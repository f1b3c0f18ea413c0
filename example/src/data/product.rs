use serde::Deserialize;

/// A product as returned by the provider's catalogue endpoints.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub product_type: String,
}
