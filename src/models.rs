// Data structures shared across the search subsystem:
// sort keys, the canonical listing shape, and the search result envelope.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// Sort selector understood by both backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Recent,
    PriceAsc,
    PriceDesc,
    YearAsc,
    YearDesc,
    MileageAsc,
}

impl SortKey {
    /// Parses a sort selector; anything unrecognized yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "recent" => Some(SortKey::Recent),
            "price_asc" => Some(SortKey::PriceAsc),
            "price_desc" => Some(SortKey::PriceDesc),
            "year_asc" => Some(SortKey::YearAsc),
            "year_desc" => Some(SortKey::YearDesc),
            "mileage_asc" => Some(SortKey::MileageAsc),
            _ => None,
        }
    }

    /// Like `parse`, but fails closed to `Recent`.
    pub fn parse_or_recent(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Recent => "recent",
            SortKey::PriceAsc => "price_asc",
            SortKey::PriceDesc => "price_desc",
            SortKey::YearAsc => "year_asc",
            SortKey::YearDesc => "year_desc",
            SortKey::MileageAsc => "mileage_asc",
        }
    }

    /// Ordering used when re-sorting merged results client-side.
    pub fn compare(&self, a: &Listing, b: &Listing) -> Ordering {
        match self {
            SortKey::Recent => b.created_at.cmp(&a.created_at),
            SortKey::PriceAsc => a.price.total_cmp(&b.price),
            SortKey::PriceDesc => b.price.total_cmp(&a.price),
            SortKey::YearAsc => a.year.cmp(&b.year),
            SortKey::YearDesc => b.year.cmp(&a.year),
            SortKey::MileageAsc => a.mileage.total_cmp(&b.mileage),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    #[default]
    Active,
    Sold,
    Draft,
}

impl ListingStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Some(ListingStatus::Active),
            "sold" => Some(ListingStatus::Sold),
            "draft" => Some(ListingStatus::Draft),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Canonical, UI-facing vehicle listing. Built only by `normalize`, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    /// Source collection name, or "index" for hosted-index hits.
    pub collection: String,
    pub title: String,
    pub make: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<String>,
    pub year: u32,
    pub price: f64,
    pub currency: String,
    pub mileage: f64,
    pub fuel_type: String,
    pub transmission: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drive_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub images: Vec<String>,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub status: ListingStatus,
    pub condition: String,
    pub seller_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller_numeric_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller_phone: Option<String>,
}

// Which backend produced a search result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Index,
    Store,
}

// Result envelope of one search call.
// `total` is the index's own hit count on the index path, but only the number of
// returned (capped) listings on the store path.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub listings: Vec<Listing>,
    pub total: u64,
    pub backend: Backend,
}

impl SearchOutcome {
    pub fn from_store(listings: Vec<Listing>) -> Self {
        let total = listings.len() as u64;
        SearchOutcome {
            listings,
            total,
            backend: Backend::Store,
        }
    }
}
