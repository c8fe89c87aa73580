// Filter state: raw search intent from the UI, its cleaned form, and the
// short-key codec used for shareable links.

use serde::{Deserialize, Deserializer, Serialize, de::IgnoredAny};

use crate::models::SortKey;

pub const DEFAULT_LIMIT: u32 = 20;
pub const DEFAULT_PAGE: u32 = 1;
pub const MAX_LIMIT: u32 = 100;

// Search intent as the UI sends it. Everything is optional and untrusted: numbers
// may arrive as JSON numbers, numeric strings, empty strings or junk.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchFilters {
    pub query: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub generation: Option<String>,
    #[serde(deserialize_with = "lenient_number")]
    pub price_min: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub price_max: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub year_min: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub year_max: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub mileage_max: Option<f64>,
    pub fuel_type: Option<String>,
    pub body_type: Option<String>,
    pub transmission: Option<String>,
    pub drive_type: Option<String>,
    pub color: Option<String>,
    pub location: Option<String>,
    pub sort: Option<String>,
    #[serde(deserialize_with = "lenient_number")]
    pub page: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub limit: Option<f64>,
}

/// Cleaned search intent. Only meaningful fields survive; sort/page/limit are
/// always populated. Treated as read-only once handed to a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_max: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mileage_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuel_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transmission: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drive_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub sort: SortKey,
    pub page: u32,
    pub limit: u32,
}

impl Default for FilterState {
    fn default() -> Self {
        FilterState {
            query: None,
            make: None,
            model: None,
            generation: None,
            price_min: None,
            price_max: None,
            year_min: None,
            year_max: None,
            mileage_max: None,
            fuel_type: None,
            body_type: None,
            transmission: None,
            drive_type: None,
            color: None,
            location: None,
            sort: SortKey::Recent,
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl SearchFilters {
    /// Strips empty strings and out-of-range numbers, then fills in defaults.
    /// `price_min > price_max` is left as given; such a query just matches nothing.
    pub fn normalize(&self) -> FilterState {
        FilterState {
            query: clean_text(&self.query),
            make: clean_text(&self.make),
            model: clean_text(&self.model),
            generation: clean_text(&self.generation),
            price_min: self.price_min.filter(|v| v.is_finite() && *v >= 0.0),
            price_max: self.price_max.filter(|v| v.is_finite() && *v > 0.0),
            year_min: clean_count(self.year_min),
            year_max: clean_count(self.year_max),
            mileage_max: self.mileage_max.filter(|v| v.is_finite() && *v > 0.0),
            fuel_type: clean_text(&self.fuel_type),
            body_type: clean_text(&self.body_type),
            transmission: clean_text(&self.transmission),
            drive_type: clean_text(&self.drive_type),
            color: clean_text(&self.color),
            location: clean_text(&self.location),
            sort: self
                .sort
                .as_deref()
                .map(SortKey::parse_or_recent)
                .unwrap_or_default(),
            page: clean_count(self.page).unwrap_or(DEFAULT_PAGE),
            limit: clean_count(self.limit)
                .map(|l| l.min(MAX_LIMIT))
                .unwrap_or(DEFAULT_LIMIT),
        }
    }
}

fn clean_text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// Positive whole number (years, page, limit); fractions truncate
fn clean_count(value: Option<f64>) -> Option<u32> {
    value
        .filter(|v| v.is_finite() && *v >= 1.0 && *v <= u32::MAX as f64)
        .map(|v| v.trunc() as u32)
}

// Accepts a number, a numeric string or null. Anything else becomes None so
// that normalize can strip it instead of the whole body being rejected.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Number(f64),
        Text(String),
        Other(#[allow(dead_code)] IgnoredAny),
    }

    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Number(n)) => Some(n),
        Some(Loose::Text(s)) => parse_number(Some(&s)),
        Some(Loose::Other(_)) | None => None,
    })
}

// --- Shareable link codec ---

// Short-key query parameters carried by share links. Values stay strings so that
// a malformed number drops that one field instead of rejecting the whole link.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ShareParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mk: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#gen: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub km: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trans: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drive: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
}

impl ShareParams {
    pub fn into_filter_state(self) -> FilterState {
        let filters = SearchFilters {
            query: self.q,
            make: self.mk,
            model: self.md,
            generation: self.r#gen,
            price_min: parse_number(self.pf.as_deref()),
            price_max: parse_number(self.pt.as_deref()),
            year_min: parse_number(self.yf.as_deref()),
            year_max: parse_number(self.yt.as_deref()),
            mileage_max: parse_number(self.km.as_deref()),
            fuel_type: self.fuel,
            body_type: self.body,
            transmission: self.trans,
            drive_type: self.drive,
            color: self.color,
            location: self.loc,
            sort: self.sort,
            page: parse_number(self.page.as_deref()),
            limit: parse_number(self.limit.as_deref()),
        };
        filters.normalize()
    }

    pub fn from_filter_state(state: &FilterState) -> Self {
        ShareParams {
            q: state.query.clone(),
            mk: state.make.clone(),
            md: state.model.clone(),
            r#gen: state.generation.clone(),
            pf: state.price_min.map(format_number),
            pt: state.price_max.map(format_number),
            yf: state.year_min.map(|y| y.to_string()),
            yt: state.year_max.map(|y| y.to_string()),
            km: state.mileage_max.map(format_number),
            fuel: state.fuel_type.clone(),
            body: state.body_type.clone(),
            trans: state.transmission.clone(),
            drive: state.drive_type.clone(),
            color: state.color.clone(),
            loc: state.location.clone(),
            sort: (state.sort != SortKey::Recent).then(|| state.sort.as_str().to_string()),
            page: (state.page != DEFAULT_PAGE).then(|| state.page.to_string()),
            limit: (state.limit != DEFAULT_LIMIT).then(|| state.limit.to_string()),
        }
    }
}

/// Decodes a share-link query string (with or without the leading '?').
pub fn decode_share_query(query: &str) -> FilterState {
    let query = query.trim_start_matches('?');
    match serde_urlencoded::from_str::<ShareParams>(query) {
        Ok(params) => params.into_filter_state(),
        Err(e) => {
            tracing::warn!(error = %e, "Unreadable share query, using default filters");
            FilterState::default()
        }
    }
}

/// Encodes a filter state as a short-key query string (no leading '?').
pub fn encode_share_query(state: &FilterState) -> String {
    serde_urlencoded::to_string(ShareParams::from_filter_state(state)).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to encode share query");
        String::new()
    })
}

fn parse_number(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Formats a number without a trailing ".0" for whole values.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_invalid_fields() {
        let filters = SearchFilters {
            price_min: Some(-5.0),
            price_max: Some(0.0),
            make: Some(String::new()),
            ..Default::default()
        };
        let state = filters.normalize();

        assert_eq!(state.price_min, None);
        assert_eq!(state.price_max, None);
        assert_eq!(state.make, None);
        assert_eq!(state, FilterState::default());
    }

    #[test]
    fn normalize_keeps_valid_fields() {
        let filters = SearchFilters {
            price_min: Some(5.0),
            price_max: Some(20_000.0),
            make: Some(" BMW ".to_string()),
            year_min: Some(2010.0),
            ..Default::default()
        };
        let state = filters.normalize();

        assert_eq!(state.price_min, Some(5.0));
        assert_eq!(state.price_max, Some(20_000.0));
        assert_eq!(state.make.as_deref(), Some("BMW"));
        assert_eq!(state.year_min, Some(2010));
    }

    #[test]
    fn normalize_allows_zero_price_min_but_not_zero_bounds_elsewhere() {
        let filters = SearchFilters {
            price_min: Some(0.0),
            year_min: Some(0.0),
            year_max: Some(-1.0),
            mileage_max: Some(0.0),
            ..Default::default()
        };
        let state = filters.normalize();

        assert_eq!(state.price_min, Some(0.0));
        assert_eq!(state.year_min, None);
        assert_eq!(state.year_max, None);
        assert_eq!(state.mileage_max, None);
    }

    #[test]
    fn normalize_applies_defaults() {
        let state = SearchFilters {
            sort: Some("cheapest".to_string()),
            page: Some(0.0),
            limit: Some(-3.0),
            ..Default::default()
        }
        .normalize();

        assert_eq!(state.sort, SortKey::Recent);
        assert_eq!(state.page, 1);
        assert_eq!(state.limit, 20);

        let capped = SearchFilters {
            sort: Some("price_desc".to_string()),
            limit: Some(5_000.0),
            ..Default::default()
        }
        .normalize();
        assert_eq!(capped.sort, SortKey::PriceDesc);
        assert_eq!(capped.limit, MAX_LIMIT);
    }

    #[test]
    fn normalize_keeps_inverted_price_range() {
        let state = SearchFilters {
            price_min: Some(30_000.0),
            price_max: Some(10_000.0),
            ..Default::default()
        }
        .normalize();

        assert_eq!(state.price_min, Some(30_000.0));
        assert_eq!(state.price_max, Some(10_000.0));
    }

    #[test]
    fn loosely_typed_numbers_are_stripped_not_rejected() {
        let filters: SearchFilters =
            serde_json::from_str(r#"{"make":"BMW","priceMin":"","priceMax":"25000","yearMin":"abc","mileageMax":true,"limit":20.0,"page":"2"}"#)
                .expect("lenient body deserializes");
        let state = filters.normalize();

        assert_eq!(state.make.as_deref(), Some("BMW"));
        assert_eq!(state.price_min, None);
        assert_eq!(state.price_max, Some(25_000.0));
        assert_eq!(state.year_min, None);
        assert_eq!(state.mileage_max, None);
        assert_eq!(state.limit, 20);
        assert_eq!(state.page, 2);
    }

    #[test]
    fn null_and_missing_numbers_use_defaults() {
        let filters: SearchFilters =
            serde_json::from_str(r#"{"priceMin":null,"limit":null}"#).expect("nulls deserialize");

        assert_eq!(filters.normalize(), FilterState::default());
    }

    #[test]
    fn decodes_short_keys() {
        let state = decode_share_query("?mk=Audi&md=A4&pf=5000&pt=abc&yf=2012&fuel=Diesel&body=sedan&trans=Automatic&sort=price_asc");

        assert_eq!(state.make.as_deref(), Some("Audi"));
        assert_eq!(state.model.as_deref(), Some("A4"));
        assert_eq!(state.price_min, Some(5000.0));
        assert_eq!(state.price_max, None);
        assert_eq!(state.year_min, Some(2012));
        assert_eq!(state.fuel_type.as_deref(), Some("Diesel"));
        assert_eq!(state.body_type.as_deref(), Some("sedan"));
        assert_eq!(state.transmission.as_deref(), Some("Automatic"));
        assert_eq!(state.sort, SortKey::PriceAsc);
    }

    #[test]
    fn encodes_only_meaningful_fields() {
        let state = SearchFilters {
            make: Some("Mercedes-Benz".to_string()),
            model: Some("E Class".to_string()),
            price_max: Some(25_000.0),
            ..Default::default()
        }
        .normalize();

        assert_eq!(encode_share_query(&state), "mk=Mercedes-Benz&md=E+Class&pt=25000");
        assert_eq!(decode_share_query(&encode_share_query(&state)), state);
    }

    #[test]
    fn empty_share_query_yields_defaults() {
        assert_eq!(decode_share_query(""), FilterState::default());
        assert_eq!(encode_share_query(&FilterState::default()), "");
    }
}
