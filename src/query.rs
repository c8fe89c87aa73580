// Translates a cleaned FilterState into backend-specific query pieces:
// structured predicates for the document store, filter strings for the hosted index.

use crate::filters::{FilterState, format_number};
use crate::models::SortKey;

// --- Document store ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Equal,
    GreaterOrEqual,
    LessOrEqual,
}

impl StoreOp {
    // Firestore structured-query operator names
    pub fn as_firestore(&self) -> &'static str {
        match self {
            StoreOp::Equal => "EQUAL",
            StoreOp::GreaterOrEqual => "GREATER_THAN_OR_EQUAL",
            StoreOp::LessOrEqual => "LESS_THAN_OR_EQUAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreValue {
    Text(String),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreConstraint {
    pub field: &'static str,
    pub op: StoreOp,
    pub value: StoreValue,
}

impl StoreConstraint {
    pub fn equals(field: &'static str, value: impl Into<String>) -> Self {
        StoreConstraint { field, op: StoreOp::Equal, value: StoreValue::Text(value.into()) }
    }

    fn at_least(field: &'static str, value: f64) -> Self {
        StoreConstraint { field, op: StoreOp::GreaterOrEqual, value: StoreValue::Number(value) }
    }

    fn at_most(field: &'static str, value: f64) -> Self {
        StoreConstraint { field, op: StoreOp::LessOrEqual, value: StoreValue::Number(value) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub field: &'static str,
    pub direction: Direction,
}

/// One query against one named collection.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreQuery {
    pub collection: &'static str,
    pub constraints: Vec<StoreConstraint>,
    pub order_by: Option<OrderBy>,
    pub limit: u32,
}

/// Equality predicates first (make, model, fuelType, bodyType, transmission),
/// then range predicates (price, year). The order is stable.
pub fn build_store_constraints(state: &FilterState) -> Vec<StoreConstraint> {
    let equality_fields = [
        ("make", &state.make),
        ("model", &state.model),
        ("fuelType", &state.fuel_type),
        ("bodyType", &state.body_type),
        ("transmission", &state.transmission),
    ];

    let mut constraints: Vec<StoreConstraint> = equality_fields
        .into_iter()
        .filter_map(|(field, value)| value.as_ref().map(|v| StoreConstraint::equals(field, v.clone())))
        .collect();

    if let Some(min) = state.price_min {
        constraints.push(StoreConstraint::at_least("price", min));
    }
    if let Some(max) = state.price_max {
        constraints.push(StoreConstraint::at_most("price", max));
    }
    if let Some(min) = state.year_min {
        constraints.push(StoreConstraint::at_least("year", f64::from(min)));
    }
    if let Some(max) = state.year_max {
        constraints.push(StoreConstraint::at_most("year", f64::from(max)));
    }

    constraints
}

pub fn build_store_sort(sort: SortKey) -> OrderBy {
    let (field, direction) = match sort {
        SortKey::Recent => ("createdAt", Direction::Descending),
        SortKey::PriceAsc => ("price", Direction::Ascending),
        SortKey::PriceDesc => ("price", Direction::Descending),
        SortKey::YearAsc => ("year", Direction::Ascending),
        SortKey::YearDesc => ("year", Direction::Descending),
        SortKey::MileageAsc => ("mileage", Direction::Ascending),
    };
    OrderBy { field, direction }
}

// --- Hosted index ---

/// Filters for the hosted index's two channels: a facet filter expression and a
/// separate list of numeric comparisons.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexFilters {
    pub filters: String,
    pub numeric_filters: Vec<String>,
}

pub fn build_index_filters(state: &FilterState) -> IndexFilters {
    let equality_fields = [
        ("make", &state.make),
        ("model", &state.model),
        ("generation", &state.generation),
        ("fuelType", &state.fuel_type),
        ("bodyType", &state.body_type),
        ("transmission", &state.transmission),
        ("driveType", &state.drive_type),
        ("color", &state.color),
        ("location", &state.location),
    ];

    let filters = equality_fields
        .into_iter()
        .filter_map(|(field, value)| {
            value.as_ref().map(|v| format!("{}:\"{}\"", field, escape_quoted(v)))
        })
        .collect::<Vec<_>>()
        .join(" AND ");

    let mut numeric_filters = Vec::new();
    if let Some(min) = state.price_min {
        numeric_filters.push(format!("price >= {}", format_number(min)));
    }
    if let Some(max) = state.price_max {
        numeric_filters.push(format!("price <= {}", format_number(max)));
    }
    if let Some(min) = state.year_min {
        numeric_filters.push(format!("year >= {}", min));
    }
    if let Some(max) = state.year_max {
        numeric_filters.push(format!("year <= {}", max));
    }
    if let Some(max) = state.mileage_max {
        numeric_filters.push(format!("mileage <= {}", format_number(max)));
    }

    IndexFilters { filters, numeric_filters }
}

fn escape_quoted(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::SearchFilters;

    fn state() -> FilterState {
        SearchFilters {
            make: Some("BMW".to_string()),
            model: Some("X5".to_string()),
            transmission: Some("Automatic".to_string()),
            fuel_type: Some("Diesel".to_string()),
            price_min: Some(5_000.0),
            price_max: Some(40_000.0),
            year_min: Some(2015.0),
            mileage_max: Some(150_000.0),
            color: Some("Black".to_string()),
            ..Default::default()
        }
        .normalize()
    }

    #[test]
    fn store_constraints_are_ordered_equality_then_range() {
        let constraints = build_store_constraints(&state());
        let shape: Vec<(&str, StoreOp)> = constraints.iter().map(|c| (c.field, c.op)).collect();

        assert_eq!(
            shape,
            vec![
                ("make", StoreOp::Equal),
                ("model", StoreOp::Equal),
                ("fuelType", StoreOp::Equal),
                ("transmission", StoreOp::Equal),
                ("price", StoreOp::GreaterOrEqual),
                ("price", StoreOp::LessOrEqual),
                ("year", StoreOp::GreaterOrEqual),
            ]
        );
        assert_eq!(constraints[4].value, StoreValue::Number(5_000.0));
        assert_eq!(constraints[0].value, StoreValue::Text("BMW".to_string()));
    }

    #[test]
    fn empty_state_compiles_to_no_constraints() {
        assert!(build_store_constraints(&FilterState::default()).is_empty());
        assert_eq!(build_index_filters(&FilterState::default()), IndexFilters::default());
    }

    #[test]
    fn sort_keys_map_to_single_field_orderings() {
        assert_eq!(
            build_store_sort(SortKey::Recent),
            OrderBy { field: "createdAt", direction: Direction::Descending }
        );
        assert_eq!(
            build_store_sort(SortKey::PriceAsc),
            OrderBy { field: "price", direction: Direction::Ascending }
        );
        assert_eq!(
            build_store_sort(SortKey::YearDesc),
            OrderBy { field: "year", direction: Direction::Descending }
        );
        assert_eq!(
            build_store_sort(SortKey::MileageAsc),
            OrderBy { field: "mileage", direction: Direction::Ascending }
        );
    }

    #[test]
    fn unknown_sort_key_fails_closed_to_recent() {
        let sort = |raw: &str| build_store_sort(SortKey::parse_or_recent(raw));
        assert_eq!(sort("most_popular"), build_store_sort(SortKey::Recent));
        assert_eq!(sort("PRICE_DESC"), build_store_sort(SortKey::PriceDesc));
    }

    #[test]
    fn index_filters_use_separate_channels() {
        let filters = build_index_filters(&state());

        assert_eq!(
            filters.filters,
            "make:\"BMW\" AND model:\"X5\" AND fuelType:\"Diesel\" AND transmission:\"Automatic\" AND color:\"Black\""
        );
        assert_eq!(
            filters.numeric_filters,
            vec!["price >= 5000", "price <= 40000", "year >= 2015", "mileage <= 150000"]
        );
    }

    #[test]
    fn index_filter_values_are_escaped() {
        let state = SearchFilters { model: Some("Say \"Hi\"".to_string()), ..Default::default() }.normalize();
        assert_eq!(build_index_filters(&state).filters, "model:\"Say \\\"Hi\\\"\"");
    }
}
