// Category-partitioned listing collections in the document store

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Cars,
    PassengerCars,
    Suvs,
    Vans,
    Motorcycles,
    Trucks,
    Buses,
}

impl Collection {
    /// Every collection, in the fixed priority order used for id lookups.
    pub const ALL: [Collection; 7] = [
        Collection::Cars,
        Collection::PassengerCars,
        Collection::Suvs,
        Collection::Vans,
        Collection::Motorcycles,
        Collection::Trucks,
        Collection::Buses,
    ];

    /// Queried when a search carries no body type. Covers the most common
    /// categories only; vans, motorcycles, trucks and buses need an explicit body type.
    pub const DEFAULT_SEARCH: [Collection; 3] =
        [Collection::Cars, Collection::PassengerCars, Collection::Suvs];

    /// Most-populous collections, probed by batched id lookups (favorites, history).
    pub const BATCH_LOOKUP: [Collection; 3] =
        [Collection::Cars, Collection::PassengerCars, Collection::Suvs];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Cars => "cars",
            Collection::PassengerCars => "passenger_cars",
            Collection::Suvs => "suvs",
            Collection::Vans => "vans",
            Collection::Motorcycles => "motorcycles",
            Collection::Trucks => "trucks",
            Collection::Buses => "buses",
        }
    }

    /// Maps a body-type hint to its collection. Unknown categories land in
    /// the passenger-car collection.
    pub fn for_body_type(body_type: &str) -> Collection {
        let normalized = body_type.trim().to_lowercase().replace(['-', '_', ' '], "");
        match normalized.as_str() {
            "suv" | "crossover" | "jeep" | "4x4" | "offroad" => Collection::Suvs,
            "van" | "minivan" | "minibus" | "cargovan" => Collection::Vans,
            "motorcycle" | "motorbike" | "moto" | "scooter" => Collection::Motorcycles,
            "truck" | "lorry" | "pickup" => Collection::Trucks,
            "bus" | "coach" => Collection::Buses,
            _ => Collection::PassengerCars,
        }
    }

    /// Collections a search should fan out to.
    pub fn targets_for(body_type: Option<&str>) -> Vec<Collection> {
        match body_type {
            Some(body) => vec![Collection::for_body_type(body)],
            None => Collection::DEFAULT_SEARCH.to_vec(),
        }
    }
}
