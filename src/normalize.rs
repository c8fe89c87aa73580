// Total, defensive mapping from raw upstream records to the canonical Listing.
// This is the only place allowed to look inside a RawRecord.

use chrono::DateTime;
use serde_json::{Map, Value};

use crate::models::{Coordinates, Listing, ListingStatus};

const DEFAULT_CURRENCY: &str = "EUR";
const DEFAULT_FUEL_TYPE: &str = "Other";
const DEFAULT_TRANSMISSION: &str = "Manual";
const DEFAULT_LOCATION: &str = "Bulgaria";
const DEFAULT_CONDITION: &str = "used";
const INDEX_SOURCE: &str = "index";

/// An untrusted document as it came out of a backend. Its fields are opaque to
/// everything except `normalize`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    id: String,
    collection: String,
    fields: Value,
}

impl RawRecord {
    pub fn new(id: impl Into<String>, collection: impl Into<String>, fields: Value) -> Self {
        RawRecord { id: id.into(), collection: collection.into(), fields }
    }

    /// Wraps a hosted-index hit; its identity lives in `objectID` (or `id`).
    pub fn from_index_hit(hit: Value) -> Self {
        let id = hit
            .get("objectID")
            .or_else(|| hit.get("id"))
            .and_then(scalar_to_string)
            .unwrap_or_default();
        RawRecord { id, collection: INDEX_SOURCE.to_string(), fields: hit }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

pub fn normalize(raw: &RawRecord) -> Listing {
    // Anything that isn't an object normalizes like an empty document
    let empty = Map::new();
    let fields = raw.fields.as_object().unwrap_or(&empty);
    let seller = fields.get("seller").and_then(Value::as_object);

    let make = text(fields, &["make", "brand"]).unwrap_or_default();
    let model = text(fields, &["model"]).unwrap_or_default();
    let title = text(fields, &["title", "name"])
        .unwrap_or_else(|| format!("{} {}", make, model).trim().to_string());

    let id = Some(raw.id.trim())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .or_else(|| text(fields, &["id"]))
        .unwrap_or_default();

    Listing {
        id,
        collection: raw.collection.clone(),
        title,
        make,
        model,
        generation: text(fields, &["generation"]),
        year: number(fields, &["year", "firstRegistrationYear"])
            .filter(|y| *y >= 0.0 && *y <= u32::MAX as f64)
            .map(|y| y.trunc() as u32)
            .unwrap_or(0),
        price: number(fields, &["price"]).unwrap_or(0.0),
        currency: text(fields, &["currency"]).unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        mileage: number(fields, &["mileage", "km", "odometer"]).unwrap_or(0.0),
        fuel_type: text(fields, &["fuelType", "fuel"])
            .unwrap_or_else(|| DEFAULT_FUEL_TYPE.to_string()),
        transmission: text(fields, &["transmission", "gearbox"])
            .unwrap_or_else(|| DEFAULT_TRANSMISSION.to_string()),
        body_type: text(fields, &["bodyType", "category"]),
        drive_type: text(fields, &["driveType", "drivetrain"]),
        power: number(fields, &["power", "horsepower", "hp"]),
        color: text(fields, &["color", "colour"]),
        images: images(fields),
        location: location(fields),
        coordinates: coordinates(fields),
        created_at: created_at(fields),
        status: text(fields, &["status"])
            .and_then(|s| ListingStatus::parse(&s))
            .unwrap_or_default(),
        condition: condition(fields),
        seller_id: text(fields, &["sellerId", "userId", "ownerId"])
            .or_else(|| seller.and_then(|s| text(s, &["id", "uid"])))
            .unwrap_or_default(),
        seller_numeric_id: number(fields, &["sellerNumericId"])
            .or_else(|| seller.and_then(|s| number(s, &["numericId"])))
            .filter(|n| n.fract() == 0.0)
            .map(|n| n as i64),
        seller_name: text(fields, &["sellerName"])
            .or_else(|| seller.and_then(|s| text(s, &["name", "displayName"]))),
        seller_phone: text(fields, &["sellerPhone", "phone"])
            .or_else(|| seller.and_then(|s| text(s, &["phone", "phoneNumber"]))),
    }
}

pub fn normalize_all(records: &[RawRecord]) -> Vec<Listing> {
    records.iter().map(normalize).collect()
}

// --- Field readers ---

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// First non-empty string (or number rendered as text) among `keys`
fn text(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| fields.get(*key).and_then(scalar_to_string))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s.chars().filter(|c| !c.is_whitespace() && *c != ',').collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    }
    .filter(|n| n.is_finite())
}

fn number(fields: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| fields.get(*key).and_then(as_number))
}

fn images(fields: &Map<String, Value>) -> Vec<String> {
    let from_list = |value: &Value| -> Option<Vec<String>> {
        let items = value.as_array()?;
        Some(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
                    Value::Object(obj) => text(obj, &["url", "uri", "src"]),
                    _ => None,
                })
                .collect(),
        )
    };

    fields
        .get("images")
        .and_then(from_list)
        .or_else(|| fields.get("imageUrls").and_then(from_list))
        .or_else(|| fields.get("photos").and_then(from_list))
        .or_else(|| text(fields, &["image", "imageUrl"]).map(|url| vec![url]))
        .unwrap_or_default()
}

fn location(fields: &Map<String, Value>) -> String {
    if let Some(location) = fields.get("location") {
        match location {
            Value::String(s) if !s.trim().is_empty() => return s.trim().to_string(),
            Value::Object(obj) => {
                if let Some(place) = join_place(obj) {
                    return place;
                }
            }
            _ => {}
        }
    }

    join_place(fields).unwrap_or_else(|| DEFAULT_LOCATION.to_string())
}

// "city, region" from whichever parts are present
fn join_place(fields: &Map<String, Value>) -> Option<String> {
    let parts: Vec<String> = [text(fields, &["city", "town"]), text(fields, &["region", "province"])]
        .into_iter()
        .flatten()
        .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}

fn coordinates(fields: &Map<String, Value>) -> Option<Coordinates> {
    let pair = |obj: &Map<String, Value>| -> Option<Coordinates> {
        let lat = number(obj, &["lat", "latitude", "_latitude"])?;
        let lng = number(obj, &["lng", "lon", "longitude", "_longitude"])?;
        ((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng))
            .then_some(Coordinates { lat, lng })
    };

    ["coordinates", "geo", "_geoloc", "location"]
        .iter()
        .find_map(|key| fields.get(*key).and_then(Value::as_object).and_then(pair))
        .or_else(|| pair(fields))
}

/// Creation time in epoch milliseconds. Accepts a database timestamp object
/// ({seconds, nanoseconds} or {_seconds, _nanoseconds}), a millisecond number,
/// an RFC 3339 string, or a Unix-seconds field.
fn created_at(fields: &Map<String, Value>) -> i64 {
    let from_value = |value: &Value| -> Option<i64> {
        match value {
            Value::Object(obj) => {
                let seconds = number(obj, &["seconds", "_seconds"])?;
                let nanos = number(obj, &["nanoseconds", "_nanoseconds", "nanos"]).unwrap_or(0.0);
                Some((seconds * 1000.0 + nanos / 1_000_000.0).trunc() as i64)
            }
            Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
                .map(|dt| dt.timestamp_millis())
                .ok()
                .or_else(|| as_number(value).map(|ms| ms.trunc() as i64)),
            Value::Number(_) => as_number(value).map(|ms| ms.trunc() as i64),
            _ => None,
        }
    };

    fields
        .get("createdAt")
        .and_then(from_value)
        .or_else(|| {
            number(fields, &["createdAtSeconds", "timestamp"]).map(|s| (s * 1000.0).trunc() as i64)
        })
        .unwrap_or(0)
}

fn condition(fields: &Map<String, Value>) -> String {
    if let Some(condition) = text(fields, &["condition"]) {
        return condition.to_lowercase();
    }
    match fields.get("isNew").and_then(Value::as_bool) {
        Some(true) => "new".to_string(),
        _ => DEFAULT_CONDITION.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(fields: Value) -> RawRecord {
        RawRecord::new("abc", "cars", fields)
    }

    #[test]
    fn empty_record_gets_every_default() {
        let listing = normalize(&record(json!({})));

        assert_eq!(listing.id, "abc");
        assert_eq!(listing.collection, "cars");
        assert_eq!(listing.title, "");
        assert_eq!(listing.price, 0.0);
        assert_eq!(listing.currency, "EUR");
        assert!(listing.images.is_empty());
        assert_eq!(listing.fuel_type, "Other");
        assert_eq!(listing.transmission, "Manual");
        assert_eq!(listing.location, "Bulgaria");
        assert_eq!(listing.condition, "used");
        assert_eq!(listing.status, ListingStatus::Active);
        assert_eq!(listing.created_at, 0);
        assert_eq!(listing.coordinates, None);
        assert_eq!(listing.seller_id, "");
    }

    #[test]
    fn malformed_records_never_fail() {
        for fields in [
            Value::Null,
            json!("not an object"),
            json!([1, 2, 3]),
            json!({
                "price": {"amount": 10},
                "images": "one.jpg",
                "createdAt": [],
                "seller": "someone",
                "location": null,
                "year": -4,
                "mileage": true,
                "extra": {"deeply": {"nested": null}},
            }),
        ] {
            let listing = normalize(&record(fields));
            assert_eq!(listing.price, 0.0);
            assert_eq!(listing.year, 0);
            assert_eq!(listing.mileage, 0.0);
            assert!(listing.images.is_empty());
            assert_eq!(listing.location, "Bulgaria");
        }
    }

    #[test]
    fn derives_title_and_reads_alternate_fields() {
        let listing = normalize(&record(json!({
            "make": "Toyota",
            "model": "Corolla",
            "price": "12 500",
            "fuel": "Hybrid",
            "gearbox": "Automatic",
            "km": 98000,
            "isNew": true,
            "city": "Plovdiv",
            "region": "Plovdiv Province",
            "imageUrls": ["a.jpg", {"url": "b.jpg"}, 7],
            "seller": {"id": "u1", "numericId": 42, "displayName": "Ivan", "phone": "+359 88"},
        })));

        assert_eq!(listing.title, "Toyota Corolla");
        assert_eq!(listing.price, 12_500.0);
        assert_eq!(listing.fuel_type, "Hybrid");
        assert_eq!(listing.transmission, "Automatic");
        assert_eq!(listing.mileage, 98_000.0);
        assert_eq!(listing.condition, "new");
        assert_eq!(listing.location, "Plovdiv, Plovdiv Province");
        assert_eq!(listing.images, vec!["a.jpg", "b.jpg"]);
        assert_eq!(listing.seller_id, "u1");
        assert_eq!(listing.seller_numeric_id, Some(42));
        assert_eq!(listing.seller_name.as_deref(), Some("Ivan"));
        assert_eq!(listing.seller_phone.as_deref(), Some("+359 88"));
    }

    #[test]
    fn explicit_condition_wins_over_is_new() {
        let listing = normalize(&record(json!({"condition": "Damaged", "isNew": true})));
        assert_eq!(listing.condition, "damaged");
    }

    #[test]
    fn created_at_is_normalized_to_millis() {
        let cases = [
            (json!({"createdAt": {"seconds": 1_700_000_000, "nanoseconds": 500_000_000}}), 1_700_000_000_500),
            (json!({"createdAt": {"_seconds": 1_700_000_000, "_nanoseconds": 0}}), 1_700_000_000_000),
            (json!({"createdAt": 1_700_000_000_123_i64}), 1_700_000_000_123),
            (json!({"createdAt": "2023-11-14T22:13:20Z"}), 1_700_000_000_000),
            (json!({"createdAtSeconds": 1_700_000_000}), 1_700_000_000_000),
        ];
        for (fields, expected) in cases {
            assert_eq!(normalize(&record(fields)).created_at, expected);
        }
    }

    #[test]
    fn reads_status_and_coordinates() {
        let listing = normalize(&record(json!({
            "status": "SOLD",
            "location": {"city": "Sofia", "lat": 42.69, "lng": 23.32},
        })));
        assert_eq!(listing.status, ListingStatus::Sold);
        assert_eq!(listing.location, "Sofia");
        assert_eq!(listing.coordinates, Some(Coordinates { lat: 42.69, lng: 23.32 }));

        let unknown = normalize(&record(json!({"status": "archived", "coordinates": {"lat": 500, "lng": 1}})));
        assert_eq!(unknown.status, ListingStatus::Active);
        assert_eq!(unknown.coordinates, None);
    }

    #[test]
    fn normalization_is_idempotent() {
        let raw = record(json!({
            "make": "Skoda",
            "model": "Octavia",
            "generation": "Mk3",
            "year": 2017,
            "price": 14_900,
            "mileage": 120_000,
            "bodyType": "wagon",
            "power": 150,
            "images": ["1.jpg"],
            "city": "Varna",
            "createdAt": {"seconds": 1_650_000_000, "nanoseconds": 0},
            "status": "active",
            "sellerId": "s-1",
            "sellerPhone": "0888",
            "coordinates": {"lat": 43.2, "lng": 27.9},
        }));
        let once = normalize(&raw);
        let twice = normalize(&RawRecord::new(
            once.id.clone(),
            once.collection.clone(),
            serde_json::to_value(&once).expect("listing serializes"),
        ));

        assert_eq!(once, twice);
    }

    #[test]
    fn index_hits_use_object_id() {
        let hits = vec![RawRecord::from_index_hit(json!({"objectID": "h1", "make": "Audi", "model": "A6", "price": 30000}))];
        let listings = normalize_all(&hits);

        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].id, "h1");
        assert_eq!(listings[0].collection, "index");
        assert_eq!(listings[0].title, "Audi A6");
        assert!(normalize_all(&[]).is_empty());
    }
}
