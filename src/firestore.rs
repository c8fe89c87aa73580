// Document store access: the DocumentStore contract and its Firestore REST implementation

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::{collections::HashMap, env};
use yup_oauth2::ServiceAccountAuthenticator;
use yup_oauth2::authenticator::{Authenticator, DefaultHyperClient, HyperClientBuilder};

use crate::config::Settings;
use crate::error::{BackendError, BackendResult};
use crate::filters::format_number;
use crate::normalize::RawRecord;
use crate::query::{Direction, StoreConstraint, StoreQuery, StoreValue};

const BACKEND: &str = "firestore";

/// Largest id list a single batched lookup may carry.
pub const MAX_BATCH_IDS: usize = 10;

const FIRESTORE_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/datastore", // Firestore scope
    "https://www.googleapis.com/auth/cloud-platform", // General cloud scope
];

// Service-account authenticator; caches tokens and refreshes them before expiry
type TokenSource = Authenticator<<DefaultHyperClient as HyperClientBuilder>::Connector>;

/// Read-only operations the search subsystem needs from the document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Runs a filtered, ordered, limited query on one collection.
    async fn run_query(&self, query: &StoreQuery) -> BackendResult<Vec<RawRecord>>;

    /// Fetches one document; `Ok(None)` when it does not exist.
    async fn get(&self, collection: &'static str, id: &str) -> BackendResult<Option<RawRecord>>;

    /// Fetches the documents among `ids` (at most MAX_BATCH_IDS) that exist.
    async fn get_many(&self, collection: &'static str, ids: &[String]) -> BackendResult<Vec<RawRecord>>;
}

pub struct FirestoreClient {
    http: Client,
    base_url: String,
    project_id: String,
    auth: Option<TokenSource>,
}

impl FirestoreClient {
    /// Builds one authenticator from the service account key named by
    /// GOOGLE_APPLICATION_CREDENTIALS. Without it the client talks to the endpoint
    /// unauthenticated (emulator mode).
    pub async fn connect(settings: &Settings, http: Client) -> anyhow::Result<Self> {
        let project_id = settings
            .firebase_project_id
            .clone()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("Firebase project ID not configured"))?;

        let auth = match env::var("GOOGLE_APPLICATION_CREDENTIALS") {
            Ok(creds_path) => {
                let key = yup_oauth2::read_service_account_key(&creds_path)
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to read service account key file: {}", e))?;
                let auth = ServiceAccountAuthenticator::builder(key)
                    .build()
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to create service account authenticator: {}", e))?;
                Some(auth)
            }
            Err(_) => {
                tracing::warn!("GOOGLE_APPLICATION_CREDENTIALS not set, Firestore requests will be unauthenticated");
                None
            }
        };

        Ok(FirestoreClient {
            http,
            base_url: settings.firestore_base_url.trim_end_matches('/').to_string(),
            project_id,
            auth,
        })
    }

    fn documents_root(&self) -> String {
        format!("projects/{}/databases/(default)/documents", self.project_id)
    }

    // Attaches the cached OAuth2 bearer token when running with credentials
    async fn authorize(&self, request: RequestBuilder) -> BackendResult<RequestBuilder> {
        let Some(auth) = &self.auth else {
            return Ok(request);
        };

        let token = auth
            .token(&FIRESTORE_SCOPES)
            .await
            .map_err(|e| BackendError::Auth(format!("Failed to get OAuth2 token: {}", e)))?;
        let bearer = token
            .token()
            .ok_or_else(|| BackendError::Auth("Token string is empty".to_string()))?;

        Ok(request.bearer_auth(bearer))
    }

    async fn structured_query(&self, collection: &'static str, structured_query: Value) -> BackendResult<Vec<RawRecord>> {
        let url = format!("{}/{}:runQuery", self.base_url, self.documents_root());
        let body = json!({ "structuredQuery": structured_query });
        tracing::debug!(collection, body = %body, "Running Firestore query");

        let request = self.authorize(self.http.post(&url).json(&body)).await?;
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status { backend: BACKEND, status });
        }

        let items: Vec<RunQueryItem> = response.json().await.map_err(|e| BackendError::Malformed {
            backend: BACKEND,
            message: format!("runQuery response: {}", e),
        })?;

        Ok(items
            .into_iter()
            .filter_map(|item| item.document)
            .filter_map(|doc| doc.into_record(collection))
            .collect())
    }
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    async fn run_query(&self, query: &StoreQuery) -> BackendResult<Vec<RawRecord>> {
        let mut structured = Map::new();
        structured.insert("from".to_string(), json!([{ "collectionId": query.collection }]));
        if let Some(filter) = where_clause(&query.constraints) {
            structured.insert("where".to_string(), filter);
        }
        if let Some(order) = query.order_by {
            let direction = match order.direction {
                Direction::Ascending => "ASCENDING",
                Direction::Descending => "DESCENDING",
            };
            structured.insert(
                "orderBy".to_string(),
                json!([{ "field": { "fieldPath": order.field }, "direction": direction }]),
            );
        }
        structured.insert("limit".to_string(), json!(query.limit));

        self.structured_query(query.collection, Value::Object(structured)).await
    }

    async fn get(&self, collection: &'static str, id: &str) -> BackendResult<Option<RawRecord>> {
        // Such ids can't name a document and would corrupt the URL path
        if id.is_empty() || id.contains(['/', '?', '#']) {
            return Ok(None);
        }

        let url = format!("{}/{}/{}/{}", self.base_url, self.documents_root(), collection, id);
        let request = self.authorize(self.http.get(&url)).await?;
        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status { backend: BACKEND, status });
        }

        let doc: FirestoreDocument = response.json().await.map_err(|e| BackendError::Malformed {
            backend: BACKEND,
            message: format!("document response: {}", e),
        })?;
        Ok(doc.into_record(collection))
    }

    async fn get_many(&self, collection: &'static str, ids: &[String]) -> BackendResult<Vec<RawRecord>> {
        let root = self.documents_root();
        let references: Vec<Value> = ids
            .iter()
            .filter(|id| !id.is_empty() && !id.contains('/'))
            .map(|id| json!({ "referenceValue": format!("{}/{}/{}", root, collection, id) }))
            .collect();
        if references.is_empty() {
            return Ok(Vec::new());
        }

        let structured = json!({
            "from": [{ "collectionId": collection }],
            "where": {
                "fieldFilter": {
                    "field": { "fieldPath": "__name__" },
                    "op": "IN",
                    "value": { "arrayValue": { "values": references } },
                }
            },
        });
        self.structured_query(collection, structured).await
    }
}

// --- Firestore Request Helpers ---

fn where_clause(constraints: &[StoreConstraint]) -> Option<Value> {
    let mut filters: Vec<Value> = constraints.iter().map(field_filter).collect();
    match filters.len() {
        0 => None,
        1 => filters.pop(),
        _ => Some(json!({ "compositeFilter": { "op": "AND", "filters": filters } })),
    }
}

fn field_filter(constraint: &StoreConstraint) -> Value {
    json!({
        "fieldFilter": {
            "field": { "fieldPath": constraint.field },
            "op": constraint.op.as_firestore(),
            "value": encode_value(&constraint.value),
        }
    })
}

fn encode_value(value: &StoreValue) -> Value {
    match value {
        StoreValue::Text(s) => json!({ "stringValue": s }),
        // Firestore compares integers and doubles numerically
        StoreValue::Number(n) if n.fract() == 0.0 && n.abs() < 9e15 => {
            json!({ "integerValue": format_number(*n) })
        }
        StoreValue::Number(n) => json!({ "doubleValue": n }),
    }
}

// --- Firestore Response Structures ---

#[derive(Deserialize, Debug)]
struct RunQueryItem {
    document: Option<FirestoreDocument>,
}

#[derive(Deserialize, Debug)]
struct FirestoreDocument {
    name: String,
    #[serde(default)]
    fields: HashMap<String, FirestoreValue>,
}

impl FirestoreDocument {
    fn into_record(self, collection: &'static str) -> Option<RawRecord> {
        let Some(doc_id) = extract_doc_id(&self.name) else {
            tracing::warn!("Could not extract document ID from {}", self.name);
            return None;
        };
        Some(RawRecord::new(doc_id, collection, fields_to_json(self.fields)))
    }
}

// One typed Firestore value. Exactly one member is set; none means nullValue.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct FirestoreValue {
    string_value: Option<String>,
    integer_value: Option<Value>, // Encoded as a string in REST responses
    double_value: Option<Value>,  // May be "NaN" / "Infinity"
    boolean_value: Option<bool>,
    timestamp_value: Option<String>,
    reference_value: Option<String>,
    geo_point_value: Option<GeoPoint>,
    array_value: Option<FirestoreArrayValue>,
    map_value: Option<FirestoreMapValue>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct FirestoreArrayValue {
    values: Vec<FirestoreValue>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct FirestoreMapValue {
    fields: HashMap<String, FirestoreValue>,
}

impl FirestoreValue {
    fn into_json(self) -> Value {
        if let Some(s) = self.string_value {
            return Value::String(s);
        }
        if let Some(raw) = self.integer_value {
            return match &raw {
                Value::String(s) => s.parse::<i64>().map(Value::from).unwrap_or(raw),
                _ => raw,
            };
        }
        if let Some(raw) = self.double_value {
            return match &raw {
                Value::Number(_) => raw,
                // Non-finite doubles have no JSON number form
                _ => Value::Null,
            };
        }
        if let Some(b) = self.boolean_value {
            return Value::Bool(b);
        }
        if let Some(ts) = self.timestamp_value {
            return timestamp_to_json(&ts);
        }
        if let Some(reference) = self.reference_value {
            return Value::String(reference);
        }
        if let Some(point) = self.geo_point_value {
            return json!({ "latitude": point.latitude, "longitude": point.longitude });
        }
        if let Some(array) = self.array_value {
            return Value::Array(array.values.into_iter().map(FirestoreValue::into_json).collect());
        }
        if let Some(map) = self.map_value {
            return fields_to_json(map.fields);
        }
        Value::Null
    }
}

fn fields_to_json(fields: HashMap<String, FirestoreValue>) -> Value {
    Value::Object(fields.into_iter().map(|(k, v)| (k, v.into_json())).collect())
}

// Timestamps become the {seconds, nanoseconds} shape of a database timestamp
fn timestamp_to_json(raw: &str) -> Value {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => json!({ "seconds": dt.timestamp(), "nanoseconds": dt.timestamp_subsec_nanos() }),
        Err(_) => Value::String(raw.to_string()),
    }
}

// Helper to extract document ID from the full name path
fn extract_doc_id(name: &str) -> Option<String> {
    name.rsplit('/').next().filter(|s| !s.is_empty()).map(|s| s.to_string())
}
