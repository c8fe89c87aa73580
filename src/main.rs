use anyhow::{Context, Result};
use axum::{Router, extract::FromRef};
use reqwest::Client;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::algolia::AlgoliaClient;
use crate::config::Settings;
use crate::firestore::FirestoreClient;
use crate::selector::SearchService;

// Declare modules
mod algolia;
mod collections;
mod config;
mod error;
mod filters;
mod firestore;
mod models;
mod normalize;
mod query;
mod routes;
mod search;
mod selector;

pub type ListingSearch = SearchService<FirestoreClient, AlgoliaClient>;

// Shared application state: settings plus the long-lived search service
#[derive(Clone, FromRef)]
pub struct AppState {
    settings: Arc<Settings>,
    search: Arc<ListingSearch>,
}

// One HTTP client for both backends, honouring the proxy and timeout settings
fn build_http_client(settings: &Settings) -> Result<Client> {
    let mut builder = Client::builder()
        .user_agent(concat!("listing_search/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_millis(settings.request_timeout_ms));

    if let Some(proxy_url) = settings.proxy_url.as_deref().filter(|p| !p.is_empty()) {
        let proxy = reqwest::Proxy::all(proxy_url).context("Invalid proxy_url in configuration")?;
        builder = builder.proxy(proxy);
        tracing::info!("Routing backend requests through the configured proxy.");
    }

    builder.build().context("Failed to build shared reqwest client")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file first. Ignore errors (e.g., file not found)
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "listing_search=info,tower_http=info".into()))
        .with(fmt::layer())
        .init();

    tracing::info!("Initializing listing search server...");

    let settings = match Settings::new() {
        Ok(s) => {
            tracing::info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };
    let shared_settings = Arc::new(settings);

    let http_client = build_http_client(&shared_settings)?;
    tracing::info!("Shared HTTP client created.");

    // Backend clients are built once and injected; neither holds per-search state
    let store = FirestoreClient::connect(&shared_settings, http_client.clone())
        .await
        .context("Failed to set up the Firestore client")?;
    let index = AlgoliaClient::new(&shared_settings, http_client);
    let search = Arc::new(SearchService::new(store, index));
    tracing::info!("Search service ready (index available: {}).", search.index_available());

    let app_state = AppState {
        settings: shared_settings.clone(),
        search,
    };

    let app: Router = routes::create_router(app_state.clone());

    // Parse the server address from settings
    let addr: SocketAddr = match app_state.settings.server_address.parse() {
        Ok(a) => a,
        Err(e) => {
            tracing::error!("Invalid server address format in configuration ('{}'): {}", app_state.settings.server_address, e);
            return Err(anyhow::anyhow!("Invalid server address format: {}", shared_settings.server_address));
        }
    };

    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => {
            tracing::info!("Server listening on {}", addr);
            l
        }
        Err(e) => {
            tracing::error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
