// Multi-collection search over the document store: picks target collections,
// fans queries out concurrently, then merges, filters, deduplicates and re-sorts.

use futures::future::join_all;
use std::collections::{HashMap, HashSet};

use crate::collections::Collection;
use crate::error::{BackendError, BackendResult};
use crate::filters::FilterState;
use crate::firestore::{DocumentStore, MAX_BATCH_IDS};
use crate::models::{Listing, ListingStatus, SortKey};
use crate::normalize::{RawRecord, normalize, normalize_all};
use crate::query::{StoreConstraint, StoreQuery, build_store_constraints, build_store_sort};

/// Per-collection cap for full-catalog scans.
pub const FETCH_ALL_PAGE_SIZE: u32 = 20;

pub struct StoreSearch<S> {
    store: S,
}

impl<S: DocumentStore> StoreSearch<S> {
    pub fn new(store: S) -> Self {
        StoreSearch { store }
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    /// Searches the store, degrading to an empty list on failure.
    pub async fn search(&self, state: &FilterState) -> Vec<Listing> {
        self.try_search(state).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Store search failed, returning no listings");
            Vec::new()
        })
    }

    /// Like `search`, but reports an error when every target collection failed.
    /// A failing collection on its own only removes that collection's results.
    async fn try_search(&self, state: &FilterState) -> BackendResult<Vec<Listing>> {
        let targets = Collection::targets_for(state.body_type.as_deref());
        tracing::debug!(
            collections = ?targets.iter().map(Collection::name).collect::<Vec<_>>(),
            sort = state.sort.as_str(),
            limit = state.limit,
            "Searching store collections"
        );

        let queries = targets.iter().map(|collection| StoreQuery {
            collection: collection.name(),
            constraints: active_constraints(build_store_constraints(state)),
            order_by: Some(build_store_sort(state.sort)),
            limit: state.limit,
        });

        let records = self.fan_out(queries.collect()).await?;

        let mut listings = normalize_all(&records);
        listings.retain(|listing| matches_residual(listing, state));
        dedupe(&mut listings);
        // Each collection was sorted and capped independently
        listings.sort_by(|a, b| state.sort.compare(a, b));

        tracing::info!(count = listings.len(), "Store search complete");
        Ok(listings)
    }

    /// Recent active listings from every collection, for full-catalog views.
    pub async fn fetch_all_active(&self) -> Vec<Listing> {
        let queries = Collection::ALL
            .iter()
            .map(|collection| StoreQuery {
                collection: collection.name(),
                constraints: active_constraints(Vec::new()),
                order_by: Some(build_store_sort(SortKey::Recent)),
                limit: FETCH_ALL_PAGE_SIZE,
            })
            .collect();

        match self.fan_out(queries).await {
            Ok(records) => {
                let mut listings = normalize_all(&records);
                dedupe(&mut listings);
                listings.sort_by(|a, b| SortKey::Recent.compare(a, b));
                listings
            }
            Err(e) => {
                tracing::warn!(error = %e, "Fetching all active listings failed");
                Vec::new()
            }
        }
    }

    /// Probes every collection in priority order and returns the first hit.
    /// Ids are only unique per collection, so a later collection holding the same
    /// id is never consulted.
    pub async fn fetch_by_id(&self, id: &str) -> Option<Listing> {
        let id = id.trim();
        if id.is_empty() {
            return None;
        }

        for collection in Collection::ALL {
            match self.store.get(collection.name(), id).await {
                Ok(Some(record)) => {
                    tracing::debug!(id, collection = collection.name(), "Listing found");
                    return Some(normalize(&record));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(id, collection = collection.name(), error = %e, "Lookup failed, trying next collection");
                }
            }
        }

        tracing::debug!(id, "Listing not found in any collection");
        None
    }

    /// Resolves a list of ids against the most-populous collections only.
    ///
    /// Only the first MAX_BATCH_IDS ids are looked up; the rest are dropped (with a
    /// warning) because one batched query can't carry more. Results follow the
    /// order of `ids`.
    pub async fn fetch_by_ids(&self, ids: &[String]) -> Vec<Listing> {
        if ids.len() > MAX_BATCH_IDS {
            tracing::warn!(
                requested = ids.len(),
                resolved = MAX_BATCH_IDS,
                "Id batch truncated to the batch lookup limit"
            );
        }
        let batch: Vec<String> = ids.iter().take(MAX_BATCH_IDS).cloned().collect();
        if batch.is_empty() {
            return Vec::new();
        }

        let lookups = Collection::BATCH_LOOKUP
            .iter()
            .map(|collection| self.store.get_many(collection.name(), &batch));
        let results = join_all(lookups).await;

        // First collection in priority order wins for a given id
        let mut found: HashMap<String, RawRecord> = HashMap::new();
        for (collection, result) in Collection::BATCH_LOOKUP.iter().zip(results) {
            match result {
                Ok(records) => {
                    for record in records {
                        found.entry(record.id().to_string()).or_insert(record);
                    }
                }
                Err(e) => {
                    tracing::warn!(collection = collection.name(), error = %e, "Batch lookup failed for collection");
                }
            }
        }

        let mut seen = HashSet::new();
        batch
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .filter_map(|id| found.get(id))
            .map(normalize)
            .collect()
    }

    // Runs every query concurrently. Failed collections contribute nothing;
    // only when all of them fail is the first error returned.
    async fn fan_out(&self, queries: Vec<StoreQuery>) -> BackendResult<Vec<RawRecord>> {
        let results = join_all(queries.iter().map(|q| self.store.run_query(q))).await;

        let mut records = Vec::new();
        let mut first_error: Option<BackendError> = None;
        let mut succeeded = 0usize;
        for (query, result) in queries.iter().zip(results) {
            match result {
                Ok(found) => {
                    tracing::debug!(collection = query.collection, count = found.len(), "Collection query complete");
                    succeeded += 1;
                    records.extend(found);
                }
                Err(e) => {
                    tracing::warn!(collection = query.collection, error = %e, "Collection query failed, skipping it");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if succeeded == 0 => Err(e),
            _ => Ok(records),
        }
    }
}

fn active_constraints(mut constraints: Vec<StoreConstraint>) -> Vec<StoreConstraint> {
    constraints.push(StoreConstraint::equals("status", "active"));
    constraints
}

// Filters the store can't express without extra composite indexes, applied to
// the normalized results instead.
fn matches_residual(listing: &Listing, state: &FilterState) -> bool {
    let same = |wanted: &Option<String>, actual: Option<&str>| match wanted {
        Some(w) => actual.is_some_and(|a| a.eq_ignore_ascii_case(w)),
        None => true,
    };

    same(&state.generation, listing.generation.as_deref())
        && same(&state.drive_type, listing.drive_type.as_deref())
        && same(&state.color, listing.color.as_deref())
        && same(&state.location, Some(listing.location.as_str()))
        && state.mileage_max.is_none_or(|max| listing.mileage <= max)
        && listing.status == ListingStatus::Active
}

// Drops repeats of the same (collection, id); never merges across collections
fn dedupe(listings: &mut Vec<Listing>) {
    let mut seen = HashSet::new();
    listings.retain(|listing| seen.insert((listing.collection.clone(), listing.id.clone())));
}
