// Chooses the backend for each search: the hosted index when it is available,
// the multi-collection store search otherwise or when the index fails.

use crate::algolia::{IndexRequest, SearchIndex};
use crate::error::BackendResult;
use crate::filters::FilterState;
use crate::firestore::DocumentStore;
use crate::models::{Backend, Listing, SearchOutcome};
use crate::normalize::normalize_all;
use crate::search::StoreSearch;

pub struct SearchService<S, I> {
    store: StoreSearch<S>,
    index: I,
}

impl<S: DocumentStore, I: SearchIndex> SearchService<S, I> {
    pub fn new(store: S, index: I) -> Self {
        SearchService { store: StoreSearch::new(store), index }
    }

    pub fn index_available(&self) -> bool {
        self.index.is_available()
    }

    /// Never fails: index errors fall back to the store, and a failing store
    /// yields an empty outcome.
    pub async fn search(&self, state: &FilterState) -> SearchOutcome {
        if self.index.is_available() {
            match self.search_index(state).await {
                Ok(outcome) => return outcome,
                Err(e) => {
                    tracing::warn!(error = %e, "Index search failed, falling back to the document store");
                }
            }
        } else {
            tracing::debug!("Index unavailable, searching the document store");
        }

        SearchOutcome::from_store(self.store.search(state).await)
    }

    async fn search_index(&self, state: &FilterState) -> BackendResult<SearchOutcome> {
        let request = IndexRequest::from_filter_state(state);
        let response = self.index.search(&request).await?;
        tracing::info!(
            hits = response.hits.len(),
            total = response.total_hits,
            processing_time_ms = response.processing_time_ms,
            "Index search complete"
        );

        Ok(SearchOutcome {
            listings: normalize_all(&response.hits),
            total: response.total_hits,
            backend: Backend::Index,
        })
    }

    pub async fn fetch_all_active(&self) -> Vec<Listing> {
        self.store.fetch_all_active().await
    }

    pub async fn fetch_by_id(&self, id: &str) -> Option<Listing> {
        self.store.fetch_by_id(id).await
    }

    pub async fn fetch_by_ids(&self, ids: &[String]) -> Vec<Listing> {
        self.store.fetch_by_ids(ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algolia::IndexResponse;
    use crate::collections::Collection;
    use crate::error::BackendError;
    use crate::filters::SearchFilters;
    use crate::normalize::RawRecord;
    use crate::search::tests::{MockStore, car};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    enum IndexBehavior {
        Unavailable,
        Fails,
        Returns(Vec<serde_json::Value>, u64),
    }

    struct MockIndex {
        behavior: IndexBehavior,
        requests: Mutex<Vec<IndexRequest>>,
    }

    impl MockIndex {
        fn new(behavior: IndexBehavior) -> Self {
            MockIndex { behavior, requests: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl SearchIndex for MockIndex {
        fn is_available(&self) -> bool {
            !matches!(self.behavior, IndexBehavior::Unavailable)
        }

        async fn search(&self, request: &IndexRequest) -> BackendResult<IndexResponse> {
            self.requests.lock().unwrap().push(request.clone());
            match &self.behavior {
                IndexBehavior::Unavailable => Err(BackendError::IndexUnavailable),
                IndexBehavior::Fails => Err(BackendError::Malformed { backend: "mock", message: "index down".to_string() }),
                IndexBehavior::Returns(hits, total) => Ok(IndexResponse {
                    hits: hits.iter().cloned().map(RawRecord::from_index_hit).collect(),
                    total_hits: *total,
                    processing_time_ms: 1,
                }),
            }
        }
    }

    fn store() -> MockStore {
        MockStore::default()
            .with(Collection::Cars, vec![("c1", car("Honda", 8_000.0))])
            .with(Collection::Suvs, vec![("s1", car("Honda", 6_000.0))])
    }

    fn filters() -> FilterState {
        SearchFilters {
            make: Some("Honda".to_string()),
            sort: Some("price_asc".to_string()),
            ..Default::default()
        }
        .normalize()
    }

    #[tokio::test]
    async fn failing_index_falls_back_to_store_results() {
        let service = SearchService::new(store(), MockIndex::new(IndexBehavior::Fails));
        let store_only = StoreSearch::new(store()).search(&filters()).await;

        let outcome = service.search(&filters()).await;

        assert_eq!(outcome.backend, Backend::Store);
        assert_eq!(outcome.listings, store_only);
        assert_eq!(outcome.total, 2);
        let ids: Vec<&str> = outcome.listings.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "c1"]);
        assert_eq!(service.index.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unavailable_index_is_never_queried() {
        let service = SearchService::new(store(), MockIndex::new(IndexBehavior::Unavailable));

        let outcome = service.search(&filters()).await;

        assert_eq!(outcome.backend, Backend::Store);
        assert_eq!(outcome.listings.len(), 2);
        assert!(service.index.requests.lock().unwrap().is_empty());
        assert!(!service.index_available());
    }

    #[tokio::test]
    async fn index_results_keep_the_reported_total() {
        let hits = vec![json!({ "objectID": "h1", "make": "Honda", "model": "Civic", "price": 7_500 })];
        let service = SearchService::new(store(), MockIndex::new(IndexBehavior::Returns(hits, 134)));

        let outcome = service.search(&filters()).await;

        assert_eq!(outcome.backend, Backend::Index);
        assert_eq!(outcome.total, 134);
        assert_eq!(outcome.listings.len(), 1);
        assert_eq!(outcome.listings[0].title, "Honda Civic");
        assert!(service.store_queries_issued().is_empty());

        let request = service.index.requests.lock().unwrap()[0].clone();
        assert_eq!(request.filters.filters, "make:\"Honda\"");
        assert_eq!(request.page, 0);
    }

    #[tokio::test]
    async fn failing_index_and_store_yield_an_empty_outcome() {
        let broken_store = MockStore::default()
            .failing(Collection::Cars)
            .failing(Collection::PassengerCars)
            .failing(Collection::Suvs);
        let service = SearchService::new(broken_store, MockIndex::new(IndexBehavior::Fails));

        let outcome = service.search(&FilterState::default()).await;

        assert_eq!(outcome.backend, Backend::Store);
        assert!(outcome.listings.is_empty());
        assert_eq!(outcome.total, 0);
    }

    impl SearchService<MockStore, MockIndex> {
        fn store_queries_issued(&self) -> Vec<&'static str> {
            self.store.store().queried_collections()
        }
    }
}
