//! Search lifecycle: `Idle -> Loading -> Success | Error`

use crate::gateway::{FareProvider, PricingGateway};
use crate::query::QueryBuilder;
use crate::{PriceEntry, SearchQuery, ValidationError};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument};

/// What the presentation layer renders
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SearchState {
    #[default]
    Idle,
    Loading,
    /// May be empty: "no flights found" is a successful search
    Success(Vec<PriceEntry>),
    Error(String),
}

impl SearchState {
    pub fn is_loading(&self) -> bool {
        matches!(self, SearchState::Loading)
    }

    pub fn results(&self) -> &[PriceEntry] {
        match self {
            SearchState::Success(entries) => entries,
            _ => &[],
        }
    }
}

/// Whether a settled search was allowed to update the state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Applied,
    /// A newer submit was issued while this one was in flight
    Stale,
}

#[derive(Debug, Default)]
struct Inner {
    generation: u64,
    state: SearchState,
}

/// Drives searches through a [`FareProvider`] and owns the resulting state.
///
/// Submits may overlap. Each one takes a generation token and its outcome is
/// only applied while that token is still the latest issued.
pub struct SearchOrchestrator<P = PricingGateway> {
    provider: P,
    inner: Mutex<Inner>,
    updates: watch::Sender<SearchState>,
}

impl<P: FareProvider> SearchOrchestrator<P> {
    pub fn new(provider: P) -> Self {
        let (updates, _) = watch::channel(SearchState::Idle);
        Self {
            provider,
            inner: Mutex::new(Inner::default()),
            updates,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn state(&self) -> SearchState {
        self.inner.lock().state.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.lock().state.is_loading()
    }

    pub fn results(&self) -> Vec<PriceEntry> {
        self.inner.lock().state.results().to_vec()
    }

    /// Receiver that sees every applied state change
    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.updates.subscribe()
    }

    /// Validate the draft and run the search.
    ///
    /// An invalid draft is returned as an error without touching the state or
    /// calling the provider.
    pub async fn submit(&self, draft: &QueryBuilder) -> Result<Settlement, ValidationError> {
        let query = match draft.validate() {
            Ok(query) => query,
            Err(e) => {
                info!(error = %e, "Search draft rejected");
                return Err(e);
            }
        };
        Ok(self.submit_query(query).await)
    }

    #[instrument(
        level = "info",
        skip(self, query),
        fields(origin = %query.origin, destination = %query.destination)
    )]
    pub async fn submit_query(&self, query: SearchQuery) -> Settlement {
        let token = {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            self.transition(&mut inner, SearchState::Loading);
            inner.generation
        };
        debug!(token, "Search issued");

        let outcome = self.provider.search(&query).await;

        let mut inner = self.inner.lock();
        if inner.generation != token {
            debug!(token, latest = inner.generation, "Discarding stale search result");
            return Settlement::Stale;
        }
        let next = match outcome {
            Ok(entries) => {
                info!(token, entries = entries.len(), "Search succeeded");
                SearchState::Success(entries)
            }
            Err(e) => {
                error!(token, error = %e, "Search failed");
                SearchState::Error(e.to_string())
            }
        };
        self.transition(&mut inner, next);
        Settlement::Applied
    }

    fn transition(&self, inner: &mut Inner, next: SearchState) {
        inner.state = next;
        self.updates.send_replace(inner.state.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::DraftField;
    use crate::{CabinClass, GatewayError, Passengers};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn entry(date: &str, price: f64) -> PriceEntry {
        PriceEntry {
            origin: "BOM".to_string(),
            destination: "JFK".to_string(),
            price,
            date: date.to_string(),
            booking_link: format!("https://book.example/{}", date),
        }
    }

    fn query(origin: &str) -> SearchQuery {
        SearchQuery {
            origin: origin.to_string(),
            destination: "JFK".to_string(),
            departure_date: "2024-06-01".to_string(),
            return_date: None,
            passengers: Passengers::default(),
            cabin_class: CabinClass::Economy,
        }
    }

    /// Answers by origin: "SLOW" waits, "FAIL" errors, "NONE" is empty
    #[derive(Default)]
    struct ScriptedProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FareProvider for ScriptedProvider {
        async fn search(&self, query: &SearchQuery) -> Result<Vec<PriceEntry>, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match query.origin.as_str() {
                "SLOW" => {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(vec![entry("2024-06-09", 999.0)])
                }
                "FAIL" => Err(GatewayError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                }),
                "NONE" => Ok(Vec::new()),
                _ => Ok(vec![entry("2024-06-01", 410.0), entry("2024-06-02", 385.5)]),
            }
        }
    }

    #[tokio::test]
    async fn test_starts_idle() {
        let orchestrator = SearchOrchestrator::new(ScriptedProvider::default());
        assert_eq!(orchestrator.state(), SearchState::Idle);
        assert!(orchestrator.results().is_empty());
        assert!(!orchestrator.is_loading());
    }

    #[tokio::test]
    async fn test_invalid_draft_changes_nothing() {
        let orchestrator = SearchOrchestrator::new(ScriptedProvider::default());
        let mut draft = QueryBuilder::new();
        draft.set_field(DraftField::Origin, "BOM").unwrap();
        draft.set_field(DraftField::DepartureDate, "2024-06-01").unwrap();

        let err = orchestrator.submit(&draft).await.unwrap_err();
        assert_eq!(err, ValidationError::MissingFields(vec![DraftField::Destination]));
        assert_eq!(orchestrator.state(), SearchState::Idle);
        assert_eq!(orchestrator.provider().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_result_is_success() {
        let orchestrator = SearchOrchestrator::new(ScriptedProvider::default());
        assert_eq!(orchestrator.submit_query(query("NONE")).await, Settlement::Applied);
        assert_eq!(orchestrator.state(), SearchState::Success(Vec::new()));
    }

    #[tokio::test]
    async fn test_failure_clears_previous_results() {
        let orchestrator = SearchOrchestrator::new(ScriptedProvider::default());
        orchestrator.submit_query(query("BOM")).await;
        assert_eq!(orchestrator.results().len(), 2);

        orchestrator.submit_query(query("FAIL")).await;
        let state = orchestrator.state();
        assert!(matches!(state, SearchState::Error(ref msg) if msg.contains("503")));
        assert!(orchestrator.results().is_empty());
        assert!(!orchestrator.is_loading());
    }

    #[tokio::test]
    async fn test_stale_result_is_discarded() {
        let orchestrator = SearchOrchestrator::new(ScriptedProvider::default());

        // The slow search is issued first and settles last.
        let (slow, fast) = tokio::join!(
            orchestrator.submit_query(query("SLOW")),
            orchestrator.submit_query(query("BOM")),
        );

        assert_eq!(slow, Settlement::Stale);
        assert_eq!(fast, Settlement::Applied);
        assert_eq!(
            orchestrator.results(),
            vec![entry("2024-06-01", 410.0), entry("2024-06-02", 385.5)]
        );
    }

    #[tokio::test]
    async fn test_subscribers_see_loading_then_result() {
        let orchestrator = SearchOrchestrator::new(ScriptedProvider::default());
        let mut updates = orchestrator.subscribe();
        assert_eq!(*updates.borrow(), SearchState::Idle);

        let mut seen = Vec::new();
        let watcher = async {
            while updates.changed().await.is_ok() {
                let state = updates.borrow_and_update().clone();
                let done = !state.is_loading();
                seen.push(state);
                if done {
                    break;
                }
            }
        };
        let (_, settlement) = tokio::join!(watcher, orchestrator.submit_query(query("SLOW")));

        assert_eq!(settlement, Settlement::Applied);
        assert_eq!(seen.first(), Some(&SearchState::Loading));
        assert_eq!(seen.last(), Some(&SearchState::Success(vec![entry("2024-06-09", 999.0)])));
    }
}
