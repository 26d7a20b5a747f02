//! Single-flight security token refresh.
//!
//! At most one `HEAD <service root>` probe with `X-CSRF-Token: Fetch` is in
//! flight per refresher. Every caller asking for a refresh while the probe
//! runs receives a handle to the same shared outcome.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use futures::future::{AbortHandle, Abortable, BoxFuture, Shared};
use futures::FutureExt;
use http::{HeaderMap, HeaderValue, Method};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::cache::token_store::{SecurityToken, TokenStore};
use crate::error::{DataAccessError, RefreshFailure};
use crate::observability::metrics::get_metrics;
use crate::sources::request::{send_request, status_text};
use crate::utils::constants::{CSRF_TOKEN_FETCH, CSRF_TOKEN_HEADER_NAME};

static SUCCESS_MSG: &str = "success";
static CANCELLED_MSG: &str = "cancelled";
static ERROR_MSG: &str = "error";

/// The refreshed token value, or why there is none.
pub type RefreshResult = Result<String, DataAccessError>;

type SharedRefresh = Shared<BoxFuture<'static, RefreshResult>>;

struct InFlightRefresh {
    generation: u64,
    pending: SharedRefresh,
    abort: AbortHandle,
}

type RefreshSlot = Arc<Mutex<Option<InFlightRefresh>>>;

/// Observable state of the security token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
    /// nothing fetched yet, requests carry the `Fetch` sentinel
    Absent,
    Valid(SecurityToken),
    Refreshing { generation: u64 },
}

/// Awaitable share of one refresh. Clones await the same probe.
#[derive(Clone)]
pub struct RefreshHandle {
    generation: u64,
    pending: SharedRefresh,
    abort: AbortHandle,
    slot: RefreshSlot,
}

impl RefreshHandle {
    /// Identifies the probe; handles from joined calls share it.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Aborts the probe. Every awaiter fails with a cancellation and the next
    /// `refresh()` starts a new probe.
    pub fn abort(&self) {
        release(&self.slot, self.generation);
        self.abort.abort();
    }
}

impl Future for RefreshHandle {
    type Output = RefreshResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.pending).poll(cx)
    }
}

pub struct SecurityTokenRefresher {
    client: Client,
    service_url: String,
    store: Arc<TokenStore>,
    in_flight: RefreshSlot,
    generations: Arc<AtomicU64>,
}

impl SecurityTokenRefresher {
    pub fn new(client: Client, service_url: String, store: Arc<TokenStore>) -> Self {
        Self {
            client,
            service_url,
            store,
            in_flight: Arc::new(Mutex::new(None)),
            generations: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Joins the in-flight refresh or starts a new one.
    ///
    /// Inside a tokio runtime the probe is driven by its own task, so it
    /// settles and releases the slot even if every handle is dropped.
    pub fn refresh(&self) -> RefreshHandle {
        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(in_flight) = slot.as_ref() {
            debug!(generation = in_flight.generation, "joining in-flight token refresh");
            return RefreshHandle {
                generation: in_flight.generation,
                pending: in_flight.pending.clone(),
                abort: in_flight.abort.clone(),
                slot: self.in_flight.clone(),
            };
        }

        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        info!(generation, "security token refresh start");

        let (abort, registration) = AbortHandle::new_pair();
        let probe = Abortable::new(
            probe_token(self.client.clone(), self.service_url.clone()),
            registration,
        );
        let store = self.store.clone();
        let release_slot = self.in_flight.clone();
        let service_url = self.service_url.clone();
        let latest = self.generations.clone();

        let pending = async move {
            let outcome = match probe.await {
                Ok(outcome) => outcome,
                Err(_aborted) => Err(DataAccessError::TokenRefreshFailed(
                    RefreshFailure::Cancelled,
                )),
            };

            // a probe superseded by a newer refresh must not touch the store
            let current = latest.load(Ordering::SeqCst) == generation;
            let label = match &outcome {
                Ok(token) => {
                    if current {
                        store.set_token(token).await;
                    }
                    info!(generation, "security token refreshed");
                    SUCCESS_MSG
                }
                Err(e) => {
                    if current {
                        store.clear().await;
                    }
                    warn!(generation, "security token refresh failed: {}", e);
                    if e.is_cancelled() {
                        CANCELLED_MSG
                    } else {
                        ERROR_MSG
                    }
                }
            };
            release(&release_slot, generation);

            get_metrics()
                .await
                .token_refreshes
                .with_label_values(&[service_url.as_str(), label])
                .inc();
            outcome
        }
        .boxed()
        .shared();

        *slot = Some(InFlightRefresh {
            generation,
            pending: pending.clone(),
            abort: abort.clone(),
        });
        drop(slot);

        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(pending.clone());
        }

        RefreshHandle {
            generation,
            pending,
            abort,
            slot: self.in_flight.clone(),
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub async fn state(&self) -> TokenState {
        let generation = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|f| f.generation);
        if let Some(generation) = generation {
            return TokenState::Refreshing { generation };
        }
        match self.store.token().await {
            Some(token) => TokenState::Valid(token),
            None => TokenState::Absent,
        }
    }
}

/// Clears the slot if it still holds the refresh of `generation`.
fn release(slot: &RefreshSlot, generation: u64) {
    let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.as_ref().map(|f| f.generation) == Some(generation) {
        *slot = None;
    }
}

async fn probe_token(client: Client, service_url: String) -> RefreshResult {
    let mut headers = HeaderMap::new();
    headers.insert(CSRF_TOKEN_HEADER_NAME, HeaderValue::from_static(CSRF_TOKEN_FETCH));

    let response = send_request(&client, &service_url, Method::HEAD, &service_url, headers, None)
        .await
        .map_err(|e| DataAccessError::TokenRefreshFailed(RefreshFailure::Transport(e.to_string())))?;

    if !response.is_success() {
        return Err(DataAccessError::TokenRefreshFailed(RefreshFailure::Status {
            status: response.status.as_u16(),
            status_text: status_text(response.status),
            body: response.body,
        }));
    }
    response
        .token()
        .ok_or(DataAccessError::TokenRefreshFailed(RefreshFailure::MissingToken))
}
