use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use enginelink_api::{
    constants::SYSTEM_STATS_MARKER, ApiClient, HttpTransport, LogNotifier, Notifier, Payload,
    RequestOptions, ReqwestTransport, TransportError,
};
use enginelink_common::time;
use parking_lot::Mutex;
use tokio::task::AbortHandle;
use url::Url;

use crate::{
    persist_and_confirm, ConnectionError, ConnectionErrorKind, ConnectionState, ConnectionStatus,
    EndpointCache, Identity, IdentityBridge, MemoryEndpointCache, SessionConfig, SyncError,
    UserStore,
};

/// Drives the connection lifecycle for one session.
///
/// All mutation of the [`ConnectionState`] happens here; callers observe via
/// [`ConnectionManager::state`] and the boolean results of the operations.
/// Cloning shares the same underlying session.
pub struct ConnectionManager<T = ReqwestTransport> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    state: Mutex<ConnectionState>,
    /// Reentrancy guard: overlapping validations would interleave their state
    /// writes, so later calls bail out while one is in flight.
    validating: AtomicBool,
    transport: Arc<T>,
    notifier: Arc<dyn Notifier>,
    cache: Arc<dyn EndpointCache>,
    config: SessionConfig,
    heartbeat: Mutex<Option<AbortHandle>>,
    probe: Mutex<Option<AbortHandle>>,
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        for slot in [&self.heartbeat, &self.probe] {
            if let Some(handle) = slot.lock().take() {
                handle.abort();
            }
        }
    }
}

/// Releases the reentrancy flag on every exit path, including cancellation of
/// the task running the validation.
struct ValidatingGuard<'a>(&'a AtomicBool);

impl Drop for ValidatingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<T> Clone for ConnectionManager<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Construction-time wiring for a [`ConnectionManager`]. The notifier and the
/// endpoint cache default to [`LogNotifier`] and [`MemoryEndpointCache`].
pub struct ConnectionManagerBuilder<T> {
    transport: Arc<T>,
    config: SessionConfig,
    notifier: Arc<dyn Notifier>,
    cache: Arc<dyn EndpointCache>,
}

impl<T: HttpTransport + 'static> ConnectionManagerBuilder<T> {
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn cache(mut self, cache: Arc<dyn EndpointCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn build(self) -> ConnectionManager<T> {
        ConnectionManager {
            inner: Arc::new(Inner {
                state: Mutex::new(ConnectionState::default()),
                validating: AtomicBool::new(false),
                transport: self.transport,
                notifier: self.notifier,
                cache: self.cache,
                config: self.config,
                heartbeat: Mutex::new(None),
                probe: Mutex::new(None),
            }),
        }
    }
}

impl ConnectionManager<ReqwestTransport> {
    pub fn new(config: SessionConfig) -> Result<Self, TransportError> {
        Ok(Self::with_transport(
            Arc::new(ReqwestTransport::new()?),
            config,
        ))
    }
}

impl<T: HttpTransport + 'static> ConnectionManager<T> {
    pub fn builder(transport: Arc<T>, config: SessionConfig) -> ConnectionManagerBuilder<T> {
        ConnectionManagerBuilder {
            transport,
            config,
            notifier: Arc::new(LogNotifier),
            cache: Arc::new(MemoryEndpointCache::default()),
        }
    }

    pub fn with_transport(transport: Arc<T>, config: SessionConfig) -> Self {
        Self::builder(transport, config).build()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.lock().clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.state.lock().status
    }

    pub fn endpoint(&self) -> Option<String> {
        self.inner.state.lock().endpoint.clone()
    }

    pub fn is_configured(&self) -> bool {
        self.inner.state.lock().is_configured()
    }

    /// An API client for the currently configured endpoint, if any.
    pub fn api(&self) -> Option<ApiClient<T>> {
        let endpoint = self.endpoint()?;
        Some(self.client_for(&endpoint))
    }

    fn client_for(&self, base_url: &str) -> ApiClient<T> {
        ApiClient::with_transport(self.inner.transport.clone(), base_url)
            .with_notifier(self.inner.notifier.clone())
    }

    /// Seeds the state machine from the persisted identity record, falling
    /// back to the local endpoint cache. A saved endpoint is assumed good so
    /// first render is never blocked; a background probe corrects the state
    /// if the engine is actually gone.
    pub fn hydrate(&self, identity: Option<&Identity>) {
        let saved = identity
            .and_then(|i| i.colab_url.clone())
            .or_else(|| self.inner.cache.load());
        let Some(endpoint) = saved else {
            return;
        };

        self.inner.state.lock().assume_connected(endpoint.clone());
        self.start_heartbeat();

        let manager = self.clone();
        let handle = tokio::spawn(async move {
            if !manager.validate_connection(&endpoint).await {
                tracing::warn!(endpoint, "initial connection check failed");
            }
        });
        if let Some(previous) = self.inner.probe.lock().replace(handle.abort_handle()) {
            previous.abort();
        }
    }

    /// Validates a candidate URL and folds the outcome into the state.
    ///
    /// Returns `false` immediately when another validation is in flight; the
    /// running one wins and the state stays untouched. Malformed URLs are
    /// rejected before any network I/O.
    pub async fn validate_connection(&self, url: &str) -> bool {
        if self.inner.validating.swap(true, Ordering::SeqCst) {
            tracing::debug!(url, "validation already in flight, ignoring");
            return false;
        }
        let _guard = ValidatingGuard(&self.inner.validating);

        if Url::parse(url).is_err() {
            self.fail(ConnectionError::invalid_url());
            return false;
        }
        self.validate_probe(url).await
    }

    async fn validate_probe(&self, url: &str) -> bool {
        self.inner.state.lock().begin_validation();

        let client = self.client_for(url);
        let options = RequestOptions::silent().timeout(self.inner.config.validate_timeout);
        match client.system_stats(options).await {
            Ok(Payload::Json(stats)) if stats.get(SYSTEM_STATS_MARKER).is_some() => {
                self.inner
                    .state
                    .lock()
                    .connect(url.to_string(), time::now_ms());
                self.start_heartbeat();
                true
            }
            Ok(_) => {
                self.fail(ConnectionError::not_an_engine());
                false
            }
            Err(error) => {
                tracing::error!(%error, url, "connection validation failed");
                self.fail(ConnectionError::from(&error));
                false
            }
        }
    }

    /// Heartbeat entry point: re-validates the current endpoint.
    pub async fn check_connection(&self) -> bool {
        let Some(endpoint) = self.endpoint() else {
            return false;
        };
        self.validate_connection(&endpoint).await
    }

    /// Full connect flow: validate the URL, persist it to the user record,
    /// and wait for the session layer to serve it back. Success is only
    /// reported after that confirmation.
    pub async fn set_endpoint<S, B>(&self, url: &str, store: &S, bridge: &B) -> bool
    where
        S: UserStore + ?Sized,
        B: IdentityBridge + ?Sized,
    {
        if !self.validate_connection(url).await {
            return false;
        }

        let Some(identity) = bridge.current() else {
            self.fail(ConnectionError::new(
                ConnectionErrorKind::SaveFailed,
                "No signed-in account to save the engine URL for",
            ));
            return false;
        };

        match persist_and_confirm(
            store,
            bridge,
            &identity.email,
            url,
            self.inner.config.poll_interval,
            self.inner.config.propagation_max_wait,
        )
        .await
        {
            Ok(()) => {
                self.inner.cache.save(url);
                true
            }
            Err(error) => {
                tracing::error!(%error, url, "failed to commit the engine URL");
                self.inner
                    .notifier
                    .notify_error("Engine setup", &error.to_string());
                let kind = match error {
                    SyncError::SaveFailed(_) => ConnectionErrorKind::SaveFailed,
                    SyncError::PropagationTimeout => ConnectionErrorKind::PropagationTimeout,
                };
                self.fail(ConnectionError::new(kind, error.to_string()));
                false
            }
        }
    }

    /// Clears everything and returns to `Unconfigured`. Cancels the heartbeat
    /// and any pending hydrate probe so no stale task mutates a torn-down
    /// state.
    pub fn reset_configuration(&self) {
        for slot in [&self.inner.heartbeat, &self.inner.probe] {
            if let Some(handle) = slot.lock().take() {
                handle.abort();
            }
        }
        self.inner.cache.clear();
        self.inner.state.lock().reset();
    }

    fn fail(&self, error: ConnectionError) {
        self.inner.state.lock().fail(error);
    }

    fn start_heartbeat(&self) {
        let mut slot = self.inner.heartbeat.lock();
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let interval = self.inner.config.heartbeat_interval;
        // Anchor the first tick to the moment the connection was established,
        // not to whenever the spawned task first runs.
        let start = tokio::time::Instant::now() + interval;
        // Weak so the task never keeps a torn-down session alive.
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(start, interval);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let manager = ConnectionManager { inner };
                if manager.status() != ConnectionStatus::Connected {
                    break;
                }
                // failures update the state but stay out of the user's face
                if !manager.check_connection().await {
                    tracing::warn!("heartbeat failed");
                }
            }
        });
        *slot = Some(handle.abort_handle());
    }
}
