//! Debounced revalidation.
//!
//! Every change to a document reschedules its validation: the pending run is
//! cancelled and a new one starts after the debounce delay. Only the run
//! that survives until its timer fires aggregates and publishes diagnostics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tower_lsp::lsp_types::{Diagnostic, Url};
use tower_lsp::Client;

use super::router::Router;

/// Default delay between the last change and validation.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

const LOG_TARGET: &str = "sfcls::scheduler";

/// Destination for published diagnostics.
#[tower_lsp::async_trait]
pub trait DiagnosticsSink: Send + Sync + 'static {
    async fn publish(&self, uri: Url, diagnostics: Vec<Diagnostic>, version: Option<i32>);
}

#[tower_lsp::async_trait]
impl DiagnosticsSink for Client {
    async fn publish(&self, uri: Url, diagnostics: Vec<Diagnostic>, version: Option<i32>) {
        self.publish_diagnostics(uri, diagnostics, version).await;
    }
}

/// Per-document trailing debounce of diagnostics publication.
pub struct RevalidationScheduler {
    router: Arc<Router>,
    sink: Arc<dyn DiagnosticsSink>,
    /// Pending runs, keyed by document, tagged with a generation so a
    /// finishing run only removes its own entry.
    pending: Arc<DashMap<Url, (u64, CancellationToken)>>,
    generation: AtomicU64,
    delay_ms: AtomicU64,
}

impl RevalidationScheduler {
    pub fn new(router: Arc<Router>, sink: Arc<dyn DiagnosticsSink>) -> Self {
        Self::with_delay(router, sink, DEFAULT_DEBOUNCE)
    }

    pub fn with_delay(router: Arc<Router>, sink: Arc<dyn DiagnosticsSink>, delay: Duration) -> Self {
        Self {
            router,
            sink,
            pending: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
            delay_ms: AtomicU64::new(delay.as_millis() as u64),
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms.load(Ordering::Relaxed))
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as u64, Ordering::Relaxed);
    }

    /// (Re)start the debounce timer for `uri`.
    pub fn schedule(&self, uri: Url) {
        self.spawn(uri, self.delay());
    }

    /// Validate `uri` right away, superseding any pending run.
    pub fn validate_now(&self, uri: Url) {
        self.spawn(uri, Duration::ZERO);
    }

    fn spawn(&self, uri: Url, delay: Duration) {
        let token = CancellationToken::new();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        if let Some((_, (_, previous))) = self.pending.remove(&uri) {
            previous.cancel();
            log::trace!(target: LOG_TARGET, "superseded pending validation for {}", uri);
        }
        self.pending
            .insert(uri.clone(), (generation, token.clone()));

        let router = Arc::clone(&self.router);
        let sink = Arc::clone(&self.sink);
        let pending = Arc::clone(&self.pending);

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    run_validation(&router, sink.as_ref(), &uri, &token).await;
                }
            }
            pending.remove_if(&uri, |_, (g, _)| *g == generation);
        });
    }

    /// Drop the pending run for `uri`, if any.
    pub fn cancel(&self, uri: &Url) {
        if let Some((_, (_, token))) = self.pending.remove(uri) {
            token.cancel();
            log::trace!(target: LOG_TARGET, "cancelled validation for {}", uri);
        }
    }

    pub fn cancel_all(&self) {
        for entry in self.pending.iter() {
            entry.value().1.cancel();
        }
        self.pending.clear();
    }

    #[cfg(test)]
    fn is_pending(&self, uri: &Url) -> bool {
        self.pending.contains_key(uri)
    }
}

async fn run_validation(
    router: &Router,
    sink: &dyn DiagnosticsSink,
    uri: &Url,
    token: &CancellationToken,
) {
    let Some(version) = router.documents().get(uri).map(|doc| doc.version()) else {
        log::debug!(target: LOG_TARGET, "{} closed before validation", uri);
        return;
    };
    let diagnostics = match router.diagnostics(uri, token).await {
        Ok(diagnostics) => diagnostics,
        Err(err) => {
            log::debug!(target: LOG_TARGET, "validation of {} skipped: {}", uri, err);
            return;
        }
    };
    if token.is_cancelled() {
        return;
    }
    sink.publish(uri.clone(), diagnostics, Some(version)).await;
}
