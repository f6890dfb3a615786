//! Application state for the API server.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;

use warden_core::coordinator::{Coordinator, CoordinatorConfig, HandlerRegistry};
use warden_core::review::{InMemoryReviewQueue, ReviewRepository};
use warden_core::safety::{ContentClassifier, EvaluatorConfig, OversightEvaluator};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Request coordinator.
    pub coordinator: Arc<Coordinator>,
    /// Review queue. The same repository the coordinator's evaluator writes to.
    pub reviews: Arc<dyn ReviewRepository>,
    /// Where queue exports are written (None = exports are returned only).
    pub export_dir: Option<PathBuf>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl AppState {
    /// Creates application state from a coordinator and its review queue.
    pub fn new(coordinator: Arc<Coordinator>, reviews: Arc<dyn ReviewRepository>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            coordinator,
            reviews,
            export_dir: None,
            shutdown: Arc::new(shutdown),
        }
    }

    /// Creates application state with default screening over `reviews`.
    pub fn with_queue(reviews: Arc<dyn ReviewRepository>, handlers: HandlerRegistry) -> Self {
        let coordinator = Coordinator::new(
            Arc::new(ContentClassifier::default()),
            Arc::new(OversightEvaluator::new(
                reviews.clone(),
                EvaluatorConfig::default(),
            )),
            handlers,
            CoordinatorConfig::default(),
        );
        Self::new(Arc::new(coordinator), reviews)
    }

    /// Creates application state with an in-memory queue and no handlers.
    pub fn in_memory() -> Self {
        Self::with_queue(Arc::new(InMemoryReviewQueue::new()), HandlerRegistry::new())
    }

    /// Sets the export directory.
    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = Some(dir.into());
        self
    }

    /// Signals every in-flight and future handler call to stop.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Returns true once [`shutdown`](Self::shutdown) has been called.
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Resolves when shutdown is signalled.
    pub fn cancelled(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.shutdown.subscribe();
        async move {
            // The sender lives as long as any state clone, so an error only
            // means nobody can signal anymore.
            if rx.wait_for(|stop| *stop).await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
