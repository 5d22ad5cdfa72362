//! Folio — HTTP surfaces for the catalog and event log services.
//!
//! The routers are assembled here so the binaries and the integration tests
//! serve exactly the same routes.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::Router;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

use state::{CatalogState, EventLogState};

/// Router for the catalog service.
pub fn catalog_app(state: CatalogState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/books", routes::books::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Router for the event log service.
pub fn event_log_app(state: EventLogState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/events", routes::events::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Resolves when the process receives Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

/// Resolves on Ctrl-C or when `stopped` resolves, whichever comes first.
pub async fn shutdown_signal_or(stopped: impl Future<Output = ()>) {
    tokio::select! {
        () = shutdown_signal() => {}
        () = stopped => tracing::warn!("background task stopped; shutting down"),
    }
}

struct StopFlag {
    stopped: AtomicBool,
    notify: Notify,
}

/// Marks the task stopped however its future ends, panics included.
struct StopGuard(Arc<StopFlag>);

impl Drop for StopGuard {
    fn drop(&mut self) {
        self.0.stopped.store(true, Ordering::SeqCst);
        self.0.notify.notify_one();
    }
}

/// A spawned background task the service cannot run without.
pub struct WatchedTask<T> {
    handle: JoinHandle<T>,
    flag: Arc<StopFlag>,
}

impl<T: Send + 'static> WatchedTask<T> {
    /// Spawns `task` on the current runtime.
    pub fn spawn<F>(task: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        let flag = Arc::new(StopFlag {
            stopped: AtomicBool::new(false),
            notify: Notify::new(),
        });
        let guard = StopGuard(Arc::clone(&flag));
        let handle = tokio::spawn(async move {
            let _guard = guard;
            task.await
        });
        Self { handle, flag }
    }

    /// Resolves once the task has ended.
    pub fn stopped(&self) -> impl Future<Output = ()> + Send + 'static {
        let flag = Arc::clone(&self.flag);
        async move {
            let notified = flag.notify.notified();
            if !flag.stopped.load(Ordering::SeqCst) {
                notified.await;
            }
        }
    }

    /// Whether the task has ended.
    #[must_use]
    pub fn has_stopped(&self) -> bool {
        self.flag.stopped.load(Ordering::SeqCst)
    }

    /// The underlying join handle.
    #[must_use]
    pub fn into_handle(self) -> JoinHandle<T> {
        self.handle
    }
}
