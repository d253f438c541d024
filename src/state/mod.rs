//! Shared application state: the installed store, the spectrum catalog, the
//! post publisher, and the runtime configuration.

pub mod phase;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    catalog::SpectrumCatalog,
    config::AppConfig,
    dao::{game::GameRepository, kv::KvStore},
    error::ServiceError,
    services::{publisher::PostPublisher, scoring::SocialSignal},
};

/// Cheaply cloneable handle to the application state.
pub type SharedState = Arc<AppState>;

/// Central application state shared by every request, tick, and job.
pub struct AppState {
    store: RwLock<Option<Arc<dyn KvStore>>>,
    catalog: Arc<SpectrumCatalog>,
    publisher: Arc<dyn PostPublisher>,
    social: Arc<dyn SocialSignal>,
    config: AppConfig,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a store is installed.
    pub fn new(
        config: AppConfig,
        catalog: Arc<SpectrumCatalog>,
        publisher: Arc<dyn PostPublisher>,
        social: Arc<dyn SocialSignal>,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            store: RwLock::new(None),
            catalog,
            publisher,
            social,
            config,
            degraded: degraded_tx,
        })
    }

    /// Install a store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn KvStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Obtain the installed store or fail with a degraded-mode error.
    pub async fn require_store(&self) -> Result<Arc<dyn KvStore>, ServiceError> {
        let guard = self.store.read().await;
        guard.as_ref().cloned().ok_or(ServiceError::Degraded)
    }

    /// Build a repository over the installed store.
    pub async fn repository(&self) -> Result<GameRepository, ServiceError> {
        let store = self.require_store().await?;
        Ok(GameRepository::new(store, self.catalog.clone()))
    }

    /// Shared spectrum catalog.
    pub fn catalog(&self) -> Arc<SpectrumCatalog> {
        self.catalog.clone()
    }

    /// Post publisher collaborator.
    pub fn publisher(&self) -> Arc<dyn PostPublisher> {
        self.publisher.clone()
    }

    /// External social-signal source feeding persuasion scores.
    pub fn social_signal(&self) -> Arc<dyn SocialSignal> {
        self.social.clone()
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Update and broadcast the degraded flag when the value changes.
    async fn update_degraded(&self, value: bool) {
        if self.is_degraded().await == value {
            return;
        }

        let _ = self.degraded.send(value);
    }
}
