use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use futures::future::join_all;
use log::{debug, error, info};
use parking_lot::RwLock;

use crate::{
    backend::Backend,
    error::Result,
    kind::ModelKind,
    notify::{Notifier, Severity},
};

/// Holds at most one trained model per kind.
///
/// Readers get a shared handle, so replacing a slot never affects a prediction already holding
/// the previous model.
pub struct ModelRegistry<B: Backend> {
    backend: Arc<B>,
    notifier: Arc<dyn Notifier>,
    slots: [RwLock<Option<Arc<B::Model>>>; 2],
    training: [AtomicBool; 2],
}

/// Marks a training run for a kind as in flight until dropped.
#[must_use]
pub struct TrainingGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for TrainingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl<B: Backend> ModelRegistry<B> {
    /// Creates an empty registry.
    pub fn new(backend: Arc<B>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            backend,
            notifier,
            slots: [RwLock::new(None), RwLock::new(None)],
            training: [AtomicBool::new(false), AtomicBool::new(false)],
        }
    }

    pub fn get(&self, kind: ModelKind) -> Option<Arc<B::Model>> {
        self.slots[kind.index()].read().clone()
    }

    pub fn is_present(&self, kind: ModelKind) -> bool {
        self.slots[kind.index()].read().is_some()
    }

    /// Replaces the model of `kind`.
    ///
    /// # Returns
    /// The previous model, if there was one.
    pub fn set(&self, kind: ModelKind, model: Arc<B::Model>) -> Option<Arc<B::Model>> {
        self.slots[kind.index()].write().replace(model)
    }

    /// Empties the slot of `kind` only if it still holds `model`.
    ///
    /// # Returns
    /// Whether `model` was removed.
    pub fn withdraw(&self, kind: ModelKind, model: &Arc<B::Model>) -> bool {
        let mut slot = self.slots[kind.index()].write();

        match slot.as_ref() {
            Some(current) if Arc::ptr_eq(current, model) => {
                slot.take();
                true
            }
            _ => false,
        }
    }

    /// Drops every model.
    pub fn clear(&self) {
        for slot in &self.slots {
            slot.write().take();
        }
    }

    /// Claims the training of `kind`, `None` if a run is already in flight.
    pub fn try_begin_training(&self, kind: ModelKind) -> Option<TrainingGuard<'_>> {
        let flag = &self.training[kind.index()];

        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TrainingGuard { flag })
    }

    pub fn is_training(&self, kind: ModelKind) -> bool {
        self.training[kind.index()].load(Ordering::Acquire)
    }

    /// Loads the model persisted under the kind's key.
    ///
    /// # Returns
    /// Whether a model was found. Nothing persisted is not an error, the slot stays empty.
    pub async fn load(&self, kind: ModelKind) -> Result<bool> {
        let backend = Arc::clone(&self.backend);
        let key = kind.storage_key();

        let loaded = tokio::task::spawn_blocking(move || backend.load(key))
            .await?
            .inspect_err(|e| error!(kind = kind.label(); "failed to load model: {e}"))?;

        let Some(model) = loaded else {
            info!(kind = kind.label(); "no persisted model found");
            return Ok(false);
        };

        self.set(kind, Arc::new(model));
        self.notifier.notify(
            &format!("{} model loaded from storage. Ready!", kind.label()),
            Severity::Info,
        );

        Ok(true)
    }

    /// Drops the model of `kind` and deletes its persisted copy, so the next pass trains it anew.
    ///
    /// # Returns
    /// Whether a persisted copy was deleted.
    pub async fn forget(&self, kind: ModelKind) -> Result<bool> {
        self.slots[kind.index()].write().take();

        let backend = Arc::clone(&self.backend);
        let removed = tokio::task::spawn_blocking(move || backend.remove(kind.storage_key()))
            .await??;

        info!(kind = kind.label(), removed = removed; "model forgotten");
        Ok(removed)
    }

    /// Loads every kind with a persisted model, listing the store once.
    ///
    /// Failures are logged and leave the slot empty.
    ///
    /// # Returns
    /// The kinds that were loaded.
    pub async fn load_all(&self) -> Vec<ModelKind> {
        let backend = Arc::clone(&self.backend);
        let keys = match tokio::task::spawn_blocking(move || backend.list()).await {
            Ok(Ok(keys)) => keys,
            Ok(Err(e)) => {
                info!("no models found in storage: {e}");
                return Vec::new();
            }
            Err(e) => {
                error!("listing the stored models failed: {e}");
                return Vec::new();
            }
        };

        let persisted = ModelKind::ALL
            .into_iter()
            .filter(|kind| keys.iter().any(|key| key == kind.storage_key()));

        let loads = persisted.map(|kind| async move { (kind, self.load(kind).await) });

        join_all(loads)
            .await
            .into_iter()
            .filter_map(|(kind, loaded)| match loaded {
                Ok(true) => Some(kind),
                Ok(false) => None,
                Err(e) => {
                    debug!(kind = kind.label(); "skipping model: {e}");
                    None
                }
            })
            .collect()
    }
}
