use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info};

use super::error::StageError;

/// Lazily loaded model owned by a stage. Loaded on first use, reused while
/// resident, dropped on `release`.
pub struct ResidentModel<M> {
    slot: Mutex<Option<M>>,
}

impl<M> Default for ResidentModel<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> ResidentModel<M> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    // A panic inside `with_model` leaves the slot empty, never stuck.
    fn lock(&self) -> MutexGuard<'_, Option<M>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` against the resident model, loading it first if needed.
    pub fn with_model<T>(
        &self,
        load: impl FnOnce() -> Result<M, StageError>,
        f: impl FnOnce(&M) -> Result<T, StageError>,
    ) -> Result<T, StageError> {
        let mut guard = self.lock();
        let model = match guard.take() {
            Some(model) => {
                debug!("Reusing resident model");
                model
            }
            None => {
                let model = load()?;
                info!("Model loaded");
                model
            }
        };
        let result = f(&model);
        *guard = Some(model);
        result
    }

    pub fn is_loaded(&self) -> bool {
        self.lock().is_some()
    }

    /// Takes the model out of the slot. The caller decides how to unload it.
    pub fn release(&self) -> Option<M> {
        self.lock().take()
    }
}
