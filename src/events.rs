/*!
 * Observer notifications for translation progress.
 *
 * Observers receive fire-and-forget notifications after preprocessing and
 * after each batch and scene completes. Notifications carry no return
 * value and must never block the orchestration loop; a presentation layer
 * can subscribe to drive progress reporting or autosave.
 */

use parking_lot::RwLock;
use std::sync::Arc;

use crate::document::{Batch, Scene};

/// Receives progress notifications from a translation run.
///
/// All methods default to no-ops so observers only implement the events
/// they care about.
pub trait TranslationObserver: Send + Sync {
    /// The document has been decomposed into scenes
    fn preprocessed(&self, _scenes: &[Scene]) {}

    /// A batch finished processing (translated, previewed or repaired)
    fn batch_translated(&self, _batch: &Batch) {}

    /// A scene's batch loop completed
    fn scene_translated(&self, _scene: &Scene) {}
}

/// Subscriber list for translation events
#[derive(Default)]
pub struct TranslationEvents {
    observers: RwLock<Vec<Arc<dyn TranslationObserver>>>,
}

impl TranslationEvents {
    /// Create an empty subscriber list
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer
    pub fn subscribe(&self, observer: Arc<dyn TranslationObserver>) {
        self.observers.write().push(observer);
    }

    /// Notify observers that preprocessing finished
    pub fn notify_preprocessed(&self, scenes: &[Scene]) {
        for observer in self.observers.read().iter() {
            observer.preprocessed(scenes);
        }
    }

    /// Notify observers that a batch completed
    pub fn notify_batch_translated(&self, batch: &Batch) {
        for observer in self.observers.read().iter() {
            observer.batch_translated(batch);
        }
    }

    /// Notify observers that a scene completed
    pub fn notify_scene_translated(&self, scene: &Scene) {
        for observer in self.observers.read().iter() {
            observer.scene_translated(scene);
        }
    }
}
