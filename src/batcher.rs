/*!
 * Automatic document decomposition.
 *
 * When a document has no scenes yet the orchestrator asks a `Batcher` to
 * produce them. The default implementation starts a new scene whenever the
 * timing gap between consecutive lines exceeds a threshold, then splits
 * each scene into batches of bounded size.
 */

use log::debug;

use crate::document::{Batch, Line, Scene};
use crate::options::TranslationOptions;

/// Decomposes raw lines into a scene/batch hierarchy
pub trait Batcher: Send + Sync {
    /// Build scenes from raw lines; line numbers must be preserved
    fn decompose(&self, lines: &[Line], options: &TranslationOptions) -> Vec<Scene>;
}

/// Scene detection based on timing gaps between consecutive lines
#[derive(Debug, Clone, Default)]
pub struct GapBatcher;

impl GapBatcher {
    /// Create a gap-based batcher
    pub fn new() -> Self {
        Self
    }
}

impl Batcher for GapBatcher {
    fn decompose(&self, lines: &[Line], options: &TranslationOptions) -> Vec<Scene> {
        if lines.is_empty() {
            return Vec::new();
        }

        let gap_threshold = options.scene_gap_ms;
        let max_batch_size = options.max_batch_size.max(1);

        let mut groups: Vec<Vec<Line>> = Vec::new();
        let mut current: Vec<Line> = Vec::new();

        for line in lines {
            if let Some(previous) = current.last() {
                if line.start_ms.saturating_sub(previous.end_ms) >= gap_threshold {
                    groups.push(std::mem::take(&mut current));
                }
            }
            current.push(line.clone());
        }
        if !current.is_empty() {
            groups.push(current);
        }

        let scenes: Vec<Scene> = groups
            .into_iter()
            .enumerate()
            .map(|(scene_index, group)| {
                let scene_number = scene_index + 1;
                let batches = group
                    .chunks(max_batch_size)
                    .enumerate()
                    .map(|(batch_index, chunk)| {
                        Batch::new(scene_number, batch_index + 1, chunk.to_vec())
                    })
                    .collect();
                Scene::new(scene_number, batches)
            })
            .collect();

        debug!(
            "Decomposed {} lines into {} scenes",
            lines.len(),
            scenes.len()
        );

        scenes
    }
}
