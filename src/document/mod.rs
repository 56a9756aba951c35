/*!
 * Document model for subtitle translation.
 *
 * An ordered hierarchy Document → Scene → Batch → Line, holding original
 * and translated text plus the per-node state the orchestrator maintains
 * during a run (summaries, context snapshots, validation errors).
 */

mod model;

pub use model::{
    batch_context_history, merge_translations, Batch, Document, Line, Scene, TranslatedLine,
};
