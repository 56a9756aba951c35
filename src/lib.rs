/*!
 * # subtrans - batch subtitle translation engine
 *
 * A Rust library that translates large subtitle documents by decomposing
 * them into a hierarchy of scenes and batches, sending each batch to a
 * generation service, and reassembling validated results while carrying
 * narrative context between requests.
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `document`: the Document → Scene → Batch → Line hierarchy
 * - `translator`: the orchestration loop over scenes and batches
 * - `processor`: response parsing, matching, validation and repair
 * - `context`: contextual variables propagated into each request
 * - `client`: the generation-service client contract and registry
 * - `batcher`: automatic decomposition of raw lines into scenes
 * - `summary`: sanitisation of free-text summaries for continuity
 * - `options`: the configuration surface consumed by a run
 * - `errors`: the error taxonomy for a run
 *
 * The transport to the generation service, the response parsing grammar
 * and any presentation layer live outside this crate, behind the
 * `TranslationClient`, `TranslationParser` and `TranslationObserver`
 * contracts.
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod batcher;
pub mod cancellation;
pub mod client;
pub mod context;
pub mod document;
pub mod errors;
pub mod events;
pub mod options;
pub mod processor;
pub mod substitutions;
pub mod summary;
pub mod translator;

// Re-export main types for easier usage
pub use batcher::{Batcher, GapBatcher};
pub use cancellation::CancellationToken;
pub use client::{ClientRegistry, Translation, TranslationClient, TranslationParser};
pub use context::{ContextValue, TranslationContext};
pub use document::{Batch, Document, Line, Scene, TranslatedLine};
pub use errors::{BatchError, BatchErrorKind, TranslationError};
pub use events::{TranslationEvents, TranslationObserver};
pub use options::TranslationOptions;
pub use summary::sanitise_summary;
pub use translator::{SubtitleTranslator, TranslationReport};
