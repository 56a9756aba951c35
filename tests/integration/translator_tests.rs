/*!
 * End-to-end orchestration tests with a scripted mock client
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::common::mock_client::{MockClient, MockResponse};
use crate::common::{
    init_logging, make_batch, pretranslate_batch, single_batch_document, two_scene_document,
};
use subtrans::cancellation::CancellationToken;
use subtrans::document::{Document, Line, Scene, TranslatedLine};
use subtrans::errors::{BatchErrorKind, TranslationError};
use subtrans::events::TranslationObserver;
use subtrans::options::TranslationOptions;
use subtrans::translator::SubtitleTranslator;

/// Observer that cancels the run once a scene completes
struct CancelAfterScene {
    token: CancellationToken,
}

impl TranslationObserver for CancelAfterScene {
    fn scene_translated(&self, _scene: &Scene) {
        self.token.cancel();
    }
}

/// Observer counting every notification
#[derive(Default)]
struct CountingObserver {
    preprocessed: AtomicUsize,
    batches: AtomicUsize,
    scenes: AtomicUsize,
}

impl TranslationObserver for CountingObserver {
    fn preprocessed(&self, _scenes: &[Scene]) {
        self.preprocessed.fetch_add(1, Ordering::SeqCst);
    }

    fn batch_translated(&self, _batch: &subtrans::document::Batch) {
        self.batches.fetch_add(1, Ordering::SeqCst);
    }

    fn scene_translated(&self, _scene: &Scene) {
        self.scenes.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_translate_withFullMatches_shouldTranslateEverything() {
    init_logging();
    let mut document = two_scene_document();
    let client = MockClient::new();
    let translator = SubtitleTranslator::new(TranslationOptions::default(), client.clone());

    let report = translator.translate(&mut document).await.expect("run should succeed");

    assert_eq!(report.translated.len(), 5);
    assert!(report.untranslated.is_empty());
    assert!(document.scenes.iter().all(Scene::all_translated));
    assert_eq!(client.call_count(), 2);
}

#[tokio::test]
async fn test_translate_withPartialMatch_shouldTolerateMissingLines() {
    init_logging();
    let mut document = two_scene_document();
    // Batch 1 comes back with only 2 of its 3 lines
    let client = MockClient::with_script(vec![MockResponse::Lines(vec![
        TranslatedLine::new(1, "Bonjour"),
        TranslatedLine::new(2, "Comment ça va ?"),
    ])]);
    let options = TranslationOptions {
        enforce_line_parity: false,
        allow_retranslations: false,
        ..TranslationOptions::default()
    };
    let translator = SubtitleTranslator::new(options, client.clone());

    let report = translator.translate(&mut document).await.expect("run should succeed");

    assert_eq!(report.translated.len(), 4);
    assert_eq!(report.untranslated.len(), 1);
    assert_eq!(report.untranslated[0].number, 3);
    assert_eq!(client.retranslation_count(), 0);
}

#[tokio::test]
async fn test_translate_withQuotaReached_shouldAbortRunImmediately() {
    init_logging();
    let mut document = two_scene_document();
    let client = MockClient::with_script(vec![MockResponse::QuotaReached]);
    let translator = SubtitleTranslator::new(TranslationOptions::default(), client.clone());

    let result = translator.translate(&mut document).await;

    assert!(matches!(result, Err(TranslationError::Impossible(_))));
    // Scene 2 was never attempted and no lines were committed
    assert_eq!(client.call_count(), 1);
    assert!(document.scenes[0].batches[0].translated.is_empty());
    assert!(document.scenes[1].batches[0].translation.is_none());
}

#[tokio::test]
async fn test_translate_withCancellationBetweenScenes_shouldKeepCommittedWork() {
    init_logging();
    let mut document = two_scene_document();
    let client = MockClient::new();
    let translator = SubtitleTranslator::new(TranslationOptions::default(), client.clone());

    translator.events().subscribe(Arc::new(CancelAfterScene {
        token: translator.cancellation_token(),
    }));

    let result = translator.translate(&mut document).await;

    assert!(matches!(result, Err(TranslationError::Aborted)));
    // Scene 1's committed translations remain, scene 2 is untouched
    assert!(document.scenes[0].batches[0].all_translated());
    assert!(document.scenes[1].batches[0].translation.is_none());
    assert_eq!(client.call_count(), 1);
}

#[tokio::test]
async fn test_translate_withMaxLines_shouldStopCleanlyAtBudget() {
    init_logging();
    let mut document = two_scene_document();
    let client = MockClient::new();
    let options = TranslationOptions {
        max_lines: Some(3),
        ..TranslationOptions::default()
    };
    let translator = SubtitleTranslator::new(options, client.clone());

    let report = translator.translate(&mut document).await.expect("budget stop is success");

    let dispatched: usize = client.calls().iter().map(|call| call.line_numbers.len()).sum();
    assert!(dispatched <= 3);
    assert_eq!(report.translated.len(), 3);
    assert_eq!(report.untranslated.len(), 2);
    assert_eq!(client.call_count(), 1);
}

#[tokio::test]
async fn test_translate_withMaxLinesMidBatch_shouldTruncateRequest() {
    init_logging();
    let mut document = two_scene_document();
    let client = MockClient::new();
    let options = TranslationOptions {
        max_lines: Some(2),
        ..TranslationOptions::default()
    };
    let translator = SubtitleTranslator::new(options, client.clone());

    let report = translator.translate(&mut document).await.expect("budget stop is success");

    assert_eq!(client.call_count(), 1);
    assert_eq!(client.calls()[0].line_numbers, vec![1, 2]);
    assert_eq!(report.translated.len(), 2);
}

#[tokio::test]
async fn test_translate_withMaxLines_shouldChargeBudgetForFailedBatch() {
    init_logging();
    let mut document = two_scene_document();
    // The first batch is dispatched but comes back with nothing
    let client = MockClient::with_script(vec![MockResponse::Empty]);
    let options = TranslationOptions {
        max_lines: Some(3),
        ..TranslationOptions::default()
    };
    let translator = SubtitleTranslator::new(options, client.clone());

    let report = translator.translate(&mut document).await.expect("budget stop is success");

    // The failed batch consumed its dispatched lines, so scene 2 never goes out
    assert_eq!(client.call_count(), 1);
    assert_eq!(client.calls()[0].line_numbers, vec![1, 2, 3]);
    assert!(report.translated.is_empty());
    assert_eq!(report.untranslated.len(), 5);
}

#[tokio::test]
async fn test_translate_withMaxLines_shouldChargeBudgetForClientError() {
    init_logging();
    let mut document = two_scene_document();
    let client = MockClient::with_script(vec![MockResponse::Fail("service hiccup".to_string())]);
    let options = TranslationOptions {
        max_lines: Some(3),
        ..TranslationOptions::default()
    };
    let translator = SubtitleTranslator::new(options, client.clone());

    translator.translate(&mut document).await.expect("run should continue");

    let dispatched: usize = client.calls().iter().map(|call| call.line_numbers.len()).sum();
    assert!(dispatched <= 3);
    assert_eq!(client.call_count(), 1);
}

#[tokio::test]
async fn test_translate_withResume_shouldNotResendTranslatedBatches() {
    init_logging();
    let mut document = two_scene_document();
    pretranslate_batch(&mut document.scenes[0].batches[0]);

    let client = MockClient::new();
    let options = TranslationOptions {
        resume: true,
        ..TranslationOptions::default()
    };
    let translator = SubtitleTranslator::new(options, client.clone());

    let report = translator.translate(&mut document).await.expect("run should succeed");

    assert_eq!(client.call_count(), 1);
    assert_eq!(client.calls()[0].line_numbers, vec![4, 5]);
    // Previously translated lines survive in the final projection
    assert_eq!(report.translated.len(), 5);
}

#[tokio::test]
async fn test_translate_withValidationFailure_shouldRepairExactlyOnce() {
    init_logging();
    let mut document = single_batch_document();
    // Line 3 is missing and parity is enforced; the repair doesn't fix it
    let client = MockClient::with_script(vec![MockResponse::Lines(vec![
        TranslatedLine::new(1, "Un"),
        TranslatedLine::new(2, "Deux"),
    ])]);
    let options = TranslationOptions {
        enforce_line_parity: true,
        allow_retranslations: true,
        ..TranslationOptions::default()
    };
    let translator = SubtitleTranslator::new(options, client.clone());

    let report = translator.translate(&mut document).await.expect("never fatal by itself");

    // Exactly one repair attempt, no loop
    assert_eq!(client.retranslation_count(), 1);
    assert_eq!(report.translated.len(), 2);
    assert_eq!(report.untranslated.len(), 1);

    let batch = &document.scenes[0].batches[0];
    assert_eq!(batch.errors.len(), 1);
    assert_eq!(batch.errors[0].kind, BatchErrorKind::UnmatchedLines);
    assert_eq!(batch.errors[0].lines, vec![3]);
}

#[tokio::test]
async fn test_translate_withSuccessfulRepair_shouldMergeRetranslation() {
    init_logging();
    let mut document = single_batch_document();
    let client = MockClient::with_script(vec![MockResponse::Lines(vec![
        TranslatedLine::new(1, "Un"),
        TranslatedLine::new(2, "Deux"),
    ])]);
    client.script_repairs(vec![vec![TranslatedLine::new(3, "Trois")]]);

    let options = TranslationOptions {
        enforce_line_parity: true,
        allow_retranslations: true,
        ..TranslationOptions::default()
    };
    let translator = SubtitleTranslator::new(options, client.clone());

    let report = translator.translate(&mut document).await.expect("run should succeed");

    assert_eq!(client.retranslation_count(), 1);
    assert_eq!(report.translated.len(), 3);
    assert!(report.untranslated.is_empty());
    assert!(document.scenes[0].batches[0].errors.is_empty());
}

#[tokio::test]
async fn test_translate_withRepairOverlap_shouldPreferRetranslation() {
    init_logging();
    let mut document = single_batch_document();
    let client = MockClient::with_script(vec![MockResponse::Lines(vec![
        TranslatedLine::new(1, "first try"),
        TranslatedLine::new(2, "Deux"),
    ])]);
    client.script_repairs(vec![vec![
        TranslatedLine::new(1, "second try"),
        TranslatedLine::new(3, "Trois"),
    ]]);

    let options = TranslationOptions {
        enforce_line_parity: true,
        allow_retranslations: true,
        ..TranslationOptions::default()
    };
    let translator = SubtitleTranslator::new(options, client.clone());

    translator.translate(&mut document).await.expect("run should succeed");

    let batch = &document.scenes[0].batches[0];
    let line1 = batch.translated.iter().find(|line| line.number == 1).expect("line 1");
    assert_eq!(line1.text, "second try");
}

#[tokio::test]
async fn test_translate_withTokenLimit_shouldRetryOnceWithoutContext() {
    init_logging();
    let mut document = single_batch_document();
    let client = MockClient::with_script(vec![MockResponse::TokenLimit, MockResponse::Echo]);
    let translator = SubtitleTranslator::new(TranslationOptions::default(), client.clone());

    let report = translator.translate(&mut document).await.expect("run should succeed");

    let calls = client.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].has_context);
    assert!(!calls[1].has_context);
    assert_eq!(report.translated.len(), 3);
}

#[tokio::test]
async fn test_translate_withPersistentTokenLimit_shouldFailBatchNotRun() {
    init_logging();
    let mut document = single_batch_document();
    let client = MockClient::with_script(vec![MockResponse::TokenLimit, MockResponse::TokenLimit]);
    let translator = SubtitleTranslator::new(TranslationOptions::default(), client.clone());

    let report = translator.translate(&mut document).await.expect("batch failure is recoverable");

    assert_eq!(client.call_count(), 2);
    assert!(report.translated.is_empty());
    assert_eq!(report.untranslated.len(), 3);
}

#[tokio::test]
async fn test_translate_withForeignLines_shouldNotIntroduceThem() {
    init_logging();
    let mut document = single_batch_document();
    let client = MockClient::with_script(vec![MockResponse::Lines(vec![
        TranslatedLine::new(1, "Un"),
        TranslatedLine::new(2, "Deux"),
        TranslatedLine::new(3, "Trois"),
        TranslatedLine::new(99, "stray"),
    ])]);
    let translator = SubtitleTranslator::new(TranslationOptions::default(), client.clone());

    let report = translator.translate(&mut document).await.expect("run should succeed");

    assert_eq!(report.translated.len(), 3);
    assert!(report
        .translated
        .iter()
        .all(|line| (1..=3).contains(&line.number)));
}

#[tokio::test]
async fn test_translate_withPreviewMode_shouldMakeNoRequests() {
    init_logging();
    let mut document = two_scene_document();
    let client = MockClient::new();
    let options = TranslationOptions {
        preview: true,
        ..TranslationOptions::default()
    };
    let translator = SubtitleTranslator::new(options, client.clone());

    let observer = Arc::new(CountingObserver::default());
    translator.events().subscribe(observer.clone());

    let report = translator.translate(&mut document).await.expect("preview should succeed");

    assert_eq!(client.call_count(), 0);
    assert!(report.translated.is_empty());
    // Observers still see each batch pass through
    assert_eq!(observer.batches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_translate_withStopOnError_shouldEscalateBatchFailure() {
    init_logging();
    let mut document = two_scene_document();
    let client = MockClient::with_script(vec![MockResponse::Fail("service hiccup".to_string())]);
    let options = TranslationOptions {
        stop_on_error: true,
        ..TranslationOptions::default()
    };
    let translator = SubtitleTranslator::new(options, client.clone());

    let result = translator.translate(&mut document).await;

    assert!(matches!(result, Err(TranslationError::Failed(_))));
    assert_eq!(client.call_count(), 1);
}

#[tokio::test]
async fn test_translate_withoutStopOnError_shouldSkipFailedSceneAndContinue() {
    init_logging();
    let mut document = two_scene_document();
    let client = MockClient::with_script(vec![MockResponse::Fail("service hiccup".to_string())]);
    let translator = SubtitleTranslator::new(TranslationOptions::default(), client.clone());

    let report = translator.translate(&mut document).await.expect("run should continue");

    assert_eq!(client.call_count(), 2);
    assert_eq!(report.translated.len(), 2);
    assert_eq!(report.untranslated.len(), 3);
}

#[tokio::test]
async fn test_translate_withEmptyResponse_shouldLeaveBatchUntranslated() {
    init_logging();
    let mut document = single_batch_document();
    let client = MockClient::with_script(vec![MockResponse::Empty]);
    let translator = SubtitleTranslator::new(TranslationOptions::default(), client.clone());

    let report = translator.translate(&mut document).await.expect("empty result is local");

    assert!(report.translated.is_empty());
    assert_eq!(report.untranslated.len(), 3);
}

#[tokio::test]
async fn test_translate_withNoScenes_shouldAutoBatchFirst() {
    init_logging();
    // Two groups of lines separated by a minute of silence
    let lines = vec![
        Line::new(1, 0, 1_500, "One"),
        Line::new(2, 2_000, 3_500, "Two"),
        Line::new(3, 120_000, 121_500, "Three"),
    ];
    let mut document = Document::new(lines);
    let client = MockClient::new();
    let translator = SubtitleTranslator::new(TranslationOptions::default(), client.clone());

    let report = translator.translate(&mut document).await.expect("run should succeed");

    assert_eq!(document.scenecount(), 2);
    assert_eq!(report.translated.len(), 3);
}

#[tokio::test]
async fn test_translate_withNoContent_shouldFailWithNoScenes() {
    init_logging();
    let mut document = Document::new(Vec::new());
    let client = MockClient::new();
    let translator = SubtitleTranslator::new(TranslationOptions::default(), client.clone());

    let result = translator.translate(&mut document).await;
    assert!(matches!(result, Err(TranslationError::NoScenes)));
}

#[tokio::test]
async fn test_translate_shouldCarrySummariesForwardAsContext() {
    init_logging();
    let scene = Scene::new(
        1,
        vec![
            make_batch(1, 1, &[(1, "One"), (2, "Two")]),
            make_batch(1, 2, &[(3, "Three"), (4, "Four")]),
        ],
    );
    let mut document = Document::from_scenes(vec![scene]);

    let client = MockClient::with_script(vec![
        MockResponse::WithSummary {
            summary: "Scene 1: They meet at the market".to_string(),
            scene: Some("Scene 1: The market".to_string()),
        },
        MockResponse::Echo,
    ]);
    let translator = SubtitleTranslator::new(TranslationOptions::default(), client.clone());

    translator.translate(&mut document).await.expect("run should succeed");

    // The first batch's sanitised summary reaches the second request
    let calls = client.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[1].summaries,
        vec!["Scene 1 batch 1: They meet at the market".to_string()]
    );

    assert_eq!(
        document.scenes[0].batches[0].summary.as_deref(),
        Some("They meet at the market")
    );
    // The scene summary falls back to the sanitised scene context
    assert_eq!(document.scenes[0].summary.as_deref(), Some("The market"));
}

#[tokio::test]
async fn test_translate_withRetranslateMode_shouldNotAdvanceContext() {
    init_logging();
    let mut document = single_batch_document();
    let client = MockClient::with_script(vec![MockResponse::WithSummary {
        summary: "Scene 1: A new summary".to_string(),
        scene: None,
    }]);
    let options = TranslationOptions {
        retranslate: true,
        ..TranslationOptions::default()
    };
    let translator = SubtitleTranslator::new(options, client.clone());

    let report = translator.translate(&mut document).await.expect("run should succeed");

    assert_eq!(report.translated.len(), 3);
    // Context advancement is skipped on redo, so the summary is not stored
    assert_eq!(document.scenes[0].batches[0].summary, None);
}

#[tokio::test]
async fn test_translate_shouldNotifyObserversPerBatchAndScene() {
    init_logging();
    let mut document = two_scene_document();
    let client = MockClient::new();
    let translator = SubtitleTranslator::new(TranslationOptions::default(), client.clone());

    let observer = Arc::new(CountingObserver::default());
    translator.events().subscribe(observer.clone());

    translator.translate(&mut document).await.expect("run should succeed");

    assert_eq!(observer.preprocessed.load(Ordering::SeqCst), 1);
    assert_eq!(observer.batches.load(Ordering::SeqCst), 2);
    assert_eq!(observer.scenes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_stop_shouldCancelTokenAndAbortClient() {
    init_logging();
    let client = MockClient::new();
    let translator = SubtitleTranslator::new(TranslationOptions::default(), client.clone());

    translator.stop();

    assert!(translator.cancellation_token().is_cancelled());
    assert!(client.was_aborted());

    let mut document = single_batch_document();
    let result = translator.translate(&mut document).await;
    assert!(matches!(result, Err(TranslationError::Aborted)));
}
