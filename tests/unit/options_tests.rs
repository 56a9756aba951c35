/*!
 * Tests for run options
 */

use subtrans::options::TranslationOptions;

#[test]
fn test_default_options_shouldMatchDocumentedDefaults() {
    let options = TranslationOptions::default();

    assert!(!options.resume);
    assert!(!options.retranslate);
    assert!(!options.reparse);
    assert!(!options.preview);
    assert!(!options.stop_on_error);
    assert!(options.allow_retranslations);
    assert!(!options.enforce_line_parity);
    assert_eq!(options.max_lines, None);
    assert_eq!(options.max_context_summaries, 10);
    assert_eq!(options.target_language, "English");
}

#[test]
fn test_apply_project_mode_shouldSetExactlyOneFlag() {
    let mut options = TranslationOptions::default();

    options.apply_project_mode("resume");
    assert!(options.resume && !options.retranslate && !options.reparse && !options.preview);

    options.apply_project_mode("Retranslate");
    assert!(!options.resume && options.retranslate && !options.reparse && !options.preview);

    options.apply_project_mode("reparse");
    assert!(options.reparse);

    options.apply_project_mode("preview");
    assert!(options.preview && !options.reparse);

    options.apply_project_mode("write");
    assert!(!options.resume && !options.retranslate && !options.reparse && !options.preview);
}

#[test]
fn test_build_prompt_withMovieName_shouldMentionIt() {
    let options = TranslationOptions {
        movie_name: Some("Seven Samurai".to_string()),
        target_language: "French".to_string(),
        ..TranslationOptions::default()
    };
    assert_eq!(
        options.build_prompt(),
        "Translate these subtitles for Seven Samurai into French"
    );
}

#[test]
fn test_build_prompt_withCustomPrompt_shouldUseItVerbatim() {
    let options = TranslationOptions {
        prompt: "  Translate colloquially.  ".to_string(),
        ..TranslationOptions::default()
    };
    assert_eq!(options.build_prompt(), "Translate colloquially.");
}

#[test]
fn test_options_file_roundTrip_shouldPreserveValues() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("options.json");

    let mut options = TranslationOptions {
        model: "gpt-4".to_string(),
        max_lines: Some(100),
        stop_on_error: true,
        ..TranslationOptions::default()
    };
    options
        .substitutions
        .insert("Godzilla".to_string(), "Gojira".to_string());

    options.save_to_file(&path).expect("save options");
    let loaded = TranslationOptions::from_file(&path).expect("load options");

    assert_eq!(loaded.model, "gpt-4");
    assert_eq!(loaded.max_lines, Some(100));
    assert!(loaded.stop_on_error);
    assert_eq!(
        loaded.substitutions.get("Godzilla").map(String::as_str),
        Some("Gojira")
    );
}

#[test]
fn test_from_file_withPartialJson_shouldFillDefaults() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("partial.json");
    std::fs::write(&path, r#"{"model": "local-llama", "resume": true}"#).expect("write");

    let options = TranslationOptions::from_file(&path).expect("load options");
    assert_eq!(options.model, "local-llama");
    assert!(options.resume);
    assert!(options.allow_retranslations);
    assert_eq!(options.max_batch_size, 30);
}

#[test]
fn test_from_file_withMissingFile_shouldFail() {
    assert!(TranslationOptions::from_file("/nonexistent/options.json").is_err());
}
