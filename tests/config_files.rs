//! Configuration, dictionaries, text sources and audit files on disk.

use masque::anonymize::PlainTextSource;
use masque::audit::WriterSink;
use masque::config::{LanguageMode, Strategy};
use masque::{Config, Error, Redactor};
use std::fs;
use std::sync::Arc;

#[test]
fn yaml_and_json_files_load() {
    let dir = tempfile::tempdir().unwrap();

    let yaml = dir.path().join("masque.yml");
    fs::write(
        &yaml,
        "detection:\n  strategy: hybrid\n  language: en\nmasking:\n  default_mask: \"[X]\"\n",
    )
    .unwrap();
    let from_yaml = Config::from_path(&yaml).unwrap();
    assert_eq!(from_yaml.detection.strategy, Strategy::Hybrid);
    assert_eq!(from_yaml.detection.language, LanguageMode::En);
    assert_eq!(from_yaml.masking.default_mask, "[X]");
    assert_eq!(from_yaml.verification.mask_threshold, 0.7);

    let json = dir.path().join("masque.json");
    fs::write(&json, r#"{"entities_to_mask": ["EMAIL_ADDRESS"], "extraction": {"use_ner": false}}"#).unwrap();
    let from_json = Config::from_path(&json).unwrap();
    assert_eq!(from_json.entities_to_mask, vec!["EMAIL_ADDRESS".to_string()]);
    assert!(!from_json.extraction.use_ner);
}

#[test]
fn unsupported_extension_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let ini = dir.path().join("masque.ini");
    fs::write(&ini, "strategy=dual").unwrap();
    assert!(matches!(Config::from_path(&ini), Err(Error::Config(_))));
}

#[test]
fn dictionary_file_suppresses_terms() {
    let dir = tempfile::tempdir().unwrap();
    let dictionary = dir.path().join("allow.txt");
    fs::write(
        &dictionary,
        "# company contacts\n\ninfo@example.com\nAI/alias[AI|Artificial Intelligence]\n",
    )
    .unwrap();

    let mut config = Config::default();
    config.allow_list.enabled = true;
    config.allow_list.dictionary_path = Some(dictionary);
    let redactor = Redactor::new(config).unwrap();

    let result = redactor.mask("問合せ: info@example.com / 本人: taro@example.com").unwrap();
    assert_eq!(result.stats.total, 1);
    assert_eq!(result.entities[0].text, "taro@example.com");
    assert!(result.masked_text.contains("info@example.com"));
}

#[test]
fn missing_dictionary_still_uses_additional_terms() {
    let mut config = Config::default();
    config.allow_list.enabled = true;
    config.allow_list.dictionary_path = Some("/nonexistent/allow.txt".into());
    config.allow_list.additional_terms = vec!["info@example.com".to_string()];
    let result = Redactor::new(config).unwrap().mask("info@example.com").unwrap();
    assert_eq!(result.stats.total, 0);
}

#[test]
fn text_file_is_read_and_masked() {
    let dir = tempfile::tempdir().unwrap();
    let resume = dir.path().join("resume.txt");
    fs::write(&resume, "連絡先\nTEL: 03-1234-5678\n").unwrap();

    let redactor = Redactor::new(Config::default()).unwrap();
    let result = redactor.mask_source(&PlainTextSource, &resume).unwrap();
    assert_eq!(result.masked_text, "連絡先\nTEL: ****");
    assert_eq!(result.stats.by_type.get("PHONE_NUMBER_JP"), Some(&1));

    let pdf = dir.path().join("resume.pdf");
    fs::write(&pdf, "%PDF").unwrap();
    assert!(matches!(
        redactor.mask_source(&PlainTextSource, &pdf),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn audit_log_file() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("audit.log");
    let file = fs::File::create(&log_path).unwrap();

    let redactor = Redactor::builder(Config::default())
        .audit(Arc::new(WriterSink::new(file)))
        .build()
        .unwrap();
    redactor.mask("メール: test@example.com").unwrap();
    drop(redactor);

    let written = fs::read_to_string(&log_path).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("[EMAIL_ADDRESS] \"test@example.com\""));
    assert_eq!(lines[2], "Total: 1 entities masked");
}
