//! Integration tests for logging system

use async_trait::async_trait;
use bridge_traits::error::Result as SinkResult;
use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{
    init_logging, redact_if_sensitive, redact_url, strip_path, LogFormat, LoggingConfig,
};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CollectingSink {
    entries: Mutex<Vec<LogEntry>>,
}

#[async_trait]
impl LoggerSink for CollectingSink {
    async fn log(&self, entry: LogEntry) -> SinkResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Debug
    }
}

// The global subscriber can only be installed once per process, so the
// whole init path lives in a single test.
#[test]
fn test_init_logging_once_and_forward_to_sink() {
    let sink = Arc::new(CollectingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_logger_sink(sink.clone());

    init_logging(config.clone()).expect("first initialization succeeds");

    tracing::debug!(
        target: "core_playback::resolver",
        master_url = "https://cdn.example.com/t1/master.m3u8?Signature=abc",
        "stream descriptor received"
    );
    tracing::debug!(target: "some_dependency", "filtered out below warn");

    {
        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "stream descriptor received");
        assert_eq!(
            entries[0].fields.get("master_url"),
            Some(&"https://cdn.example.com/t1/master.m3u8?[REDACTED]".to_string())
        );
    }

    assert!(init_logging(config).is_err());
}

#[test]
fn test_pii_redaction() {
    assert_eq!(redact_if_sensitive("refresh_token", "value"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("password", "my_password"), "[REDACTED]");

    let redacted = redact_if_sensitive("email", "user@example.com");
    assert!(redacted.starts_with('u'));
    assert!(!redacted.contains("example.com"));

    assert_eq!(redact_if_sensitive("track_id", "12345"), "12345");
    assert_eq!(redact_if_sensitive("title", "Song Name"), "Song Name");
}

#[test]
fn test_signed_url_redaction() {
    assert_eq!(
        redact_url("https://d111.cloudfront.net/a1/t1/128k.m3u8?Expires=1&Key-Pair-Id=K"),
        "https://d111.cloudfront.net/a1/t1/128k.m3u8?[REDACTED]"
    );
    assert_eq!(
        redact_url("https://cdn.example.com/t1/master.m3u8"),
        "https://cdn.example.com/t1/master.m3u8"
    );
}

#[test]
fn test_path_stripping() {
    assert_eq!(strip_path("/var/log/app.log"), "app.log");
    assert_eq!(strip_path("D:\\data\\file.txt"), "file.txt");
    assert_eq!(strip_path("filename.txt"), "filename.txt");
    assert_eq!(strip_path(""), "");
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Json)
        .with_level(LogLevel::Warn)
        .with_pii_redaction(false)
        .with_spans(true)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.redact_pii);
    assert!(config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
}
