use super::*;
use std::path::Path;

#[test]
fn test_crawlwatch_error_construction() {
    let err = CrawlwatchError::config("Configuration file not found");
    assert!(matches!(err, CrawlwatchError::Config { .. }));
    assert_eq!(err.exit_code(), 2);
    assert_eq!(err.code(), ErrorCode::CONFIG_GENERIC);

    let err = CrawlwatchError::storage("Output directory unavailable");
    assert!(matches!(err, CrawlwatchError::Storage { .. }));
    assert_eq!(err.exit_code(), 4);
    assert_eq!(err.code(), ErrorCode::STORAGE_GENERIC);

    let err = CrawlwatchError::execution("Spawn failed");
    assert!(matches!(err, CrawlwatchError::Execution { .. }));
    assert_eq!(err.exit_code(), 5);

    let err = CrawlwatchError::other("Something else");
    assert_eq!(err.exit_code(), 1);
    assert_eq!(err.code(), ErrorCode::OTHER_GENERIC);
}

#[test]
fn test_display_includes_code() {
    let err = CrawlwatchError::config_with_code(
        ErrorCode::CONFIG_VALIDATION_FAILED,
        "group_size must be positive",
        Some("crawl.group_size".to_string()),
    );
    assert_eq!(
        err.to_string(),
        "[E1008] Configuration error: group_size must be positive"
    );
    assert_eq!(
        err.user_message(),
        "Configuration problem in 'crawl.group_size': group_size must be positive"
    );
}

#[test]
fn test_with_context_keeps_command() {
    let err = CrawlwatchError::execution_with_code(
        ErrorCode::EXEC_SPAWN_FAILED,
        "crawler did not start",
        Some("node crawler.js".to_string()),
    )
    .with_context("run 42");
    match &err {
        CrawlwatchError::Execution {
            message, command, ..
        } => {
            assert_eq!(message, "crawler did not start: run 42");
            assert_eq!(command.as_deref(), Some("node crawler.js"));
        }
        other => panic!("unexpected variant: {other:?}"),
    }
    assert_eq!(err.exit_code(), 5);
}

#[test]
fn test_storage_error_ext_keeps_path_and_source() {
    let io: std::result::Result<(), std::io::Error> =
        Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
    let err = io
        .to_storage_error(Path::new("/tmp/live_status.json"), "write")
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::STORAGE_IO_ERROR);
    assert!(err.user_message().contains("/tmp/live_status.json"));
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn test_describe_error_code() {
    assert_eq!(describe_error_code(4007), "Failed to spawn subprocess");
    assert_eq!(describe_error_code(1234), "Unknown error code");
}

#[test]
fn test_is_not_found() {
    let missing = CrawlwatchError::storage_with_code(
        ErrorCode::STORAGE_NOT_FOUND,
        "no run recorded",
        Some("crawl-output/last_run.json".into()),
    );
    assert!(missing.is_not_found());
    assert!(!CrawlwatchError::storage("disk full").is_not_found());
}
