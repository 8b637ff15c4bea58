use super::*;
use crate::classify::{Classifier, IgnoreReason, Outcome, UnitId};
use crate::fatal::TerminalFailureDetector;
use crate::live::{fold_events, LiveEvent, MemoryLiveSink};
use std::sync::Arc;

fn pipeline() -> (ProgressPipeline, Arc<MemoryLiveSink>) {
    let sink = Arc::new(MemoryLiveSink::new());
    let pipeline = ProgressPipeline::new(Arc::new(Classifier::default()), sink.clone());
    (pipeline, sink)
}

async fn feed(pipeline: &mut ProgressPipeline, lines: &[&str]) {
    for line in lines {
        pipeline.process_line(line).await;
        assert!(pipeline.counters().is_consistent());
    }
}

/// Ten units: six succeed, three fail, one starts and is never resolved
fn ten_unit_lines() -> Vec<String> {
    let mut lines = vec!["[步骤1] 开始爬取课程，共10个课程ID".to_string()];
    for id in 1..=10 {
        lines.push(format!("正在处理 id:{}", id));
        match id {
            1..=6 => lines.push(format!("[{}]:课程{} 提取视频链接成功", id, id)),
            7..=9 => lines.push(format!("[{}]:课程{} 提取视频链接失败", id, id)),
            _ => lines.push("waiting for response...".to_string()),
        }
    }
    lines
}

#[tokio::test]
async fn test_ten_unit_scenario() {
    let (mut pipeline, sink) = pipeline();
    let lines = ten_unit_lines();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    feed(&mut pipeline, &refs).await;

    assert_eq!(pipeline.pending().unwrap().unit, Some(UnitId::new("10")));
    let summary = pipeline.finish().await;

    assert_eq!(
        summary.counters,
        Counters {
            total: 10,
            processed: 10,
            success: 6,
            failed: 3,
            ignored: 1,
            unmatched_results: 0,
        }
    );
    assert_eq!(sink.latest_snapshot().await.unwrap().counters, summary.counters);
}

#[tokio::test]
async fn test_start_forces_previous_unit_ignored() {
    let (mut pipeline, sink) = pipeline();
    feed(&mut pipeline, &["正在处理 id:1", "正在处理 id:2"]).await;

    assert_eq!(pipeline.counters().ignored, 1);
    let records = sink.records().await;
    assert!(records.iter().any(|e| matches!(
        e,
        LiveEvent::Ignore {
            unit_id: Some(id),
            reason: IgnoreReason::Abandoned,
            ..
        } if id.as_str() == "1"
    )));
}

#[tokio::test]
async fn test_group_progress_abandons_then_starts_anonymous_unit() {
    let (mut pipeline, sink) = pipeline();
    feed(
        &mut pipeline,
        &[
            "[处理进度] 正在处理第1/3个课程",
            "[处理进度] 正在处理第2/3个课程",
        ],
    )
    .await;

    assert_eq!(pipeline.counters().total, 3);
    assert_eq!(pipeline.counters().ignored, 1);
    assert_eq!(pipeline.pending(), Some(&PendingUnit { unit: None }));

    let kinds: Vec<&str> = sink.records().await.iter().map(|e| e.kind()).collect();
    assert_eq!(kinds, vec!["start", "ignore", "status", "start"]);
}

#[tokio::test]
async fn test_result_for_other_id_still_resolves_pending() {
    let (mut pipeline, _sink) = pipeline();
    feed(
        &mut pipeline,
        &["正在处理 id:1", "[2]:提取视频链接成功"],
    )
    .await;
    assert!(pipeline.pending().is_none());

    let summary = pipeline.finish().await;
    assert_eq!(summary.counters.success, 1);
    assert_eq!(summary.counters.ignored, 0);
}

#[tokio::test]
async fn test_unmatched_result_does_not_resolve() {
    let (mut pipeline, _sink) = pipeline();
    feed(&mut pipeline, &["正在处理 id:4", "[4]:开始提取视频链接"]).await;

    assert_eq!(pipeline.counters().unmatched_results, 1);
    assert_eq!(pipeline.counters().processed, 0);
    assert!(pipeline.pending().is_some());
}

#[tokio::test]
async fn test_finish_is_idempotent() {
    let (mut pipeline, sink) = pipeline();
    feed(&mut pipeline, &["正在处理 id:1"]).await;

    let first = pipeline.finish().await;
    let records_after_first = sink.records().await.len();
    let second = pipeline.finish().await;

    assert_eq!(first.counters.ignored, 1);
    assert_eq!(second.counters, first.counters);
    assert_eq!(sink.records().await.len(), records_after_first);
}

#[tokio::test]
async fn test_identical_snapshots_are_not_forwarded_twice() {
    let (mut pipeline, sink) = pipeline();
    feed(
        &mut pipeline,
        &[
            "[步骤1] 开始爬取课程，共3个课程ID",
            "[步骤1] 开始爬取课程，共5个课程ID",
            "正在处理 id:1",
            "[1]:提取视频链接成功",
            "noise",
            "[1]:忽略",
        ],
    )
    .await;
    pipeline.finish().await;

    let snapshots = sink.snapshots().await;
    assert_eq!(snapshots[0].counters.total, 3);
    for pair in snapshots.windows(2) {
        assert_ne!(pair[0].counters, pair[1].counters);
        assert!(pair[1].counters.dominates(&pair[0].counters));
    }
    assert_eq!(snapshots.last().unwrap().counters.total, 5);
}

#[tokio::test]
async fn test_journal_fold_matches_final_counters() {
    let (mut pipeline, sink) = pipeline();
    let lines = ten_unit_lines();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    feed(&mut pipeline, &refs).await;
    let summary = pipeline.finish().await;

    let records = sink.records().await;
    assert_eq!(fold_events(&records), summary.counters);
}

#[tokio::test]
async fn test_artifact_lines_are_collected() {
    let (mut pipeline, _sink) = pipeline();
    feed(&mut pipeline, &["数据已导出到: /tmp/out/courses.xlsx"]).await;
    assert_eq!(
        pipeline.artifacts().latest(),
        Some(std::path::Path::new("/tmp/out/courses.xlsx"))
    );
    assert_eq!(pipeline.counters(), Counters::default());
}

#[tokio::test]
async fn test_stdout_fatal_scan_keeps_counting() {
    let detector = TerminalFailureDetector::default();
    let sink = Arc::new(MemoryLiveSink::new());
    let mut pipeline = ProgressPipeline::new(Arc::new(Classifier::default()), sink)
        .with_fatal_detector(detector.clone());

    feed(
        &mut pipeline,
        &[
            "正在处理 id:1",
            "登录失效",
            "[1]:提取视频链接失败",
            "登录失效",
        ],
    )
    .await;

    assert!(detector.is_raised());
    assert_eq!(pipeline.counters().failed, 1);
}

#[tokio::test]
async fn test_explicit_skip_counts_as_ignored() {
    let (mut pipeline, sink) = pipeline();
    feed(&mut pipeline, &["正在处理 id:3", "[3]:类型:ppt语音"]).await;
    pipeline.finish().await;

    assert_eq!(pipeline.counters().ignored, 1);
    assert!(sink.records().await.iter().any(|e| matches!(
        e,
        LiveEvent::Ignore {
            reason: IgnoreReason::ExplicitSkip,
            ..
        }
    )));
    assert!(!sink.records().await.iter().any(|e| matches!(
        e,
        LiveEvent::Result {
            outcome: Outcome::Ignored,
            ..
        }
    )));
}
