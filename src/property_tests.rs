//! Property-based tests for the line-to-progress fold

#[cfg(test)]
mod tests {
    use crate::classify::{Classifier, IgnoreReason, LineEvent, Outcome, UnitId};
    use crate::live::{replay_str, MemoryLiveSink, ReplayScope};
    use crate::progress::{Counters, ProgressPipeline};
    use crate::subprocess::streaming::LineReassembler;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime")
    }

    fn unit() -> impl Strategy<Value = UnitId> {
        (1u32..20).prop_map(|n| UnitId::new(n.to_string()))
    }

    fn line_event() -> impl Strategy<Value = LineEvent> {
        prop_oneof![
            unit().prop_map(|unit| LineEvent::Started { unit }),
            (unit(), prop_oneof![Just(Outcome::Success), Just(Outcome::Failure)])
                .prop_map(|(unit, outcome)| LineEvent::Resolved { unit, outcome }),
            (
                unit(),
                prop_oneof![Just(IgnoreReason::ExplicitSkip), Just(IgnoreReason::Marker)]
            )
                .prop_map(|(unit, reason)| LineEvent::Ignored { unit, reason }),
            unit().prop_map(|unit| LineEvent::UnmatchedResult { unit }),
            (0u64..50).prop_map(|total| LineEvent::TotalAnnounced { total }),
            (1u64..50, 0u64..50)
                .prop_map(|(index, total)| LineEvent::GroupProgress { index, total }),
            "[a-z]{1,8}\\.xlsx".prop_map(|path| LineEvent::ArtifactAnnounced { path }),
        ]
    }

    /// Split `bytes` at the given cut points
    fn chunk(bytes: &[u8], mut cuts: Vec<usize>) -> Vec<Vec<u8>> {
        cuts.retain(|c| *c > 0 && *c < bytes.len());
        cuts.sort_unstable();
        cuts.dedup();
        let mut chunks = Vec::new();
        let mut start = 0;
        for cut in cuts {
            chunks.push(bytes[start..cut].to_vec());
            start = cut;
        }
        chunks.push(bytes[start..].to_vec());
        chunks
    }

    fn reassemble(chunks: &[Vec<u8>]) -> (Vec<String>, String) {
        let mut reassembler = LineReassembler::new();
        let mut lines = Vec::new();
        let mut text = String::new();
        for piece in chunks {
            let out = reassembler.push(piece);
            text.push_str(&out.text);
            lines.extend(out.lines);
        }
        let tail = reassembler.finish();
        text.push_str(&tail.text);
        lines.extend(tail.lines);
        (lines, text)
    }

    proptest! {
        #[test]
        fn test_chunking_does_not_change_lines_or_log(
            lines in prop::collection::vec(
                prop_oneof![
                    "[a-z0-9 ]{0,12}",
                    "正在处理 id:[0-9]{1,4}",
                    "\\[[0-9]{1,3}\\]:提取视频链接(成功|失败)",
                    "\x1b\\[3[0-7]m[a-z]{1,5}\x1b\\[0m",
                ],
                0..12,
            ),
            crlf in any::<bool>(),
            cuts in prop::collection::vec(0usize..400, 0..20),
        ) {
            let sep = if crlf { "\r\n" } else { "\n" };
            let input = lines.join(sep);
            let bytes = input.as_bytes();

            let whole = reassemble(&[bytes.to_vec()]);
            let split = reassemble(&chunk(bytes, cuts));
            prop_assert_eq!(&split, &whole);
            prop_assert!(!whole.1.contains('\x1b'));
        }
    }

    proptest! {
        #[test]
        fn test_fold_invariants_hold_after_every_event(
            events in prop::collection::vec(line_event(), 0..60),
        ) {
            runtime().block_on(async {
                let sink = Arc::new(MemoryLiveSink::new());
                let mut pipeline =
                    ProgressPipeline::new(Arc::new(Classifier::default()), sink.clone());
                let mut previous = Counters::default();

                for event in events {
                    pipeline.apply_event(event).await;
                    let now = pipeline.counters();
                    prop_assert!(now.is_consistent());
                    prop_assert!(now.dominates(&previous));
                    previous = now;
                }

                let had_pending = pipeline.pending().is_some();
                let before_flush = pipeline.counters();
                let summary = pipeline.finish().await;
                let expected_ignored = before_flush.ignored + u64::from(had_pending);
                prop_assert_eq!(summary.counters.ignored, expected_ignored);
                prop_assert!(pipeline.pending().is_none());

                let again = pipeline.finish().await;
                prop_assert_eq!(again.counters, summary.counters);

                let snapshots = sink.snapshots().await;
                for pair in snapshots.windows(2) {
                    prop_assert_ne!(pair[0].counters, pair[1].counters);
                }
                Ok::<(), TestCaseError>(())
            })?;
        }
    }

    proptest! {
        #[test]
        fn test_at_most_one_unit_pending(
            starts in prop::collection::vec(unit(), 1..20),
        ) {
            runtime().block_on(async {
                let sink = Arc::new(MemoryLiveSink::new());
                let mut pipeline =
                    ProgressPipeline::new(Arc::new(Classifier::default()), sink.clone());

                for unit in &starts {
                    pipeline.apply_event(LineEvent::Started { unit: unit.clone() }).await;
                    prop_assert_eq!(
                        pipeline.pending().and_then(|p| p.unit.clone()),
                        Some(unit.clone())
                    );
                }

                let abandoned = starts.len() as u64 - 1;
                prop_assert_eq!(pipeline.counters().ignored, abandoned);
                pipeline.finish().await;
                prop_assert_eq!(pipeline.counters().ignored, abandoned + 1);
                Ok::<(), TestCaseError>(())
            })?;
        }
    }

    proptest! {
        #[test]
        fn test_journal_replay_matches_final_counters(
            events in prop::collection::vec(line_event(), 0..60),
        ) {
            runtime().block_on(async {
                let sink = Arc::new(MemoryLiveSink::new());
                let mut pipeline =
                    ProgressPipeline::new(Arc::new(Classifier::default()), sink.clone());
                pipeline.begin(uuid::Uuid::new_v4()).await;
                for event in events {
                    pipeline.apply_event(event).await;
                }
                let summary = pipeline.finish().await;

                let journal: String = sink
                    .records()
                    .await
                    .iter()
                    .map(|e| serde_json::to_string(e).expect("serialize") + "\n")
                    .collect();
                let replay = replay_str(&journal, ReplayScope::LastRun);
                prop_assert_eq!(replay.counters, summary.counters);
                prop_assert_eq!(replay.malformed, 0);
                prop_assert_eq!(replay.runs, 1);
                Ok::<(), TestCaseError>(())
            })?;
        }
    }

    proptest! {
        #[test]
        fn test_classifier_never_panics(line in "\\PC{0,80}") {
            let _ = Classifier::default().classify(&line);
        }
    }
}
