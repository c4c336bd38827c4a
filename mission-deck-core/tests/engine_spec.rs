use chrono::{Duration, Utc};
use mission_deck_core::ledger::LEDGER_CAPACITY;
use mission_deck_core::models::*;
use mission_deck_core::pipeline::REFLECTION_DWELL;
use mission_deck_core::{ApprovalLedger, EventExtractor, MissionDeck, PipelineProjector};
use speculate2::speculate;

speculate! {
    describe "extraction" {
        before {
            let extractor = EventExtractor::default();
        }

        it "picks the same rule for an ambiguous line on every run" {
            let line = "Calling tool exec - Approval required id=ap-42 command=\"terraform apply\"";
            let first = extractor.classify(line).expect("line should match");
            for _ in 0..50 {
                assert_eq!(extractor.classify(line).expect("line should match"), first);
            }
            assert_eq!(first.rule, "approval-requested");
        }

        it "reads positional gateway records" {
            let line = r#"{"0":"{\"subsystem\":\"agent/embedded\"}","1":"embedded run tool start: runId=r9 tool=web_search","_meta":{"sessionKey":"agent:gandalf:main"},"time":"2026-10-19T10:00:00Z"}"#;
            assert_eq!(
                extractor.extract(line),
                Some(DomainEvent::ToolStarted {
                    agent: "gandalf".into(),
                    tool: "web_search".into()
                })
            );
        }

        it "drops free text that matches no rule" {
            assert_eq!(extractor.extract("2026-10-19 gateway ready"), None);
        }
    }

    describe "approval ledger" {
        it "keeps the twenty most recent of twenty-five ids, newest first" {
            let mut ledger = ApprovalLedger::new();
            let start = Utc::now();
            for i in 0..25 {
                ledger.upsert(ApprovalRequest::new(
                    format!("ap-{i}"),
                    "ls",
                    start + Duration::seconds(i),
                ));
            }

            assert_eq!(ledger.len(), LEDGER_CAPACITY);
            let ids: Vec<_> = ledger.iter().map(|e| e.id.clone()).collect();
            let expected: Vec<_> = (5..25).rev().map(|i| format!("ap-{i}")).collect();
            assert_eq!(ids, expected);
            assert_eq!(ledger.most_recent().map(|e| e.id.as_str()), Some("ap-24"));
        }
    }

    describe "stage timers" {
        it "ignores a stale revert after a newer event" {
            let mut pipeline = PipelineProjector::default();
            let now = Utc::now();
            pipeline.apply(
                &DomainEvent::ToolStarted { agent: "samwise".into(), tool: "exec".into() },
                now,
            );
            let revert = pipeline
                .apply(&DomainEvent::ToolEnded { agent: "samwise".into() }, now)
                .expect("reflection schedules a revert");
            pipeline.apply(&DomainEvent::UserMessage { text: "status?".into() }, now);

            assert!(!pipeline.expire(revert));
            assert_eq!(pipeline.stage(), Stage::Consultation);
        }
    }

    describe "samwise scenario" {
        it "walks execution, reflection and back to idle" {
            let mut deck = MissionDeck::default();
            let t0 = Utc::now();
            let mut stages = vec![deck.pipeline().stage()];

            let started = deck.ingest_line(
                r#"{"msg":"tool start tool=exec","agentId":"samwise"}"#,
                t0,
            );
            assert!(started.revert.is_none());
            stages.push(deck.pipeline().stage());
            assert!(deck.pipeline().agent("samwise").expect("samwise").active);

            let ended = deck.ingest_line(
                r#"{"msg":"tool end","agentId":"samwise"}"#,
                t0 + Duration::seconds(1),
            );
            stages.push(deck.pipeline().stage());
            let revert = ended.revert.expect("reflection dwell");
            assert_eq!(revert.after, REFLECTION_DWELL);
            assert!(deck.pipeline().agent("samwise").expect("samwise").active);

            assert!(deck.expire(revert));
            stages.push(deck.pipeline().stage());

            assert_eq!(
                stages,
                vec![Stage::Idle, Stage::Execution, Stage::Reflection, Stage::Idle]
            );
            assert!(!deck.pipeline().agent("samwise").expect("samwise").active);
            assert_eq!(deck.snapshot(Utc::now()).activity.len(), 1);
        }
    }
}
