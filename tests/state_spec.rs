use std::time::Duration;

use mission_deck::state::{self, StateHandle};
use mission_deck_core::models::{DomainEvent, Stage, Vitals};
use mission_deck_core::MissionDeck;

fn setup() -> StateHandle {
    let (handle, _actor) = state::spawn(MissionDeck::default());
    handle
}

/// Let the actor drain its queue.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

fn stage(state: &StateHandle) -> Stage {
    state.snapshot().pipeline.stage
}

mod stage_timers {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn reflection_reverts_to_idle_after_dwell() {
        let state = setup();

        state.ingest_line(r#"{"msg":"tool start tool=exec","agentId":"samwise"}"#.into());
        settle().await;
        assert_eq!(stage(&state), Stage::Execution);
        assert!(state.snapshot().workforce["samwise"].active);

        state.ingest_line(r#"{"msg":"tool end","agentId":"samwise"}"#.into());
        settle().await;
        assert_eq!(stage(&state), Stage::Reflection);

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(stage(&state), Stage::Reflection);

        tokio::time::sleep(Duration::from_secs(2)).await;
        let snapshot = state.snapshot();
        assert_eq!(snapshot.pipeline.stage, Stage::Idle);
        assert!(!snapshot.workforce["samwise"].active);
        assert_eq!(snapshot.activity.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_stage_supersedes_pending_revert() {
        let state = setup();

        state.apply(DomainEvent::ToolStarted {
            agent: "frodo".into(),
            tool: "browser".into(),
        });
        state.apply(DomainEvent::ToolEnded {
            agent: "frodo".into(),
        });
        settle().await;
        assert_eq!(stage(&state), Stage::Reflection);

        tokio::time::sleep(Duration::from_secs(2)).await;
        state.apply(DomainEvent::UserMessage {
            text: "what next?".into(),
        });
        settle().await;

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(stage(&state), Stage::Consultation);
    }

    #[tokio::test(start_paused = true)]
    async fn delivery_dwells_longer_than_reflection() {
        let state = setup();

        state.ingest_line("embedded run done: runId=r-1".into());
        settle().await;
        assert_eq!(stage(&state), Stage::Delivery);

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(stage(&state), Stage::Delivery);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(stage(&state), Stage::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_tool_end_restarts_the_dwell() {
        let state = setup();

        state.apply(DomainEvent::ToolEnded {
            agent: "main".into(),
        });
        settle().await;
        tokio::time::sleep(Duration::from_secs(3)).await;
        state.apply(DomainEvent::ToolEnded {
            agent: "main".into(),
        });
        settle().await;

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(stage(&state), Stage::Reflection);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(stage(&state), Stage::Idle);
    }
}

mod publishing {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_every_change() {
        let state = setup();
        let mut snapshots = state.subscribe();

        state.submit_mission(Some("gandalf".into()), "map the repo".into());
        let snapshot = tokio::time::timeout(
            Duration::from_secs(5),
            snapshots.wait_for(|s| s.pipeline.stage == Stage::Consultation),
        )
        .await
        .expect("snapshot published")
        .expect("actor alive")
        .clone();

        assert_eq!(snapshot.pipeline.command_text.as_deref(), Some("map the repo"));
        assert_eq!(snapshot.activity[0].agent, "gandalf");
    }

    #[tokio::test]
    async fn collaborator_samples_land_in_snapshot() {
        let state = setup();
        let mut snapshots = state.subscribe();

        state.set_gateway_connected(true);
        state.set_vitals(Vitals {
            cpu_percent: 12.5,
            ..Vitals::default()
        });

        let snapshot = tokio::time::timeout(
            Duration::from_secs(5),
            snapshots.wait_for(|s| s.gateway.connected && s.vitals.is_some()),
        )
        .await
        .expect("snapshot published")
        .expect("actor alive")
        .clone();

        assert_eq!(snapshot.vitals.as_ref().map(|v| v.cpu_percent), Some(12.5));
    }

    #[tokio::test]
    async fn actor_stops_when_handles_drop() {
        let (handle, actor) = state::spawn(MissionDeck::default());
        drop(handle);
        tokio::time::timeout(Duration::from_secs(5), actor)
            .await
            .expect("actor stopped")
            .expect("actor did not panic");
    }
}
