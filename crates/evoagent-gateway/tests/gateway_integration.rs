//! End-to-end check that `AppState::build` wires the stores/registries
//! into a working turn, without going through the HTTP layer (the
//! teacher's own integration tests exercise the logic layer directly
//! rather than spinning up a real listener — see
//! `providers/tests/router_integration.rs`).

use evoagent_domain::config::Config;
use evoagent_engine::{TurnInput, TurnOutcome, VecSink};
use evoagent_gateway::state::AppState;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn test_config(root: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.events.state_root = root.join("events").to_string_lossy().to_string();
    config.artifacts.artifact_root = root.join("artifacts").to_string_lossy().to_string();
    config.artifacts.source_cache_root = root.join("cache").to_string_lossy().to_string();
    config
}

#[tokio::test]
async fn full_turn_through_app_state_resolves_calc_result() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::build(test_config(dir.path())).unwrap();

    let thread_id = Uuid::new_v4();
    state.store.create_thread(thread_id).unwrap();

    let sink = VecSink::new();
    let input = TurnInput {
        thread_id,
        run_id: Uuid::new_v4(),
        provider_id: "mock".to_string(),
        user_message: "what is (2+3)*4?".to_string(),
        cancel: CancellationToken::new(),
    };

    let TurnOutcome { text, .. } = state.engine.run_turn(input, &sink).await.unwrap();
    assert_eq!(text, "20");

    let events = state.store.get_canonical_events(thread_id);
    assert!(events.len() >= 4);

    let messages = evoagent_events::build_messages(&state.store, thread_id, "mock", false);
    assert!(!messages.is_empty());
}

#[tokio::test]
async fn doctor_checks_pass_on_a_fresh_state_dir() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    assert!(evoagent_gateway::doctor::run(&config));
}
