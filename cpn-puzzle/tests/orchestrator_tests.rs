//! Retrieval orchestrator tests against in-memory upstreams

mod helpers;

use cpn_common::{Difficulty, PuzzleSource};
use cpn_puzzle::services::{AiPuzzleRequest, PuzzleError, UpstreamError};
use helpers::*;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn token() -> CancellationToken {
    CancellationToken::new()
}

// ========================================
// Lichess-backed operations
// ========================================

#[tokio::test]
async fn test_repeated_id_is_served_stale_without_error() {
    let lichess = Arc::new(FakeLichess::repeating(raw_puzzle("abcde", 1500)));
    let service = service_with(lichess.clone(), None, None, vec![]);

    let first = service.by_difficulty("medium", &token()).await.unwrap();
    assert_eq!(first.id, "abcde");
    assert_eq!(lichess.calls(), 1);

    let second = service.by_difficulty("medium", &token()).await.unwrap();
    assert_eq!(second.id, "abcde");
    assert_eq!(lichess.calls(), 5, "second request retries up to the attempt limit");

    assert_eq!(service.recency().len(Some(Difficulty::Medium)), 1);
    assert_eq!(service.recency().len(Some(Difficulty::Hard)), 0);
}

#[tokio::test]
async fn test_recent_id_skipped_for_fresh_one() {
    let lichess = Arc::new(FakeLichess::new(vec![
        raw_puzzle("aaaaa", 1500),
        raw_puzzle("aaaaa", 1500),
        raw_puzzle("bbbbb", 1500),
    ]));
    let service = service_with(lichess.clone(), None, None, vec![]);

    assert_eq!(service.by_difficulty("medium", &token()).await.unwrap().id, "aaaaa");
    assert_eq!(service.by_difficulty("medium", &token()).await.unwrap().id, "bbbbb");
    assert_eq!(lichess.calls(), 3);
}

#[tokio::test]
async fn test_tiers_are_tracked_separately() {
    let lichess = Arc::new(FakeLichess::repeating(raw_puzzle("abcde", 1500)));
    let service = service_with(lichess.clone(), None, None, vec![]);

    service.by_difficulty("easy", &token()).await.unwrap();
    service.by_difficulty("hard", &token()).await.unwrap();
    assert_eq!(lichess.calls(), 2);

    let tokens = lichess.tokens.lock().unwrap().clone();
    assert_eq!(
        tokens,
        vec![Some("easiest".to_string()), Some("hardest".to_string())]
    );
}

#[tokio::test]
async fn test_empty_id_stops_fetching_without_remembering() {
    let lichess = Arc::new(FakeLichess::repeating(raw_puzzle("", 1500)));
    let service = service_with(lichess.clone(), None, None, vec![]);

    let puzzle = service.by_difficulty("medium", &token()).await.unwrap();
    assert!(puzzle.id.is_empty());
    assert_eq!(lichess.calls(), 1);
    assert_eq!(service.recency().len(Some(Difficulty::Medium)), 0);
}

#[tokio::test]
async fn test_unknown_difficulty_is_validation_error() {
    let lichess = Arc::new(FakeLichess::repeating(raw_puzzle("abcde", 1500)));
    let service = service_with(lichess.clone(), None, None, vec![]);

    let err = service.by_difficulty("impossible", &token()).await.unwrap_err();
    assert!(matches!(err, PuzzleError::Validation(_)));
    assert_eq!(lichess.calls(), 0);
}

#[tokio::test]
async fn test_enrichment_prepends_setup_move() {
    let lichess = Arc::new(FakeLichess::repeating(raw_puzzle("abcde", 1500)));
    let service = service_with(lichess, None, None, vec![]);

    let puzzle = service.by_id("abcde", &token()).await.unwrap();
    // Four plies played (e4 e5 Nf3 Nc6); the fifth (Bb5) is the setup move
    assert!(
        puzzle
            .fen
            .starts_with("r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq"),
        "fen was {}",
        puzzle.fen
    );
    assert_eq!(puzzle.moves, vec!["f1b5", "a7a6", "b5a4"]);
    assert_eq!(puzzle.source, PuzzleSource::Lichess);
    assert_eq!(puzzle.game_url.as_deref(), Some("https://lichess.org/g4m3Id00"));
}

#[tokio::test]
async fn test_unusable_transcript_leaves_puzzle_unenriched() {
    let mut raw = raw_puzzle("abcde", 1500);
    raw.game.pgn = "Zz9 ?? garbage".to_string();
    let service = service_with(Arc::new(FakeLichess::repeating(raw)), None, None, vec![]);

    let puzzle = service.by_difficulty("", &token()).await.unwrap();
    assert!(puzzle.fen.is_empty());
    assert_eq!(puzzle.moves, vec!["a7a6", "b5a4"]);
}

#[tokio::test]
async fn test_by_id_validates_and_maps_not_found() {
    let service = service_with(
        Arc::new(FakeLichess::repeating(raw_puzzle("abcde", 1500))),
        None,
        None,
        vec![],
    );

    assert!(matches!(
        service.by_id("ab", &token()).await,
        Err(PuzzleError::Validation(_))
    ));
    assert!(matches!(
        service.by_id("zzzzz", &token()).await,
        Err(PuzzleError::Upstream {
            source: UpstreamError::NotFound(_),
            ..
        })
    ));
}

#[tokio::test]
async fn test_cancelled_token_aborts() {
    let service = service_with(
        Arc::new(FakeLichess::repeating(raw_puzzle("abcde", 1500))),
        None,
        None,
        vec![],
    );
    let cancel = token();
    cancel.cancel();

    assert!(matches!(
        service.daily(&cancel).await,
        Err(PuzzleError::Cancelled)
    ));
}

// ========================================
// Dataset and model-backed operations
// ========================================

fn candidates() -> Arc<FakeDataset> {
    Arc::new(FakeDataset {
        puzzles: vec![
            dataset_puzzle("easy1", 1000),
            dataset_puzzle("easy2", 1100),
            dataset_puzzle("mid01", 1500),
        ],
    })
}

#[tokio::test]
async fn test_unconfigured_capabilities_are_configuration_errors() {
    let service = service_with(
        Arc::new(FakeLichess::repeating(raw_puzzle("abcde", 1500))),
        None,
        None,
        vec![],
    );
    let request = AiPuzzleRequest::new("a back rank mate please", "easy");

    assert!(matches!(
        service.select_with_model(&request, &token()).await,
        Err(PuzzleError::Configuration(_))
    ));
    assert!(matches!(
        service.compose_with_model(&request, &token()).await,
        Err(PuzzleError::Configuration(_))
    ));
    assert!(matches!(
        service.from_dataset("", &token()).await,
        Err(PuzzleError::Configuration(_))
    ));

    let report = service.capabilities();
    assert!(!report.dataset);
    assert!(!report.completion);
}

#[tokio::test]
async fn test_selection_uses_model_choice() {
    let completion = Arc::new(ScriptedCompletion::new(vec![Ok("{\"selected_index\": 1}")]));
    let service = service_with(
        Arc::new(FakeLichess::new(vec![])),
        Some(candidates()),
        Some(completion.clone()),
        vec![],
    );

    let request = AiPuzzleRequest::new("an easy back rank idea", "easy");
    let puzzle = service.select_with_model(&request, &token()).await.unwrap();
    assert_eq!(puzzle.id, "easy2");
    assert_eq!(puzzle.source, PuzzleSource::AiSelection);
    assert_eq!(completion.calls().len(), 1);
}

#[tokio::test]
async fn test_selection_falls_back_to_first_candidate() {
    let completion = Arc::new(ScriptedCompletion::always("I like the second-best one"));
    let service = service_with(
        Arc::new(FakeLichess::new(vec![])),
        Some(candidates()),
        Some(completion.clone()),
        vec!["unused-fallback".to_string()],
    );

    let request = AiPuzzleRequest::new("an easy back rank idea", "easy");
    let puzzle = service.select_with_model(&request, &token()).await.unwrap();
    assert_eq!(puzzle.id, "easy1");
    assert_eq!(puzzle.source, PuzzleSource::AiSelectionFallback);

    let calls = completion.calls();
    assert_eq!(calls.len(), 2, "one corrective retry, no fallback models");
    assert!(calls[1].1 > calls[0].1, "retry carries the correction turns");
}

#[tokio::test]
async fn test_selection_transport_error_does_not_try_other_models() {
    let completion = Arc::new(ScriptedCompletion::new(vec![Err(UpstreamError::Api(
        500,
        "overloaded".to_string(),
    ))]));
    let service = service_with(
        Arc::new(FakeLichess::new(vec![])),
        Some(candidates()),
        Some(completion.clone()),
        vec!["backup".to_string()],
    );

    let request = AiPuzzleRequest::new("an easy back rank idea", "easy");
    let puzzle = service.select_with_model(&request, &token()).await.unwrap();
    assert_eq!(puzzle.source, PuzzleSource::AiSelectionFallback);
    assert_eq!(completion.calls().len(), 1);
}

#[tokio::test]
async fn test_composition_invalid_output_exhausts() {
    let completion = Arc::new(ScriptedCompletion::always("definitely not json"));
    let service = service_with(
        Arc::new(FakeLichess::new(vec![])),
        None,
        Some(completion.clone()),
        vec!["backup".to_string()],
    );

    let request = AiPuzzleRequest::new("a knight fork in the middlegame", "");
    let err = service.compose_with_model(&request, &token()).await.unwrap_err();
    match err {
        PuzzleError::Exhausted { attempts, last_error } => {
            assert_eq!(attempts, 4);
            assert!(last_error.contains("invalid model output"), "{}", last_error);
        }
        other => panic!("expected Exhausted, got {:?}", other),
    }

    let models: Vec<String> = completion.calls().into_iter().map(|(m, _)| m).collect();
    assert_eq!(models, vec!["primary", "primary", "backup", "backup"]);
}

#[tokio::test]
async fn test_composition_corrects_then_succeeds() {
    let completion = Arc::new(ScriptedCompletion::new(vec![
        Ok("{\"fen\": \"not a fen\", \"moves\": [\"e2e4\", \"e7e5\"]}"),
        Ok(VALID_GENERATED),
    ]));
    let service = service_with(
        Arc::new(FakeLichess::new(vec![])),
        None,
        Some(completion.clone()),
        vec![],
    );

    let request = AiPuzzleRequest::new("simple back rank mate", "easy");
    let puzzle = service.compose_with_model(&request, &token()).await.unwrap();
    assert!(puzzle.id.starts_with("ai-"));
    assert_eq!(puzzle.source, PuzzleSource::AiGenerated);
    assert_eq!(puzzle.moves, vec!["d1d8", "g8h8"]);
    assert_eq!(puzzle.difficulty, Difficulty::Easy);
    assert_eq!(completion.calls().len(), 2);
}

#[tokio::test]
async fn test_composition_transport_error_moves_to_next_model() {
    let completion = Arc::new(ScriptedCompletion::new(vec![
        Err(UpstreamError::Network("connection reset".to_string())),
        Ok(VALID_GENERATED),
    ]));
    let service = service_with(
        Arc::new(FakeLichess::new(vec![])),
        None,
        Some(completion.clone()),
        vec!["backup".to_string()],
    );

    let request = AiPuzzleRequest::new("simple back rank mate", "easy");
    service.compose_with_model(&request, &token()).await.unwrap();

    let models: Vec<String> = completion.calls().into_iter().map(|(m, _)| m).collect();
    assert_eq!(models, vec!["primary", "backup"]);
}

#[tokio::test]
async fn test_short_prompt_rejected_before_any_call() {
    let completion = Arc::new(ScriptedCompletion::always(VALID_GENERATED));
    let service = service_with(
        Arc::new(FakeLichess::new(vec![])),
        Some(candidates()),
        Some(completion.clone()),
        vec![],
    );

    let err = service
        .compose_with_model(&AiPuzzleRequest::new("fork", ""), &token())
        .await
        .unwrap_err();
    assert!(matches!(err, PuzzleError::Validation(_)));
    assert!(completion.calls().is_empty());
}

#[tokio::test]
async fn test_dataset_puzzle_filtered_by_tier() {
    let service = service_with(
        Arc::new(FakeLichess::new(vec![])),
        Some(candidates()),
        None,
        vec![],
    );

    let puzzle = service.from_dataset("medium", &token()).await.unwrap();
    assert_eq!(puzzle.id, "mid01");
    assert!(matches!(
        service.from_dataset("hard", &token()).await,
        Err(PuzzleError::Upstream { service: "dataset", .. })
    ));
}
