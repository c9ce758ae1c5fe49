//! Wire-level tests for the HTTP embedding client: request shape, retry
//! exhaustion, linear inter-attempt delay, and fail-fast dimension checks.

use std::time::{Duration, Instant};

use httpmock::prelude::*;
use serde_json::json;

use ragbase::config::EmbeddingConfig;
use ragbase::embedding::{Embedder, HttpEmbedder};
use ragbase::error::EmbedError;

fn config(base_url: String, max_attempts: u32, retry_delay_secs: u64) -> EmbeddingConfig {
    EmbeddingConfig {
        base_url,
        model: "test-model".to_string(),
        dims: 3,
        max_attempts,
        retry_delay_secs,
        timeout_secs: 5,
    }
}

#[tokio::test]
async fn sends_model_and_prompt_and_returns_the_vector() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/embeddings")
                .json_body(json!({"model": "test-model", "prompt": "refund policy"}));
            then.status(200)
                .json_body(json!({"embedding": [0.1, 0.2, 0.3]}));
        })
        .await;

    let embedder = HttpEmbedder::new(&config(server.base_url(), 3, 0)).unwrap();
    let vector = embedder.embed("refund policy").await.unwrap();

    assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn server_errors_are_retried_until_attempts_are_exhausted() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/embeddings");
            then.status(500).body("model is loading");
        })
        .await;

    let embedder = HttpEmbedder::new(&config(server.base_url(), 3, 0)).unwrap();
    let err = embedder.embed("text").await.unwrap_err();

    match err {
        EmbedError::Exhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(last.contains("500"));
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
    mock.assert_hits_async(3).await;
}

#[tokio::test]
async fn transient_failures_recover_within_the_attempt_limit() {
    let server = MockServer::start_async().await;
    let mut failing = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/embeddings");
            then.status(500).body("overloaded");
        })
        .await;

    let embedder = HttpEmbedder::new(&config(server.base_url(), 3, 1)).unwrap();
    let handle = tokio::spawn(async move { embedder.embed("text").await });

    // Attempts land at ~0s and ~1s; heal the provider before the third
    // attempt at ~3s.
    tokio::time::sleep(Duration::from_secs(2)).await;
    let failures = failing.hits_async().await;
    failing.delete_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/embeddings");
            then.status(200)
                .json_body(json!({"embedding": [0.7, 0.8, 0.9]}));
        })
        .await;

    let vector = handle.await.unwrap().unwrap();
    assert_eq!(vector, vec![0.7, 0.8, 0.9]);
    assert_eq!(failures, 2);
}

#[tokio::test]
async fn retry_delay_grows_linearly_with_attempt_number() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/embeddings");
            then.status(503);
        })
        .await;

    let embedder = HttpEmbedder::new(&config(server.base_url(), 3, 1)).unwrap();
    let started = Instant::now();
    let err = embedder.embed("text").await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, EmbedError::Exhausted { attempts: 3, .. }));
    // Sleeps are 1×delay then 2×delay: at least three seconds in total.
    assert!(
        elapsed >= Duration::from_secs(3),
        "expected linear backoff, finished in {elapsed:?}"
    );
}

#[tokio::test]
async fn wrong_dimensionality_fails_fast_without_retrying() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/embeddings");
            then.status(200).json_body(json!({"embedding": [0.1, 0.2]}));
        })
        .await;

    let embedder = HttpEmbedder::new(&config(server.base_url(), 3, 0)).unwrap();
    let err = embedder.embed("text").await.unwrap_err();

    assert!(matches!(
        err,
        EmbedError::Dimensions {
            expected: 3,
            got: 2
        }
    ));
    mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn missing_vector_in_response_is_not_retried() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/embeddings");
            then.status(200).json_body(json!({"unexpected": true}));
        })
        .await;

    let embedder = HttpEmbedder::new(&config(server.base_url(), 3, 0)).unwrap();
    let err = embedder.embed("text").await.unwrap_err();

    assert!(matches!(err, EmbedError::MalformedResponse));
    mock.assert_hits_async(1).await;
}
