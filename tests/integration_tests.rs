//! Integration tests for the krishi_ai library
//!
//! The Ollama and Groq clients talk to `httpmock` servers; the graph store is
//! replaced by an in-memory index with the same ranking contract.

use std::io::Write;

use async_trait::async_trait;
use httpmock::prelude::*;
use serde_json::json;

use krishi_ai::{
    chatbot, compose_fallback_prompt, compose_grounded_prompt, AnswerKind, EntityIndex,
    EntityMatch, Error, GroqClient, OllamaClient, Orchestrator, Result, TOP_K,
};

// ============================================================================
// Fixtures
// ============================================================================

/// Entities with fixed scores, ranked like the Cypher query (score desc,
/// name asc) and capped at the requested limit.
struct InMemoryGraph {
    entities: Vec<EntityMatch>,
}

#[async_trait]
impl EntityIndex for InMemoryGraph {
    async fn similarity_search(&self, _vector: &[f32], limit: usize) -> Result<Vec<EntityMatch>> {
        let mut ranked = self.entities.clone();
        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.name.cmp(&b.name))
        });
        ranked.truncate(limit);
        Ok(ranked)
    }
}

struct UnreachableGraph;

#[async_trait]
impl EntityIndex for UnreachableGraph {
    async fn similarity_search(&self, _vector: &[f32], _limit: usize) -> Result<Vec<EntityMatch>> {
        Err(Error::GraphQuery("Neo4j connection refused".to_string()))
    }
}

fn sandy_soil_graph() -> InMemoryGraph {
    InMemoryGraph {
        entities: vec![
            EntityMatch::new("Millet", 0.91),
            EntityMatch::new("Sorghum", 0.88),
            EntityMatch::new("Groundnut", 0.79),
            EntityMatch::new("Wheat", 0.40),
        ],
    }
}

fn ollama(server: &MockServer) -> OllamaClient {
    OllamaClient::with_url(&server.base_url(), "nomic-embed-text:latest").unwrap()
}

fn groq(server: &MockServer) -> GroqClient {
    GroqClient::new("gsk_test")
        .unwrap()
        .with_base_url(server.base_url())
}

fn mock_embeddings(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(POST).path("/api/embed");
        then.status(200)
            .json_body(json!({ "embeddings": [[0.12, 0.5, -0.3, 0.9]] }));
    })
}

fn prompt_of(body: &[u8]) -> String {
    let body: serde_json::Value = serde_json::from_slice(body).unwrap();
    body["messages"][0]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

// ============================================================================
// Orchestrator over real HTTP clients
// ============================================================================

#[tokio::test]
async fn grounded_answer_references_top_three_entities() {
    let embed_server = MockServer::start_async().await;
    let llm_server = MockServer::start_async().await;

    let embed_mock = mock_embeddings(&embed_server);
    let grounded_mock = llm_server.mock(|when, then| {
        when.method(POST).path("/chat/completions").is_true(|req| {
            let prompt = prompt_of(req.body().as_ref());
            prompt.contains("What crop suits sandy soil?")
                && prompt.contains("Millet, Sorghum, Groundnut")
                && !prompt.contains("Wheat")
        });
        then.status(200).json_body(json!({
            "choices": [
                { "message": { "role": "assistant", "content": "Try millet or sorghum." } }
            ]
        }));
    });

    let orchestrator = Orchestrator::new(ollama(&embed_server), sandy_soil_graph(), groq(&llm_server));
    let answer = orchestrator
        .answer_with_context("What crop suits sandy soil?")
        .await
        .unwrap();

    assert_eq!(answer.text, "Try millet or sorghum.");
    assert_eq!(answer.kind, AnswerKind::Grounded);
    assert_eq!(answer.matches.len(), TOP_K);
    embed_mock.assert_calls(1);
    grounded_mock.assert_calls(1);
}

#[tokio::test]
async fn empty_graph_falls_back_to_model_knowledge() {
    let embed_server = MockServer::start_async().await;
    let llm_server = MockServer::start_async().await;

    mock_embeddings(&embed_server);
    let fallback_mock = llm_server.mock(|when, then| {
        when.method(POST).path("/chat/completions").is_true(|req| {
            let prompt = prompt_of(req.body().as_ref());
            prompt.starts_with("The knowledge graph has no answer.")
                && prompt.ends_with("When should mustard be sown?")
        });
        then.status(200).json_body(json!({
            "choices": [
                { "message": { "role": "assistant", "content": "October to November." } }
            ]
        }));
    });

    let orchestrator = Orchestrator::new(
        ollama(&embed_server),
        InMemoryGraph { entities: Vec::new() },
        groq(&llm_server),
    );

    let text = orchestrator
        .answer("When should mustard be sown?")
        .await
        .unwrap();

    assert_eq!(text, "October to November.");
    fallback_mock.assert_calls(1);
}

#[tokio::test]
async fn embedding_outage_is_an_embedding_error() {
    let embed_server = MockServer::start_async().await;
    let llm_server = MockServer::start_async().await;

    embed_server.mock(|when, then| {
        when.method(POST).path("/api/embed");
        then.status(500).body("model runner crashed");
    });
    let llm_mock = llm_server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(200);
    });

    let orchestrator = Orchestrator::new(ollama(&embed_server), sandy_soil_graph(), groq(&llm_server));
    let err = orchestrator.answer("anything").await.unwrap_err();

    assert!(matches!(err, Error::Embedding(_)));
    llm_mock.assert_calls(0);
}

// ============================================================================
// Chat loop
// ============================================================================

#[tokio::test]
async fn chat_session_survives_failures_and_exits_cleanly() {
    let embed_server = MockServer::start_async().await;
    let llm_server = MockServer::start_async().await;

    let embed_mock = mock_embeddings(&embed_server);
    let llm_mock = llm_server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(200).json_body(json!({
            "choices": [ { "message": { "role": "assistant", "content": "unused" } } ]
        }));
    });

    let orchestrator = Orchestrator::new(ollama(&embed_server), UnreachableGraph, groq(&llm_server));

    let mut output = Vec::new();
    chatbot::run(
        &orchestrator,
        "Best fertilizer for paddy?\nAnd for wheat?\n  QUIT \n".as_bytes(),
        &mut output,
    )
    .await
    .unwrap();
    let transcript = String::from_utf8(output).unwrap();

    assert_eq!(
        transcript
            .matches("⚠️ Error: Graph query error: Neo4j connection refused")
            .count(),
        2
    );
    assert!(transcript.trim_end().ends_with(chatbot::FAREWELL));
    embed_mock.assert_calls(2);
    llm_mock.assert_calls(0);
}

#[tokio::test]
async fn exit_makes_no_service_calls() {
    let embed_server = MockServer::start_async().await;
    let llm_server = MockServer::start_async().await;

    let embed_mock = mock_embeddings(&embed_server);
    let llm_mock = llm_server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(200);
    });

    let orchestrator = Orchestrator::new(ollama(&embed_server), sandy_soil_graph(), groq(&llm_server));

    let mut output = Vec::new();
    chatbot::run(&orchestrator, "   ExIt   \n".as_bytes(), &mut output)
        .await
        .unwrap();

    let transcript = String::from_utf8(output).unwrap();
    assert!(transcript.contains("🌱 KrishiAI: Bye 👋"));
    embed_mock.assert_calls(0);
    llm_mock.assert_calls(0);
}

// ============================================================================
// Prompts and config
// ============================================================================

#[test]
fn test_prompt_composition_public_api() {
    let names = vec!["Millet".to_string(), "Sorghum".to_string()];
    let grounded = compose_grounded_prompt("Dryland crops?", &names);
    let fallback = compose_fallback_prompt("Dryland crops?");

    assert!(grounded.contains("Dryland crops?"));
    assert!(grounded.contains("Millet, Sorghum"));
    assert!(fallback.contains("Dryland crops?"));
    assert!(!fallback.contains("Millet"));
}

#[test]
fn test_config_file_values_are_loaded() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "neo4j:\n  similarity: native\nollama:\n  url: \"http://ollama.test:11434\""
    )
    .unwrap();

    let config = krishi_ai::Config::load_from_file(file.path()).unwrap();

    // Environment may override these in CI; only check when it does not.
    if std::env::var("NEO4J_SIMILARITY").is_err() {
        assert_eq!(config.similarity, krishi_ai::SimilarityFunction::Native);
    }
    if std::env::var("OLLAMA_URL").is_err() {
        assert_eq!(config.ollama_url, "http://ollama.test:11434");
    }
}
