//! Query orchestration: embed the question, look up similar entities in the
//! knowledge graph and let the language model phrase the answer.

use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::metrics;
use crate::prompts::{compose_fallback_prompt, compose_grounded_prompt};
use crate::Result;

/// Maximum number of entity matches handed to the model.
pub const TOP_K: usize = 3;

/// Turns text into an embedding vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Ranks stored entities by cosine similarity to a vector.
#[async_trait]
pub trait EntityIndex: Send + Sync {
    /// At most `limit` matches, best first. No comparable entities is an
    /// empty result, not an error.
    async fn similarity_search(&self, vector: &[f32], limit: usize) -> Result<Vec<EntityMatch>>;
}

/// Single-turn prompt completion.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Entity returned by the similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMatch {
    pub name: String,
    pub score: f64,
}

impl EntityMatch {
    pub fn new(name: impl Into<String>, score: f64) -> Self {
        Self {
            name: name.into(),
            score,
        }
    }
}

/// Which prompt a turn used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerKind {
    Grounded,
    Fallback,
}

impl AnswerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerKind::Grounded => "grounded",
            AnswerKind::Fallback => "fallback",
        }
    }
}

/// Model reply together with the graph context it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub kind: AnswerKind,
    pub matches: Vec<EntityMatch>,
}

/// Sequences one request through the three services.
pub struct Orchestrator<E, G, M> {
    embedder: E,
    graph: G,
    model: M,
}

impl<E, G, M> Orchestrator<E, G, M>
where
    E: Embedder,
    G: EntityIndex,
    M: LanguageModel,
{
    pub fn new(embedder: E, graph: G, model: M) -> Self {
        Self {
            embedder,
            graph,
            model,
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let vector = self.embedder.embed(text).await;
        metrics::record_stage("embed", start.elapsed());
        vector
    }

    /// Top matches for the vector, never more than [`TOP_K`].
    pub async fn similarity_search(&self, vector: &[f32]) -> Result<Vec<EntityMatch>> {
        let start = Instant::now();
        let result = self.graph.similarity_search(vector, TOP_K).await;
        metrics::record_stage("search", start.elapsed());

        let mut matches = result?;
        matches.truncate(TOP_K);
        Ok(matches)
    }

    pub async fn invoke_model(&self, prompt: &str) -> Result<String> {
        let start = Instant::now();
        let reply = self.model.complete(prompt).await;
        metrics::record_stage("model", start.elapsed());
        reply
    }

    /// Answer text for a user question.
    pub async fn answer(&self, query: &str) -> Result<String> {
        Ok(self.answer_with_context(query).await?.text)
    }

    /// Like [`Orchestrator::answer`], also reporting the matches and branch.
    pub async fn answer_with_context(&self, query: &str) -> Result<Answer> {
        let vector = self.embed(query).await?;
        let matches = self.similarity_search(&vector).await?;

        let (kind, prompt) = if matches.is_empty() {
            (AnswerKind::Fallback, compose_fallback_prompt(query))
        } else {
            let names: Vec<String> = matches.iter().map(|m| m.name.clone()).collect();
            (AnswerKind::Grounded, compose_grounded_prompt(query, &names))
        };

        debug!(?matches, kind = kind.as_str(), "Composed prompt");

        let text = self.invoke_model(&prompt).await?;
        info!(kind = kind.as_str(), matches = matches.len(), "Answered query");

        Ok(Answer {
            text,
            kind,
            matches,
        })
    }
}
