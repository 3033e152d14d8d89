//! Krishi AI: agricultural question answering over a knowledge graph
//!
//! This library provides:
//! - Query embeddings through a local Ollama server
//! - Cosine-similarity entity lookup in Neo4j
//! - Grounded or fallback prompting of a Groq-hosted language model
//! - An interactive chat loop and optional Prometheus metrics

pub mod chatbot;
pub mod config;
pub mod error;
pub mod graph;
pub mod integrations;
pub mod metrics;
pub mod orchestrator;
pub mod prompts;

// Re-export common types
pub use config::{Config, SimilarityFunction};
pub use error::{Error, Result};
pub use graph::GraphStore;
pub use integrations::{GroqClient, OllamaClient};
pub use orchestrator::{
    Answer, AnswerKind, Embedder, EntityIndex, EntityMatch, LanguageModel, Orchestrator, TOP_K,
};
pub use prompts::{compose_fallback_prompt, compose_grounded_prompt, Prompt};
