//! External service clients.
//!
//! - Ollama (query embeddings)
//! - Groq (chat completions)

pub mod groq;
pub mod ollama;

pub use groq::GroqClient;
pub use ollama::OllamaClient;
