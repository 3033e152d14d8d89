//! Configuration for the embedding, graph and language-model services
//!
//! Values come from built-in defaults, an optional `krishi.yml` file and the
//! process environment (including `.env`). Environment variables take
//! precedence over the YAML file.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::{Error, Result};

/// Default config file, looked up in the working directory
pub const CONFIG_FILE: &str = "krishi.yml";

pub const DEFAULT_GROQ_MODEL: &str = "llama-3.1-8b-instant";
pub const GROQ_API_URL: &str = "https://api.groq.com/openai/v1";

pub const DEFAULT_NEO4J_URI: &str = "bolt://localhost:7687";
pub const DEFAULT_NEO4J_USER: &str = "neo4j";
pub const DEFAULT_NEO4J_PASSWORD: &str = "llm12345";

pub const OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text:latest";

/// Cypher function used to score entities against the query vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SimilarityFunction {
    /// `gds.similarity.cosine` (Graph Data Science plugin)
    #[default]
    Gds,
    /// `vector.similarity.cosine` (Neo4j 5.18+)
    Native,
}

impl SimilarityFunction {
    pub fn cypher_name(&self) -> &'static str {
        match self {
            SimilarityFunction::Gds => "gds.similarity.cosine",
            SimilarityFunction::Native => "vector.similarity.cosine",
        }
    }
}

impl FromStr for SimilarityFunction {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "gds" => Ok(SimilarityFunction::Gds),
            "native" | "vector" => Ok(SimilarityFunction::Native),
            other => Err(Error::Configuration(format!(
                "unknown similarity function '{}', expected 'gds' or 'native'",
                other
            ))),
        }
    }
}

impl fmt::Display for SimilarityFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimilarityFunction::Gds => write!(f, "gds"),
            SimilarityFunction::Native => write!(f, "native"),
        }
    }
}

/// YAML config structures
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    groq: Option<GroqConfig>,
    neo4j: Option<Neo4jConfig>,
    ollama: Option<OllamaConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct GroqConfig {
    api_key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Neo4jConfig {
    uri: Option<String>,
    user: Option<String>,
    password: Option<String>,
    similarity: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OllamaConfig {
    url: Option<String>,
    embedding_model: Option<String>,
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct Config {
    /// Only the chat and ask commands need it, see [`Config::require_groq_api_key`]
    pub groq_api_key: Option<String>,
    pub groq_model: String,
    pub groq_base_url: String,
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub similarity: SimilarityFunction,
    pub ollama_url: String,
    pub embedding_model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            groq_api_key: None,
            groq_model: DEFAULT_GROQ_MODEL.to_string(),
            groq_base_url: GROQ_API_URL.to_string(),
            neo4j_uri: DEFAULT_NEO4J_URI.to_string(),
            neo4j_user: DEFAULT_NEO4J_USER.to_string(),
            neo4j_password: DEFAULT_NEO4J_PASSWORD.to_string(),
            similarity: SimilarityFunction::default(),
            ollama_url: OLLAMA_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }
}

impl Config {
    /// Load configuration for the process.
    ///
    /// An explicit `path` must exist. Without one, `krishi.yml` is used when
    /// present and skipped otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_dotenv();

        match path {
            Some(path) => Self::load_from_file(path),
            None if Path::new(CONFIG_FILE).exists() => Self::load_from_file(CONFIG_FILE),
            None => Self::from_yaml_str(""),
        }
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    /// Load configuration from a specific YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Build configuration from YAML text, letting environment variables win.
    /// Empty text yields defaults plus environment.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let yaml: YamlConfig = if content.trim().is_empty() {
            YamlConfig::default()
        } else {
            serde_yaml::from_str(content)?
        };

        let groq = yaml.groq.unwrap_or_default();
        let neo4j = yaml.neo4j.unwrap_or_default();
        let ollama = yaml.ollama.unwrap_or_default();

        let similarity = match resolve_optional(neo4j.similarity, "NEO4J_SIMILARITY") {
            Some(value) => value.parse()?,
            None => SimilarityFunction::default(),
        };

        Ok(Self {
            groq_api_key: resolve_optional(groq.api_key, "GROQ_API_KEY"),
            groq_model: resolve(groq.model, "GROQ_MODEL", DEFAULT_GROQ_MODEL),
            groq_base_url: resolve(groq.base_url, "GROQ_BASE_URL", GROQ_API_URL),
            neo4j_uri: resolve(neo4j.uri, "NEO4J_URI", DEFAULT_NEO4J_URI),
            neo4j_user: resolve(neo4j.user, "NEO4J_USER", DEFAULT_NEO4J_USER),
            neo4j_password: resolve(neo4j.password, "NEO4J_PASS", DEFAULT_NEO4J_PASSWORD),
            similarity,
            ollama_url: resolve(ollama.url, "OLLAMA_URL", OLLAMA_URL),
            embedding_model: resolve(
                ollama.embedding_model,
                "OLLAMA_EMBED_MODEL",
                DEFAULT_EMBEDDING_MODEL,
            ),
        })
    }

    /// The language-model key, or a configuration error when it is missing
    pub fn require_groq_api_key(&self) -> Result<&str> {
        self.groq_api_key
            .as_deref()
            .ok_or_else(|| Error::Configuration("GROQ_API_KEY not found in .env".to_string()))
    }
}

/// Resolve a value: explicit env var first, then `${VAR}` references in the
/// YAML value, then the literal YAML value. Blank values count as unset.
fn resolve_optional(value: Option<String>, env_key: &str) -> Option<String> {
    if let Some(env_val) = non_blank_env(env_key) {
        return Some(env_val);
    }

    let value = value?;
    let trimmed = value.trim();
    if trimmed.starts_with("${") && trimmed.ends_with('}') {
        let var_name = &trimmed[2..trimmed.len() - 1];
        return non_blank_env(var_name);
    }

    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn resolve(value: Option<String>, env_key: &str, default: &str) -> String {
    resolve_optional(value, env_key).unwrap_or_else(|| default.to_string())
}

fn non_blank_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
