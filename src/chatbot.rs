//! Interactive chat loop.

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use crate::metrics;
use crate::orchestrator::{EntityIndex, Embedder, LanguageModel, Orchestrator};
use crate::Result;

pub const WELCOME: &str =
    "🌱 Welcome to Krishi.AI! (Groq LLM + Neo4j + Ollama embeddings) 🌾";
pub const USER_LABEL: &str = "🧑 You: ";
pub const BOT_LABEL: &str = "🌱 KrishiAI: ";
pub const FAREWELL: &str = "🌱 KrishiAI: Bye 👋";
pub const ERROR_LABEL: &str = "⚠️ Error:";

/// Empty input, `exit` and `quit` (any case) end the session. Expects a
/// trimmed line.
pub fn is_exit_command(input: &str) -> bool {
    input.is_empty() || input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

/// Read questions from `input` until an exit command or end of input,
/// answering each one on `output`.
///
/// Service failures are reported and the loop moves on to the next line.
/// Only terminal I/O errors end the loop early.
pub async fn run<E, G, M, R, W>(
    orchestrator: &Orchestrator<E, G, M>,
    mut input: R,
    output: &mut W,
) -> Result<()>
where
    E: Embedder,
    G: EntityIndex,
    M: LanguageModel,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    writeln!(output, "\n{}\n", WELCOME)?;

    loop {
        write!(output, "{}", USER_LABEL)?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line).await? == 0 {
            debug!("End of input");
            writeln!(output)?;
            writeln!(output, "{}", FAREWELL)?;
            return Ok(());
        }

        let query = line.trim();
        if is_exit_command(query) {
            writeln!(output, "{}", FAREWELL)?;
            return Ok(());
        }

        match orchestrator.answer_with_context(query).await {
            Ok(answer) => {
                metrics::record_turn(answer.kind.as_str());
                writeln!(output, "{}{}\n", BOT_LABEL, answer.text)?;
            }
            Err(err) => {
                metrics::record_turn("error");
                warn!("Turn failed: {}", err);
                writeln!(output, "{} {}", ERROR_LABEL, err)?;
            }
        }
    }
}

/// Answer a single question, for non-interactive use.
pub async fn answer_once<E, G, M, W>(
    orchestrator: &Orchestrator<E, G, M>,
    query: &str,
    output: &mut W,
) -> Result<()>
where
    E: Embedder,
    G: EntityIndex,
    M: LanguageModel,
    W: Write,
{
    let result = orchestrator.answer_with_context(query.trim()).await;
    let answer = match result {
        Ok(answer) => answer,
        Err(err) => {
            metrics::record_turn("error");
            return Err(err);
        }
    };

    metrics::record_turn(answer.kind.as_str());
    writeln!(output, "{}{}", BOT_LABEL, answer.text)?;
    Ok(())
}
