//! Narrative generation: natural-language questions about code, answered by
//! the external completion capability.
//!
//! Every public method here issues exactly one completion request per answer
//! and returns the first choice trimmed of surrounding whitespace. Nothing is
//! cached and nothing is retried.
//!
//! At most `max_concurrency` completion requests are in flight per
//! [`Narrator`], however many callers share it.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, error};

use crate::config::DEFAULT_MAX_CONCURRENCY;
use crate::contract::{Completer, Entity, EntityNarrative};
use crate::error::CompletionError;

const NO_CONTEXT: &str = "No additional context provided.";

pub struct Narrator {
    completer: Arc<dyn Completer>,
    permits: Arc<Semaphore>,
    max_concurrency: usize,
}

impl Narrator {
    pub fn new(completer: Arc<dyn Completer>) -> Self {
        Self::with_max_concurrency(completer, DEFAULT_MAX_CONCURRENCY)
    }

    /// A zero limit is treated as one.
    pub fn with_max_concurrency(completer: Arc<dyn Completer>, max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            completer,
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Answer `question` about `code`.
    pub async fn narrate(&self, code: &str, question: &str) -> Result<String, CompletionError> {
        self.ask(&explain_prompt(code, question)).await
    }

    /// Explanation plus example usage for one entity.
    pub async fn narrate_entity(&self, entity: &Entity) -> Result<EntityNarrative, CompletionError> {
        let explain = explanation_question(entity);
        let example = example_question(entity);
        let (explanation, example) = futures::try_join!(
            self.narrate(entity.source(), &explain),
            self.narrate(entity.source(), &example),
        )?;
        Ok(EntityNarrative {
            entity: entity.clone(),
            explanation,
            example,
        })
    }

    /// Write a PEP-257 docstring for a code snippet.
    pub async fn generate_docstring(
        &self,
        code: &str,
        context: Option<&str>,
    ) -> Result<String, CompletionError> {
        let prompt = format!(
            "Generate a docstring for the following Python code. Follow PEP-257 standards and include:\n\
             - A one-line summary.\n\
             - A detailed description (if necessary).\n\
             - Args (for functions).\n\
             - Returns (for functions).\n\
             - Raises (if applicable).\n\n\
             Code:\n{code}\n\n\
             Context:\n{}\n",
            context.unwrap_or(NO_CONTEXT)
        );
        self.ask(&prompt).await
    }

    /// Rewrite an existing docstring for clarity and completeness.
    pub async fn improve_docstring(
        &self,
        docstring: &str,
        context: Option<&str>,
    ) -> Result<String, CompletionError> {
        let prompt = format!(
            "Improve the following docstring for clarity, readability, and completeness. \
             Convert passive voice to active voice where applicable.\n\n\
             Docstring:\n{docstring}\n\n\
             Context:\n{}\n",
            context.unwrap_or(NO_CONTEXT)
        );
        self.ask(&prompt).await
    }

    async fn ask(&self, prompt: &str) -> Result<String, CompletionError> {
        let _permit = self.permits.acquire().await.map_err(|e| {
            error!(error = %e, "Completion permits closed");
            CompletionError::Transport(format!("failed to acquire completion permit: {e}"))
        })?;
        debug!(prompt_len = prompt.len(), "Requesting completion");
        match self.completer.complete(prompt).await {
            Ok(text) => Ok(text.trim().to_string()),
            Err(e) => {
                error!(error = %e, "Completion request failed");
                Err(e)
            }
        }
    }
}

pub fn explanation_question(entity: &Entity) -> String {
    format!("What does the {} `{}` do?", entity.kind(), entity.name())
}

pub fn example_question(entity: &Entity) -> String {
    format!(
        "Provide an example usage for the {} `{}`.",
        entity.kind(),
        entity.name()
    )
}

fn explain_prompt(code: &str, question: &str) -> String {
    format!(
        "The user has provided the following Python code:\n{code}\n\n\
         They are asking: \"{question}\"\n\n\
         Provide a clear and concise explanation of what the code does, focusing on the user's query.\n"
    )
}
