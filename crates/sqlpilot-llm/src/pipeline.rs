use std::sync::Arc;
use std::time::Duration;

use sqlpilot_common::{CompletionProvider, Error, Result, SessionMemory};
use sqlpilot_db::{QueryResult, SqlExecutor};
use sqlpilot_retrieval::HybridRetriever;
use tracing::{debug, info, warn};

use crate::generate::{Generated, SqlGenerator, clean_text};
use crate::prompt::{build_prompt, build_rewrite_prompt};

/// Result of one answered question.
#[derive(Debug, Clone)]
pub struct Answer {
    /// The question the pipeline actually answered, rewritten from the raw
    /// input when conversation memory resolved a follow-up.
    pub question: String,
    pub sql: String,
    pub result: QueryResult,
    /// True when the executed statement came out of the repair round.
    pub repaired: bool,
}

/// The question-to-result pipeline: retrieve → assemble → generate → gate →
/// execute, with exactly one execution-guided repair round.
///
/// Holds only shared immutable state (indices, schema text, providers), so
/// one instance serves any number of concurrent sessions. Session memory is
/// owned by the caller and passed in per call.
pub struct QueryPipeline {
    retriever: Arc<HybridRetriever>,
    generator: SqlGenerator,
    executor: Arc<SqlExecutor>,
    provider: Arc<dyn CompletionProvider>,
    schema_text: String,
    top_k: usize,
    execution_timeout: Duration,
}

impl QueryPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        retriever: Arc<HybridRetriever>,
        provider: Arc<dyn CompletionProvider>,
        executor: Arc<SqlExecutor>,
        schema_text: String,
        top_k: usize,
        completion_timeout: Duration,
        execution_timeout: Duration,
    ) -> Self {
        let generator = SqlGenerator::new(Arc::clone(&provider), completion_timeout);
        Self {
            retriever,
            generator,
            executor,
            provider,
            schema_text,
            top_k,
            execution_timeout,
        }
    }

    pub fn schema_text(&self) -> &str {
        &self.schema_text
    }

    /// Answer one question. Gate rejections are terminal; an execution
    /// failure triggers the single repair round, and a second failure
    /// surfaces `Error::Execution` carrying the last attempted SQL and the
    /// engine's message.
    pub async fn answer(&self, question: &str, memory: &SessionMemory) -> Result<Answer> {
        let question = normalize_question(question);
        let question = if memory.is_empty() {
            question
        } else {
            self.resolve_follow_up(&question, memory).await
        };

        let examples = self.retriever.search(&question, self.top_k).await;
        debug!("retrieved {} few-shot examples", examples.len());

        let prompt = build_prompt(&self.schema_text, &examples, &question, memory.turns());
        let generated = match self.generator.generate(&prompt, &question).await? {
            Generated::Statement(sql) => sql,
            Generated::NotSelect { raw, .. } => {
                // Nothing SELECT-prefixed was ever produced; surface the raw
                // model output for diagnosis instead of executing.
                return Err(Error::Generation(raw));
            }
        };

        match Arc::clone(&self.executor)
            .execute(&generated, self.execution_timeout)
            .await
        {
            Ok(result) => Ok(Answer {
                question,
                sql: generated,
                result,
                repaired: false,
            }),
            Err(Error::Execution { sql, message }) => {
                info!("execution failed, attempting one repair round: {message}");
                let repaired = self
                    .generator
                    .repair(&prompt, &question, &generated, &message)
                    .await?;
                if repaired == sql {
                    debug!("repair returned the failing statement unchanged");
                }
                let result = Arc::clone(&self.executor)
                    .execute(&repaired, self.execution_timeout)
                    .await?;
                Ok(Answer {
                    question,
                    sql: repaired,
                    result,
                    repaired: true,
                })
            }
            Err(other) => Err(other),
        }
    }

    /// Rewrite an elliptical follow-up into a standalone question using the
    /// conversation memory. Best-effort: any failure falls back to the raw
    /// question rather than failing the turn.
    async fn resolve_follow_up(&self, question: &str, memory: &SessionMemory) -> String {
        let prompt = build_rewrite_prompt(question, memory.turns());
        match self.provider.complete(&prompt).await {
            Ok(response) => {
                let rewritten = clean_text(&response);
                if rewritten.is_empty() {
                    question.to_string()
                } else {
                    debug!("follow-up resolved to: {rewritten}");
                    rewritten
                }
            }
            Err(e) => {
                warn!("follow-up rewrite failed, using the raw question: {e}");
                question.to_string()
            }
        }
    }
}

/// Collapse internal whitespace runs and trim the ends.
fn normalize_question(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
