use std::sync::Arc;
use std::time::Duration;

use sqlpilot_common::{CompletionProvider, Error, Result};
use tracing::{debug, warn};

use crate::rewrite::{RewriteContext, apply_rewrites};

/// Re-requests allowed when the draft does not start with SELECT.
const PREFIX_RETRIES: usize = 2;

/// Outcome of one generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generated {
    /// A SELECT-prefixed statement, reviewed and deterministically
    /// rewritten. Ready for the safety gate.
    Statement(String),
    /// Every attempt was exhausted without a SELECT-prefixed statement.
    /// The cleaned and raw last responses are kept so the caller can show
    /// them; the safety gate downstream stays the enforcement point.
    NotSelect { cleaned: String, raw: String },
}

/// Generation phases. Each state carries the data its successors need, and
/// the retry budget travels in the state so it cannot be re-extended.
#[derive(Debug)]
enum Phase {
    Drafting,
    ValidatingPrefix {
        sql: String,
        raw: String,
        retries_left: usize,
    },
    Reviewing {
        sql: String,
    },
    Done {
        sql: String,
    },
    Failed {
        sql: String,
        raw: String,
    },
}

/// Drives the completion service from draft to reviewed, rewritten SQL.
///
/// One instance per pipeline; holds no per-question state. Transport errors
/// surface as `Error::Generation`, timeouts as `Error::Timeout`.
pub struct SqlGenerator {
    provider: Arc<dyn CompletionProvider>,
    call_timeout: Duration,
}

impl SqlGenerator {
    pub fn new(provider: Arc<dyn CompletionProvider>, call_timeout: Duration) -> Self {
        Self {
            provider,
            call_timeout,
        }
    }

    /// Generate SQL for an assembled prompt. `question` feeds the
    /// deterministic rewrite rules.
    pub async fn generate(&self, prompt: &str, question: &str) -> Result<Generated> {
        let mut phase = Phase::Drafting;

        loop {
            phase = match phase {
                Phase::Drafting => {
                    let raw = self.complete(prompt).await?;
                    let sql = clean_sql(&raw);
                    Phase::ValidatingPrefix {
                        sql,
                        raw,
                        retries_left: PREFIX_RETRIES,
                    }
                }
                Phase::ValidatingPrefix {
                    sql,
                    raw,
                    retries_left,
                } => {
                    if is_select(&sql) {
                        Phase::Reviewing { sql }
                    } else if retries_left == 0 {
                        Phase::Failed { sql, raw }
                    } else {
                        debug!("draft is not a SELECT, re-requesting ({retries_left} left)");
                        let retry_prompt = format!(
                            "{prompt}\n\nReturn exactly one SQL statement starting with SELECT. No explanation.\nSQL:"
                        );
                        let raw = self.complete(&retry_prompt).await?;
                        let sql = clean_sql(&raw);
                        Phase::ValidatingPrefix {
                            sql,
                            raw,
                            retries_left: retries_left - 1,
                        }
                    }
                }
                Phase::Reviewing { sql } => {
                    let review_prompt = build_review_prompt(prompt, &sql);
                    let reviewed = clean_sql(&self.complete(&review_prompt).await?);
                    if is_select(&reviewed) {
                        Phase::Done { sql: reviewed }
                    } else {
                        warn!("review pass returned a non-SELECT, keeping pre-review candidate");
                        Phase::Done { sql }
                    }
                }
                Phase::Done { sql } => {
                    let sql = apply_rewrites(&sql, &RewriteContext { question });
                    return Ok(Generated::Statement(sql));
                }
                Phase::Failed { sql, raw } => {
                    return Ok(Generated::NotSelect { cleaned: sql, raw });
                }
            };
        }
    }

    /// One execution-guided repair round: feed the failing SQL and the
    /// engine's error back to the model. Returns the repaired statement when
    /// it is SELECT-prefixed (rewrites re-applied), otherwise the original
    /// SQL unchanged. This is the entire repair budget; callers do not
    /// escalate further.
    pub async fn repair(
        &self,
        prompt: &str,
        question: &str,
        sql: &str,
        error_text: &str,
    ) -> Result<String> {
        let repair_prompt = format!(
            "{prompt}\n\nThe following SQL failed when executed. Fix it so it runs on SQLite and still answers the original question. Output only the corrected SQL, no explanation.\nFailing SQL: {sql}\nExecution error: {error_text}\nCorrected SQL:"
        );
        let fixed = clean_sql(&self.complete(&repair_prompt).await?);
        if is_select(&fixed) {
            Ok(apply_rewrites(&fixed, &RewriteContext { question }))
        } else {
            warn!("repair attempt returned a non-SELECT, keeping the original statement");
            Ok(sql.to_string())
        }
    }

    /// Timeout-bounded completion call. Provider timeouts and the outer
    /// bound both surface as `Error::Timeout`; every other provider failure
    /// becomes `Error::Generation`.
    async fn complete(&self, prompt: &str) -> Result<String> {
        let call = self.provider.complete(prompt);
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(Error::Timeout(msg))) => Err(Error::Timeout(msg)),
            Ok(Err(e)) => Err(Error::Generation(e.to_string())),
            Err(_) => Err(Error::Timeout(format!(
                "completion call exceeded {}s bound",
                self.call_timeout.as_secs()
            ))),
        }
    }
}

fn build_review_prompt(prompt: &str, candidate: &str) -> String {
    format!(
        "{prompt}\n\nBelow is a candidate SQL statement. Check that it strictly answers the question and follows the rules above. Common mistakes: selecting IDs instead of names or titles; using LEFT JOIN where it is not asked for; using MAX/MIN for superlatives so ties behave inconsistently; adding an unnecessary GROUP BY; adding or dropping DISTINCT incorrectly.\nCandidate SQL: {candidate}\n\nIf the candidate is correct, output it unchanged. If not, output the corrected SQL. Output only SQL:"
    )
}

fn is_select(text: &str) -> bool {
    text.to_lowercase().starts_with("select")
}

/// Strip markdown fencing and leading `sql` / `SQLQuery:` labels from a raw
/// completion response.
pub fn clean_sql(text: &str) -> String {
    let mut text = strip_fences(text);
    let lower = text.to_lowercase();
    if lower.starts_with("sqlquery:") {
        text = text["sqlquery:".len()..].trim().to_string();
    } else if lower.starts_with("sql") {
        text = text[3..].trim().to_string();
    }
    text.trim().to_string()
}

/// Strip a markdown code fence, keeping the inner lines.
pub fn clean_text(text: &str) -> String {
    strip_fences(text)
}

fn strip_fences(text: &str) -> String {
    let text = text.trim();
    if !text.starts_with("```") {
        return text.to_string();
    }
    let mut lines: Vec<&str> = text.lines().collect();
    if lines.len() >= 2 {
        lines.remove(0);
    }
    if let Some(last) = lines.last()
        && last.trim().starts_with("```")
    {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::{Generated, SqlGenerator, clean_sql};
    use async_trait::async_trait;
    use sqlpilot_common::{CompletionProvider, Error, Result};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Returns scripted responses in order; repeats the last one when the
    /// script runs out.
    struct ScriptedProvider {
        responses: Vec<Result<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Result<String>>) -> Self {
            Self {
                responses,
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        fn provider_id(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _prompt: &str) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let idx = call.min(self.responses.len() - 1);
            match &self.responses[idx] {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(Error::Generation(e.to_string())),
            }
        }
    }

    fn generator(provider: Arc<ScriptedProvider>) -> SqlGenerator {
        SqlGenerator::new(provider, Duration::from_secs(5))
    }

    async fn run(provider: &Arc<ScriptedProvider>, question: &str) -> Generated {
        generator(Arc::clone(provider))
            .generate("PROMPT", question)
            .await
            .expect("generation should succeed")
    }

    fn statement(generated: Generated) -> String {
        match generated {
            Generated::Statement(sql) => sql,
            Generated::NotSelect { cleaned, .. } => {
                panic!("expected a statement, got non-SELECT: {cleaned}")
            }
        }
    }

    #[test]
    fn clean_sql_strips_fences_and_labels() {
        assert_eq!(clean_sql("```sql\nSELECT 1\n```"), "SELECT 1");
        assert_eq!(clean_sql("```\nSELECT 1\n```"), "SELECT 1");
        assert_eq!(clean_sql("SQLQuery: SELECT 1"), "SELECT 1");
        assert_eq!(clean_sql("sql SELECT 1"), "SELECT 1");
        assert_eq!(clean_sql("  SELECT 1  "), "SELECT 1");
    }

    #[test]
    fn clean_sql_keeps_a_plain_select_untouched() {
        assert_eq!(clean_sql("SELECT a FROM t"), "SELECT a FROM t");
    }

    #[tokio::test]
    async fn clean_draft_goes_through_one_review_call() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok("SELECT name FROM instructor".to_string()),
            Ok("SELECT name FROM instructor".to_string()),
        ]));
        let out = statement(run(&provider, "list instructor names").await);

        assert_eq!(out, "SELECT name FROM instructor");
        // Draft + review, nothing else.
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn non_select_draft_is_retried_then_reviewed() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok("I think you want the instructor names.".to_string()),
            Ok("SELECT name FROM instructor".to_string()),
            Ok("SELECT name FROM instructor".to_string()),
        ]));
        let out = statement(run(&provider, "list instructor names").await);

        assert_eq!(out, "SELECT name FROM instructor");
        // Draft + one prefix retry + review.
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_last_response() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(
            "I am unable to write SQL for that.".to_string()
        )]));
        let out = run(&provider, "nonsense").await;

        match out {
            Generated::NotSelect { cleaned, raw } => {
                assert_eq!(cleaned, "I am unable to write SQL for that.");
                assert_eq!(raw, "I am unable to write SQL for that.");
            }
            Generated::Statement(sql) => panic!("unexpected statement: {sql}"),
        }
        // Draft + exactly two retries, no review call.
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn review_output_is_dropped_when_not_select() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok("SELECT salary FROM instructor".to_string()),
            Ok("The candidate looks fine to me!".to_string()),
        ]));
        let out = statement(run(&provider, "instructor salaries").await);
        assert_eq!(out, "SELECT salary FROM instructor");
    }

    #[tokio::test]
    async fn review_can_replace_the_candidate() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok("SELECT id FROM instructor".to_string()),
            Ok("SELECT name FROM instructor".to_string()),
        ]));
        let out = statement(run(&provider, "list instructor names").await);
        assert_eq!(out, "SELECT name FROM instructor");
    }

    #[tokio::test]
    async fn rewrites_run_after_review() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok("SELECT DISTINCT name FROM instructor".to_string()),
            Ok("SELECT DISTINCT name FROM instructor".to_string()),
        ]));
        let out = statement(run(&provider, "list the names of instructors").await);
        assert_eq!(out, "SELECT name FROM instructor");
    }

    #[tokio::test]
    async fn transport_error_maps_to_generation_error() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(Error::Generation(
            "connection refused".to_string(),
        ))]));
        let err = generator(provider)
            .generate("PROMPT", "question")
            .await
            .expect_err("transport failure should surface");
        assert!(matches!(err, Error::Generation(_)));
    }

    #[tokio::test]
    async fn repair_accepts_a_select_and_reapplies_rewrites() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(
            "SELECT DISTINCT dept_name FROM department".to_string(),
        )]));
        let fixed = generator(provider)
            .repair(
                "PROMPT",
                "list departments",
                "SELECT dept FROM department",
                "no such column: dept",
            )
            .await
            .expect("repair should succeed");
        assert_eq!(fixed, "SELECT dept_name FROM department");
    }

    #[tokio::test]
    async fn repair_keeps_original_when_response_is_not_select() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(
            "Sorry, I cannot fix that.".to_string()
        )]));
        let fixed = generator(provider)
            .repair("PROMPT", "q", "SELECT broken FROM t", "error text")
            .await
            .expect("repair should not fail");
        assert_eq!(fixed, "SELECT broken FROM t");
    }
}
