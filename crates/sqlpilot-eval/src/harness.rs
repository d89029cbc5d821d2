use std::sync::Arc;
use std::time::{Duration, Instant};

use sqlpilot_common::SessionMemory;
use sqlpilot_db::SqlExecutor;
use sqlpilot_llm::QueryPipeline;
use sqlpilot_retrieval::GoldItem;
use tracing::{info, warn};

/// Outcome of one evaluated question.
#[derive(Debug, Clone)]
pub struct EvalItemResult {
    pub id: usize,
    pub question: String,
    pub gold_sql: String,
    /// The statement the pipeline ended up executing; empty when generation
    /// failed before producing one.
    pub predicted_sql: String,
    pub passed: bool,
    pub latency: Duration,
    pub error: Option<String>,
}

/// Aggregate of a batch run.
#[derive(Debug, Clone)]
pub struct EvalSummary {
    pub results: Vec<EvalItemResult>,
    pub correct: usize,
    pub total: usize,
}

impl EvalSummary {
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }

    pub fn mean_latency(&self) -> Duration {
        if self.results.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.results.iter().map(|r| r.latency).sum();
        total / self.results.len() as u32
    }
}

/// Run the pipeline over a gold set and grade by result equivalence.
///
/// Each item runs with empty memory so items stay independent; the single
/// execution-guided repair round happens inside the pipeline. Given a
/// deterministic completion service the pass/fail content of the summary is
/// reproducible.
pub async fn run_eval(
    pipeline: &QueryPipeline,
    executor: &Arc<SqlExecutor>,
    items: &[GoldItem],
    limit: Option<usize>,
    execution_timeout: Duration,
) -> EvalSummary {
    let total = limit.map_or(items.len(), |l| l.min(items.len()));
    let mut results = Vec::with_capacity(total);
    let mut correct = 0usize;

    for (idx, item) in items.iter().take(total).enumerate() {
        let id = idx + 1;
        let started = Instant::now();
        let answer = pipeline.answer(&item.question, &SessionMemory::new(0)).await;
        let latency = started.elapsed();

        let (predicted_sql, passed, error) = match answer {
            Ok(answer) => {
                match Arc::clone(executor)
                    .execute(&item.gold_sql, execution_timeout)
                    .await
                {
                    Ok(gold_result) => {
                        let passed =
                            crate::equivalence::equivalent(&answer.result.rows, &gold_result.rows);
                        (answer.sql, passed, None)
                    }
                    Err(e) => {
                        warn!("gold SQL failed for item {id}: {e}");
                        (answer.sql, false, Some(format!("gold execution failed: {e}")))
                    }
                }
            }
            Err(e) => (String::new(), false, Some(e.to_string())),
        };

        if passed {
            correct += 1;
        }
        info!(
            "eval item {id}/{total}: {} ({:.2}s)",
            if passed { "pass" } else { "fail" },
            latency.as_secs_f64()
        );

        results.push(EvalItemResult {
            id,
            question: item.question.clone(),
            gold_sql: item.gold_sql.clone(),
            predicted_sql,
            passed,
            latency,
            error,
        });
    }

    EvalSummary {
        results,
        correct,
        total,
    }
}
