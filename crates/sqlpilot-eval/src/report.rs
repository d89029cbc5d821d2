use chrono::Utc;

use crate::harness::EvalSummary;

/// Render the batch run as a plain-text report: aggregate accuracy and mean
/// latency first, then one block per item with the predicted and gold SQL
/// for failures.
pub fn render_report(summary: &EvalSummary, model_name: &str, top_k: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Evaluated at: {}\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!("Model: {model_name} | Top-K: {top_k}\n"));
    out.push_str(&format!(
        "Execution accuracy: {:.4} ({}/{})\n",
        summary.accuracy(),
        summary.correct,
        summary.total
    ));
    out.push_str(&format!(
        "Mean latency: {:.2}s\n",
        summary.mean_latency().as_secs_f64()
    ));
    out.push_str(&"-".repeat(30));
    out.push('\n');

    for item in &summary.results {
        out.push_str(&format!(
            "ID: {} | {} | Time: {:.2}s\n",
            item.id,
            if item.passed { "PASS" } else { "FAIL" },
            item.latency.as_secs_f64()
        ));
        out.push_str(&format!("Q: {}\n", item.question));
        if !item.passed {
            out.push_str(&format!("Pred: {}\n", item.predicted_sql));
            out.push_str(&format!("Gold: {}\n", item.gold_sql));
        }
        if let Some(error) = &item.error {
            out.push_str(&format!("Error: {error}\n"));
        }
        out.push_str(&"-".repeat(20));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::render_report;
    use crate::harness::{EvalItemResult, EvalSummary};
    use std::time::Duration;

    fn summary() -> EvalSummary {
        EvalSummary {
            results: vec![
                EvalItemResult {
                    id: 1,
                    question: "How many departments?".to_string(),
                    gold_sql: "SELECT count(*) FROM department".to_string(),
                    predicted_sql: "SELECT count(*) FROM department".to_string(),
                    passed: true,
                    latency: Duration::from_millis(1200),
                    error: None,
                },
                EvalItemResult {
                    id: 2,
                    question: "List budgets.".to_string(),
                    gold_sql: "SELECT budget FROM department".to_string(),
                    predicted_sql: "SELECT dept_name FROM department".to_string(),
                    passed: false,
                    latency: Duration::from_millis(800),
                    error: Some("rows differ".to_string()),
                },
            ],
            correct: 1,
            total: 2,
        }
    }

    #[test]
    fn report_contains_aggregates_and_failures() {
        let report = render_report(&summary(), "deepseek-chat", 5);

        assert!(report.contains("Execution accuracy: 0.5000 (1/2)"));
        assert!(report.contains("Model: deepseek-chat | Top-K: 5"));
        assert!(report.contains("ID: 1 | PASS"));
        assert!(report.contains("ID: 2 | FAIL"));
        // Failed items show both statements; passing items only the question.
        assert!(report.contains("Pred: SELECT dept_name FROM department"));
        assert!(report.contains("Gold: SELECT budget FROM department"));
        assert!(report.contains("Error: rows differ"));
        assert_eq!(report.matches("Pred:").count(), 1);
    }

    #[test]
    fn empty_summary_reports_zero_accuracy() {
        let empty = EvalSummary {
            results: Vec::new(),
            correct: 0,
            total: 0,
        };
        let report = render_report(&empty, "m", 5);
        assert!(report.contains("Execution accuracy: 0.0000 (0/0)"));
    }
}
