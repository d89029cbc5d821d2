use std::path::Path;

use serde::{Deserialize, Serialize};
use sqlpilot_common::Result;
use tracing::info;

/// One question/SQL pair from the training corpus. Immutable for the
/// lifetime of the retriever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub question: String,
    pub sql: String,
}

/// A test-set item: the question together with its gold SQL, kept aligned
/// by loading both from the same record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldItem {
    pub question: String,
    pub gold_sql: String,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    db_id: String,
    #[serde(default)]
    question: String,
    #[serde(default)]
    query: String,
}

fn load_records(path: &Path, dataset_id: &str) -> Result<Vec<RawRecord>> {
    let contents = std::fs::read_to_string(path)?;
    let records: Vec<RawRecord> = serde_json::from_str(&contents)?;
    Ok(records
        .into_iter()
        .filter(|r| r.db_id == dataset_id)
        .collect())
}

/// Load the retrieval corpus from the training JSON, keeping only records
/// for `dataset_id` with a non-empty question and SQL.
pub fn load_examples(path: &Path, dataset_id: &str) -> Result<Vec<Example>> {
    let examples: Vec<Example> = load_records(path, dataset_id)?
        .into_iter()
        .filter_map(|r| {
            let question = r.question.trim().to_string();
            let sql = r.query.trim().to_string();
            (!question.is_empty() && !sql.is_empty()).then_some(Example { question, sql })
        })
        .collect();

    info!(
        "loaded {} examples for dataset {} from {}",
        examples.len(),
        dataset_id,
        path.display()
    );
    Ok(examples)
}

/// Load aligned question/gold-SQL pairs from the test JSON. Question and
/// gold SQL come from the same record so they cannot drift out of step.
pub fn load_gold_items(path: &Path, dataset_id: &str) -> Result<Vec<GoldItem>> {
    let items: Vec<GoldItem> = load_records(path, dataset_id)?
        .into_iter()
        .filter_map(|r| {
            let question = r.question.trim().to_string();
            let gold_sql = r.query.trim().to_string();
            (!question.is_empty() && !gold_sql.is_empty()).then_some(GoldItem {
                question,
                gold_sql,
            })
        })
        .collect();

    info!(
        "loaded {} evaluation items for dataset {}",
        items.len(),
        dataset_id
    );
    Ok(items)
}
