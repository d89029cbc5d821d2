use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlpilot_common::{CompletionProvider, EmbeddingProvider, Error, SessionId, SessionMemory};
use sqlpilot_config::AppConfig;
use sqlpilot_db::{EmbeddingCache, QueryResult, SqlExecutor, schema_text, seed_demo};
use sqlpilot_eval::{render_report, run_eval};
use sqlpilot_llm::{OpenAiCompatEmbeddings, OpenAiCompatProvider, QueryPipeline};
use sqlpilot_retrieval::{HybridRetriever, load_examples, load_gold_items};
use tracing::info;

/// Everything a question-answering command needs, built once at startup.
/// The retriever indices live here and are shared by reference; there is
/// no lazily-populated global cache.
struct AppContext {
    executor: Arc<SqlExecutor>,
    pipeline: QueryPipeline,
}

async fn build_context(config: AppConfig) -> Result<AppContext> {
    let db_path = config.data.db_path();
    let executor = Arc::new(
        SqlExecutor::open(&db_path, config.execution.max_rows)
            .with_context(|| format!("opening database {}", db_path.display()))?,
    );
    let schema = schema_text(&executor).context("introspecting the database schema")?;

    let examples = load_examples(&config.data.train_json(), &config.data.dataset_id)
        .with_context(|| format!("loading corpus from {}", config.data.train_json().display()))?;

    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(OpenAiCompatEmbeddings::new(
        config.embedding.api_key.clone().unwrap_or_default(),
        Some(config.embedding.model.clone()),
        config.embedding.base_url.clone(),
        Duration::from_secs(config.embedding.timeout_secs),
    ));

    info!("building hybrid retrieval indices over {} examples", examples.len());
    let questions: Vec<String> = examples.iter().map(|e| e.question.clone()).collect();
    let embeddings = embed_with_cache(&config, &questions, embedder.as_ref()).await?;
    let retriever = Arc::new(HybridRetriever::with_embeddings(
        examples,
        embeddings,
        Arc::clone(&embedder),
    ));

    let provider: Arc<dyn CompletionProvider> = Arc::new(OpenAiCompatProvider::new(
        config.completion.api_key.clone().unwrap_or_default(),
        Some(config.completion.model.clone()),
        config.completion.base_url.clone(),
        config.completion.temperature,
        Duration::from_secs(config.completion.timeout_secs),
    ));

    let pipeline = QueryPipeline::new(
        retriever,
        provider,
        Arc::clone(&executor),
        schema,
        config.retrieval.top_k,
        Duration::from_secs(config.completion.timeout_secs),
        Duration::from_secs(config.execution.timeout_secs),
    );

    Ok(AppContext { executor, pipeline })
}

/// Embed corpus questions, serving repeats from the persistent cache and
/// only calling the provider for misses.
async fn embed_with_cache(
    config: &AppConfig,
    questions: &[String],
    embedder: &dyn EmbeddingProvider,
) -> Result<Vec<Vec<f32>>> {
    let cache = EmbeddingCache::open(&config.data.embedding_cache_path())?;
    let cached = cache.get_many(embedder.model(), questions)?;

    let misses: Vec<(usize, String)> = cached
        .iter()
        .enumerate()
        .filter(|(_, hit)| hit.is_none())
        .map(|(i, _)| (i, questions[i].clone()))
        .collect();

    let mut embeddings: Vec<Vec<f32>> = cached
        .into_iter()
        .map(|hit| hit.unwrap_or_default())
        .collect();

    if !misses.is_empty() {
        info!("embedding {} uncached questions", misses.len());
        let texts: Vec<String> = misses.iter().map(|(_, q)| q.clone()).collect();
        let fresh = embedder.embed_documents(&texts).await?;
        for ((idx, text), vector) in misses.into_iter().zip(fresh) {
            cache.put(embedder.model(), &text, &vector)?;
            embeddings[idx] = vector;
        }
    }

    Ok(embeddings)
}

pub async fn ask(config: AppConfig, question: &str) -> Result<()> {
    let ctx = build_context(config).await?;
    let memory = SessionMemory::new(0);

    match ctx.pipeline.answer(question, &memory).await {
        Ok(answer) => {
            println!("SQL: {}", answer.sql);
            if answer.repaired {
                println!("(repaired after an execution error)");
            }
            print_result(&answer.result);
            Ok(())
        }
        Err(e) => {
            print_pipeline_error(&e);
            std::process::exit(1);
        }
    }
}

pub async fn repl(config: AppConfig) -> Result<()> {
    let max_turns = config.memory.max_turns;
    let ctx = build_context(config).await?;
    let session = SessionId::new();
    let mut memory = SessionMemory::new(max_turns);

    println!("sqlpilot session {session} - type a question, or 'exit' to quit.");
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }

        match ctx.pipeline.answer(question, &memory).await {
            Ok(answer) => {
                println!("SQL: {}", answer.sql);
                print_result(&answer.result);
                memory.push(answer.question, answer.sql);
            }
            Err(e) => print_pipeline_error(&e),
        }
    }
    Ok(())
}

pub async fn eval(
    config: AppConfig,
    limit: Option<usize>,
    use_train_set: bool,
    report_path: &std::path::Path,
) -> Result<()> {
    let eval_json = if use_train_set {
        config.data.train_json()
    } else {
        config.data.test_json()
    };
    let items = load_gold_items(&eval_json, &config.data.dataset_id)
        .with_context(|| format!("loading gold items from {}", eval_json.display()))?;

    let model_name = config.completion.model.clone();
    let top_k = config.retrieval.top_k;
    let execution_timeout = Duration::from_secs(config.execution.timeout_secs);
    let ctx = build_context(config).await?;

    println!(
        "evaluating {} items against {}",
        limit.map_or(items.len(), |l| l.min(items.len())),
        eval_json.display()
    );
    let summary = run_eval(&ctx.pipeline, &ctx.executor, &items, limit, execution_timeout).await;

    let report = render_report(&summary, &model_name, top_k);
    print!("{report}");
    std::fs::write(report_path, &report)
        .with_context(|| format!("writing report to {}", report_path.display()))?;
    println!("report written to {}", report_path.display());
    Ok(())
}

pub fn schema(config: AppConfig) -> Result<()> {
    let executor = SqlExecutor::open(&config.data.db_path(), config.execution.max_rows)?;
    println!("{}", schema_text(&executor)?);
    Ok(())
}

pub fn seed(config: AppConfig) -> Result<()> {
    let db_path = config.data.db_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = rusqlite::Connection::open(&db_path)
        .with_context(|| format!("opening {}", db_path.display()))?;
    let report = seed_demo(&conn)?;
    println!(
        "seeded {}: {} users, {} products, {} orders, {} order items",
        db_path.display(),
        report.users,
        report.products,
        report.orders,
        report.order_items
    );
    Ok(())
}

fn print_result(result: &QueryResult) {
    if !result.columns.is_empty() {
        println!("{}", result.columns.join(" | "));
    }
    for row in &result.rows {
        let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        println!("{}", cells.join(" | "));
    }
    println!("({} rows)", result.row_count);
}

/// Show pipeline failures the way users need them: raw model output for a
/// generation failure, the last attempted SQL plus the engine's message for
/// an execution failure. Never a silent empty result.
fn print_pipeline_error(error: &Error) {
    match error {
        Error::Generation(raw) => {
            eprintln!("the model did not produce SQL; raw output follows:");
            eprintln!("{raw}");
        }
        Error::Execution { sql, message } => {
            eprintln!("execution failed after repair.");
            eprintln!("last SQL: {sql}");
            eprintln!("error: {message}");
        }
        Error::SafetyRejected(reason) => {
            eprintln!("the generated statement was refused: {reason}");
        }
        Error::Timeout(what) => {
            eprintln!("timed out: {what}");
        }
        other => eprintln!("error: {other}"),
    }
}
