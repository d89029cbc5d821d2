mod app;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "sqlpilot",
    version,
    about = "sqlpilot - ask your database questions in plain language"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config directory (defaults to ~/.config/sqlpilot or ~/.sqlpilot)
    #[arg(long, global = true)]
    config_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single question and print the SQL with its result rows
    Ask {
        /// The natural-language question
        question: String,
    },

    /// Interactive session with conversation memory
    Repl,

    /// Batch accuracy evaluation against the gold test set
    Eval {
        /// Evaluate at most this many items
        #[arg(long)]
        limit: Option<usize>,

        /// Evaluate against the training set instead of the test set
        #[arg(long)]
        use_train_set: bool,

        /// Where to write the plain-text report
        #[arg(long, default_value = "eval_report.txt")]
        report: std::path::PathBuf,
    },

    /// Print the schema text handed to the completion model
    Schema,

    /// Create and fill the demo commerce database
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let loader = match &cli.config_dir {
        Some(dir) => sqlpilot_config::ConfigLoader::with_dir(dir),
        None => sqlpilot_config::ConfigLoader::new(),
    };
    let mut config = loader.load()?;
    config.apply_env();

    match cli.command {
        Commands::Ask { question } => app::ask(config, &question).await,
        Commands::Repl => app::repl(config).await,
        Commands::Eval {
            limit,
            use_train_set,
            report,
        } => app::eval(config, limit, use_train_set, &report).await,
        Commands::Schema => app::schema(config),
        Commands::Seed => app::seed(config),
    }
}
