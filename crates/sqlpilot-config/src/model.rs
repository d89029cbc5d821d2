use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub log_level: Option<String>,
}

impl AppConfig {
    /// Overlay settings from `SQLPILOT_*` environment variables. Unset or
    /// unparsable values leave the file/default value in place.
    pub fn apply_env(&mut self) {
        if let Ok(root) = std::env::var("SQLPILOT_DATA_ROOT") {
            self.data.root = PathBuf::from(root);
        }
        if let Ok(id) = std::env::var("SQLPILOT_DATASET_ID") {
            self.data.dataset_id = id;
        }
        if let Ok(model) = std::env::var("SQLPILOT_MODEL") {
            self.completion.model = model;
        }
        if let Ok(key) = std::env::var("SQLPILOT_API_KEY") {
            self.completion.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("SQLPILOT_BASE_URL") {
            self.completion.base_url = Some(url);
        }
        if let Ok(raw) = std::env::var("SQLPILOT_TEMPERATURE")
            && let Ok(temperature) = raw.parse()
        {
            self.completion.temperature = temperature;
        }
        if let Ok(model) = std::env::var("SQLPILOT_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Ok(key) = std::env::var("SQLPILOT_EMBEDDING_API_KEY") {
            self.embedding.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("SQLPILOT_EMBEDDING_BASE_URL") {
            self.embedding.base_url = Some(url);
        }
        if let Ok(raw) = std::env::var("SQLPILOT_TOP_K")
            && let Ok(top_k) = raw.parse()
        {
            self.retrieval.top_k = top_k;
        }
        if let Ok(raw) = std::env::var("SQLPILOT_MAX_TURNS")
            && let Ok(max_turns) = raw.parse()
        {
            self.memory.max_turns = max_turns;
        }
        if let Ok(raw) = std::env::var("SQLPILOT_MAX_ROWS")
            && let Ok(max_rows) = raw.parse()
        {
            self.execution.max_rows = max_rows;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root directory holding the dataset files and sqlite databases.
    #[serde(default = "default_data_root")]
    pub root: PathBuf,

    /// Dataset identifier used to filter the train/test JSON files.
    #[serde(default = "default_dataset_id")]
    pub dataset_id: String,

    /// Explicit database path; defaults to
    /// `<root>/database/<dataset_id>/<dataset_id>.sqlite`.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

impl DataConfig {
    pub fn db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(|| {
            self.root
                .join("database")
                .join(&self.dataset_id)
                .join(format!("{}.sqlite", self.dataset_id))
        })
    }

    pub fn train_json(&self) -> PathBuf {
        self.root.join("train.json")
    }

    pub fn test_json(&self) -> PathBuf {
        self.root.join("test.json")
    }

    pub fn embedding_cache_path(&self) -> PathBuf {
        self.root.join("embedding_cache.sqlite")
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            root: default_data_root(),
            dataset_id: default_dataset_id(),
            db_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_model")]
    pub model: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// OpenAI-compatible endpoint base URL.
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub temperature: f64,

    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: default_completion_model(),
            api_key: None,
            base_url: None,
            temperature: 0.0,
            timeout_secs: default_completion_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            api_key: None,
            base_url: None,
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of few-shot examples retrieved per question.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Conversation turns kept per session; 0 disables memory.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Row cap appended as a LIMIT clause when the statement has none.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    #[serde(default = "default_execution_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_rows: default_max_rows(),
            timeout_secs: default_execution_timeout_secs(),
        }
    }
}

fn default_data_root() -> PathBuf {
    PathBuf::from("data")
}

fn default_dataset_id() -> String {
    "college_2".to_string()
}

fn default_completion_model() -> String {
    "deepseek-chat".to_string()
}

fn default_completion_timeout_secs() -> u64 {
    60
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_timeout_secs() -> u64 {
    30
}

fn default_top_k() -> usize {
    5
}

fn default_max_turns() -> usize {
    5
}

fn default_max_rows() -> usize {
    200
}

fn default_execution_timeout_secs() -> u64 {
    10
}
