pub mod embedding_cache;
pub mod executor;
pub mod gate;
pub mod schema;
pub mod seed;

pub use embedding_cache::EmbeddingCache;
pub use executor::{QueryResult, SqlExecutor, SqlValue};
pub use gate::{ensure_limit, sanitize};
pub use schema::schema_text;
pub use seed::{SeedReport, seed_demo};
