pub mod completion;
pub mod embeddings;
pub mod generate;
pub mod pipeline;
pub mod prompt;
pub mod rewrite;

pub use completion::OpenAiCompatProvider;
pub use embeddings::OpenAiCompatEmbeddings;
pub use generate::{Generated, SqlGenerator};
pub use pipeline::{Answer, QueryPipeline};
pub use prompt::build_prompt;
pub use rewrite::{RewriteContext, apply_rewrites};
