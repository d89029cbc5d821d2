pub mod corpus;
pub mod hybrid;
pub mod lexical;
pub mod semantic;

pub use corpus::{Example, GoldItem, load_examples, load_gold_items};
pub use hybrid::HybridRetriever;
pub use lexical::LexicalScorer;
pub use semantic::SemanticIndex;
