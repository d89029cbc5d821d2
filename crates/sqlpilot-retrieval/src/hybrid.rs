use std::cmp::Ordering;
use std::sync::Arc;

use sqlpilot_common::{EmbeddingProvider, Result};
use tracing::{debug, warn};

use crate::corpus::Example;
use crate::lexical::LexicalScorer;
use crate::semantic::SemanticIndex;

/// Few-shot example retriever fusing TF-IDF and embedding similarity.
///
/// Both indices are built once and never mutated, so a single retriever can
/// be shared by reference across concurrent sessions. The two scorers use
/// incomparable scales, so fusion is interleave-then-dedup rather than score
/// mixing: lexical candidates first, then semantic, first occurrence wins.
/// Lexical-exact matches therefore take precedence on ties.
pub struct HybridRetriever {
    examples: Vec<Example>,
    lexical: LexicalScorer,
    semantic: SemanticIndex,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl HybridRetriever {
    /// Embed every corpus question and build both indices.
    pub async fn build(
        examples: Vec<Example>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let questions: Vec<String> = examples.iter().map(|e| e.question.clone()).collect();
        let embeddings = if questions.is_empty() {
            Vec::new()
        } else {
            embedder.embed_documents(&questions).await?
        };
        Ok(Self::with_embeddings(examples, embeddings, embedder))
    }

    /// Build from precomputed question embeddings (e.g. a warm cache).
    /// `embeddings` must be aligned with `examples`.
    pub fn with_embeddings(
        examples: Vec<Example>,
        embeddings: Vec<Vec<f32>>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        let questions: Vec<String> = examples.iter().map(|e| e.question.clone()).collect();
        let lexical = LexicalScorer::build(&questions);
        let semantic = SemanticIndex::build(embeddings);

        Self {
            examples,
            lexical,
            semantic,
            embedder,
        }
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    /// Return up to `k` examples for `query`, never failing: an embedding
    /// error degrades to lexical-only results, a small corpus returns what
    /// it has.
    pub async fn search(&self, query: &str, k: usize) -> Vec<Example> {
        if k == 0 || self.examples.is_empty() {
            return Vec::new();
        }

        // Oversample both sides at 2k so dedup across the two lists still
        // leaves k distinct candidates.
        let oversample = k.saturating_mul(2);

        let lexical_top = self.top_lexical(query, oversample);

        let semantic_top = match self.embedder.embed_query(query).await {
            Ok(embedding) => self.semantic.search(&embedding, oversample),
            Err(e) => {
                warn!("query embedding failed, falling back to lexical ranking: {e}");
                Vec::new()
            }
        };

        debug!(
            lexical = lexical_top.len(),
            semantic = semantic_top.len(),
            "merging hybrid candidates"
        );

        let mut merged = Vec::with_capacity(k);
        let mut seen = vec![false; self.examples.len()];
        for idx in lexical_top.into_iter().chain(semantic_top) {
            if idx >= self.examples.len() || seen[idx] {
                continue;
            }
            seen[idx] = true;
            merged.push(self.examples[idx].clone());
            if merged.len() == k {
                break;
            }
        }
        merged
    }

    /// Top-`n` corpus indices by lexical score, descending, ties broken by
    /// original corpus order.
    fn top_lexical(&self, query: &str, n: usize) -> Vec<usize> {
        let scores = self.lexical.score(query);
        let mut indexed: Vec<(usize, f64)> = scores.into_iter().enumerate().collect();
        indexed.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        indexed.into_iter().take(n).map(|(i, _)| i).collect()
    }
}
