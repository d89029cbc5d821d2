use std::cmp::Ordering;

/// Flat inner-product index over L2-normalized embedding vectors.
///
/// Exact search; the corpus is small enough that a scan beats any
/// approximate structure. Immutable after construction; rebuilding means a
/// fresh instance. Vectors stored here and query vectors must come from the
/// same embedding model; mixing models is undefined behavior.
#[derive(Debug)]
pub struct SemanticIndex {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

impl SemanticIndex {
    /// Build from raw (not necessarily normalized) embeddings. Vectors with
    /// a dimension different from the first are zeroed out rather than
    /// rejected, so a corrupt cache entry cannot poison ranking.
    pub fn build(embeddings: Vec<Vec<f32>>) -> Self {
        let dimension = embeddings.first().map(|v| v.len()).unwrap_or(0);
        let vectors = embeddings
            .into_iter()
            .map(|v| {
                if v.len() == dimension {
                    normalize(v)
                } else {
                    vec![0.0; dimension]
                }
            })
            .collect();

        Self { dimension, vectors }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Up to `k` corpus indices ranked by inner product against the
    /// normalized query (cosine similarity). Ties break toward the lower
    /// corpus index.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<usize> {
        if k == 0 || self.vectors.is_empty() || query.len() != self.dimension {
            return Vec::new();
        }

        let query = normalize(query.to_vec());
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, dot(&query, v)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        scored.into_iter().take(k).map(|(i, _)| i).collect()
    }
}

fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::SemanticIndex;

    #[test]
    fn search_ranks_by_cosine_similarity() {
        let index = SemanticIndex::build(vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.7, 0.7, 0.0],
        ]);

        let hits = index.search(&[1.0, 0.1, 0.0], 3);
        assert_eq!(hits[0], 0);
        assert_eq!(hits[1], 2);
        assert_eq!(hits[2], 1);
    }

    #[test]
    fn normalization_makes_magnitude_irrelevant() {
        let index = SemanticIndex::build(vec![vec![100.0, 0.0], vec![0.0, 0.001]]);
        let hits = index.search(&[0.0, 5.0], 1);
        assert_eq!(hits, vec![1]);
    }

    #[test]
    fn empty_index_returns_no_hits() {
        let index = SemanticIndex::build(Vec::new());
        assert!(index.search(&[1.0], 5).is_empty());
    }

    #[test]
    fn k_zero_returns_no_hits() {
        let index = SemanticIndex::build(vec![vec![1.0, 0.0]]);
        assert!(index.search(&[1.0, 0.0], 0).is_empty());
    }

    #[test]
    fn mismatched_query_dimension_returns_no_hits() {
        let index = SemanticIndex::build(vec![vec![1.0, 0.0]]);
        assert!(index.search(&[1.0, 0.0, 0.0], 1).is_empty());
    }

    #[test]
    fn mismatched_corpus_vector_is_zeroed_not_ranked_first() {
        let index = SemanticIndex::build(vec![vec![1.0, 0.0], vec![9.0; 5]]);
        let hits = index.search(&[1.0, 0.0], 2);
        assert_eq!(hits[0], 0);
    }
}
