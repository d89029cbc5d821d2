use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z0-9_]+").expect("token regex is valid"));

fn tokenize(text: &str) -> Vec<String> {
    TOKEN_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// TF-IDF inverted index over the corpus questions.
///
/// Built once at corpus load; immutable afterwards and safe for concurrent
/// lock-free reads. Scoring returns cosine similarities aligned with corpus
/// order; ranking and filtering are the caller's responsibility.
#[derive(Debug)]
pub struct LexicalScorer {
    idf: HashMap<String, f64>,
    vectors: Vec<HashMap<String, f64>>,
    norms: Vec<f64>,
}

impl LexicalScorer {
    pub fn build(documents: &[String]) -> Self {
        let tokenized: Vec<Vec<String>> = documents.iter().map(|d| tokenize(d)).collect();

        let mut df: HashMap<String, usize> = HashMap::new();
        for tokens in &tokenized {
            let mut seen: Vec<&String> = tokens.iter().collect();
            seen.sort();
            seen.dedup();
            for token in seen {
                *df.entry(token.clone()).or_insert(0) += 1;
            }
        }

        // Smoothed IDF, always >= 1 so rare and unseen tokens never vanish.
        let n_docs = documents.len().max(1) as f64;
        let idf: HashMap<String, f64> = df
            .into_iter()
            .map(|(token, freq)| (token, ((1.0 + n_docs) / (1.0 + freq as f64)).ln() + 1.0))
            .collect();

        let mut vectors = Vec::with_capacity(tokenized.len());
        let mut norms = Vec::with_capacity(tokenized.len());
        for tokens in &tokenized {
            let (vector, norm) = weigh(tokens, &idf);
            vectors.push(vector);
            norms.push(norm);
        }

        Self { idf, vectors, norms }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Cosine similarity of `query` against every corpus document, in
    /// corpus order. An empty query scores 0 everywhere.
    pub fn score(&self, query: &str) -> Vec<f64> {
        let tokens = tokenize(query);
        let (query_vec, query_norm) = weigh(&tokens, &self.idf);

        self.vectors
            .iter()
            .zip(&self.norms)
            .map(|(vector, norm)| {
                let dot: f64 = query_vec
                    .iter()
                    .map(|(token, weight)| weight * vector.get(token).copied().unwrap_or(0.0))
                    .sum();
                dot / (query_norm * norm)
            })
            .collect()
    }
}

/// Term-frequency vector scaled by document length and weighted by IDF,
/// with its Euclidean norm floored at 1.0 so empty documents divide safely.
fn weigh(tokens: &[String], idf: &HashMap<String, f64>) -> (HashMap<String, f64>, f64) {
    let mut counts: HashMap<&String, usize> = HashMap::new();
    for token in tokens {
        *counts.entry(token).or_insert(0) += 1;
    }

    let length = tokens.len().max(1) as f64;
    let vector: HashMap<String, f64> = counts
        .into_iter()
        .map(|(token, count)| {
            let weight = (count as f64 / length) * idf.get(token).copied().unwrap_or(0.0);
            (token.clone(), weight)
        })
        .collect();

    let norm = vector.values().map(|w| w * w).sum::<f64>().sqrt().max(1.0);
    (vector, norm)
}

#[cfg(test)]
mod tests {
    use super::{LexicalScorer, tokenize};

    fn corpus(docs: &[&str]) -> Vec<String> {
        docs.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn tokenizer_lowercases_and_keeps_underscores() {
        assert_eq!(
            tokenize("List Dept_Name, budget!"),
            vec!["list", "dept_name", "budget"]
        );
    }

    #[test]
    fn document_scores_highest_against_itself() {
        let docs = corpus(&[
            "how many students are enrolled",
            "list the names of all instructors",
            "what is the average salary of instructors",
        ]);
        let scorer = LexicalScorer::build(&docs);

        for (i, doc) in docs.iter().enumerate() {
            let scores = scorer.score(doc);
            let best = scores
                .iter()
                .cloned()
                .fold(f64::NEG_INFINITY, f64::max);
            assert_eq!(
                scores[i], best,
                "document {i} should be its own best match"
            );
        }
    }

    #[test]
    fn empty_corpus_scores_empty() {
        let scorer = LexicalScorer::build(&[]);
        assert!(scorer.score("anything").is_empty());
    }

    #[test]
    fn empty_query_scores_zero_everywhere() {
        let scorer = LexicalScorer::build(&corpus(&["a b c", "d e f"]));
        let scores = scorer.score("");
        assert_eq!(scores, vec![0.0, 0.0]);
    }

    #[test]
    fn unrelated_query_scores_zero() {
        let scorer = LexicalScorer::build(&corpus(&["students enrolled in courses"]));
        let scores = scorer.score("zebra quantum");
        assert_eq!(scores, vec![0.0]);
    }

    #[test]
    fn shared_rare_token_outscores_shared_common_token() {
        // "the" appears in every document, "prerequisite" in one.
        let scorer = LexicalScorer::build(&corpus(&[
            "the prerequisite of the course",
            "the list of the students",
            "the names of the instructors",
        ]));
        let scores = scorer.score("prerequisite");
        assert!(scores[0] > scores[1]);
        assert!(scores[0] > scores[2]);
    }
}
