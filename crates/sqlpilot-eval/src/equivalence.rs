use std::collections::HashMap;

use sqlpilot_db::SqlValue;

/// Column-permutation search is skipped above this arity; the search is
/// factorial in column count, and 4 keeps it at 24 candidate orderings.
/// Known limitation: wider result sets are only compared column-aligned.
const PERMUTATION_ARITY_CUTOFF: usize = 4;

/// Normalized cell: numerics collapse to one canonical float, text to
/// lowercase-trimmed form, NULL stays its own sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NormCell {
    Null,
    Num(u64),
    Text(String),
}

fn normalize_cell(value: &SqlValue) -> NormCell {
    match value {
        SqlValue::Null => NormCell::Null,
        SqlValue::Integer(i) => NormCell::Num(canonical_bits(*i as f64)),
        SqlValue::Real(f) => NormCell::Num(canonical_bits(*f)),
        SqlValue::Text(t) => NormCell::Text(t.trim().to_lowercase()),
    }
}

fn canonical_bits(f: f64) -> u64 {
    // Collapse -0.0 so 0 and -0.0 hash identically.
    if f == 0.0 { 0.0f64.to_bits() } else { f.to_bits() }
}

fn normalize_rows(rows: &[Vec<SqlValue>]) -> Vec<Vec<NormCell>> {
    rows.iter()
        .map(|row| row.iter().map(normalize_cell).collect())
        .collect()
}

fn multiset(rows: &[Vec<NormCell>]) -> HashMap<&[NormCell], usize> {
    let mut counts: HashMap<&[NormCell], usize> = HashMap::new();
    for row in rows {
        *counts.entry(row.as_slice()).or_insert(0) += 1;
    }
    counts
}

fn owned_multiset(rows: Vec<Vec<NormCell>>) -> HashMap<Vec<NormCell>, usize> {
    let mut counts: HashMap<Vec<NormCell>, usize> = HashMap::new();
    for row in rows {
        *counts.entry(row).or_insert(0) += 1;
    }
    counts
}

/// Decide whether a predicted result set answers the same as the gold one.
///
/// Rows compare as unordered multisets of normalized cells. When the direct
/// comparison fails and the arity is at most 4, every column permutation of
/// the predicted rows is tried against the gold multiset, making the check
/// insensitive to projection order. Used for offline accuracy grading only.
pub fn equivalent(predicted: &[Vec<SqlValue>], gold: &[Vec<SqlValue>]) -> bool {
    if predicted.is_empty() && gold.is_empty() {
        return true;
    }
    if predicted.is_empty() || gold.is_empty() {
        return false;
    }
    if predicted.len() != gold.len() {
        return false;
    }

    let norm_predicted = normalize_rows(predicted);
    let norm_gold = normalize_rows(gold);

    if multiset(&norm_predicted) == multiset(&norm_gold) {
        return true;
    }

    let arity = norm_gold[0].len();
    if arity > PERMUTATION_ARITY_CUTOFF || norm_predicted[0].len() != arity {
        return false;
    }

    let gold_counts = owned_multiset(norm_gold);
    for permutation in permutations(arity) {
        let permuted: Vec<Vec<NormCell>> = norm_predicted
            .iter()
            .map(|row| permutation.iter().map(|&i| row[i].clone()).collect())
            .collect();
        if owned_multiset(permuted) == gold_counts {
            return true;
        }
    }
    false
}

/// All orderings of `0..n`. Only ever called with `n <= 4`.
fn permutations(n: usize) -> Vec<Vec<usize>> {
    if n == 0 {
        return vec![Vec::new()];
    }
    let mut out = Vec::new();
    for smaller in permutations(n - 1) {
        for insert_at in 0..=smaller.len() {
            let mut candidate = smaller.clone();
            candidate.insert(insert_at, n - 1);
            out.push(candidate);
        }
    }
    out
}
