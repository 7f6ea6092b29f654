//! Ranking primitives shared by the graph stores and the search facade:
//! BM25 over relationship text, cosine similarity, reciprocal-rank fusion
//! and center-node distance ordering.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use uuid::Uuid;

use super::models::EntityEdge;


pub const RRF_RANK_CONST: f64 = 1.0;

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;

lazy_static! {
    static ref TOKEN_RE: Regex = Regex::new(r"[\p{L}\p{N}]+").unwrap();
}


pub fn tokenize(text: &str) -> Vec<String> {
    TOKEN_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}


/// Okapi BM25 over `(id, text)` documents. Only documents sharing at least
/// one term with the query are returned, best first.
pub fn bm25_rank(query: &str, docs: &[(Uuid, String)], limit: usize) -> Vec<(Uuid, f64)> {
    let query_terms = tokenize(query);
    if query_terms.is_empty() || docs.is_empty() || limit == 0 {
        return Vec::new();
    }

    let tokenized: Vec<Vec<String>> = docs.iter().map(|(_, text)| tokenize(text)).collect();
    let n = tokenized.len() as f64;
    let avg_len = tokenized.iter().map(Vec::len).sum::<usize>() as f64 / n;

    let mut doc_freq: HashMap<&str, usize> = HashMap::new();
    for tokens in &tokenized {
        let mut seen: Vec<&str> = tokens.iter().map(String::as_str).collect();
        seen.sort_unstable();
        seen.dedup();
        for term in seen {
            *doc_freq.entry(term).or_default() += 1;
        }
    }

    let mut scored: Vec<(Uuid, f64)> = docs
        .iter()
        .zip(&tokenized)
        .filter_map(|((id, _), tokens)| {
            let len = tokens.len() as f64;
            let score: f64 = query_terms
                .iter()
                .map(|term| {
                    let tf = tokens.iter().filter(|t| *t == term).count() as f64;
                    if tf == 0.0 {
                        return 0.0;
                    }
                    let df = doc_freq.get(term.as_str()).copied().unwrap_or(0) as f64;
                    let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
                    let norm = if avg_len > 0.0 { len / avg_len } else { 1.0 };
                    idf * tf * (BM25_K1 + 1.0) / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * norm))
                })
                .sum();
            (score > 0.0).then_some((*id, score))
        })
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(limit);
    scored
}


/// Cosine similarity mapped onto `[0, 1]`, the same scale Neo4j's
/// `vector.similarity.cosine` reports.
pub fn cosine_similarity(vec1: &[f32], vec2: &[f32]) -> f64 {
    if vec1.is_empty() || vec2.is_empty() || vec1.len() != vec2.len() {
        return 0.0;
    }

    let dot_product: f32 = vec1.iter().zip(vec2.iter()).map(|(a, b)| a * b).sum();
    let mag1: f32 = vec1.iter().map(|a| a * a).sum::<f32>().sqrt();
    let mag2: f32 = vec2.iter().map(|b| b * b).sum::<f32>().sqrt();

    if mag1 == 0.0 || mag2 == 0.0 {
        return 0.0;
    }

    let similarity = f64::from(dot_product / (mag1 * mag2));
    ((similarity + 1.0) / 2.0).clamp(0.0, 1.0)
}


/// Reciprocal-rank fusion. Each list is best-first; an item scores
/// `sum(1 / (rank + rank_const))` over the lists it appears in. Equal
/// scores keep the order in which items were first seen.
pub fn rrf(result_lists: &[Vec<Uuid>], rank_const: f64) -> Vec<(Uuid, f64)> {
    let mut order: Vec<Uuid> = Vec::new();
    let mut scores: HashMap<Uuid, f64> = HashMap::new();

    for list in result_lists {
        for (rank, id) in list.iter().enumerate() {
            let entry = scores.entry(*id).or_insert_with(|| {
                order.push(*id);
                0.0
            });
            *entry += 1.0 / (rank as f64 + rank_const);
        }
    }

    let mut fused: Vec<(Uuid, f64)> = order
        .into_iter()
        .map(|id| (id, scores.get(&id).copied().unwrap_or_default()))
        .collect();
    fused.sort_by(|a, b| b.1.total_cmp(&a.1));
    fused
}


/// Hops from the center to the nearer endpoint of `edge`.
/// Unreachable endpoints count as `usize::MAX`.
pub fn edge_distance(edge: &EntityEdge, center: Uuid, distances: &HashMap<Uuid, usize>) -> usize {
    edge.endpoints()
        .iter()
        .map(|node| {
            if *node == center {
                0
            } else {
                distances.get(node).copied().unwrap_or(usize::MAX)
            }
        })
        .min()
        .unwrap_or(usize::MAX)
}


/// Stable reorder by distance from the center; candidates at the same
/// distance keep their relevance order.
pub fn rerank_by_distance(
    mut edges: Vec<EntityEdge>,
    center: Uuid,
    distances: &HashMap<Uuid, usize>,
) -> Vec<EntityEdge> {
    edges.sort_by_key(|edge| edge_distance(edge, center, distances));
    edges
}


/// Escape Lucene query syntax so free text can be fed to a full-text index.
pub fn lucene_sanitize(query: &str) -> String {
    const SPECIAL: &[char] = &[
        '+', '-', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '\\',
        '/',
    ];

    query
        .split_whitespace()
        .map(|word| {
            // Bare boolean operators would change the query's meaning.
            if matches!(word, "AND" | "OR" | "NOT") {
                return word.to_lowercase();
            }
            let mut escaped = String::with_capacity(word.len());
            for c in word.chars() {
                if SPECIAL.contains(&c) {
                    escaped.push('\\');
                }
                escaped.push(c);
            }
            escaped
        })
        .collect::<Vec<_>>()
        .join(" ")
}
