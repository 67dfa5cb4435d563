//! In-process semantic index over the document corpus.
//!
//! Chunks are embedded once at index build time; a query is answered by
//! cosine similarity against every chunk. Corpus sizes here are small (a
//! single knowledge file), so a brute-force scan beats the complexity of an
//! ANN structure.

/// A single embedded corpus chunk.
#[derive(Debug, Clone)]
struct IndexEntry {
    embedding: Vec<f32>,
    text: String,
}

/// A queryable nearest-neighbor index over text chunks.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an embedded chunk to the index.
    pub fn insert(&mut self, embedding: Vec<f32>, text: String) {
        self.entries.push(IndexEntry { embedding, text });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the `top_k` chunk texts most similar to the query embedding,
    /// most similar first.
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<String> {
        let mut scored: Vec<(f32, &str)> = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(query, &entry.embedding), entry.text.as_str()))
            .collect();

        // NaN scores (zero vectors) sort last.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(top_k)
            .map(|(_, text)| text.to_string())
            .collect()
    }
}

/// Cosine similarity between two vectors. Returns 0.0 when either vector is
/// zero-length or zero-magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

/// Splits corpus text into chunks bounded by `max_chars`.
///
/// Paragraphs (blank-line separated) are packed greedily; a paragraph longer
/// than the bound becomes its own oversized chunk rather than being split
/// mid-sentence.
pub fn chunk_corpus(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in text.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        if !current.is_empty() && current.len() + paragraph.len() + 2 > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
        if current.len() >= max_chars {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
