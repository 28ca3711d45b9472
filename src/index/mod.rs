
pub mod builder;
pub mod handle;
pub mod persist;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::knowledge::Document;
use crate::{ChatError, Result};

pub use builder::{KnowledgeBase, RebuildReport};
pub use handle::IndexHandle;

/// Bumped whenever the persisted layout changes
pub const INDEX_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexHeader {
    pub format_version: u32,
    pub embedding_model: String,
    pub dimension: usize,
    pub built_at: DateTime<Utc>,
    pub document_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub document: Document,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDocument {
    pub document: Document,
    /// Cosine distance, `1 - cosine similarity`
    pub distance: f32,
}

/// Immutable flat vector index searched by exhaustive cosine scan
#[derive(Debug, Clone)]
pub struct VectorIndex {
    header: IndexHeader,
    entries: Vec<IndexEntry>,
    norms: Vec<f32>,
}

impl VectorIndex {
    /// Build from embedded documents. All vectors must share one non-zero
    /// dimension and hold only finite values.
    #[inline]
    pub fn build(embedding_model: impl Into<String>, entries: Vec<IndexEntry>) -> Result<Self> {
        let header = IndexHeader {
            format_version: INDEX_FORMAT_VERSION,
            embedding_model: embedding_model.into(),
            dimension: entries.first().map_or(0, |entry| entry.vector.len()),
            built_at: Utc::now(),
            document_count: entries.len(),
        };
        Self::from_parts(header, entries)
    }

    /// Reassemble a persisted index, checking it against its header
    #[inline]
    pub fn from_parts(header: IndexHeader, entries: Vec<IndexEntry>) -> Result<Self> {
        if header.format_version != INDEX_FORMAT_VERSION {
            return Err(ChatError::Index(format!(
                "unsupported index format version {} (expected {})",
                header.format_version, INDEX_FORMAT_VERSION
            )));
        }

        if header.document_count != entries.len() {
            return Err(ChatError::Index(format!(
                "header lists {} documents but {} entries are present",
                header.document_count,
                entries.len()
            )));
        }

        if !entries.is_empty() && header.dimension == 0 {
            return Err(ChatError::Index("embedding dimension is zero".to_string()));
        }

        for (position, entry) in entries.iter().enumerate() {
            if entry.vector.len() != header.dimension {
                return Err(ChatError::Index(format!(
                    "entry {} ({}) has dimension {}, expected {}",
                    position,
                    entry.document.citation(),
                    entry.vector.len(),
                    header.dimension
                )));
            }
            if entry.vector.iter().any(|x| !x.is_finite()) {
                return Err(ChatError::Index(format!(
                    "entry {} ({}) contains non-finite values",
                    position,
                    entry.document.citation()
                )));
            }
        }

        let norms = entries.iter().map(|entry| norm(&entry.vector)).collect();

        Ok(Self {
            header,
            entries,
            norms,
        })
    }

    #[inline]
    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    #[inline]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Up to `k` documents by ascending distance; ties keep insertion order
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        if query.len() != self.header.dimension {
            return Err(ChatError::Index(format!(
                "query has dimension {}, index has {}",
                query.len(),
                self.header.dimension
            )));
        }

        let query_norm = norm(query);
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .zip(&self.norms)
            .enumerate()
            .map(|(position, (entry, entry_norm))| {
                (
                    position,
                    distance_with_norms(query, query_norm, &entry.vector, *entry_norm),
                )
            })
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, distance)| ScoredDocument {
                document: self.entries[position].document.clone(),
                distance,
            })
            .collect())
    }
}

/// `1 - cosine similarity`; zero vectors are treated as orthogonal to everything
#[inline]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    distance_with_norms(a, norm(a), b, norm(b))
}

fn distance_with_norms(a: &[f32], a_norm: f32, b: &[f32], b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        1.0
    } else {
        1.0 - dot(a, b) / (a_norm * b_norm)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}
