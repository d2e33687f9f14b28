//! Exact nearest-neighbor index over passage embeddings.
//!
//! The index is a flat, row-major `f32` matrix paired by position with the
//! ordered passage list. Search is brute force: squared Euclidean distance
//! against every row, O(n·d) per query. Corpora are small (thousands of
//! passages), so no approximate structure is used and recall is exact.
//!
//! # Lifecycle
//!
//! ```text
//!  new() ──build()──▶ built ──save()──▶ <prefix>.vectors
//!    │                  ▲                <prefix>.passages.json
//!    └─────load()───────┘
//! ```
//!
//! `build` and `load` take `&mut self`; once the index is wrapped in an
//! `Arc` for serving, only `&self` methods (search, save) are reachable.
//!
//! # On-disk format
//!
//! | Artifact | Contents |
//! |----------|----------|
//! | `<prefix>.vectors` | `DRAGVEC1` magic, u32 LE dims, u64 LE count, `count × dims` LE f32 |
//! | `<prefix>.passages.json` | JSON array of passage strings, in index order |

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::embedding::{l2_squared, vec_to_blob, Embedder};
use crate::error::{RagError, RagResult};

const MAGIC: &[u8; 8] = b"DRAGVEC1";
const HEADER_LEN: usize = 8 + 4 + 8;

/// File suffix of the vector artifact.
pub const VECTORS_SUFFIX: &str = ".vectors";
/// File suffix of the passage-list artifact.
pub const PASSAGES_SUFFIX: &str = ".passages.json";

/// Both artifact paths derived from one base path.
///
/// ```rust
/// use doc_rag::index::artifact_paths;
/// use std::path::Path;
///
/// let (vectors, passages) = artifact_paths(Path::new("data/index"));
/// assert_eq!(vectors, Path::new("data/index.vectors"));
/// assert_eq!(passages, Path::new("data/index.passages.json"));
/// ```
pub fn artifact_paths(prefix: &Path) -> (PathBuf, PathBuf) {
    let with_suffix = |suffix: &str| {
        let mut name = OsString::from(prefix.as_os_str());
        name.push(suffix);
        PathBuf::from(name)
    };
    (with_suffix(VECTORS_SUFFIX), with_suffix(PASSAGES_SUFFIX))
}

/// One retrieved passage with its distance to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// Insertion position of the passage.
    pub position: usize,
    /// Squared L2 distance to the query vector.
    pub distance: f32,
    pub passage: String,
}

#[derive(Debug, Clone)]
struct IndexData {
    dims: usize,
    /// Row-major, `passages.len() × dims`.
    vectors: Vec<f32>,
    passages: Vec<String>,
}

impl IndexData {
    fn from_rows(rows: Vec<Vec<f32>>, passages: Vec<String>) -> RagResult<Self> {
        if rows.len() != passages.len() {
            return Err(RagError::InconsistentIndex {
                vectors: rows.len(),
                passages: passages.len(),
            });
        }
        let dims = rows.first().map(Vec::len).ok_or(RagError::EmptyCorpus)?;
        let mut vectors = Vec::with_capacity(rows.len() * dims);
        for row in &rows {
            if row.len() != dims {
                return Err(RagError::DimensionMismatch {
                    expected: dims,
                    actual: row.len(),
                });
            }
            vectors.extend_from_slice(row);
        }
        Ok(Self {
            dims,
            vectors,
            passages,
        })
    }

    fn row(&self, i: usize) -> &[f32] {
        &self.vectors[i * self.dims..(i + 1) * self.dims]
    }
}

/// Flat L2 index pairing embedding vectors with passage text.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    data: Option<IndexData>,
}

impl VectorIndex {
    /// An empty, unbuilt index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble an index from precomputed vectors.
    ///
    /// Fails with `EmptyCorpus` for no passages, `InconsistentIndex` when
    /// the counts differ, and `DimensionMismatch` for ragged rows.
    pub fn from_parts(vectors: Vec<Vec<f32>>, passages: Vec<String>) -> RagResult<Self> {
        Ok(Self {
            data: Some(IndexData::from_rows(vectors, passages)?),
        })
    }

    /// Embed every passage with one batch call and replace the index
    /// contents wholesale.
    pub async fn build(&mut self, embedder: &dyn Embedder, passages: Vec<String>) -> RagResult<()> {
        if passages.is_empty() {
            return Err(RagError::EmptyCorpus);
        }

        tracing::info!(
            passages = passages.len(),
            model = embedder.model_name(),
            "generating embeddings"
        );
        let vectors = embedder.embed_batch(&passages).await?;
        let data = IndexData::from_rows(vectors, passages)?;

        tracing::info!(vectors = data.passages.len(), dims = data.dims, "built vector index");
        self.data = Some(data);
        Ok(())
    }

    pub fn is_built(&self) -> bool {
        self.data.is_some()
    }

    /// Number of indexed passages (0 when unbuilt).
    pub fn len(&self) -> usize {
        self.data.as_ref().map_or(0, |d| d.passages.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Embedding dimensionality, once built or loaded.
    pub fn dims(&self) -> Option<usize> {
        self.data.as_ref().map(|d| d.dims)
    }

    /// Passages in insertion order.
    pub fn passages(&self) -> &[String] {
        self.data.as_ref().map_or(&[], |d| d.passages.as_slice())
    }

    /// The stored vector at `position`.
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let data = self.data.as_ref()?;
        (position < data.passages.len()).then(|| data.row(position))
    }

    /// The `min(k, len)` nearest passages with their distances, nearest
    /// first; equal distances keep insertion order.
    pub fn search_scored(&self, query: &[f32], k: usize) -> RagResult<Vec<SearchHit>> {
        let data = self.data.as_ref().ok_or(RagError::IndexNotBuilt)?;
        if query.len() != data.dims {
            return Err(RagError::DimensionMismatch {
                expected: data.dims,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = (0..data.passages.len())
            .map(|i| (i, l2_squared(query, data.row(i))))
            .collect();

        let by_distance =
            |a: &(usize, f32), b: &(usize, f32)| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0));

        let k = k.min(scored.len());
        if k == 0 {
            return Ok(Vec::new());
        }
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_distance);
            scored.truncate(k);
        }
        scored.sort_unstable_by(by_distance);

        Ok(scored
            .into_iter()
            .map(|(position, distance)| SearchHit {
                position,
                distance,
                passage: data.passages[position].clone(),
            })
            .collect())
    }

    /// The `min(k, len)` nearest passages, nearest first.
    pub fn search(&self, query: &[f32], k: usize) -> RagResult<Vec<String>> {
        Ok(self
            .search_scored(query, k)?
            .into_iter()
            .map(|hit| hit.passage)
            .collect())
    }

    /// Write `<prefix>.vectors` and `<prefix>.passages.json`, creating the
    /// parent directory when needed.
    pub fn save(&self, prefix: &Path) -> RagResult<()> {
        let data = self.data.as_ref().ok_or(RagError::IndexNotBuilt)?;
        let (vectors_path, passages_path) = artifact_paths(prefix);

        if let Some(parent) = vectors_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&vectors_path, encode_vectors(data))?;
        std::fs::write(&passages_path, serde_json::to_vec(&data.passages)?)?;

        tracing::info!(
            vectors = %vectors_path.display(),
            passages = %passages_path.display(),
            "saved vector index"
        );
        Ok(())
    }

    /// Load both artifacts for `prefix`.
    ///
    /// Returns `Ok(false)` without touching the current contents when
    /// either artifact is missing, so the caller can fall back to a fresh
    /// build. A pair whose counts disagree fails with `InconsistentIndex`.
    pub fn load(&mut self, prefix: &Path) -> RagResult<bool> {
        let (vectors_path, passages_path) = artifact_paths(prefix);
        if !vectors_path.exists() || !passages_path.exists() {
            tracing::debug!(prefix = %prefix.display(), "index artifacts not found");
            return Ok(false);
        }

        let (dims, vectors) = decode_vectors(&vectors_path, &std::fs::read(&vectors_path)?)?;
        let passages: Vec<String> = serde_json::from_slice(&std::fs::read(&passages_path)?)?;

        let count = vectors.len() / dims;
        if count != passages.len() {
            return Err(RagError::InconsistentIndex {
                vectors: count,
                passages: passages.len(),
            });
        }

        tracing::info!(vectors = count, dims, "loaded vector index");
        self.data = Some(IndexData {
            dims,
            vectors,
            passages,
        });
        Ok(true)
    }
}

fn encode_vectors(data: &IndexData) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_LEN + data.vectors.len() * 4);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&(data.dims as u32).to_le_bytes());
    bytes.extend_from_slice(&(data.passages.len() as u64).to_le_bytes());
    bytes.extend_from_slice(&vec_to_blob(&data.vectors));
    bytes
}

fn decode_vectors(path: &Path, bytes: &[u8]) -> RagResult<(usize, Vec<f32>)> {
    let corrupt = |reason: String| RagError::CorruptIndex {
        path: path.to_path_buf(),
        reason,
    };

    if bytes.len() < HEADER_LEN {
        return Err(corrupt(format!("file too short ({} bytes)", bytes.len())));
    }
    let (header, body) = bytes.split_at(HEADER_LEN);
    if &header[..8] != MAGIC {
        return Err(corrupt("invalid magic".to_string()));
    }

    let mut dims_bytes = [0u8; 4];
    dims_bytes.copy_from_slice(&header[8..12]);
    let dims = u32::from_le_bytes(dims_bytes) as usize;

    let mut count_bytes = [0u8; 8];
    count_bytes.copy_from_slice(&header[12..20]);
    let count = u64::from_le_bytes(count_bytes) as usize;

    if dims == 0 || count == 0 {
        return Err(corrupt(format!("empty index (dims={}, count={})", dims, count)));
    }

    let expected = count
        .checked_mul(dims)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| corrupt("header overflows".to_string()))?;
    if body.len() != expected {
        return Err(corrupt(format!(
            "expected {} bytes of vector data, found {}",
            expected,
            body.len()
        )));
    }

    Ok((dims, crate::embedding::blob_to_vec(body)))
}
