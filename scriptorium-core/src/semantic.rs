//! Optional per-document embedding index. Disabled deployments keep
//! every other retrieval path working; enabled ones persist one vector
//! per document and answer cosine-similarity top-k queries.

use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

use tracing::warn;

use crate::errors::StoreError;

/// Only the head of the document feeds the vector.
const EMBED_INPUT_CAP: usize = 10_000;

/// Seam for the embedding model. Implementations must be deterministic
/// for a given input so stored vectors stay comparable across runs.
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Built-in model: character-trigram feature hashing into a fixed-width
/// L2-normalised vector.
pub struct TrigramEmbedder {
    dimension: usize,
}

impl TrigramEmbedder {
    pub const DIMENSION: usize = 256;

    pub fn new() -> Self {
        TrigramEmbedder {
            dimension: Self::DIMENSION,
        }
    }
}

impl Default for TrigramEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

impl Embedder for TrigramEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        let chars: Vec<char> = text.to_lowercase().chars().collect();
        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3.min(chars.len())) {
            let gram: String = window.iter().collect();
            let hash = fnv1a(gram.as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            // hash bit 63 picks the sign
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let norms = dot(a, a).sqrt() * dot(b, b).sqrt();
    if norms == 0.0 { 0.0 } else { dot(a, b) / norms }
}

// --- minimal NPY v1.0, little-endian f4, one dimension ------------------

fn write_npy(path: &PathBuf, data: &[f32]) -> Result<(), StoreError> {
    let header_body = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({},), }}",
        data.len()
    );
    // magic (6) + version (2) + header-len field (2) + header, padded
    // with spaces to a 64-byte boundary, newline-terminated
    let unpadded = 10 + header_body.len() + 1;
    let padding = (64 - unpadded % 64) % 64;
    let header = format!("{header_body}{}\n", " ".repeat(padding));

    let mut file = fs::File::create(path)?;
    file.write_all(b"\x93NUMPY\x01\x00")?;
    file.write_all(&(header.len() as u16).to_le_bytes())?;
    file.write_all(header.as_bytes())?;
    for value in data {
        file.write_all(&value.to_le_bytes())?;
    }
    file.sync_all()?;
    Ok(())
}

fn read_npy(path: &PathBuf) -> Result<Vec<f32>, StoreError> {
    let mut file = fs::File::open(path)?;
    let mut magic = [0u8; 8];
    file.read_exact(&mut magic)?;
    if &magic[..6] != b"\x93NUMPY" {
        return Err(StoreError::internal(format!(
            "not an NPY file: {}",
            path.display()
        )));
    }

    let mut len_bytes = [0u8; 2];
    file.read_exact(&mut len_bytes)?;
    let header_len = u16::from_le_bytes(len_bytes) as usize;

    let mut header = vec![0u8; header_len];
    file.read_exact(&mut header)?;
    let header = String::from_utf8_lossy(&header);
    if !header.contains("'<f4'") {
        return Err(StoreError::internal(format!(
            "unsupported vector dtype in {}",
            path.display()
        )));
    }

    let mut payload = Vec::new();
    file.read_to_end(&mut payload)?;

    Ok(payload
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// On-disk vector index keyed by document id.
pub struct SemanticIndex {
    vectors_dir: PathBuf,
    embedder: Option<Box<dyn Embedder>>,
}

impl SemanticIndex {
    /// `embedder: None` builds a disabled index; indexing becomes a
    /// no-op and searching reports the capability as missing.
    pub fn open(
        vectors_dir: PathBuf,
        embedder: Option<Box<dyn Embedder>>,
    ) -> Result<Self, StoreError> {
        if embedder.is_some() {
            fs::create_dir_all(&vectors_dir)?;
        }
        Ok(SemanticIndex {
            vectors_dir,
            embedder,
        })
    }

    pub fn enabled(&self) -> bool {
        self.embedder.is_some()
    }

    fn vector_path(&self, doc_id: &str) -> PathBuf {
        self.vectors_dir.join(format!("{doc_id}.npy"))
    }

    /// Embed the head of `text` and persist the vector, overwriting any
    /// prior one. No-op when disabled.
    pub fn index(&self, doc_id: &str, text: &str) -> Result<(), StoreError> {
        let Some(embedder) = self.embedder.as_ref() else {
            return Ok(());
        };

        let capped: String = text.chars().take(EMBED_INPUT_CAP).collect();
        let vector = embedder.embed(&capped);
        write_npy(&self.vector_path(doc_id), &vector)
    }

    /// Top-`k` document ids by descending cosine similarity to `query`.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<(String, f32)>, StoreError> {
        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| StoreError::unavailable("semantic search is disabled"))?;

        let query_vector = embedder.embed(query);
        let mut scored = Vec::new();

        if let Ok(entries) = fs::read_dir(&self.vectors_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("npy") {
                    continue;
                }
                let Some(doc_id) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                match read_npy(&path) {
                    Ok(vector) => scored.push((doc_id.to_string(), cosine(&query_vector, &vector))),
                    Err(err) => warn!(doc_id, %err, "skipping unreadable vector file"),
                }
            }
        }

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }

    /// Drop the vector for a deleted document, if one exists.
    pub fn remove(&self, doc_id: &str) -> Result<(), StoreError> {
        let path = self.vector_path(doc_id);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn has_vector(&self, doc_id: &str) -> bool {
        self.vector_path(doc_id).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(dir: &tempfile::TempDir) -> SemanticIndex {
        SemanticIndex::open(
            dir.path().join(".vectors"),
            Some(Box::new(TrigramEmbedder::new())),
        )
        .expect("open index")
    }

    #[test]
    fn npy_round_trips() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("v.npy");
        let data = vec![0.25f32, -1.5, 3.0];
        write_npy(&path, &data).unwrap();
        assert_eq!(read_npy(&path).unwrap(), data);
    }

    #[test]
    fn embeddings_are_deterministic_and_normalised() {
        let embedder = TrigramEmbedder::new();
        let a = embedder.embed("the quick brown fox");
        let b = embedder.embed("the quick brown fox");
        assert_eq!(a, b);

        let norm = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn search_ranks_the_matching_document_first() {
        let dir = tempfile::TempDir::new().unwrap();
        let idx = index(&dir);

        idx.index("doc_1_aaaaaaaa", "rust borrow checker ownership lifetimes")
            .unwrap();
        idx.index("doc_2_bbbbbbbb", "sourdough bread hydration crumb")
            .unwrap();

        let hits = idx.search("rust ownership", 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, "doc_1_aaaaaaaa");
        assert!(hits[0].1 > hits[1].1);

        let capped = idx.search("rust ownership", 1).unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[test]
    fn reindex_overwrites_and_remove_deletes() {
        let dir = tempfile::TempDir::new().unwrap();
        let idx = index(&dir);

        idx.index("doc_1_aaaaaaaa", "alpha").unwrap();
        assert!(idx.has_vector("doc_1_aaaaaaaa"));
        idx.index("doc_1_aaaaaaaa", "beta").unwrap();

        idx.remove("doc_1_aaaaaaaa").unwrap();
        assert!(!idx.has_vector("doc_1_aaaaaaaa"));
        // removing again is fine
        idx.remove("doc_1_aaaaaaaa").unwrap();
    }

    #[test]
    fn disabled_index_is_inert() {
        let dir = tempfile::TempDir::new().unwrap();
        let idx = SemanticIndex::open(dir.path().join(".vectors"), None).unwrap();

        assert!(!idx.enabled());
        idx.index("doc_1_aaaaaaaa", "anything").unwrap();
        assert!(!idx.has_vector("doc_1_aaaaaaaa"));
        assert!(matches!(
            idx.search("anything", 5),
            Err(StoreError::Unavailable(_))
        ));
    }
}
