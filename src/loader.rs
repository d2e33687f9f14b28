//! Document loading and passage splitting.
//!
//! Each configured document is read (PDF via `pdf-extract`, anything else
//! as UTF-8 text), its whitespace collapsed, and the result cut into
//! overlapping passages by [`TextSplitter`].
//!
//! A document that is missing or cannot be extracted is skipped with a
//! warning; the corpus fails only when nothing usable remains.

use std::collections::VecDeque;
use std::path::Path;

use crate::config::DocumentsConfig;
use crate::error::{RagError, RagResult};

/// Separators tried in order, coarsest first. The empty separator splits
/// into single characters, so every piece eventually fits.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

/// Recursive character splitter.
///
/// Text is split on the coarsest separator present; pieces that still
/// exceed `chunk_size` are split again with the next separator. Adjacent
/// small pieces are merged back into passages of at most `chunk_size`
/// characters, each sharing up to `chunk_overlap` trailing characters with
/// its predecessor.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn from_config(config: &DocumentsConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Split `text` into trimmed, non-empty passages in document order.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(*sep))
            .unwrap_or(separators.len());
        let separator = separators.get(position).copied().unwrap_or("");
        let finer = separators.get(position + 1..).unwrap_or(&[]);

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|p| !p.is_empty()).collect()
        };

        let mut passages = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in pieces {
            if char_len(piece) <= self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                passages.extend(self.merge(&pending, separator));
                pending.clear();
            }
            if finer.is_empty() {
                push_trimmed(&mut passages, piece.to_string());
            } else {
                passages.extend(self.split_with(piece, finer));
            }
        }

        if !pending.is_empty() {
            passages.extend(self.merge(&pending, separator));
        }
        passages
    }

    /// Greedily join pieces up to `chunk_size`, carrying an overlap window
    /// into the next passage.
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut passages = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { sep_len };

            if !window.is_empty() && total + joiner + len > self.chunk_size {
                push_trimmed(&mut passages, join(&window, separator));

                while total > self.chunk_overlap
                    || (total > 0 && total + sep_len + len > self.chunk_size)
                {
                    let Some(front) = window.pop_front() else {
                        break;
                    };
                    total -= char_len(front) + if window.is_empty() { 0 } else { sep_len };
                }
            }

            total += len + if window.is_empty() { 0 } else { sep_len };
            window.push_back(piece);
        }

        if !window.is_empty() {
            push_trimmed(&mut passages, join(&window, separator));
        }
        passages
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn join(window: &VecDeque<&str>, separator: &str) -> String {
    window.iter().copied().collect::<Vec<_>>().join(separator)
}

fn push_trimmed(out: &mut Vec<String>, passage: String) {
    let trimmed = passage.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// Collapse every run of whitespace (including newlines) to one space.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract the raw text of one document. PDFs are detected by extension.
pub fn extract_text(path: &Path) -> RagResult<String> {
    let failed = |reason: String| RagError::Document {
        path: path.to_path_buf(),
        reason,
    };

    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));

    if is_pdf {
        let bytes = std::fs::read(path).map_err(|e| failed(e.to_string()))?;
        pdf_extract::extract_text_from_mem(&bytes).map_err(|e| failed(e.to_string()))
    } else {
        std::fs::read_to_string(path).map_err(|e| failed(e.to_string()))
    }
}

/// Load, normalize, and split every configured document into passages.
///
/// Returns [`RagError::EmptyCorpus`] when no document yields any text.
pub fn load_passages(config: &DocumentsConfig) -> RagResult<Vec<String>> {
    let splitter = TextSplitter::from_config(config);
    let mut passages = Vec::new();

    for path in &config.paths {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "document not found, skipping");
            continue;
        }

        let text = match extract_text(path) {
            Ok(text) => normalize_whitespace(&text),
            Err(e) => {
                tracing::warn!(error = %e, "skipping document");
                continue;
            }
        };

        if text.is_empty() {
            tracing::warn!(path = %path.display(), "document has no extractable text");
            continue;
        }

        let chunks = splitter.split(&text);
        tracing::info!(path = %path.display(), passages = chunks.len(), "loaded document");
        passages.extend(chunks);
    }

    if passages.is_empty() {
        return Err(RagError::EmptyCorpus);
    }
    Ok(passages)
}
