use crate::error::IngestError;
use crate::models::{Chunk, Document};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use tracing::{debug, info};

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Tried in order; the first one present in a piece of text is used to split it.
/// The empty separator splits into single characters.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, IngestError> {
        let config = Self {
            chunk_size,
            chunk_overlap,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 || self.chunk_overlap == 0 {
            return Err(IngestError::Configuration(format!(
                "chunk size ({}) and chunk overlap ({}) must be positive",
                self.chunk_size, self.chunk_overlap
            )));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::Configuration(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }

        Ok(())
    }
}

pub fn split_into_chunks(
    documents: &[Document],
    config: ChunkingConfig,
) -> Result<Vec<Chunk>, IngestError> {
    config.validate()?;

    if documents.is_empty() {
        return Err(IngestError::Data("no documents found".to_string()));
    }

    info!(documents = documents.len(), "splitting documents into chunks");

    let mut chunks = Vec::new();
    let mut cursor = 0u64;

    for document in documents {
        let mut search_from = 0usize;

        for text in split_text(&document.text, config) {
            let start_index = locate(&document.text, &text, search_from);
            search_from = start_index + 1;

            chunks.push(Chunk {
                chunk_id: make_chunk_id(
                    &document.metadata.document_id,
                    document.metadata.page,
                    cursor,
                    &text,
                ),
                chunk_index: cursor,
                text,
                start_index,
                metadata: document.metadata.clone(),
            });
            cursor = cursor.saturating_add(1);
        }
    }

    info!(chunks = chunks.len(), "created text chunks");
    Ok(chunks)
}

pub fn split_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    split_recursive(text, &DEFAULT_SEPARATORS, config)
}

fn split_recursive(text: &str, separators: &[&str], config: ChunkingConfig) -> Vec<String> {
    let mut separator = separators.last().copied().unwrap_or("");
    let mut finer: &[&str] = &[];

    for (position, &candidate) in separators.iter().enumerate() {
        if candidate.is_empty() {
            separator = candidate;
            break;
        }
        if text.contains(candidate) {
            separator = candidate;
            finer = &separators[position + 1..];
            break;
        }
    }

    let mut chunks = Vec::new();
    let mut pending: Vec<&str> = Vec::new();

    for piece in split_keeping_separator(text, separator) {
        if char_len(piece) < config.chunk_size {
            pending.push(piece);
            continue;
        }

        if !pending.is_empty() {
            chunks.extend(merge_pieces(&pending, config));
            pending.clear();
        }

        if finer.is_empty() {
            let trimmed = piece.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }
        } else {
            chunks.extend(split_recursive(piece, finer, config));
        }
    }

    if !pending.is_empty() {
        chunks.extend(merge_pieces(&pending, config));
    }

    chunks
}

/// Splits on `separator`, attaching each separator to the start of the piece that follows it.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(offset, ch)| &text[offset..offset + ch.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (offset, _) in text.match_indices(separator) {
        if offset > start {
            pieces.push(&text[start..offset]);
        }
        start = offset;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces
}

/// Greedily packs small pieces into chunks of at most `chunk_size` characters.
///
/// Each new chunk starts with the shortest run of trailing pieces of the
/// previous one that holds at least `chunk_overlap` characters. When that run
/// and the next piece would not fit in `chunk_size`, less is carried.
fn merge_pieces(pieces: &[&str], config: ChunkingConfig) -> Vec<String> {
    let mut merged = Vec::new();
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for &piece in pieces {
        let len = char_len(piece);

        if total + len > config.chunk_size {
            if total > config.chunk_size {
                debug!(
                    size = total,
                    limit = config.chunk_size,
                    "created a chunk larger than the configured size"
                );
            }

            if !window.is_empty() {
                if let Some(chunk) = join_window(&window) {
                    merged.push(chunk);
                }

                let (keep, kept) = carried_suffix(&window, config.chunk_overlap);
                if kept + len <= config.chunk_size {
                    let dropped = window.len() - keep;
                    window.drain(..dropped);
                    total = kept;
                } else {
                    while total > config.chunk_overlap
                        || (total + len > config.chunk_size && total > 0)
                    {
                        match window.pop_front() {
                            Some(dropped) => total -= char_len(dropped),
                            None => break,
                        }
                    }
                }
            }
        }

        window.push_back(piece);
        total += len;
    }

    if let Some(chunk) = join_window(&window) {
        merged.push(chunk);
    }

    merged
}

/// Piece count and raw length of the shortest suffix of `window` whose
/// trimmed text reaches `overlap` characters, or of the whole window.
fn carried_suffix(window: &VecDeque<&str>, overlap: usize) -> (usize, usize) {
    let mut trailing = 0usize;
    for piece in window.iter().rev() {
        let len = char_len(piece);
        let blank = piece.chars().rev().take_while(|ch| ch.is_whitespace()).count();
        trailing += blank;
        if blank < len {
            break;
        }
    }

    let mut total = 0usize;
    let mut leading = 0usize;
    for (count, piece) in window.iter().rev().enumerate() {
        let len = char_len(piece);
        let blank = piece.chars().take_while(|ch| ch.is_whitespace()).count();
        leading = if blank == len { len + leading } else { blank };
        total += len;
        if total.saturating_sub(leading + trailing) >= overlap {
            return (count + 1, total);
        }
    }

    (window.len(), total)
}

fn join_window(window: &VecDeque<&str>) -> Option<String> {
    let joined = window.iter().copied().collect::<String>();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn locate(haystack: &str, needle: &str, hint: usize) -> usize {
    let from = haystack
        .char_indices()
        .nth(hint)
        .map(|(offset, _)| offset)
        .unwrap_or(haystack.len());

    let found = haystack[from..]
        .find(needle)
        .map(|offset| from + offset)
        .or_else(|| haystack.find(needle));

    match found {
        Some(byte_offset) => haystack[..byte_offset].chars().count(),
        None => hint,
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn make_chunk_id(document_id: &str, page: u32, index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update(page.to_le_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
