use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub document_id: String,
    pub source_path: String,
    pub title: String,
    pub page: u32,
    pub page_count: u32,
    pub checksum: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub text: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub chunk_id: String,
    pub chunk_index: u64,
    pub text: String,
    /// Character offset of `text` inside the page it was cut from.
    pub start_index: usize,
    pub metadata: DocumentMetadata,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk: Chunk,
    /// Squared L2 distance to the query; lower is closer.
    pub distance: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkippedPdf {
    pub path: std::path::PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub pdf_files: usize,
    pub documents: Vec<Document>,
    pub skipped_files: Vec<SkippedPdf>,
}

impl LoadReport {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
