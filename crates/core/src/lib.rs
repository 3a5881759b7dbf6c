pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod store;
pub mod stores;
pub mod traits;

#[cfg(test)]
mod test_support;

pub use chunking::{
    split_into_chunks, split_text, ChunkingConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE,
};
pub use config::{PipelineConfig, DEFAULT_DATA_PATH, DEFAULT_INDEX_PATH};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, HttpEmbedder, HttpEmbedderConfig,
    DEFAULT_EMBEDDING_BATCH_SIZE, DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBEDDING_MODEL,
};
pub use error::{IngestError, ProviderError, ResultExt};
pub use extractor::{ExtractedPdf, LopdfExtractor, PageText, PdfExtractor};
pub use loader::{discover_pdf_files, load_documents, PageCleaner};
pub use models::{Chunk, Document, DocumentMetadata, LoadReport, SearchHit, SkippedPdf};
pub use pipeline::{IngestionPipeline, PipelineOutcome, RunSummary};
pub use store::{
    build_and_persist, load as load_vector_store, BuildOutcome, IndexManifest, VectorStore,
};
pub use stores::FlatIndex;
pub use traits::VectorIndex;
