use crate::error::ProviderError;
use crate::models::{Chunk, SearchHit};
use std::path::Path;

/// `save` and `load` work inside a directory the caller has already created.
pub trait VectorIndex {
    fn dimensions(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn add(&mut self, chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<(), ProviderError>;

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>, ProviderError>;

    fn save(&self, dir: &Path) -> Result<(), ProviderError>;

    fn load(dir: &Path) -> Result<Self, ProviderError>
    where
        Self: Sized;
}
